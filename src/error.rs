use std::path::PathBuf;

use thiserror::Error;

/// Event names accepted by [`crate::ethereum::events::EventKind`], in the
/// order they are reported back to the user.
pub const EVENT_NAMES: [&str; 8] = [
    "listed",
    "bought",
    "transfer",
    "approval",
    "ownershiptransferred",
    "mint",
    "notmint",
    "all",
];

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(
        "Invalid event '{0}': event field must be one of [{names}]",
        names = EVENT_NAMES.map(|n| format!("\"{n}\"")).join(", ")
    )]
    InvalidEvent(String),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Explorer error: {0}")]
    Explorer(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

pub type FetchResult<T> = Result<T, FetchError>;
