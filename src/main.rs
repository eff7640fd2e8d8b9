mod config;
mod error;
mod ethereum;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use config::Config;
use ethereum::{events::EventKind, fetch::Fetch};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Results go to stdout, so logs stay on stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let matches = Command::new("nft-history")
        .version("0.1.0")
        .about("Reconstruct the transaction history of an NFT contract")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to configuration file (JSON, or TOML by extension)"),
        )
        .arg(
            Arg::new("events")
                .short('e')
                .long("events")
                .value_name("NAME")
                .value_parser(|s: &str| s.parse::<EventKind>())
                .help("Print decoded events: listed, bought, transfer, approval, ownershiptransferred, mint, notmint, all"),
        )
        .arg(
            Arg::new("from-block")
                .long("from-block")
                .value_name("BLOCK")
                .value_parser(value_parser!(u64))
                .requires("events")
                .help("First block to scan for events (defaults to the deployment block)"),
        )
        .arg(
            Arg::new("transactions")
                .long("transactions")
                .help("Print the hashes of transactions sent to the contract")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("transfers")
                .long("transfers")
                .help("Print the ERC-721 transfer records of the contract")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("signatures")
                .long("signatures")
                .help("Print the function selectors known from the ABI")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a sample configuration file and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-path")
                .long("config-path")
                .help("Print the default configuration file path and exit")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    // Handle special commands first
    if matches.get_flag("generate-config") {
        println!("{}", Config::generate_sample());
        return Ok(());
    }

    if matches.get_flag("config-path") {
        match Config::default_config_path() {
            Ok(path) => {
                println!("{}", path.display());
                return Ok(());
            }
            Err(e) => {
                error!("Could not determine default config path: {}", e);
                return Err(e);
            }
        }
    }

    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let config = Config::load_or_default(config_path)
        .await
        .context("Failed to load configuration")?;
    let fetch_config = config.to_fetch_config()?;

    let fetch = Fetch::new(fetch_config)
        .await
        .context("Failed to initialize fetcher")?;

    if matches.get_flag("signatures") {
        for (selector, function) in fetch.signatures().iter() {
            println!("{} {}", selector, function.signature());
        }
        return Ok(());
    }

    if let Some(kind) = matches.get_one::<EventKind>("events") {
        let start_block = matches.get_one::<u64>("from-block").copied();
        let records = fetch.events(*kind, start_block).await?;
        for record in &records {
            println!("{}", serde_json::to_string(record)?);
        }
        return Ok(());
    }

    if matches.get_flag("transactions") {
        for hash in fetch.transactions().await? {
            println!("{}", hash);
        }
        return Ok(());
    }

    if matches.get_flag("transfers") {
        for transfer in fetch.contract_transfers().await? {
            println!("{}", serde_json::to_string(&transfer)?);
        }
        return Ok(());
    }

    info!("Decoding contract transactions");
    let calls = fetch.functions().await?;
    for (hash, call) in &calls {
        println!("{} {}", hash, serde_json::to_string(call)?);
    }

    Ok(())
}
