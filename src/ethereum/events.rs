use alloy::{
    dyn_abi::EventExt,
    json_abi::{Event, JsonAbi},
    primitives::{Address, B256},
    rpc::types::Log,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::{abi, EventRecord};
use crate::error::{FetchError, FetchResult};

/// Which slice of the contract's event history to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Listed,
    Bought,
    Transfer,
    Approval,
    OwnershipTransferred,
    /// `Transfer` events minted from the zero address.
    Mint,
    /// `Transfer` events between existing holders.
    NotMint,
    /// Every log whose topic0 matches an event in the ABI.
    All,
}

impl EventKind {
    pub const VARIANTS: [EventKind; 8] = [
        EventKind::Listed,
        EventKind::Bought,
        EventKind::Transfer,
        EventKind::Approval,
        EventKind::OwnershipTransferred,
        EventKind::Mint,
        EventKind::NotMint,
        EventKind::All,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Listed => "listed",
            EventKind::Bought => "bought",
            EventKind::Transfer => "transfer",
            EventKind::Approval => "approval",
            EventKind::OwnershipTransferred => "ownershiptransferred",
            EventKind::Mint => "mint",
            EventKind::NotMint => "notmint",
            EventKind::All => "all",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        EventKind::VARIANTS
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| FetchError::InvalidEvent(s.to_string()))
    }
}

/// Decodes raw logs by looking up their topic0 among the ABI's events.
#[derive(Debug, Clone, Default)]
pub struct EventDecoder {
    events: HashMap<B256, Event>,
}

impl EventDecoder {
    pub fn from_abi(abi: &JsonAbi) -> Self {
        let events = abi
            .events()
            .filter(|event| !event.anonymous)
            .map(|event| (event.selector(), event.clone()))
            .collect();
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Decode `log` if its topic0 belongs to a known event.
    ///
    /// Logs without topics or with an unknown topic0 yield `Ok(None)`.
    pub fn decode(&self, log: &Log) -> FetchResult<Option<EventRecord>> {
        let Some(topic0) = log.topics().first() else {
            return Ok(None);
        };
        match self.events.get(topic0) {
            Some(event) => decode_log(event, log).map(Some),
            None => Ok(None),
        }
    }

    pub fn decode_all(&self, logs: &[Log]) -> FetchResult<Vec<EventRecord>> {
        let mut records = Vec::new();
        for log in logs {
            match self.decode(log)? {
                Some(record) => records.push(record),
                None => tracing::debug!(
                    "Skipping log with unknown topic in tx {:?}",
                    log.transaction_hash
                ),
            }
        }
        Ok(records)
    }
}

/// Look up a non-anonymous event by name.
pub fn find_event<'a>(abi: &'a JsonAbi, name: &str) -> FetchResult<&'a Event> {
    abi.event(name)
        .and_then(|overloads| overloads.first())
        .ok_or_else(|| FetchError::Abi(format!("Event '{}' not found in contract ABI", name)))
}

/// Decode one log against a specific event definition.
pub fn decode_log(event: &Event, log: &Log) -> FetchResult<EventRecord> {
    let decoded = event
        .decode_log_parts(log.topics().iter().copied(), &log.data().data, true)
        .map_err(|e| FetchError::Decode(format!("Failed to decode {} log: {}", event.name, e)))?;

    let mut indexed = decoded.indexed.into_iter();
    let mut body = decoded.body.into_iter();
    let mut values = Vec::with_capacity(event.inputs.len());
    for param in &event.inputs {
        let value = if param.indexed {
            indexed.next()
        } else {
            body.next()
        };
        values.push(value.ok_or_else(|| {
            FetchError::Decode(format!("Missing value for {}.{}", event.name, param.name))
        })?);
    }

    let args = abi::named_values(event.inputs.iter().map(|p| p.name.as_str()), &values)?;

    Ok(EventRecord {
        address: log.address(),
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
        event: event.name.clone(),
        args,
    })
}

/// Whether a decoded `Transfer` came from the zero address.
pub fn is_mint(record: &EventRecord) -> FetchResult<bool> {
    let from = record
        .args
        .get("from")
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::Decode(format!("{} event has no 'from' argument", record.event)))?;
    let address = Address::from_str(from)
        .map_err(|e| FetchError::Decode(format!("Invalid 'from' address '{}': {}", from, e)))?;
    Ok(address.is_zero())
}

/// Split `Transfer` records into `(mints, non-mints)`, keeping order.
pub fn partition_mints(records: Vec<EventRecord>) -> FetchResult<(Vec<EventRecord>, Vec<EventRecord>)> {
    let mut mints = Vec::new();
    let mut others = Vec::new();
    for record in records {
        if is_mint(&record)? {
            mints.push(record);
        } else {
            others.push(record);
        }
    }
    Ok((mints, others))
}
