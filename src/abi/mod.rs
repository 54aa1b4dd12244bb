//! Event log decoding.
//!
//! Logs are decoded against a built-in standard ABI first (ERC-20 plus the
//! wrapped native token's deposit and withdrawal events), then against the
//! emitting contract's own published ABI. ABIs arrive at runtime, so decoding
//! goes through `dyn_abi` rather than the `sol!` macro.

use std::{
    collections::HashMap,
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

use alloy::{
    dyn_abi::{self, DynSolValue, EventExt},
    hex,
    json_abi::{Event, EventParam as AbiEventParam, JsonAbi},
    primitives::B256,
};
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

use crate::{
    codec::canonical_hex,
    contract::AbiSource,
    models::{EventLog, EventParam, Log},
};

/// Custom error type for log decoding.
#[derive(Error, Debug)]
pub enum AbiError {
    /// No event in the ABI has the log's first topic as its selector.
    #[error("Event signature not found in ABI: {0}")]
    EventNotFound(B256),

    /// The log has no topics and cannot be identified.
    #[error("Log has no topics, cannot identify event")]
    LogHasNoTopics,

    /// A topic is not 32 bytes of hex.
    #[error("Invalid topic {0:?}")]
    InvalidTopic(String),

    /// The log data is not hex.
    #[error("Invalid log data: {0}")]
    InvalidData(String),

    /// Wrapper for decoding errors from the underlying ABI library.
    #[error("Failed to decode data: {0}")]
    DecodingError(#[from] dyn_abi::Error),
}

/// Events of an ABI, keyed by selector.
#[derive(Debug, Clone, Default)]
pub struct CachedContract {
    events: HashMap<B256, Event>,
}

impl CachedContract {
    fn from_events(events: impl IntoIterator<Item = Event>) -> Self {
        Self { events: events.into_iter().map(|event| (event.selector(), event)).collect() }
    }

    /// The built-in standard ABI.
    pub fn standard() -> Self {
        Self::from_events([
            event(
                "Transfer",
                &[("address", "from", true), ("address", "to", true), ("uint256", "value", false)],
            ),
            event(
                "Approval",
                &[
                    ("address", "owner", true),
                    ("address", "spender", true),
                    ("uint256", "value", false),
                ],
            ),
            event("Deposit", &[("address", "dst", true), ("uint256", "wad", false)]),
            event("Withdrawal", &[("address", "src", true), ("uint256", "wad", false)]),
        ])
    }

    /// Decodes `log` against these events.
    pub fn decode(&self, log: &Log) -> Result<EventLog, AbiError> {
        let topics = log
            .topics
            .iter()
            .map(|t| B256::from_str(t).map_err(|_| AbiError::InvalidTopic(t.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        let selector = topics.first().ok_or(AbiError::LogHasNoTopics)?;
        let event = self.events.get(selector).ok_or(AbiError::EventNotFound(*selector))?;

        let data = hex::decode(&log.data).map_err(|e| AbiError::InvalidData(e.to_string()))?;
        let decoded = event.decode_log_parts(topics.iter().copied(), &data)?;

        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let params = event
            .inputs
            .iter()
            .filter_map(|input| {
                let value = if input.indexed { indexed.next() } else { body.next() }?;
                Some(EventParam { name: input.name.clone(), value: to_json(&value) })
            })
            .collect();

        Ok(EventLog {
            event: event.name.clone(),
            signature: event.signature(),
            address: log.address.to_lowercase(),
            params,
        })
    }
}

impl From<&JsonAbi> for CachedContract {
    fn from(abi: &JsonAbi) -> Self {
        Self::from_events(abi.events().cloned())
    }
}

fn event(name: &str, inputs: &[(&str, &str, bool)]) -> Event {
    Event {
        name: name.to_string(),
        inputs: inputs
            .iter()
            .map(|(ty, name, indexed)| AbiEventParam {
                ty: ty.to_string(),
                name: name.to_string(),
                indexed: *indexed,
                internal_type: None,
                components: Vec::new(),
            })
            .collect(),
        anonymous: false,
    }
}

/// Renders a decoded value as JSON: addresses as lowercase hex, integers as
/// decimal strings, byte strings as `0x` hex.
fn to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Address(address) => Value::String(canonical_hex(address)),
        DynSolValue::Uint(v, _) => Value::String(v.to_string()),
        DynSolValue::Int(v, _) => Value::String(v.to_string()),
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Bytes(b) => Value::String(hex::encode_prefixed(b)),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(hex::encode_prefixed(&word[..*size]))
        }
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(to_json).collect())
        }
        other => Value::String(format!("{other:?}")),
    }
}

/// Contract ABIs kept in memory at most.
pub const DEFAULT_MAX_CONTRACTS: usize = 1_024;

/// How long a contract ABI is kept in memory before it is read again from
/// the `AbiSource`, which applies the `abi-*` cache expiry.
pub const DEFAULT_CONTRACT_TTL: Duration = Duration::from_secs(3_600);

struct MemoizedContract {
    contract: Arc<CachedContract>,
    loaded_at: Instant,
}

/// Decodes event logs, consulting contract ABIs when the standard ABI does
/// not match.
pub struct LogDecoder {
    standard: CachedContract,
    contracts: DashMap<String, MemoizedContract>,
    abi_source: Arc<AbiSource>,
    max_contracts: usize,
    contract_ttl: Duration,
}

impl LogDecoder {
    /// Creates a decoder that fetches contract ABIs through `abi_source`.
    pub fn new(abi_source: Arc<AbiSource>) -> Self {
        Self {
            standard: CachedContract::standard(),
            contracts: DashMap::new(),
            abi_source,
            max_contracts: DEFAULT_MAX_CONTRACTS,
            contract_ttl: DEFAULT_CONTRACT_TTL,
        }
    }

    /// Overrides the size and expiry of the in-memory contract ABI table.
    pub fn with_limits(mut self, max_contracts: usize, contract_ttl: Duration) -> Self {
        self.max_contracts = max_contracts.max(1);
        self.contract_ttl = contract_ttl;
        self
    }

    /// Decodes `log`, or returns `None` if neither ABI can.
    pub async fn decode(&self, log: &Log) -> Option<EventLog> {
        match self.standard.decode(log) {
            Ok(event_log) => return Some(event_log),
            Err(e) => {
                tracing::trace!(address = %log.address, error = %e, "Standard ABI did not match.")
            }
        }

        let contract = self.contract_abi(&log.address).await?;
        match contract.decode(log) {
            Ok(event_log) => Some(event_log),
            Err(e) => {
                tracing::debug!(address = %log.address, error = %e, "Log could not be decoded.");
                None
            }
        }
    }

    async fn contract_abi(&self, address: &str) -> Option<Arc<CachedContract>> {
        let address = address.to_lowercase();
        if let Some(entry) = self.contracts.get(&address) {
            if entry.loaded_at.elapsed() < self.contract_ttl {
                return Some(entry.contract.clone());
            }
        }
        self.contracts.remove(&address);

        let abi = self.abi_source.abi_for(&address).await?;
        let contract = Arc::new(CachedContract::from(&abi));
        self.make_room();
        self.contracts.insert(
            address,
            MemoizedContract { contract: contract.clone(), loaded_at: Instant::now() },
        );
        Some(contract)
    }

    /// Drops expired entries, then everything if the table is still full.
    fn make_room(&self) {
        if self.contracts.len() < self.max_contracts {
            return;
        }
        self.contracts.retain(|_, entry| entry.loaded_at.elapsed() < self.contract_ttl);
        if self.contracts.len() >= self.max_contracts {
            tracing::debug!(size = self.contracts.len(), "Contract ABI table full, clearing.");
            self.contracts.clear();
        }
    }
}
