//! Event log data structures.

use serde::{Deserialize, Serialize};

use super::{
    contract::Contract,
    serde_helpers::{opt_u64_quantity, u64_quantity},
};

/// A contract event log, optionally enriched with its decoded form, the
/// emitting token's metadata and a human readable summary.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    /// Emitting contract, as reported by the chain.
    pub address: String,
    /// Indexed topics. The first one is the event selector.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Non-indexed event data.
    #[serde(default)]
    pub data: String,
    /// Number of the including block.
    #[serde(deserialize_with = "u64_quantity")]
    pub block_number: u64,
    /// Hash of the transaction that emitted the log. Either encoding may
    /// appear here.
    pub transaction_hash: String,
    /// Position of the emitting transaction in the block.
    #[serde(default, deserialize_with = "opt_u64_quantity")]
    pub transaction_index: Option<u64>,
    /// Hash of the including block.
    #[serde(default)]
    pub block_hash: Option<String>,
    /// Position of the log in the block.
    #[serde(default, deserialize_with = "opt_u64_quantity")]
    pub log_index: Option<u64>,
    /// Set when a reorg removed the log.
    #[serde(default)]
    pub removed: bool,

    /// Decoded event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_log: Option<EventLog>,
    /// Token metadata of the emitting contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<Contract>,
    /// Amount, asset and direction of the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<LogSummary>,
}

/// A decoded event.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventLog {
    /// Event name, e.g. `Transfer`.
    pub event: String,
    /// Full event signature, e.g. `Transfer(address,address,uint256)`.
    pub signature: String,
    /// Emitting contract.
    pub address: String,
    /// Decoded parameters in declaration order.
    pub params: Vec<EventParam>,
}

impl EventLog {
    /// Looks up a parameter value by name.
    pub fn param(&self, name: &str) -> Option<&serde_json::Value> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

/// A named decoded event parameter.
///
/// Addresses are lowercase hex strings and integers are decimal strings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EventParam {
    /// Parameter name from the ABI.
    pub name: String,
    /// Decoded value.
    pub value: serde_json::Value,
}

/// A human readable digest of an event.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct LogSummary {
    /// Event name.
    pub event: String,
    /// Amount in whole units.
    pub value: String,
    /// Asset symbol.
    pub asset: String,
    /// Sending side of the event.
    pub from: Option<serde_json::Value>,
    /// Receiving side of the event.
    pub to: Option<serde_json::Value>,
}
