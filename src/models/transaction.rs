//! Reconciled transaction records.

use std::collections::BTreeSet;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use super::log::Log;

/// Function name given to internal transactions whose selector cannot be
/// resolved.
pub const INTERNAL_FUNCTION_NAME: &str = "Internal";

/// A transaction as stored for subscribers: the top-level transaction merged
/// with its decoded logs and the internal transfers it caused.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Canonical hash, unique within a block.
    pub hash: String,
    /// Alternate (Ethereum-compatible) hash of the same transaction.
    pub eth_hash: Option<String>,
    /// Sender, lowercase hex.
    pub from: String,
    /// Recipient, lowercase hex.
    pub to: String,
    /// Transferred amount in wei.
    pub value: U256,
    /// `value` in whole native units.
    pub parsed_value: String,
    /// Gas limit.
    pub gas: u64,
    /// Gas price in wei.
    pub gas_price: U256,
    /// `gas * gas_price` in whole native units.
    pub total_gas: String,
    /// Resolved function signature of the call input.
    pub function_name: Option<String>,
    /// Number of the including block.
    pub block_number: u64,
    /// Hash of the including block.
    pub block_hash: Option<String>,
    /// Block timestamp in seconds.
    pub timestamp: u64,
    /// Asset symbol of `value`.
    pub asset: String,
    /// Insertion rank in milliseconds, for display ordering only.
    pub sort_field: i64,
    /// Raw call input.
    pub input: Option<String>,
    /// Sender nonce.
    pub nonce: Option<u64>,
    /// Position in the block.
    pub transaction_index: u64,
    /// Decoded logs, in discovery order.
    pub logs: Vec<Log>,
    /// Internal transfers merged into this transaction.
    pub internals: Vec<InternalTransaction>,
    /// Every address this transaction touches.
    pub addresses: BTreeSet<String>,
}

impl Transaction {
    /// Builds a standalone transaction from an internal transfer that has no
    /// top-level counterpart.
    pub fn from_internal(internal: &InternalTransaction, timestamp: u64, sort_field: i64) -> Self {
        Self {
            hash: internal.transaction_hash.clone(),
            eth_hash: None,
            from: internal.from.clone(),
            to: internal.to.clone(),
            value: internal.value,
            parsed_value: internal.parsed_value.clone(),
            gas: internal.gas,
            gas_price: U256::from(internal.gas_price),
            total_gas: internal.total_gas.clone(),
            function_name: internal.function_name.clone(),
            block_number: internal.block_number,
            block_hash: None,
            timestamp,
            asset: internal.asset.clone(),
            sort_field,
            input: Some(internal.input.clone()),
            nonce: None,
            transaction_index: internal.index,
            logs: Vec::new(),
            internals: Vec::new(),
            addresses: BTreeSet::from([internal.from.clone(), internal.to.clone()]),
        }
    }

    /// Adds addresses to the exposure set.
    pub fn merge_addresses<I>(&mut self, addresses: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.addresses.extend(addresses.into_iter().filter(|a| !a.is_empty()));
    }

    /// Whether an internal transfer restates this transaction's own transfer.
    pub fn restates(&self, internal: &InternalTransaction) -> bool {
        self.value == internal.value && self.from == internal.from && self.to == internal.to
    }
}

/// A value transfer or call made by contract code while executing another
/// transaction.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InternalTransaction {
    /// Position of the owning transaction in the block.
    pub index: u64,
    /// Number of the traced block.
    pub block_number: u64,
    /// Caller, lowercase hex.
    pub from: String,
    /// Callee, lowercase hex.
    pub to: String,
    /// Gas used by the call.
    pub gas: u64,
    /// Gas allowance of the call.
    pub gas_price: u64,
    /// `gas * gas_price` in whole native units.
    pub total_gas: String,
    /// Raw call input.
    pub input: String,
    /// Raw call output.
    pub output: String,
    /// Transferred amount in wei.
    pub value: U256,
    /// `value` in whole native units.
    pub parsed_value: String,
    /// Alternate hash of the owning transaction.
    pub transaction_hash: String,
    /// Asset symbol of `value`.
    pub asset: String,
    /// Resolved function signature, `"Internal"` when unknown.
    pub function_name: Option<String>,
    /// Discovery time in milliseconds.
    pub time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn internal() -> InternalTransaction {
        InternalTransaction {
            index: 3,
            block_number: 10,
            from: "0x1".into(),
            to: "0x2".into(),
            gas: 100,
            gas_price: 200,
            total_gas: "0".into(),
            input: "0x".into(),
            output: "0x".into(),
            value: U256::from(5u64),
            parsed_value: "0.000000000000000005".into(),
            transaction_hash: "0xaaa".into(),
            asset: "ONE".into(),
            function_name: Some(INTERNAL_FUNCTION_NAME.into()),
            time: 1,
        }
    }

    #[test]
    fn test_from_internal_starts_with_empty_children() {
        let tx = Transaction::from_internal(&internal(), 1_700_000_000, 42);

        assert_eq!(tx.hash, "0xaaa");
        assert_eq!(tx.function_name.as_deref(), Some("Internal"));
        assert_eq!(tx.gas_price, U256::from(200u64));
        assert_eq!(tx.timestamp, 1_700_000_000);
        assert_eq!(tx.sort_field, 42);
        assert!(tx.logs.is_empty());
        assert!(tx.internals.is_empty());
        assert_eq!(tx.addresses, BTreeSet::from(["0x1".to_string(), "0x2".to_string()]));
    }

    #[test]
    fn test_restates_requires_value_and_parties() {
        let mut tx = Transaction::from_internal(&internal(), 0, 0);
        assert!(tx.restates(&internal()));

        tx.value = U256::from(6u64);
        assert!(!tx.restates(&internal()));
    }

    #[test]
    fn test_merge_addresses_skips_empty() {
        let mut tx = Transaction::default();
        tx.merge_addresses(["0xa".to_string(), String::new(), "0xa".to_string()]);
        assert_eq!(tx.addresses.len(), 1);
    }

    #[test]
    fn test_serializes_camel_case() {
        let tx = Transaction::from_internal(&internal(), 0, 0);
        let json = serde_json::to_value(&tx).unwrap();
        assert!(json.get("parsedValue").is_some());
        assert!(json.get("sortField").is_some());
        assert!(json.get("functionName").is_some());
    }
}
