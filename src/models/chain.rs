//! Wire shapes returned by the chain JSON-RPC API.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use super::serde_helpers::{opt_u64_quantity, u64_quantity, u256_quantity};

/// A block with its transactions inlined.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChainBlock {
    /// Block number.
    #[serde(deserialize_with = "u64_quantity")]
    pub number: u64,
    /// Block hash.
    #[serde(default)]
    pub hash: Option<String>,
    /// Block timestamp in seconds.
    #[serde(deserialize_with = "u64_quantity")]
    pub timestamp: u64,
    /// Top-level transactions.
    #[serde(default)]
    pub transactions: Vec<ChainTransaction>,
}

/// A top-level transaction as the chain reports it.
///
/// Addresses are in the chain's native encoding and may be missing for
/// contract creations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChainTransaction {
    /// Canonical transaction hash.
    pub hash: String,
    /// Ethereum-compatible hash of the same transaction.
    #[serde(default)]
    pub eth_hash: Option<String>,
    /// Sender.
    #[serde(default)]
    pub from: Option<String>,
    /// Recipient.
    #[serde(default)]
    pub to: Option<String>,
    /// Transferred amount in the smallest native unit.
    #[serde(deserialize_with = "u256_quantity")]
    pub value: U256,
    /// Gas limit.
    #[serde(deserialize_with = "u64_quantity")]
    pub gas: u64,
    /// Gas price.
    #[serde(deserialize_with = "u256_quantity")]
    pub gas_price: U256,
    /// Call input.
    #[serde(default)]
    pub input: Option<String>,
    /// Sender nonce.
    #[serde(default, deserialize_with = "opt_u64_quantity")]
    pub nonce: Option<u64>,
    /// Hash of the containing block.
    #[serde(default)]
    pub block_hash: Option<String>,
    /// Number of the containing block.
    #[serde(default, deserialize_with = "opt_u64_quantity")]
    pub block_number: Option<u64>,
    /// Position in the block.
    #[serde(default, deserialize_with = "opt_u64_quantity")]
    pub transaction_index: Option<u64>,
    /// Transaction timestamp in seconds.
    #[serde(default, deserialize_with = "opt_u64_quantity")]
    pub timestamp: Option<u64>,
}

/// One entry of a `trace_block` response.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChainTrace {
    /// The traced call.
    #[serde(default)]
    pub action: TraceAction,
    /// Outcome of the call. Absent for failed calls.
    #[serde(default)]
    pub result: Option<TraceResult>,
    /// Ethereum-compatible hash of the transaction that produced the call.
    #[serde(default)]
    pub transaction_hash: Option<String>,
    /// Position of that transaction in the block.
    #[serde(default, deserialize_with = "opt_u64_quantity")]
    pub transaction_position: Option<u64>,
    /// Block number.
    #[serde(default, deserialize_with = "opt_u64_quantity")]
    pub block_number: Option<u64>,
}

/// The call part of a trace entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TraceAction {
    /// Caller.
    #[serde(default)]
    pub from: Option<String>,
    /// Callee.
    #[serde(default)]
    pub to: Option<String>,
    /// Gas allowance, hex.
    #[serde(default)]
    pub gas: Option<String>,
    /// Transferred wei, hex.
    #[serde(default)]
    pub value: Option<String>,
    /// Call input.
    #[serde(default)]
    pub input: Option<String>,
}

/// The result part of a trace entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TraceResult {
    /// Gas consumed, hex. Absent for failed calls.
    #[serde(default)]
    pub gas_used: Option<String>,
    /// Call output.
    #[serde(default)]
    pub output: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_block_with_transactions() {
        let json = r#"{
            "number": "0x10",
            "hash": "0xblock",
            "timestamp": "0x5f5e100",
            "transactions": [{
                "hash": "0xabc",
                "ethHash": "0xdef",
                "from": "one1pdv9lrdwl0rg5vglh4xtyrv3wjk3wsqket7zxy",
                "to": "",
                "value": "0x0",
                "gas": "0x5208",
                "gasPrice": "0x174876e800",
                "input": "0x",
                "nonce": "0x1",
                "transactionIndex": "0x0",
                "shardID": 0
            }]
        }"#;

        let block: ChainBlock = serde_json::from_str(json).unwrap();
        assert_eq!(block.number, 16);
        assert_eq!(block.timestamp, 100_000_000);
        assert_eq!(block.transactions.len(), 1);

        let tx = &block.transactions[0];
        assert_eq!(tx.eth_hash.as_deref(), Some("0xdef"));
        assert_eq!(tx.to.as_deref(), Some(""));
        assert_eq!(tx.gas, 21_000);
        assert_eq!(tx.gas_price, U256::from(100_000_000_000u64));
        assert_eq!(tx.transaction_index, Some(0));
    }

    #[test]
    fn test_deserialize_trace_without_result() {
        let json = r#"{
            "action": {"callType": "call", "from": "0x1", "to": "0x2", "gas": "0x10", "value": "0x0"},
            "blockNumber": 5,
            "transactionHash": "0xaaa",
            "transactionPosition": 0,
            "type": "call"
        }"#;

        let trace: ChainTrace = serde_json::from_str(json).unwrap();
        assert!(trace.result.is_none());
        assert_eq!(trace.block_number, Some(5));
        assert_eq!(trace.action.gas.as_deref(), Some("0x10"));
    }
}
