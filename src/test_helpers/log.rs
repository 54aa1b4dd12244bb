//! A builder for creating `Log` instances for testing.

use alloy::{
    dyn_abi::DynSolValue,
    hex,
    primitives::{Address, U256, keccak256},
};

use crate::models::Log;

/// A builder for creating `Log` instances for testing.
#[derive(Debug, Clone)]
pub struct LogBuilder {
    log: Log,
}

impl LogBuilder {
    /// Creates a new `LogBuilder` for a log emitted by `transaction_hash`.
    pub fn new(transaction_hash: &str) -> Self {
        Self {
            log: Log {
                address: "0x0000000000000000000000000000000000000001".into(),
                data: "0x".into(),
                transaction_hash: transaction_hash.to_string(),
                ..Default::default()
            },
        }
    }

    /// Sets the address of the contract that emitted the log.
    pub fn address(mut self, address: &str) -> Self {
        self.log.address = address.to_string();
        self
    }

    /// Adds a topic to the log.
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.log.topics.push(topic.into());
        self
    }

    /// Sets the data of the log.
    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.log.data = data.into();
        self
    }

    /// Sets the block number.
    pub fn block_number(mut self, block_number: u64) -> Self {
        self.log.block_number = block_number;
        self
    }

    /// Sets the log index.
    pub fn log_index(mut self, log_index: u64) -> Self {
        self.log.log_index = Some(log_index);
        self
    }

    /// Makes this an ERC-20 `Transfer` event.
    pub fn transfer(self, from: &str, to: &str, value: U256) -> Self {
        self.topic(event_topic("Transfer(address,address,uint256)"))
            .topic(topic_for(from))
            .topic(topic_for(to))
            .data(word_data(value))
    }

    /// Builds the `Log`.
    pub fn build(self) -> Log {
        self.log
    }
}

/// The topic of an event signature, e.g. `Transfer(address,address,uint256)`.
pub fn event_topic(signature: &str) -> String {
    hex::encode_prefixed(keccak256(signature))
}

/// A hex address left padded to a 32-byte topic. Unparseable input maps to
/// the zero address.
pub fn topic_for(address: &str) -> String {
    let address: Address = address.parse().unwrap_or_default();
    hex::encode_prefixed(address.into_word())
}

/// A single ABI-encoded `uint256` word.
pub fn word_data(value: U256) -> String {
    hex::encode_prefixed(DynSolValue::Uint(value, 256).abi_encode())
}
