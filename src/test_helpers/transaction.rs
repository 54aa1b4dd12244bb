//! A builder for creating `ChainTransaction` instances for testing.

use alloy::primitives::U256;

use crate::models::ChainTransaction;

/// A builder for creating `ChainTransaction` instances for testing.
///
/// Defaults to a plain zero-value transfer between two fixed hex addresses
/// with no input.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    tx: ChainTransaction,
}

impl TransactionBuilder {
    /// Creates a new `TransactionBuilder` with the given canonical hash.
    pub fn new(hash: &str) -> Self {
        Self {
            tx: ChainTransaction {
                hash: hash.to_string(),
                from: Some("0x1111111111111111111111111111111111111111".into()),
                to: Some("0x2222222222222222222222222222222222222222".into()),
                gas: 21_000,
                gas_price: U256::from(1_000_000_000u64),
                input: Some("0x".into()),
                ..Default::default()
            },
        }
    }

    /// Sets the alternate hash.
    pub fn eth_hash(mut self, eth_hash: &str) -> Self {
        self.tx.eth_hash = Some(eth_hash.to_string());
        self
    }

    /// Sets the sender. An empty string leaves it unset.
    pub fn from(mut self, from: &str) -> Self {
        self.tx.from = (!from.is_empty()).then(|| from.to_string());
        self
    }

    /// Sets the recipient. An empty string leaves it unset.
    pub fn to(mut self, to: &str) -> Self {
        self.tx.to = (!to.is_empty()).then(|| to.to_string());
        self
    }

    /// Sets the value.
    pub fn value(mut self, value: U256) -> Self {
        self.tx.value = value;
        self
    }

    /// Sets the gas limit and price.
    pub fn gas(mut self, gas: u64, gas_price: U256) -> Self {
        self.tx.gas = gas;
        self.tx.gas_price = gas_price;
        self
    }

    /// Sets the input.
    pub fn input(mut self, input: &str) -> Self {
        self.tx.input = Some(input.to_string());
        self
    }

    /// Sets the transaction index.
    pub fn transaction_index(mut self, index: u64) -> Self {
        self.tx.transaction_index = Some(index);
        self
    }

    /// Builds the `ChainTransaction`.
    pub fn build(self) -> ChainTransaction {
        self.tx
    }
}
