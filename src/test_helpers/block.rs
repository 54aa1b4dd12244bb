//! A builder for creating `ChainBlock` instances for testing.

use crate::models::{ChainBlock, ChainTransaction};

/// A builder for creating `ChainBlock` instances for testing.
#[derive(Debug, Clone, Default)]
pub struct BlockBuilder {
    block: ChainBlock,
}

impl BlockBuilder {
    /// Creates a new `BlockBuilder` for block `number`.
    pub fn new(number: u64) -> Self {
        Self {
            block: ChainBlock {
                number,
                hash: Some(format!("0x{number:064x}")),
                timestamp: 1_700_000_000 + number,
                transactions: Vec::new(),
            },
        }
    }

    /// Sets the block timestamp.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.block.timestamp = timestamp;
        self
    }

    /// Adds a transaction to the block.
    pub fn transaction(mut self, tx: ChainTransaction) -> Self {
        self.block.transactions.push(tx);
        self
    }

    /// Builds the `ChainBlock`.
    pub fn build(self) -> ChainBlock {
        self.block
    }
}
