//! This module defines the interface for fetching data from the chain.

use alloy::primitives::Bytes;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::models::{ChainBlock, ChainTrace, Log};

/// RPC error code the chain uses when a requested block does not exist yet.
pub const BLOCK_NOT_FOUND_CODE: i64 = -32000;

/// Custom error type for data source operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response carried a `null` result.
    #[error("Empty response to {0}")]
    EmptyResponse(&'static str),

    /// The chain reported that the requested block does not exist yet.
    #[error("Block not found: {0}")]
    BlockNotFound(u64),

    /// The chain answered with an error payload.
    #[error("RPC error {code}: {message}")]
    Response {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// The result could not be decoded into the expected shape.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// A source of block, log and trace data for a single chain.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Returns the chain head block number.
    async fn block_number(&self) -> Result<u64, DataSourceError>;

    /// Fetches a block with its transactions inlined.
    async fn block_with_transactions(&self, number: u64) -> Result<ChainBlock, DataSourceError>;

    /// Fetches every log emitted in exactly this block.
    async fn logs(&self, number: u64) -> Result<Vec<Log>, DataSourceError>;

    /// Fetches the call traces of a block.
    async fn trace_block(&self, number: u64) -> Result<Vec<ChainTrace>, DataSourceError>;

    /// Executes a read-only call against the latest state.
    async fn call(&self, to: &str, data: Bytes) -> Result<Bytes, DataSourceError>;
}
