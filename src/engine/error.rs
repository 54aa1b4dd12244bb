//! Error taxonomy of the block pipeline.

use thiserror::Error;

use crate::{persistence::error::PersistenceError, providers::DataSourceError};

/// Why processing a block did not complete.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The chain returned no data for a block or its logs.
    #[error("No transaction data: {0}")]
    NullTransactions(String),

    /// The requested block has not been produced yet.
    #[error("Block {0} is not available yet")]
    WaitForBlock(u64),

    /// The chain answered with an explicit error.
    #[error("Chain error: {0}")]
    ChainResponse(String),

    /// A store rejected a read or write.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl PipelineError {
    /// Classifies a failed log fetch. Only the block fetch may signal that a
    /// block is not produced yet, so here "not found" is a chain error.
    pub fn from_logs_fetch(error: DataSourceError) -> Self {
        match error {
            DataSourceError::BlockNotFound(_) => Self::ChainResponse(error.to_string()),
            other => other.into(),
        }
    }

    /// Whether this is the expected "try again later" condition rather than
    /// a fault.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::WaitForBlock(_))
    }
}

impl From<DataSourceError> for PipelineError {
    fn from(error: DataSourceError) -> Self {
        match error {
            DataSourceError::BlockNotFound(number) => Self::WaitForBlock(number),
            DataSourceError::Transport(_) | DataSourceError::EmptyResponse(_) => {
                Self::NullTransactions(error.to_string())
            }
            DataSourceError::Response { .. } | DataSourceError::Malformed(_) => {
                Self::ChainResponse(error.to_string())
            }
        }
    }
}
