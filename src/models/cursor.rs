//! The persisted block cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The last block the orchestrator finished, the only state that survives a
/// restart.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockCursor {
    /// Last fully processed block.
    pub last_block_number: u64,
    /// When that block was processed.
    pub processed_at: DateTime<Utc>,
}

impl BlockCursor {
    /// A cursor for `block_number` stamped with the current time.
    pub fn now(block_number: u64) -> Self {
        Self { last_block_number: block_number, processed_at: Utc::now() }
    }

    /// The block to process after this one.
    pub fn next_block(&self) -> u64 {
        self.last_block_number.saturating_add(1)
    }
}
