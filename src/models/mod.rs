//! This module contains the data models for blockassist.

pub mod chain;
pub mod contract;
pub mod cursor;
pub mod log;
pub mod serde_helpers;
pub mod transaction;
pub mod transaction_set;
pub mod units;

pub use chain::{ChainBlock, ChainTrace, ChainTransaction, TraceAction, TraceResult};
pub use contract::Contract;
pub use cursor::BlockCursor;
pub use log::{EventLog, EventParam, Log, LogSummary};
pub use transaction::{INTERNAL_FUNCTION_NAME, InternalTransaction, Transaction};
pub use transaction_set::TransactionSet;
