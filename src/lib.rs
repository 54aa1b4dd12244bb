#![warn(missing_docs)]
//! blockassist watches a Harmony chain, reconciles every block's top-level
//! transactions, event logs and internal transactions into one transaction
//! set, and stores the transactions touching a subscribed address.

pub mod abi;
pub mod cmd;
pub mod codec;
pub mod config;
pub mod contract;
pub mod engine;
pub mod http_client;
pub mod models;
pub mod persistence;
pub mod providers;
pub mod signature;
pub mod supervisor;
pub mod test_helpers;
pub mod ttl;
