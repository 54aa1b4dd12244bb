//! A set of helpers for testing

mod block;
mod chain;
mod directory;
mod http_client;
mod internal;
mod log;
mod provider;
mod transaction;

pub use block::BlockBuilder;
pub use chain::FakeChainClient;
pub use directory::{StaticCodeDirectory, StaticSignatureDirectory, build_assembler};
pub use http_client::lookup_test_client;
pub use internal::{InternalBuilder, TraceBuilder};
pub use log::{LogBuilder, event_topic, topic_for, word_data};
pub use provider::{MockedProvider, mock_rpc_source};
pub use transaction::TransactionBuilder;
