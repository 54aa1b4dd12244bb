//! Chain data access: the `ChainClient` interface and its JSON-RPC
//! implementation.

pub mod rpc;
pub mod traits;

pub use rpc::{HarmonyRpcSource, ProviderError, create_provider};
pub use traits::{BLOCK_NOT_FOUND_CODE, ChainClient, DataSourceError};
#[cfg(test)]
pub use traits::MockChainClient;
