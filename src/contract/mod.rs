//! Token contract metadata resolution.

mod abi_source;
mod directory;

use std::sync::Arc;

use alloy::{
    dyn_abi::{DynSolType, DynSolValue},
    primitives::{Bytes, U256},
};
pub use abi_source::AbiSource;
#[cfg(test)]
pub use directory::MockContractCodeDirectory;
pub use directory::{ContractCodeDirectory, ExplorerCodeDirectory};

use crate::{
    config::{CacheTtlConfig, TtlRange},
    models::Contract,
    persistence::traits::{CacheStore, CacheStoreExt},
    providers::ChainClient,
    ttl::{RandomJitter, TtlJitter, ttl_within},
};

/// `symbol()`
pub const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];
/// `decimals()`
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
/// `name()`
pub const NAME_SELECTOR: [u8; 4] = [0x06, 0xfd, 0xde, 0x03];

const BAD_CONTRACT_MARKER: &str = "0";

/// Resolves the symbol, decimals and name of token contracts by calling their
/// ERC-20 view functions, caching both answers and refusals.
pub struct ContractMetadataResolver {
    chain: Arc<dyn ChainClient>,
    cache: Arc<dyn CacheStore>,
    abi_source: Arc<AbiSource>,
    contract_ttl: TtlRange,
    bad_contract_ttl: TtlRange,
    jitter: Arc<dyn TtlJitter>,
}

impl ContractMetadataResolver {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        cache: Arc<dyn CacheStore>,
        abi_source: Arc<AbiSource>,
        ttl: &CacheTtlConfig,
    ) -> Self {
        Self {
            chain,
            cache,
            abi_source,
            contract_ttl: ttl.contract,
            bad_contract_ttl: ttl.bad_contract,
            jitter: Arc::new(RandomJitter),
        }
    }

    /// Replaces the TTL jitter source.
    pub fn with_jitter(mut self, jitter: Arc<dyn TtlJitter>) -> Self {
        self.jitter = jitter;
        self
    }

    /// The ABI source shared with the log decoder.
    pub fn abi_source(&self) -> Arc<AbiSource> {
        self.abi_source.clone()
    }

    /// Returns the token metadata of `address`, or `None` if the contract
    /// does not implement the ERC-20 metadata functions.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn resolve(&self, address: &str) -> Option<Contract> {
        let bad_key = format!("badcontract-{address}");
        let contract_key = format!("contract-{address}");

        match self.cache.get(&bad_key).await {
            Ok(Some(marker)) if marker == BAD_CONTRACT_MARKER => return None,
            Ok(_) => {}
            Err(e) => tracing::warn!(key = bad_key, error = %e, "Contract cache read failed."),
        }

        match self.cache.get_json::<Contract>(&contract_key).await {
            Ok(Some(contract)) => return Some(contract),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = contract_key, error = %e, "Contract cache read failed.")
            }
        }

        let Some(contract) = self.query_contract(address).await else {
            let ttl = ttl_within(self.bad_contract_ttl, self.jitter.as_ref());
            if let Err(e) = self.cache.set(&bad_key, BAD_CONTRACT_MARKER, Some(ttl)).await {
                tracing::warn!(address, error = %e, "Contract cache write failed.");
            }
            return None;
        };

        let ttl = ttl_within(self.contract_ttl, self.jitter.as_ref());
        if let Err(e) = self.cache.set_json(&contract_key, &contract, Some(ttl)).await {
            tracing::warn!(address, error = %e, "Contract cache write failed.");
        }
        Some(contract)
    }

    async fn query_contract(&self, address: &str) -> Option<Contract> {
        let symbol = self.call_string(address, SYMBOL_SELECTOR).await?;
        let decimals = self.call_decimals(address).await?;
        let name = self.call_string(address, NAME_SELECTOR).await?;
        Some(Contract { address: address.to_string(), symbol, decimals, name })
    }

    async fn call(&self, address: &str, selector: [u8; 4], ty: &DynSolType) -> Option<DynSolValue> {
        let output = match self.chain.call(address, Bytes::copy_from_slice(&selector)).await {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(address, error = %e, "Contract metadata call failed.");
                return None;
            }
        };
        match ty.abi_decode(&output) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(address, error = %e, "Contract metadata output did not decode.");
                None
            }
        }
    }

    async fn call_string(&self, address: &str, selector: [u8; 4]) -> Option<String> {
        let value = self.call(address, selector, &DynSolType::String).await?;
        value.as_str().map(str::to_string)
    }

    async fn call_decimals(&self, address: &str) -> Option<u8> {
        let value = self.call(address, DECIMALS_SELECTOR, &DynSolType::Uint(256)).await?;
        let (decimals, _) = value.as_uint()?;
        (decimals <= U256::from(u8::MAX)).then(|| decimals.to::<u8>())
    }
}
