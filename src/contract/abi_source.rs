//! Cache-fronted access to contract ABIs.

use std::sync::Arc;

use alloy::json_abi::JsonAbi;

use super::directory::ContractCodeDirectory;
use crate::{
    config::{CacheTtlConfig, TtlRange},
    persistence::traits::{CacheStore, CacheStoreExt},
    ttl::{RandomJitter, TtlJitter, ttl_within},
};

const ABSENT_MARKER: &str = "0";

/// Serves contract ABIs from the cache store, falling back to the contract
/// code directory. Contracts without a published ABI are remembered for a
/// short while so the directory is not asked again on every log.
pub struct AbiSource {
    cache: Arc<dyn CacheStore>,
    directory: Arc<dyn ContractCodeDirectory>,
    found_ttl: TtlRange,
    absent_ttl: TtlRange,
    jitter: Arc<dyn TtlJitter>,
}

impl AbiSource {
    /// Creates a source backed by `cache` and `directory`, with random TTL jitter.
    pub fn new(
        cache: Arc<dyn CacheStore>,
        directory: Arc<dyn ContractCodeDirectory>,
        ttl: &CacheTtlConfig,
    ) -> Self {
        Self {
            cache,
            directory,
            found_ttl: ttl.abi,
            absent_ttl: ttl.abi_absent,
            jitter: Arc::new(RandomJitter),
        }
    }

    /// Replaces the TTL jitter source.
    pub fn with_jitter(mut self, jitter: Arc<dyn TtlJitter>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the ABI of `address`, if one is published.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn abi_for(&self, address: &str) -> Option<JsonAbi> {
        let abi_key = format!("abi-{address}");
        let absent_key = format!("absent-abi-{address}");

        match self.cache.get_json::<JsonAbi>(&abi_key).await {
            Ok(Some(abi)) => return Some(abi),
            Ok(None) => {}
            Err(e) => tracing::warn!(key = abi_key, error = %e, "ABI cache read failed."),
        }

        match self.cache.get(&absent_key).await {
            Ok(Some(_)) => return None,
            Ok(None) => {}
            Err(e) => tracing::warn!(key = absent_key, error = %e, "ABI cache read failed."),
        }

        let abi = match self.directory.fetch_abi(address).await {
            Ok(abi) => abi,
            Err(e) => {
                tracing::warn!(address, error = %e, "ABI lookup failed.");
                return None;
            }
        };

        let written = match &abi {
            Some(abi) => {
                let ttl = ttl_within(self.found_ttl, self.jitter.as_ref());
                self.cache.set_json(&abi_key, abi, Some(ttl)).await
            }
            None => {
                let ttl = ttl_within(self.absent_ttl, self.jitter.as_ref());
                self.cache.set(&absent_key, ABSENT_MARKER, Some(ttl)).await
            }
        };
        if let Err(e) = written {
            tracing::warn!(address, error = %e, "ABI cache write failed.");
        }

        abi
    }
}
