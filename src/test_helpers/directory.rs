//! In-memory signature and contract code directories.

use std::{collections::HashMap, sync::Arc};

use alloy::json_abi::JsonAbi;
use async_trait::async_trait;

use crate::{
    codec::AddressCodec,
    config::CacheTtlConfig,
    contract::{AbiSource, ContractCodeDirectory, ContractMetadataResolver},
    engine::assembler::TransactionAssembler,
    http_client::HttpLookupError,
    persistence::traits::CacheStore,
    providers::ChainClient,
    signature::{SignatureDirectory, SignatureResolver},
    ttl::FixedJitter,
};

/// A [`SignatureDirectory`] answering from a fixed table.
#[derive(Debug, Default, Clone)]
pub struct StaticSignatureDirectory {
    signatures: HashMap<String, String>,
}

impl StaticSignatureDirectory {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a selector and its text signature.
    pub fn with(mut self, selector: &str, signature: &str) -> Self {
        self.signatures.insert(selector.to_lowercase(), signature.to_string());
        self
    }
}

#[async_trait]
impl SignatureDirectory for StaticSignatureDirectory {
    async fn lookup(&self, selector: &str) -> Result<Option<String>, HttpLookupError> {
        Ok(self.signatures.get(selector).cloned())
    }
}

/// A [`ContractCodeDirectory`] answering from a fixed table.
#[derive(Debug, Default, Clone)]
pub struct StaticCodeDirectory {
    abis: HashMap<String, JsonAbi>,
}

impl StaticCodeDirectory {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the ABI published for `address`.
    pub fn with(mut self, address: &str, abi: JsonAbi) -> Self {
        self.abis.insert(address.to_lowercase(), abi);
        self
    }
}

#[async_trait]
impl ContractCodeDirectory for StaticCodeDirectory {
    async fn fetch_abi(&self, address: &str) -> Result<Option<JsonAbi>, HttpLookupError> {
        Ok(self.abis.get(&address.to_lowercase()).cloned())
    }
}

/// Wires a [`TransactionAssembler`] over the given chain and cache with
/// deterministic TTLs and the `one` address prefix.
pub fn build_assembler(
    chain: Arc<dyn ChainClient>,
    cache: Arc<dyn CacheStore>,
    signatures: StaticSignatureDirectory,
    code: StaticCodeDirectory,
) -> TransactionAssembler {
    let ttl = CacheTtlConfig::default();
    let jitter = Arc::new(FixedJitter(0.5));
    let signatures = Arc::new(
        SignatureResolver::new(cache.clone(), Arc::new(signatures), &ttl)
            .with_jitter(jitter.clone()),
    );
    let abi_source = Arc::new(
        AbiSource::new(cache.clone(), Arc::new(code), &ttl).with_jitter(jitter.clone()),
    );
    let contracts = Arc::new(
        ContractMetadataResolver::new(chain.clone(), cache.clone(), abi_source, &ttl)
            .with_jitter(jitter),
    );
    let codec = AddressCodec::new("one").expect("`one` is a valid prefix");
    TransactionAssembler::new(chain, cache, codec, signatures, contracts, "ONE")
}
