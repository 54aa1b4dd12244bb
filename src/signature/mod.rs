//! Resolution of call selectors to function signatures, with positive and
//! negative caching in the cache store.

mod directory;

use std::{sync::Arc, time::Duration};

pub use directory::{FourByteDirectory, SignatureDirectory};
#[cfg(test)]
pub use directory::MockSignatureDirectory;

use crate::{
    config::{CacheTtlConfig, TtlRange},
    persistence::traits::CacheStore,
    ttl::{RandomJitter, TtlJitter, ttl_within},
};

/// Cached in place of a signature the directory does not know.
pub const ABSENT_SIGNATURE: &str = "NULL SIG";

const SELECTOR_LEN: usize = 10;

/// Resolves the function signature of call input data.
pub struct SignatureResolver {
    cache: Arc<dyn CacheStore>,
    directory: Arc<dyn SignatureDirectory>,
    found_ttl: TtlRange,
    absent_ttl: Duration,
    jitter: Arc<dyn TtlJitter>,
}

impl SignatureResolver {
    /// Creates a resolver using randomized expiry for found signatures.
    pub fn new(
        cache: Arc<dyn CacheStore>,
        directory: Arc<dyn SignatureDirectory>,
        ttl: &CacheTtlConfig,
    ) -> Self {
        Self {
            cache,
            directory,
            found_ttl: ttl.signature,
            absent_ttl: ttl.signature_absent_secs,
            jitter: Arc::new(RandomJitter),
        }
    }

    /// Replaces the TTL jitter source.
    pub fn with_jitter(mut self, jitter: Arc<dyn TtlJitter>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the signature for the selector at the start of `input`.
    ///
    /// Empty input and bare `0x` resolve to `None` without any lookup.
    /// Directory failures also resolve to `None` and are not cached.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn resolve(&self, input: Option<&str>) -> Option<String> {
        let input = input?.trim();
        if input.is_empty() || input == "0x" {
            return None;
        }

        let selector = input.get(..SELECTOR_LEN).unwrap_or(input).to_lowercase();
        let key = format!("signature-{selector}");

        match self.cache.get(&key).await {
            Ok(Some(cached)) if cached == ABSENT_SIGNATURE => return None,
            Ok(Some(cached)) => return Some(cached),
            Ok(None) => {}
            Err(e) => tracing::warn!(key, error = %e, "Signature cache read failed."),
        }

        let (value, ttl) = match self.directory.lookup(&selector).await {
            Ok(Some(signature)) => {
                let ttl = ttl_within(self.found_ttl, self.jitter.as_ref());
                (signature, ttl)
            }
            Ok(None) => (ABSENT_SIGNATURE.to_string(), self.absent_ttl),
            Err(e) => {
                tracing::warn!(selector, error = %e, "Signature lookup failed.");
                return None;
            }
        };

        if let Err(e) = self.cache.set(&key, &value, Some(ttl)).await {
            tracing::warn!(key, error = %e, "Signature cache write failed.");
        }

        (value != ABSENT_SIGNATURE).then_some(value)
    }
}
