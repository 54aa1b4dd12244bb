//! The AddressFilter keeps only the transactions touching a subscribed
//! address.

use std::{collections::HashSet, sync::Arc, time::Duration};

use crate::{
    models::{Transaction, TransactionSet},
    persistence::{
        error::PersistenceError,
        traits::{CacheStore, CacheStoreExt, DocumentStore},
    },
};

/// Cache key of the subscribed address set.
pub const SUBSCRIBED_ADDRESSES_KEY: &str = "subscribed-addresses";

/// Intersects transaction exposure with the subscribed address set.
///
/// The set is served from the cache store and refreshed from the document
/// store on a miss.
pub struct AddressFilter {
    cache: Arc<dyn CacheStore>,
    documents: Arc<dyn DocumentStore>,
    environment: String,
    ttl: Duration,
}

impl AddressFilter {
    /// Creates a filter for `environment`, caching the subscription set for `ttl`.
    pub fn new(
        cache: Arc<dyn CacheStore>,
        documents: Arc<dyn DocumentStore>,
        environment: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self { cache, documents, environment: environment.into(), ttl }
    }

    /// The subscribed addresses, lowercased.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn subscribed(&self) -> Result<HashSet<String>, PersistenceError> {
        if let Some(cached) = self.cache.get_json::<Vec<String>>(SUBSCRIBED_ADDRESSES_KEY).await? {
            return Ok(cached.into_iter().collect());
        }

        let addresses: Vec<String> = self
            .documents
            .subscribed_addresses(&self.environment)
            .await?
            .into_iter()
            .map(|a| a.trim().to_lowercase())
            .collect();
        self.cache.set_json(SUBSCRIBED_ADDRESSES_KEY, &addresses, Some(self.ttl)).await?;
        tracing::debug!(count = addresses.len(), "Subscribed addresses refreshed.");
        Ok(addresses.into_iter().collect())
    }

    /// Returns the transactions of `set` whose address exposure intersects
    /// the subscribed set, in hash order.
    pub async fn filter(&self, set: TransactionSet) -> Result<Vec<Transaction>, PersistenceError> {
        let subscribed = self.subscribed().await?;
        Ok(matching(set, &subscribed))
    }
}

/// The transactions of `set` touching any of `subscribed`.
pub fn matching(set: TransactionSet, subscribed: &HashSet<String>) -> Vec<Transaction> {
    if subscribed.is_empty() {
        return Vec::new();
    }
    set.into_iter()
        .filter(|tx| tx.addresses.iter().any(|a| subscribed.contains(&a.to_lowercase())))
        .collect()
}
