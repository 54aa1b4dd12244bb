//! Interfaces of the two stores the pipeline talks to: a key/value cache with
//! per-key expiry and a durable document store.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Serialize, de::DeserializeOwned};

use super::error::PersistenceError;
use crate::models::{BlockCursor, Transaction};

/// A key/value store with optional per-key expiry.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the value stored under `key`, unless it is missing or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Stores `value` under `key`. `None` means the entry never expires.
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), PersistenceError>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), PersistenceError>;

    /// Lists the live keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, PersistenceError>;
}

/// JSON helpers on top of [`CacheStore`].
#[async_trait]
pub trait CacheStoreExt: CacheStore {
    /// Reads and deserializes a JSON value.
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>, PersistenceError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serializes and writes a JSON value.
    async fn set_json<T>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), PersistenceError>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, ttl).await
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}

/// Durable storage for matched transactions, the block cursor and the
/// subscription list, each scoped by environment name.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts or replaces transactions keyed by canonical hash, atomically.
    async fn upsert_transactions(
        &self,
        environment: &str,
        transactions: &[Transaction],
    ) -> Result<(), PersistenceError>;

    /// Reads a stored transaction.
    async fn get_transaction(
        &self,
        environment: &str,
        hash: &str,
    ) -> Result<Option<Transaction>, PersistenceError>;

    /// Reads the block cursor.
    async fn get_cursor(&self, environment: &str) -> Result<Option<BlockCursor>, PersistenceError>;

    /// Writes the block cursor.
    async fn set_cursor(
        &self,
        environment: &str,
        cursor: &BlockCursor,
    ) -> Result<(), PersistenceError>;

    /// Lists the watched addresses.
    async fn subscribed_addresses(&self, environment: &str)
    -> Result<Vec<String>, PersistenceError>;

    /// Adds a watched address. Adding an existing address is a no-op.
    async fn add_subscribed_address(
        &self,
        environment: &str,
        address: &str,
    ) -> Result<(), PersistenceError>;

    /// Removes a watched address, returning whether it was present.
    async fn remove_subscribed_address(
        &self,
        environment: &str,
        address: &str,
    ) -> Result<bool, PersistenceError>;
}
