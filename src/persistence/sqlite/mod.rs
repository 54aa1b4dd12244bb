//! This module provides a concrete implementation of the cache and document
//! stores using SQLite.

use std::str::FromStr;

use sqlx::{SqlitePool, sqlite::SqliteConnectOptions};

mod cache_store;
mod document_store;

use crate::persistence::error::PersistenceError;

/// A SQLite backed implementation of both [`CacheStore`] and
/// [`DocumentStore`].
///
/// [`CacheStore`]: crate::persistence::traits::CacheStore
/// [`DocumentStore`]: crate::persistence::traits::DocumentStore
pub struct SqliteStore {
    /// The SQLite connection pool used for database operations.
    pool: SqlitePool,
}

impl SqliteStore {
    /// Creates a new instance of SqliteStore with the provided database URL.
    /// This will create the database file if it does not exist.
    #[tracing::instrument(level = "info")]
    pub async fn new(database_url: &str) -> Result<Self, PersistenceError> {
        tracing::debug!(database_url, "Attempting to connect to SQLite database.");
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| PersistenceError::InvalidInput(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            PersistenceError::Connection(e.to_string())
        })?;
        tracing::info!(database_url, "Successfully connected to SQLite database.");
        Ok(Self { pool })
    }

    /// Runs database migrations.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn run_migrations(&self) -> Result<(), PersistenceError> {
        tracing::debug!("Running database migrations.");
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run database migrations.");
            PersistenceError::Migration(e.to_string())
        })?;
        tracing::info!("Database migrations completed successfully.");
        Ok(())
    }

    /// Removes cache entries whose expiry has passed, returning how many were
    /// dropped.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn purge_expired(&self) -> Result<u64, PersistenceError> {
        let now = chrono::Utc::now().timestamp_millis();
        let result = self
            .execute_query_with_error_handling(
                "purge expired cache entries",
                sqlx::query(
                    "DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?",
                )
                .bind(now)
                .execute(&self.pool),
            )
            .await?;
        let purged = result.rows_affected();
        if purged > 0 {
            tracing::debug!(purged, "Purged expired cache entries.");
        }
        Ok(purged)
    }

    /// Closes the connection pool gracefully.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn close(&self) {
        tracing::debug!("Closing SQLite connection pool.");
        self.pool.close().await;
        tracing::info!("SQLite connection pool closed successfully.");
    }

    /// Helper to execute database queries with consistent error handling
    async fn execute_query_with_error_handling<F, T, E>(
        &self,
        operation: &str,
        query_fn: F,
    ) -> Result<T, PersistenceError>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        query_fn.await.map_err(|e| {
            tracing::error!(error = %e, operation = %operation, "Database operation failed.");
            PersistenceError::OperationFailed(e.to_string())
        })
    }
}

#[cfg(test)]
pub(crate) async fn setup_test_db() -> SqliteStore {
    let store =
        SqliteStore::new("sqlite::memory:").await.expect("Failed to connect to in-memory db");
    store.run_migrations().await.expect("Failed to run migrations");
    store
}
