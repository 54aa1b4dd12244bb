//! Implementation of the CacheStore trait for SqliteStore

use std::time::Duration;

use async_trait::async_trait;
use sqlx::Row;

use crate::persistence::{error::PersistenceError, sqlite::SqliteStore, traits::CacheStore};

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Escapes `LIKE` wildcards so the prefix matches literally.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl CacheStore for SqliteStore {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let row = self
            .execute_query_with_error_handling(
                "get cache entry",
                sqlx::query(
                    "SELECT value FROM cache_entries \
                     WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
                )
                .bind(key)
                .bind(now_ms())
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    #[tracing::instrument(skip(self, value), level = "debug")]
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), PersistenceError> {
        let expires_at = ttl.map(|ttl| now_ms().saturating_add(ttl.as_millis() as i64));

        self.execute_query_with_error_handling(
            "set cache entry",
            sqlx::query(
                "INSERT INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            )
            .bind(key)
            .bind(value)
            .bind(expires_at)
            .execute(&self.pool),
        )
        .await?;

        tracing::debug!(key, ?ttl, "Cache entry written.");
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "delete cache entry",
            sqlx::query("DELETE FROM cache_entries WHERE key = ?").bind(key).execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, PersistenceError> {
        let rows = self
            .execute_query_with_error_handling(
                "scan cache keys",
                sqlx::query(
                    "SELECT key FROM cache_entries \
                     WHERE key LIKE ? ESCAPE '\\' AND (expires_at IS NULL OR expires_at > ?) \
                     ORDER BY key",
                )
                .bind(like_prefix(prefix))
                .bind(now_ms())
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows.into_iter().map(|r| r.get::<String, _>("key")).collect())
    }
}
