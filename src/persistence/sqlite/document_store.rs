//! Implementation of the DocumentStore trait for SqliteStore

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::{
    models::{BlockCursor, Transaction},
    persistence::{error::PersistenceError, sqlite::SqliteStore, traits::DocumentStore},
};

#[async_trait]
impl DocumentStore for SqliteStore {
    #[tracing::instrument(skip(self, transactions), fields(count = transactions.len()), level = "debug")]
    async fn upsert_transactions(
        &self,
        environment: &str,
        transactions: &[Transaction],
    ) -> Result<(), PersistenceError> {
        if transactions.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .execute_query_with_error_handling("begin transaction", self.pool.begin())
            .await?;

        for transaction in transactions {
            let document = serde_json::to_string(transaction)?;
            self.execute_query_with_error_handling(
                "upsert transaction",
                sqlx::query(
                    "INSERT INTO transactions (environment, hash, block_number, document) \
                     VALUES (?, ?, ?, ?) \
                     ON CONFLICT(environment, hash) DO UPDATE SET \
                     block_number = excluded.block_number, document = excluded.document, \
                     updated_at = CURRENT_TIMESTAMP",
                )
                .bind(environment)
                .bind(&transaction.hash)
                .bind(transaction.block_number as i64)
                .bind(document)
                .execute(&mut *tx),
            )
            .await?;
        }

        self.execute_query_with_error_handling("commit transaction", tx.commit()).await?;
        tracing::debug!(environment, count = transactions.len(), "Transactions upserted.");
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_transaction(
        &self,
        environment: &str,
        hash: &str,
    ) -> Result<Option<Transaction>, PersistenceError> {
        let row = self
            .execute_query_with_error_handling(
                "get transaction",
                sqlx::query("SELECT document FROM transactions WHERE environment = ? AND hash = ?")
                    .bind(environment)
                    .bind(hash)
                    .fetch_optional(&self.pool),
            )
            .await?;

        match row {
            Some(row) => {
                let document: String = row.get("document");
                Ok(Some(serde_json::from_str(&document)?))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_cursor(&self, environment: &str) -> Result<Option<BlockCursor>, PersistenceError> {
        let row = self
            .execute_query_with_error_handling(
                "get block cursor",
                sqlx::query(
                    "SELECT last_block_number, processed_at FROM block_cursor WHERE environment = ?",
                )
                .bind(environment)
                .fetch_optional(&self.pool),
            )
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let last_block_number: i64 = row.get("last_block_number");
        let processed_at: String = row.get("processed_at");
        let processed_at = DateTime::parse_from_rfc3339(&processed_at)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?
            .with_timezone(&Utc);

        Ok(Some(BlockCursor { last_block_number: last_block_number as u64, processed_at }))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn set_cursor(
        &self,
        environment: &str,
        cursor: &BlockCursor,
    ) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "set block cursor",
            sqlx::query(
                "INSERT INTO block_cursor (environment, last_block_number, processed_at) \
                 VALUES (?, ?, ?) \
                 ON CONFLICT(environment) DO UPDATE SET \
                 last_block_number = excluded.last_block_number, \
                 processed_at = excluded.processed_at",
            )
            .bind(environment)
            .bind(cursor.last_block_number as i64)
            .bind(cursor.processed_at.to_rfc3339())
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn subscribed_addresses(
        &self,
        environment: &str,
    ) -> Result<Vec<String>, PersistenceError> {
        let rows = self
            .execute_query_with_error_handling(
                "list subscribed addresses",
                sqlx::query(
                    "SELECT address FROM subscribed_addresses WHERE environment = ? ORDER BY address",
                )
                .bind(environment)
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows.into_iter().map(|r| r.get::<String, _>("address")).collect())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn add_subscribed_address(
        &self,
        environment: &str,
        address: &str,
    ) -> Result<(), PersistenceError> {
        if address.trim().is_empty() {
            return Err(PersistenceError::InvalidInput("address must not be empty".into()));
        }

        self.execute_query_with_error_handling(
            "add subscribed address",
            sqlx::query(
                "INSERT OR IGNORE INTO subscribed_addresses (environment, address) VALUES (?, ?)",
            )
            .bind(environment)
            .bind(address.trim().to_lowercase())
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn remove_subscribed_address(
        &self,
        environment: &str,
        address: &str,
    ) -> Result<bool, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "remove subscribed address",
                sqlx::query("DELETE FROM subscribed_addresses WHERE environment = ? AND address = ?")
                    .bind(environment)
                    .bind(address.trim().to_lowercase())
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
