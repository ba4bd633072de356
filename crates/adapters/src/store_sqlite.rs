//! SQLite item store implementation

use std::path::Path;

use async_trait::async_trait;
use harvester_domain::{Item, ItemStore, StoreError};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::sqlite::{connect, connect_in_memory};

/// One row per item, keyed by the dedup key; insertion order is preserved
/// through the autoincrement sequence
pub struct SqliteItemStore {
    pool: SqlitePool,
}

impl SqliteItemStore {
    /// Open the database, creating it and its parent directory if needed
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let pool = connect(db_path.as_ref())
            .await
            .map_err(StoreError::Backend)?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = connect_in_memory().await.map_err(StoreError::Backend)?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                item_key TEXT NOT NULL UNIQUE,
                payload TEXT NOT NULL,
                stored_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn load(&self) -> Result<Vec<Item>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT payload FROM items ORDER BY seq")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter()
            .map(|(payload,)| {
                serde_json::from_str(&payload).map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .collect()
    }

    async fn append(&self, items: &[Item]) -> Result<Vec<Item>, StoreError> {
        let stored_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut added = 0;
        for item in items {
            let payload =
                serde_json::to_string(item).map_err(|e| StoreError::Serialization(e.to_string()))?;

            let result = sqlx::query(
                r#"
                INSERT INTO items (item_key, payload, stored_at)
                VALUES (?, ?, ?)
                ON CONFLICT(item_key) DO NOTHING
                "#,
            )
            .bind(item.dedup_key())
            .bind(payload)
            .bind(&stored_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

            added += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        tracing::debug!(added, "Appended to SQLite store");
        self.load().await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or_default())
    }
}
