//! SQLite-backed item cache, shared across processes on one host

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use harvester_domain::{CacheError, Clock, Item, ItemCache};
use sqlx::SqlitePool;

use crate::sqlite::{connect, connect_in_memory};

pub struct SqliteItemCache {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteItemCache {
    pub async fn new(db_path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let pool = connect(db_path.as_ref())
            .await
            .map_err(CacheError::Backend)?;

        let cache = Self { pool, clock };
        cache.run_migrations().await?;

        Ok(cache)
    }

    /// Create an in-memory cache (for testing)
    pub async fn in_memory(clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let pool = connect_in_memory().await.map_err(CacheError::Backend)?;

        let cache = Self { pool, clock };
        cache.run_migrations().await?;

        Ok(cache)
    }

    async fn run_migrations(&self) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?;

        Ok(())
    }

    /// Current time as unix milliseconds
    fn now_millis(&self) -> i64 {
        let nanos = self.clock.now().unix_timestamp_nanos() / 1_000_000;
        i64::try_from(nanos).unwrap_or(i64::MAX)
    }
}

#[async_trait]
impl ItemCache for SqliteItemCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<Item>>, CacheError> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT value, expires_at FROM cache_entries WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;

        match row {
            Some((value, expires_at)) if self.now_millis() < expires_at => {
                let items = serde_json::from_str(&value)
                    .map_err(|e| CacheError::Serialization(e.to_string()))?;
                Ok(Some(items))
            }
            Some(_) => {
                self.delete(key).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, items: &[Item], ttl: Duration) -> Result<(), CacheError> {
        let value =
            serde_json::to_string(items).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = self.now_millis().saturating_add(ttl_millis);

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_domain::{ItemDraft, ItemKind, SystemClock};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use time::OffsetDateTime;
    use time::macros::datetime;

    struct ManualClock(Mutex<OffsetDateTime>);

    impl Clock for ManualClock {
        fn now(&self) -> OffsetDateTime {
            *self.0.lock().unwrap()
        }
    }

    fn items() -> Vec<Item> {
        vec![
            ItemDraft::new(ItemKind::News, "A", "https://a.example").into_item(
                "test",
                1,
                datetime!(2024-01-01 00:00 UTC),
            ),
        ]
    }

    #[tokio::test]
    async fn test_get_before_and_after_expiry() {
        let clock = Arc::new(ManualClock(Mutex::new(datetime!(2024-01-01 00:00 UTC))));
        let cache = SqliteItemCache::in_memory(clock.clone()).await.unwrap();

        cache.set("k", &items(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(items()));

        *clock.0.lock().unwrap() = datetime!(2024-01-01 00:01 UTC);
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites_and_delete_removes() {
        let cache = SqliteItemCache::in_memory(Arc::new(SystemClock)).await.unwrap();

        cache.set("k", &[], Duration::from_secs(60)).await.unwrap();
        cache.set("k", &items(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().map(|i| i.len()), Some(1));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_shared_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");

        SqliteItemCache::new(&path, Arc::new(SystemClock))
            .await
            .unwrap()
            .set("k", &items(), Duration::from_secs(3600))
            .await
            .unwrap();

        let other = SqliteItemCache::new(&path, Arc::new(SystemClock)).await.unwrap();
        assert_eq!(other.get("k").await.unwrap(), Some(items()));
    }
}
