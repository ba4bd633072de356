//! Process-local item cache

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use harvester_domain::{CacheError, Clock, Item, ItemCache, TtlCache};

/// [`ItemCache`] over the domain's [`TtlCache`]; contents vanish with the
/// process
pub struct MemoryItemCache {
    entries: TtlCache<Vec<Item>>,
}

impl MemoryItemCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: TtlCache::new(clock),
        }
    }
}

#[async_trait]
impl ItemCache for MemoryItemCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<Item>>, CacheError> {
        Ok(self.entries.get(key))
    }

    async fn set(&self, key: &str, items: &[Item], ttl: Duration) -> Result<(), CacheError> {
        // Entries are otherwise only evicted when their own key is read
        let purged = self.entries.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Purged expired cache entries");
        }
        self.entries.set(key, items.to_vec(), ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.delete(key);
        Ok(())
    }
}
