//! Fallback resolver - the read entry point that never fails
//!
//! Resolution order: cache, durable store, one live harvest pass, stale store
//! contents, then the bundled curated dataset.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::fallback::fallback_items;
use crate::model::Item;
use crate::ports::{Clock, ItemCache, ItemStore};
use crate::usecases::dedup::sort_for_presentation;
use crate::usecases::harvest::Harvester;

/// Cache key under which the resolved list is kept
pub const DEFAULT_CACHE_KEY: &str = "items:all";

/// Configuration for the fallback resolver
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub cache_key: String,
    pub cache_ttl: Duration,
    /// Minimum stored items for the store to answer without a live harvest
    pub min_store_items: usize,
    /// Newest stored item must have been checked within this window
    pub max_store_age: Option<Duration>,
    /// Start the harvest loop in the background when answering from the store
    pub background_harvest: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            cache_ttl: Duration::from_secs(3600),
            min_store_items: 1,
            max_store_age: None,
            background_harvest: true,
        }
    }
}

/// Which step of the chain produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedFrom {
    Cache,
    Store,
    Harvest,
    StaleStore,
    Static,
}

impl ResolvedFrom {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvedFrom::Cache => "cache",
            ResolvedFrom::Store => "store",
            ResolvedFrom::Harvest => "harvest",
            ResolvedFrom::StaleStore => "stale_store",
            ResolvedFrom::Static => "static",
        }
    }

    /// Whether the answer came from a fallback step
    pub fn is_degraded(&self) -> bool {
        matches!(self, ResolvedFrom::StaleStore | ResolvedFrom::Static)
    }
}

/// Items in presentation order plus where they came from
#[derive(Debug, Clone)]
pub struct Resolution {
    pub items: Vec<Item>,
    pub origin: ResolvedFrom,
}

pub struct FallbackResolver {
    cache: Arc<dyn ItemCache>,
    store: Arc<dyn ItemStore>,
    harvester: Arc<Harvester>,
    clock: Arc<dyn Clock>,
    fallback: Vec<Item>,
    config: ResolverConfig,
    shutdown: CancellationToken,
    /// Held for the duration of a synchronous harvest pass
    harvest_gate: Mutex<()>,
}

impl FallbackResolver {
    pub fn new(
        cache: Arc<dyn ItemCache>,
        store: Arc<dyn ItemStore>,
        harvester: Arc<Harvester>,
        clock: Arc<dyn Clock>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            cache,
            store,
            harvester,
            clock,
            fallback: fallback_items(),
            config,
            shutdown: CancellationToken::new(),
            harvest_gate: Mutex::new(()),
        }
    }

    /// Token cancelled at process shutdown, used to stop the background loop
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// All items, never empty
    pub async fn fetch_all(&self) -> Vec<Item> {
        self.resolve().await.items
    }

    /// Walk the fallback chain
    pub async fn resolve(&self) -> Resolution {
        if let Some(items) = self.cached().await {
            return finish(items, ResolvedFrom::Cache);
        }

        let stored = self.load_store().await;
        if self.store_is_usable(&stored) {
            if self.config.background_harvest {
                if let Some(_handle) = self.harvester.spawn(self.shutdown.child_token()) {
                    tracing::info!("Started background harvest loop");
                }
            }
            return finish(stored, ResolvedFrom::Store);
        }

        self.harvest_with_fallback(stored, true).await
    }

    /// Drop the cached list and resolve through a live harvest pass
    pub async fn refresh(&self) -> Resolution {
        if let Err(e) = self.cache.delete(&self.config.cache_key).await {
            tracing::warn!(error = %e, "Failed to invalidate cache");
        }
        let stored = self.load_store().await;
        self.harvest_with_fallback(stored, false).await
    }

    async fn cached(&self) -> Option<Vec<Item>> {
        match self.cache.get(&self.config.cache_key).await {
            Ok(Some(items)) if !items.is_empty() => Some(items),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn load_store(&self) -> Vec<Item> {
        match self.store.load().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "Store read failed");
                vec![]
            }
        }
    }

    fn store_is_usable(&self, stored: &[Item]) -> bool {
        if stored.is_empty() || stored.len() < self.config.min_store_items {
            return false;
        }

        let Some(max_age) = self.config.max_store_age else {
            return true;
        };

        let now = self.clock.now();
        stored
            .iter()
            .filter_map(Item::freshness)
            .max()
            .is_some_and(|newest| now - newest <= max_age)
    }

    /// One live pass at a time; with `reuse_cached`, callers that waited on
    /// the gate take the result the previous holder cached
    async fn harvest_with_fallback(&self, stored: Vec<Item>, reuse_cached: bool) -> Resolution {
        let _gate = self.harvest_gate.lock().await;
        if reuse_cached {
            if let Some(items) = self.cached().await {
                tracing::debug!("Harvest finished while waiting, using cached result");
                return finish(items, ResolvedFrom::Cache);
            }
        }

        let pass = self.harvester.harvest_once().await;

        if !pass.items.is_empty() {
            let items = pass.stored.unwrap_or(pass.items);
            if let Err(e) = self
                .cache
                .set(&self.config.cache_key, &items, self.config.cache_ttl)
                .await
            {
                tracing::warn!(error = %e, "Cache write failed");
            }
            return finish(items, ResolvedFrom::Harvest);
        }

        if !stored.is_empty() {
            tracing::warn!(count = stored.len(), "Harvest empty, serving stale store");
            return finish(stored, ResolvedFrom::StaleStore);
        }

        tracing::warn!("Harvest empty and store empty, serving curated dataset");
        finish(self.fallback.clone(), ResolvedFrom::Static)
    }
}

fn finish(mut items: Vec<Item>, origin: ResolvedFrom) -> Resolution {
    sort_for_presentation(&mut items);
    tracing::info!(origin = origin.as_str(), count = items.len(), "Resolved items");
    Resolution { items, origin }
}
