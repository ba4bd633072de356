//! Generic in-process TTL cache

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use time::OffsetDateTime;

use crate::ports::Clock;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// `None` when the TTL reaches past the representable date range
    expires_at: Option<OffsetDateTime>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

/// Key/value map whose entries expire a fixed duration after being set.
///
/// Expired entries are evicted lazily on `get` or explicitly via
/// [`TtlCache::purge_expired`].
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // A panic while holding the lock cannot leave a half-written entry
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Value for `key` if it has not expired yet
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at = time::Duration::try_from(ttl)
            .ok()
            .and_then(|ttl| self.clock.now().checked_add(ttl));
        self.lock()
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    pub fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    struct StepClock(Mutex<OffsetDateTime>);

    impl StepClock {
        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> OffsetDateTime {
            *self.0.lock().unwrap()
        }
    }

    fn fixture() -> (Arc<StepClock>, TtlCache<Vec<u32>>) {
        let clock = Arc::new(StepClock(Mutex::new(datetime!(2024-03-01 10:00 UTC))));
        let cache = TtlCache::new(clock.clone() as Arc<dyn Clock>);
        (clock, cache)
    }

    #[test]
    fn test_entry_present_before_expiry() {
        let (clock, cache) = fixture();
        cache.set("k", vec![1, 2], Duration::from_secs(60));

        clock.advance(Duration::from_secs(30));
        assert_eq!(cache.get("k"), Some(vec![1, 2]));
    }

    #[test]
    fn test_entry_evicted_after_expiry() {
        let (clock, cache) = fixture();
        cache.set("k", vec![1], Duration::from_secs(60));

        clock.advance(Duration::from_secs(61));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let (clock, cache) = fixture();
        cache.set("k", vec![1], Duration::from_secs(60));

        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_delete_and_purge() {
        let (clock, cache) = fixture();
        cache.set("a", vec![1], Duration::from_secs(10));
        cache.set("b", vec![2], Duration::from_secs(100));
        cache.set("c", vec![3], Duration::from_secs(100));

        cache.delete("c");
        clock.advance(Duration::from_secs(20));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b"), Some(vec![2]));
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let (clock, cache) = fixture();
        cache.set("k", vec![7], Duration::from_secs(400_000_000_000));
        cache.set("max", vec![8], Duration::MAX);

        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert_eq!(cache.get("k"), Some(vec![7]));
        assert_eq!(cache.get("max"), Some(vec![8]));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_set_overwrites() {
        let (_clock, cache) = fixture();
        cache.set("k", vec![1], Duration::from_secs(10));
        cache.set("k", vec![9], Duration::from_secs(10));
        assert_eq!(cache.get("k"), Some(vec![9]));
    }
}
