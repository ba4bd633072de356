//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{Item, SourceQuery};

/// Error type for source adapter calls
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Rate limited, retry after: {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },
    #[error("Request timed out")]
    Timeout,
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Client error {status}: {message}")]
    Client { status: u16, message: String },
    #[error("Invalid payload: {0}")]
    Parse(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SourceError {
    /// Whether a backoff-and-retry can reasonably succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::Timeout | SourceError::Server { .. } | SourceError::Network(_)
        )
    }
}

/// Port for one upstream provider of items
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short stable name stamped on every produced item
    fn name(&self) -> &str;

    /// Fixed priority of this source, lower is more authoritative
    fn priority(&self) -> u32;

    /// Fetch and normalize one page of results
    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Item>, SourceError>;
}

/// Remaining request budget reported by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub remaining: u64,
    pub limit: u64,
    /// Time until the window resets
    pub reset_after: Duration,
}

impl Quota {
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Port for checking a provider's rate-limit window before a pass
#[async_trait]
pub trait QuotaProbe: Send + Sync {
    async fn check_quota(&self) -> Result<Quota, SourceError>;
}

/// Error type for durable store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Port for the restart-surviving item collection
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Full persisted set; empty when nothing has been written yet
    async fn load(&self) -> Result<Vec<Item>, StoreError>;

    /// Add the items whose key is not yet present and return the full set
    async fn append(&self, items: &[Item]) -> Result<Vec<Item>, StoreError>;

    /// Number of persisted items
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Error type for cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the short-lived result cache
#[async_trait]
pub trait ItemCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<Item>>, CacheError>;

    async fn set(&self, key: &str, items: &[Item], ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SourceError::Timeout.is_transient());
        assert!(SourceError::Network("reset".into()).is_transient());
        assert!(
            SourceError::Server {
                status: 502,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!SourceError::RateLimited { retry_after: None }.is_transient());
        assert!(
            !SourceError::Client {
                status: 422,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!SourceError::Parse("bad".into()).is_transient());
    }
}
