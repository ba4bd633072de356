//! resource-harvester adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `sources`: HTTP source adapters (GitHub, GitLab, F-Droid, Open Library,
//!   Hacker News, RSS/Atom feeds)
//! - `store`: JSON file, SQLite and in-memory item stores
//! - `cache`: In-memory and SQLite item caches
//! - `http`: Shared HTTP client and status mapping

mod cache_memory;
mod cache_sqlite;
mod sqlite;
mod store_json;
mod store_memory;
mod store_sqlite;

pub mod http;
pub mod sources;

/// Re-exports for durable item stores
pub mod store {
    pub use crate::store_json::JsonFileStore;
    pub use crate::store_memory::MemoryItemStore;
    pub use crate::store_sqlite::SqliteItemStore;
}

/// Re-exports for result caches
pub mod cache {
    pub use crate::cache_memory::MemoryItemCache;
    pub use crate::cache_sqlite::SqliteItemCache;
}
