//! resource-harvester domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `normalize`: Text cleanup, identity and classification rules
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `cache`: Generic in-process TTL cache
//! - `fallback`: Curated dataset of last resort
//! - `usecases`: Retry, dedup, harvest loop and the fallback resolver

pub mod cache;
pub mod fallback;
pub mod model;
pub mod normalize;
pub mod ports;
pub mod usecases;

pub use cache::TtlCache;
pub use fallback::fallback_items;
pub use model::*;
pub use ports::*;
