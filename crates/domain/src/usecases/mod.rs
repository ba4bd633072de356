//! Application use cases / business logic

pub mod dedup;
pub mod harvest;
pub mod resolver;
pub mod retry;

pub use dedup::{append_unique, merge, sort_for_presentation};
pub use harvest::{
    HarvestConfig, HarvestError, HarvestPass, Harvester, HarvesterState, SourceRegistration,
};
pub use resolver::{FallbackResolver, Resolution, ResolvedFrom, ResolverConfig};
pub use retry::{AdapterOutcome, RetryPolicy, with_retry};
