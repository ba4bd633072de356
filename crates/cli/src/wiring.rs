//! Builds adapters and use cases from the loaded configuration

use anyhow::{Context, Result};
use harvester_adapters::cache::{MemoryItemCache, SqliteItemCache};
use harvester_adapters::sources::{
    FdroidSource, FeedSource, GithubSource, GitlabSource, HackerNewsSource, OpenLibrarySource,
};
use harvester_adapters::store::{JsonFileStore, SqliteItemStore};
use harvester_domain::usecases::{
    FallbackResolver, HarvestConfig, Harvester, ResolverConfig, RetryPolicy, SourceRegistration,
};
use harvester_domain::{Clock, ItemCache, ItemStore, SourceAdapter, SourceQuery, SystemClock};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, CacheBackend, ProviderConfig, StoreBackend};

/// Everything a command needs, wired once per process
pub struct Components {
    pub store: Arc<dyn ItemStore>,
    pub harvester: Arc<Harvester>,
    pub resolver: Arc<FallbackResolver>,
}

pub async fn build(config: &AppConfig, shutdown: CancellationToken) -> Result<Components> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store = build_store(config).await?;
    let cache = build_cache(config, clock.clone()).await?;
    let registrations = build_registrations(config)?;

    if registrations.is_empty() {
        tracing::warn!("No sources enabled; only stored and bundled items are available");
    }

    let harvester = Arc::new(Harvester::new(
        registrations,
        store.clone(),
        harvest_config(config),
    ));

    let resolver = Arc::new(
        FallbackResolver::new(
            cache,
            store.clone(),
            harvester.clone(),
            clock,
            resolver_config(config),
        )
        .with_shutdown(shutdown),
    );

    Ok(Components {
        store,
        harvester,
        resolver,
    })
}

pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn ItemStore>> {
    let path = config.store.resolved_path(&config.general.data_dir);

    let store: Arc<dyn ItemStore> = match config.store.backend {
        StoreBackend::Json => Arc::new(JsonFileStore::new(&path)),
        StoreBackend::Sqlite => Arc::new(
            SqliteItemStore::new(&path)
                .await
                .with_context(|| format!("Failed to open SQLite store: {}", path.display()))?,
        ),
    };

    tracing::debug!(backend = ?config.store.backend, path = %path.display(), "Opened item store");
    Ok(store)
}

pub async fn build_cache(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Arc<dyn ItemCache>> {
    let cache: Arc<dyn ItemCache> = match config.cache.backend {
        CacheBackend::Memory => Arc::new(MemoryItemCache::new(clock)),
        CacheBackend::Sqlite => {
            let path = config.cache.resolved_path(&config.general.data_dir);
            Arc::new(
                SqliteItemCache::new(&path, clock)
                    .await
                    .with_context(|| format!("Failed to open SQLite cache: {}", path.display()))?,
            )
        }
    };

    Ok(cache)
}

/// Read a token from the named environment variable, if any
pub fn load_optional_token(env_name: Option<&str>) -> Option<SecretString> {
    let env_name = env_name?;
    match std::env::var(env_name) {
        Ok(value) if !value.trim().is_empty() => Some(SecretString::from(value)),
        _ => None,
    }
}

fn queries(provider: &ProviderConfig) -> Vec<SourceQuery> {
    if provider.queries.is_empty() {
        return vec![SourceQuery::default().with_per_page(provider.per_page)];
    }

    provider
        .queries
        .iter()
        .map(|text| SourceQuery::new(text.clone()).with_per_page(provider.per_page))
        .collect()
}

fn register<S>(source: S, provider: &ProviderConfig) -> SourceRegistration
where
    S: SourceAdapter + 'static,
{
    SourceRegistration::new(Arc::new(source), queries(provider))
}

pub fn build_registrations(config: &AppConfig) -> Result<Vec<SourceRegistration>> {
    let timeout = Duration::from_secs(config.harvest.timeout_secs);
    let sources = &config.sources;
    let mut registrations = Vec::new();

    let github = &sources.github;
    if github.enabled {
        let token = load_optional_token(github.token_env.as_deref());
        if token.is_none() {
            tracing::info!("No GitHub token set; unauthenticated search limits apply");
        }
        let mut source = match &github.base_url {
            Some(url) => GithubSource::with_base_url(token, url.clone(), timeout),
            None => GithubSource::new(token, timeout),
        }
        .context("Failed to build GitHub source")?;
        if let Some(priority) = github.priority {
            source = source.with_priority(priority);
        }

        // The same client answers quota probes
        let source = Arc::new(source);
        registrations.push(
            SourceRegistration::new(source.clone(), queries(github)).with_quota_probe(source),
        );
    }

    let gitlab = &sources.gitlab;
    if gitlab.enabled {
        let token = load_optional_token(gitlab.token_env.as_deref());
        let mut source = match &gitlab.base_url {
            Some(url) => GitlabSource::with_base_url(token, url.clone(), timeout),
            None => GitlabSource::new(token, timeout),
        }
        .context("Failed to build GitLab source")?;
        if let Some(priority) = gitlab.priority {
            source = source.with_priority(priority);
        }
        registrations.push(register(source, gitlab));
    }

    let fdroid = &sources.fdroid;
    if fdroid.enabled {
        let mut source = match &fdroid.base_url {
            Some(url) => FdroidSource::with_base_url(url.clone(), timeout),
            None => FdroidSource::new(timeout),
        }
        .context("Failed to build F-Droid source")?;
        if let Some(priority) = fdroid.priority {
            source = source.with_priority(priority);
        }
        registrations.push(register(source, fdroid));
    }

    let openlibrary = &sources.openlibrary;
    if openlibrary.enabled {
        let mut source = match &openlibrary.base_url {
            Some(url) => OpenLibrarySource::with_base_url(url.clone(), timeout),
            None => OpenLibrarySource::new(timeout),
        }
        .context("Failed to build Open Library source")?;
        if let Some(priority) = openlibrary.priority {
            source = source.with_priority(priority);
        }
        registrations.push(register(source, openlibrary));
    }

    let hackernews = &sources.hackernews;
    if hackernews.enabled {
        let mut source = match &hackernews.base_url {
            Some(url) => HackerNewsSource::with_base_url(url.clone(), timeout),
            None => HackerNewsSource::new(timeout),
        }
        .context("Failed to build Hacker News source")?;
        if let Some(priority) = hackernews.priority {
            source = source.with_priority(priority);
        }
        if let Some(terms) = &hackernews.relevance_terms {
            source = source.with_relevance_terms(terms.clone());
        }
        registrations.push(register(source, hackernews));
    }

    for feed in &sources.feeds {
        let mut source = FeedSource::new(feed.name.clone(), feed.url.clone(), timeout)
            .with_context(|| format!("Failed to build feed source: {}", feed.name))?
            .with_kind(feed.kind);
        if let Some(priority) = feed.priority {
            source = source.with_priority(priority);
        }
        registrations.push(SourceRegistration::single(Arc::new(source)));
    }

    tracing::debug!(count = registrations.len(), "Built source registrations");
    Ok(registrations)
}

pub fn harvest_config(config: &AppConfig) -> HarvestConfig {
    let harvest = &config.harvest;
    HarvestConfig {
        poll_interval: Duration::from_secs(harvest.poll_interval_secs),
        target_count: harvest.target_count,
        retry: RetryPolicy {
            max_retries: harvest.max_retries,
            base_delay: Duration::from_millis(harvest.base_delay_ms),
            max_rate_limit_wait: Duration::from_secs(harvest.max_rate_limit_wait_secs),
            max_total_wait: Duration::from_secs(harvest.max_total_wait_secs),
        },
        stagger: Duration::from_millis(harvest.stagger_ms),
    }
}

pub fn resolver_config(config: &AppConfig) -> ResolverConfig {
    ResolverConfig {
        cache_ttl: Duration::from_secs(config.cache.ttl_secs),
        min_store_items: config.resolver.min_store_items,
        max_store_age: config.resolver.max_store_age_secs.map(Duration::from_secs),
        background_harvest: config.resolver.background_harvest,
        ..ResolverConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use harvester_domain::ItemKind;

    fn all_disabled() -> AppConfig {
        let mut config = AppConfig::default();
        config.sources.github.enabled = false;
        config.sources.gitlab.enabled = false;
        config.sources.fdroid.enabled = false;
        config.sources.openlibrary.enabled = false;
        config.sources.hackernews.enabled = false;
        config
    }

    #[test]
    fn test_default_registrations() {
        let registrations = build_registrations(&AppConfig::default()).unwrap();

        let names: Vec<_> = registrations.iter().map(|r| r.adapter.name()).collect();
        assert_eq!(
            names,
            vec!["github", "gitlab", "fdroid", "openlibrary", "hackernews"]
        );
        assert!(registrations[0].quota.is_some());
        assert_eq!(registrations[2].queries.len(), 1);
        assert_eq!(registrations[4].queries.len(), 3);
    }

    #[test]
    fn test_feeds_and_priority_overrides() {
        let mut config = all_disabled();
        config.sources.feeds.push(FeedConfig {
            name: "lwn".to_string(),
            url: "https://lwn.net/headlines/rss".to_string(),
            priority: Some(9),
            kind: ItemKind::News,
        });

        let registrations = build_registrations(&config).unwrap();

        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].adapter.name(), "lwn");
        assert_eq!(registrations[0].adapter.priority(), 9);
    }

    #[test]
    fn test_harvest_config_mapping() {
        let mut config = AppConfig::default();
        config.harvest.base_delay_ms = 250;
        config.harvest.target_count = Some(100);

        let harvest = harvest_config(&config);

        assert_eq!(harvest.retry.base_delay, Duration::from_millis(250));
        assert_eq!(harvest.target_count, Some(100));
        assert_eq!(harvest.poll_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_missing_token_env_is_none() {
        assert!(load_optional_token(None).is_none());
        assert!(load_optional_token(Some("HARVESTER_TEST_TOKEN_THAT_IS_NEVER_SET")).is_none());
    }
}
