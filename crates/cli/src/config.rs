//! Configuration loading and management

use anyhow::{Context, Result};
use harvester_domain::ItemKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub harvest: HarvestSettings,

    #[serde(default)]
    pub resolver: ResolverSettings,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub serve: ServeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Base directory for store and cache files without an explicit path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Defaults to `<data_dir>/items.json` or `<data_dir>/items.db`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    /// Defaults to `<data_dir>/cache.db` for the sqlite backend
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Stop the loop once the store holds this many items
    #[serde(default)]
    pub target_count: Option<usize>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_rate_limit_wait")]
    pub max_rate_limit_wait_secs: u64,

    #[serde(default = "default_max_total_wait")]
    pub max_total_wait_secs: u64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Delay between launching consecutive queries within a pass
    #[serde(default)]
    pub stagger_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    #[serde(default = "default_min_store_items")]
    pub min_store_items: usize,

    #[serde(default)]
    pub max_store_age_secs: Option<u64>,

    #[serde(default = "default_true")]
    pub background_harvest: bool,
}

/// Settings shared by every built-in provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Override the public API endpoint
    #[serde(default)]
    pub base_url: Option<String>,

    /// One request per query per pass; empty runs the provider's default query
    #[serde(default)]
    pub queries: Vec<String>,

    #[serde(default = "default_per_page")]
    pub per_page: u32,

    #[serde(default)]
    pub priority: Option<u32>,

    /// Name of the environment variable holding an API token
    #[serde(default)]
    pub token_env: Option<String>,

    /// Hacker News only: keep hits mentioning one of these terms; empty keeps
    /// every hit, unset uses the built-in list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_terms: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,

    #[serde(default)]
    pub priority: Option<u32>,

    #[serde(default = "default_feed_kind")]
    pub kind: ItemKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_github")]
    pub github: ProviderConfig,

    #[serde(default = "default_gitlab")]
    pub gitlab: ProviderConfig,

    #[serde(default = "default_fdroid")]
    pub fdroid: ProviderConfig,

    #[serde(default = "default_openlibrary")]
    pub openlibrary: ProviderConfig,

    #[serde(default = "default_hackernews")]
    pub hackernews: ProviderConfig,

    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Cache-Control max-age for responses backed by fresh data
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,

    /// Cache-Control max-age for stale-store or bundled-dataset responses
    #[serde(default = "default_degraded_max_age")]
    pub degraded_max_age_secs: u64,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_poll_interval() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_rate_limit_wait() -> u64 {
    60
}

fn default_max_total_wait() -> u64 {
    120
}

fn default_timeout() -> u64 {
    15
}

fn default_min_store_items() -> usize {
    1
}

fn default_feed_kind() -> ItemKind {
    ItemKind::News
}

fn default_per_page() -> u32 {
    30
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_age() -> u64 {
    3600
}

fn default_degraded_max_age() -> u64 {
    300
}

/// GitHub search queries covering the main open-source categories
const GITHUB_TOPICS: &[&str] = &[
    "linux",
    "unix",
    "bsd",
    "ide",
    "text-editor",
    "terminal",
    "shell",
    "programming-language",
    "compiler",
    "interpreter",
    "web-framework",
    "javascript-framework",
    "css-framework",
    "database",
    "server",
    "container",
    "kubernetes",
    "security-tools",
    "encryption",
    "authentication",
    "machine-learning",
    "data-science",
    "deep-learning",
    "android",
    "ios",
    "cross-platform",
    "game-engine",
    "game-development",
    "desktop-app",
    "gui",
    "desktop-environment",
    "system-tools",
    "monitoring",
    "package-manager",
    "documentation",
    "tutorial",
    "learning-resources",
];

fn provider(queries: Vec<String>, token_env: Option<&str>) -> ProviderConfig {
    ProviderConfig {
        enabled: true,
        base_url: None,
        queries,
        per_page: default_per_page(),
        priority: None,
        token_env: token_env.map(str::to_string),
        relevance_terms: None,
    }
}

fn default_github() -> ProviderConfig {
    let queries = GITHUB_TOPICS
        .iter()
        .map(|topic| format!("topic:{} stars:>100", topic))
        .collect();
    provider(queries, Some("GITHUB_TOKEN"))
}

fn default_gitlab() -> ProviderConfig {
    provider(vec![], Some("GITLAB_TOKEN"))
}

fn default_fdroid() -> ProviderConfig {
    provider(vec![], None)
}

fn default_openlibrary() -> ProviderConfig {
    provider(
        vec!["programming".to_string(), "linux".to_string()],
        None,
    )
}

fn default_hackernews() -> ProviderConfig {
    provider(
        vec![
            "linux".to_string(),
            "tech".to_string(),
            "technology".to_string(),
        ],
        None,
    )
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            path: None,
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            target_count: None,
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_rate_limit_wait_secs: default_max_rate_limit_wait(),
            max_total_wait_secs: default_max_total_wait(),
            timeout_secs: default_timeout(),
            stagger_ms: 0,
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            min_store_items: default_min_store_items(),
            max_store_age_secs: None,
            background_harvest: true,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            github: default_github(),
            gitlab: default_gitlab(),
            fdroid: default_fdroid(),
            openlibrary: default_openlibrary(),
            hackernews: default_hackernews(),
            feeds: vec![],
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_age_secs: default_max_age(),
            degraded_max_age_secs: default_degraded_max_age(),
        }
    }
}

impl StoreConfig {
    pub fn resolved_path(&self, data_dir: &Path) -> PathBuf {
        self.path.clone().unwrap_or_else(|| match self.backend {
            StoreBackend::Json => data_dir.join("items.json"),
            StoreBackend::Sqlite => data_dir.join("items.db"),
        })
    }
}

impl CacheConfig {
    pub fn resolved_path(&self, data_dir: &Path) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| data_dir.join("cache.db"))
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("HARVESTER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Log filter directive: `--log-level` wins over `[general] log_level`
    pub fn log_level(config: Option<&Self>, cli_override: Option<&str>) -> String {
        cli_override
            .map(str::to_string)
            .or_else(|| config.map(|c| c.general.log_level.clone()))
            .unwrap_or_else(default_log_level)
    }

    /// Built-in providers with their config table name
    pub fn providers(&self) -> [(&'static str, &ProviderConfig); 5] {
        [
            ("github", &self.sources.github),
            ("gitlab", &self.sources.gitlab),
            ("fdroid", &self.sources.fdroid),
            ("openlibrary", &self.sources.openlibrary),
            ("hackernews", &self.sources.hackernews),
        ]
    }

    /// Effective configuration rendered as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# harvester configuration

[general]
data_dir = "./data"
log_level = "info"

[store]
backend = "json"  # json, sqlite
# path = "./data/items.json"

[cache]
backend = "memory"  # memory, sqlite
# path = "./data/cache.db"
ttl_secs = 3600

[harvest]
poll_interval_secs = 300
# target_count = 500
max_retries = 3
base_delay_ms = 1000
max_rate_limit_wait_secs = 60
max_total_wait_secs = 120
timeout_secs = 15
stagger_ms = 0

[resolver]
min_store_items = 1
# max_store_age_secs = 86400
background_harvest = true

[sources.github]
enabled = true
token_env = "GITHUB_TOKEN"
per_page = 30
queries = [
    "topic:linux stars:>100",
    "topic:terminal stars:>100",
    "topic:web-framework stars:>100",
    "topic:database stars:>100",
    "topic:kubernetes stars:>100",
    "topic:security-tools stars:>100",
    "topic:machine-learning stars:>100",
    "topic:android stars:>100",
]

[sources.gitlab]
enabled = true
token_env = "GITLAB_TOKEN"
per_page = 30
queries = []

[sources.fdroid]
enabled = true
per_page = 30
queries = ["terminal", "editor"]

[sources.openlibrary]
enabled = true
per_page = 20
queries = ["programming", "linux"]

[sources.hackernews]
enabled = true
per_page = 30
queries = ["linux", "tech", "technology"]
# relevance_terms = ["linux", "open source", "rust"]  # [] keeps every hit

# [[sources.feeds]]
# name = "lwn"
# url = "https://lwn.net/headlines/rss"
# kind = "news"  # news, resource

[serve]
bind = "127.0.0.1:8080"
max_age_secs = 3600
degraded_max_age_secs = 300
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_toml_parses() {
        let config: AppConfig = toml::from_str(&AppConfig::example_toml()).unwrap();

        assert_eq!(config.store.backend, StoreBackend::Json);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.sources.hackernews.queries.len(), 3);
        assert_eq!(
            config.sources.github.token_env.as_deref(),
            Some("GITHUB_TOKEN")
        );
        assert!(config.sources.feeds.is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.harvest.max_retries, 3);
        assert_eq!(config.harvest.target_count, None);
        assert_eq!(config.sources.github.queries.len(), GITHUB_TOPICS.len());
        assert_eq!(
            config.sources.github.queries[0],
            "topic:linux stars:>100".to_string()
        );
        assert!(config.resolver.background_harvest);
    }

    #[test]
    fn test_partial_table_keeps_field_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [sources.github]
            enabled = false

            [[sources.feeds]]
            name = "lwn"
            url = "https://lwn.net/headlines/rss"
            "#,
        )
        .unwrap();

        assert!(!config.sources.github.enabled);
        assert_eq!(config.sources.github.per_page, 30);
        assert!(config.sources.gitlab.enabled);
        assert_eq!(config.sources.feeds[0].kind, ItemKind::News);
    }

    #[test]
    fn test_log_level_precedence() {
        let mut config = AppConfig::default();
        config.general.log_level = "debug".to_string();

        assert_eq!(AppConfig::log_level(Some(&config), Some("warn")), "warn");
        assert_eq!(AppConfig::log_level(Some(&config), None), "debug");
        assert_eq!(AppConfig::log_level(None, None), "info");
    }

    #[test]
    fn test_hackernews_relevance_terms() {
        let config: AppConfig = toml::from_str(
            r#"
            [sources.hackernews]
            relevance_terms = []
            "#,
        )
        .unwrap();

        assert_eq!(config.sources.hackernews.relevance_terms, Some(vec![]));
        assert_eq!(config.sources.hackernews.queries.len(), 3);
        assert_eq!(AppConfig::default().sources.hackernews.relevance_terms, None);
    }

    #[test]
    fn test_store_paths() {
        let data_dir = Path::new("/var/lib/harvester");
        let mut store = StoreConfig::default();

        assert_eq!(
            store.resolved_path(data_dir),
            PathBuf::from("/var/lib/harvester/items.json")
        );

        store.backend = StoreBackend::Sqlite;
        assert_eq!(
            store.resolved_path(data_dir),
            PathBuf::from("/var/lib/harvester/items.db")
        );
    }

    #[test]
    fn test_effective_config_round_trips() {
        let rendered = AppConfig::default().to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();

        assert_eq!(parsed.serve.bind, "127.0.0.1:8080");
    }
}
