//! Doctor command - validate configuration and show status

use anyhow::{Result, bail};
use harvester_domain::{Item, SystemClock};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::args::DoctorArgs;
use crate::config::{AppConfig, CacheBackend};
use crate::wiring;

const COMPONENTS: &[&str] = &["config", "store", "cache", "sources"];

#[derive(Debug, Serialize)]
struct DoctorReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<CheckResult>,
    overall: String,
}

impl DoctorReport {
    fn checks(&self) -> impl Iterator<Item = (&'static str, &CheckResult)> {
        [
            ("Config", self.config.as_ref()),
            ("Store", self.store.as_ref()),
            ("Cache", self.cache.as_ref()),
            ("Sources", self.sources.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, check)| check.map(|check| (name, check)))
    }
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    if let Some(component) = args.check.as_deref() {
        if !COMPONENTS.contains(&component) {
            bail!(
                "Unknown component: {} (expected one of: {})",
                component,
                COMPONENTS.join(", ")
            );
        }
    }
    let wants = |component: &str| args.check.as_deref().is_none_or(|c| c == component);

    let mut report = DoctorReport {
        config: None,
        store: None,
        cache: None,
        sources: None,
        overall: "error".to_string(),
    };

    // The config is needed by every other check
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            if wants("config") {
                report.config = Some(CheckResult::ok("Configuration loaded successfully"));
            }
            Some(c)
        }
        Err(e) => {
            report.config = Some(CheckResult::error(format!("Failed to load config: {:#}", e)));
            None
        }
    };

    if let Some(ref config) = config {
        if wants("store") {
            report.store = Some(check_store(config).await);
        }
        if wants("cache") {
            report.cache = Some(check_cache(config).await);
        }
        if wants("sources") {
            report.sources = Some(check_sources(config));
        }
    }

    // Determine overall status
    let has_error = report.checks().any(|(_, c)| c.is_error());
    let all_ok = report.checks().all(|(_, c)| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    // Output report
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

async fn check_store(config: &AppConfig) -> CheckResult {
    let path = config.store.resolved_path(&config.general.data_dir);

    let store = match wiring::build_store(config).await {
        Ok(store) => store,
        Err(e) => return CheckResult::error(format!("{:#}", e)),
    };

    let items = match store.load().await {
        Ok(items) => items,
        Err(e) => {
            return CheckResult::error(format!(
                "Failed to read store at {}: {}",
                path.display(),
                e
            ));
        }
    };

    if items.is_empty() {
        return CheckResult::warn(format!(
            "Store at {} is empty; the first fetch will harvest live",
            path.display()
        ));
    }

    let age_secs = newest_age_secs(&items, OffsetDateTime::now_utc());
    let details = serde_json::json!({
        "backend": config.store.backend,
        "path": path.display().to_string(),
        "count": items.len(),
        "newest_age_secs": age_secs,
    });

    let stale = match (config.resolver.max_store_age_secs, age_secs) {
        (Some(max_age), Some(age)) => age > max_age as i64,
        _ => false,
    };

    if stale {
        CheckResult::warn(format!(
            "{} items at {}, older than max_store_age_secs",
            items.len(),
            path.display()
        ))
        .with_details(details)
    } else {
        CheckResult::ok(format!("{} items at {}", items.len(), path.display()))
            .with_details(details)
    }
}

fn newest_age_secs(items: &[Item], now: OffsetDateTime) -> Option<i64> {
    items
        .iter()
        .filter_map(Item::freshness)
        .max()
        .map(|newest| (now - newest).whole_seconds())
}

async fn check_cache(config: &AppConfig) -> CheckResult {
    let ttl = config.cache.ttl_secs;
    if ttl == 0 {
        return CheckResult::warn("Cache TTL is 0; every request harvests or reads the store");
    }

    match config.cache.backend {
        CacheBackend::Memory => CheckResult::ok(format!("In-memory cache, TTL {}s", ttl)),
        CacheBackend::Sqlite => {
            let path = config.cache.resolved_path(&config.general.data_dir);
            match wiring::build_cache(config, Arc::new(SystemClock)).await {
                Ok(_) => CheckResult::ok(format!(
                    "SQLite cache at {}, TTL {}s",
                    path.display(),
                    ttl
                )),
                Err(e) => CheckResult::error(format!("{:#}", e)),
            }
        }
    }
}

fn check_sources(config: &AppConfig) -> CheckResult {
    let registrations = match wiring::build_registrations(config) {
        Ok(r) => r,
        Err(e) => return CheckResult::error(format!("{:#}", e)),
    };

    if registrations.is_empty() {
        return CheckResult::warn("No sources enabled; only stored and bundled items are served");
    }

    // Check if token env vars are set (without revealing the values)
    let mut missing_tokens = Vec::new();
    let providers: Vec<_> = config
        .providers()
        .into_iter()
        .map(|(name, provider)| {
            let token_set = provider
                .token_env
                .as_deref()
                .map(|env| wiring::load_optional_token(Some(env)).is_some());
            if provider.enabled && token_set == Some(false) {
                missing_tokens.push(name);
            }
            serde_json::json!({
                "name": name,
                "enabled": provider.enabled,
                "queries": provider.queries.len(),
                "token_env": provider.token_env,
                "token_set": token_set,
            })
        })
        .collect();

    let names: Vec<_> = registrations.iter().map(|r| r.adapter.name()).collect();
    let details = serde_json::json!({
        "providers": providers,
        "feeds": config.sources.feeds.iter().map(|f| &f.name).collect::<Vec<_>>(),
    });

    if missing_tokens.is_empty() {
        CheckResult::ok(format!("{} sources: {}", names.len(), names.join(", ")))
            .with_details(details)
    } else {
        CheckResult::warn(format!(
            "{} sources: {} (no token for {}; unauthenticated limits apply)",
            names.len(),
            names.join(", "),
            missing_tokens.join(", ")
        ))
        .with_details(details)
    }
}

fn print_report(report: &DoctorReport) {
    println!("harvester Doctor Report");
    println!("=======================");
    println!();

    for (name, check) in report.checks() {
        print_check(name, check);
    }

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: harvester run --once");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_domain::{ItemDraft, ItemKind};
    use time::Duration;
    use time::macros::datetime;

    #[test]
    fn test_newest_age() {
        let now = datetime!(2024-06-01 12:00 UTC);
        let items = vec![
            ItemDraft::new(ItemKind::News, "Old", "https://old.example").into_item(
                "hn",
                5,
                now - Duration::hours(5),
            ),
            ItemDraft::new(ItemKind::News, "New", "https://new.example").into_item(
                "hn",
                5,
                now - Duration::minutes(10),
            ),
        ];

        assert_eq!(newest_age_secs(&items, now), Some(600));
        assert_eq!(newest_age_secs(&[], now), None);
    }

    #[test]
    fn test_sources_without_any_enabled_warn() {
        let mut config = AppConfig::default();
        config.sources.github.enabled = false;
        config.sources.gitlab.enabled = false;
        config.sources.fdroid.enabled = false;
        config.sources.openlibrary.enabled = false;
        config.sources.hackernews.enabled = false;

        let check = check_sources(&config);

        assert_eq!(check.status, "warn");
    }
}
