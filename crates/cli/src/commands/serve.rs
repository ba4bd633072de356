//! Serve command - HTTP endpoint for the resolved item list

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use harvester_domain::ItemStore;
use harvester_domain::usecases::{FallbackResolver, Harvester};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::args::ServeArgs;
use crate::config::AppConfig;
use crate::wiring;

const HARVEST_ORIGIN: HeaderName = HeaderName::from_static("x-harvest-origin");

#[derive(Clone)]
pub struct ServeState {
    resolver: Arc<FallbackResolver>,
    store: Arc<dyn ItemStore>,
    harvester: Arc<Harvester>,
    max_age_secs: u64,
    degraded_max_age_secs: u64,
}

pub async fn execute(args: ServeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let bind = args.bind.unwrap_or_else(|| config.serve.bind.clone());

    let shutdown = CancellationToken::new();
    let components = wiring::build(&config, shutdown.clone()).await?;

    let app = router(ServeState {
        resolver: components.resolver,
        store: components.store,
        harvester: components.harvester,
        max_age_secs: config.serve.max_age_secs,
        degraded_max_age_secs: config.serve.degraded_max_age_secs,
    });

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    tracing::info!(bind = %bind, "Serving /api/resources and /health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

pub fn router(state: ServeState) -> Router {
    Router::new()
        .route("/api/resources", get(resources_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Resolves once per request; never fails
async fn resources_handler(State(state): State<ServeState>) -> Response {
    let resolution = state.resolver.resolve().await;

    let max_age = if resolution.origin.is_degraded() {
        state.degraded_max_age_secs
    } else {
        state.max_age_secs
    };

    let headers = [
        (header::CACHE_CONTROL, format!("public, max-age={}", max_age)),
        (HARVEST_ORIGIN, resolution.origin.as_str().to_string()),
    ];

    (headers, Json(resolution.items)).into_response()
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    store_count: Option<usize>,
    harvest_loop_running: bool,
    harvest_passes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Returns 200 when the store is readable, 503 otherwise
async fn health_handler(State(state): State<ServeState>) -> (StatusCode, Json<HealthResponse>) {
    let harvest = state.harvester.state();

    match state.store.count().await {
        Ok(count) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                store_count: Some(count),
                harvest_loop_running: harvest.is_started(),
                harvest_passes: harvest.passes(),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not read the store");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "error",
                    store_count: None,
                    harvest_loop_running: harvest.is_started(),
                    harvest_passes: harvest.passes(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use harvester_adapters::cache::MemoryItemCache;
    use harvester_adapters::store::MemoryItemStore;
    use harvester_domain::usecases::{HarvestConfig, ResolverConfig};
    use harvester_domain::{Item, ItemDraft, ItemKind, SystemClock};
    use time::OffsetDateTime;
    use tower::ServiceExt;

    fn state_with(items: Vec<Item>) -> ServeState {
        let store: Arc<dyn ItemStore> = Arc::new(MemoryItemStore::with_items(items));
        let harvester = Arc::new(Harvester::new(
            vec![],
            store.clone(),
            HarvestConfig::default(),
        ));
        let resolver = Arc::new(FallbackResolver::new(
            Arc::new(MemoryItemCache::new(Arc::new(SystemClock))),
            store.clone(),
            harvester.clone(),
            Arc::new(SystemClock),
            ResolverConfig {
                background_harvest: false,
                ..ResolverConfig::default()
            },
        ));

        ServeState {
            resolver,
            store,
            harvester,
            max_age_secs: 3600,
            degraded_max_age_secs: 300,
        }
    }

    async fn get(state: ServeState, uri: &str) -> Response {
        router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_everything_serves_bundled_dataset() {
        let response = get(state_with(vec![]), "/api/resources").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=300"
        );
        assert_eq!(response.headers()["x-harvest-origin"], "static");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let items: Vec<Item> = serde_json::from_slice(&body).unwrap();
        assert!(!items.is_empty());
    }

    #[tokio::test]
    async fn test_stored_items_are_served_with_long_max_age() {
        let item = ItemDraft::new(ItemKind::Resource, "Stored", "https://stored.example")
            .into_item("github", 1, OffsetDateTime::now_utc());

        let response = get(state_with(vec![item]), "/api/resources").await;

        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=3600"
        );
        assert_eq!(response.headers()["x-harvest-origin"], "store");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let items: Vec<Item> = serde_json::from_slice(&body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Stored");
    }

    #[tokio::test]
    async fn test_health_reports_store_count() {
        let response = get(state_with(vec![]), "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["store_count"], 0);
        assert_eq!(health["harvest_loop_running"], false);
    }
}
