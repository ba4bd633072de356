//! GitHub repository search adapter

use std::time::Duration;

use async_trait::async_trait;
use harvester_domain::{
    Item, ItemDraft, ItemKind, Quota, QuotaProbe, SourceAdapter, SourceError, SourceQuery,
};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use time::OffsetDateTime;

use super::{OPEN_SOURCE_TAG, trim_base_url};
use crate::http::{build_client, decode_lenient, get_json};

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Query used when the registration does not provide one
const DEFAULT_QUERY: &str = "stars:>1000";

/// Search API page size ceiling
const MAX_PER_PAGE: u32 = 100;

/// Repository search sorted by stars
pub struct GithubSource {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
    priority: u32,
}

impl GithubSource {
    pub const NAME: &'static str = "github";
    pub const DEFAULT_PRIORITY: u32 = 1;

    pub fn new(token: Option<SecretString>, timeout: Duration) -> Result<Self, SourceError> {
        Self::with_base_url(token, GITHUB_API_URL, timeout)
    }

    pub fn with_base_url(
        token: Option<SecretString>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: trim_base_url(base_url),
            token,
            priority: Self::DEFAULT_PRIORITY,
        })
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("Accept", "application/vnd.github+json");

        match &self.token {
            Some(token) => request.header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            ),
            None => request,
        }
    }

    fn to_item(&self, repo: Repository, now: OffsetDateTime) -> Item {
        ItemDraft::new(ItemKind::Resource, repo.name, repo.html_url)
            .description(repo.description.unwrap_or_default())
            .topics(repo.topics)
            .language(repo.language)
            .extra_tags(vec![OPEN_SOURCE_TAG.to_string()])
            .popularity(Some(repo.stargazers_count))
            .author(repo.owner.map(|owner| owner.login))
            .into_item(Self::NAME, self.priority, now)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct Repository {
    name: String,
    html_url: String,
    description: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    language: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    fork: bool,
    owner: Option<Owner>,
}

#[derive(Deserialize)]
struct Owner {
    login: String,
}

#[derive(Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Deserialize)]
struct RateLimitResources {
    search: RateLimitBucket,
}

#[derive(Deserialize)]
struct RateLimitBucket {
    limit: u64,
    remaining: u64,
    /// Unix seconds
    reset: u64,
}

#[async_trait]
impl SourceAdapter for GithubSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Item>, SourceError> {
        let q = match query.text.trim() {
            "" => DEFAULT_QUERY,
            text => text,
        };

        tracing::debug!(query = %q, page = query.page, "Searching GitHub repositories");

        let request = self.get("/search/repositories").query(&[
            ("q", q.to_string()),
            ("sort", "stars".to_string()),
            ("order", "desc".to_string()),
            ("per_page", query.per_page.min(MAX_PER_PAGE).to_string()),
            ("page", query.page.to_string()),
        ]);

        let response: SearchResponse = get_json(request).await?;
        let now = OffsetDateTime::now_utc();

        let items: Vec<Item> = decode_lenient::<Repository>(Self::NAME, response.items)
            .into_iter()
            .filter(|repo| !repo.archived && !repo.disabled && !repo.fork)
            .map(|repo| self.to_item(repo, now))
            .collect();

        tracing::info!(query = %q, count = items.len(), "Fetched GitHub repositories");
        Ok(items)
    }
}

#[async_trait]
impl QuotaProbe for GithubSource {
    async fn check_quota(&self) -> Result<Quota, SourceError> {
        let response: RateLimitResponse = get_json(self.get("/rate_limit")).await?;
        let bucket = response.resources.search;
        let now = u64::try_from(OffsetDateTime::now_utc().unix_timestamp()).unwrap_or(0);

        Ok(Quota {
            remaining: bucket.remaining,
            limit: bucket.limit,
            reset_after: Duration::from_secs(bucket.reset.saturating_sub(now)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_domain::{Category, ItemType};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer, token: Option<&str>) -> GithubSource {
        GithubSource::with_base_url(
            token.map(|t| SecretString::from(t.to_string())),
            server.uri(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn search_body() -> serde_json::Value {
        serde_json::json!({
            "total_count": 4,
            "items": [
                {
                    "name": "tokio",
                    "html_url": "https://github.com/tokio-rs/tokio",
                    "description": "A runtime for writing reliable asynchronous applications",
                    "topics": ["async", "framework"],
                    "language": "Rust",
                    "stargazers_count": 25000,
                    "owner": {"login": "tokio-rs"}
                },
                {
                    "name": "old-thing",
                    "html_url": "https://github.com/someone/old-thing",
                    "archived": true
                },
                {
                    "name": "tokio-fork",
                    "html_url": "https://github.com/someone/tokio",
                    "fork": true
                },
                {
                    "name": 12345
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_fetch_maps_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("q", "topic:async"))
            .and(query_param("sort", "stars"))
            .and(query_param("per_page", "10"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
            .mount(&server)
            .await;

        let items = source(&server, Some("test-token"))
            .with_priority(2)
            .fetch(&SourceQuery::new("topic:async").with_per_page(10))
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.title, "tokio");
        assert_eq!(item.source, "github");
        assert_eq!(item.source_priority, 2);
        assert_eq!(item.category, Category::SystemsDevelopment);
        assert_eq!(item.item_type, ItemType::Framework);
        assert_eq!(item.popularity, Some(25000));
        assert!(item.tags.contains("open-source"));
        assert!(item.tags.contains("rust"));
    }

    #[tokio::test]
    async fn test_empty_query_uses_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("q", DEFAULT_QUERY))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(&server)
            .await;

        let items = source(&server, None)
            .fetch(&SourceQuery::default())
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_forbidden_with_zero_remaining_is_rate_limit() {
        let server = MockServer::start().await;
        let reset = OffsetDateTime::now_utc().unix_timestamp() + 30;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .insert_header("x-ratelimit-reset", reset.to_string().as_str()),
            )
            .mount(&server)
            .await;

        let result = source(&server, None).fetch(&SourceQuery::default()).await;

        match result {
            Err(SourceError::RateLimited {
                retry_after: Some(wait),
            }) => assert!(wait <= Duration::from_secs(30)),
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unprocessable_query_is_client_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .respond_with(ResponseTemplate::new(422).set_body_string("Validation Failed"))
            .mount(&server)
            .await;

        let result = source(&server, None).fetch(&SourceQuery::new("::")).await;

        assert!(matches!(
            result,
            Err(SourceError::Client { status: 422, .. })
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let error = source(&server, None)
            .fetch(&SourceQuery::default())
            .await
            .unwrap_err();
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn test_check_quota() {
        let server = MockServer::start().await;
        let reset = OffsetDateTime::now_utc().unix_timestamp() + 60;
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resources": {
                    "core": {"limit": 60, "remaining": 59, "reset": reset},
                    "search": {"limit": 10, "remaining": 0, "reset": reset}
                }
            })))
            .mount(&server)
            .await;

        let quota = source(&server, None).check_quota().await.unwrap();

        assert!(quota.is_exhausted());
        assert_eq!(quota.limit, 10);
        assert!(quota.reset_after <= Duration::from_secs(60));
        assert!(quota.reset_after >= Duration::from_secs(55));
    }
}
