//! GitLab project search adapter

use std::time::Duration;

use async_trait::async_trait;
use harvester_domain::{Item, ItemDraft, ItemKind, SourceAdapter, SourceError, SourceQuery};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use time::OffsetDateTime;

use super::{OPEN_SOURCE_TAG, parse_timestamp, trim_base_url};
use crate::http::{build_client, decode_lenient, get_json};

pub const GITLAB_URL: &str = "https://gitlab.com";

const MAX_PER_PAGE: u32 = 100;

/// Public project listing ordered by star count
pub struct GitlabSource {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
    priority: u32,
}

impl GitlabSource {
    pub const NAME: &'static str = "gitlab";
    pub const DEFAULT_PRIORITY: u32 = 2;

    pub fn new(token: Option<SecretString>, timeout: Duration) -> Result<Self, SourceError> {
        Self::with_base_url(token, GITLAB_URL, timeout)
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
}

#[derive(Deserialize)]
struct Project {
    name: String,
    web_url: String,
    description: Option<String>,
    /// Newer API versions
    #[serde(default)]
    topics: Vec<String>,
    /// Older API versions
    #[serde(default)]
    tag_list: Vec<String>,
    #[serde(default)]
    star_count: u64,
    #[serde(default)]
    archived: bool,
    forked_from_project: Option<serde_json::Value>,
    namespace: Option<Namespace>,
    last_activity_at: Option<String>,
}

#[derive(Deserialize)]
struct Namespace {
    name: String,
}

#[async_trait]
impl SourceAdapter for GitlabSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Item>, SourceError> {
        let mut params = vec![
            ("order_by", "star_count".to_string()),
            ("sort", "desc".to_string()),
            ("visibility", "public".to_string()),
            ("per_page", query.per_page.min(MAX_PER_PAGE).to_string()),
            ("page", query.page.to_string()),
        ];
        let search = query.text.trim();
        if !search.is_empty() {
            params.push(("search", search.to_string()));
        }

        let mut request = self
            .client
            .get(format!("{}/api/v4/projects", self.base_url))
            .query(&params);
        if let Some(token) = &self.token {
            request = request.header("PRIVATE-TOKEN", token.expose_secret());
        }

        let projects: Vec<serde_json::Value> = get_json(request).await?;
        let now = OffsetDateTime::now_utc();

        let items: Vec<Item> = decode_lenient::<Project>(Self::NAME, projects)
            .into_iter()
            .filter(|project| !project.archived && project.forked_from_project.is_none())
            .map(|project| {
                let topics = if project.topics.is_empty() {
                    project.tag_list
                } else {
                    project.topics
                };
                ItemDraft::new(ItemKind::Resource, project.name, project.web_url)
                    .description(project.description.unwrap_or_default())
                    .topics(topics)
                    .extra_tags(vec![OPEN_SOURCE_TAG.to_string()])
                    .popularity(Some(project.star_count))
                    .author(project.namespace.map(|ns| ns.name))
                    .published_at(project.last_activity_at.as_deref().and_then(parse_timestamp))
                    .into_item(Self::NAME, self.priority, now)
            })
            .collect();

        tracing::info!(search = %search, count = items.len(), "Fetched GitLab projects");
        Ok(items)
    }
}
