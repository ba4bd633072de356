//! Hacker News story search adapter (Algolia API)

use std::time::Duration;

use async_trait::async_trait;
use harvester_domain::normalize::{mentions_any, strip_markup};
use harvester_domain::{Item, ItemDraft, ItemKind, SourceAdapter, SourceError, SourceQuery};
use reqwest::Client;
use serde::Deserialize;
use time::OffsetDateTime;

use super::{parse_timestamp, trim_base_url};
use crate::http::{build_client, decode_lenient, get_json};

pub const HN_SEARCH_URL: &str = "https://hn.algolia.com";

/// Placeholder description for link-only stories
const NO_TEXT_DESCRIPTION: &str = "Click to read more...";

/// Stories must mention one of these to be kept
pub const DEFAULT_RELEVANCE_TERMS: &[&str] = &[
    "linux",
    "open source",
    "opensource",
    "technology",
    "software",
    "development",
    "programming",
    "developer",
    "tech",
];

pub struct HackerNewsSource {
    client: Client,
    base_url: String,
    priority: u32,
    relevance_terms: Vec<String>,
}

impl HackerNewsSource {
    pub const NAME: &'static str = "hackernews";
    pub const DEFAULT_PRIORITY: u32 = 5;

    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Self::with_base_url(HN_SEARCH_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: trim_base_url(base_url),
            priority: Self::DEFAULT_PRIORITY,
            relevance_terms: DEFAULT_RELEVANCE_TERMS
                .iter()
                .map(|term| term.to_string())
                .collect(),
        })
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Replace the relevance filter; an empty list keeps every story
    pub fn with_relevance_terms(mut self, terms: Vec<String>) -> Self {
        self.relevance_terms = terms;
        self
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
    title: Option<String>,
    url: Option<String>,
    story_text: Option<String>,
    author: Option<String>,
    created_at: Option<String>,
    created_at_i: Option<i64>,
    points: Option<u64>,
}

impl Hit {
    fn published_at(&self) -> Option<OffsetDateTime> {
        self.created_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| {
                self.created_at_i
                    .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
            })
    }

    fn description(&self) -> String {
        self.story_text
            .as_deref()
            .map(strip_markup)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| NO_TEXT_DESCRIPTION.to_string())
    }
}

#[async_trait]
impl SourceAdapter for HackerNewsSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Item>, SourceError> {
        let request = self
            .client
            .get(format!("{}/api/v1/search", self.base_url))
            .query(&[
                ("query", query.text.trim().to_string()),
                ("tags", "story".to_string()),
                ("hitsPerPage", query.per_page.to_string()),
                // Algolia pages are zero based
                ("page", query.page.saturating_sub(1).to_string()),
            ]);
        let response: SearchResponse = get_json(request).await?;
        let now = OffsetDateTime::now_utc();

        let items: Vec<Item> = decode_lenient::<Hit>(Self::NAME, response.hits)
            .into_iter()
            .filter_map(|hit| {
                let title = hit.title.clone().filter(|t| !t.trim().is_empty())?;
                let url = hit.url.clone().filter(|u| !u.trim().is_empty())?;
                let description = hit.description();

                if !self.relevance_terms.is_empty()
                    && !mentions_any(&format!("{} {}", title, description), &self.relevance_terms)
                {
                    tracing::debug!(id = %hit.object_id, "Dropping irrelevant story");
                    return None;
                }

                Some(
                    ItemDraft::new(ItemKind::News, title, url)
                        .description(description)
                        .extra_tags(vec!["hacker-news".to_string()])
                        .popularity(hit.points)
                        .author(hit.author.clone())
                        .published_at(hit.published_at())
                        .into_item(Self::NAME, self.priority, now),
                )
            })
            .collect();

        tracing::info!(query = %query.text, count = items.len(), "Fetched Hacker News stories");
        Ok(items)
    }
}
