//! Open Library book search adapter

use std::time::Duration;

use async_trait::async_trait;
use harvester_domain::{
    Category, Item, ItemDraft, ItemKind, ItemType, SourceAdapter, SourceError, SourceQuery,
};
use reqwest::Client;
use serde::Deserialize;
use time::{Date, Month, OffsetDateTime};

use super::trim_base_url;
use crate::http::{build_client, decode_lenient, get_json};

pub const OPENLIBRARY_URL: &str = "https://openlibrary.org";

const DEFAULT_QUERY: &str = "programming";

const FIELDS: &str = "key,title,author_name,first_publish_year,subject,edition_count";

/// Subjects kept as tags; the catalog lists dozens per work
const MAX_SUBJECT_TAGS: usize = 5;

pub struct OpenLibrarySource {
    client: Client,
    base_url: String,
    priority: u32,
}

impl OpenLibrarySource {
    pub const NAME: &'static str = "openlibrary";
    pub const DEFAULT_PRIORITY: u32 = 4;

    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Self::with_base_url(OPENLIBRARY_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: trim_base_url(base_url),
            priority: Self::DEFAULT_PRIORITY,
        })
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct Work {
    /// e.g. `/works/OL45883W`
    key: String,
    title: String,
    #[serde(default)]
    author_name: Vec<String>,
    first_publish_year: Option<i32>,
    #[serde(default)]
    subject: Vec<String>,
    edition_count: Option<u64>,
}

impl Work {
    fn description(&self) -> String {
        let authors = self.author_name.join(", ");
        match (authors.is_empty(), self.first_publish_year) {
            (false, Some(year)) => format!("By {}, first published {}", authors, year),
            (false, None) => format!("By {}", authors),
            (true, Some(year)) => format!("First published {}", year),
            (true, None) => String::new(),
        }
    }

    fn published_at(&self) -> Option<OffsetDateTime> {
        let year = self.first_publish_year?;
        Date::from_calendar_date(year, Month::January, 1)
            .ok()
            .map(|date| date.midnight().assume_utc())
    }
}

#[async_trait]
impl SourceAdapter for OpenLibrarySource {
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

        let request = self
            .client
            .get(format!("{}/search.json", self.base_url))
            .query(&[
                ("q", q.to_string()),
                ("fields", FIELDS.to_string()),
                ("limit", query.per_page.to_string()),
                ("page", query.page.to_string()),
            ]);
        let response: SearchResponse = get_json(request).await?;
        let now = OffsetDateTime::now_utc();

        let items: Vec<Item> = decode_lenient::<Work>(Self::NAME, response.docs)
            .into_iter()
            .filter(|work| work.key.starts_with('/'))
            .map(|work| {
                let link = format!("{}{}", OPENLIBRARY_URL, work.key);
                let description = work.description();
                let published_at = work.published_at();
                let subjects: Vec<String> =
                    work.subject.into_iter().take(MAX_SUBJECT_TAGS).collect();

                ItemDraft::new(ItemKind::Resource, work.title, link)
                    .description(description)
                    .topics(subjects)
                    .default_category(Category::LearningResources)
                    .item_type(ItemType::Book)
                    .popularity(work.edition_count)
                    .author(work.author_name.into_iter().next())
                    .published_at(published_at)
                    .into_item(Self::NAME, self.priority, now)
            })
            .collect();

        tracing::info!(query = %q, count = items.len(), "Fetched Open Library works");
        Ok(items)
    }
}
