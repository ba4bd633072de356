//! F-Droid repository index adapter

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use harvester_domain::normalize::{mentions_any, strip_markup};
use harvester_domain::{
    Category, Item, ItemDraft, ItemKind, ItemType, SourceAdapter, SourceError, SourceQuery,
};
use reqwest::Client;
use serde::Deserialize;
use time::OffsetDateTime;

use super::{OPEN_SOURCE_TAG, from_unix_millis, trim_base_url};
use crate::http::{build_client, decode_lenient, get_json};

pub const FDROID_URL: &str = "https://f-droid.org";

/// Anti-feature marking apps whose upstream source is gone
const NO_SOURCE_ANTI_FEATURE: &str = "NoSourceSince";

const DEFAULT_LOCALE: &str = "en-US";

/// Whole-repository index; filtering and paging happen client side
pub struct FdroidSource {
    client: Client,
    base_url: String,
    priority: u32,
}

impl FdroidSource {
    pub const NAME: &'static str = "fdroid";
    pub const DEFAULT_PRIORITY: u32 = 3;

    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Self::with_base_url(FDROID_URL, timeout)
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
struct Index {
    #[serde(default)]
    apps: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct App {
    package_name: String,
    name: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    anti_features: Vec<String>,
    author_name: Option<String>,
    last_updated: Option<i64>,
    #[serde(default)]
    localized: HashMap<String, Localized>,
}

#[derive(Deserialize)]
struct Localized {
    name: Option<String>,
    summary: Option<String>,
    description: Option<String>,
}

impl App {
    fn is_listed(&self) -> bool {
        !self
            .anti_features
            .iter()
            .any(|feature| feature == NO_SOURCE_ANTI_FEATURE)
    }

    fn localized_field(&self, pick: impl Fn(&Localized) -> Option<&String>) -> Option<String> {
        self.localized
            .get(DEFAULT_LOCALE)
            .and_then(&pick)
            .or_else(|| self.localized.values().find_map(&pick))
            .filter(|value| !value.trim().is_empty())
            .cloned()
    }

    fn title(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.localized_field(|l| l.name.as_ref()))
            .unwrap_or_else(|| self.package_name.clone())
    }

    fn summary(&self) -> String {
        self.summary
            .clone()
            .or_else(|| self.localized_field(|l| l.summary.as_ref()))
            .or_else(|| {
                self.description
                    .clone()
                    .or_else(|| self.localized_field(|l| l.description.as_ref()))
                    .map(|html| strip_markup(&html))
            })
            .unwrap_or_default()
    }

    fn matches(&self, terms: &[String]) -> bool {
        if terms.is_empty() {
            return true;
        }
        let haystack = format!(
            "{} {} {} {}",
            self.title(),
            self.summary(),
            self.package_name,
            self.categories.join(" ")
        );
        mentions_any(&haystack, terms)
    }
}

#[async_trait]
impl SourceAdapter for FdroidSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Item>, SourceError> {
        let request = self
            .client
            .get(format!("{}/repo/index-v1.json", self.base_url));
        let index: Index = get_json(request).await?;

        let terms: Vec<String> = query.text.split_whitespace().map(String::from).collect();
        let per_page = query.per_page as usize;
        let skip = (query.page.saturating_sub(1) as usize).saturating_mul(per_page);
        let now = OffsetDateTime::now_utc();

        let items: Vec<Item> = decode_lenient::<App>(Self::NAME, index.apps)
            .into_iter()
            .filter(|app| app.is_listed() && app.matches(&terms))
            .skip(skip)
            .take(per_page)
            .map(|app| {
                let link = format!("{}/packages/{}/", self.base_url, app.package_name);
                ItemDraft::new(ItemKind::Resource, app.title(), link)
                    .description(app.summary())
                    .topics(app.categories.clone())
                    .default_category(Category::MobileDevelopment)
                    .item_type(ItemType::App)
                    .extra_tags(vec![OPEN_SOURCE_TAG.to_string(), "android".to_string()])
                    .author(app.author_name.clone())
                    .published_at(app.last_updated.and_then(from_unix_millis))
                    .into_item(Self::NAME, self.priority, now)
            })
            .collect();

        tracing::info!(query = %query.text, count = items.len(), "Fetched F-Droid apps");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_index() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repo/index-v1.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "repo": {"name": "F-Droid"},
                "apps": [
                    {
                        "packageName": "org.example.terminal",
                        "categories": ["Development", "System"],
                        "lastUpdated": 1_700_000_000_000i64,
                        "localized": {
                            "en-US": {
                                "name": "Terminal",
                                "summary": "Terminal emulator with a Linux shell"
                            }
                        }
                    },
                    {
                        "packageName": "org.example.keys",
                        "name": "KeyVault",
                        "summary": "Password manager",
                        "categories": ["Security"]
                    },
                    {
                        "packageName": "org.example.gone",
                        "name": "Gone",
                        "summary": "Shell app",
                        "antiFeatures": ["NoSourceSince"]
                    },
                    {
                        "name": "missing package name"
                    }
                ]
            })))
            .mount(&server)
            .await;
        server
    }

    fn source(server: &MockServer) -> FdroidSource {
        FdroidSource::with_base_url(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_all_listed_apps() {
        let server = server_with_index().await;

        let items = source(&server).fetch(&SourceQuery::default()).await.unwrap();

        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Terminal", "KeyVault"]);
        assert!(items.iter().all(|i| i.item_type == ItemType::App));
        assert_eq!(items[1].category, Category::Security);
        assert!(items[0].link.ends_with("/packages/org.example.terminal/"));
        assert!(items[0].published_at.is_some());
    }

    #[tokio::test]
    async fn test_query_filters_and_pages() {
        let server = server_with_index().await;

        let shell = source(&server)
            .fetch(&SourceQuery::new("shell"))
            .await
            .unwrap();
        assert_eq!(shell.len(), 1);
        assert_eq!(shell[0].title, "Terminal");

        let second_page = source(&server)
            .fetch(&SourceQuery::default().with_per_page(1).with_page(2))
            .await
            .unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].title, "KeyVault");
    }
}
