//! Domain models and value objects

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::normalize::{
    MAX_DESCRIPTION_CHARS, canonical_key, infer_category, infer_type, item_id_from_url,
    normalize_tags, truncate_description,
};

/// Priority assigned to items whose source did not record one
pub const DEFAULT_SOURCE_PRIORITY: u32 = 10;

/// What an item describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A project, package, book or tool
    #[default]
    Resource,
    /// A news article or story
    News,
}

/// Closed classification set used by the front end for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Frontend Development")]
    FrontendDevelopment,
    #[serde(rename = "Backend Development")]
    BackendDevelopment,
    #[serde(rename = "Mobile Development")]
    MobileDevelopment,
    #[serde(rename = "Systems Development")]
    SystemsDevelopment,
    #[serde(rename = "Cloud Native")]
    CloudNative,
    #[serde(rename = "DevOps & CI/CD")]
    DevOps,
    #[serde(rename = "Security & Compliance")]
    Security,
    #[serde(rename = "Data & AI")]
    DataAndAi,
    #[serde(rename = "Development Tools")]
    DevelopmentTools,
    #[serde(rename = "Learning Resources")]
    LearningResources,
    #[serde(rename = "Tech News")]
    TechNews,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::FrontendDevelopment => "Frontend Development",
            Category::BackendDevelopment => "Backend Development",
            Category::MobileDevelopment => "Mobile Development",
            Category::SystemsDevelopment => "Systems Development",
            Category::CloudNative => "Cloud Native",
            Category::DevOps => "DevOps & CI/CD",
            Category::Security => "Security & Compliance",
            Category::DataAndAi => "Data & AI",
            Category::DevelopmentTools => "Development Tools",
            Category::LearningResources => "Learning Resources",
            Category::TechNews => "Tech News",
        }
    }

    /// Bucket used when neither topics nor heuristics decide
    pub fn default_for(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Resource => Category::DevelopmentTools,
            ItemKind::News => Category::TechNews,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed resource type vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Framework,
    Library,
    Tool,
    Platform,
    Language,
    Book,
    App,
    Article,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Framework => "framework",
            ItemType::Library => "library",
            ItemType::Tool => "tool",
            ItemType::Platform => "platform",
            ItemType::Language => "language",
            ItemType::Book => "book",
            ItemType::App => "app",
            ItemType::Article => "article",
        }
    }

    pub fn default_for(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Resource => ItemType::Tool,
            ItemKind::News => ItemType::Article,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unified entity produced by every source adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Canonical identity derived from the source URL
    pub id: String,
    #[serde(default)]
    pub kind: ItemKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Canonical external reference
    pub link: String,
    pub category: Category,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Name of the adapter that produced the item
    #[serde(default)]
    pub source: String,
    /// Lower is more authoritative
    #[serde(default = "default_source_priority")]
    pub source_priority: u32,
    /// Star count, points, edition count, depending on the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub published_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_added: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_checked: Option<OffsetDateTime>,
}

fn default_source_priority() -> u32 {
    DEFAULT_SOURCE_PRIORITY
}

impl Item {
    /// Key used for duplicate detection: the lower-cased id, or the
    /// canonical link when the id is empty
    pub fn dedup_key(&self) -> String {
        let id = self.id.trim();
        if id.is_empty() {
            canonical_key(&self.link)
        } else {
            id.to_lowercase()
        }
    }

    /// Timestamp used for recency ordering
    pub fn recency(&self) -> Option<OffsetDateTime> {
        self.published_at.or(self.date_added)
    }

    /// Most recent time the item was seen upstream
    pub fn freshness(&self) -> Option<OffsetDateTime> {
        self.last_checked.or(self.date_added)
    }
}

/// Raw adapter output before normalization
///
/// Adapters fill in whatever their payload offers; [`ItemDraft::into_item`]
/// derives the id, truncates the description and assigns category and type.
#[derive(Debug, Clone)]
pub struct ItemDraft {
    pub kind: ItemKind,
    pub title: String,
    pub description: String,
    pub link: String,
    /// Explicit topic tags from the source (highest precedence for inference)
    pub topics: Vec<String>,
    /// Primary programming language, when the source reports one
    pub language: Option<String>,
    /// Category decided by the adapter itself
    pub category: Option<Category>,
    /// Bucket used before the kind default when inference finds nothing
    pub default_category: Option<Category>,
    /// Type decided by the adapter itself
    pub item_type: Option<ItemType>,
    pub extra_tags: Vec<String>,
    pub popularity: Option<u64>,
    pub author: Option<String>,
    pub published_at: Option<OffsetDateTime>,
}

impl ItemDraft {
    pub fn new(kind: ItemKind, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: String::new(),
            link: link.into(),
            topics: vec![],
            language: None,
            category: None,
            default_category: None,
            item_type: None,
            extra_tags: vec![],
            popularity: None,
            author: None,
            published_at: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    pub fn language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn default_category(mut self, category: Category) -> Self {
        self.default_category = Some(category);
        self
    }

    pub fn item_type(mut self, item_type: ItemType) -> Self {
        self.item_type = Some(item_type);
        self
    }

    pub fn extra_tags(mut self, tags: Vec<String>) -> Self {
        self.extra_tags = tags;
        self
    }

    pub fn popularity(mut self, popularity: Option<u64>) -> Self {
        self.popularity = popularity;
        self
    }

    pub fn author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    pub fn published_at(mut self, published_at: Option<OffsetDateTime>) -> Self {
        self.published_at = published_at;
        self
    }

    /// Normalize the draft into an [`Item`] stamped with its source
    pub fn into_item(self, source: &str, source_priority: u32, now: OffsetDateTime) -> Item {
        let title = self.title.trim().to_string();
        let text = format!("{} {}", title, self.description);

        let category = self.category.unwrap_or_else(|| {
            infer_category(
                &self.topics,
                self.language.as_deref(),
                &text,
                self.default_category
                    .unwrap_or_else(|| Category::default_for(self.kind)),
            )
        });
        let item_type = self
            .item_type
            .unwrap_or_else(|| infer_type(&self.topics, ItemType::default_for(self.kind)));

        let tags = normalize_tags(
            self.topics
                .iter()
                .chain(self.language.iter())
                .chain(self.extra_tags.iter())
                .map(String::as_str),
        );

        Item {
            id: item_id_from_url(&self.link),
            kind: self.kind,
            title,
            description: truncate_description(&self.description, MAX_DESCRIPTION_CHARS),
            link: self.link.trim().to_string(),
            category,
            item_type,
            tags,
            source: source.to_string(),
            source_priority,
            popularity: self.popularity,
            author: self.author,
            published_at: self.published_at,
            date_added: Some(now),
            last_checked: Some(now),
        }
    }
}

/// Query handed to a source adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceQuery {
    /// Free-text / provider-specific search expression (may be empty)
    pub text: String,
    /// 1-based page number
    pub page: u32,
    pub per_page: u32,
}

impl SourceQuery {
    pub const DEFAULT_PER_PAGE: u32 = 30;

    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page: 1,
            per_page: Self::DEFAULT_PER_PAGE,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }
}

impl Default for SourceQuery {
    fn default() -> Self {
        Self::new("")
    }
}
