//! Text normalization and classification rules shared by all adapters

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

use crate::model::{Category, ItemType};

/// Descriptions longer than this are cut at a word boundary
pub const MAX_DESCRIPTION_CHARS: usize = 200;

/// Marker appended to truncated descriptions
pub const ELLIPSIS: &str = "...";

/// Explicit topic tags, checked in order
const TOPIC_CATEGORIES: &[(&str, Category)] = &[
    ("frontend", Category::FrontendDevelopment),
    ("backend", Category::BackendDevelopment),
    ("mobile", Category::MobileDevelopment),
    ("devops", Category::DevOps),
    ("security", Category::Security),
    ("ai", Category::DataAndAi),
    ("javascript-framework", Category::FrontendDevelopment),
    ("css-framework", Category::FrontendDevelopment),
    ("web-framework", Category::BackendDevelopment),
    ("database", Category::BackendDevelopment),
    ("server", Category::BackendDevelopment),
    ("android", Category::MobileDevelopment),
    ("ios", Category::MobileDevelopment),
    ("cross-platform", Category::MobileDevelopment),
    ("ci-cd", Category::DevOps),
    ("continuous-integration", Category::DevOps),
    ("monitoring", Category::DevOps),
    ("security-tools", Category::Security),
    ("encryption", Category::Security),
    ("authentication", Category::Security),
    ("machine-learning", Category::DataAndAi),
    ("deep-learning", Category::DataAndAi),
    ("data-science", Category::DataAndAi),
    ("kubernetes", Category::CloudNative),
    ("container", Category::CloudNative),
    ("docker", Category::CloudNative),
    ("cloud-native", Category::CloudNative),
    ("linux", Category::SystemsDevelopment),
    ("operating-system", Category::SystemsDevelopment),
    ("compiler", Category::SystemsDevelopment),
    ("tutorial", Category::LearningResources),
    ("documentation", Category::LearningResources),
    ("learning-resources", Category::LearningResources),
    ("education", Category::LearningResources),
];

const LANGUAGE_CATEGORIES: &[(&str, Category)] = &[
    ("javascript", Category::FrontendDevelopment),
    ("typescript", Category::FrontendDevelopment),
    ("html", Category::FrontendDevelopment),
    ("css", Category::FrontendDevelopment),
    ("vue", Category::FrontendDevelopment),
    ("svelte", Category::FrontendDevelopment),
    ("java", Category::BackendDevelopment),
    ("kotlin", Category::BackendDevelopment),
    ("go", Category::BackendDevelopment),
    ("python", Category::BackendDevelopment),
    ("ruby", Category::BackendDevelopment),
    ("php", Category::BackendDevelopment),
    ("elixir", Category::BackendDevelopment),
    ("c#", Category::BackendDevelopment),
    ("swift", Category::MobileDevelopment),
    ("dart", Category::MobileDevelopment),
    ("objective-c", Category::MobileDevelopment),
    ("rust", Category::SystemsDevelopment),
    ("c", Category::SystemsDevelopment),
    ("c++", Category::SystemsDevelopment),
    ("zig", Category::SystemsDevelopment),
];

/// Substrings looked up in the lower-cased title and description
const CONTENT_CATEGORIES: &[(&str, Category)] = &[
    ("machine learning", Category::DataAndAi),
    ("artificial intelligence", Category::DataAndAi),
    ("neural network", Category::DataAndAi),
    ("kubernetes", Category::CloudNative),
    ("docker", Category::CloudNative),
    ("container", Category::CloudNative),
    ("security", Category::Security),
    ("vulnerabilit", Category::Security),
    ("encryption", Category::Security),
    ("android", Category::MobileDevelopment),
    ("mobile", Category::MobileDevelopment),
    ("devops", Category::DevOps),
    ("ci/cd", Category::DevOps),
    ("continuous integration", Category::DevOps),
    ("frontend", Category::FrontendDevelopment),
    ("front-end", Category::FrontendDevelopment),
    ("user interface", Category::FrontendDevelopment),
    ("backend", Category::BackendDevelopment),
    ("back-end", Category::BackendDevelopment),
    ("database", Category::BackendDevelopment),
    ("web server", Category::BackendDevelopment),
    ("kernel", Category::SystemsDevelopment),
    ("operating system", Category::SystemsDevelopment),
    ("compiler", Category::SystemsDevelopment),
    ("tutorial", Category::LearningResources),
];

const TOPIC_TYPES: &[(&str, ItemType)] = &[
    ("framework", ItemType::Framework),
    ("library", ItemType::Library),
    ("tool", ItemType::Tool),
    ("platform", ItemType::Platform),
    ("programming-language", ItemType::Language),
    ("web-framework", ItemType::Framework),
    ("javascript-framework", ItemType::Framework),
    ("css-framework", ItemType::Framework),
    ("cli", ItemType::Tool),
    ("language", ItemType::Language),
];

static SCRIPT_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:script|style)[^>]*>.*?</(?:script|style)\s*>").expect("valid regex")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").expect("valid regex")
});

/// Normalized identity of a URL: trimmed, lower-cased, no trailing slash
pub fn canonical_key(url: &str) -> String {
    url.trim().to_lowercase().trim_end_matches('/').to_string()
}

/// Deterministic item id derived from the canonical form of its URL
pub fn item_id_from_url(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_key(url).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to at most `max_chars` characters at the last word boundary,
/// appending [`ELLIPSIS`] when anything was removed.
pub fn truncate_description(text: &str, max_chars: usize) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let cut = collapsed
        .char_indices()
        .nth(max_chars)
        .map(|(index, _)| index)
        .unwrap_or(collapsed.len());

    let boundary = if collapsed[cut..].starts_with(' ') {
        cut
    } else {
        collapsed[..cut].rfind(' ').unwrap_or(cut)
    };

    let mut truncated = collapsed[..boundary].trim_end().to_string();
    if truncated.is_empty() {
        // A single word longer than the limit
        truncated = collapsed[..cut].to_string();
    }
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Remove HTML markup and decode entities, leaving plain text
pub fn strip_markup(html: &str) -> String {
    let without_blocks = SCRIPT_STYLE.replace_all(html, " ");
    let without_tags = TAG.replace_all(&without_blocks, " ");
    let decoded = ENTITY.replace_all(&without_tags, |caps: &Captures<'_>| decode_entity(caps));
    collapse_whitespace(&decoded)
}

fn decode_entity(caps: &Captures<'_>) -> String {
    let body = &caps[1];
    let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(dec) = body.strip_prefix('#') {
        dec.parse::<u32>().ok().and_then(char::from_u32)
    } else {
        match body {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            "hellip" => Some('…'),
            "mdash" => Some('—'),
            "ndash" => Some('–'),
            _ => None,
        }
    };

    decoded
        .map(String::from)
        .unwrap_or_else(|| caps[0].to_string())
}

/// Lower-cased, trimmed, deduplicated tag set
pub fn normalize_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|tag| tag.split_whitespace().collect::<Vec<_>>().join("-").to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Category by precedence: explicit topics, then language, then content
/// keywords, then `default`
pub fn infer_category(
    topics: &[String],
    language: Option<&str>,
    text: &str,
    default: Category,
) -> Category {
    let topics = normalize_tags(topics.iter().map(String::as_str));

    if let Some((_, category)) = TOPIC_CATEGORIES
        .iter()
        .find(|(topic, _)| topics.contains(*topic))
    {
        return *category;
    }

    if let Some(language) = language {
        let language = language.trim().to_lowercase();
        if let Some((_, category)) = LANGUAGE_CATEGORIES
            .iter()
            .find(|(name, _)| *name == language)
        {
            return *category;
        }
    }

    let text = text.to_lowercase();
    CONTENT_CATEGORIES
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map(|(_, category)| *category)
        .unwrap_or(default)
}

/// Type from explicit topic tags, else `default`
pub fn infer_type(topics: &[String], default: ItemType) -> ItemType {
    let topics = normalize_tags(topics.iter().map(String::as_str));
    TOPIC_TYPES
        .iter()
        .find(|(topic, _)| topics.contains(*topic))
        .map(|(_, item_type)| *item_type)
        .unwrap_or(default)
}

/// Case-insensitive check that `text` mentions at least one of `terms`
pub fn mentions_any(text: &str, terms: &[String]) -> bool {
    let text = text.to_lowercase();
    terms
        .iter()
        .any(|term| !term.trim().is_empty() && text.contains(&term.trim().to_lowercase()))
}
