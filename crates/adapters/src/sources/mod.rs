//! Source adapters, one per upstream provider

mod fdroid;
mod feed;
mod github;
mod gitlab;
mod hackernews;
mod openlibrary;

pub use fdroid::FdroidSource;
pub use feed::{FeedEntry, FeedFormat, FeedSource, parse_feed};
pub use github::GithubSource;
pub use gitlab::GitlabSource;
pub use hackernews::HackerNewsSource;
pub use openlibrary::OpenLibrarySource;

use time::OffsetDateTime;
use time::format_description::well_known::{Rfc2822, Rfc3339};

/// Tag added to every item coming from an open-source code host
const OPEN_SOURCE_TAG: &str = "open-source";

/// Parse RFC 3339 or RFC 2822 timestamps, including the `GMT`/`UTC` zone
/// names common in RSS feeds
pub(crate) fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed);
    }
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc2822) {
        return Some(parsed);
    }

    ["GMT", "UTC", "UT", "Z"].iter().find_map(|zone| {
        let stripped = raw.strip_suffix(zone)?;
        OffsetDateTime::parse(&format!("{}+0000", stripped), &Rfc2822).ok()
    })
}

pub(crate) fn from_unix_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

pub(crate) fn trim_base_url(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}
