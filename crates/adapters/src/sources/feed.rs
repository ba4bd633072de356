//! RSS 2.0, RSS 1.0 (RDF) and Atom feed adapter

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use harvester_domain::normalize::strip_markup;
use harvester_domain::{
    Category, Item, ItemDraft, ItemKind, SourceAdapter, SourceError, SourceQuery,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use reqwest::Client;
use time::OffsetDateTime;

use super::parse_timestamp;
use crate::http::{build_client, map_transport_error, send};

/// Root element flavour of a feed document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    /// `rss/channel/item`
    Rss,
    /// `feed/entry`
    Atom,
    /// `rdf:RDF/item`
    Rdf,
}

impl FeedFormat {
    fn from_root(name: &[u8]) -> Result<Self, SourceError> {
        match name {
            b"rss" => Ok(FeedFormat::Rss),
            b"feed" => Ok(FeedFormat::Atom),
            b"RDF" => Ok(FeedFormat::Rdf),
            other => Err(SourceError::Parse(format!(
                "Unsupported feed root element <{}>",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

/// Raw fields of one `item`/`entry`, before cleanup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: Option<String>,
    pub guid: Option<String>,
    pub summary: String,
    pub content: String,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub author: Option<String>,
    pub categories: Vec<String>,
}

/// Parse a feed document into its entries.
///
/// A document that breaks off after at least one complete entry yields the
/// entries read so far.
pub fn parse_feed(xml: &str) -> Result<(FeedFormat, Vec<FeedEntry>), SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut format = None;
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    let mut entry_depth = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if format.is_none() {
                    format = Some(FeedFormat::from_root(&name)?);
                } else if current.is_none() && is_entry(&name) {
                    current = Some(FeedEntry::default());
                    entry_depth = stack.len() + 1;
                } else if let Some(entry) = current.as_mut() {
                    if stack.len() == entry_depth {
                        apply_attributes(entry, &name, &e);
                    }
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = e.local_name();
                if format.is_none() {
                    format = Some(FeedFormat::from_root(name.as_ref())?);
                } else if let Some(entry) = current.as_mut() {
                    if stack.len() == entry_depth {
                        apply_attributes(entry, name.as_ref(), &e);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(entry) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map(Cow::into_owned)
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    apply_text(entry, &stack, entry_depth, text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(entry) = current.as_mut() {
                    let text = String::from_utf8_lossy(&c).into_owned();
                    apply_text(entry, &stack, entry_depth, text);
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() == entry_depth {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                if format.is_some() && !entries.is_empty() {
                    tracing::warn!(
                        error = %e,
                        parsed = entries.len(),
                        "Feed document broke off, keeping entries read so far"
                    );
                    break;
                }
                return Err(SourceError::Parse(format!("Malformed feed: {}", e)));
            }
        }
    }

    let format = format.ok_or_else(|| SourceError::Parse("Empty feed document".to_string()))?;
    Ok((format, entries))
}

fn is_entry(name: &[u8]) -> bool {
    matches!(name, b"item" | b"entry")
}

fn apply_attributes(entry: &mut FeedEntry, name: &[u8], element: &BytesStart<'_>) {
    let attribute = |wanted: &[u8]| -> Option<String> {
        element
            .attributes()
            .flatten()
            .find(|attr| attr.key.local_name().as_ref() == wanted)
            .and_then(|attr| attr.unescape_value().ok().map(Cow::into_owned))
    };

    match name {
        b"link" => {
            let rel = attribute(b"rel");
            if entry.link.is_none() && matches!(rel.as_deref(), None | Some("alternate")) {
                entry.link = attribute(b"href");
            }
        }
        b"category" => {
            if let Some(term) = attribute(b"term") {
                entry.categories.push(term);
            }
        }
        _ => {}
    }
}

fn apply_text(entry: &mut FeedEntry, stack: &[Vec<u8>], entry_depth: usize, text: String) {
    let Some(name) = stack.last() else {
        return;
    };

    // Author names nest one level deeper: <author><name>..</name></author>
    if stack.len() == entry_depth + 2 {
        let parent = &stack[stack.len() - 2];
        if name.as_slice() == b"name" && parent.as_slice() == b"author" && entry.author.is_none() {
            entry.author = Some(text);
        }
        return;
    }

    if stack.len() != entry_depth + 1 {
        return;
    }

    match name.as_slice() {
        b"title" => entry.title.push_str(&text),
        b"link" => {
            if entry.link.is_none() {
                entry.link = Some(text.trim().to_string());
            }
        }
        b"guid" | b"id" => entry.guid = Some(text.trim().to_string()),
        b"description" | b"summary" => entry.summary.push_str(&text),
        b"encoded" | b"content" => entry.content.push_str(&text),
        b"pubDate" | b"published" | b"date" | b"issued" => {
            entry.published.get_or_insert(text);
        }
        b"updated" | b"modified" => entry.updated = Some(text),
        b"author" | b"creator" => {
            if entry.author.is_none() {
                entry.author = Some(text);
            }
        }
        b"category" | b"subject" => entry.categories.push(text),
        _ => {}
    }
}

/// One configured feed URL
pub struct FeedSource {
    client: Client,
    name: String,
    url: String,
    priority: u32,
    kind: ItemKind,
}

impl FeedSource {
    pub const DEFAULT_PRIORITY: u32 = 6;

    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SourceError::Config("Feed name must not be empty".to_string()));
        }

        Ok(Self {
            client: build_client(timeout)?,
            name,
            url: url.into(),
            priority: Self::DEFAULT_PRIORITY,
            kind: ItemKind::News,
        })
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Treat entries as resources instead of news
    pub fn with_kind(mut self, kind: ItemKind) -> Self {
        self.kind = kind;
        self
    }

    fn to_item(&self, entry: FeedEntry, now: OffsetDateTime) -> Option<Item> {
        let title = strip_markup(&entry.title);
        let link = entry
            .link
            .filter(|link| !link.is_empty())
            .or_else(|| entry.guid.filter(|guid| guid.starts_with("http")))?;
        if title.is_empty() {
            return None;
        }

        let raw_description = if entry.summary.trim().is_empty() {
            &entry.content
        } else {
            &entry.summary
        };

        // Missing or unparseable dates fall back to the fetch time
        let published_at = entry
            .published
            .as_deref()
            .or(entry.updated.as_deref())
            .and_then(parse_timestamp)
            .unwrap_or(now);

        Some(
            ItemDraft::new(self.kind, title, link)
                .description(strip_markup(raw_description))
                .topics(entry.categories)
                .default_category(Category::default_for(self.kind))
                .extra_tags(vec![self.name.clone()])
                .author(entry.author.map(|author| author.trim().to_string()))
                .published_at(Some(published_at))
                .into_item(&self.name, self.priority, now),
        )
    }
}

#[async_trait]
impl SourceAdapter for FeedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Item>, SourceError> {
        let response = send(self.client.get(&self.url)).await?;
        let body = response.text().await.map_err(map_transport_error)?;

        let (format, entries) = parse_feed(&body)?;
        let now = OffsetDateTime::now_utc();
        let per_page = query.per_page as usize;
        let skip = (query.page.saturating_sub(1) as usize).saturating_mul(per_page);

        let items: Vec<Item> = entries
            .into_iter()
            .filter_map(|entry| self.to_item(entry, now))
            .skip(skip)
            .take(per_page)
            .collect();

        tracing::info!(feed = %self.name, format = ?format, count = items.len(), "Fetched feed");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Example News</title>
    <link>https://news.example.com/</link>
    <item>
      <title>Kernel &amp; friends</title>
      <link>https://news.example.com/kernel</link>
      <description><![CDATA[<p>The <b>new</b> scheduler</p>]]></description>
      <pubDate>Sat, 03 Feb 2024 04:05:06 GMT</pubDate>
      <dc:creator>Jane</dc:creator>
      <category>Security</category>
    </item>
    <item>
      <title>No date here</title>
      <link>https://news.example.com/nodate</link>
      <pubDate>sometime last week</pubDate>
    </item>
    <item>
      <title>Missing link</title>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Blog</title>
  <link href="https://blog.example.com/" rel="alternate"/>
  <entry>
    <title type="html">Release &lt;b&gt;1.0&lt;/b&gt;</title>
    <link rel="self" href="https://blog.example.com/feed/1"/>
    <link rel="alternate" href="https://blog.example.com/1"/>
    <id>urn:uuid:1</id>
    <updated>2024-03-01T08:00:00Z</updated>
    <author><name>Sam</name></author>
    <category term="devops"/>
    <summary>Shipping it</summary>
  </entry>
</feed>"#;

    const RDF: &str = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns="http://purl.org/rss/1.0/">
  <channel rdf:about="https://old.example.com/">
    <title>Old School</title>
  </channel>
  <item rdf:about="https://old.example.com/a">
    <title>First</title>
    <link>https://old.example.com/a</link>
    <description>Plain text</description>
  </item>
</rdf:RDF>"#;

    #[test]
    fn test_parse_rss() {
        let (format, entries) = parse_feed(RSS).unwrap();

        assert_eq!(format, FeedFormat::Rss);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "Kernel & friends");
        assert_eq!(entries[0].author.as_deref(), Some("Jane"));
        assert_eq!(entries[0].categories, vec!["Security".to_string()]);
        assert!(entries[2].link.is_none());
    }

    #[test]
    fn test_parse_atom() {
        let (format, entries) = parse_feed(ATOM).unwrap();

        assert_eq!(format, FeedFormat::Atom);
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.link.as_deref(), Some("https://blog.example.com/1"));
        assert_eq!(entry.author.as_deref(), Some("Sam"));
        assert_eq!(entry.categories, vec!["devops".to_string()]);
        assert_eq!(entry.updated.as_deref(), Some("2024-03-01T08:00:00Z"));
    }

    #[test]
    fn test_parse_rdf() {
        let (format, entries) = parse_feed(RDF).unwrap();

        assert_eq!(format, FeedFormat::Rdf);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "First");
    }

    #[test]
    fn test_unknown_root_is_parse_error() {
        let result = parse_feed("<html><body>Not a feed</body></html>");
        assert!(matches!(result, Err(SourceError::Parse(_))));
    }

    #[test]
    fn test_broken_document_keeps_complete_entries() {
        let xml = "<rss><channel>\
            <item><title>A</title><link>https://a.example</link></item>\
            <item><title>B</titel></item>";

        let (_, entries) = parse_feed(xml).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "A");
    }

    #[test]
    fn test_broken_document_without_entries_fails() {
        let result = parse_feed("<rss><channel><title>x</titel>");
        assert!(matches!(result, Err(SourceError::Parse(_))));
    }

    #[tokio::test]
    async fn test_fetch_rss_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;

        let source = FeedSource::new(
            "example",
            format!("{}/rss.xml", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();
        let before = OffsetDateTime::now_utc();

        let items = source.fetch(&SourceQuery::default()).await.unwrap();

        assert_eq!(items.len(), 2);
        let first = &items[0];
        assert_eq!(first.source, "example");
        assert_eq!(first.description, "The new scheduler");
        assert_eq!(first.published_at, Some(datetime!(2024-02-03 04:05:06 UTC)));
        assert_eq!(first.category, Category::Security);
        assert!(first.tags.contains("example"));

        let undated = items[1].published_at.unwrap();
        assert!(undated >= before);
    }

    #[tokio::test]
    async fn test_fetch_atom_as_resources() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ATOM))
            .mount(&server)
            .await;

        let source = FeedSource::new("blog", server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_kind(ItemKind::Resource);

        let items = source.fetch(&SourceQuery::default()).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Release 1.0");
        assert_eq!(items[0].category, Category::DevOps);
        assert_eq!(items[0].kind, ItemKind::Resource);
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(
            FeedSource::new(" ", "https://x.example/feed", Duration::from_secs(5)),
            Err(SourceError::Config(_))
        ));
    }
}
