//! RSS 2.0 / Atom feed collector.
//!
//! Serves the product-discovery source (Product Hunt, Atom) and both news
//! portals (RSS). Documents are parsed with `feed-rs`; each entry keeps
//!
//! | Field | Taken from |
//! |-------|------------|
//! | title | entry title |
//! | link | alternate link, else the first link |
//! | summary | summary, else content body |
//! | date | published, else updated |
//!
//! Entries without a title or a link are dropped. Relative links are
//! resolved against the feed URL.

use super::Collector;
use crate::config::FeedSettings;
use crate::error::BoxError;
use crate::models::{Item, SourceKind};
use crate::utils::{html_to_text, mentions_ai, truncate_chars};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Link};
use feed_rs::parser;
use tracing::{debug, info, instrument};
use url::Url;

const MAX_TITLE_CHARS: usize = 150;
const MAX_SUMMARY_CHARS: usize = 250;

/// Collector for one RSS or Atom feed.
#[derive(Debug, Clone)]
pub struct FeedCollector {
    source: SourceKind,
    client: reqwest::Client,
    settings: FeedSettings,
}

impl FeedCollector {
    pub fn new(source: SourceKind, client: reqwest::Client, settings: FeedSettings) -> Self {
        Self {
            source,
            client,
            settings,
        }
    }
}

#[async_trait]
impl Collector for FeedCollector {
    fn source(&self) -> SourceKind {
        self.source
    }

    #[instrument(level = "info", skip_all, fields(source = %self.source, url = %self.settings.url))]
    async fn collect(&self) -> Result<Vec<Item>, BoxError> {
        let body = self
            .client
            .get(&self.settings.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let base = Url::parse(&self.settings.url)?;
        let entries = parse_feed(&body, &base)?;
        let parsed = entries.len();
        let items = select_items(self.source, entries, &self.settings);

        info!(parsed, kept = items.len(), "Parsed feed");
        Ok(items)
    }
}

/// One entry as read from the feed, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
}

/// Apply the keyword filter and cap, converting entries into items.
pub fn select_items(source: SourceKind, entries: Vec<FeedEntry>, settings: &FeedSettings) -> Vec<Item> {
    entries
        .into_iter()
        .filter_map(|e| {
            let title = truncate_chars(&html_to_text(&e.title), MAX_TITLE_CHARS);
            let link = e.link.trim().to_string();
            if title.is_empty() || link.is_empty() {
                return None;
            }
            let summary = truncate_chars(&html_to_text(&e.summary), MAX_SUMMARY_CHARS);
            if settings.ai_filter && !mentions_ai(&format!("{title} {summary}")) {
                debug!(%title, "Dropped entry without AI keywords");
                return None;
            }
            let mut item = Item::new(source, title, link);
            item.summary = (!summary.is_empty()).then_some(summary);
            item.published_at = e.published;
            Some(item)
        })
        .take(settings.max_items)
        .collect()
}

/// Resolve `link` against the feed URL; absolute links pass through.
fn resolve_link(base: &Url, link: &str) -> String {
    let link = link.trim();
    if link.is_empty() {
        return String::new();
    }
    base.join(link)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| link.to_string())
}

/// The entry's alternate link, or its first link when none is marked.
fn entry_link(links: &[Link]) -> Option<&str> {
    links
        .iter()
        .find(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
        .or_else(|| links.first())
        .map(|l| l.href.as_str())
}

fn to_feed_entry(entry: Entry, base: &Url) -> FeedEntry {
    let summary = entry
        .summary
        .map(|t| t.content)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| entry.content.and_then(|c| c.body))
        .unwrap_or_default();
    FeedEntry {
        title: entry.title.map(|t| t.content.trim().to_string()).unwrap_or_default(),
        link: entry_link(&entry.links)
            .map(|href| resolve_link(base, href))
            .unwrap_or_default(),
        summary: summary.trim().to_string(),
        published: entry.published.or(entry.updated),
    }
}

/// Parse an RSS, Atom or JSON Feed document into entries, in document order.
///
/// Summaries keep their markup; [`select_items`] strips it afterwards.
pub fn parse_feed(body: &str, base: &Url) -> Result<Vec<FeedEntry>, BoxError> {
    let feed = parser::parse(body.as_bytes())?;
    let entries: Vec<FeedEntry> = feed
        .entries
        .into_iter()
        .map(|e| to_feed_entry(e, base))
        .collect();
    debug!(count = entries.len(), "Parsed feed entries");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>量子位</title>
    <link>https://www.qbitai.com</link>
    <item>
      <title>国产大模型登顶榜单</title>
      <link>https://www.qbitai.com/2025/01/1.html</link>
      <description><![CDATA[<p>新模型 <b>开源</b> 发布</p>]]></description>
      <pubDate>Mon, 06 Jan 2025 08:00:00 +0800</pubDate>
    </item>
    <item>
      <title>Agents &amp; tools</title>
      <link>/2025/01/2.html</link>
      <description>&lt;p&gt;Escaped markup&lt;/p&gt;</description>
    </item>
    <item>
      <title></title>
      <link>https://www.qbitai.com/2025/01/3.html</link>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xml:lang="en-US" xmlns="http://www.w3.org/2005/Atom">
  <title>Product Hunt</title>
  <entry>
    <id>tag:www.producthunt.com,2005:Post/1</id>
    <published>2025-01-06T10:00:00-08:00</published>
    <title>CodePilot</title>
    <content type="html">&lt;p&gt;An AI pair programmer for your terminal&lt;/p&gt;</content>
    <link rel="alternate" type="text/html" href="https://www.producthunt.com/products/codepilot"/>
  </entry>
  <entry>
    <title>Todo Zen</title>
    <content type="html">&lt;p&gt;The calmest todo list&lt;/p&gt;</content>
    <link rel="alternate" type="text/html" href="https://www.producthunt.com/products/todo-zen"/>
  </entry>
  <entry>
    <title>LLM Lens</title>
    <link rel="self" href="https://www.producthunt.com/self/llm-lens"/>
    <link rel="alternate" href="https://www.producthunt.com/products/llm-lens?utm=a&amp;b=c"/>
  </entry>
</feed>"#;

    fn base(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    fn feed_settings(max_items: usize, ai_filter: bool) -> FeedSettings {
        FeedSettings {
            url: "https://example.com/feed".into(),
            max_items,
            ai_filter,
        }
    }

    #[test]
    fn parses_rss_items_in_order() {
        let entries = parse_feed(RSS, &base("https://www.qbitai.com/feed")).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "国产大模型登顶榜单");
        assert_eq!(entries[0].link, "https://www.qbitai.com/2025/01/1.html");
        assert!(entries[0].summary.contains("<b>开源</b>"));
        assert_eq!(
            entries[0].published.unwrap().to_rfc3339(),
            "2025-01-06T00:00:00+00:00"
        );
    }

    #[test]
    fn resolves_relative_links_and_references() {
        let entries = parse_feed(RSS, &base("https://www.qbitai.com/feed")).unwrap();
        assert_eq!(entries[1].link, "https://www.qbitai.com/2025/01/2.html");
        assert_eq!(entries[1].title, "Agents & tools");
        assert_eq!(entries[1].summary, "<p>Escaped markup</p>");
    }

    #[test]
    fn parses_atom_entries() {
        let entries = parse_feed(ATOM, &base("https://www.producthunt.com/feed")).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "CodePilot");
        assert_eq!(entries[0].link, "https://www.producthunt.com/products/codepilot");
        assert_eq!(
            html_to_text(&entries[0].summary),
            "An AI pair programmer for your terminal"
        );
        assert!(entries[0].published.is_some());
        assert!(entries[1].published.is_none());
    }

    #[test]
    fn atom_prefers_alternate_link() {
        let entries = parse_feed(ATOM, &base("https://www.producthunt.com/feed")).unwrap();
        assert_eq!(
            entries[2].link,
            "https://www.producthunt.com/products/llm-lens?utm=a&b=c"
        );
    }

    #[test]
    fn select_items_drops_untitled_and_caps() {
        let entries = parse_feed(RSS, &base("https://www.qbitai.com/feed")).unwrap();
        let items = select_items(SourceKind::NewsPortalB, entries.clone(), &feed_settings(10, false));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].summary.as_deref(), Some("新模型 开源 发布"));
        assert!(items.iter().all(|i| i.source == SourceKind::NewsPortalB));

        let capped = select_items(SourceKind::NewsPortalB, entries, &feed_settings(1, false));
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn ai_filter_keeps_only_ai_entries() {
        let entries = parse_feed(ATOM, &base("https://www.producthunt.com/feed")).unwrap();
        let items = select_items(SourceKind::ProductDiscovery, entries, &feed_settings(6, true));
        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["CodePilot", "LLM Lens"]);
    }

    #[test]
    fn titles_are_capped() {
        let entry = FeedEntry {
            title: "x".repeat(400),
            link: "https://example.com/a".into(),
            ..Default::default()
        };
        let items = select_items(SourceKind::NewsPortalA, vec![entry], &feed_settings(5, false));
        assert_eq!(items[0].title.chars().count(), MAX_TITLE_CHARS);
        assert!(items[0].summary.is_none());
    }

    #[test]
    fn updated_stands_in_for_missing_published() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>
            <title>t</title><link href="https://e.com/a"/>
            <updated>2025-02-01T12:00:00Z</updated>
        </entry></feed>"#;
        let entries = parse_feed(xml, &base("https://e.com/")).unwrap();
        assert_eq!(
            entries[0].published.unwrap().to_rfc3339(),
            "2025-02-01T12:00:00+00:00"
        );
    }

    #[test]
    fn namespaced_title_does_not_replace_item_title() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>機器之心</title>
    <item>
      <title>Real headline</title>
      <media:title>Thumbnail caption</media:title>
      <link>https://www.jiqizhixin.com/articles/1</link>
      <description>Agent frameworks compared</description>
    </item>
  </channel>
</rss>"#;
        let entries = parse_feed(xml, &base("https://www.jiqizhixin.com/rss")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Real headline");
        assert_eq!(entries[0].link, "https://www.jiqizhixin.com/articles/1");
        assert_eq!(entries[0].summary, "Agent frameworks compared");
    }

    #[test]
    fn rejects_non_feed_documents() {
        assert!(parse_feed("<html><body>blocked</body></html>", &base("https://example.com/")).is_err());
    }
}
