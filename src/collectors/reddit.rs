//! Reddit hot-post collector (the link-aggregation source).
//!
//! Reads the public JSON listing of each configured subreddit:
//! `https://www.reddit.com/r/{sub}/hot.json?limit={n}`. Stickied posts are
//! skipped, the rest are ranked by score across all subreddits and capped.
//!
//! A failing subreddit is logged and skipped. The collector only fails when
//! every subreddit failed.

use super::Collector;
use crate::config::RedditSettings;
use crate::error::BoxError;
use crate::models::{Item, SourceKind};
use crate::utils::{collapse_whitespace, truncate_chars};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

const MAX_TITLE_CHARS: usize = 150;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    title: String,
    permalink: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    #[serde(default)]
    stickied: bool,
    #[serde(default)]
    created_utc: Option<f64>,
}

/// Collector for a set of subreddits.
#[derive(Debug, Clone)]
pub struct RedditCollector {
    client: reqwest::Client,
    settings: RedditSettings,
}

impl RedditCollector {
    pub fn new(client: reqwest::Client, settings: RedditSettings) -> Self {
        Self { client, settings }
    }

    fn listing_url(&self, subreddit: &str) -> String {
        format!(
            "{}/r/{}/hot.json?limit={}",
            self.settings.base_url.trim_end_matches('/'),
            urlencoding::encode(subreddit),
            self.settings.per_subreddit
        )
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_subreddit(&self, subreddit: &str) -> Result<Vec<Item>, BoxError> {
        let body = self
            .client
            .get(self.listing_url(subreddit))
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_listing(&body)
    }
}

#[async_trait]
impl Collector for RedditCollector {
    fn source(&self) -> SourceKind {
        SourceKind::LinkAggregator
    }

    #[instrument(level = "info", skip_all, fields(subreddits = self.settings.subreddits.len()))]
    async fn collect(&self) -> Result<Vec<Item>, BoxError> {
        let results: Vec<(String, Result<Vec<Item>, BoxError>)> =
            stream::iter(self.settings.subreddits.iter().cloned())
                .then(|sub| async move {
                    let res = self.fetch_subreddit(&sub).await;
                    (sub, res)
                })
                .collect()
                .await;

        let mut posts = Vec::new();
        let mut failures = 0usize;
        for (sub, res) in results {
            match res {
                Ok(mut items) => {
                    debug!(subreddit = %sub, count = items.len(), "Fetched subreddit");
                    posts.append(&mut items);
                }
                Err(e) => {
                    failures += 1;
                    warn!(subreddit = %sub, error = %e, "Subreddit fetch failed; skipping");
                }
            }
        }

        if failures > 0 && failures == self.settings.subreddits.len() {
            return Err(format!("all {failures} subreddit fetches failed").into());
        }

        let ranked = rank(posts, self.settings.max_items);
        info!(count = ranked.len(), failures, "Ranked Reddit posts");
        Ok(ranked)
    }
}

/// Parse one subreddit listing, skipping stickied posts.
fn parse_listing(body: &str) -> Result<Vec<Item>, BoxError> {
    let listing: Listing = serde_json::from_str(body)?;
    let items = listing
        .data
        .children
        .into_iter()
        .map(|c| c.data)
        .filter(|p| !p.stickied)
        .map(|p| Item {
            source: SourceKind::LinkAggregator,
            title: truncate_chars(&collapse_whitespace(&p.title), MAX_TITLE_CHARS),
            url: format!("https://reddit.com{}", p.permalink),
            score: Some(p.score),
            comments: Some(p.num_comments),
            summary: None,
            published_at: p
                .created_utc
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts as i64, 0)),
        })
        .collect();
    Ok(items)
}

/// Rank by score, highest first, dropping cross-posted duplicates by URL.
fn rank(posts: Vec<Item>, cap: usize) -> Vec<Item> {
    posts
        .into_iter()
        .sorted_by(|a, b| b.score.cmp(&a.score))
        .unique_by(|p| p.url.clone())
        .take(cap)
        .collect()
}
