//! Source collectors for the weekly report.
//!
//! Each collector fetches recent items from exactly one origin, normalizes
//! them into [`Item`]s and returns a bounded, ranked list.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Ranking |
//! |--------|--------|--------|---------|
//! | Reddit | [`reddit`] | JSON listing API | Score, descending |
//! | Product Hunt | [`feed`] | Atom feed, AI keyword filter | Publisher order |
//! | Synced (機器之心) | [`feed`] | RSS feed | Publisher order |
//! | QbitAI (量子位) | [`feed`] | RSS feed | Publisher order |
//!
//! # Failure Isolation
//!
//! A collector returns `Err` on network, timeout or parse failure.
//! [`collect_all`] absorbs every such error into an empty batch marked
//! [`SourceStatus::Failed`], so no collector can abort the run.

pub mod feed;
pub mod reddit;

use crate::config::CollectorSettings;
use crate::error::BoxError;
use crate::models::{Collected, Item, SourceBatch, SourceKind, SourceStatus};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Capability shared by every source: fetch and normalize items.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Which source this collector serves.
    fn source(&self) -> SourceKind;

    /// Fetch the current items, already ranked and capped.
    async fn collect(&self) -> Result<Vec<Item>, BoxError>;
}

/// Build the HTTP client every collector shares for one run.
///
/// Sends a browser-like User-Agent and an `Accept-Language` header, and
/// bounds every request by `timeout_secs`.
pub fn build_http_client(settings: &CollectorSettings) -> Result<reqwest::Client, BoxError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(&settings.accept_language)?);

    let timeout = Duration::from_secs(settings.timeout_secs);
    let client = reqwest::Client::builder()
        .user_agent(settings.user_agent.as_str())
        .default_headers(headers)
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Build the production set of collectors, one per source.
pub fn default_collectors(
    client: &reqwest::Client,
    settings: &CollectorSettings,
) -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(reddit::RedditCollector::new(client.clone(), settings.reddit.clone())),
        Box::new(feed::FeedCollector::new(
            SourceKind::ProductDiscovery,
            client.clone(),
            settings.product_hunt.clone(),
        )),
        Box::new(feed::FeedCollector::new(
            SourceKind::NewsPortalA,
            client.clone(),
            settings.portal_a.clone(),
        )),
        Box::new(feed::FeedCollector::new(
            SourceKind::NewsPortalB,
            client.clone(),
            settings.portal_b.clone(),
        )),
    ]
}

/// Run every collector concurrently with per-source failure isolation.
///
/// # Arguments
///
/// * `collectors` - The sources to query, in report order
///
/// # Returns
///
/// One batch per collector, in input order. Never fails: a collector error
/// becomes an empty batch marked failed.
#[instrument(level = "info", skip_all, fields(collectors = collectors.len()))]
pub async fn collect_all(collectors: &[Box<dyn Collector>]) -> Collected {
    let batches = join_all(collectors.iter().map(|c| run_one(c.as_ref()))).await;
    let collected = Collected::new(batches);

    info!(
        total = collected.total(),
        failed = collected.failed_sources().len(),
        "Collection finished"
    );
    collected
}

async fn run_one(collector: &dyn Collector) -> SourceBatch {
    let source = collector.source();
    let t0 = Instant::now();
    match collector.collect().await {
        Ok(items) => {
            info!(
                %source,
                count = items.len(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Collected items"
            );
            SourceBatch {
                source,
                status: SourceStatus::Ok,
                items,
            }
        }
        Err(e) => {
            warn!(
                %source,
                elapsed_ms = t0.elapsed().as_millis() as u64,
                error = %e,
                "Collector failed; continuing without this source"
            );
            SourceBatch {
                source,
                status: SourceStatus::Failed,
                items: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;

    /// Collector that returns a fixed number of items, or fails.
    pub struct StubCollector {
        pub source: SourceKind,
        pub result: Result<usize, String>,
    }

    impl StubCollector {
        pub fn ok(source: SourceKind, n: usize) -> Box<dyn Collector> {
            Box::new(Self { source, result: Ok(n) })
        }

        pub fn failing(source: SourceKind) -> Box<dyn Collector> {
            Box::new(Self {
                source,
                result: Err("connection reset".into()),
            })
        }
    }

    #[async_trait]
    impl Collector for StubCollector {
        fn source(&self) -> SourceKind {
            self.source
        }

        async fn collect(&self) -> Result<Vec<Item>, BoxError> {
            match &self.result {
                Ok(n) => Ok((0..*n)
                    .map(|i| {
                        Item::new(
                            self.source,
                            format!("{} item {i}", self.source),
                            format!("https://example.com/{}/{i}", self.source),
                        )
                    })
                    .collect()),
                Err(msg) => Err(msg.clone().into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::stub::StubCollector;
    use super::*;

    #[tokio::test]
    async fn failures_are_isolated_per_source() {
        let collectors = vec![
            StubCollector::ok(SourceKind::LinkAggregator, 2),
            StubCollector::failing(SourceKind::ProductDiscovery),
            StubCollector::ok(SourceKind::NewsPortalA, 5),
        ];
        let collected = collect_all(&collectors).await;
        assert_eq!(collected.total(), 7);
        assert_eq!(collected.failed_sources(), vec![SourceKind::ProductDiscovery]);
        assert_eq!(collected.batches.len(), 3);
    }

    #[tokio::test]
    async fn all_failing_yields_empty_collection() {
        let collectors: Vec<Box<dyn Collector>> = SourceKind::ALL
            .into_iter()
            .map(StubCollector::failing)
            .collect();
        let collected = collect_all(&collectors).await;
        assert!(collected.is_empty());
        assert_eq!(collected.failed_sources().len(), 4);
    }

    #[test]
    fn default_collectors_cover_every_source() {
        let settings = CollectorSettings::default();
        let client = build_http_client(&settings).unwrap();
        let sources: Vec<SourceKind> = default_collectors(&client, &settings)
            .iter()
            .map(|c| c.source())
            .collect();
        assert_eq!(sources, SourceKind::ALL.to_vec());
    }
}
