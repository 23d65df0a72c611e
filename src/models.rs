//! Data models for collected items and generated reports.
//!
//! This module defines the core data structures used throughout a run:
//! - [`SourceKind`]: The four origins items are collected from
//! - [`Item`]: A single normalized piece of content from one source
//! - [`Collected`]: Items from every source, grouped in a fixed order
//! - [`Report`]: The generated report text with bookkeeping
//!
//! Everything here lives for one run only. Nothing is read back from disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The origin an [`Item`] was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Link-aggregation site (Reddit).
    LinkAggregator,
    /// Product-discovery site (Product Hunt).
    ProductDiscovery,
    /// First news portal (Synced / 機器之心).
    NewsPortalA,
    /// Second news portal (QbitAI / 量子位).
    NewsPortalB,
}

impl SourceKind {
    /// All sources in the order they appear in prompts and logs.
    pub const ALL: [SourceKind; 4] = [
        SourceKind::LinkAggregator,
        SourceKind::ProductDiscovery,
        SourceKind::NewsPortalA,
        SourceKind::NewsPortalB,
    ];

    /// Human-readable heading used when grouping items in the prompt.
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::LinkAggregator => "Reddit hot posts (ranked by score)",
            SourceKind::ProductDiscovery => "Product Hunt AI launches",
            SourceKind::NewsPortalA => "Synced (機器之心) latest articles",
            SourceKind::NewsPortalB => "QbitAI (量子位) latest articles",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::LinkAggregator => "link-aggregator",
            SourceKind::ProductDiscovery => "product-discovery",
            SourceKind::NewsPortalA => "news-portal-a",
            SourceKind::NewsPortalB => "news-portal-b",
        };
        f.write_str(s)
    }
}

/// A single normalized item collected from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Which source produced this item.
    pub source: SourceKind,
    /// Headline, whitespace-collapsed and capped at 150 characters.
    pub title: String,
    /// Absolute link to the item.
    pub url: String,
    /// Popularity metric when the source has one (Reddit score).
    pub score: Option<i64>,
    /// Comment count when the source has one.
    pub comments: Option<u64>,
    /// Plain-text teaser, capped at 250 characters.
    pub summary: Option<String>,
    /// Publication time when the source exposes it.
    pub published_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Create an item with only the required fields set.
    pub fn new(source: SourceKind, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source,
            title: title.into(),
            url: url.into(),
            score: None,
            comments: None,
            summary: None,
            published_at: None,
        }
    }
}

/// Outcome of one collector within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Ok,
    Failed,
}

/// Items from one source together with how its collector fared.
#[derive(Debug, Clone, Serialize)]
pub struct SourceBatch {
    pub source: SourceKind,
    pub status: SourceStatus,
    pub items: Vec<Item>,
}

/// The union of all collected items, grouped by source.
///
/// Batches are kept in [`SourceKind::ALL`] order regardless of the order
/// collectors finished in, so prompts are stable between runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Collected {
    pub batches: Vec<SourceBatch>,
}

impl Collected {
    pub fn new(mut batches: Vec<SourceBatch>) -> Self {
        batches.sort_by_key(|b| SourceKind::ALL.iter().position(|s| *s == b.source));
        Self { batches }
    }

    /// Total number of items across all sources.
    pub fn total(&self) -> usize {
        self.batches.iter().map(|b| b.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Sources whose collector failed this run.
    pub fn failed_sources(&self) -> Vec<SourceKind> {
        self.batches
            .iter()
            .filter(|b| b.status == SourceStatus::Failed)
            .map(|b| b.source)
            .collect()
    }

    /// Non-empty batches, in prompt order.
    pub fn non_empty(&self) -> impl Iterator<Item = &SourceBatch> {
        self.batches.iter().filter(|b| !b.items.is_empty())
    }
}

/// A generated report ready for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Report body in Telegram HTML.
    pub text: String,
    /// Number of items the report was generated from.
    pub item_count: usize,
    pub generated_at: DateTime<Utc>,
}

/// What a finished run did, used for the final log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub items_collected: usize,
    pub failed_sources: Vec<SourceKind>,
    pub chunks_delivered: usize,
    pub delivered: bool,
}
