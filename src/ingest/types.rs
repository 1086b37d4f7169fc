// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::classify::Category;
use crate::sources::Source;

/// One entry as it comes out of a feed, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    /// Publication (or update) timestamp, unparsed.
    pub published: Option<String>,
}

/// A validated, classified article. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub source_id: String,
    pub source_name: String,
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub summary: String,
    pub categories: BTreeSet<Category>,
    pub is_research: bool,
}

impl Article {
    /// Research article tagged with a priority category (counts toward the quota).
    pub fn is_priority_research(&self) -> bool {
        self.is_research && self.categories.iter().any(|c| c.is_priority())
    }
}

/// Feed-fetch capability: source in, raw entries out.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, source: &Source) -> Result<Vec<RawEntry>>;
    fn name(&self) -> &'static str;
}
