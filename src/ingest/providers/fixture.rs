// src/ingest/providers/fixture.rs
use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::ingest::feed::parse_feed;
use crate::ingest::types::{FeedFetcher, RawEntry};
use crate::sources::Source;

enum Body {
    Xml(String),
    Fail(String),
}

/// Serves feed documents from memory, keyed by feed address.
/// Unknown addresses behave like an unreachable host.
#[derive(Default)]
pub struct StaticFeedFetcher {
    feeds: HashMap<String, Body>,
}

impl StaticFeedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `xml` for `url`.
    pub fn with_feed(mut self, url: &str, xml: &str) -> Self {
        self.feeds.insert(url.to_string(), Body::Xml(xml.to_string()));
        self
    }

    /// Make `url` fail with `reason`.
    pub fn with_failure(mut self, url: &str, reason: &str) -> Self {
        self.feeds
            .insert(url.to_string(), Body::Fail(reason.to_string()));
        self
    }
}

#[async_trait]
impl FeedFetcher for StaticFeedFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<RawEntry>> {
        match self.feeds.get(&source.rss) {
            Some(Body::Xml(xml)) => parse_feed(xml),
            Some(Body::Fail(reason)) => Err(anyhow!("{}: {reason}", source.rss)),
            None => Err(anyhow!("{}: no such feed", source.rss)),
        }
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
