// src/ingest/providers/http.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::ingest::feed::parse_feed;
use crate::ingest::types::{FeedFetcher, RawEntry};
use crate::sources::Source;

pub const DEFAULT_USER_AGENT: &str = concat!("news-digest/", env!("CARGO_PKG_VERSION"));

/// Fetches feeds over HTTP with a bounded per-request timeout.
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("building feed http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<RawEntry>> {
        let resp = self
            .client
            .get(&source.rss)
            .send()
            .await
            .with_context(|| format!("GET {}", source.rss))?
            .error_for_status()
            .with_context(|| format!("feed status for {}", source.id))?;
        let body = resp
            .text()
            .await
            .with_context(|| format!("reading feed body for {}", source.id))?;
        parse_feed(&body).with_context(|| format!("parsing feed for {}", source.id))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
