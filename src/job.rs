//! # Digest job
//! Runs the pipeline once, persists the digest record, and owns the
//! empty-run fallback: when today produced nothing, the items of the last
//! persisted digest are carried over and the record says so.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::classify::Category;
use crate::clock::SystemClock;
use crate::config::DigestConfig;
use crate::ingest::providers::HttpFeedFetcher;
use crate::ingest::types::Article;
use crate::pipeline::{Pipeline, PipelineOutput};
use crate::scoring::ScoreMetrics;
use crate::store::{read_json, write_json_atomic};

pub const FALLBACK_NOTE: &str =
    "today's fetch was empty; fell back to the most recent successful digest";

/// One persisted digest article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestItem {
    /// Short stable id derived from the link.
    pub id: String,
    pub source_id: String,
    pub source_name: String,
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub categories: BTreeSet<Category>,
    #[serde(default)]
    pub is_research: bool,
}

impl From<&Article> for DigestItem {
    fn from(a: &Article) -> Self {
        Self {
            id: link_id(&a.link),
            source_id: a.source_id.clone(),
            source_name: a.source_name.clone(),
            title: a.title.clone(),
            link: a.link.clone(),
            published_at: a.published_at,
            summary: a.summary.clone(),
            categories: a.categories.clone(),
            is_research: a.is_research,
        }
    }
}

/// First 12 hex chars of SHA-256(link).
pub fn link_id(link: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(link.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// The persisted digest document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestRecord {
    pub generated_at: DateTime<Utc>,
    pub research_target: u32,
    pub research_selected: u32,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub fallback_from_previous: bool,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub slots: BTreeMap<String, u32>,
    #[serde(default)]
    pub metrics: BTreeMap<String, ScoreMetrics>,
    #[serde(default)]
    pub weights_file: String,
    #[serde(default)]
    pub items: Vec<DigestItem>,
}

impl DigestRecord {
    pub fn from_output(out: &PipelineOutput, weights_file: &Path) -> Self {
        let sel = &out.digest.selection;
        Self {
            generated_at: out.digest.generated_at,
            research_target: sel.research_target,
            research_selected: sel.research_selected,
            notes: sel.notes.clone(),
            fallback_from_previous: false,
            scores: out.scores.scores.clone(),
            slots: out.slots.as_map().clone(),
            metrics: out.scores.metrics.clone(),
            weights_file: weights_file.display().to_string(),
            items: sel.items.iter().map(DigestItem::from).collect(),
        }
    }

    /// Carry over `previous` items when this run selected nothing.
    /// Returns true if the fallback was applied.
    pub fn apply_fallback(&mut self, previous: Option<&DigestRecord>) -> bool {
        let usable = previous.filter(|p| !p.items.is_empty());
        match usable {
            Some(prev) if self.items.is_empty() => {
                self.items = prev.items.clone();
                self.notes.push(FALLBACK_NOTE.to_string());
                self.fallback_from_previous = true;
                true
            }
            _ => {
                self.fallback_from_previous = false;
                false
            }
        }
    }
}

/// Read the persisted digest; a missing or corrupt file is `None`.
pub fn load_digest(path: &Path) -> Option<DigestRecord> {
    match read_json::<DigestRecord>(path) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(target: "digest", error = ?e, "previous digest unreadable; ignoring");
            None
        }
    }
}

/// Serializes digest runs within the process.
pub struct DigestJob {
    pipeline: Pipeline,
    running: Mutex<()>,
}

impl DigestJob {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            running: Mutex::new(()),
        }
    }

    /// Production wiring: HTTP feeds and the wall clock.
    pub fn from_config(cfg: DigestConfig) -> Result<Self> {
        let fetcher = HttpFeedFetcher::new(cfg.fetch_timeout(), &cfg.user_agent)?;
        Ok(Self::new(Pipeline::new(
            cfg,
            Arc::new(fetcher),
            Arc::new(SystemClock),
        )))
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn digest_path(&self) -> &Path {
        &self.pipeline.config().digest_path
    }

    /// Run once, apply the fallback policy, and persist the record.
    pub async fn run_once(&self) -> Result<DigestRecord> {
        let _running = self.running.lock().await;
        let cfg = self.pipeline.config();

        let out = self
            .pipeline
            .run()
            .await
            .context("loading source configuration")?;

        let mut record = DigestRecord::from_output(&out, &cfg.weights_path);
        let previous = load_digest(&cfg.digest_path);
        if record.apply_fallback(previous.as_ref()) {
            tracing::warn!(
                target: "digest",
                items = record.items.len(),
                "no articles today; reusing previous digest"
            );
        }

        write_json_atomic(&cfg.digest_path, &record)
            .with_context(|| format!("writing digest to {}", cfg.digest_path.display()))?;

        counter!("digest_runs_total").increment(1);
        gauge!("digest_items").set(record.items.len() as f64);
        gauge!("digest_last_run_ts").set(record.generated_at.timestamp() as f64);
        tracing::info!(
            target: "digest",
            path = %cfg.digest_path.display(),
            items = record.items.len(),
            fallback = record.fallback_from_previous,
            "daily digest written"
        );
        Ok(record)
    }
}
