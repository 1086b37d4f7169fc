//! # Pipeline
//! One digest run: sources → articles → scores → slots → selection.
//!
//! Only an unusable source configuration is fatal, and it fails before any
//! feed is fetched. Everything else degrades into notes and counters.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::DigestConfig;
use crate::ingest::types::{Article, FeedFetcher};
use crate::ingest::{load_articles, IngestReport};
use crate::scoring::{ScoreMetrics, ScoreSet};
use crate::select::{select_articles, Selection};
use crate::slots::{allocate_slots, SlotAllocation};
use crate::sources::{load_sources, SourceConfigError};
use crate::store::{CacheOutcome, WeightsStore};

/// The selected digest together with when it was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestRun {
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub selection: Selection,
}

/// Everything a run produces, for persistence or display.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub digest: DigestRun,
    pub scores: ScoreSet,
    /// Slots as allocated, before selection consumed them.
    pub slots: SlotAllocation,
    pub cache: CacheOutcome,
    pub fetched_count: usize,
    pub today_count: usize,
    pub failed_sources: Vec<String>,
}

impl PipelineOutput {
    pub fn metrics(&self) -> &std::collections::BTreeMap<String, ScoreMetrics> {
        &self.scores.metrics
    }
}

pub struct Pipeline {
    cfg: DigestConfig,
    fetcher: Arc<dyn FeedFetcher>,
    clock: Arc<dyn Clock>,
    weights: WeightsStore,
}

impl Pipeline {
    pub fn new(cfg: DigestConfig, fetcher: Arc<dyn FeedFetcher>, clock: Arc<dyn Clock>) -> Self {
        let weights = WeightsStore::new(cfg.weights_path.clone());
        Self {
            cfg,
            fetcher,
            clock,
            weights,
        }
    }

    pub fn config(&self) -> &DigestConfig {
        &self.cfg
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub async fn run(&self) -> Result<PipelineOutput, SourceConfigError> {
        let sources = load_sources(&self.cfg.sources_path)?;
        let now = self.clock.now();

        let IngestReport {
            articles,
            dropped,
            failed_sources,
        } = load_articles(&sources, self.fetcher.as_ref()).await;
        tracing::info!(
            target: "digest",
            sources = sources.len(),
            fetched = articles.len(),
            dropped,
            failed = failed_sources.len(),
            "articles ingested"
        );

        let (scores, cache) = self
            .weights
            .load_or_update_scores(&sources, &articles, now)
            .await;
        let slots = allocate_slots(
            &scores.scores,
            self.cfg.total_slots,
            self.cfg.max_slots_per_source,
        );

        let today = todays_articles(&articles, now);
        let (selection, slots_left) =
            select_articles(&today, slots.clone(), &scores, self.cfg.selection_policy());

        tracing::info!(
            target: "digest",
            ?cache,
            allocated = slots.total(),
            unused = slots_left.total(),
            today = today.len(),
            selected = selection.items.len(),
            research = selection.research_selected,
            "digest selected"
        );

        Ok(PipelineOutput {
            digest: DigestRun {
                generated_at: now,
                selection,
            },
            scores,
            slots,
            cache,
            fetched_count: articles.len(),
            today_count: today.len(),
            failed_sources,
        })
    }
}

/// Articles published on `now`'s UTC date with at least one target category.
pub fn todays_articles(articles: &[Article], now: DateTime<Utc>) -> Vec<Article> {
    let today = now.date_naive();
    articles
        .iter()
        .filter(|a| a.published_at.date_naive() == today && !a.categories.is_empty())
        .cloned()
        .collect()
}
