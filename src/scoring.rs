//! # Weekly Scorer
//! Per-source authority score from the trailing seven days of articles.
//!
//! ```text
//! volume         = articles in window
//! volume_impact  = ln(1 + volume)
//! research_ratio = research / volume          (0 when volume is 0)
//! topic_coverage = |categories touched| / |target set|
//! impact_factor  = 1 + 0.45·volume_impact + 0.35·research_ratio + 0.20·topic_coverage
//! score          = round4(base_authority · impact_factor)
//! ```
//!
//! Bump [`ALGORITHM_VERSION`] whenever the formula changes; cached scores
//! carrying another version are discarded.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::classify::Category;
use crate::ingest::types::Article;
use crate::sources::Source;

pub const ALGORITHM_VERSION: &str = "v2-impact-weighted";

pub const W_VOLUME: f64 = 0.45;
pub const W_RESEARCH: f64 = 0.35;
pub const W_COVERAGE: f64 = 0.20;

/// Length of the scoring window and of the cache validity.
pub fn score_window() -> Duration {
    Duration::days(7)
}

/// Breakdown behind one source's score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetrics {
    pub base_authority: f64,
    pub weekly_volume: f64,
    pub volume_impact: f64,
    pub research_ratio: f64,
    pub topic_coverage: f64,
    pub impact_factor: f64,
    pub score: f64,
}

/// Scores and their breakdown, keyed by source id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub scores: BTreeMap<String, f64>,
    pub metrics: BTreeMap<String, ScoreMetrics>,
}

impl ScoreSet {
    pub fn score_of(&self, source_id: &str) -> f64 {
        self.scores.get(source_id).copied().unwrap_or(0.0)
    }

    pub fn covers<'a>(&self, mut ids: impl Iterator<Item = &'a str>) -> bool {
        ids.all(|id| self.scores.contains_key(id))
    }
}

pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[derive(Default)]
struct Tally {
    volume: u32,
    research: u32,
    topics: BTreeSet<Category>,
}

/// Score every source from the articles published in `[now - 7d, ..]`.
/// Pure: the same inputs always give bit-identical output.
pub fn compute_scores(sources: &[Source], articles: &[Article], now: DateTime<Utc>) -> ScoreSet {
    let since = now - score_window();

    let mut tallies: HashMap<&str, Tally> = sources
        .iter()
        .map(|s| (s.id.as_str(), Tally::default()))
        .collect();

    for a in articles.iter().filter(|a| a.published_at >= since) {
        // Articles from unknown sources never count.
        let Some(t) = tallies.get_mut(a.source_id.as_str()) else {
            continue;
        };
        t.volume += 1;
        if a.is_research {
            t.research += 1;
        }
        t.topics.extend(a.categories.iter().copied());
    }

    let target_len = Category::ALL.len() as f64;
    let mut out = ScoreSet::default();
    for s in sources {
        let t = &tallies[s.id.as_str()];
        let volume = f64::from(t.volume);
        let volume_impact = volume.ln_1p();
        let research_ratio = if t.volume > 0 {
            f64::from(t.research) / volume
        } else {
            0.0
        };
        let topic_coverage = t.topics.len() as f64 / target_len;
        let impact_factor = 1.0
            + W_VOLUME * volume_impact
            + W_RESEARCH * research_ratio
            + W_COVERAGE * topic_coverage;
        let score = round4(s.base_authority * impact_factor);

        out.scores.insert(s.id.clone(), score);
        out.metrics.insert(
            s.id.clone(),
            ScoreMetrics {
                base_authority: round4(s.base_authority),
                weekly_volume: volume,
                volume_impact: round4(volume_impact),
                research_ratio: round4(research_ratio),
                topic_coverage: round4(topic_coverage),
                impact_factor: round4(impact_factor),
                score,
            },
        );
    }
    out
}
