// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod classify;
pub mod clock;
pub mod config;
pub mod ingest;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod scoring;
pub mod select;
pub mod slots;
pub mod sources;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::classify::{classify, Category, Classification};
pub use crate::clock::{Clock, FixedClock, SystemClock};
pub use crate::config::DigestConfig;
pub use crate::ingest::types::{Article, FeedFetcher, RawEntry};
pub use crate::job::{DigestJob, DigestRecord};
pub use crate::pipeline::{DigestRun, Pipeline, PipelineOutput};
pub use crate::scoring::{compute_scores, ScoreMetrics, ScoreSet, ALGORITHM_VERSION};
pub use crate::select::{select_articles, Selection, SelectionPolicy};
pub use crate::slots::{allocate_slots, SlotAllocation};
pub use crate::sources::{load_sources, Source, SourceConfigError};
pub use crate::store::{CacheOutcome, MissReason, WeightsStore};
