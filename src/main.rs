//! News Digest: server entrypoint
//! Boots the Axum HTTP server over the persisted digest, optionally with a
//! periodic digest job.

use std::sync::Arc;

use news_digest::api::{self, AppState};
use news_digest::config::DigestConfig;
use news_digest::job::DigestJob;
use news_digest::metrics::Metrics;
use news_digest::scheduler::{period_from_env, spawn_digest_scheduler};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    // The host runtime may already own the global subscriber.
    news_digest::logging::init();

    let cfg = DigestConfig::load_default()?;
    let job = DigestJob::from_config(cfg)?;
    let state = AppState { job: Arc::new(job) };

    if let Some(period) = period_from_env() {
        tracing::info!(target: "digest", secs = period.as_secs(), "digest scheduler enabled");
        spawn_digest_scheduler(state.job.clone(), period);
    }

    let mut router = api::router(state);
    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "prometheus recorder not installed; /metrics disabled"),
    }

    Ok(router.into())
}
