// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::job::DigestJob;

pub const ENV_SCHEDULE_SECS: &str = "DIGEST_SCHEDULE_SECS";

/// Period from `DIGEST_SCHEDULE_SECS`, if set to a positive number.
pub fn period_from_env() -> Option<Duration> {
    std::env::var(ENV_SCHEDULE_SECS)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|&n| n > 0)
        .map(Duration::from_secs)
}

/// Run the digest job every `period`, first tick immediately.
/// Failures are logged; the loop keeps going.
pub fn spawn_digest_scheduler(job: Arc<DigestJob>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match job.run_once().await {
                Ok(record) => tracing::info!(
                    target: "digest",
                    items = record.items.len(),
                    fallback = record.fallback_from_previous,
                    "scheduled digest tick"
                ),
                Err(e) => tracing::error!(target: "digest", error = ?e, "scheduled digest failed"),
            }
        }
    })
}
