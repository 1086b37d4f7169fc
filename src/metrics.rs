use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the digest series.
    pub fn init() -> anyhow::Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new().install_recorder()?;

        describe_counter!("digest_runs_total", "Completed digest job runs.");
        describe_gauge!("digest_items", "Articles in the last persisted digest.");
        describe_gauge!("digest_last_run_ts", "Unix ts of the last digest run.");
        describe_counter!(
            "scores_cache_hits_total",
            "Runs that reused the cached weekly scores."
        );
        describe_counter!(
            "scores_recomputed_total",
            "Runs that recomputed the weekly scores."
        );

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
