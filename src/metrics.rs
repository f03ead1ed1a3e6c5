use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static DESCRIBED: OnceCell<()> = OnceCell::new();

/// Register help text for every curator metric once per process.
pub fn ensure_described() {
    DESCRIBED.get_or_init(describe_all);
}

fn describe_all() {
    describe_counter!("curator_articles_fetched_total", "Articles returned by all sources");
    describe_counter!("curator_fetch_errors_total", "Source fetches that failed");
    describe_histogram!("curator_fetch_ms", "Per-source fetch latency in milliseconds");
    describe_gauge!("curator_selected_articles", "Articles picked by the last selection");
    describe_counter!("curator_probes_total", "Feed liveness probes, by outcome");
    describe_counter!("curator_evictions_total", "Sources evicted from the roster");
    describe_counter!("curator_repairs_total", "Sources moved to a new url by the oracle");
    describe_counter!("curator_discovered_total", "Sources added by discovery, by language");
    describe_counter!("curator_oracle_calls_total", "Oracle queries issued");
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_all();
        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus exposition format.
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
