use axum::{http::StatusCode, routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// Describe every metric once per process.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_items_total", "Raw items handed to the pipeline.");
        describe_counter!(
            "pipeline_duplicates_total",
            "Items suppressed by fingerprint dedup."
        );
        describe_counter!("pipeline_alerts_total", "Alerts produced, by level.");
        describe_counter!(
            "pipeline_low_total",
            "Items classified low (counted, never alerted)."
        );
        describe_counter!(
            "router_sends_total",
            "Channel sends by channel and outcome."
        );
        describe_counter!(
            "dedup_store_errors_total",
            "Dedup store failures (degraded to not-duplicate)."
        );
        describe_counter!("provider_errors_total", "Provider fetch/parse errors.");
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts when the pipeline last processed a batch."
        );
    });
}

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Fails if a recorder is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// `/metrics` route; answers 503 when no recorder is installed.
pub fn router(metrics: Option<Metrics>) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let m = metrics.clone();
            async move {
                match m {
                    Some(m) => (StatusCode::OK, m.render()),
                    None => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "metrics recorder not installed".to_string(),
                    ),
                }
            }
        }),
    )
}
