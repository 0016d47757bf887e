use std::sync::OnceLock;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Provider calls take seconds, retries add up to a few more.
const GRADING_DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0, 160.0];

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("grading_duration_seconds".to_string()),
            GRADING_DURATION_BUCKETS,
        )?
        .install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    describe();
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    metrics::describe_counter!("grading_jobs_total", "Grading jobs by outcome");
    metrics::describe_counter!("grading_provider_calls_total", "Individual provider calls by status");
    metrics::describe_counter!("grading_cache_total", "Grading cache lookups by result");
    metrics::describe_counter!("grading_queue_rejected_total", "Jobs refused by the full queue");
    metrics::describe_counter!("submissions_retried_total", "Failed submissions sent back for grading");
    metrics::describe_histogram!(
        "grading_duration_seconds",
        metrics::Unit::Seconds,
        "Wall time of one grading job"
    );
}
