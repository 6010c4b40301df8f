// src/metrics.rs
//! Run counters and the optional Prometheus textfile export.
//!
//! The binary runs once and exits, so nothing is served over HTTP. When
//! `METRICS_TEXTFILE` is set, the recorder is installed at startup and the
//! exposition text is written to that path after the run (node_exporter
//! textfile collector layout).

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Total entries parsed from feeds.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Feed fetch/parse failures."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_counter!(
            "filter_rejected_total",
            "Candidates rejected by the reconciliation filter, by reason."
        );
        describe_counter!("articles_posted_total", "Articles delivered and recorded.");
        describe_counter!(
            "articles_failed_total",
            "Articles routed to the skipped store, by stage."
        );
        describe_counter!(
            "delivery_retries_total",
            "Delivery attempts repeated after a transient failure."
        );
        describe_counter!(
            "summarizer_loads_total",
            "Summarization model initializations."
        );
        describe_gauge!("run_last_duration_ms", "Duration of the last run.");
        describe_gauge!("run_last_timestamp", "Unix time the last run finished.");
    });
}

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the global Prometheus recorder once. Later calls return the same
/// handle.
pub fn install_recorder() -> Result<PrometheusHandle> {
    if let Some(h) = HANDLE.get() {
        return Ok(h.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("prometheus: install recorder")?;
    ensure_metrics_described();
    Ok(HANDLE.get_or_init(|| handle).clone())
}

/// Stamp the run gauges and write the exposition text atomically.
pub fn write_textfile(handle: &PrometheusHandle, path: &Path, duration_ms: f64) -> Result<()> {
    gauge!("run_last_duration_ms").set(duration_ms);
    gauge!("run_last_timestamp").set(chrono::Utc::now().timestamp() as f64);

    let body = handle.render();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating metrics dir {}", parent.display()))?;
    }
    let tmp = path.with_extension("prom.tmp");
    {
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(body.as_bytes())?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = body.len(), "metrics textfile written");
    Ok(())
}
