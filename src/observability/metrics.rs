//! Metrics for seeding runs.
//!
//! Counters and histograms go through the `metrics` facade into a Prometheus
//! recorder. A run is a short-lived job, so when a Pushgateway is configured
//! the rendered metrics are pushed once at the end instead of being scraped.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

use crate::constants::ENV_PUSHGATEWAY_URL;

/// All metric names used by the seeder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    UnitsRead,
    UnitsSkipped,
    RecordsImported,
    RecordsRejected,
    DuplicateConflicts,
    UploadErrors,
    Batches,
    BatchDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::UnitsRead => "seeder_units_read_total",
            MetricName::UnitsSkipped => "seeder_units_skipped_total",
            MetricName::RecordsImported => "seeder_records_imported_total",
            MetricName::RecordsRejected => "seeder_records_rejected_total",
            MetricName::DuplicateConflicts => "seeder_duplicate_conflicts_total",
            MetricName::UploadErrors => "seeder_upload_errors_total",
            MetricName::Batches => "seeder_batches_total",
            MetricName::BatchDuration => "seeder_batch_duration_seconds",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        [
            MetricName::UnitsRead,
            MetricName::UnitsSkipped,
            MetricName::RecordsImported,
            MetricName::RecordsRejected,
            MetricName::DuplicateConflicts,
            MetricName::UploadErrors,
            MetricName::Batches,
            MetricName::BatchDuration,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct MetricsState {
    handle: metrics_exporter_prometheus::PrometheusHandle,
    pushgateway_url: Option<String>,
    job: String,
}

static METRICS_STATE: OnceLock<MetricsState> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once; later calls are no-ops.
pub fn init(job_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_STATE.get().is_some() {
        return Ok(());
    }

    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;

    let pushgateway_url = std::env::var(ENV_PUSHGATEWAY_URL).ok().filter(|u| !u.trim().is_empty());
    if pushgateway_url.is_some() {
        info!("Metrics system initialized with push gateway support");
    } else {
        info!("Metrics system initialized (no push gateway)");
    }

    METRICS_STATE
        .set(MetricsState {
            handle,
            pushgateway_url,
            job: job_name.to_string(),
        })
        .ok();
    Ok(())
}

/// Push everything recorded so far to the Pushgateway, grouped under this run.
///
/// Does nothing when no Pushgateway is configured. Failures are logged, never fatal.
pub async fn push_all(instance: &str) {
    let Some(state) = METRICS_STATE.get() else {
        return;
    };
    let Some(url) = state.pushgateway_url.as_deref() else {
        return;
    };

    let push_url = format!(
        "{}/metrics/job/{}/instance/{}",
        url.trim_end_matches('/'),
        state.job,
        instance
    );
    let body = state.handle.render();

    let client = match reqwest::Client::builder().timeout(Duration::from_secs(10)).build() {
        Ok(c) => c,
        Err(e) => {
            warn!("Could not build Pushgateway client: {}", e);
            return;
        }
    };
    match client
        .put(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => info!("📊 Pushed metrics to {}", push_url),
        Ok(resp) => warn!("Pushgateway returned {} for {}", resp.status(), push_url),
        Err(e) => warn!("Failed to push metrics to {}: {}", push_url, e),
    }
}

// ============================================================================
// Extraction Metrics
// ============================================================================

pub mod extract {
    use super::MetricName;

    pub fn unit_read() {
        ::metrics::counter!(MetricName::UnitsRead.as_str()).increment(1);
    }

    pub fn unit_skipped(reason: &str) {
        ::metrics::counter!(MetricName::UnitsSkipped.as_str(), "reason" => reason.to_string()).increment(1);
    }
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;

    /// Record that a row was rejected, labelled by reason code
    pub fn record_rejected(reason: &str) {
        ::metrics::counter!(MetricName::RecordsRejected.as_str(), "reason" => reason.to_string()).increment(1);
    }
}

// ============================================================================
// Upload Metrics
// ============================================================================

pub mod upload {
    use super::MetricName;

    /// Record one finished batch and its effect on the totals
    pub fn batch_finished(outcome: &str, secs: f64) {
        ::metrics::counter!(MetricName::Batches.as_str(), "outcome" => outcome.to_string()).increment(1);
        ::metrics::histogram!(MetricName::BatchDuration.as_str()).record(secs);
    }

    pub fn records_imported(count: u64) {
        ::metrics::counter!(MetricName::RecordsImported.as_str()).increment(count);
    }

    pub fn duplicate_conflicts(count: u64) {
        ::metrics::counter!(MetricName::DuplicateConflicts.as_str()).increment(count);
    }

    pub fn errors(count: u64) {
        ::metrics::counter!(MetricName::UploadErrors.as_str()).increment(count);
    }
}
