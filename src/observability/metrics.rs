//! Metrics for the report pipeline
//!
//! Recording goes through the `metrics` facade; a Prometheus recorder is
//! installed once by [`init_metrics`] and rendered on `GET /metrics`. Without
//! an installed recorder every call below is a no-op, which keeps unit tests
//! free of global setup.

use std::fmt;
use std::sync::{Once, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Every metric name the service records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Pipeline
    PipelineRunsSuccess,
    PipelineRunsError,
    PipelineDuration,
    PipelineRecordsEmitted,

    // Model
    ModelRequestsSuccess,
    ModelRequestsError,
    ModelRequestDuration,

    // Artifacts
    SheetRowsWritten,
    UploadsSuccess,
    UploadsError,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::PipelineRunsSuccess => "agro_pipeline_runs_success_total",
            MetricName::PipelineRunsError => "agro_pipeline_runs_error_total",
            MetricName::PipelineDuration => "agro_pipeline_duration_seconds",
            MetricName::PipelineRecordsEmitted => "agro_pipeline_records_emitted_total",
            MetricName::ModelRequestsSuccess => "agro_model_requests_success_total",
            MetricName::ModelRequestsError => "agro_model_requests_error_total",
            MetricName::ModelRequestDuration => "agro_model_request_duration_seconds",
            MetricName::SheetRowsWritten => "agro_sheet_rows_written_total",
            MetricName::UploadsSuccess => "agro_uploads_success_total",
            MetricName::UploadsError => "agro_uploads_error_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            PipelineRunsSuccess,
            PipelineRunsError,
            PipelineDuration,
            PipelineRecordsEmitted,
            ModelRequestsSuccess,
            ModelRequestsError,
            ModelRequestDuration,
            SheetRowsWritten,
            UploadsSuccess,
            UploadsError,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Install the Prometheus recorder. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_err() {
                warn!("METRICS: handle was already set");
            }
            info!("Prometheus recorder installed");
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
        }
    });
}

/// Prometheus text exposition of everything recorded so far.
pub fn render_metrics() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}

pub mod pipeline {
    use super::MetricName;

    /// A run reached SUCCESS
    pub fn run_succeeded(records: usize, duration_secs: f64) {
        ::metrics::counter!(MetricName::PipelineRunsSuccess.as_str()).increment(1);
        ::metrics::counter!(MetricName::PipelineRecordsEmitted.as_str()).increment(records as u64);
        ::metrics::histogram!(MetricName::PipelineDuration.as_str()).record(duration_secs);
    }

    /// A run failed; `state` is the last state it reached
    pub fn run_failed(state: &str) {
        ::metrics::counter!(MetricName::PipelineRunsError.as_str(), "state" => state.to_string())
            .increment(1);
    }
}

pub mod model {
    use super::MetricName;

    pub fn request_succeeded(duration_secs: f64) {
        ::metrics::counter!(MetricName::ModelRequestsSuccess.as_str()).increment(1);
        ::metrics::histogram!(MetricName::ModelRequestDuration.as_str()).record(duration_secs);
    }

    pub fn request_failed(reason: &str) {
        ::metrics::counter!(MetricName::ModelRequestsError.as_str(), "reason" => reason.to_string())
            .increment(1);
    }
}

pub mod artifacts {
    use super::MetricName;

    pub fn rows_written(rows: usize) {
        ::metrics::counter!(MetricName::SheetRowsWritten.as_str()).increment(rows as u64);
    }

    pub fn upload_succeeded() {
        ::metrics::counter!(MetricName::UploadsSuccess.as_str()).increment(1);
    }

    pub fn upload_failed() {
        ::metrics::counter!(MetricName::UploadsError.as_str()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn metric_names_are_unique_and_prefixed() {
        let names: HashSet<_> = MetricName::all_metrics().map(|m| m.as_str()).collect();
        assert_eq!(names.len(), MetricName::all_metrics().count());
        assert!(names.iter().all(|n| n.starts_with("agro_")));
    }

    #[test]
    fn recording_without_recorder_is_harmless() {
        pipeline::run_succeeded(2, 0.1);
        pipeline::run_failed("MODEL_INVOKED");
        artifacts::rows_written(2);
    }
}
