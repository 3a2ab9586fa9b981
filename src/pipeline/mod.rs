//! The report pipeline.
//!
//! ```text
//! message ─► references ─► operation ─► cultures ─► model ─► departments ─► negatives ─► decode
//! ```
//!
//! Every stage except the model call is a pure function. A run either yields
//! the decoded document or fails with the error of the first stage that broke,
//! tagged with the last state it reached.

pub mod decode;
pub mod departments;
pub mod preprocess;
pub mod rewrite;
pub mod sanitize;
pub mod state;

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::app::ports::ModelPort;
use crate::error::{PipelineError, PipelineFailure};
use crate::observability::metrics;

pub use decode::{decode_output, ensure_decoded, Document, ModelOutput};
pub use departments::assign_departments;
pub use preprocess::normalize_message;
pub use sanitize::remove_negative_values;
pub use state::PipelineState;

/// Runs reports through pre-processing, the model and post-processing.
///
/// Holds no per-run state, so one instance can serve concurrent requests.
#[derive(Clone)]
pub struct ReportPipeline {
    model: Arc<dyn ModelPort>,
}

impl ReportPipeline {
    pub fn new(model: Arc<dyn ModelPort>) -> Self {
        Self { model }
    }

    /// Pre-processing only: the text the model would receive.
    pub fn preprocess(message: &str) -> Result<String, PipelineError> {
        normalize_message(message)
    }

    /// Post-processing only: department assignment, sanitization, decoding.
    pub fn postprocess(output: impl Into<ModelOutput>) -> Result<Document, PipelineError> {
        let assigned = assign_departments(output)?;
        let sanitized = remove_negative_values(assigned)?;
        decode_output(&sanitized)
    }

    /// Run the whole pipeline for one report.
    pub async fn run(&self, message: &str) -> Result<Document, PipelineFailure> {
        let started = Instant::now();
        let mut run = PipelineRun::new();

        let text = run.record(PipelineState::PreNormalized, Self::preprocess(message))?;
        let raw = run.record(
            PipelineState::ModelInvoked,
            self.model.invoke(&text).await.map_err(PipelineError::from),
        )?;
        let sanitized = run.record(
            PipelineState::PostProcessed,
            assign_departments(raw).and_then(remove_negative_values),
        )?;
        let document = run.record(PipelineState::Decoded, decode_output(&sanitized))?;
        run.finish();

        let records = document
            .get(crate::constants::OPERATIONS_KEY)
            .and_then(|ops| ops.as_array())
            .map_or(0, Vec::len);
        metrics::pipeline::run_succeeded(records, started.elapsed().as_secs_f64());
        info!(records, "Report pipeline finished");

        Ok(document)
    }
}

/// Tracks the state machine of one run.
struct PipelineRun {
    state: PipelineState,
}

impl PipelineRun {
    fn new() -> Self {
        debug!(state = %PipelineState::Received, "Pipeline run started");
        Self {
            state: PipelineState::Received,
        }
    }

    /// Advance to `next` on success; on error, move to FAILED and keep the
    /// state that was reached before the failing stage.
    fn record<T>(
        &mut self,
        next: PipelineState,
        result: Result<T, PipelineError>,
    ) -> Result<T, PipelineFailure> {
        match result {
            Ok(value) => {
                self.advance(next);
                Ok(value)
            }
            Err(err) => {
                let reached = self.state;
                self.state = PipelineState::Failed;
                error!(state = %reached, error = %err, "Report pipeline failed");
                metrics::pipeline::run_failed(reached.as_str());
                Err(PipelineFailure {
                    state: reached,
                    error: err,
                })
            }
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "Pipeline transition");
        self.state = next;
    }

    fn finish(&mut self) {
        self.advance(PipelineState::Success);
    }
}
