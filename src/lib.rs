pub mod app;
pub mod config;
pub mod constants;
pub mod error;
pub mod infra;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod rows;
pub mod server;

pub use error::{AppError, ModelError, PipelineError, PipelineFailure};
pub use pipeline::{Document, ModelOutput, PipelineState, ReportPipeline};
