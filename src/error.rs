use thiserror::Error;

use crate::pipeline::state::PipelineState;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Token signing failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error: {message}")]
    Api { message: String },
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure raised by a model invoker. The pipeline never catches these.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("model response had no alternatives")]
    EmptyResponse,

    #[error("model invoker misconfigured: {0}")]
    Config(String),
}

/// Stage-local failure inside the report pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Model output is not valid JSON after fence stripping. Carries the cleaned text.
    #[error("Не удалось декодировать JSON. Получен текст:\n{text}")]
    Decode {
        text: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("department list has {departments} entries but `{field}` has {values}")]
    IndexAlignment {
        field: String,
        departments: usize,
        values: usize,
    },

    #[error("text rewrite failed: {0}")]
    Transform(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl PipelineError {
    pub fn decode(text: impl Into<String>, source: serde_json::Error) -> Self {
        PipelineError::Decode {
            text: text.into(),
            source: Some(source),
        }
    }
}

/// A pipeline error together with the last state the run reached.
#[derive(Error, Debug)]
#[error("pipeline failed after {state}: {error}")]
pub struct PipelineFailure {
    pub state: PipelineState,
    #[source]
    pub error: PipelineError,
}
