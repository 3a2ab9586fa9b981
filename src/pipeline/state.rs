use std::fmt;

use serde::Serialize;

/// Progress of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Received,
    PreNormalized,
    ModelInvoked,
    PostProcessed,
    Decoded,
    Success,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Received => "RECEIVED",
            PipelineState::PreNormalized => "PRE_NORMALIZED",
            PipelineState::ModelInvoked => "MODEL_INVOKED",
            PipelineState::PostProcessed => "POST_PROCESSED",
            PipelineState::Decoded => "DECODED",
            PipelineState::Success => "SUCCESS",
            PipelineState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Success | PipelineState::Failed)
    }

    /// The linear successor, or `None` once terminal.
    pub fn next(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Received => Some(PipelineState::PreNormalized),
            PipelineState::PreNormalized => Some(PipelineState::ModelInvoked),
            PipelineState::ModelInvoked => Some(PipelineState::PostProcessed),
            PipelineState::PostProcessed => Some(PipelineState::Decoded),
            PipelineState::Decoded => Some(PipelineState::Success),
            PipelineState::Success | PipelineState::Failed => None,
        }
    }

    /// Any non-terminal state may fail; otherwise only the linear successor is allowed.
    pub fn can_transition_to(&self, target: PipelineState) -> bool {
        if target == PipelineState::Failed {
            return !self.is_terminal();
        }
        self.next() == Some(target)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
