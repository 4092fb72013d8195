use std::sync::Arc;

use crate::error::ValidationError;

use super::analysis::AnalysisReport;

/// Where the current analysis session stands.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Idle,
    Invalid(ValidationError),
    Requesting,
    Succeeded(Arc<AnalysisReport>),
    /// One user-facing message; never a raw transport error.
    Failed(String),
}

impl PipelineState {
    pub fn is_requesting(&self) -> bool {
        matches!(self, Self::Requesting)
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }

    pub fn can_request(&self) -> bool {
        matches!(self, Self::Idle | Self::Invalid(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Invalid(_) => "invalid",
            Self::Requesting => "requesting",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}
