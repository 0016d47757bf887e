use thiserror::Error;

use crate::db::types::ProviderErrorKind;

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error("grading provider is not configured")]
    ProviderUnavailable,
    #[error("grading provider call failed after {attempts} attempts: {message}")]
    CallFailed { attempts: u32, kind: ProviderErrorKind, message: String },
    #[error("grading provider returned a malformed response: {0}")]
    MalformedResponse(String),
    #[error("invalid rubric: {0}")]
    InvalidRubric(String),
    #[error("rubric has no achievable score")]
    ZeroMaxScore,
    #[error("grading queue is full")]
    QueueFull,
    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
}

impl GradingError {
    /// Short text stored on a failed submission. Raw provider output never reaches it.
    pub(crate) fn user_message(&self) -> String {
        match self {
            Self::ProviderUnavailable => "AI grading is not configured".to_string(),
            Self::CallFailed { attempts, kind, .. } => {
                format!("AI grading failed after {attempts} attempts ({})", kind.as_str())
            }
            Self::MalformedResponse(_) => "AI grading returned an unreadable response".to_string(),
            Self::InvalidRubric(detail) => format!("Invalid rubric: {detail}"),
            Self::ZeroMaxScore => "Rubric has no achievable score".to_string(),
            Self::QueueFull => "Grading queue is full".to_string(),
            Self::Persistence(_) => "Failed to save grading result".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable => "provider_unavailable",
            Self::CallFailed { .. } => "call_failed",
            Self::MalformedResponse(_) => "malformed_response",
            Self::InvalidRubric(_) => "invalid_rubric",
            Self::ZeroMaxScore => "zero_max_score",
            Self::QueueFull => "queue_full",
            Self::Persistence(_) => "persistence",
            Self::NotFound(_) => "not_found",
        }
    }
}
