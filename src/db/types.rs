use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "gradingstatus", rename_all = "lowercase")]
pub(crate) enum GradingStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl GradingStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum UsageStatus {
    Success,
    Error,
}

impl UsageStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Coarse classification of a failed provider call, as stored in the usage log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ProviderErrorKind {
    Timeout,
    RateLimit,
    Auth,
    Connection,
    Unknown,
}

impl ProviderErrorKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::Auth => "auth",
            Self::Connection => "connection",
            Self::Unknown => "unknown",
        }
    }

    pub(crate) fn classify(message: &str) -> Self {
        let lowered = message.to_ascii_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|needle| lowered.contains(needle));

        if has(&["timeout", "timed out", "deadline"]) {
            Self::Timeout
        } else if has(&["429", "rate limit", "rate_limit", "too many requests", "quota"]) {
            Self::RateLimit
        } else if has(&["401", "403", "unauthorized", "forbidden", "api key", "permission"]) {
            Self::Auth
        } else if has(&["connection", "connect", "dns", "network", "reset by peer", "eof"]) {
            Self::Connection
        } else {
            Self::Unknown
        }
    }
}

/// One rubric aspect score as returned by the provider and persisted with a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AspectScore {
    pub(crate) aspect: String,
    pub(crate) score: i64,
}

impl AspectScore {
    pub(crate) fn new(aspect: impl Into<String>, score: i64) -> Self {
        Self { aspect: aspect.into(), score }
    }
}
