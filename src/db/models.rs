use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AspectScore, GradingStatus, ProviderErrorKind, UsageStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) student_id: String,
    pub(crate) essay_text: String,
    pub(crate) status: GradingStatus,
    pub(crate) grading_error: Option<String>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) retry_count: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct EssayQuestion {
    pub(crate) id: String,
    pub(crate) question_text: String,
    pub(crate) ideal_answer: Option<String>,
    pub(crate) keywords: Option<String>,
    pub(crate) rubric: Json<serde_json::Value>,
    pub(crate) round_to_five: bool,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct GradingResult {
    pub(crate) submission_id: String,
    pub(crate) score: f64,
    pub(crate) feedback: String,
    pub(crate) aspect_scores: Json<Vec<AspectScore>>,
    pub(crate) model: Option<String>,
    pub(crate) from_cache: bool,
    pub(crate) teacher_score: Option<f64>,
    pub(crate) teacher_feedback: Option<String>,
    pub(crate) revised_by: Option<String>,
    pub(crate) revised_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl GradingResult {
    /// The grade shown to the student: the teacher's revision when present.
    pub(crate) fn effective_score(&self) -> f64 {
        self.teacher_score.unwrap_or(self.score)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct CacheEntry {
    pub(crate) cache_key: String,
    pub(crate) score: f64,
    pub(crate) feedback: String,
    pub(crate) aspect_scores: Json<Vec<AspectScore>>,
    pub(crate) hit_count: i64,
    pub(crate) last_used_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone)]
pub(crate) struct UsageLogEntry {
    pub(crate) feature: &'static str,
    pub(crate) model: String,
    pub(crate) status: UsageStatus,
    pub(crate) error_type: Option<ProviderErrorKind>,
    pub(crate) prompt_tokens: Option<i64>,
    pub(crate) completion_tokens: Option<i64>,
    pub(crate) total_tokens: Option<i64>,
    pub(crate) latency_ms: i64,
    pub(crate) attempts: i32,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct StatusCounts {
    pub(crate) queued: i64,
    pub(crate) processing: i64,
    pub(crate) completed: i64,
    pub(crate) failed: i64,
}

impl StatusCounts {
    pub(crate) fn add(&mut self, status: GradingStatus, count: i64) {
        match status {
            GradingStatus::Queued => self.queued += count,
            GradingStatus::Processing => self.processing += count,
            GradingStatus::Completed => self.completed += count,
            GradingStatus::Failed => self.failed += count,
        }
    }
}
