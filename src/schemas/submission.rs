use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{GradingResult, Submission};
use crate::db::types::{AspectScore, GradingStatus};
use crate::services::intake::SubmitOutcome;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CreateSubmissionRequest {
    #[validate(length(min = 1, max = 36, message = "question_id must be 1-36 characters"))]
    pub(crate) question_id: String,
    #[validate(length(min = 1, max = 36, message = "student_id must be 1-36 characters"))]
    pub(crate) student_id: String,
    #[validate(length(min = 1, max = 50000, message = "essay_text must be 1-50000 characters"))]
    pub(crate) essay_text: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RetrySubmissionsRequest {
    #[validate(length(min = 1, max = 500, message = "submission_ids must hold 1-500 ids"))]
    pub(crate) submission_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ReviseGradeRequest {
    #[validate(length(min = 1, max = 36, message = "teacher_id must be 1-36 characters"))]
    pub(crate) teacher_id: String,
    #[validate(range(min = 0.0, max = 100.0, message = "score must be between 0 and 100"))]
    pub(crate) score: f64,
    #[serde(default)]
    pub(crate) feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradingResultResponse {
    pub(crate) score: f64,
    pub(crate) ai_score: f64,
    pub(crate) teacher_score: Option<f64>,
    pub(crate) feedback: String,
    pub(crate) teacher_feedback: Option<String>,
    pub(crate) aspect_scores: Vec<AspectScore>,
    pub(crate) model: Option<String>,
    pub(crate) from_cache: bool,
    pub(crate) revised_by: Option<String>,
    pub(crate) revised_at: Option<String>,
}

impl From<GradingResult> for GradingResultResponse {
    fn from(result: GradingResult) -> Self {
        Self {
            score: result.effective_score(),
            ai_score: result.score,
            teacher_score: result.teacher_score,
            feedback: result.feedback,
            teacher_feedback: result.teacher_feedback,
            aspect_scores: result.aspect_scores.0,
            model: result.model,
            from_cache: result.from_cache,
            revised_by: result.revised_by,
            revised_at: result.revised_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) student_id: String,
    pub(crate) status: GradingStatus,
    pub(crate) grading_error: Option<String>,
    pub(crate) retry_count: i32,
    pub(crate) graded_at: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
    pub(crate) result: Option<GradingResultResponse>,
}

impl SubmissionResponse {
    pub(crate) fn new(submission: Submission, result: Option<GradingResult>) -> Self {
        Self {
            id: submission.id,
            question_id: submission.question_id,
            student_id: submission.student_id,
            status: submission.status,
            grading_error: submission.grading_error,
            retry_count: submission.retry_count,
            graded_at: submission.graded_at.map(format_primitive),
            created_at: format_primitive(submission.created_at),
            updated_at: format_primitive(submission.updated_at),
            result: result.map(GradingResultResponse::from),
        }
    }
}

impl From<SubmitOutcome> for SubmissionResponse {
    fn from(outcome: SubmitOutcome) -> Self {
        Self::new(outcome.submission, outcome.result)
    }
}
