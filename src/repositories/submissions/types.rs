use time::PrimitiveDateTime;

use crate::db::types::GradingStatus;

pub(crate) const COLUMNS: &str = "\
    id, question_id, student_id, essay_text, status, grading_error, graded_at, retry_count, \
    created_at, updated_at";

pub(crate) struct NewSubmission {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) student_id: String,
    pub(crate) essay_text: String,
    pub(crate) created_at: PrimitiveDateTime,
}

/// A conditional status write: applied only while the row is in one of `from`.
#[derive(Debug, Clone)]
pub(crate) struct StatusTransition {
    pub(crate) from: Vec<GradingStatus>,
    pub(crate) to: GradingStatus,
    pub(crate) error: Option<String>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) increment_retry: bool,
    pub(crate) at: PrimitiveDateTime,
}

impl StatusTransition {
    pub(crate) fn from_labels(&self) -> Vec<&'static str> {
        self.from.iter().map(|status| status.as_str()).collect()
    }
}
