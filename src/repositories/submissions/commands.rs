use sqlx::PgPool;

use crate::db::models::Submission;
use crate::db::types::GradingStatus;

use super::types::{NewSubmission, StatusTransition, COLUMNS};

pub(crate) async fn insert(pool: &PgPool, params: NewSubmission) -> Result<Submission, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "INSERT INTO essay_submissions
             (id, question_id, student_id, essay_text, status, retry_count, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, 0, $6, $6)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.question_id)
    .bind(params.student_id)
    .bind(params.essay_text)
    .bind(GradingStatus::Queued)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn apply_transition(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    transition: &StatusTransition,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE essay_submissions
         SET status = $1,
             grading_error = $2,
             graded_at = $3,
             retry_count = retry_count + $4,
             updated_at = $5
         WHERE id = $6
           AND status::text = ANY($7)",
    )
    .bind(transition.to)
    .bind(transition.error.as_deref())
    .bind(transition.graded_at)
    .bind(i32::from(transition.increment_retry))
    .bind(transition.at)
    .bind(id)
    .bind(transition.from_labels())
    .execute(executor)
    .await?;

    Ok(updated.rows_affected() > 0)
}
