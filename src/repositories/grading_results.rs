use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::GradingResult;
use crate::db::types::AspectScore;
use crate::repositories::submissions::{self, StatusTransition};

pub(crate) const COLUMNS: &str = "\
    submission_id, score, feedback, aspect_scores, model, from_cache, teacher_score, \
    teacher_feedback, revised_by, revised_at, created_at, updated_at";

pub(crate) struct ResultUpsert {
    pub(crate) submission_id: String,
    pub(crate) score: f64,
    pub(crate) feedback: String,
    pub(crate) aspect_scores: Vec<AspectScore>,
    pub(crate) model: Option<String>,
    pub(crate) from_cache: bool,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) struct TeacherRevision {
    pub(crate) submission_id: String,
    pub(crate) teacher_id: String,
    pub(crate) score: f64,
    pub(crate) feedback: Option<String>,
    pub(crate) now: PrimitiveDateTime,
}

/// Writes the result and completes the submission in one transaction.
///
/// Returns `None`, writing nothing, when the submission is no longer in a state the
/// transition accepts.
pub(crate) async fn complete_with_result(
    pool: &PgPool,
    transition: &StatusTransition,
    params: ResultUpsert,
) -> Result<Option<GradingResult>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let applied =
        submissions::apply_transition(&mut *tx, &params.submission_id, transition).await?;
    if !applied {
        tx.rollback().await?;
        return Ok(None);
    }

    let result = upsert(&mut *tx, params).await?;
    tx.commit().await?;
    Ok(Some(result))
}

/// Re-grading replaces the AI fields and keeps any teacher revision.
async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    params: ResultUpsert,
) -> Result<GradingResult, sqlx::Error> {
    sqlx::query_as::<_, GradingResult>(&format!(
        "INSERT INTO grading_results
             (submission_id, score, feedback, aspect_scores, model, from_cache, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
         ON CONFLICT (submission_id) DO UPDATE
         SET score = EXCLUDED.score,
             feedback = EXCLUDED.feedback,
             aspect_scores = EXCLUDED.aspect_scores,
             model = EXCLUDED.model,
             from_cache = EXCLUDED.from_cache,
             updated_at = EXCLUDED.updated_at
         RETURNING {COLUMNS}"
    ))
    .bind(params.submission_id)
    .bind(params.score)
    .bind(params.feedback)
    .bind(Json(params.aspect_scores))
    .bind(params.model)
    .bind(params.from_cache)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_submission(
    pool: &PgPool,
    submission_id: &str,
) -> Result<Option<GradingResult>, sqlx::Error> {
    sqlx::query_as::<_, GradingResult>(&format!(
        "SELECT {COLUMNS}
         FROM grading_results
         WHERE submission_id = $1"
    ))
    .bind(submission_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn revise(
    pool: &PgPool,
    params: TeacherRevision,
) -> Result<Option<GradingResult>, sqlx::Error> {
    sqlx::query_as::<_, GradingResult>(&format!(
        "UPDATE grading_results
         SET teacher_score = $1,
             teacher_feedback = $2,
             revised_by = $3,
             revised_at = $4,
             updated_at = $4
         WHERE submission_id = $5
         RETURNING {COLUMNS}"
    ))
    .bind(params.score)
    .bind(params.feedback)
    .bind(params.teacher_id)
    .bind(params.now)
    .bind(params.submission_id)
    .fetch_optional(pool)
    .await
}
