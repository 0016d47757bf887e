use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{StatusCounts, Submission};
use crate::db::types::GradingStatus;

use super::types::COLUMNS;

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS}
         FROM essay_submissions
         WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn count_by_status(pool: &PgPool) -> Result<StatusCounts, sqlx::Error> {
    let rows = sqlx::query_as::<_, (GradingStatus, i64)>(
        "SELECT status, COUNT(*)
         FROM essay_submissions
         GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let mut counts = StatusCounts::default();
    for (status, count) in rows {
        counts.add(status, count);
    }
    Ok(counts)
}

pub(crate) async fn list_ids_by_status(
    pool: &PgPool,
    status: GradingStatus,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT id
         FROM essay_submissions
         WHERE status = $1
         ORDER BY created_at",
    )
    .bind(status)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_stale_processing(
    pool: &PgPool,
    updated_before: PrimitiveDateTime,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT id
         FROM essay_submissions
         WHERE status = $1
           AND updated_at < $2
         ORDER BY updated_at",
    )
    .bind(GradingStatus::Processing)
    .bind(updated_before)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_failed_for_retry(
    pool: &PgPool,
    max_retry_count: i32,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT id
         FROM essay_submissions
         WHERE status = $1
           AND retry_count < $2
         ORDER BY updated_at",
    )
    .bind(GradingStatus::Failed)
    .bind(max_retry_count)
    .fetch_all(pool)
    .await
}
