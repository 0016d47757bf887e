use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::CacheEntry;
use crate::db::types::AspectScore;

pub(crate) const COLUMNS: &str =
    "cache_key, score, feedback, aspect_scores, hit_count, last_used_at, created_at";

/// Returns the entry and records the hit in the same statement.
pub(crate) async fn touch_and_fetch(
    pool: &PgPool,
    cache_key: &str,
    now: PrimitiveDateTime,
) -> Result<Option<CacheEntry>, sqlx::Error> {
    sqlx::query_as::<_, CacheEntry>(&format!(
        "UPDATE grading_cache
         SET hit_count = hit_count + 1,
             last_used_at = $1
         WHERE cache_key = $2
         RETURNING {COLUMNS}"
    ))
    .bind(now)
    .bind(cache_key)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn upsert(
    pool: &PgPool,
    cache_key: &str,
    score: f64,
    feedback: &str,
    aspect_scores: &[AspectScore],
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO grading_cache
             (cache_key, score, feedback, aspect_scores, hit_count, last_used_at, created_at)
         VALUES ($1, $2, $3, $4, 1, $5, $5)
         ON CONFLICT (cache_key) DO UPDATE
         SET score = EXCLUDED.score,
             feedback = EXCLUDED.feedback,
             aspect_scores = EXCLUDED.aspect_scores,
             hit_count = grading_cache.hit_count + 1,
             last_used_at = EXCLUDED.last_used_at",
    )
    .bind(cache_key)
    .bind(score)
    .bind(feedback)
    .bind(Json(aspect_scores))
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}
