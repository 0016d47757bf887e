use sqlx::PgPool;

use crate::db::models::UsageLogEntry;

pub(crate) async fn append(pool: &PgPool, entry: &UsageLogEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO ai_usage_logs
             (feature, model, status, error_type, prompt_tokens, completion_tokens,
              total_tokens, latency_ms, attempts, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(entry.feature)
    .bind(&entry.model)
    .bind(entry.status.as_str())
    .bind(entry.error_type.map(|kind| kind.as_str()))
    .bind(entry.prompt_tokens)
    .bind(entry.completion_tokens)
    .bind(entry.total_tokens)
    .bind(entry.latency_ms)
    .bind(entry.attempts)
    .bind(entry.created_at)
    .execute(pool)
    .await?;

    Ok(())
}
