use sqlx::PgPool;

pub(crate) const GRADING_MODE_KEY: &str = "grading_mode";

pub(crate) async fn get(pool: &PgPool, key: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT value FROM system_settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
}
