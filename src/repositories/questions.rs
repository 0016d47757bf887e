use sqlx::PgPool;

use crate::db::models::EssayQuestion;

pub(crate) const COLUMNS: &str =
    "id, question_text, ideal_answer, keywords, rubric, round_to_five, created_at";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<EssayQuestion>, sqlx::Error> {
    sqlx::query_as::<_, EssayQuestion>(&format!(
        "SELECT {COLUMNS}
         FROM essay_questions
         WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}
