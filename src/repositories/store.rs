use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{
    CacheEntry, EssayQuestion, GradingResult, StatusCounts, Submission, UsageLogEntry,
};
use crate::db::types::{AspectScore, GradingStatus};
use crate::repositories::grading_results::{ResultUpsert, TeacherRevision};
use crate::repositories::submissions::{NewSubmission, StatusTransition};
use crate::repositories::{
    grading_cache, grading_results, health, questions, submissions, system_settings, usage_logs,
};

/// Everything the grading pipeline reads or writes.
#[async_trait]
pub(crate) trait GradingStore: Send + Sync {
    async fn ping(&self) -> Result<(), sqlx::Error>;

    async fn insert_submission(&self, params: NewSubmission) -> Result<Submission, sqlx::Error>;

    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, sqlx::Error>;

    async fn apply_transition(
        &self,
        id: &str,
        transition: &StatusTransition,
    ) -> Result<bool, sqlx::Error>;

    async fn count_by_status(&self) -> Result<StatusCounts, sqlx::Error>;

    async fn list_ids_by_status(&self, status: GradingStatus) -> Result<Vec<String>, sqlx::Error>;

    async fn list_stale_processing(
        &self,
        updated_before: PrimitiveDateTime,
    ) -> Result<Vec<String>, sqlx::Error>;

    async fn list_failed_for_retry(&self, max_retry_count: i32)
        -> Result<Vec<String>, sqlx::Error>;

    async fn find_question(&self, id: &str) -> Result<Option<EssayQuestion>, sqlx::Error>;

    /// Applies `transition` and stores the result atomically; `None` when not applied.
    async fn complete_with_result(
        &self,
        transition: &StatusTransition,
        params: ResultUpsert,
    ) -> Result<Option<GradingResult>, sqlx::Error>;

    async fn find_result(&self, submission_id: &str)
        -> Result<Option<GradingResult>, sqlx::Error>;

    async fn revise_result(
        &self,
        params: TeacherRevision,
    ) -> Result<Option<GradingResult>, sqlx::Error>;

    async fn cache_touch_and_fetch(
        &self,
        cache_key: &str,
        now: PrimitiveDateTime,
    ) -> Result<Option<CacheEntry>, sqlx::Error>;

    async fn cache_upsert(
        &self,
        cache_key: &str,
        score: f64,
        feedback: &str,
        aspect_scores: &[AspectScore],
        now: PrimitiveDateTime,
    ) -> Result<(), sqlx::Error>;

    async fn append_usage(&self, entry: &UsageLogEntry) -> Result<(), sqlx::Error>;

    async fn setting(&self, key: &str) -> Result<Option<String>, sqlx::Error>;
}

#[derive(Clone)]
pub(crate) struct PgGradingStore {
    pool: PgPool,
}

impl PgGradingStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GradingStore for PgGradingStore {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        health::ping(&self.pool).await
    }

    async fn insert_submission(&self, params: NewSubmission) -> Result<Submission, sqlx::Error> {
        submissions::insert(&self.pool, params).await
    }

    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, sqlx::Error> {
        submissions::find_by_id(&self.pool, id).await
    }

    async fn apply_transition(
        &self,
        id: &str,
        transition: &StatusTransition,
    ) -> Result<bool, sqlx::Error> {
        submissions::apply_transition(&self.pool, id, transition).await
    }

    async fn count_by_status(&self) -> Result<StatusCounts, sqlx::Error> {
        submissions::count_by_status(&self.pool).await
    }

    async fn list_ids_by_status(&self, status: GradingStatus) -> Result<Vec<String>, sqlx::Error> {
        submissions::list_ids_by_status(&self.pool, status).await
    }

    async fn list_stale_processing(
        &self,
        updated_before: PrimitiveDateTime,
    ) -> Result<Vec<String>, sqlx::Error> {
        submissions::list_stale_processing(&self.pool, updated_before).await
    }

    async fn list_failed_for_retry(
        &self,
        max_retry_count: i32,
    ) -> Result<Vec<String>, sqlx::Error> {
        submissions::list_failed_for_retry(&self.pool, max_retry_count).await
    }

    async fn find_question(&self, id: &str) -> Result<Option<EssayQuestion>, sqlx::Error> {
        questions::find_by_id(&self.pool, id).await
    }

    async fn complete_with_result(
        &self,
        transition: &StatusTransition,
        params: ResultUpsert,
    ) -> Result<Option<GradingResult>, sqlx::Error> {
        grading_results::complete_with_result(&self.pool, transition, params).await
    }

    async fn find_result(
        &self,
        submission_id: &str,
    ) -> Result<Option<GradingResult>, sqlx::Error> {
        grading_results::find_by_submission(&self.pool, submission_id).await
    }

    async fn revise_result(
        &self,
        params: TeacherRevision,
    ) -> Result<Option<GradingResult>, sqlx::Error> {
        grading_results::revise(&self.pool, params).await
    }

    async fn cache_touch_and_fetch(
        &self,
        cache_key: &str,
        now: PrimitiveDateTime,
    ) -> Result<Option<CacheEntry>, sqlx::Error> {
        grading_cache::touch_and_fetch(&self.pool, cache_key, now).await
    }

    async fn cache_upsert(
        &self,
        cache_key: &str,
        score: f64,
        feedback: &str,
        aspect_scores: &[AspectScore],
        now: PrimitiveDateTime,
    ) -> Result<(), sqlx::Error> {
        grading_cache::upsert(&self.pool, cache_key, score, feedback, aspect_scores, now).await
    }

    async fn append_usage(&self, entry: &UsageLogEntry) -> Result<(), sqlx::Error> {
        usage_logs::append(&self.pool, entry).await
    }

    async fn setting(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        system_settings::get(&self.pool, key).await
    }
}
