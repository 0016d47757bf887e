use std::sync::Arc;

use crate::core::time::primitive_now_utc;
use crate::db::models::GradingResult;
use crate::db::types::GradingStatus;
use crate::repositories::grading_results::ResultUpsert;
use crate::repositories::store::GradingStore;
use crate::repositories::submissions::StatusTransition;
use crate::services::grading::GradingError;

pub(crate) const INTERRUPTED_MESSAGE: &str = "grading interrupted";

/// Guards every status write behind the state the submission is expected to be in.
///
/// Each method returns `Ok(false)` when the submission was not in an allowed source
/// state, so a completed submission is never regressed by a stale worker.
#[derive(Clone)]
pub(crate) struct SubmissionStateMachine {
    store: Arc<dyn GradingStore>,
}

impl SubmissionStateMachine {
    pub(crate) fn new(store: Arc<dyn GradingStore>) -> Self {
        Self { store }
    }

    /// `queued → processing`. A submission already moved to processing by a retry is
    /// accepted as is.
    pub(crate) async fn begin_processing(&self, id: &str) -> Result<bool, GradingError> {
        self.apply(
            id,
            StatusTransition {
                from: vec![GradingStatus::Queued, GradingStatus::Processing],
                to: GradingStatus::Processing,
                error: None,
                graded_at: None,
                increment_retry: false,
                at: primitive_now_utc(),
            },
        )
        .await
    }

    /// `processing → completed`, storing the result in the same write. Nothing is stored
    /// when the submission left processing while it was being graded.
    pub(crate) async fn complete(
        &self,
        result: ResultUpsert,
    ) -> Result<Option<GradingResult>, GradingError> {
        let submission_id = result.submission_id.clone();
        let transition = StatusTransition {
            from: vec![GradingStatus::Processing],
            to: GradingStatus::Completed,
            error: None,
            graded_at: Some(result.now),
            increment_retry: false,
            at: result.now,
        };

        let stored = self.store.complete_with_result(&transition, result).await?;
        if stored.is_none() {
            tracing::debug!(
                submission_id = %submission_id,
                to = transition.to.as_str(),
                "Status transition not applied; result discarded"
            );
        }
        Ok(stored)
    }

    /// `queued | processing → failed` with a short user-facing message.
    pub(crate) async fn fail(&self, id: &str, message: &str) -> Result<bool, GradingError> {
        self.apply(
            id,
            StatusTransition {
                from: vec![GradingStatus::Queued, GradingStatus::Processing],
                to: GradingStatus::Failed,
                error: Some(message.to_string()),
                graded_at: None,
                increment_retry: false,
                at: primitive_now_utc(),
            },
        )
        .await
    }

    pub(crate) async fn fail_with(&self, id: &str, err: &GradingError) -> Result<bool, GradingError> {
        self.fail(id, &err.user_message()).await
    }

    /// `failed → processing`; clears the error and bumps the retry counter.
    pub(crate) async fn retry(&self, id: &str) -> Result<bool, GradingError> {
        self.apply(
            id,
            StatusTransition {
                from: vec![GradingStatus::Failed],
                to: GradingStatus::Processing,
                error: None,
                graded_at: None,
                increment_retry: true,
                at: primitive_now_utc(),
            },
        )
        .await
    }

    async fn apply(&self, id: &str, transition: StatusTransition) -> Result<bool, GradingError> {
        let applied = self.store.apply_transition(id, &transition).await?;
        if !applied {
            tracing::debug!(
                submission_id = id,
                to = transition.to.as_str(),
                "Status transition not applied"
            );
        }
        Ok(applied)
    }
}
