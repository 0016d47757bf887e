use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::core::config::GradingMode;
use crate::core::time::primitive_now_utc;
use crate::db::models::{GradingResult, StatusCounts, Submission};
use crate::db::types::GradingStatus;
use crate::repositories::grading_results::TeacherRevision;
use crate::repositories::store::GradingStore;
use crate::repositories::submissions::NewSubmission;
use crate::repositories::system_settings::GRADING_MODE_KEY;
use crate::services::grading::GradingError;
use crate::services::submission_state::SubmissionStateMachine;
use crate::tasks::grading::{GradingJob, GradingPipeline, GradingQueue, JobOutcome};

#[derive(Debug, Clone)]
pub(crate) struct SubmitOutcome {
    pub(crate) submission: Submission,
    pub(crate) result: Option<GradingResult>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RetryDetail {
    pub(crate) submission_id: String,
    pub(crate) accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct RetryReport {
    pub(crate) accepted: usize,
    pub(crate) skipped: usize,
    pub(crate) details: Vec<RetryDetail>,
}

impl RetryReport {
    fn accept(&mut self, submission_id: &str) {
        self.accepted += 1;
        self.details.push(RetryDetail {
            submission_id: submission_id.to_string(),
            accepted: true,
            reason: None,
        });
    }

    fn skip(&mut self, submission_id: &str, reason: impl Into<String>) {
        self.skipped += 1;
        self.details.push(RetryDetail {
            submission_id: submission_id.to_string(),
            accepted: false,
            reason: Some(reason.into()),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct QueueOverview {
    #[serde(flatten)]
    pub(crate) counts: StatusCounts,
    pub(crate) queue_depth: usize,
}

/// Entry point for new essays and the administrative actions around them.
#[derive(Clone)]
pub(crate) struct GradingIntake {
    store: Arc<dyn GradingStore>,
    pipeline: GradingPipeline,
    queue: GradingQueue,
    default_mode: GradingMode,
}

impl GradingIntake {
    pub(crate) fn new(
        store: Arc<dyn GradingStore>,
        pipeline: GradingPipeline,
        queue: GradingQueue,
        default_mode: GradingMode,
    ) -> Self {
        Self { store, pipeline, queue, default_mode }
    }

    pub(crate) fn store(&self) -> &Arc<dyn GradingStore> {
        &self.store
    }

    pub(crate) fn states(&self) -> &SubmissionStateMachine {
        self.pipeline.states()
    }

    pub(crate) fn queue(&self) -> &GradingQueue {
        &self.queue
    }

    /// Stored setting first; a missing row uses the configured default and an
    /// unrecognised value falls back to queued.
    pub(crate) async fn grading_mode(&self) -> GradingMode {
        match self.store.setting(GRADING_MODE_KEY).await {
            Ok(Some(value)) => GradingMode::parse_or(Some(&value), GradingMode::Queued),
            Ok(None) => self.default_mode,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read grading mode; using default");
                self.default_mode
            }
        }
    }

    /// Grading problems surface through the submission's `failed` status, never as an error.
    pub(crate) async fn submit(
        &self,
        question_id: &str,
        student_id: &str,
        essay_text: &str,
    ) -> Result<SubmitOutcome, GradingError> {
        if self.store.find_question(question_id).await?.is_none() {
            return Err(GradingError::NotFound("question"));
        }

        let submission = self
            .store
            .insert_submission(NewSubmission {
                id: Uuid::new_v4().to_string(),
                question_id: question_id.to_string(),
                student_id: student_id.to_string(),
                essay_text: essay_text.to_string(),
                created_at: primitive_now_utc(),
            })
            .await?;

        let mode = self.grading_mode().await;
        tracing::info!(submission_id = %submission.id, question_id, mode = mode.as_str(), "Essay submitted");

        match mode {
            GradingMode::Instant => {
                let outcome = self.pipeline.run(&GradingJob::new(submission.id.clone())).await;
                if outcome == JobOutcome::Failed {
                    self.hand_over_unstarted(&submission.id).await?;
                }
            }
            GradingMode::Queued => self.enqueue_or_fail(&submission.id).await?,
        }

        self.find(&submission.id).await
    }

    /// An instant run that failed before claiming the submission leaves it queued with no
    /// job behind it; the worker pool takes it from there.
    async fn hand_over_unstarted(&self, submission_id: &str) -> Result<(), GradingError> {
        let still_queued = self
            .store
            .find_submission(submission_id)
            .await?
            .is_some_and(|row| row.status == GradingStatus::Queued);
        if still_queued {
            tracing::warn!(submission_id, "Instant grading did not start; handing over to the queue");
            self.enqueue_or_fail(submission_id).await?;
        }
        Ok(())
    }

    async fn enqueue_or_fail(&self, submission_id: &str) -> Result<(), GradingError> {
        if let Err(err) = self.queue.enqueue(GradingJob::new(submission_id)) {
            self.states().fail_with(submission_id, &err).await?;
        }
        Ok(())
    }

    pub(crate) async fn find(&self, submission_id: &str) -> Result<SubmitOutcome, GradingError> {
        let submission = self
            .store
            .find_submission(submission_id)
            .await?
            .ok_or(GradingError::NotFound("submission"))?;
        let result = self.store.find_result(submission_id).await?;
        Ok(SubmitOutcome { submission, result })
    }

    /// Moves each failed submission back to processing and re-enqueues it.
    pub(crate) async fn retry_failed_submissions(
        &self,
        submission_ids: &[String],
    ) -> Result<RetryReport, GradingError> {
        let mut report = RetryReport::default();

        for submission_id in submission_ids {
            let Some(submission) = self.store.find_submission(submission_id).await? else {
                report.skip(submission_id, "submission not found");
                continue;
            };
            if submission.status != GradingStatus::Failed {
                report.skip(submission_id, format!("status is {}", submission.status.as_str()));
                continue;
            }
            if !self.states().retry(submission_id).await? {
                report.skip(submission_id, "status changed concurrently");
                continue;
            }

            if let Err(err) = self.queue.enqueue(GradingJob::new(submission_id.clone())) {
                self.states().fail_with(submission_id, &err).await?;
                report.skip(submission_id, err.user_message());
                continue;
            }

            metrics::counter!("submissions_retried_total").increment(1);
            report.accept(submission_id);
        }

        tracing::info!(accepted = report.accepted, skipped = report.skipped, "Retried failed submissions");
        Ok(report)
    }

    pub(crate) async fn status_counts(&self) -> Result<QueueOverview, GradingError> {
        let counts = self.store.count_by_status().await?;
        Ok(QueueOverview { counts, queue_depth: self.queue.depth() })
    }

    /// Records a teacher's grade next to the AI grade. Submission status is untouched.
    pub(crate) async fn revise_grade(
        &self,
        submission_id: &str,
        teacher_id: &str,
        score: f64,
        feedback: Option<String>,
    ) -> Result<GradingResult, GradingError> {
        let revised = self
            .store
            .revise_result(TeacherRevision {
                submission_id: submission_id.to_string(),
                teacher_id: teacher_id.to_string(),
                score,
                feedback,
                now: primitive_now_utc(),
            })
            .await?
            .ok_or(GradingError::NotFound("grading result"))?;

        tracing::info!(submission_id, teacher_id, score, "Grade revised by teacher");
        Ok(revised)
    }
}
