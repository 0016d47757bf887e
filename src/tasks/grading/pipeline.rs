use std::sync::Arc;
use std::time::Instant;

use crate::core::time::primitive_now_utc;
use crate::repositories::grading_results::ResultUpsert;
use crate::repositories::store::GradingStore;
use crate::services::grading::aggregate::{aggregate, round_to_nearest_five};
use crate::services::grading::cache::{cache_key, CachedGrade, GradingCache};
use crate::services::grading::client::{GradeRequest, GradingClient};
use crate::services::grading::GradingError;
use crate::services::submission_state::SubmissionStateMachine;

use super::queue::GradingJob;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    Completed,
    Failed,
    /// The submission was no longer eligible for grading.
    Skipped,
}

impl JobOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Grades one submission end to end. Shared by workers and instant intake.
#[derive(Clone)]
pub(crate) struct GradingPipeline {
    store: Arc<dyn GradingStore>,
    states: SubmissionStateMachine,
    cache: GradingCache,
    client: GradingClient,
}

impl GradingPipeline {
    pub(crate) fn new(store: Arc<dyn GradingStore>, client: GradingClient) -> Self {
        Self {
            states: SubmissionStateMachine::new(store.clone()),
            cache: GradingCache::new(store.clone()),
            store,
            client,
        }
    }

    pub(crate) fn states(&self) -> &SubmissionStateMachine {
        &self.states
    }

    pub(crate) async fn run(&self, job: &GradingJob) -> JobOutcome {
        let submission_id = job.submission_id.as_str();
        let timer = Instant::now();

        match self.states.begin_processing(submission_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(submission_id, "Skipping grading; submission is not pending");
                return self.finish(JobOutcome::Skipped, timer);
            }
            Err(err) => {
                tracing::error!(submission_id, error = %err, "Failed to start grading");
                return self.finish(JobOutcome::Failed, timer);
            }
        }

        let graded = match self.grade(submission_id).await {
            Ok(graded) => graded,
            Err(err) => {
                tracing::warn!(submission_id, error = %err, kind = err.label(), "Grading failed");
                self.record_failure(submission_id, &err).await;
                return self.finish(JobOutcome::Failed, timer);
            }
        };

        let outcome = match self.states.complete(graded).await {
            Ok(Some(result)) => {
                tracing::info!(
                    submission_id,
                    score = result.score,
                    from_cache = result.from_cache,
                    "Grading completed"
                );
                JobOutcome::Completed
            }
            Ok(None) => {
                tracing::warn!(submission_id, "Submission left processing during grading; result discarded");
                JobOutcome::Skipped
            }
            Err(err) => {
                tracing::error!(submission_id, error = %err, "Failed to store grading result");
                self.record_failure(submission_id, &err).await;
                JobOutcome::Failed
            }
        };

        self.finish(outcome, timer)
    }

    async fn record_failure(&self, submission_id: &str, err: &GradingError) {
        if let Err(write_err) = self.states.fail_with(submission_id, err).await {
            tracing::error!(submission_id, error = %write_err, "Failed to record grading failure");
        }
    }

    /// Everything up to the final write; the result is stored by the completing transition.
    async fn grade(&self, submission_id: &str) -> Result<ResultUpsert, GradingError> {
        let submission = self
            .store
            .find_submission(submission_id)
            .await?
            .ok_or(GradingError::NotFound("submission"))?;
        let question = self
            .store
            .find_question(&submission.question_id)
            .await?
            .ok_or(GradingError::NotFound("question"))?;

        let request = GradeRequest::for_question(&question, &submission.essay_text)?;
        request.rubric.validate()?;
        if request.rubric.total_max() <= 0 {
            return Err(GradingError::ZeroMaxScore);
        }

        let key = cache_key(&request);
        let (grade, model, from_cache) = match self.cache.lookup(&key).await {
            Some(cached) => (cached, None, true),
            None => {
                let graded = self.client.grade(&request).await?;
                tracing::debug!(submission_id, attempts = graded.attempts, "Provider graded essay");
                let score = aggregate(&request.rubric, &graded.aspect_scores)?;
                let grade = CachedGrade {
                    score,
                    feedback: graded.feedback,
                    aspect_scores: graded.aspect_scores,
                };
                self.cache.store(&key, &grade).await;
                (grade, Some(graded.model), false)
            }
        };

        // Cached scores are unrounded; the flag belongs to the question.
        let score = if question.round_to_five { round_to_nearest_five(grade.score) } else { grade.score };

        Ok(ResultUpsert {
            submission_id: submission.id,
            score,
            feedback: grade.feedback,
            aspect_scores: grade.aspect_scores,
            model,
            from_cache,
            now: primitive_now_utc(),
        })
    }

    fn finish(&self, outcome: JobOutcome, timer: Instant) -> JobOutcome {
        metrics::counter!("grading_jobs_total", "status" => outcome.as_str()).increment(1);
        if outcome != JobOutcome::Skipped {
            metrics::histogram!("grading_duration_seconds").record(timer.elapsed().as_secs_f64());
        }
        outcome
    }
}
