use std::time::Duration;

use time::PrimitiveDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::core::config::GradingSettings;
use crate::core::time::primitive_now_utc;
use crate::db::types::GradingStatus;
use crate::services::grading::GradingError;
use crate::services::intake::GradingIntake;
use crate::services::submission_state::INTERRUPTED_MESSAGE;

use super::queue::GradingJob;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RecoveryReport {
    pub(crate) requeued: usize,
    pub(crate) rejected: usize,
    pub(crate) interrupted: usize,
}

/// Queued jobs do not survive a restart: re-enqueue them and fail stale processing rows.
pub(crate) async fn recover_on_startup(
    intake: &GradingIntake,
    stale_after: Duration,
) -> Result<RecoveryReport, GradingError> {
    let mut report = RecoveryReport {
        interrupted: fail_stale_processing(intake, stale_after).await?,
        ..RecoveryReport::default()
    };

    let queued = intake.store().list_ids_by_status(GradingStatus::Queued).await?;
    for submission_id in queued {
        match intake.queue().enqueue(GradingJob::new(submission_id.clone())) {
            Ok(()) => report.requeued += 1,
            Err(err) => {
                intake.states().fail_with(&submission_id, &err).await?;
                report.rejected += 1;
            }
        }
    }

    tracing::info!(
        requeued = report.requeued,
        rejected = report.rejected,
        interrupted = report.interrupted,
        "Recovered grading queue"
    );

    Ok(report)
}

pub(crate) async fn fail_stale_processing(
    intake: &GradingIntake,
    stale_after: Duration,
) -> Result<usize, GradingError> {
    let cutoff = stale_cutoff(primitive_now_utc(), stale_after);
    let stale = intake.store().list_stale_processing(cutoff).await?;

    let mut failed = 0;
    for submission_id in stale {
        if intake.states().fail(&submission_id, INTERRUPTED_MESSAGE).await? {
            tracing::warn!(submission_id, "Failed stale processing submission");
            failed += 1;
        }
    }

    Ok(failed)
}

/// Re-drives failed submissions that still have automatic retries left.
pub(crate) async fn retry_failed_automatically(
    intake: &GradingIntake,
    retry_limit: u32,
) -> Result<usize, GradingError> {
    if retry_limit == 0 {
        return Ok(0);
    }

    let max_retry_count = i32::try_from(retry_limit).unwrap_or(i32::MAX);
    let candidates = intake.store().list_failed_for_retry(max_retry_count).await?;
    if candidates.is_empty() {
        return Ok(0);
    }

    let report = intake.retry_failed_submissions(&candidates).await?;
    Ok(report.accepted)
}

pub(crate) fn spawn_maintenance_loop(
    intake: GradingIntake,
    settings: &GradingSettings,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = Duration::from_secs(settings.auto_retry_interval_seconds.max(1));
    let stale_after = Duration::from_secs(settings.stale_processing_seconds);
    let retry_limit = settings.auto_retry_limit;

    tokio::spawn(async move {
        let mut tick = interval(period);
        // The first tick fires immediately; startup recovery already covered it.
        tick.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tick.tick() => {
                    if let Err(err) = fail_stale_processing(&intake, stale_after).await {
                        tracing::error!(error = %err, "fail_stale_processing failed");
                    }
                    match retry_failed_automatically(&intake, retry_limit).await {
                        Ok(0) => {}
                        Ok(retried) => tracing::info!(retried, "Automatically retried failed submissions"),
                        Err(err) => tracing::error!(error = %err, "retry_failed_automatically failed"),
                    }
                }
            }
        }
    })
}

fn stale_cutoff(now: PrimitiveDateTime, stale_after: Duration) -> PrimitiveDateTime {
    time::Duration::try_from(stale_after)
        .ok()
        .and_then(|age| now.checked_sub(age))
        .unwrap_or(PrimitiveDateTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::config::GradingMode;
    use crate::services::grading::client::GradingClient;
    use crate::services::grading::rate_limiter::RateLimiter;
    use crate::tasks::grading::{GradingPipeline, GradingQueue, JobReceiver};
    use crate::test_support::{FakeProvider, InMemoryStore};

    fn intake(store: Arc<InMemoryStore>, capacity: usize) -> (GradingIntake, JobReceiver) {
        let client = GradingClient::new(
            Some(Arc::new(FakeProvider::always_failing("unused"))),
            Arc::new(RateLimiter::with_interval(Duration::ZERO)),
            store.clone(),
        );
        let pipeline = GradingPipeline::new(store.clone(), client);
        let (queue, receiver) = GradingQueue::bounded(capacity);
        (GradingIntake::new(store, pipeline, queue, GradingMode::Queued), receiver)
    }

    #[tokio::test]
    async fn startup_requeues_queued_and_fails_stale_processing() {
        let store = Arc::new(InMemoryStore::default());
        store.seed_submission("queued-1", GradingStatus::Queued);
        store.seed_submission("queued-2", GradingStatus::Queued);
        store.seed_submission("stuck", GradingStatus::Processing);
        store.seed_submission("fresh", GradingStatus::Processing);
        store.set_updated_at("stuck", primitive_now_utc() - time::Duration::hours(2));
        let (intake, _receiver) = intake(store.clone(), 1);

        let report =
            recover_on_startup(&intake, Duration::from_secs(600)).await.expect("recover");

        assert_eq!(report, RecoveryReport { requeued: 1, rejected: 1, interrupted: 1 });
        let stuck = store.submission("stuck").expect("row");
        assert_eq!(stuck.status, GradingStatus::Failed);
        assert_eq!(stuck.grading_error.as_deref(), Some(INTERRUPTED_MESSAGE));
        assert_eq!(store.submission("fresh").expect("row").status, GradingStatus::Processing);
        assert_eq!(intake.queue().depth(), 1);
    }

    #[tokio::test]
    async fn auto_retry_respects_limit() {
        let store = Arc::new(InMemoryStore::default());
        store.seed_submission("fresh-failure", GradingStatus::Failed);
        store.seed_submission("exhausted", GradingStatus::Failed);
        store.set_retry_count("exhausted", 2);
        let (intake, _receiver) = intake(store.clone(), 4);

        assert_eq!(retry_failed_automatically(&intake, 0).await.expect("disabled"), 0);
        assert_eq!(retry_failed_automatically(&intake, 2).await.expect("retry"), 1);

        assert_eq!(store.submission("fresh-failure").expect("row").status, GradingStatus::Processing);
        assert_eq!(store.submission("exhausted").expect("row").status, GradingStatus::Failed);
    }

    #[test]
    fn cutoff_saturates_for_huge_ages() {
        let now = primitive_now_utc();
        assert_eq!(stale_cutoff(now, Duration::from_secs(u64::MAX)), PrimitiveDateTime::MIN);
        assert!(stale_cutoff(now, Duration::from_secs(60)) < now);
    }
}
