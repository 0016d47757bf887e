use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::pipeline::GradingPipeline;
use super::queue::{GradingJob, JobReceiver};

/// Spawns `count` workers draining the shared receiver.
pub(crate) fn spawn_workers(
    count: usize,
    receiver: JobReceiver,
    pipeline: GradingPipeline,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker_id| {
            tokio::spawn(grading_worker(
                worker_id,
                receiver.clone(),
                pipeline.clone(),
                shutdown.clone(),
            ))
        })
        .collect()
}

async fn grading_worker(
    worker_id: usize,
    receiver: JobReceiver,
    pipeline: GradingPipeline,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::debug!(worker_id, "Grading worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let job = tokio::select! {
            _ = shutdown.changed() => break,
            job = next_job(&receiver) => job,
        };

        let Some(job) = job else {
            // Every sender is gone.
            break;
        };

        let outcome = pipeline.run(&job).await;
        tracing::debug!(worker_id, submission_id = %job.submission_id, ?outcome, "Grading job finished");
    }

    tracing::debug!(worker_id, "Grading worker stopped");
}

async fn next_job(receiver: &JobReceiver) -> Option<GradingJob> {
    receiver.lock().await.recv().await
}
