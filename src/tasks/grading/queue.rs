use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::services::grading::GradingError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GradingJob {
    pub(crate) submission_id: String,
}

impl GradingJob {
    pub(crate) fn new(submission_id: impl Into<String>) -> Self {
        Self { submission_id: submission_id.into() }
    }
}

/// Receiving half shared by every worker.
pub(crate) type JobReceiver = Arc<Mutex<mpsc::Receiver<GradingJob>>>;

/// Bounded in-process job queue. Enqueueing never waits.
#[derive(Clone)]
pub(crate) struct GradingQueue {
    sender: mpsc::Sender<GradingJob>,
}

impl GradingQueue {
    pub(crate) fn bounded(capacity: usize) -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, Arc::new(Mutex::new(receiver)))
    }

    pub(crate) fn enqueue(&self, job: GradingJob) -> Result<(), GradingError> {
        match self.sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(job)) => {
                metrics::counter!("grading_queue_rejected_total").increment(1);
                tracing::warn!(submission_id = %job.submission_id, "Grading queue is full");
                Err(GradingError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                metrics::counter!("grading_queue_rejected_total").increment(1);
                tracing::error!(submission_id = %job.submission_id, "Grading queue is closed");
                Err(GradingError::QueueFull)
            }
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }
}
