use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Spaces provider calls at least `min_interval` apart.
///
/// The lock is held while waiting, so waiters are released one slot at a time in the
/// order they queued on the mutex.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    min_interval: Duration,
    last_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// A limit of zero disables spacing.
    pub(crate) fn per_minute(requests_per_minute: u32) -> Self {
        let min_interval = if requests_per_minute == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(60) / requests_per_minute
        };
        Self::with_interval(min_interval)
    }

    pub(crate) fn with_interval(min_interval: Duration) -> Self {
        Self { min_interval, last_slot: Mutex::new(None) }
    }

    pub(crate) fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub(crate) async fn acquire(&self) {
        let mut last_slot = self.last_slot.lock().await;
        if let Some(previous) = *last_slot {
            sleep_until(previous + self.min_interval).await;
        }
        *last_slot = Some(Instant::now());
    }
}
