//! Minimum-interval limiter for outgoing requests.

use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, time::Instant};

/// Spaces calls at least `interval` apart, across all clones.
///
/// Callers that arrive early wait for their turn; nothing is dropped.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: Arc::new(Mutex::new(None)) }
    }

    /// Wait until the next call is allowed, then claim the slot.
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;

        if let Some(prev) = *last {
            let ready_at = prev + self.interval;
            let now = Instant::now();
            if ready_at > now {
                tracing::debug!(wait_ms = (ready_at - now).as_millis() as u64, "rate limited");
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }
}
