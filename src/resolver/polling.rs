//! Bounded polling for script-injected content.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::error::FetchError;

/// How many times to look, and how long to wait between looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            interval: Duration::from_secs(1),
        }
    }
}

impl PollPolicy {
    /// Whether another attempt follows `attempt` (1-based).
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt < self.attempts
    }

    /// Sleep one interval unless cancelled first.
    pub async fn pause(&self, cancel: &CancellationToken) -> Result<(), FetchError> {
        sleep_or_cancel(self.interval, cancel).await
    }
}

/// Sleep for `duration`, returning early with `Cancelled` if the token fires.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<(), FetchError> {
    if duration.is_zero() {
        return if cancel.is_cancelled() {
            Err(FetchError::Cancelled)
        } else {
            Ok(())
        };
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
