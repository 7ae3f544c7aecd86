//! Active polling of a remote task until a terminal phase, timeout, or
//! cancellation.

use crate::config::PollConfig;
use crate::error::{Result, WaitpointError};
use crate::remote::RemoteJobApi;
use crate::status::{JobHandle, PhaseTracker, TaskStatus};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Repeatedly queries the status endpoint for one job.
///
/// Inter-attempt delays are cooperative: the underlying worker is released
/// for the duration of the sleep, and cancellation mid-interval prevents any
/// further fetch.
pub struct ActivePoller<'a> {
    api: &'a dyn RemoteJobApi,
    config: PollConfig,
}

impl<'a> ActivePoller<'a> {
    pub fn new(api: &'a dyn RemoteJobApi, config: PollConfig) -> Self {
        Self { api, config }
    }

    /// Poll until the task reaches SUCCESS or FAILED, the attempt/duration
    /// budget runs out, or the wait is cancelled.
    ///
    /// A FAILED status is returned like any other terminal status — the
    /// assembler turns it into a structured failure carrying the remote
    /// diagnostic. Fetch errors are retried; the error of the final allowed
    /// attempt propagates unchanged.
    pub async fn poll_until_terminal(
        &self,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<TaskStatus> {
        let started = Instant::now();
        let mut tracker = PhaseTracker::new();

        for attempt in 1..=self.config.max_attempts {
            if cancel.is_cancelled() {
                return Err(WaitpointError::Cancelled);
            }

            match self.api.fetch_status(handle).await {
                Ok(status) => {
                    tracker.observe(status.phase);
                    debug!(handle = %handle, attempt, phase = %status.phase, "status fetched");
                    if status.phase.is_terminal() {
                        return Ok(status);
                    }
                }
                Err(e) => {
                    if self.out_of_budget(attempt, started) {
                        return Err(e);
                    }
                    warn!(handle = %handle, attempt, error = %e, "status fetch failed, will retry");
                }
            }

            if self.out_of_budget(attempt, started) {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(WaitpointError::Cancelled),
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        Err(WaitpointError::Timeout(format!(
            "job {} did not reach a terminal phase within the configured poll budget (last known phase: {})",
            handle,
            tracker
                .last()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        )))
    }

    /// Whether another attempt would exceed the attempt cap or the
    /// wall-clock budget. Neither cap may be exceeded.
    fn out_of_budget(&self, attempt: u32, started: Instant) -> bool {
        if attempt >= self.config.max_attempts {
            return true;
        }
        match self.config.max_wait {
            Some(max_wait) => started.elapsed() + self.config.interval >= max_wait,
            None => false,
        }
    }
}
