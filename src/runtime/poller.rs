//! Run polling
//!
//! Drives a started run to a terminal state. The wait is bounded by a
//! deadline with increasing backoff, and cancellation is observable through
//! the token, so a stuck run cannot pin a request forever.

use crate::assistant::{
    AssistantError, PendingToolCall, Run, RunStatus, ThreadBridge, ThreadHandle,
};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Polling schedule for a single run
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Delay before the first re-check
    pub initial_interval: Duration,
    /// Backoff cap; the interval doubles until it reaches this
    pub max_interval: Duration,
    /// Total wall-clock budget for the run
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            deadline: Duration::from_secs(180),
        }
    }
}

impl PollPolicy {
    pub fn from_env() -> Self {
        let mut policy = Self::default();
        if let Some(secs) = std::env::var("POLL_DEADLINE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            policy.deadline = Duration::from_secs(secs);
        }
        policy
    }
}

/// Where a run ended up after polling
#[derive(Debug)]
pub enum PollOutcome {
    /// Run needs tool outputs before it can continue
    RequiresAction(Vec<PendingToolCall>),
    /// Run finished normally
    Completed,
    /// Run ended in the terminal failure group
    Failed(RunStatus),
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("{0}")]
    Bridge(AssistantError),
    #[error("Run {run_id} did not settle within {waited:?}")]
    DeadlineExceeded { run_id: String, waited: Duration },
    #[error("Polling cancelled for run {0}")]
    Cancelled(String),
}

/// Polls a run until it leaves the pending status set
pub struct RunPoller {
    policy: PollPolicy,
}

impl RunPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub async fn drive(
        &self,
        bridge: &dyn ThreadBridge,
        handle: &ThreadHandle,
        mut run: Run,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, PollError> {
        let started = Instant::now();
        let mut interval = self.policy.initial_interval;

        loop {
            if !run.status.is_pending() {
                return Ok(match run.status {
                    RunStatus::RequiresAction => PollOutcome::RequiresAction(run.pending_tool_calls),
                    RunStatus::Completed => PollOutcome::Completed,
                    status => PollOutcome::Failed(status),
                });
            }

            if started.elapsed() >= self.policy.deadline {
                return Err(PollError::DeadlineExceeded {
                    run_id: run.id,
                    waited: started.elapsed(),
                });
            }

            tokio::select! {
                () = cancel.cancelled() => return Err(PollError::Cancelled(run.id)),
                () = tokio::time::sleep(interval) => {}
            }

            tracing::debug!(run_id = %run.id, status = %run.status.as_str(), "Polling run");
            run = bridge
                .retrieve_run(handle, &run.id)
                .await
                .map_err(PollError::Bridge)?;
            interval = (interval * 2).min(self.policy.max_interval);
        }
    }
}
