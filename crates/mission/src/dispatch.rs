//! Fan-out/fan-in command batch execution.
//!
//! Every handle passed in is already running (commands start at issue
//! time), so awaiting them one after another costs the slowest command, not
//! the sum. A failing command never aborts the batch: all handles are
//! resolved and the failures are aggregated for the caller to act on.

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::backend::{BackendError, CommandHandle};

/// One agent's failure inside a batch.
#[derive(Debug, Clone)]
pub struct AgentFailure {
    /// Roster index of the failed agent
    pub index: usize,
    /// Agent name
    pub agent: String,
    /// Failure description
    pub reason: String,
    /// Whether the failure was a batch-deadline expiry rather than a
    /// command error
    pub timed_out: bool,
}

/// Aggregate outcome of one command batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Batch label, e.g. `"takeoff"`
    pub label: String,
    /// Commands issued
    pub attempted: usize,
    /// Agents that did not complete their command
    pub failures: Vec<AgentFailure>,
}

impl BatchReport {
    /// Whether every command in the batch succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of commands that completed successfully.
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }

    /// Roster indices of the failed agents.
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }
}

/// Executes batches of per-agent commands with fan-in aggregation.
pub struct DispatchCoordinator;

impl DispatchCoordinator {
    /// Resolve a batch of started commands.
    ///
    /// `handles` carries `(roster index, agent name, handle)` triples; the
    /// commands behind the handles are already in flight.
    pub async fn execute(
        label: &str,
        handles: Vec<(usize, String, CommandHandle)>,
    ) -> BatchReport {
        let attempted = handles.len();
        let mut failures = Vec::new();

        for (index, agent, handle) in handles {
            if let Err(err) = handle.wait().await {
                warn!(batch = label, agent = %agent, %err, "command failed");
                failures.push(AgentFailure {
                    index,
                    agent,
                    reason: err.to_string(),
                    timed_out: false,
                });
            }
        }

        debug!(
            batch = label,
            attempted,
            failed = failures.len(),
            "batch resolved"
        );
        BatchReport {
            label: label.to_string(),
            attempted,
            failures,
        }
    }

    /// Resolve a batch with an absolute deadline.
    ///
    /// Commands still running at the deadline are aborted, fully resolved,
    /// and reported with `timed_out` set; the rest of the report matches
    /// [`DispatchCoordinator::execute`].
    pub async fn execute_until(
        label: &str,
        handles: Vec<(usize, String, CommandHandle)>,
        deadline: Instant,
    ) -> BatchReport {
        let attempted = handles.len();
        let mut failures = Vec::new();

        for (index, agent, handle) in handles {
            if let Err(err) = handle.wait_until(deadline).await {
                let timed_out = matches!(err, BackendError::TimedOut);
                warn!(batch = label, agent = %agent, %err, "command failed");
                failures.push(AgentFailure {
                    index,
                    agent,
                    reason: err.to_string(),
                    timed_out,
                });
            }
        }

        debug!(
            batch = label,
            attempted,
            failed = failures.len(),
            "batch resolved"
        );
        BatchReport {
            label: label.to_string(),
            attempted,
            failures,
        }
    }
}
