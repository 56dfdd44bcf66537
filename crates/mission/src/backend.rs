//! Actuation backend port.
//!
//! One backend instance actuates one agent. Motion commands return an
//! already-started [`CommandHandle`]: the work begins at issue time, and the
//! handle only waits for it. This is the contract the dispatch coordinator
//! builds its fan-out/fan-in discipline on: issue every command first, then
//! await, so a batch costs as much as its slowest member.

use async_trait::async_trait;
use murmuration_core::Vec3;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Per-agent backend failures.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend connection is gone or was never established
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// The backend refused the command
    #[error("Command rejected: {0}")]
    Rejected(String),

    /// The command task died without reporting a result
    #[error("Command faulted: {0}")]
    Faulted(String),

    /// The command did not finish before its deadline
    #[error("Command timed out")]
    TimedOut,
}

/// Outcome of a single agent command.
pub type CommandResult = Result<(), BackendError>;

/// Handle to a command that is already executing.
#[derive(Debug)]
pub struct CommandHandle {
    task: JoinHandle<CommandResult>,
}

impl CommandHandle {
    /// Start `command` on the runtime and hand back its handle.
    pub fn spawn<F>(command: F) -> Self
    where
        F: Future<Output = CommandResult> + Send + 'static,
    {
        Self {
            task: tokio::spawn(command),
        }
    }

    /// Wait for the command to finish.
    ///
    /// A panicked command task is reported as [`BackendError::Faulted`]
    /// rather than propagated.
    pub async fn wait(mut self) -> CommandResult {
        match (&mut self.task).await {
            Ok(result) => result,
            Err(join_err) => Err(BackendError::Faulted(join_err.to_string())),
        }
    }

    /// Wait for the command until `deadline`.
    ///
    /// On expiry the command is aborted and fully resolved before
    /// [`BackendError::TimedOut`] is returned, so no command outlives the
    /// batch that issued it.
    pub async fn wait_until(mut self, deadline: tokio::time::Instant) -> CommandResult {
        match tokio::time::timeout_at(deadline, &mut self.task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(BackendError::Faulted(join_err.to_string())),
            Err(_elapsed) => {
                self.task.abort();
                let _ = (&mut self.task).await;
                Err(BackendError::TimedOut)
            }
        }
    }
}

/// Async actuation port for a single agent.
///
/// `connect`, `arm` and `disarm` resolve in place; the motion commands
/// start immediately and return handles. Implementations must be safe to
/// drive from concurrent tasks.
#[async_trait]
pub trait ActuationBackend: Send + Sync {
    /// Name of the agent this backend actuates.
    fn name(&self) -> &str;

    /// Establish the backend connection.
    async fn connect(&self) -> CommandResult;

    /// Arm the agent.
    async fn arm(&self) -> CommandResult;

    /// Disarm the agent.
    async fn disarm(&self) -> CommandResult;

    /// Begin a takeoff and return its handle.
    fn takeoff(&self) -> CommandHandle;

    /// Begin a landing and return its handle.
    fn land(&self) -> CommandHandle;

    /// Begin moving to an absolute position at the given speed.
    fn move_to(&self, position: Vec3, speed: f64) -> CommandHandle;

    /// Apply a velocity for a fixed duration.
    fn set_velocity(&self, velocity: Vec3, duration: Duration) -> CommandHandle;

    /// Latest position snapshot.
    async fn position(&self) -> Result<Vec3, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_returns_command_result() {
        let ok = CommandHandle::spawn(async { Ok(()) });
        assert!(ok.wait().await.is_ok());

        let err = CommandHandle::spawn(async {
            Err(BackendError::Rejected("nope".into()))
        });
        assert!(matches!(err.wait().await, Err(BackendError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_wait_reports_panics_as_faults() {
        let handle = CommandHandle::spawn(async { panic!("command blew up") });
        assert!(matches!(handle.wait().await, Err(BackendError::Faulted(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_aborts_on_deadline() {
        let handle = CommandHandle::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        assert!(matches!(
            handle.wait_until(deadline).await,
            Err(BackendError::TimedOut)
        ));
    }
}
