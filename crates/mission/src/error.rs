//! Mission error taxonomy and per-agent diagnostics.
//!
//! Errors that invalidate the plan abort before any physical command is
//! issued. Everything local to a single agent is a [`Diagnostic`]: recorded
//! on the mission state, degrading that agent without stopping the swarm.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendError;

/// Fatal mission errors.
#[derive(Debug, Error)]
pub enum MissionError {
    /// Agent and target counts differ; nothing was commanded
    #[error("Formation count mismatch: {agents} agents vs {targets} targets")]
    CountMismatch {
        /// Agents on the roster
        agents: usize,
        /// Targets the plan produced
        targets: usize,
    },

    /// `start()` was called without a prepared plan
    #[error("No mission prepared")]
    NotPrepared,

    /// The mission is already past IDLE
    #[error("Mission already active in phase {0}")]
    MissionActive(String),

    /// Every agent failed a phase; the mission cannot continue
    #[error("All agents failed during {0}")]
    AllAgentsFailed(String),

    /// Backend-level failure outside any single agent's scope
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal condition classes recorded per mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Point refinement hit its iteration cap; best iterate was used
    OptimizationNonConvergence,
    /// A subset of agents failed a command batch and was excluded
    DispatchPartialFailure,
    /// An agent's backend stopped responding; the agent is frozen
    ActuationUnreachable,
    /// Not every agent arrived before the en-route deadline
    ArrivalTimeout,
}

/// A recorded degradation, optionally scoped to one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Condition class
    pub code: DiagnosticCode,
    /// Affected agent, if the condition is agent-local
    pub agent: Option<String>,
    /// Human-readable detail
    pub detail: String,
}

impl Diagnostic {
    /// Mission-wide diagnostic.
    pub fn new(code: DiagnosticCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            agent: None,
            detail: detail.into(),
        }
    }

    /// Diagnostic scoped to a single agent.
    pub fn for_agent(
        code: DiagnosticCode,
        agent: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            code,
            agent: Some(agent.into()),
            detail: detail.into(),
        }
    }
}
