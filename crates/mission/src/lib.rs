//! Murmuration mission orchestration.
//!
//! Sequences a swarm through arm, takeoff, move-to-formation, station-keep
//! and land against an actuation backend:
//!
//! - [`ActuationBackend`]: per-agent async port; every motion command
//!   returns an already-started [`CommandHandle`].
//! - [`DispatchCoordinator`]: fan-out/fan-in batch execution with
//!   partial-failure aggregation.
//! - [`MissionOrchestrator`]: the mission state machine and control loop.
//! - [`SimulatedAgentBackend`]: kinematic backend for tests and demos.

pub mod agent;
pub mod artifact;
pub mod backend;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod sim;

pub use agent::Agent;
pub use artifact::MissionArtifact;
pub use backend::{ActuationBackend, BackendError, CommandHandle, CommandResult};
pub use dispatch::{AgentFailure, BatchReport, DispatchCoordinator};
pub use error::{Diagnostic, DiagnosticCode, MissionError};
pub use orchestrator::{FormationSpec, MissionOrchestrator, MissionPhase, MissionStatus};
pub use sim::{SimBackendConfig, SimulatedAgentBackend};
