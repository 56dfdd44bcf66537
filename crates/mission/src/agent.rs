//! Agent roster models.

use murmuration_core::Vec3;
use serde::{Deserialize, Serialize};

/// One mobile agent in the swarm.
///
/// Owned by the orchestrator and persisted across missions; kinematic state
/// is a snapshot of the last backend read, not ground truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Agent name, matching its backend
    pub name: String,
    /// Roster index
    pub index: usize,
    /// Last observed position (NED)
    pub position: Vec3,
    /// Last commanded velocity
    pub velocity: Vec3,
    /// Whether the backend connection is up
    pub connected: bool,
    /// Whether the agent is armed
    pub armed: bool,
    /// Whether the agent is airborne
    pub airborne: bool,
    /// Cleared when the agent is excluded from the running mission
    pub active: bool,
}

impl Agent {
    /// Create a grounded, disconnected agent.
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            connected: false,
            armed: false,
            airborne: false,
            active: true,
        }
    }

    /// Reset per-mission flags while keeping identity and position.
    pub fn reset_for_mission(&mut self) {
        self.velocity = Vec3::ZERO;
        self.armed = false;
        self.airborne = false;
        self.active = true;
    }
}
