//! Mission artifact persistence.
//!
//! Each prepared mission can be saved as a JSON record (goals, assignment,
//! generation parameters) for audit and replay. Writing is best-effort: the
//! orchestrator logs a warning on failure and flies anyway.

use chrono::Utc;
use murmuration_core::Vec3;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Serialized record of a prepared mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionArtifact {
    /// Mission identifier
    pub mission_id: String,
    /// Formation label, e.g. the shape name
    pub label: String,
    /// RFC 3339 creation timestamp
    pub generated_at: String,
    /// Number of target points
    pub num_points: usize,
    /// Frame scale applied to the unit shape
    pub scale: f64,
    /// Flight altitude in meters
    pub altitude: f64,
    /// Generation seed
    pub seed: u64,
    /// Whether the point refinement converged
    pub converged: bool,
    /// Goal positions in deployment (NED) coordinates, agent order
    pub goals_ned: Vec<[f64; 3]>,
    /// `assignment[i]` is the formation point index flown by agent `i`
    pub assignment: Vec<usize>,
}

impl MissionArtifact {
    /// Goal positions as vectors.
    pub fn goals(&self) -> Vec<Vec3> {
        self.goals_ned.iter().map(|g| Vec3::from(*g)).collect()
    }
}

/// Write the artifact under `dir` as `goals_<n>_<timestamp>.json`.
pub fn write(dir: &Path, artifact: &MissionArtifact) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("goals_{}_{stamp}.json", artifact.num_points));
    let json = serde_json::to_string_pretty(artifact)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    std::fs::write(&path, json)?;
    Ok(path)
}
