//! Configuration management for Murmuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Top-level engine configuration.
///
/// This defines the point-distribution solver, goal assignment, the
/// potential-field gains and the mission timing. Loaded from TOML at runtime;
/// every section falls back to its defaults when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Point distribution solver parameters
    pub distribution: DistributionConfig,
    /// Goal assignment parameters
    pub assignment: AssignmentConfig,
    /// Potential-field control gains and limits
    pub control: ControlConfig,
    /// Unit-shape to deployment-frame transform
    pub frame: FrameConfig,
    /// Mission sequencing and timing
    pub mission: MissionConfig,
}

/// Parameters for the surface point distribution solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Half-width of the initial bounds probe lattice (unit coordinates)
    pub initial_range: f64,
    /// Lattice samples per axis during the bounds probe
    pub axis_samples: usize,
    /// Candidate points seeded before clustering
    pub num_samples: usize,
    /// Iteration cap for the coarse surface-adherence pass
    pub coarse_max_iters: usize,
    /// Iteration cap for the fine composite pass
    pub fine_max_iters: usize,
    /// Gradient infinity-norm below which the solver stops early
    pub grad_tol: f64,
    /// Central finite-difference step for surface gradients
    pub gradient_step: f64,
    /// Weight of the pairwise repulsion term in the fine pass
    pub separation_weight: f64,
    /// Radius within which the repulsion term applies (unit coordinates)
    pub neighbor_radius: f64,
    /// Distance-squared floor preventing repulsion blowup
    pub separation_floor: f64,
}

/// Parameters for agent-to-target assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    /// Agent count above which the greedy approximation replaces the
    /// exact optimal solver
    pub exact_threshold: usize,
}

/// Potential-field controller gains and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Attraction gain toward the assigned goal
    pub cohesion_gain: f64,
    /// Repulsion gain between agents
    pub separation_gain: f64,
    /// Distance below which agents repel each other (meters)
    pub min_separation: f64,
    /// Magnitude cap on emitted velocity commands (m/s)
    pub max_velocity: f64,
    /// Distance to goal below which an agent counts as arrived (meters)
    pub arrival_threshold: f64,
    /// Distance floor in the repulsion denominator (meters)
    pub separation_floor: f64,
    /// Cohesion gain used once every agent has arrived
    pub station_keep_cohesion_gain: f64,
}

/// Unit-shape to deployment (NED) coordinate transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Meters per unit-shape unit
    pub scale: f64,
    /// Formation center altitude in meters (positive up)
    pub altitude: f64,
}

/// Mission sequencing and timing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Control tick rate while holding formation (Hz)
    pub control_rate_hz: f64,
    /// Ceiling on the en-route phase before the mission proceeds with a
    /// partial-arrival diagnostic (seconds)
    pub arrival_timeout_secs: f64,
    /// Commanded speed for the move-to-formation batch (m/s)
    pub move_speed: f64,
    /// Per-agent backend connection timeout (seconds)
    pub connect_timeout_secs: f64,
    /// Directory for mission artifacts (goals, assignments); disabled if unset
    pub output_dir: Option<PathBuf>,
}

impl SwarmConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CoreError::Config(e.to_string()))
    }
}

impl MissionConfig {
    /// Control tick period derived from `control_rate_hz`.
    pub fn control_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.control_rate_hz.max(0.1))
    }

    /// En-route arrival deadline as a duration.
    pub fn arrival_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.arrival_timeout_secs)
    }

    /// Backend connection deadline as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connect_timeout_secs)
    }
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            distribution: DistributionConfig::default(),
            assignment: AssignmentConfig::default(),
            control: ControlConfig::default(),
            frame: FrameConfig::default(),
            mission: MissionConfig::default(),
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            initial_range: 10.0,
            axis_samples: 13,
            num_samples: 256,
            coarse_max_iters: 60,
            fine_max_iters: 40,
            grad_tol: 1e-4,
            gradient_step: 1e-4,
            separation_weight: 0.02,
            neighbor_radius: 1.0,
            separation_floor: 1e-6,
        }
    }
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            exact_threshold: 32,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            cohesion_gain: 1.0,
            separation_gain: 1.0,
            min_separation: 1.0,
            max_velocity: 2.0,
            arrival_threshold: 0.5,
            separation_floor: 1e-3,
            station_keep_cohesion_gain: 2.0,
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            scale: 5.0,
            altitude: 5.0,
        }
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            control_rate_hz: 2.0,
            arrival_timeout_secs: 120.0,
            move_speed: 2.0,
            connect_timeout_secs: 5.0,
            output_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = SwarmConfig::default();
        assert!(cfg.control.max_velocity > 0.0);
        assert!(cfg.control.arrival_threshold > 0.0);
        assert!(cfg.distribution.num_samples > 0);
        assert!(cfg.mission.control_rate_hz > 0.0);
        assert!(cfg.mission.output_dir.is_none());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let cfg: SwarmConfig = toml::from_str(
            r#"
            [control]
            max_velocity = 3.5

            [frame]
            scale = 10.0
            altitude = 10.0
            "#,
        )
        .unwrap();

        assert_eq!(cfg.control.max_velocity, 3.5);
        assert_eq!(cfg.frame.scale, 10.0);
        assert_eq!(cfg.frame.altitude, 10.0);
        // untouched sections keep their defaults
        assert_eq!(cfg.control.cohesion_gain, 1.0);
        assert_eq!(cfg.distribution.num_samples, 256);
    }

    #[test]
    fn test_control_period() {
        let mission = MissionConfig {
            control_rate_hz: 2.0,
            ..MissionConfig::default()
        };
        assert_eq!(mission.control_period(), Duration::from_millis(500));
    }
}
