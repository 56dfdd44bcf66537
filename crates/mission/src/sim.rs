//! Kinematic simulated backend.
//!
//! Point-mass agents with configurable per-command latency and fault
//! injection. Used by the demo binary and by every test that needs a whole
//! mission to run without a real vehicle.

use async_trait::async_trait;
use murmuration_core::Vec3;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::backend::{ActuationBackend, BackendError, CommandHandle, CommandResult};

/// Simulated backend parameters.
#[derive(Debug, Clone)]
pub struct SimBackendConfig {
    /// Fixed latency applied to takeoff, land and connect
    pub command_latency: Duration,
    /// Altitude reached after takeoff (meters, positive up)
    pub takeoff_altitude: f64,
    /// Integration step for move commands
    pub integration_tick: Duration,
    /// Inject a connection failure
    pub fail_connect: bool,
    /// Inject an arm rejection
    pub fail_arm: bool,
    /// Inject a takeoff rejection
    pub fail_takeoff: bool,
    /// Inject a move rejection
    pub fail_move: bool,
}

impl Default for SimBackendConfig {
    fn default() -> Self {
        Self {
            command_latency: Duration::from_millis(200),
            takeoff_altitude: 3.0,
            integration_tick: Duration::from_millis(50),
            fail_connect: false,
            fail_arm: false,
            fail_takeoff: false,
            fail_move: false,
        }
    }
}

#[derive(Debug)]
struct SimState {
    position: Vec3,
    velocity: Vec3,
    connected: bool,
    armed: bool,
    airborne: bool,
}

/// Simulated actuation backend for one agent.
pub struct SimulatedAgentBackend {
    name: String,
    cfg: SimBackendConfig,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedAgentBackend {
    /// Create a simulated agent parked at `start`.
    pub fn new(name: impl Into<String>, start: Vec3, cfg: SimBackendConfig) -> Self {
        Self {
            name: name.into(),
            cfg,
            state: Arc::new(Mutex::new(SimState {
                position: start,
                velocity: Vec3::ZERO,
                connected: false,
                armed: false,
                airborne: false,
            })),
        }
    }

    /// Spawn `count` agents named `Drone1..DroneN` parked on a line with
    /// the given spacing.
    pub fn fleet(count: usize, spacing: f64, cfg: SimBackendConfig) -> Vec<Arc<Self>> {
        (0..count)
            .map(|i| {
                Arc::new(Self::new(
                    format!("Drone{}", i + 1),
                    Vec3::new(i as f64 * spacing, 0.0, 0.0),
                    cfg.clone(),
                ))
            })
            .collect()
    }

    /// Current simulated position, bypassing the connection check.
    pub async fn raw_position(&self) -> Vec3 {
        self.state.lock().await.position
    }
}

#[async_trait]
impl ActuationBackend for SimulatedAgentBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> CommandResult {
        tokio::time::sleep(self.cfg.command_latency).await;
        if self.cfg.fail_connect {
            return Err(BackendError::Unreachable("simulated link loss".into()));
        }
        self.state.lock().await.connected = true;
        Ok(())
    }

    async fn arm(&self) -> CommandResult {
        let mut state = self.state.lock().await;
        if !state.connected {
            return Err(BackendError::Unreachable("arm before connect".into()));
        }
        if self.cfg.fail_arm {
            return Err(BackendError::Rejected("simulated arm refusal".into()));
        }
        state.armed = true;
        Ok(())
    }

    async fn disarm(&self) -> CommandResult {
        let mut state = self.state.lock().await;
        state.armed = false;
        state.velocity = Vec3::ZERO;
        Ok(())
    }

    fn takeoff(&self) -> CommandHandle {
        let state = self.state.clone();
        let cfg = self.cfg.clone();
        CommandHandle::spawn(async move {
            tokio::time::sleep(cfg.command_latency).await;
            if cfg.fail_takeoff {
                return Err(BackendError::Rejected("simulated takeoff refusal".into()));
            }
            let mut s = state.lock().await;
            if !s.armed {
                return Err(BackendError::Rejected("takeoff before arm".into()));
            }
            s.position.z = -cfg.takeoff_altitude;
            s.airborne = true;
            Ok(())
        })
    }

    fn land(&self) -> CommandHandle {
        let state = self.state.clone();
        let cfg = self.cfg.clone();
        CommandHandle::spawn(async move {
            tokio::time::sleep(cfg.command_latency).await;
            let mut s = state.lock().await;
            s.position.z = 0.0;
            s.velocity = Vec3::ZERO;
            s.airborne = false;
            Ok(())
        })
    }

    fn move_to(&self, position: Vec3, speed: f64) -> CommandHandle {
        let state = self.state.clone();
        let cfg = self.cfg.clone();
        CommandHandle::spawn(async move {
            if cfg.fail_move {
                tokio::time::sleep(cfg.command_latency).await;
                return Err(BackendError::Rejected("simulated move refusal".into()));
            }
            if speed <= 0.0 {
                return Err(BackendError::Rejected("non-positive speed".into()));
            }
            loop {
                tokio::time::sleep(cfg.integration_tick).await;
                let mut s = state.lock().await;
                if !s.airborne {
                    return Err(BackendError::Rejected("move while grounded".into()));
                }
                let to_target = position - s.position;
                let step = speed * cfg.integration_tick.as_secs_f64();
                if to_target.norm() <= step {
                    s.position = position;
                    s.velocity = Vec3::ZERO;
                    return Ok(());
                }
                let dir = to_target / to_target.norm();
                s.velocity = dir * speed;
                s.position += dir * step;
            }
        })
    }

    fn set_velocity(&self, velocity: Vec3, duration: Duration) -> CommandHandle {
        let state = self.state.clone();
        CommandHandle::spawn(async move {
            {
                let mut s = state.lock().await;
                if !s.airborne {
                    return Err(BackendError::Rejected("velocity while grounded".into()));
                }
                s.velocity = velocity;
            }
            tokio::time::sleep(duration).await;
            let mut s = state.lock().await;
            s.position += velocity * duration.as_secs_f64();
            s.velocity = Vec3::ZERO;
            Ok(())
        })
    }

    async fn position(&self) -> Result<Vec3, BackendError> {
        let state = self.state.lock().await;
        if !state.connected {
            return Err(BackendError::Unreachable("position before connect".into()));
        }
        Ok(state.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_cfg() -> SimBackendConfig {
        SimBackendConfig {
            command_latency: Duration::from_millis(10),
            ..SimBackendConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_flags() {
        let sim = SimulatedAgentBackend::new("Drone1", Vec3::ZERO, quick_cfg());
        assert!(sim.position().await.is_err());

        sim.connect().await.unwrap();
        sim.arm().await.unwrap();
        sim.takeoff().wait().await.unwrap();

        let pos = sim.position().await.unwrap();
        assert!((pos.z + 3.0).abs() < 1e-9, "takeoff altitude: {pos:?}");

        sim.land().wait().await.unwrap();
        sim.disarm().await.unwrap();
        assert_eq!(sim.position().await.unwrap().z, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_reaches_target() {
        let sim = SimulatedAgentBackend::new("Drone1", Vec3::ZERO, quick_cfg());
        sim.connect().await.unwrap();
        sim.arm().await.unwrap();
        sim.takeoff().wait().await.unwrap();

        let target = Vec3::new(4.0, 3.0, -5.0);
        sim.move_to(target, 2.0).wait().await.unwrap();
        assert!(sim.position().await.unwrap().distance(target) < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_require_arming_order() {
        let sim = SimulatedAgentBackend::new("Drone1", Vec3::ZERO, quick_cfg());
        assert!(matches!(
            sim.arm().await,
            Err(BackendError::Unreachable(_))
        ));

        sim.connect().await.unwrap();
        // takeoff without arming is refused
        assert!(sim.takeoff().wait().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_injection() {
        let sim = SimulatedAgentBackend::new(
            "Drone1",
            Vec3::ZERO,
            SimBackendConfig {
                fail_arm: true,
                ..quick_cfg()
            },
        );
        sim.connect().await.unwrap();
        assert!(matches!(sim.arm().await, Err(BackendError::Rejected(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_velocity_integrates_position() {
        let sim = SimulatedAgentBackend::new("Drone1", Vec3::ZERO, quick_cfg());
        sim.connect().await.unwrap();
        sim.arm().await.unwrap();
        sim.takeoff().wait().await.unwrap();

        sim.set_velocity(Vec3::new(1.0, 0.0, 0.0), Duration::from_secs(2))
            .wait()
            .await
            .unwrap();
        let pos = sim.position().await.unwrap();
        assert!((pos.x - 2.0).abs() < 1e-9);
    }
}
