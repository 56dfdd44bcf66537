//! Potential-field flight control.
//!
//! Per-tick feedback law combining saturating goal attraction with
//! short-range pairwise repulsion. Emitted velocities never exceed the
//! configured magnitude cap, and the repulsive force between two agents is
//! exactly antisymmetric: accumulation runs over unordered pairs and writes
//! equal and opposite contributions.

use murmuration_core::config::ControlConfig;
use murmuration_core::Vec3;

/// Gain profile selecting the attraction strength.
///
/// Station keeping swaps in a stiffer cohesion gain once every agent has
/// arrived; separation is untouched. Same law, different parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainProfile {
    /// En-route to the formation
    Transit,
    /// Holding formation after arrival
    StationKeep,
}

/// One control tick's output.
#[derive(Debug, Clone)]
pub struct ControlOutput {
    /// Velocity command per agent; zero for inactive agents
    pub velocities: Vec<Vec3>,
    /// Arrival flag per agent; always false for inactive agents
    pub arrived: Vec<bool>,
}

impl ControlOutput {
    /// Whether every active agent has arrived.
    pub fn all_arrived(&self, active: &[bool]) -> bool {
        active
            .iter()
            .zip(&self.arrived)
            .filter(|(is_active, _)| **is_active)
            .all(|(_, arrived)| *arrived)
    }
}

/// Reactive potential-field controller.
#[derive(Debug, Clone)]
pub struct PotentialFieldController {
    cfg: ControlConfig,
}

impl PotentialFieldController {
    /// Create a controller with the given gains and limits.
    pub fn new(cfg: ControlConfig) -> Self {
        Self { cfg }
    }

    /// Gains and limits this controller runs with.
    pub fn config(&self) -> &ControlConfig {
        &self.cfg
    }

    /// Compute one tick of velocity commands.
    ///
    /// `positions`, `goals` and `active` must have equal lengths. Inactive
    /// agents exert no forces, feel no forces, and receive a zero command.
    pub fn step(
        &self,
        positions: &[Vec3],
        goals: &[Vec3],
        active: &[bool],
        profile: GainProfile,
    ) -> ControlOutput {
        debug_assert_eq!(positions.len(), goals.len());
        debug_assert_eq!(positions.len(), active.len());

        let n = positions.len();
        let cohesion = match profile {
            GainProfile::Transit => self.cfg.cohesion_gain,
            GainProfile::StationKeep => self.cfg.station_keep_cohesion_gain,
        };

        let mut velocities = vec![Vec3::ZERO; n];

        // saturating attraction toward the assigned goal
        for i in 0..n {
            if !active[i] {
                continue;
            }
            let to_goal = goals[i] - positions[i];
            velocities[i] = (to_goal * cohesion).clamp_norm(self.cfg.max_velocity);
        }

        // pairwise repulsion, antisymmetric by construction
        let floor2 = self.cfg.separation_floor * self.cfg.separation_floor;
        for i in 0..n {
            if !active[i] {
                continue;
            }
            for j in (i + 1)..n {
                if !active[j] {
                    continue;
                }
                let offset = positions[i] - positions[j];
                let dist = offset.norm();
                if dist >= self.cfg.min_separation {
                    continue;
                }
                let direction = if dist > 0.0 {
                    offset / dist
                } else {
                    // coincident agents: any fixed direction keeps the pair
                    // antisymmetric
                    Vec3::new(1.0, 0.0, 0.0)
                };
                let force = direction * (self.cfg.separation_gain / (dist * dist).max(floor2));
                velocities[i] += force;
                velocities[j] -= force;
            }
        }

        let mut arrived = vec![false; n];
        for i in 0..n {
            if !active[i] {
                velocities[i] = Vec3::ZERO;
                continue;
            }
            velocities[i] = velocities[i].clamp_norm(self.cfg.max_velocity);
            arrived[i] = positions[i].distance(goals[i]) < self.cfg.arrival_threshold;
        }

        ControlOutput {
            velocities,
            arrived,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> PotentialFieldController {
        PotentialFieldController::new(ControlConfig::default())
    }

    #[test]
    fn test_velocity_never_exceeds_cap() {
        let ctrl = controller();
        let max = ctrl.config().max_velocity;
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.01, 0.0, 0.0),
            Vec3::new(500.0, 500.0, -500.0),
        ];
        let goals = vec![
            Vec3::new(1000.0, 0.0, 0.0),
            Vec3::new(-1000.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
        ];
        let active = vec![true; 3];

        for profile in [GainProfile::Transit, GainProfile::StationKeep] {
            let out = ctrl.step(&positions, &goals, &active, profile);
            for v in &out.velocities {
                assert!(v.norm() <= max + 1e-9, "|v| = {} exceeds {max}", v.norm());
            }
        }
    }

    #[test]
    fn test_attraction_points_toward_goal() {
        let ctrl = controller();
        let positions = vec![Vec3::ZERO];
        let goals = vec![Vec3::new(10.0, 0.0, 0.0)];
        let out = ctrl.step(&positions, &goals, &[true], GainProfile::Transit);
        assert!(out.velocities[0].x > 0.0);
        assert_eq!(out.velocities[0].y, 0.0);
    }

    #[test]
    fn test_repulsion_is_antisymmetric() {
        let ctrl = controller();
        // both agents share their goal midpoint so attraction cancels out
        // of the difference
        let positions = vec![Vec3::new(-0.2, 0.0, 0.0), Vec3::new(0.2, 0.0, 0.0)];
        let goals = vec![Vec3::ZERO, Vec3::ZERO];
        let out = ctrl.step(&positions, &goals, &[true, true], GainProfile::Transit);

        // attraction components mirror each other, so the sums must cancel
        let total = out.velocities[0] + out.velocities[1];
        assert!(total.norm() < 1e-9, "net force {total:?}");
        // and the pair is being pushed apart
        assert!(out.velocities[0].x < 0.0);
        assert!(out.velocities[1].x > 0.0);
    }

    #[test]
    fn test_coincident_agents_do_not_divide_by_zero() {
        let ctrl = controller();
        let positions = vec![Vec3::ZERO, Vec3::ZERO];
        let goals = vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)];
        let out = ctrl.step(&positions, &goals, &[true, true], GainProfile::Transit);
        for v in &out.velocities {
            assert!(v.x.is_finite() && v.y.is_finite() && v.z.is_finite());
        }
    }

    #[test]
    fn test_arrival_detection() {
        let ctrl = controller();
        let threshold = ctrl.config().arrival_threshold;
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
        ];
        let goals = vec![
            Vec3::new(threshold * 0.5, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
        ];
        let out = ctrl.step(&positions, &goals, &[true, true], GainProfile::Transit);
        assert!(out.arrived[0]);
        assert!(!out.arrived[1]);
        assert!(!out.all_arrived(&[true, true]));
        assert!(out.all_arrived(&[true, false]));
    }

    #[test]
    fn test_inactive_agents_are_inert() {
        let ctrl = controller();
        // agent 1 is inactive and parked right next to agent 0
        let positions = vec![Vec3::ZERO, Vec3::new(0.1, 0.0, 0.0)];
        let goals = vec![Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0)];
        let out = ctrl.step(&positions, &goals, &[true, false], GainProfile::Transit);

        // no repulsion from the inactive neighbor, no command for it either
        assert_eq!(out.velocities[1], Vec3::ZERO);
        assert!(!out.arrived[1]);
        assert!(out.velocities[0].norm() < 1e-9, "inactive agent exerted force");
    }

    #[test]
    fn test_station_keep_is_stiffer_near_goal() {
        let cfg = ControlConfig::default();
        let ctrl = PotentialFieldController::new(cfg.clone());
        let positions = vec![Vec3::new(0.1, 0.0, 0.0)];
        let goals = vec![Vec3::ZERO];

        let transit = ctrl.step(&positions, &goals, &[true], GainProfile::Transit);
        let holding = ctrl.step(&positions, &goals, &[true], GainProfile::StationKeep);
        assert!(holding.velocities[0].norm() > transit.velocities[0].norm());
    }
}
