//! Unit-shape to deployment-frame conversion.
//!
//! Generated formations live in unit-shape coordinates around the origin.
//! The deployment frame is NED: z grows downward, so flying at altitude `h`
//! means `z = -h`. The transform scales the shape and sinks it to the
//! configured altitude.

use murmuration_core::config::FrameConfig;
use murmuration_core::Vec3;

/// Scale-and-offset transform between unit and deployment coordinates.
#[derive(Debug, Clone, Copy)]
pub struct FrameTransform {
    scale: f64,
    altitude: f64,
}

impl FrameTransform {
    /// Build the transform from configuration.
    pub fn new(cfg: &FrameConfig) -> Self {
        Self {
            scale: cfg.scale,
            altitude: cfg.altitude,
        }
    }

    /// Map a unit-shape point into deployment (NED) coordinates.
    pub fn to_world(&self, unit: Vec3) -> Vec3 {
        let scaled = unit * self.scale;
        Vec3::new(scaled.x, scaled.y, scaled.z - self.altitude)
    }

    /// Map a deployment point back into unit-shape coordinates.
    pub fn to_unit(&self, world: Vec3) -> Vec3 {
        Vec3::new(world.x, world.y, world.z + self.altitude) / self.scale
    }

    /// Transform a whole point list into deployment coordinates.
    pub fn apply(&self, points: &[Vec3]) -> Vec<Vec3> {
        points.iter().map(|p| self.to_world(*p)).collect()
    }
}
