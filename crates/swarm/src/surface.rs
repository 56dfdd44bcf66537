//! Implicit-surface oracle and analytic shapes.
//!
//! The engine consumes target shapes as signed-distance functions: negative
//! inside the shape, positive outside, zero on the boundary. The oracle is
//! batched so callers can evaluate whole point clouds in one call.

use murmuration_core::Vec3;

/// A batched signed-distance oracle for a target shape.
///
/// Implementations must be pure: no side effects, safe to call repeatedly
/// and concurrently. The point distributor only ever observes the shape
/// through this interface.
pub trait SurfaceFunction: Send + Sync {
    /// Signed distances for a batch of points, one per input point.
    fn distances(&self, points: &[Vec3]) -> Vec<f64>;

    /// Signed distance for a single point.
    fn distance(&self, point: Vec3) -> f64 {
        self.distances(std::slice::from_ref(&point))[0]
    }
}

/// Sphere of a given radius centered at the origin.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    /// Sphere radius in unit coordinates
    pub radius: f64,
}

impl Sphere {
    /// The unit sphere.
    pub fn unit() -> Self {
        Self { radius: 1.0 }
    }
}

impl SurfaceFunction for Sphere {
    fn distances(&self, points: &[Vec3]) -> Vec<f64> {
        points.iter().map(|p| p.norm() - self.radius).collect()
    }
}

/// Axis-aligned box centered at the origin.
#[derive(Debug, Clone, Copy)]
pub struct BoxSurface {
    /// Half-extent along each axis
    pub half_extents: Vec3,
}

impl BoxSurface {
    /// Cube with the given half side length.
    pub fn cube(half_side: f64) -> Self {
        Self {
            half_extents: Vec3::new(half_side, half_side, half_side),
        }
    }
}

impl SurfaceFunction for BoxSurface {
    fn distances(&self, points: &[Vec3]) -> Vec<f64> {
        points
            .iter()
            .map(|p| {
                let q = Vec3::new(
                    p.x.abs() - self.half_extents.x,
                    p.y.abs() - self.half_extents.y,
                    p.z.abs() - self.half_extents.z,
                );
                let outside = q.max(Vec3::ZERO).norm();
                let inside = q.x.max(q.y).max(q.z).min(0.0);
                outside + inside
            })
            .collect()
    }
}

/// Torus around the z axis.
#[derive(Debug, Clone, Copy)]
pub struct Torus {
    /// Distance from the origin to the tube center
    pub major_radius: f64,
    /// Tube radius
    pub minor_radius: f64,
}

impl SurfaceFunction for Torus {
    fn distances(&self, points: &[Vec3]) -> Vec<f64> {
        points
            .iter()
            .map(|p| {
                let ring = (p.x * p.x + p.y * p.y).sqrt() - self.major_radius;
                (ring * ring + p.z * p.z).sqrt() - self.minor_radius
            })
            .collect()
    }
}

/// Horizontal circle in the xy plane.
///
/// Unlike the volumetric shapes this is a curve: the distance is never
/// negative, so points settle directly onto the ring.
#[derive(Debug, Clone, Copy)]
pub struct RingSurface {
    /// Circle radius in unit coordinates
    pub radius: f64,
}

impl SurfaceFunction for RingSurface {
    fn distances(&self, points: &[Vec3]) -> Vec<f64> {
        points
            .iter()
            .map(|p| {
                let ring = (p.x * p.x + p.y * p.y).sqrt() - self.radius;
                (ring * ring + p.z * p.z).sqrt()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_distances() {
        let sphere = Sphere { radius: 2.0 };
        let d = sphere.distances(&[
            Vec3::ZERO,
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 4.0),
        ]);
        assert_eq!(d, vec![-2.0, 0.0, 2.0]);
    }

    #[test]
    fn test_box_center_inside_surface_outside() {
        let cube = BoxSurface::cube(1.0);
        assert!(cube.distance(Vec3::ZERO) < 0.0);
        assert!(cube.distance(Vec3::new(1.0, 0.0, 0.0)).abs() < 1e-12);
        assert!(cube.distance(Vec3::new(2.0, 2.0, 2.0)) > 0.0);
    }

    #[test]
    fn test_torus_tube_center_is_inside() {
        let torus = Torus {
            major_radius: 2.0,
            minor_radius: 0.5,
        };
        assert!((torus.distance(Vec3::new(2.0, 0.0, 0.0)) + 0.5).abs() < 1e-12);
        assert!(torus.distance(Vec3::new(2.5, 0.0, 0.0)).abs() < 1e-12);
        assert!(torus.distance(Vec3::ZERO) > 0.0);
    }

    #[test]
    fn test_ring_is_never_negative() {
        let ring = RingSurface { radius: 1.0 };
        assert!(ring.distance(Vec3::new(1.0, 0.0, 0.0)).abs() < 1e-12);
        assert!(ring.distance(Vec3::ZERO) > 0.0);
        assert!(ring.distance(Vec3::new(0.0, 1.0, 0.5)) > 0.0);
    }
}
