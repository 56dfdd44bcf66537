//! Surface point distribution.
//!
//! Turns a signed-distance surface and a point count into a formation of
//! well-separated points on the zero level-set:
//!
//! 1. probe a lattice to bound the region containing the surface,
//! 2. seed a candidate cloud inside those bounds,
//! 3. pull the cloud onto the surface (coarse pass),
//! 4. condense to the requested count with k-means,
//! 5. tighten adherence while repelling near neighbors (fine pass).
//!
//! Non-convergence of either solver pass is a diagnostic, never an error:
//! the best iterate is returned with `converged == false`.

use murmuration_core::config::DistributionConfig;
use murmuration_core::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cluster::kmeans;
use crate::optimize::{minimize_bounded, Objective};
use crate::surface::SurfaceFunction;

const KMEANS_MAX_ITERS: usize = 32;

/// A generated formation: the target points plus generation metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formation {
    /// Target points in unit-shape coordinates
    pub points: Vec<Vec3>,
    /// Number of points requested
    pub requested: usize,
    /// RNG seed the generation ran with
    pub seed: u64,
    /// False when a refinement pass hit its iteration cap
    pub converged: bool,
}

impl Formation {
    /// Number of generated points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the formation holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Smallest pairwise distance, or `None` for fewer than two points.
    pub fn min_pairwise_distance(&self) -> Option<f64> {
        let mut min = f64::INFINITY;
        for i in 0..self.points.len() {
            for j in (i + 1)..self.points.len() {
                min = min.min(self.points[i].distance(self.points[j]));
            }
        }
        (min.is_finite()).then_some(min)
    }
}

/// Distributes points onto a signed-distance surface.
pub struct PointDistributor<'a> {
    surface: &'a dyn SurfaceFunction,
    cfg: DistributionConfig,
}

impl<'a> PointDistributor<'a> {
    /// Create a distributor for a surface with the given solver parameters.
    pub fn new(surface: &'a dyn SurfaceFunction, cfg: DistributionConfig) -> Self {
        Self { surface, cfg }
    }

    /// Generate `n` well-separated points near the surface.
    ///
    /// Deterministic for a fixed `seed`. `n == 0` yields an empty formation
    /// without evaluating the surface.
    pub fn generate(&self, n: usize, seed: u64) -> Formation {
        if n == 0 {
            return Formation {
                points: Vec::new(),
                requested: 0,
                seed,
                converged: true,
            };
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let (lo, hi) = self.estimate_bounds();
        debug!(?lo, ?hi, "estimated surface bounds");

        let samples = self.cfg.num_samples.max(n);
        let cloud: Vec<Vec3> = (0..samples)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(lo.x..=hi.x),
                    rng.gen_range(lo.y..=hi.y),
                    rng.gen_range(lo.z..=hi.z),
                )
            })
            .collect();

        let adherence = SurfaceAdherence {
            surface: self.surface,
            step: self.cfg.gradient_step,
        };
        let (cloud, coarse) = minimize_bounded(
            &adherence,
            cloud,
            lo,
            hi,
            self.cfg.coarse_max_iters,
            self.cfg.grad_tol,
        );
        debug!(
            iterations = coarse.iterations,
            converged = coarse.converged,
            objective = coarse.objective,
            "coarse refinement finished"
        );

        let centers = kmeans(&cloud, n, &mut rng, KMEANS_MAX_ITERS);

        let composite = CompositeObjective {
            adherence,
            weight: self.cfg.separation_weight,
            radius: self.cfg.neighbor_radius,
            floor: self.cfg.separation_floor,
        };
        let (points, fine) = minimize_bounded(
            &composite,
            centers,
            lo,
            hi,
            self.cfg.fine_max_iters,
            self.cfg.grad_tol,
        );
        debug!(
            iterations = fine.iterations,
            converged = fine.converged,
            objective = fine.objective,
            "fine refinement finished"
        );

        Formation {
            points,
            requested: n,
            seed,
            converged: coarse.converged && fine.converged,
        }
    }

    /// Bound the region containing the zero level-set.
    ///
    /// Probes a uniform lattice and boxes every sample within one lattice
    /// step of the surface (interior samples included). Falls back to a
    /// fixed box when the probe finds nothing.
    fn estimate_bounds(&self) -> (Vec3, Vec3) {
        let range = self.cfg.initial_range;
        let samples = self.cfg.axis_samples.max(2);
        let step = 2.0 * range / (samples - 1) as f64;

        let mut lattice = Vec::with_capacity(samples * samples * samples);
        for ix in 0..samples {
            for iy in 0..samples {
                for iz in 0..samples {
                    lattice.push(Vec3::new(
                        -range + ix as f64 * step,
                        -range + iy as f64 * step,
                        -range + iz as f64 * step,
                    ));
                }
            }
        }

        let distances = self.surface.distances(&lattice);
        let mut lo = Vec3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut hi = Vec3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        let mut hits = 0usize;
        for (point, d) in lattice.iter().zip(&distances) {
            if *d <= step {
                lo = lo.min(*point);
                hi = hi.max(*point);
                hits += 1;
            }
        }

        if hits == 0 {
            return (Vec3::new(-5.0, -5.0, -5.0), Vec3::new(5.0, 5.0, 5.0));
        }

        let pad = Vec3::new(step, step, step);
        (lo - pad, hi + pad)
    }
}

/// Squared surface distance summed over the point set.
struct SurfaceAdherence<'a> {
    surface: &'a dyn SurfaceFunction,
    step: f64,
}

impl Objective for SurfaceAdherence<'_> {
    fn value(&self, points: &[Vec3]) -> f64 {
        self.surface.distances(points).iter().map(|d| d * d).sum()
    }

    fn gradient(&self, points: &[Vec3]) -> Vec<Vec3> {
        // one batched call: values first, then 6 central-difference probes
        // per point
        let n = points.len();
        let mut probes = Vec::with_capacity(n * 7);
        probes.extend_from_slice(points);
        for p in points {
            for axis in 0..3 {
                let mut fwd = *p;
                *fwd.axis_mut(axis) += self.step;
                let mut back = *p;
                *back.axis_mut(axis) -= self.step;
                probes.push(fwd);
                probes.push(back);
            }
        }

        let d = self.surface.distances(&probes);
        let mut grad = Vec::with_capacity(n);
        for i in 0..n {
            let f = d[i];
            let base = n + i * 6;
            let df = Vec3::new(
                (d[base] - d[base + 1]) / (2.0 * self.step),
                (d[base + 2] - d[base + 3]) / (2.0 * self.step),
                (d[base + 4] - d[base + 5]) / (2.0 * self.step),
            );
            grad.push(df * (2.0 * f));
        }
        grad
    }
}

/// Surface adherence plus short-range pairwise repulsion.
struct CompositeObjective<'a> {
    adherence: SurfaceAdherence<'a>,
    weight: f64,
    radius: f64,
    floor: f64,
}

impl Objective for CompositeObjective<'_> {
    fn value(&self, points: &[Vec3]) -> f64 {
        let mut total = self.adherence.value(points);
        if self.weight > 0.0 {
            for i in 0..points.len() {
                for j in (i + 1)..points.len() {
                    let d2 = (points[i] - points[j]).norm_squared();
                    if d2 < self.radius * self.radius {
                        total += self.weight / (d2 + self.floor);
                    }
                }
            }
        }
        total
    }

    fn gradient(&self, points: &[Vec3]) -> Vec<Vec3> {
        let mut grad = self.adherence.gradient(points);
        if self.weight > 0.0 {
            for i in 0..points.len() {
                for j in (i + 1)..points.len() {
                    let offset = points[i] - points[j];
                    let d2 = offset.norm_squared();
                    if d2 < self.radius * self.radius {
                        let denom = d2 + self.floor;
                        let pull = offset * (-2.0 * self.weight / (denom * denom));
                        grad[i] += pull;
                        grad[j] -= pull;
                    }
                }
            }
        }
        grad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Sphere;
    use murmuration_core::config::DistributionConfig;

    fn distributor_cfg() -> DistributionConfig {
        DistributionConfig {
            num_samples: 128,
            ..DistributionConfig::default()
        }
    }

    #[test]
    fn test_zero_points_requested() {
        let sphere = Sphere { radius: 2.0 };
        let distributor = PointDistributor::new(&sphere, distributor_cfg());
        let formation = distributor.generate(0, 42);
        assert!(formation.is_empty());
        assert!(formation.converged);
    }

    #[test]
    fn test_exact_count_for_various_n() {
        let sphere = Sphere { radius: 2.0 };
        let distributor = PointDistributor::new(&sphere, distributor_cfg());
        for n in [1, 2, 5, 9] {
            let formation = distributor.generate(n, 42);
            assert_eq!(formation.len(), n, "requested {n} points");
        }
    }

    #[test]
    fn test_points_adhere_to_sphere() {
        let sphere = Sphere { radius: 2.0 };
        let distributor = PointDistributor::new(&sphere, distributor_cfg());
        let formation = distributor.generate(8, 7);

        let residuals = sphere.distances(&formation.points);
        let worst = residuals.iter().fold(0.0f64, |acc, d| acc.max(d.abs()));
        assert!(worst < 0.3, "worst surface residual {worst}");
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let sphere = Sphere { radius: 2.0 };
        let distributor = PointDistributor::new(&sphere, distributor_cfg());
        let a = distributor.generate(6, 99);
        let b = distributor.generate(6, 99);
        assert_eq!(a.points, b.points);
    }

    #[test]
    fn test_degenerate_zero_surface_terminates() {
        struct Flat;
        impl SurfaceFunction for Flat {
            fn distances(&self, points: &[Vec3]) -> Vec<f64> {
                vec![0.0; points.len()]
            }
        }

        let distributor = PointDistributor::new(&Flat, distributor_cfg());
        let formation = distributor.generate(5, 3);
        assert_eq!(formation.len(), 5);
        for p in &formation.points {
            assert!(p.x.is_finite() && p.y.is_finite() && p.z.is_finite());
        }
    }

    #[test]
    fn test_separation_weight_does_not_shrink_min_distance() {
        let sphere = Sphere { radius: 2.0 };
        let seed = 21;

        let sparse = PointDistributor::new(
            &sphere,
            DistributionConfig {
                separation_weight: 0.0,
                ..distributor_cfg()
            },
        )
        .generate(6, seed);
        let repelled = PointDistributor::new(
            &sphere,
            DistributionConfig {
                separation_weight: 0.05,
                ..distributor_cfg()
            },
        )
        .generate(6, seed);

        let before = sparse.min_pairwise_distance().unwrap();
        let after = repelled.min_pairwise_distance().unwrap();
        assert!(
            after >= before - 1e-3,
            "min distance fell from {before} to {after}"
        );
    }
}
