//! Bounded first-order solver for point-cloud objectives.
//!
//! Projected gradient descent over a set of 3D points with Barzilai-Borwein
//! (two-point secant) step lengths and backtracking. Iterates stay inside an
//! axis-aligned box, iterations are capped, and non-convergence is reported
//! rather than raised: the caller always gets the best iterate found.

use murmuration_core::Vec3;

/// A differentiable objective over a set of points.
pub trait Objective {
    /// Objective value for the whole point set.
    fn value(&self, points: &[Vec3]) -> f64;

    /// Gradient with respect to each point.
    fn gradient(&self, points: &[Vec3]) -> Vec<Vec3>;
}

/// Outcome of a solver run.
#[derive(Debug, Clone, Copy)]
pub struct SolverReport {
    /// Iterations consumed
    pub iterations: usize,
    /// Whether the gradient tolerance was reached before the iteration cap
    pub converged: bool,
    /// Objective value at the returned iterate
    pub objective: f64,
}

const STEP_MIN: f64 = 1e-8;
const STEP_MAX: f64 = 1e2;
const BACKTRACK_TRIALS: usize = 20;

/// Minimize `objective` over `points`, each projected into `[lo, hi]`.
///
/// Returns the best iterate found together with a [`SolverReport`]. The
/// solver never fails: hitting the iteration cap or stalling in line search
/// simply yields `converged == false`.
pub fn minimize_bounded(
    objective: &dyn Objective,
    points: Vec<Vec3>,
    lo: Vec3,
    hi: Vec3,
    max_iters: usize,
    grad_tol: f64,
) -> (Vec<Vec3>, SolverReport) {
    let mut x: Vec<Vec3> = points.iter().map(|p| p.clamp_box(lo, hi)).collect();
    if x.is_empty() || max_iters == 0 {
        let objective = objective.value(&x);
        return (
            x,
            SolverReport {
                iterations: 0,
                converged: true,
                objective,
            },
        );
    }

    let mut fx = objective.value(&x);
    let mut grad = objective.gradient(&x);
    let mut best = x.clone();
    let mut best_f = fx;
    let mut prev: Option<(Vec<Vec3>, Vec<Vec3>)> = None;
    let mut alpha = 0.1;

    for iter in 1..=max_iters {
        if inf_norm(&grad) <= grad_tol {
            return (
                best,
                SolverReport {
                    iterations: iter - 1,
                    converged: true,
                    objective: best_f,
                },
            );
        }

        if let Some((px, pg)) = &prev {
            // BB1 step: (s . s) / (s . y)
            let mut ss = 0.0;
            let mut sy = 0.0;
            for i in 0..x.len() {
                let s = x[i] - px[i];
                let y = grad[i] - pg[i];
                ss += s.dot(s);
                sy += s.dot(y);
            }
            if sy > 1e-12 {
                alpha = (ss / sy).clamp(STEP_MIN, STEP_MAX);
            }
        }

        let mut trial = alpha;
        let mut accepted = false;
        for _ in 0..BACKTRACK_TRIALS {
            let candidate: Vec<Vec3> = x
                .iter()
                .zip(&grad)
                .map(|(p, g)| (*p - *g * trial).clamp_box(lo, hi))
                .collect();
            let fc = objective.value(&candidate);
            if fc < fx {
                prev = Some((std::mem::take(&mut x), std::mem::take(&mut grad)));
                x = candidate;
                fx = fc;
                grad = objective.gradient(&x);
                accepted = true;
                break;
            }
            trial *= 0.5;
        }

        if !accepted {
            // line search stalled; best iterate is as good as it gets
            return (
                best,
                SolverReport {
                    iterations: iter,
                    converged: false,
                    objective: best_f,
                },
            );
        }

        if fx < best_f {
            best_f = fx;
            best = x.clone();
        }
    }

    (
        best,
        SolverReport {
            iterations: max_iters,
            converged: false,
            objective: best_f,
        },
    )
}

fn inf_norm(grad: &[Vec3]) -> f64 {
    grad.iter()
        .flat_map(|g| [g.x.abs(), g.y.abs(), g.z.abs()])
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sum of squared distances to a fixed anchor per point.
    struct Quadratic {
        anchor: Vec3,
    }

    impl Objective for Quadratic {
        fn value(&self, points: &[Vec3]) -> f64 {
            points.iter().map(|p| (*p - self.anchor).norm_squared()).sum()
        }

        fn gradient(&self, points: &[Vec3]) -> Vec<Vec3> {
            points.iter().map(|p| (*p - self.anchor) * 2.0).collect()
        }
    }

    #[test]
    fn test_quadratic_converges_to_anchor() {
        let obj = Quadratic {
            anchor: Vec3::new(1.0, -2.0, 0.5),
        };
        let init = vec![Vec3::new(5.0, 5.0, 5.0), Vec3::new(-5.0, 0.0, 3.0)];
        let lo = Vec3::new(-10.0, -10.0, -10.0);
        let hi = Vec3::new(10.0, 10.0, 10.0);

        let (points, report) = minimize_bounded(&obj, init, lo, hi, 200, 1e-6);

        assert!(report.converged, "quadratic should converge: {report:?}");
        for p in points {
            assert!(p.distance(obj.anchor) < 1e-3);
        }
    }

    #[test]
    fn test_projection_respects_bounds() {
        let obj = Quadratic {
            anchor: Vec3::new(100.0, 0.0, 0.0),
        };
        let lo = Vec3::new(-1.0, -1.0, -1.0);
        let hi = Vec3::new(1.0, 1.0, 1.0);

        let (points, _) = minimize_bounded(&obj, vec![Vec3::ZERO], lo, hi, 100, 1e-9);

        // minimum inside the box is the face nearest the anchor
        assert!((points[0].x - 1.0).abs() < 1e-6);
        assert!(points[0].y.abs() < 1e-6);
    }

    #[test]
    fn test_zero_gradient_converges_immediately() {
        struct Flat;
        impl Objective for Flat {
            fn value(&self, _points: &[Vec3]) -> f64 {
                0.0
            }
            fn gradient(&self, points: &[Vec3]) -> Vec<Vec3> {
                vec![Vec3::ZERO; points.len()]
            }
        }

        let (_, report) = minimize_bounded(
            &Flat,
            vec![Vec3::new(1.0, 1.0, 1.0)],
            Vec3::new(-5.0, -5.0, -5.0),
            Vec3::new(5.0, 5.0, 5.0),
            50,
            1e-6,
        );
        assert!(report.converged);
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn test_empty_input_is_trivially_converged() {
        struct Flat;
        impl Objective for Flat {
            fn value(&self, _points: &[Vec3]) -> f64 {
                0.0
            }
            fn gradient(&self, points: &[Vec3]) -> Vec<Vec3> {
                vec![Vec3::ZERO; points.len()]
            }
        }

        let (points, report) = minimize_bounded(
            &Flat,
            Vec::new(),
            Vec3::ZERO,
            Vec3::ZERO,
            10,
            1e-6,
        );
        assert!(points.is_empty());
        assert!(report.converged);
    }
}
