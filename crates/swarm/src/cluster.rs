//! Seeded k-means clustering for point-cloud reduction.
//!
//! Used by the distributor to condense the refined sample cloud into the
//! requested number of well-spread formation points. Deterministic for a
//! given RNG state.

use murmuration_core::Vec3;
use rand::rngs::StdRng;
use rand::Rng;

const CONVERGENCE_EPS: f64 = 1e-9;

/// Reduce `points` to `k` cluster centers (k-means++ init, Lloyd iterations).
///
/// If the input holds `k` or fewer points they are returned unchanged.
pub fn kmeans(points: &[Vec3], k: usize, rng: &mut StdRng, max_iters: usize) -> Vec<Vec3> {
    if k == 0 {
        return Vec::new();
    }
    if points.len() <= k {
        return points.to_vec();
    }

    let mut centers = seed_centers(points, k, rng);
    let mut labels = vec![0usize; points.len()];

    for _ in 0..max_iters {
        // assignment step
        for (label, point) in labels.iter_mut().zip(points) {
            *label = nearest_center(*point, &centers);
        }

        // update step
        let mut sums = vec![Vec3::ZERO; k];
        let mut counts = vec![0usize; k];
        for (label, point) in labels.iter().zip(points) {
            sums[*label] += *point;
            counts[*label] += 1;
        }

        let mut moved = 0.0f64;
        for c in 0..k {
            let next = if counts[c] == 0 {
                // reseed an empty cluster with the point farthest from its center
                farthest_point(points, &labels, &centers)
            } else {
                sums[c] / counts[c] as f64
            };
            moved = moved.max(next.distance(centers[c]));
            centers[c] = next;
        }

        if moved < CONVERGENCE_EPS {
            break;
        }
    }

    centers
}

fn seed_centers(points: &[Vec3], k: usize, rng: &mut StdRng) -> Vec<Vec3> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())]);

    while centers.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| {
                centers
                    .iter()
                    .map(|c| (*p - *c).norm_squared())
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();

        if total <= 0.0 {
            // all remaining mass sits on existing centers; any point will do
            centers.push(points[rng.gen_range(0..points.len())]);
            continue;
        }

        let mut target = rng.gen::<f64>() * total;
        let mut chosen = points.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            target -= w;
            if target <= 0.0 {
                chosen = i;
                break;
            }
        }
        centers.push(points[chosen]);
    }

    centers
}

fn nearest_center(point: Vec3, centers: &[Vec3]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centers.iter().enumerate() {
        let d = (point - *c).norm_squared();
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

fn farthest_point(points: &[Vec3], labels: &[usize], centers: &[Vec3]) -> Vec3 {
    let mut best = points[0];
    let mut best_d = -1.0;
    for (label, point) in labels.iter().zip(points) {
        let d = (*point - centers[*label]).norm_squared();
        if d > best_d {
            best_d = d;
            best = *point;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn two_blobs() -> Vec<Vec3> {
        let mut points = Vec::new();
        for i in 0..10 {
            let off = i as f64 * 0.01;
            points.push(Vec3::new(off, off, 0.0));
            points.push(Vec3::new(5.0 + off, 5.0 + off, 0.0));
        }
        points
    }

    #[test]
    fn test_two_clusters_found() {
        let points = two_blobs();
        let mut rng = StdRng::seed_from_u64(7);
        let mut centers = kmeans(&points, 2, &mut rng, 32);
        centers.sort_by(|a, b| a.x.total_cmp(&b.x));

        assert_eq!(centers.len(), 2);
        assert!(centers[0].distance(Vec3::new(0.045, 0.045, 0.0)) < 0.5);
        assert!(centers[1].distance(Vec3::new(5.045, 5.045, 0.0)) < 0.5);
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let points = two_blobs();
        let mut rng_a = StdRng::seed_from_u64(11);
        let mut rng_b = StdRng::seed_from_u64(11);
        assert_eq!(
            kmeans(&points, 3, &mut rng_a, 32),
            kmeans(&points, 3, &mut rng_b, 32)
        );
    }

    #[test]
    fn test_fewer_points_than_clusters() {
        let points = vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)];
        let mut rng = StdRng::seed_from_u64(1);
        let centers = kmeans(&points, 5, &mut rng, 32);
        assert_eq!(centers, points);
    }

    #[test]
    fn test_k_zero_is_empty() {
        let points = two_blobs();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(kmeans(&points, 0, &mut rng, 32).is_empty());
    }
}
