//! Minimal-travel goal assignment.
//!
//! Computes a bijection between agent positions and target points that
//! minimizes the total squared Euclidean displacement. Small rosters get the
//! exact optimum via the Hungarian algorithm; above a configurable threshold
//! a greedy nearest-unique approximation takes over (closest unassigned
//! agent/target pair first). Ties resolve to the lowest agent index.

use murmuration_core::config::AssignmentConfig;
use murmuration_core::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Assignment errors.
#[derive(Debug, Error)]
pub enum AssignmentError {
    /// Agent and target counts differ
    #[error("Assignment count mismatch: {agents} agents vs {targets} targets")]
    CountMismatch {
        /// Number of agents supplied
        agents: usize,
        /// Number of targets supplied
        targets: usize,
    },
}

/// A bijection from agents to target points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// `target_of[i]` is the target index assigned to agent `i`
    pub target_of: Vec<usize>,
}

impl Assignment {
    /// Target index for an agent.
    pub fn target_for(&self, agent: usize) -> usize {
        self.target_of[agent]
    }

    /// Number of assigned pairs.
    pub fn len(&self) -> usize {
        self.target_of.len()
    }

    /// Whether the assignment is empty.
    pub fn is_empty(&self) -> bool {
        self.target_of.is_empty()
    }

    /// Reorder `targets` so index `i` holds agent `i`'s goal.
    pub fn goals(&self, targets: &[Vec3]) -> Vec<Vec3> {
        self.target_of.iter().map(|&j| targets[j]).collect()
    }

    /// Total squared displacement under this assignment.
    pub fn total_squared_distance(&self, current: &[Vec3], targets: &[Vec3]) -> f64 {
        self.target_of
            .iter()
            .enumerate()
            .map(|(i, &j)| (current[i] - targets[j]).norm_squared())
            .sum()
    }

    /// Whether every target is used exactly once.
    pub fn is_bijection(&self) -> bool {
        let n = self.target_of.len();
        let mut seen = vec![false; n];
        for &j in &self.target_of {
            if j >= n || seen[j] {
                return false;
            }
            seen[j] = true;
        }
        true
    }
}

/// Assign each agent a unique target minimizing total squared travel.
pub fn assign(
    current: &[Vec3],
    targets: &[Vec3],
    cfg: &AssignmentConfig,
) -> Result<Assignment, AssignmentError> {
    if current.len() != targets.len() {
        return Err(AssignmentError::CountMismatch {
            agents: current.len(),
            targets: targets.len(),
        });
    }

    let n = current.len();
    if n == 0 {
        return Ok(Assignment {
            target_of: Vec::new(),
        });
    }

    let cost: Vec<Vec<f64>> = current
        .iter()
        .map(|p| targets.iter().map(|t| (*p - *t).norm_squared()).collect())
        .collect();

    let target_of = if n <= cfg.exact_threshold {
        hungarian(&cost)
    } else {
        debug!(n, threshold = cfg.exact_threshold, "using greedy assignment");
        greedy(&cost)
    };

    Ok(Assignment { target_of })
}

/// Exact minimum-cost assignment (Hungarian algorithm with potentials).
///
/// O(n^3); rows are processed in agent order so equal-cost optima resolve
/// to the lowest agent index.
fn hungarian(cost: &[Vec<f64>]) -> Vec<usize> {
    let n = cost.len();
    // 1-based arrays; column 0 is the virtual start column
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    let mut row_of = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        row_of[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = row_of[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let reduced = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if reduced < minv[j] {
                    minv[j] = reduced;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[row_of[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if row_of[j0] == 0 {
                break;
            }
        }

        // augment along the alternating path
        loop {
            let j1 = way[j0];
            row_of[j0] = row_of[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut target_of = vec![0usize; n];
    for j in 1..=n {
        if row_of[j] > 0 {
            target_of[row_of[j] - 1] = j - 1;
        }
    }
    target_of
}

/// Greedy nearest-unique approximation: repeatedly commit the globally
/// closest unassigned agent/target pair. Strict comparison keeps the lowest
/// agent index on ties.
fn greedy(cost: &[Vec<f64>]) -> Vec<usize> {
    let n = cost.len();
    let mut target_of = vec![usize::MAX; n];
    let mut agent_done = vec![false; n];
    let mut target_taken = vec![false; n];

    for _ in 0..n {
        let mut best_cost = f64::INFINITY;
        let mut best_pair = (0usize, 0usize);
        for (i, row) in cost.iter().enumerate() {
            if agent_done[i] {
                continue;
            }
            for (j, &c) in row.iter().enumerate() {
                if !target_taken[j] && c < best_cost {
                    best_cost = c;
                    best_pair = (i, j);
                }
            }
        }
        let (i, j) = best_pair;
        target_of[i] = j;
        agent_done[i] = true;
        target_taken[j] = true;
    }

    target_of
}
