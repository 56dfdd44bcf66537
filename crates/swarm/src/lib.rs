//! Murmuration swarm geometry and control.
//!
//! This crate turns an implicit-surface description of a target shape into a
//! flyable formation:
//!
//! - [`SurfaceFunction`]: opaque batched signed-distance oracle, with a
//!   small library of analytic shapes for tests and demos.
//! - [`PointDistributor`]: generates N well-separated points near the
//!   surface's zero level-set.
//! - [`assign`]: minimal-travel bijection between agents and target points.
//! - [`PotentialFieldController`]: per-tick bounded velocity commands with
//!   goal attraction and pairwise separation.
//! - [`FrameTransform`]: unit-shape to deployment (NED) coordinates.

pub mod assign;
pub mod cluster;
pub mod control;
pub mod distributor;
pub mod frame;
pub mod optimize;
pub mod surface;

pub use assign::{assign, Assignment, AssignmentError};
pub use control::{ControlOutput, GainProfile, PotentialFieldController};
pub use distributor::{Formation, PointDistributor};
pub use frame::FrameTransform;
pub use optimize::{minimize_bounded, Objective, SolverReport};
pub use surface::{BoxSurface, RingSurface, Sphere, SurfaceFunction, Torus};
