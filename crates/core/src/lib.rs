//! Core functionality for the Murmuration swarm formation engine.
//!
//! This crate provides the fundamental types, configuration and logging
//! utilities used across the Murmuration ecosystem.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{
    AssignmentConfig, ControlConfig, DistributionConfig, FrameConfig, MissionConfig, SwarmConfig,
};
pub use error::{CoreError, Result};
pub use types::Vec3;
