//! # Ambler Core
//!
//! Planar geometry primitives shared by the ambler planning crates.
//!
//! This library carries no planner knowledge; it provides the SE(2) pose
//! and velocity types the planner exchanges with its host, the footprint
//! polygon predicates used for collision testing, and the obstacle
//! primitives the optimizer keeps its distance from.
//!
//! ## Modules
//!
//! - [`math`]: angle normalization and segment distance utilities
//! - [`pose`]: SE(2) poses and planar velocities
//! - [`footprint`]: footprint polygons and intersection predicates
//! - [`obstacle`]: point / line / polygon obstacles with distance queries

pub mod footprint;
pub mod math;
pub mod obstacle;
pub mod pose;

use nalgebra::Vector2;

/// 2D point/vector type used throughout the workspace
pub type Point2 = Vector2<f64>;

pub use footprint::FootprintPolygon;
pub use obstacle::Obstacle;
pub use pose::{PoseSE2, Velocity};
