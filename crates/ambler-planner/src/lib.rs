//! # Ambler Planner
//!
//! Human-aware local trajectory planning for mobile robots sharing
//! space with people.
//!
//! The crate is organized around a planner lifecycle contract driven
//! once per control cycle by a host process:
//!
//! ```text
//! plan(reference path, humans)  ->  optimized trajectory
//! velocity_command()            ->  (v, omega) for the base
//! is_trajectory_feasible(...)   ->  footprint sweep verdict
//! clear()                       ->  back to Uninitialized
//! ```
//!
//! # Components
//!
//! - [`config`]: validated, lock-guarded configuration aggregate
//! - [`request`]: plan requests and per-human reference plans
//! - [`trajectory`]: time-stamped output trajectories
//! - [`planner`]: the [`LocalPlanner`] lifecycle contract
//! - [`band`]: elastic-band trajectory state
//! - [`costs`]: the weighted cost terms, including the human-safety family
//! - [`optimizer`]: single-trajectory elastic-band planner
//! - [`homotopy`]: multi-trajectory homotopy-class exploration
//! - [`feasibility`]: footprint sweep against an external collision model
//! - [`visualization`]: debug artifact sink boundary

pub mod band;
pub mod config;
pub mod costs;
pub mod feasibility;
pub mod homotopy;
pub mod optimizer;
pub mod planner;
pub mod request;
pub mod trajectory;
pub mod visualization;

// Re-exports
pub use config::{PlannerConfig, SharedConfig};
pub use feasibility::{CollisionModel, ObstacleCollisionModel};
pub use homotopy::HomotopyPlanner;
pub use optimizer::EbandPlanner;
pub use planner::{LocalPlanner, PlanError, PlannerState};
pub use request::{HumanPlanIndex, PlanRequest, TimedPose};
pub use trajectory::{Trajectory, TrajectoryPoint};
pub use visualization::{NullVisualization, VisualizationSink};
