//! Visualization sink boundary
//!
//! The planner never renders anything itself; it pushes artifacts to an
//! externally supplied sink. Every hook has a no-op default so a sink
//! only implements what it displays, and planning never depends on it.

use crate::request::TimedPose;
use crate::trajectory::Trajectory;

/// Receiver for planner debug artifacts
pub trait VisualizationSink {
    /// The robot's current locally planned trajectory
    fn publish_robot_trajectory(&mut self, _trajectory: &Trajectory) {}

    /// The reference path the current plan was seeded from
    fn publish_reference_path(&mut self, _path: &[TimedPose]) {}

    /// A predicted/optimized trajectory for one human
    fn publish_human_trajectory(&mut self, _human_id: u64, _trajectory: &Trajectory) {}

    /// All alternative candidate trajectories explored this cycle
    fn publish_candidates(&mut self, _candidates: &[Trajectory]) {}
}

/// A sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullVisualization;

impl VisualizationSink for NullVisualization {}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;

    /// Test sink counting what was published
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub robot_trajectories: usize,
        pub human_trajectories: Vec<u64>,
        pub candidate_batches: usize,
    }

    impl VisualizationSink for RecordingSink {
        fn publish_robot_trajectory(&mut self, _trajectory: &Trajectory) {
            self.robot_trajectories += 1;
        }

        fn publish_human_trajectory(&mut self, human_id: u64, _trajectory: &Trajectory) {
            self.human_trajectories.push(human_id);
        }

        fn publish_candidates(&mut self, _candidates: &[Trajectory]) {
            self.candidate_batches += 1;
        }
    }
}
