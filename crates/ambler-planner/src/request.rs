//! Planning requests
//!
//! Value types describing one planning cycle's input: the reference path
//! segment to track with optional boundary velocities, and the per-human
//! reference paths keyed by a stable numeric identifier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ambler_core::pose::{PoseSE2, Velocity};

/// A reference pose with a time stamp [s]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedPose {
    pub pose: PoseSE2,
    pub time: f64,
}

impl TimedPose {
    pub fn new(pose: PoseSE2, time: f64) -> Self {
        Self { pose, time }
    }
}

/// One planning cycle's request: an ordered reference pose sequence plus
/// optional start and goal velocities.
///
/// Owned per planning call and treated as immutable once submitted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Reference path segment to track, ordered from start to goal
    pub poses: Vec<TimedPose>,
    /// Velocity at the start of the trajectory (robot's current velocity)
    pub start_velocity: Option<Velocity>,
    /// Desired velocity at the goal pose
    pub goal_velocity: Option<Velocity>,
}

impl PlanRequest {
    pub fn new(poses: Vec<TimedPose>) -> Self {
        Self {
            poses,
            start_velocity: None,
            goal_velocity: None,
        }
    }

    /// Build a request from bare poses, stamping them at zero
    pub fn from_poses(poses: impl IntoIterator<Item = PoseSE2>) -> Self {
        Self::new(poses.into_iter().map(|p| TimedPose::new(p, 0.0)).collect())
    }

    /// Build a two-pose request from a start and goal pose
    pub fn between(start: PoseSE2, goal: PoseSE2) -> Self {
        Self::from_poses([start, goal])
    }

    pub fn with_start_velocity(mut self, velocity: Velocity) -> Self {
        self.start_velocity = Some(velocity);
        self
    }

    pub fn with_goal_velocity(mut self, velocity: Velocity) -> Self {
        self.goal_velocity = Some(velocity);
        self
    }

    pub fn start(&self) -> Option<&TimedPose> {
        self.poses.first()
    }

    pub fn goal(&self) -> Option<&TimedPose> {
        self.poses.last()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// A request is degenerate when it is empty or carries non-finite values
    pub fn is_degenerate(&self) -> bool {
        if self.poses.is_empty() {
            return true;
        }
        let velocities_finite = self.start_velocity.map_or(true, |v| v.is_finite())
            && self.goal_velocity.map_or(true, |v| v.is_finite());
        !velocities_finite
            || self
                .poses
                .iter()
                .any(|p| !p.pose.is_finite() || !p.time.is_finite())
    }

    /// Cumulative Euclidean length of the reference path
    pub fn path_length(&self) -> f64 {
        self.poses
            .windows(2)
            .map(|w| w[0].pose.distance(&w[1].pose))
            .sum()
    }
}

/// Per-human reference plans for one planning cycle, keyed by a stable
/// numeric identifier.
///
/// Entries are supplied fresh each cycle; an identifier only denotes the
/// same physical human within one cycle's data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HumanPlanIndex {
    entries: BTreeMap<u64, PlanRequest>,
}

impl HumanPlanIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a plan for the given human, replacing any previous entry
    pub fn insert(&mut self, human_id: u64, plan: PlanRequest) -> Option<PlanRequest> {
        self.entries.insert(human_id, plan)
    }

    pub fn get(&self, human_id: u64) -> Option<&PlanRequest> {
        self.entries.get(&human_id)
    }

    pub fn contains(&self, human_id: u64) -> bool {
        self.entries.contains_key(&human_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &PlanRequest)> {
        self.entries.iter().map(|(id, plan)| (*id, plan))
    }

    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(u64, PlanRequest)> for HumanPlanIndex {
    fn from_iter<I: IntoIterator<Item = (u64, PlanRequest)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_request() -> PlanRequest {
        PlanRequest::from_poses((0..5).map(|i| PoseSE2::new(i as f64, 0.0, 0.0)))
    }

    #[test]
    fn test_request_endpoints() {
        let req = straight_request();
        assert_eq!(req.start().unwrap().pose, PoseSE2::new(0.0, 0.0, 0.0));
        assert_eq!(req.goal().unwrap().pose, PoseSE2::new(4.0, 0.0, 0.0));
        assert!(!req.is_degenerate());
    }

    #[test]
    fn test_empty_request_is_degenerate() {
        assert!(PlanRequest::default().is_degenerate());
    }

    #[test]
    fn test_non_finite_request_is_degenerate() {
        let mut req = straight_request();
        req.poses[2].pose.theta = f64::NAN;
        assert!(req.is_degenerate());

        let req = straight_request().with_start_velocity(Velocity::new(f64::INFINITY, 0.0));
        assert!(req.is_degenerate());
    }

    #[test]
    fn test_path_length() {
        let req = straight_request();
        approx::assert_relative_eq!(req.path_length(), 4.0);
    }

    #[test]
    fn test_human_plan_index_unique_keys() {
        let mut index = HumanPlanIndex::new();
        index.insert(7, straight_request());
        let replaced = index.insert(7, PlanRequest::between(
            PoseSE2::new(0.0, 0.0, 0.0),
            PoseSE2::new(1.0, 0.0, 0.0),
        ));
        assert!(replaced.is_some());
        assert_eq!(index.len(), 1);
        assert!(index.contains(7));
        assert!(!index.contains(8));
    }
}
