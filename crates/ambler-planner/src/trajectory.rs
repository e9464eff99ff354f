//! Trajectory representation
//!
//! The planner's output: an ordered, time-monotonic sequence of poses
//! with velocities. Index 0 is the current planning-cycle state. The
//! sequence is owned by the planner; callers receive copies that are
//! only valid until the next plan call.

use serde::{Deserialize, Serialize};

use ambler_core::pose::{PoseSE2, Velocity};

/// One trajectory sample: pose, velocity and time offset from trajectory start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub pose: PoseSE2,
    pub velocity: Velocity,
    /// Relative time from trajectory start [s]
    pub time_from_start: f64,
}

impl TrajectoryPoint {
    pub fn new(pose: PoseSE2, velocity: Velocity, time_from_start: f64) -> Self {
        Self {
            pose,
            velocity,
            time_from_start,
        }
    }
}

/// An ordered, time-monotonic sequence of [`TrajectoryPoint`]s
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trajectory {
    points: Vec<TrajectoryPoint>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<TrajectoryPoint>) -> Self {
        debug_assert!(
            points.windows(2).all(|w| w[0].time_from_start <= w[1].time_from_start),
            "trajectory must be time-monotonic"
        );
        Self { points }
    }

    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn first(&self) -> Option<&TrajectoryPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&TrajectoryPoint> {
        self.points.last()
    }

    pub fn get(&self, index: usize) -> Option<&TrajectoryPoint> {
        self.points.get(index)
    }

    /// Total duration covered by the trajectory [s]
    pub fn duration(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.time_from_start)
    }

    /// Interpolated pose at a relative time, clamped to the trajectory bounds
    pub fn sample_pose(&self, time_from_start: f64) -> Option<PoseSE2> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        if time_from_start <= first.time_from_start {
            return Some(first.pose);
        }
        if time_from_start >= last.time_from_start {
            return Some(last.pose);
        }

        let upper = self
            .points
            .iter()
            .position(|p| p.time_from_start > time_from_start)?;
        let a = &self.points[upper - 1];
        let b = &self.points[upper];
        let span = b.time_from_start - a.time_from_start;
        if span <= f64::EPSILON {
            return Some(a.pose);
        }
        let alpha = (time_from_start - a.time_from_start) / span;
        Some(a.pose.lerp(&b.pose, alpha))
    }
}

impl From<Vec<TrajectoryPoint>> for Trajectory {
    fn from(points: Vec<TrajectoryPoint>) -> Self {
        Self::from_points(points)
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a TrajectoryPoint;
    type IntoIter = std::slice::Iter<'a, TrajectoryPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
