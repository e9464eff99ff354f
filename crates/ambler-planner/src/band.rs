//! Elastic band trajectory representation
//!
//! The optimizer's internal state: a pose sequence joined by strictly
//! positive time intervals. The band is seeded from a reference path or
//! a start/goal pair, resized towards the desired temporal resolution,
//! deformed by the relaxation passes, and finally exported as a
//! [`Trajectory`].

use ambler_core::math::{angle_diff, normalize_angle};
use ambler_core::pose::{PoseSE2, Velocity};

use crate::config::{RobotConfig, TrajectoryConfig};
use crate::request::TimedPose;
use crate::trajectory::{Trajectory, TrajectoryPoint};

/// Hard cap on band samples; resizing never grows past this
pub const MAX_SAMPLES: usize = 500;

/// Minimum time interval kept between consecutive poses [s]
const MIN_TIME_DIFF: f64 = 0.01;

/// A pose sequence with one positive time interval per transition
#[derive(Debug, Clone, Default)]
pub struct ElasticBand {
    poses: Vec<PoseSE2>,
    time_diffs: Vec<f64>,
}

impl ElasticBand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn poses(&self) -> &[PoseSE2] {
        &self.poses
    }

    pub fn pose(&self, index: usize) -> &PoseSE2 {
        &self.poses[index]
    }

    pub fn pose_mut(&mut self, index: usize) -> &mut PoseSE2 {
        &mut self.poses[index]
    }

    pub fn time_diffs(&self) -> &[f64] {
        &self.time_diffs
    }

    pub fn start(&self) -> Option<&PoseSE2> {
        self.poses.first()
    }

    pub fn goal(&self) -> Option<&PoseSE2> {
        self.poses.last()
    }

    /// Total transition time over the band [s]
    pub fn duration(&self) -> f64 {
        self.time_diffs.iter().sum()
    }

    pub fn clear(&mut self) {
        self.poses.clear();
        self.time_diffs.clear();
    }

    /// Seed the band between a start and goal pose with linear
    /// interpolation at roughly `dt_ref` spacing.
    pub fn init_between(
        &mut self,
        start: &PoseSE2,
        goal: &PoseSE2,
        trajectory: &TrajectoryConfig,
        max_vel: f64,
    ) {
        self.clear();

        let dist = start.distance(goal);
        let step = (max_vel * trajectory.dt_ref).max(1e-3);
        let intervals = ((dist / step).ceil() as usize)
            .max(trajectory.min_samples.max(2) - 1)
            .min(MAX_SAMPLES - 1);

        let direction = normalize_angle((goal.position.y - start.position.y)
            .atan2(goal.position.x - start.position.x));
        for i in 0..=intervals {
            let alpha = i as f64 / intervals as f64;
            let mut pose = start.lerp(goal, alpha);
            // Interior poses face the direction of travel
            if i > 0 && i < intervals && dist > 1e-6 {
                pose.theta = direction;
            }
            self.poses.push(pose);
        }
        self.time_diffs = vec![trajectory.dt_ref; intervals];
    }

    /// Seed the band from a reference path, skipping poses closer than
    /// `init_skip_dist` and optionally overwriting orientations with
    /// the path direction.
    pub fn init_from_plan(
        &mut self,
        plan: &[TimedPose],
        trajectory: &TrajectoryConfig,
        max_vel: f64,
    ) {
        self.clear();
        if plan.is_empty() {
            return;
        }
        if plan.len() == 1 {
            self.poses.push(plan[0].pose);
            return;
        }

        let mut kept: Vec<PoseSE2> = vec![plan[0].pose];
        for timed in &plan[1..plan.len() - 1] {
            if kept.last().map_or(true, |last| {
                last.distance(&timed.pose) >= trajectory.init_skip_dist
            }) {
                kept.push(timed.pose);
            }
        }
        kept.push(plan[plan.len() - 1].pose);

        if trajectory.overwrite_global_orientation {
            for i in 1..kept.len() - 1 {
                let next = kept[i + 1].position;
                let here = kept[i].position;
                if (next - here).norm() > 1e-6 {
                    kept[i].theta = (next.y - here.y).atan2(next.x - here.x);
                }
            }
        }

        let step = max_vel.max(1e-3);
        self.time_diffs = kept
            .windows(2)
            .map(|w| (w[0].distance(&w[1]) / step).max(trajectory.dt_ref))
            .collect();
        self.poses = kept;

        self.ensure_min_samples(trajectory.min_samples);
    }

    /// Split the longest intervals until the band carries at least
    /// `min_samples` poses.
    fn ensure_min_samples(&mut self, min_samples: usize) {
        while self.poses.len() < min_samples && !self.time_diffs.is_empty() {
            let (longest, _) = self
                .time_diffs
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .expect("non-empty time diffs");
            self.split_interval(longest);
        }
    }

    fn split_interval(&mut self, index: usize) {
        let mid = PoseSE2::average(&self.poses[index], &self.poses[index + 1]);
        let half = self.time_diffs[index] * 0.5;
        self.time_diffs[index] = half;
        self.time_diffs.insert(index + 1, half);
        self.poses.insert(index + 1, mid);
    }

    /// One resize pass towards the desired temporal resolution.
    ///
    /// Intervals longer than `dt_ref + dt_hysteresis` are split,
    /// intervals shorter than `dt_ref - dt_hysteresis` are merged while
    /// the band stays above `min_samples`. Returns whether anything
    /// changed; callers iterate until the band settles.
    pub fn autosize_once(&mut self, trajectory: &TrajectoryConfig) -> bool {
        let upper = trajectory.dt_ref + trajectory.dt_hysteresis;
        let lower = trajectory.dt_ref - trajectory.dt_hysteresis;
        let mut changed = false;

        let mut i = 0;
        while i < self.time_diffs.len() {
            if self.time_diffs[i] > upper && self.poses.len() < MAX_SAMPLES {
                self.split_interval(i);
                changed = true;
                // Re-examine the shortened interval
                continue;
            }
            if self.time_diffs[i] < lower
                && self.poses.len() > trajectory.min_samples
                && i + 1 < self.time_diffs.len()
            {
                // Merge this interval into the next one
                let dt = self.time_diffs.remove(i);
                self.time_diffs[i] += dt;
                self.poses.remove(i + 1);
                changed = true;
                continue;
            }
            i += 1;
        }
        changed
    }

    /// Iterated resize until the band settles (bounded)
    pub fn autosize(&mut self, trajectory: &TrajectoryConfig) {
        for _ in 0..100 {
            if !self.autosize_once(trajectory) {
                break;
            }
        }
    }

    /// Rescale all time intervals so the transition velocities respect
    /// the robot's kinodynamic limits.
    ///
    /// Forward/backward passes shape a velocity profile that starts at
    /// `start_speed`, obeys the acceleration limit, and decays to zero
    /// at the goal unless `free_goal_vel` is set.
    pub fn rescale_time(&mut self, start_speed: f64, robot: &RobotConfig, free_goal_vel: bool) {
        let n = self.poses.len();
        if n < 2 {
            return;
        }

        let dists: Vec<f64> = self
            .poses
            .windows(2)
            .map(|w| w[0].distance(&w[1]))
            .collect();

        // Node speed caps: accelerate from the start, decelerate into the goal
        let mut node_speed = vec![robot.max_vel_x.max(1e-3); n];
        node_speed[0] = start_speed.abs().min(robot.max_vel_x);
        for i in 1..n {
            let reachable = (node_speed[i - 1].powi(2) + 2.0 * robot.acc_lim_x * dists[i - 1])
                .max(0.0)
                .sqrt();
            node_speed[i] = node_speed[i].min(reachable);
        }
        if !free_goal_vel {
            node_speed[n - 1] = 0.0;
        }
        for i in (0..n - 1).rev() {
            let reachable = (node_speed[i + 1].powi(2) + 2.0 * robot.acc_lim_x * dists[i])
                .max(0.0)
                .sqrt();
            node_speed[i] = node_speed[i].min(reachable);
        }

        for i in 0..n - 1 {
            let segment_speed = (0.5 * (node_speed[i] + node_speed[i + 1])).max(1e-3);
            let translational = dists[i] / segment_speed;
            let rotation = angle_diff(self.poses[i].theta, self.poses[i + 1].theta).abs();
            let rotational = rotation / robot.max_vel_theta.max(1e-3);
            self.time_diffs[i] = translational.max(rotational).max(MIN_TIME_DIFF);
        }
    }

    /// Drop the tail of the band, keeping the given fraction of poses.
    /// Used for advisory horizon reduction.
    pub fn shrink(&mut self, keep_fraction: f64, min_samples: usize) {
        let keep = ((self.poses.len() as f64 * keep_fraction).ceil() as usize)
            .max(min_samples)
            .min(self.poses.len());
        self.poses.truncate(keep);
        self.time_diffs.truncate(keep.saturating_sub(1));
    }

    /// All poses and intervals finite
    pub fn is_finite(&self) -> bool {
        self.poses.iter().all(PoseSE2::is_finite) && self.time_diffs.iter().all(|dt| dt.is_finite())
    }

    /// Export as a time-stamped trajectory.
    ///
    /// Point 0 carries the supplied start velocity; every following
    /// point carries the velocity of the transition leading into it;
    /// the final point carries the goal velocity (zero when `None`).
    pub fn to_trajectory(
        &self,
        start_velocity: Option<Velocity>,
        goal_velocity: Option<Velocity>,
    ) -> Trajectory {
        let mut points = Vec::with_capacity(self.poses.len());
        if self.poses.is_empty() {
            return Trajectory::new();
        }

        let mut time = 0.0;
        points.push(TrajectoryPoint::new(
            self.poses[0],
            start_velocity.unwrap_or_else(Velocity::zero),
            time,
        ));

        for i in 1..self.poses.len() {
            let dt = self.time_diffs[i - 1].max(MIN_TIME_DIFF);
            time += dt;
            let velocity = if i == self.poses.len() - 1 {
                goal_velocity.unwrap_or_else(Velocity::zero)
            } else {
                transition_velocity(&self.poses[i - 1], &self.poses[i], dt)
            };
            points.push(TrajectoryPoint::new(self.poses[i], velocity, time));
        }
        Trajectory::from_points(points)
    }

    /// Velocity of the first transition, used for the command extraction
    pub fn first_transition_velocity(&self) -> Option<Velocity> {
        if self.poses.len() < 2 {
            return None;
        }
        let dt = self.time_diffs.first().copied()?.max(MIN_TIME_DIFF);
        Some(transition_velocity(&self.poses[0], &self.poses[1], dt))
    }
}

/// Finite-difference velocity over one transition. The translational
/// component is signed by the driving direction relative to the heading.
fn transition_velocity(from: &PoseSE2, to: &PoseSE2, dt: f64) -> Velocity {
    let delta = to.position - from.position;
    let heading = from.orientation_unit();
    let sign = if delta.dot(&heading) >= 0.0 { 1.0 } else { -1.0 };
    Velocity::new(
        sign * delta.norm() / dt,
        angle_diff(from.theta, to.theta) / dt,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cfg() -> TrajectoryConfig {
        TrajectoryConfig::default()
    }

    fn robot() -> RobotConfig {
        RobotConfig::default()
    }

    #[test]
    fn test_init_between_sample_count() {
        let mut band = ElasticBand::new();
        band.init_between(
            &PoseSE2::new(0.0, 0.0, 0.0),
            &PoseSE2::new(4.0, 0.0, 0.0),
            &cfg(),
            0.4,
        );
        assert!(band.len() >= cfg().min_samples);
        assert_eq!(band.time_diffs().len(), band.len() - 1);
        // 4 m at 0.4 m/s and dt_ref 0.3 -> roughly 33 intervals
        assert!(band.len() > 30);
    }

    #[test]
    fn test_init_between_endpoints_kept() {
        let mut band = ElasticBand::new();
        let start = PoseSE2::new(0.0, 0.0, 0.5);
        let goal = PoseSE2::new(2.0, 1.0, -0.5);
        band.init_between(&start, &goal, &cfg(), 0.4);
        assert_relative_eq!(band.start().unwrap().x(), 0.0);
        assert_relative_eq!(band.goal().unwrap().x(), 2.0);
        assert_relative_eq!(band.start().unwrap().theta, 0.5);
        assert_relative_eq!(band.goal().unwrap().theta, -0.5);
    }

    #[test]
    fn test_init_from_plan_skips_dense_poses() {
        let plan: Vec<TimedPose> = (0..50)
            .map(|i| TimedPose::new(PoseSE2::new(i as f64 * 0.05, 0.0, 0.0), 0.0))
            .collect();
        let mut band = ElasticBand::new();
        band.init_from_plan(&plan, &cfg(), 0.4);
        // 2.45 m path with 0.4 m skip distance keeps few poses
        assert!(band.len() < 12);
        assert_relative_eq!(band.goal().unwrap().x(), 2.45);
    }

    #[test]
    fn test_autosize_splits_long_intervals() {
        let mut band = ElasticBand::new();
        band.init_between(
            &PoseSE2::new(0.0, 0.0, 0.0),
            &PoseSE2::new(1.0, 0.0, 0.0),
            &cfg(),
            0.4,
        );
        // Inflate one interval well above dt_ref + hysteresis
        band.time_diffs[0] = 2.0;
        let before = band.len();
        band.autosize(&cfg());
        assert!(band.len() > before);
        let upper = cfg().dt_ref + cfg().dt_hysteresis;
        assert!(band.time_diffs().iter().all(|&dt| dt <= upper + 1e-9));
    }

    #[test]
    fn test_autosize_respects_min_samples() {
        let mut band = ElasticBand::new();
        band.init_between(
            &PoseSE2::new(0.0, 0.0, 0.0),
            &PoseSE2::new(0.1, 0.0, 0.0),
            &cfg(),
            0.4,
        );
        for dt in band.time_diffs.iter_mut() {
            *dt = 0.01;
        }
        band.autosize(&cfg());
        assert!(band.len() >= cfg().min_samples);
    }

    #[test]
    fn test_rescale_time_respects_velocity_limit() {
        let mut band = ElasticBand::new();
        band.init_between(
            &PoseSE2::new(0.0, 0.0, 0.0),
            &PoseSE2::new(4.0, 0.0, 0.0),
            &cfg(),
            0.4,
        );
        band.rescale_time(0.0, &robot(), false);
        let traj = band.to_trajectory(None, None);
        for point in traj.points().iter().skip(1) {
            assert!(point.velocity.linear.abs() <= robot().max_vel_x + 1e-6);
        }
    }

    #[test]
    fn test_shrink_keeps_prefix() {
        let mut band = ElasticBand::new();
        band.init_between(
            &PoseSE2::new(0.0, 0.0, 0.0),
            &PoseSE2::new(4.0, 0.0, 0.0),
            &cfg(),
            0.4,
        );
        let before = band.len();
        band.shrink(0.5, 3);
        assert!(band.len() < before);
        assert!(band.len() >= 3);
        assert_relative_eq!(band.start().unwrap().x(), 0.0);
    }

    #[test]
    fn test_to_trajectory_boundary_velocities() {
        let mut band = ElasticBand::new();
        band.init_between(
            &PoseSE2::new(0.0, 0.0, 0.0),
            &PoseSE2::new(2.0, 0.0, 0.0),
            &cfg(),
            0.4,
        );
        let start_vel = Velocity::new(0.2, 0.0);
        let traj = band.to_trajectory(Some(start_vel), None);
        assert_eq!(traj.first().unwrap().velocity, start_vel);
        // Goal velocity defaults to zero
        assert_relative_eq!(traj.last().unwrap().velocity.linear, 0.0);
        // Time stamps are monotonic and start at zero
        assert_relative_eq!(traj.first().unwrap().time_from_start, 0.0);
        assert!(traj.duration() > 0.0);
    }

    #[test]
    fn test_backwards_transition_is_negative() {
        // Heading +x but moving in -x: the command must be negative
        let v = transition_velocity(
            &PoseSE2::new(0.0, 0.0, 0.0),
            &PoseSE2::new(-0.5, 0.0, 0.0),
            1.0,
        );
        assert!(v.linear < 0.0);
    }
}
