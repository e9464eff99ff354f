//! Elastic-band reference planner
//!
//! A single-trajectory implementation of the lifecycle contract. The
//! engine deforms an [`ElasticBand`] with penalty-driven relaxation
//! passes: interior poses are pulled towards the time-optimal
//! contraction and pushed out of the configured obstacle and human
//! clearances, while the time intervals are rescaled to keep the
//! velocity profile inside the kinodynamic limits.

use std::collections::BTreeMap;

use log::debug;

use ambler_core::footprint::FootprintPolygon;
use ambler_core::math::angle_diff;
use ambler_core::obstacle::Obstacle;
use ambler_core::pose::{PoseSE2, Velocity};
use ambler_core::Point2;

use crate::band::ElasticBand;
use crate::config::{PlannerConfig, PlanningMode, SharedConfig};
use crate::costs::{CostBreakdown, CostEvaluator};
use crate::feasibility::{sweep_is_collision_free, CollisionModel};
use crate::planner::{LocalPlanner, PlanError, PlannerState};
use crate::request::{HumanPlanIndex, PlanRequest, TimedPose};
use crate::trajectory::{Trajectory, TrajectoryPoint};
use crate::visualization::VisualizationSink;

/// Relaxation step size applied to the summed pose forces
const RELAX_STEP: f64 = 0.3;

/// Bound on how far one relaxation pass may move a pose [m]
const MAX_POSE_SHIFT: f64 = 0.2;

/// Diagnostics from the last optimization pass
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizationReport {
    /// Outer iterations executed
    pub outer_iterations: usize,
    /// Total inner relaxation passes executed
    pub inner_iterations: usize,
    /// Whether the band stayed numerically sound
    pub converged: bool,
    /// Weighted total cost after the final pass
    pub final_cost: f64,
}

/// Single-trajectory elastic-band planner
pub struct EbandPlanner {
    config: SharedConfig,
    obstacles: Vec<Obstacle>,
    via_points: Vec<Point2>,
    band: ElasticBand,
    trajectory: Trajectory,
    human_trajectories: BTreeMap<u64, Trajectory>,
    state: PlannerState,
    report: OptimizationReport,
    /// Consecutive failed plan calls, reset on success
    failure_streak: u32,
    /// Command extraction skips transitions before this offset [s]
    command_time_offset: f64,
}

impl EbandPlanner {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            obstacles: Vec::new(),
            via_points: Vec::new(),
            band: ElasticBand::new(),
            trajectory: Trajectory::new(),
            human_trajectories: BTreeMap::new(),
            state: PlannerState::Uninitialized,
            report: OptimizationReport::default(),
            failure_streak: 0,
            command_time_offset: 0.0,
        }
    }

    /// Replace the obstacle set for the coming planning cycles
    pub fn set_obstacles(&mut self, obstacles: Vec<Obstacle>) {
        self.obstacles = obstacles;
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Replace the via-points extracted from the reference path
    pub fn set_via_points(&mut self, via_points: Vec<Point2>) {
        self.via_points = via_points;
    }

    /// Diagnostics from the last optimization pass
    pub fn report(&self) -> &OptimizationReport {
        &self.report
    }

    /// The current trajectory (stale after a failed plan)
    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub(crate) fn human_trajectories(&self) -> &BTreeMap<u64, Trajectory> {
        &self.human_trajectories
    }

    /// Cost breakdown of the current trajectory under a given configuration
    pub fn current_cost(&self, config: &PlannerConfig, alternative_time_cost: bool) -> CostBreakdown {
        CostEvaluator::new(config, &self.obstacles, &self.via_points).evaluate(
            &self.trajectory,
            &self.human_trajectories,
            alternative_time_cost,
        )
    }

    /// Record a failure, preserving the previous trajectory but marking
    /// the command stale.
    fn fail(&mut self, error: PlanError) -> PlanError {
        if self.state != PlannerState::Uninitialized {
            self.state = PlannerState::Infeasible;
        }
        self.failure_streak += 1;
        error
    }

    fn plan_inner(
        &mut self,
        request: &PlanRequest,
        humans: Option<&HumanPlanIndex>,
        free_goal_vel: bool,
        cost_out: Option<&mut Vec<f64>>,
        pre_plan_time: f64,
    ) -> Result<(), PlanError> {
        if request.poses.len() < 2 {
            return Err(self.fail(PlanError::EmptyPlan));
        }
        if request.is_degenerate() {
            return Err(self.fail(PlanError::NonFinitePlan));
        }

        let config = self.config.snapshot();
        let free_goal_vel = free_goal_vel || config.goal_tolerance.free_goal_vel;

        self.build_human_trajectories(humans, &config);

        // Hot-start from the previous band unless the goal jumped or
        // warm starts are disabled
        let goal = request.poses[request.poses.len() - 1].pose;
        let warm = !config.optimization.disable_warm_start
            && self
                .band
                .goal()
                .map_or(false, |g| g.distance(&goal) < config.trajectory.force_reinit_new_goal_dist);
        if warm {
            *self.band.pose_mut(0) = request.poses[0].pose;
            let last = self.band.len() - 1;
            *self.band.pose_mut(last) = goal;
        } else {
            self.band
                .init_from_plan(&request.poses, &config.trajectory, config.robot.max_vel_x);
        }

        // Backup shrink: after repeated failures, plan on a shortened
        // horizon until a cycle succeeds again
        if config.trajectory.shrink_horizon && self.failure_streak > 0 {
            self.band.shrink(
                1.0 - config.trajectory.horizon_reduction_fraction,
                config.trajectory.min_samples,
            );
        }

        if self.band.len() < 2 {
            return Err(self.fail(PlanError::EmptyPlan));
        }

        let start_speed = request.start_velocity.map_or(0.0, |v| v.linear);
        self.optimize(&config, start_speed, free_goal_vel);

        if !self.band.is_finite() {
            let iterations =
                config.optimization.inner_iterations * config.optimization.outer_iterations;
            return Err(self.fail(PlanError::NotConverged { iterations }));
        }

        let goal_velocity = if free_goal_vel {
            request.goal_velocity
        } else {
            Some(Velocity::zero())
        };
        self.trajectory = self.band.to_trajectory(request.start_velocity, goal_velocity);
        self.command_time_offset = pre_plan_time.max(0.0);
        self.state = PlannerState::Feasible;
        self.failure_streak = 0;

        let breakdown = self.current_cost(&config, false);
        self.report.final_cost = breakdown.total(1.0);
        if let Some(costs) = cost_out {
            write_single_cost(costs, self.report.final_cost);
        }
        Ok(())
    }

    /// Outer/inner optimization loop over the band
    fn optimize(&mut self, config: &PlannerConfig, start_speed: f64, free_goal_vel: bool) {
        let optim = &config.optimization;
        self.report = OptimizationReport::default();

        if !optim.activate {
            self.band
                .rescale_time(start_speed, &config.robot, free_goal_vel);
            self.report.converged = true;
            return;
        }

        for outer in 0..optim.outer_iterations {
            if config.trajectory.autosize {
                self.band.autosize(&config.trajectory);
            }
            for _ in 0..optim.inner_iterations {
                self.relax_once(config);
                self.report.inner_iterations += 1;
            }
            self.band
                .rescale_time(start_speed, &config.robot, free_goal_vel);
            self.report.outer_iterations = outer + 1;

            if optim.verbose {
                debug!(
                    "optimization outer iteration {}: {} poses, duration {:.2}s",
                    outer + 1,
                    self.band.len(),
                    self.band.duration()
                );
            }
        }
        self.report.converged = self.band.is_finite();
    }

    /// One relaxation pass: pull interior poses towards the contraction
    /// and push them out of obstacle and human clearances.
    fn relax_once(&mut self, config: &PlannerConfig) {
        let n = self.band.len();
        if n < 3 {
            return;
        }
        let obstacle_range =
            config.obstacles.min_obstacle_dist + config.optimization.penalty_epsilon;
        let human_range = config.human.min_human_robot_dist;

        // Cumulative transition times for human matching
        let mut times = Vec::with_capacity(n);
        let mut acc = 0.0;
        times.push(0.0);
        for dt in self.band.time_diffs() {
            acc += dt;
            times.push(acc);
        }

        for i in 1..n - 1 {
            let prev = self.band.pose(i - 1).position;
            let here = self.band.pose(i).position;
            let next = self.band.pose(i + 1).position;

            let mut force = ((prev + next) * 0.5 - here) * 0.4;

            let path_dir = {
                let d = next - prev;
                let norm = d.norm();
                if norm > 1e-9 {
                    d / norm
                } else {
                    Point2::new(1.0, 0.0)
                }
            };
            let left_normal = Point2::new(-path_dir.y, path_dir.x);

            for obstacle in &self.obstacles {
                let dist = obstacle.min_distance(&here);
                if dist < obstacle_range {
                    let gradient = clearance_gradient(obstacle, &here);
                    // An obstacle sitting on the path leaves no lateral
                    // gradient; break the tie towards the left
                    let push = if gradient.norm() < 0.5
                        || gradient.dot(&left_normal).abs() < 0.3
                    {
                        left_normal
                    } else {
                        gradient
                    };
                    force += push * (obstacle_range - dist);
                }
            }

            if config.planning_mode == PlanningMode::HumanAware {
                for human in self.human_trajectories.values() {
                    if let Some(human_pose) = human.sample_pose(times[i]) {
                        let away = here - human_pose.position;
                        let dist = away.norm();
                        if dist > 1e-6 && dist < human_range {
                            force += away / dist * (human_range - dist);
                        }
                    }
                }
            }

            let shift = force * RELAX_STEP;
            let shift = if shift.norm() > MAX_POSE_SHIFT {
                shift / shift.norm() * MAX_POSE_SHIFT
            } else {
                shift
            };
            self.band.pose_mut(i).position += shift;
        }

        // Re-align interior headings with the deformed path
        for i in 1..n - 1 {
            let direction = self.band.pose(i + 1).position - self.band.pose(i - 1).position;
            if direction.norm() > 1e-6 {
                self.band.pose_mut(i).theta = direction.y.atan2(direction.x);
            }
        }
    }

    /// Time-parameterize each human's reference path at the nominal
    /// walking speed; these trajectories feed the safety costs and the
    /// per-human trajectory query.
    fn build_human_trajectories(
        &mut self,
        humans: Option<&HumanPlanIndex>,
        config: &PlannerConfig,
    ) {
        self.human_trajectories.clear();
        if config.planning_mode != PlanningMode::HumanAware {
            return;
        }
        let Some(humans) = humans else {
            return;
        };
        let speed = config
            .human
            .nominal_vel_x
            .min(config.human.max_vel_x)
            .max(0.1);

        for (id, plan) in humans.iter() {
            if plan.is_degenerate() {
                debug!("ignoring degenerate plan for human {}", id);
                continue;
            }
            let mut points = Vec::with_capacity(plan.poses.len());
            let mut time = 0.0;
            for (index, timed) in plan.poses.iter().enumerate() {
                let velocity = if index == 0 {
                    plan.start_velocity.unwrap_or_else(Velocity::zero)
                } else {
                    let previous = &plan.poses[index - 1];
                    let dist = previous.pose.distance(&timed.pose);
                    let dt = (dist / speed).max(1e-3);
                    time += dt;
                    Velocity::new(
                        speed,
                        angle_diff(previous.pose.theta, timed.pose.theta) / dt,
                    )
                };
                points.push(TrajectoryPoint::new(timed.pose, velocity, time));
            }
            // Densify short plans up to the configured sample floor
            while points.len() >= 2 && points.len() < config.trajectory.human_min_samples {
                let (widest, _) = points
                    .windows(2)
                    .enumerate()
                    .map(|(i, w)| (i, w[1].time_from_start - w[0].time_from_start))
                    .max_by(|a, b| a.1.total_cmp(&b.1))
                    .expect("at least one interval");
                let mid = TrajectoryPoint::new(
                    points[widest].pose.lerp(&points[widest + 1].pose, 0.5),
                    points[widest + 1].velocity,
                    0.5 * (points[widest].time_from_start + points[widest + 1].time_from_start),
                );
                points.insert(widest + 1, mid);
            }

            if !points.is_empty() {
                self.human_trajectories
                    .insert(id, Trajectory::from_points(points));
            }
        }
    }
}

/// Unit direction of steepest clearance increase, by central differences
fn clearance_gradient(obstacle: &Obstacle, at: &Point2) -> Point2 {
    const H: f64 = 1e-4;
    let dx = obstacle.min_distance(&Point2::new(at.x + H, at.y))
        - obstacle.min_distance(&Point2::new(at.x - H, at.y));
    let dy = obstacle.min_distance(&Point2::new(at.x, at.y + H))
        - obstacle.min_distance(&Point2::new(at.x, at.y - H));
    let gradient = Point2::new(dx, dy) / (2.0 * H);
    let norm = gradient.norm();
    if norm > 1e-9 {
        gradient / norm
    } else {
        Point2::new(0.0, 0.0)
    }
}

/// Write one scalar without resizing a caller-owned container
fn write_single_cost(costs: &mut Vec<f64>, value: f64) {
    if costs.is_empty() {
        costs.push(value);
    } else {
        costs[0] = value;
    }
}

/// Velocity command from the first transition at or after the latency
/// offset, with the optional steering-angle substitution applied.
pub(crate) fn extract_command(
    trajectory: &Trajectory,
    time_offset: f64,
    robot: &crate::config::RobotConfig,
) -> Option<Velocity> {
    if trajectory.len() < 2 {
        return None;
    }
    let command = trajectory
        .points()
        .iter()
        .skip(1)
        .find(|p| p.time_from_start >= time_offset)
        .or_else(|| trajectory.last())?
        .velocity;

    if robot.cmd_angle_instead_rotvel {
        let steering = if command.linear.abs() < 1e-6 {
            0.0
        } else {
            (robot.wheelbase * command.angular / command.linear).atan()
        };
        Some(Velocity::new(command.linear, steering))
    } else {
        Some(command)
    }
}

impl LocalPlanner for EbandPlanner {
    fn plan(
        &mut self,
        request: &PlanRequest,
        humans: Option<&HumanPlanIndex>,
        free_goal_vel: bool,
        cost_out: Option<&mut Vec<f64>>,
    ) -> Result<(), PlanError> {
        self.plan_inner(request, humans, free_goal_vel, cost_out, 0.0)
    }

    fn plan_between(
        &mut self,
        start: &PoseSE2,
        goal: &PoseSE2,
        start_velocity: Option<Velocity>,
        free_goal_vel: bool,
    ) -> Result<(), PlanError> {
        let mut request = PlanRequest::between(*start, *goal);
        request.start_velocity = start_velocity;
        self.plan_inner(&request, None, free_goal_vel, None, 0.0)
    }

    fn plan_with_elapsed(
        &mut self,
        start: &PoseSE2,
        goal: &PoseSE2,
        start_velocity: Option<Velocity>,
        free_goal_vel: bool,
        pre_plan_time: f64,
    ) -> Result<(), PlanError> {
        let mut request = PlanRequest::between(*start, *goal);
        request.start_velocity = start_velocity;
        self.plan_inner(&request, None, free_goal_vel, None, pre_plan_time)
    }

    fn velocity_command(&self) -> Option<Velocity> {
        if self.state != PlannerState::Feasible {
            return None;
        }
        let config = self.config.lock();
        extract_command(&self.trajectory, self.command_time_offset, &config.robot)
    }

    fn clear(&mut self) {
        self.band.clear();
        self.trajectory.clear();
        self.human_trajectories.clear();
        self.state = PlannerState::Uninitialized;
        self.report = OptimizationReport::default();
        self.failure_streak = 0;
        self.command_time_offset = 0.0;
    }

    fn state(&self) -> PlannerState {
        self.state
    }

    fn is_trajectory_feasible(
        &self,
        model: &dyn CollisionModel,
        footprint: &FootprintPolygon,
        inscribed_radius: f64,
        circumscribed_radius: f64,
        look_ahead: Option<usize>,
    ) -> bool {
        sweep_is_collision_free(
            &self.trajectory,
            model,
            footprint,
            inscribed_radius,
            circumscribed_radius,
            look_ahead,
        )
    }

    fn is_horizon_reduction_appropriate(&self, reference: &[TimedPose]) -> bool {
        let config = self.config.lock();
        if !config.trajectory.shrink_horizon || reference.len() < 3 {
            return false;
        }
        drop(config);

        // Corner cutting shows up as reference poses heading away from
        // the goal: the plan folds back on itself.
        let goal = reference[reference.len() - 1].pose.position;
        let mut opposed = 0usize;
        for timed in &reference[..reference.len() - 1] {
            let to_goal = goal - timed.pose.position;
            if to_goal.norm() < 1e-6 {
                continue;
            }
            if to_goal.dot(&timed.pose.orientation_unit()) < 0.0 {
                opposed += 1;
            }
        }
        opposed * 4 > reference.len()
    }

    fn compute_current_cost(
        &mut self,
        cost_out: &mut Vec<f64>,
        obstacle_cost_scale: f64,
        alternative_time_cost: bool,
    ) {
        let config = self.config.snapshot();
        let breakdown = self.current_cost(&config, alternative_time_cost);
        write_single_cost(cost_out, breakdown.total(obstacle_cost_scale));
    }

    fn full_trajectory(&self, out: &mut Trajectory) {
        *out = self.trajectory.clone();
    }

    fn full_human_trajectory(&self, human_id: u64) -> Trajectory {
        self.human_trajectories
            .get(&human_id)
            .cloned()
            .unwrap_or_default()
    }

    fn visualize(&self, sink: &mut dyn VisualizationSink) {
        let config = self.config.snapshot();
        if config.visualization.publish_robot_local_plan {
            sink.publish_robot_trajectory(&self.trajectory);
        }
        if config.visualization.publish_human_local_plans {
            for (id, trajectory) in &self.human_trajectories {
                sink.publish_human_trajectory(*id, trajectory);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::feasibility::ObstacleCollisionModel;

    fn planner() -> EbandPlanner {
        EbandPlanner::new(SharedConfig::new(PlannerConfig::default()))
    }

    fn straight_request() -> PlanRequest {
        PlanRequest::from_poses((0..5).map(|i| PoseSE2::new(i as f64, 0.0, 0.0)))
            .with_start_velocity(Velocity::zero())
            .with_goal_velocity(Velocity::zero())
    }

    #[test]
    fn test_straight_line_plan_succeeds() {
        let mut planner = planner();
        planner.plan(&straight_request(), None, false, None).unwrap();

        assert_eq!(planner.state(), PlannerState::Feasible);
        let mut trajectory = Trajectory::new();
        planner.full_trajectory(&mut trajectory);
        assert!(trajectory.len() >= 3);

        let command = planner.velocity_command().unwrap();
        assert!(command.linear >= 0.0);
        assert!(command.linear <= 0.4 + 1e-6);
    }

    #[test]
    fn test_empty_plan_fails_without_touching_trajectory() {
        let mut planner = planner();
        planner.plan(&straight_request(), None, false, None).unwrap();
        let mut before = Trajectory::new();
        planner.full_trajectory(&mut before);

        let result = planner.plan(&PlanRequest::default(), None, false, None);
        assert!(matches!(result, Err(PlanError::EmptyPlan)));
        assert_eq!(planner.state(), PlannerState::Infeasible);
        assert!(planner.velocity_command().is_none());

        let mut after = Trajectory::new();
        planner.full_trajectory(&mut after);
        assert_eq!(before, after);
    }

    #[test]
    fn test_non_finite_plan_fails() {
        let mut planner = planner();
        let mut request = straight_request();
        request.poses[2].pose.theta = f64::NAN;
        assert!(matches!(
            planner.plan(&request, None, false, None),
            Err(PlanError::NonFinitePlan)
        ));
    }

    #[test]
    fn test_clear_resets_to_uninitialized() {
        let mut planner = planner();
        planner.plan(&straight_request(), None, false, None).unwrap();
        planner.clear();
        assert_eq!(planner.state(), PlannerState::Uninitialized);
        assert!(planner.velocity_command().is_none());
    }

    #[test]
    fn test_clear_is_safe_right_after_construction() {
        let mut planner = planner();
        planner.clear();
        assert_eq!(planner.state(), PlannerState::Uninitialized);
    }

    #[test]
    fn test_velocity_command_before_plan_is_none() {
        assert!(planner().velocity_command().is_none());
    }

    #[test]
    fn test_plan_overload_equivalence() {
        let start = PoseSE2::new(0.0, 0.0, 0.0);
        let goal = PoseSE2::new(4.0, 0.0, 0.0);
        let vel = Velocity::zero();

        let mut a = planner();
        a.plan(
            &PlanRequest::between(start, goal).with_start_velocity(vel),
            None,
            false,
            None,
        )
        .unwrap();

        let mut b = planner();
        b.plan_between(&start, &goal, Some(vel), false).unwrap();

        let mut c = planner();
        c.plan_with_elapsed(&start, &goal, Some(vel), false, 0.0)
            .unwrap();

        let (mut ta, mut tb, mut tc) = (Trajectory::new(), Trajectory::new(), Trajectory::new());
        a.full_trajectory(&mut ta);
        b.full_trajectory(&mut tb);
        c.full_trajectory(&mut tc);

        for t in [&tb, &tc] {
            assert_eq!(ta.first().unwrap().pose, t.first().unwrap().pose);
            assert_eq!(ta.last().unwrap().pose, t.last().unwrap().pose);
            assert_eq!(ta.first().unwrap().velocity, t.first().unwrap().velocity);
            assert_eq!(ta.last().unwrap().velocity, t.last().unwrap().velocity);
        }
    }

    #[test]
    fn test_goal_velocity_pinned_to_zero_unless_free() {
        let mut planner = planner();
        let request = straight_request().with_goal_velocity(Velocity::new(0.3, 0.0));

        planner.plan(&request, None, false, None).unwrap();
        let mut constrained = Trajectory::new();
        planner.full_trajectory(&mut constrained);
        approx::assert_relative_eq!(constrained.last().unwrap().velocity.linear, 0.0);

        planner.plan(&request, None, true, None).unwrap();
        let mut free = Trajectory::new();
        planner.full_trajectory(&mut free);
        approx::assert_relative_eq!(free.last().unwrap().velocity.linear, 0.3);
    }

    #[test]
    fn test_band_avoids_obstacle() {
        let mut planner = planner();
        planner.set_obstacles(vec![Obstacle::point(2.0, 0.0)]);
        planner.plan(&straight_request(), None, false, None).unwrap();

        let mut trajectory = Trajectory::new();
        planner.full_trajectory(&mut trajectory);
        // The band bends away from an obstacle sitting on the path
        let peak_clearance = trajectory
            .points()
            .iter()
            .map(|p| (p.pose.position - Point2::new(2.0, 0.0)).norm())
            .fold(f64::INFINITY, f64::min);
        assert!(
            peak_clearance > 0.05,
            "expected the band to clear the obstacle, closest {}",
            peak_clearance
        );
    }

    #[test]
    fn test_feasibility_uses_current_trajectory() {
        let mut planner = planner();
        planner.plan(&straight_request(), None, false, None).unwrap();

        let footprint = FootprintPolygon::square(0.2);
        let clear = ObstacleCollisionModel::new(vec![]);
        assert!(planner.is_trajectory_feasible(&clear, &footprint, 0.0, 0.0, None));

        // Obstacle well off the line stays clear even with full sweep
        let offside = ObstacleCollisionModel::new(vec![Obstacle::point(2.0, 5.0)]);
        assert!(planner.is_trajectory_feasible(&offside, &footprint, 0.0, 0.0, Some(10_000)));
    }

    #[test]
    fn test_cost_output_not_resized() {
        let mut planner = planner();
        let mut costs = vec![0.0];
        planner
            .plan(&straight_request(), None, false, Some(&mut costs))
            .unwrap();
        assert_eq!(costs.len(), 1);
        assert!(costs[0] > 0.0);
    }

    #[test]
    fn test_unknown_human_yields_empty_trajectory() {
        let mut planner = planner();
        planner.plan(&straight_request(), None, false, None).unwrap();
        assert!(planner.full_human_trajectory(99).is_empty());
    }

    #[test]
    fn test_human_trajectory_is_retrievable() {
        let mut planner = planner();
        let mut humans = HumanPlanIndex::new();
        humans.insert(
            7,
            PlanRequest::from_poses((0..4).map(|i| PoseSE2::new(3.0, i as f64, 0.0))),
        );
        planner
            .plan(&straight_request(), Some(&humans), false, None)
            .unwrap();

        let trajectory = planner.full_human_trajectory(7);
        assert!(!trajectory.is_empty());
        approx::assert_relative_eq!(trajectory.first().unwrap().pose.x(), 3.0);
        // Walking speed stays at the nominal velocity
        for point in trajectory.points().iter().skip(1) {
            assert!(point.velocity.linear <= 1.1 + 1e-9);
        }
    }

    #[test]
    fn test_horizon_reduction_on_folded_reference() {
        let planner = planner();

        // Straight, forward-facing reference: no reduction
        let straight: Vec<TimedPose> = (0..8)
            .map(|i| TimedPose::new(PoseSE2::new(i as f64, 0.0, 0.0), 0.0))
            .collect();
        assert!(!planner.is_horizon_reduction_appropriate(&straight));

        // Folded reference: most poses face away from the goal
        let folded: Vec<TimedPose> = (0..8)
            .map(|i| TimedPose::new(PoseSE2::new(i as f64, 0.0, std::f64::consts::PI), 0.0))
            .chain([TimedPose::new(PoseSE2::new(8.0, 0.0, 0.0), 0.0)])
            .collect();
        assert!(planner.is_horizon_reduction_appropriate(&folded));
    }

    #[test]
    fn test_visualize_honours_publish_toggles() {
        use crate::visualization::recording::RecordingSink;

        let mut planner = planner();
        let mut humans = HumanPlanIndex::new();
        humans.insert(
            3,
            PlanRequest::from_poses([PoseSE2::new(2.0, 1.0, 0.0), PoseSE2::new(2.0, 3.0, 0.0)]),
        );
        planner
            .plan(&straight_request(), Some(&humans), false, None)
            .unwrap();

        let mut sink = RecordingSink::default();
        planner.visualize(&mut sink);
        assert_eq!(sink.robot_trajectories, 1);
        assert_eq!(sink.human_trajectories, vec![3]);

        // Disabled toggles publish nothing
        planner.config.lock().visualization.publish_robot_local_plan = false;
        planner.config.lock().visualization.publish_human_local_plans = false;
        let mut muted = RecordingSink::default();
        planner.visualize(&mut muted);
        assert_eq!(muted.robot_trajectories, 0);
        assert!(muted.human_trajectories.is_empty());
    }

    #[test]
    fn test_compute_current_cost_scales_obstacle_term_only() {
        let mut planner = planner();
        planner.set_obstacles(vec![Obstacle::point(2.0, 0.3)]);
        planner.plan(&straight_request(), None, false, None).unwrap();

        let mut base = vec![0.0];
        let mut scaled = vec![0.0];
        planner.compute_current_cost(&mut base, 1.0, false);
        planner.compute_current_cost(&mut scaled, 2.0, false);

        let config = planner.config.snapshot();
        let breakdown = planner.current_cost(&config, false);
        approx::assert_relative_eq!(scaled[0] - base[0], breakdown.obstacle, epsilon = 1e-9);
    }
}
