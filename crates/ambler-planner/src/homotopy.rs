//! Homotopy-class exploration planner
//!
//! Optimizes several topologically distinct trajectory candidates at
//! once and selects the cheapest with hysteresis, so the robot does not
//! flip between corridors every cycle. Candidates are identified by a
//! winding-angle signature over the obstacle set; two candidates whose
//! signatures differ less than the configured threshold belong to the
//! same class and only the cheaper one survives.
//!
//! With multithreading enabled the candidates are optimized on scoped
//! worker threads; all workers are joined before `plan` returns, so the
//! caller never observes partial results.

use log::debug;

use ambler_core::footprint::FootprintPolygon;
use ambler_core::math::{angle_diff, normalize_angle};
use ambler_core::obstacle::Obstacle;
use ambler_core::pose::{PoseSE2, Velocity};
use ambler_core::Point2;

use crate::config::{PlannerConfig, SharedConfig};
use crate::feasibility::{sweep_is_collision_free, CollisionModel};
use crate::optimizer::{extract_command, EbandPlanner};
use crate::planner::{LocalPlanner, PlanError, PlannerState};
use crate::request::{HumanPlanIndex, PlanRequest, TimedPose};
use crate::trajectory::Trajectory;
use crate::visualization::VisualizationSink;

/// One explored trajectory candidate
struct Candidate {
    planner: EbandPlanner,
    request: PlanRequest,
    ok: bool,
    selection_cost: f64,
    signature: Vec<f64>,
}

/// Multi-trajectory planner exploring distinct homotopy classes
pub struct HomotopyPlanner {
    config: SharedConfig,
    obstacles: Vec<Obstacle>,
    via_points: Vec<Point2>,
    /// Survivors of the last exploration, best first is not guaranteed
    candidates: Vec<EbandPlanner>,
    best_index: Option<usize>,
    /// Selection memory for the cost hysteresis
    last_best_signature: Option<Vec<f64>>,
    state: PlannerState,
    command_time_offset: f64,
}

impl HomotopyPlanner {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            obstacles: Vec::new(),
            via_points: Vec::new(),
            candidates: Vec::new(),
            best_index: None,
            last_best_signature: None,
            state: PlannerState::Uninitialized,
            command_time_offset: 0.0,
        }
    }

    /// Replace the obstacle set for the coming planning cycles
    pub fn set_obstacles(&mut self, obstacles: Vec<Obstacle>) {
        self.obstacles = obstacles;
    }

    /// Replace the via-points extracted from the reference path
    pub fn set_via_points(&mut self, via_points: Vec<Point2>) {
        self.via_points = via_points;
    }

    /// Number of candidates kept after the last plan call
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    fn best(&self) -> Option<&EbandPlanner> {
        self.best_index.and_then(|i| self.candidates.get(i))
    }

    fn fail(&mut self, error: PlanError) -> PlanError {
        if self.state != PlannerState::Uninitialized {
            self.state = PlannerState::Infeasible;
        }
        error
    }

    /// Waypoint sets spanning distinct corridors between start and goal
    fn explore_waypoints(
        &self,
        start: &PoseSE2,
        goal: &PoseSE2,
        config: &PlannerConfig,
    ) -> Vec<Vec<Point2>> {
        // The direct corridor is always explored
        let mut sets: Vec<Vec<Point2>> = vec![Vec::new()];
        if !config.homotopy.enabled {
            return sets;
        }

        let span = goal.position - start.position;
        let length = span.norm();
        if length < 1e-6 {
            return sets;
        }
        let axis = span / length;
        let normal = Point2::new(-axis.y, axis.x);

        if config.homotopy.simple_exploration {
            // One left and one right keypoint per relevant obstacle
            let offset = config.obstacles.min_obstacle_dist
                + config.homotopy.obstacle_keypoint_offset;
            for obstacle in &self.obstacles {
                let centroid = obstacle.centroid();
                let to_obstacle = centroid - start.position;
                let along = to_obstacle.dot(&axis);
                if along <= 0.0 || along >= length {
                    continue;
                }
                let heading_alignment = to_obstacle.normalize().dot(&axis);
                if heading_alignment < config.homotopy.obstacle_heading_threshold {
                    continue;
                }
                sets.push(vec![centroid + normal * offset]);
                sets.push(vec![centroid - normal * offset]);
            }
        } else {
            // Deterministic stratified lattice over the sampling region
            let samples = config.homotopy.roadmap_graph_samples.max(1);
            let rows = ((samples as f64).sqrt().ceil() as usize).max(1);
            let cols = (samples + rows - 1) / rows;
            let width = config.homotopy.roadmap_graph_area_width;

            let mut produced = 0;
            'grid: for row in 0..rows {
                for col in 0..cols {
                    if produced >= samples {
                        break 'grid;
                    }
                    produced += 1;
                    let along = (col as f64 + 0.5) / cols as f64 * length;
                    let across = ((row as f64 + 0.5) / rows as f64 - 0.5) * width;
                    let point = start.position + axis * along + normal * across;
                    // Keypoints inside the obstacle clearance are useless
                    if self
                        .obstacles
                        .iter()
                        .any(|o| o.min_distance(&point) < config.obstacles.min_obstacle_dist)
                    {
                        continue;
                    }
                    sets.push(vec![point]);
                }
            }
        }
        sets
    }

    /// Reference path threaded through one waypoint set
    fn candidate_request(
        original: &PlanRequest,
        waypoints: &[Point2],
        start: &PoseSE2,
        goal: &PoseSE2,
    ) -> PlanRequest {
        if waypoints.is_empty() {
            return original.clone();
        }
        let mut poses = Vec::with_capacity(waypoints.len() + 2);
        poses.push(TimedPose::new(*start, 0.0));
        let mut previous = start.position;
        for waypoint in waypoints {
            let direction = waypoint - previous;
            let theta = if direction.norm() > 1e-9 {
                normalize_angle(direction.y.atan2(direction.x))
            } else {
                start.theta
            };
            poses.push(TimedPose::new(PoseSE2::from_position(*waypoint, theta), 0.0));
            previous = *waypoint;
        }
        poses.push(TimedPose::new(*goal, 0.0));

        let mut request = PlanRequest::new(poses);
        request.start_velocity = original.start_velocity;
        request.goal_velocity = original.goal_velocity;
        request
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
        let start = request.poses[0].pose;
        let goal = request.poses[request.poses.len() - 1].pose;

        // Build one candidate planner per explored corridor
        let waypoint_sets = self.explore_waypoints(&start, &goal, &config);
        let mut candidates: Vec<Candidate> = waypoint_sets
            .iter()
            .enumerate()
            .map(|(index, waypoints)| {
                let mut planner = EbandPlanner::new(self.config.clone());
                planner.set_obstacles(self.obstacles.clone());
                if index == 0 || config.homotopy.viapoints_all_candidates {
                    planner.set_via_points(self.via_points.clone());
                }
                Candidate {
                    planner,
                    request: Self::candidate_request(request, waypoints, &start, &goal),
                    ok: false,
                    selection_cost: f64::INFINITY,
                    signature: Vec::new(),
                }
            })
            .collect();

        // Optimize all candidates; workers are joined before returning
        let optimize = |mut candidate: Candidate| -> Candidate {
            candidate.ok = candidate
                .planner
                .plan(&candidate.request, humans, free_goal_vel, None)
                .is_ok();
            candidate
        };
        if config.homotopy.multithreading && candidates.len() > 1 {
            candidates = std::thread::scope(|scope| {
                let handles: Vec<_> = candidates
                    .into_iter()
                    .map(|candidate| scope.spawn(|| optimize(candidate)))
                    .collect();
                handles
                    .into_iter()
                    .filter_map(|handle| handle.join().ok())
                    .collect()
            });
        } else {
            candidates = candidates.into_iter().map(optimize).collect();
        }

        // Score and fingerprint the survivors
        let mut scored: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| c.ok)
            .map(|mut c| {
                let breakdown = c
                    .planner
                    .current_cost(&config, config.homotopy.selection_alternative_time_cost);
                c.selection_cost = breakdown.time_optimality
                    + breakdown.kinodynamics
                    + config.homotopy.selection_obstacle_cost_scale * breakdown.obstacle
                    + config.homotopy.selection_viapoint_cost_scale * breakdown.viapoint
                    + breakdown.human_kinodynamics
                    + breakdown.human_safety;
                c.signature = winding_signature(
                    c.planner.trajectory(),
                    &self.obstacles,
                    config.homotopy.signature_prescaler,
                );
                c
            })
            .collect();

        if scored.is_empty() {
            return Err(self.fail(PlanError::NoCandidate));
        }

        // Per class keep the cheapest candidate, bounded by the class cap
        scored.sort_by(|a, b| a.selection_cost.total_cmp(&b.selection_cost));
        let mut kept: Vec<Candidate> = Vec::new();
        for candidate in scored {
            if kept.len() >= config.homotopy.max_number_classes {
                break;
            }
            let duplicate = kept.iter().any(|k| {
                signatures_equal(
                    &k.signature,
                    &candidate.signature,
                    config.homotopy.signature_threshold,
                )
            });
            if !duplicate {
                kept.push(candidate);
            }
        }
        debug!("homotopy exploration kept {} candidate classes", kept.len());

        // Cheapest first after the sort; hysteresis may retain the
        // previously selected class instead
        let mut selected = 0;
        if let Some(previous) = &self.last_best_signature {
            if let Some(incumbent) = kept.iter().position(|c| {
                signatures_equal(&c.signature, previous, config.homotopy.signature_threshold)
            }) {
                let challenger_wins = kept[0].selection_cost
                    < kept[incumbent].selection_cost * config.homotopy.selection_cost_hysteresis;
                if !challenger_wins {
                    selected = incumbent;
                }
            }
        }

        if let Some(costs) = cost_out {
            costs.clear();
            costs.extend(kept.iter().map(|c| c.selection_cost));
        }

        self.last_best_signature = Some(kept[selected].signature.clone());
        self.candidates = kept.into_iter().map(|c| c.planner).collect();
        self.best_index = Some(selected);
        self.command_time_offset = pre_plan_time.max(0.0);
        self.state = PlannerState::Feasible;
        Ok(())
    }
}

/// Winding-angle signature of a trajectory over an obstacle set.
///
/// Per obstacle: the accumulated angle the trajectory sweeps around the
/// obstacle centroid, scaled by the prescaler. Trajectories passing an
/// obstacle on different sides accumulate clearly distinct totals.
fn winding_signature(trajectory: &Trajectory, obstacles: &[Obstacle], prescaler: f64) -> Vec<f64> {
    obstacles
        .iter()
        .map(|obstacle| {
            let centroid = obstacle.centroid();
            let mut total = 0.0;
            for w in trajectory.points().windows(2) {
                let a = w[0].pose.position - centroid;
                let b = w[1].pose.position - centroid;
                if a.norm() < 1e-9 || b.norm() < 1e-9 {
                    continue;
                }
                total += angle_diff(a.y.atan2(a.x), b.y.atan2(b.x));
            }
            total * prescaler
        })
        .collect()
}

/// Signature equality under the configured threshold
fn signatures_equal(a: &[f64], b: &[f64], threshold: f64) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| (x - y).abs() < threshold)
}

impl LocalPlanner for HomotopyPlanner {
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
        let best = self.best()?;
        let config = self.config.lock();
        extract_command(best.trajectory(), self.command_time_offset, &config.robot)
    }

    fn clear(&mut self) {
        self.candidates.clear();
        self.best_index = None;
        self.last_best_signature = None;
        self.state = PlannerState::Uninitialized;
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
        let Some(best) = self.best() else {
            return false;
        };
        sweep_is_collision_free(
            best.trajectory(),
            model,
            footprint,
            inscribed_radius,
            circumscribed_radius,
            look_ahead,
        )
    }

    fn is_horizon_reduction_appropriate(&self, reference: &[TimedPose]) -> bool {
        self.best()
            .map_or(false, |best| best.is_horizon_reduction_appropriate(reference))
    }

    fn compute_current_cost(
        &mut self,
        cost_out: &mut Vec<f64>,
        obstacle_cost_scale: f64,
        alternative_time_cost: bool,
    ) {
        let config = self.config.snapshot();
        cost_out.clear();
        cost_out.extend(self.candidates.iter().map(|candidate| {
            candidate
                .current_cost(&config, alternative_time_cost)
                .total(obstacle_cost_scale)
        }));
    }

    fn full_trajectory(&self, out: &mut Trajectory) {
        if let Some(best) = self.best() {
            *out = best.trajectory().clone();
        }
    }

    fn full_human_trajectory(&self, human_id: u64) -> Trajectory {
        self.best()
            .map(|best| best.full_human_trajectory(human_id))
            .unwrap_or_default()
    }

    fn visualize(&self, sink: &mut dyn VisualizationSink) {
        let config = self.config.snapshot();
        if let Some(best) = self.best() {
            if config.visualization.publish_robot_local_plan {
                sink.publish_robot_trajectory(best.trajectory());
            }
            if config.visualization.publish_human_local_plans {
                for (id, trajectory) in best.human_trajectories() {
                    sink.publish_human_trajectory(*id, trajectory);
                }
            }
        }
        if config.homotopy.visualize_graph {
            let trajectories: Vec<Trajectory> = self
                .candidates
                .iter()
                .map(|c| c.trajectory().clone())
                .collect();
            sink.publish_candidates(&trajectories);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;

    fn shared(mutator: impl FnOnce(&mut PlannerConfig)) -> SharedConfig {
        let mut config = PlannerConfig::default();
        mutator(&mut config);
        SharedConfig::new(config)
    }

    fn straight_request() -> PlanRequest {
        PlanRequest::from_poses((0..5).map(|i| PoseSE2::new(i as f64, 0.0, 0.0)))
            .with_start_velocity(Velocity::zero())
    }

    #[test]
    fn test_plans_without_obstacles() {
        let mut planner = HomotopyPlanner::new(shared(|_| {}));
        planner.plan(&straight_request(), None, false, None).unwrap();
        assert_eq!(planner.state(), PlannerState::Feasible);
        assert!(planner.velocity_command().is_some());
        assert!(planner.candidate_count() >= 1);
    }

    #[test]
    fn test_explores_multiple_classes_around_obstacle() {
        let mut planner = HomotopyPlanner::new(shared(|c| {
            c.homotopy.simple_exploration = true;
        }));
        planner.set_obstacles(vec![Obstacle::point(2.0, 0.0)]);
        planner.plan(&straight_request(), None, false, None).unwrap();
        // Left and right corridors are topologically distinct
        assert!(
            planner.candidate_count() >= 2,
            "expected at least two classes, got {}",
            planner.candidate_count()
        );
    }

    #[test]
    fn test_candidate_cap_respected() {
        let mut planner = HomotopyPlanner::new(shared(|c| {
            c.homotopy.max_number_classes = 2;
        }));
        planner.set_obstacles(vec![
            Obstacle::point(1.5, 0.4),
            Obstacle::point(2.5, -0.4),
        ]);
        planner.plan(&straight_request(), None, false, None).unwrap();
        assert!(planner.candidate_count() <= 2);
    }

    #[test]
    fn test_single_thread_matches_parallel_candidate_count() {
        let obstacles = vec![Obstacle::point(2.0, 0.2)];

        let mut parallel = HomotopyPlanner::new(shared(|c| {
            c.homotopy.multithreading = true;
            c.homotopy.simple_exploration = true;
        }));
        parallel.set_obstacles(obstacles.clone());
        parallel.plan(&straight_request(), None, false, None).unwrap();

        let mut serial = HomotopyPlanner::new(shared(|c| {
            c.homotopy.multithreading = false;
            c.homotopy.simple_exploration = true;
        }));
        serial.set_obstacles(obstacles);
        serial.plan(&straight_request(), None, false, None).unwrap();

        assert_eq!(parallel.candidate_count(), serial.candidate_count());
    }

    #[test]
    fn test_cost_vector_one_entry_per_candidate() {
        let mut planner = HomotopyPlanner::new(shared(|c| {
            c.homotopy.simple_exploration = true;
        }));
        planner.set_obstacles(vec![Obstacle::point(2.0, 0.0)]);

        let mut costs = Vec::new();
        planner
            .plan(&straight_request(), None, false, Some(&mut costs))
            .unwrap();
        assert_eq!(costs.len(), planner.candidate_count());
        assert!(costs.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_winding_signature_separates_sides() {
        let obstacles = vec![Obstacle::point(2.0, 0.0)];
        let left = Trajectory::from_points(
            [
                PoseSE2::new(0.0, 0.0, 0.0),
                PoseSE2::new(2.0, 1.0, 0.0),
                PoseSE2::new(4.0, 0.0, 0.0),
            ]
            .iter()
            .enumerate()
            .map(|(i, p)| crate::trajectory::TrajectoryPoint::new(*p, Velocity::zero(), i as f64))
            .collect(),
        );
        let right = Trajectory::from_points(
            [
                PoseSE2::new(0.0, 0.0, 0.0),
                PoseSE2::new(2.0, -1.0, 0.0),
                PoseSE2::new(4.0, 0.0, 0.0),
            ]
            .iter()
            .enumerate()
            .map(|(i, p)| crate::trajectory::TrajectoryPoint::new(*p, Velocity::zero(), i as f64))
            .collect(),
        );

        let sig_left = winding_signature(&left, &obstacles, 1.0);
        let sig_right = winding_signature(&right, &obstacles, 1.0);
        assert!(!signatures_equal(&sig_left, &sig_right, 0.1));
        // Same side twice is the same class
        assert!(signatures_equal(&sig_left, &sig_left.clone(), 0.1));
    }

    #[test]
    fn test_clear_resets_candidates() {
        let mut planner = HomotopyPlanner::new(shared(|_| {}));
        planner.plan(&straight_request(), None, false, None).unwrap();
        planner.clear();
        assert_eq!(planner.state(), PlannerState::Uninitialized);
        assert_eq!(planner.candidate_count(), 0);
        assert!(planner.velocity_command().is_none());
    }

    #[test]
    fn test_failed_plan_reports_no_candidate_state() {
        let mut planner = HomotopyPlanner::new(shared(|_| {}));
        planner.plan(&straight_request(), None, false, None).unwrap();
        assert!(planner
            .plan(&PlanRequest::default(), None, false, None)
            .is_err());
        assert_eq!(planner.state(), PlannerState::Infeasible);
        assert!(planner.velocity_command().is_none());
    }
}
