//! Trajectory cost terms
//!
//! The weighted terms the optimizer minimizes, recomputable on demand
//! for any fixed trajectory: time optimality, kinodynamic violations,
//! obstacle clearance, via-point attraction and the human-aware safety
//! family (separation, time-to-collision variants, directional and
//! visibility penalties). The configuration aggregate is the single
//! source of truth for every weight, threshold and enable flag.

use std::collections::BTreeMap;

use ambler_core::obstacle::Obstacle;
use ambler_core::pose::PoseSE2;
use ambler_core::Point2;

use crate::config::PlannerConfig;
use crate::trajectory::Trajectory;

/// Soft penalty for dropping below a lower bound (with safety margin)
pub fn penalty_below(value: f64, bound: f64, epsilon: f64) -> f64 {
    (bound + epsilon - value).max(0.0)
}

/// Soft penalty for exceeding an upper bound (with safety margin)
pub fn penalty_above(value: f64, bound: f64, epsilon: f64) -> f64 {
    (value - bound + epsilon).max(0.0)
}

/// Per-term cost values for one trajectory candidate.
///
/// The obstacle term is kept separate so selection and diagnostics can
/// rescale it without touching the others.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostBreakdown {
    /// Transition-time contraction cost
    pub time_optimality: f64,
    /// Robot velocity/acceleration/kinematics violations
    pub kinodynamics: f64,
    /// Obstacle clearance cost (weighted, unscaled)
    pub obstacle: f64,
    /// Via-point attraction cost
    pub viapoint: f64,
    /// Human velocity/acceleration violations and elastic deviation
    pub human_kinodynamics: f64,
    /// Human-robot and human-human safety family
    pub human_safety: f64,
}

impl CostBreakdown {
    /// Weighted total with an extra scale applied to the obstacle term only
    pub fn total(&self, obstacle_scale: f64) -> f64 {
        self.time_optimality
            + self.kinodynamics
            + obstacle_scale * self.obstacle
            + self.viapoint
            + self.human_kinodynamics
            + self.human_safety
    }
}

/// Evaluates the full cost stack for fixed trajectories
pub struct CostEvaluator<'a> {
    config: &'a PlannerConfig,
    obstacles: &'a [Obstacle],
    via_points: &'a [Point2],
}

impl<'a> CostEvaluator<'a> {
    pub fn new(
        config: &'a PlannerConfig,
        obstacles: &'a [Obstacle],
        via_points: &'a [Point2],
    ) -> Self {
        Self {
            config,
            obstacles,
            via_points,
        }
    }

    /// Evaluate all terms for a robot trajectory and the human
    /// trajectories of the same cycle.
    pub fn evaluate(
        &self,
        trajectory: &Trajectory,
        humans: &BTreeMap<u64, Trajectory>,
        alternative_time_cost: bool,
    ) -> CostBreakdown {
        CostBreakdown {
            time_optimality: self.time_cost(trajectory, alternative_time_cost),
            kinodynamics: self.kinodynamic_cost(trajectory),
            obstacle: self.obstacle_cost(trajectory),
            viapoint: self.viapoint_cost(trajectory),
            human_kinodynamics: self.human_kinodynamic_cost(humans),
            human_safety: self.human_safety_cost(trajectory, humans),
        }
    }

    fn time_cost(&self, trajectory: &Trajectory, alternative: bool) -> f64 {
        let optim = &self.config.optimization;
        if alternative {
            // Literal weighted transition time
            return optim.weight_optimaltime * trajectory.duration();
        }
        let mut cost = 0.0;
        for w in trajectory.points().windows(2) {
            let dt = w[1].time_from_start - w[0].time_from_start;
            let mut penalty = (dt - optim.time_penalty_epsilon).max(0.0).powi(2);
            if optim.cap_optimaltime_penalty {
                penalty = penalty.min(10.0);
            }
            cost += penalty;
        }
        optim.weight_optimaltime * cost
    }

    fn kinodynamic_cost(&self, trajectory: &Trajectory) -> f64 {
        let robot = &self.config.robot;
        let optim = &self.config.optimization;
        let eps = optim.penalty_epsilon;
        let points = trajectory.points();
        let mut cost = 0.0;

        for w in points.windows(2) {
            let velocity = w[1].velocity;

            // Velocity bounds, forward and backward limits separately
            if velocity.linear >= 0.0 {
                cost += optim.weight_max_vel_x
                    * penalty_above(velocity.linear, robot.max_vel_x, eps);
            } else {
                cost += optim.weight_max_vel_x
                    * penalty_above(-velocity.linear, robot.max_vel_x_backwards, eps);
                cost += optim.weight_kinematics_forward_drive * (-velocity.linear);
            }
            cost += optim.weight_max_vel_theta
                * penalty_above(velocity.angular.abs(), robot.max_vel_theta, eps);

            // Non-holonomic consistency: motion must follow the heading
            let delta = w[1].pose.position - w[0].pose.position;
            if delta.norm() > 1e-6 {
                let motion_angle = delta.y.atan2(delta.x);
                let mid_heading =
                    ambler_core::math::average_angle(w[0].pose.theta, w[1].pose.theta);
                let deviation = ambler_core::math::angle_diff(mid_heading, motion_angle);
                // Both driving directions are kinematically consistent
                let deviation = deviation
                    .abs()
                    .min((deviation.abs() - std::f64::consts::PI).abs());
                cost += optim.weight_kinematics_nh * deviation.powi(2);
            }

            // Minimum turning radius for carlike robots
            if robot.min_turning_radius > 0.0 && velocity.angular.abs() > 1e-6 {
                let radius = (velocity.linear / velocity.angular).abs();
                cost += optim.weight_kinematics_turning_radius
                    * penalty_below(radius, robot.min_turning_radius, 0.0);
            }
        }

        // Accelerations and angular-velocity reversals over consecutive transitions
        for w in points.windows(3) {
            let dt = (w[2].time_from_start - w[0].time_from_start).max(1e-6) * 0.5;
            let lin_acc = (w[2].velocity.linear - w[1].velocity.linear) / dt;
            let ang_acc = (w[2].velocity.angular - w[1].velocity.angular) / dt;
            cost += optim.weight_acc_lim_x * penalty_above(lin_acc.abs(), robot.acc_lim_x, eps);
            cost +=
                optim.weight_acc_lim_theta * penalty_above(ang_acc.abs(), robot.acc_lim_theta, eps);

            if optim.disable_rapid_omega_change {
                let reversal = w[1].velocity.angular * w[2].velocity.angular < 0.0;
                let separation = w[2].time_from_start - w[1].time_from_start;
                if reversal && separation < optim.omega_change_time_separation {
                    cost += optim.weight_acc_lim_theta
                        * (w[2].velocity.angular - w[1].velocity.angular).abs();
                }
            }
        }

        cost
    }

    fn obstacle_cost(&self, trajectory: &Trajectory) -> f64 {
        let obst_cfg = &self.config.obstacles;
        let optim = &self.config.optimization;
        let points = trajectory.points();
        if points.is_empty() || self.obstacles.is_empty() {
            return 0.0;
        }

        let mut cost = 0.0;
        for obstacle in self.obstacles {
            // Attach the obstacle to its closest pose and spread the
            // penalty over a bounded neighbourhood
            let nearest = points
                .iter()
                .enumerate()
                .min_by(|a, b| {
                    obstacle
                        .min_distance(&a.1.pose.position)
                        .total_cmp(&obstacle.min_distance(&b.1.pose.position))
                })
                .map(|(i, _)| i)
                .unwrap_or(0);

            let half_window = obst_cfg.poses_affected.max(1) / 2;
            let lo = nearest.saturating_sub(half_window);
            let hi = (nearest + half_window + 1).min(points.len());

            for point in &points[lo..hi] {
                let dist = obstacle.min_distance(&point.pose.position);
                let violation =
                    penalty_below(dist, obst_cfg.min_obstacle_dist, optim.penalty_epsilon);
                if violation <= 0.0 {
                    continue;
                }
                cost += if obst_cfg.use_nonlinear_penalty {
                    violation.powi(2) / dist.max(1e-3)
                } else {
                    violation
                };
            }
        }
        optim.weight_obstacle * obst_cfg.cost_multiplier * cost
    }

    fn viapoint_cost(&self, trajectory: &Trajectory) -> f64 {
        if self.via_points.is_empty() || trajectory.is_empty() {
            return 0.0;
        }
        let mut cost = 0.0;
        for via in self.via_points {
            let nearest = trajectory
                .points()
                .iter()
                .map(|p| (p.pose.position - via).norm())
                .fold(f64::INFINITY, f64::min);
            cost += nearest.powi(2);
        }
        self.config.optimization.weight_viapoint * cost
    }

    fn human_kinodynamic_cost(&self, humans: &BTreeMap<u64, Trajectory>) -> f64 {
        let human_cfg = &self.config.human;
        let optim = &self.config.optimization;
        let eps = optim.penalty_epsilon;
        let mut cost = 0.0;

        for trajectory in humans.values() {
            cost += optim.weight_human_optimaltime * trajectory.duration();

            for w in trajectory.points().windows(2) {
                let velocity = w[1].velocity;
                cost += optim.weight_max_human_vel_x
                    * penalty_above(velocity.linear.abs(), human_cfg.max_vel_x, eps);
                cost += optim.weight_max_human_vel_theta
                    * penalty_above(velocity.angular.abs(), human_cfg.max_vel_theta, eps);
                if optim.use_human_elastic_vel {
                    cost += optim.weight_nominal_human_vel_x
                        * (velocity.linear - human_cfg.nominal_vel_x).powi(2);
                }
            }
            for w in trajectory.points().windows(3) {
                let dt = (w[2].time_from_start - w[0].time_from_start).max(1e-6) * 0.5;
                let lin_acc = (w[2].velocity.linear - w[1].velocity.linear) / dt;
                let ang_acc = (w[2].velocity.angular - w[1].velocity.angular) / dt;
                cost += optim.weight_human_acc_lim_x
                    * penalty_above(lin_acc.abs(), human_cfg.acc_lim_x, eps);
                cost += optim.weight_human_acc_lim_theta
                    * penalty_above(ang_acc.abs(), human_cfg.acc_lim_theta, eps);
            }
        }
        cost
    }

    fn human_safety_cost(&self, trajectory: &Trajectory, humans: &BTreeMap<u64, Trajectory>) -> f64 {
        if humans.is_empty() || trajectory.is_empty() {
            return 0.0;
        }
        let optim = &self.config.optimization;
        let mut cost = 0.0;

        for point in trajectory.points() {
            let t = point.time_from_start;
            for human in humans.values() {
                let Some(human_pose) = human.sample_pose(t) else {
                    continue;
                };
                cost += self.robot_human_pair_cost(point.pose, point_velocity(point), &human_pose, human, t);
            }
        }

        // Human-human separation at matching times
        if optim.use_human_human_safety && humans.len() > 1 {
            let trajectories: Vec<&Trajectory> = humans.values().collect();
            for (i, a) in trajectories.iter().enumerate() {
                for b in &trajectories[i + 1..] {
                    for point in a.points() {
                        let Some(other) = b.sample_pose(point.time_from_start) else {
                            continue;
                        };
                        let dist = (point.pose.position - other.position).norm();
                        cost += optim.weight_human_human_safety
                            * penalty_below(dist, self.config.human.min_human_human_dist, 0.0);
                    }
                }
            }
        }
        cost
    }

    /// All pairwise robot/human terms at one matched time instant
    fn robot_human_pair_cost(
        &self,
        robot_pose: PoseSE2,
        robot_velocity: Point2,
        human_pose: &PoseSE2,
        human: &Trajectory,
        t: f64,
    ) -> f64 {
        let human_cfg = &self.config.human;
        let optim = &self.config.optimization;
        let mut cost = 0.0;

        let rel_pos = human_pose.position - robot_pose.position;
        let dist = rel_pos.norm();

        if optim.use_human_robot_safety {
            cost += optim.weight_human_robot_safety
                * penalty_below(dist, human_cfg.min_human_robot_dist, 0.0);
        }

        // Relative velocity from the sampled human trajectory
        let human_velocity = sample_velocity_vector(human, t);
        let rel_vel = human_velocity - robot_velocity;
        let collision_radius = human_cfg.radius.max(1e-3);

        if optim.use_human_robot_ttc {
            if let Some(ttc) = time_to_collision(&rel_pos, &rel_vel, collision_radius) {
                if ttc < human_cfg.ttc_threshold {
                    let urgency = 1.0 - ttc / human_cfg.ttc_threshold;
                    let scaled = if optim.scale_human_robot_ttc {
                        (optim.human_robot_ttc_scale_alpha * urgency).exp_m1()
                    } else {
                        urgency
                    };
                    cost += optim.weight_human_robot_ttc * scaled;
                }
            }
        }

        if optim.use_human_robot_ttcplus {
            if let Some(ttc) = time_to_collision(&rel_pos, &rel_vel, collision_radius) {
                if ttc < human_cfg.ttcplus_threshold && ttc < human_cfg.ttcplus_timer {
                    let urgency = 1.0 - ttc / human_cfg.ttcplus_threshold;
                    let scaled = if optim.scale_human_robot_ttcplus {
                        (optim.human_robot_ttcplus_scale_alpha * urgency).exp_m1()
                    } else {
                        urgency
                    };
                    cost += optim.weight_human_robot_ttcplus * scaled;
                }
            }
        }

        if optim.use_human_robot_ttclosest {
            let closest = closest_approach_distance(&rel_pos, &rel_vel);
            if closest < human_cfg.ttclosest_threshold {
                cost += optim.weight_human_robot_ttclosest
                    * (1.0 - closest / human_cfg.ttclosest_threshold.max(1e-6));
            }
        }

        if optim.use_human_robot_dir && dist > 1e-6 {
            let speed = robot_velocity.norm();
            if speed > 1e-6 {
                let approach_cos = robot_velocity.dot(&rel_pos) / (speed * dist);
                if approach_cos > human_cfg.dir_cost_threshold {
                    cost += optim.weight_human_robot_dir
                        * (approach_cos - human_cfg.dir_cost_threshold)
                        / (1.0 + dist);
                }
            }
        }

        if optim.use_human_robot_visibility && dist > 1e-6 {
            // Angle between the human's heading and the direction to the robot
            let to_robot = -rel_pos / dist;
            let bearing = to_robot.y.atan2(to_robot.x);
            let off_axis = ambler_core::math::angle_diff(human_pose.theta, bearing).abs();
            let outside = off_axis - 0.5 * human_cfg.fov;
            if outside > human_cfg.visibility_cost_threshold {
                cost += optim.weight_human_robot_visibility * outside / (1.0 + dist);
            }
        }

        cost
    }
}

/// Velocity of a trajectory point as a world-frame vector
fn point_velocity(point: &crate::trajectory::TrajectoryPoint) -> Point2 {
    point.pose.orientation_unit() * point.velocity.linear
}

/// Velocity vector of the trajectory sample nearest to `t`
fn sample_velocity_vector(trajectory: &Trajectory, t: f64) -> Point2 {
    let nearest = trajectory
        .points()
        .iter()
        .min_by(|a, b| {
            (a.time_from_start - t)
                .abs()
                .total_cmp(&(b.time_from_start - t).abs())
        });
    match nearest {
        Some(point) => point.pose.orientation_unit() * point.velocity.linear,
        None => Point2::new(0.0, 0.0),
    }
}

/// Time until the relative position shrinks to the collision radius,
/// assuming constant relative velocity. `None` when no collision lies
/// ahead; zero when the pair is already within the radius.
pub fn time_to_collision(rel_pos: &Point2, rel_vel: &Point2, radius: f64) -> Option<f64> {
    let c = rel_pos.norm_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let a = rel_vel.norm_squared();
    if a < 1e-12 {
        return None;
    }
    let b = 2.0 * rel_pos.dot(rel_vel);
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    (t >= 0.0).then_some(t)
}

/// Distance at the closest future approach under constant relative velocity
pub fn closest_approach_distance(rel_pos: &Point2, rel_vel: &Point2) -> f64 {
    let speed_sq = rel_vel.norm_squared();
    if speed_sq < 1e-12 {
        return rel_pos.norm();
    }
    let t_star = (-rel_pos.dot(rel_vel) / speed_sq).max(0.0);
    (rel_pos + rel_vel * t_star).norm()
}
