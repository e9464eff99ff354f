//! Planner configuration
//!
//! A single aggregate of all tunables, grouped by concern: trajectory
//! shaping, robot and human kinodynamics, goal tolerance, obstacle
//! handling, optimization weights, homotopy-class exploration,
//! visualization toggles and the approach sub-mode.
//!
//! The aggregate ships with literal defaults, validates itself without
//! mutating anything, accepts flat key/value reconfiguration from an
//! external source, and is shared between the planning thread and the
//! reconfiguration source behind a single exclusive lock ([`SharedConfig`]).

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which agents the optimizer reasons about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningMode {
    /// Plan for the robot only; human plans are ignored
    RobotOnly,
    /// Incorporate human plans into the safety cost terms
    HumanAware,
}

/// Trajectory shaping parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Enable automatic resizing of the trajectory w.r.t. the temporal resolution
    pub autosize: bool,
    /// Desired temporal resolution of the trajectory [s]
    pub dt_ref: f64,
    /// Hysteresis for automatic resizing, usually 10% of dt_ref [s]
    pub dt_hysteresis: f64,
    /// Minimum number of samples (should always be greater than 2)
    pub min_samples: usize,
    /// Minimum number of samples for human trajectories
    pub human_min_samples: usize,
    /// Overwrite orientations of reference poses with the path direction
    pub overwrite_global_orientation: bool,
    /// Minimum separation between consecutive via-points extracted from the
    /// reference path (negative: via-points disabled)
    pub viapoint_separation: f64,
    /// Adhere to the storage order of via-points
    pub viapoints_ordered: bool,
    /// Maximum cumulative length of the reference path subset taken into
    /// account for optimization [m] (<= 0: disabled)
    pub max_lookahead_dist: f64,
    /// Reinitialize the trajectory when a new goal is further than this from
    /// the previous one [m] (skips hot-starting)
    pub force_reinit_new_goal_dist: f64,
    /// Number of leading trajectory poses checked for feasibility each cycle
    pub feasibility_check_poses: usize,
    /// Push planner feedback to the visualization sink
    pub publish_feedback: bool,
    /// Allow the planner to temporarily shrink the horizon when issues are detected
    pub shrink_horizon: bool,
    /// Fraction of the horizon removed when shrinking
    pub horizon_reduction_fraction: f64,
    /// Skip reference poses closer than this during trajectory initialization [m]
    pub init_skip_dist: f64,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            autosize: true,
            dt_ref: 0.3,
            dt_hysteresis: 0.1,
            min_samples: 3,
            human_min_samples: 3,
            overwrite_global_orientation: true,
            viapoint_separation: -1.0,
            viapoints_ordered: false,
            max_lookahead_dist: 1.0,
            force_reinit_new_goal_dist: 1.0,
            feasibility_check_poses: 5,
            publish_feedback: false,
            shrink_horizon: true,
            horizon_reduction_fraction: 0.5,
            init_skip_dist: 0.4,
        }
    }
}

/// Robot kinodynamic limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Maximum translational velocity [m/s]
    pub max_vel_x: f64,
    /// Minimum translational velocity [m/s]
    pub min_vel_x: f64,
    /// Maximum translational velocity driving backwards [m/s]
    pub max_vel_x_backwards: f64,
    /// Minimum translational velocity driving backwards [m/s]
    pub min_vel_x_backwards: f64,
    /// Maximum angular velocity [rad/s]
    pub max_vel_theta: f64,
    /// Minimum angular velocity [rad/s]
    pub min_vel_theta: f64,
    /// Maximum translational acceleration [m/s^2]
    pub acc_lim_x: f64,
    /// Maximum angular acceleration [rad/s^2]
    pub acc_lim_theta: f64,
    /// Minimum turning radius of a carlike robot (diff-drive: zero) [m]
    pub min_turning_radius: f64,
    /// Distance between drive shaft and steering axle [m]; may be negative
    /// for back-wheeled robots
    pub wheelbase: f64,
    /// Substitute the rotational velocity in the command by the
    /// corresponding steering angle
    pub cmd_angle_instead_rotvel: bool,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            max_vel_x: 0.4,
            min_vel_x: 0.0,
            max_vel_x_backwards: 0.2,
            min_vel_x_backwards: 0.0,
            max_vel_theta: 0.3,
            min_vel_theta: 0.0,
            acc_lim_x: 0.5,
            acc_lim_theta: 0.5,
            min_turning_radius: 0.0,
            wheelbase: 1.0,
            cmd_angle_instead_rotvel: false,
        }
    }
}

/// Human kinodynamics and safety thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanConfig {
    /// Radius of the disc modelling a human [m]
    pub radius: f64,
    /// Minimum separation between a human and the robot [m]
    pub min_human_robot_dist: f64,
    /// Minimum separation between two humans [m]
    pub min_human_human_dist: f64,
    /// Maximum human translational velocity [m/s]
    pub max_vel_x: f64,
    /// Minimum human translational velocity [m/s]
    pub min_vel_x: f64,
    /// Nominal (comfortable) human walking velocity [m/s]
    pub nominal_vel_x: f64,
    /// Maximum human velocity walking backwards [m/s]
    pub max_vel_x_backwards: f64,
    /// Minimum human velocity walking backwards [m/s]
    pub min_vel_x_backwards: f64,
    /// Maximum human angular velocity [rad/s]
    pub max_vel_theta: f64,
    /// Minimum human angular velocity [rad/s]
    pub min_vel_theta: f64,
    /// Maximum human translational acceleration [m/s^2]
    pub acc_lim_x: f64,
    /// Maximum human angular acceleration [rad/s^2]
    pub acc_lim_theta: f64,
    /// Trust externally supplied human predictions instead of extrapolating
    pub use_external_prediction: bool,
    /// Predict humans that are currently behind the robot
    pub predict_behind_robot: bool,
    /// Time-to-collision below which the TTC cost activates [s]
    pub ttc_threshold: f64,
    /// Threshold for the windowed TTC variant [s]
    pub ttcplus_threshold: f64,
    /// Closest-approach distance below which the closest-approach cost activates [m]
    pub ttclosest_threshold: f64,
    /// Prediction window for the windowed TTC variant [s]
    pub ttcplus_timer: f64,
    /// Cosine threshold above which the directional cost activates
    pub dir_cost_threshold: f64,
    /// Weighting threshold for the visibility cost
    pub visibility_cost_threshold: f64,
    /// Reset externally predicted human poses after this long without updates [s]
    pub pose_prediction_reset_time: f64,
    /// Human field of view [rad]
    pub fov: f64,
}

impl Default for HumanConfig {
    fn default() -> Self {
        Self {
            radius: 0.2,
            min_human_robot_dist: 0.6,
            min_human_human_dist: 0.6,
            max_vel_x: 1.1,
            min_vel_x: 0.0,
            nominal_vel_x: 0.8,
            max_vel_x_backwards: 0.0,
            min_vel_x_backwards: 0.0,
            max_vel_theta: 1.1,
            min_vel_theta: 0.0,
            acc_lim_x: 0.6,
            acc_lim_theta: 0.8,
            use_external_prediction: false,
            predict_behind_robot: false,
            ttc_threshold: 5.0,
            ttcplus_threshold: 5.0,
            ttclosest_threshold: 0.5,
            ttcplus_timer: 5.0,
            dir_cost_threshold: 0.7,
            visibility_cost_threshold: 0.5,
            pose_prediction_reset_time: 2.0,
            fov: 2.0944, // ~120 degrees
        }
    }
}

/// Goal tolerance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalToleranceConfig {
    /// Allowed final Euclidean distance to the goal position [m]
    pub xy_goal_tolerance: f64,
    /// Allowed final orientation error [rad]
    pub yaw_goal_tolerance: f64,
    /// Allow nonzero velocity at the goal pose for planning purposes
    pub free_goal_vel: bool,
}

impl Default for GoalToleranceConfig {
    fn default() -> Self {
        Self {
            xy_goal_tolerance: 0.2,
            yaw_goal_tolerance: 0.2,
            free_goal_vel: false,
        }
    }
}

/// Obstacle handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleConfig {
    /// Minimum desired separation from obstacles [m]
    pub min_obstacle_dist: f64,
    /// Penalize obstacle proximity nonlinearly instead of linearly
    pub use_nonlinear_penalty: bool,
    /// Extra multiplier applied to the obstacle cost term
    pub cost_multiplier: f64,
    /// Take obstacles converted from the local costmap into account
    pub include_costmap_obstacles: bool,
    /// Ignore costmap obstacles further than this behind the robot [m]
    pub behind_robot_dist: f64,
    /// Number of neighbouring trajectory poses an obstacle is attached to
    pub poses_affected: usize,
    /// Rate at which the costmap-to-polygon conversion runs [Hz]
    pub costmap_converter_rate: usize,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            min_obstacle_dist: 0.5,
            use_nonlinear_penalty: true,
            cost_multiplier: 1.0,
            include_costmap_obstacles: true,
            behind_robot_dist: 0.5,
            poses_affected: 25,
            costmap_converter_rate: 5,
        }
    }
}

/// Optimization iteration counts, penalties and per-term weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// Solver iterations per outer iteration
    pub inner_iterations: usize,
    /// Outer iterations; each one resizes the trajectory and re-runs the solver
    pub outer_iterations: usize,
    /// Activate the optimization (otherwise trajectories are only initialized)
    pub activate: bool,
    /// Emit per-iteration diagnostics
    pub verbose: bool,
    /// Safety margin added to hard-constraint approximations
    pub penalty_epsilon: f64,
    /// Safety margin for the time penalty
    pub time_penalty_epsilon: f64,
    /// Cap the time-optimality penalty instead of letting it grow unbounded
    pub cap_optimaltime_penalty: bool,

    pub weight_max_vel_x: f64,
    pub weight_max_human_vel_x: f64,
    pub weight_nominal_human_vel_x: f64,
    pub weight_max_vel_theta: f64,
    pub weight_max_human_vel_theta: f64,
    pub weight_acc_lim_x: f64,
    pub weight_human_acc_lim_x: f64,
    pub weight_acc_lim_theta: f64,
    pub weight_human_acc_lim_theta: f64,
    /// Satisfy the non-holonomic kinematics
    pub weight_kinematics_nh: f64,
    /// Prefer forward driving directions (diff-drive robots)
    pub weight_kinematics_forward_drive: f64,
    /// Enforce a minimum turning radius (carlike robots)
    pub weight_kinematics_turning_radius: f64,
    /// Contract the trajectory w.r.t. transition time
    pub weight_optimaltime: f64,
    pub weight_human_optimaltime: f64,
    /// Keep a minimum separation from obstacles
    pub weight_obstacle: f64,
    pub weight_dynamic_obstacle: f64,
    /// Minimize the distance to via-points
    pub weight_viapoint: f64,
    pub weight_human_viapoint: f64,
    pub weight_human_robot_safety: f64,
    pub weight_human_human_safety: f64,
    pub weight_human_robot_ttc: f64,
    pub weight_human_robot_ttcplus: f64,
    pub weight_human_robot_ttclosest: f64,
    pub weight_human_robot_dir: f64,
    pub weight_human_robot_visibility: f64,
    /// Scale exponent for the TTC cost when scaling is enabled
    pub human_robot_ttc_scale_alpha: f64,
    /// Scale exponent for the windowed TTC cost when scaling is enabled
    pub human_robot_ttcplus_scale_alpha: f64,

    pub use_human_robot_safety: bool,
    pub use_human_human_safety: bool,
    pub use_human_robot_ttc: bool,
    pub use_human_robot_ttcplus: bool,
    pub use_human_robot_ttclosest: bool,
    pub scale_human_robot_ttc: bool,
    pub scale_human_robot_ttcplus: bool,
    pub use_human_robot_dir: bool,
    pub use_human_robot_visibility: bool,
    /// Let humans deviate elastically from their nominal velocity
    pub use_human_elastic_vel: bool,
    /// Discard the previous solution instead of warm-starting
    pub disable_warm_start: bool,
    /// Penalize rapid angular-velocity reversals
    pub disable_rapid_omega_change: bool,
    /// Minimum time separation between angular-velocity reversals [s]
    pub omega_change_time_separation: f64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            inner_iterations: 8,
            outer_iterations: 4,
            activate: true,
            verbose: false,
            penalty_epsilon: 0.1,
            time_penalty_epsilon: 0.1,
            cap_optimaltime_penalty: true,
            weight_max_vel_x: 1.0,
            weight_max_human_vel_x: 2.0,
            weight_nominal_human_vel_x: 2.0,
            weight_max_vel_theta: 1.0,
            weight_max_human_vel_theta: 2.0,
            weight_acc_lim_x: 1.0,
            weight_human_acc_lim_x: 1.0,
            weight_acc_lim_theta: 1.0,
            weight_human_acc_lim_theta: 1.0,
            weight_kinematics_nh: 1000.0,
            weight_kinematics_forward_drive: 1.0,
            weight_kinematics_turning_radius: 1.0,
            weight_optimaltime: 1.0,
            weight_human_optimaltime: 1.0,
            weight_obstacle: 10.0,
            weight_dynamic_obstacle: 10.0,
            weight_viapoint: 1.0,
            weight_human_viapoint: 1.0,
            weight_human_robot_safety: 20.0,
            weight_human_human_safety: 20.0,
            weight_human_robot_ttc: 20.0,
            weight_human_robot_ttcplus: 20.0,
            weight_human_robot_ttclosest: 10.0,
            weight_human_robot_dir: 20.0,
            weight_human_robot_visibility: 20.0,
            human_robot_ttc_scale_alpha: 1.0,
            human_robot_ttcplus_scale_alpha: 1.0,
            use_human_robot_safety: false,
            use_human_human_safety: true,
            use_human_robot_ttc: true,
            use_human_robot_ttcplus: false,
            use_human_robot_ttclosest: true,
            scale_human_robot_ttc: true,
            scale_human_robot_ttcplus: true,
            use_human_robot_dir: true,
            use_human_robot_visibility: false,
            use_human_elastic_vel: true,
            disable_warm_start: false,
            disable_rapid_omega_change: true,
            omega_change_time_separation: 1.0,
        }
    }
}

/// Homotopy-class exploration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomotopyConfig {
    /// Explore multiple topologically distinct trajectories at once
    pub enabled: bool,
    /// Optimize alternative candidates on worker threads
    pub multithreading: bool,
    /// Explore with per-obstacle left/right keypoints instead of roadmap sampling
    pub simple_exploration: bool,
    /// Maximum number of alternative classes kept alive
    pub max_number_classes: usize,
    /// A new candidate is selected only if new_cost < old_cost * this factor
    pub selection_cost_hysteresis: f64,
    /// Extra obstacle cost scaling used only while selecting the best candidate
    pub selection_obstacle_cost_scale: f64,
    /// Extra via-point cost scaling used only while selecting the best candidate
    pub selection_viapoint_cost_scale: f64,
    /// Replace the time cost by the total transition time during selection
    pub selection_alternative_time_cost: bool,
    /// Number of keypoints sampled for the roadmap graph
    pub roadmap_graph_samples: usize,
    /// Width of the sampling region spanned between start and goal [m]
    pub roadmap_graph_area_width: f64,
    /// Prescaler applied to signature terms, allows large obstacle counts (0.2 < p <= 1)
    pub signature_prescaler: f64,
    /// Two signatures closer than this are considered the same class
    pub signature_threshold: f64,
    /// Lateral distance of exploration keypoints beside an obstacle [m]
    pub obstacle_keypoint_offset: f64,
    /// Normalized scalar product between obstacle and goal heading required
    /// to consider an obstacle for exploration
    pub obstacle_heading_threshold: f64,
    /// Attach via-points to all candidates instead of only the one matching
    /// the reference path
    pub viapoints_all_candidates: bool,
    /// Push the exploration graph to the visualization sink
    pub visualize_graph: bool,
}

impl Default for HomotopyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            multithreading: true,
            simple_exploration: false,
            max_number_classes: 5,
            selection_cost_hysteresis: 1.0,
            selection_obstacle_cost_scale: 100.0,
            selection_viapoint_cost_scale: 1.0,
            selection_alternative_time_cost: false,
            roadmap_graph_samples: 15,
            roadmap_graph_area_width: 6.0,
            signature_prescaler: 1.0,
            signature_threshold: 0.1,
            obstacle_keypoint_offset: 0.1,
            obstacle_heading_threshold: 0.45,
            viapoints_all_candidates: true,
            visualize_graph: false,
        }
    }
}

/// Visualization toggles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    pub publish_robot_global_plan: bool,
    pub publish_robot_local_plan: bool,
    pub publish_robot_local_plan_poses: bool,
    pub publish_robot_local_plan_footprints: bool,
    pub publish_human_global_plans: bool,
    pub publish_human_local_plans: bool,
    pub publish_human_local_plan_poses: bool,
    pub publish_human_local_plan_footprints: bool,
    /// Vertical spacing used when pose arrays are stacked for display
    pub pose_array_z_scale: f64,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            publish_robot_global_plan: true,
            publish_robot_local_plan: true,
            publish_robot_local_plan_poses: false,
            publish_robot_local_plan_footprints: false,
            publish_human_global_plans: false,
            publish_human_local_plans: true,
            publish_human_local_plan_poses: false,
            publish_human_local_plan_footprints: false,
            pose_array_z_scale: 1.0,
        }
    }
}

/// Docking-style approach behaviour towards a selected human
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproachConfig {
    /// Identifier of the human to approach
    pub approach_id: u64,
    /// Target offset distance in front of the human [m]
    pub approach_dist: f64,
    /// Target approach angle relative to the human heading [rad]
    pub approach_angle: f64,
    /// Allowed error on the offset distance [m]
    pub approach_dist_tolerance: f64,
    /// Allowed error on the approach angle [rad]
    pub approach_angle_tolerance: f64,
}

impl Default for ApproachConfig {
    fn default() -> Self {
        Self {
            approach_id: 1,
            approach_dist: 0.5,
            approach_angle: 3.14,
            approach_dist_tolerance: 0.2,
            approach_angle_tolerance: 0.3,
        }
    }
}

/// The complete planner configuration aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub planning_mode: PlanningMode,
    pub trajectory: TrajectoryConfig,
    pub robot: RobotConfig,
    pub human: HumanConfig,
    pub goal_tolerance: GoalToleranceConfig,
    pub obstacles: ObstacleConfig,
    pub optimization: OptimizationConfig,
    pub homotopy: HomotopyConfig,
    pub visualization: VisualizationConfig,
    pub approach: ApproachConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            planning_mode: PlanningMode::HumanAware,
            trajectory: TrajectoryConfig::default(),
            robot: RobotConfig::default(),
            human: HumanConfig::default(),
            goal_tolerance: GoalToleranceConfig::default(),
            obstacles: ObstacleConfig::default(),
            optimization: OptimizationConfig::default(),
            homotopy: HomotopyConfig::default(),
            visualization: VisualizationConfig::default(),
            approach: ApproachConfig::default(),
        }
    }
}

/// A single inconsistency reported by [`PlannerConfig::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// Dotted name of the offending parameter (group.field)
    pub parameter: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.parameter, self.message)
    }
}

/// Errors from the flat key/value reconfiguration path
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown parameter `{0}`")]
    UnknownKey(String),
    #[error("invalid value `{value}` for `{key}`: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

fn parse_num<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "true" | "True" | "1" => Ok(true),
        "false" | "False" | "0" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: other.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Old parameter spellings still accepted from reconfiguration sources
fn deprecated_alias(key: &str) -> Option<&'static str> {
    match key {
        "weight_point_obstacle" | "weight_line_obstacle" | "weight_poly_obstacle" => {
            Some("weight_obstacle")
        }
        "alternative_time_cost" => Some("selection_alternative_time_cost"),
        "shrink_horizon_backup" => Some("shrink_horizon"),
        "horizon_reduction_amount" => Some("horizon_reduction_fraction"),
        _ => None,
    }
}

impl PlannerConfig {
    /// Check parameters and report every detected inconsistency.
    ///
    /// Never mutates or enforces anything; each finding is returned and
    /// also emitted through the `log` facade.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |parameter: &'static str, message: String| {
            warnings.push(ConfigWarning { parameter, message });
        };

        // Trajectory
        if self.trajectory.min_samples < 3 {
            push(
                "trajectory.min_samples",
                format!(
                    "{} samples cannot carry a velocity and an acceleration, use at least 3",
                    self.trajectory.min_samples
                ),
            );
        }
        if self.trajectory.dt_hysteresis < 0.0 {
            push(
                "trajectory.dt_hysteresis",
                "negative hysteresis is meaningless".to_string(),
            );
        }
        if self.trajectory.dt_ref <= self.trajectory.dt_hysteresis {
            push(
                "trajectory.dt_ref",
                format!(
                    "dt_ref ({}) must exceed dt_hysteresis ({})",
                    self.trajectory.dt_ref, self.trajectory.dt_hysteresis
                ),
            );
        }
        if self.trajectory.horizon_reduction_fraction <= 0.0
            || self.trajectory.horizon_reduction_fraction >= 1.0
        {
            push(
                "trajectory.horizon_reduction_fraction",
                "must lie strictly between 0 and 1".to_string(),
            );
        }
        if self.trajectory.init_skip_dist < 0.0 {
            push(
                "trajectory.init_skip_dist",
                "must be non-negative".to_string(),
            );
        }

        // Robot limits: paired min/max bounds
        if self.robot.min_vel_x > self.robot.max_vel_x {
            push(
                "robot.min_vel_x",
                format!(
                    "minimum ({}) exceeds maximum ({})",
                    self.robot.min_vel_x, self.robot.max_vel_x
                ),
            );
        }
        if self.robot.min_vel_x_backwards > self.robot.max_vel_x_backwards {
            push(
                "robot.min_vel_x_backwards",
                format!(
                    "minimum ({}) exceeds maximum ({})",
                    self.robot.min_vel_x_backwards, self.robot.max_vel_x_backwards
                ),
            );
        }
        if self.robot.min_vel_theta > self.robot.max_vel_theta {
            push(
                "robot.min_vel_theta",
                format!(
                    "minimum ({}) exceeds maximum ({})",
                    self.robot.min_vel_theta, self.robot.max_vel_theta
                ),
            );
        }
        if self.robot.acc_lim_x <= 0.0 || self.robot.acc_lim_theta <= 0.0 {
            push(
                "robot.acc_lim_x",
                "acceleration limits must be positive".to_string(),
            );
        }
        if self.robot.min_turning_radius < 0.0 {
            push(
                "robot.min_turning_radius",
                "must be non-negative".to_string(),
            );
        }

        // Human limits
        if self.human.min_vel_x > self.human.max_vel_x {
            push(
                "human.min_vel_x",
                format!(
                    "minimum ({}) exceeds maximum ({})",
                    self.human.min_vel_x, self.human.max_vel_x
                ),
            );
        }
        if self.human.nominal_vel_x > self.human.max_vel_x {
            push(
                "human.nominal_vel_x",
                format!(
                    "nominal velocity ({}) exceeds the maximum ({})",
                    self.human.nominal_vel_x, self.human.max_vel_x
                ),
            );
        }
        if self.human.radius < 0.0 {
            push("human.radius", "must be non-negative".to_string());
        }
        if self.human.min_human_robot_dist <= self.human.radius {
            push(
                "human.min_human_robot_dist",
                format!(
                    "separation ({}) does not clear the human radius ({})",
                    self.human.min_human_robot_dist, self.human.radius
                ),
            );
        }
        if self.human.min_human_human_dist <= 2.0 * self.human.radius {
            push(
                "human.min_human_human_dist",
                format!(
                    "separation ({}) does not clear two human radii ({})",
                    self.human.min_human_human_dist,
                    2.0 * self.human.radius
                ),
            );
        }
        if self.human.ttc_threshold <= 0.0 || self.human.ttcplus_threshold <= 0.0 {
            push(
                "human.ttc_threshold",
                "TTC thresholds must be positive".to_string(),
            );
        }
        if self.human.fov <= 0.0 || self.human.fov > 2.0 * std::f64::consts::PI {
            push("human.fov", "field of view must lie in (0, 2*pi]".to_string());
        }

        // Goal tolerance
        if self.goal_tolerance.xy_goal_tolerance < 0.0
            || self.goal_tolerance.yaw_goal_tolerance < 0.0
        {
            push(
                "goal_tolerance.xy_goal_tolerance",
                "tolerances must be non-negative".to_string(),
            );
        }

        // Obstacles
        if self.obstacles.min_obstacle_dist < 0.0 {
            push(
                "obstacles.min_obstacle_dist",
                "must be non-negative".to_string(),
            );
        }
        if self.obstacles.poses_affected == 0 {
            push(
                "obstacles.poses_affected",
                "no trajectory pose is affected by obstacles".to_string(),
            );
        }

        // Optimization
        if self.optimization.inner_iterations == 0 || self.optimization.outer_iterations == 0 {
            push(
                "optimization.inner_iterations",
                "iteration budget of zero disables optimization entirely".to_string(),
            );
        }
        if self.optimization.penalty_epsilon < 0.0 || self.optimization.time_penalty_epsilon < 0.0 {
            push(
                "optimization.penalty_epsilon",
                "penalty margins must be non-negative".to_string(),
            );
        }
        if self.optimization.omega_change_time_separation <= 0.0
            && self.optimization.disable_rapid_omega_change
        {
            push(
                "optimization.omega_change_time_separation",
                "must be positive when rapid omega changes are penalized".to_string(),
            );
        }

        // Homotopy
        if self.homotopy.max_number_classes == 0 {
            push(
                "homotopy.max_number_classes",
                "at least one trajectory class is required".to_string(),
            );
        }
        if self.homotopy.selection_cost_hysteresis <= 0.0 {
            push(
                "homotopy.selection_cost_hysteresis",
                "must be positive".to_string(),
            );
        }
        if self.homotopy.signature_prescaler <= 0.2 || self.homotopy.signature_prescaler > 1.0 {
            push(
                "homotopy.signature_prescaler",
                "should lie in (0.2, 1], otherwise obstacles become indistinguishable".to_string(),
            );
        }
        if self.homotopy.signature_threshold < 0.0 {
            push(
                "homotopy.signature_threshold",
                "must be non-negative".to_string(),
            );
        }

        for w in &warnings {
            warn!("configuration: {}", w);
        }
        warnings
    }

    /// Apply one flat key/value pair from a reconfiguration source.
    ///
    /// Keys use the flat external spelling (`dt_ref`, `human.radius`,
    /// `weight_obstacle`, ...). Deprecated spellings are mapped to their
    /// replacement with a warning. Unknown keys are an error.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        if let Some(replacement) = deprecated_alias(key) {
            warn!(
                "configuration: parameter `{}` is deprecated, use `{}`",
                key, replacement
            );
            return self.apply(replacement, value);
        }

        match key {
            "planning_mode" => {
                self.planning_mode = match parse_num::<i64>(key, value)? {
                    0 => PlanningMode::RobotOnly,
                    1 => PlanningMode::HumanAware,
                    other => {
                        return Err(ConfigError::InvalidValue {
                            key: key.to_string(),
                            value: other.to_string(),
                            reason: "expected 0 (robot only) or 1 (human aware)".to_string(),
                        })
                    }
                }
            }

            // Trajectory
            "teb_autosize" | "autosize" => self.trajectory.autosize = parse_bool(key, value)?,
            "dt_ref" => self.trajectory.dt_ref = parse_num(key, value)?,
            "dt_hysteresis" => self.trajectory.dt_hysteresis = parse_num(key, value)?,
            "min_samples" => self.trajectory.min_samples = parse_num(key, value)?,
            "human_min_samples" => self.trajectory.human_min_samples = parse_num(key, value)?,
            "global_plan_overwrite_orientation" => {
                self.trajectory.overwrite_global_orientation = parse_bool(key, value)?
            }
            "global_plan_viapoint_sep" => {
                self.trajectory.viapoint_separation = parse_num(key, value)?
            }
            "via_points_ordered" => self.trajectory.viapoints_ordered = parse_bool(key, value)?,
            "max_global_plan_lookahead_dist" => {
                self.trajectory.max_lookahead_dist = parse_num(key, value)?
            }
            "force_reinit_new_goal_dist" => {
                self.trajectory.force_reinit_new_goal_dist = parse_num(key, value)?
            }
            "feasibility_check_no_poses" => {
                self.trajectory.feasibility_check_poses = parse_num(key, value)?
            }
            "publish_feedback" => self.trajectory.publish_feedback = parse_bool(key, value)?,
            "shrink_horizon" => self.trajectory.shrink_horizon = parse_bool(key, value)?,
            "horizon_reduction_fraction" => {
                self.trajectory.horizon_reduction_fraction = parse_num(key, value)?
            }
            "teb_init_skip_dist" => self.trajectory.init_skip_dist = parse_num(key, value)?,

            // Robot
            "max_vel_x" => self.robot.max_vel_x = parse_num(key, value)?,
            "min_vel_x" => self.robot.min_vel_x = parse_num(key, value)?,
            "max_vel_x_backwards" => self.robot.max_vel_x_backwards = parse_num(key, value)?,
            "min_vel_x_backwards" => self.robot.min_vel_x_backwards = parse_num(key, value)?,
            "max_vel_theta" => self.robot.max_vel_theta = parse_num(key, value)?,
            "min_vel_theta" => self.robot.min_vel_theta = parse_num(key, value)?,
            "acc_lim_x" => self.robot.acc_lim_x = parse_num(key, value)?,
            "acc_lim_theta" => self.robot.acc_lim_theta = parse_num(key, value)?,
            "min_turning_radius" => self.robot.min_turning_radius = parse_num(key, value)?,
            "wheelbase" => self.robot.wheelbase = parse_num(key, value)?,
            "cmd_angle_instead_rotvel" => {
                self.robot.cmd_angle_instead_rotvel = parse_bool(key, value)?
            }

            // Human
            "human.radius" => self.human.radius = parse_num(key, value)?,
            "min_human_robot_dist" => self.human.min_human_robot_dist = parse_num(key, value)?,
            "min_human_human_dist" => self.human.min_human_human_dist = parse_num(key, value)?,
            "human.max_vel_x" => self.human.max_vel_x = parse_num(key, value)?,
            "human.min_vel_x" => self.human.min_vel_x = parse_num(key, value)?,
            "human.nominal_vel_x" => self.human.nominal_vel_x = parse_num(key, value)?,
            "human.max_vel_x_backwards" => {
                self.human.max_vel_x_backwards = parse_num(key, value)?
            }
            "human.min_vel_x_backwards" => {
                self.human.min_vel_x_backwards = parse_num(key, value)?
            }
            "human.max_vel_theta" => self.human.max_vel_theta = parse_num(key, value)?,
            "human.min_vel_theta" => self.human.min_vel_theta = parse_num(key, value)?,
            "human.acc_lim_x" => self.human.acc_lim_x = parse_num(key, value)?,
            "human.acc_lim_theta" => self.human.acc_lim_theta = parse_num(key, value)?,
            "human.use_external_prediction" => {
                self.human.use_external_prediction = parse_bool(key, value)?
            }
            "human.predict_behind_robot" => {
                self.human.predict_behind_robot = parse_bool(key, value)?
            }
            "ttc_threshold" => self.human.ttc_threshold = parse_num(key, value)?,
            "ttcplus_threshold" => self.human.ttcplus_threshold = parse_num(key, value)?,
            "ttclosest_threshold" => self.human.ttclosest_threshold = parse_num(key, value)?,
            "ttcplus_timer" => self.human.ttcplus_timer = parse_num(key, value)?,
            "dir_cost_threshold" => self.human.dir_cost_threshold = parse_num(key, value)?,
            "visibility_cost_threshold" => {
                self.human.visibility_cost_threshold = parse_num(key, value)?
            }
            "pose_prediction_reset_time" => {
                self.human.pose_prediction_reset_time = parse_num(key, value)?
            }
            "human.fov" => self.human.fov = parse_num(key, value)?,

            // Goal tolerance
            "xy_goal_tolerance" => self.goal_tolerance.xy_goal_tolerance = parse_num(key, value)?,
            "yaw_goal_tolerance" => self.goal_tolerance.yaw_goal_tolerance = parse_num(key, value)?,
            "free_goal_vel" => self.goal_tolerance.free_goal_vel = parse_bool(key, value)?,

            // Obstacles
            "min_obstacle_dist" => self.obstacles.min_obstacle_dist = parse_num(key, value)?,
            "use_nonlinear_obstacle_penalty" => {
                self.obstacles.use_nonlinear_penalty = parse_bool(key, value)?
            }
            "obstacle_cost_mult" => self.obstacles.cost_multiplier = parse_num(key, value)?,
            "include_costmap_obstacles" => {
                self.obstacles.include_costmap_obstacles = parse_bool(key, value)?
            }
            "costmap_obstacles_behind_robot_dist" => {
                self.obstacles.behind_robot_dist = parse_num(key, value)?
            }
            "obstacle_poses_affected" => self.obstacles.poses_affected = parse_num(key, value)?,
            "costmap_converter_rate" => {
                self.obstacles.costmap_converter_rate = parse_num(key, value)?
            }

            // Optimization
            "no_inner_iterations" => self.optimization.inner_iterations = parse_num(key, value)?,
            "no_outer_iterations" => self.optimization.outer_iterations = parse_num(key, value)?,
            "optimization_activate" => self.optimization.activate = parse_bool(key, value)?,
            "optimization_verbose" => self.optimization.verbose = parse_bool(key, value)?,
            "penalty_epsilon" => self.optimization.penalty_epsilon = parse_num(key, value)?,
            "time_penalty_epsilon" => {
                self.optimization.time_penalty_epsilon = parse_num(key, value)?
            }
            "cap_optimaltime_penalty" => {
                self.optimization.cap_optimaltime_penalty = parse_bool(key, value)?
            }
            "weight_max_vel_x" => self.optimization.weight_max_vel_x = parse_num(key, value)?,
            "weight_max_human_vel_x" => {
                self.optimization.weight_max_human_vel_x = parse_num(key, value)?
            }
            "weight_nominal_human_vel_x" => {
                self.optimization.weight_nominal_human_vel_x = parse_num(key, value)?
            }
            "weight_max_vel_theta" => {
                self.optimization.weight_max_vel_theta = parse_num(key, value)?
            }
            "weight_max_human_vel_theta" => {
                self.optimization.weight_max_human_vel_theta = parse_num(key, value)?
            }
            "weight_acc_lim_x" => self.optimization.weight_acc_lim_x = parse_num(key, value)?,
            "weight_human_acc_lim_x" => {
                self.optimization.weight_human_acc_lim_x = parse_num(key, value)?
            }
            "weight_acc_lim_theta" => {
                self.optimization.weight_acc_lim_theta = parse_num(key, value)?
            }
            "weight_human_acc_lim_theta" => {
                self.optimization.weight_human_acc_lim_theta = parse_num(key, value)?
            }
            "weight_kinematics_nh" => {
                self.optimization.weight_kinematics_nh = parse_num(key, value)?
            }
            "weight_kinematics_forward_drive" => {
                self.optimization.weight_kinematics_forward_drive = parse_num(key, value)?
            }
            "weight_kinematics_turning_radius" => {
                self.optimization.weight_kinematics_turning_radius = parse_num(key, value)?
            }
            "weight_optimaltime" => self.optimization.weight_optimaltime = parse_num(key, value)?,
            "weight_human_optimaltime" => {
                self.optimization.weight_human_optimaltime = parse_num(key, value)?
            }
            "weight_obstacle" => self.optimization.weight_obstacle = parse_num(key, value)?,
            "weight_dynamic_obstacle" => {
                self.optimization.weight_dynamic_obstacle = parse_num(key, value)?
            }
            "weight_viapoint" => self.optimization.weight_viapoint = parse_num(key, value)?,
            "weight_human_viapoint" => {
                self.optimization.weight_human_viapoint = parse_num(key, value)?
            }
            "weight_human_robot_safety" => {
                self.optimization.weight_human_robot_safety = parse_num(key, value)?
            }
            "weight_human_human_safety" => {
                self.optimization.weight_human_human_safety = parse_num(key, value)?
            }
            "weight_human_robot_ttc" => {
                self.optimization.weight_human_robot_ttc = parse_num(key, value)?
            }
            "weight_human_robot_ttcplus" => {
                self.optimization.weight_human_robot_ttcplus = parse_num(key, value)?
            }
            "weight_human_robot_ttclosest" => {
                self.optimization.weight_human_robot_ttclosest = parse_num(key, value)?
            }
            "weight_human_robot_dir" => {
                self.optimization.weight_human_robot_dir = parse_num(key, value)?
            }
            "weight_human_robot_visibility" => {
                self.optimization.weight_human_robot_visibility = parse_num(key, value)?
            }
            "human_robot_ttc_scale_alpha" => {
                self.optimization.human_robot_ttc_scale_alpha = parse_num(key, value)?
            }
            "human_robot_ttcplus_scale_alpha" => {
                self.optimization.human_robot_ttcplus_scale_alpha = parse_num(key, value)?
            }
            "use_human_robot_safety_c" => {
                self.optimization.use_human_robot_safety = parse_bool(key, value)?
            }
            "use_human_human_safety_c" => {
                self.optimization.use_human_human_safety = parse_bool(key, value)?
            }
            "use_human_robot_ttc_c" => {
                self.optimization.use_human_robot_ttc = parse_bool(key, value)?
            }
            "use_human_robot_ttcplus_c" => {
                self.optimization.use_human_robot_ttcplus = parse_bool(key, value)?
            }
            "use_human_robot_ttclosest_c" => {
                self.optimization.use_human_robot_ttclosest = parse_bool(key, value)?
            }
            "scale_human_robot_ttc_c" => {
                self.optimization.scale_human_robot_ttc = parse_bool(key, value)?
            }
            "scale_human_robot_ttcplus_c" => {
                self.optimization.scale_human_robot_ttcplus = parse_bool(key, value)?
            }
            "use_human_robot_dir_c" => {
                self.optimization.use_human_robot_dir = parse_bool(key, value)?
            }
            "use_human_robot_visi_c" => {
                self.optimization.use_human_robot_visibility = parse_bool(key, value)?
            }
            "use_human_elastic_vel" => {
                self.optimization.use_human_elastic_vel = parse_bool(key, value)?
            }
            "disable_warm_start" => {
                self.optimization.disable_warm_start = parse_bool(key, value)?
            }
            "disable_rapid_omega_change" => {
                self.optimization.disable_rapid_omega_change = parse_bool(key, value)?
            }
            "omega_change_time_separation" => {
                self.optimization.omega_change_time_separation = parse_num(key, value)?
            }

            // Homotopy classes
            "enable_homotopy_class_planning" => self.homotopy.enabled = parse_bool(key, value)?,
            "enable_multithreading" => self.homotopy.multithreading = parse_bool(key, value)?,
            "simple_exploration" => self.homotopy.simple_exploration = parse_bool(key, value)?,
            "max_number_classes" => self.homotopy.max_number_classes = parse_num(key, value)?,
            "selection_cost_hysteresis" => {
                self.homotopy.selection_cost_hysteresis = parse_num(key, value)?
            }
            "selection_obst_cost_scale" => {
                self.homotopy.selection_obstacle_cost_scale = parse_num(key, value)?
            }
            "selection_viapoint_cost_scale" => {
                self.homotopy.selection_viapoint_cost_scale = parse_num(key, value)?
            }
            "selection_alternative_time_cost" => {
                self.homotopy.selection_alternative_time_cost = parse_bool(key, value)?
            }
            "roadmap_graph_no_samples" => {
                self.homotopy.roadmap_graph_samples = parse_num(key, value)?
            }
            "roadmap_graph_area_width" => {
                self.homotopy.roadmap_graph_area_width = parse_num(key, value)?
            }
            "h_signature_prescaler" => self.homotopy.signature_prescaler = parse_num(key, value)?,
            "h_signature_threshold" => self.homotopy.signature_threshold = parse_num(key, value)?,
            "obstacle_keypoint_offset" => {
                self.homotopy.obstacle_keypoint_offset = parse_num(key, value)?
            }
            "obstacle_heading_threshold" => {
                self.homotopy.obstacle_heading_threshold = parse_num(key, value)?
            }
            "viapoints_all_candidates" => {
                self.homotopy.viapoints_all_candidates = parse_bool(key, value)?
            }
            "visualize_hc_graph" => self.homotopy.visualize_graph = parse_bool(key, value)?,

            // Visualization
            "publish_robot_global_plan" => {
                self.visualization.publish_robot_global_plan = parse_bool(key, value)?
            }
            "publish_robot_local_plan" => {
                self.visualization.publish_robot_local_plan = parse_bool(key, value)?
            }
            "publish_robot_local_plan_poses" => {
                self.visualization.publish_robot_local_plan_poses = parse_bool(key, value)?
            }
            "publish_robot_local_plan_fp_poses" => {
                self.visualization.publish_robot_local_plan_footprints = parse_bool(key, value)?
            }
            "publish_human_global_plans" => {
                self.visualization.publish_human_global_plans = parse_bool(key, value)?
            }
            "publish_human_local_plans" => {
                self.visualization.publish_human_local_plans = parse_bool(key, value)?
            }
            "publish_human_local_plan_poses" => {
                self.visualization.publish_human_local_plan_poses = parse_bool(key, value)?
            }
            "publish_human_local_plan_fp_poses" => {
                self.visualization.publish_human_local_plan_footprints = parse_bool(key, value)?
            }
            "pose_array_z_scale" => {
                self.visualization.pose_array_z_scale = parse_num(key, value)?
            }

            // Approach
            "approach_id" => self.approach.approach_id = parse_num(key, value)?,
            "approach_dist" => self.approach.approach_dist = parse_num(key, value)?,
            "approach_angle" => self.approach.approach_angle = parse_num(key, value)?,
            "approach_dist_tolerance" => {
                self.approach.approach_dist_tolerance = parse_num(key, value)?
            }
            "approach_angle_tolerance" => {
                self.approach.approach_angle_tolerance = parse_num(key, value)?
            }

            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Apply a batch of key/value pairs, stopping at the first error
    pub fn apply_all<'a, I>(&mut self, pairs: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in pairs {
            self.apply(key, value)?;
        }
        Ok(())
    }
}

/// Exclusive-access handle to a process-wide configuration.
///
/// One lock is attached one-to-one with the configuration instance. A
/// reconfiguration source and the planning thread share clones of this
/// handle; any read spanning multiple fields and any write must go
/// through [`SharedConfig::lock`] so no torn state is ever observed.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<Mutex<PlannerConfig>>,
}

impl SharedConfig {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(config)),
        }
    }

    /// Acquire the configuration lock.
    ///
    /// A poisoned lock is recovered: the configuration contains plain
    /// data only, so the last written state is still consistent.
    pub fn lock(&self) -> MutexGuard<'_, PlannerConfig> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clone the current configuration under the lock
    pub fn snapshot(&self) -> PlannerConfig {
        self.lock().clone()
    }
}
