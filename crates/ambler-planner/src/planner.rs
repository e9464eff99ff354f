//! Planner lifecycle contract
//!
//! The abstract behaviour every optimizer-backed local planner must
//! provide to its host: accept a planning request, optimize internally,
//! expose a velocity command, report feasibility and cost, advise on
//! horizon reduction, and reset. All failure signaling crosses this
//! boundary as return values; nothing here panics on bad input.
//!
//! Feasibility polarity: [`LocalPlanner::is_trajectory_feasible`]
//! returns `true` when the swept trajectory prefix is collision-free,
//! `false` when a collision was found. A `false` result is the
//! precondition for consulting
//! [`LocalPlanner::is_horizon_reduction_appropriate`].

use thiserror::Error;

use ambler_core::footprint::FootprintPolygon;
use ambler_core::pose::{PoseSE2, Velocity};

use crate::feasibility::CollisionModel;
use crate::request::{HumanPlanIndex, PlanRequest, TimedPose};
use crate::trajectory::Trajectory;
use crate::visualization::VisualizationSink;

/// Lifecycle state of a planner instance.
///
/// `Uninitialized -> Feasible | Infeasible` through plan calls, back to
/// `Uninitialized` only through an explicit [`LocalPlanner::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlannerState {
    /// No plan has been computed since construction or the last reset
    #[default]
    Uninitialized,
    /// The last plan call produced a usable trajectory
    Feasible,
    /// The last plan call failed; the velocity command is stale
    Infeasible,
}

/// Why a plan call produced no usable trajectory
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("reference path is empty")]
    EmptyPlan,
    #[error("request contains non-finite values")]
    NonFinitePlan,
    #[error("optimization diverged after {iterations} iterations")]
    NotConverged { iterations: usize },
    #[error("no exploration candidate produced a usable trajectory")]
    NoCandidate,
}

/// Abstract local planner driven once per control cycle by the host.
///
/// Required methods are the minimal surface a concrete planner must
/// provide; the remaining hooks carry documented no-op defaults.
pub trait LocalPlanner {
    /// Plan from a reference path segment.
    ///
    /// `humans` is consumed read-only for the duration of the call and
    /// feeds the human-aware safety costs; it is never stored. When
    /// `free_goal_vel` is false the final velocity is constrained to
    /// zero. `cost_out`, when supplied, receives one scalar per live
    /// trajectory candidate after a successful optimization.
    ///
    /// On error the previously valid trajectory is left untouched, but
    /// the planner transitions to [`PlannerState::Infeasible`] and
    /// [`LocalPlanner::velocity_command`] reports failure until the
    /// next successful plan.
    fn plan(
        &mut self,
        request: &PlanRequest,
        humans: Option<&HumanPlanIndex>,
        free_goal_vel: bool,
        cost_out: Option<&mut Vec<f64>>,
    ) -> Result<(), PlanError>;

    /// Plan between a bare start and goal pose.
    ///
    /// Equivalent inputs must produce the same internal state as
    /// [`LocalPlanner::plan`] with a two-pose reference path.
    fn plan_between(
        &mut self,
        start: &PoseSE2,
        goal: &PoseSE2,
        start_velocity: Option<Velocity>,
        free_goal_vel: bool,
    ) -> Result<(), PlanError>;

    /// Plan between a start and goal pose, accounting for computation
    /// time already spent before this call.
    ///
    /// `pre_plan_time` [s] is a latency hint: the produced trajectory
    /// starts that far along, so the first transition reflects where
    /// the robot will actually be when the command is applied.
    fn plan_with_elapsed(
        &mut self,
        start: &PoseSE2,
        goal: &PoseSE2,
        start_velocity: Option<Velocity>,
        free_goal_vel: bool,
        pre_plan_time: f64,
    ) -> Result<(), PlanError>;

    /// Velocity command from the current trajectory's first transition.
    ///
    /// `None` whenever no feasible trajectory exists (after a failed
    /// plan, a reset, or before the first plan). Calling this early is
    /// a caller error signaled through the return value, never a fault.
    fn velocity_command(&self) -> Option<Velocity>;

    /// Unconditional reset to [`PlannerState::Uninitialized`].
    ///
    /// Discards the trajectory and any cached solver state; safe to
    /// call at any time, including immediately after construction.
    fn clear(&mut self);

    /// Current lifecycle state
    fn state(&self) -> PlannerState;

    /// Sweep the robot footprint along the leading trajectory poses.
    ///
    /// Returns `true` when the swept prefix is collision-free.
    /// `look_ahead` limits the number of poses tested (clamped to the
    /// trajectory length); `None` sweeps the whole trajectory.
    fn is_trajectory_feasible(
        &self,
        model: &dyn CollisionModel,
        footprint: &FootprintPolygon,
        inscribed_radius: f64,
        circumscribed_radius: f64,
        look_ahead: Option<usize>,
    ) -> bool;

    /// Advisory only: whether retrying with a shortened horizon is
    /// likely to resolve the last failure. Meant to be consulted after
    /// a trajectory was judged infeasible or degenerate. The default
    /// never recommends reduction.
    fn is_horizon_reduction_appropriate(&self, _reference: &[TimedPose]) -> bool {
        false
    }

    /// Fill one scalar per live trajectory candidate with the weighted
    /// sum of the cost terms the optimizer minimizes. Only the obstacle
    /// term is scaled by `obstacle_cost_scale`; `alternative_time_cost`
    /// replaces the time-optimality term by the literal transition
    /// time. Implementations maintaining a single trajectory must not
    /// resize `cost_out`. The default is a no-op.
    fn compute_current_cost(
        &mut self,
        _cost_out: &mut Vec<f64>,
        _obstacle_cost_scale: f64,
        _alternative_time_cost: bool,
    ) {
    }

    /// Copy the complete current robot trajectory. The default leaves
    /// the output untouched.
    fn full_trajectory(&self, _out: &mut Trajectory) {}

    /// Copy the complete predicted/optimized trajectory for one human.
    ///
    /// An unknown identifier yields an empty trajectory, never a fault.
    fn full_human_trajectory(&self, human_id: u64) -> Trajectory;

    /// Push debug artifacts to an external sink. Never required for
    /// correctness; the default publishes nothing.
    fn visualize(&self, _sink: &mut dyn VisualizationSink) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_uninitialized() {
        assert_eq!(PlannerState::default(), PlannerState::Uninitialized);
    }

    #[test]
    fn test_plan_error_messages() {
        assert_eq!(PlanError::EmptyPlan.to_string(), "reference path is empty");
        assert_eq!(
            PlanError::NotConverged { iterations: 32 }.to_string(),
            "optimization diverged after 32 iterations"
        );
    }
}
