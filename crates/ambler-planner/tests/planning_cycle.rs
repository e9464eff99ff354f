//! End-to-end planning cycle tests
//!
//! Drives the planners through the same call sequences a host process
//! issues each control cycle: plan, extract the velocity command, check
//! feasibility, recompute costs, reset.

use ambler_core::footprint::FootprintPolygon;
use ambler_core::obstacle::Obstacle;
use ambler_core::pose::{PoseSE2, Velocity};
use ambler_core::Point2;

use ambler_planner::{
    EbandPlanner, HomotopyPlanner, HumanPlanIndex, LocalPlanner, ObstacleCollisionModel,
    PlanRequest, PlannerConfig, PlannerState, SharedConfig, Trajectory,
};

fn default_shared() -> SharedConfig {
    SharedConfig::new(PlannerConfig::default())
}

fn straight_request() -> PlanRequest {
    PlanRequest::from_poses((0..5).map(|i| PoseSE2::new(i as f64, 0.0, 0.0)))
        .with_start_velocity(Velocity::zero())
        .with_goal_velocity(Velocity::zero())
}

/// A head-on human inside the configured separation after a short walk
fn oncoming_human() -> HumanPlanIndex {
    let mut humans = HumanPlanIndex::new();
    humans.insert(
        1,
        PlanRequest::from_poses(
            (0..6).map(|i| PoseSE2::new(3.0 - i as f64 * 0.5, 0.0, std::f64::consts::PI)),
        ),
    );
    humans
}

#[test]
fn straight_line_scenario_full_cycle() {
    let mut planner = EbandPlanner::new(default_shared());
    planner
        .plan(&straight_request(), None, false, None)
        .expect("straight line in free space must plan");

    // Trajectory carries at least the minimum sample count
    let mut trajectory = Trajectory::new();
    planner.full_trajectory(&mut trajectory);
    let min_samples = PlannerConfig::default().trajectory.min_samples;
    assert!(trajectory.len() >= min_samples);

    // Forward command within the velocity bounds
    let command = planner.velocity_command().expect("feasible plan commands");
    assert!(command.linear >= 0.0);
    assert!(command.linear <= PlannerConfig::default().robot.max_vel_x + 1e-6);

    // Feasible against an empty world
    let footprint = FootprintPolygon::square(0.15);
    let model = ObstacleCollisionModel::new(vec![]);
    assert!(planner.is_trajectory_feasible(&model, &footprint, 0.0, 0.0, None));
}

#[test]
fn failed_plan_makes_command_stale_until_next_success() {
    let mut planner = EbandPlanner::new(default_shared());
    planner.plan(&straight_request(), None, false, None).unwrap();
    assert!(planner.velocity_command().is_some());

    assert!(planner.plan(&PlanRequest::default(), None, false, None).is_err());
    assert!(planner.velocity_command().is_none());
    assert_eq!(planner.state(), PlannerState::Infeasible);

    // The next successful plan revives the command
    planner.plan(&straight_request(), None, false, None).unwrap();
    assert!(planner.velocity_command().is_some());
    assert_eq!(planner.state(), PlannerState::Feasible);
}

#[test]
fn clear_then_command_always_fails() {
    let mut planner = EbandPlanner::new(default_shared());
    planner.plan(&straight_request(), None, false, None).unwrap();
    planner.clear();
    assert!(planner.velocity_command().is_none());

    let mut homotopy = HomotopyPlanner::new(default_shared());
    homotopy.plan(&straight_request(), None, false, None).unwrap();
    homotopy.clear();
    assert!(homotopy.velocity_command().is_none());
}

#[test]
fn look_ahead_beyond_length_matches_full_sweep() {
    let mut planner = EbandPlanner::new(default_shared());
    planner.set_obstacles(vec![Obstacle::point(3.5, 0.05)]);
    planner.plan(&straight_request(), None, false, None).unwrap();

    let footprint = FootprintPolygon::square(0.15);
    let model = ObstacleCollisionModel::new(vec![Obstacle::point(3.5, 0.05)]);

    let full = planner.is_trajectory_feasible(&model, &footprint, 0.0, 0.0, None);
    let clamped = planner.is_trajectory_feasible(&model, &footprint, 0.0, 0.0, Some(usize::MAX));
    assert_eq!(full, clamped);
}

#[test]
fn obstacle_cost_scale_moves_only_the_obstacle_term() {
    let mut planner = EbandPlanner::new(default_shared());
    planner.set_obstacles(vec![Obstacle::point(2.0, 0.2)]);
    planner.plan(&straight_request(), None, false, None).unwrap();

    let mut unit = vec![0.0];
    let mut doubled = vec![0.0];
    let mut tripled = vec![0.0];
    planner.compute_current_cost(&mut unit, 1.0, false);
    planner.compute_current_cost(&mut doubled, 2.0, false);
    planner.compute_current_cost(&mut tripled, 3.0, false);

    // Linear in the scale: equal increments per unit of scale
    let step1 = doubled[0] - unit[0];
    let step2 = tripled[0] - doubled[0];
    approx::assert_relative_eq!(step1, step2, epsilon = 1e-9);
}

#[test]
fn human_on_collision_course_raises_cost() {
    let shared = {
        let mut config = PlannerConfig::default();
        config.optimization.use_human_robot_safety = true;
        SharedConfig::new(config)
    };

    let mut with_human = EbandPlanner::new(shared.clone());
    with_human
        .plan(&straight_request(), Some(&oncoming_human()), false, None)
        .unwrap();
    let mut cost_with = vec![0.0];
    with_human.compute_current_cost(&mut cost_with, 1.0, false);

    let mut without_human = EbandPlanner::new(shared);
    without_human
        .plan(&straight_request(), None, false, None)
        .unwrap();
    let mut cost_without = vec![0.0];
    without_human.compute_current_cost(&mut cost_without, 1.0, false);

    assert!(
        cost_with[0] > cost_without[0],
        "human on a collision course must be more expensive ({} vs {})",
        cost_with[0],
        cost_without[0]
    );
}

#[test]
fn human_plans_are_consumed_per_cycle_not_stored() {
    let mut planner = EbandPlanner::new(default_shared());
    planner
        .plan(&straight_request(), Some(&oncoming_human()), false, None)
        .unwrap();
    assert!(!planner.full_human_trajectory(1).is_empty());

    // Next cycle without the human forgets the previous entry
    planner.plan(&straight_request(), None, false, None).unwrap();
    assert!(planner.full_human_trajectory(1).is_empty());
}

#[test]
fn homotopy_planner_picks_a_side_around_an_obstacle() {
    let shared = {
        let mut config = PlannerConfig::default();
        config.homotopy.simple_exploration = true;
        SharedConfig::new(config)
    };
    let mut planner = HomotopyPlanner::new(shared);
    planner.set_obstacles(vec![Obstacle::point(2.0, 0.0)]);

    let mut costs = Vec::new();
    planner
        .plan(&straight_request(), None, false, Some(&mut costs))
        .unwrap();
    assert!(planner.candidate_count() >= 2);
    assert_eq!(costs.len(), planner.candidate_count());

    // The selected trajectory clears the obstacle
    let mut best = Trajectory::new();
    planner.full_trajectory(&mut best);
    let closest = best
        .points()
        .iter()
        .map(|p| (p.pose.position - Point2::new(2.0, 0.0)).norm())
        .fold(f64::INFINITY, f64::min);
    assert!(closest > 0.05, "selected class hugs the obstacle: {closest}");
}

#[test]
fn homotopy_selection_is_stable_across_cycles() {
    let shared = {
        let mut config = PlannerConfig::default();
        config.homotopy.simple_exploration = true;
        // Strong hysteresis: a challenger must be far cheaper to take over
        config.homotopy.selection_cost_hysteresis = 0.5;
        SharedConfig::new(config)
    };
    let mut planner = HomotopyPlanner::new(shared);
    planner.set_obstacles(vec![Obstacle::point(2.0, 0.1)]);

    planner.plan(&straight_request(), None, false, None).unwrap();
    let mut first = Trajectory::new();
    planner.full_trajectory(&mut first);

    planner.plan(&straight_request(), None, false, None).unwrap();
    let mut second = Trajectory::new();
    planner.full_trajectory(&mut second);

    // Same corridor both cycles: the midpoint stays on the same side
    let mid_first = first.sample_pose(first.duration() * 0.5).unwrap();
    let mid_second = second.sample_pose(second.duration() * 0.5).unwrap();
    assert_eq!(
        mid_first.y() > 0.1,
        mid_second.y() > 0.1,
        "selection flipped corridors between cycles"
    );
}

#[test]
fn reconfiguration_is_visible_to_the_planning_thread() {
    let shared = default_shared();
    let mut planner = EbandPlanner::new(shared.clone());

    // A reconfiguration source lowers the velocity limit between cycles
    shared.lock().apply("max_vel_x", "0.1").unwrap();

    planner.plan(&straight_request(), None, false, None).unwrap();
    let command = planner.velocity_command().unwrap();
    assert!(command.linear <= 0.1 + 1e-6);
}

#[test]
fn trait_object_dispatch_covers_both_planners() {
    let planners: Vec<Box<dyn LocalPlanner>> = vec![
        Box::new(EbandPlanner::new(default_shared())),
        Box::new(HomotopyPlanner::new(default_shared())),
    ];

    for mut planner in planners {
        assert_eq!(planner.state(), PlannerState::Uninitialized);
        assert!(planner.velocity_command().is_none());
        planner.plan(&straight_request(), None, false, None).unwrap();
        assert_eq!(planner.state(), PlannerState::Feasible);
        assert!(planner.velocity_command().is_some());
        assert!(planner.full_human_trajectory(42).is_empty());
        planner.clear();
        assert_eq!(planner.state(), PlannerState::Uninitialized);
    }
}
