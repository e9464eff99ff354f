//! Trajectory feasibility checking
//!
//! A bounded linear sweep of the robot footprint along the leading part
//! of a trajectory. The collision test itself is delegated to an
//! externally supplied [`CollisionModel`]; this module only decides
//! which poses to test and in which order (earliest outward, stopping
//! at the first collision or the look-ahead bound).

use ambler_core::footprint::FootprintPolygon;
use ambler_core::obstacle::Obstacle;
use ambler_core::pose::PoseSE2;

use crate::trajectory::Trajectory;

/// External collision boundary: tests one footprint placement.
///
/// `inscribed_radius` and `circumscribed_radius` let an implementation
/// shortcut the polygon test: anything closer than the inscribed radius
/// collides, anything farther than the circumscribed radius cannot.
pub trait CollisionModel {
    /// `true` when the footprint placed at `pose` hits an obstacle
    fn footprint_in_collision(
        &self,
        pose: &PoseSE2,
        footprint: &FootprintPolygon,
        inscribed_radius: f64,
        circumscribed_radius: f64,
    ) -> bool;
}

/// Collision model backed by an explicit obstacle set
#[derive(Debug, Clone, Default)]
pub struct ObstacleCollisionModel {
    obstacles: Vec<Obstacle>,
}

impl ObstacleCollisionModel {
    pub fn new(obstacles: Vec<Obstacle>) -> Self {
        Self { obstacles }
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }
}

impl CollisionModel for ObstacleCollisionModel {
    fn footprint_in_collision(
        &self,
        pose: &PoseSE2,
        footprint: &FootprintPolygon,
        inscribed_radius: f64,
        circumscribed_radius: f64,
    ) -> bool {
        if self.obstacles.is_empty() || footprint.is_empty() {
            return false;
        }
        let world = footprint.transformed(pose);
        for obstacle in &self.obstacles {
            let center_dist = obstacle.min_distance(&pose.position);
            if inscribed_radius > 0.0 && center_dist < inscribed_radius {
                return true;
            }
            if circumscribed_radius > 0.0 && center_dist > circumscribed_radius {
                continue;
            }
            if obstacle.collides_with_polygon(&world) {
                return true;
            }
        }
        false
    }
}

/// Sweep the footprint along the leading trajectory poses.
///
/// Returns `true` when the swept prefix is collision-free and `false`
/// as soon as a collision is found. `look_ahead` bounds the number of
/// poses tested from index 0; `None` (or any value past the end, which
/// is clamped) sweeps the whole trajectory.
pub fn sweep_is_collision_free(
    trajectory: &Trajectory,
    model: &dyn CollisionModel,
    footprint: &FootprintPolygon,
    inscribed_radius: f64,
    circumscribed_radius: f64,
    look_ahead: Option<usize>,
) -> bool {
    let count = match look_ahead {
        Some(n) => n.min(trajectory.len()),
        None => trajectory.len(),
    };
    for point in &trajectory.points()[..count] {
        if model.footprint_in_collision(
            &point.pose,
            footprint,
            inscribed_radius,
            circumscribed_radius,
        ) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambler_core::pose::Velocity;

    use crate::trajectory::TrajectoryPoint;

    fn line_trajectory() -> Trajectory {
        Trajectory::from_points(
            (0..10)
                .map(|i| {
                    TrajectoryPoint::new(
                        PoseSE2::new(i as f64 * 0.5, 0.0, 0.0),
                        Velocity::zero(),
                        i as f64 * 0.5,
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_free_space_is_collision_free() {
        let model = ObstacleCollisionModel::new(vec![]);
        let footprint = FootprintPolygon::square(0.2);
        assert!(sweep_is_collision_free(
            &line_trajectory(),
            &model,
            &footprint,
            0.0,
            0.0,
            None
        ));
    }

    #[test]
    fn test_obstacle_on_path_is_detected() {
        let model = ObstacleCollisionModel::new(vec![Obstacle::point(2.0, 0.0)]);
        let footprint = FootprintPolygon::square(0.2);
        assert!(!sweep_is_collision_free(
            &line_trajectory(),
            &model,
            &footprint,
            0.0,
            0.0,
            None
        ));
    }

    #[test]
    fn test_look_ahead_bounds_the_sweep() {
        // Obstacle sits at x = 4.0, which is pose index 8
        let model = ObstacleCollisionModel::new(vec![Obstacle::point(4.0, 0.0)]);
        let footprint = FootprintPolygon::square(0.2);
        let traj = line_trajectory();

        assert!(sweep_is_collision_free(&traj, &model, &footprint, 0.0, 0.0, Some(5)));
        assert!(!sweep_is_collision_free(&traj, &model, &footprint, 0.0, 0.0, Some(10)));
    }

    #[test]
    fn test_look_ahead_beyond_length_equals_full_sweep() {
        let model = ObstacleCollisionModel::new(vec![Obstacle::point(4.0, 0.0)]);
        let footprint = FootprintPolygon::square(0.2);
        let traj = line_trajectory();

        let clamped = sweep_is_collision_free(&traj, &model, &footprint, 0.0, 0.0, Some(1000));
        let full = sweep_is_collision_free(&traj, &model, &footprint, 0.0, 0.0, None);
        assert_eq!(clamped, full);
    }

    #[test]
    fn test_inscribed_radius_shortcut() {
        let model = ObstacleCollisionModel::new(vec![Obstacle::point(0.05, 0.0)]);
        let footprint = FootprintPolygon::square(0.2);
        let traj = line_trajectory();
        assert!(!sweep_is_collision_free(&traj, &model, &footprint, 0.3, 0.0, Some(1)));
    }
}
