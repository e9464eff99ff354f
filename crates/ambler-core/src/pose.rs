//! SE(2) poses and planar velocities
//!
//! The pose type carries a 2D position plus a heading angle kept
//! normalized to (-pi, pi]. All planner trajectories and requests are
//! expressed in these types.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::math::{average_angle, interpolate_angle, normalize_angle};
use crate::Point2;

/// A pose in SE(2): planar position plus heading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseSE2 {
    /// Position in the planning frame [m]
    pub position: Point2,
    /// Heading angle, normalized to (-pi, pi] [rad]
    pub theta: f64,
}

impl PoseSE2 {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self {
            position: Vector2::new(x, y),
            theta: normalize_angle(theta),
        }
    }

    pub fn from_position(position: Point2, theta: f64) -> Self {
        Self {
            position,
            theta: normalize_angle(theta),
        }
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    /// Unit vector pointing along the heading
    pub fn orientation_unit(&self) -> Point2 {
        Vector2::new(self.theta.cos(), self.theta.sin())
    }

    /// Euclidean distance between the positions of two poses
    pub fn distance(&self, other: &PoseSE2) -> f64 {
        (self.position - other.position).norm()
    }

    /// Midpose of two poses (positions averaged, angles on the circle)
    pub fn average(a: &PoseSE2, b: &PoseSE2) -> PoseSE2 {
        PoseSE2 {
            position: (a.position + b.position) * 0.5,
            theta: average_angle(a.theta, b.theta),
        }
    }

    /// Interpolate between two poses; alpha in [0, 1]
    pub fn lerp(&self, other: &PoseSE2, alpha: f64) -> PoseSE2 {
        PoseSE2 {
            position: self.position.lerp(&other.position, alpha),
            theta: interpolate_angle(self.theta, other.theta, alpha),
        }
    }

    /// All components finite
    pub fn is_finite(&self) -> bool {
        self.position.x.is_finite() && self.position.y.is_finite() && self.theta.is_finite()
    }
}

/// Planar velocity: translational along the heading plus rotational
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    /// Translational velocity [m/s], negative when driving backwards
    pub linear: f64,
    /// Rotational velocity [rad/s]
    pub angular: f64,
}

impl Velocity {
    pub fn new(linear: f64, angular: f64) -> Self {
        Self { linear, angular }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_finite(&self) -> bool {
        self.linear.is_finite() && self.angular.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_pose_normalizes_heading() {
        let pose = PoseSE2::new(1.0, 2.0, 3.0 * PI);
        assert_relative_eq!(pose.theta, PI);
    }

    #[test]
    fn test_pose_average() {
        let a = PoseSE2::new(0.0, 0.0, 0.0);
        let b = PoseSE2::new(2.0, 2.0, PI / 2.0);
        let mid = PoseSE2::average(&a, &b);
        assert_relative_eq!(mid.x(), 1.0);
        assert_relative_eq!(mid.y(), 1.0);
        assert_relative_eq!(mid.theta, PI / 4.0);
    }

    #[test]
    fn test_pose_lerp_heading_shorter_arc() {
        let a = PoseSE2::new(0.0, 0.0, 0.9 * PI);
        let b = PoseSE2::new(0.0, 0.0, -0.9 * PI);
        let mid = a.lerp(&b, 0.5);
        assert!(mid.theta.abs() > 0.9 * PI);
    }

    #[test]
    fn test_velocity_finite() {
        assert!(Velocity::new(0.1, -0.2).is_finite());
        assert!(!Velocity::new(f64::NAN, 0.0).is_finite());
    }
}
