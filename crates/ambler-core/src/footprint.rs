//! Robot footprint polygons
//!
//! The footprint is a closed polygon given in the robot frame. The host
//! supplies it per planning cycle; the feasibility layer sweeps it along
//! trajectory poses and tests it against obstacles.

use serde::{Deserialize, Serialize};

use crate::math::{distance_point_to_segment, segments_intersect};
use crate::pose::PoseSE2;
use crate::Point2;

/// Closed polygon in the robot frame (vertices in order, implicit closing edge)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootprintPolygon {
    vertices: Vec<Point2>,
}

impl FootprintPolygon {
    /// Build a footprint from robot-frame vertices.
    ///
    /// At least three vertices are expected for a meaningful polygon;
    /// fewer are kept as-is and degrade to point/segment tests.
    pub fn new(vertices: Vec<Point2>) -> Self {
        Self { vertices }
    }

    /// Axis-aligned square footprint of the given half-width
    pub fn square(half_width: f64) -> Self {
        Self::new(vec![
            Point2::new(-half_width, -half_width),
            Point2::new(half_width, -half_width),
            Point2::new(half_width, half_width),
            Point2::new(-half_width, half_width),
        ])
    }

    /// Regular polygon approximating a disc of the given radius
    pub fn disc(radius: f64, segments: usize) -> Self {
        let n = segments.max(3);
        let vertices = (0..n)
            .map(|i| {
                let angle = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                Point2::new(radius * angle.cos(), radius * angle.sin())
            })
            .collect();
        Self::new(vertices)
    }

    pub fn vertices(&self) -> &[Point2] {
        &self.vertices
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Radius of the smallest origin-centered circle containing all vertices
    pub fn circumscribed_radius(&self) -> f64 {
        self.vertices
            .iter()
            .map(|v| v.norm())
            .fold(0.0, f64::max)
    }

    /// Vertices transformed into the world frame at the given pose
    pub fn transformed(&self, pose: &PoseSE2) -> Vec<Point2> {
        let (sin, cos) = pose.theta.sin_cos();
        self.vertices
            .iter()
            .map(|v| {
                Point2::new(
                    pose.x() + cos * v.x - sin * v.y,
                    pose.y() + sin * v.x + cos * v.y,
                )
            })
            .collect()
    }
}

/// Even-odd test for a point against a closed polygon
pub fn point_in_polygon(point: &Point2, polygon: &[Point2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let pi = &polygon[i];
        let pj = &polygon[j];
        if ((pi.y > point.y) != (pj.y > point.y))
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Minimum distance from a point to a polygon boundary (0 inside)
pub fn distance_point_to_polygon(point: &Point2, polygon: &[Point2]) -> f64 {
    match polygon.len() {
        0 => f64::INFINITY,
        1 => (point - polygon[0]).norm(),
        _ => {
            if point_in_polygon(point, polygon) {
                return 0.0;
            }
            let mut min_dist = f64::INFINITY;
            for i in 0..polygon.len() {
                let j = (i + 1) % polygon.len();
                min_dist = min_dist.min(distance_point_to_segment(point, &polygon[i], &polygon[j]));
            }
            min_dist
        }
    }
}

/// Test whether a segment touches or crosses a polygon
pub fn segment_intersects_polygon(a: &Point2, b: &Point2, polygon: &[Point2]) -> bool {
    if polygon.len() >= 3 && (point_in_polygon(a, polygon) || point_in_polygon(b, polygon)) {
        return true;
    }
    for i in 0..polygon.len() {
        let j = (i + 1) % polygon.len();
        if segments_intersect(a, b, &polygon[i], &polygon[j]) {
            return true;
        }
    }
    false
}

/// Test whether two polygons overlap (edge crossing or containment)
pub fn polygons_overlap(a: &[Point2], b: &[Point2]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    for i in 0..a.len() {
        let j = (i + 1) % a.len();
        if segment_intersects_polygon(&a[i], &a[j], b) {
            return true;
        }
    }
    // b entirely inside a
    a.len() >= 3 && b.iter().all(|p| point_in_polygon(p, a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_in_square() {
        let square = FootprintPolygon::square(1.0);
        assert!(point_in_polygon(&Point2::new(0.0, 0.0), square.vertices()));
        assert!(!point_in_polygon(&Point2::new(2.0, 0.0), square.vertices()));
    }

    #[test]
    fn test_transformed_rotates_and_translates() {
        let square = FootprintPolygon::square(1.0);
        let pose = PoseSE2::new(5.0, 0.0, std::f64::consts::FRAC_PI_2);
        let world = square.transformed(&pose);
        // Robot-frame (1, -1) maps to world (6, 1) after a 90 degree turn
        assert_relative_eq!(world[1].x, 6.0, epsilon = 1e-12);
        assert_relative_eq!(world[1].y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_polygon_overlap() {
        let a = FootprintPolygon::square(1.0);
        let mut b = a.transformed(&PoseSE2::new(1.5, 0.0, 0.0));
        assert!(polygons_overlap(a.vertices(), &b));

        b = a.transformed(&PoseSE2::new(5.0, 0.0, 0.0));
        assert!(!polygons_overlap(a.vertices(), &b));
    }

    #[test]
    fn test_containment_counts_as_overlap() {
        let outer = FootprintPolygon::square(2.0);
        let inner = FootprintPolygon::square(0.5);
        assert!(polygons_overlap(outer.vertices(), inner.vertices()));
        assert!(polygons_overlap(inner.vertices(), outer.vertices()));
    }

    #[test]
    fn test_circumscribed_radius() {
        let square = FootprintPolygon::square(1.0);
        assert_relative_eq!(square.circumscribed_radius(), 2.0_f64.sqrt());
    }
}
