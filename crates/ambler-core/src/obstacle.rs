//! Obstacle primitives
//!
//! Obstacles arrive from an external costmap-to-polygon conversion and
//! are consumed by the optimizer (clearance costs), the exploration
//! layer (corridor keypoints) and the feasibility sweep.

use serde::{Deserialize, Serialize};

use crate::footprint::{distance_point_to_polygon, point_in_polygon, segment_intersects_polygon};
use crate::math::{distance_point_to_segment, distance_segment_to_segment, segments_intersect};
use crate::Point2;

/// A static planar obstacle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Obstacle {
    /// A single occupied point (e.g. one costmap cell)
    Point { position: Point2 },
    /// A line segment (e.g. a wall section)
    Line { start: Point2, end: Point2 },
    /// A closed polygon (vertices in order, implicit closing edge)
    Polygon { vertices: Vec<Point2> },
}

impl Obstacle {
    pub fn point(x: f64, y: f64) -> Self {
        Obstacle::Point {
            position: Point2::new(x, y),
        }
    }

    pub fn line(start: Point2, end: Point2) -> Self {
        Obstacle::Line { start, end }
    }

    pub fn polygon(vertices: Vec<Point2>) -> Self {
        Obstacle::Polygon { vertices }
    }

    /// Representative position used for corridor exploration and signatures
    pub fn centroid(&self) -> Point2 {
        match self {
            Obstacle::Point { position } => *position,
            Obstacle::Line { start, end } => (start + end) * 0.5,
            Obstacle::Polygon { vertices } => {
                if vertices.is_empty() {
                    Point2::new(0.0, 0.0)
                } else {
                    vertices.iter().sum::<Point2>() / vertices.len() as f64
                }
            }
        }
    }

    /// Minimum distance from a point to the obstacle (0 when inside)
    pub fn min_distance(&self, point: &Point2) -> f64 {
        match self {
            Obstacle::Point { position } => (point - position).norm(),
            Obstacle::Line { start, end } => distance_point_to_segment(point, start, end),
            Obstacle::Polygon { vertices } => distance_point_to_polygon(point, vertices),
        }
    }

    /// Minimum distance from a segment to the obstacle (0 on contact)
    pub fn min_distance_to_segment(&self, a: &Point2, b: &Point2) -> f64 {
        match self {
            Obstacle::Point { position } => distance_point_to_segment(position, a, b),
            Obstacle::Line { start, end } => distance_segment_to_segment(a, b, start, end),
            Obstacle::Polygon { vertices } => {
                if segment_intersects_polygon(a, b, vertices) {
                    return 0.0;
                }
                let mut min_dist = f64::INFINITY;
                for i in 0..vertices.len() {
                    let j = (i + 1) % vertices.len();
                    min_dist =
                        min_dist.min(distance_segment_to_segment(a, b, &vertices[i], &vertices[j]));
                }
                min_dist
            }
        }
    }

    /// Test the obstacle against a world-frame footprint polygon
    pub fn collides_with_polygon(&self, polygon: &[Point2]) -> bool {
        match self {
            Obstacle::Point { position } => point_in_polygon(position, polygon),
            Obstacle::Line { start, end } => segment_intersects_polygon(start, end, polygon),
            Obstacle::Polygon { vertices } => {
                for i in 0..vertices.len() {
                    let j = (i + 1) % vertices.len();
                    if segment_intersects_polygon(&vertices[i], &vertices[j], polygon) {
                        return true;
                    }
                }
                // Either polygon fully containing the other
                vertices.iter().any(|v| point_in_polygon(v, polygon))
                    || polygon.iter().any(|p| point_in_polygon(p, vertices))
            }
        }
    }

    /// Test whether a segment passes through the obstacle with less than
    /// the given clearance
    pub fn blocks_segment(&self, a: &Point2, b: &Point2, clearance: f64) -> bool {
        match self {
            Obstacle::Line { start, end } if clearance <= 0.0 => {
                segments_intersect(a, b, start, end)
            }
            _ => self.min_distance_to_segment(a, b) < clearance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_obstacle_distance() {
        let obs = Obstacle::point(1.0, 0.0);
        assert_relative_eq!(obs.min_distance(&Point2::new(0.0, 0.0)), 1.0);
    }

    #[test]
    fn test_line_obstacle_distance() {
        let obs = Obstacle::line(Point2::new(0.0, 1.0), Point2::new(2.0, 1.0));
        assert_relative_eq!(obs.min_distance(&Point2::new(1.0, 0.0)), 1.0);
    }

    #[test]
    fn test_polygon_obstacle_inside_is_zero() {
        let obs = Obstacle::polygon(vec![
            Point2::new(-1.0, -1.0),
            Point2::new(1.0, -1.0),
            Point2::new(1.0, 1.0),
            Point2::new(-1.0, 1.0),
        ]);
        assert_relative_eq!(obs.min_distance(&Point2::new(0.0, 0.0)), 0.0);
        assert_relative_eq!(obs.min_distance(&Point2::new(3.0, 0.0)), 2.0);
    }

    #[test]
    fn test_blocks_segment() {
        let obs = Obstacle::point(1.0, 0.1);
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(2.0, 0.0);
        assert!(obs.blocks_segment(&a, &b, 0.5));
        assert!(!obs.blocks_segment(&a, &b, 0.05));
    }

    #[test]
    fn test_footprint_collision() {
        let square = vec![
            Point2::new(-0.5, -0.5),
            Point2::new(0.5, -0.5),
            Point2::new(0.5, 0.5),
            Point2::new(-0.5, 0.5),
        ];
        assert!(Obstacle::point(0.2, 0.2).collides_with_polygon(&square));
        assert!(!Obstacle::point(2.0, 2.0).collides_with_polygon(&square));
        assert!(Obstacle::line(Point2::new(-1.0, 0.0), Point2::new(1.0, 0.0))
            .collides_with_polygon(&square));
    }
}
