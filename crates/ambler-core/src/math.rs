//! Angle and segment distance utilities
//!
//! Small helpers used by the pose types, the obstacle distance queries
//! and the planner's geometric reasoning.

use crate::Point2;

/// Normalize an angle to the interval (-pi, pi]
pub fn normalize_angle(angle: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    let mut a = angle % two_pi;
    if a <= -std::f64::consts::PI {
        a += two_pi;
    } else if a > std::f64::consts::PI {
        a -= two_pi;
    }
    a
}

/// Shortest signed angular distance from `from` to `to`
pub fn angle_diff(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}

/// Circular mean of two angles
pub fn average_angle(a: f64, b: f64) -> f64 {
    let x = a.cos() + b.cos();
    let y = a.sin() + b.sin();
    if x == 0.0 && y == 0.0 {
        // Antipodal pair, pick an arbitrary but deterministic representative
        normalize_angle(a + std::f64::consts::FRAC_PI_2)
    } else {
        y.atan2(x)
    }
}

/// Interpolate between two angles along the shorter arc
pub fn interpolate_angle(from: f64, to: f64, alpha: f64) -> f64 {
    normalize_angle(from + alpha * angle_diff(from, to))
}

/// Closest point on segment [a, b] to point p
pub fn closest_point_on_segment(p: &Point2, a: &Point2, b: &Point2) -> Point2 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < 1e-12 {
        return *a;
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Euclidean distance from point p to segment [a, b]
pub fn distance_point_to_segment(p: &Point2, a: &Point2, b: &Point2) -> f64 {
    (p - closest_point_on_segment(p, a, b)).norm()
}

/// Minimum distance between segments [a1, a2] and [b1, b2]
pub fn distance_segment_to_segment(a1: &Point2, a2: &Point2, b1: &Point2, b2: &Point2) -> f64 {
    if segments_intersect(a1, a2, b1, b2) {
        return 0.0;
    }
    distance_point_to_segment(a1, b1, b2)
        .min(distance_point_to_segment(a2, b1, b2))
        .min(distance_point_to_segment(b1, a1, a2))
        .min(distance_point_to_segment(b2, a1, a2))
}

/// Test whether segments [a1, a2] and [b1, b2] intersect (endpoints included)
pub fn segments_intersect(a1: &Point2, a2: &Point2, b1: &Point2, b2: &Point2) -> bool {
    let d1 = cross_2d(&(a2 - a1), &(b1 - a1));
    let d2 = cross_2d(&(a2 - a1), &(b2 - a1));
    let d3 = cross_2d(&(b2 - b1), &(a1 - b1));
    let d4 = cross_2d(&(b2 - b1), &(a2 - b1));

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    // Collinear touching cases
    (d1 == 0.0 && on_segment(a1, a2, b1))
        || (d2 == 0.0 && on_segment(a1, a2, b2))
        || (d3 == 0.0 && on_segment(b1, b2, a1))
        || (d4 == 0.0 && on_segment(b1, b2, a2))
}

/// z-component of the 2D cross product
pub fn cross_2d(a: &Point2, b: &Point2) -> f64 {
    a.x * b.y - a.y * b.x
}

fn on_segment(a: &Point2, b: &Point2, p: &Point2) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}
