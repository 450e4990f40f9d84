//! Define a 2D ink point.
//! Points are the output of stroke capture and segmentation and are the only
//! input the matcher consumes: a shape is an ordered slice of them.
//!

use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal coordinate, in whatever units the capture device reports.
    pub x: f64,
    /// Vertical coordinate, same units as `x`.
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `other`.
    #[inline]
    pub fn distance_squared(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Direction of `other` as seen from this point, in `[0, 2π)`.
    ///
    /// Measured counter-clockwise from +X in the point's own coordinate frame.
    #[inline]
    pub fn angle_to(&self, other: &Point) -> f64 {
        let angle = (other.y - self.y).atan2(other.x - self.x);
        if angle < 0.0 {
            // atan2 can return -0.0 or tiny negatives that round up to TAU
            (angle + TAU) % TAU
        } else {
            angle
        }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

/// Arithmetic mean of `points`, or the origin for an empty slice.
pub fn centroid(points: &[Point]) -> Point {
    if points.is_empty() {
        return Point::default();
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

/// Mean Euclidean distance over all unordered point pairs.
///
/// Returns 0 for fewer than two points.
pub fn mean_pairwise_distance(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            sum += points[i].distance(&points[j]);
        }
    }
    sum / ((n * (n - 1)) / 2) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_quadrants() {
        let o = Point::new(0.0, 0.0);
        assert_eq!(o.angle_to(&Point::new(1.0, 0.0)), 0.0);
        assert!((o.angle_to(&Point::new(0.0, 1.0)) - TAU / 4.0).abs() < 1e-15);
        assert!((o.angle_to(&Point::new(-1.0, 0.0)) - TAU / 2.0).abs() < 1e-15);
        assert!((o.angle_to(&Point::new(0.0, -1.0)) - 0.75 * TAU).abs() < 1e-15);
        // Negative zero on the y axis must not wrap to TAU
        let a = o.angle_to(&Point::new(1.0, -0.0));
        assert!((0.0..TAU).contains(&a), "angle out of range: {}", a);
    }

    #[test]
    fn test_mean_pairwise_distance() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        let expected = (4.0 + 2.0 * 2.0_f64.sqrt()) / 6.0;
        assert!((mean_pairwise_distance(&square) - expected).abs() < 1e-12);
        assert_eq!(mean_pairwise_distance(&square[..1]), 0.0);
        assert_eq!(mean_pairwise_distance(&[]), 0.0);
    }

    #[test]
    fn test_centroid() {
        let pts = [
            Point::new(1000.0, 2000.0),
            Point::new(1040.0, 2000.0),
            Point::new(1040.0, 2010.0),
            Point::new(1000.0, 2010.0),
        ];
        assert_eq!(centroid(&pts), Point::new(1020.0, 2005.0));
        assert_eq!(centroid(&[]), Point::default());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Point::from((1.5, -2.0)), Point::new(1.5, -2.0));
        assert_eq!(Point::from([3.0, 4.0]).distance(&Point::default()), 5.0);
    }
}
