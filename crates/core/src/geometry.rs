//! Pixel-space geometry kernel
//!
//! Lengths and areas of freehand paths drawn over a plan bitmap. All inputs
//! are display-pixel coordinates; scale conversion happens in
//! [`crate::calibration`].

/// Point in display-pixel space
///
/// - Origin (0, 0) at top-left of the plan bitmap
/// - X increases to the right
/// - Y increases downward
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    /// Create a new pixel point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another point
    pub fn distance_to(&self, other: &PixelPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(f64, f64)> for PixelPoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Euclidean distance between two points
pub fn distance(p1: PixelPoint, p2: PixelPoint) -> f64 {
    p1.distance_to(&p2)
}

/// Total length along the path, summed in point order.
///
/// Returns 0.0 for fewer than two points.
pub fn polyline_length(points: &[PixelPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points.windows(2).map(|w| distance(w[0], w[1])).sum()
}

/// Area enclosed by the points treated as a closed polygon (shoelace formula).
///
/// The last point implicitly connects back to the first, so an explicit
/// closing duplicate is optional. Returns 0.0 for fewer than three points.
pub fn polygon_area(points: &[PixelPoint]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y - points[i].y * points[j].x;
    }
    (0.5 * area).abs()
}

/// Copy of `points` with the first point appended when the ring is open
pub fn close_ring(points: &[PixelPoint]) -> Vec<PixelPoint> {
    let mut ring = points.to_vec();
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        if first != last {
            ring.push(*first);
        }
    }
    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f64, f64)]) -> Vec<PixelPoint> {
        raw.iter().copied().map(PixelPoint::from).collect()
    }

    fn unit_square() -> Vec<PixelPoint> {
        pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        for p in pts(&[(0.0, 0.0), (12.5, -3.0), (1e9, 1e-9)]) {
            assert_eq!(distance(p, p), 0.0);
        }
    }

    #[test]
    fn test_distance_pythagorean() {
        assert_eq!(distance(PixelPoint::new(0.0, 0.0), PixelPoint::new(30.0, 40.0)), 50.0);
    }

    #[test]
    fn test_polyline_length_follows_path() {
        // 3 along x then 4 along y, not the 5-long diagonal
        let path = pts(&[(0.0, 0.0), (3.0, 0.0), (3.0, 4.0)]);
        assert_eq!(polyline_length(&path), 7.0);
    }

    #[test]
    fn test_polyline_length_short_inputs() {
        assert_eq!(polyline_length(&[]), 0.0);
        assert_eq!(polyline_length(&pts(&[(5.0, 5.0)])), 0.0);
    }

    #[test]
    fn test_polygon_area_unit_square() {
        assert_eq!(polygon_area(&unit_square()), 1.0);
    }

    #[test]
    fn test_polygon_area_short_inputs() {
        assert_eq!(polygon_area(&[]), 0.0);
        assert_eq!(polygon_area(&pts(&[(0.0, 0.0), (10.0, 10.0)])), 0.0);
    }

    #[test]
    fn test_polygon_area_winding_independent() {
        let mut square = unit_square();
        square.reverse();
        assert_eq!(polygon_area(&square), 1.0);
    }

    #[test]
    fn test_polygon_area_cyclic_rotation() {
        let triangle = pts(&[(0.0, 0.0), (10.0, 0.0), (5.0, 10.0)]);
        let expected = polygon_area(&triangle);
        assert_eq!(expected, 50.0);

        for shift in 1..triangle.len() {
            let mut rotated = triangle.clone();
            rotated.rotate_left(shift);
            assert_eq!(polygon_area(&rotated), expected);
        }
    }

    #[test]
    fn test_polygon_area_explicit_closing_point() {
        let open = pts(&[(0.0, 0.0), (40.0, 0.0), (40.0, 25.0), (0.0, 25.0)]);
        let closed = close_ring(&open);

        assert_eq!(closed.len(), open.len() + 1);
        assert_eq!(polygon_area(&open), 1000.0);
        assert_eq!(polygon_area(&closed), polygon_area(&open));
    }

    #[test]
    fn test_close_ring_leaves_closed_path_alone() {
        let ring = pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        assert_eq!(close_ring(&ring), ring);
        assert!(close_ring(&[]).is_empty());
    }
}
