//! Geometry of a single cluster: the oriented minimum-area box around its pixels, a
//! straight line fitted through them, and where that line crosses the box.
//!
//! All points use image coordinates: `x` is the pixel column and `y` is the pixel row,
//! so "top" means smaller `y`.
use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;

use super::constants::INTERSECTION_ROUNDING_DIGITS;
use super::error::GeometryError;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point at the center of pixel (row, col)
    pub fn from_pixel(row: usize, col: usize) -> Self {
        Self {
            x: col as f64,
            y: row as f64,
        }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Lexicographic order, x first
    fn lex_cmp(&self, other: &Point) -> Ordering {
        self.x
            .total_cmp(&other.x)
            .then_with(|| self.y.total_cmp(&other.y))
    }
}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.x)?;
        tuple.serialize_element(&self.y)?;
        tuple.end()
    }
}

/// Order the four corners of a box as [top-left, top-right, bottom-right, bottom-left].
///
/// The two smallest-x points form the left side, split into TL/BL by y. Of the two
/// remaining points the one farther from TL is BR. Requires four distinct points.
pub fn order_points(points: &[Point]) -> Result<[Point; 4], GeometryError> {
    if points.len() != 4 {
        return Err(GeometryError::BadPointCount(points.len()));
    }
    for (idx, point) in points.iter().enumerate() {
        if points[idx + 1..].iter().any(|other| other == point) {
            return Err(GeometryError::DegenerateBox);
        }
    }

    let mut x_sorted = [points[0], points[1], points[2], points[3]];
    x_sorted.sort_by(|a, b| a.lex_cmp(b));

    let (mut tl, mut bl) = (x_sorted[0], x_sorted[1]);
    if bl.y.total_cmp(&tl.y).then_with(|| bl.x.total_cmp(&tl.x)) == Ordering::Less {
        std::mem::swap(&mut tl, &mut bl);
    }

    let (first, second) = (x_sorted[2], x_sorted[3]);
    let first_is_br = match tl.distance(&first).total_cmp(&tl.distance(&second)) {
        Ordering::Greater => true,
        Ordering::Less => false,
        // Equidistant; take the lower one as bottom
        Ordering::Equal => first.y > second.y,
    };
    let (tr, br) = if first_is_br {
        (second, first)
    } else {
        (first, second)
    };

    Ok([tl, tr, br, bl])
}

fn cross(o: &Point, a: &Point, b: &Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull by monotone chain. Collinear points are dropped; the hull starts at
/// the lexicographically smallest point.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.lex_cmp(b));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull: Vec<Point> = Vec::with_capacity(sorted.len() * 2);
    for point in sorted.iter() {
        while hull.len() >= 2 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], point) <= 0.0 {
            hull.pop();
        }
        hull.push(*point);
    }
    let lower_len = hull.len() + 1;
    for point in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], point) <= 0.0
        {
            hull.pop();
        }
        hull.push(*point);
    }
    hull.pop();
    hull
}

/// Minimum-area rectangle (at any rotation) enclosing the points. Corners are returned
/// in traversal order, not [TL, TR, BR, BL].
///
/// One of the rectangle's sides is always collinear with a hull edge, so only the hull
/// edge directions need testing. Fewer than three non-collinear points give a
/// rectangle with zero width whose corners coincide pairwise.
pub fn min_area_rect(points: &[Point]) -> Result<[Point; 4], GeometryError> {
    let hull = convex_hull(points);
    match hull.len() {
        0 => return Err(GeometryError::NoPoints),
        1 => return Ok([hull[0]; 4]),
        2 => return Ok([hull[0], hull[1], hull[1], hull[0]]),
        _ => (),
    }

    let mut best_area = f64::INFINITY;
    let mut best = [Point::default(); 4];
    for idx in 0..hull.len() {
        let start = hull[idx];
        let end = hull[(idx + 1) % hull.len()];
        let length = start.distance(&end);
        if length == 0.0 {
            continue;
        }
        // Unit vectors along and normal to the edge
        let (ux, uy) = ((end.x - start.x) / length, (end.y - start.y) / length);
        let (vx, vy) = (-uy, ux);

        let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
        for point in hull.iter() {
            let (dx, dy) = (point.x - start.x, point.y - start.y);
            let u = dx * ux + dy * uy;
            let v = dx * vx + dy * vy;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let area = (max_u - min_u) * (max_v - min_v);
        if area < best_area {
            best_area = area;
            let corner = |u: f64, v: f64| {
                Point::new(start.x + u * ux + v * vx, start.y + u * uy + v * vy)
            };
            best = [
                corner(min_u, min_v),
                corner(max_u, min_v),
                corner(max_u, max_v),
                corner(min_u, max_v),
            ];
        }
    }
    Ok(best)
}

/// Minimum-area box around a set of pixel centers, ordered [TL, TR, BR, BL]
pub fn min_area_box(points: &[Point]) -> Result<[Point; 4], GeometryError> {
    order_points(&min_area_rect(points)?)
}

/// Least-squares fit of `y = slope * x + intercept` (vertical residuals).
///
/// In image coordinates this regresses row on column, the same frame the box corners
/// are expressed in. Fails if every point shares one x, where no finite slope exists.
pub fn line_fit(points: &[Point]) -> Result<(f64, f64), GeometryError> {
    if points.is_empty() {
        return Err(GeometryError::NoPoints);
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for point in points.iter() {
        let dx = point.x - mean_x;
        sxx += dx * dx;
        sxy += dx * (point.y - mean_y);
    }
    if sxx <= f64::EPSILON * n {
        return Err(GeometryError::VerticalFit(points.len()));
    }

    let slope = sxy / sxx;
    Ok((slope, mean_y - slope * mean_x))
}

fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

/// Check if val lies between a and b (inclusive, either order) after rounding
fn is_between_scalar(a: f64, b: f64, val: f64) -> bool {
    let a = round_to(a, INTERSECTION_ROUNDING_DIGITS);
    let b = round_to(b, INTERSECTION_ROUNDING_DIGITS);
    let val = round_to(val, INTERSECTION_ROUNDING_DIGITS);
    a.min(b) <= val && val <= a.max(b)
}

/// Check if point p lies within the rectangle spanned by a and b
pub fn is_between(p: &Point, a: &Point, b: &Point) -> bool {
    is_between_scalar(a.x, b.x, p.x) && is_between_scalar(a.y, b.y, p.y)
}

/// Slope/intercept form of the line through a segment
#[derive(Debug, Clone, Copy, PartialEq)]
enum SegmentLine {
    Vertical(f64),
    Sloped { slope: f64, intercept: f64 },
}

impl SegmentLine {
    fn through(a: &Point, b: &Point) -> Self {
        if b.x - a.x == 0.0 {
            return SegmentLine::Vertical(a.x);
        }
        let slope = (b.y - a.y) / (b.x - a.x);
        SegmentLine::Sloped {
            slope,
            intercept: a.y - slope * a.x,
        }
    }
}

/// Intersection of the segment a-b with the line `y = slope * x + intercept`.
///
/// For a vertical segment the line is evaluated at the segment's x; the caller bounds
/// y (see `intersections_with_box`). A non-vertical segment parallel to the line never
/// intersects it. Otherwise the crossing point is returned only if it lies within the
/// segment's extent, compared at 4 decimal places.
pub fn line_intersect(a: &Point, b: &Point, slope: f64, intercept: f64) -> Option<Point> {
    match SegmentLine::through(a, b) {
        SegmentLine::Vertical(x) => Some(Point::new(x, slope * x + intercept)),
        SegmentLine::Sloped {
            slope: seg_slope,
            intercept: seg_intercept,
        } => {
            if slope - seg_slope == 0.0 {
                return None;
            }
            let x = (seg_intercept - intercept) / (slope - seg_slope);
            let point = Point::new(x, slope * x + intercept);
            if is_between(&point, a, b) {
                Some(point)
            } else {
                None
            }
        }
    }
}

/// Points where the line `y = slope * x + intercept` crosses the edges of an ordered box.
///
/// Edges are tested TL-TR, TR-BR, BR-BL, BL-TL and a hit is kept only if it lies on the
/// tested edge. A line through a corner is found on both edges sharing it; when more
/// than two hits remain, the pair farthest apart is kept. Ties go to the first pair in
/// lexicographic (x, then y) order.
pub fn intersections_with_box(corners: &[Point; 4], slope: f64, intercept: f64) -> Vec<Point> {
    let mut intersections: Vec<Point> = (0..4)
        .filter_map(|idx| {
            let (a, b) = (&corners[idx], &corners[(idx + 1) % 4]);
            line_intersect(a, b, slope, intercept).filter(|p| is_between(p, a, b))
        })
        .collect();

    if intersections.len() > 2 {
        intersections.sort_by(|a, b| a.lex_cmp(b));
        let mut best = (0, 1);
        let mut best_distance = f64::NEG_INFINITY;
        for i in 0..intersections.len() {
            for j in (i + 1)..intersections.len() {
                let distance = intersections[i].distance(&intersections[j]);
                if distance > best_distance {
                    best_distance = distance;
                    best = (i, j);
                }
            }
        }
        intersections = vec![intersections[best.0], intersections[best.1]];
    }

    intersections
}

/// Track length is only defined when the line crosses the box exactly twice
pub fn track_length(intersections: &[Point]) -> Option<f64> {
    match intersections {
        [first, second] => Some(first.distance(second)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn permutations(points: &[Point; 4]) -> Vec<[Point; 4]> {
        let mut result = Vec::new();
        for a in 0..4 {
            for b in 0..4 {
                for c in 0..4 {
                    for d in 0..4 {
                        let idx = [a, b, c, d];
                        let mut seen = [false; 4];
                        idx.iter().for_each(|i| seen[*i] = true);
                        if seen.iter().all(|s| *s) {
                            result.push([points[a], points[b], points[c], points[d]]);
                        }
                    }
                }
            }
        }
        result
    }

    #[test]
    fn test_order_points_axis_aligned() {
        let expected = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(0.0, 5.0),
        ];
        let perms = permutations(&expected);
        assert_eq!(perms.len(), 24);
        for perm in perms.iter() {
            let ordered = order_points(perm).unwrap();
            assert_eq!(ordered, expected);
            assert_eq!(order_points(&ordered).unwrap(), ordered);
        }
    }

    #[test]
    fn test_order_points_rotated() {
        let expected = [
            Point::new(2.0, 0.0),
            Point::new(8.0, 6.0),
            Point::new(6.0, 8.0),
            Point::new(0.0, 2.0),
        ];
        for perm in permutations(&expected).iter() {
            let ordered = order_points(perm).unwrap();
            assert_eq!(ordered, expected);
            assert_eq!(order_points(&ordered).unwrap(), ordered);
        }
    }

    #[test]
    fn test_order_points_diamond() {
        let expected = [
            Point::new(5.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(5.0, 10.0),
            Point::new(0.0, 5.0),
        ];
        for perm in permutations(&expected).iter() {
            assert_eq!(order_points(perm).unwrap(), expected);
        }
    }

    #[test]
    fn test_order_points_requires_four_distinct() {
        let three = [Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)];
        assert_eq!(order_points(&three), Err(GeometryError::BadPointCount(3)));
        let repeated = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(0.0, 0.0),
        ];
        assert_eq!(order_points(&repeated), Err(GeometryError::DegenerateBox));
    }

    #[test]
    fn test_vertical_segment_intersection() {
        let hit = line_intersect(&Point::new(5.0, 0.0), &Point::new(5.0, 10.0), 2.0, 1.0);
        assert_eq!(hit, Some(Point::new(5.0, 11.0)));
    }

    #[test]
    fn test_parallel_and_out_of_range() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 10.0);
        assert_eq!(line_intersect(&a, &b, 1.0, 3.0), None);
        // Crosses the supporting line at x = -1, outside the segment
        assert_eq!(line_intersect(&a, &b, -1.0, -2.0), None);
        let hit = line_intersect(&a, &b, -1.0, 10.0).unwrap();
        assert_relative_eq!(hit.x, 5.0);
        assert_relative_eq!(hit.y, 5.0);
    }

    #[test]
    fn test_rounding_tolerates_boundary_error() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(1.0, 0.0);
        // Crosses y = 0 at x just beyond 1.0 by floating point noise
        let slope = 1.0;
        let intercept = -1.0 - 1e-9;
        assert!(line_intersect(&a, &b, slope, intercept).is_some());
    }

    #[test]
    fn test_intersections_with_square() {
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        let hits = intersections_with_box(&corners, 1.0, 0.0);
        assert_eq!(hits, vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)]);
        assert_relative_eq!(track_length(&hits).unwrap(), 200f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(track_length(&hits).unwrap(), 14.142, epsilon = 1e-3);
    }

    #[test]
    fn test_vertical_edges_are_bounded() {
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        // Crosses the left edge at (0, 1) and the bottom edge at (4.5, 10); the right
        // edge would be hit at (10, 21), beyond the box
        let hits = intersections_with_box(&corners, 2.0, 1.0);
        assert_eq!(hits.len(), 2);
        assert_relative_eq!(hits[0].x, 4.5);
        assert_relative_eq!(hits[0].y, 10.0);
        assert_eq!(hits[1], Point::new(0.0, 1.0));
    }

    #[test]
    fn test_line_missing_box() {
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        let hits = intersections_with_box(&corners, 0.0, 20.0);
        assert!(hits.is_empty());
        assert_eq!(track_length(&hits), None);
    }

    #[test]
    fn test_min_area_box_axis_aligned() {
        let mut points = Vec::new();
        for row in 3..6 {
            for col in 10..20 {
                points.push(Point::from_pixel(row, col));
            }
        }
        let corners = min_area_box(&points).unwrap();
        let expected = [
            Point::new(10.0, 3.0),
            Point::new(19.0, 3.0),
            Point::new(19.0, 5.0),
            Point::new(10.0, 5.0),
        ];
        for (corner, exp) in corners.iter().zip(expected.iter()) {
            assert_relative_eq!(corner.x, exp.x, epsilon = 1e-9);
            assert_relative_eq!(corner.y, exp.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_min_area_box_rotated() {
        // A 45 degree band two pixels thick
        let mut points = Vec::new();
        for i in 0..8 {
            points.push(Point::from_pixel(i, i));
            points.push(Point::from_pixel(i, i + 1));
        }
        let corners = min_area_box(&points).unwrap();
        let width = corners[0].distance(&corners[1]);
        let height = corners[1].distance(&corners[2]);
        // The axis-aligned box would have area 7 * 8 = 56
        assert!(width * height < 10.0, "area was {}", width * height);
        let long_side = width.max(height);
        assert_relative_eq!(long_side, 7.5 * 2f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_min_area_box_degenerate() {
        let single = [Point::from_pixel(4, 4)];
        assert_eq!(min_area_box(&single), Err(GeometryError::DegenerateBox));
        let line: Vec<Point> = (0..5).map(|c| Point::from_pixel(2, c)).collect();
        assert_eq!(min_area_box(&line), Err(GeometryError::DegenerateBox));
        assert_eq!(min_area_box(&[]), Err(GeometryError::NoPoints));
    }

    #[test]
    fn test_convex_hull() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
            Point::new(1.0, 0.0),
        ];
        let hull = convex_hull(&points);
        assert_eq!(
            hull,
            vec![
                Point::new(0.0, 0.0),
                Point::new(2.0, 0.0),
                Point::new(2.0, 2.0),
                Point::new(0.0, 2.0),
            ]
        );
    }

    #[test]
    fn test_line_fit() {
        let points: Vec<Point> = (0..10)
            .map(|x| Point::new(x as f64, 0.5 * x as f64 + 3.0))
            .collect();
        let (slope, intercept) = line_fit(&points).unwrap();
        assert_relative_eq!(slope, 0.5, epsilon = 1e-12);
        assert_relative_eq!(intercept, 3.0, epsilon = 1e-12);

        let vertical = [Point::new(4.0, 0.0), Point::new(4.0, 1.0)];
        assert_eq!(line_fit(&vertical), Err(GeometryError::VerticalFit(2)));
        assert_eq!(line_fit(&[]), Err(GeometryError::NoPoints));
    }

    #[test]
    fn test_point_serializes_as_pair() {
        let json = serde_json::to_string(&Point::new(1.5, 2.0)).unwrap();
        assert_eq!(json, "[1.5,2.0]");
    }
}
