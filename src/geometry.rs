use geo::{Area, BoundingRect, Intersects, MapCoords, Rotate, Translate};
use geo_clipper::{Clipper, EndType, JoinType};
use geo_types::{Coord, Line, LineString, MultiPolygon, Point, Polygon, Rect};

/// Bounding box of a polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// True if the box lies inside `[0, width] x [0, height]`.
    pub fn inside(&self, width: f64, height: f64) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.max_x() <= width && self.max_y() <= height
    }
}

impl From<Rect<f64>> for Bounds {
    fn from(rect: Rect<f64>) -> Self {
        Self {
            x: rect.min().x,
            y: rect.min().y,
            width: rect.width(),
            height: rect.height(),
        }
    }
}

/// Default scale factor used when interfacing with Clipper
pub const CLIPPER_SCALE: f64 = 10_000_000.0;

/// Miter limit for gap buffers, as a multiple of the offset distance.
pub const MITER_LIMIT: f64 = 2.0;

/// Build a polygon from pixel points, dropping repeated consecutive points.
pub fn polygon_from_points(points: &[(f64, f64)]) -> Polygon<f64> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(points.len());
    for &(x, y) in points {
        let c = Coord { x, y };
        if coords.last() != Some(&c) {
            coords.push(c);
        }
    }
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    Polygon::new(LineString::from(coords), vec![])
}

/// Number of distinct vertices of the exterior ring.
pub fn vertex_count(poly: &Polygon<f64>) -> usize {
    let ring = &poly.exterior().0;
    match ring.len() {
        0 => 0,
        n if ring.first() == ring.last() => n - 1,
        n => n,
    }
}

/// Calculate the rectangular bounds of the polygon.
/// Returns `None` if there are fewer than 3 vertices.
pub fn polygon_bounds(poly: &Polygon<f64>) -> Option<Bounds> {
    if vertex_count(poly) < 3 {
        return None;
    }
    poly.bounding_rect().map(Bounds::from)
}

pub fn multi_bounds(mp: &MultiPolygon<f64>) -> Option<Bounds> {
    mp.bounding_rect().map(Bounds::from)
}

/// Rotate polygon by `angle_deg` around `center`, counter-clockwise in
/// y-up coordinates (clockwise on screen).
pub fn rotate_about(poly: &Polygon<f64>, angle_deg: f64, center: Coord<f64>) -> Polygon<f64> {
    poly.rotate_around_point(angle_deg, Point::from(center))
}

/// Translate the polygon so the minimum corner of its bounding box is the origin.
pub fn normalize_to_origin(poly: &Polygon<f64>) -> Polygon<f64> {
    match poly.bounding_rect() {
        Some(rect) => poly.translate(-rect.min().x, -rect.min().y),
        None => poly.clone(),
    }
}

pub fn scale_polygon(poly: &Polygon<f64>, sx: f64, sy: f64) -> Polygon<f64> {
    poly.map_coords(|c| Coord {
        x: c.x * sx,
        y: c.y * sy,
    })
}

/// Expand the polygon outward by `delta` with mitred corners.
/// A non-positive delta returns the polygon unchanged.
pub fn inflate(poly: &Polygon<f64>, delta: f64) -> MultiPolygon<f64> {
    if delta <= 0.0 {
        return MultiPolygon(vec![poly.clone()]);
    }
    poly.offset(
        delta,
        JoinType::Miter(MITER_LIMIT),
        EndType::ClosedPolygon,
        CLIPPER_SCALE,
    )
}

/// Union of an accumulated region with another one.
pub fn merge(acc: &MultiPolygon<f64>, other: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    if acc.0.is_empty() {
        return other.clone();
    }
    if other.0.is_empty() {
        return acc.clone();
    }
    Clipper::union(acc, other, CLIPPER_SCALE)
}

/// True if no two non-adjacent edges of the exterior ring touch and the
/// enclosed area is positive.
pub fn is_simple(poly: &Polygon<f64>) -> bool {
    let n = vertex_count(poly);
    if n < 3 || poly.unsigned_area() <= 0.0 {
        return false;
    }
    let ring = &poly.exterior().0;
    let edges: Vec<Line<f64>> = ring.windows(2).map(|w| Line::new(w[0], w[1])).collect();
    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if edges[i].intersects(&edges[j]) {
                return false;
            }
        }
    }
    true
}

/// Zero-distance buffer: resolves self intersections and keeps the largest
/// resulting piece. Returns `None` if nothing with positive area survives.
pub fn repair(poly: &Polygon<f64>) -> Option<Polygon<f64>> {
    let cleaned = poly.offset(
        0.0,
        JoinType::Miter(MITER_LIMIT),
        EndType::ClosedPolygon,
        CLIPPER_SCALE,
    );
    cleaned
        .0
        .into_iter()
        .filter(|p| p.unsigned_area() > 0.0)
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Polygon<f64> {
        polygon_from_points(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])
    }

    #[test]
    fn area_of_square() {
        let pts = square();
        assert_eq!(pts.unsigned_area(), 1.0);
        let bounds = polygon_bounds(&pts).unwrap();
        assert_eq!(bounds.width, 1.0);
        assert_eq!(bounds.height, 1.0);
    }

    #[test]
    fn rotate_preserves_bounds() {
        let rotated = rotate_about(&square(), 90.0, Coord { x: 0.5, y: 0.5 });
        let b = polygon_bounds(&rotated).unwrap();
        assert!((b.width - 1.0).abs() < 1e-6);
        assert!((b.height - 1.0).abs() < 1e-6);
        assert!(b.x.abs() < 1e-6 && b.y.abs() < 1e-6);
    }

    #[test]
    fn negative_angle_turns_right_edge_upward_on_screen() {
        // a point right of the center ends up above it (smaller y) in image space
        let sliver = polygon_from_points(&[(2.0, 0.0), (2.1, 0.0), (2.1, 0.1)]);
        let rotated = rotate_about(&sliver, -90.0, Coord { x: 0.0, y: 0.0 });
        let b = polygon_bounds(&rotated).unwrap();
        assert!(b.y < -1.9 && b.x.abs() < 0.2);
    }

    #[test]
    fn normalize_moves_min_corner_to_origin() {
        let poly = polygon_from_points(&[(-5.0, 3.0), (5.0, 3.0), (0.0, 9.0)]);
        let b = polygon_bounds(&normalize_to_origin(&poly)).unwrap();
        assert_eq!((b.x, b.y, b.width, b.height), (0.0, 0.0, 10.0, 6.0));
    }

    #[test]
    fn inflate_grows_bounds_by_delta() {
        let grown = inflate(&scale_polygon(&square(), 10.0, 10.0), 2.0);
        let b = multi_bounds(&grown).unwrap();
        assert!((b.x + 2.0).abs() < 1e-6);
        assert!((b.width - 14.0).abs() < 1e-6);
        assert!(grown.unsigned_area() > 100.0);
    }

    #[test]
    fn zero_gap_leaves_polygon_untouched() {
        let grown = inflate(&square(), 0.0);
        assert_eq!(grown.0.len(), 1);
        assert_eq!(grown.0[0], square());
    }

    #[test]
    fn merge_keeps_disjoint_regions() {
        let a = MultiPolygon(vec![square()]);
        let b = MultiPolygon(vec![square().translate(5.0, 0.0)]);
        let merged = merge(&a, &b);
        assert_eq!(merged.0.len(), 2);
        assert!((merged.unsigned_area() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn bowtie_is_not_simple_and_repairs() {
        let bowtie = polygon_from_points(&[(0.0, 0.0), (4.0, 4.0), (4.0, 0.0), (0.0, 4.0)]);
        assert!(!is_simple(&bowtie));
        assert!(is_simple(&square()));
        let fixed = repair(&bowtie).unwrap();
        assert!(fixed.unsigned_area() > 0.0);
    }

    #[test]
    fn degenerate_polygon() {
        let line = polygon_from_points(&[(0.0, 0.0), (1.0, 0.0)]);
        assert!(polygon_bounds(&line).is_none());
        assert!(!is_simple(&line));
        assert_eq!(vertex_count(&line), 2);
    }
}
