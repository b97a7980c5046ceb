//! Planar geometry predicates and measures.
//!
//! All computations treat coordinates as planar: no geodesic correction is
//! applied. This is accurate for small-extent regions in a projected
//! coordinate system (or mid-latitude lon/lat data of modest extent) and is a
//! known limitation for anything larger.

use choropleth_types::bbox::BoundingBox2D;
use geo::kernels::{Kernel, Orientation, RobustKernel};
use geo::{BoundingRect, Coord, LineString, MultiPolygon, Point, Polygon};

/// Location of a point relative to a closed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Inside,
    OnBoundary,
    Outside,
}

impl Position {
    /// Closed-region semantics: boundary points count as contained.
    #[inline]
    pub fn is_contained(self) -> bool {
        !matches!(self, Position::Outside)
    }
}

/// Iterate the edges of a ring, adding the closing edge if the ring is open.
fn ring_edges(ring: &LineString<f64>) -> impl Iterator<Item = (Coord<f64>, Coord<f64>)> + '_ {
    let coords = &ring.0;
    let closing = match (coords.first(), coords.last()) {
        (Some(first), Some(last)) if coords.len() > 1 && first != last => Some((*last, *first)),
        _ => None,
    };
    coords
        .windows(2)
        .map(|w| (w[0], w[1]))
        .chain(closing)
}

#[inline]
fn on_segment(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> bool {
    RobustKernel::orient2d(a, b, p) == Orientation::Collinear
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

/// Position of `p` relative to a single ring, by winding number.
///
/// Orientation tests use robust predicates, so a point lying exactly on an
/// edge is reported as `OnBoundary` regardless of ring orientation.
pub fn ring_position(ring: &LineString<f64>, p: Coord<f64>) -> Position {
    let mut winding = 0i32;

    for (a, b) in ring_edges(ring) {
        if on_segment(a, b, p) {
            return Position::OnBoundary;
        }
        if a.y <= p.y {
            if b.y > p.y && RobustKernel::orient2d(a, b, p) == Orientation::CounterClockwise {
                winding += 1;
            }
        } else if b.y <= p.y && RobustKernel::orient2d(a, b, p) == Orientation::Clockwise {
            winding -= 1;
        }
    }

    if winding != 0 {
        Position::Inside
    } else {
        Position::Outside
    }
}

/// Position of a point relative to a polygon with holes.
///
/// A point on a hole's boundary is on the polygon's boundary.
pub fn polygon_position(polygon: &Polygon<f64>, point: &Point<f64>) -> Position {
    let p = point.0;
    match ring_position(polygon.exterior(), p) {
        Position::Outside => Position::Outside,
        Position::OnBoundary => Position::OnBoundary,
        Position::Inside => {
            for hole in polygon.interiors() {
                match ring_position(hole, p) {
                    Position::Inside => return Position::Outside,
                    Position::OnBoundary => return Position::OnBoundary,
                    Position::Outside => {}
                }
            }
            Position::Inside
        }
    }
}

/// Position of a point relative to all parts of a multipolygon.
pub fn multipolygon_position(multi: &MultiPolygon<f64>, point: &Point<f64>) -> Position {
    let mut result = Position::Outside;
    for polygon in &multi.0 {
        match polygon_position(polygon, point) {
            Position::Inside => return Position::Inside,
            Position::OnBoundary => result = Position::OnBoundary,
            Position::Outside => {}
        }
    }
    result
}

/// True if the point lies within the exterior ring and outside every hole.
/// Boundary points are contained.
///
/// # Examples
///
/// ```
/// use choropleth::compute::spatial::contains;
/// use geo::{polygon, Point};
///
/// let square = polygon![
///     (x: 0.0, y: 0.0),
///     (x: 10.0, y: 0.0),
///     (x: 10.0, y: 10.0),
///     (x: 0.0, y: 10.0),
/// ];
/// assert!(contains(&square, &Point::new(1.0, 1.0)));
/// assert!(contains(&square, &Point::new(10.0, 5.0)));
/// assert!(!contains(&square, &Point::new(11.0, 5.0)));
/// ```
pub fn contains(polygon: &Polygon<f64>, point: &Point<f64>) -> bool {
    polygon_position(polygon, point).is_contained()
}

pub fn multipolygon_contains(multi: &MultiPolygon<f64>, point: &Point<f64>) -> bool {
    multipolygon_position(multi, point).is_contained()
}

/// Axis-aligned bounding box; `None` for empty geometry.
pub fn bbox(polygon: &Polygon<f64>) -> Option<BoundingBox2D> {
    polygon.bounding_rect().map(BoundingBox2D::from_rect)
}

pub fn multipolygon_bbox(multi: &MultiPolygon<f64>) -> Option<BoundingBox2D> {
    multi.bounding_rect().map(BoundingBox2D::from_rect)
}

/// Signed area and first moments of a ring, relative to `origin`.
///
/// Positive area for counter-clockwise rings.
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    area: f64,
    mx: f64,
    my: f64,
}

impl Moments {
    fn of_ring(ring: &LineString<f64>, origin: Coord<f64>) -> Self {
        let mut twice_area = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for (a, b) in ring_edges(ring) {
            let (ax, ay) = (a.x - origin.x, a.y - origin.y);
            let (bx, by) = (b.x - origin.x, b.y - origin.y);
            let cross = ax * by - bx * ay;
            twice_area += cross;
            cx += (ax + bx) * cross;
            cy += (ay + by) * cross;
        }
        Self {
            area: twice_area / 2.0,
            mx: cx / 6.0,
            my: cy / 6.0,
        }
    }

    /// Same moments with the orientation forced positive.
    fn unsigned(self) -> Self {
        if self.area < 0.0 {
            Self {
                area: -self.area,
                mx: -self.mx,
                my: -self.my,
            }
        } else {
            self
        }
    }

    fn add(&mut self, other: Self) {
        self.area += other.area;
        self.mx += other.mx;
        self.my += other.my;
    }

    fn sub(&mut self, other: Self) {
        self.area -= other.area;
        self.mx -= other.mx;
        self.my -= other.my;
    }

    fn of_polygon(polygon: &Polygon<f64>, origin: Coord<f64>) -> Self {
        let mut total = Self::of_ring(polygon.exterior(), origin).unsigned();
        for hole in polygon.interiors() {
            total.sub(Self::of_ring(hole, origin).unsigned());
        }
        total
    }
}

/// Signed shoelace area of a ring (positive when counter-clockwise).
pub fn ring_signed_area(ring: &LineString<f64>) -> f64 {
    let origin = ring.0.first().copied().unwrap_or(Coord { x: 0.0, y: 0.0 });
    Moments::of_ring(ring, origin).area
}

/// Planar area: exterior ring minus holes, never negative.
///
/// # Examples
///
/// ```
/// use choropleth::compute::spatial::area;
/// use geo::{LineString, Polygon};
///
/// let square_with_hole = Polygon::new(
///     LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
///     vec![LineString::from(vec![(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0)])],
/// );
/// assert_eq!(area(&square_with_hole), 96.0);
/// ```
pub fn area(polygon: &Polygon<f64>) -> f64 {
    let origin = polygon.exterior().0.first().copied().unwrap_or(Coord { x: 0.0, y: 0.0 });
    Moments::of_polygon(polygon, origin).area.max(0.0)
}

pub fn multipolygon_area(multi: &MultiPolygon<f64>) -> f64 {
    multi.0.iter().map(area).sum()
}

/// Area-weighted centroid; `None` when the area is zero.
pub fn centroid(polygon: &Polygon<f64>) -> Option<Point<f64>> {
    let origin = *polygon.exterior().0.first()?;
    moments_to_centroid(Moments::of_polygon(polygon, origin), origin)
}

/// Area-weighted centroid over all parts of a multipolygon.
pub fn multipolygon_centroid(multi: &MultiPolygon<f64>) -> Option<Point<f64>> {
    let origin = *multi.0.first()?.exterior().0.first()?;
    let mut total = Moments::default();
    for polygon in &multi.0 {
        total.add(Moments::of_polygon(polygon, origin));
    }
    moments_to_centroid(total, origin)
}

fn moments_to_centroid(moments: Moments, origin: Coord<f64>) -> Option<Point<f64>> {
    if moments.area <= 0.0 || !moments.area.is_finite() {
        return None;
    }
    Some(Point::new(
        origin.x + moments.mx / moments.area,
        origin.y + moments.my / moments.area,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, Centroid, polygon};

    fn square_with_hole() -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
            vec![LineString::from(vec![
                (4.0, 4.0),
                (6.0, 4.0),
                (6.0, 6.0),
                (4.0, 6.0),
            ])],
        )
    }

    #[test]
    fn test_contains_with_hole() {
        let poly = square_with_hole();
        assert!(!contains(&poly, &Point::new(5.0, 5.0)));
        assert!(contains(&poly, &Point::new(1.0, 1.0)));
        // On the hole boundary: closed-region semantics
        assert!(contains(&poly, &Point::new(5.0, 4.0)));
        assert_eq!(
            polygon_position(&poly, &Point::new(5.0, 4.0)),
            Position::OnBoundary
        );
    }

    #[test]
    fn test_position_on_exterior_edges_and_vertices() {
        let poly = square_with_hole();
        assert_eq!(
            polygon_position(&poly, &Point::new(0.0, 0.0)),
            Position::OnBoundary
        );
        assert_eq!(
            polygon_position(&poly, &Point::new(10.0, 3.0)),
            Position::OnBoundary
        );
        assert_eq!(
            polygon_position(&poly, &Point::new(-0.001, 3.0)),
            Position::Outside
        );
        assert_eq!(
            polygon_position(&poly, &Point::new(3.0, 9.999)),
            Position::Inside
        );
    }

    #[test]
    fn test_ring_position_ignores_orientation() {
        let ccw = LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]);
        let cw = LineString::from(vec![(0.0, 0.0), (0.0, 4.0), (4.0, 4.0), (4.0, 0.0)]);
        let p = Coord { x: 2.0, y: 2.0 };
        assert_eq!(ring_position(&ccw, p), Position::Inside);
        assert_eq!(ring_position(&cw, p), Position::Inside);
    }

    #[test]
    fn test_concave_ring() {
        // U shape opening upward
        let u = polygon![
            (x: 0.0, y: 0.0),
            (x: 6.0, y: 0.0),
            (x: 6.0, y: 6.0),
            (x: 4.0, y: 6.0),
            (x: 4.0, y: 2.0),
            (x: 2.0, y: 2.0),
            (x: 2.0, y: 6.0),
            (x: 0.0, y: 6.0),
        ];
        assert!(contains(&u, &Point::new(1.0, 5.0)));
        assert!(!contains(&u, &Point::new(3.0, 4.0)));
        assert!(contains(&u, &Point::new(3.0, 1.0)));
    }

    #[test]
    fn test_multipolygon_position_prefers_inside() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)];
        let b = polygon![(x: 2.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 2.0), (x: 2.0, y: 2.0)];
        let c = polygon![(x: 10.0, y: 10.0), (x: 12.0, y: 10.0), (x: 12.0, y: 12.0)];
        let multi = MultiPolygon::new(vec![a, b, c]);
        assert_eq!(
            multipolygon_position(&multi, &Point::new(2.0, 1.0)),
            Position::OnBoundary
        );
        assert_eq!(
            multipolygon_position(&multi, &Point::new(11.5, 10.5)),
            Position::Inside
        );
        assert!(!multipolygon_contains(&multi, &Point::new(6.0, 6.0)));
    }

    #[test]
    fn test_area_matches_geo() {
        let poly = square_with_hole();
        assert_eq!(area(&poly), 96.0);
        assert!((area(&poly) - poly.unsigned_area()).abs() < 1e-9);

        let cw = polygon![(x: 0.0, y: 0.0), (x: 0.0, y: 3.0), (x: 4.0, y: 0.0)];
        assert_eq!(area(&cw), 6.0);
        assert!(ring_signed_area(cw.exterior()) < 0.0);
    }

    #[test]
    fn test_area_of_degenerate_is_zero() {
        let line = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 2.0, y: 2.0)];
        assert_eq!(area(&line), 0.0);
        assert_eq!(centroid(&line), None);
    }

    #[test]
    fn test_centroid_matches_geo() {
        let l_shape = polygon![
            (x: 100_000.0, y: 400_000.0),
            (x: 100_030.0, y: 400_000.0),
            (x: 100_030.0, y: 400_010.0),
            (x: 100_010.0, y: 400_010.0),
            (x: 100_010.0, y: 400_030.0),
            (x: 100_000.0, y: 400_030.0),
        ];
        let ours = centroid(&l_shape).unwrap();
        let theirs = l_shape.centroid().unwrap();
        assert!((ours.x() - theirs.x()).abs() < 1e-6);
        assert!((ours.y() - theirs.y()).abs() < 1e-6);

        let holed = centroid(&square_with_hole()).unwrap();
        assert!((holed.x() - 5.0).abs() < 1e-12);
        assert!((holed.y() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_multipolygon_centroid_is_area_weighted() {
        let big = polygon![(x: 0.0, y: 0.0), (x: 3.0, y: 0.0), (x: 3.0, y: 3.0), (x: 0.0, y: 3.0)];
        let small = polygon![(x: 10.0, y: 0.0), (x: 11.0, y: 0.0), (x: 11.0, y: 1.0), (x: 10.0, y: 1.0)];
        let c = multipolygon_centroid(&MultiPolygon::new(vec![big, small])).unwrap();
        // (9 * 1.5 + 1 * 10.5) / 10
        assert!((c.x() - 2.4).abs() < 1e-12);
        assert!((c.y() - 1.4).abs() < 1e-12);
        assert_eq!(multipolygon_centroid(&MultiPolygon::new(vec![])), None);
    }

    #[test]
    fn test_bbox() {
        let b = bbox(&square_with_hole()).unwrap();
        assert_eq!(b.to_tuple(), (0.0, 0.0, 10.0, 10.0));
        assert!(multipolygon_bbox(&MultiPolygon::new(vec![])).is_none());
    }
}
