//! Polygon validity checks and repair.
//!
//! Repair is an explicit validity step: it returns a new geometry or a
//! [`GeometryError`], never mutating its input. Valid polygons pass through
//! unchanged; invalid ones are rebuilt with a boolean overlay (even-odd fill)
//! which splits self-intersecting rings into simple parts, then holes are
//! unioned and subtracted from the rebuilt exterior so they end up properly
//! nested and non-overlapping.

use super::algorithms::{Position, area, multipolygon_area, ring_position};
use crate::error::GeometryError;
use choropleth_types::region::{Region, RegionId};
use geo::line_intersection::{LineIntersection, line_intersection};
use geo::{BooleanOps, Coord, Line, LineString, MultiPolygon, Polygon};
use rayon::prelude::*;

/// A region whose geometry could not be repaired. Processing of the other
/// regions continues.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairFailure {
    pub region_id: RegionId,
    pub error: GeometryError,
}

/// Edges of a ring as `Line`s, with the closing edge added for open rings.
fn edges(ring: &LineString<f64>) -> Vec<Line<f64>> {
    let coords = &ring.0;
    let mut lines: Vec<Line<f64>> = coords.windows(2).map(|w| Line::new(w[0], w[1])).collect();
    if let (Some(first), Some(last)) = (coords.first(), coords.last())
        && coords.len() > 1
        && first != last
    {
        lines.push(Line::new(*last, *first));
    }
    lines
}

/// Ring vertices without consecutive duplicates and without the closing point.
fn distinct_vertices(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut out: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for c in &ring.0 {
        if out.last() != Some(c) {
            out.push(*c);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

/// Check if a ring has a "spike": a vertex that appears twice non-consecutively.
fn has_spike(vertices: &[Coord<f64>]) -> bool {
    let n = vertices.len();
    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if vertices[i] == vertices[j] {
                return true;
            }
        }
    }
    false
}

/// Check if a ring has self-intersections between non-adjacent edges.
fn has_self_intersection(ring: &LineString<f64>) -> bool {
    let lines = edges(ring);
    let n = lines.len();

    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            match line_intersection(lines[i], lines[j]) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    let at_i = intersection == lines[i].start || intersection == lines[i].end;
                    let at_j = intersection == lines[j].start || intersection == lines[j].end;
                    if !(at_i && at_j) {
                        return true;
                    }
                }
                Some(LineIntersection::Collinear { .. }) => return true,
                None => {}
            }
        }
    }
    false
}

/// True if any edge of `a` crosses or overlaps an edge of `b`.
fn rings_cross(a: &LineString<f64>, b: &LineString<f64>) -> bool {
    let b_edges = edges(b);
    edges(a).into_iter().any(|ea| {
        b_edges.iter().any(|eb| {
            matches!(
                line_intersection(ea, *eb),
                Some(LineIntersection::SinglePoint { is_proper: true, .. })
                    | Some(LineIntersection::Collinear { .. })
            )
        })
    })
}

fn validate_ring(ring: &LineString<f64>, ring_name: &str) -> Option<String> {
    if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Some(format!("{} has a non-finite coordinate", ring_name));
    }

    let vertices = distinct_vertices(ring);
    if vertices.len() < 3 {
        return Some(format!("{} must have at least 3 distinct points", ring_name));
    }

    if has_spike(&vertices) || has_self_intersection(ring) {
        return Some(format!("{} has a self-intersection", ring_name));
    }

    None
}

/// List the validity issues of a polygon; empty when the polygon is valid.
///
/// Checks for too few distinct vertices, non-finite coordinates,
/// self-intersections and spikes, a zero-area exterior, holes reaching
/// outside the exterior and holes overlapping each other.
///
/// # Examples
///
/// ```
/// use choropleth::compute::spatial::validate_polygon;
/// use geo::polygon;
///
/// let bowtie = polygon![
///     (x: 0.0, y: 0.0),
///     (x: 10.0, y: 10.0),
///     (x: 10.0, y: 0.0),
///     (x: 0.0, y: 10.0),
/// ];
/// assert!(!validate_polygon(&bowtie).is_empty());
/// ```
pub fn validate_polygon(polygon: &Polygon<f64>) -> Vec<String> {
    let mut errors = Vec::new();
    let exterior = polygon.exterior();

    if let Some(err) = validate_ring(exterior, "exterior ring") {
        errors.push(err);
        // Hole checks need a usable exterior.
        return errors;
    }

    if area(&Polygon::new(exterior.clone(), vec![])) <= 0.0 {
        errors.push("exterior ring has zero area".to_string());
    }

    let holes = polygon.interiors();
    for (i, hole) in holes.iter().enumerate() {
        if let Some(err) = validate_ring(hole, &format!("interior ring at index {}", i)) {
            errors.push(err);
            continue;
        }
        let escapes = hole
            .0
            .iter()
            .any(|c| ring_position(exterior, *c) == Position::Outside);
        if escapes || rings_cross(hole, exterior) {
            errors.push(format!("interior ring at index {} is not within the exterior", i));
        }
    }

    for i in 0..holes.len() {
        for j in (i + 1)..holes.len() {
            let nested = holes[j]
                .0
                .iter()
                .any(|c| ring_position(&holes[i], *c) == Position::Inside)
                || holes[i]
                    .0
                    .iter()
                    .any(|c| ring_position(&holes[j], *c) == Position::Inside);
            if nested || rings_cross(&holes[i], &holes[j]) {
                errors.push(format!("interior rings at index {} and {} overlap", i, j));
            }
        }
    }

    errors
}

/// The area enclosed by a ring under even-odd fill, as simple polygons.
fn ring_area(ring: &LineString<f64>) -> MultiPolygon<f64> {
    let empty: MultiPolygon<f64> = MultiPolygon::new(vec![]);
    Polygon::new(ring.clone(), vec![]).union(&empty)
}

/// Repair a possibly invalid polygon into valid simple parts.
///
/// Returns the polygon unchanged (as a single part) when it is already
/// valid. Degenerate holes are dropped; a degenerate exterior is an error.
///
/// # Errors
///
/// - [`GeometryError::NonFinite`] if any coordinate is NaN or infinite.
/// - [`GeometryError::Degenerate`] if the exterior has fewer than 3 distinct
///   vertices or the repaired geometry has no area.
///
/// # Examples
///
/// ```
/// use choropleth::compute::spatial::{multipolygon_area, repair};
/// use geo::polygon;
///
/// let bowtie = polygon![
///     (x: 0.0, y: 0.0),
///     (x: 10.0, y: 10.0),
///     (x: 10.0, y: 0.0),
///     (x: 0.0, y: 10.0),
/// ];
/// let repaired = repair(&bowtie).unwrap();
/// assert_eq!(repaired.0.len(), 2);
/// assert!((multipolygon_area(&repaired) - 50.0).abs() < 1e-6);
/// ```
pub fn repair(polygon: &Polygon<f64>) -> Result<MultiPolygon<f64>, GeometryError> {
    let all_coords = polygon
        .exterior()
        .0
        .iter()
        .chain(polygon.interiors().iter().flat_map(|r| r.0.iter()));
    for c in all_coords {
        if !c.x.is_finite() || !c.y.is_finite() {
            return Err(GeometryError::NonFinite(format!("({}, {})", c.x, c.y)));
        }
    }

    let exterior = distinct_vertices(polygon.exterior());
    if exterior.len() < 3 {
        return Err(GeometryError::Degenerate(format!(
            "exterior ring has {} distinct vertices",
            exterior.len()
        )));
    }

    let holes: Vec<LineString<f64>> = polygon
        .interiors()
        .iter()
        .map(distinct_vertices)
        .filter(|v| v.len() >= 3)
        .map(LineString::from)
        .collect();
    if holes.len() < polygon.interiors().len() {
        log::debug!(
            "dropped {} degenerate interior ring(s)",
            polygon.interiors().len() - holes.len()
        );
    }

    let candidate = Polygon::new(LineString::from(exterior), holes);
    let issues = validate_polygon(&candidate);
    if issues.is_empty() {
        return Ok(MultiPolygon::new(vec![candidate]));
    }
    log::debug!("repairing polygon: {:?}", issues);

    let shell = ring_area(candidate.exterior());
    let repaired = if candidate.interiors().is_empty() {
        shell
    } else {
        let mut hole_union: MultiPolygon<f64> = MultiPolygon::new(vec![]);
        for hole in candidate.interiors() {
            hole_union = hole_union.union(&ring_area(hole));
        }
        shell.difference(&hole_union)
    };

    if repaired.0.is_empty() || multipolygon_area(&repaired) <= 0.0 {
        return Err(GeometryError::Degenerate(
            "repair produced an empty geometry".to_string(),
        ));
    }
    Ok(repaired)
}

/// Repair every part of a multipolygon.
///
/// Degenerate parts are dropped as long as at least one part survives.
pub fn repair_multipolygon(multi: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, GeometryError> {
    let mut parts = Vec::with_capacity(multi.0.len());
    let mut last_error = None;

    for polygon in &multi.0 {
        match repair(polygon) {
            Ok(repaired) => parts.extend(repaired.0),
            Err(GeometryError::Degenerate(msg)) => {
                log::debug!("dropping degenerate part: {}", msg);
                last_error = Some(GeometryError::Degenerate(msg));
            }
            Err(e) => return Err(e),
        }
    }

    if parts.is_empty() {
        return Err(last_error.unwrap_or_else(|| {
            GeometryError::Degenerate("geometry has no polygons".to_string())
        }));
    }
    Ok(MultiPolygon::new(parts))
}

/// Repair a region's geometry, keeping its id and attributes.
pub fn repair_region(region: Region) -> Result<Region, GeometryError> {
    let geometry = repair_multipolygon(region.geometry())?;
    Ok(region.with_geometry(geometry))
}

/// Repair a batch of regions, isolating failures per region.
///
/// Output order follows input order. Regions that cannot be repaired are
/// reported in the failure list and left out of the returned regions.
pub fn repair_regions(regions: Vec<Region>, parallel: bool) -> (Vec<Region>, Vec<RepairFailure>) {
    let attempt = |region: Region| {
        let id = region.id().clone();
        repair_region(region).map_err(|error| RepairFailure {
            region_id: id,
            error,
        })
    };

    let results: Vec<Result<Region, RepairFailure>> = if parallel {
        regions.into_par_iter().map(attempt).collect()
    } else {
        regions.into_iter().map(attempt).collect()
    };

    let mut repaired = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(region) => repaired.push(region),
            Err(failure) => {
                log::warn!(
                    "region {} skipped, geometry could not be repaired: {}",
                    failure.region_id,
                    failure.error
                );
                failures.push(failure);
            }
        }
    }
    (repaired, failures)
}
