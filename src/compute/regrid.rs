//! Re-binning regions into a coarser rectangular grid.
//!
//! Regions are assigned to cells by centroid only, not by polygon overlap: a
//! region straddling a cell boundary lands wholly in the cell holding its
//! centroid. The grid spans the centroid range, split into `n_x` by `n_y`
//! equal-width bins. Cells no region falls into are not emitted.

use crate::compute::aggregate::AggregateRow;
use crate::compute::region_set::RegionSet;
use crate::compute::spatial::{multipolygon_area, multipolygon_centroid};
use crate::error::RegridError;
use choropleth_types::bbox::BoundingBox2D;
use choropleth_types::region::RegionId;
use geo::{Point, Rect, coord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One occupied output cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub ix: usize,
    pub iy: usize,
    /// Bin extent in centroid space.
    pub bounds: BoundingBox2D,
    /// Regions whose centroid falls in this cell, in canonical order.
    pub regions: Vec<RegionId>,
    /// Summed region area.
    pub area: f64,
    /// Summed aggregate; `None` when no member region has data.
    pub value: Option<f64>,
    /// `value / area`.
    pub density: Option<f64>,
}

impl GridCell {
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}

#[derive(Default)]
struct CellAccumulator {
    regions: Vec<RegionId>,
    area: f64,
    value: Option<f64>,
}

/// Equal-width binning of one axis.
#[derive(Clone, Copy)]
struct Axis {
    min: f64,
    max: f64,
    bins: usize,
}

impl Axis {
    fn width(&self) -> f64 {
        (self.max - self.min) / self.bins as f64
    }

    fn bin(&self, v: f64) -> usize {
        let width = self.width();
        if width <= 0.0 {
            return 0;
        }
        (((v - self.min) / width).floor().max(0.0) as usize).min(self.bins - 1)
    }

    fn bounds(&self, bin: usize) -> (f64, f64) {
        let width = self.width();
        let lo = self.min + bin as f64 * width;
        let hi = if bin + 1 == self.bins {
            self.max
        } else {
            self.min + (bin + 1) as f64 * width
        };
        (lo, hi)
    }
}

/// Re-bin `regions` and their aggregates into an `n_x` × `n_y` grid.
///
/// `rows` must be the aggregator output for `regions` (one row per region in
/// canonical order). Regions without a centroid (zero area) are skipped.
/// Cells are returned ordered by row (`iy`) then column (`ix`).
///
/// # Errors
///
/// - [`RegridError::InvalidGrid`] if either dimension is zero.
/// - [`RegridError::RowMismatch`] if `rows` does not match `regions`.
///
/// # Examples
///
/// ```
/// use choropleth::compute::aggregate::AggregateRow;
/// use choropleth::compute::region_set::RegionSet;
/// use choropleth::compute::regrid::regrid;
/// use choropleth::Region;
/// use geo::{Rect, coord};
///
/// let square = |id: &str, x: f64| {
///     let rect = Rect::new(coord! { x: x, y: 0.0 }, coord! { x: x + 2.0, y: 2.0 });
///     Region::new(id, rect.to_polygon().into())
/// };
/// let regions = RegionSet::new(vec![square("a", 0.0), square("b", 10.0)])?;
/// let rows: Vec<AggregateRow> = regions
///     .iter()
///     .enumerate()
///     .map(|(i, r)| AggregateRow { region: i, region_id: r.id().clone(), value: Some(8.0), count: 1 })
///     .collect();
///
/// let cells = regrid(&regions, &rows, 2, 1)?;
/// assert_eq!(cells.len(), 2);
/// assert_eq!(cells[0].density, Some(2.0));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn regrid(
    regions: &RegionSet,
    rows: &[AggregateRow],
    n_x: usize,
    n_y: usize,
) -> Result<Vec<GridCell>, RegridError> {
    if n_x == 0 || n_y == 0 {
        return Err(RegridError::InvalidGrid { n_x, n_y });
    }
    if rows.len() != regions.len() {
        return Err(RegridError::RowMismatch {
            rows: rows.len(),
            regions: regions.len(),
        });
    }

    let placed: Vec<(Point<f64>, f64, &AggregateRow)> = regions
        .iter()
        .zip(rows)
        .filter_map(|(region, row)| {
            multipolygon_centroid(region.geometry())
                .map(|c| (c, multipolygon_area(region.geometry()), row))
        })
        .collect();

    if placed.is_empty() {
        return Ok(Vec::new());
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (c, _, _) in &placed {
        min_x = min_x.min(c.x());
        min_y = min_y.min(c.y());
        max_x = max_x.max(c.x());
        max_y = max_y.max(c.y());
    }
    let x_axis = Axis { min: min_x, max: max_x, bins: n_x };
    let y_axis = Axis { min: min_y, max: max_y, bins: n_y };

    let mut cells: BTreeMap<(usize, usize), CellAccumulator> = BTreeMap::new();
    for (c, area, row) in placed {
        let key = (y_axis.bin(c.y()), x_axis.bin(c.x()));
        let cell = cells.entry(key).or_default();
        cell.regions.push(row.region_id.clone());
        cell.area += area;
        if let Some(v) = row.value {
            cell.value = Some(cell.value.unwrap_or(0.0) + v);
        }
    }

    let out: Vec<GridCell> = cells
        .into_iter()
        .map(|((iy, ix), acc)| {
            let (x0, x1) = x_axis.bounds(ix);
            let (y0, y1) = y_axis.bounds(iy);
            let density = match acc.value {
                Some(v) if acc.area > 0.0 => Some(v / acc.area),
                _ => None,
            };
            GridCell {
                ix,
                iy,
                bounds: BoundingBox2D::from_rect(Rect::new(
                    coord! { x: x0, y: y0 },
                    coord! { x: x1, y: y1 },
                )),
                regions: acc.regions,
                area: acc.area,
                value: acc.value,
                density,
            }
        })
        .collect();

    log::debug!(
        "regridded {} regions into {} of {}x{} cells",
        regions.len(),
        out.len(),
        n_x,
        n_y
    );
    Ok(out)
}

/// Cell densities in output order, for classification.
pub fn densities(cells: &[GridCell]) -> Vec<Option<f64>> {
    cells.iter().map(|c| c.density).collect()
}
