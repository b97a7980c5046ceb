//! Uniform grid over region bounding boxes.
//!
//! The overall extent is split into square cells; every region is registered
//! in each cell its bounding box overlaps. A point query computes one cell
//! and returns that cell's region list, a superset of the enclosing regions
//! that the caller narrows with exact containment tests.
//!
//! Cell lists are stored contiguously (one offsets array, one entries array)
//! and are frozen after construction, so the grid can be shared freely
//! across threads.

use super::{Candidates, RegionIndex};
use crate::compute::region_set::RegionSet;
use crate::config::IndexConfig;
use choropleth_types::bbox::BoundingBox2D;
use geo::Point;
use rayon::prelude::*;

/// Summary of a built grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridStats {
    pub n_x: usize,
    pub n_y: usize,
    pub cell_size: f64,
    /// Total (cell, region) registrations.
    pub entries: usize,
    pub max_per_cell: usize,
    pub mean_per_occupied_cell: f64,
}

#[derive(Debug, Clone)]
pub struct GridIndex {
    extent: Option<BoundingBox2D>,
    cell_size: f64,
    n_x: usize,
    n_y: usize,
    /// `offsets[c]..offsets[c + 1]` indexes `entries` for cell `c`.
    offsets: Vec<u32>,
    entries: Vec<u32>,
    regions: usize,
}

/// Inclusive cell range covered by one region's bounding box.
#[derive(Debug, Clone, Copy)]
struct CellSpan {
    region: u32,
    x0: usize,
    x1: usize,
    y0: usize,
    y1: usize,
}

impl GridIndex {
    /// Build the grid for a region set.
    ///
    /// Cell area is chosen so that a cell sees roughly
    /// `config.target_per_cell` region boxes, capped at `config.max_cells`.
    pub fn build(regions: &RegionSet, config: &IndexConfig, parallel: bool) -> Self {
        let Some(extent) = regions.extent() else {
            return Self::empty(regions.len());
        };

        let (n_x, n_y, cell_size) =
            grid_dims(&extent, choose_cell_size(regions, &extent, config), config.max_cells);
        let mut grid = Self {
            extent: Some(extent),
            cell_size,
            n_x,
            n_y,
            offsets: Vec::new(),
            entries: Vec::new(),
            regions: regions.len(),
        };

        let span_of = |idx: usize| {
            regions.bbox(idx).map(|b| {
                let (x0, y0) = grid.cell_coords(b.min_x(), b.min_y());
                let (x1, y1) = grid.cell_coords(b.max_x(), b.max_y());
                CellSpan {
                    region: idx as u32,
                    x0,
                    x1,
                    y0,
                    y1,
                }
            })
        };
        let spans: Vec<CellSpan> = if parallel {
            (0..regions.len()).into_par_iter().filter_map(span_of).collect()
        } else {
            (0..regions.len()).filter_map(span_of).collect()
        };

        // Merge: count, prefix-sum, then fill in ascending region order so
        // every cell list is sorted.
        let n_cells = n_x * n_y;
        let mut counts = vec![0u32; n_cells + 1];
        for span in &spans {
            for y in span.y0..=span.y1 {
                for x in span.x0..=span.x1 {
                    counts[y * n_x + x + 1] += 1;
                }
            }
        }
        for c in 0..n_cells {
            counts[c + 1] += counts[c];
        }
        let mut cursor = counts.clone();
        let mut entries = vec![0u32; counts[n_cells] as usize];
        for span in &spans {
            for y in span.y0..=span.y1 {
                for x in span.x0..=span.x1 {
                    let cell = y * n_x + x;
                    entries[cursor[cell] as usize] = span.region;
                    cursor[cell] += 1;
                }
            }
        }
        grid.offsets = counts;
        grid.entries = entries;

        let stats = grid.stats();
        log::debug!(
            "grid index: {}x{} cells of size {:.3}, {} entries, max {} per cell, mean {:.2} per occupied cell",
            stats.n_x,
            stats.n_y,
            stats.cell_size,
            stats.entries,
            stats.max_per_cell,
            stats.mean_per_occupied_cell
        );
        grid
    }

    fn empty(regions: usize) -> Self {
        Self {
            extent: None,
            cell_size: 0.0,
            n_x: 0,
            n_y: 0,
            offsets: vec![0],
            entries: Vec::new(),
            regions,
        }
    }

    /// Cell column and row for a coordinate, clamped into the grid.
    fn cell_coords(&self, x: f64, y: f64) -> (usize, usize) {
        let Some(extent) = &self.extent else {
            return (0, 0);
        };
        let axis = |v: f64, min: f64, n: usize| {
            if self.cell_size > 0.0 {
                let i = ((v - min) / self.cell_size).floor();
                if i <= 0.0 { 0 } else { (i as usize).min(n - 1) }
            } else {
                0
            }
        };
        (
            axis(x, extent.min_x(), self.n_x),
            axis(y, extent.min_y(), self.n_y),
        )
    }

    /// Region list of the cell containing `point`; empty outside the extent.
    pub fn cell_entries(&self, point: &Point<f64>) -> &[u32] {
        match &self.extent {
            Some(extent) if extent.contains_point(point) => {
                let (x, y) = self.cell_coords(point.x(), point.y());
                let cell = y * self.n_x + x;
                &self.entries[self.offsets[cell] as usize..self.offsets[cell + 1] as usize]
            }
            _ => &[],
        }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.n_x, self.n_y)
    }

    pub fn stats(&self) -> GridStats {
        let n_cells = self.n_x * self.n_y;
        let mut max_per_cell = 0;
        let mut occupied = 0;
        for c in 0..n_cells {
            let len = (self.offsets[c + 1] - self.offsets[c]) as usize;
            max_per_cell = max_per_cell.max(len);
            if len > 0 {
                occupied += 1;
            }
        }
        GridStats {
            n_x: self.n_x,
            n_y: self.n_y,
            cell_size: self.cell_size,
            entries: self.entries.len(),
            max_per_cell,
            mean_per_occupied_cell: if occupied > 0 {
                self.entries.len() as f64 / occupied as f64
            } else {
                0.0
            },
        }
    }
}

impl RegionIndex for GridIndex {
    fn candidates(&self, point: &Point<f64>) -> Candidates {
        Candidates::from_slice(self.cell_entries(point))
    }

    fn region_count(&self) -> usize {
        self.regions
    }
}

fn choose_cell_size(regions: &RegionSet, extent: &BoundingBox2D, config: &IndexConfig) -> f64 {
    let boxes: Vec<&BoundingBox2D> = (0..regions.len()).filter_map(|i| regions.bbox(i)).collect();
    let mean_box_area = boxes.iter().map(|b| b.area()).sum::<f64>() / boxes.len().max(1) as f64;
    let target = config.target_per_cell.max(1) as f64;

    let size = if mean_box_area > 0.0 {
        (mean_box_area * target / 4.0).sqrt()
    } else {
        // Zero-area boxes only: spread regions over n / target cells.
        let cells = (boxes.len() as f64 / target).max(1.0);
        let span = extent.width().max(extent.height());
        if extent.area() > 0.0 {
            (extent.area() / cells).sqrt()
        } else {
            span / cells
        }
    };

    if size.is_finite() { size } else { 0.0 }
}

/// Column count, row count and final cell size, doubling the cell size until
/// the grid fits in `max_cells`.
fn grid_dims(extent: &BoundingBox2D, cell_size: f64, max_cells: usize) -> (usize, usize, f64) {
    if cell_size <= 0.0 {
        return (1, 1, cell_size.max(0.0));
    }
    let max_cells = max_cells.max(1);
    let mut size = cell_size;
    loop {
        let n_x = ((extent.width() / size).floor() as usize + 1).max(1);
        let n_y = ((extent.height() / size).floor() as usize + 1).max(1);
        match n_x.checked_mul(n_y) {
            Some(n) if n <= max_cells => return (n_x, n_y, size),
            _ => size *= 2.0,
        }
    }
}
