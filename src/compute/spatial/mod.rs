//! Geometry kernel and spatial indexes.

pub mod algorithms;
pub use algorithms::{
    Position, area, bbox, centroid, contains, multipolygon_area,
    multipolygon_bbox, multipolygon_centroid, multipolygon_contains, multipolygon_position,
    polygon_position, ring_position, ring_signed_area,
};

pub mod repair;
pub use repair::{
    RepairFailure, repair, repair_multipolygon, repair_region, repair_regions, validate_polygon,
};

pub mod grid;
pub mod rtree;
pub use grid::{GridIndex, GridStats};
pub use rtree::RTreeIndex;

use crate::compute::region_set::RegionSet;
use crate::config::{IndexConfig, IndexKind};
use geo::Point;
use smallvec::SmallVec;

/// Candidate region indices for one point query, in ascending order.
pub type Candidates = SmallVec<[u32; 8]>;

/// Pre-filter from a point to the regions that may contain it.
///
/// Implementations return a superset of the enclosing regions, sorted by
/// ascending region index; callers narrow it with exact containment tests.
/// Indexes are immutable once built and may be queried from many threads.
pub trait RegionIndex: Send + Sync {
    fn candidates(&self, point: &Point<f64>) -> Candidates;

    /// Number of regions in the set the index was built from.
    fn region_count(&self) -> usize;
}

/// Build the index selected by `config`.
pub fn build_index(
    regions: &RegionSet,
    config: &IndexConfig,
    parallel: bool,
) -> Box<dyn RegionIndex> {
    match config.kind {
        IndexKind::Grid => Box::new(GridIndex::build(regions, config, parallel)),
        IndexKind::RTree => Box::new(RTreeIndex::build(regions)),
    }
}
