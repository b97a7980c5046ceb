//! R*-tree over region bounding boxes.
//!
//! An alternative pre-filter to [`GridIndex`](super::GridIndex) that adapts
//! to very uneven region sizes without tuning. Bulk-loaded once and
//! read-only afterwards.

use super::{Candidates, RegionIndex};
use crate::compute::region_set::RegionSet;
use geo::Point;
use rstar::{AABB, RTree, RTreeObject};

/// Region bounding box entry for the R*-tree.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRegion {
    pub index: u32,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl RTreeObject for IndexedRegion {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

pub struct RTreeIndex {
    tree: RTree<IndexedRegion>,
    regions: usize,
}

impl RTreeIndex {
    pub fn build(regions: &RegionSet) -> Self {
        let items: Vec<IndexedRegion> = (0..regions.len())
            .filter_map(|idx| {
                regions.bbox(idx).map(|b| IndexedRegion {
                    index: idx as u32,
                    min_x: b.min_x(),
                    min_y: b.min_y(),
                    max_x: b.max_x(),
                    max_y: b.max_y(),
                })
            })
            .collect();
        log::debug!("r-tree index: bulk loading {} region boxes", items.len());

        Self {
            tree: RTree::bulk_load(items),
            regions: regions.len(),
        }
    }

    pub fn size(&self) -> usize {
        self.tree.size()
    }
}

impl RegionIndex for RTreeIndex {
    fn candidates(&self, point: &Point<f64>) -> Candidates {
        let envelope = AABB::from_point([point.x(), point.y()]);
        let mut out: Candidates = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.index)
            .collect();
        out.sort_unstable();
        out
    }

    fn region_count(&self) -> usize {
        self.regions
    }
}
