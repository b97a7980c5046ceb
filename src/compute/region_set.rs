//! Canonically ordered region collection.

use crate::compute::spatial::multipolygon_bbox;
use crate::error::{ChoroplethError, Result};
use choropleth_types::bbox::BoundingBox2D;
use choropleth_types::region::{Region, RegionId};
use rustc_hash::FxHashMap;

/// Regions sorted by ascending id, with cached bounding boxes.
///
/// A region's position in the set is its dense index. Spatial indexes return
/// these indices, the join resolves ties by the lowest index, and aggregate
/// rows are emitted in index order.
#[derive(Debug, Clone)]
pub struct RegionSet {
    regions: Vec<Region>,
    bboxes: Vec<Option<BoundingBox2D>>,
    lookup: FxHashMap<RegionId, usize>,
}

impl RegionSet {
    /// Sort regions by id and cache their bounding boxes.
    ///
    /// # Errors
    ///
    /// [`ChoroplethError::DuplicateRegion`] if two regions share an id, and
    /// [`ChoroplethError::InvalidInput`] if there are more than `u32::MAX`
    /// regions.
    pub fn new(mut regions: Vec<Region>) -> Result<Self> {
        if regions.len() > u32::MAX as usize {
            return Err(ChoroplethError::InvalidInput(format!(
                "too many regions: {}",
                regions.len()
            )));
        }
        regions.sort_by(|a, b| a.id().cmp(b.id()));

        let mut lookup = FxHashMap::default();
        lookup.reserve(regions.len());
        for (idx, region) in regions.iter().enumerate() {
            if lookup.insert(region.id().clone(), idx).is_some() {
                return Err(ChoroplethError::DuplicateRegion(region.id().clone()));
            }
        }

        let bboxes = regions
            .iter()
            .map(|r| multipolygon_bbox(r.geometry()))
            .collect();

        Ok(Self {
            regions,
            bboxes,
            lookup,
        })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn index_of(&self, id: &RegionId) -> Option<usize> {
        self.lookup.get(id).copied()
    }

    /// Cached bounding box; `None` for regions with empty geometry.
    pub fn bbox(&self, index: usize) -> Option<&BoundingBox2D> {
        self.bboxes.get(index).and_then(|b| b.as_ref())
    }

    /// Bounding box of all regions.
    pub fn extent(&self) -> Option<BoundingBox2D> {
        self.bboxes
            .iter()
            .flatten()
            .copied()
            .reduce(|acc, b| acc.union(&b))
    }
}
