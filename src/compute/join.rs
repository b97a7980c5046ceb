//! Point-in-region spatial join.
//!
//! Each observation is resolved against the candidates the spatial index
//! returns, testing exact containment in ascending region order and taking
//! the first match. Regions are ordered by id, so a point on an edge shared
//! by two regions always resolves to the one with the smaller id.

use crate::compute::region_set::RegionSet;
use crate::compute::spatial::{RegionIndex, multipolygon_contains};
use choropleth_types::observation::Observation;
use choropleth_types::region::RegionId;
use geo::Point;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// What happens to observations outside every region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// Drop unassigned observations.
    Inner,
    /// Keep unassigned observations with no region.
    #[default]
    Left,
}

/// One observation's resolved region. `region` is a dense index into the
/// [`RegionSet`]; `None` marks an unassigned observation (left joins only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub observation: usize,
    pub region: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JoinStats {
    pub observations: usize,
    pub assigned: usize,
    pub unassigned: usize,
}

/// Observation-to-region mapping produced by [`join`].
///
/// Assignments are ordered by observation position.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinResult {
    mode: JoinMode,
    observations: usize,
    assignments: Vec<Assignment>,
}

impl JoinResult {
    pub fn mode(&self) -> JoinMode {
        self.mode
    }

    /// Number of observations given to the join (including dropped ones).
    pub fn observation_count(&self) -> usize {
        self.observations
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn assigned_count(&self) -> usize {
        self.assignments.iter().filter(|a| a.region.is_some()).count()
    }

    /// Observations without an enclosing region, whether kept or dropped.
    pub fn unassigned_count(&self) -> usize {
        self.observations - self.assigned_count()
    }

    pub fn stats(&self) -> JoinStats {
        let assigned = self.assigned_count();
        JoinStats {
            observations: self.observations,
            assigned,
            unassigned: self.observations - assigned,
        }
    }

    /// Region index for the observation at `observation`; `None` when it is
    /// unassigned or was dropped by an inner join.
    pub fn region_of(&self, observation: usize) -> Option<usize> {
        self.assignments
            .binary_search_by_key(&observation, |a| a.observation)
            .ok()
            .and_then(|pos| self.assignments[pos].region)
    }

    /// Region id for the observation at `observation`.
    pub fn region_id_of<'a>(&self, observation: usize, regions: &'a RegionSet) -> Option<&'a RegionId> {
        self.region_of(observation)
            .and_then(|idx| regions.get(idx))
            .map(|r| r.id())
    }
}

/// First region (in ascending index order) whose closed geometry contains
/// `point`.
pub fn locate(point: &Point<f64>, index: &dyn RegionIndex, regions: &RegionSet) -> Option<usize> {
    index
        .candidates(point)
        .into_iter()
        .map(|c| c as usize)
        .find(|&c| {
            let bbox_hit = regions.bbox(c).is_some_and(|b| b.contains_point(point));
            bbox_hit
                && regions
                    .get(c)
                    .is_some_and(|r| multipolygon_contains(r.geometry(), point))
        })
}

/// Resolve every observation to its enclosing region.
///
/// The index must have been built from `regions`. Inputs are not modified.
///
/// # Examples
///
/// ```
/// use choropleth::compute::join::{JoinMode, join};
/// use choropleth::compute::region_set::RegionSet;
/// use choropleth::compute::spatial::GridIndex;
/// use choropleth::config::IndexConfig;
/// use choropleth::{Observation, Region};
/// use geo::{polygon, MultiPolygon};
///
/// let regions = RegionSet::new(vec![Region::new(
///     "r1",
///     MultiPolygon::new(vec![polygon![
///         (x: 0.0, y: 0.0),
///         (x: 10.0, y: 0.0),
///         (x: 10.0, y: 10.0),
///         (x: 0.0, y: 10.0),
///     ]]),
/// )])?;
/// let index = GridIndex::build(&regions, &IndexConfig::default(), false);
/// let observations = vec![
///     Observation::from_xy(5.0, 5.0, 1.0, "a"),
///     Observation::from_xy(50.0, 5.0, 1.0, "b"),
/// ];
///
/// let left = join(&observations, &index, &regions, JoinMode::Left, false);
/// assert_eq!(left.len(), 2);
/// assert_eq!(left.region_of(0), Some(0));
/// assert_eq!(left.region_of(1), None);
///
/// let inner = join(&observations, &index, &regions, JoinMode::Inner, false);
/// assert_eq!(inner.len(), 1);
/// # Ok::<(), choropleth::ChoroplethError>(())
/// ```
pub fn join(
    observations: &[Observation],
    index: &dyn RegionIndex,
    regions: &RegionSet,
    mode: JoinMode,
    parallel: bool,
) -> JoinResult {
    debug_assert_eq!(index.region_count(), regions.len());

    let resolve = |(i, obs): (usize, &Observation)| {
        let region = locate(obs.point(), index, regions);
        match (mode, region) {
            (JoinMode::Inner, None) => None,
            _ => Some(Assignment {
                observation: i,
                region,
            }),
        }
    };

    let assignments: Vec<Assignment> = if parallel {
        observations
            .par_iter()
            .enumerate()
            .filter_map(resolve)
            .collect()
    } else {
        observations.iter().enumerate().filter_map(resolve).collect()
    };

    let result = JoinResult {
        mode,
        observations: observations.len(),
        assignments,
    };
    let stats = result.stats();
    log::debug!(
        "spatial join ({:?}): {} observations, {} assigned, {} unassigned",
        mode,
        stats.observations,
        stats.assigned,
        stats.unassigned
    );
    result
}
