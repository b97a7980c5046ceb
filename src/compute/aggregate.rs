//! Per-region reduction of joined observation values.
//!
//! The aggregator never touches geometry: it only reads the join result and
//! the observation values. Assignments are split into fixed-size shards,
//! each shard is reduced on its own (in parallel when enabled), and shard
//! partials are merged in shard order. Because shard boundaries depend only
//! on `shard_size`, sums are bitwise identical for any thread count.

use crate::compute::join::{Assignment, JoinResult};
use crate::compute::region_set::RegionSet;
use crate::compute::validation::validate_observation_values;
use crate::error::AggregateError;
use choropleth_types::observation::Observation;
use choropleth_types::region::RegionId;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Reduction applied per region. All variants are associative and
/// commutative over [`Accumulator`] merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    #[default]
    Sum,
    Count,
    /// `sum / count`, computed once at the end.
    Mean,
    Min,
    Max,
}

/// Running partial state for one region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accumulator {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Accumulator {
    #[inline]
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    #[inline]
    pub fn merge(&mut self, other: &Accumulator) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Final value, or `None` (no data) when nothing contributed.
    pub fn finish(&self, reducer: Reducer) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(match reducer {
            Reducer::Sum => self.sum,
            Reducer::Count => self.count as f64,
            Reducer::Mean => self.sum / self.count as f64,
            Reducer::Min => self.min,
            Reducer::Max => self.max,
        })
    }
}

/// One region's aggregate.
///
/// `value` is `None` for regions without contributing observations: the
/// "no data" sentinel, kept so renderers can shade those regions distinctly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    /// Dense index into the [`RegionSet`].
    pub region: usize,
    pub region_id: RegionId,
    pub value: Option<f64>,
    pub count: u64,
}

impl AggregateRow {
    pub fn has_data(&self) -> bool {
        self.value.is_some()
    }
}

/// Aggregator output: one row per region in canonical order, plus the
/// number of observations that reached no region.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    rows: Vec<AggregateRow>,
    unassigned: usize,
}

impl Aggregation {
    pub fn rows(&self) -> &[AggregateRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<AggregateRow> {
        self.rows
    }

    pub fn unassigned_count(&self) -> usize {
        self.unassigned
    }

    /// Contributions counted into rows plus unassigned observations.
    pub fn total_count(&self) -> u64 {
        self.rows.iter().map(|r| r.count).sum::<u64>() + self.unassigned as u64
    }

    pub fn row(&self, id: &RegionId) -> Option<&AggregateRow> {
        self.rows.iter().find(|r| &r.region_id == id)
    }

    /// Row values in canonical order, `None` for no-data regions.
    pub fn values(&self) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.value).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    reducer: Reducer,
    parallel: bool,
    shard_size: usize,
}

impl Aggregator {
    pub fn new(reducer: Reducer) -> Self {
        Self {
            reducer,
            parallel: true,
            shard_size: 4096,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_shard_size(mut self, shard_size: usize) -> Self {
        self.shard_size = shard_size.max(1);
        self
    }

    pub fn reducer(&self) -> Reducer {
        self.reducer
    }

    /// Group joined observation values by region and reduce them.
    ///
    /// # Errors
    ///
    /// - [`AggregateError::LengthMismatch`] if `observations` is not the
    ///   slice the join was run on.
    /// - [`AggregateError::NonFiniteValue`] if any observation value is NaN
    ///   or infinite.
    ///
    /// # Examples
    ///
    /// ```
    /// use choropleth::compute::aggregate::{Aggregator, Reducer};
    /// use choropleth::compute::join::{JoinMode, join};
    /// use choropleth::compute::region_set::RegionSet;
    /// use choropleth::compute::spatial::RTreeIndex;
    /// use choropleth::{Observation, Region};
    /// use geo::{polygon, MultiPolygon};
    ///
    /// let regions = RegionSet::new(vec![Region::new(
    ///     "r1",
    ///     MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 0.0, y: 4.0)]]),
    /// )])?;
    /// let index = RTreeIndex::build(&regions);
    /// let observations = vec![
    ///     Observation::from_xy(1.0, 1.0, 10.0, "a"),
    ///     Observation::from_xy(1.0, 2.0, 20.0, "b"),
    /// ];
    /// let joined = join(&observations, &index, &regions, JoinMode::Left, false);
    ///
    /// let mean = Aggregator::new(Reducer::Mean).aggregate(&joined, &observations, &regions)?;
    /// assert_eq!(mean.rows()[0].value, Some(15.0));
    /// assert_eq!(mean.rows()[0].count, 2);
    /// # Ok::<(), choropleth::ChoroplethError>(())
    /// ```
    pub fn aggregate(
        &self,
        join: &JoinResult,
        observations: &[Observation],
        regions: &RegionSet,
    ) -> Result<Aggregation, AggregateError> {
        if join.observation_count() != observations.len() {
            return Err(AggregateError::LengthMismatch {
                joined: join.observation_count(),
                given: observations.len(),
            });
        }
        validate_observation_values(observations)?;

        let reduce_shard = |shard: &[Assignment]| {
            let mut partial: FxHashMap<usize, Accumulator> = FxHashMap::default();
            for a in shard {
                if let Some(region) = a.region {
                    partial
                        .entry(region)
                        .or_default()
                        .push(observations[a.observation].value());
                }
            }
            partial
        };

        let assignments = join.assignments();
        let partials: Vec<FxHashMap<usize, Accumulator>> = if self.parallel {
            assignments
                .par_chunks(self.shard_size)
                .map(reduce_shard)
                .collect()
        } else {
            assignments.chunks(self.shard_size).map(reduce_shard).collect()
        };

        let mut totals = vec![Accumulator::default(); regions.len()];
        for partial in &partials {
            for (&region, acc) in partial {
                if let Some(total) = totals.get_mut(region) {
                    total.merge(acc);
                }
            }
        }

        let rows: Vec<AggregateRow> = regions
            .iter()
            .zip(&totals)
            .enumerate()
            .map(|(idx, (region, acc))| AggregateRow {
                region: idx,
                region_id: region.id().clone(),
                value: acc.finish(self.reducer),
                count: acc.count,
            })
            .collect();

        let no_data = rows.iter().filter(|r| !r.has_data()).count();
        log::debug!(
            "aggregated {} shard(s) into {} rows ({} without data) using {:?}",
            partials.len(),
            rows.len(),
            no_data,
            self.reducer
        );

        Ok(Aggregation {
            rows,
            unassigned: join.unassigned_count(),
        })
    }
}
