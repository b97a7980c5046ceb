//! End-to-end choropleth pipeline.
//!
//! raw regions → repair → index → join → aggregate → classify, producing one
//! [`ChoroplethEntry`] per region for the rendering layer. Geometry failures
//! drop only the affected region; a classification failure is kept in the
//! output next to the still-usable aggregates.

use crate::builder::PipelineBuilder;
use crate::compute::aggregate::{AggregateRow, Aggregation, Aggregator};
use crate::compute::classify::{ClassBreaks, Classifier};
use crate::compute::join::{JoinStats, join};
use crate::compute::region_set::RegionSet;
use crate::compute::regrid::{GridCell, densities, regrid};
use crate::compute::spatial::{RepairFailure, build_index, repair_regions};
use crate::compute::validation::validate_observations;
use crate::config::Config;
use crate::error::{ChoroplethError, ClassifierError, Result};
use choropleth_types::observation::Observation;
use choropleth_types::region::{Region, RegionId};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// What the renderer needs for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoroplethEntry {
    pub region_id: RegionId,
    /// Aggregate value; `None` renders as "no data".
    pub value: Option<f64>,
    pub count: u64,
    /// Class index, when the region has a finite value and classification
    /// succeeded.
    pub class: Option<usize>,
    /// `(lower, upper)` bounds of `class`.
    pub range: Option<(f64, f64)>,
}

impl ChoroplethEntry {
    fn from_row(row: &AggregateRow, breaks: Option<&ClassBreaks>) -> Self {
        let class = breaks.zip(row.value).and_then(|(b, v)| b.class_of_value(v));
        let range = breaks.zip(class).and_then(|(b, c)| b.class_range(c));
        Self {
            region_id: row.region_id.clone(),
            value: row.value,
            count: row.count,
            class,
            range,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    regions: RegionSet,
    aggregation: Aggregation,
    join_stats: JoinStats,
    breaks: std::result::Result<ClassBreaks, ClassifierError>,
    entries: Vec<ChoroplethEntry>,
    repair_failures: Vec<RepairFailure>,
}

impl PipelineOutput {
    /// One entry per surviving region, in canonical order.
    pub fn entries(&self) -> &[ChoroplethEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &RegionId) -> Option<&ChoroplethEntry> {
        self.regions.index_of(id).and_then(|i| self.entries.get(i))
    }

    /// Class breaks, or why classification failed.
    pub fn breaks(&self) -> std::result::Result<&ClassBreaks, &ClassifierError> {
        self.breaks.as_ref()
    }

    pub fn aggregation(&self) -> &Aggregation {
        &self.aggregation
    }

    pub fn rows(&self) -> &[AggregateRow] {
        self.aggregation.rows()
    }

    pub fn join_stats(&self) -> JoinStats {
        self.join_stats
    }

    /// Repaired regions the join ran against.
    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    /// Regions dropped because their geometry could not be repaired.
    pub fn repair_failures(&self) -> &[RepairFailure] {
        &self.repair_failures
    }

    /// Entries as a JSON array.
    pub fn entries_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }
}

/// Coarse-grid view of a [`PipelineOutput`], classified by density.
#[derive(Debug, Clone)]
pub struct RegridOutput {
    pub cells: Vec<GridCell>,
    pub breaks: std::result::Result<ClassBreaks, ClassifierError>,
    /// Class per cell, parallel to `cells`.
    pub classes: Vec<Option<usize>>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    /// Create a pipeline, validating `config`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate().map_err(ChoroplethError::Config)?;
        Ok(Self { config })
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn classifier(&self) -> Classifier {
        Classifier::new(self.config.classes)
            .with_max_classes(self.config.max_classes)
            .with_max_values(self.config.max_classify_values)
    }

    /// Repair raw regions and put them in canonical order.
    ///
    /// # Errors
    ///
    /// [`ChoroplethError::DuplicateRegion`] if two regions share an id.
    /// Unrepairable regions are not an error; they are returned as failures.
    pub fn prepare_regions(&self, raw: Vec<Region>) -> Result<(RegionSet, Vec<RepairFailure>)> {
        let total = raw.len();
        let (repaired, failures) = repair_regions(raw, self.config.parallel);
        let regions = RegionSet::new(repaired)?;
        log::info!(
            "prepared {} of {} regions ({} failed repair)",
            regions.len(),
            total,
            failures.len()
        );
        Ok((regions, failures))
    }

    /// Run every stage on `raw_regions` and `observations`.
    ///
    /// # Errors
    ///
    /// - [`ChoroplethError::InvalidInput`] for observations with non-finite
    ///   coordinates.
    /// - [`ChoroplethError::Aggregate`] for non-finite observation values.
    /// - [`ChoroplethError::DuplicateRegion`] for repeated region ids.
    ///
    /// # Examples
    ///
    /// ```
    /// use choropleth::{Config, Observation, Pipeline, Region};
    /// use geo::{Rect, coord};
    ///
    /// let square = |id: &str, x: f64| {
    ///     let rect = Rect::new(coord! { x: x, y: 0.0 }, coord! { x: x + 1.0, y: 1.0 });
    ///     Region::new(id, rect.to_polygon().into())
    /// };
    /// let pipeline = Pipeline::new(Config::default().with_classes(2))?;
    /// let output = pipeline.run(
    ///     vec![square("a", 0.0), square("b", 2.0), square("c", 4.0)],
    ///     &[
    ///         Observation::from_xy(0.5, 0.5, 1.0, "p1"),
    ///         Observation::from_xy(2.5, 0.5, 9.0, "p2"),
    ///     ],
    /// )?;
    ///
    /// let classes: Vec<Option<usize>> = output.entries().iter().map(|e| e.class).collect();
    /// assert_eq!(classes, vec![Some(0), Some(1), None]);
    /// # Ok::<(), choropleth::ChoroplethError>(())
    /// ```
    pub fn run(&self, raw_regions: Vec<Region>, observations: &[Observation]) -> Result<PipelineOutput> {
        let started = Instant::now();
        validate_observations(observations)?;

        let (regions, repair_failures) = self.prepare_regions(raw_regions)?;

        let index = build_index(&regions, &self.config.index, self.config.parallel);
        log::info!("built {:?} index over {} regions", self.config.index.kind, index.region_count());

        let joined = join(
            observations,
            index.as_ref(),
            &regions,
            self.config.join_mode,
            self.config.parallel,
        );
        let join_stats = joined.stats();
        log::info!(
            "joined {} observations: {} assigned, {} unassigned",
            join_stats.observations,
            join_stats.assigned,
            join_stats.unassigned
        );

        let aggregation = Aggregator::new(self.config.reducer)
            .with_parallel(self.config.parallel)
            .with_shard_size(self.config.shard_size)
            .aggregate(&joined, observations, &regions)?;
        log::info!(
            "aggregated into {} rows using {:?}",
            aggregation.rows().len(),
            self.config.reducer
        );

        let breaks = self.classifier().classify_rows(aggregation.rows());
        match &breaks {
            Ok(b) => log::info!("classified into {} classes: {:?}", b.k(), b.breaks()),
            Err(e) => log::warn!("classification skipped: {}", e),
        }

        let entries = aggregation
            .rows()
            .iter()
            .map(|row| ChoroplethEntry::from_row(row, breaks.as_ref().ok()))
            .collect();

        log::info!("pipeline finished in {:?}", started.elapsed());
        Ok(PipelineOutput {
            regions,
            aggregation,
            join_stats,
            breaks,
            entries,
            repair_failures,
        })
    }

    /// Re-bin `output` into an `n_x` × `n_y` grid and classify cell
    /// densities with the configured class count.
    pub fn regrid(&self, output: &PipelineOutput, n_x: usize, n_y: usize) -> Result<RegridOutput> {
        let cells = regrid(output.regions(), output.rows(), n_x, n_y)?;
        let values = densities(&cells);
        let breaks = self.classifier().classify(&values);
        if let Err(e) = &breaks {
            log::warn!("regrid classification skipped: {}", e);
        }
        let classes = match &breaks {
            Ok(b) => values.iter().map(|v| v.and_then(|d| b.class_of_value(d))).collect(),
            Err(_) => vec![None; cells.len()],
        };
        log::info!("regridded into {} occupied cells", cells.len());
        Ok(RegridOutput {
            cells,
            breaks,
            classes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexKind, JoinMode, Reducer};
    use geo::{LineString, MultiPolygon, Polygon, Rect, coord};

    fn square(id: &str, x: f64, y: f64) -> Region {
        let rect = Rect::new(coord! { x: x, y: y }, coord! { x: x + 1.0, y: y + 1.0 });
        Region::new(id, rect.to_polygon().into())
    }

    fn degenerate(id: &str) -> Region {
        let ring = LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        Region::new(id, MultiPolygon::new(vec![Polygon::new(ring, vec![])]))
    }

    fn observations() -> Vec<Observation> {
        vec![
            Observation::from_xy(0.5, 0.5, 10.0, "1011"),
            Observation::from_xy(0.4, 0.6, 20.0, "1012"),
            Observation::from_xy(2.5, 0.5, 5.0, "2011"),
            Observation::from_xy(4.5, 0.5, 100.0, "3011"),
            Observation::from_xy(50.0, 50.0, 1.0, "9999"),
        ]
    }

    #[test]
    fn test_run_end_to_end() {
        let pipeline = Pipeline::new(Config::default().with_classes(2).with_parallel(false)).unwrap();
        let regions = vec![square("c", 4.0, 0.0), square("a", 0.0, 0.0), square("b", 2.0, 0.0)];
        let output = pipeline.run(regions, &observations()).unwrap();

        let ids: Vec<&str> = output.entries().iter().map(|e| e.region_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(output.entry(&"a".into()).unwrap().value, Some(30.0));
        assert_eq!(output.join_stats().unassigned, 1);

        let breaks = output.breaks().unwrap();
        assert_eq!(breaks.breaks(), &[100.0]);
        assert_eq!(output.entry(&"c".into()).unwrap().class, Some(1));
        assert_eq!(output.entry(&"c".into()).unwrap().range, Some((100.0, 100.0)));
        assert_eq!(output.entry(&"b".into()).unwrap().class, Some(0));
    }

    #[test]
    fn test_repair_failure_is_isolated() {
        let pipeline = Pipeline::new(Config::default().with_classes(1)).unwrap();
        let regions = vec![square("a", 0.0, 0.0), degenerate("broken")];
        let output = pipeline.run(regions, &observations()).unwrap();

        assert_eq!(output.entries().len(), 1);
        assert_eq!(output.repair_failures().len(), 1);
        assert_eq!(output.repair_failures()[0].region_id.as_str(), "broken");
    }

    #[test]
    fn test_classification_failure_keeps_aggregates() {
        let pipeline = Pipeline::new(Config::default().with_classes(5)).unwrap();
        let output = pipeline
            .run(vec![square("a", 0.0, 0.0), square("b", 2.0, 0.0)], &observations())
            .unwrap();

        assert!(matches!(
            output.breaks(),
            Err(ClassifierError::InsufficientData { classes: 5, values: 2 })
        ));
        assert_eq!(output.entry(&"b".into()).unwrap().value, Some(5.0));
        assert!(output.entries().iter().all(|e| e.class.is_none()));
    }

    #[test]
    fn test_invalid_observation_rejected() {
        let pipeline = Pipeline::new(Config::default()).unwrap();
        let bad = vec![Observation::from_xy(0.5, 0.5, f64::NAN, "nan")];
        assert!(matches!(
            pipeline.run(vec![square("a", 0.0, 0.0)], &bad),
            Err(ChoroplethError::Aggregate(_))
        ));
    }

    #[test]
    fn test_duplicate_region_rejected() {
        let pipeline = Pipeline::new(Config::default()).unwrap();
        let result = pipeline.run(vec![square("a", 0.0, 0.0), square("a", 2.0, 0.0)], &[]);
        assert_eq!(result.unwrap_err(), ChoroplethError::DuplicateRegion("a".into()));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.shard_size = 0;
        assert!(matches!(Pipeline::new(config), Err(ChoroplethError::Config(_))));
    }

    #[test]
    fn test_excessive_class_count_rejected() {
        assert!(matches!(
            Pipeline::new(Config::default().with_classes(50_000)),
            Err(ChoroplethError::Config(_))
        ));

        let mut config = Config::default().with_classes(3);
        config.max_classes = 2;
        assert!(matches!(Pipeline::new(config), Err(ChoroplethError::Config(_))));
    }

    #[test]
    fn test_overflowed_sum_is_unclassified() {
        let pipeline = Pipeline::new(Config::default().with_classes(2)).unwrap();
        let obs = vec![
            Observation::from_xy(0.5, 0.5, 1e308, "big1"),
            Observation::from_xy(0.6, 0.6, 1e308, "big2"),
            Observation::from_xy(2.5, 0.5, 5.0, "b"),
            Observation::from_xy(4.5, 0.5, 100.0, "c"),
        ];
        let regions = vec![square("a", 0.0, 0.0), square("b", 2.0, 0.0), square("c", 4.0, 0.0)];
        let output = pipeline.run(regions, &obs).unwrap();

        let a = output.entry(&"a".into()).unwrap();
        assert_eq!(a.value, Some(f64::INFINITY));
        assert_eq!(a.class, None);
        assert_eq!(a.range, None);

        let breaks = output.breaks().unwrap();
        assert_eq!((breaks.min(), breaks.max()), (5.0, 100.0));
        assert_eq!(output.entry(&"b".into()).unwrap().class, Some(0));
        assert_eq!(output.entry(&"c".into()).unwrap().class, Some(1));
    }

    #[test]
    fn test_index_kinds_agree() {
        let regions = || vec![square("a", 0.0, 0.0), square("b", 1.0, 0.0), square("c", 0.0, 1.0)];
        let obs = vec![
            Observation::from_xy(1.0, 0.5, 1.0, "edge"),
            Observation::from_xy(1.0, 1.0, 2.0, "corner"),
            Observation::from_xy(0.5, 1.5, 3.0, "top"),
        ];
        let run = |kind| {
            let config = Config::default()
                .with_index_kind(kind)
                .with_join_mode(JoinMode::Inner)
                .with_reducer(Reducer::Count)
                .with_classes(1);
            Pipeline::new(config).unwrap().run(regions(), &obs).unwrap()
        };
        assert_eq!(run(IndexKind::Grid).entries(), run(IndexKind::RTree).entries());
    }

    #[test]
    fn test_regrid_classifies_densities() {
        let pipeline = Pipeline::new(Config::default().with_classes(2)).unwrap();
        let regions = vec![square("a", 0.0, 0.0), square("b", 2.0, 0.0), square("c", 4.0, 0.0)];
        let output = pipeline.run(regions, &observations()).unwrap();

        let coarse = pipeline.regrid(&output, 3, 1).unwrap();
        assert_eq!(coarse.cells.len(), 3);
        assert_eq!(coarse.classes, vec![Some(0), Some(0), Some(1)]);
        assert!(pipeline.regrid(&output, 0, 1).is_err());
    }

    #[test]
    fn test_entries_json() {
        let pipeline = Pipeline::new(Config::default().with_classes(1)).unwrap();
        let output = pipeline.run(vec![square("a", 0.0, 0.0)], &observations()).unwrap();
        let json = output.entries_json().unwrap();
        let parsed: Vec<ChoroplethEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, output.entries());
    }
}
