//! Point-in-polygon aggregation and natural-breaks classification for choropleth maps.
//!
//! ```rust
//! use choropleth::{Observation, Pipeline, Region};
//! use geo::{Rect, coord};
//!
//! let rect = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 });
//! let regions = vec![Region::new("0363", rect.to_polygon().into())];
//! let observations = vec![Observation::from_xy(5.0, 5.0, 250_000.0, "1011AB")];
//!
//! let pipeline = Pipeline::builder().classes(1).build()?;
//! let output = pipeline.run(regions, &observations)?;
//! assert_eq!(output.entries()[0].value, Some(250_000.0));
//! # Ok::<(), choropleth::ChoroplethError>(())
//! ```
//!
//! All geometry is planar: coordinates are taken as already projected and no
//! geodesic correction is applied. This suits small, mid-latitude extents.

pub mod builder;
pub mod compute;
pub mod config;
pub mod error;
pub mod pipeline;

pub use builder::PipelineBuilder;
pub use config::{Config, IndexConfig, IndexKind, JoinMode, Reducer};
pub use error::{
    AggregateError, ChoroplethError, ClassifierError, GeometryError, RegridError, Result,
};
pub use pipeline::{ChoroplethEntry, Pipeline, PipelineOutput, RegridOutput};

pub use choropleth_types::bbox::BoundingBox2D;
pub use choropleth_types::observation::Observation;
pub use choropleth_types::region::{AttributeValue, Attributes, Region, RegionId};

pub use geo::{MultiPolygon, Point, Polygon};

pub use compute::aggregate::{AggregateRow, Aggregation, Aggregator};
pub use compute::classify::{ClassBreaks, Classifier, classify};
pub use compute::join::{JoinResult, JoinStats, join};
pub use compute::region_set::RegionSet;
pub use compute::regrid::{GridCell, regrid};
pub use compute::spatial::{GridIndex, RTreeIndex, RegionIndex, build_index};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {
    pub use crate::{ChoroplethError, Pipeline, PipelineBuilder, Result};

    pub use crate::{Config, IndexKind, JoinMode, Reducer};

    pub use crate::{Observation, Region, RegionId};

    pub use geo::{MultiPolygon, Point, Polygon};

    pub use crate::compute::spatial::{area, centroid, contains, repair};
}
