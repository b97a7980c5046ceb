//! # choropleth-types
//!
//! Core data types for the choropleth engine.
//!
//! - **Regions**: `Region`, `RegionId`, `AttributeValue`
//! - **Observations**: `Observation`
//! - **Bounding boxes**: `BoundingBox2D`
//!
//! Geometry is carried as the `geo` crate's primitives (`Point`, `LineString`
//! rings, `Polygon`, `MultiPolygon`). All types are serializable with Serde.
//!
//! ## Examples
//!
//! ```rust
//! use choropleth_types::region::Region;
//! use choropleth_types::observation::Observation;
//! use geo::{polygon, MultiPolygon, Point};
//!
//! let square = polygon![
//!     (x: 0.0, y: 0.0),
//!     (x: 10.0, y: 0.0),
//!     (x: 10.0, y: 10.0),
//!     (x: 0.0, y: 10.0),
//! ];
//! let region = Region::new("0101", MultiPolygon::new(vec![square]));
//! let obs = Observation::new(Point::new(5.0, 5.0), 1200.0, "1011AB");
//!
//! assert_eq!(region.id().as_str(), "0101");
//! assert_eq!(obs.value(), 1200.0);
//! ```

pub mod bbox;
pub mod observation;
pub mod region;

pub use geo::{LineString, MultiPolygon, Point, Polygon};

/// A ring of a polygon: a closed `LineString`.
pub type Ring = LineString<f64>;
