//! Compute layer: the pipeline stages.
//!
//! Geometry and indexing live in [`spatial`]; the join, aggregation,
//! classification and regridding stages build on it. Each stage reads its
//! inputs by reference and returns a new value.

pub mod aggregate;
pub mod classify;
pub mod join;
pub mod region_set;
pub mod regrid;
pub mod spatial;
pub mod validation;
