//! Error types for the choropleth engine.
//!
//! Each pipeline stage has its own error enum so callers can recover per stage:
//! a [`GeometryError`] aborts only the region being repaired, a
//! [`ClassifierError`] aborts only classification and leaves aggregates usable.

use choropleth_types::region::RegionId;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ChoroplethError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// The ring or polygon cannot be turned into a simple polygon.
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("non-finite coordinate in {0}")]
    NonFinite(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    /// Every value was the "no data" sentinel (or there were no values).
    #[error("no data to classify")]
    NoData,

    #[error("insufficient data: {classes} classes requested but only {values} values")]
    InsufficientData { classes: usize, values: usize },

    #[error("class count must be at least 1, got {0}")]
    InvalidClassCount(usize),

    #[error("{classes} classes exceeds the class limit of {limit}")]
    TooManyClasses { classes: usize, limit: usize },

    #[error("{values} values exceeds the classification limit of {limit}")]
    TooManyValues { values: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregateError {
    #[error("observation {index} ({source_id}) has non-finite value {value}")]
    NonFiniteValue {
        index: usize,
        source_id: String,
        value: f64,
    },

    #[error("join result covers {joined} observations but {given} were supplied")]
    LengthMismatch { joined: usize, given: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegridError {
    #[error("grid must have at least one column and one row, got {n_x}x{n_y}")]
    InvalidGrid { n_x: usize, n_y: usize },

    #[error("aggregate rows do not match the region set ({rows} rows, {regions} regions)")]
    RowMismatch { rows: usize, regions: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChoroplethError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Regrid(#[from] RegridError),

    #[error("duplicate region id: {0}")]
    DuplicateRegion(RegionId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),
}
