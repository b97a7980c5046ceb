//! Ingestion validation for points and observation values.
//!
//! Reductions assume finite inputs; anything else is rejected here before a
//! stage starts rather than discovered halfway through.

use crate::error::{AggregateError, ChoroplethError, Result};
use choropleth_types::observation::Observation;
use geo::Point;

/// Validates a point has finite coordinates.
///
/// # Examples
///
/// ```
/// use choropleth::compute::validation::validate_point;
/// use geo::Point;
///
/// assert!(validate_point(&Point::new(121_000.0, 487_000.0)).is_ok());
/// assert!(validate_point(&Point::new(f64::NAN, 0.0)).is_err());
/// ```
pub fn validate_point(point: &Point) -> Result<()> {
    let (x, y) = (point.x(), point.y());

    if !x.is_finite() {
        return Err(ChoroplethError::InvalidInput(format!(
            "x must be finite, got: {}",
            x
        )));
    }

    if !y.is_finite() {
        return Err(ChoroplethError::InvalidInput(format!(
            "y must be finite, got: {}",
            y
        )));
    }

    Ok(())
}

/// Validates every observation value is finite.
pub fn validate_observation_values(
    observations: &[Observation],
) -> std::result::Result<(), AggregateError> {
    match observations
        .iter()
        .enumerate()
        .find(|(_, obs)| !obs.value().is_finite())
    {
        Some((index, obs)) => Err(AggregateError::NonFiniteValue {
            index,
            source_id: obs.source_id().to_string(),
            value: obs.value(),
        }),
        None => Ok(()),
    }
}

/// Validates observation locations and values.
///
/// # Examples
///
/// ```
/// use choropleth::compute::validation::validate_observations;
/// use choropleth::Observation;
///
/// let observations = vec![
///     Observation::from_xy(1.0, 2.0, 10.0, "a"),
///     Observation::from_xy(1.0, 2.0, f64::NAN, "b"), // Invalid
/// ];
/// assert!(validate_observations(&observations).is_err());
/// ```
pub fn validate_observations(observations: &[Observation]) -> Result<()> {
    for (idx, obs) in observations.iter().enumerate() {
        validate_point(obs.point()).map_err(|e| {
            ChoroplethError::InvalidInput(format!(
                "Observation at index {} ({}): {}",
                idx,
                obs.source_id(),
                e
            ))
        })?;
    }
    validate_observation_values(observations)?;
    Ok(())
}
