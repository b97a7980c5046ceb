use geo::Point;
use serde::{Deserialize, Serialize};

/// A point-located observation carrying one numeric attribute.
///
/// `source_id` is opaque and need not be unique (several observations may
/// share a postal code); observations are addressed by their position in
/// the input slice.
///
/// # Examples
///
/// ```
/// use choropleth_types::observation::Observation;
///
/// let obs = Observation::from_xy(121_000.0, 487_000.0, 250_000.0, "1011AB");
/// assert_eq!(obs.point().x(), 121_000.0);
/// assert_eq!(obs.source_id(), "1011AB");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    point: Point<f64>,
    value: f64,
    source_id: String,
}

impl Observation {
    pub fn new(point: Point<f64>, value: f64, source_id: impl Into<String>) -> Self {
        Self {
            point,
            value,
            source_id: source_id.into(),
        }
    }

    pub fn from_xy(x: f64, y: f64, value: f64, source_id: impl Into<String>) -> Self {
        Self::new(Point::new(x, y), value, source_id)
    }

    #[inline]
    pub fn point(&self) -> &Point<f64> {
        &self.point
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}
