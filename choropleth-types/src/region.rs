use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier of a region (municipality code, tract id, ...).
///
/// Identifiers are ordered lexicographically; that order is the canonical
/// region order used throughout the engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(String);

impl RegionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RegionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Scalar attribute attached to a region (name, code, population, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Attribute mapping of a region, ordered by attribute name.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A named polygonal area: the unit of aggregation and shading.
///
/// # Examples
///
/// ```
/// use choropleth_types::region::{AttributeValue, Region};
/// use geo::{polygon, MultiPolygon};
///
/// let region = Region::new(
///     "GM0363",
///     MultiPolygon::new(vec![polygon![
///         (x: 0.0, y: 0.0),
///         (x: 4.0, y: 0.0),
///         (x: 4.0, y: 3.0),
///     ]]),
/// )
/// .with_attribute("name", "Amsterdam");
///
/// assert_eq!(
///     region.attribute("name"),
///     Some(&AttributeValue::Text("Amsterdam".into()))
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    id: RegionId,
    geometry: MultiPolygon<f64>,
    #[serde(default)]
    attributes: Attributes,
}

impl Region {
    pub fn new(id: impl Into<RegionId>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            id: id.into(),
            geometry,
            attributes: Attributes::new(),
        }
    }

    /// Attach an attribute, replacing any previous value under the same name.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn id(&self) -> &RegionId {
        &self.id
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Same region with its geometry replaced; used after repair.
    pub fn with_geometry(self, geometry: MultiPolygon<f64>) -> Self {
        Self { geometry, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_region_ids_order_lexicographically() {
        let mut ids = vec![RegionId::from("b"), RegionId::from("a10"), RegionId::from("a2")];
        ids.sort();
        assert_eq!(ids, vec!["a10".into(), "a2".into(), RegionId::from("b")]);
    }

    #[test]
    fn test_region_serde_roundtrip_keeps_attributes() {
        let region = Region::new(
            "r1",
            MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 0.0, y: 1.0)]]),
        )
        .with_attribute("code", 363_i64)
        .with_attribute("name", "Utrecht");

        let json = serde_json::to_string(&region).unwrap();
        let back: Region = serde_json::from_str(&json).unwrap();
        assert_eq!(back, region);
        assert_eq!(back.attribute("code"), Some(&AttributeValue::Integer(363)));
    }

    #[test]
    fn test_with_geometry_keeps_identity() {
        let region = Region::new("r1", MultiPolygon::new(vec![])).with_attribute("name", "x");
        let replaced = region.clone().with_geometry(MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 0.0, y: 1.0)
        ]]));
        assert_eq!(replaced.id(), region.id());
        assert_eq!(replaced.attributes(), region.attributes());
        assert_eq!(replaced.geometry().0.len(), 1);
    }
}
