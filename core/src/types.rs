//! GeoJSON payload shapes exchanged with the service.
//!
//! # Design
//! These mirror the service schema but are defined independently of the
//! mock server; the integration tests catch drift between the two.
//! Coordinates stay as raw JSON because points, polygons and multipolygons
//! all share the `Geometry` type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn feature_type() -> String {
    "Feature".to_string()
}

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

fn geometry_collection_type() -> String {
    "GeometryCollection".to_string()
}

/// A GeoJSON geometry. History entries also carry a `created` timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
}

impl Geometry {
    /// A point geometry. GeoJSON orders coordinates as `[lon, lat]`.
    pub fn point(latitude: f64, longitude: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: Value::from(vec![longitude, latitude]),
            created: None,
        }
    }

    /// `(latitude, longitude)` when this is a well-formed point.
    pub fn as_point(&self) -> Option<(f64, f64)> {
        if self.kind != "Point" {
            return None;
        }
        match self.coordinates.as_array()?.as_slice() {
            [lon, lat] => Some((lat.as_f64()?, lon.as_f64()?)),
            _ => None,
        }
    }
}

/// A GeoJSON feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            kind: feature_type(),
            id: None,
            created: None,
            geometry,
            properties: Map::new(),
        }
    }
}

/// A page of features. `next_cursor` is set when more results remain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: feature_collection_type(),
            features,
            next_cursor: None,
        }
    }
}

/// A page of geometries, as returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryCollection {
    #[serde(rename = "type", default = "geometry_collection_type")]
    pub kind: String,
    #[serde(default)]
    pub geometries: Vec<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Summary of a boundary polygon returned by containment and overlap
/// lookups. Fields the client does not model are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub bounds: Option<Vec<f64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A lat/lon bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Envelope {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }
}

/// One page of decoded records plus the cursor for the next page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    pub records: Vec<R>,
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_uses_lon_lat_order() {
        let geometry = Geometry::point(40.0, -105.0);
        assert_eq!(geometry.coordinates, serde_json::json!([-105.0, 40.0]));
        assert_eq!(geometry.as_point(), Some((40.0, -105.0)));
    }

    #[test]
    fn polygon_is_not_a_point() {
        let geometry: Geometry = serde_json::from_str(
            r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}"#,
        )
        .unwrap();
        assert!(geometry.as_point().is_none());
    }

    #[test]
    fn feature_defaults_missing_type_and_properties() {
        let raw = r#"{"geometry":{"type":"Point","coordinates":[1.0,2.0]}}"#;
        let feature: Feature = serde_json::from_str(raw).unwrap();
        assert_eq!(feature.kind, "Feature");
        assert!(feature.properties.is_empty());
        assert!(feature.id.is_none());
    }

    #[test]
    fn boundary_keeps_unmodelled_fields() {
        let boundary: Boundary = serde_json::from_str(
            r#"{"id":"County:Boulder:9xj5","name":"Boulder","type":"County","abbr":"BO"}"#,
        )
        .unwrap();
        assert_eq!(boundary.kind.as_deref(), Some("County"));
        assert_eq!(boundary.extra["abbr"], "BO");
        assert!(boundary.bounds.is_none());
    }

    #[test]
    fn collection_cursor_is_optional() {
        let collection: GeometryCollection =
            serde_json::from_str(r#"{"type":"GeometryCollection","geometries":[]}"#).unwrap();
        assert!(collection.next_cursor.is_none());
    }
}
