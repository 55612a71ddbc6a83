//! Record shapes and the capability set the client operates on.
//!
//! # Design
//! The request layer never looks at a concrete record type. It only uses
//! `GeoRecord`: identity, position and properties, plus the conversion to
//! and from the GeoJSON `Feature` that goes over the wire. Both shapes
//! store `layer` and `type` inside the feature's `properties`.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::error::GeoError;
use crate::types::{Feature, Geometry};

const LAYER_KEY: &str = "layer";
const TYPE_KEY: &str = "type";
const DEFAULT_RECORD_TYPE: &str = "object";

/// Capability set shared by every record shape.
pub trait GeoRecord: Sized + Send + 'static {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: impl Into<String>);

    fn layer(&self) -> &str;
    fn set_layer(&mut self, layer: impl Into<String>);

    fn latitude(&self) -> f64;
    fn set_latitude(&mut self, latitude: f64);
    fn longitude(&self) -> f64;
    fn set_longitude(&mut self, longitude: f64);

    /// `layer` and `type` read the record's layer and type; every other
    /// name reads the open property map.
    fn property(&self, name: &str) -> Option<Value>;
    fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>);

    /// Encode as the wire feature.
    fn to_feature(&self) -> Feature;

    /// Decode from a wire feature. Fails if the feature has no id or is not
    /// a point.
    fn from_feature(feature: Feature) -> Result<Self, GeoError>;
}

/// Flat record: plain fields plus an open property map.
///
/// `properties` never holds `layer` or `type`; setting either through
/// `set_property` updates `layer` / `record_type` instead, so both survive
/// the trip through the wire feature.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultRecord {
    pub id: String,
    pub layer: String,
    pub record_type: String,
    pub created: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub properties: Map<String, Value>,
}

impl DefaultRecord {
    pub fn new(
        id: impl Into<String>,
        layer: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: id.into(),
            layer: layer.into(),
            record_type: DEFAULT_RECORD_TYPE.to_string(),
            created: Utc::now().timestamp(),
            latitude,
            longitude,
            properties: Map::new(),
        }
    }
}

impl GeoRecord for DefaultRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    fn layer(&self) -> &str {
        &self.layer
    }

    fn set_layer(&mut self, layer: impl Into<String>) {
        self.layer = layer.into();
    }

    fn latitude(&self) -> f64 {
        self.latitude
    }

    fn set_latitude(&mut self, latitude: f64) {
        self.latitude = latitude;
    }

    fn longitude(&self) -> f64 {
        self.longitude
    }

    fn set_longitude(&mut self, longitude: f64) {
        self.longitude = longitude;
    }

    fn property(&self, name: &str) -> Option<Value> {
        match name {
            LAYER_KEY => Some(Value::from(self.layer.clone())),
            TYPE_KEY => Some(Value::from(self.record_type.clone())),
            _ => self.properties.get(name).cloned(),
        }
    }

    fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        if name == LAYER_KEY {
            self.layer = into_text(value.into());
        } else if name == TYPE_KEY {
            self.record_type = into_text(value.into());
        } else {
            self.properties.insert(name, value.into());
        }
    }

    fn to_feature(&self) -> Feature {
        let mut feature = Feature::new(Geometry::point(self.latitude, self.longitude));
        feature.id = Some(self.id.clone());
        feature.created = Some(self.created);
        feature.properties = self.properties.clone();
        feature
            .properties
            .insert(LAYER_KEY.to_string(), Value::from(self.layer.clone()));
        feature
            .properties
            .insert(TYPE_KEY.to_string(), Value::from(self.record_type.clone()));
        feature
    }

    fn from_feature(mut feature: Feature) -> Result<Self, GeoError> {
        let (latitude, longitude) = point_of(&feature)?;
        let id = feature
            .id
            .take()
            .ok_or_else(|| GeoError::Decode("feature has no id".to_string()))?;
        let layer = feature
            .properties
            .remove(LAYER_KEY)
            .map(into_text)
            .unwrap_or_default();
        let record_type = feature
            .properties
            .remove(TYPE_KEY)
            .map(into_text)
            .unwrap_or_else(|| DEFAULT_RECORD_TYPE.to_string());

        Ok(Self {
            id,
            layer,
            record_type,
            created: feature.created.unwrap_or_default(),
            latitude,
            longitude,
            properties: feature.properties,
        })
    }
}

/// Record kept in its GeoJSON feature shape.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoJsonRecord {
    feature: Feature,
}

impl GeoJsonRecord {
    pub fn new(
        id: impl Into<String>,
        layer: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        let mut feature = Feature::new(Geometry::point(latitude, longitude));
        feature.id = Some(id.into());
        feature.created = Some(Utc::now().timestamp());
        feature
            .properties
            .insert(LAYER_KEY.to_string(), Value::from(layer.into()));
        feature
            .properties
            .insert(TYPE_KEY.to_string(), Value::from(DEFAULT_RECORD_TYPE));
        Self { feature }
    }

    pub fn feature(&self) -> &Feature {
        &self.feature
    }

    pub fn into_feature(self) -> Feature {
        self.feature
    }

    fn set_point(&mut self, latitude: f64, longitude: f64) {
        self.feature.geometry = Geometry::point(latitude, longitude);
    }
}

impl GeoRecord for GeoJsonRecord {
    fn id(&self) -> &str {
        self.feature.id.as_deref().unwrap_or_default()
    }

    fn set_id(&mut self, id: impl Into<String>) {
        self.feature.id = Some(id.into());
    }

    fn layer(&self) -> &str {
        self.feature
            .properties
            .get(LAYER_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    fn set_layer(&mut self, layer: impl Into<String>) {
        self.feature
            .properties
            .insert(LAYER_KEY.to_string(), Value::from(layer.into()));
    }

    fn latitude(&self) -> f64 {
        self.feature.geometry.as_point().map(|(lat, _)| lat).unwrap_or_default()
    }

    fn set_latitude(&mut self, latitude: f64) {
        let longitude = self.longitude();
        self.set_point(latitude, longitude);
    }

    fn longitude(&self) -> f64 {
        self.feature.geometry.as_point().map(|(_, lon)| lon).unwrap_or_default()
    }

    fn set_longitude(&mut self, longitude: f64) {
        let latitude = self.latitude();
        self.set_point(latitude, longitude);
    }

    fn property(&self, name: &str) -> Option<Value> {
        self.feature.properties.get(name).cloned()
    }

    fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.feature.properties.insert(name.into(), value.into());
    }

    fn to_feature(&self) -> Feature {
        self.feature.clone()
    }

    fn from_feature(feature: Feature) -> Result<Self, GeoError> {
        point_of(&feature)?;
        if feature.id.is_none() {
            return Err(GeoError::Decode("feature has no id".to_string()));
        }
        Ok(Self { feature })
    }
}

fn point_of(feature: &Feature) -> Result<(f64, f64), GeoError> {
    feature.geometry.as_point().ok_or_else(|| {
        GeoError::Decode(format!(
            "expected a Point geometry, got {}",
            feature.geometry.kind
        ))
    })
}

/// Layer and type are strings on the wire; other JSON values keep their
/// JSON text.
fn into_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
