//! Spatial query descriptions for the paginated endpoints.
//!
//! Queries stay mutable so a caller can feed a returned cursor back in and
//! re-issue the same query for the next page. Every parameter is always
//! emitted; unset ones go out empty and are stripped by `sanitize_query`
//! before dispatch.

/// Where a nearby search is centred.
#[derive(Debug, Clone, PartialEq)]
pub enum NearbyCenter {
    LatLon { latitude: f64, longitude: f64 },
    Geohash(String),
}

/// A nearby search within one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub layer: String,
    pub center: NearbyCenter,
    /// Search radius in kilometres. Only sent for lat/lon searches.
    pub radius: Option<f64>,
    pub types: Vec<String>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

impl NearbyQuery {
    pub fn lat_lon(layer: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self::with_center(layer, NearbyCenter::LatLon { latitude, longitude })
    }

    pub fn geohash(layer: impl Into<String>, geohash: impl Into<String>) -> Self {
        Self::with_center(layer, NearbyCenter::Geohash(geohash.into()))
    }

    fn with_center(layer: impl Into<String>, center: NearbyCenter) -> Self {
        Self {
            layer: layer.into(),
            center,
            radius: None,
            types: Vec::new(),
            limit: None,
            cursor: None,
        }
    }

    pub fn with_radius(mut self, radius_km: f64) -> Self {
        self.radius = Some(radius_km);
        self
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn set_limit(&mut self, limit: u32) {
        self.limit = Some(limit);
    }

    pub fn set_cursor(&mut self, cursor: Option<String>) {
        self.cursor = cursor;
    }

    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let radius = match self.center {
            NearbyCenter::LatLon { .. } => self.radius.map(|r| r.to_string()).unwrap_or_default(),
            NearbyCenter::Geohash(_) => String::new(),
        };
        vec![
            ("radius", radius),
            ("types", self.types.join(",")),
            ("limit", optional(self.limit)),
            ("cursor", self.cursor.clone().unwrap_or_default()),
        ]
    }
}

/// The position history of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub record_id: String,
    pub layer: String,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

impl HistoryQuery {
    pub fn new(record_id: impl Into<String>, layer: impl Into<String>, limit: u32) -> Self {
        Self {
            record_id: record_id.into(),
            layer: layer.into(),
            limit: Some(limit),
            cursor: None,
        }
    }

    pub fn set_limit(&mut self, limit: u32) {
        self.limit = Some(limit);
    }

    pub fn set_cursor(&mut self, cursor: Option<String>) {
        self.cursor = cursor;
    }

    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("limit", optional(self.limit)),
            ("cursor", self.cursor.clone().unwrap_or_default()),
        ]
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_nearby_params_are_emitted_empty() {
        let query = NearbyQuery::lat_lon("layer", 1.0, 2.0);
        assert_eq!(
            query.query_params(),
            vec![
                ("radius", String::new()),
                ("types", String::new()),
                ("limit", String::new()),
                ("cursor", String::new()),
            ]
        );
    }

    #[test]
    fn geohash_query_never_sends_radius() {
        let query = NearbyQuery::geohash("layer", "s1z0g").with_radius(5.0).with_limit(2);
        let params = query.query_params();
        assert_eq!(params[0], ("radius", String::new()));
        assert_eq!(params[2], ("limit", "2".to_string()));
    }

    #[test]
    fn types_are_comma_joined() {
        let query = NearbyQuery::lat_lon("layer", 1.0, 2.0).with_types(["object", "place"]);
        assert_eq!(query.query_params()[1], ("types", "object,place".to_string()));
    }

    #[test]
    fn cursor_can_be_set_between_pages() {
        let mut query = HistoryQuery::new("id", "layer", 2);
        query.set_cursor(Some("c2".to_string()));
        query.set_limit(100);
        assert_eq!(
            query.query_params(),
            vec![("limit", "100".to_string()), ("cursor", "c2".to_string())]
        );
    }
}
