//! In-memory stand-in for the geo records service.
//!
//! Records are stored per layer and ordered by id. Every write appends the
//! record's position to its history. Lookup endpoints (reverse geocoding,
//! density, containment, overlap, boundaries) answer from fixed fixtures.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

pub const API_VERSION: &str = "0.1";
pub const SIGNATURE_SCHEME: &str = "GEO-HMAC-SHA256";

const DEFAULT_RADIUS_KM: f64 = 10.0;
const DEFAULT_PAGE_SIZE: usize = 10;
const EARTH_RADIUS_KM: f64 = 6371.0;
const GEOHASH_ALPHABET: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";
const DAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
}

impl Geometry {
    /// `(lat, lon)` of a point geometry.
    fn point(&self) -> Option<(f64, f64)> {
        if self.kind != "Point" {
            return None;
        }
        let coords = self.coordinates.as_array()?;
        match coords.as_slice() {
            [lon, lat] => Some((lat.as_f64()?, lon.as_f64()?)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct FeatureCollectionInput {
    pub features: Vec<Feature>,
}

#[derive(Default)]
pub struct Store {
    layers: HashMap<String, BTreeMap<String, Feature>>,
    /// Newest position first.
    history: HashMap<(String, String), Vec<Geometry>>,
}

impl Store {
    fn put(&mut self, layer: &str, feature: Feature) -> Result<(), String> {
        if feature.geometry.point().is_none() {
            return Err(format!("record `{}` must have a Point geometry", feature.id));
        }
        let mut entry = feature.geometry.clone();
        entry.created = feature.created;
        self.history
            .entry((layer.to_string(), feature.id.clone()))
            .or_default()
            .insert(0, entry);
        self.layers
            .entry(layer.to_string())
            .or_default()
            .insert(feature.id.clone(), feature);
        Ok(())
    }

    fn get(&self, layer: &str, id: &str) -> Option<&Feature> {
        self.layers.get(layer)?.get(id)
    }

    fn remove(&mut self, layer: &str, id: &str) -> Option<Feature> {
        let removed = self.layers.get_mut(layer)?.remove(id)?;
        self.history.remove(&(layer.to_string(), id.to_string()));
        Some(removed)
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    let api = Router::new()
        .route("/endpoints.json", get(endpoints))
        .route("/records/{file}", post(bulk_update))
        .route(
            "/records/{layer}/{file}",
            get(get_record).put(put_record).delete(delete_record),
        )
        .route("/records/{layer}/{sub}/{file}", get(record_subresource))
        .route("/nearby/address/{file}", get(reverse_geocode))
        .route("/density/{day}/{file}", get(density_day))
        .route("/density/{day}/{hour}/{file}", get(density_hour))
        .route("/contains/{file}", get(contains))
        .route("/overlaps/{file}", get(overlaps))
        .route("/boundary/{file}", get(boundary))
        .layer(middleware::from_fn(require_signature))
        .with_state(db);
    Router::new().nest(&format!("/{API_VERSION}"), api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn api_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "code": status.as_u16(), "message": message })),
    )
        .into_response()
}

fn no_such_record() -> Response {
    api_error(StatusCode::NOT_FOUND, "No such record")
}

async fn require_signature(request: Request, next: Next) -> Response {
    let signed = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(&format!("{SIGNATURE_SCHEME} ")));
    if !signed {
        return api_error(StatusCode::UNAUTHORIZED, "Missing or malformed signature");
    }
    next.run(request).await
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

async fn put_record(
    State(db): State<Db>,
    Path((layer, file)): Path<(String, String)>,
    Json(feature): Json<Feature>,
) -> Response {
    let Some(id) = file.strip_suffix(".json") else {
        return no_such_record();
    };
    if feature.id != id {
        return api_error(StatusCode::BAD_REQUEST, "Record id does not match the URL");
    }
    match db.write().await.put(&layer, feature) {
        Ok(()) => {
            debug!(%layer, %id, "stored record");
            StatusCode::ACCEPTED.into_response()
        }
        Err(message) => api_error(StatusCode::BAD_REQUEST, &message),
    }
}

async fn bulk_update(
    State(db): State<Db>,
    Path(file): Path<String>,
    Json(input): Json<FeatureCollectionInput>,
) -> Response {
    let Some(layer) = file.strip_suffix(".json") else {
        return no_such_record();
    };
    let mut store = db.write().await;
    let count = input.features.len();
    for feature in input.features {
        if let Err(message) = store.put(layer, feature) {
            return api_error(StatusCode::BAD_REQUEST, &message);
        }
    }
    info!(%layer, count, "stored record batch");
    StatusCode::ACCEPTED.into_response()
}

async fn get_record(
    State(db): State<Db>,
    Path((layer, file)): Path<(String, String)>,
) -> Response {
    let Some(id) = file.strip_suffix(".json") else {
        return no_such_record();
    };
    match db.read().await.get(&layer, id) {
        Some(feature) => Json(feature.clone()).into_response(),
        None => no_such_record(),
    }
}

async fn delete_record(
    State(db): State<Db>,
    Path((layer, file)): Path<(String, String)>,
) -> Response {
    let Some(id) = file.strip_suffix(".json") else {
        return no_such_record();
    };
    match db.write().await.remove(&layer, id) {
        Some(_) => StatusCode::ACCEPTED.into_response(),
        None => no_such_record(),
    }
}

// ---------------------------------------------------------------------------
// Paginated queries
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub radius: Option<String>,
    pub types: Option<String>,
    pub limit: Option<String>,
    pub cursor: Option<String>,
}

impl PageParams {
    /// Empty filters are a validation error, not "no filter".
    fn reject_empty(&self) -> Result<(), Response> {
        for (name, value) in [
            ("radius", &self.radius),
            ("types", &self.types),
            ("limit", &self.limit),
            ("cursor", &self.cursor),
        ] {
            if value.as_deref() == Some("") {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    &format!("Empty value for `{name}`"),
                ));
            }
        }
        Ok(())
    }

    fn limit(&self) -> Result<usize, Response> {
        match self.limit.as_deref() {
            None => Ok(DEFAULT_PAGE_SIZE),
            Some(raw) => match raw.parse::<usize>() {
                Ok(0) | Err(_) => Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "limit must be a positive integer",
                )),
                Ok(limit) => Ok(limit),
            },
        }
    }

    fn offset(&self) -> Result<usize, Response> {
        match self.cursor.as_deref() {
            None => Ok(0),
            Some(raw) => raw
                .strip_prefix('c')
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid cursor")),
        }
    }

    fn radius_km(&self) -> Result<f64, Response> {
        match self.radius.as_deref() {
            None => Ok(DEFAULT_RADIUS_KM),
            Some(raw) => raw
                .parse()
                .map_err(|_| api_error(StatusCode::BAD_REQUEST, "radius must be a number")),
        }
    }
}

/// Slice one page out of `items`. The cursor is the offset of the next
/// page and is only returned when more items remain.
pub fn paginate<T: Clone>(items: &[T], offset: usize, limit: usize) -> (Vec<T>, Option<String>) {
    let start = offset.min(items.len());
    let end = start.saturating_add(limit).min(items.len());
    let next = (end < items.len()).then(|| format!("c{end}"));
    (items[start..end].to_vec(), next)
}

async fn record_subresource(
    State(db): State<Db>,
    Path((layer, sub, file)): Path<(String, String, String)>,
    Query(params): Query<PageParams>,
) -> Response {
    if let Err(response) = params.reject_empty() {
        return response;
    }
    if sub == "nearby" {
        return match file.strip_suffix(".json") {
            Some(center) => nearby(&db, &layer, center, &params).await,
            None => no_such_record(),
        };
    }
    if file == "history.json" {
        return history(&db, &layer, &sub, &params).await;
    }
    no_such_record()
}

async fn nearby(db: &Db, layer: &str, center: &str, params: &PageParams) -> Response {
    let (limit, offset) = match (params.limit(), params.offset()) {
        (Ok(limit), Ok(offset)) => (limit, offset),
        (Err(response), _) | (_, Err(response)) => return response,
    };
    let types: Vec<&str> = params
        .types
        .as_deref()
        .map(|t| t.split(',').collect())
        .unwrap_or_default();

    let matcher: Box<dyn Fn(f64, f64) -> bool + Send> =
        if let Some((lat, lon)) = parse_lat_lon(center) {
            let radius = match params.radius_km() {
                Ok(radius) => radius,
                Err(response) => return response,
            };
            Box::new(move |la, lo| distance_km(lat, lon, la, lo) <= radius)
        } else if let Some((south, north, west, east)) = geohash_bounds(center) {
            Box::new(move |la, lo| (south..=north).contains(&la) && (west..=east).contains(&lo))
        } else {
            return api_error(StatusCode::BAD_REQUEST, "Center must be `lat,lon` or a geohash");
        };

    let store = db.read().await;
    let matches: Vec<Feature> = store
        .layers
        .get(layer)
        .into_iter()
        .flat_map(|records| records.values())
        .filter(|feature| {
            types.is_empty()
                || feature
                    .properties
                    .get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|kind| types.contains(&kind))
        })
        .filter(|feature| {
            feature
                .geometry
                .point()
                .is_some_and(|(la, lo)| matcher(la, lo))
        })
        .cloned()
        .collect();

    let (features, next_cursor) = paginate(&matches, offset, limit);
    let mut body = json!({ "type": "FeatureCollection", "features": features });
    if let Some(cursor) = next_cursor {
        body["next_cursor"] = Value::from(cursor);
    }
    Json(body).into_response()
}

async fn history(db: &Db, layer: &str, id: &str, params: &PageParams) -> Response {
    let (limit, offset) = match (params.limit(), params.offset()) {
        (Ok(limit), Ok(offset)) => (limit, offset),
        (Err(response), _) | (_, Err(response)) => return response,
    };
    let store = db.read().await;
    if store.get(layer, id).is_none() {
        return no_such_record();
    }
    let entries = store
        .history
        .get(&(layer.to_string(), id.to_string()))
        .map(Vec::as_slice)
        .unwrap_or_default();

    let (geometries, next_cursor) = paginate(entries, offset, limit);
    let mut body = json!({ "type": "GeometryCollection", "geometries": geometries });
    if let Some(cursor) = next_cursor {
        body["next_cursor"] = Value::from(cursor);
    }
    Json(body).into_response()
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

async fn reverse_geocode(Path(file): Path<String>) -> Response {
    let Some((lat, lon)) = file.strip_suffix(".json").and_then(parse_lat_lon) else {
        return api_error(StatusCode::BAD_REQUEST, "Expected `lat,lon.json`");
    };
    Json(json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [lon, lat] },
        "properties": {
            "country": "US",
            "state_name": "Colorado",
            "state_code": "CO",
            "county_name": "Boulder",
            "county_code": "013",
            "place_name": "Boulder",
            "street": "Pearl St",
            "street_number": "1600",
            "postal_code": "80302",
            "distance": 0.05
        }
    }))
    .into_response()
}

fn density_feature(day: &str, hour: u8, lat: f64, lon: f64) -> Value {
    let half = 0.0025;
    json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [lon - half, lat - half],
                [lon + half, lat - half],
                [lon + half, lat + half],
                [lon - half, lat + half],
                [lon - half, lat - half]
            ]]
        },
        "properties": {
            "dayname": day,
            "hour": hour,
            "worldwide_rank": 5,
            "city_rank": 8,
            "local_rank": 10,
            "trending_rank": 0
        }
    })
}

fn density_center(day: &str, file: &str) -> Result<(f64, f64), Response> {
    if !DAYS.contains(&day) {
        return Err(api_error(StatusCode::BAD_REQUEST, "Unknown day"));
    }
    file.strip_suffix(".json")
        .and_then(parse_lat_lon)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Expected `lat,lon.json`"))
}

async fn density_hour(Path((day, hour, file)): Path<(String, String, String)>) -> Response {
    let (lat, lon) = match density_center(&day, &file) {
        Ok(center) => center,
        Err(response) => return response,
    };
    match hour.parse::<u8>() {
        Ok(hour) if hour < 24 => Json(density_feature(&day, hour, lat, lon)).into_response(),
        _ => api_error(StatusCode::BAD_REQUEST, "hour must be 0-23"),
    }
}

async fn density_day(Path((day, file)): Path<(String, String)>) -> Response {
    let (lat, lon) = match density_center(&day, &file) {
        Ok(center) => center,
        Err(response) => return response,
    };
    let features: Vec<Value> = (0..24).map(|hour| density_feature(&day, hour, lat, lon)).collect();
    Json(json!({ "type": "FeatureCollection", "features": features })).into_response()
}

/// A named region with a lon/lat bounding box `[west, south, east, north]`.
struct BoundaryFixture {
    id: &'static str,
    name: &'static str,
    kind: &'static str,
    bounds: [f64; 4],
}

impl BoundaryFixture {
    fn contains(&self, lat: f64, lon: f64) -> bool {
        let [west, south, east, north] = self.bounds;
        (west..=east).contains(&lon) && (south..=north).contains(&lat)
    }

    fn intersects(&self, south: f64, west: f64, north: f64, east: f64) -> bool {
        let [b_west, b_south, b_east, b_north] = self.bounds;
        !(b_east < west || b_west > east || b_north < south || b_south > north)
    }

    fn summary(&self) -> Value {
        json!({ "id": self.id, "name": self.name, "type": self.kind, "bounds": self.bounds })
    }

    fn feature(&self) -> Value {
        let [west, south, east, north] = self.bounds;
        json!({
            "type": "Feature",
            "id": self.id,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [west, south], [east, south], [east, north], [west, north], [west, south]
                ]]
            },
            "properties": { "id": self.id, "name": self.name, "type": self.kind }
        })
    }
}

const BOUNDARIES: &[BoundaryFixture] = &[
    BoundaryFixture {
        id: "Country:US:9z",
        name: "United States",
        kind: "Country",
        bounds: [-125.0, 24.5, -66.9, 49.4],
    },
    BoundaryFixture {
        id: "Province:CO:9x",
        name: "Colorado",
        kind: "Province",
        bounds: [-109.06, 36.99, -102.04, 41.0],
    },
    BoundaryFixture {
        id: "County:Boulder:9xj5",
        name: "Boulder",
        kind: "County",
        bounds: [-105.69, 39.91, -105.05, 40.26],
    },
    BoundaryFixture {
        id: "City:Boulder:9xj5sm",
        name: "Boulder",
        kind: "City",
        bounds: [-105.30, 39.96, -105.18, 40.09],
    },
    BoundaryFixture {
        id: "Postal:80302:9xj5",
        name: "80302",
        kind: "Postal",
        bounds: [-105.40, 39.99, -105.27, 40.06],
    },
    BoundaryFixture {
        id: "Neighborhood:Chautauqua:9xj5s",
        name: "Chautauqua",
        kind: "Neighborhood",
        bounds: [-105.29, 40.00, -105.27, 40.02],
    },
    BoundaryFixture {
        id: "Tract:08013012300:9xj5s",
        name: "08013012300",
        kind: "Census Tract",
        bounds: [-105.30, 40.00, -105.26, 40.03],
    },
    BoundaryFixture {
        id: "Urban Area:Denver-Aurora:9xj",
        name: "Denver--Aurora, CO",
        kind: "Urban Area",
        bounds: [-105.30, 39.53, -104.60, 40.10],
    },
    BoundaryFixture {
        id: "DMA:Denver:9x",
        name: "Denver",
        kind: "DMA",
        bounds: [-109.06, 37.0, -102.0, 41.0],
    },
    BoundaryFixture {
        id: "Province:MI:dp",
        name: "Michigan",
        kind: "Province",
        bounds: [-90.42, 41.70, -82.41, 48.31],
    },
    BoundaryFixture {
        id: "Province:WI:dp",
        name: "Wisconsin",
        kind: "Province",
        bounds: [-92.89, 42.49, -86.25, 47.08],
    },
    BoundaryFixture {
        id: "Province:Bauchi:s1zj73",
        name: "Bauchi",
        kind: "Province",
        bounds: [8.5, 9.5, 11.0, 12.5],
    },
];

async fn contains(Path(file): Path<String>) -> Response {
    let Some((lat, lon)) = file.strip_suffix(".json").and_then(parse_lat_lon) else {
        return api_error(StatusCode::BAD_REQUEST, "Expected `lat,lon.json`");
    };
    let found: Vec<Value> = BOUNDARIES
        .iter()
        .filter(|b| b.contains(lat, lon))
        .map(BoundaryFixture::summary)
        .collect();
    Json(found).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct OverlapParams {
    pub limit: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

async fn overlaps(Path(file): Path<String>, Query(params): Query<OverlapParams>) -> Response {
    let corners: Option<Vec<f64>> = file
        .strip_suffix(".json")
        .and_then(|s| s.split(',').map(|c| c.trim().parse().ok()).collect());
    let Some([south, west, north, east]) = corners.and_then(|c| <[f64; 4]>::try_from(c).ok()) else {
        return api_error(StatusCode::BAD_REQUEST, "Expected `south,west,north,east.json`");
    };
    if params.kind.as_deref() == Some("") || params.limit.as_deref() == Some("") {
        return api_error(StatusCode::BAD_REQUEST, "Empty filter value");
    }
    let limit = match params.limit.as_deref().map(str::parse::<usize>) {
        None => usize::MAX,
        Some(Ok(limit)) if limit > 0 => limit,
        Some(_) => return api_error(StatusCode::BAD_REQUEST, "limit must be a positive integer"),
    };

    let found: Vec<Value> = BOUNDARIES
        .iter()
        .filter(|b| params.kind.as_deref().map_or(true, |kind| b.kind == kind))
        .filter(|b| b.intersects(south, west, north, east))
        .take(limit)
        .map(BoundaryFixture::summary)
        .collect();
    Json(found).into_response()
}

async fn boundary(Path(file): Path<String>) -> Response {
    let id = file.strip_suffix(".json").unwrap_or(&file);
    match BOUNDARIES.iter().find(|b| b.id == id) {
        Some(fixture) => Json(fixture.feature()).into_response(),
        None => api_error(StatusCode::NOT_FOUND, "No such boundary"),
    }
}

async fn endpoints() -> Json<Value> {
    Json(json!([
        { "endpoint": "GET /records/:layer/:id.json", "description": "Fetch one record" },
        { "endpoint": "PUT /records/:layer/:id.json", "description": "Store one record" },
        { "endpoint": "DELETE /records/:layer/:id.json", "description": "Delete one record" },
        { "endpoint": "POST /records/:layer.json", "description": "Store a batch of records" },
        { "endpoint": "GET /records/:layer/:id/history.json", "description": "Position history" },
        { "endpoint": "GET /records/:layer/nearby/:center.json", "description": "Nearby records" },
        { "endpoint": "GET /nearby/address/:lat,:lon.json", "description": "Reverse geocode" },
        { "endpoint": "GET /density/:day/:hour/:lat,:lon.json", "description": "Density tile" },
        { "endpoint": "GET /contains/:lat,:lon.json", "description": "Containing boundaries" },
        { "endpoint": "GET /overlaps/:s,:w,:n,:e.json", "description": "Overlapping boundaries" },
        { "endpoint": "GET /boundary/:id.json", "description": "Boundary polygon" }
    ]))
}

// ---------------------------------------------------------------------------
// Geometry helpers
// ---------------------------------------------------------------------------

pub fn parse_lat_lon(s: &str) -> Option<(f64, f64)> {
    let (lat, lon) = s.split_once(',')?;
    Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

/// Great-circle distance in kilometres.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Cell of a geohash as `(south, north, west, east)`.
pub fn geohash_bounds(hash: &str) -> Option<(f64, f64, f64, f64)> {
    if hash.is_empty() {
        return None;
    }
    let mut lat = (-90.0_f64, 90.0_f64);
    let mut lon = (-180.0_f64, 180.0_f64);
    let mut even = true;
    for c in hash.bytes() {
        let index = GEOHASH_ALPHABET
            .iter()
            .position(|&b| b == c.to_ascii_lowercase())?;
        for bit in (0..5).rev() {
            let range = if even { &mut lon } else { &mut lat };
            let mid = (range.0 + range.1) / 2.0;
            if (index >> bit) & 1 == 1 {
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even = !even;
        }
    }
    Some((lat.0, lat.1, lon.0, lon.1))
}
