//! Per-resource entry points for the geo API.
//!
//! # Design
//! Every operation is split into a `build_*` method that resolves the
//! endpoint template and produces an `HttpRequest` without touching the
//! network, and an executing method that hands the request plus the
//! matching response handler to the `TaskScheduler`. The executing method
//! returns whatever the scheduler produced: a finished value while future
//! mode is off, a pending handle while it is on.
//!
//! `GeoClient` is an ordinary value. Share it behind an `Arc` when several
//! threads issue calls; the executor and scheduler are safe for that.

use std::sync::Arc;

use chrono::Weekday;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::decode::{JsonHandler, RecordHandler, RecordPageHandler, ResponseHandler, TypedHandler};
use crate::endpoints::EndpointRegistry;
use crate::error::GeoError;
use crate::executor::RequestExecutor;
use crate::http::{HttpMethod, HttpRequest};
use crate::query::{HistoryQuery, NearbyCenter, NearbyQuery};
use crate::record::GeoRecord;
use crate::scheduler::{Call, TaskScheduler};
use crate::signing::{HmacSigner, RequestSigner, Unsigned};
use crate::transport::{Transport, UreqTransport};
use crate::types::{Boundary, Envelope, Feature, FeatureCollection, GeometryCollection, Page};

/// Client for the geo API.
#[derive(Debug)]
pub struct GeoClient {
    base: Url,
    endpoints: EndpointRegistry,
    executor: Arc<RequestExecutor>,
    scheduler: TaskScheduler,
}

impl GeoClient {
    /// Client that talks HTTP through ureq and signs with the configured
    /// credentials, if any.
    pub fn new(config: ClientConfig) -> Result<Self, GeoError> {
        let transport = Arc::new(UreqTransport::new(config.timeout, config.user_agent.clone()));
        let signer: Arc<dyn RequestSigner> = match &config.credentials {
            Some(credentials) => Arc::new(HmacSigner::new(
                credentials.key.clone(),
                credentials.secret.clone(),
            )),
            None => Arc::new(Unsigned),
        };
        Self::with_parts(&config, transport, signer)
    }

    /// Client with an injected transport and signer.
    pub fn with_parts(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        signer: Arc<dyn RequestSigner>,
    ) -> Result<Self, GeoError> {
        Ok(Self {
            base: config.versioned_base()?,
            endpoints: EndpointRegistry::standard(),
            executor: Arc::new(RequestExecutor::new(transport, signer)),
            scheduler: TaskScheduler::new(),
        })
    }

    pub fn with_scheduler(mut self, scheduler: TaskScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_endpoints(mut self, endpoints: EndpointRegistry) -> Self {
        self.endpoints = endpoints;
        self
    }

    // -----------------------------------------------------------------------
    // Execution mode
    // -----------------------------------------------------------------------

    /// Run subsequent calls in the background (`true`) or inline (`false`).
    pub fn set_future_mode(&self, enabled: bool) -> Result<(), GeoError> {
        self.scheduler.set_future_mode(enabled)
    }

    pub fn future_mode(&self) -> bool {
        self.scheduler.future_mode()
    }

    pub fn supports_future_tasks(&self) -> bool {
        self.scheduler.supports_future_tasks()
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    pub fn build_update<R: GeoRecord>(&self, record: &R) -> Result<HttpRequest, GeoError> {
        let url = self.url("record", &record_target(record)?, &[])?;
        let body = to_json(&record.to_feature())?;
        Ok(HttpRequest::new(HttpMethod::Put, url).with_json_body(body))
    }

    /// Store one record. The service answers with an empty body.
    pub fn update<R: GeoRecord>(&self, record: &R) -> Result<Call<()>, GeoError> {
        let request = self.build_update(record)?;
        self.submit_write(request)
    }

    /// Build the bulk write for `records`, which must all share one layer.
    pub fn build_update_many<R: GeoRecord>(&self, records: &[R]) -> Result<HttpRequest, GeoError> {
        let first = records
            .first()
            .ok_or_else(|| GeoError::InvalidRequest("no records to update".to_string()))?;
        let layer = first.layer();
        if let Some(other) = records.iter().find(|r| r.layer() != layer) {
            return Err(GeoError::InvalidRequest(format!(
                "records span several layers (`{layer}` and `{}`)",
                other.layer()
            )));
        }
        for record in records {
            record_target(record)?;
        }

        let url = self.url("records", &[layer], &[])?;
        let collection = FeatureCollection::new(records.iter().map(R::to_feature).collect());
        let body = to_json(&collection)?;
        Ok(HttpRequest::new(HttpMethod::Post, url).with_json_body(body))
    }

    /// Store several records of one layer in a single request. An empty
    /// slice completes without contacting the service.
    pub fn update_many<R: GeoRecord>(&self, records: &[R]) -> Result<Call<()>, GeoError> {
        if records.is_empty() {
            return self.scheduler.submit(|| Ok(()));
        }
        let request = self.build_update_many(records)?;
        self.submit_write(request)
    }

    pub fn build_retrieve<R: GeoRecord>(&self, record: &R) -> Result<HttpRequest, GeoError> {
        let url = self.url("record", &record_target(record)?, &[])?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    /// Fetch the stored version of the record identified by `record`'s id
    /// and layer, decoded into the same shape.
    pub fn retrieve<R: GeoRecord>(&self, record: &R) -> Result<Call<R>, GeoError> {
        let request = self.build_retrieve(record)?;
        self.submit_read(request, RecordHandler::<R>::new())
    }

    pub fn build_delete<R: GeoRecord>(&self, record: &R) -> Result<HttpRequest, GeoError> {
        let url = self.url("record", &record_target(record)?, &[])?;
        Ok(HttpRequest::new(HttpMethod::Delete, url))
    }

    pub fn delete<R: GeoRecord>(&self, record: &R) -> Result<Call<()>, GeoError> {
        let request = self.build_delete(record)?;
        self.submit_write(request)
    }

    // -----------------------------------------------------------------------
    // Paginated queries
    // -----------------------------------------------------------------------

    pub fn build_nearby(&self, query: &NearbyQuery) -> Result<HttpRequest, GeoError> {
        let params = query.query_params();
        let url = match &query.center {
            NearbyCenter::LatLon {
                latitude,
                longitude,
            } => {
                let (lat, lon) = (latitude.to_string(), longitude.to_string());
                self.url("nearby", &[query.layer.as_str(), lat.as_str(), lon.as_str()], &params)?
            }
            NearbyCenter::Geohash(hash) => {
                self.url("nearby_geohash", &[query.layer.as_str(), hash.as_str()], &params)?
            }
        };
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    /// One page of records near the query's centre. Feed
    /// `Page::next_cursor` back through `NearbyQuery::set_cursor` for the
    /// next page.
    pub fn nearby<R: GeoRecord>(&self, query: &NearbyQuery) -> Result<Call<Page<R>>, GeoError> {
        let request = self.build_nearby(query)?;
        self.submit_read(request, RecordPageHandler::<R>::new())
    }

    /// Same search as `nearby`, returned as raw GeoJSON.
    pub fn nearby_features(
        &self,
        query: &NearbyQuery,
    ) -> Result<Call<FeatureCollection>, GeoError> {
        let request = self.build_nearby(query)?;
        self.submit_read(request, TypedHandler::<FeatureCollection>::new())
    }

    pub fn build_history(&self, query: &HistoryQuery) -> Result<HttpRequest, GeoError> {
        let url = self.url(
            "history",
            &[query.layer.as_str(), query.record_id.as_str()],
            &query.query_params(),
        )?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    /// Past positions of one record, newest first.
    pub fn history(&self, query: &HistoryQuery) -> Result<Call<GeometryCollection>, GeoError> {
        let request = self.build_history(query)?;
        self.submit_read(request, TypedHandler::<GeometryCollection>::new())
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn build_reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<HttpRequest, GeoError> {
        let (lat, lon) = (latitude.to_string(), longitude.to_string());
        let url = self.url("nearby_address", &[lat.as_str(), lon.as_str()], &[])?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    /// The nearest street address to a point.
    pub fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Call<Feature>, GeoError> {
        let request = self.build_reverse_geocode(latitude, longitude)?;
        self.submit_read(request, TypedHandler::<Feature>::new())
    }

    pub fn build_density(
        &self,
        day: Weekday,
        hour: u8,
        latitude: f64,
        longitude: f64,
    ) -> Result<HttpRequest, GeoError> {
        if hour > 23 {
            return Err(GeoError::InvalidRequest(format!("hour must be 0-23, got {hour}")));
        }
        let (day, hour) = (day_name(day), hour.to_string());
        let (lat, lon) = (latitude.to_string(), longitude.to_string());
        let url = self.url("density_hour", &[day, hour.as_str(), lat.as_str(), lon.as_str()], &[])?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    /// Population density tile around a point for one hour of one weekday.
    pub fn density(
        &self,
        day: Weekday,
        hour: u8,
        latitude: f64,
        longitude: f64,
    ) -> Result<Call<Feature>, GeoError> {
        let request = self.build_density(day, hour, latitude, longitude)?;
        self.submit_read(request, TypedHandler::<Feature>::new())
    }

    pub fn build_density_day(
        &self,
        day: Weekday,
        latitude: f64,
        longitude: f64,
    ) -> Result<HttpRequest, GeoError> {
        let day = day_name(day);
        let (lat, lon) = (latitude.to_string(), longitude.to_string());
        let url = self.url("density_day", &[day, lat.as_str(), lon.as_str()], &[])?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    /// Density tiles around a point for every hour of one weekday.
    pub fn density_day(
        &self,
        day: Weekday,
        latitude: f64,
        longitude: f64,
    ) -> Result<Call<FeatureCollection>, GeoError> {
        let request = self.build_density_day(day, latitude, longitude)?;
        self.submit_read(request, TypedHandler::<FeatureCollection>::new())
    }

    pub fn build_contains(&self, latitude: f64, longitude: f64) -> Result<HttpRequest, GeoError> {
        let (lat, lon) = (latitude.to_string(), longitude.to_string());
        let url = self.url("contains", &[lat.as_str(), lon.as_str()], &[])?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    /// Boundaries that contain a point.
    pub fn contains(&self, latitude: f64, longitude: f64) -> Result<Call<Vec<Boundary>>, GeoError> {
        let request = self.build_contains(latitude, longitude)?;
        self.submit_read(request, TypedHandler::<Vec<Boundary>>::new())
    }

    pub fn build_overlaps(
        &self,
        envelope: &Envelope,
        limit: Option<u32>,
        kind: Option<&str>,
    ) -> Result<HttpRequest, GeoError> {
        let corners = [envelope.south, envelope.west, envelope.north, envelope.east]
            .map(|c| c.to_string());
        let args: Vec<&str> = corners.iter().map(String::as_str).collect();
        let params = [
            ("limit", limit.map(|l| l.to_string()).unwrap_or_default()),
            ("type", kind.unwrap_or_default().to_string()),
        ];
        let url = self.url("overlaps", &args, &params)?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    /// Boundaries that intersect an envelope, optionally filtered by type.
    pub fn overlaps(
        &self,
        envelope: &Envelope,
        limit: Option<u32>,
        kind: Option<&str>,
    ) -> Result<Call<Vec<Boundary>>, GeoError> {
        let request = self.build_overlaps(envelope, limit, kind)?;
        self.submit_read(request, TypedHandler::<Vec<Boundary>>::new())
    }

    pub fn build_boundary(&self, feature_id: &str) -> Result<HttpRequest, GeoError> {
        let url = self.url("boundary", &[feature_id], &[])?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    /// The full polygon of one boundary.
    pub fn boundary(&self, feature_id: &str) -> Result<Call<Feature>, GeoError> {
        let request = self.build_boundary(feature_id)?;
        self.submit_read(request, TypedHandler::<Feature>::new())
    }

    pub fn build_endpoints(&self) -> Result<HttpRequest, GeoError> {
        let url = self.url("endpoints", &[], &[])?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    /// The service's own description of its endpoints.
    pub fn endpoints(&self) -> Result<Call<Value>, GeoError> {
        let request = self.build_endpoints()?;
        self.submit_read(request, JsonHandler)
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn url(
        &self,
        name: &str,
        args: &[&str],
        params: &[(&str, String)],
    ) -> Result<String, GeoError> {
        let mut url = self.endpoints.resolve(&self.base, name, args)?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.to_string())
    }

    /// Run a read; an empty success body breaks the contract.
    fn submit_read<H>(&self, request: HttpRequest, handler: H) -> Result<Call<H::Output>, GeoError>
    where
        H: ResponseHandler + 'static,
        H::Output: Send + 'static,
    {
        let executor = Arc::clone(&self.executor);
        self.scheduler.submit(move || {
            executor
                .execute(request, &handler)?
                .ok_or_else(|| GeoError::Decode("expected a response body, got none".to_string()))
        })
    }

    /// Run a write; any payload the service sends back is ignored.
    fn submit_write(&self, request: HttpRequest) -> Result<Call<()>, GeoError> {
        let executor = Arc::clone(&self.executor);
        self.scheduler
            .submit(move || executor.execute(request, &JsonHandler).map(|_| ()))
    }
}

/// `[layer, id]` for the record endpoints. Both must be non-empty.
fn record_target<R: GeoRecord>(record: &R) -> Result<[&str; 2], GeoError> {
    if record.layer().is_empty() {
        return Err(GeoError::InvalidRequest("record has no layer".to_string()));
    }
    if record.id().is_empty() {
        return Err(GeoError::InvalidRequest("record has no id".to_string()));
    }
    Ok([record.layer(), record.id()])
}

fn to_json<T: Serialize>(value: &T) -> Result<String, GeoError> {
    serde_json::to_string(value).map_err(|e| GeoError::Serialization(e.to_string()))
}

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::http::HttpResponse;
    use crate::record::{DefaultRecord, GeoJsonRecord};

    /// Answers every request with a canned response and keeps what it saw.
    struct Canned {
        status: u16,
        body: String,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Canned {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body: body.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl Transport for Canned {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, GeoError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(HttpResponse {
                status: self.status,
                headers: Vec::new(),
                body: self.body.clone(),
            })
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new("http://localhost:3000")
    }

    fn client() -> GeoClient {
        client_with(Canned::new(200, "{}"))
    }

    fn client_with(transport: Arc<Canned>) -> GeoClient {
        GeoClient::with_parts(&config(), transport, Arc::new(Unsigned)).unwrap()
    }

    const FEATURE: &str = r#"{"type":"Feature","id":"r1","created":5,
        "geometry":{"type":"Point","coordinates":[-105.0,40.0]},
        "properties":{"layer":"test.layer","type":"object","name":"derek"}}"#;

    #[test]
    fn build_update_produces_put_with_feature_body() {
        let mut record = DefaultRecord::new("r1", "test.layer", 40.0, -105.0);
        record.set_property("name", "derek");
        let req = client().build_update(&record).unwrap();

        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.url, "http://localhost:3000/0.1/records/test.layer/r1.json");
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["type"], "Feature");
        assert_eq!(body["id"], "r1");
        assert_eq!(body["geometry"]["coordinates"], serde_json::json!([-105.0, 40.0]));
        assert_eq!(body["properties"]["name"], "derek");
        assert_eq!(body["properties"]["layer"], "test.layer");
    }

    #[test]
    fn build_update_many_posts_a_collection() {
        let records = vec![
            DefaultRecord::new("a", "layer", 1.0, 1.0),
            DefaultRecord::new("b", "layer", 2.0, 2.0),
        ];
        let req = client().build_update_many(&records).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/0.1/records/layer.json");
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["type"], "FeatureCollection");
        assert_eq!(body["features"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn build_update_many_rejects_mixed_layers() {
        let records = vec![
            GeoJsonRecord::new("a", "one", 1.0, 1.0),
            GeoJsonRecord::new("b", "two", 2.0, 2.0),
        ];
        let err = client().build_update_many(&records).unwrap_err();
        assert!(matches!(err, GeoError::InvalidRequest(_)));
    }

    #[test]
    fn update_many_with_no_records_sends_nothing() {
        let transport = Canned::new(500, "");
        let client = client_with(transport.clone());
        client.update_many::<DefaultRecord>(&[]).unwrap().wait().unwrap();
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn record_without_id_is_rejected_before_dispatch() {
        let record = DefaultRecord::new("", "layer", 0.0, 0.0);
        let err = client().build_retrieve(&record).unwrap_err();
        assert!(matches!(err, GeoError::InvalidRequest(_)));
    }

    #[test]
    fn build_retrieve_and_delete_encode_spaces() {
        let record = DefaultRecord::new("space space", "layer", 0.0, 0.0);
        let get = client().build_retrieve(&record).unwrap();
        assert_eq!(get.method, HttpMethod::Get);
        assert_eq!(get.url, "http://localhost:3000/0.1/records/layer/space%20space.json");
        assert!(get.body.is_none());
        let delete = client().build_delete(&record).unwrap();
        assert_eq!(delete.method, HttpMethod::Delete);
        assert_eq!(delete.url, get.url);
    }

    #[test]
    fn build_nearby_emits_every_parameter() {
        let query = NearbyQuery::lat_lon("layer", 10.0, 10.0).with_limit(2);
        let req = client().build_nearby(&query).unwrap();
        assert_eq!(
            req.url,
            "http://localhost:3000/0.1/records/layer/nearby/10,10.json?radius=&types=&limit=2&cursor="
        );
    }

    #[test]
    fn build_nearby_by_geohash() {
        let query = NearbyQuery::geohash("layer", "s1z0g").with_types(["object"]);
        let req = client().build_nearby(&query).unwrap();
        assert!(req
            .url
            .starts_with("http://localhost:3000/0.1/records/layer/nearby/s1z0g.json?"));
        assert!(req.url.contains("types=object"));
    }

    #[test]
    fn nearby_request_is_sanitized_before_sending() {
        let transport = Canned::new(200, r#"{"type":"FeatureCollection","features":[]}"#);
        let client = client_with(transport.clone());
        let query = NearbyQuery::lat_lon("layer", 10.0, 10.0).with_limit(2);
        let page = client.nearby::<DefaultRecord>(&query).unwrap().wait().unwrap();
        assert!(page.records.is_empty());
        assert!(page.next_cursor.is_none());
        let seen = transport.seen.lock().unwrap();
        assert_eq!(
            seen[0].url,
            "http://localhost:3000/0.1/records/layer/nearby/10,10.json?limit=2"
        );
    }

    #[test]
    fn build_history_uses_record_and_layer() {
        let mut query = HistoryQuery::new("r 1", "layer", 2);
        query.set_cursor(Some("c2".into()));
        let req = client().build_history(&query).unwrap();
        assert_eq!(
            req.url,
            "http://localhost:3000/0.1/records/layer/r%201/history.json?limit=2&cursor=c2"
        );
    }

    #[test]
    fn build_lookups_resolve_templates() {
        let c = client();
        assert_eq!(
            c.build_reverse_geocode(40.5, -105.25).unwrap().url,
            "http://localhost:3000/0.1/nearby/address/40.5,-105.25.json"
        );
        assert_eq!(
            c.build_density(Weekday::Wed, 12, 40.5, -105.25).unwrap().url,
            "http://localhost:3000/0.1/density/wed/12/40.5,-105.25.json"
        );
        assert_eq!(
            c.build_density_day(Weekday::Sun, 1.0, 2.0).unwrap().url,
            "http://localhost:3000/0.1/density/sun/1,2.json"
        );
        assert_eq!(
            c.build_contains(40.5, -105.25).unwrap().url,
            "http://localhost:3000/0.1/contains/40.5,-105.25.json"
        );
        assert_eq!(
            c.build_overlaps(&Envelope::new(40.0, -90.0, 50.0, -80.0), Some(2), None)
                .unwrap()
                .url,
            "http://localhost:3000/0.1/overlaps/40,-90,50,-80.json?limit=2&type="
        );
        assert_eq!(
            c.build_boundary("Province:Bauchi:s1zj73").unwrap().url,
            "http://localhost:3000/0.1/boundary/Province:Bauchi:s1zj73.json"
        );
        assert_eq!(
            c.build_endpoints().unwrap().url,
            "http://localhost:3000/0.1/endpoints.json"
        );
    }

    #[test]
    fn density_rejects_out_of_range_hour() {
        let err = client().build_density(Weekday::Mon, 24, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, GeoError::InvalidRequest(_)));
    }

    #[test]
    fn retrieve_decodes_into_the_requested_shape() {
        let client = client_with(Canned::new(200, FEATURE));
        let target = GeoJsonRecord::new("r1", "test.layer", 0.0, 0.0);
        let record = client.retrieve(&target).unwrap().wait().unwrap();
        assert_eq!(record.latitude(), 40.0);
        assert_eq!(record.property("name"), Some(Value::from("derek")));
    }

    #[test]
    fn read_with_empty_body_is_a_decode_error() {
        let client = client_with(Canned::new(200, ""));
        let target = DefaultRecord::new("r1", "test.layer", 0.0, 0.0);
        let err = client.retrieve(&target).unwrap_err();
        assert!(matches!(err, GeoError::Decode(_)));
    }

    #[test]
    fn retrieve_missing_record_is_not_found() {
        let client = client_with(Canned::new(404, r#"{"code":404,"message":"No such record"}"#));
        let target = DefaultRecord::new("nope", "test.layer", 0.0, 0.0);
        let err = client.retrieve(&target).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn sync_mode_returns_ready_values() {
        let client = client_with(Canned::new(202, ""));
        let record = DefaultRecord::new("r1", "layer", 0.0, 0.0);
        let call = client.update(&record).unwrap();
        assert!(!call.is_pending());
    }

    #[test]
    fn future_mode_returns_handles_with_the_same_result() {
        let client = client_with(Canned::new(200, FEATURE));
        let target = DefaultRecord::new("r1", "test.layer", 0.0, 0.0);
        let sync_record = client.retrieve(&target).unwrap().wait().unwrap();

        client.set_future_mode(true).unwrap();
        assert!(client.future_mode());
        let call = client.retrieve(&target).unwrap();
        assert!(call.is_pending());
        let async_record = call.into_handle().unwrap().wait().unwrap();
        assert_eq!(async_record, sync_record);
    }

    #[test]
    fn future_mode_defers_api_errors_to_the_handle() {
        let client = client_with(Canned::new(404, ""));
        client.set_future_mode(true).unwrap();
        let target = DefaultRecord::new("gone", "layer", 0.0, 0.0);
        let call = client.retrieve(&target).unwrap();
        assert!(call.wait().unwrap_err().is_not_found());
    }

    #[test]
    fn inline_only_client_reports_future_mode_unsupported() {
        let client = client().with_scheduler(TaskScheduler::inline_only());
        assert!(!client.supports_future_tasks());
        assert!(matches!(
            client.set_future_mode(true),
            Err(GeoError::FutureModeUnsupported(_))
        ));
    }

    #[test]
    fn custom_endpoint_templates_are_used() {
        let mut endpoints = EndpointRegistry::standard();
        endpoints.register("boundary", "shapes/{}.json");
        let client = client().with_endpoints(endpoints);
        assert_eq!(
            client.build_boundary("x").unwrap().url,
            "http://localhost:3000/0.1/shapes/x.json"
        );
    }
}
