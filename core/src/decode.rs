//! Response decoding.
//!
//! # Design
//! `decode` owns the status/body rules shared by every endpoint; the
//! per-endpoint part is a `ResponseHandler` that turns an already parsed
//! JSON value into the caller's type. A response ends up as exactly one
//! of: a handled payload, an empty success (`None`), an `Api` error, or a
//! `Decode` error.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::{ApiError, GeoError};
use crate::http::HttpResponse;
use crate::record::GeoRecord;
use crate::types::{Feature, FeatureCollection, Page};

/// Turns a parsed JSON payload into a typed value.
pub trait ResponseHandler: Send + Sync {
    type Output;

    fn handle(&self, value: Value) -> Result<Self::Output, GeoError>;
}

/// Map a response to its decoded payload or error.
///
/// A 2xx response with a blank body is a successful write and yields
/// `Ok(None)`.
pub fn decode<H: ResponseHandler>(
    response: HttpResponse,
    handler: &H,
) -> Result<Option<H::Output>, GeoError> {
    if !response.is_success() {
        let err = ApiError::from_response(&response);
        warn!(
            status = err.status,
            code = %err.code,
            message = %err.message,
            "service returned an error"
        );
        return Err(err.into());
    }

    if response.body.trim().is_empty() {
        return Ok(None);
    }

    let value: Value =
        serde_json::from_str(&response.body).map_err(|e| GeoError::Decode(e.to_string()))?;
    handler.handle(value).map(Some)
}

/// Passes the JSON value through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHandler;

impl ResponseHandler for JsonHandler {
    type Output = Value;

    fn handle(&self, value: Value) -> Result<Value, GeoError> {
        Ok(value)
    }
}

/// Deserializes the payload into `T`.
pub struct TypedHandler<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedHandler<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> ResponseHandler for TypedHandler<T> {
    type Output = T;

    fn handle(&self, value: Value) -> Result<T, GeoError> {
        from_value(value)
    }
}

/// Decodes a single feature into a record shape.
pub struct RecordHandler<R> {
    _marker: PhantomData<fn() -> R>,
}

impl<R> RecordHandler<R> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<R> Default for RecordHandler<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: GeoRecord> ResponseHandler for RecordHandler<R> {
    type Output = R;

    fn handle(&self, value: Value) -> Result<R, GeoError> {
        let feature: Feature = from_value(value)?;
        R::from_feature(feature)
    }
}

/// Decodes a feature collection into a page of records.
pub struct RecordPageHandler<R> {
    _marker: PhantomData<fn() -> R>,
}

impl<R> RecordPageHandler<R> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<R> Default for RecordPageHandler<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: GeoRecord> ResponseHandler for RecordPageHandler<R> {
    type Output = Page<R>;

    fn handle(&self, value: Value) -> Result<Page<R>, GeoError> {
        let collection: FeatureCollection = from_value(value)?;
        let records = collection
            .features
            .into_iter()
            .map(R::from_feature)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            records,
            next_cursor: collection.next_cursor,
        })
    }
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, GeoError> {
    serde_json::from_value(value).map_err(|e| GeoError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DefaultRecord;
    use crate::types::Boundary;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    const FEATURE: &str = r#"{"type":"Feature","id":"r1","created":100,
        "geometry":{"type":"Point","coordinates":[10.0,20.0]},
        "properties":{"layer":"test","type":"object","name":"derek"}}"#;

    #[test]
    fn empty_success_body_is_none() {
        let decoded = decode(response(202, ""), &JsonHandler).unwrap();
        assert!(decoded.is_none());
        let decoded = decode(response(204, "  \n"), &JsonHandler).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn object_payload_goes_through_handler() {
        let record = decode(response(200, FEATURE), &RecordHandler::<DefaultRecord>::new())
            .unwrap()
            .unwrap();
        assert_eq!(record.id, "r1");
        assert_eq!(record.latitude, 20.0);
        assert_eq!(record.longitude, 10.0);
        assert_eq!(record.properties["name"], "derek");
    }

    #[test]
    fn array_payload_goes_through_handler() {
        let boundaries = decode(
            response(200, r#"[{"id":"a"},{"id":"b","name":"B"}]"#),
            &TypedHandler::<Vec<Boundary>>::new(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[1].name.as_deref(), Some("B"));
    }

    #[test]
    fn page_handler_keeps_cursor() {
        let body = format!(
            r#"{{"type":"FeatureCollection","features":[{FEATURE}],"next_cursor":"c1"}}"#
        );
        let page = decode(response(200, &body), &RecordPageHandler::<DefaultRecord>::new())
            .unwrap()
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.next_cursor.as_deref(), Some("c1"));
    }

    #[test]
    fn invalid_json_on_success_is_decode_error() {
        let err = decode(response(200, "not json"), &JsonHandler).unwrap_err();
        assert!(matches!(err, GeoError::Decode(_)));
    }

    #[test]
    fn wrong_shape_on_success_is_decode_error() {
        let handler = RecordHandler::<DefaultRecord>::new();
        let err = decode(response(200, "[1,2,3]"), &handler).unwrap_err();
        assert!(matches!(err, GeoError::Decode(_)));
    }

    #[test]
    fn error_status_with_body_is_api_error() {
        let err = decode(
            response(404, r#"{"code":404,"message":"No such record"}"#),
            &JsonHandler,
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn error_status_with_empty_body_is_api_error() {
        let err = decode(response(500, ""), &JsonHandler).unwrap_err();
        let api = err.api().unwrap();
        assert_eq!(api.status, 500);
    }
}
