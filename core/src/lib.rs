//! Client core for the geo records service.
//!
//! # Overview
//! Stores, fetches and deletes location records and runs spatial queries
//! (nearby, history, reverse geocoding, density, containment, overlap,
//! boundaries) against a remote REST service.
//!
//! # Design
//! - Every operation funnels through one pipeline: `GeoClient::build_*`
//!   produces an `HttpRequest`, the `RequestExecutor` sanitizes, signs and
//!   sends it through a `Transport`, and `decode` maps the reply to a typed
//!   value or a `GeoError`.
//! - The `TaskScheduler` decides per call whether that pipeline runs inline
//!   or on a background thread. Calls return `Call<T>`: `Ready` while
//!   future mode is off, `Pending(TaskHandle)` while it is on.
//! - Errors fall into transport, API and decode failures so callers can
//!   tell "never reached the service" from "the service said no" from "the
//!   reply made no sense".
//! - DTOs are defined independently from the mock-server crate; the
//!   integration tests catch schema drift.

pub mod client;
pub mod config;
pub mod decode;
pub mod endpoints;
pub mod error;
pub mod executor;
pub mod http;
pub mod query;
pub mod record;
pub mod scheduler;
pub mod signing;
pub mod transport;
pub mod types;

pub use client::GeoClient;
pub use config::{ClientConfig, Credentials};
pub use decode::{JsonHandler, RecordHandler, RecordPageHandler, ResponseHandler, TypedHandler};
pub use endpoints::EndpointRegistry;
pub use error::{ApiError, ErrorCode, ErrorKind, GeoError};
pub use executor::RequestExecutor;
pub use http::{sanitize_query, HttpMethod, HttpRequest, HttpResponse};
pub use query::{HistoryQuery, NearbyCenter, NearbyQuery};
pub use record::{DefaultRecord, GeoJsonRecord, GeoRecord};
pub use scheduler::{Call, TaskHandle, TaskScheduler};
pub use signing::{HmacSigner, RequestSigner, Unsigned};
pub use transport::{Transport, UreqTransport};
pub use types::{Boundary, Envelope, Feature, FeatureCollection, Geometry, GeometryCollection, Page};
