//! Error types for the geo API client.
//!
//! # Design
//! Callers need to tell three situations apart: the request never reached
//! the service (`Transport`), the service rejected it (`Api`), and the
//! service said yes but the reply was not understood (`Decode`). The
//! remaining variants cover failures before a request exists and failures
//! of the background scheduler. `ErrorKind` collapses the variants into
//! those categories for callers that only branch on the category.

use std::fmt;

use serde::Deserialize;

use crate::http::HttpResponse;

/// Errors returned by every client operation.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    /// The service could not be reached or its reply could not be read.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A 2xx response whose body does not match the expected shape.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// The request payload could not be encoded.
    #[error("could not encode request: {0}")]
    Serialization(String),

    /// The call could not be turned into a request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Background execution was requested where it cannot run.
    #[error("future mode is not supported: {0}")]
    FutureModeUnsupported(String),

    /// A background operation ended without producing a result.
    #[error("background task failed: {0}")]
    Task(String),
}

/// Coarse category of a `GeoError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Api,
    Decode,
    Request,
    Scheduler,
}

impl GeoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeoError::Transport(_) => ErrorKind::Transport,
            GeoError::Api(_) => ErrorKind::Api,
            GeoError::Decode(_) => ErrorKind::Decode,
            GeoError::Serialization(_) | GeoError::InvalidRequest(_) => ErrorKind::Request,
            GeoError::FutureModeUnsupported(_) | GeoError::Task(_) => ErrorKind::Scheduler,
        }
    }

    /// The service error, if the service produced one.
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            GeoError::Api(err) => Some(err),
            _ => None,
        }
    }

    /// True when the service reported that the target does not exist.
    pub fn is_not_found(&self) -> bool {
        self.api().is_some_and(ApiError::is_not_found)
    }
}

/// Machine-readable failure class reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    BadRequest,
    Unauthorized,
    Forbidden,
    RateLimited,
    ServerError,
    Other(u16),
}

impl ErrorCode {
    pub fn from_code(code: u16) -> Self {
        match code {
            400 => ErrorCode::BadRequest,
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            429 => ErrorCode::RateLimited,
            500..=599 => ErrorCode::ServerError,
            other => ErrorCode::Other(other),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::NotFound => f.write_str("not found"),
            ErrorCode::BadRequest => f.write_str("bad request"),
            ErrorCode::Unauthorized => f.write_str("unauthorized"),
            ErrorCode::Forbidden => f.write_str("forbidden"),
            ErrorCode::RateLimited => f.write_str("rate limited"),
            ErrorCode::ServerError => f.write_str("server error"),
            ErrorCode::Other(code) => write!(f, "code {code}"),
        }
    }
}

/// A structured failure returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("HTTP {status} ({code}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub code: ErrorCode,
    pub message: String,
}

/// Wire shape of an error body: `{"code": 404, "message": "No such record"}`.
#[derive(Deserialize)]
struct ErrorBody {
    code: Option<u16>,
    message: Option<String>,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }

    /// Build an `ApiError` from a non-2xx response.
    ///
    /// The body's `code` wins over the HTTP status when present. Bodies that
    /// are empty or not in the error shape fall back to the status alone,
    /// keeping the raw text as the message.
    pub fn from_response(response: &HttpResponse) -> Self {
        let raw = response.body.trim();
        let parsed = serde_json::from_str::<ErrorBody>(raw).ok();

        let code = parsed
            .as_ref()
            .and_then(|body| body.code)
            .unwrap_or(response.status);
        let message = match parsed.and_then(|body| body.message) {
            Some(message) => message,
            None if !raw.is_empty() => raw.to_string(),
            None => reason_phrase(response.status).to_string(),
        };

        Self {
            status: response.status,
            code: ErrorCode::from_code(code),
            message,
        }
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unexpected Status",
    }
}
