//! Network layer.
//!
//! # Design
//! A `Transport` performs one HTTP round-trip for a fully built and signed
//! `HttpRequest`. Non-2xx statuses come back as data so the decoder can
//! turn them into `Api` errors; only failures to complete the exchange
//! become `Transport` errors. The trait is the seam tests use to stand in
//! for the network.

use std::time::Duration;

use tracing::debug;

use crate::error::GeoError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes one HTTP exchange.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, GeoError>;
}

/// Blocking transport backed by a shared ureq agent.
pub struct UreqTransport {
    agent: ureq::Agent,
    user_agent: String,
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport")
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();

        Self {
            agent,
            user_agent: user_agent.into(),
        }
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
    user_agent: &str,
) -> ureq::RequestBuilder<B> {
    builder = builder.header("user-agent", user_agent);
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn transport_error(err: ureq::Error) -> GeoError {
    match err {
        ureq::Error::Timeout(which) => GeoError::Transport(format!("timed out ({which:?})")),
        other => GeoError::Transport(other.to_string()),
    }
}

/// Body bytes as text. Invalid UTF-8 is a decode error on a 2xx status and
/// is replaced lossily on any other status.
fn response_text(status: u16, bytes: Vec<u8>) -> Result<String, GeoError> {
    match String::from_utf8(bytes) {
        Ok(body) => Ok(body),
        Err(e) if (200..300).contains(&status) => Err(GeoError::Decode(format!(
            "response body is not valid UTF-8: {}",
            e.utf8_error()
        ))),
        Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, GeoError> {
        let url = request.url.as_str();
        let headers = request.headers.as_slice();
        let body = request.body.as_deref().unwrap_or_default().as_bytes();

        let result = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), headers, &self.user_agent).call(),
            HttpMethod::Delete => {
                with_headers(self.agent.delete(url), headers, &self.user_agent).call()
            }
            HttpMethod::Post => {
                with_headers(self.agent.post(url), headers, &self.user_agent).send(body)
            }
            HttpMethod::Put => {
                with_headers(self.agent.put(url), headers, &self.user_agent).send(body)
            }
        };
        let mut response = result.map_err(transport_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let bytes = response.body_mut().read_to_vec().map_err(transport_error)?;
        debug!(status, bytes = bytes.len(), "read response body");
        let body = response_text(status, bytes)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
