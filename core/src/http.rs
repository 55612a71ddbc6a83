//! HTTP request/response descriptors and query-string sanitization.
//!
//! # Design
//! Requests and responses are plain data. `GeoClient::build_*` methods
//! produce an `HttpRequest`; the `RequestExecutor` signs it and hands it to
//! a `Transport`, which returns an `HttpResponse` for the decoder. Keeping
//! the descriptor as data means request building is testable without a
//! network, and a descriptor is never shared between calls.

use std::fmt;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound request described as plain data.
///
/// `url` is absolute and may carry a query string. The content type of a
/// body travels in `headers` like any other header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Attach a JSON body and the matching content-type header.
    pub fn with_json_body(mut self, body: String) -> Self {
        self.headers
            .push(("content-type".to_string(), "application/json".to_string()));
        self.body = Some(body);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A response described as plain data, produced by a `Transport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Strip empty-valued parameters (`key=`) from the query string of `url`.
///
/// Some endpoints reject an empty filter as a validation error instead of
/// treating it as "no filter", so `types=&q=cafe` must go out as `q=cafe`.
/// The remaining parameters keep their order. If every parameter is
/// removed the `?` goes too.
pub fn sanitize_query(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|param| !param.is_empty() && !param.ends_with('='))
        .collect();

    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", kept.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_removes_empty_parameter_in_the_middle() {
        assert_eq!(
            sanitize_query("http://h/0.1/search.json?lat=1&category=&q=foo"),
            "http://h/0.1/search.json?lat=1&q=foo"
        );
    }

    #[test]
    fn sanitize_removes_leading_empty_parameter_without_dangling_ampersand() {
        assert_eq!(
            sanitize_query("http://h/x.json?category=&q=foo"),
            "http://h/x.json?q=foo"
        );
    }

    #[test]
    fn sanitize_drops_question_mark_when_nothing_remains() {
        assert_eq!(sanitize_query("http://h/x.json?a=&b="), "http://h/x.json");
        assert_eq!(sanitize_query("http://h/x.json?"), "http://h/x.json");
    }

    #[test]
    fn sanitize_leaves_urls_without_query_alone() {
        assert_eq!(sanitize_query("http://h/x.json"), "http://h/x.json");
    }

    #[test]
    fn sanitize_collapses_doubled_separators() {
        assert_eq!(sanitize_query("http://h/x?a=1&&b=2"), "http://h/x?a=1&b=2");
    }

    #[test]
    fn json_body_sets_content_type() {
        let req = HttpRequest::new(HttpMethod::Put, "http://h/x").with_json_body("{}".into());
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.body.as_deref(), Some("{}"));
    }

    #[test]
    fn method_display_matches_wire_name() {
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }

    #[test]
    fn success_range_is_2xx() {
        let mut response = HttpResponse {
            status: 202,
            headers: Vec::new(),
            body: String::new(),
        };
        assert!(response.is_success());
        response.status = 301;
        assert!(!response.is_success());
    }
}
