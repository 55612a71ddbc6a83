//! Request signing.
//!
//! `HmacSigner` signs `METHOD\nURL\nDATE\nNONCE\nhex(sha256(body))` with
//! HMAC-SHA256 and sends the result in the `authorization` header
//! alongside the date and nonce it covered. The service recomputes the
//! same string to verify the caller.

use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::GeoError;
use crate::http::HttpRequest;

/// Algorithm tag placed in front of the authorization header value.
pub const SIGNATURE_SCHEME: &str = "GEO-HMAC-SHA256";
pub const DATE_HEADER: &str = "x-geo-date";
pub const NONCE_HEADER: &str = "x-geo-nonce";

/// Attaches authentication material to an outbound request.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, request: &mut HttpRequest) -> Result<(), GeoError>;
}

/// Sends requests without credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsigned;

impl RequestSigner for Unsigned {
    fn sign(&self, _request: &mut HttpRequest) -> Result<(), GeoError> {
        Ok(())
    }
}

/// HMAC-SHA256 signer keyed by an API key/secret pair.
#[derive(Clone)]
pub struct HmacSigner {
    key: String,
    secret: String,
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl HmacSigner {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Sign with an explicit timestamp and nonce.
    pub fn sign_at(
        &self,
        request: &mut HttpRequest,
        now: DateTime<Utc>,
        nonce: &str,
    ) -> Result<(), GeoError> {
        let date = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}\n{}",
            request.method,
            request.url,
            date,
            nonce,
            hex_sha256(request.body.as_deref().unwrap_or_default().as_bytes()),
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes())
            .map_err(|e| GeoError::InvalidRequest(format!("unusable signing secret: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        request.headers.retain(|(name, _)| {
            !name.eq_ignore_ascii_case(DATE_HEADER)
                && !name.eq_ignore_ascii_case(NONCE_HEADER)
                && !name.eq_ignore_ascii_case("authorization")
        });
        request.headers.push((DATE_HEADER.to_string(), date));
        request.headers.push((NONCE_HEADER.to_string(), nonce.to_string()));
        request.headers.push((
            "authorization".to_string(),
            format!("{SIGNATURE_SCHEME} Credential={}, Signature={signature}", self.key),
        ));
        Ok(())
    }
}

impl RequestSigner for HmacSigner {
    fn sign(&self, request: &mut HttpRequest) -> Result<(), GeoError> {
        self.sign_at(request, Utc::now(), &Uuid::new_v4().to_string())
    }
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn signing_adds_date_nonce_and_authorization() {
        let signer = HmacSigner::new("key-1", "secret");
        let mut req = HttpRequest::new(HttpMethod::Get, "http://h/0.1/records/l/a.json");
        signer.sign_at(&mut req, fixed_time(), "nonce-1").unwrap();

        assert_eq!(req.header("x-geo-date"), Some("2024-01-15T12:00:00Z"));
        assert_eq!(req.header("x-geo-nonce"), Some("nonce-1"));
        let auth = req.header("Authorization").unwrap();
        assert!(auth.starts_with("GEO-HMAC-SHA256 Credential=key-1, Signature="));
        let signature = auth.rsplit('=').next().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn signature_is_deterministic_for_fixed_inputs() {
        let signer = HmacSigner::new("k", "s");
        let mut a = HttpRequest::new(HttpMethod::Put, "http://h/x").with_json_body("{}".into());
        let mut b = a.clone();
        signer.sign_at(&mut a, fixed_time(), "n").unwrap();
        signer.sign_at(&mut b, fixed_time(), "n").unwrap();
        assert_eq!(a.header("authorization"), b.header("authorization"));
    }

    #[test]
    fn signature_covers_the_body() {
        let signer = HmacSigner::new("k", "s");
        let mut a = HttpRequest::new(HttpMethod::Put, "http://h/x").with_json_body("{}".into());
        let mut b = HttpRequest::new(HttpMethod::Put, "http://h/x").with_json_body("[]".into());
        signer.sign_at(&mut a, fixed_time(), "n").unwrap();
        signer.sign_at(&mut b, fixed_time(), "n").unwrap();
        assert_ne!(a.header("authorization"), b.header("authorization"));
    }

    #[test]
    fn resigning_replaces_previous_headers() {
        let signer = HmacSigner::new("k", "s");
        let mut req = HttpRequest::new(HttpMethod::Get, "http://h/x");
        signer.sign(&mut req).unwrap();
        signer.sign(&mut req).unwrap();
        let auth_headers = req
            .headers
            .iter()
            .filter(|(name, _)| name == "authorization")
            .count();
        assert_eq!(auth_headers, 1);
    }

    #[test]
    fn unsigned_leaves_request_untouched() {
        let mut req = HttpRequest::new(HttpMethod::Get, "http://h/x");
        Unsigned.sign(&mut req).unwrap();
        assert!(req.headers.is_empty());
    }

    #[test]
    fn debug_output_hides_secret() {
        let rendered = format!("{:?}", HmacSigner::new("visible", "hidden"));
        assert!(rendered.contains("visible"));
        assert!(!rendered.contains("hidden"));
    }
}
