//! Client configuration.
//!
//! `ClientConfig` can be built in code or read from the environment:
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `GEO_API_URL` | service root, e.g. `https://geo.example.com` | required |
//! | `GEO_API_VERSION` | API version path segment | `0.1` |
//! | `GEO_API_TIMEOUT_SECS` | per-request timeout | `30` |
//! | `GEO_API_KEY` / `GEO_API_SECRET` | signing credentials | unsigned |

use std::time::Duration;

use url::Url;

use crate::error::GeoError;

pub const DEFAULT_API_VERSION: &str = "0.1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("geo-core/", env!("CARGO_PKG_VERSION"));

/// API key/secret pair used for request signing.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_version: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub credentials: Option<Credentials>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            credentials: None,
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(key, secret));
        self
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, GeoError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GeoError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let base_url = var("GEO_API_URL")
            .ok_or_else(|| GeoError::InvalidRequest("GEO_API_URL is not set".to_string()))?;
        let mut config = Self::new(base_url);

        if let Some(version) = var("GEO_API_VERSION") {
            config.api_version = version;
        }
        if let Some(secs) = var("GEO_API_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                GeoError::InvalidRequest(format!("GEO_API_TIMEOUT_SECS is not a number: {secs}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        config.credentials = match (var("GEO_API_KEY"), var("GEO_API_SECRET")) {
            (Some(key), Some(secret)) => Some(Credentials::new(key, secret)),
            (None, None) => None,
            _ => {
                return Err(GeoError::InvalidRequest(
                    "GEO_API_KEY and GEO_API_SECRET must be set together".to_string(),
                ))
            }
        };

        Ok(config)
    }

    /// Base URL with the API version appended, e.g. `http://host/0.1/`.
    pub fn versioned_base(&self) -> Result<Url, GeoError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            GeoError::InvalidRequest(format!("invalid base URL `{}`: {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                GeoError::InvalidRequest(format!("`{}` cannot be a base URL", self.base_url))
            })?
            .pop_if_empty()
            .push(&self.api_version)
            .push("");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_url_is_set() {
        let config = ClientConfig::from_lookup(lookup(&[("GEO_API_URL", "http://h")])).unwrap();
        assert_eq!(config.api_version, "0.1");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.credentials.is_none());
    }

    #[test]
    fn all_variables_are_read() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("GEO_API_URL", "http://h"),
            ("GEO_API_VERSION", "1.0"),
            ("GEO_API_TIMEOUT_SECS", "5"),
            ("GEO_API_KEY", "k"),
            ("GEO_API_SECRET", "s"),
        ]))
        .unwrap();
        assert_eq!(config.api_version, "1.0");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.credentials, Some(Credentials::new("k", "s")));
    }

    #[test]
    fn missing_url_is_an_error() {
        assert!(ClientConfig::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn half_credentials_are_an_error() {
        let vars = lookup(&[("GEO_API_URL", "http://h"), ("GEO_API_KEY", "k")]);
        let err = ClientConfig::from_lookup(vars).unwrap_err();
        assert!(err.to_string().contains("GEO_API_SECRET"));
    }

    #[test]
    fn bad_timeout_is_an_error() {
        let result = ClientConfig::from_lookup(lookup(&[
            ("GEO_API_URL", "http://h"),
            ("GEO_API_TIMEOUT_SECS", "soon"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn versioned_base_appends_version_once() {
        let config = ClientConfig::new("http://localhost:3000/");
        assert_eq!(config.versioned_base().unwrap().as_str(), "http://localhost:3000/0.1/");
        let config = ClientConfig::new("http://localhost:3000/geo").with_api_version("2");
        assert_eq!(config.versioned_base().unwrap().as_str(), "http://localhost:3000/geo/2/");
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let rendered = format!("{:?}", Credentials::new("key", "hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
