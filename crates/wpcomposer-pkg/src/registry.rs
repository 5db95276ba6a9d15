//! Existence checks against the public plugin directory.
//!
//! A plugin found on disk is only handed to the dependency manager when the
//! public directory knows it, because the dependency manager will fetch it
//! from there. The check is behind [`ExistenceChecker`] so scans can run
//! offline with [`FixedRegistry`].

use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default plugin information endpoint.
pub const DEFAULT_REGISTRY_URL: &str = "https://api.wordpress.org/plugins/info/1.0";

/// Environment variable overriding [`DEFAULT_REGISTRY_URL`].
pub const REGISTRY_URL_ENV: &str = "WPCOMPOSER_REGISTRY_URL";

/// Hard timeout for a single registry request.
pub const REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while setting up a registry client.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Outcome of asking the registry about one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCheck {
    /// The registry knows the package.
    Exists,
    /// The registry answered and does not know the package.
    Missing,
    /// No reliable answer (network error, timeout, odd response).
    Inconclusive(String),
}

impl RegistryCheck {
    /// Whether the package can be fetched from the registry.
    ///
    /// Inconclusive answers count as "no" so nothing is ever deleted on an
    /// ambiguous network state.
    #[must_use]
    pub fn exists(&self) -> bool {
        matches!(self, Self::Exists)
    }
}

impl std::fmt::Display for RegistryCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exists => write!(f, "found in registry"),
            Self::Missing => write!(f, "not in registry"),
            Self::Inconclusive(reason) => write!(f, "registry check inconclusive: {reason}"),
        }
    }
}

/// Something that can tell whether a package exists in the registry.
pub trait ExistenceChecker {
    /// Check a single package name.
    fn check(&self, name: &str) -> RegistryCheck;
}

/// Check if a name is a plausible registry slug.
///
/// Names are interpolated into a URL path, so anything outside this set is
/// rejected before a request is made.
fn is_valid_slug(name: &str) -> bool {
    if name.is_empty() || name.len() > 200 || name.starts_with('.') {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Interpret a registry response.
///
/// Only a 200 whose body is a JSON object without an `error` key counts as
/// existing. The plugin API answers unknown slugs with
/// `{"error": "Plugin not found."}`.
pub fn interpret_response(status: u16, body: &str) -> RegistryCheck {
    if status != 200 {
        return if status == 404 {
            RegistryCheck::Missing
        } else {
            RegistryCheck::Inconclusive(format!("registry returned status {status}"))
        };
    }
    match serde_json::from_str::<JsonValue>(body) {
        Ok(JsonValue::Object(map)) if map.contains_key("error") => RegistryCheck::Missing,
        Ok(JsonValue::Object(_)) => RegistryCheck::Exists,
        Ok(_) => RegistryCheck::Inconclusive("response is not a JSON object".to_string()),
        Err(e) => RegistryCheck::Inconclusive(format!("invalid JSON from registry: {e}")),
    }
}

/// Configuration for the live registry client.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URL; `/{name}.json` is appended.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent for HTTP requests.
    pub user_agent: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let base_url = std::env::var(REGISTRY_URL_ENV)
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());
        Self {
            base_url,
            timeout: REGISTRY_TIMEOUT,
            user_agent: format!("wpcomposer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Registry checker backed by blocking HTTP requests.
pub struct HttpRegistry {
    config: RegistryConfig,
    http_client: reqwest::blocking::Client,
}

impl HttpRegistry {
    /// Create a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, RegistryError> {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a client with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_config(config: RegistryConfig) -> Result<Self, RegistryError> {
        let http_client = reqwest::blocking::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { config, http_client })
    }

    /// The metadata URL for a package name.
    #[must_use]
    pub fn info_url(&self, name: &str) -> String {
        format!("{}/{}.json", self.config.base_url.trim_end_matches('/'), name)
    }
}

impl ExistenceChecker for HttpRegistry {
    fn check(&self, name: &str) -> RegistryCheck {
        if !is_valid_slug(name) {
            debug!(slug = name, "not a registry slug, skipping lookup");
            return RegistryCheck::Missing;
        }

        let url = self.info_url(name);
        let result = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .and_then(|response| {
                let status = response.status().as_u16();
                response.text().map(|body| (status, body))
            });

        let check = match result {
            Ok((status, body)) => interpret_response(status, &body),
            Err(e) if e.is_timeout() => {
                RegistryCheck::Inconclusive(format!("timed out after {:?}", self.config.timeout))
            }
            Err(e) => RegistryCheck::Inconclusive(e.to_string()),
        };

        match &check {
            RegistryCheck::Inconclusive(reason) => {
                warn!(slug = name, %reason, "registry check inconclusive");
            }
            other => debug!(slug = name, result = %other, "registry check"),
        }
        check
    }
}

/// Registry checker with fixed answers, for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct FixedRegistry {
    known: HashSet<String>,
    inconclusive: HashSet<String>,
}

impl FixedRegistry {
    /// A registry that knows exactly the given names.
    pub fn with_known<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: names.into_iter().map(Into::into).collect(),
            inconclusive: HashSet::new(),
        }
    }

    /// Make lookups for `name` come back inconclusive.
    #[must_use]
    pub fn with_inconclusive(mut self, name: impl Into<String>) -> Self {
        self.inconclusive.insert(name.into());
        self
    }
}

impl ExistenceChecker for FixedRegistry {
    fn check(&self, name: &str) -> RegistryCheck {
        if self.inconclusive.contains(name) {
            RegistryCheck::Inconclusive("simulated network failure".to_string())
        } else if self.known.contains(name) {
            RegistryCheck::Exists
        } else {
            RegistryCheck::Missing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("akismet"));
        assert!(is_valid_slug("wordpress-seo"));
        assert!(is_valid_slug("wp_super_cache"));
        assert!(is_valid_slug("jetpack.2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("../etc"));
        assert!(!is_valid_slug("two words"));
        assert!(!is_valid_slug("vendor/name"));
    }

    #[test]
    fn test_interpret_ok_object() {
        let body = r#"{"name":"Akismet","slug":"akismet","version":"5.3"}"#;
        assert_eq!(interpret_response(200, body), RegistryCheck::Exists);
    }

    #[test]
    fn test_interpret_error_key() {
        let body = r#"{"error":"Plugin not found."}"#;
        assert_eq!(interpret_response(200, body), RegistryCheck::Missing);
    }

    #[test]
    fn test_interpret_non_object_and_malformed() {
        assert!(matches!(
            interpret_response(200, "null"),
            RegistryCheck::Inconclusive(_)
        ));
        assert!(matches!(
            interpret_response(200, "<html>"),
            RegistryCheck::Inconclusive(_)
        ));
    }

    #[test]
    fn test_interpret_status_codes() {
        assert_eq!(interpret_response(404, ""), RegistryCheck::Missing);
        assert!(matches!(
            interpret_response(503, "{}"),
            RegistryCheck::Inconclusive(_)
        ));
        assert!(!interpret_response(500, "{}").exists());
    }

    #[test]
    fn test_info_url() {
        let registry = HttpRegistry::with_config(RegistryConfig {
            base_url: "https://example.test/plugins/info/1.0/".to_string(),
            ..RegistryConfig::default()
        })
        .unwrap();
        assert_eq!(
            registry.info_url("akismet"),
            "https://example.test/plugins/info/1.0/akismet.json"
        );
    }

    #[test]
    fn test_invalid_slug_skips_request() {
        let registry = HttpRegistry::with_config(RegistryConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..RegistryConfig::default()
        })
        .unwrap();
        assert_eq!(registry.check("not a slug"), RegistryCheck::Missing);
    }

    #[test]
    fn test_connection_refused_is_inconclusive() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let registry = HttpRegistry::with_config(RegistryConfig {
            base_url: format!("http://{addr}"),
            timeout: Duration::from_secs(2),
            ..RegistryConfig::default()
        })
        .unwrap();
        let check = registry.check("akismet");
        assert!(matches!(check, RegistryCheck::Inconclusive(_)), "{check:?}");
        assert!(!check.exists());
    }

    #[test]
    fn test_unanswered_request_times_out() {
        // Accepted by the kernel backlog but never answered.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let registry = HttpRegistry::with_config(RegistryConfig {
            base_url: format!("http://{}", listener.local_addr().unwrap()),
            timeout: Duration::from_millis(200),
            ..RegistryConfig::default()
        })
        .unwrap();

        let check = registry.check("akismet");
        match &check {
            RegistryCheck::Inconclusive(reason) => {
                assert!(reason.starts_with("timed out"), "{reason}");
            }
            other => panic!("expected an inconclusive answer, got {other:?}"),
        }
        assert!(!check.exists());
    }

    #[test]
    fn test_fixed_registry() {
        let registry = FixedRegistry::with_known(["akismet"]).with_inconclusive("flaky");
        assert!(registry.check("akismet").exists());
        assert_eq!(registry.check("custom"), RegistryCheck::Missing);
        assert!(!registry.check("flaky").exists());
    }
}
