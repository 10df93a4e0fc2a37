//! Handler configuration.
//!
//! All configuration is fixed at handler construction time. Values can be
//! set through the builder methods or seeded from `LOKI_*` environment
//! variables; explicit builder values win. String values from the
//! environment are trimmed, and invalid numeric values fall back to the
//! defaults rather than failing construction.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::client::BasicAuth;
use crate::labels::LabelValue;

/// Default HTTP timeout for one push.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default relay queue capacity. `0` means unbounded.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Default push payload version.
pub const DEFAULT_VERSION: &str = "1";

/// Configuration or usage error. Loud and immediate, unlike delivery
/// failures which are reported and swallowed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configured payload version string is not a known version.
    #[error("unsupported payload version {0:?}, expected \"0\" or \"1\"")]
    InvalidVersion(String),

    /// A computed label source was supplied while the legacy payload
    /// version is configured. The legacy wire shape cannot represent
    /// dynamic values safely, so this is rejected at resolve time.
    #[error("payload version \"0\" cannot carry computed label {label:?}")]
    ComputedLabel {
        /// Label key carrying the computed source.
        label: String,
    },

    /// No push endpoint URL was configured.
    #[error("push endpoint URL is not configured (set LOKI_PUSH_URL)")]
    MissingUrl,
}

/// Immutable handler configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Loki push endpoint, e.g. `https://loki.example.net/loki/api/v1/push`.
    pub url: String,
    /// Labels attached to every entry. Values may be constants or computed
    /// sources evaluated fresh per entry.
    pub default_labels: BTreeMap<String, LabelValue>,
    /// Optional HTTP Basic credentials.
    pub auth: Option<BasicAuth>,
    /// Push payload version, `"0"` (legacy) or `"1"`.
    pub version: String,
    /// Timeout for one HTTP push.
    pub timeout: Duration,
    /// Relay queue capacity, `0` for unbounded. Only used by the queued
    /// relay; the synchronous handler ignores it.
    pub queue_capacity: usize,
}

impl Config {
    /// Creates a configuration for the given push endpoint with defaults
    /// for everything else.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Config {
            url: url.into(),
            default_labels: BTreeMap::new(),
            auth: None,
            version: DEFAULT_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Adds a default label attached to every entry.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        self.default_labels.insert(key.into(), value.into());
        self
    }

    /// Sets HTTP Basic credentials.
    #[must_use]
    pub fn auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((username.into(), password.into()));
        self
    }

    /// Selects the push payload version, `"0"` or `"1"`. The version is
    /// validated when the handler is constructed.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the HTTP timeout for one push.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the relay queue capacity. `0` makes the queue unbounded.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Builds a configuration from `LOKI_*` environment variables.
    ///
    /// `LOKI_PUSH_URL` is required. `LOKI_USERNAME` and `LOKI_PASSWORD`
    /// (both present) set Basic auth, `LOKI_PAYLOAD_VERSION` selects the
    /// payload shape, `LOKI_FLUSH_TIMEOUT` is the push timeout in seconds
    /// and `LOKI_QUEUE_CAPACITY` sizes the relay queue.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env_trimmed("LOKI_PUSH_URL").ok_or(ConfigError::MissingUrl)?;
        let mut config = Config::new(url);

        if let (Some(username), Some(password)) =
            (env_trimmed("LOKI_USERNAME"), env_trimmed("LOKI_PASSWORD"))
        {
            config = config.auth(username, password);
        }

        if let Some(version) = env_trimmed("LOKI_PAYLOAD_VERSION") {
            config = config.version(version);
        }

        if let Some(raw) = env_trimmed("LOKI_FLUSH_TIMEOUT") {
            match raw.parse::<u64>() {
                // A zero timeout would disable pushes entirely, keep the default.
                Ok(secs) if secs > 0 => config = config.timeout(Duration::from_secs(secs)),
                _ => debug!("invalid LOKI_FLUSH_TIMEOUT {raw:?}, using default"),
            }
        }

        if let Some(raw) = env_trimmed("LOKI_QUEUE_CAPACITY") {
            match raw.parse::<usize>() {
                Ok(capacity) => config = config.queue_capacity(capacity),
                Err(_) => debug!("invalid LOKI_QUEUE_CAPACITY {raw:?}, using default"),
            }
        }

        Ok(config)
    }
}

fn env_trimmed(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::new("http://localhost:3100/loki/api/v1/push");
        assert_eq!(config.version, "1");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.queue_capacity, 1000);
        assert!(config.auth.is_none());
        assert!(config.default_labels.is_empty());
    }

    #[test]
    fn builder_overrides() {
        let config = Config::new("http://localhost:3100/loki/api/v1/push")
            .label("app", "shipper")
            .auth("user", "secret")
            .version("0")
            .timeout(Duration::from_secs(30))
            .queue_capacity(0);

        assert_eq!(config.version, "0");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.queue_capacity, 0);
        assert_eq!(
            config.auth,
            Some(("user".to_string(), "secret".to_string()))
        );
        assert!(config.default_labels.contains_key("app"));
    }

    // Environment interactions live in one test to avoid races between
    // concurrently running test threads.
    #[test]
    fn from_env_reads_and_validates() {
        std::env::remove_var("LOKI_PUSH_URL");
        assert!(matches!(Config::from_env(), Err(ConfigError::MissingUrl)));

        std::env::set_var("LOKI_PUSH_URL", "  http://loki:3100/loki/api/v1/push  ");
        std::env::set_var("LOKI_USERNAME", "user");
        std::env::set_var("LOKI_PASSWORD", "secret");
        std::env::set_var("LOKI_PAYLOAD_VERSION", "0");
        std::env::set_var("LOKI_FLUSH_TIMEOUT", "9");
        std::env::set_var("LOKI_QUEUE_CAPACITY", "0");

        let config = Config::from_env().unwrap();
        assert_eq!(config.url, "http://loki:3100/loki/api/v1/push");
        assert_eq!(
            config.auth,
            Some(("user".to_string(), "secret".to_string()))
        );
        assert_eq!(config.version, "0");
        assert_eq!(config.timeout, Duration::from_secs(9));
        assert_eq!(config.queue_capacity, 0);

        // Invalid numerics fall back to the defaults.
        std::env::set_var("LOKI_FLUSH_TIMEOUT", "not-a-number");
        std::env::set_var("LOKI_QUEUE_CAPACITY", "-3");
        let config = Config::from_env().unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);

        for key in [
            "LOKI_PUSH_URL",
            "LOKI_USERNAME",
            "LOKI_PASSWORD",
            "LOKI_PAYLOAD_VERSION",
            "LOKI_FLUSH_TIMEOUT",
            "LOKI_QUEUE_CAPACITY",
        ] {
            std::env::remove_var(key);
        }
    }
}
