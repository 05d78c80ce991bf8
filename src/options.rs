use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use crate::transport::headers_to_json;
use crate::{BackoffStrategy, RetryPolicy};

/// Amount of detail written by debug logging.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    /// Summaries: payloads and response bodies.
    #[default]
    Normal,
    /// Full dumps including request config, headers and whole responses.
    Verbose,
}

/// Options handed to the transport when it is constructed.
#[derive(Clone, Default)]
pub struct TransportConfig {
    /// Default timeout for every request.
    pub timeout: Option<Duration>,
    /// Headers sent with every request.
    pub headers: HeaderMap,
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("timeout", &self.timeout)
            .field("headers", &headers_to_json(&self.headers))
            .finish()
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets `Authorization: Bearer <token>`.
    ///
    /// If the token is missing the `Bearer ` prefix, it is added automatically.
    pub fn with_bearer_token(self, token: impl AsRef<str>) -> Result<Self, ConfigError> {
        let authorization = normalize_bearer_authorization(token.as_ref());
        let mut value = HeaderValue::from_str(&authorization)
            .map_err(|_| ConfigError::InvalidHeader(AUTHORIZATION.as_str().to_owned()))?;
        value.set_sensitive(true);
        Ok(self.with_header(AUTHORIZATION, value))
    }
}

/// Client-wide configuration, fixed at construction.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL joined with relative request paths.
    pub base_url: String,
    pub transport: TransportConfig,
    pub default_retry_policy: RetryPolicy,
    /// Enables debug dumps through the client's logger.
    pub debug: bool,
    pub debug_level: DebugLevel,
    /// Client name embedded in error messages and log lines.
    pub name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            transport: TransportConfig::default(),
            default_retry_policy: RetryPolicy::default(),
            debug: false,
            debug_level: DebugLevel::Normal,
            name: "<default>".to_owned(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.default_retry_policy = policy;
        self
    }

    pub fn with_debug(mut self, level: DebugLevel) -> Self {
        self.debug = true;
        self.debug_level = level;
        self
    }

    /// Flat retry settings from older configurations.
    ///
    /// Maps onto the nested policy with exponential backoff.
    #[deprecated(note = "use `with_retry_policy` with a `RetryPolicy`")]
    pub fn with_retries(mut self, max_retries: u32, delay_factor: Duration) -> Self {
        self.default_retry_policy = RetryPolicy {
            max_retries,
            backoff_strategy: BackoffStrategy::Exponential,
            delay_factor,
            on_retry: self.default_retry_policy.on_retry.take(),
        };
        self
    }

    /// Creates a configuration from environment variables.
    ///
    /// Reads, with `prefix` prepended (e.g. `"BILLING"` → `BILLING_BASE_URL`):
    /// - `_BASE_URL` (required)
    /// - `_TOKEN` — bearer token (prefix optional)
    /// - `_TIMEOUT_MS`
    /// - `_MAX_RETRIES`
    /// - `_DEBUG` — `true`/`1` enables debug logging
    /// - `_DEBUG_LEVEL` — `normal` or `verbose`
    ///
    /// The client name is the lowercased prefix.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = |suffix: &str| format!("{prefix}_{suffix}");
        let read = |suffix: &str| {
            lookup(&key(suffix))
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let base_url = read("BASE_URL").ok_or_else(|| ConfigError::Missing(key("BASE_URL")))?;
        let mut config = Self::new(base_url).with_name(prefix.to_ascii_lowercase());

        if let Some(token) = read("TOKEN") {
            config.transport = config.transport.with_bearer_token(token)?;
        }
        if let Some(timeout) = read("TIMEOUT_MS") {
            let millis = timeout
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid(key("TIMEOUT_MS"), timeout))?;
            config.transport.timeout = Some(Duration::from_millis(millis));
        }
        if let Some(retries) = read("MAX_RETRIES") {
            config.default_retry_policy.max_retries = retries
                .parse::<u32>()
                .map_err(|_| ConfigError::Invalid(key("MAX_RETRIES"), retries))?;
        }
        if let Some(debug) = read("DEBUG") {
            config.debug = match debug.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::Invalid(key("DEBUG"), debug)),
            };
        }
        if let Some(level) = read("DEBUG_LEVEL") {
            config.debug_level = match level.to_ascii_lowercase().as_str() {
                "normal" => DebugLevel::Normal,
                "verbose" => DebugLevel::Verbose,
                _ => return Err(ConfigError::Invalid(key("DEBUG_LEVEL"), level)),
            };
        }

        Ok(config)
    }
}

/// Error raised while assembling a [`ClientConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing {0} environment variable")]
    Missing(String),
    #[error("invalid value for {0}: '{1}'")]
    Invalid(String, String),
    #[error("invalid value for header {0}")]
    InvalidHeader(String),
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
