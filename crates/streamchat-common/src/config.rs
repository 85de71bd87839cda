//! Client configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Endpoint used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://0.0.0.0:8000";

/// Hard timeout for the liveness probe.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// How strictly streamed frames are checked against the event schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Frames that fail validation still yield their `item` payload, typed
    /// when possible and raw otherwise.
    #[default]
    Lenient,
    /// Frames that fail validation are skipped.
    Strict,
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lenient => write!(f, "lenient"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for ValidationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => anyhow::bail!("Unknown validation mode: {other}"),
        }
    }
}

/// Strips a single trailing `/` so paths can be appended directly.
#[must_use]
pub fn normalize_base_url(url: &str) -> String {
    url.strip_suffix('/').unwrap_or(url).to_string()
}

/// Configuration for an agent client.
///
/// # Examples
///
/// ```
/// use streamchat_common::{ClientConfig, ValidationMode};
///
/// let config = ClientConfig::new("http://localhost:8000/")
///     .with_timeout(30)
///     .with_validation(ValidationMode::Strict);
/// assert_eq!(config.base_url, "http://localhost:8000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the agent server, without a trailing slash.
    pub base_url: String,
    /// Request timeout in seconds. Streams are unbounded when unset.
    pub timeout_seconds: Option<u64>,
    /// Timeout for the liveness probe.
    #[serde(skip, default = "default_health_timeout")]
    pub health_timeout: Duration,
    /// Frame validation mode.
    #[serde(default)]
    pub validation: ValidationMode,
}

const fn default_health_timeout() -> Duration {
    DEFAULT_HEALTH_TIMEOUT
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: None,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            validation: ValidationMode::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for the given base URL.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.as_ref()),
            ..Default::default()
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.base_url = normalize_base_url(base_url.as_ref());
        self
    }

    /// Sets the request timeout.
    ///
    /// # Arguments
    ///
    /// * `timeout_seconds` - Timeout in seconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Sets the liveness probe timeout.
    #[must_use]
    pub const fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Sets the frame validation mode.
    #[must_use]
    pub const fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse, is not HTTP(S), or a
    /// timeout is zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("Invalid base URL '{}': {e}", self.base_url))?;

        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("Base URL must use http or https, got '{}'", url.scheme());
        }

        if self.timeout_seconds == Some(0) {
            anyhow::bail!("timeout_seconds must be greater than 0");
        }

        if self.health_timeout.is_zero() {
            anyhow::bail!("health_timeout must be greater than 0");
        }

        Ok(())
    }
}
