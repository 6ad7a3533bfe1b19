/*
[INPUT]:  Constructor options, environment variables or YAML documents
[OUTPUT]: Validated REST and WebSocket client configuration
[POS]:    Configuration layer - client setup
[UPDATE]: When adding new configuration options
*/

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::Credentials;
use crate::backoff::BackoffConfig;
use crate::http::{BydfiError, RateCategory, RateLimitPolicy, RateLimits, Result, RetryConfig};

/// Base URL for the BYDFi REST API
pub const REST_API_URL: &str = "https://api.bydfi.com";
/// Base URL for the BYDFi streaming API
pub const WEBSOCKET_API_URL: &str = "wss://stream.bydfi.com/ws";

const ENV_API_KEY: &str = "BYDFI_API_KEY";
const ENV_API_SECRET: &str = "BYDFI_API_SECRET";
const ENV_BASE_URL: &str = "BYDFI_BASE_URL";
const ENV_TIMEOUT_MS: &str = "BYDFI_TIMEOUT_MS";
const ENV_RATE_LIMIT_POLICY: &str = "BYDFI_RATE_LIMIT_POLICY";

/// REST client configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Override for [`REST_API_URL`]
    pub base_url: Option<String>,
    /// Deadline for a single HTTP attempt
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,
    pub rate_limit_policy: RateLimitPolicy,
    pub rate_limits: RateLimits,
    /// Optional `recvWindow` attached to signed requests
    pub recv_window: Option<u64>,
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            base_url: None,
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            rate_limit_policy: RateLimitPolicy::default(),
            rate_limits: RateLimits::default(),
            recv_window: None,
            retry: RetryConfig::default(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("rate_limit_policy", &self.rate_limit_policy)
            .field("rate_limits", &self.rate_limits)
            .field("recv_window", &self.recv_window)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ClientConfig {
    /// Set API credentials
    pub fn with_credentials(mut self, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self.api_secret = Some(api_secret.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit_policy = policy;
        self
    }

    /// Credentials if both halves are configured.
    ///
    /// A key without a secret (or the reverse) is a configuration error.
    pub fn credentials(&self) -> Result<Option<Credentials>> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) => Credentials::new(key.clone(), secret.clone()).map(Some),
            (None, None) => Ok(None),
            _ => Err(BydfiError::Config(
                "api_key and api_secret must be provided together".to_string(),
            )),
        }
    }

    /// Reject settings that would make every request fail or spin.
    ///
    /// Also checks that credentials come in pairs.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(BydfiError::Config("timeout must be greater than zero".to_string()));
        }
        if self.connect_timeout.is_zero() {
            return Err(BydfiError::Config("connect_timeout must be greater than zero".to_string()));
        }
        for category in RateCategory::ALL {
            let limit = self.rate_limits.get(category);
            if limit.max_requests == 0 || limit.window.is_zero() {
                return Err(BydfiError::Config(format!(
                    "rate limit for {} needs max_requests and window above zero",
                    category.as_str()
                )));
            }
        }
        self.credentials().map(|_| ())
    }

    /// Effective REST base URL
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(REST_API_URL)
    }

    /// Load configuration from `BYDFI_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self {
            api_key: non_empty(ENV_API_KEY),
            api_secret: non_empty(ENV_API_SECRET),
            base_url: non_empty(ENV_BASE_URL),
            ..Self::default()
        };

        if let Some(timeout) = non_empty(ENV_TIMEOUT_MS) {
            let millis: u64 = timeout.trim().parse().map_err(|_| {
                BydfiError::Config(format!("{ENV_TIMEOUT_MS} must be an integer, got {timeout:?}"))
            })?;
            config.timeout = Duration::from_millis(millis);
        }
        if let Some(policy) = non_empty(ENV_RATE_LIMIT_POLICY) {
            config.rate_limit_policy = policy.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|err| BydfiError::Config(format!("invalid YAML configuration: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            BydfiError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }
}

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    /// Capacity of the delivery channel handed to the consumer
    pub channel_capacity: usize,
    pub ping_interval: Duration,
    /// How long an unanswered ping may stay outstanding
    pub ping_timeout: Duration,
    pub reconnect: BackoffConfig,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: WEBSOCKET_API_URL.to_string(),
            channel_capacity: 1024,
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(10),
            reconnect: BackoffConfig::default(),
        }
    }
}

/// Serialize `Duration` as integer milliseconds
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
