/*
[INPUT]:  Error sources (config, transport, rate limiting, exchange rejections, decoding)
[OUTPUT]: Structured error types with category, exchange context and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or changing retry classification
*/

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Coarse error class a caller can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    RateLimited,
    Rejected,
    Protocol,
}

/// Which side decided the request was over budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitOrigin {
    /// The local budget was exhausted before anything was sent
    Local,
    /// The exchange answered 429/418
    Server,
}

impl fmt::Display for RateLimitOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitOrigin::Local => f.write_str("local budget"),
            RateLimitOrigin::Server => f.write_str("server"),
        }
    }
}

/// Main error type for the BYDFi adapter
#[derive(Error, Debug)]
pub enum BydfiError {
    /// Missing or invalid client configuration (credentials, parameters)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failure or 5xx answer
    #[error("Network error: {message}")]
    Network {
        message: String,
        status: Option<u16>,
    },

    /// Request exceeded its deadline
    #[error("Request timed out after {}ms", .duration.as_millis())]
    Timeout { duration: Duration },

    /// Local or server rate limit exceeded
    #[error("Rate limit exceeded ({origin}): {message}")]
    RateLimited {
        origin: RateLimitOrigin,
        retry_after: Option<Duration>,
        code: Option<i64>,
        message: String,
    },

    /// Exchange refused the request (validation or business error)
    #[error("Request rejected (HTTP {status}, code {code:?}): {message}")]
    Rejected {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    /// Response did not match the expected schema
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

impl From<serde_json::Error> for BydfiError {
    fn from(err: serde_json::Error) -> Self {
        BydfiError::Protocol(err.to_string())
    }
}

/// Error body the exchange returns alongside non-2xx statuses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
}

impl BydfiError {
    /// Map a transport error, keeping timeouts distinguishable
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return BydfiError::Timeout { duration: timeout };
        }
        if err.is_decode() {
            return BydfiError::Protocol(err.to_string());
        }
        BydfiError::Network {
            message: err.to_string(),
            status: err.status().map(|status| status.as_u16()),
        }
    }

    /// Build a rejection from a non-2xx status and the raw response body
    pub fn rejected(status: StatusCode, body: &str) -> Self {
        let (code, message) = parse_error_body(status, body);
        BydfiError::Rejected {
            status: status.as_u16(),
            code,
            message,
        }
    }

    /// Taxonomy class of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            BydfiError::Config(_) | BydfiError::UrlParse(_) => ErrorCategory::Configuration,
            BydfiError::Network { .. } | BydfiError::Timeout { .. } | BydfiError::WebSocket(_) => {
                ErrorCategory::Network
            }
            BydfiError::RateLimited { .. } => ErrorCategory::RateLimited,
            BydfiError::Rejected { .. } => ErrorCategory::Rejected,
            BydfiError::Protocol(_) => ErrorCategory::Protocol,
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BydfiError::Network { .. }
                | BydfiError::RateLimited { .. }
                | BydfiError::Timeout { .. }
                | BydfiError::WebSocket(_)
        )
    }

    /// Server-provided wait hint, if any
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            BydfiError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            BydfiError::Rejected { status, .. } if *status == 401 || *status == 403
        )
    }
}

/// Extract `(code, msg)` from an exchange error body, falling back to the status text
pub(crate) fn parse_error_body(status: StatusCode, body: &str) -> (Option<i64>, String) {
    let fallback = || {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
    };

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => (parsed.code, parsed.msg.unwrap_or_else(fallback)),
        Err(_) if body.trim().is_empty() => (None, fallback()),
        Err(_) => (None, body.trim().to_string()),
    }
}

/// Result type alias for BYDFi operations
pub type Result<T> = std::result::Result<T, BydfiError>;
