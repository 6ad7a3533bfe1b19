/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public BYDFi adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod backoff;
pub mod config;
pub mod http;
pub mod types;
pub mod ws;

// Re-export commonly used types from auth
pub use auth::{Credentials, HmacSigner, ServerClock};

pub use backoff::{Backoff, BackoffConfig};
pub use config::{ClientConfig, WsConfig};

// Re-export commonly used types from http
pub use http::{
    BydfiClient,
    BydfiError,
    ErrorCategory,
    RateCategory,
    RateLimitPolicy,
    RateLimiter,
    RequestParams,
    Result,
    RetryConfig,
};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    BydfiWebSocket,
    ConnectionState,
    StreamKind,
    StreamMessage,
    Subscription,
    SubscriptionId,
};
