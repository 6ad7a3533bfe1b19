/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod account;
pub mod capital;
pub mod client;
pub mod dispatch;
pub mod endpoints;
pub mod error;
pub mod public;
pub mod rate_limit;
pub mod signature;
pub mod trade;

pub use error::{BydfiError, ErrorCategory, RateLimitOrigin, Result};
pub use signature::{RequestParams, RequestSigner, SignedRequest};

pub use client::BydfiClient;
pub use dispatch::RetryConfig;
pub use endpoints::{Endpoint, HttpMethod, Idempotency, Security};
pub use rate_limit::{
    RateBudget, RateCategory, RateLimit, RateLimitPolicy, RateLimiter, RateLimits, WeightUsage,
};
