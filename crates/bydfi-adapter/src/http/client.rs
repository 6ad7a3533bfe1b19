/*
[INPUT]:  Client configuration (base URL, timeouts, credentials, limits)
[OUTPUT]: Configured BYDFi REST client ready for API calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use crate::auth::{Credentials, HmacSigner, ServerClock};
use crate::config::ClientConfig;
use crate::http::{endpoints, BydfiError, RateLimiter, RequestParams, RequestSigner, Result, RetryConfig};
use crate::types::ServerTime;

/// Main HTTP client for the BYDFi REST API.
///
/// Clones share the connection pool, rate budgets and clock offset.
#[derive(Debug, Clone)]
pub struct BydfiClient {
    pub(crate) http_client: Client,
    base_url: String,
    signer: Option<RequestSigner>,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) clock: ServerClock,
    pub(crate) retry: RetryConfig,
    pub(crate) timeout: Duration,
    recv_window: Option<u64>,
}

impl BydfiClient {
    /// Create a public-only client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client from configuration.
    ///
    /// Fails with `Config` if only one half of the credentials is set, or
    /// if a timeout or rate limit is zero.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let credentials = config.credentials()?;
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|err| BydfiError::Config(format!("failed to build HTTP client: {err}")))?;

        let base_url = config.base_url().trim_end_matches('/').to_string();
        url::Url::parse(&base_url)?;

        let signer = credentials.map(|credentials| {
            RequestSigner::new(HmacSigner::new(credentials)).with_recv_window(config.recv_window)
        });

        Ok(Self {
            http_client,
            base_url,
            signer,
            rate_limiter: RateLimiter::new(config.rate_limits, config.rate_limit_policy),
            clock: ServerClock::new(),
            retry: config.retry,
            timeout: config.timeout,
            recv_window: config.recv_window,
        })
    }

    /// Set or replace credentials for authenticated requests
    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.signer =
            Some(RequestSigner::new(HmacSigner::new(credentials)).with_recv_window(self.recv_window));
    }

    pub fn has_credentials(&self) -> bool {
        self.signer.is_some()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.signer.as_ref().map(RequestSigner::api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn clock(&self) -> &ServerClock {
        &self.clock
    }

    pub(crate) fn signer(&self) -> Result<&RequestSigner> {
        self.signer.as_ref().ok_or_else(|| {
            BydfiError::Config("API key and secret required for authenticated endpoints".to_string())
        })
    }

    pub(crate) fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sample the exchange clock and store the offset used for signing.
    ///
    /// The local bounds are taken around the wire round trip only, after the
    /// rate budget has been drawn. A failed sample is discarded and taken
    /// again, so a retry delay never widens the window. Returns the new
    /// offset in milliseconds.
    pub async fn sync_time(&self) -> Result<i64> {
        let endpoint = &endpoints::SERVER_TIME;
        let params = RequestParams::new();
        let mut backoff = self.retry.backoff();
        let mut attempt: u32 = 0;

        loop {
            self.rate_limiter.acquire(endpoint.category).await?;
            attempt += 1;

            let before = ServerClock::local_ms();
            let err = match self.send_once::<ServerTime>(endpoint, &params, None).await {
                Ok(server) => {
                    let after = ServerClock::local_ms();
                    let offset = self.clock.record_sample(before, server.server_time, after);
                    info!(offset_ms = offset, round_trip_ms = after - before, "synchronized with exchange clock");
                    return Ok(offset);
                }
                Err(err) => err,
            };

            if !err.is_retryable() || attempt > self.retry.max_retries {
                return Err(err);
            }
            let backoff_delay = backoff
                .next_delay()
                .unwrap_or(Duration::from_millis(self.retry.max_delay_ms));
            let delay = err.retry_delay().unwrap_or(backoff_delay);
            warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying clock sample");
            tokio::time::sleep(delay).await;
        }
    }
}
