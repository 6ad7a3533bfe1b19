/*
[INPUT]:  Endpoint descriptor and request parameters
[OUTPUT]: Decoded response or classified error
[POS]:    HTTP layer - rate limiting, signing, sending, retrying and response mapping
[UPDATE]: When changing retry policy or status-to-error mapping
*/

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backoff::{Backoff, BackoffConfig};
use crate::http::signature::API_KEY_HEADER;
use crate::http::{
    BydfiClient, BydfiError, Endpoint, RateLimitOrigin, RequestParams, RequestSigner, Result,
};
use crate::http::error::parse_error_body;

/// Wait applied when a 429/418 carries no usable `Retry-After`
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Retry settings for REST calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
        }
    }

    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(BackoffConfig {
            initial_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        })
    }
}

/// Parse `Retry-After` as whole seconds
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

impl BydfiClient {
    /// Run a request against `endpoint` with rate limiting, signing and retries.
    ///
    /// Signed endpoints fail with `Config` before any I/O when no credentials
    /// are set. Each attempt draws from the rate budget and carries a fresh
    /// timestamp and signature.
    pub async fn execute<T: DeserializeOwned>(&self, endpoint: &Endpoint, params: RequestParams) -> Result<T> {
        let signer = if endpoint.is_signed() {
            Some(self.signer()?)
        } else {
            None
        };
        let retry_safe = endpoint.is_retry_safe(&params);
        let mut backoff = self.retry.backoff();
        let mut attempt: u32 = 0;

        loop {
            // A local fail-fast rejection is returned as is, never retried
            self.rate_limiter.acquire(endpoint.category).await?;
            attempt += 1;

            let err = match self.send_once(endpoint, &params, signer).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !retry_safe || !err.is_retryable() || attempt > self.retry.max_retries {
                return Err(err);
            }
            let backoff_delay = backoff
                .next_delay()
                .unwrap_or(Duration::from_millis(self.retry.max_delay_ms));
            let delay = err.retry_delay().unwrap_or(backoff_delay);

            warn!(
                method = endpoint.method.as_str(),
                path = endpoint.path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One attempt: sign fresh, send, map the response. No budget, no retry.
    pub(crate) async fn send_once<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        params: &RequestParams,
        signer: Option<&RequestSigner>,
    ) -> Result<T> {
        let mut builder = match signer {
            Some(signer) => {
                let signed = signer.sign(endpoint.method, endpoint.path, params, self.clock.now_ms())?;
                let url = format!("{}?{}", self.endpoint_url(endpoint.path), signed.query_string());
                self.http_client
                    .request(endpoint.method.as_reqwest(), url)
                    .header(API_KEY_HEADER, signer.api_key())
            }
            None => {
                let mut url = self.endpoint_url(endpoint.path);
                if !params.is_empty() {
                    url.push('?');
                    url.push_str(&params.to_query_string());
                }
                self.http_client.request(endpoint.method.as_reqwest(), url)
            }
        };
        builder = builder.timeout(self.timeout);

        debug!(method = endpoint.method.as_str(), path = endpoint.path, "sending request");
        let response = builder
            .send()
            .await
            .map_err(|err| BydfiError::from_reqwest(err, self.timeout))?;

        self.handle_response(endpoint, response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, endpoint: &Endpoint, response: Response) -> Result<T> {
        let status = response.status();
        self.rate_limiter.sync_from_headers(response.headers()).await;

        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            let retry_after = parse_retry_after(response.headers());
            self.rate_limiter.penalize(endpoint.category, retry_after).await;
            let body = response.text().await.unwrap_or_default();
            let (code, message) = parse_error_body(status, &body);
            return Err(BydfiError::RateLimited {
                origin: RateLimitOrigin::Server,
                retry_after: Some(retry_after),
                code,
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| BydfiError::from_reqwest(err, self.timeout))?;

        if status.is_server_error() {
            let (_, message) = parse_error_body(status, &body);
            return Err(BydfiError::Network {
                message,
                status: Some(status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(BydfiError::rejected(status, &body));
        }

        serde_json::from_str(&body).map_err(|err| {
            BydfiError::Protocol(format!("unexpected response from {}: {err}", endpoint.path))
        })
    }
}
