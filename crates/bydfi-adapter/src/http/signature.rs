/*
[INPUT]:  Request parameters, timestamp and HMAC signer
[OUTPUT]: Canonical query strings and signed requests
[POS]:    HTTP layer - request signing for authenticated endpoints
[UPDATE]: When changing canonicalization, signature placement or header format
*/

use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::auth::HmacSigner;
use crate::http::{HttpMethod, Result};

/// Header carrying the API key on signed requests
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";
pub const TIMESTAMP_PARAM: &str = "timestamp";
pub const SIGNATURE_PARAM: &str = "signature";
pub const RECV_WINDOW_PARAM: &str = "recvWindow";

/// Request parameters in canonical (sorted) order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams(BTreeMap<String, String>);

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    /// Insert only when a value is present
    pub fn insert_opt<V: ToString>(&mut self, key: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Form-urlencoded `k=v&k=v` in key order
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// A request with timestamp and signature attached
#[derive(Debug, Clone)]
pub struct SignedRequest {
    method: HttpMethod,
    path: String,
    params: RequestParams,
    timestamp: u64,
    signature: String,
}

impl SignedRequest {
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parameters that were signed, including `timestamp`
    pub fn params(&self) -> &RequestParams {
        &self.params
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Query string sent on the wire: signed payload followed by `signature`
    pub fn query_string(&self) -> String {
        let payload = self.params.to_query_string();
        if payload.is_empty() {
            format!("{SIGNATURE_PARAM}={}", self.signature)
        } else {
            format!("{payload}&{SIGNATURE_PARAM}={}", self.signature)
        }
    }
}

/// Attaches timestamps and HMAC signatures to request parameters
#[derive(Debug, Clone)]
pub struct RequestSigner {
    signer: HmacSigner,
    recv_window: Option<u64>,
}

impl RequestSigner {
    pub fn new(signer: HmacSigner) -> Self {
        Self {
            signer,
            recv_window: None,
        }
    }

    /// Attach `recvWindow` to every signed request
    pub fn with_recv_window(mut self, recv_window: Option<u64>) -> Self {
        self.recv_window = recv_window;
        self
    }

    pub fn api_key(&self) -> &str {
        self.signer.api_key()
    }

    /// Sign `params` for a request issued at `timestamp` (epoch ms).
    ///
    /// The payload is the canonical query string of the parameters plus
    /// `timestamp` and, when configured, `recvWindow`.
    pub fn sign(
        &self,
        method: HttpMethod,
        path: &str,
        params: &RequestParams,
        timestamp: u64,
    ) -> Result<SignedRequest> {
        let params = self.stamp(params, timestamp);
        let signature = self.signer.sign(&params.to_query_string())?;
        Ok(SignedRequest {
            method,
            path: path.to_string(),
            params,
            timestamp,
            signature,
        })
    }

    /// Re-stamp a request with a new timestamp and recompute its signature
    pub fn resign(&self, request: &mut SignedRequest, timestamp: u64) -> Result<()> {
        request.params.insert(TIMESTAMP_PARAM, timestamp);
        request.signature = self.signer.sign(&request.params.to_query_string())?;
        request.timestamp = timestamp;
        Ok(())
    }

    /// Signature alone, for callers that assemble the request themselves
    pub fn signature(&self, params: &RequestParams, timestamp: u64) -> Result<String> {
        self.signer.sign(&self.stamp(params, timestamp).to_query_string())
    }

    fn stamp(&self, params: &RequestParams, timestamp: u64) -> RequestParams {
        let mut stamped = params.clone();
        stamped.insert(TIMESTAMP_PARAM, timestamp);
        if !stamped.contains_key(RECV_WINDOW_PARAM) {
            stamped.insert_opt(RECV_WINDOW_PARAM, self.recv_window);
        }
        stamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;

    fn request_signer() -> RequestSigner {
        let credentials = Credentials::new("test-key", "test-secret").unwrap();
        RequestSigner::new(HmacSigner::new(credentials))
    }

    fn order_params() -> RequestParams {
        RequestParams::new()
            .with("symbol", "BTC-USDT")
            .with("side", "BUY")
            .with("type", "LIMIT")
            .with("quantity", "0.01")
    }

    #[test]
    fn test_query_string_is_sorted_and_encoded() {
        let params = RequestParams::new().with("symbol", "BTC-USDT").with("note", "a b&c");
        assert_eq!(params.to_query_string(), "note=a+b%26c&symbol=BTC-USDT");
    }

    #[test]
    fn test_sign_is_deterministic() {
        let signer = request_signer();
        let first = signer.sign(HttpMethod::Post, "/api/v1/order", &order_params(), 1_700_000_000_000).unwrap();
        let second = signer.sign(HttpMethod::Post, "/api/v1/order", &order_params(), 1_700_000_000_000).unwrap();

        assert_eq!(first.signature(), second.signature());
        assert_eq!(first.params().get(TIMESTAMP_PARAM), Some("1700000000000"));
        assert!(first.query_string().ends_with(&format!("&signature={}", first.signature())));
    }

    #[test]
    fn test_any_change_changes_signature() {
        let signer = request_signer();
        let base = signer.signature(&order_params(), 1_000).unwrap();

        assert_ne!(base, signer.signature(&order_params(), 1_001).unwrap());
        assert_ne!(
            base,
            signer.signature(&order_params().with("quantity", "0.02"), 1_000).unwrap()
        );
        assert_ne!(
            base,
            signer.signature(&order_params().with("price", "100"), 1_000).unwrap()
        );
    }

    #[test]
    fn test_resign_updates_timestamp_and_signature() {
        let signer = request_signer();
        let mut signed = signer.sign(HttpMethod::Post, "/api/v1/order", &order_params(), 1_000).unwrap();
        let original = signed.signature().to_string();

        signer.resign(&mut signed, 2_000).unwrap();
        assert_eq!(signed.timestamp(), 2_000);
        assert_eq!(signed.params().get(TIMESTAMP_PARAM), Some("2000"));
        assert_ne!(signed.signature(), original);
        assert_eq!(signed.signature(), signer.signature(&order_params(), 2_000).unwrap());
    }

    #[test]
    fn test_signature_matches_payload() {
        let credentials = Credentials::new("test-key", "test-secret").unwrap();
        let hmac = HmacSigner::new(credentials.clone());
        let signer = RequestSigner::new(HmacSigner::new(credentials)).with_recv_window(Some(5_000));

        let signed = signer.sign(HttpMethod::Get, "/api/v1/account", &RequestParams::new(), 42).unwrap();
        assert_eq!(signed.params().to_query_string(), "recvWindow=5000&timestamp=42");
        assert!(hmac.verify("recvWindow=5000&timestamp=42", signed.signature()));
    }
}
