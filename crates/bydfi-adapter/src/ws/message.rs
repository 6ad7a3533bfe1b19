/*
[INPUT]:  Raw WebSocket text frames and outgoing subscription requests
[OUTPUT]: Classified inbound frames and JSON envelopes to send
[POS]:    WebSocket layer - wire message shapes
[UPDATE]: When the stream protocol or envelope format changes
*/

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::HmacSigner;
use crate::http::{BydfiError, Result};
use crate::ws::Subscription;

/// Correlation id of keepalive pings
pub const PING_ID: &str = "ping";

/// Message family derived from the stream name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Ticker,
    Ticker24h,
    OrderBook,
    Trades,
    Klines,
    Account,
    Order,
    Other,
}

impl StreamKind {
    pub fn from_stream(stream: &str) -> Self {
        let stream = stream.to_ascii_lowercase();
        if stream.contains("ticker") {
            if stream.contains("24h") {
                StreamKind::Ticker24h
            } else {
                StreamKind::Ticker
            }
        } else if stream.contains("orderbook") {
            StreamKind::OrderBook
        } else if stream.contains("trades") {
            StreamKind::Trades
        } else if stream.contains("kline") {
            StreamKind::Klines
        } else if stream.contains("account") {
            StreamKind::Account
        } else if stream.contains("order") {
            StreamKind::Order
        } else {
            StreamKind::Other
        }
    }
}

/// Data frame delivered to the consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub kind: StreamKind,
    pub stream: String,
    pub data: Value,
    /// Local receive time, epoch ms
    pub received_at: i64,
}

impl StreamMessage {
    /// Decode the payload into a typed struct
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).map_err(BydfiError::from)
    }
}

/// What an inbound text frame turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Data(StreamMessage),
    Pong,
    Error { code: Option<i64>, message: String },
    /// Acknowledgement or anything else without a stream tag
    Other(Value),
}

impl InboundFrame {
    /// Classify a text frame; invalid JSON is a protocol error
    pub fn parse(text: &str, received_at: i64) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;

        if let Some(error) = value.get("error") {
            let code = error.get("code").and_then(Value::as_i64);
            let message = error
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            return Ok(InboundFrame::Error { code, message });
        }

        if value.get("result").is_some() && value.get("id").and_then(Value::as_str) == Some(PING_ID) {
            return Ok(InboundFrame::Pong);
        }

        if let Some(stream) = value.get("stream").and_then(Value::as_str) {
            let stream = stream.to_string();
            let data = value.get("data").cloned().unwrap_or_else(|| json!({}));
            return Ok(InboundFrame::Data(StreamMessage {
                kind: StreamKind::from_stream(&stream),
                stream,
                data,
                received_at,
            }));
        }

        Ok(InboundFrame::Other(value))
    }
}

pub fn subscribe_envelope(subscription: &Subscription) -> Value {
    channel_envelope("subscribe", subscription)
}

pub fn unsubscribe_envelope(subscription: &Subscription) -> Value {
    channel_envelope("unsubscribe", subscription)
}

fn channel_envelope(action: &str, subscription: &Subscription) -> Value {
    json!({
        "action": action,
        "channel": subscription.channel().as_str(),
        "params": subscription.params(),
    })
}

/// Session authentication; the signature covers `timestamp=<ms>`
pub fn auth_envelope(signer: &HmacSigner, timestamp: u64) -> Result<Value> {
    let signature = signer.sign(&format!("timestamp={timestamp}"))?;
    Ok(json!({
        "action": "auth",
        "params": {
            "apiKey": signer.api_key(),
            "timestamp": timestamp,
            "signature": signature,
        }
    }))
}

pub fn ping_envelope() -> Value {
    json!({ "action": "ping", "id": PING_ID })
}
