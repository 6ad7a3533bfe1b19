/*
[INPUT]:  WebSocket configuration and subscription channels
[OUTPUT]: Real-time market data and user data updates
[POS]:    WebSocket layer - real-time data streams
[UPDATE]: When adding new channels or changing connection logic
*/

pub mod client;
pub mod message;
pub mod subscription;

pub use client::{BydfiWebSocket, ConnectionState};
pub use message::{InboundFrame, StreamKind, StreamMessage};
pub use subscription::{Channel, Subscription, SubscriptionId, SubscriptionManager};
