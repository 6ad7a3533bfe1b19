/*
[INPUT]:  WebSocket configuration, optional API credentials, subscription requests
[OUTPUT]: Stream messages on a bounded channel and connection state updates
[POS]:    WebSocket layer - connection supervision, keepalive, reconnect and replay
[UPDATE]: When changing connection lifecycle, envelopes or delivery policy
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{Credentials, HmacSigner, ServerClock};
use crate::backoff::Backoff;
use crate::config::WsConfig;
use crate::http::{BydfiError, Result};
use crate::types::KlineInterval;
use crate::ws::message::{auth_envelope, ping_envelope, subscribe_envelope, unsubscribe_envelope};
use crate::ws::{InboundFrame, StreamMessage, Subscription, SubscriptionId, SubscriptionManager};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, WsMessage>;

const MESSAGE_SAMPLE_LIMIT: usize = 3;
const SUBSCRIPTION_LOG_LIMIT: usize = 10;
const DROPPED_LOG_LIMIT: usize = 3;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

/// Lifecycle of the logical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Why a session ended
#[derive(Debug)]
enum SessionEnd {
    Closed,
    Dropped(String),
}

/// Outcome of handling one inbound frame
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Closed,
}

/// WebSocket client for the BYDFi stream API.
///
/// One logical connection; subscriptions survive reconnects and are replayed
/// in the order they were first made. `close()` is terminal.
#[derive(Debug)]
pub struct BydfiWebSocket {
    shared: Arc<Shared>,
    message_rx: Option<mpsc::Receiver<StreamMessage>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug)]
struct Shared {
    config: WsConfig,
    signer: Option<HmacSigner>,
    clock: ServerClock,
    subscriptions: RwLock<SubscriptionManager>,
    authenticate: AtomicBool,
    outbound: Mutex<Option<mpsc::UnboundedSender<WsMessage>>>,
    message_tx: mpsc::Sender<StreamMessage>,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    logs: LogSampler,
}

impl BydfiWebSocket {
    /// Client for public streams
    pub fn new(config: WsConfig) -> Self {
        Self::build(config, None, ServerClock::new())
    }

    /// Client that can also authenticate for user data streams
    pub fn with_credentials(config: WsConfig, credentials: Credentials) -> Self {
        Self::build(config, Some(credentials), ServerClock::new())
    }

    /// Like [`Self::with_credentials`], signing with a clock shared with the REST client
    pub fn with_credentials_and_clock(config: WsConfig, credentials: Credentials, clock: ServerClock) -> Self {
        Self::build(config, Some(credentials), clock)
    }

    fn build(config: WsConfig, credentials: Option<Credentials>, clock: ServerClock) -> Self {
        let (message_tx, message_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            shared: Arc::new(Shared {
                config,
                signer: credentials.map(HmacSigner::new),
                clock,
                subscriptions: RwLock::new(SubscriptionManager::new()),
                authenticate: AtomicBool::new(false),
                outbound: Mutex::new(None),
                message_tx,
                state_tx,
                cancel: CancellationToken::new(),
                logs: LogSampler::default(),
            }),
            message_rx: Some(message_rx),
            task: Mutex::new(None),
        }
    }

    /// Get the message receiver; only the first call returns it
    pub fn take_receiver(&mut self) -> Option<mpsc::Receiver<StreamMessage>> {
        self.message_rx.take()
    }

    /// Observe connection state changes
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Open the connection and start supervising it.
    ///
    /// The first attempt is made inline so its failure is returned; later
    /// drops are handled by reconnecting in the background.
    pub async fn connect(&self) -> Result<()> {
        let mut task = self.task.lock().await;
        if self.shared.cancel.is_cancelled() {
            return Err(BydfiError::Config("WebSocket client was closed".to_string()));
        }
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(BydfiError::Config("WebSocket already connected".to_string()));
        }

        self.shared.set_state(ConnectionState::Connecting);
        let stream = match open(&self.shared.config.url).await {
            Ok(stream) => stream,
            Err(err) => {
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(err);
            }
        };
        info!(url = %self.shared.config.url, "ws connected");

        let shared = self.shared.clone();
        *task = Some(tokio::spawn(shared.supervise(stream)));
        Ok(())
    }

    /// Add a subscription and send it if connected.
    ///
    /// An already-active subscription returns its existing handle and sends
    /// nothing. While disconnected the subscription is recorded and sent on
    /// the next (re)connect.
    pub async fn subscribe(&self, subscription: Subscription) -> Result<SubscriptionId> {
        if subscription.channel().requires_auth() && self.shared.signer.is_none() {
            return Err(BydfiError::Config(
                "API key and secret required for user data streams".to_string(),
            ));
        }

        let mut subscriptions = self.shared.subscriptions.write().await;
        if subscription.channel().requires_auth() && !self.shared.authenticate.swap(true, Ordering::SeqCst) {
            self.shared.send_auth_if_connected().await?;
        }

        let (id, is_new) = subscriptions.subscribe(subscription.clone());
        if is_new {
            let envelope = subscribe_envelope(&subscription);
            if self.shared.send_if_connected(&envelope).await {
                self.shared.logs.subscription_sent("subscribe", &subscription);
            }
        }
        drop(subscriptions);
        Ok(id)
    }

    /// Remove a subscription; `false` if it was not active
    pub async fn unsubscribe(&self, subscription: &Subscription) -> Result<bool> {
        let mut subscriptions = self.shared.subscriptions.write().await;
        if !subscriptions.unsubscribe(subscription) {
            return Ok(false);
        }

        let envelope = unsubscribe_envelope(subscription);
        if self.shared.send_if_connected(&envelope).await {
            self.shared.logs.subscription_sent("unsubscribe", subscription);
        }
        Ok(true)
    }

    pub async fn subscribe_ticker(&self, symbol: &str) -> Result<SubscriptionId> {
        self.subscribe(Subscription::ticker(symbol)).await
    }

    pub async fn subscribe_ticker_24hr(&self, symbol: &str) -> Result<SubscriptionId> {
        self.subscribe(Subscription::ticker_24hr(symbol)).await
    }

    pub async fn subscribe_order_book(&self, symbol: &str, depth: u32) -> Result<SubscriptionId> {
        self.subscribe(Subscription::order_book(symbol, depth)).await
    }

    pub async fn subscribe_trades(&self, symbol: &str) -> Result<SubscriptionId> {
        self.subscribe(Subscription::trades(symbol)).await
    }

    pub async fn subscribe_klines(&self, symbol: &str, interval: KlineInterval) -> Result<SubscriptionId> {
        self.subscribe(Subscription::klines(symbol, interval)).await
    }

    /// Authenticate and subscribe to account and order updates
    pub async fn subscribe_user_data(&self) -> Result<(SubscriptionId, SubscriptionId)> {
        let account = self.subscribe(Subscription::account()).await?;
        let orders = self.subscribe(Subscription::orders()).await?;
        Ok((account, orders))
    }

    /// Active subscriptions in insertion order
    pub async fn active_subscriptions(&self) -> Vec<Subscription> {
        self.shared.subscriptions.read().await.active_set()
    }

    /// Close the connection, stop reconnecting and forget all subscriptions
    pub async fn close(&self) -> Result<()> {
        self.shared.cancel.cancel();
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|err| BydfiError::WebSocket(format!("connection task failed: {err}")))?;
        }

        self.shared.subscriptions.write().await.clear();
        self.shared.authenticate.store(false, Ordering::SeqCst);
        *self.shared.outbound.lock().await = None;
        self.shared.set_state(ConnectionState::Disconnected);
        info!("ws closed");
        Ok(())
    }
}

impl Drop for BydfiWebSocket {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(?previous, ?state, "ws state changed");
        }
    }

    /// Queue a message on the live session; `false` when there is none
    async fn send_if_connected(&self, envelope: &Value) -> bool {
        let sender = self.outbound.lock().await.clone();
        let Some(sender) = sender else {
            return false;
        };
        // A closed channel means the session just died; replay covers it
        sender.send(text(envelope)).is_ok()
    }

    async fn send_auth_if_connected(&self) -> Result<()> {
        let Some(signer) = &self.signer else {
            return Ok(());
        };
        let envelope = auth_envelope(signer, self.clock.now_ms())?;
        if self.send_if_connected(&envelope).await {
            info!(api_key = %signer.api_key(), "ws auth sent");
        }
        Ok(())
    }

    async fn supervise(self: Arc<Self>, mut stream: WsStream) {
        let mut backoff = Backoff::new(self.config.reconnect.clone());

        loop {
            let end = self.run_session(stream).await;
            *self.outbound.lock().await = None;

            let reason = match end {
                SessionEnd::Closed => break,
                SessionEnd::Dropped(reason) => reason,
            };
            if self.cancel.is_cancelled() {
                break;
            }
            warn!(reason = %reason, "ws connection lost");

            stream = loop {
                self.set_state(ConnectionState::Reconnecting);
                let Some(delay) = backoff.next_delay() else {
                    warn!(attempts = backoff.attempt_count(), "ws reconnect attempts exhausted");
                    self.set_state(ConnectionState::Disconnected);
                    return;
                };

                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        self.set_state(ConnectionState::Disconnected);
                        return;
                    }
                    _ = sleep(delay) => {}
                }

                match open(&self.config.url).await {
                    Ok(stream) => break stream,
                    Err(err) => warn!(
                        attempt = backoff.attempt_count(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "ws reconnect failed"
                    ),
                }
            };
            info!(attempt = backoff.attempt_count(), "ws reconnected");
            backoff.reset();
        }

        self.set_state(ConnectionState::Disconnected);
    }

    async fn run_session(&self, stream: WsStream) -> SessionEnd {
        let (mut write, mut read) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

        if let Err(reason) = self.start_session(&mut write, outbound_tx).await {
            return SessionEnd::Dropped(reason);
        }

        let ping_interval = self.config.ping_interval;
        let mut ping_timer = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ping_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return SessionEnd::Closed;
                }
                outbound = outbound_rx.recv() => {
                    let Some(message) = outbound else {
                        return SessionEnd::Dropped("outbound channel closed".to_string());
                    };
                    if let Err(err) = write.send(message).await {
                        return SessionEnd::Dropped(err.to_string());
                    }
                }
                _ = ping_timer.tick() => {
                    if ping_deadline.is_none() {
                        if let Err(err) = write.send(text(&ping_envelope())).await {
                            return SessionEnd::Dropped(err.to_string());
                        }
                        ping_deadline = Some(Instant::now() + self.config.ping_timeout);
                    }
                }
                _ = wait_deadline(ping_deadline) => {
                    return SessionEnd::Dropped("ping timeout".to_string());
                }
                incoming = read.next() => {
                    let flow = match incoming {
                        Some(Ok(WsMessage::Text(body))) => self.handle_text(body.as_str(), &mut ping_deadline).await,
                        Some(Ok(WsMessage::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                            Ok(body) => self.handle_text(body, &mut ping_deadline).await,
                            Err(err) => {
                                debug!(error = %err, "ws binary frame is not utf-8");
                                Flow::Continue
                            }
                        },
                        Some(Ok(WsMessage::Close(frame))) => {
                            return SessionEnd::Dropped(format!("closed by server: {frame:?}"));
                        }
                        Some(Ok(_)) => Flow::Continue,
                        Some(Err(err)) => return SessionEnd::Dropped(err.to_string()),
                        None => return SessionEnd::Dropped("stream ended".to_string()),
                    };
                    if flow == Flow::Closed {
                        let _ = write.send(WsMessage::Close(None)).await;
                        return SessionEnd::Closed;
                    }
                }
            }
        }
    }

    /// Authenticate, replay subscriptions and publish the session sender.
    ///
    /// Runs under the subscriptions write lock so a concurrent subscribe is
    /// either replayed here or sent through the published sender, never both.
    async fn start_session(
        &self,
        write: &mut WsWriter,
        outbound_tx: mpsc::UnboundedSender<WsMessage>,
    ) -> std::result::Result<(), String> {
        let subscriptions = self.subscriptions.write().await;

        if let Some(signer) = self.signer.as_ref().filter(|_| self.authenticate.load(Ordering::SeqCst)) {
            let envelope = auth_envelope(signer, self.clock.now_ms()).map_err(|err| err.to_string())?;
            write.send(text(&envelope)).await.map_err(|err| err.to_string())?;
            info!(api_key = %signer.api_key(), "ws auth sent");
        }

        let replay = subscriptions.replay();
        for subscription in &replay {
            write
                .send(text(&subscribe_envelope(subscription)))
                .await
                .map_err(|err| err.to_string())?;
        }
        if !replay.is_empty() {
            info!(count = replay.len(), "ws subscriptions replayed");
        }

        *self.outbound.lock().await = Some(outbound_tx);
        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    async fn handle_text(&self, body: &str, ping_deadline: &mut Option<Instant>) -> Flow {
        let frame = match InboundFrame::parse(body, ServerClock::local_ms()) {
            Ok(frame) => frame,
            Err(err) => {
                self.logs.parse_failed(&err, body);
                return Flow::Continue;
            }
        };

        match frame {
            InboundFrame::Pong => *ping_deadline = None,
            InboundFrame::Error { code, message } => {
                warn!(code = ?code, message = %message, "ws error frame");
            }
            InboundFrame::Data(message) => {
                if !self.subscriptions.read().await.matches_stream(&message.stream) {
                    self.logs.dropped_inactive(&message.stream);
                    return Flow::Continue;
                }
                self.logs.message_sample(&message);

                // Block until the consumer has room, but never past close()
                let blocked_at = Instant::now();
                tokio::select! {
                    _ = self.cancel.cancelled() => return Flow::Closed,
                    sent = self.message_tx.send(message) => {
                        if sent.is_err() {
                            debug!("ws message receiver dropped");
                        }
                    }
                }
                // Time spent waiting on the consumer is not the server's fault
                if let Some(deadline) = ping_deadline.as_mut() {
                    *deadline += blocked_at.elapsed();
                }
            }
            InboundFrame::Other(value) => {
                debug!(message = %truncate_for_log(&value.to_string(), RAW_LOG_MAX_BYTES), "ws control frame");
            }
        }
        Flow::Continue
    }
}

async fn open(url: &str) -> Result<WsStream> {
    let (stream, _response) = connect_async(url)
        .await
        .map_err(|err| BydfiError::WebSocket(format!("connect to {url} failed: {err}")))?;
    Ok(stream)
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn text(envelope: &Value) -> WsMessage {
    WsMessage::Text(envelope.to_string().into())
}

/// Per-client counters that cap how often noisy events are logged
#[derive(Debug, Default)]
struct LogSampler {
    messages: AtomicUsize,
    subscriptions: AtomicUsize,
    dropped: AtomicUsize,
    parse_failures: AtomicUsize,
}

impl LogSampler {
    fn take(counter: &AtomicUsize, limit: usize) -> Option<usize> {
        let count = counter.fetch_add(1, Ordering::Relaxed);
        (count < limit).then_some(count + 1)
    }

    fn subscription_sent(&self, action: &str, subscription: &Subscription) {
        let Some(index) = Self::take(&self.subscriptions, SUBSCRIPTION_LOG_LIMIT) else {
            return;
        };
        info!(
            sample_index = index,
            sample_limit = SUBSCRIPTION_LOG_LIMIT,
            action,
            channel = subscription.channel().as_str(),
            symbol = subscription.symbol().unwrap_or("-"),
            "ws subscription sent"
        );
    }

    fn message_sample(&self, message: &StreamMessage) {
        let Some(index) = Self::take(&self.messages, MESSAGE_SAMPLE_LIMIT) else {
            return;
        };
        info!(
            sample_index = index,
            sample_limit = MESSAGE_SAMPLE_LIMIT,
            kind = ?message.kind,
            stream = %message.stream,
            "ws message sample"
        );
    }

    fn dropped_inactive(&self, stream: &str) {
        if let Some(index) = Self::take(&self.dropped, DROPPED_LOG_LIMIT) {
            debug!(
                sample_index = index,
                sample_limit = DROPPED_LOG_LIMIT,
                stream,
                "ws message for inactive stream dropped"
            );
        }
    }

    fn parse_failed(&self, err: &BydfiError, raw: &str) {
        let Some(index) = Self::take(&self.parse_failures, PARSE_FAIL_LOG_LIMIT) else {
            return;
        };
        info!(
            sample_index = index,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            "ws message parse failed"
        );
        debug!(
            sample_index = index,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            message = %truncate_for_log(raw, RAW_LOG_MAX_BYTES),
            "ws message parse failed"
        );
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
