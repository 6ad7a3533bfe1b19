/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for bydfi-adapter tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bydfi_adapter::{BackoffConfig, BydfiClient, ClientConfig, Credentials, RetryConfig, WsConfig};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use wiremock::MockServer;

pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_API_SECRET: &str = "test-api-secret";

/// Upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(5);

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn test_credentials() -> Credentials {
    Credentials::new(TEST_API_KEY, TEST_API_SECRET).expect("valid test credentials")
}

/// Config pointing at the mock server with short retry delays
pub fn test_config(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::default()
        .with_base_url(server.uri())
        .with_credentials(TEST_API_KEY, TEST_API_SECRET);
    config.retry = RetryConfig::new(2, 10, 50);
    config
}

pub fn test_client(server: &MockServer) -> BydfiClient {
    BydfiClient::with_config(test_config(server)).expect("client init")
}

/// WebSocket config for a loopback server with fast reconnects
pub fn ws_config(url: &str) -> WsConfig {
    WsConfig {
        url: url.to_string(),
        channel_capacity: 16,
        ping_interval: Duration::from_secs(60),
        ping_timeout: Duration::from_secs(10),
        reconnect: BackoffConfig {
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(200),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        },
    }
}

/// A text frame received by the loopback server
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    /// Zero-based index of the connection it arrived on
    pub connection: usize,
    pub value: Value,
}

impl ReceivedFrame {
    pub fn action(&self) -> &str {
        self.value["action"].as_str().unwrap_or_default()
    }

    pub fn channel(&self) -> &str {
        self.value["channel"].as_str().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
enum Command {
    Send(String),
    DropAll,
}

/// Loopback WebSocket server that records client frames
pub struct WsTestServer {
    pub url: String,
    frames: mpsc::UnboundedReceiver<ReceivedFrame>,
    commands: broadcast::Sender<Command>,
    connections: Arc<AtomicUsize>,
}

impl WsTestServer {
    /// Start a server that answers pings
    pub async fn start() -> Self {
        Self::start_with(true).await
    }

    /// Start a server; with `answer_pings = false` keepalives go unanswered
    pub async fn start_with(answer_pings: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
        let url = format!("ws://{}", listener.local_addr().expect("local addr"));
        let (frames_tx, frames) = mpsc::unbounded_channel();
        let (commands, _) = broadcast::channel(64);
        let connections = Arc::new(AtomicUsize::new(0));

        let accept_commands = commands.clone();
        let accept_connections = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(socket) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                let connection = accept_connections.fetch_add(1, Ordering::SeqCst);
                let commands = accept_commands.subscribe();
                tokio::spawn(serve(socket, connection, commands, frames_tx.clone(), answer_pings));
            }
        });

        Self {
            url,
            frames,
            commands,
            connections,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Send a text frame to every open connection
    pub fn send(&self, value: Value) {
        let _ = self.commands.send(Command::Send(value.to_string()));
    }

    /// Send raw text, e.g. something that is not JSON
    pub fn send_raw(&self, text: &str) {
        let _ = self.commands.send(Command::Send(text.to_string()));
    }

    /// Abruptly close every open connection
    pub fn drop_connections(&self) {
        let _ = self.commands.send(Command::DropAll);
    }

    pub async fn next_frame(&mut self) -> ReceivedFrame {
        tokio::time::timeout(WAIT, self.frames.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("server stopped")
    }

    /// Next frame that is not a keepalive ping
    pub async fn next_request(&mut self) -> ReceivedFrame {
        loop {
            let frame = self.next_frame().await;
            if frame.action() != "ping" {
                return frame;
            }
        }
    }

    /// Wait for no further requests within `window`
    pub async fn assert_quiet(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, self.frames.recv()).await {
                Err(_) => return,
                Ok(Some(frame)) if frame.action() == "ping" => continue,
                Ok(other) => panic!("unexpected frame: {other:?}"),
            }
        }
    }
}

async fn serve(
    socket: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    connection: usize,
    mut commands: broadcast::Receiver<Command>,
    frames: mpsc::UnboundedSender<ReceivedFrame>,
    answer_pings: bool,
) {
    let (mut write, mut read) = socket.split();
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Ok(Command::Send(text)) => {
                    if write.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                Ok(Command::DropAll) | Err(broadcast::error::RecvError::Closed) => return,
                Err(broadcast::error::RecvError::Lagged(_)) => {}
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
                    if answer_pings && value["action"] == "ping" {
                        let pong = json!({ "result": null, "id": value["id"].clone() });
                        if write.send(Message::Text(pong.to_string().into())).await.is_err() {
                            return;
                        }
                    }
                    let _ = frames.send(ReceivedFrame { connection, value });
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
        }
    }
}
