/*
[INPUT]:  Stream subscriptions and optional BYDFI_* credentials
[OUTPUT]: Real-time market and user data messages
[POS]:    Examples - WebSocket stream handling
[UPDATE]: When WebSocket API changes
*/

use bydfi_adapter::*;
use tokio::time::{timeout, Duration};
use tracing_subscriber::EnvFilter;

/// Example: subscribe to public streams and print a few messages.
///
/// Subscriptions made before `connect()` are sent once the connection opens
/// and again after every reconnect.
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== BYDFi WebSocket Example ===\n");

    let config = ClientConfig::from_env()?;
    let mut ws = match config.credentials()? {
        Some(credentials) => BydfiWebSocket::with_credentials(WsConfig::default(), credentials),
        None => BydfiWebSocket::new(WsConfig::default()),
    };
    let mut receiver = ws.take_receiver().ok_or("receiver already taken")?;

    ws.subscribe_ticker("BTC-USDT").await?;
    ws.subscribe_order_book("BTC-USDT", 5).await?;
    if config.api_key.is_some() {
        ws.subscribe_user_data().await?;
    }

    ws.connect().await?;
    println!("✓ Connected, waiting for messages...\n");

    for _ in 0..10 {
        match timeout(Duration::from_secs(30), receiver.recv()).await {
            Ok(Some(message)) => println!("[{:?}] {}: {}", message.kind, message.stream, message.data),
            Ok(None) => break,
            Err(_) => {
                println!("No message within 30s");
                break;
            }
        }
    }

    ws.close().await?;
    println!("\n✓ WebSocket example complete");
    Ok(())
}
