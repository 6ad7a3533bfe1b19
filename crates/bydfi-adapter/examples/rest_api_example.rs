/*
[INPUT]:  Symbol identifier and optional BYDFI_* credentials
[OUTPUT]: Market data, and account data when credentials are set
[POS]:    Examples - REST API usage
[UPDATE]: When adding new REST endpoints
*/

use bydfi_adapter::*;
use tracing_subscriber::EnvFilter;

/// Example: query public market data, then account data if configured.
///
/// Credentials are read from `BYDFI_API_KEY` / `BYDFI_API_SECRET`.
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== BYDFi REST Example ===\n");

    let client = BydfiClient::with_config(ClientConfig::from_env()?)?;
    let offset = client.sync_time().await?;
    println!("✓ Clock offset: {offset}ms");

    let symbol = "BTC-USDT";

    let ticker = client.ticker(symbol).await?;
    println!("✓ Ticker: {ticker:?}");

    let book = client.order_book(symbol, Some(5)).await?;
    println!(
        "✓ Best bid {:?} / best ask {:?}",
        book.best_bid().map(|level| level.price),
        book.best_ask().map(|level| level.price)
    );

    let klines = client.klines(symbol, KlineInterval::OneHour, None, None, Some(3)).await?;
    println!("✓ {} hourly klines", klines.len());

    if !client.has_credentials() {
        println!("\nNo credentials set; skipping account endpoints");
        return Ok(());
    }

    for balance in client.balances().await? {
        println!("  {}: {} (locked {})", balance.asset, balance.free, balance.locked);
    }

    match client.open_orders(Some(symbol)).await {
        Ok(orders) => println!("✓ {} open orders", orders.len()),
        Err(err) if err.is_auth_error() => println!("✗ Credentials rejected: {err}"),
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
