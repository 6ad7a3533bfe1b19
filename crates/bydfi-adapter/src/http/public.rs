/*
[INPUT]:  Symbol identifiers and query parameters
[OUTPUT]: Market data (exchange info, tickers, depth, trades, klines)
[POS]:    HTTP layer - public market data endpoints (no auth required)
[UPDATE]: When adding new public endpoints or changing response format
*/

use crate::http::{endpoints, BydfiClient, RequestParams, Result};
use crate::types::{ExchangeInfo, Kline, KlineInterval, OrderBook, Pong, ServerTime, Ticker, Trade};

impl BydfiClient {
    /// Test connectivity
    ///
    /// GET /api/v1/ping
    pub async fn ping(&self) -> Result<Pong> {
        self.execute(&endpoints::PING, RequestParams::new()).await
    }

    /// GET /api/v1/time
    pub async fn server_time(&self) -> Result<ServerTime> {
        self.execute(&endpoints::SERVER_TIME, RequestParams::new()).await
    }

    /// Trading rules and symbol list
    ///
    /// GET /api/v1/exchangeInfo
    pub async fn exchange_info(&self) -> Result<ExchangeInfo> {
        self.execute(&endpoints::EXCHANGE_INFO, RequestParams::new()).await
    }

    /// GET /api/v1/ticker?symbol={symbol}
    pub async fn ticker(&self, symbol: &str) -> Result<Ticker> {
        self.execute(&endpoints::TICKER, RequestParams::new().with("symbol", symbol))
            .await
    }

    /// 24h rolling statistics
    ///
    /// GET /api/v1/ticker/24hr?symbol={symbol}
    pub async fn ticker_24hr(&self, symbol: &str) -> Result<Ticker> {
        self.execute(&endpoints::TICKER_24HR, RequestParams::new().with("symbol", symbol))
            .await
    }

    /// Tickers for every symbol
    ///
    /// GET /api/v1/tickers
    pub async fn tickers(&self) -> Result<Vec<Ticker>> {
        self.execute(&endpoints::TICKERS, RequestParams::new()).await
    }

    /// GET /api/v1/depth?symbol={symbol}&limit={limit}
    pub async fn order_book(&self, symbol: &str, limit: Option<u32>) -> Result<OrderBook> {
        let mut params = RequestParams::new().with("symbol", symbol);
        params.insert_opt("limit", limit);
        self.execute(&endpoints::ORDER_BOOK, params).await
    }

    /// GET /api/v1/trades?symbol={symbol}&limit={limit}
    pub async fn recent_trades(&self, symbol: &str, limit: Option<u32>) -> Result<Vec<Trade>> {
        let mut params = RequestParams::new().with("symbol", symbol);
        params.insert_opt("limit", limit);
        self.execute(&endpoints::RECENT_TRADES, params).await
    }

    /// GET /api/v1/historicalTrades?symbol={symbol}&limit={limit}&fromId={from_id}
    pub async fn historical_trades(
        &self,
        symbol: &str,
        limit: Option<u32>,
        from_id: Option<i64>,
    ) -> Result<Vec<Trade>> {
        let mut params = RequestParams::new().with("symbol", symbol);
        params.insert_opt("limit", limit);
        params.insert_opt("fromId", from_id);
        self.execute(&endpoints::HISTORICAL_TRADES, params).await
    }

    /// Candlesticks, oldest first
    ///
    /// GET /api/v1/klines?symbol={symbol}&interval={interval}
    pub async fn klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<Kline>> {
        let mut params = RequestParams::new()
            .with("symbol", symbol)
            .with("interval", interval.as_str());
        params.insert_opt("startTime", start_time);
        params.insert_opt("endTime", end_time);
        params.insert_opt("limit", limit);
        self.execute(&endpoints::KLINES, params).await
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ClientConfig;
    use crate::http::{BydfiClient, BydfiError};
    use crate::types::KlineInterval;
    use rust_decimal::Decimal;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BydfiClient {
        BydfiClient::with_config(ClientConfig::default().with_base_url(server.uri())).expect("client init")
    }

    #[tokio::test]
    async fn test_ping() {
        let server = MockServer::start().await;
        let _mock = Mock::given(method("GET"))
            .and(path("/api/v1/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).ping().await.expect("ping failed");
    }

    #[tokio::test]
    async fn test_ticker() {
        let server = MockServer::start().await;
        let mock_response = r#"{
            "symbol": "BTC-USDT",
            "priceChange": "-94.99999800",
            "priceChangePercent": "-95.960",
            "lastPrice": "4.00000200",
            "lastQty": "200.00000000",
            "open": "99.00000000",
            "high": "100.00000000",
            "low": "0.10000000",
            "volume": "8913.30000000",
            "quoteVolume": "15.30000000",
            "openTime": 1499783499040,
            "closeTime": 1499869899040
        }"#;

        let _mock = Mock::given(method("GET"))
            .and(path("/api/v1/ticker/24hr"))
            .and(query_param("symbol", "BTC-USDT"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(mock_response, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let ticker = client_for(&server)
            .ticker_24hr("BTC-USDT")
            .await
            .expect("ticker_24hr failed");

        assert_eq!(ticker.symbol, "BTC-USDT");
        assert_eq!(ticker.last_price, "4.00000200".parse::<Decimal>().unwrap());
        assert_eq!(ticker.close_time, 1_499_869_899_040);
    }

    #[tokio::test]
    async fn test_order_book_with_limit() {
        let server = MockServer::start().await;
        let mock_response = r#"{
            "lastUpdateId": 1027024,
            "bids": [["4.00000000", "431.00000000"]],
            "asks": [["4.00000200", "12.00000000"]]
        }"#;

        let _mock = Mock::given(method("GET"))
            .and(path("/api/v1/depth"))
            .and(query_param("symbol", "BTC-USDT"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(mock_response, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let book = client_for(&server)
            .order_book("BTC-USDT", Some(5))
            .await
            .expect("order_book failed");

        assert_eq!(book.last_update_id, 1_027_024);
        assert_eq!(book.bids.len(), 1);
        assert_eq!(book.asks[0].quantity, "12".parse::<Decimal>().unwrap());
    }

    #[tokio::test]
    async fn test_klines() {
        let server = MockServer::start().await;
        let mock_response = r#"[
            [1499040000000, "0.01634790", "0.80000000", "0.01575800", "0.01577100",
             "148976.11427815", 1499644799999, "2434.19055334", 308,
             "1756.87402397", "28.46694368"]
        ]"#;

        let _mock = Mock::given(method("GET"))
            .and(path("/api/v1/klines"))
            .and(query_param("symbol", "BTC-USDT"))
            .and(query_param("interval", "1h"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(mock_response, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let klines = client_for(&server)
            .klines("BTC-USDT", KlineInterval::OneHour, None, None, Some(1))
            .await
            .expect("klines failed");

        assert_eq!(klines.len(), 1);
        assert_eq!(klines[0].trades, 308);
        assert_eq!(klines[0].open, "0.01634790".parse::<Decimal>().unwrap());
    }

    #[tokio::test]
    async fn test_malformed_kline_is_protocol_error() {
        let server = MockServer::start().await;
        let _mock = Mock::given(method("GET"))
            .and(path("/api/v1/klines"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(r#"[[1, "0.1"]]"#, "application/json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .klines("BTC-USDT", KlineInterval::OneMinute, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BydfiError::Protocol(_)));
    }
}
