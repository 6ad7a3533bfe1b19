/*
[INPUT]:  Coins, withdrawal requests and history filters
[OUTPUT]: Deposit addresses, deposit and withdrawal records, withdrawal receipts
[POS]:    HTTP layer - signed capital (deposit/withdraw) endpoints
[UPDATE]: When adding capital endpoints or changing withdrawal safety rules
*/

use tracing::info;

use crate::http::{endpoints, BydfiClient, RequestParams, Result};
use crate::types::{
    CapitalHistoryQuery, DepositAddress, DepositRecord, WithdrawReceipt, WithdrawRecord, WithdrawRequest,
};

impl BydfiClient {
    /// GET /api/v1/capital/deposit/address
    pub async fn deposit_address(&self, coin: &str, network: Option<&str>) -> Result<DepositAddress> {
        let mut params = RequestParams::new().with("coin", coin);
        params.insert_opt("network", network);
        self.execute(&endpoints::DEPOSIT_ADDRESS, params).await
    }

    /// GET /api/v1/capital/deposit/history
    pub async fn deposit_history(&self, query: &CapitalHistoryQuery) -> Result<Vec<DepositRecord>> {
        self.execute(&endpoints::DEPOSIT_HISTORY, query.to_params()).await
    }

    /// Submit a withdrawal
    ///
    /// POST /api/v1/capital/withdraw
    ///
    /// No token is generated here. Without a caller-supplied
    /// `withdrawOrderId` the request is sent exactly once, and a transport
    /// failure leaves its outcome for the caller to check in the history.
    pub async fn withdraw(&self, request: &WithdrawRequest) -> Result<WithdrawReceipt> {
        request.validate()?;

        let receipt: WithdrawReceipt = self.execute(&endpoints::WITHDRAW, request.to_params()).await?;
        info!(
            coin = %request.coin,
            amount = %request.amount,
            withdraw_id = %receipt.id,
            "withdrawal submitted"
        );
        Ok(receipt)
    }

    /// GET /api/v1/capital/withdraw/history
    pub async fn withdraw_history(&self, query: &CapitalHistoryQuery) -> Result<Vec<WithdrawRecord>> {
        self.execute(&endpoints::WITHDRAW_HISTORY, query.to_params()).await
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ClientConfig;
    use crate::http::signature::API_KEY_HEADER;
    use crate::http::{BydfiClient, BydfiError, RetryConfig};
    use crate::types::{CapitalHistoryQuery, DepositStatus, WithdrawRequest, WithdrawStatus};
    use rust_decimal::Decimal;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn signed_client(server: &MockServer) -> BydfiClient {
        let mut config = ClientConfig::default()
            .with_base_url(server.uri())
            .with_credentials("test-key", "test-secret");
        config.retry = RetryConfig::new(2, 10, 50);
        BydfiClient::with_config(config).expect("client init")
    }

    fn usdt_withdrawal() -> WithdrawRequest {
        WithdrawRequest::new("USDT", "TNwWgHzZ4zY", "15".parse::<Decimal>().unwrap()).with_network("TRX")
    }

    #[tokio::test]
    async fn test_deposit_address() {
        let server = MockServer::start().await;
        let mock_response = r#"{"coin": "XRP", "address": "rEb8TK3gBgk5auZkwc6sHnwrGVJH8DuaLh", "tag": "104", "network": "XRP"}"#;

        let _mock = Mock::given(method("GET"))
            .and(path("/api/v1/capital/deposit/address"))
            .and(header(API_KEY_HEADER, "test-key"))
            .and(query_param("coin", "XRP"))
            .and(query_param("network", "XRP"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(mock_response, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let address = signed_client(&server)
            .deposit_address("XRP", Some("XRP"))
            .await
            .expect("deposit address failed");
        assert_eq!(address.tag.as_deref(), Some("104"));
        assert!(address.url.is_none());
    }

    #[tokio::test]
    async fn test_deposit_history_filters() {
        let server = MockServer::start().await;
        let mock_response = r#"[
            {"id": "d-1", "coin": "BTC", "amount": "0.25", "network": "BTC", "status": 1,
             "address": "bc1qxyz", "txId": "0xabc", "insertTime": 1700000000000},
            {"coin": "BTC", "amount": "1", "status": 0, "address": "bc1qxyz", "insertTime": 1700000100000}
        ]"#;

        let _mock = Mock::given(method("GET"))
            .and(path("/api/v1/capital/deposit/history"))
            .and(query_param("coin", "BTC"))
            .and(query_param("status", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(mock_response, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let query = CapitalHistoryQuery::new().coin("BTC").status(DepositStatus::Success);
        let deposits = signed_client(&server).deposit_history(&query).await.expect("history failed");
        assert_eq!(deposits.len(), 2);
        assert_eq!(deposits[0].status, DepositStatus::Success);
        assert_eq!(deposits[1].status, DepositStatus::Pending);
        assert!(deposits[1].tx_id.is_none());
    }

    #[tokio::test]
    async fn test_withdraw_history() {
        let server = MockServer::start().await;
        let mock_response = r#"[
            {"id": "w-9", "coin": "USDT", "amount": "15", "transactionFee": "1", "network": "TRX",
             "status": 6, "address": "TNwWgHzZ4zY", "txId": "f00d", "applyTime": 1700000000000}
        ]"#;

        let _mock = Mock::given(method("GET"))
            .and(path("/api/v1/capital/withdraw/history"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(mock_response, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let records = signed_client(&server)
            .withdraw_history(&CapitalHistoryQuery::new().limit(5))
            .await
            .expect("history failed");
        assert_eq!(records[0].status, WithdrawStatus::Completed);
        assert_eq!(records[0].transaction_fee, Some(Decimal::ONE));
    }

    #[tokio::test]
    async fn test_withdraw_submits_params() {
        let server = MockServer::start().await;
        let _mock = Mock::given(method("POST"))
            .and(path("/api/v1/capital/withdraw"))
            .and(query_param("coin", "USDT"))
            .and(query_param("amount", "15"))
            .and(query_param("network", "TRX"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"id": "w-1"}"#, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = signed_client(&server).withdraw(&usdt_withdrawal()).await.expect("withdraw failed");
        assert_eq!(receipt.id, "w-1");

        let requests = server.received_requests().await.expect("recording enabled");
        assert!(!requests[0].url.query().unwrap_or_default().contains("withdrawOrderId"));
    }

    #[tokio::test]
    async fn test_withdraw_without_token_is_sent_once() {
        let server = MockServer::start().await;
        let _mock = Mock::given(method("POST"))
            .and(path("/api/v1/capital/withdraw"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = signed_client(&server).withdraw(&usdt_withdrawal()).await.unwrap_err();
        assert!(matches!(err, BydfiError::Network { status: Some(503), .. }));
    }

    #[tokio::test]
    async fn test_withdraw_with_token_is_retried() {
        let server = MockServer::start().await;
        let _mock = Mock::given(method("POST"))
            .and(path("/api/v1/capital/withdraw"))
            .and(query_param("withdrawOrderId", "payout-42"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let request = usdt_withdrawal().with_withdraw_order_id("payout-42");
        let err = signed_client(&server).withdraw(&request).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_invalid_withdrawal_makes_no_request() {
        let server = MockServer::start().await;
        let _mock = Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let request = WithdrawRequest::new("USDT", "TNwWgHzZ4zY", Decimal::ZERO);
        let err = signed_client(&server).withdraw(&request).await.unwrap_err();
        assert!(matches!(err, BydfiError::Config(_)));
    }
}
