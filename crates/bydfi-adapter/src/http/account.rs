/*
[INPUT]:  Signed account queries
[OUTPUT]: Account info, balances, orders and fills
[POS]:    HTTP layer - signed read-only endpoints
[UPDATE]: When adding new account endpoints or changing response format
*/

use crate::http::{endpoints, BydfiClient, RequestParams, Result};
use crate::types::{AccountInfo, AccountTrade, Balance, Order, OrderId, OrdersQuery};

impl BydfiClient {
    /// GET /api/v1/account
    pub async fn account_info(&self) -> Result<AccountInfo> {
        self.execute(&endpoints::ACCOUNT, RequestParams::new()).await
    }

    /// GET /api/v1/balance
    pub async fn balances(&self) -> Result<Vec<Balance>> {
        self.execute(&endpoints::BALANCE, RequestParams::new()).await
    }

    /// Status of a single order
    ///
    /// GET /api/v1/order?symbol={symbol}&orderId={id}
    pub async fn order(&self, symbol: &str, order_id: impl Into<OrderId>) -> Result<Order> {
        let mut params = RequestParams::new().with("symbol", symbol);
        order_id.into().apply(&mut params);
        self.execute(&endpoints::QUERY_ORDER, params).await
    }

    /// Open orders, optionally for one symbol
    ///
    /// GET /api/v1/openOrders
    pub async fn open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        let mut params = RequestParams::new();
        params.insert_opt("symbol", symbol);
        self.execute(&endpoints::OPEN_ORDERS, params).await
    }

    /// GET /api/v1/allOrders
    pub async fn all_orders(&self, query: &OrdersQuery) -> Result<Vec<Order>> {
        self.execute(&endpoints::ALL_ORDERS, query.to_params()).await
    }

    /// GET /api/v1/myTrades
    pub async fn my_trades(&self, query: &OrdersQuery) -> Result<Vec<AccountTrade>> {
        self.execute(&endpoints::MY_TRADES, query.to_params()).await
    }
}
