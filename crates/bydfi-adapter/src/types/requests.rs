/*
[INPUT]:  Caller-side order and query descriptions
[OUTPUT]: Validated request parameters in exchange wire names
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{OrderType, Side, TimeInForce};
use crate::http::{BydfiError, RequestParams, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderRequest {
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    #[serde(with = "rust_decimal::serde::str_option")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_order_qty: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_client_order_id: Option<String>,
    #[serde(with = "rust_decimal::serde::str_option")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iceberg_qty: Option<Decimal>,
}

impl NewOrderRequest {
    fn base(symbol: impl Into<String>, side: Side, order_type: OrderType) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type,
            time_in_force: None,
            quantity: None,
            quote_order_qty: None,
            price: None,
            new_client_order_id: None,
            stop_price: None,
            iceberg_qty: None,
        }
    }

    /// Good-till-cancelled limit order
    pub fn limit(symbol: impl Into<String>, side: Side, price: Decimal, quantity: Decimal) -> Self {
        Self {
            price: Some(price),
            quantity: Some(quantity),
            time_in_force: Some(TimeInForce::Gtc),
            ..Self::base(symbol, side, OrderType::Limit)
        }
    }

    /// Market order sized in base asset
    pub fn market(symbol: impl Into<String>, side: Side, quantity: Decimal) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::base(symbol, side, OrderType::Market)
        }
    }

    /// Market order sized in quote asset
    pub fn market_quote(symbol: impl Into<String>, side: Side, quote_order_qty: Decimal) -> Self {
        Self {
            quote_order_qty: Some(quote_order_qty),
            ..Self::base(symbol, side, OrderType::Market)
        }
    }

    pub fn with_client_order_id(mut self, client_order_id: impl Into<String>) -> Self {
        self.new_client_order_id = Some(client_order_id.into());
        self
    }

    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = Some(time_in_force);
        self
    }

    pub fn with_stop_price(mut self, stop_price: Decimal) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    pub fn with_iceberg_qty(mut self, iceberg_qty: Decimal) -> Self {
        self.iceberg_qty = Some(iceberg_qty);
        self
    }

    /// Reject orders the exchange would refuse for missing fields
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(BydfiError::Config("order symbol must not be empty".to_string()));
        }
        match self.order_type {
            OrderType::Limit if self.price.is_none() || self.quantity.is_none() => Err(BydfiError::Config(
                "LIMIT orders require price and quantity".to_string(),
            )),
            OrderType::Market if self.quantity.is_none() && self.quote_order_qty.is_none() => {
                Err(BydfiError::Config(
                    "MARKET orders require quantity or quoteOrderQty".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Wire parameters; LIMIT orders default to GTC
    pub fn to_params(&self) -> RequestParams {
        let mut params = RequestParams::new()
            .with("symbol", &self.symbol)
            .with("side", self.side.as_str())
            .with("type", self.order_type.as_str());

        let time_in_force = match (self.time_in_force, self.order_type) {
            (Some(tif), _) => Some(tif),
            (None, OrderType::Limit) => Some(TimeInForce::Gtc),
            (None, _) => None,
        };
        params.insert_opt("timeInForce", time_in_force.map(|tif| tif.as_str()));
        params.insert_opt("quantity", self.quantity);
        params.insert_opt("quoteOrderQty", self.quote_order_qty);
        params.insert_opt("price", self.price);
        params.insert_opt("newClientOrderId", self.new_client_order_id.as_deref());
        params.insert_opt("stopPrice", self.stop_price);
        params.insert_opt("icebergQty", self.iceberg_qty);
        params
    }
}

/// Exchange-assigned or client-assigned order identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderId {
    Exchange(i64),
    Client(String),
}

impl OrderId {
    pub(crate) fn apply(&self, params: &mut RequestParams) {
        match self {
            OrderId::Exchange(id) => params.insert("orderId", id),
            OrderId::Client(id) => params.insert("clientOrderId", id),
        }
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        OrderId::Exchange(id)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        OrderId::Client(id.to_string())
    }
}

/// Filter for order and trade history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrdersQuery {
    pub symbol: String,
    pub order_id: Option<i64>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub limit: Option<u32>,
}

impl OrdersQuery {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn from_order_id(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn between(mut self, start_time: i64, end_time: i64) -> Self {
        self.start_time = Some(start_time);
        self.end_time = Some(end_time);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_params(&self) -> RequestParams {
        let mut params = RequestParams::new().with("symbol", &self.symbol);
        params.insert_opt("orderId", self.order_id);
        params.insert_opt("startTime", self.start_time);
        params.insert_opt("endTime", self.end_time);
        params.insert_opt("limit", self.limit);
        params
    }
}

/// Outbound crypto withdrawal
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawRequest {
    pub coin: String,
    pub address: String,
    pub amount: Decimal,
    pub network: Option<String>,
    pub tag: Option<String>,
    pub memo: Option<String>,
    /// Client token; without it a failed withdrawal is never re-sent
    pub withdraw_order_id: Option<String>,
}

impl WithdrawRequest {
    pub fn new(coin: impl Into<String>, address: impl Into<String>, amount: Decimal) -> Self {
        Self {
            coin: coin.into(),
            address: address.into(),
            amount,
            network: None,
            tag: None,
            memo: None,
            withdraw_order_id: None,
        }
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_withdraw_order_id(mut self, id: impl Into<String>) -> Self {
        self.withdraw_order_id = Some(id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.coin.trim().is_empty() || self.address.trim().is_empty() {
            return Err(BydfiError::Config(
                "withdrawals require a coin and an address".to_string(),
            ));
        }
        if self.amount <= Decimal::ZERO {
            return Err(BydfiError::Config("withdrawal amount must be positive".to_string()));
        }
        Ok(())
    }

    pub fn to_params(&self) -> RequestParams {
        let mut params = RequestParams::new()
            .with("coin", &self.coin)
            .with("address", &self.address)
            .with("amount", self.amount);
        params.insert_opt("network", self.network.as_deref());
        params.insert_opt("tag", self.tag.as_deref());
        params.insert_opt("memo", self.memo.as_deref());
        params.insert_opt("withdrawOrderId", self.withdraw_order_id.as_deref());
        params
    }
}

/// Filter for deposit and withdrawal history; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapitalHistoryQuery {
    pub coin: Option<String>,
    pub status: Option<i32>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub limit: Option<u32>,
}

impl CapitalHistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coin(mut self, coin: impl Into<String>) -> Self {
        self.coin = Some(coin.into());
        self
    }

    /// Accepts a `DepositStatus`, a `WithdrawStatus` or a raw code
    pub fn status(mut self, status: impl Into<i32>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn between(mut self, start_time: i64, end_time: i64) -> Self {
        self.start_time = Some(start_time);
        self.end_time = Some(end_time);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_params(&self) -> RequestParams {
        let mut params = RequestParams::new();
        params.insert_opt("coin", self.coin.as_deref());
        params.insert_opt("status", self.status);
        params.insert_opt("startTime", self.start_time);
        params.insert_opt("endTime", self.end_time);
        params.insert_opt("limit", self.limit);
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WithdrawStatus;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn test_limit_order_params_default_gtc() {
        let mut order = NewOrderRequest::limit("BTC-USDT", Side::Buy, dec("30000.5"), dec("0.01"));
        order.time_in_force = None;
        order.validate().unwrap();

        let params = order.to_params();
        assert_eq!(params.get("timeInForce"), Some("GTC"));
        assert_eq!(params.get("type"), Some("LIMIT"));
        assert_eq!(params.get("price"), Some("30000.5"));
        assert_eq!(params.get("quantity"), Some("0.01"));
        assert!(!params.contains_key("newClientOrderId"));
    }

    #[test]
    fn test_limit_without_price_rejected() {
        let mut order = NewOrderRequest::limit("BTC-USDT", Side::Sell, dec("1"), dec("1"));
        order.price = None;
        assert!(matches!(order.validate(), Err(BydfiError::Config(_))));
    }

    #[test]
    fn test_market_order_sizing() {
        NewOrderRequest::market("BTC-USDT", Side::Buy, dec("0.5")).validate().unwrap();
        NewOrderRequest::market_quote("BTC-USDT", Side::Buy, dec("100")).validate().unwrap();

        let mut unsized_order = NewOrderRequest::market("BTC-USDT", Side::Buy, dec("1"));
        unsized_order.quantity = None;
        assert!(unsized_order.validate().is_err());

        let params = NewOrderRequest::market("BTC-USDT", Side::Sell, dec("2")).to_params();
        assert!(!params.contains_key("timeInForce"));
    }

    #[test]
    fn test_empty_symbol_rejected() {
        let order = NewOrderRequest::market(" ", Side::Buy, dec("1"));
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_order_id_params() {
        let mut params = RequestParams::new();
        OrderId::from(42).apply(&mut params);
        assert_eq!(params.get("orderId"), Some("42"));

        let mut params = RequestParams::new();
        OrderId::from("my-order").apply(&mut params);
        assert_eq!(params.get("clientOrderId"), Some("my-order"));
    }

    #[test]
    fn test_orders_query_params() {
        let params = OrdersQuery::new("ETH-USDT").between(1, 2).limit(50).to_params();
        assert_eq!(params.to_query_string(), "endTime=2&limit=50&startTime=1&symbol=ETH-USDT");
    }

    #[test]
    fn test_withdraw_validation() {
        WithdrawRequest::new("USDT", "TXaddr", dec("10")).validate().unwrap();
        assert!(WithdrawRequest::new("USDT", " ", dec("10")).validate().is_err());
        assert!(WithdrawRequest::new("USDT", "TXaddr", Decimal::ZERO).validate().is_err());
    }

    #[test]
    fn test_withdraw_params() {
        let params = WithdrawRequest::new("XRP", "rAddr", dec("25.5"))
            .with_tag("1234")
            .with_network("XRP")
            .to_params();
        assert_eq!(params.get("amount"), Some("25.5"));
        assert_eq!(params.get("tag"), Some("1234"));
        assert!(!params.contains_key("memo"));
        assert!(!params.contains_key("withdrawOrderId"));
    }

    #[test]
    fn test_history_query_params() {
        assert!(CapitalHistoryQuery::new().to_params().is_empty());

        let params = CapitalHistoryQuery::new()
            .coin("BTC")
            .status(WithdrawStatus::Completed)
            .limit(10)
            .to_params();
        assert_eq!(params.to_query_string(), "coin=BTC&limit=10&status=6");
    }
}
