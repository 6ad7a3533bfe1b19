/*
[INPUT]:  REST operation names
[OUTPUT]: Static endpoint descriptors (method, path, auth, rate category, retry safety)
[POS]:    HTTP layer - endpoint table consumed by the dispatcher
[UPDATE]: When adding endpoints or changing their classification
*/

use reqwest::Method;

use crate::http::{RateCategory, RequestParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(&self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Whether the endpoint needs a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    Public,
    Signed,
}

/// Whether repeating the request can change exchange state twice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    Idempotent,
    Mutating,
}

/// Static description of a REST endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub path: &'static str,
    pub security: Security,
    pub category: RateCategory,
    pub idempotency: Idempotency,
    /// Client-supplied token that makes a mutating call safe to repeat
    pub idempotency_param: Option<&'static str>,
}

impl Endpoint {
    pub const fn public(method: HttpMethod, path: &'static str) -> Self {
        Self {
            method,
            path,
            security: Security::Public,
            category: RateCategory::Market,
            idempotency: Idempotency::Idempotent,
            idempotency_param: None,
        }
    }

    pub const fn signed(method: HttpMethod, path: &'static str, category: RateCategory) -> Self {
        Self {
            method,
            path,
            security: Security::Signed,
            category,
            idempotency: Idempotency::Idempotent,
            idempotency_param: None,
        }
    }

    pub const fn mutating(self, idempotency_param: Option<&'static str>) -> Self {
        Self {
            idempotency: Idempotency::Mutating,
            idempotency_param,
            ..self
        }
    }

    pub fn is_signed(&self) -> bool {
        self.security == Security::Signed
    }

    /// A request may be re-sent only if it is idempotent, or mutating but
    /// carrying its idempotency token.
    pub fn is_retry_safe(&self, params: &RequestParams) -> bool {
        match self.idempotency {
            Idempotency::Idempotent => true,
            Idempotency::Mutating => self
                .idempotency_param
                .is_some_and(|param| params.contains_key(param)),
        }
    }
}

/// Client order id param; doubles as the idempotency token for order creation
pub const CLIENT_ORDER_ID_PARAM: &str = "newClientOrderId";
/// Client withdrawal id; a withdrawal is only re-sent when it carries one
pub const WITHDRAW_ORDER_ID_PARAM: &str = "withdrawOrderId";

pub const PING: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v1/ping");
pub const SERVER_TIME: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v1/time");
pub const EXCHANGE_INFO: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v1/exchangeInfo");
pub const TICKER: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v1/ticker");
pub const TICKER_24HR: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v1/ticker/24hr");
pub const TICKERS: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v1/tickers");
pub const ORDER_BOOK: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v1/depth");
pub const RECENT_TRADES: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v1/trades");
pub const HISTORICAL_TRADES: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v1/historicalTrades");
pub const KLINES: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v1/klines");

pub const ACCOUNT: Endpoint = Endpoint::signed(HttpMethod::Get, "/api/v1/account", RateCategory::Account);
pub const BALANCE: Endpoint = Endpoint::signed(HttpMethod::Get, "/api/v1/balance", RateCategory::Account);
pub const QUERY_ORDER: Endpoint = Endpoint::signed(HttpMethod::Get, "/api/v1/order", RateCategory::Account);
pub const OPEN_ORDERS: Endpoint = Endpoint::signed(HttpMethod::Get, "/api/v1/openOrders", RateCategory::Account);
pub const ALL_ORDERS: Endpoint = Endpoint::signed(HttpMethod::Get, "/api/v1/allOrders", RateCategory::Account);
pub const MY_TRADES: Endpoint = Endpoint::signed(HttpMethod::Get, "/api/v1/myTrades", RateCategory::Account);

pub const CREATE_ORDER: Endpoint =
    Endpoint::signed(HttpMethod::Post, "/api/v1/order", RateCategory::Order).mutating(Some(CLIENT_ORDER_ID_PARAM));
// Cancelling twice leaves the order cancelled; the second call is rejected, not duplicated
pub const CANCEL_ORDER: Endpoint = Endpoint::signed(HttpMethod::Delete, "/api/v1/order", RateCategory::Order);
pub const CANCEL_ALL_ORDERS: Endpoint =
    Endpoint::signed(HttpMethod::Delete, "/api/v1/openOrders", RateCategory::Order);

pub const DEPOSIT_ADDRESS: Endpoint =
    Endpoint::signed(HttpMethod::Get, "/api/v1/capital/deposit/address", RateCategory::Account);
pub const DEPOSIT_HISTORY: Endpoint =
    Endpoint::signed(HttpMethod::Get, "/api/v1/capital/deposit/history", RateCategory::Account);
pub const WITHDRAW_HISTORY: Endpoint =
    Endpoint::signed(HttpMethod::Get, "/api/v1/capital/withdraw/history", RateCategory::Account);
pub const WITHDRAW: Endpoint = Endpoint::signed(HttpMethod::Post, "/api/v1/capital/withdraw", RateCategory::Order)
    .mutating(Some(WITHDRAW_ORDER_ID_PARAM));
