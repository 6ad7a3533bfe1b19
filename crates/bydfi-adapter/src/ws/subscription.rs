/*
[INPUT]:  Channel/parameter pairs requested by the caller
[OUTPUT]: Insertion-ordered, deduplicated active subscription set
[POS]:    WebSocket layer - subscription bookkeeping and replay order
[UPDATE]: When adding channels or changing stream naming
*/

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::types::KlineInterval;

/// Stream channel offered by the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Ticker,
    Ticker24h,
    OrderBook,
    Trades,
    Klines,
    Account,
    Order,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Ticker => "ticker",
            Channel::Ticker24h => "ticker.24h",
            Channel::OrderBook => "orderbook",
            Channel::Trades => "trades",
            Channel::Klines => "kline",
            Channel::Account => "account",
            Channel::Order => "order",
        }
    }

    /// User data channels need an authenticated session
    pub fn requires_auth(&self) -> bool {
        matches!(self, Channel::Account | Channel::Order)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const SYMBOL_PARAM: &str = "symbol";
pub const DEPTH_PARAM: &str = "depth";
pub const INTERVAL_PARAM: &str = "interval";

/// Default order book depth
pub const DEFAULT_DEPTH: u32 = 10;

/// A (channel, parameters) pair; unique within the active set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    channel: Channel,
    params: BTreeMap<String, String>,
}

impl Subscription {
    pub fn new(channel: Channel, params: BTreeMap<String, String>) -> Self {
        Self { channel, params }
    }

    fn for_symbol(channel: Channel, symbol: &str) -> Self {
        let mut params = BTreeMap::new();
        params.insert(SYMBOL_PARAM.to_string(), symbol.to_string());
        Self::new(channel, params)
    }

    fn with_param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn ticker(symbol: &str) -> Self {
        Self::for_symbol(Channel::Ticker, symbol)
    }

    pub fn ticker_24hr(symbol: &str) -> Self {
        Self::for_symbol(Channel::Ticker24h, symbol)
    }

    pub fn order_book(symbol: &str, depth: u32) -> Self {
        Self::for_symbol(Channel::OrderBook, symbol).with_param(DEPTH_PARAM, depth)
    }

    pub fn trades(symbol: &str) -> Self {
        Self::for_symbol(Channel::Trades, symbol)
    }

    pub fn klines(symbol: &str, interval: KlineInterval) -> Self {
        Self::for_symbol(Channel::Klines, symbol).with_param(INTERVAL_PARAM, interval.as_str())
    }

    pub fn account() -> Self {
        Self::new(Channel::Account, BTreeMap::new())
    }

    pub fn orders() -> Self {
        Self::new(Channel::Order, BTreeMap::new())
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn symbol(&self) -> Option<&str> {
        self.params.get(SYMBOL_PARAM).map(String::as_str)
    }

    /// Stream name the exchange tags data frames with, e.g. `btc-usdt@orderbook.10`
    pub fn stream_name(&self) -> String {
        let symbol = self.symbol().unwrap_or_default().to_lowercase();
        match self.channel {
            Channel::Ticker => format!("{symbol}@ticker"),
            Channel::Ticker24h => format!("{symbol}@ticker.24h"),
            Channel::OrderBook => {
                let depth = self
                    .params
                    .get(DEPTH_PARAM)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_DEPTH.to_string());
                format!("{symbol}@orderbook.{depth}")
            }
            Channel::Trades => format!("{symbol}@trades"),
            Channel::Klines => {
                let interval = self.params.get(INTERVAL_PARAM).map(String::as_str).unwrap_or("1m");
                format!("{symbol}@kline_{interval}")
            }
            Channel::Account | Channel::Order => self.channel.as_str().to_string(),
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.channel)?;
        if let Some(symbol) = self.symbol() {
            write!(f, ":{symbol}")?;
        }
        for (key, value) in self.params.iter().filter(|(key, _)| key.as_str() != SYMBOL_PARAM) {
            write!(f, ":{key}={value}")?;
        }
        Ok(())
    }
}

/// Handle returned by subscribe calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Active subscriptions in the order they were first requested
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    next_id: u64,
    entries: Vec<(SubscriptionId, Subscription)>,
    index: HashMap<Subscription, SubscriptionId>,
    /// Stream names of the active set, built once per subscribe
    streams: HashMap<String, SubscriptionId>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription. Returns its handle and whether it was newly added;
    /// an already-active pair keeps its original handle and position.
    pub fn subscribe(&mut self, subscription: Subscription) -> (SubscriptionId, bool) {
        if let Some(id) = self.index.get(&subscription) {
            return (*id, false);
        }

        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.index.insert(subscription.clone(), id);
        self.streams.insert(subscription.stream_name(), id);
        self.entries.push((id, subscription));
        (id, true)
    }

    /// Remove a subscription; `false` if it was not active
    pub fn unsubscribe(&mut self, subscription: &Subscription) -> bool {
        let Some(id) = self.index.remove(subscription) else {
            return false;
        };
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.streams.retain(|_, stream_id| *stream_id != id);
        true
    }

    pub fn contains(&self, subscription: &Subscription) -> bool {
        self.index.contains_key(subscription)
    }

    pub fn id_of(&self, subscription: &Subscription) -> Option<SubscriptionId> {
        self.index.get(subscription).copied()
    }

    /// Active subscriptions in insertion order
    pub fn active_set(&self) -> Vec<Subscription> {
        self.entries.iter().map(|(_, subscription)| subscription.clone()).collect()
    }

    /// Subscriptions to re-issue after a reconnect, in insertion order
    pub fn replay(&self) -> Vec<Subscription> {
        self.active_set()
    }

    /// Whether a data frame tagged `stream` belongs to an active subscription
    ///
    /// Only the symbol before `@` is case-insensitive; the rest must match
    /// exactly, since `kline_1m` and `kline_1M` are different streams.
    pub fn matches_stream(&self, stream: &str) -> bool {
        match stream.split_once('@') {
            Some((symbol, rest)) if symbol.chars().any(|c| c.is_ascii_uppercase()) => self
                .streams
                .contains_key(&format!("{}@{rest}", symbol.to_lowercase())),
            _ => self.streams.contains_key(stream),
        }
    }

    /// Whether any active subscription needs an authenticated session
    pub fn requires_auth(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, subscription)| subscription.channel.requires_auth())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.streams.clear();
    }
}
