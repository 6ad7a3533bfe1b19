/*
[INPUT]:  Per-category limits, admission requests and server weight headers
[OUTPUT]: Admit / delay / reject decisions and budget snapshots
[POS]:    HTTP layer - client-side rate limiting shared by all REST calls
[UPDATE]: When changing budget accounting or header synchronization
*/

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::duration_ms;
use crate::http::{BydfiError, RateLimitOrigin, Result};

/// Header carrying the weight consumed in the current server window
pub const USED_WEIGHT_HEADER: &str = "X-MBX-USED-WEIGHT-1M";
/// Header carrying the server-side weight limit
pub const LIMIT_WEIGHT_HEADER: &str = "X-MBX-LIMIT-WEIGHT-1M";

/// Default allowance per category: 1200 requests per minute
pub const DEFAULT_RATE_LIMIT: u32 = 1200;

/// Budget bucket an endpoint draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateCategory {
    /// Public market data
    Market,
    /// Signed account and order queries
    Account,
    /// Order placement and cancellation
    Order,
}

impl RateCategory {
    pub const ALL: [RateCategory; 3] = [RateCategory::Market, RateCategory::Account, RateCategory::Order];

    pub fn as_str(&self) -> &'static str {
        match self {
            RateCategory::Market => "market",
            RateCategory::Account => "account",
            RateCategory::Order => "order",
        }
    }
}

impl fmt::Display for RateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when a budget is exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPolicy {
    /// Wait until the window resets
    #[default]
    Block,
    /// Return `RateLimited` immediately
    FailFast,
}

impl FromStr for RateLimitPolicy {
    type Err = BydfiError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(RateLimitPolicy::Block),
            "fail-fast" | "fail_fast" | "failfast" => Ok(RateLimitPolicy::FailFast),
            other => Err(BydfiError::Config(format!(
                "unknown rate limit policy {other:?} (expected block or fail-fast)"
            ))),
        }
    }
}

/// A single "N requests per window" constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub max_requests: u32,
    #[serde(rename = "window_ms", with = "duration_ms")]
    pub window: Duration,
}

impl RateLimit {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub fn per_second(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(1))
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

/// Limits for every category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    pub market: RateLimit,
    pub account: RateLimit,
    pub order: RateLimit,
}

impl Default for RateLimits {
    fn default() -> Self {
        let limit = RateLimit::per_minute(DEFAULT_RATE_LIMIT);
        Self {
            market: limit,
            account: limit,
            order: limit,
        }
    }
}

impl RateLimits {
    /// Same limit for every category
    pub fn uniform(limit: RateLimit) -> Self {
        Self {
            market: limit,
            account: limit,
            order: limit,
        }
    }

    pub fn get(&self, category: RateCategory) -> RateLimit {
        match category {
            RateCategory::Market => self.market,
            RateCategory::Account => self.account,
            RateCategory::Order => self.order,
        }
    }
}

/// Current allowance of one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateBudget {
    pub category: RateCategory,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: Instant,
}

impl RateBudget {
    fn fresh(category: RateCategory, limit: RateLimit, now: Instant) -> Self {
        Self {
            category,
            limit: limit.max_requests,
            remaining: limit.max_requests,
            reset_at: now + min_window(limit.window),
        }
    }

    /// Start a new window once the current one has elapsed
    fn roll_window(&mut self, window: Duration, now: Instant) {
        if now >= self.reset_at {
            self.remaining = self.limit;
            self.reset_at = now + min_window(window);
        }
    }

    /// Time until the window resets
    pub fn wait_time(&self, now: Instant) -> Duration {
        self.reset_at.saturating_duration_since(now)
    }
}

fn min_window(window: Duration) -> Duration {
    window.max(Duration::from_millis(1))
}

/// Weight usage reported by the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightUsage {
    pub used: u32,
    pub limit: Option<u32>,
}

/// Read the weight headers; `None` when the exchange did not report usage
pub fn parse_weight_headers(headers: &HeaderMap) -> Option<WeightUsage> {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u32>().ok())
    };

    let used = read(USED_WEIGHT_HEADER)?;
    Some(WeightUsage {
        used,
        limit: read(LIMIT_WEIGHT_HEADER),
    })
}

/// Per-category budget table shared by every clone of the client.
///
/// The local decrement is an optimistic prediction; any usage the server
/// reports replaces it.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    limits: RateLimits,
    budgets: Arc<Mutex<HashMap<RateCategory, RateBudget>>>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits, policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            limits,
            budgets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    pub fn limits(&self) -> &RateLimits {
        &self.limits
    }

    /// Take one unit from the category budget.
    ///
    /// Blocks until the window resets under [`RateLimitPolicy::Block`];
    /// returns `RateLimited` under [`RateLimitPolicy::FailFast`].
    pub async fn acquire(&self, category: RateCategory) -> Result<()> {
        let window = self.limits.get(category).window;

        loop {
            let wait = {
                let mut budgets = self.budgets.lock().await;
                let now = Instant::now();
                let budget = self.budget_entry(&mut budgets, category, now);
                budget.roll_window(window, now);

                if budget.remaining > 0 {
                    budget.remaining -= 1;
                    return Ok(());
                }
                budget.wait_time(now)
            };

            match self.policy {
                RateLimitPolicy::FailFast => {
                    return Err(BydfiError::RateLimited {
                        origin: RateLimitOrigin::Local,
                        retry_after: Some(wait),
                        code: None,
                        message: format!("{category} budget exhausted"),
                    });
                }
                RateLimitPolicy::Block => {
                    debug!(
                        category = category.as_str(),
                        wait_ms = wait.as_millis() as u64,
                        "rate limiter waiting for window reset"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Re-synchronize from response headers; server state wins.
    ///
    /// The reported weight is one pool per IP, so it applies to every category.
    pub async fn sync_from_headers(&self, headers: &HeaderMap) -> Option<WeightUsage> {
        let usage = parse_weight_headers(headers)?;
        self.sync(usage).await;
        Some(usage)
    }

    /// Overwrite the local estimate of every category with server-reported usage
    pub async fn sync(&self, usage: WeightUsage) {
        let mut budgets = self.budgets.lock().await;
        let now = Instant::now();

        for category in RateCategory::ALL {
            let budget = self.budget_entry(&mut budgets, category, now);
            if let Some(limit) = usage.limit {
                budget.limit = limit;
            }
            let remaining = budget.limit.saturating_sub(usage.used);
            if remaining != budget.remaining {
                debug!(
                    category = category.as_str(),
                    local = budget.remaining,
                    server = remaining,
                    "rate budget resynchronized from server"
                );
            }
            budget.remaining = remaining;
        }
    }

    /// Empty the budget until `retry_after` has elapsed
    pub async fn penalize(&self, category: RateCategory, retry_after: Duration) {
        let mut budgets = self.budgets.lock().await;
        let now = Instant::now();
        let budget = self.budget_entry(&mut budgets, category, now);
        // The window restarts once the server's wait has elapsed
        budget.remaining = 0;
        budget.reset_at = now + retry_after;
    }

    /// Current budget of a category
    pub async fn snapshot(&self, category: RateCategory) -> RateBudget {
        let mut budgets = self.budgets.lock().await;
        let now = Instant::now();
        let window = self.limits.get(category).window;
        let budget = self.budget_entry(&mut budgets, category, now);
        budget.roll_window(window, now);
        budget.clone()
    }

    fn budget_entry<'a>(
        &self,
        budgets: &'a mut HashMap<RateCategory, RateBudget>,
        category: RateCategory,
        now: Instant,
    ) -> &'a mut RateBudget {
        budgets
            .entry(category)
            .or_insert_with(|| RateBudget::fresh(category, self.limits.get(category), now))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimits::default(), RateLimitPolicy::default())
    }
}
