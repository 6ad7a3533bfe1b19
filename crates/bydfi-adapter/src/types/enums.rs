/*
[INPUT]:  Exchange enum vocabularies (sides, order types, statuses, intervals)
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
    StopLoss,
    StopLossLimit,
    TakeProfit,
    TakeProfitLimit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
            OrderType::StopLoss => "STOP_LOSS",
            OrderType::StopLossLimit => "STOP_LOSS_LIMIT",
            OrderType::TakeProfit => "TAKE_PROFIT",
            OrderType::TakeProfitLimit => "TAKE_PROFIT_LIMIT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    #[serde(alias = "CANCELLED")]
    Canceled,
    PendingCancel,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// No further fills can happen
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }
}

/// Candlestick width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KlineInterval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl KlineInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            KlineInterval::OneMinute => "1m",
            KlineInterval::ThreeMinutes => "3m",
            KlineInterval::FiveMinutes => "5m",
            KlineInterval::FifteenMinutes => "15m",
            KlineInterval::ThirtyMinutes => "30m",
            KlineInterval::OneHour => "1h",
            KlineInterval::TwoHours => "2h",
            KlineInterval::FourHours => "4h",
            KlineInterval::SixHours => "6h",
            KlineInterval::EightHours => "8h",
            KlineInterval::TwelveHours => "12h",
            KlineInterval::OneDay => "1d",
            KlineInterval::ThreeDays => "3d",
            KlineInterval::OneWeek => "1w",
            KlineInterval::OneMonth => "1M",
        }
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deposit state as reported by the capital endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum DepositStatus {
    Pending,
    Success,
    /// Credited to the account but not yet withdrawable
    CreditedLocked,
    Unknown(i32),
}

impl From<i32> for DepositStatus {
    fn from(code: i32) -> Self {
        match code {
            0 => DepositStatus::Pending,
            1 => DepositStatus::Success,
            2 => DepositStatus::CreditedLocked,
            other => DepositStatus::Unknown(other),
        }
    }
}

impl From<DepositStatus> for i32 {
    fn from(status: DepositStatus) -> Self {
        match status {
            DepositStatus::Pending => 0,
            DepositStatus::Success => 1,
            DepositStatus::CreditedLocked => 2,
            DepositStatus::Unknown(code) => code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum WithdrawStatus {
    EmailSent,
    Canceled,
    AwaitingApproval,
    Rejected,
    Processing,
    Failure,
    Completed,
    Unknown(i32),
}

impl WithdrawStatus {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            WithdrawStatus::Canceled | WithdrawStatus::Rejected | WithdrawStatus::Failure | WithdrawStatus::Completed
        )
    }
}

impl From<i32> for WithdrawStatus {
    fn from(code: i32) -> Self {
        match code {
            0 => WithdrawStatus::EmailSent,
            1 => WithdrawStatus::Canceled,
            2 => WithdrawStatus::AwaitingApproval,
            3 => WithdrawStatus::Rejected,
            4 => WithdrawStatus::Processing,
            5 => WithdrawStatus::Failure,
            6 => WithdrawStatus::Completed,
            other => WithdrawStatus::Unknown(other),
        }
    }
}

impl From<WithdrawStatus> for i32 {
    fn from(status: WithdrawStatus) -> Self {
        match status {
            WithdrawStatus::EmailSent => 0,
            WithdrawStatus::Canceled => 1,
            WithdrawStatus::AwaitingApproval => 2,
            WithdrawStatus::Rejected => 3,
            WithdrawStatus::Processing => 4,
            WithdrawStatus::Failure => 5,
            WithdrawStatus::Completed => 6,
            WithdrawStatus::Unknown(code) => code,
        }
    }
}
