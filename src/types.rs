use serde::{Deserialize, Serialize};

// --- Enums ---

/// Contract family an account operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FuturesAccountType {
    #[default]
    BaseUsdt,
    BaseQc,
    BaseCoin,
}

impl FuturesAccountType {
    pub fn value(self) -> i64 {
        match self {
            FuturesAccountType::BaseUsdt => 1,
            FuturesAccountType::BaseQc => 2,
            FuturesAccountType::BaseCoin => 3,
        }
    }
}

/// Kline period token used both in REST `period` params and stream channel names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interval {
    Min1,
    Min5,
    #[default]
    Min15,
    Min30,
    Hour1,
    Hour6,
    Day1,
    Day5,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Min1 => "1M",
            Interval::Min5 => "5M",
            Interval::Min15 => "15M",
            Interval::Min30 => "30M",
            Interval::Hour1 => "1H",
            Interval::Hour6 => "6H",
            Interval::Day1 => "1D",
            Interval::Day5 => "5D",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    // Two-way positions
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
    // One-way positions
    OneWayBuy,
    OneWaySell,
    OneWayOnlyClose,
}

impl OrderSide {
    pub fn value(self) -> i64 {
        match self {
            OrderSide::OpenLong => 1,
            OrderSide::OpenShort => 2,
            OrderSide::CloseLong => 3,
            OrderSide::CloseShort => 4,
            OrderSide::OneWayBuy => 5,
            OrderSide::OneWaySell => 6,
            OrderSide::OneWayOnlyClose => 0,
        }
    }
}

/// Order price type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    #[default]
    Limit,
    Opponent,
    Optimal5,
    Market,
    Ioc,
    OpponentIoc,
    Optimal5Ioc,
    OnlyMaker,
    Fok,
    OpponentFok,
    Optimal5Fok,
}

impl Action {
    pub fn value(self) -> i64 {
        match self {
            Action::Limit => 1,
            Action::Opponent => 11,
            Action::Optimal5 => 12,
            Action::Market => 2,
            Action::Ioc => 3,
            Action::OpponentIoc => 31,
            Action::Optimal5Ioc => 32,
            Action::OnlyMaker => 4,
            Action::Fok => 5,
            Action::OpponentFok => 51,
            Action::Optimal5Fok => 52,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionsMode {
    OneDirection,
    BiDirection,
}

impl PositionsMode {
    pub fn value(self) -> i64 {
        match self {
            PositionsMode::OneDirection => 1,
            PositionsMode::BiDirection => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginMode {
    Isolated,
    Cross,
}

impl MarginMode {
    pub fn value(self) -> i64 {
        match self {
            MarginMode::Isolated => 1,
            MarginMode::Cross => 2,
        }
    }
}

// --- Request Structs ---

/// One entry of a batch order, serialized with the exchange's camelCase keys.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub symbol: String,
    pub side: i64,
    pub action: i64,
    pub amount: f64,
    pub price: f64,
    pub entrust_type: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    pub fn limit(symbol: &str, side: OrderSide, amount: f64, price: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            side: side.value(),
            action: Action::Limit.value(),
            amount,
            price,
            entrust_type: 1,
            client_order_id: None,
        }
    }
}

/// Order identifiers for operations that accept either form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderIds {
    pub order_id: Option<String>,
    pub client_order_id: Option<String>,
}

impl OrderIds {
    pub fn by_order_id(order_id: impl Into<String>) -> Self {
        Self {
            order_id: Some(order_id.into()),
            client_order_id: None,
        }
    }

    pub fn by_client_order_id(client_order_id: impl Into<String>) -> Self {
        Self {
            order_id: None,
            client_order_id: Some(client_order_id.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() && self.client_order_id.is_none()
    }
}

/// Paging and time window for list queries. Times are epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    /// Starts at 1.
    pub page: u32,
    pub size: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            start_time: None,
            end_time: None,
            page: 1,
            size: 10,
        }
    }
}

// --- Response Structs ---

/// The REST response envelope: `code == 10000` means success.
#[derive(Deserialize, Debug, Clone)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub desc: Option<String>,
    pub data: Option<T>,
}

pub const SUCCESS_CODE: i64 = 10000;
