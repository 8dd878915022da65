//! Typed records for server-pushed stream payloads.
//!
//! Only light parsing is performed: each event keeps the fields its stream
//! guarantees and nothing is aggregated across messages.

use crate::error::{Result, ZbError};
use serde_json::Value;
use std::collections::BTreeMap;

fn decode_error(what: &str, value: &Value) -> ZbError {
    ZbError::DecodeError(format!("invalid {}: {}", what, value))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

fn field_f64(row: &[Value], idx: usize, what: &str) -> Result<f64> {
    row.get(idx)
        .and_then(as_f64)
        .ok_or_else(|| ZbError::DecodeError(format!("{} field {} is not numeric", what, idx)))
}

fn field_i64(row: &[Value], idx: usize, what: &str) -> Result<i64> {
    row.get(idx)
        .and_then(as_i64)
        .ok_or_else(|| ZbError::DecodeError(format!("{} field {} is not an integer", what, idx)))
}

fn as_row<'a>(value: &'a Value, what: &str) -> Result<&'a [Value]> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| decode_error(what, value))
}

fn channel_of(json: &Value) -> String {
    json.get("channel")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn data_of<'a>(json: &'a Value) -> Result<&'a Value> {
    json.get("data")
        .ok_or_else(|| ZbError::DecodeError(format!("missing 'data' in {}", json)))
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthEntry {
    pub price: f64,
    pub amount: f64,
}

impl DepthEntry {
    pub fn from_json(value: &Value) -> Result<Self> {
        let row = as_row(value, "depth level")?;
        Ok(Self {
            price: field_f64(row, 0, "depth level")?,
            amount: field_f64(row, 1, "depth level")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthEvent {
    pub channel: String,
    pub asks: Option<Vec<DepthEntry>>,
    pub bids: Option<Vec<DepthEntry>>,
    pub time: Option<i64>,
}

impl DepthEvent {
    pub fn from_json(json: &Value) -> Result<Self> {
        let data = data_of(json)?;
        let levels = |side: &str| -> Result<Option<Vec<DepthEntry>>> {
            match data.get(side) {
                Some(Value::Array(rows)) => rows
                    .iter()
                    .map(DepthEntry::from_json)
                    .collect::<Result<Vec<_>>>()
                    .map(Some),
                Some(other) => Err(decode_error(side, other)),
                None => Ok(None),
            }
        };
        Ok(Self {
            channel: channel_of(json),
            asks: levels("asks")?,
            bids: levels("bids")?,
            time: data.get("time").and_then(as_i64),
        })
    }
}

/// A candlestick bar. Five-field bars carry no volume.
#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
    pub timestamp: i64,
}

impl Kline {
    pub fn from_json(value: &Value) -> Result<Self> {
        let row = as_row(value, "kline")?;
        let (volume, timestamp) = match row.len() {
            6 => (Some(field_f64(row, 4, "kline")?), field_i64(row, 5, "kline")?),
            5 => (None, field_i64(row, 4, "kline")?),
            _ => return Err(decode_error("kline", value)),
        };
        Ok(Self {
            open: field_f64(row, 0, "kline")?,
            high: field_f64(row, 1, "kline")?,
            low: field_f64(row, 2, "kline")?,
            close: field_f64(row, 3, "kline")?,
            volume,
            timestamp,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KlineEvent {
    pub channel: String,
    /// `true` for the initial full snapshot (`"type": "Whole"`).
    pub is_whole: bool,
    pub data: Vec<Kline>,
}

impl KlineEvent {
    pub fn from_json(json: &Value) -> Result<Self> {
        let rows = as_row(data_of(json)?, "kline data")?;
        Ok(Self {
            channel: channel_of(json),
            is_whole: json.get("type").and_then(Value::as_str) == Some("Whole"),
            data: rows.iter().map(Kline::from_json).collect::<Result<_>>()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub price: f64,
    pub amount: f64,
    /// Taker direction.
    pub side: TradeSide,
    pub timestamp: i64,
}

impl Trade {
    pub fn from_json(value: &Value) -> Result<Self> {
        let row = as_row(value, "trade")?;
        let side = if field_i64(row, 2, "trade")? == 1 {
            TradeSide::Buy
        } else {
            TradeSide::Sell
        };
        Ok(Self {
            price: field_f64(row, 0, "trade")?,
            amount: field_f64(row, 1, "trade")?,
            side,
            timestamp: field_i64(row, 3, "trade")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    pub channel: String,
    pub data: Vec<Trade>,
}

impl TradeEvent {
    pub fn from_json(json: &Value) -> Result<Self> {
        let rows = as_row(data_of(json)?, "trade data")?;
        Ok(Self {
            channel: channel_of(json),
            data: rows.iter().map(Trade::from_json).collect::<Result<_>>()?,
        })
    }
}

/// 24h rolling statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticker {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub rate: f64,
    pub timestamp: i64,
    pub close_cny: Option<f64>,
}

impl Ticker {
    pub fn from_json(value: &Value) -> Result<Self> {
        let row = as_row(value, "ticker")?;
        let close_cny = if row.len() == 8 {
            Some(field_f64(row, 7, "ticker")?)
        } else {
            None
        };
        Ok(Self {
            open: field_f64(row, 0, "ticker")?,
            high: field_f64(row, 1, "ticker")?,
            low: field_f64(row, 2, "ticker")?,
            close: field_f64(row, 3, "ticker")?,
            volume: field_f64(row, 4, "ticker")?,
            rate: field_f64(row, 5, "ticker")?,
            timestamp: field_i64(row, 6, "ticker")?,
            close_cny,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerEvent {
    pub channel: String,
    pub data: Ticker,
}

impl TickerEvent {
    pub fn from_json(json: &Value) -> Result<Self> {
        Ok(Self {
            channel: channel_of(json),
            data: Ticker::from_json(data_of(json)?)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllTickerEvent {
    pub channel: String,
    pub data: BTreeMap<String, Ticker>,
}

impl AllTickerEvent {
    pub fn from_json(json: &Value) -> Result<Self> {
        let data = data_of(json)?;
        let map = data
            .as_object()
            .ok_or_else(|| decode_error("all-ticker data", data))?;
        let mut tickers = BTreeMap::new();
        for (symbol, row) in map {
            tickers.insert(symbol.clone(), Ticker::from_json(row)?);
        }
        Ok(Self {
            channel: channel_of(json),
            data: tickers,
        })
    }
}

/// A payload relayed verbatim under its channel name. Acknowledgements
/// without a body carry `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub channel: String,
    pub data: Value,
}

impl Event {
    pub fn from_json(json: &Value) -> Result<Self> {
        Ok(Self {
            channel: channel_of(json),
            data: json.get("data").cloned().unwrap_or(Value::Null),
        })
    }
}

/// Every event kind a connection can deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Depth(DepthEvent),
    Kline(KlineEvent),
    Trade(TradeEvent),
    Ticker(TickerEvent),
    AllTicker(AllTickerEvent),
    Generic(Event),
    /// Frame that no parser claimed, passed through untouched.
    Raw(Value),
}

impl StreamEvent {
    pub fn channel(&self) -> Option<&str> {
        match self {
            StreamEvent::Depth(e) => Some(&e.channel),
            StreamEvent::Kline(e) => Some(&e.channel),
            StreamEvent::Trade(e) => Some(&e.channel),
            StreamEvent::Ticker(e) => Some(&e.channel),
            StreamEvent::AllTicker(e) => Some(&e.channel),
            StreamEvent::Generic(e) => Some(&e.channel),
            StreamEvent::Raw(v) => v.get("channel").and_then(Value::as_str),
        }
    }
}

/// Binds a concrete event type to its [`StreamEvent`] variant so a
/// subscription can parse into and deliver that type only.
pub trait TypedEvent: Sized + Send + 'static {
    fn parse(json: &Value) -> Result<Self>;
    fn into_event(self) -> StreamEvent;
    fn from_event(event: StreamEvent) -> Option<Self>;
}

macro_rules! typed_event {
    ($ty:ident, $variant:ident) => {
        impl TypedEvent for $ty {
            fn parse(json: &Value) -> Result<Self> {
                $ty::from_json(json)
            }

            fn into_event(self) -> StreamEvent {
                StreamEvent::$variant(self)
            }

            fn from_event(event: StreamEvent) -> Option<Self> {
                match event {
                    StreamEvent::$variant(e) => Some(e),
                    _ => None,
                }
            }
        }
    };
}

typed_event!(DepthEvent, Depth);
typed_event!(KlineEvent, Kline);
typed_event!(TradeEvent, Trade);
typed_event!(TickerEvent, Ticker);
typed_event!(AllTickerEvent, AllTicker);
typed_event!(Event, Generic);
