use super::client::{Access, Client};
use super::params;
use crate::error::{Result, ZbError};
use crate::types::{FuturesAccountType, Interval};
use crate::websocket::events::{Kline, Ticker, Trade};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn rows<T>(data: Value, parse: fn(&Value) -> Result<T>) -> Result<Vec<T>> {
    match data {
        Value::Array(items) => items.iter().map(parse).collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(ZbError::DecodeError(format!("expected an array, got {}", other))),
    }
}

impl Client {
    /// Lists the tradable markets.
    /// GET /Server/api/v2/config/marketList
    pub async fn get_market_list(
        &self,
        futures_account_type: FuturesAccountType,
    ) -> Result<Vec<Value>> {
        self.request(
            Method::GET,
            "/Server/api/v2/config/marketList",
            Access::Public,
            params(json!({ "futuresAccountType": futures_account_type.value() })),
        )
        .await
    }

    /// Full order book. `size` goes up to 200.
    /// GET /api/public/v1/depth
    pub async fn get_depth(&self, symbol: &str, scale: Option<f64>, size: u32) -> Result<Value> {
        self.request(
            Method::GET,
            "/api/public/v1/depth",
            Access::Public,
            params(json!({
                "symbol": symbol.to_uppercase(),
                "size": size,
                "scale": scale,
            })),
        )
        .await
    }

    /// Candlesticks. `size` goes up to 1440.
    /// GET /api/public/v1/kline
    pub async fn get_kline(&self, symbol: &str, interval: Interval, size: u32) -> Result<Vec<Kline>> {
        let data = self
            .kline_request("/api/public/v1/kline", symbol, interval, size)
            .await?;
        rows(data, Kline::from_json)
    }

    /// Recent trades. `size` goes up to 100.
    /// GET /api/public/v1/trade
    pub async fn get_trade(&self, symbol: &str, size: u32) -> Result<Vec<Trade>> {
        let data: Value = self
            .request(
                Method::GET,
                "/api/public/v1/trade",
                Access::Public,
                params(json!({ "symbol": symbol.to_uppercase(), "size": size })),
            )
            .await?;
        rows(data, Trade::from_json)
    }

    /// 24h tickers keyed by symbol; all markets when `symbol` is `None`.
    /// GET /api/public/v1/ticker
    pub async fn get_ticker(&self, symbol: Option<&str>) -> Result<BTreeMap<String, Ticker>> {
        let data: Value = self
            .request(
                Method::GET,
                "/api/public/v1/ticker",
                Access::Public,
                params(json!({ "symbol": symbol.map(str::to_uppercase) })),
            )
            .await?;

        let mut tickers = BTreeMap::new();
        if let Value::Object(map) = data {
            for (symbol, row) in map {
                tickers.insert(symbol, Ticker::from_json(&row)?);
            }
        }
        Ok(tickers)
    }

    /// GET /api/public/v1/markPrice
    pub async fn get_mark_price(&self, symbol: Option<&str>) -> Result<Value> {
        self.request(
            Method::GET,
            "/api/public/v1/markPrice",
            Access::Public,
            params(json!({ "symbol": symbol.map(str::to_uppercase) })),
        )
        .await
    }

    /// GET /api/public/v1/indexPrice
    pub async fn get_index_price(&self, symbol: Option<&str>) -> Result<Value> {
        self.request(
            Method::GET,
            "/api/public/v1/indexPrice",
            Access::Public,
            params(json!({ "symbol": symbol.map(str::to_uppercase) })),
        )
        .await
    }

    /// Spot conversion price on the bid (`is_buy`) or ask side.
    /// GET /api/public/v1/spotPrice
    pub async fn get_spot_price(&self, symbol: Option<&str>, is_buy: bool) -> Result<Value> {
        self.request(
            Method::GET,
            "/api/public/v1/spotPrice",
            Access::Public,
            params(json!({
                "symbol": symbol.map(str::to_uppercase),
                "side": if is_buy { "bids" } else { "asks" },
            })),
        )
        .await
    }

    /// GET /api/public/v1/markKline
    pub async fn get_mark_kline(
        &self,
        symbol: &str,
        interval: Interval,
        size: u32,
    ) -> Result<Vec<Kline>> {
        let data = self
            .kline_request("/api/public/v1/markKline", symbol, interval, size)
            .await?;
        rows(data, Kline::from_json)
    }

    /// GET /api/public/v1/indexKline
    pub async fn get_index_kline(
        &self,
        symbol: &str,
        interval: Interval,
        size: u32,
    ) -> Result<Vec<Kline>> {
        let data = self
            .kline_request("/api/public/v1/indexKline", symbol, interval, size)
            .await?;
        rows(data, Kline::from_json)
    }

    async fn kline_request(
        &self,
        path: &str,
        symbol: &str,
        interval: Interval,
        size: u32,
    ) -> Result<Value> {
        self.request(
            Method::GET,
            path,
            Access::Public,
            params(json!({
                "symbol": symbol.to_uppercase(),
                "period": interval.as_str(),
                "size": size,
            })),
        )
        .await
    }
}
