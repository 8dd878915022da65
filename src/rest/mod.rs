//! REST client for the ZB futures API.
//!
//! Endpoints are grouped by area, each in its own `impl Client` block:
//! market data (public), account and positions, and trading.

pub mod account;
pub mod client;
pub mod market;
pub mod trade;

pub use client::{Client, DEFAULT_API_HOST, DEFAULT_RATE_LIMIT_MS};

use serde_json::{Map, Value};

/// Turns a `json!({...})` literal into request parameters.
pub(crate) fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
