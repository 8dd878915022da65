//! WebSocket stream clients for ZB futures.
//!
//! Two client types sit on top of a shared connection layer:
//!
//! - [`MarketClient`]: public market data. Every subscription gets its own connection.
//! - [`AccountStreamClient`]: private account, position and order channels, multiplexed
//!   over one authenticated connection.
//!
//! # Architecture
//!
//! - A [`Connection`] owns one socket, its subscription handshake and the caller's
//!   parser, callback and error handler. It survives reconnects.
//! - A [`WatchDog`] ticks once per `watchdog_interval_ms` and reconnects connections
//!   that stayed silent for longer than `receive_limit_ms` or failed with an error,
//!   after a delay of `connection_delay_failure` ticks.
//! - Every reconnect re-runs the subscription handshake, so subscriptions and the
//!   private login are restored without caller involvement.
//!
//! # Usage
//!
//! ## Public Data Streams
//!
//! ```no_run
//! use zb_connector_rs::types::Interval;
//! use zb_connector_rs::websocket::{MarketClient, StreamConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = MarketClient::new(StreamConfig::default());
//!
//!     client.subscribe_trade_event("btc_usdt", 50, |event| {
//!         for trade in event.data {
//!             println!("{} {} @ {}", trade.side.as_str(), trade.amount, trade.price);
//!         }
//!     }, None);
//!     client.subscribe_kline_event("btc_usdt", Interval::Min15, 100, |event| {
//!         println!("{} bars", event.data.len());
//!     }, None);
//!
//!     tokio::signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
//!     client.stop();
//! }
//! ```
//!
//! ## Private Data Streams
//!
//! ```no_run
//! use std::sync::Arc;
//! use zb_connector_rs::types::FuturesAccountType;
//! use zb_connector_rs::websocket::{AccountStreamClient, StreamConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = AccountStreamClient::new("your_api_key", "your_secret", StreamConfig::default());
//!
//!     client
//!         .subscribe_fund_change(
//!             None,
//!             FuturesAccountType::BaseUsdt,
//!             |event| println!("{}: {}", event.channel, event.data),
//!             Some(Arc::new(|err| eprintln!("fund stream failed: {}", err))),
//!         )
//!         .await
//!         .expect("Failed to subscribe");
//!
//!     tokio::signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
//!     client.stop().await;
//! }
//! ```
//!
//! # Message Handling
//!
//! Parsers and callbacks run on the connection's receive task. A parser error, a
//! panicking parser or a panicking callback only affects the frame at hand: the failure
//! goes to the error handler and the next frame is processed normally. Callbacks should
//! be quick to avoid stalling the receive loop.

pub mod account;
pub mod config;
pub mod connection;
pub mod events;
pub mod market;
pub mod watchdog;

pub use account::{AccountStreamClient, AccountStreamState};
pub use config::StreamConfig;
pub use connection::{
    Connection, ConnectionState, ErrorHandler, JsonParser, UpdateCallback, WebsocketRequest,
};
pub use events::StreamEvent;
pub use market::MarketClient;
pub use watchdog::WatchDog;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
