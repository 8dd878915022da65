use super::config::StreamConfig;
use super::connection::{
    Connection, ErrorHandler, Handshake, JsonParser, UpdateCallback, WebsocketRequest,
};
use super::events::{
    AllTickerEvent, DepthEvent, Event, KlineEvent, TickerEvent, TradeEvent, TypedEvent,
};
use super::lock;
use super::watchdog::WatchDog;
use crate::types::Interval;
use log::*;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

// --- Channel names ---

fn with_scale(channel: String, scale: Option<f64>) -> String {
    // A zero scale means the default precision; whole numbers keep their `.0`.
    match scale {
        Some(scale) if scale != 0.0 => format!("{}@{:?}", channel, scale),
        _ => channel,
    }
}

pub fn whole_depth_channel(symbol: &str, scale: Option<f64>) -> String {
    with_scale(format!("{}.DepthWhole", symbol.to_uppercase()), scale)
}

pub fn depth_channel(symbol: &str, scale: Option<f64>) -> String {
    with_scale(format!("{}.Depth", symbol.to_uppercase()), scale)
}

pub fn kline_channel(symbol: &str, interval: Interval) -> String {
    format!("{}.KLine_{}", symbol.to_uppercase(), interval.as_str())
}

pub fn trade_channel(symbol: &str) -> String {
    format!("{}.Trade", symbol.to_uppercase())
}

pub fn ticker_channel(symbol: &str) -> String {
    format!("{}.Ticker", symbol.to_uppercase())
}

pub const ALL_TICKER_CHANNEL: &str = "All.Ticker";
pub const ALL_MARK_PRICE_CHANNEL: &str = "All.mark";
pub const ALL_INDEX_PRICE_CHANNEL: &str = "All.index";

pub fn mark_price_channel(symbol: &str) -> String {
    format!("{}.mark", symbol.to_uppercase())
}

pub fn index_price_channel(symbol: &str) -> String {
    format!("{}.index", symbol.to_uppercase())
}

pub fn mark_kline_channel(symbol: &str, interval: Interval) -> String {
    format!("{}.mark_{}", symbol.to_uppercase(), interval.as_str())
}

pub fn index_kline_channel(symbol: &str, interval: Interval) -> String {
    format!("{}.index_{}", symbol.to_uppercase(), interval.as_str())
}

pub fn funding_rate_channel(symbol: &str) -> String {
    format!("{}.FundingRate", symbol.to_uppercase())
}

/// `side` is `bids` or `asks`; symbol `all` selects every market.
pub fn spot_price_channel(symbol: &str, side: &str) -> String {
    let name = if symbol.eq_ignore_ascii_case("all") {
        "All".to_string()
    } else {
        symbol.to_uppercase()
    };
    format!("{}.{}SpotPrice", name, side.to_lowercase())
}

/// Public market data client. Each subscription owns one [`Connection`];
/// a shared [`WatchDog`] keeps them alive.
///
/// Must be created inside a Tokio runtime.
pub struct MarketClient {
    config: StreamConfig,
    watch_dog: Arc<WatchDog>,
    watch_dog_task: JoinHandle<()>,
    connections: Mutex<Vec<Arc<Connection>>>,
}

impl MarketClient {
    pub fn new(config: StreamConfig) -> Self {
        let watch_dog = WatchDog::new(&config);
        let watch_dog_task = watch_dog.start();
        Self {
            config,
            watch_dog,
            watch_dog_task,
            connections: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn watch_dog(&self) -> &Arc<WatchDog> {
        &self.watch_dog
    }

    fn create_connection(
        &self,
        channel: String,
        json_parser: JsonParser,
        update_callback: UpdateCallback,
        error_handler: Option<ErrorHandler>,
        params: Map<String, Value>,
    ) -> Arc<Connection> {
        let mut subscribe = Map::new();
        subscribe.insert("action".to_string(), json!("subscribe"));
        subscribe.insert("channel".to_string(), json!(channel));
        subscribe.extend(params);
        let subscribe = Value::Object(subscribe);

        let subscription_handler: Handshake = Arc::new(move |connection: &Connection| {
            info!("[Sub][{}] Subscribe: {}", connection.id(), subscribe);
            if let Err(e) = connection.send_json(&subscribe) {
                error!("[Sub][{}] Failed to subscribe: {}", connection.id(), e);
            }
        });

        let unsubscribe = json!({"action": "unsubscribe", "channel": channel});
        let unsubscription_handler: Handshake = Arc::new(move |connection: &Connection| {
            info!("[Sub][{}] Unsubscribe: {}", connection.id(), unsubscribe);
            if let Err(e) = connection.send_json(&unsubscribe) {
                warn!("[Sub][{}] Failed to unsubscribe: {}", connection.id(), e);
            }
        });

        let request = WebsocketRequest {
            channel,
            subscription_handler: Some(subscription_handler),
            unsubscription_handler: Some(unsubscription_handler),
            json_parser,
            update_callback,
            error_handler,
        };

        let connection = Connection::new(
            self.config.url.clone(),
            request,
            Arc::downgrade(&self.watch_dog),
        );
        connection.connect();
        lock(&self.connections).push(Arc::clone(&connection));
        connection
    }

    fn subscribe_event<E, F>(
        &self,
        channel: String,
        size: Option<u32>,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        E: TypedEvent,
        F: Fn(E) + Send + Sync + 'static,
    {
        let json_parser: JsonParser = Arc::new(|json: &Value| E::parse(json).map(E::into_event));
        let update_callback: UpdateCallback = Arc::new(move |event| match E::from_event(event) {
            Some(event) => callback(event),
            None => warn!("Dropped event of an unexpected kind"),
        });

        let mut params = Map::new();
        if let Some(size) = size {
            params.insert("size".to_string(), json!(size));
        }

        self.create_connection(channel, json_parser, update_callback, error_handler, params)
            .id()
    }

    /// Full order book snapshots. `size` is the number of levels (max 10, usually 5).
    pub fn subscribe_whole_depth_event<F>(
        &self,
        symbol: &str,
        scale: Option<f64>,
        size: u32,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        F: Fn(DepthEvent) + Send + Sync + 'static,
    {
        self.subscribe_event(
            whole_depth_channel(symbol, scale),
            Some(size),
            callback,
            error_handler,
        )
    }

    /// Incremental order book updates.
    pub fn subscribe_depth_event<F>(
        &self,
        symbol: &str,
        scale: Option<f64>,
        size: u32,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        F: Fn(DepthEvent) + Send + Sync + 'static,
    {
        self.subscribe_event(depth_channel(symbol, scale), Some(size), callback, error_handler)
    }

    /// `size` is the number of bars in the first snapshot (max 1440).
    pub fn subscribe_kline_event<F>(
        &self,
        symbol: &str,
        interval: Interval,
        size: u32,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        F: Fn(KlineEvent) + Send + Sync + 'static,
    {
        self.subscribe_event(
            kline_channel(symbol, interval),
            Some(size),
            callback,
            error_handler,
        )
    }

    /// `size` is the number of trades in the first snapshot (max 100).
    pub fn subscribe_trade_event<F>(
        &self,
        symbol: &str,
        size: u32,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        F: Fn(TradeEvent) + Send + Sync + 'static,
    {
        self.subscribe_event(trade_channel(symbol), Some(size), callback, error_handler)
    }

    pub fn subscribe_ticker_event<F>(
        &self,
        symbol: &str,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        F: Fn(TickerEvent) + Send + Sync + 'static,
    {
        self.subscribe_event(ticker_channel(symbol), None, callback, error_handler)
    }

    pub fn subscribe_all_ticker_event<F>(
        &self,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        F: Fn(AllTickerEvent) + Send + Sync + 'static,
    {
        self.subscribe_event(
            ALL_TICKER_CHANNEL.to_string(),
            None,
            callback,
            error_handler,
        )
    }

    pub fn subscribe_mark_price_event<F>(
        &self,
        symbol: &str,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.subscribe_event(mark_price_channel(symbol), None, callback, error_handler)
    }

    pub fn subscribe_all_mark_price_event<F>(
        &self,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.subscribe_event(
            ALL_MARK_PRICE_CHANNEL.to_string(),
            None,
            callback,
            error_handler,
        )
    }

    pub fn subscribe_index_price_event<F>(
        &self,
        symbol: &str,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.subscribe_event(index_price_channel(symbol), None, callback, error_handler)
    }

    pub fn subscribe_all_index_price_event<F>(
        &self,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.subscribe_event(
            ALL_INDEX_PRICE_CHANNEL.to_string(),
            None,
            callback,
            error_handler,
        )
    }

    pub fn subscribe_mark_kline_event<F>(
        &self,
        symbol: &str,
        interval: Interval,
        size: u32,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.subscribe_event(
            mark_kline_channel(symbol, interval),
            Some(size),
            callback,
            error_handler,
        )
    }

    pub fn subscribe_index_kline_event<F>(
        &self,
        symbol: &str,
        interval: Interval,
        size: u32,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.subscribe_event(
            index_kline_channel(symbol, interval),
            Some(size),
            callback,
            error_handler,
        )
    }

    pub fn subscribe_funding_rate_event<F>(
        &self,
        symbol: &str,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.subscribe_event(funding_rate_channel(symbol), None, callback, error_handler)
    }

    pub fn subscribe_spot_price_event<F>(
        &self,
        symbol: &str,
        side: &str,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> u64
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.subscribe_event(
            spot_price_channel(symbol, side),
            None,
            callback,
            error_handler,
        )
    }

    /// Closes every connection matching `connection_id` or `channel` and
    /// returns how many were closed. Unknown ids and channels close nothing.
    pub fn unsubscribe_event(&self, connection_id: Option<u64>, channel: Option<&str>) -> usize {
        let snapshot = lock(&self.connections).clone();
        let targets: Vec<Arc<Connection>> = snapshot
            .into_iter()
            .filter(|c| connection_id == Some(c.id()) || channel == Some(c.channel()))
            .collect();

        for connection in &targets {
            connection.close_on_hand();
        }

        lock(&self.connections).retain(|c| !targets.iter().any(|t| t.id() == c.id()));
        if targets.is_empty() {
            debug!(
                "Nothing to unsubscribe for id {:?} / channel {:?}",
                connection_id, channel
            );
        }
        targets.len()
    }

    pub fn connection_ids(&self) -> Vec<u64> {
        lock(&self.connections).iter().map(|c| c.id()).collect()
    }

    pub fn connection(&self, connection_id: u64) -> Option<Arc<Connection>> {
        lock(&self.connections)
            .iter()
            .find(|c| c.id() == connection_id)
            .cloned()
    }

    pub fn connections_for_channel(&self, channel: &str) -> Vec<Arc<Connection>> {
        lock(&self.connections)
            .iter()
            .filter(|c| c.channel() == channel)
            .cloned()
            .collect()
    }

    /// Closes every connection and stops the watchdog.
    pub fn stop(&self) {
        let connections: Vec<Arc<Connection>> = lock(&self.connections).drain(..).collect();
        info!("[Manager] Stopping {} market connection(s)", connections.len());
        for connection in connections {
            connection.close_on_hand();
        }
        self.watch_dog_task.abort();
    }
}

impl Drop for MarketClient {
    fn drop(&mut self) {
        self.watch_dog_task.abort();
    }
}
