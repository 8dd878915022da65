use super::config::StreamConfig;
use super::connection::{
    panic_message, Connection, ConnectionState, ErrorHandler, Handshake, JsonParser,
    UpdateCallback, WebsocketRequest,
};
use super::events::{Event, StreamEvent};
use super::lock;
use super::watchdog::WatchDog;
use crate::auth::{generate_signature, get_iso_timestamp, hash_secret};
use crate::error::{Result, ZbError};
use crate::types::{
    Action, FuturesAccountType, MarginMode, OrderIds, OrderRequest, OrderSide, PageQuery,
    PositionsMode,
};
use log::*;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const LOGIN: &str = "login";

// --- Fund channels ---
pub const CH_FUND_CHANGE: &str = "Fund.change";
pub const CH_FUND_BALANCE: &str = "Fund.balance";
pub const CH_FUND_GET_ACCOUNT: &str = "Fund.getAccount";
pub const CH_FUND_GET_BILL: &str = "Fund.getBill";
pub const CH_FUND_ASSET_CHANGE: &str = "Fund.assetChange";
pub const CH_FUND_ASSET_INFO: &str = "Fund.assetInfo";

// --- Position channels ---
pub const CH_POSITIONS_CHANGE: &str = "Positions.change";
pub const CH_GET_POSITIONS: &str = "Positions.getPositions";
pub const CH_MARGIN_INFO: &str = "Positions.marginInfo";
pub const CH_UPDATE_MARGIN: &str = "Positions.updateMargin";
pub const CH_GET_SETTING: &str = "Positions.getSetting";
pub const CH_SET_LEVERAGE: &str = "Positions.setLeverage";
pub const CH_SET_POSITIONS_MODE: &str = "Positions.setPositionsMode";
pub const CH_SET_MARGIN_MODE: &str = "Positions.setMarginMode";
pub const CH_GET_NOMINAL_VALUE: &str = "Positions.getNominalValue";

// --- Trade channels ---
pub const CH_GET_ORDER: &str = "Trade.getOrder";
pub const CH_GET_UNDONE_ORDERS: &str = "trade.getUndoneOrders";
pub const CH_GET_ALL_ORDERS: &str = "trade.getAllOrders";
pub const CH_GET_TRADE_LIST: &str = "trade.getTradeList";
pub const CH_TRADE_HISTORY: &str = "trade.tradeHistory";
pub const CH_ORDER_CHANGE: &str = "Trade.orderChange";
pub const CH_ORDER: &str = "Trade.order";
pub const CH_BATCH_ORDER: &str = "Trade.batchOrder";
pub const CH_CANCEL_ORDER: &str = "Trade.cancelOrder";
pub const CH_BATCH_CANCEL_ORDER: &str = "Trade.batchCancelOrder";
pub const CH_CANCEL_ALL_ORDERS: &str = "trade.cancelAllOrders";

/// Push channels keep streaming after the subscribe frame and are replayed
/// whenever the shared connection is re-opened.
pub fn is_push_channel(channel: &str) -> bool {
    channel.ends_with(".change") || channel == CH_FUND_ASSET_CHANGE || channel == CH_ORDER_CHANGE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStreamState {
    NoConnection,
    LoggingIn,
    Ready,
}

struct ChannelHandlers {
    callback: UpdateCallback,
    json_parser: Option<JsonParser>,
    error_handler: Option<ErrorHandler>,
    /// Subscribe frame to send again after a reconnect.
    replay: Option<String>,
}

type ChannelMap = Arc<Mutex<HashMap<String, ChannelHandlers>>>;

/// Builds the login frame sent at the start of every private session.
pub fn login_frame(api_key: &str, hashed_secret: &str, timestamp: &str) -> Result<String> {
    let sign = generate_signature(timestamp, "GET", LOGIN, None, hashed_secret)?;
    Ok(json!({
        "action": LOGIN,
        "ZB-APIKEY": api_key,
        "ZB-TIMESTAMP": timestamp,
        "ZB-SIGN": sign,
    })
    .to_string())
}

fn subscribe_frame(channel: &str, params: Option<Map<String, Value>>) -> String {
    let mut frame = Map::new();
    frame.insert("action".to_string(), json!("subscribe"));
    frame.insert("channel".to_string(), json!(channel));
    if let Some(params) = params {
        frame.extend(params);
    }
    Value::Object(frame).to_string()
}

fn account_params(futures_account_type: FuturesAccountType) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert(
        "futuresAccountType".to_string(),
        json!(futures_account_type.value()),
    );
    params
}

fn insert_opt<T: Into<Value>>(params: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        params.insert(key.to_string(), value.into());
    }
}

fn insert_page(params: &mut Map<String, Value>, page: &PageQuery) {
    params.insert("pageNum".to_string(), json!(page.page));
    params.insert("pageSize".to_string(), json!(page.size));
    insert_opt(params, "startTime", page.start_time);
    insert_opt(params, "endTime", page.end_time);
}

fn insert_order_ids(params: &mut Map<String, Value>, ids: &OrderIds) -> Result<()> {
    if ids.is_empty() {
        return Err(ZbError::arguments_required("order_id or client_order_id"));
    }
    insert_opt(params, "orderId", ids.order_id.clone());
    insert_opt(params, "clientOrderId", ids.client_order_id.clone());
    Ok(())
}

/// The shared connection plus the flag its login handshake raises.
struct Session {
    connection: Arc<Connection>,
    ready: watch::Receiver<bool>,
}

/// Private stream client.
///
/// All private channels share one authenticated connection, created lazily by
/// the first subscription. Incoming frames are routed by their `channel` field
/// to the parser, callback and error handler registered for that channel.
///
/// Must be created inside a Tokio runtime.
pub struct AccountStreamClient {
    api_key: String,
    secret_key: String,
    config: StreamConfig,
    watch_dog: Arc<WatchDog>,
    watch_dog_task: JoinHandle<()>,
    channels: ChannelMap,
    session: Mutex<Option<Session>>,
    login_lock: tokio::sync::Mutex<()>,
}

impl AccountStreamClient {
    /// `secret_key` is the raw API secret; only its SHA-1 digest is kept.
    pub fn new(api_key: &str, secret_key: &str, config: StreamConfig) -> Self {
        let watch_dog = WatchDog::new(&config);
        let watch_dog_task = watch_dog.start();
        Self {
            api_key: api_key.to_string(),
            secret_key: hash_secret(secret_key),
            config,
            watch_dog,
            watch_dog_task,
            channels: Arc::new(Mutex::new(HashMap::new())),
            session: Mutex::new(None),
            login_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// `Ready` only while the shared socket is open and its login frame went out.
    /// A dropped socket reads as `LoggingIn` until the watchdog has reconnected it.
    pub fn state(&self) -> AccountStreamState {
        match lock(&self.session).as_ref() {
            None => AccountStreamState::NoConnection,
            Some(session) if Self::is_ready(session) => AccountStreamState::Ready,
            Some(_) => AccountStreamState::LoggingIn,
        }
    }

    fn is_ready(session: &Session) -> bool {
        *session.ready.borrow() && session.connection.state() == ConnectionState::Connected
    }

    pub fn subscribed_channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = lock(&self.channels).keys().cloned().collect();
        channels.sort();
        channels
    }

    pub fn connection(&self) -> Option<Arc<Connection>> {
        lock(&self.session)
            .as_ref()
            .map(|session| Arc::clone(&session.connection))
    }

    /// Opens the shared connection if needed and waits until its login frame
    /// went out, at most `login_timeout_ms`.
    ///
    /// Returns at once when already logged in. A pending or lost login is
    /// waited for again on every call; the watchdog keeps reconnecting meanwhile.
    pub async fn login(&self) -> Result<()> {
        // Concurrent callers wait for the same handshake.
        let _login = self.login_lock.lock().await;

        let (connection, mut ready) = {
            let mut session = lock(&self.session);
            match session.as_ref() {
                Some(session) if Self::is_ready(session) => return Ok(()),
                Some(session) => (Arc::clone(&session.connection), session.ready.clone()),
                None => {
                    let (ready_tx, ready_rx) = watch::channel(false);
                    let connection = Connection::new(
                        self.config.url.clone(),
                        self.login_request(ready_tx),
                        Arc::downgrade(&self.watch_dog),
                    );
                    *session = Some(Session {
                        connection: Arc::clone(&connection),
                        ready: ready_rx.clone(),
                    });
                    connection.connect();
                    (connection, ready_rx)
                }
            }
        };

        let timeout = Duration::from_millis(self.config.login_timeout_ms);
        let outcome = tokio::time::timeout(
            timeout,
            ready.wait_for(|ready| *ready && connection.state() == ConnectionState::Connected),
        )
        .await
        .map(|waited| waited.map(|_| ()));

        match outcome {
            Ok(Ok(())) => {
                info!("[Account] Logged in");
                Ok(())
            }
            Ok(Err(_)) => Err(ZbError::WebsocketError(
                "Login handshake was dropped".to_string(),
            )),
            Err(_) => Err(ZbError::WebsocketError(format!(
                "Login handshake did not complete within {} ms",
                self.config.login_timeout_ms
            ))),
        }
    }

    fn login_request(&self, ready: watch::Sender<bool>) -> WebsocketRequest {
        let api_key = self.api_key.clone();
        let secret_key = self.secret_key.clone();
        let channels = Arc::clone(&self.channels);

        let subscription_handler: Handshake = Arc::new(move |connection: &Connection| {
            ready.send_replace(false);

            // A fresh timestamp per open keeps the signature valid across reconnects.
            let timestamp = get_iso_timestamp();
            match login_frame(&api_key, &secret_key, &timestamp) {
                Ok(frame) => {
                    trace!("[Account] Login frame: {}", frame);
                    if let Err(e) = connection.send(&frame) {
                        error!("[Account] Failed to send login frame: {}", e);
                        return;
                    }
                }
                Err(e) => {
                    error!("[Account] Failed to sign login frame: {}", e);
                    return;
                }
            }

            let replays: Vec<String> = lock(&channels)
                .values()
                .filter_map(|handlers| handlers.replay.clone())
                .collect();
            for frame in replays {
                info!("[Account] Resubscribe >>>> {}", frame);
                if let Err(e) = connection.send(&frame) {
                    warn!("[Account] Failed to resubscribe: {}", e);
                }
            }

            ready.send_replace(true);
        });

        WebsocketRequest {
            channel: LOGIN.to_string(),
            subscription_handler: Some(subscription_handler),
            unsubscription_handler: None,
            json_parser: dispatch_parser(Arc::clone(&self.channels)),
            update_callback: dispatch_callback(Arc::clone(&self.channels)),
            error_handler: Some(dispatch_error_handler(Arc::clone(&self.channels))),
        }
    }

    /// Sends a subscribe frame for `channel` over the shared connection,
    /// logging in first if needed. The handlers replace any earlier ones
    /// registered for the same channel.
    pub async fn subscribe(
        &self,
        channel: &str,
        params: Option<Map<String, Value>>,
        callback: UpdateCallback,
        json_parser: Option<JsonParser>,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()> {
        let frame = subscribe_frame(channel, params);
        self.login().await?;
        let connection = self
            .connection()
            .ok_or_else(|| ZbError::WebsocketError("Not connected".to_string()))?;

        lock(&self.channels).insert(
            channel.to_string(),
            ChannelHandlers {
                callback,
                json_parser,
                error_handler,
                replay: is_push_channel(channel).then(|| frame.clone()),
            },
        );

        info!("[Account] Send subscribe message >>>> {}", frame);
        connection.send(&frame)
    }

    /// Sends an unsubscribe frame and forgets the channel's handlers.
    pub async fn unsubscribe(
        &self,
        channel: &str,
        futures_account_type: FuturesAccountType,
    ) -> Result<()> {
        lock(&self.channels).remove(channel);
        let connection = match self.connection() {
            Some(connection) => connection,
            None => return Ok(()),
        };
        let frame = json!({
            "action": "unsubscribe",
            "channel": channel,
            "futuresAccountType": futures_account_type.value(),
        })
        .to_string();
        info!("[Account] Send unsubscribe message >>>> {}", frame);
        connection.send(&frame)
    }

    /// Closes the shared connection and stops the watchdog.
    pub async fn stop(&self) {
        let _login = self.login_lock.lock().await;
        let session = lock(&self.session).take();
        if let Some(session) = session {
            session.connection.close_on_hand();
        }
        self.watch_dog_task.abort();
        info!("[Account] Stopped");
    }

    async fn request<F>(
        &self,
        channel: &str,
        params: Map<String, Value>,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let json_parser: JsonParser =
            Arc::new(|json: &Value| Event::from_json(json).map(StreamEvent::Generic));
        let update_callback: UpdateCallback = Arc::new(move |event| match event {
            StreamEvent::Generic(event) => callback(event),
            other => warn!("[Account] Dropped unexpected event: {:?}", other),
        });
        self.subscribe(
            channel,
            Some(params),
            update_callback,
            Some(json_parser),
            error_handler,
        )
        .await
    }

    // --- Fund ---

    pub async fn subscribe_fund_change<F>(
        &self,
        currency: Option<&str>,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        insert_opt(&mut params, "currency", currency);
        self.request(CH_FUND_CHANGE, params, callback, error_handler).await
    }

    pub async fn get_balance<F>(
        &self,
        currency: Option<&str>,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        params.insert("currency".to_string(), json!(currency.unwrap_or_default()));
        self.request(CH_FUND_BALANCE, params, callback, error_handler).await
    }

    /// `convert_unit` is the valuation currency, e.g. `cny`.
    pub async fn get_account<F>(
        &self,
        convert_unit: &str,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        params.insert("convertUnit".to_string(), json!(convert_unit));
        self.request(CH_FUND_GET_ACCOUNT, params, callback, error_handler).await
    }

    pub async fn get_bill<F>(
        &self,
        currency: Option<&str>,
        bill_type: Option<i64>,
        page: PageQuery,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        insert_page(&mut params, &page);
        insert_opt(&mut params, "currency", currency);
        insert_opt(&mut params, "type", bill_type);
        self.request(CH_FUND_GET_BILL, params, callback, error_handler).await
    }

    pub async fn subscribe_asset_change<F>(
        &self,
        convert_unit: &str,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        params.insert("convertUnit".to_string(), json!(convert_unit));
        self.request(CH_FUND_ASSET_CHANGE, params, callback, error_handler)
            .await
    }

    pub async fn get_asset_info<F>(
        &self,
        convert_unit: Option<&str>,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        insert_opt(&mut params, "convertUnit", convert_unit);
        self.request(CH_FUND_ASSET_INFO, params, callback, error_handler).await
    }

    // --- Positions ---

    /// Without a symbol every position change of the account is pushed.
    pub async fn subscribe_positions_change<F>(
        &self,
        symbol: Option<&str>,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        insert_opt(&mut params, "symbol", symbol);
        self.request(CH_POSITIONS_CHANGE, params, callback, error_handler).await
    }

    pub async fn get_positions<F>(
        &self,
        symbol: Option<&str>,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        insert_opt(&mut params, "symbol", symbol);
        self.request(CH_GET_POSITIONS, params, callback, error_handler).await
    }

    pub async fn get_margin<F>(
        &self,
        positions_id: &str,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        params.insert("positionsId".to_string(), json!(positions_id));
        self.request(CH_MARGIN_INFO, params, callback, error_handler).await
    }

    /// `margin_type` is `1` to add margin and `0` to withdraw it.
    pub async fn update_margin<F>(
        &self,
        positions_id: &str,
        amount: f64,
        margin_type: i64,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        params.insert("positionsId".to_string(), json!(positions_id));
        params.insert("amount".to_string(), json!(amount));
        params.insert("type".to_string(), json!(margin_type));
        self.request(CH_UPDATE_MARGIN, params, callback, error_handler).await
    }

    pub async fn get_setting<F>(
        &self,
        symbol: &str,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        params.insert("symbol".to_string(), json!(symbol));
        self.request(CH_GET_SETTING, params, callback, error_handler).await
    }

    pub async fn set_leverage<F>(
        &self,
        symbol: &str,
        leverage: u32,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        params.insert("symbol".to_string(), json!(symbol));
        params.insert("leverage".to_string(), json!(leverage));
        self.request(CH_SET_LEVERAGE, params, callback, error_handler).await
    }

    pub async fn set_positions_mode<F>(
        &self,
        symbol: &str,
        positions_mode: PositionsMode,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        params.insert("symbol".to_string(), json!(symbol));
        params.insert("positionsMode".to_string(), json!(positions_mode.value()));
        self.request(CH_SET_POSITIONS_MODE, params, callback, error_handler)
            .await
    }

    pub async fn set_margin_mode<F>(
        &self,
        symbol: &str,
        margin_mode: MarginMode,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        params.insert("symbol".to_string(), json!(symbol));
        params.insert("marginMode".to_string(), json!(margin_mode.value()));
        self.request(CH_SET_MARGIN_MODE, params, callback, error_handler).await
    }

    /// `side` is `1` for long and `0` for short.
    pub async fn get_nominal_value<F>(
        &self,
        symbol: &str,
        side: i64,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        params.insert("symbol".to_string(), json!(symbol));
        params.insert("side".to_string(), json!(side));
        self.request(CH_GET_NOMINAL_VALUE, params, callback, error_handler)
            .await
    }

    // --- Orders & trades ---

    pub async fn subscribe_order_change<F>(
        &self,
        symbol: Option<&str>,
        futures_account_type: FuturesAccountType,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = account_params(futures_account_type);
        insert_opt(&mut params, "symbol", symbol);
        self.request(CH_ORDER_CHANGE, params, callback, error_handler).await
    }

    /// Places an order. `entrust_type`: 1 limit, 2 liquidation, 3 take profit, 4 stop loss.
    #[allow(clippy::too_many_arguments)]
    pub async fn order<F>(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: f64,
        price: f64,
        action: Action,
        entrust_type: i64,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        if amount <= 0.0 {
            return Err(ZbError::ParameterValueError {
                param: "amount".to_string(),
                value: amount.to_string(),
            });
        }
        if price <= 0.0 {
            return Err(ZbError::ParameterValueError {
                param: "price".to_string(),
                value: price.to_string(),
            });
        }
        let mut params = Map::new();
        params.insert("symbol".to_string(), json!(symbol));
        params.insert("price".to_string(), json!(price));
        params.insert("amount".to_string(), json!(amount));
        params.insert("action".to_string(), json!(action.value()));
        params.insert("entrustType".to_string(), json!(entrust_type));
        params.insert("side".to_string(), json!(side.value()));
        self.request(CH_ORDER, params, callback, error_handler).await
    }

    pub async fn batch_order<F>(
        &self,
        orders: &[OrderRequest],
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        if orders.is_empty() {
            return Err(ZbError::arguments_required("orders"));
        }
        let mut params = Map::new();
        // The server expects the order list as a JSON string.
        params.insert(
            "orderDatas".to_string(),
            json!(serde_json::to_string(orders)?),
        );
        self.request(CH_BATCH_ORDER, params, callback, error_handler).await
    }

    pub async fn get_order<F>(
        &self,
        symbol: &str,
        ids: OrderIds,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = Map::new();
        params.insert("symbol".to_string(), json!(symbol));
        insert_order_ids(&mut params, &ids)?;
        self.request(CH_GET_ORDER, params, callback, error_handler).await
    }

    pub async fn cancel_order<F>(
        &self,
        symbol: &str,
        ids: OrderIds,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = Map::new();
        params.insert("symbol".to_string(), json!(symbol));
        insert_order_ids(&mut params, &ids)?;
        self.request(CH_CANCEL_ORDER, params, callback, error_handler).await
    }

    pub async fn batch_cancel_order<F>(
        &self,
        symbol: &str,
        order_ids: &[String],
        client_order_ids: &[String],
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        if order_ids.is_empty() && client_order_ids.is_empty() {
            return Err(ZbError::arguments_required(
                "order_ids or client_order_ids",
            ));
        }
        let mut params = Map::new();
        params.insert("symbol".to_string(), json!(symbol));
        if !order_ids.is_empty() {
            params.insert("orderIds".to_string(), json!(order_ids));
        }
        if !client_order_ids.is_empty() {
            params.insert("clientOrderIds".to_string(), json!(client_order_ids));
        }
        self.request(CH_BATCH_CANCEL_ORDER, params, callback, error_handler)
            .await
    }

    pub async fn cancel_all_orders<F>(
        &self,
        symbol: &str,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = Map::new();
        params.insert("symbol".to_string(), json!(symbol));
        self.request(CH_CANCEL_ALL_ORDERS, params, callback, error_handler)
            .await
    }

    pub async fn get_undone_orders<F>(
        &self,
        symbol: &str,
        page: u32,
        size: u32,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = Map::new();
        params.insert("symbol".to_string(), json!(symbol));
        params.insert("pageNum".to_string(), json!(page));
        params.insert("pageSize".to_string(), json!(size));
        self.request(CH_GET_UNDONE_ORDERS, params, callback, error_handler)
            .await
    }

    pub async fn get_all_orders<F>(
        &self,
        symbol: &str,
        page: PageQuery,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = Map::new();
        params.insert("symbol".to_string(), json!(symbol));
        insert_page(&mut params, &page);
        self.request(CH_GET_ALL_ORDERS, params, callback, error_handler).await
    }

    pub async fn get_trade_list<F>(
        &self,
        symbol: &str,
        order_id: &str,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = Map::new();
        params.insert("symbol".to_string(), json!(symbol));
        params.insert("orderId".to_string(), json!(order_id));
        self.request(CH_GET_TRADE_LIST, params, callback, error_handler).await
    }

    pub async fn get_trade_history<F>(
        &self,
        symbol: &str,
        page: PageQuery,
        callback: F,
        error_handler: Option<ErrorHandler>,
    ) -> Result<()>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut params = Map::new();
        params.insert("symbol".to_string(), json!(symbol));
        insert_page(&mut params, &page);
        self.request(CH_TRADE_HISTORY, params, callback, error_handler).await
    }
}

impl Drop for AccountStreamClient {
    fn drop(&mut self) {
        self.watch_dog_task.abort();
    }
}

fn dispatch_parser(channels: ChannelMap) -> JsonParser {
    Arc::new(move |json: &Value| {
        let channel = json.get("channel").and_then(Value::as_str);
        let parser = channel.and_then(|channel| {
            lock(&channels)
                .get(channel)
                .and_then(|handlers| handlers.json_parser.clone())
        });
        match (channel, parser) {
            (Some(channel), Some(parser)) => parser(json).map_err(|e| ZbError::ChannelError {
                channel: channel.to_string(),
                source: Box::new(e),
            }),
            _ => {
                debug!("[Account] No parser for frame: {}", json);
                Ok(StreamEvent::Raw(json.clone()))
            }
        }
    })
}

fn dispatch_callback(channels: ChannelMap) -> UpdateCallback {
    Arc::new(move |event: StreamEvent| {
        let channel = match event.channel() {
            Some(channel) => channel.to_string(),
            None => {
                info!("[Account] No channel in event: {:?}", event);
                return;
            }
        };
        let handlers = lock(&channels)
            .get(&channel)
            .map(|handlers| (handlers.callback.clone(), handlers.error_handler.clone()));
        let (callback, error_handler) = match handlers {
            Some(handlers) => handlers,
            None => {
                info!("[Account] No callback for channel {}: {:?}", channel, event);
                return;
            }
        };
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
            let error = ZbError::ChannelError {
                channel: channel.clone(),
                source: Box::new(ZbError::CallbackError(panic_message(panic.as_ref()))),
            };
            error!("[Account] {}", error);
            if let Some(handler) = error_handler {
                handler(error);
            }
        }
    })
}

fn dispatch_error_handler(channels: ChannelMap) -> ErrorHandler {
    Arc::new(move |error: ZbError| {
        let handler = error.channel().and_then(|channel| {
            lock(&channels)
                .get(channel)
                .and_then(|handlers| handlers.error_handler.clone())
        });
        match handler {
            Some(handler) => handler(error),
            None => warn!("[Account] Stream error: {}", error),
        }
    })
}
