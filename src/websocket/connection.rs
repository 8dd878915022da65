use super::events::StreamEvent;
use super::lock;
use super::watchdog::WatchDog;
use crate::auth::get_timestamp_ms;
use crate::error::{Result, ZbError};
use flate2::read::GzDecoder;
use futures_util::{SinkExt, StreamExt};
use log::*;
use serde_json::Value;
use std::any::Any;
use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

/// Heartbeat reply token; such frames are never dispatched.
pub const PONG: &str = "pong";
const NO_DELAY: i64 = -1;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Delivers a parsed event to the caller.
pub type UpdateCallback = Arc<dyn Fn(StreamEvent) + Send + Sync + 'static>;
/// Turns a decoded frame into a typed event.
pub type JsonParser = Arc<dyn Fn(&Value) -> Result<StreamEvent> + Send + Sync + 'static>;
/// Receives every failure related to a subscription.
pub type ErrorHandler = Arc<dyn Fn(ZbError) + Send + Sync + 'static>;
/// Sends a control frame over a freshly opened (or closing) connection.
pub type Handshake = Arc<dyn Fn(&Connection) + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    ClosedOnError,
    /// Closed on hand; never reconnected.
    Closed,
}

/// What a [`Connection`] subscribes to and how it parses, delivers and reports.
pub struct WebsocketRequest {
    pub channel: String,
    /// Invoked on every transport open; sends the subscribe (or login) frame.
    pub subscription_handler: Option<Handshake>,
    /// Invoked once on explicit close, before the socket goes away.
    pub unsubscription_handler: Option<Handshake>,
    pub json_parser: JsonParser,
    pub update_callback: UpdateCallback,
    pub error_handler: Option<ErrorHandler>,
}

/// One physical WebSocket plus the request it serves.
///
/// The socket is owned by a background task and recreated on every connect
/// attempt; the connection identity and its request survive reconnects.
/// Each attempt is tagged with a generation number so a superseded task can
/// never touch the state of its replacement.
pub struct Connection {
    id: u64,
    url: String,
    request: WebsocketRequest,
    watch_dog: Weak<WatchDog>,
    state: Mutex<ConnectionState>,
    last_receive_time: AtomicI64,
    delay_in_second: AtomicI64,
    generation: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    pub fn new(url: String, request: WebsocketRequest, watch_dog: Weak<WatchDog>) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst),
            url,
            request,
            watch_dog,
            state: Mutex::new(ConnectionState::Idle),
            last_receive_time: AtomicI64::new(0),
            delay_in_second: AtomicI64::new(NO_DELAY),
            generation: AtomicU64::new(0),
            outbound: Mutex::new(None),
            task: Mutex::new(None),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn channel(&self) -> &str {
        &self.request.channel
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    /// Milliseconds since the epoch at which the last frame arrived.
    pub fn last_receive_time(&self) -> i64 {
        self.last_receive_time.load(Ordering::SeqCst)
    }

    pub(crate) fn set_last_receive_time(&self, millis: i64) {
        self.last_receive_time.store(millis, Ordering::SeqCst);
    }

    /// Remaining watchdog ticks before reconnecting, `-1` when none is pending.
    pub fn pending_delay(&self) -> i64 {
        self.delay_in_second.load(Ordering::SeqCst)
    }

    pub fn in_delay_connection(&self) -> bool {
        self.pending_delay() != NO_DELAY
    }

    fn touch(&self) {
        self.set_last_receive_time(get_timestamp_ms() as i64);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Applies `f` to the state only if `generation` is still the live attempt.
    fn transition(&self, generation: u64, f: impl FnOnce(&mut ConnectionState)) -> bool {
        let mut state = lock(&self.state);
        if !self.is_current(generation) {
            return false;
        }
        f(&mut state);
        true
    }

    /// Starts a background receive loop unless one is already live.
    ///
    /// Returns immediately; the subscription handshake runs once the
    /// transport is open.
    pub fn connect(self: &Arc<Self>) {
        let generation = {
            let mut state = lock(&self.state);
            match *state {
                ConnectionState::Connected | ConnectionState::Connecting => {
                    info!("[Sub][{}] Already connected", self.id);
                    return;
                }
                ConnectionState::Closed => {
                    warn!("[Sub][{}] Connection was closed on hand, not reconnecting", self.id);
                    return;
                }
                ConnectionState::Idle | ConnectionState::ClosedOnError => {}
            }
            *state = ConnectionState::Connecting;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        self.delay_in_second.store(NO_DELAY, Ordering::SeqCst);
        // The attempt gets a full staleness window before the watchdog supersedes it.
        self.touch();

        let handle = tokio::spawn(Arc::clone(self).run(generation));
        if let Some(previous) = lock(&self.task).replace(handle) {
            previous.abort();
        }
    }

    /// Drops the current socket and schedules a reconnect `delay_in_second`
    /// watchdog ticks from now.
    pub fn re_connect_in_delay(&self, delay_in_second: i64) {
        {
            let mut state = lock(&self.state);
            self.generation.fetch_add(1, Ordering::SeqCst);
            if *state != ConnectionState::Closed {
                *state = ConnectionState::Idle;
            }
        }
        lock(&self.outbound).take();
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        self.delay_in_second
            .store(delay_in_second, Ordering::SeqCst);
    }

    /// One watchdog tick of a pending reconnect.
    pub fn re_connect(self: &Arc<Self>) {
        let ticked = self
            .delay_in_second
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |delay| {
                (delay > 0).then_some(delay - 1)
            });
        match ticked {
            Ok(previous) => warn!(
                "[Sub][{}] In delay connection: {}",
                self.id,
                previous - 1
            ),
            Err(_) => self.connect(),
        }
    }

    /// Queues a text frame for the socket.
    pub fn send(&self, data: &str) -> Result<()> {
        trace!("[Sub][{}] Send data to server: {}", self.id, data);
        let guard = lock(&self.outbound);
        match guard.as_ref() {
            Some(tx) => tx
                .send(Message::Text(data.to_string()))
                .map_err(|e| ZbError::WebsocketError(format!("Failed to send message: {}", e))),
            None => Err(ZbError::WebsocketError("Not connected".to_string())),
        }
    }

    pub fn send_json(&self, value: &Value) -> Result<()> {
        self.send(&serde_json::to_string(value)?)
    }

    /// Explicit, application-initiated close.
    pub fn close_on_hand(&self) {
        if lock(&self.outbound).is_some() {
            if let Some(handler) = &self.request.unsubscription_handler {
                handler(self);
            }
        }
        self.on_close();
    }

    fn on_close(&self) {
        if let Some(watch_dog) = self.watch_dog.upgrade() {
            watch_dog.on_connection_closed(self.id);
        }
        {
            let mut state = lock(&self.state);
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = ConnectionState::Closed;
        }
        // Dropping the sender lets the loop flush queued frames, send Close and exit.
        lock(&self.outbound).take();
        lock(&self.task).take();
        info!("[Sub][{}] Closing normally", self.id);
    }

    fn on_open(self: &Arc<Self>, generation: u64) -> bool {
        if !self.transition(generation, |state| *state = ConnectionState::Connected) {
            return false;
        }
        info!("[Sub][{}] Connected to server", self.id);
        self.touch();
        if let Some(handler) = &self.request.subscription_handler {
            handler(self);
        }
        if let Some(watch_dog) = self.watch_dog.upgrade() {
            watch_dog.on_connection_created(Arc::clone(self));
        }
        true
    }

    fn on_failure(&self, generation: u64, error: String) {
        if !self.is_current(generation) {
            return;
        }
        self.on_error(ZbError::WebsocketError(format!("Unexpected error: {}", error)));
        if self.transition(generation, |state| *state = ConnectionState::ClosedOnError) {
            error!("[Sub][{}] Connection is closing due to error", self.id);
        }
    }

    fn on_error(&self, error: ZbError) {
        info!("[Sub][{}] {}", self.id, error);
        if let Some(handler) = &self.request.error_handler {
            if catch_unwind(AssertUnwindSafe(|| handler(error))).is_err() {
                error!("[Sub][{}] Error handler panicked", self.id);
            }
        }
    }

    /// Decodes one inbound frame and routes it to the error path or the
    /// parser and callback. Failures stay local to this frame.
    pub(crate) fn on_message(&self, message: Message) {
        self.touch();

        let json = match decode_message(message) {
            Ok(Some(json)) => json,
            Ok(None) => return,
            Err(e) => {
                error!("[Sub][{}] Failed to decode frame: {}", self.id, e);
                self.on_error(e);
                return;
            }
        };

        if json.get("action").and_then(Value::as_str) == Some(PONG) {
            trace!("[Sub][{}] Heartbeat", self.id);
            return;
        }

        if json.get("errorCode").is_some() {
            self.on_error(ZbError::from_error_frame(json));
            return;
        }

        let parser = &self.request.json_parser;
        let event = match catch_unwind(AssertUnwindSafe(|| parser(&json))) {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => {
                error!("[Sub][{}] Failed to parse server's response: {}", self.id, e);
                self.on_error(e);
                return;
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!("[Sub][{}] Parser panicked: {}", self.id, reason);
                self.on_error(ZbError::DecodeError(format!(
                    "Failed to parse server's response: {}",
                    reason
                )));
                return;
            }
        };

        let callback = &self.request.update_callback;
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
            let reason = panic_message(panic.as_ref());
            error!("[Sub][{}] Failed to call the callback method: {}", self.id, reason);
            self.on_error(ZbError::CallbackError(format!(
                "Process error: {} You should capture the exception in your error handler",
                reason
            )));
        }
    }

    async fn run(self: Arc<Self>, generation: u64) {
        info!("[Sub][{}] Connecting to {}...", self.id, self.url);
        let ws_stream = match connect_async(self.url.as_str()).await {
            Ok((stream, response)) => {
                debug!("[Sub][{}] Handshake status: {:?}", self.id, response.status());
                stream
            }
            Err(e) => {
                self.on_failure(generation, format!("WebSocket connection failed: {}", e));
                // Keep a never-opened connection under watch so it is retried.
                if self.is_current(generation) {
                    if let Some(watch_dog) = self.watch_dog.upgrade() {
                        watch_dog.on_connection_created(Arc::clone(&self));
                    }
                }
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        {
            let _state = lock(&self.state);
            if !self.is_current(generation) {
                return;
            }
            *lock(&self.outbound) = Some(tx);
        }

        if !self.on_open(generation) {
            return;
        }

        loop {
            tokio::select! {
                outbound = rx.recv() => match outbound {
                    Some(message) => {
                        if let Err(e) = write.send(message).await {
                            self.on_failure(generation, format!("WebSocket send error: {}", e));
                            break;
                        }
                    }
                    None => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                },
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        self.touch();
                        if let Err(e) = write.send(Message::Pong(payload)).await {
                            self.on_failure(generation, format!("WebSocket send error: {}", e));
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        warn!("[Sub][{}] Received Close frame: {:?}", self.id, frame);
                        break;
                    }
                    Some(Ok(message)) => {
                        if self.is_current(generation) {
                            self.on_message(message);
                        }
                    }
                    Some(Err(e)) => {
                        self.on_failure(generation, format!("WebSocket read error: {}", e));
                        break;
                    }
                    None => {
                        info!("[Sub][{}] WebSocket stream ended", self.id);
                        break;
                    }
                },
            }
        }

        info!("[Sub][{}] Connection event loop down", self.id);
        let mut state = lock(&self.state);
        if self.is_current(generation) {
            lock(&self.outbound).take();
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Idle;
            }
        }
    }
}

/// Text frames are JSON; binary frames are gzip-compressed JSON.
/// Control frames yield `None`.
pub fn decode_message(message: Message) -> Result<Option<Value>> {
    let text = match message {
        Message::Text(text) => text,
        Message::Binary(bytes) => {
            let mut decoder = GzDecoder::new(bytes.as_slice());
            let mut text = String::new();
            decoder
                .read_to_string(&mut text)
                .map_err(|e| ZbError::DecodeError(format!("Failed to decompress frame: {}", e)))?;
            text
        }
        _ => return Ok(None),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| ZbError::DecodeError(format!("Malformed JSON frame: {}", e)))
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
