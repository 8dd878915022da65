use super::config::StreamConfig;
use super::connection::{Connection, ConnectionState};
use super::lock;
use crate::auth::get_timestamp_ms;
use log::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Periodic supervisor shared by every connection of one client.
///
/// Each tick walks a snapshot of the monitored connections and reconnects
/// the ones that went silent for longer than `receive_limit_ms` or failed
/// with an error. Reconnects are spaced by `connection_delay_failure` ticks.
pub struct WatchDog {
    is_auto_connect: bool,
    receive_limit_ms: i64,
    connection_delay_failure: i64,
    interval: Duration,
    connections: Mutex<HashMap<u64, Arc<Connection>>>,
}

impl WatchDog {
    pub fn new(config: &StreamConfig) -> Arc<Self> {
        Arc::new(Self {
            is_auto_connect: config.is_auto_connect,
            receive_limit_ms: config.receive_limit_ms as i64,
            connection_delay_failure: config.connection_delay_failure,
            interval: Duration::from_millis(config.watchdog_interval_ms.max(1)),
            connections: Mutex::new(HashMap::new()),
        })
    }

    /// Spawns the tick loop. It ends by itself once the watchdog is dropped.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let watch_dog = Arc::downgrade(self);
        let period = self.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match watch_dog.upgrade() {
                    Some(watch_dog) => watch_dog.check_connections(),
                    None => break,
                }
            }
            debug!("[WatchDog] Stopped");
        })
    }

    /// Starts monitoring a connection. Registering it again is a no-op.
    pub fn on_connection_created(&self, connection: Arc<Connection>) {
        let id = connection.id();
        if lock(&self.connections).insert(id, connection).is_none() {
            debug!("[Sub][{}] Monitored by watchdog", id);
        }
    }

    pub fn on_connection_closed(&self, connection_id: u64) {
        if lock(&self.connections).remove(&connection_id).is_some() {
            debug!("[Sub][{}] No longer monitored by watchdog", connection_id);
        }
    }

    pub fn is_monitoring(&self, connection_id: u64) -> bool {
        lock(&self.connections).contains_key(&connection_id)
    }

    pub fn monitored_count(&self) -> usize {
        lock(&self.connections).len()
    }

    /// One supervision pass.
    pub fn check_connections(&self) {
        if !self.is_auto_connect {
            return;
        }

        let snapshot: Vec<Arc<Connection>> = lock(&self.connections).values().cloned().collect();
        let now = get_timestamp_ms() as i64;

        for connection in snapshot {
            if connection.in_delay_connection() {
                connection.re_connect();
                continue;
            }

            let elapsed = now - connection.last_receive_time();
            let failed = connection.state() == ConnectionState::ClosedOnError;
            if failed || elapsed > self.receive_limit_ms {
                if failed {
                    warn!("[Sub][{}] Connection failed, reconnecting", connection.id());
                } else {
                    warn!(
                        "[Sub][{}] No response from server for {} ms",
                        connection.id(),
                        elapsed
                    );
                }
                connection.re_connect_in_delay(self.connection_delay_failure);
                connection.re_connect();
            }
        }
    }
}
