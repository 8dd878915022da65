// tests/common.rs
use futures_util::{SinkExt, StreamExt};
use std::sync::Once;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{accept_async, tungstenite::Message};

static INIT: Once = Once::new();

// Initializes environment variables from .env for testing.
// Uses std::sync::Once to ensure it only runs once across all tests.
pub fn setup() {
    INIT.call_once(|| {
        if dotenv::from_path(".env").is_ok() {
            println!("Loaded .env file from current directory.");
        } else if dotenv::from_path("../.env").is_ok() {
            println!("Loaded .env file from parent directory.");
        } else {
            println!("Warning: .env file not found in current or parent directory.");
        }
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

#[allow(dead_code)]
pub fn get_env_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{} environment variable not set", name))
}

/// One client session accepted by [`spawn_ws_server`].
#[allow(dead_code)]
pub struct Peer {
    /// Text frames sent by the client.
    pub incoming: mpsc::UnboundedReceiver<String>,
    /// Frames to push to the client.
    pub outgoing: mpsc::UnboundedSender<Message>,
}

#[allow(dead_code)]
impl Peer {
    pub fn push(&self, text: &str) {
        self.outgoing
            .send(Message::Text(text.to_string()))
            .expect("peer gone");
    }

    /// Next text frame from the client, or `None` after `wait_ms`.
    pub async fn next_frame(&mut self, wait_ms: u64) -> Option<String> {
        timeout(Duration::from_millis(wait_ms), self.incoming.recv())
            .await
            .ok()
            .flatten()
    }
}

/// Starts a local WebSocket server. Each accepted session shows up as a [`Peer`].
#[allow(dead_code)]
pub async fn spawn_ws_server() -> (String, mpsc::UnboundedReceiver<Peer>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let url = format!("ws://{}", listener.local_addr().expect("no local addr"));
    let (peers_tx, peers_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let ws = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(_) => continue,
            };
            let (mut write, mut read) = ws.split();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        outbound = out_rx.recv() => match outbound {
                            Some(message) => {
                                if write.send(message).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        },
                        incoming = read.next() => match incoming {
                            Some(Ok(Message::Text(text))) => {
                                let _ = in_tx.send(text);
                            }
                            Some(Ok(_)) => {}
                            _ => break,
                        },
                    }
                }
            });

            let peer = Peer {
                incoming: in_rx,
                outgoing: out_tx,
            };
            if peers_tx.send(peer).is_err() {
                break;
            }
        }
    });

    (url, peers_rx)
}

/// Waits for the next client session.
#[allow(dead_code)]
pub async fn next_peer(peers: &mut mpsc::UnboundedReceiver<Peer>, wait_ms: u64) -> Peer {
    timeout(Duration::from_millis(wait_ms), peers.recv())
        .await
        .expect("timed out waiting for a client")
        .expect("server stopped")
}
