//! Push listener: Socket.IO client over WebSocket that triggers a refresh
//! whenever the backend emits `update`.
//!
//! Only the slice of Engine.IO v4 / Socket.IO v5 the backend uses is spoken:
//! open (`0`), ping/pong (`2`/`3`), namespace connect (`40`), events (`42`),
//! and disconnects (`1`, `41`, `44`). Plain JSON frames such as
//! `{"type":"update"}` are accepted too.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::PushError;
use crate::sync::Synchronizer;

/// Event name that triggers a refresh.
pub const UPDATE_EVENT: &str = "update";

/// Namespace connect request sent after the Engine.IO open packet.
const CONNECT_FRAME: &str = "40";

const PONG_FRAME: &str = "3";

/// Connection state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    Disconnected,
    Connecting,
    Connected,
}

/// A decoded text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Engine.IO handshake from the server.
    Open,
    /// Engine.IO close.
    Close,
    Ping,
    Pong,
    /// Namespace connect acknowledged.
    Connected,
    /// Server dropped the namespace.
    Disconnected,
    ConnectError(String),
    /// A named event; payload is not consumed.
    Event(String),
    Noop,
    Unknown,
}

impl Frame {
    pub fn is_update(&self) -> bool {
        matches!(self, Self::Event(name) if name == UPDATE_EVENT)
    }
}

/// Decode one text frame.
pub fn decode_frame(text: &str) -> Frame {
    let text = text.trim();
    if text.starts_with('{') {
        return decode_json_frame(text);
    }

    let mut chars = text.chars();
    match chars.next() {
        Some('0') => Frame::Open,
        Some('1') => Frame::Close,
        Some('2') => Frame::Ping,
        Some('3') => Frame::Pong,
        Some('6') => Frame::Noop,
        Some('4') => decode_socket_packet(chars.as_str()),
        _ => Frame::Unknown,
    }
}

fn decode_socket_packet(packet: &str) -> Frame {
    let mut chars = packet.chars();
    let kind = chars.next();
    let rest = strip_namespace(chars.as_str());
    match kind {
        Some('0') => Frame::Connected,
        Some('1') => Frame::Disconnected,
        Some('2') => {
            // Optional ack id precedes the JSON array.
            let body = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            match serde_json::from_str::<serde_json::Value>(body) {
                Ok(serde_json::Value::Array(items)) => match items.first() {
                    Some(serde_json::Value::String(name)) => Frame::Event(name.clone()),
                    _ => Frame::Unknown,
                },
                _ => Frame::Unknown,
            }
        }
        Some('4') => {
            let reason = serde_json::from_str::<serde_json::Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| rest.to_string());
            Frame::ConnectError(reason)
        }
        _ => Frame::Unknown,
    }
}

/// Drop a leading `/namespace,` if present.
fn strip_namespace(rest: &str) -> &str {
    if rest.starts_with('/') {
        match rest.find(',') {
            Some(idx) => &rest[idx + 1..],
            None => "",
        }
    } else {
        rest
    }
}

fn decode_json_frame(text: &str) -> Frame {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return Frame::Unknown;
    };
    value
        .get("type")
        .or_else(|| value.get("event"))
        .and_then(|v| v.as_str())
        .map(|name| Frame::Event(name.to_string()))
        .unwrap_or(Frame::Unknown)
}

/// WebSocket URL of the push endpoint for an `http(s)` base address.
pub fn push_url(base_url: &str, path: &str) -> Result<String, PushError> {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(PushError::InvalidUrl {
            url: base_url.to_string(),
            reason: "expected an http(s) base URL".into(),
        });
    };

    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    Ok(format!("{ws_base}{path}?EIO=4&transport=websocket"))
}

/// Next reconnect delay: doubled, capped at `max`.
pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

/// Listens on the push channel and drives [`Synchronizer::resync`].
pub struct PushListener {
    url: String,
    sync: Arc<Synchronizer>,
    initial_backoff: Duration,
    max_backoff: Duration,
    state_tx: watch::Sender<PushState>,
}

/// Handle to a running listener.
pub struct PushHandle {
    state_rx: watch::Receiver<PushState>,
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl PushHandle {
    pub fn state(&self) -> PushState {
        *self.state_rx.borrow()
    }

    /// Wait until the listener reaches `target`.
    pub async fn wait_for(&mut self, target: PushState) {
        // Only fails once the listener task is gone.
        let _ = self.state_rx.wait_for(|s| *s == target).await;
    }

    /// Stop the listener and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            warn!(error = %e, "Push listener task failed");
        }
    }
}

impl PushListener {
    pub fn new(
        url: impl Into<String>,
        sync: Arc<Synchronizer>,
        initial_backoff: Duration,
        max_backoff: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(PushState::Disconnected);
        Self {
            url: url.into(),
            sync,
            initial_backoff,
            max_backoff,
            state_tx,
        }
    }

    /// Run the listener on the current runtime.
    pub fn spawn(self) -> PushHandle {
        let state_rx = self.state_tx.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        PushHandle {
            state_rx,
            shutdown_tx,
            join,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut delay = self.initial_backoff;
        let mut connections: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(PushState::Connecting);
            let mut connected = false;
            let outcome = tokio::select! {
                result = self.connection(&mut connected, connections) => result,
                _ = shutdown.changed() => break,
            };
            self.set_state(PushState::Disconnected);

            if connected {
                connections += 1;
                delay = self.initial_backoff;
            }
            if let Err(e) = outcome {
                warn!(error = %e, retry_in = ?delay, "Push channel lost");
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
            delay = next_backoff(delay, self.max_backoff);
        }

        self.set_state(PushState::Disconnected);
        info!("Push listener stopped");
    }

    /// One WebSocket session. Returns when the connection ends.
    async fn connection(&self, connected: &mut bool, previous: u64) -> Result<(), PushError> {
        debug!(url = %self.url, "Connecting push channel");
        let (ws, _resp) = connect_async(self.url.as_str())
            .await
            .map_err(|e| PushError::ConnectFailed {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        let (mut sink, mut stream) = ws.split();

        while let Some(message) = stream.next().await {
            let message = message.map_err(|e| PushError::Disconnected {
                reason: e.to_string(),
            })?;

            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => {
                    return Err(PushError::Disconnected {
                        reason: "server closed the socket".into(),
                    });
                }
                _ => continue,
            };

            match decode_frame(text.as_str()) {
                Frame::Open => {
                    sink.send(Message::text(CONNECT_FRAME))
                        .await
                        .map_err(|e| PushError::Disconnected {
                            reason: e.to_string(),
                        })?;
                }
                Frame::Ping => {
                    sink.send(Message::text(PONG_FRAME))
                        .await
                        .map_err(|e| PushError::Disconnected {
                            reason: e.to_string(),
                        })?;
                }
                Frame::Connected => {
                    self.mark_connected(connected, previous).await;
                }
                Frame::Event(name) => {
                    // Plain JSON servers skip the namespace handshake.
                    self.mark_connected(connected, previous).await;
                    if name == UPDATE_EVENT {
                        info!("Received update from server");
                        self.sync.resync().await;
                    } else {
                        debug!(event = %name, "Ignoring push event");
                    }
                }
                Frame::Close | Frame::Disconnected => {
                    return Err(PushError::Disconnected {
                        reason: "server ended the session".into(),
                    });
                }
                Frame::ConnectError(reason) => {
                    return Err(PushError::ConnectFailed {
                        url: self.url.clone(),
                        reason,
                    });
                }
                Frame::Pong | Frame::Noop | Frame::Unknown => {}
            }
        }

        Err(PushError::Disconnected {
            reason: "stream ended".into(),
        })
    }

    async fn mark_connected(&self, connected: &mut bool, previous: u64) {
        if *connected {
            return;
        }
        *connected = true;
        self.set_state(PushState::Connected);
        info!(url = %self.url, "Push channel connected");
        // Updates may have been missed while the channel was down.
        if previous > 0 {
            self.sync.resync().await;
        }
    }

    fn set_state(&self, state: PushState) {
        self.state_tx.send_replace(state);
    }
}
