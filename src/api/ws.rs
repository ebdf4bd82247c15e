//! WebSocket broadcast of scan events.
//!
//! Every kept record is pushed to connected clients as soon as it is rendered,
//! together with run start/finish notifications.

use crate::scan::{PhotoRecord, RecordSink, RunOutcome};
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Maximum number of events to buffer per client.
const CHANNEL_CAPACITY: usize = 100;

/// WebSocket event types pushed to clients.
#[derive(Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsEvent {
    ScanStarted {
        max_items: u32,
    },
    /// A record was kept and rendered.
    RecordRendered(PhotoRecord),
    /// The run ended. `outcome` is absent when it aborted with `error`.
    ScanFinished {
        outcome: Option<RunOutcome>,
        error: Option<String>,
    },
    RecordsCleared,
    /// Heartbeat (sent every 30s to keep connection alive).
    Heartbeat,
}

/// Shared broadcast sender for WebSocket events.
#[derive(Clone)]
pub struct WsBroadcaster {
    tx: broadcast::Sender<WsEvent>,
}

impl WsBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: WsEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to events (returns a receiver for a new client).
    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.tx.subscribe()
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSink for WsBroadcaster {
    fn render(&self, record: &PhotoRecord) {
        self.broadcast(WsEvent::RecordRendered(record.clone()));
    }
}

/// WebSocket upgrade handler for `/api/ws`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.ws_broadcaster.subscribe();

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break; // Client disconnected
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("WebSocket client lagged, {} event(s) dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Axum answers pings itself; we only watch for the close.
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
}
