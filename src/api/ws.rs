// =============================================================================
// WebSocket Handler — Push-based scan lifecycle events
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive every scan lifecycle event as a
// JSON text frame (`{"event": "symbol_matched", "scan_id": ..., ...}`).
// Events carry the scan id; clients drop events whose scan was cancelled.
//
// The handler also:
//   - Responds to Ping frames with Pong frames.
//   - Tells a client that fell behind how many events it missed.
//   - Cleans up on disconnect.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::scanner::ScanEvent;

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Manages a single WebSocket connection lifecycle.
///
/// Runs two concurrent branches via `tokio::select!`:
///   1. **Push** — forward each lifecycle event as it is published.
///   2. **Recv** — process incoming client frames (Ping, Close).
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    // Subscribe before anything else so no event published after the
    // upgrade is missed.
    let mut events = state.subscribe();
    info!(phase = %state.status().phase, "event stream client connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            // ── Push: forward lifecycle events ──────────────────────────
            event = events.recv() => {
                let frame = match event {
                    Ok(event) => match encode(&event) {
                        Some(frame) => frame,
                        None => continue,
                    },
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "event stream client lagging");
                        Message::Text(serde_json::json!({ "event": "lagged", "missed": missed }).to_string())
                    }
                    Err(RecvError::Closed) => break,
                };
                if let Err(e) = sender.send(frame).await {
                    debug!(error = %e, "WebSocket send failed — disconnecting");
                    break;
                }
            }

            // ── Recv: process incoming messages ─────────────────────────
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "Failed to send Pong — disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        debug!("WebSocket client message ignored");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket receive error — disconnecting");
                        break;
                    }
                }
            }
        }
    }

    info!("event stream client disconnected");
}

/// Serialise an event into a text frame.  Serialisation errors are logged
/// and the event is skipped rather than dropping the connection.
fn encode(event: &ScanEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            warn!(error = %e, "Failed to serialize scan event");
            None
        }
    }
}
