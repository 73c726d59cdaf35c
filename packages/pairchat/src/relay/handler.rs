//! WebSocket Handler
//!
//! Wires one upgraded WebSocket to a relay session: a sender task drains the
//! per-connection outbound channel into text frames, an input task parses
//! inbound frames into `ClientMessage`s and feeds the state machine.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::metrics::ServerMetrics;
use crate::repository::MessageRepository;

use super::RelaySession;
use super::protocol::{ClientMessage, ServerMessage};
use super::registry::SessionRegistry;

/// Handle one relay WebSocket connection from upgrade to disconnect.
pub async fn handle_relay_ws(
    socket: WebSocket,
    registry: Arc<SessionRegistry>,
    repository: MessageRepository,
    config: Arc<RelayConfig>,
    metrics: Arc<ServerMetrics>,
) {
    // Unique ID for this connection (owns its registry entry)
    let connection_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %connection_id, "New relay WebSocket connection");
    metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending messages to the WebSocket
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(config.send_channel_capacity);

    let mut session = RelaySession::new(
        connection_id.clone(),
        registry,
        repository,
        metrics.clone(),
        tx,
    );

    // Task to send messages to the WebSocket
    let sender_task = async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    };

    // Task to handle incoming messages. Events are processed one at a time:
    // a pending store operation suspends this connection's input only.
    let metrics_input = metrics.clone();
    let connection_id_input = connection_id.clone();
    let session_ref = &mut session;
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    metrics_input.message_received();
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => session_ref.handle(client_msg).await,
                        Err(e) => {
                            warn!(conn_id = %connection_id_input, "Discarding malformed client message: {}", e);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!(conn_id = %connection_id_input, "Client closed connection");
                    break;
                }
                Err(e) => {
                    metrics_input.websocket_error();
                    error!(conn_id = %connection_id_input, "WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    };

    // Run both tasks; either one ending means the connection is done
    tokio::select! {
        _ = sender_task => debug!(conn_id = %connection_id, "Sender task ended"),
        _ = input_task => debug!(conn_id = %connection_id, "Input task ended"),
    }

    // Disconnect is the only cancellation signal: clean up the registry entry
    session.close().await;
    metrics.connection_closed();
    info!(conn_id = %connection_id, "Relay WebSocket connection closed");
}
