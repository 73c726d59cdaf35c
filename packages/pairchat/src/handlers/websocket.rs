use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;
use crate::relay;

/// Relay WebSocket endpoint - one persistent connection per chat client
pub async fn relay_websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let registry = state.registry.clone();
    let repository = state.repository.as_ref().clone();
    let config = state.relay_config.clone();
    let metrics = state.metrics.clone();

    ws.on_upgrade(move |socket| {
        relay::handle_relay_ws(socket, registry, repository, config, metrics)
    })
}
