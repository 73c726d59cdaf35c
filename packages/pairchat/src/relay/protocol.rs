//! Relay Protocol Types
//!
//! Tagged message types for client-server communication over the WebSocket.
//! Payloads are validated (deserialized) at the connection boundary before
//! they reach the session state machine.

use serde::{Deserialize, Serialize};

use crate::models::StoredMessage;

/// Messages sent FROM the client TO the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Declare this connection's identity pair (triggers history replay).
    /// Must be the first event on the connection; later sends relay between
    /// `from` and `to`.
    Bind { from: String, to: String },
    /// Send a chat message. `from`/`to`/`body` are copied verbatim into the
    /// stored record.
    Send {
        from: String,
        to: String,
        body: String,
    },
}

/// Messages sent FROM the server TO the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full ordered history for the bound pair, sent once right after binding
    History { messages: Vec<StoredMessage> },
    /// One delivered message: the echo to the sender, or the live forward to
    /// the receiver
    Message { message: StoredMessage },
    /// Protocol misuse (e.g. sending before binding)
    Error { message: String },
}
