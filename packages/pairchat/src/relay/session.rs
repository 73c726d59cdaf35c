//! Relay Session
//!
//! Per-connection state machine: `Unbound → Bound → Closed`. A connection
//! must declare its identity pair before it can send, so every stored record
//! carries a known `(from, to)` pair. All failures are caught here and
//! logged; none of them tear down the connection.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::metrics::ServerMetrics;
use crate::models::format_message;
use crate::repository::MessageRepository;

use super::protocol::{ClientMessage, ServerMessage};
use super::registry::{RegistryHandle, SessionRegistry};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("message could not be durably stored: {0}")]
    Persistence(#[source] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
enum SessionState {
    /// Connection exists, no identity pair declared yet
    Unbound,
    /// Identity declared; history replayed; sends accepted
    Bound { from: String, to: String },
    /// Disconnected; no further events are processed
    Closed,
}

pub(crate) struct RelaySession {
    connection_id: String,
    state: SessionState,
    registry: Arc<SessionRegistry>,
    repository: MessageRepository,
    metrics: Arc<ServerMetrics>,
    outbound: mpsc::Sender<ServerMessage>,
}

impl RelaySession {
    pub fn new(
        connection_id: String,
        registry: Arc<SessionRegistry>,
        repository: MessageRepository,
        metrics: Arc<ServerMetrics>,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            connection_id,
            state: SessionState::Unbound,
            registry,
            repository,
            metrics,
            outbound,
        }
    }

    /// Process one validated client event.
    pub async fn handle(&mut self, msg: ClientMessage) {
        if self.state == SessionState::Closed {
            return;
        }
        match msg {
            ClientMessage::Bind { from, to } => self.handle_bind(from, to).await,
            ClientMessage::Send { from, to, body } => self.handle_send(from, to, body).await,
        }
    }

    async fn handle_bind(&mut self, from: String, to: String) {
        if let SessionState::Bound { .. } = self.state {
            warn!(conn_id = %self.connection_id, "Ignoring Bind on already-bound connection");
            return;
        }

        let handle = RegistryHandle {
            connection_id: self.connection_id.clone(),
            sender: self.outbound.clone(),
        };
        if self.registry.register(&from, handle).await {
            info!(conn_id = %self.connection_id, "{} is now online", from);
        } else {
            debug!(conn_id = %self.connection_id, "{} is already registered, keeping existing entry", from);
        }

        self.state = SessionState::Bound {
            from: from.clone(),
            to: to.clone(),
        };

        // Replay prior history to this connection only. A query failure is
        // logged and replay is skipped; the session stays bound.
        match self.repository.history_for_pair(&from, &to).await {
            Ok(messages) => {
                if self
                    .outbound
                    .send(ServerMessage::History { messages })
                    .await
                    .is_err()
                {
                    warn!(conn_id = %self.connection_id, "Failed to send history replay - channel closed");
                }
            }
            Err(e) => {
                self.metrics.persistence_error();
                error!(conn_id = %self.connection_id, "{}", RelayError::Persistence(e));
            }
        }
    }

    async fn handle_send(&mut self, from: String, to: String, body: String) {
        if self.state == SessionState::Unbound {
            warn!(conn_id = %self.connection_id, "Rejecting Send before Bind");
            if self
                .outbound
                .send(ServerMessage::Error {
                    message: "not bound: declare an identity pair first".to_string(),
                })
                .await
                .is_err()
            {
                warn!(conn_id = %self.connection_id, "Failed to send error notification - channel closed");
            }
            return;
        }

        let mut stored = format_message(&from, &to, &body);

        // A message that cannot be durably stored is not delivered: log the
        // failure and drop it. No retry, no failure signal to the sender.
        match self.repository.append_message(&stored).await {
            Ok(id) => stored.id = Some(id),
            Err(e) => {
                self.metrics.persistence_error();
                error!(conn_id = %self.connection_id, "{}", RelayError::Persistence(e));
                return;
            }
        }

        // Echo to the sending connection
        if self
            .outbound
            .send(ServerMessage::Message {
                message: stored.clone(),
            })
            .await
            .is_err()
        {
            self.metrics.message_dropped();
            warn!(conn_id = %self.connection_id, "Failed to echo message - channel closed");
        } else {
            self.metrics.message_delivered();
        }

        // Forward live if the receiver is currently registered. A miss means
        // the recipient is offline; the message stays retrievable via history.
        match self.registry.lookup(&to).await {
            Some(recipient) => {
                if recipient
                    .sender
                    .send(ServerMessage::Message { message: stored })
                    .await
                    .is_err()
                {
                    self.metrics.message_dropped();
                    warn!(conn_id = %self.connection_id, "Failed to forward message to {} - channel closed", to);
                } else {
                    self.metrics.message_delivered();
                }
            }
            None => {
                debug!(conn_id = %self.connection_id, "Recipient {} is offline, no live delivery", to);
            }
        }
    }

    /// Enter the terminal state and drop this connection's registry entry.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.registry.remove(&self.connection_id).await;
        self.state = SessionState::Closed;
        debug!(conn_id = %self.connection_id, "Session closed");
    }
}
