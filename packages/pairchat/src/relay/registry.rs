//! Session Registry
//!
//! Maps display names to currently-connected handles. Owned by the server's
//! `AppState` and shared by every relay session — there is no module-level
//! state, and no durable mirror (single-process deployment).

use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio::sync::mpsc;

use super::protocol::ServerMessage;

/// Live handle for one registered connection: the connection id that owns the
/// registration plus the outbound channel used to address that client.
/// Invalidated when the owning connection disconnects.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    pub connection_id: String,
    pub sender: mpsc::Sender<ServerMessage>,
}

/// Entry in the registry: exactly one per registered name.
#[derive(Default)]
pub struct SessionRegistry {
    entries: RwLock<HashMap<String, RegistryHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry only if no existing entry has this name. Returns
    /// whether an insert happened. The handle is not validated.
    ///
    /// Two connections claiming the same name is an unresolved policy
    /// decision: the first registration wins until its connection goes away.
    pub async fn register(&self, name: &str, handle: RegistryHandle) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(name) {
            return false;
        }
        entries.insert(name.to_string(), handle);
        true
    }

    /// Look up the live handle for a name. A miss means the user is offline —
    /// a normal outcome, not an error.
    pub async fn lookup(&self, name: &str) -> Option<RegistryHandle> {
        self.entries.read().await.get(name).cloned()
    }

    /// Delete any entry whose handle belongs to this connection; no-op if
    /// none match.
    pub async fn remove(&self, connection_id: &str) {
        self.entries
            .write()
            .await
            .retain(|_, h| h.connection_id != connection_id);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(connection_id: &str) -> RegistryHandle {
        let (tx, _rx) = mpsc::channel(1);
        RegistryHandle {
            connection_id: connection_id.to_string(),
            sender: tx,
        }
    }

    #[tokio::test]
    async fn register_and_lookup() {
        let registry = SessionRegistry::new();
        assert!(registry.register("Alice", handle("conn-1")).await);

        let found = registry.lookup("Alice").await.unwrap();
        assert_eq!(found.connection_id, "conn-1");
        assert!(registry.lookup("Bob").await.is_none());
    }

    #[tokio::test]
    async fn duplicate_register_keeps_first_entry() {
        // Regression test for the no-dedup policy: a second registration of
        // the same name without an intervening remove is a no-op.
        let registry = SessionRegistry::new();
        assert!(registry.register("Alice", handle("conn-1")).await);
        assert!(!registry.register("Alice", handle("conn-2")).await);

        assert_eq!(registry.len().await, 1);
        let found = registry.lookup("Alice").await.unwrap();
        assert_eq!(found.connection_id, "conn-1");
    }

    #[tokio::test]
    async fn remove_by_connection_id() {
        let registry = SessionRegistry::new();
        registry.register("Alice", handle("conn-1")).await;
        registry.register("Bob", handle("conn-2")).await;

        registry.remove("conn-1").await;
        assert!(registry.lookup("Alice").await.is_none());
        assert!(registry.lookup("Bob").await.is_some());
    }

    #[tokio::test]
    async fn remove_unknown_connection_is_noop() {
        let registry = SessionRegistry::new();
        registry.register("Alice", handle("conn-1")).await;

        registry.remove("conn-other").await;
        assert!(registry.lookup("Alice").await.is_some());
    }
}
