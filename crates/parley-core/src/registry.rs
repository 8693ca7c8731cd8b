//! Registry of live connections.

use crate::error::HubError;
use crate::session::{ConnectionId, Session, SessionSink};
use std::collections::HashMap;
use tracing::debug;

/// Maps each live connection ID to its session.
///
/// The registry is the only owner of [`Session`] values; everything else
/// refers to sessions by [`ConnectionId`].
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<ConnectionId, Session>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new live session.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::DuplicateConnection`] if the ID is already live.
    pub fn register(
        &mut self,
        id: ConnectionId,
        display_name: impl Into<String>,
        sink: Box<dyn SessionSink>,
    ) -> Result<&Session, HubError> {
        if self.sessions.contains_key(&id) {
            return Err(HubError::DuplicateConnection(id));
        }

        let session = Session::new(id.clone(), display_name, sink);
        debug!(connection = %id, name = %session.display_name(), "Session registered");

        Ok(self.sessions.entry(id).or_insert(session))
    }

    /// Remove a session, returning it if it was live.
    ///
    /// Unknown IDs are ignored.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<Session> {
        let session = self.sessions.remove(id);
        if session.is_some() {
            debug!(connection = %id, "Session unregistered");
        }
        session
    }

    /// Look up a live session.
    #[must_use]
    pub fn lookup(&self, id: &ConnectionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Check if a connection is live.
    #[must_use]
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Snapshot of every live session, in no particular order.
    #[must_use]
    pub fn all(&self) -> Vec<&Session> {
        self.sessions.values().collect()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if there are no live sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_protocol::ServerMessage;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn sink() -> Box<dyn SessionSink> {
        let (tx, _rx) = mpsc::unbounded_channel::<Arc<ServerMessage>>();
        Box::new(tx)
    }

    #[test]
    fn test_register_lookup() {
        let mut registry = ConnectionRegistry::new();
        registry.register("u1".into(), "Alice", sink()).unwrap();

        let session = registry.lookup(&"u1".into()).unwrap();
        assert_eq!(session.display_name(), "Alice");
        assert!(registry.lookup(&"u2".into()).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = ConnectionRegistry::new();
        registry.register("u1".into(), "Alice", sink()).unwrap();

        assert!(matches!(
            registry.register("u1".into(), "Mallory", sink()),
            Err(HubError::DuplicateConnection(_))
        ));
        // Original session is untouched
        assert_eq!(
            registry.lookup(&"u1".into()).unwrap().display_name(),
            "Alice"
        );
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        registry.register("u1".into(), "Alice", sink()).unwrap();

        assert!(registry.unregister(&"u1".into()).is_some());
        assert!(registry.unregister(&"u1".into()).is_none());
        assert!(registry.is_empty());

        // IDs may be reused after disconnect
        assert!(registry.register("u1".into(), "Alice", sink()).is_ok());
    }

    #[test]
    fn test_all_snapshot() {
        let mut registry = ConnectionRegistry::new();
        registry.register("u1".into(), "Alice", sink()).unwrap();
        registry.register("u2".into(), "Bob", sink()).unwrap();

        let mut names: Vec<&str> = registry.all().iter().map(|s| s.display_name()).collect();
        names.sort_unstable();
        assert_eq!(names, ["Alice", "Bob"]);
    }
}
