//! Sessions and their send capability.
//!
//! A session is one live connection: its identifier, its display name and
//! the sink the hub pushes outbound messages into.

use parley_protocol::ServerMessage;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Unique identifier for a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a new connection ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<ConnectionId> for String {
    fn from(id: ConnectionId) -> Self {
        id.0
    }
}

/// Failure to hand a message to a session.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The receiving side of the session has gone away.
    #[error("Session closed")]
    Closed,
}

/// Send capability of a session.
///
/// Implementations must not block: delivery is a local enqueue and the hub
/// never waits on a peer.
pub trait SessionSink: Send + Sync {
    /// Enqueue a message for the session.
    fn deliver(&self, message: Arc<ServerMessage>) -> Result<(), DeliveryError>;
}

impl SessionSink for mpsc::UnboundedSender<Arc<ServerMessage>> {
    fn deliver(&self, message: Arc<ServerMessage>) -> Result<(), DeliveryError> {
        self.send(message).map_err(|_| DeliveryError::Closed)
    }
}

/// One live connection.
pub struct Session {
    id: ConnectionId,
    display_name: String,
    sink: Box<dyn SessionSink>,
}

impl Session {
    /// Create a new session.
    #[must_use]
    pub fn new(
        id: ConnectionId,
        display_name: impl Into<String>,
        sink: Box<dyn SessionSink>,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            sink,
        }
    }

    /// Get the connection ID.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Get the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Hand a message to this session's sink.
    pub fn deliver(&self, message: Arc<ServerMessage>) -> Result<(), DeliveryError> {
        self.sink.deliver(message)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}
