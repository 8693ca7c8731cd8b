//! Outbound notifications and their delivery.
//!
//! The broadcaster reads the registry and group tables to build snapshot
//! and presence messages, and hands messages to session sinks.

use crate::group::GroupManager;
use crate::registry::ConnectionRegistry;
use crate::session::{ConnectionId, Session};
use parley_protocol::{GroupEntry, ServerMessage, UserEntry};
use std::sync::Arc;
use tracing::{trace, warn};

/// Who a message is delivered to.
#[derive(Debug, Clone, Copy)]
pub enum Recipients<'a> {
    /// A single connection.
    One(&'a ConnectionId),
    /// A set of connections.
    Many(&'a [ConnectionId]),
    /// Every live connection.
    All,
}

/// Builds and delivers outbound messages.
pub struct Broadcaster<'a> {
    registry: &'a ConnectionRegistry,
    groups: &'a GroupManager,
}

impl<'a> Broadcaster<'a> {
    /// Create a broadcaster over the given tables.
    #[must_use]
    pub fn new(registry: &'a ConnectionRegistry, groups: &'a GroupManager) -> Self {
        Self { registry, groups }
    }

    /// List of every live session.
    #[must_use]
    pub fn directory_snapshot(&self) -> ServerMessage {
        let mut users: Vec<UserEntry> = self
            .registry
            .all()
            .into_iter()
            .map(|s| UserEntry {
                user_id: s.id().to_string(),
                username: s.display_name().to_string(),
            })
            .collect();
        users.sort_unstable_by(|a, b| a.user_id.cmp(&b.user_id));

        ServerMessage::UserList { users }
    }

    /// List of every group and its members.
    #[must_use]
    pub fn group_snapshot(&self) -> ServerMessage {
        let groups = self
            .groups
            .list_groups()
            .into_iter()
            .map(|(name, members)| GroupEntry {
                name,
                members: members.into_iter().map(String::from).collect(),
            })
            .collect();

        ServerMessage::GroupList { groups }
    }

    /// A `system` notice.
    #[must_use]
    pub fn system_notice(text: impl Into<String>) -> ServerMessage {
        ServerMessage::system(text)
    }

    /// An `error` notice.
    #[must_use]
    pub fn error_notice(text: impl Into<String>) -> ServerMessage {
        ServerMessage::error(text)
    }

    /// Presence event for a session that came online.
    #[must_use]
    pub fn user_joined(session: &Session) -> ServerMessage {
        ServerMessage::UserJoined {
            user_id: session.id().to_string(),
            username: session.display_name().to_string(),
        }
    }

    /// Presence event for a session that went offline.
    #[must_use]
    pub fn user_left(session: &Session) -> ServerMessage {
        ServerMessage::UserLeft {
            user_id: session.id().to_string(),
            username: session.display_name().to_string(),
        }
    }

    /// Deliver a message to its recipients.
    ///
    /// Delivery is fire-and-forget: a recipient that is not live or whose
    /// sink fails is skipped, and the rest still receive the message.
    ///
    /// Returns the number of sessions the message was handed to.
    pub fn deliver(&self, message: ServerMessage, to: Recipients<'_>) -> usize {
        let message = Arc::new(message);

        let delivered = match to {
            Recipients::One(id) => usize::from(self.deliver_to(id, &message)),
            Recipients::Many(ids) => ids
                .iter()
                .filter(|id| self.deliver_to(id, &message))
                .count(),
            Recipients::All => self
                .registry
                .all()
                .into_iter()
                .filter(|s| Self::deliver_session(s, &message))
                .count(),
        };

        trace!(kind = message.kind(), recipients = delivered, "Delivered message");
        delivered
    }

    fn deliver_to(&self, id: &ConnectionId, message: &Arc<ServerMessage>) -> bool {
        match self.registry.lookup(id) {
            Some(session) => Self::deliver_session(session, message),
            None => {
                warn!(connection = %id, "Delivery to unknown connection skipped");
                false
            }
        }
    }

    fn deliver_session(session: &Session, message: &Arc<ServerMessage>) -> bool {
        match session.deliver(Arc::clone(message)) {
            Ok(()) => true,
            Err(e) => {
                warn!(connection = %session.id(), error = %e, "Delivery failed");
                false
            }
        }
    }
}
