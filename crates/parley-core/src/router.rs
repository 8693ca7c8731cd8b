//! Routing of inbound client messages.
//!
//! The router interprets one decoded [`ClientMessage`] from a live sender,
//! applies any membership change, and delivers the resulting messages.

use crate::broadcaster::{Broadcaster, Recipients};
use crate::error::HubError;
use crate::group::GroupManager;
use crate::registry::ConnectionRegistry;
use crate::session::ConnectionId;
use parley_protocol::{ClientMessage, ServerMessage};
use tracing::{debug, warn};

/// Result of routing one message.
#[derive(Debug)]
pub enum RouteOutcome {
    /// The message took effect; `delivered` counts the outbound deliveries.
    Routed { delivered: usize },
    /// The message was refused and an `error` was sent to the sender.
    Rejected(HubError),
    /// The sender is not a live connection; nothing was delivered.
    UnknownSender,
}

/// Interprets inbound messages against the registry and group tables.
pub struct MessageRouter<'a> {
    registry: &'a ConnectionRegistry,
    groups: &'a mut GroupManager,
}

impl<'a> MessageRouter<'a> {
    /// Create a router over the given tables.
    #[must_use]
    pub fn new(registry: &'a ConnectionRegistry, groups: &'a mut GroupManager) -> Self {
        Self { registry, groups }
    }

    /// Route a message from `sender`.
    ///
    /// User-facing failures are reported to the sender as an `error`
    /// message and returned as [`RouteOutcome::Rejected`].
    pub fn route(&mut self, sender: &ConnectionId, message: ClientMessage) -> RouteOutcome {
        let Some(session) = self.registry.lookup(sender) else {
            warn!(connection = %sender, kind = message.kind(), "Message from unknown connection dropped");
            return RouteOutcome::UnknownSender;
        };
        let sender_name = session.display_name().to_string();

        debug!(connection = %sender, kind = message.kind(), "Routing message");

        let result = match message {
            ClientMessage::Group { group, content } => {
                self.send_to_group(sender, &sender_name, group, content)
            }
            ClientMessage::Individual { target_id, content } => {
                self.send_direct(sender, &sender_name, target_id.into(), content)
            }
            ClientMessage::CreateGroup { group } => self.create_group(sender, &group),
            ClientMessage::JoinGroup { group } => self.join_group(sender, &sender_name, &group),
        };

        match result {
            Ok(delivered) => RouteOutcome::Routed { delivered },
            Err(err) => {
                debug!(connection = %sender, error = %err, "Message rejected");
                self.broadcaster().deliver(
                    Broadcaster::error_notice(err.to_string()),
                    Recipients::One(sender),
                );
                RouteOutcome::Rejected(err)
            }
        }
    }

    fn broadcaster(&self) -> Broadcaster<'_> {
        Broadcaster::new(self.registry, &*self.groups)
    }

    fn send_to_group(
        &self,
        sender: &ConnectionId,
        sender_name: &str,
        group: String,
        content: String,
    ) -> Result<usize, HubError> {
        let members = match self.groups.members(&group) {
            Some(members) if members.contains(sender) => members,
            _ => return Err(HubError::NotAGroupMember(group)),
        };

        let message = ServerMessage::Group {
            group,
            from: sender_name.to_string(),
            content,
        };
        Ok(self.broadcaster().deliver(message, Recipients::Many(&members)))
    }

    fn send_direct(
        &self,
        sender: &ConnectionId,
        sender_name: &str,
        target: ConnectionId,
        content: String,
    ) -> Result<usize, HubError> {
        if !self.registry.contains(&target) {
            return Err(HubError::TargetNotFound(target));
        }

        let message = ServerMessage::Individual {
            from: sender_name.to_string(),
            from_id: sender.to_string(),
            content,
        };
        Ok(self.broadcaster().deliver(message, Recipients::One(&target)))
    }

    fn create_group(&mut self, sender: &ConnectionId, group: &str) -> Result<usize, HubError> {
        self.groups.create_group(group, sender.clone())?;

        let broadcaster = self.broadcaster();
        let delivered = broadcaster.deliver(
            Broadcaster::system_notice(format!("You've created and joined the group {group}")),
            Recipients::One(sender),
        ) + broadcaster.deliver(broadcaster.group_snapshot(), Recipients::All);

        Ok(delivered)
    }

    fn join_group(
        &mut self,
        sender: &ConnectionId,
        sender_name: &str,
        group: &str,
    ) -> Result<usize, HubError> {
        self.groups.join_group(group, sender.clone())?;

        let members = self.groups.members(group).unwrap_or_default();
        let broadcaster = self.broadcaster();
        let delivered = broadcaster.deliver(
            Broadcaster::system_notice(format!("{sender_name} has joined the group")),
            Recipients::Many(&members),
        ) + broadcaster.deliver(
            Broadcaster::system_notice(format!("You've joined the group {group}")),
            Recipients::One(sender),
        ) + broadcaster.deliver(broadcaster.group_snapshot(), Recipients::All);

        Ok(delivered)
    }
}
