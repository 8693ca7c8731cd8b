//! The hub: connection lifecycle and event processing.
//!
//! A [`Hub`] owns one [`ConnectionRegistry`] and one [`GroupManager`] and
//! processes transport events one at a time through `&mut self`. Callers
//! that share a hub between tasks must serialize access (the server keeps it
//! behind a mutex), which also makes every snapshot consistent with the
//! mutation that preceded it.

use crate::broadcaster::{Broadcaster, Recipients};
use crate::error::HubError;
use crate::group::{GroupManager, DEFAULT_GROUP};
use crate::registry::ConnectionRegistry;
use crate::router::{MessageRouter, RouteOutcome};
use crate::session::{ConnectionId, SessionSink};
use parley_protocol::{ClientMessage, ProtocolError};
use tracing::{debug, info, warn};

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Name of the group every connection joins.
    pub default_group: String,
    /// Maximum number of groups, including the default group.
    pub max_groups: usize,
    /// Whether to delete empty groups (other than the default) on disconnect.
    pub prune_empty_groups: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            default_group: DEFAULT_GROUP.to_string(),
            max_groups: 10_000,
            prune_empty_groups: false,
        }
    }
}

/// Hub statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Number of live connections.
    pub connection_count: usize,
    /// Number of groups.
    pub group_count: usize,
}

/// The message hub.
#[derive(Debug)]
pub struct Hub {
    registry: ConnectionRegistry,
    groups: GroupManager,
    config: HubConfig,
}

impl Hub {
    /// Create a new hub with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new hub with custom configuration.
    #[must_use]
    pub fn with_config(config: HubConfig) -> Self {
        info!("Creating hub with config: {:?}", config);
        Self {
            registry: ConnectionRegistry::new(),
            groups: GroupManager::new(config.default_group.clone(), config.max_groups),
            config,
        }
    }

    /// Get hub statistics.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            connection_count: self.registry.len(),
            group_count: self.groups.len(),
        }
    }

    /// The connection registry.
    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// The group table.
    #[must_use]
    pub fn groups(&self) -> &GroupManager {
        &self.groups
    }

    fn broadcaster(&self) -> Broadcaster<'_> {
        Broadcaster::new(&self.registry, &self.groups)
    }

    /// Open a connection.
    ///
    /// Registers the session, adds it to the default group and sends the
    /// welcome, snapshot and presence messages.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::DuplicateConnection`] if the ID is already live;
    /// the hub is left unchanged.
    pub fn connect(
        &mut self,
        id: ConnectionId,
        display_name: impl Into<String>,
        sink: Box<dyn SessionSink>,
    ) -> Result<(), HubError> {
        let display_name = display_name.into();
        self.registry
            .register(id.clone(), display_name.clone(), sink)?;

        let default_group = self.groups.default_group().to_string();
        self.groups.join_group(&default_group, id.clone())?;

        let members = self.groups.members(&default_group).unwrap_or_default();
        let broadcaster = self.broadcaster();

        broadcaster.deliver(
            Broadcaster::system_notice(format!(
                "{display_name} has joined the {default_group} chat"
            )),
            Recipients::Many(&members),
        );
        broadcaster.deliver(
            Broadcaster::system_notice(format!(
                "Welcome, {display_name}! You've been added to the {default_group} chat."
            )),
            Recipients::One(&id),
        );
        broadcaster.deliver(broadcaster.directory_snapshot(), Recipients::All);
        broadcaster.deliver(broadcaster.group_snapshot(), Recipients::One(&id));
        if let Some(session) = self.registry.lookup(&id) {
            broadcaster.deliver(Broadcaster::user_joined(session), Recipients::All);
        }

        info!(connection = %id, name = %display_name, connections = self.registry.len(), "Connection opened");
        Ok(())
    }

    /// Route a decoded message from a connection.
    pub fn handle_message(&mut self, sender: &ConnectionId, message: ClientMessage) -> RouteOutcome {
        MessageRouter::new(&self.registry, &mut self.groups).route(sender, message)
    }

    /// Report an undecodable message back to its sender.
    ///
    /// Returns `false` if the sender is not a live connection.
    pub fn reject_message(&self, sender: &ConnectionId, error: &ProtocolError) -> bool {
        if !self.registry.contains(sender) {
            warn!(connection = %sender, error = %error, "Invalid message from unknown connection");
            return false;
        }

        debug!(connection = %sender, error = %error, "Invalid message rejected");
        self.broadcaster().deliver(
            Broadcaster::error_notice(error.to_string()),
            Recipients::One(sender),
        ) == 1
    }

    /// Close a connection.
    ///
    /// Removes the session from the registry and every group, notifies the
    /// remaining members of each group it left and broadcasts the updated
    /// directory state. Unknown IDs are ignored.
    ///
    /// Returns the names of the groups the connection was removed from.
    pub fn disconnect(&mut self, id: &ConnectionId) -> Vec<String> {
        let Some(session) = self.registry.unregister(id) else {
            debug!(connection = %id, "Disconnect for unknown connection ignored");
            return Vec::new();
        };

        let left = self.groups.leave_all(id);
        if self.config.prune_empty_groups {
            self.groups.prune_empty();
        }

        let broadcaster = self.broadcaster();
        for group in &left {
            if let Some(members) = self.groups.members(group) {
                broadcaster.deliver(
                    Broadcaster::system_notice(format!(
                        "{} has left the chat",
                        session.display_name()
                    )),
                    Recipients::Many(&members),
                );
            }
        }
        broadcaster.deliver(Broadcaster::user_left(&session), Recipients::All);
        broadcaster.deliver(broadcaster.group_snapshot(), Recipients::All);

        info!(connection = %id, groups = left.len(), connections = self.registry.len(), "Connection closed");
        left
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
