//! Named groups and their membership.
//!
//! Groups are named sets of connections that receive group-addressed
//! messages. One default group always exists and every live connection
//! belongs to it.

use crate::error::HubError;
use crate::session::ConnectionId;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Maximum group name length.
pub const MAX_GROUP_NAME_LENGTH: usize = 64;

/// Name of the default group.
pub const DEFAULT_GROUP: &str = "general";

/// Validate a group name.
///
/// # Errors
///
/// Returns an error message if the group name is invalid.
pub fn validate_group_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("Group name cannot be empty");
    }
    if name.len() > MAX_GROUP_NAME_LENGTH {
        return Err("Group name too long");
    }
    if name.chars().any(char::is_control) {
        return Err("Group name contains invalid characters");
    }
    Ok(())
}

/// A named group.
#[derive(Debug, Clone)]
pub struct Group {
    name: String,
    members: HashSet<ConnectionId>,
}

impl Group {
    /// Create an empty group.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: HashSet::new(),
        }
    }

    /// Get the group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if a connection is a member.
    #[must_use]
    pub fn is_member(&self, id: &ConnectionId) -> bool {
        self.members.contains(id)
    }

    /// Add a member.
    ///
    /// Returns `true` if the connection was not already a member.
    pub fn add(&mut self, id: ConnectionId) -> bool {
        self.members.insert(id)
    }

    /// Remove a member.
    ///
    /// Returns `true` if the connection was a member.
    pub fn remove(&mut self, id: &ConnectionId) -> bool {
        self.members.remove(id)
    }

    /// Member IDs in sorted order.
    #[must_use]
    pub fn members(&self) -> Vec<ConnectionId> {
        let mut members: Vec<ConnectionId> = self.members.iter().cloned().collect();
        members.sort_unstable();
        members
    }

    /// Check if the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Owns every group, keyed by name.
#[derive(Debug)]
pub struct GroupManager {
    groups: BTreeMap<String, Group>,
    default_group: String,
    max_groups: usize,
}

impl GroupManager {
    /// Create a manager holding only the default group.
    #[must_use]
    pub fn new(default_group: impl Into<String>, max_groups: usize) -> Self {
        let default_group = default_group.into();
        let mut groups = BTreeMap::new();
        groups.insert(default_group.clone(), Group::new(default_group.clone()));

        Self {
            groups,
            default_group,
            max_groups,
        }
    }

    /// Name of the default group.
    #[must_use]
    pub fn default_group(&self) -> &str {
        &self.default_group
    }

    /// Number of groups, including the default group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Always `false`: the default group cannot be removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Check if a group exists.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// Look up a group.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Create a group whose sole member is `creator`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or taken, or the group limit
    /// is reached.
    pub fn create_group(&mut self, name: &str, creator: ConnectionId) -> Result<(), HubError> {
        validate_group_name(name).map_err(HubError::InvalidGroupName)?;

        if self.groups.contains_key(name) {
            return Err(HubError::GroupAlreadyExists(name.to_string()));
        }
        if self.groups.len() >= self.max_groups {
            return Err(HubError::MaxGroupsReached);
        }

        let mut group = Group::new(name);
        group.add(creator.clone());
        self.groups.insert(name.to_string(), group);

        debug!(group = %name, creator = %creator, "Group created");
        Ok(())
    }

    /// Add a connection to an existing group.
    ///
    /// Returns `true` if the connection was not already a member.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::GroupNotFound`] if the group does not exist.
    pub fn join_group(&mut self, name: &str, id: ConnectionId) -> Result<bool, HubError> {
        let group = self
            .groups
            .get_mut(name)
            .ok_or_else(|| HubError::GroupNotFound(name.to_string()))?;

        let added = group.add(id.clone());
        if added {
            debug!(group = %name, connection = %id, members = group.member_count(), "Joined group");
        }
        Ok(added)
    }

    /// Remove a connection from every group.
    ///
    /// Returns the names of the groups it was removed from.
    pub fn leave_all(&mut self, id: &ConnectionId) -> Vec<String> {
        let left: Vec<String> = self
            .groups
            .values_mut()
            .filter_map(|group| group.remove(id).then(|| group.name().to_string()))
            .collect();

        debug!(connection = %id, groups = left.len(), "Left all groups");
        left
    }

    /// Check if a connection is a member of a group.
    #[must_use]
    pub fn is_member(&self, name: &str, id: &ConnectionId) -> bool {
        self.groups
            .get(name)
            .map(|g| g.is_member(id))
            .unwrap_or(false)
    }

    /// Members of a group, if it exists.
    #[must_use]
    pub fn members(&self, name: &str) -> Option<Vec<ConnectionId>> {
        self.groups.get(name).map(Group::members)
    }

    /// Snapshot of every group and its sorted members, ordered by name.
    #[must_use]
    pub fn list_groups(&self) -> Vec<(String, Vec<ConnectionId>)> {
        self.groups
            .values()
            .map(|g| (g.name().to_string(), g.members()))
            .collect()
    }

    /// Remove empty groups other than the default group.
    ///
    /// Returns the names of the removed groups.
    pub fn prune_empty(&mut self) -> Vec<String> {
        let empty: Vec<String> = self
            .groups
            .values()
            .filter(|g| g.is_empty() && g.name() != self.default_group)
            .map(|g| g.name().to_string())
            .collect();

        for name in &empty {
            self.groups.remove(name);
            debug!(group = %name, "Deleted empty group");
        }

        empty
    }
}
