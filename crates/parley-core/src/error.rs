//! Hub errors.

use crate::session::ConnectionId;
use thiserror::Error;

/// Errors raised while processing hub events.
///
/// Except for [`HubError::DuplicateConnection`], every variant is reported
/// back to the originating connection as an `error` message; the `Display`
/// text is what that client sees.
#[derive(Debug, Error)]
pub enum HubError {
    /// A connection with this ID is already live.
    #[error("Connection already registered: {0}")]
    DuplicateConnection(ConnectionId),

    /// Group name is taken.
    #[error("Group {0} already exists")]
    GroupAlreadyExists(String),

    /// Group does not exist.
    #[error("Group {0} does not exist")]
    GroupNotFound(String),

    /// Sender is not a member of the target group.
    #[error("You are not a member of the group {0}")]
    NotAGroupMember(String),

    /// Direct message target is not connected.
    #[error("User not found or offline")]
    TargetNotFound(ConnectionId),

    /// Invalid group name.
    #[error("Invalid group name: {0}")]
    InvalidGroupName(&'static str),

    /// Maximum number of groups reached.
    #[error("Maximum number of groups reached")]
    MaxGroupsReached,
}

impl HubError {
    /// Short label for metrics and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            HubError::DuplicateConnection(_) => "duplicate_connection",
            HubError::GroupAlreadyExists(_) => "group_already_exists",
            HubError::GroupNotFound(_) => "group_not_found",
            HubError::NotAGroupMember(_) => "not_a_group_member",
            HubError::TargetNotFound(_) => "target_not_found",
            HubError::InvalidGroupName(_) => "invalid_group_name",
            HubError::MaxGroupsReached => "max_groups_reached",
        }
    }
}
