//! Message types for the Parley protocol.
//!
//! Every message is a JSON object whose `type` field selects the variant.
//! Client messages flow from a connection into the hub; server messages
//! flow from the hub out to one or more connections.

use serde::{Deserialize, Serialize};

/// Discriminant values accepted on inbound messages.
pub const CLIENT_MESSAGE_TYPES: [&str; 4] = ["group", "individual", "createGroup", "joinGroup"];

/// A message sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Broadcast to every member of a group.
    #[serde(rename = "group")]
    Group {
        /// Target group name.
        group: String,
        /// Message text.
        content: String,
    },

    /// Deliver to a single connection.
    #[serde(rename = "individual")]
    Individual {
        /// Connection ID of the recipient.
        #[serde(rename = "targetId")]
        target_id: String,
        /// Message text.
        content: String,
    },

    /// Create a new group with the sender as its first member.
    #[serde(rename = "createGroup")]
    CreateGroup {
        /// Name of the group to create.
        group: String,
    },

    /// Join an existing group.
    #[serde(rename = "joinGroup")]
    JoinGroup {
        /// Name of the group to join.
        group: String,
    },
}

impl ClientMessage {
    /// The wire discriminant of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Group { .. } => "group",
            ClientMessage::Individual { .. } => "individual",
            ClientMessage::CreateGroup { .. } => "createGroup",
            ClientMessage::JoinGroup { .. } => "joinGroup",
        }
    }

    /// Create a group message.
    #[must_use]
    pub fn group(group: impl Into<String>, content: impl Into<String>) -> Self {
        ClientMessage::Group {
            group: group.into(),
            content: content.into(),
        }
    }

    /// Create a direct message.
    #[must_use]
    pub fn individual(target_id: impl Into<String>, content: impl Into<String>) -> Self {
        ClientMessage::Individual {
            target_id: target_id.into(),
            content: content.into(),
        }
    }

    /// Create a group creation request.
    #[must_use]
    pub fn create_group(group: impl Into<String>) -> Self {
        ClientMessage::CreateGroup {
            group: group.into(),
        }
    }

    /// Create a group join request.
    #[must_use]
    pub fn join_group(group: impl Into<String>) -> Self {
        ClientMessage::JoinGroup {
            group: group.into(),
        }
    }
}

/// One entry of a directory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    /// Connection ID.
    pub user_id: String,
    /// Display name.
    pub username: String,
}

/// One entry of a group snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    /// Group name.
    pub name: String,
    /// Connection IDs of the current members.
    pub members: Vec<String>,
}

/// A message sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Informational notice.
    #[serde(rename = "system")]
    System { content: String },

    /// Failure report for the originating client.
    #[serde(rename = "error")]
    Error { content: String },

    /// Every live connection.
    #[serde(rename = "userList")]
    UserList { users: Vec<UserEntry> },

    /// Every group and its members.
    #[serde(rename = "groupList")]
    GroupList { groups: Vec<GroupEntry> },

    /// A connection came online.
    #[serde(rename = "userJoined", rename_all = "camelCase")]
    UserJoined { user_id: String, username: String },

    /// A connection went offline.
    #[serde(rename = "userLeft", rename_all = "camelCase")]
    UserLeft { user_id: String, username: String },

    /// A message posted to a group.
    #[serde(rename = "group")]
    Group {
        group: String,
        from: String,
        content: String,
    },

    /// A direct message.
    #[serde(rename = "individual")]
    Individual {
        from: String,
        #[serde(rename = "fromId")]
        from_id: String,
        content: String,
    },
}

impl ServerMessage {
    /// The wire discriminant of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::System { .. } => "system",
            ServerMessage::Error { .. } => "error",
            ServerMessage::UserList { .. } => "userList",
            ServerMessage::GroupList { .. } => "groupList",
            ServerMessage::UserJoined { .. } => "userJoined",
            ServerMessage::UserLeft { .. } => "userLeft",
            ServerMessage::Group { .. } => "group",
            ServerMessage::Individual { .. } => "individual",
        }
    }

    /// Create a system notice.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        ServerMessage::System {
            content: content.into(),
        }
    }

    /// Create an error notice.
    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        ServerMessage::Error {
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_wire_names() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "individual", "targetId": "u1", "content": "hey"}))
                .unwrap();
        assert_eq!(msg, ClientMessage::individual("u1", "hey"));
        assert_eq!(msg.kind(), "individual");

        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "createGroup", "group": "rust"})).unwrap();
        assert_eq!(msg, ClientMessage::create_group("rust"));
    }

    #[test]
    fn test_kinds_cover_discriminants() {
        let messages = [
            ClientMessage::group("g", "c"),
            ClientMessage::individual("u", "c"),
            ClientMessage::create_group("g"),
            ClientMessage::join_group("g"),
        ];
        let kinds: Vec<&str> = messages.iter().map(ClientMessage::kind).collect();
        assert_eq!(kinds, CLIENT_MESSAGE_TYPES);
    }

    #[test]
    fn test_server_message_shapes() {
        let joined = ServerMessage::UserJoined {
            user_id: "u2".into(),
            username: "Bob".into(),
        };
        assert_eq!(
            serde_json::to_value(&joined).unwrap(),
            json!({"type": "userJoined", "userId": "u2", "username": "Bob"})
        );

        let direct = ServerMessage::Individual {
            from: "Bob".into(),
            from_id: "u2".into(),
            content: "hey".into(),
        };
        assert_eq!(
            serde_json::to_value(&direct).unwrap(),
            json!({"type": "individual", "from": "Bob", "fromId": "u2", "content": "hey"})
        );

        let users = ServerMessage::UserList {
            users: vec![UserEntry {
                user_id: "u1".into(),
                username: "Alice".into(),
            }],
        };
        assert_eq!(
            serde_json::to_value(&users).unwrap(),
            json!({"type": "userList", "users": [{"userId": "u1", "username": "Alice"}]})
        );
    }
}
