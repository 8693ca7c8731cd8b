//! # parley-protocol
//!
//! Wire message definitions for the Parley chat hub.
//!
//! Messages are JSON objects carried in WebSocket text frames. The `type`
//! field selects the variant in both directions.
//!
//! ## Client Messages
//!
//! - `group` - Post to a group the sender belongs to
//! - `individual` - Send directly to one connection
//! - `createGroup` / `joinGroup` - Group membership
//!
//! ## Server Messages
//!
//! - `system` / `error` - Notices for the receiving client
//! - `userList` / `groupList` - Directory and group snapshots
//! - `userJoined` / `userLeft` - Presence events
//! - `group` / `individual` - Routed chat messages
//!
//! ## Example
//!
//! ```rust
//! use parley_protocol::{codec, ClientMessage, ServerMessage};
//!
//! let msg = codec::decode(r#"{"type":"joinGroup","group":"rust"}"#).unwrap();
//! assert_eq!(msg, ClientMessage::join_group("rust"));
//!
//! let text = codec::encode(&ServerMessage::system("You've joined the group rust")).unwrap();
//! assert!(text.starts_with(r#"{"type":"system""#));
//! ```

pub mod codec;
pub mod messages;

pub use codec::{decode, encode, ProtocolError};
pub use messages::{ClientMessage, GroupEntry, ServerMessage, UserEntry};
