//! # parley-core
//!
//! In-memory routing and membership engine for the Parley chat hub.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **ConnectionRegistry** - Live sessions keyed by connection ID
//! - **GroupManager** - Named groups and their members
//! - **MessageRouter** - Interprets client messages and picks recipients
//! - **Broadcaster** - Builds notifications and delivers them to sessions
//! - **Hub** - Owns the tables and processes connect/message/disconnect
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │  Transport  │────▶│     Hub     │────▶│ GroupManager │
//! └─────────────┘     └─────────────┘     └──────────────┘
//!        ▲                   │                    │
//!        │                   ▼                    ▼
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │ SessionSink │◀────│ Broadcaster │◀────│ MessageRouter│
//! └─────────────┘     └─────────────┘     └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use parley_core::Hub;
//! use parley_protocol::{ClientMessage, ServerMessage};
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! let mut hub = Hub::new();
//! let (tx, mut rx) = mpsc::unbounded_channel::<Arc<ServerMessage>>();
//! hub.connect("u1".into(), "Alice", Box::new(tx)).unwrap();
//!
//! hub.handle_message(&"u1".into(), ClientMessage::group("general", "hi"));
//! assert!(rx.try_recv().is_ok());
//! ```

pub mod broadcaster;
pub mod error;
pub mod group;
pub mod hub;
pub mod registry;
pub mod router;
pub mod session;

pub use broadcaster::{Broadcaster, Recipients};
pub use error::HubError;
pub use group::{Group, GroupManager, DEFAULT_GROUP};
pub use hub::{Hub, HubConfig, HubStats};
pub use registry::ConnectionRegistry;
pub use router::{MessageRouter, RouteOutcome};
pub use session::{ConnectionId, DeliveryError, Session, SessionSink};
