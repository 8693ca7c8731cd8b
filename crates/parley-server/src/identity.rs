//! Identity resolution for new connections.
//!
//! Clients may name themselves with `?userId=...&username=...` on the
//! upgrade request. Anything not supplied is filled from a process-wide
//! sequence. Generated IDs skip any ID the caller reports as taken, so a
//! client that picked `user_<n>` for itself does not block anonymous ones.

use parley_core::ConnectionId;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    /// Requested connection ID.
    pub user_id: Option<String>,
    /// Requested display name.
    pub username: Option<String>,
}

/// A resolved identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Connection ID.
    pub id: ConnectionId,
    /// Display name.
    pub name: String,
}

/// Assigns identities to connecting clients.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    next: AtomicU64,
}

impl IdentityResolver {
    /// Create a resolver whose sequence starts at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the identity for a connection request.
    ///
    /// `is_taken` reports IDs that are already live. Requested IDs are
    /// returned as given; generated IDs are never taken ones.
    pub fn resolve(
        &self,
        params: ConnectParams,
        is_taken: impl Fn(&ConnectionId) -> bool,
    ) -> Identity {
        let user_id = params.user_id.filter(|s| !s.trim().is_empty());
        let username = params.username.filter(|s| !s.trim().is_empty());

        match (user_id, username) {
            (Some(id), Some(name)) => Identity {
                id: id.into(),
                name,
            },
            (Some(id), None) => Identity {
                name: id.clone(),
                id: id.into(),
            },
            (None, name) => {
                let (n, id) = self.generate(is_taken);
                Identity {
                    id,
                    name: name.unwrap_or_else(|| format!("User{n}")),
                }
            }
        }
    }

    fn generate(&self, is_taken: impl Fn(&ConnectionId) -> bool) -> (u64, ConnectionId) {
        loop {
            let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
            let id = ConnectionId::new(format!("user_{n}"));
            if !is_taken(&id) {
                return (n, id);
            }
        }
    }
}
