//! Map from user identity to the connection that receives that user's
//! pushes.

use super::{ConnectionId, ServerFrame};
use crate::chat::domain::UserId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Push endpoint of one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::Sender<ServerFrame>,
}

impl ConnectionHandle {
    /// Pairs a connection identifier with its outbound queue.
    #[must_use]
    pub const fn new(id: ConnectionId, sender: mpsc::Sender<ServerFrame>) -> Self {
        Self { id, sender }
    }

    /// Returns the connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Shared registry holding at most one connection per user.
///
/// Registering again for a user replaces the previous handle. The lock is
/// never held across an `.await`; delivery uses a non-blocking send so a slow
/// socket cannot stall dispatch to anyone else.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    entries: Arc<RwLock<HashMap<UserId, ConnectionHandle>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `handle` the push target for `user`, returning the handle it
    /// replaced.
    #[must_use = "a replaced handle should be logged or closed"]
    pub fn register(&self, user: UserId, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user, handle)
    }

    /// Removes the entry for `user` only if it still belongs to
    /// `connection`. Returns `true` when an entry was removed.
    #[must_use]
    pub fn unregister(&self, user: UserId, connection: ConnectionId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&user) {
            Some(handle) if handle.id == connection => {
                entries.remove(&user);
                true
            }
            _ => false,
        }
    }

    /// Returns the connection currently registered for `user`.
    #[must_use]
    pub fn connection_for(&self, user: UserId) -> Option<ConnectionId> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user)
            .map(ConnectionHandle::id)
    }

    /// Returns `true` when `user` has a registered connection.
    #[must_use]
    pub fn is_connected(&self, user: UserId) -> bool {
        self.connection_for(user).is_some()
    }

    /// Returns the number of connected users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when nobody is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes `frame` to `user` if connected.
    ///
    /// Best effort: returns `false` when the user is offline, the queue is
    /// full, or the socket writer has gone away.
    #[must_use]
    pub fn deliver(&self, user: UserId, frame: ServerFrame) -> bool {
        let handle = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user)
            .cloned();
        let Some(handle) = handle else {
            debug!(%user, frame = frame.kind(), "recipient offline; push dropped");
            return false;
        };
        match handle.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                warn!(%user, connection_id = %handle.id, frame = frame.kind(), "outbound queue full; push dropped");
                false
            }
            Err(TrySendError::Closed(frame)) => {
                debug!(%user, connection_id = %handle.id, frame = frame.kind(), "connection closed; push dropped");
                false
            }
        }
    }
}
