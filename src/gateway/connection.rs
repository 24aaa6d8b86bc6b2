//! Per-connection lifecycle.

use super::{GatewayError, GatewayResult, ServerFrame};
use crate::chat::domain::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Identifies one socket, distinguishing successive connections of the same
/// user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Creates a new random connection identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle phase of a connection.
///
/// ```text
/// Connecting -> Authenticated -> Active -> Disconnected
///      \______________\____________________/
/// ```
///
/// Every phase may move to `Disconnected`; `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    /// Handshake received, credential not yet verified.
    Connecting,
    /// Credential verified, not yet registered for pushes.
    Authenticated,
    /// Registered and accepting frames.
    Active,
    /// Closed or rejected.
    Disconnected,
}

impl ConnectionPhase {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Authenticated => "authenticated",
            Self::Active => "active",
            Self::Disconnected => "disconnected",
        }
    }

    /// Returns `true` when moving from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Authenticated)
                | (Self::Authenticated, Self::Active)
                | (
                    Self::Connecting | Self::Authenticated | Self::Active,
                    Self::Disconnected
                )
        )
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway-side state for one socket.
///
/// The session owns a sender into the connection's outbound queue, used for
/// replies to the connection's own requests. Pushes from other users travel
/// through the registry's copy of the same sender.
#[derive(Debug)]
pub struct Session {
    connection_id: ConnectionId,
    phase: ConnectionPhase,
    user_id: Option<UserId>,
    user_name: Option<String>,
    sender: mpsc::Sender<ServerFrame>,
}

impl Session {
    /// Starts a session in [`ConnectionPhase::Connecting`].
    #[must_use]
    pub fn connecting(sender: mpsc::Sender<ServerFrame>) -> Self {
        Self {
            connection_id: ConnectionId::new(),
            phase: ConnectionPhase::Connecting,
            user_id: None,
            user_name: None,
            sender,
        }
    }

    /// Returns the connection identifier.
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Returns the verified identity, once authenticated.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Returns the display name shown in typing notifications.
    #[must_use]
    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    /// Returns a sender into this connection's outbound queue.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<ServerFrame> {
        self.sender.clone()
    }

    /// Records the verified identity and moves to
    /// [`ConnectionPhase::Authenticated`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidTransition`] unless the session is
    /// still connecting.
    pub fn authenticate(&mut self, user_id: UserId, user_name: Option<String>) -> GatewayResult<()> {
        self.transition(ConnectionPhase::Authenticated)?;
        self.user_id = Some(user_id);
        self.user_name = user_name;
        Ok(())
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidTransition`] when the phase machine
    /// forbids the move.
    pub fn transition(&mut self, next: ConnectionPhase) -> GatewayResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(GatewayError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        debug!(connection_id = %self.connection_id, from = %self.phase, to = %next, "connection phase changed");
        self.phase = next;
        Ok(())
    }

    /// Returns the identity of an active session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidTransition`] towards
    /// [`ConnectionPhase::Active`] when the session is not active.
    pub fn active_user(&self) -> GatewayResult<UserId> {
        match (self.phase, self.user_id) {
            (ConnectionPhase::Active, Some(user_id)) => Ok(user_id),
            _ => Err(GatewayError::InvalidTransition {
                from: self.phase,
                to: ConnectionPhase::Active,
            }),
        }
    }

    /// Queues a reply for this connection, waiting for queue space. The
    /// reply is dropped when the socket writer has already gone away.
    pub async fn reply(&self, frame: ServerFrame) {
        if self.sender.send(frame).await.is_err() {
            debug!(connection_id = %self.connection_id, "reply dropped; writer closed");
        }
    }
}
