//! Error types for the realtime gateway.

use super::ConnectionPhase;
use thiserror::Error;

/// Errors raised while accepting, driving, or writing to a connection.
///
/// None of these abort delivery to other connections; the gateway logs them
/// and carries on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The handshake credential was missing or rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The identity provider or directory could not be reached in time.
    #[error("identity provider unavailable: {0}")]
    IdentityUnavailable(String),

    /// A connection attempted a transition its current phase forbids.
    #[error("connection cannot move from {from} to {to}")]
    InvalidTransition {
        /// Phase before the attempted transition.
        from: ConnectionPhase,
        /// Requested phase.
        to: ConnectionPhase,
    },

    /// An inbound frame could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The underlying socket failed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Wraps a socket-level failure.
    #[must_use]
    pub fn transport(err: &impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Returns a stable machine-readable code for error frames.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::IdentityUnavailable(_) => "unavailable",
            Self::InvalidTransition { .. } => "invalid_state",
            Self::Protocol(_) => "protocol",
            Self::Transport(_) => "transport",
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
