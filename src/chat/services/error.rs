//! Error taxonomy for chat service operations.

use crate::chat::{
    domain::{ChatDomainError, ConversationId, MessageId, UserId},
    ports::{ConversationRepositoryError, DirectoryError, MessageRepositoryError},
};
use std::fmt;
use thiserror::Error;

/// The kind of record a [`ChatError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// A user unknown to the directory.
    User(UserId),
    /// A conversation that does not exist, is soft-deleted, or does not
    /// include the requester.
    Conversation(ConversationId),
    /// A message that does not exist or belongs to a conversation the
    /// requester cannot see.
    Message(MessageId),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {id}"),
            Self::Conversation(id) => write!(f, "conversation {id}"),
            Self::Message(id) => write!(f, "message {id}"),
        }
    }
}

/// Errors returned by chat service operations.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// Caller input failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ChatDomainError),

    /// The referenced record is absent or hidden from the requester.
    #[error("{0} not found")]
    NotFound(Resource),

    /// A store or the directory failed or exceeded its deadline.
    #[error("{operation} unavailable: {reason}")]
    Unavailable {
        /// The operation that failed.
        operation: &'static str,
        /// Description of the underlying failure.
        reason: String,
    },
}

impl ChatError {
    /// Builds a [`ChatError::Unavailable`] from any displayable failure.
    #[must_use]
    pub fn unavailable(operation: &'static str, reason: &impl fmt::Display) -> Self {
        Self::Unavailable {
            operation,
            reason: reason.to_string(),
        }
    }

    /// Returns `true` when retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns a stable machine-readable code for wire responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

impl From<ConversationRepositoryError> for ChatError {
    fn from(err: ConversationRepositoryError) -> Self {
        match err {
            ConversationRepositoryError::NotFound(id) => Self::NotFound(Resource::Conversation(id)),
            other => Self::unavailable("conversation store", &other),
        }
    }
}

impl From<MessageRepositoryError> for ChatError {
    fn from(err: MessageRepositoryError) -> Self {
        Self::unavailable("message store", &err)
    }
}

impl From<DirectoryError> for ChatError {
    fn from(err: DirectoryError) -> Self {
        Self::unavailable("user directory", &err)
    }
}

/// Result type for chat service operations.
pub type ChatResult<T> = Result<T, ChatError>;
