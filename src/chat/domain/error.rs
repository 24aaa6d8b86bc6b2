//! Error types for chat domain validation and parsing.

use super::UserId;
use thiserror::Error;

/// Errors returned while constructing chat domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatDomainError {
    /// Both sides of a participant pair are the same user.
    #[error("a conversation needs two distinct participants, got {0} twice")]
    SameParticipant(UserId),

    /// Message content is empty after trimming.
    #[error("message content must not be empty")]
    EmptyContent,

    /// Message content exceeds the configured bound.
    #[error("message content has {actual} characters, exceeds limit of {max}")]
    ContentTooLong {
        /// Characters in the rejected content.
        actual: usize,
        /// Configured maximum.
        max: usize,
    },

    /// An image or file message arrived without a media URL.
    #[error("{0} messages require a media URL")]
    MissingMediaUrl(&'static str),

    /// A text message carried a media URL.
    #[error("text messages must not carry a media URL")]
    UnexpectedMediaUrl,
}

/// Error returned while parsing a message kind from a wire or storage value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown message type: {0}")]
pub struct ParseMessageKindError(pub String);
