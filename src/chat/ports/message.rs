//! Repository port for messages and their read state.

use crate::chat::domain::{ConversationId, Message, MessageId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for message repository operations.
pub type MessageRepositoryResult<T> = Result<T, MessageRepositoryError>;

/// A window over a conversation's messages, counted from the most recent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Maximum number of messages to return.
    pub limit: usize,
    /// Number of most recent messages to skip.
    pub offset: usize,
}

impl PageRequest {
    /// Creates a page request.
    #[must_use]
    pub const fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }
}

/// Message persistence contract.
///
/// Read-state updates must be conditional and atomic: a message transitions
/// to read at most once, and only for a reader who is not its sender.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Stores a new message.
    ///
    /// # Errors
    ///
    /// Returns [`MessageRepositoryError::DuplicateMessage`] when the
    /// identifier is taken.
    async fn store(&self, message: &Message) -> MessageRepositoryResult<()>;

    /// Finds a message by identifier.
    async fn find_by_id(&self, id: MessageId) -> MessageRepositoryResult<Option<Message>>;

    /// Returns one page of a conversation's messages, newest first.
    async fn page_newest_first(
        &self,
        conversation_id: ConversationId,
        page: PageRequest,
    ) -> MessageRepositoryResult<Vec<Message>>;

    /// Marks a message read for `reader` if it is unread and `reader` did not
    /// author it.
    ///
    /// Returns the updated message when this call performed the transition,
    /// or `None` when there was nothing to do.
    async fn mark_read(
        &self,
        id: MessageId,
        reader: UserId,
        read_at: DateTime<Utc>,
    ) -> MessageRepositoryResult<Option<Message>>;

    /// Marks every message in the conversation that is unread for `reader`
    /// as read, returning exactly the messages this call transitioned.
    async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        read_at: DateTime<Utc>,
    ) -> MessageRepositoryResult<Vec<Message>>;

    /// Counts messages in the given conversations that `reader` did not
    /// author and has not read.
    async fn count_unread(
        &self,
        conversation_ids: &[ConversationId],
        reader: UserId,
    ) -> MessageRepositoryResult<u64>;
}

/// Errors returned by message repository implementations.
#[derive(Debug, Clone, Error)]
pub enum MessageRepositoryError {
    /// A message with the same identifier already exists.
    #[error("duplicate message identifier: {0}")]
    DuplicateMessage(MessageId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl MessageRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
