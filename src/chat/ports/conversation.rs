//! Repository port for conversation summaries.

use crate::chat::domain::{Conversation, ConversationId, MessageId, ParticipantPair, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for conversation repository operations.
pub type ConversationRepositoryResult<T> = Result<T, ConversationRepositoryError>;

/// Conversation persistence contract.
///
/// Implementations must enforce that at most one conversation exists per
/// [`ParticipantPair`], active or not. The service's find-before-create check
/// is only an optimisation; the repository is the authoritative guard.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Stores a new conversation.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationRepositoryError::DuplicatePair`] when a
    /// conversation for the same participant pair already exists, or
    /// [`ConversationRepositoryError::DuplicateConversation`] when the
    /// identifier is taken.
    async fn store(&self, conversation: &Conversation) -> ConversationRepositoryResult<()>;

    /// Finds a conversation by identifier, regardless of its active flag.
    async fn find_by_id(
        &self,
        id: ConversationId,
    ) -> ConversationRepositoryResult<Option<Conversation>>;

    /// Finds the conversation for an unordered participant pair, regardless
    /// of its active flag.
    async fn find_by_participants(
        &self,
        participants: ParticipantPair,
    ) -> ConversationRepositoryResult<Option<Conversation>>;

    /// Lists the active conversations of `user`, most recent activity first.
    async fn list_active_for_user(
        &self,
        user: UserId,
    ) -> ConversationRepositoryResult<Vec<Conversation>>;

    /// Points the conversation summary at a newly sent message.
    ///
    /// The update is applied atomically and never moves `last_activity`
    /// backwards (see [`Conversation::record_message`]). Returns the
    /// conversation as stored after the call.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationRepositoryError::NotFound`] when the
    /// conversation does not exist.
    async fn record_message(
        &self,
        id: ConversationId,
        message_id: MessageId,
        sent_at: DateTime<Utc>,
    ) -> ConversationRepositoryResult<Conversation>;

    /// Sets the soft-delete flag and returns the updated conversation.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationRepositoryError::NotFound`] when the
    /// conversation does not exist.
    async fn set_active(
        &self,
        id: ConversationId,
        active: bool,
        at: DateTime<Utc>,
    ) -> ConversationRepositoryResult<Conversation>;
}

/// Errors returned by conversation repository implementations.
#[derive(Debug, Clone, Error)]
pub enum ConversationRepositoryError {
    /// A conversation for the participant pair already exists.
    #[error("conversation already exists for participants {} and {}", .0.low(), .0.high())]
    DuplicatePair(ParticipantPair),

    /// A conversation with the same identifier already exists.
    #[error("duplicate conversation identifier: {0}")]
    DuplicateConversation(ConversationId),

    /// The conversation was not found.
    #[error("conversation not found: {0}")]
    NotFound(ConversationId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ConversationRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
