//! In-memory conversation repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::chat::{
    domain::{Conversation, ConversationId, MessageId, ParticipantPair, UserId},
    ports::{ConversationRepository, ConversationRepositoryError, ConversationRepositoryResult},
};

/// Thread-safe in-memory conversation repository.
///
/// Pair uniqueness is checked and the pair index updated under one write
/// lock, so concurrent `store` calls for the same pair cannot both succeed.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationRepository {
    state: Arc<RwLock<InMemoryConversationState>>,
}

#[derive(Debug, Default)]
struct InMemoryConversationState {
    conversations: HashMap<ConversationId, Conversation>,
    pair_index: HashMap<ParticipantPair, ConversationId>,
}

impl InMemoryConversationRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored conversations, active or not.
    ///
    /// Returns `0` if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .read()
            .map(|state| state.conversations.len())
            .unwrap_or(0)
    }

    /// Returns `true` if no conversations are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> ConversationRepositoryResult<RwLockReadGuard<'_, InMemoryConversationState>> {
        self.state.read().map_err(|err| {
            ConversationRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(
        &self,
    ) -> ConversationRepositoryResult<RwLockWriteGuard<'_, InMemoryConversationState>> {
        self.state.write().map_err(|err| {
            ConversationRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn store(&self, conversation: &Conversation) -> ConversationRepositoryResult<()> {
        let mut state = self.write()?;
        if state.conversations.contains_key(&conversation.id()) {
            return Err(ConversationRepositoryError::DuplicateConversation(
                conversation.id(),
            ));
        }
        let pair = conversation.participants();
        if state.pair_index.contains_key(&pair) {
            return Err(ConversationRepositoryError::DuplicatePair(pair));
        }

        state.pair_index.insert(pair, conversation.id());
        state
            .conversations
            .insert(conversation.id(), conversation.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: ConversationId,
    ) -> ConversationRepositoryResult<Option<Conversation>> {
        let state = self.read()?;
        Ok(state.conversations.get(&id).cloned())
    }

    async fn find_by_participants(
        &self,
        participants: ParticipantPair,
    ) -> ConversationRepositoryResult<Option<Conversation>> {
        let state = self.read()?;
        Ok(state
            .pair_index
            .get(&participants)
            .and_then(|id| state.conversations.get(id))
            .cloned())
    }

    async fn list_active_for_user(
        &self,
        user: UserId,
    ) -> ConversationRepositoryResult<Vec<Conversation>> {
        let state = self.read()?;
        let mut conversations: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|conversation| conversation.is_active() && conversation.includes(user))
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
        Ok(conversations)
    }

    async fn record_message(
        &self,
        id: ConversationId,
        message_id: MessageId,
        sent_at: DateTime<Utc>,
    ) -> ConversationRepositoryResult<Conversation> {
        let mut state = self.write()?;
        let conversation = state
            .conversations
            .get_mut(&id)
            .ok_or(ConversationRepositoryError::NotFound(id))?;
        conversation.record_message(message_id, sent_at);
        Ok(conversation.clone())
    }

    async fn set_active(
        &self,
        id: ConversationId,
        active: bool,
        at: DateTime<Utc>,
    ) -> ConversationRepositoryResult<Conversation> {
        let mut state = self.write()?;
        let conversation = state
            .conversations
            .get_mut(&id)
            .ok_or(ConversationRepositoryError::NotFound(id))?;
        conversation.set_active(active, at);
        Ok(conversation.clone())
    }
}
