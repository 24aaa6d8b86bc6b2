//! In-memory message repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::chat::{
    domain::{ConversationId, Message, MessageId, UserId},
    ports::{MessageRepository, MessageRepositoryError, MessageRepositoryResult, PageRequest},
};

/// Thread-safe in-memory message repository.
///
/// Each conversation keeps an index ordered by `(created_at, insertion
/// order)`, so pages read back in creation order even when concurrent sends
/// are inserted out of order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageRepository {
    state: Arc<RwLock<InMemoryMessageState>>,
}

#[derive(Debug, Default)]
struct InMemoryMessageState {
    messages: HashMap<MessageId, Message>,
    conversation_index: HashMap<ConversationId, Vec<IndexEntry>>,
    next_insertion: u64,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    created_at: DateTime<Utc>,
    insertion: u64,
    id: MessageId,
}

impl IndexEntry {
    const fn sort_key(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.insertion)
    }
}

impl InMemoryMessageRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored messages.
    ///
    /// Returns `0` if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .read()
            .map(|state| state.messages.len())
            .unwrap_or(0)
    }

    /// Returns `true` if no messages are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> MessageRepositoryResult<RwLockReadGuard<'_, InMemoryMessageState>> {
        self.state.read().map_err(|err| {
            MessageRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> MessageRepositoryResult<RwLockWriteGuard<'_, InMemoryMessageState>> {
        self.state.write().map_err(|err| {
            MessageRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn store(&self, message: &Message) -> MessageRepositoryResult<()> {
        let mut state = self.write()?;
        if state.messages.contains_key(&message.id()) {
            return Err(MessageRepositoryError::DuplicateMessage(message.id()));
        }

        let entry = IndexEntry {
            created_at: message.created_at(),
            insertion: state.next_insertion,
            id: message.id(),
        };
        state.next_insertion = state.next_insertion.saturating_add(1);

        let index = state
            .conversation_index
            .entry(message.conversation_id())
            .or_default();
        let position = index.partition_point(|existing| existing.sort_key() < entry.sort_key());
        index.insert(position, entry);
        state.messages.insert(message.id(), message.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: MessageId) -> MessageRepositoryResult<Option<Message>> {
        let state = self.read()?;
        Ok(state.messages.get(&id).cloned())
    }

    async fn page_newest_first(
        &self,
        conversation_id: ConversationId,
        page: PageRequest,
    ) -> MessageRepositoryResult<Vec<Message>> {
        let state = self.read()?;
        let Some(index) = state.conversation_index.get(&conversation_id) else {
            return Ok(Vec::new());
        };
        Ok(index
            .iter()
            .rev()
            .skip(page.offset)
            .take(page.limit)
            .filter_map(|entry| state.messages.get(&entry.id).cloned())
            .collect())
    }

    async fn mark_read(
        &self,
        id: MessageId,
        reader: UserId,
        read_at: DateTime<Utc>,
    ) -> MessageRepositoryResult<Option<Message>> {
        let mut state = self.write()?;
        let Some(message) = state.messages.get_mut(&id) else {
            return Ok(None);
        };
        if message.mark_read(reader, read_at) {
            Ok(Some(message.clone()))
        } else {
            Ok(None)
        }
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        read_at: DateTime<Utc>,
    ) -> MessageRepositoryResult<Vec<Message>> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let Some(index) = state.conversation_index.get(&conversation_id) else {
            return Ok(Vec::new());
        };

        let mut transitioned = Vec::new();
        for entry in index {
            if let Some(message) = state.messages.get_mut(&entry.id) {
                if message.mark_read(reader, read_at) {
                    transitioned.push(message.clone());
                }
            }
        }
        Ok(transitioned)
    }

    async fn count_unread(
        &self,
        conversation_ids: &[ConversationId],
        reader: UserId,
    ) -> MessageRepositoryResult<u64> {
        let state = self.read()?;
        let wanted: HashSet<&ConversationId> = conversation_ids.iter().collect();
        let count = wanted
            .into_iter()
            .filter_map(|id| state.conversation_index.get(id))
            .flatten()
            .filter_map(|entry| state.messages.get(&entry.id))
            .filter(|message| message.is_unread_for(reader))
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }
}
