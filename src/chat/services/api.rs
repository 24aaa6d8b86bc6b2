//! Object-safe facade over the chat service for transports.

use super::{ChatResult, ChatService, MessagePage, SendMessageRequest};
use crate::chat::{
    domain::{ConversationId, ConversationView, Message, MessageId, ParticipantPair, UserId, UserSummary},
    ports::{ConversationRepository, EventPublisher, MessageRepository, UserDirectory},
};
use async_trait::async_trait;
use mockable::Clock;

/// Chat operations available to an authenticated caller.
///
/// Transports hold this as `Arc<dyn ChatApi>` so they stay independent of the
/// service's storage parameters. See [`ChatService`] for the semantics of each
/// operation.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// See [`ChatService::create_conversation`].
    async fn create_conversation(
        &self,
        requester: UserId,
        participant: UserId,
    ) -> ChatResult<ConversationView>;

    /// See [`ChatService::get_conversation`].
    async fn get_conversation(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
    ) -> ChatResult<ConversationView>;

    /// See [`ChatService::list_conversations`].
    async fn list_conversations(&self, requester: UserId) -> ChatResult<Vec<ConversationView>>;

    /// See [`ChatService::send_message`].
    async fn send_message(
        &self,
        conversation_id: ConversationId,
        sender: UserId,
        request: SendMessageRequest,
    ) -> ChatResult<Message>;

    /// See [`ChatService::get_messages`].
    async fn get_messages(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
        page: MessagePage,
    ) -> ChatResult<Vec<Message>>;

    /// See [`ChatService::mark_message_read`].
    async fn mark_message_read(&self, message_id: MessageId, requester: UserId)
    -> ChatResult<Message>;

    /// See [`ChatService::mark_conversation_read`].
    async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
    ) -> ChatResult<usize>;

    /// See [`ChatService::get_unread_count`].
    async fn get_unread_count(&self, requester: UserId) -> ChatResult<u64>;

    /// See [`ChatService::delete_conversation`].
    async fn delete_conversation(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
    ) -> ChatResult<()>;

    /// See [`ChatService::search_users`].
    async fn search_users(&self, query: &str, requester: UserId) -> ChatResult<Vec<UserSummary>>;

    /// See [`ChatService::conversation_participants`].
    async fn conversation_participants(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
    ) -> ChatResult<ParticipantPair>;
}

#[async_trait]
impl<CR, MR, D, P, K> ChatApi for ChatService<CR, MR, D, P, K>
where
    CR: ConversationRepository + 'static,
    MR: MessageRepository + 'static,
    D: UserDirectory + 'static,
    P: EventPublisher + 'static,
    K: Clock + Send + Sync + 'static,
{
    async fn create_conversation(
        &self,
        requester: UserId,
        participant: UserId,
    ) -> ChatResult<ConversationView> {
        Self::create_conversation(self, requester, participant).await
    }

    async fn get_conversation(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
    ) -> ChatResult<ConversationView> {
        Self::get_conversation(self, conversation_id, requester).await
    }

    async fn list_conversations(&self, requester: UserId) -> ChatResult<Vec<ConversationView>> {
        Self::list_conversations(self, requester).await
    }

    async fn send_message(
        &self,
        conversation_id: ConversationId,
        sender: UserId,
        request: SendMessageRequest,
    ) -> ChatResult<Message> {
        Self::send_message(self, conversation_id, sender, request).await
    }

    async fn get_messages(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
        page: MessagePage,
    ) -> ChatResult<Vec<Message>> {
        Self::get_messages(self, conversation_id, requester, page).await
    }

    async fn mark_message_read(
        &self,
        message_id: MessageId,
        requester: UserId,
    ) -> ChatResult<Message> {
        Self::mark_message_read(self, message_id, requester).await
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
    ) -> ChatResult<usize> {
        Self::mark_conversation_read(self, conversation_id, requester).await
    }

    async fn get_unread_count(&self, requester: UserId) -> ChatResult<u64> {
        Self::get_unread_count(self, requester).await
    }

    async fn delete_conversation(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
    ) -> ChatResult<()> {
        Self::delete_conversation(self, conversation_id, requester).await
    }

    async fn search_users(&self, query: &str, requester: UserId) -> ChatResult<Vec<UserSummary>> {
        Self::search_users(self, query, requester).await
    }

    async fn conversation_participants(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
    ) -> ChatResult<ParticipantPair> {
        Self::conversation_participants(self, conversation_id, requester).await
    }
}
