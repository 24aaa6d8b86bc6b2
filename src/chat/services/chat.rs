//! Chat orchestration: conversations, messages, read state, and the domain
//! events emitted after each successful mutation.

use super::{ChatError, ChatResult, Resource};
use crate::{
    chat::{
        domain::{
            ChatEvent, Conversation, ConversationId, ConversationView, Message, MessageContent,
            MessageDraft, MessageId, MessageKind, ParticipantPair, UserId, UserSummary,
        },
        ports::{
            ConversationRepository, ConversationRepositoryError, EventPublisher,
            MessageRepository, PageRequest, UserDirectory,
        },
    },
    config::ChatConfig,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

const MAX_REPAIR_DELAY: Duration = Duration::from_secs(30);

/// Request payload for sending a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageRequest {
    content: String,
    kind: MessageKind,
    media_url: Option<String>,
}

impl SendMessageRequest {
    /// Creates a plain text message request.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: MessageKind::Text,
            media_url: None,
        }
    }

    /// Sets the payload kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the media reference for image and file messages.
    #[must_use]
    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }
}

/// Caller-supplied paging for message history. Missing values fall back to
/// the configured defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessagePage {
    /// Requested page size.
    pub limit: Option<usize>,
    /// Number of most recent messages to skip.
    pub offset: Option<usize>,
}

impl MessagePage {
    /// Creates an explicit page.
    #[must_use]
    pub const fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }
}

/// Chat orchestration service.
///
/// Every store and directory call is bounded by
/// [`ChatConfig::store_timeout`]; an overrun surfaces as
/// [`ChatError::Unavailable`].
pub struct ChatService<CR, MR, D, P, K>
where
    CR: ConversationRepository,
    MR: MessageRepository,
    D: UserDirectory,
    P: EventPublisher,
    K: Clock + Send + Sync,
{
    conversations: Arc<CR>,
    messages: Arc<MR>,
    directory: Arc<D>,
    publisher: Arc<P>,
    clock: Arc<K>,
    config: ChatConfig,
}

impl<CR, MR, D, P, K> Clone for ChatService<CR, MR, D, P, K>
where
    CR: ConversationRepository,
    MR: MessageRepository,
    D: UserDirectory,
    P: EventPublisher,
    K: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            conversations: Arc::clone(&self.conversations),
            messages: Arc::clone(&self.messages),
            directory: Arc::clone(&self.directory),
            publisher: Arc::clone(&self.publisher),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<CR, MR, D, P, K> ChatService<CR, MR, D, P, K>
where
    CR: ConversationRepository + 'static,
    MR: MessageRepository + 'static,
    D: UserDirectory + 'static,
    P: EventPublisher + 'static,
    K: Clock + Send + Sync + 'static,
{
    /// Creates a chat service.
    #[must_use]
    pub const fn new(
        conversations: Arc<CR>,
        messages: Arc<MR>,
        directory: Arc<D>,
        publisher: Arc<P>,
        clock: Arc<K>,
        config: ChatConfig,
    ) -> Self {
        Self {
            conversations,
            messages,
            directory,
            publisher,
            clock,
            config,
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the conversation between `requester` and `participant`,
    /// creating it when none exists and reactivating it when it was
    /// soft-deleted.
    ///
    /// Concurrent calls for the same pair, in either order, resolve to the
    /// same conversation. No event is emitted.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidArgument`] when both users are the same,
    /// [`ChatError::NotFound`] when the directory does not know either user,
    /// and [`ChatError::Unavailable`] on store failure.
    pub async fn create_conversation(
        &self,
        requester: UserId,
        participant: UserId,
    ) -> ChatResult<ConversationView> {
        let pair = ParticipantPair::new(requester, participant)?;
        let mut summaries = Vec::with_capacity(2);
        for user in pair.members() {
            let summary = self
                .call("find user", self.directory.find_by_id(user))
                .await?
                .ok_or(ChatError::NotFound(Resource::User(user)))?;
            summaries.push(summary);
        }

        let conversation = self.find_or_create(pair).await?;
        self.build_view(requester, conversation, summaries).await
    }

    /// Returns one active conversation as seen by `requester`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotFound`] when the conversation is missing,
    /// soft-deleted, or does not include `requester`.
    pub async fn get_conversation(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
    ) -> ChatResult<ConversationView> {
        let conversation = self
            .participant_conversation(conversation_id, requester)
            .await?;
        let participants = self
            .summaries(conversation.participants(), &mut HashMap::new())
            .await?;
        self.build_view(requester, conversation, participants).await
    }

    /// Lists the requester's active conversations, most recent activity
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Unavailable`] on store or directory failure.
    pub async fn list_conversations(&self, requester: UserId) -> ChatResult<Vec<ConversationView>> {
        let conversations = self
            .call(
                "list conversations",
                self.conversations.list_active_for_user(requester),
            )
            .await?;
        let mut directory_cache = HashMap::new();
        let mut views = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let participants = self
                .summaries(conversation.participants(), &mut directory_cache)
                .await?;
            views.push(self.build_view(requester, conversation, participants).await?);
        }
        Ok(views)
    }

    /// Stores a message from `sender` and advances the conversation summary.
    ///
    /// The summary is updated before [`ChatEvent::MessageSent`] and
    /// [`ChatEvent::ConversationUpdated`] are emitted, so a recipient that
    /// re-fetches the conversation on either event sees the new message.
    /// When the summary update keeps failing after the inline retries, the
    /// message is still returned, a background task keeps retrying the
    /// summary, and the update event is skipped.
    ///
    /// A store call that times out or fails may still land. In that case a
    /// background task watches for the message and, once it appears,
    /// completes the summary update and emits the events.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidArgument`] for empty, overlong, or
    /// inconsistent media payloads, [`ChatError::NotFound`] when `sender`
    /// cannot see the conversation, and [`ChatError::Unavailable`] when the
    /// message could not be confirmed as stored.
    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        sender: UserId,
        request: SendMessageRequest,
    ) -> ChatResult<Message> {
        let content = MessageContent::new(&request.content, self.config.max_content_chars)?;
        let draft = MessageDraft::new(content, request.kind, request.media_url)?;
        let conversation = self
            .participant_conversation(conversation_id, sender)
            .await?;

        let message = Message::new(conversation_id, sender, draft, &*self.clock);
        let first_message = conversation.last_message_id().is_none();
        let participants = conversation.participants();
        if let Err(err) = self
            .call("store message", self.messages.store(&message))
            .await
        {
            if err.is_retryable() {
                self.spawn_unconfirmed_send(message, participants, first_message);
            }
            return Err(err);
        }
        debug!(
            %conversation_id,
            message_id = %message.id(),
            kind = %message.kind(),
            "message stored"
        );

        self.complete_send(&message, participants, first_message)
            .await;
        Ok(message)
    }

    /// Returns one page of history in chronological order.
    ///
    /// The page is chosen counting back from the newest message: offset `0`
    /// holds the most recent messages.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotFound`] when `requester` cannot see the
    /// conversation.
    pub async fn get_messages(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
        page: MessagePage,
    ) -> ChatResult<Vec<Message>> {
        let conversation = self
            .participant_conversation(conversation_id, requester)
            .await?;
        let request = self.resolve_page(page);
        let mut messages = self
            .call(
                "page messages",
                self.messages.page_newest_first(conversation.id(), request),
            )
            .await?;
        messages.reverse();
        Ok(messages)
    }

    /// Marks one message read on behalf of `requester`.
    ///
    /// Reading your own message, or one that is already read, returns the
    /// message unchanged and emits nothing. Otherwise emits
    /// [`ChatEvent::MessageRead`] exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotFound`] when the message is missing or
    /// `requester` cannot see its conversation.
    pub async fn mark_message_read(
        &self,
        message_id: MessageId,
        requester: UserId,
    ) -> ChatResult<Message> {
        let message = self.find_message(message_id).await?;
        let conversation = match self
            .participant_conversation(message.conversation_id(), requester)
            .await
        {
            Ok(conversation) => conversation,
            Err(ChatError::NotFound(_)) => {
                return Err(ChatError::NotFound(Resource::Message(message_id)));
            }
            Err(err) => return Err(err),
        };

        if !message.is_unread_for(requester) {
            return Ok(message);
        }

        let now = self.clock.utc();
        let transitioned = self
            .call(
                "mark message read",
                self.messages.mark_read(message_id, requester, now),
            )
            .await?;
        match transitioned {
            Some(updated) => {
                self.publish_read(conversation.participants(), &updated, requester, now);
                Ok(updated)
            }
            // Another request won the transition.
            None => self.find_message(message_id).await,
        }
    }

    /// Marks every message the other participant sent to `requester` as
    /// read, emitting one [`ChatEvent::MessageRead`] per transitioned
    /// message. Returns the number of messages transitioned.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotFound`] when `requester` cannot see the
    /// conversation.
    pub async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
    ) -> ChatResult<usize> {
        let conversation = self
            .participant_conversation(conversation_id, requester)
            .await?;
        let now = self.clock.utc();
        let transitioned = self
            .call(
                "mark conversation read",
                self.messages
                    .mark_conversation_read(conversation_id, requester, now),
            )
            .await?;
        for message in &transitioned {
            self.publish_read(conversation.participants(), message, requester, now);
        }
        debug!(%conversation_id, count = transitioned.len(), "conversation marked read");
        Ok(transitioned.len())
    }

    /// Counts unread messages addressed to `requester` across their active
    /// conversations.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Unavailable`] on store failure.
    pub async fn get_unread_count(&self, requester: UserId) -> ChatResult<u64> {
        let conversations = self
            .call(
                "list conversations",
                self.conversations.list_active_for_user(requester),
            )
            .await?;
        if conversations.is_empty() {
            return Ok(0);
        }
        let ids: Vec<ConversationId> = conversations.iter().map(Conversation::id).collect();
        self.call("count unread", self.messages.count_unread(&ids, requester))
            .await
    }

    /// Soft-deletes a conversation for both participants. Messages are
    /// retained and no event is emitted.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotFound`] when the conversation is missing,
    /// already deleted, or does not include `requester`.
    pub async fn delete_conversation(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
    ) -> ChatResult<()> {
        self.participant_conversation(conversation_id, requester)
            .await?;
        let now = self.clock.utc();
        self.call(
            "deactivate conversation",
            self.conversations.set_active(conversation_id, false, now),
        )
        .await?;
        info!(%conversation_id, %requester, "conversation soft-deleted");
        Ok(())
    }

    /// Searches the directory, excluding `requester` from the results.
    ///
    /// Queries shorter than [`ChatConfig::min_search_chars`] after trimming
    /// return an empty list without reaching the directory.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Unavailable`] when the directory fails.
    pub async fn search_users(&self, query: &str, requester: UserId) -> ChatResult<Vec<UserSummary>> {
        let trimmed = query.trim();
        if trimmed.chars().count() < self.config.min_search_chars {
            return Ok(Vec::new());
        }
        let users = self
            .call("search users", self.directory.search(trimmed))
            .await?;
        Ok(users.into_iter().filter(|user| user.id != requester).collect())
    }

    /// Returns the participant pair of an active conversation that includes
    /// `requester`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotFound`] when `requester` cannot see the
    /// conversation.
    pub async fn conversation_participants(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
    ) -> ChatResult<ParticipantPair> {
        self.participant_conversation(conversation_id, requester)
            .await
            .map(|conversation| conversation.participants())
    }

    async fn find_or_create(&self, pair: ParticipantPair) -> ChatResult<Conversation> {
        let existing = self
            .call(
                "find conversation",
                self.conversations.find_by_participants(pair),
            )
            .await?;
        if let Some(conversation) = existing {
            return self.ensure_active(conversation).await;
        }

        let conversation = Conversation::new(pair, &*self.clock);
        match self
            .timed("store conversation", self.conversations.store(&conversation))
            .await?
        {
            Ok(()) => {
                info!(conversation_id = %conversation.id(), "conversation created");
                Ok(conversation)
            }
            Err(ConversationRepositoryError::DuplicatePair(_)) => {
                debug!("conversation created concurrently; loading the stored one");
                let stored = self
                    .call(
                        "find conversation",
                        self.conversations.find_by_participants(pair),
                    )
                    .await?
                    .ok_or_else(|| {
                        ChatError::unavailable(
                            "find conversation",
                            &"conversation missing after duplicate pair",
                        )
                    })?;
                self.ensure_active(stored).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn ensure_active(&self, conversation: Conversation) -> ChatResult<Conversation> {
        if conversation.is_active() {
            return Ok(conversation);
        }
        let now = self.clock.utc();
        let reactivated = self
            .call(
                "reactivate conversation",
                self.conversations.set_active(conversation.id(), true, now),
            )
            .await?;
        info!(conversation_id = %reactivated.id(), "conversation reactivated");
        Ok(reactivated)
    }

    async fn participant_conversation(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
    ) -> ChatResult<Conversation> {
        let found = self
            .call(
                "find conversation",
                self.conversations.find_by_id(conversation_id),
            )
            .await?;
        match found {
            Some(conversation) if conversation.is_active() && conversation.includes(requester) => {
                Ok(conversation)
            }
            _ => Err(ChatError::NotFound(Resource::Conversation(conversation_id))),
        }
    }

    async fn find_message(&self, message_id: MessageId) -> ChatResult<Message> {
        self.call("find message", self.messages.find_by_id(message_id))
            .await?
            .ok_or(ChatError::NotFound(Resource::Message(message_id)))
    }

    async fn summaries(
        &self,
        pair: ParticipantPair,
        cache: &mut HashMap<UserId, Option<UserSummary>>,
    ) -> ChatResult<Vec<UserSummary>> {
        let mut summaries = Vec::with_capacity(2);
        for user in pair.members() {
            if !cache.contains_key(&user) {
                let found = self
                    .call("find user", self.directory.find_by_id(user))
                    .await?;
                cache.insert(user, found);
            }
            summaries.extend(cache.get(&user).cloned().flatten());
        }
        Ok(summaries)
    }

    async fn build_view(
        &self,
        viewer: UserId,
        conversation: Conversation,
        participants: Vec<UserSummary>,
    ) -> ChatResult<ConversationView> {
        let last_message = match conversation.last_message_id() {
            Some(id) => {
                self.call("find last message", self.messages.find_by_id(id))
                    .await?
            }
            None => None,
        };
        let ids = [conversation.id()];
        let unread_count = self
            .call("count unread", self.messages.count_unread(&ids, viewer))
            .await?;
        Ok(ConversationView {
            viewer,
            conversation,
            participants,
            last_message,
            unread_count,
        })
    }

    async fn complete_send(
        &self,
        message: &Message,
        participants: ParticipantPair,
        first_message: bool,
    ) {
        let updated = self.record_summary(message).await;
        self.publisher.publish(ChatEvent::MessageSent {
            conversation_id: message.conversation_id(),
            participants,
            message: message.clone(),
        });
        if let Some(conversation) = updated {
            self.publish_conversation_updated(&conversation, message.sender_id(), first_message)
                .await;
        }
    }

    /// Watches for a message whose store call failed without a verdict and
    /// finishes the send if the write turns out to have landed.
    fn spawn_unconfirmed_send(
        &self,
        message: Message,
        participants: ParticipantPair,
        first_message: bool,
    ) {
        let service = self.clone();
        tokio::spawn(async move {
            let message_id = message.id();
            let conversation_id = message.conversation_id();
            let mut delay = service.config.summary_retry_backoff;
            for attempt in 1..=service.config.summary_repair_attempts {
                tokio::time::sleep(delay).await;
                let lookup = service
                    .call("find unconfirmed message", service.messages.find_by_id(message_id))
                    .await;
                match lookup {
                    Ok(Some(stored)) => {
                        info!(%conversation_id, %message_id, attempt, "unconfirmed message write landed");
                        service
                            .complete_send(&stored, participants, first_message)
                            .await;
                        return;
                    }
                    Ok(None) => debug!(%conversation_id, %message_id, attempt, "message not stored yet"),
                    Err(err) => {
                        warn!(%conversation_id, %message_id, attempt, error = %err, "could not check for unconfirmed message");
                    }
                }
                delay = delay.saturating_mul(2).min(MAX_REPAIR_DELAY);
            }
            debug!(%conversation_id, %message_id, "unconfirmed message never appeared");
        });
    }

    async fn record_summary(&self, message: &Message) -> Option<Conversation> {
        let attempts = self.config.summary_retry_attempts.max(1);
        for attempt in 1..=attempts {
            let result = self
                .call(
                    "record last message",
                    self.conversations.record_message(
                        message.conversation_id(),
                        message.id(),
                        message.created_at(),
                    ),
                )
                .await;
            match result {
                Ok(conversation) => return Some(conversation),
                Err(err) => warn!(
                    conversation_id = %message.conversation_id(),
                    message_id = %message.id(),
                    attempt,
                    error = %err,
                    "conversation summary update failed"
                ),
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.summary_retry_backoff).await;
            }
        }
        self.spawn_summary_repair(message);
        None
    }

    fn spawn_summary_repair(&self, message: &Message) {
        let conversations = Arc::clone(&self.conversations);
        let conversation_id = message.conversation_id();
        let message_id = message.id();
        let sent_at: DateTime<Utc> = message.created_at();
        let attempts = self.config.summary_repair_attempts;
        let timeout = self.config.store_timeout;
        let mut delay = self.config.summary_retry_backoff;

        tokio::spawn(async move {
            for attempt in 1..=attempts {
                tokio::time::sleep(delay).await;
                let outcome = tokio::time::timeout(
                    timeout,
                    conversations.record_message(conversation_id, message_id, sent_at),
                )
                .await;
                match outcome {
                    Ok(Ok(_)) => {
                        info!(%conversation_id, %message_id, attempt, "conversation summary repaired");
                        return;
                    }
                    Ok(Err(err)) => {
                        warn!(%conversation_id, attempt, error = %err, "summary repair failed");
                    }
                    Err(_) => warn!(%conversation_id, attempt, "summary repair timed out"),
                }
                delay = delay.saturating_mul(2).min(MAX_REPAIR_DELAY);
            }
            error!(%conversation_id, %message_id, "gave up repairing conversation summary");
        });
    }

    async fn publish_conversation_updated(
        &self,
        conversation: &Conversation,
        sender: UserId,
        first_message: bool,
    ) {
        match self.views_for_participants(conversation).await {
            Ok(views) => self.publisher.publish(ChatEvent::ConversationUpdated {
                conversation_id: conversation.id(),
                sender_id: sender,
                first_message,
                views,
            }),
            Err(err) => warn!(
                conversation_id = %conversation.id(),
                error = %err,
                "skipping conversation update event"
            ),
        }
    }

    async fn views_for_participants(
        &self,
        conversation: &Conversation,
    ) -> ChatResult<Vec<ConversationView>> {
        let participants = self
            .summaries(conversation.participants(), &mut HashMap::new())
            .await?;
        let mut views = Vec::with_capacity(2);
        for viewer in conversation.participants().members() {
            views.push(
                self.build_view(viewer, conversation.clone(), participants.clone())
                    .await?,
            );
        }
        Ok(views)
    }

    fn publish_read(
        &self,
        participants: ParticipantPair,
        message: &Message,
        reader: UserId,
        fallback: DateTime<Utc>,
    ) {
        self.publisher.publish(ChatEvent::MessageRead {
            conversation_id: message.conversation_id(),
            participants,
            message_id: message.id(),
            read_by: reader,
            read_at: message.read_at().unwrap_or(fallback),
        });
    }

    fn resolve_page(&self, page: MessagePage) -> PageRequest {
        let max = self.config.max_page_size.max(1);
        let limit = page
            .limit
            .unwrap_or(self.config.default_page_size)
            .clamp(1, max);
        PageRequest::new(limit, page.offset.unwrap_or(0))
    }

    async fn timed<F, T>(&self, operation: &'static str, future: F) -> ChatResult<T>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(self.config.store_timeout, future)
            .await
            .map_err(|_| {
                warn!(operation, "store call exceeded its deadline");
                ChatError::unavailable(operation, &"deadline exceeded")
            })
    }

    async fn call<F, T, E>(&self, operation: &'static str, future: F) -> ChatResult<T>
    where
        F: Future<Output = Result<T, E>>,
        ChatError: From<E>,
    {
        Ok(self.timed(operation, future).await??)
    }
}
