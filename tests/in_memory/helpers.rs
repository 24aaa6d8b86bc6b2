//! Shared fixtures for in-memory chat integration tests.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::DefaultClock;
use rstest::fixture;
use tandem::{
    chat::{
        adapters::memory::{
            InMemoryConversationRepository, InMemoryMessageRepository, InMemoryUserDirectory,
        },
        domain::{
            ChatEvent, Conversation, ConversationId, Message, MessageId, ParticipantPair, UserId,
            UserSummary,
        },
        ports::{
            ConversationRepository, ConversationRepositoryError, ConversationRepositoryResult,
            EventPublisher, MessageRepository, MessageRepositoryError, MessageRepositoryResult,
            PageRequest,
        },
        services::ChatService,
    },
    config::ChatConfig,
};

/// Event sink that keeps everything it is given.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<ChatEvent>>,
}

impl RecordingPublisher {
    /// Returns a copy of the recorded events.
    pub fn events(&self) -> Vec<ChatEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns the recorded events.
    pub fn take(&self) -> Vec<ChatEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: ChatEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Conversation store wrapper that injects latency and summary failures.
#[derive(Debug, Default)]
pub struct FaultyConversations {
    inner: InMemoryConversationRepository,
    lookup_delay: Mutex<Option<Duration>>,
    record_failures: AtomicUsize,
}

impl FaultyConversations {
    /// Delays every lookup by `delay`.
    pub fn delay_lookups(&self, delay: Duration) {
        *self
            .lookup_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    /// Fails the next `count` summary updates.
    pub fn fail_next_records(&self, count: usize) {
        self.record_failures.store(count, Ordering::SeqCst);
    }

    /// Reads a conversation straight from the backing store.
    pub async fn peek(&self, id: ConversationId) -> Option<Conversation> {
        self.inner.find_by_id(id).await.ok().flatten()
    }

    async fn pause(&self) {
        let delay = *self
            .lookup_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ConversationRepository for FaultyConversations {
    async fn store(&self, conversation: &Conversation) -> ConversationRepositoryResult<()> {
        self.inner.store(conversation).await
    }

    async fn find_by_id(
        &self,
        id: ConversationId,
    ) -> ConversationRepositoryResult<Option<Conversation>> {
        self.pause().await;
        self.inner.find_by_id(id).await
    }

    async fn find_by_participants(
        &self,
        participants: ParticipantPair,
    ) -> ConversationRepositoryResult<Option<Conversation>> {
        self.pause().await;
        self.inner.find_by_participants(participants).await
    }

    async fn list_active_for_user(
        &self,
        user: UserId,
    ) -> ConversationRepositoryResult<Vec<Conversation>> {
        self.pause().await;
        self.inner.list_active_for_user(user).await
    }

    async fn record_message(
        &self,
        id: ConversationId,
        message_id: MessageId,
        sent_at: DateTime<Utc>,
    ) -> ConversationRepositoryResult<Conversation> {
        let remaining = self.record_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.record_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ConversationRepositoryError::persistence(
                std::io::Error::other("summary store offline"),
            ));
        }
        self.inner.record_message(id, message_id, sent_at).await
    }

    async fn set_active(
        &self,
        id: ConversationId,
        active: bool,
        at: DateTime<Utc>,
    ) -> ConversationRepositoryResult<Conversation> {
        self.inner.set_active(id, active, at).await
    }
}

/// Message store whose writes finish on a detached task after a delay.
///
/// A caller that stops waiting does not cancel the write, which is how a
/// blocking database insert behaves once it has been handed to a worker
/// thread.
#[derive(Debug)]
pub struct LaggingMessages {
    inner: Arc<InMemoryMessageRepository>,
    write_delay: Duration,
}

impl LaggingMessages {
    /// Wraps an empty store whose writes land after `write_delay`.
    pub fn new(write_delay: Duration) -> Self {
        Self {
            inner: Arc::new(InMemoryMessageRepository::new()),
            write_delay,
        }
    }
}

#[async_trait]
impl MessageRepository for LaggingMessages {
    async fn store(&self, message: &Message) -> MessageRepositoryResult<()> {
        let inner = Arc::clone(&self.inner);
        let pending = message.clone();
        let delay = self.write_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.store(&pending).await
        })
        .await
        .map_err(MessageRepositoryError::persistence)?
    }

    async fn find_by_id(&self, id: MessageId) -> MessageRepositoryResult<Option<Message>> {
        self.inner.find_by_id(id).await
    }

    async fn page_newest_first(
        &self,
        conversation_id: ConversationId,
        page: PageRequest,
    ) -> MessageRepositoryResult<Vec<Message>> {
        self.inner.page_newest_first(conversation_id, page).await
    }

    async fn mark_read(
        &self,
        id: MessageId,
        reader: UserId,
        read_at: DateTime<Utc>,
    ) -> MessageRepositoryResult<Option<Message>> {
        self.inner.mark_read(id, reader, read_at).await
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        read_at: DateTime<Utc>,
    ) -> MessageRepositoryResult<Vec<Message>> {
        self.inner
            .mark_conversation_read(conversation_id, reader, read_at)
            .await
    }

    async fn count_unread(
        &self,
        conversation_ids: &[ConversationId],
        reader: UserId,
    ) -> MessageRepositoryResult<u64> {
        self.inner.count_unread(conversation_ids, reader).await
    }
}

/// Chat service over in-memory stores.
pub type TestChat = ChatService<
    InMemoryConversationRepository,
    InMemoryMessageRepository,
    InMemoryUserDirectory,
    RecordingPublisher,
    DefaultClock,
>;

/// Chat service whose conversation store misbehaves on request.
pub type FaultyChat = ChatService<
    FaultyConversations,
    InMemoryMessageRepository,
    InMemoryUserDirectory,
    RecordingPublisher,
    DefaultClock,
>;

/// Chat service whose message writes outlive the store deadline.
pub type LaggingChat = ChatService<
    InMemoryConversationRepository,
    LaggingMessages,
    InMemoryUserDirectory,
    RecordingPublisher,
    DefaultClock,
>;

/// Three known users.
#[derive(Debug, Clone, Copy)]
pub struct Cast {
    pub ada: UserId,
    pub bob: UserId,
    pub cy: UserId,
}

/// Provides three users, registered in a fresh directory.
pub fn directory_with_cast() -> (InMemoryUserDirectory, Cast) {
    let directory = InMemoryUserDirectory::new();
    let cast = Cast {
        ada: UserId::new(),
        bob: UserId::new(),
        cy: UserId::new(),
    };
    directory.insert(UserSummary::new(cast.ada, "Ada Lovelace", "ada@example.com"));
    directory.insert(UserSummary::new(cast.bob, "Bob Kahn", "bob@example.com"));
    directory.insert(UserSummary::new(cast.cy, "Cy Twombly", "cy@example.com"));
    (directory, cast)
}

/// An in-memory chat service with its event sink and users.
pub struct ChatHarness {
    pub chat: TestChat,
    pub publisher: Arc<RecordingPublisher>,
    pub cast: Cast,
}

/// Provides a fresh chat harness for each test.
#[fixture]
pub fn harness() -> ChatHarness {
    let (directory, cast) = directory_with_cast();
    let publisher = Arc::new(RecordingPublisher::default());
    let chat = ChatService::new(
        Arc::new(InMemoryConversationRepository::new()),
        Arc::new(InMemoryMessageRepository::new()),
        Arc::new(directory),
        Arc::clone(&publisher),
        Arc::new(DefaultClock),
        ChatConfig::default(),
    );
    ChatHarness {
        chat,
        publisher,
        cast,
    }
}

/// A chat service over [`FaultyConversations`] with a short store deadline.
pub struct FaultyHarness {
    pub chat: FaultyChat,
    pub conversations: Arc<FaultyConversations>,
    pub publisher: Arc<RecordingPublisher>,
    pub cast: Cast,
}

/// Provides a harness whose conversation store can be made to misbehave.
#[fixture]
pub fn faulty_harness() -> FaultyHarness {
    let (directory, cast) = directory_with_cast();
    let conversations = Arc::new(FaultyConversations::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let config = ChatConfig {
        summary_retry_attempts: 2,
        summary_retry_backoff: Duration::from_millis(5),
        ..ChatConfig::default()
    }
    .with_store_timeout(Duration::from_millis(100));
    let chat = ChatService::new(
        Arc::clone(&conversations),
        Arc::new(InMemoryMessageRepository::new()),
        Arc::new(directory),
        Arc::clone(&publisher),
        Arc::new(DefaultClock),
        config,
    );
    FaultyHarness {
        chat,
        conversations,
        publisher,
        cast,
    }
}

/// A chat service whose message writes land after the caller gave up.
pub struct LaggingHarness {
    pub chat: LaggingChat,
    pub publisher: Arc<RecordingPublisher>,
    pub cast: Cast,
}

/// Provides a harness where each message write takes three times the store
/// deadline.
#[fixture]
pub fn lagging_harness() -> LaggingHarness {
    let (directory, cast) = directory_with_cast();
    let publisher = Arc::new(RecordingPublisher::default());
    let config = ChatConfig {
        summary_retry_backoff: Duration::from_millis(20),
        ..ChatConfig::default()
    }
    .with_store_timeout(Duration::from_millis(50));
    let chat = ChatService::new(
        Arc::new(InMemoryConversationRepository::new()),
        Arc::new(LaggingMessages::new(Duration::from_millis(150))),
        Arc::new(directory),
        Arc::clone(&publisher),
        Arc::new(DefaultClock),
        config,
    );
    LaggingHarness {
        chat,
        publisher,
        cast,
    }
}
