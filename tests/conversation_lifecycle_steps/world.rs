//! Shared world state for conversation lifecycle BDD scenarios.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use mockable::DefaultClock;
use rstest::fixture;
use tandem::{
    chat::{
        adapters::memory::{
            InMemoryConversationRepository, InMemoryMessageRepository, InMemoryUserDirectory,
        },
        domain::{ChatEvent, ConversationId, ConversationView, Message, UserId, UserSummary},
        ports::EventPublisher,
        services::{ChatResult, ChatService},
    },
    config::ChatConfig,
};

/// Event sink shared between the service and the scenario assertions.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<ChatEvent>>,
}

impl EventLog {
    /// Returns a copy of every event published so far.
    pub fn snapshot(&self) -> Vec<ChatEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventPublisher for EventLog {
    fn publish(&self, event: ChatEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Service type used by the BDD world.
pub type TestChatService = ChatService<
    InMemoryConversationRepository,
    InMemoryMessageRepository,
    InMemoryUserDirectory,
    EventLog,
    DefaultClock,
>;

/// Scenario world for conversation lifecycle behaviour tests.
pub struct ConversationWorld {
    pub service: TestChatService,
    pub directory: Arc<InMemoryUserDirectory>,
    pub events: Arc<EventLog>,
    pub users: HashMap<String, UserId>,
    pub openings: Vec<ConversationView>,
    pub last_send: Option<ChatResult<Message>>,
}

impl ConversationWorld {
    /// Creates a world with an empty directory.
    #[must_use]
    pub fn new() -> Self {
        let directory = Arc::new(InMemoryUserDirectory::new());
        let events = Arc::new(EventLog::default());
        let service = ChatService::new(
            Arc::new(InMemoryConversationRepository::new()),
            Arc::new(InMemoryMessageRepository::new()),
            Arc::clone(&directory),
            Arc::clone(&events),
            Arc::new(DefaultClock),
            ChatConfig::default(),
        );
        Self {
            service,
            directory,
            events,
            users: HashMap::new(),
            openings: Vec::new(),
            last_send: None,
        }
    }

    /// Registers `name` in the directory.
    pub fn register(&mut self, name: &str) {
        let id = UserId::new();
        self.directory
            .insert(UserSummary::new(id, name, format!("{name}@example.com")));
        self.users.insert(name.to_owned(), id);
    }

    /// Resolves a scenario user name.
    ///
    /// # Errors
    ///
    /// Returns an error when the scenario never registered `name`.
    pub fn user(&self, name: &str) -> Result<UserId, eyre::Report> {
        self.users
            .get(name)
            .copied()
            .ok_or_else(|| eyre::eyre!("user {name} is not registered in this scenario"))
    }

    /// Returns the conversation most recently opened.
    ///
    /// # Errors
    ///
    /// Returns an error when no conversation has been opened yet.
    pub fn conversation_id(&self) -> Result<ConversationId, eyre::Report> {
        self.openings
            .last()
            .map(|view| view.conversation.id())
            .ok_or_else(|| eyre::eyre!("no conversation has been opened"))
    }
}

impl Default for ConversationWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> ConversationWorld {
    ConversationWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
