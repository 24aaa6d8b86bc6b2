//! Port contracts for the chat subsystem.
//!
//! Ports define infrastructure-agnostic interfaces used by the chat service:
//! the two stores it owns, the user directory and identity verifier it
//! consumes, and the sink it publishes domain events to.

pub mod conversation;
pub mod directory;
pub mod events;
pub mod identity;
pub mod message;

pub use conversation::{
    ConversationRepository, ConversationRepositoryError, ConversationRepositoryResult,
};
pub use directory::{DirectoryError, DirectoryResult, UserDirectory};
pub use events::EventPublisher;
pub use identity::{IdentityError, IdentityVerifier};
pub use message::{MessageRepository, MessageRepositoryError, MessageRepositoryResult, PageRequest};
