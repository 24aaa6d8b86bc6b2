//! In-memory adapter implementations.
//!
//! These adapters are thread-safe and back both the test suite and
//! single-process deployments that do not configure a database.

mod conversation;
mod directory;
mod message;
pub mod seed;

pub use conversation::InMemoryConversationRepository;
pub use directory::{InMemoryIdentityVerifier, InMemoryUserDirectory};
pub use message::InMemoryMessageRepository;
