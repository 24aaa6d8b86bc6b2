//! `PostgreSQL` adapters for chat persistence.
//!
//! Diesel calls are synchronous, so every repository method checks a
//! connection out of the r2d2 pool inside [`tokio::task::spawn_blocking`].
//! The participant-pair uniqueness invariant is enforced by the
//! `idx_conversations_participant_pair` unique index.

mod conversation;
mod message;
mod models;
mod schema;

pub use conversation::PostgresConversationRepository;
pub use message::PostgresMessageRepository;

use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};

/// `PostgreSQL` connection pool shared by the chat repositories.
pub type ChatPgPool = Pool<ConnectionManager<PgConnection>>;

/// Builds a connection pool for `database_url`.
///
/// # Errors
///
/// Returns the r2d2 error when the initial connections cannot be opened.
pub fn build_pool(database_url: &str, max_size: u32) -> Result<ChatPgPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder().max_size(max_size).build(manager)
}
