//! Port for the external user directory.

use crate::chat::domain::{UserId, UserSummary};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for user directory lookups.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Read-only view of the user accounts owned by another subsystem.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Looks up a user by identity. Returns `None` for unknown users.
    async fn find_by_id(&self, id: UserId) -> DirectoryResult<Option<UserSummary>>;

    /// Returns users whose name or email matches `query`.
    async fn search(&self, query: &str) -> DirectoryResult<Vec<UserSummary>>;
}

/// Errors returned by user directory implementations.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    /// The directory could not be reached.
    #[error("user directory unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl DirectoryError {
    /// Wraps a transport or backend error.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
