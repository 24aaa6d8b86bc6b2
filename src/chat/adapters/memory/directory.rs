//! In-memory user directory and bearer-token verifier.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::chat::{
    domain::{UserId, UserSummary},
    ports::{DirectoryResult, IdentityError, IdentityVerifier, UserDirectory},
};

/// User directory backed by a map, for tests and single-process deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, UserSummary>>>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user.
    pub fn insert(&self, user: UserSummary) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: UserId) -> DirectoryResult<Option<UserSummary>> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(users.get(&id).cloned())
    }

    async fn search(&self, query: &str) -> DirectoryResult<Vec<UserSummary>> {
        let needle = query.trim().to_lowercase();
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        let mut matches: Vec<UserSummary> = users
            .values()
            .filter(|user| {
                user.name.to_lowercase().contains(&needle)
                    || user.email.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matches)
    }
}

/// Verifier that accepts a fixed set of opaque bearer tokens.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityVerifier {
    tokens: Arc<RwLock<HashMap<String, UserId>>>,
}

impl InMemoryIdentityVerifier {
    /// Creates a verifier that accepts no tokens.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `token` as a credential for `user`.
    pub fn register(&self, token: impl Into<String>, user: UserId) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), user);
    }

    /// Stops accepting `token`.
    pub fn revoke(&self, token: &str) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }
}

#[async_trait]
impl IdentityVerifier for InMemoryIdentityVerifier {
    async fn verify(&self, credential: &str) -> Result<UserId, IdentityError> {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        tokens
            .get(credential.trim())
            .copied()
            .ok_or(IdentityError::InvalidCredential)
    }
}
