//! Port for bearer-credential verification.

use crate::chat::domain::UserId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Verifies bearer credentials issued by the authentication subsystem.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Resolves a credential to a stable user identity.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCredential`] for unknown, expired, or
    /// malformed credentials.
    async fn verify(&self, credential: &str) -> Result<UserId, IdentityError>;
}

/// Errors returned by identity verifiers.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// The credential was rejected.
    #[error("invalid credential")]
    InvalidCredential,

    /// The verifier could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}
