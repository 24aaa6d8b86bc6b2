//! JSON seed file that populates the in-memory directory and verifier.
//!
//! The file holds an array of users, each with the bearer token it may
//! connect with:
//!
//! ```json
//! [
//!   {
//!     "id": "550e8400-e29b-41d4-a716-446655440000",
//!     "name": "Ada",
//!     "email": "ada@example.com",
//!     "token": "ada-secret"
//!   }
//! ]
//! ```

use super::{InMemoryIdentityVerifier, InMemoryUserDirectory};
use crate::chat::domain::{UserId, UserSummary};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// One user entry in the seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    /// Stable identity.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Contact address.
    pub email: String,
    /// Optional avatar location.
    #[serde(default)]
    pub profile_image: Option<String>,
    /// Bearer token accepted for this user.
    pub token: String,
}

/// Errors raised while loading a seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The file could not be read.
    #[error("failed to read user seed: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid seed document.
    #[error("failed to parse user seed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parses seed users from JSON text.
///
/// # Errors
///
/// Returns [`SeedError::Parse`] when the document is malformed.
pub fn parse_seed(json: &str) -> Result<Vec<SeedUser>, SeedError> {
    Ok(serde_json::from_str(json)?)
}

/// Reads the seed file at `path` into a fresh directory and verifier.
///
/// # Errors
///
/// Returns [`SeedError`] when the file cannot be read or parsed.
pub fn load_seed(
    path: &Path,
) -> Result<(InMemoryUserDirectory, InMemoryIdentityVerifier), SeedError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(build_from_seed(parse_seed(&contents)?))
}

/// Populates a directory and verifier from already-parsed seed users.
#[must_use]
pub fn build_from_seed(
    users: impl IntoIterator<Item = SeedUser>,
) -> (InMemoryUserDirectory, InMemoryIdentityVerifier) {
    let directory = InMemoryUserDirectory::new();
    let verifier = InMemoryIdentityVerifier::new();
    for seed in users {
        let mut summary = UserSummary::new(seed.id, seed.name, seed.email);
        summary.profile_image = seed.profile_image;
        directory.insert(summary);
        verifier.register(seed.token, seed.id);
    }
    (directory, verifier)
}
