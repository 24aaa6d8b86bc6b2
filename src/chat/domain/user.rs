//! Display data for users, as supplied by the external user directory.

use super::UserId;
use serde::{Deserialize, Serialize};

/// Public profile of a user, used to populate conversations and search
/// results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// Stable user identity.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Contact address.
    pub email: String,
    /// Avatar location, when the user has uploaded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

impl UserSummary {
    /// Creates a summary without a profile image.
    #[must_use]
    pub fn new(id: UserId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            profile_image: None,
        }
    }

    /// Sets the profile image location.
    #[must_use]
    pub fn with_profile_image(mut self, url: impl Into<String>) -> Self {
        self.profile_image = Some(url.into());
        self
    }
}
