//! Conversation aggregate and the unordered participant pair it is keyed on.

use super::{ChatDomainError, ConversationId, MessageId, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Unordered pair of two distinct users, stored in canonical `(low, high)`
/// order.
///
/// `ParticipantPair::new(a, b)` and `ParticipantPair::new(b, a)` compare equal
/// and hash identically, which is what makes the pair usable as a uniqueness
/// key.
///
/// # Examples
///
/// ```
/// use tandem::chat::domain::{ParticipantPair, UserId};
///
/// let (a, b) = (UserId::new(), UserId::new());
/// let forward = ParticipantPair::new(a, b).expect("distinct users");
/// let backward = ParticipantPair::new(b, a).expect("distinct users");
/// assert_eq!(forward, backward);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantPair {
    low: UserId,
    high: UserId,
}

impl ParticipantPair {
    /// Normalises two user identities into a pair.
    ///
    /// # Errors
    ///
    /// Returns [`ChatDomainError::SameParticipant`] when both identities are
    /// equal.
    pub fn new(first: UserId, second: UserId) -> Result<Self, ChatDomainError> {
        match first.cmp(&second) {
            std::cmp::Ordering::Less => Ok(Self {
                low: first,
                high: second,
            }),
            std::cmp::Ordering::Greater => Ok(Self {
                low: second,
                high: first,
            }),
            std::cmp::Ordering::Equal => Err(ChatDomainError::SameParticipant(first)),
        }
    }

    /// Returns the participant with the smaller identifier.
    #[must_use]
    pub const fn low(&self) -> UserId {
        self.low
    }

    /// Returns the participant with the larger identifier.
    #[must_use]
    pub const fn high(&self) -> UserId {
        self.high
    }

    /// Returns both participants in canonical order.
    #[must_use]
    pub const fn members(&self) -> [UserId; 2] {
        [self.low, self.high]
    }

    /// Returns `true` when `user` is one of the two participants.
    #[must_use]
    pub fn contains(&self, user: UserId) -> bool {
        self.low == user || self.high == user
    }

    /// Returns the participant who is not `user`, or `None` when `user` is
    /// not in the pair.
    #[must_use]
    pub fn other(&self, user: UserId) -> Option<UserId> {
        if self.low == user {
            Some(self.high)
        } else if self.high == user {
            Some(self.low)
        } else {
            None
        }
    }
}

/// Durable two-party conversation summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    participants: ParticipantPair,
    last_message_id: Option<MessageId>,
    last_activity: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedConversationData {
    /// Persisted conversation identifier.
    pub id: ConversationId,
    /// Persisted participant pair.
    pub participants: ParticipantPair,
    /// Most recent message, if any.
    pub last_message_id: Option<MessageId>,
    /// Sort key for conversation lists.
    pub last_activity: DateTime<Utc>,
    /// Soft-delete flag.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Starts a new, active conversation with no messages.
    #[must_use]
    pub fn new(participants: ParticipantPair, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: ConversationId::new(),
            participants,
            last_message_id: None,
            last_activity: timestamp,
            is_active: true,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a conversation from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedConversationData) -> Self {
        Self {
            id: data.id,
            participants: data.participants,
            last_message_id: data.last_message_id,
            last_activity: data.last_activity,
            is_active: data.is_active,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the conversation identifier.
    #[must_use]
    pub const fn id(&self) -> ConversationId {
        self.id
    }

    /// Returns the participant pair.
    #[must_use]
    pub const fn participants(&self) -> ParticipantPair {
        self.participants
    }

    /// Returns the most recent message identifier, if any message was sent.
    #[must_use]
    pub const fn last_message_id(&self) -> Option<MessageId> {
        self.last_message_id
    }

    /// Returns the activity timestamp used to order conversation lists.
    #[must_use]
    pub const fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Returns `false` once the conversation has been soft-deleted.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns `true` when `user` participates in this conversation.
    #[must_use]
    pub fn includes(&self, user: UserId) -> bool {
        self.participants.contains(user)
    }

    /// Points the summary at a newly sent message.
    ///
    /// The update only applies when `sent_at` is not older than the current
    /// `last_activity`, so concurrent or retried summary writes cannot move
    /// the summary backwards. Returns `true` when the summary changed.
    pub fn record_message(&mut self, message_id: MessageId, sent_at: DateTime<Utc>) -> bool {
        if self.last_message_id == Some(message_id) {
            return false;
        }
        if self.last_message_id.is_some() && sent_at < self.last_activity {
            return false;
        }
        self.last_message_id = Some(message_id);
        self.last_activity = self.last_activity.max(sent_at);
        self.updated_at = self.updated_at.max(sent_at);
        true
    }

    /// Sets the soft-delete flag, stamping the change at `at`.
    pub fn set_active(&mut self, active: bool, at: DateTime<Utc>) {
        self.is_active = active;
        self.updated_at = at;
    }
}
