//! Message entity, its validated content, and read-state transitions.

use super::{ChatDomainError, ConversationId, MessageId, ParseMessageKindError, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of payload a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain text.
    Text,
    /// Image referenced by `media_url`.
    Image,
    /// Arbitrary file referenced by `media_url`.
    File,
}

impl MessageKind {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
        }
    }

    /// Returns `true` for kinds that reference uploaded media.
    #[must_use]
    pub const fn carries_media(self) -> bool {
        matches!(self, Self::Image | Self::File)
    }
}

impl TryFrom<&str> for MessageKind {
    type Error = ParseMessageKindError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "file" => Ok(Self::File),
            _ => Err(ParseMessageKindError(value.to_owned())),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trimmed, non-empty message text within a length bound.
///
/// Length is counted in Unicode scalar values rather than bytes.
///
/// # Examples
///
/// ```
/// use tandem::chat::domain::MessageContent;
///
/// let content = MessageContent::new("  hello  ", 1000).expect("valid content");
/// assert_eq!(content.as_str(), "hello");
/// assert!(MessageContent::new("   ", 1000).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageContent(String);

impl MessageContent {
    /// Validates and wraps message text.
    ///
    /// # Errors
    ///
    /// Returns [`ChatDomainError::EmptyContent`] for blank input and
    /// [`ChatDomainError::ContentTooLong`] when the trimmed text has more than
    /// `max_chars` characters.
    pub fn new(value: impl AsRef<str>, max_chars: usize) -> Result<Self, ChatDomainError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ChatDomainError::EmptyContent);
        }
        let actual = trimmed.chars().count();
        if actual > max_chars {
            return Err(ChatDomainError::ContentTooLong {
                actual,
                max: max_chars,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the content as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for MessageContent {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Validated message body awaiting a conversation and sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    content: MessageContent,
    kind: MessageKind,
    media_url: Option<String>,
}

impl MessageDraft {
    /// Pairs content with its kind and optional media reference.
    ///
    /// # Errors
    ///
    /// Returns [`ChatDomainError::MissingMediaUrl`] when an image or file
    /// message has no (or a blank) media URL, and
    /// [`ChatDomainError::UnexpectedMediaUrl`] when a text message has one.
    pub fn new(
        content: MessageContent,
        kind: MessageKind,
        media_url: Option<String>,
    ) -> Result<Self, ChatDomainError> {
        let media_url = media_url
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty());
        match (kind.carries_media(), media_url.is_some()) {
            (true, false) => Err(ChatDomainError::MissingMediaUrl(kind.as_str())),
            (false, true) => Err(ChatDomainError::UnexpectedMediaUrl),
            _ => Ok(Self {
                content,
                kind,
                media_url,
            }),
        }
    }

    /// Convenience constructor for a text message.
    #[must_use]
    pub const fn text(content: MessageContent) -> Self {
        Self {
            content,
            kind: MessageKind::Text,
            media_url: None,
        }
    }
}

/// A single message within a conversation.
///
/// Content is immutable after creation; the only mutation is the one-way
/// read-state transition performed by the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    conversation_id: ConversationId,
    sender_id: UserId,
    content: MessageContent,
    #[serde(rename = "message_type")]
    kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_url: Option<String>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedMessageData {
    /// Persisted message identifier.
    pub id: MessageId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Author of the message.
    pub sender_id: UserId,
    /// Message text.
    pub content: MessageContent,
    /// Payload kind.
    pub kind: MessageKind,
    /// Media reference for image and file messages.
    pub media_url: Option<String>,
    /// Whether the recipient has read the message.
    pub is_read: bool,
    /// When the recipient read the message.
    pub read_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates an unread message authored by `sender_id`.
    #[must_use]
    pub fn new(
        conversation_id: ConversationId,
        sender_id: UserId,
        draft: MessageDraft,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            sender_id,
            content: draft.content,
            kind: draft.kind,
            media_url: draft.media_url,
            is_read: false,
            read_at: None,
            created_at: clock.utc(),
        }
    }

    /// Reconstructs a message from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedMessageData) -> Self {
        Self {
            id: data.id,
            conversation_id: data.conversation_id,
            sender_id: data.sender_id,
            content: data.content,
            kind: data.kind,
            media_url: data.media_url,
            is_read: data.is_read,
            read_at: data.read_at,
            created_at: data.created_at,
        }
    }

    /// Returns the message identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the owning conversation.
    #[must_use]
    pub const fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// Returns the author.
    #[must_use]
    pub const fn sender_id(&self) -> UserId {
        self.sender_id
    }

    /// Returns the message text.
    #[must_use]
    pub const fn content(&self) -> &MessageContent {
        &self.content
    }

    /// Returns the payload kind.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Returns the media reference for image and file messages.
    #[must_use]
    pub fn media_url(&self) -> Option<&str> {
        self.media_url.as_deref()
    }

    /// Returns `true` once the recipient has read the message.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        self.is_read
    }

    /// Returns when the recipient read the message.
    #[must_use]
    pub const fn read_at(&self) -> Option<DateTime<Utc>> {
        self.read_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns `true` when `reader` may move this message to the read state.
    #[must_use]
    pub fn is_unread_for(&self, reader: UserId) -> bool {
        !self.is_read && self.sender_id != reader
    }

    /// Marks the message read on behalf of `reader`.
    ///
    /// Returns `true` only for the first transition by someone other than the
    /// sender; later calls leave `read_at` untouched.
    pub fn mark_read(&mut self, reader: UserId, read_at: DateTime<Utc>) -> bool {
        if !self.is_unread_for(reader) {
            return false;
        }
        self.is_read = true;
        self.read_at = Some(read_at);
        true
    }
}
