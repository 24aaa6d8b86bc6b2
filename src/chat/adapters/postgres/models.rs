//! Diesel row models for chat persistence.

use super::schema::{conversations, messages};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

/// Row shape of the `conversations` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = conversations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ConversationRow {
    /// Conversation identifier.
    pub id: Uuid,
    /// Smaller participant identifier.
    pub participant_low: Uuid,
    /// Larger participant identifier.
    pub participant_high: Uuid,
    /// Most recent message, if any.
    pub last_message_id: Option<Uuid>,
    /// List ordering key.
    pub last_activity: DateTime<Utc>,
    /// Soft-delete flag.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Row shape of the `messages` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MessageRow {
    /// Message identifier.
    pub id: Uuid,
    /// Owning conversation.
    pub conversation_id: Uuid,
    /// Author of the message.
    pub sender_id: Uuid,
    /// Message text.
    pub content: String,
    /// Stored `MessageKind` value.
    pub message_kind: String,
    /// Media reference for image and file messages.
    pub media_url: Option<String>,
    /// Read flag.
    pub is_read: bool,
    /// When the recipient read the message.
    pub read_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
