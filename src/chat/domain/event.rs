//! Domain events emitted by the chat service after a successful mutation.

use super::{ConversationId, ConversationView, Message, MessageId, ParticipantPair, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A fact describing a chat state change.
///
/// Every event names the participant pair so that transports can scope
/// delivery without going back to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A message was persisted.
    MessageSent {
        /// Owning conversation.
        conversation_id: ConversationId,
        /// Both participants of the conversation.
        participants: ParticipantPair,
        /// The stored message.
        message: Message,
    },

    /// A conversation summary changed because a message was sent.
    ConversationUpdated {
        /// Affected conversation.
        conversation_id: ConversationId,
        /// Author of the message that caused the update.
        sender_id: UserId,
        /// `true` when this was the first message of the conversation.
        first_message: bool,
        /// One view per participant, each with that participant's unread
        /// count.
        views: Vec<ConversationView>,
    },

    /// A message moved to the read state.
    MessageRead {
        /// Owning conversation.
        conversation_id: ConversationId,
        /// Both participants of the conversation.
        participants: ParticipantPair,
        /// The message that was read.
        message_id: MessageId,
        /// The participant who read it.
        read_by: UserId,
        /// When it was read.
        read_at: DateTime<Utc>,
    },
}

impl ChatEvent {
    /// Returns the dotted event name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MessageSent { .. } => "message.sent",
            Self::ConversationUpdated { .. } => "conversation.updated",
            Self::MessageRead { .. } => "message.read",
        }
    }

    /// Returns the conversation the event concerns.
    #[must_use]
    pub const fn conversation_id(&self) -> ConversationId {
        match self {
            Self::MessageSent {
                conversation_id, ..
            }
            | Self::ConversationUpdated {
                conversation_id, ..
            }
            | Self::MessageRead {
                conversation_id, ..
            } => *conversation_id,
        }
    }
}
