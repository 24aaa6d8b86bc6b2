//! JSON frames exchanged over the realtime socket.
//!
//! Every frame is an object tagged by `type`. Clients send typing signals and
//! `request` frames; the server replies with `response` frames and pushes
//! notifications as they happen.
//!
//! ```json
//! {"type":"typing_start","conversation_id":"…"}
//! {"type":"request","id":7,"op":{"action":"send_message","conversation_id":"…","content":"hi"}}
//! {"type":"response","id":7,"ok":true,"data":{…}}
//! ```

use crate::chat::{
    domain::{ConversationId, ConversationView, Message, MessageId, UserId},
    services::ChatError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frames sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// The user started typing in a conversation.
    TypingStart {
        /// Conversation being typed in.
        conversation_id: ConversationId,
    },
    /// The user stopped typing.
    TypingStop {
        /// Conversation that was being typed in.
        conversation_id: ConversationId,
    },
    /// A chat operation performed as the connection's user.
    Request {
        /// Client-chosen correlation identifier echoed in the response.
        id: u64,
        /// The operation to perform.
        op: ChatRequest,
    },
}

/// Chat operations reachable over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChatRequest {
    /// Find or create the conversation with another user.
    CreateConversation {
        /// The other participant.
        participant_id: UserId,
    },
    /// List active conversations.
    ListConversations,
    /// Fetch one conversation.
    GetConversation {
        /// Conversation to fetch.
        conversation_id: ConversationId,
    },
    /// Send a message.
    SendMessage {
        /// Target conversation.
        conversation_id: ConversationId,
        /// Message text.
        content: String,
        /// `text`, `image`, or `file`; defaults to `text`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_type: Option<String>,
        /// Media reference for image and file messages.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_url: Option<String>,
    },
    /// Fetch a page of history.
    GetMessages {
        /// Conversation to read.
        conversation_id: ConversationId,
        /// Page size.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
        /// Messages to skip, counted from the newest.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<usize>,
    },
    /// Mark one message read.
    MarkMessageRead {
        /// Message to mark.
        message_id: MessageId,
    },
    /// Mark every message from the other participant read.
    MarkConversationRead {
        /// Conversation to mark.
        conversation_id: ConversationId,
    },
    /// Count unread messages across active conversations.
    UnreadCount,
    /// Soft-delete a conversation.
    DeleteConversation {
        /// Conversation to delete.
        conversation_id: ConversationId,
    },
    /// Search the user directory.
    SearchUsers {
        /// Name or email fragment.
        query: String,
    },
}

/// Failure details carried by `response` and `error` frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Whether repeating the request may succeed.
    pub retryable: bool,
}

impl ErrorBody {
    /// Creates an error body.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }
}

impl From<&ChatError> for ErrorBody {
    fn from(err: &ChatError) -> Self {
        Self::new(err.code(), err.to_string(), err.is_retryable())
    }
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A message was sent in one of the user's conversations.
    NewMessage {
        /// Owning conversation.
        conversation_id: ConversationId,
        /// The message.
        message: Message,
    },
    /// A conversation the user already has changed.
    ConversationUpdated {
        /// The conversation as seen by the recipient.
        conversation: ConversationView,
    },
    /// Someone started a conversation with the user.
    NewConversation {
        /// The conversation as seen by the recipient.
        conversation: ConversationView,
    },
    /// A message was read.
    MessageRead {
        /// Owning conversation.
        conversation_id: ConversationId,
        /// The message that was read.
        message_id: MessageId,
        /// Who read it.
        read_by: UserId,
        /// When.
        read_at: DateTime<Utc>,
    },
    /// The other participant started or stopped typing.
    UserTyping {
        /// Conversation being typed in.
        conversation_id: ConversationId,
        /// Who is typing.
        user_id: UserId,
        /// Display name of the typist, when known.
        user_name: Option<String>,
        /// `true` on start, `false` on stop.
        is_typing: bool,
    },
    /// Outcome of a `request` frame.
    Response {
        /// Correlation identifier from the request.
        id: u64,
        /// `true` when the operation succeeded.
        ok: bool,
        /// Operation result on success.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
        /// Failure details otherwise.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorBody>,
    },
    /// A frame that could not be handled.
    Error {
        /// Failure details.
        error: ErrorBody,
    },
}

impl ServerFrame {
    /// Builds a successful response.
    #[must_use]
    pub fn success(id: u64, data: serde_json::Value) -> Self {
        Self::Response {
            id,
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Builds a failed response.
    #[must_use]
    pub fn failure(id: u64, error: ErrorBody) -> Self {
        Self::Response {
            id,
            ok: false,
            data: None,
            error: Some(error),
        }
    }

    /// Builds a standalone error frame.
    #[must_use]
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorBody::new(code, message, false),
        }
    }

    /// Returns the wire `type` tag, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage { .. } => "new_message",
            Self::ConversationUpdated { .. } => "conversation_updated",
            Self::NewConversation { .. } => "new_conversation",
            Self::MessageRead { .. } => "message_read",
            Self::UserTyping { .. } => "user_typing",
            Self::Response { .. } => "response",
            Self::Error { .. } => "error",
        }
    }
}
