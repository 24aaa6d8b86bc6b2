//! Domain model for two-party chat.
//!
//! Pure types with no infrastructure dependencies: identifiers, the
//! conversation aggregate, messages and their read state, user display data,
//! read models, and the domain events emitted after mutations.

mod conversation;
mod error;
mod event;
mod ids;
mod message;
mod user;
mod view;

pub use conversation::{Conversation, ParticipantPair, PersistedConversationData};
pub use error::{ChatDomainError, ParseMessageKindError};
pub use event::ChatEvent;
pub use ids::{ConversationId, MessageId, UserId};
pub use message::{
    Message, MessageContent, MessageDraft, MessageKind, PersistedMessageData,
};
pub use user::UserSummary;
pub use view::ConversationView;
