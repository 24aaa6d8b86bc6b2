//! Read models handed to clients: a conversation seen by one participant.

use super::{Conversation, Message, UserId, UserSummary};
use serde::{Deserialize, Serialize};

/// A conversation populated with participant display data, its latest
/// message, and the viewer's unread count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationView {
    /// The participant this view was built for.
    pub viewer: UserId,
    /// Conversation summary state.
    pub conversation: Conversation,
    /// Display data for both participants, in canonical pair order. A
    /// participant the directory no longer knows is omitted.
    pub participants: Vec<UserSummary>,
    /// The most recent message, when one has been sent.
    pub last_message: Option<Message>,
    /// Messages from the other participant that the viewer has not read.
    pub unread_count: u64,
}

impl ConversationView {
    /// Returns the display data of the participant who is not the viewer.
    #[must_use]
    pub fn counterpart(&self) -> Option<&UserSummary> {
        self.participants.iter().find(|user| user.id != self.viewer)
    }
}
