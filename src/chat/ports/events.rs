//! Port for publishing domain events.

use crate::chat::domain::ChatEvent;

/// Sink for domain events emitted by the chat service.
///
/// Publishing is fire-and-forget: an event with no interested subscriber is
/// simply dropped.
pub trait EventPublisher: Send + Sync {
    /// Publishes one event.
    fn publish(&self, event: ChatEvent);
}
