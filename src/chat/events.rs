//! In-process event bus relaying domain events from the chat service to
//! realtime transports.
//!
//! The bus is a thin wrapper over [`tokio::sync::broadcast`]: every
//! subscription sees every event published after it subscribed. A subscriber
//! that falls more than `capacity` events behind skips the overflow and keeps
//! going; it never blocks the publisher.

use crate::chat::{domain::ChatEvent, ports::EventPublisher};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Broadcast relay for [`ChatEvent`]s.
///
/// Cloning the bus yields another handle to the same channel.
///
/// # Examples
///
/// ```
/// use tandem::chat::events::EventBus;
///
/// let bus = EventBus::new(16);
/// let _subscription = bus.subscribe();
/// assert_eq!(bus.subscriber_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    /// Creates a bus that buffers up to `capacity` events per subscriber.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Registers a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: ChatEvent) {
        let name = event.name();
        let conversation_id = event.conversation_id();
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(event = name, %conversation_id, receivers, "published chat event");
            }
            Err(_) => {
                debug!(event = name, %conversation_id, "no subscribers for chat event");
            }
        }
    }
}

/// A subscription to the [`EventBus`].
#[derive(Debug)]
pub struct EventSubscription {
    receiver: broadcast::Receiver<ChatEvent>,
}

impl EventSubscription {
    /// Waits for the next event.
    ///
    /// Returns `None` once every bus handle has been dropped.
    pub async fn next(&mut self) -> Option<ChatEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged; skipping events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next event if one is already buffered.
    pub fn try_next(&mut self) -> Option<ChatEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged; skipping events");
                }
                Err(_) => return None,
            }
        }
    }
}
