//! Broadcast bus carrying `ChatEvent`s to live observers.
//!
//! Publishing never blocks and never fails: with no subscribers the event is
//! dropped, and a slow subscriber sees `Lagged` rather than stalling a turn.

use parley_types::chat::SessionId;
use parley_types::event::ChatEvent;
use tokio::sync::broadcast;

/// Default channel capacity. Fragments are small and frequent.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ChatEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

/// Whether `event` concerns `session_id`. Used by per-session observers.
pub fn is_for_session(event: &ChatEvent, session_id: &SessionId) -> bool {
    event.session_id() == *session_id
}
