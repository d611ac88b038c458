//! In-process event bus.
//!
//! Mutating routes publish invalidation events; subscribers (cache layers,
//! websocket fan-out in the future) revalidate whatever the event names.
//! Lossy by design: a slow subscriber that lags past the channel capacity
//! misses events and must do a full refresh.

use tokio::sync::broadcast;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// Something changed that consumers may have cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    CommunityChanged { community_id: Uuid },
    CommunityListChanged,
    DocumentChanged { document_id: Uuid },
    SessionEstablished { user_id: String },
}

/// Broadcast bus handle. Cloning shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event. A bus with no subscribers drops it silently.
    pub fn publish(&self, event: Event) {
        if let Err(e) = self.sender.send(event) {
            tracing::debug!("Event dropped (no subscribers): {:?}", e.0);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
