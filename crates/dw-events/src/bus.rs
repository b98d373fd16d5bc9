use crate::types::StoredEvent;
use tokio::sync::broadcast;

/// Fan-out of committed events to live subscribers. Publishing with no
/// subscribers is not an error for callers; they ignore the result.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoredEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoredEvent> {
        self.sender.subscribe()
    }

    pub fn publish(
        &self,
        event: StoredEvent,
    ) -> Result<(), broadcast::error::SendError<StoredEvent>> {
        self.sender.send(event).map(|_| ())
    }
}
