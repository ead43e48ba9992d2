//! In-process message bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use commoniot_domain::message::Message;

use crate::ports::MessagePublisher;

/// In-process bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers (the
/// message is simply dropped). A subscriber that falls more than `capacity`
/// messages behind observes `RecvError::Lagged` and skips ahead.
#[derive(Debug, Clone)]
pub struct InProcessBus {
    sender: broadcast::Sender<Message>,
}

impl InProcessBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to messages published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl MessagePublisher for InProcessBus {
    fn publish(&self, message: Message) {
        // Only fails when nobody is subscribed.
        let _ = self.sender.send(message);
    }
}
