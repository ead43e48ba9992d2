//! Bus port: fire-and-forget publication of outbound messages.

use commoniot_domain::message::Message;

/// Publishes messages to whoever listens on the bus.
///
/// Publication never blocks and never fails from the caller's point of view:
/// the registry calls this while scanners are running, and a slow or absent
/// listener must not hold them up.
pub trait MessagePublisher: Send + Sync {
    fn publish(&self, message: Message);
}

impl<T: MessagePublisher + ?Sized> MessagePublisher for std::sync::Arc<T> {
    fn publish(&self, message: Message) {
        (**self).publish(message);
    }
}

/// Publisher that drops everything, for components run without a bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl MessagePublisher for NoopPublisher {
    fn publish(&self, _message: Message) {}
}
