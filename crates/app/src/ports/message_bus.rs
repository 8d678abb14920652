//! Message bus port — publishing outbound messages.

use std::future::Future;

use homeflow_domain::error::HomeflowError;
use homeflow_domain::message::Outbound;

/// Publishes messages to the bus.
pub trait MessagePublisher {
    /// Publish one message. Delivery is fire-and-forget: success means the
    /// transport accepted the message, not that anyone received it.
    fn publish(&self, message: Outbound) -> impl Future<Output = Result<(), HomeflowError>> + Send;
}

impl<T: MessagePublisher + Send + Sync> MessagePublisher for std::sync::Arc<T> {
    fn publish(&self, message: Outbound) -> impl Future<Output = Result<(), HomeflowError>> + Send {
        (**self).publish(message)
    }
}
