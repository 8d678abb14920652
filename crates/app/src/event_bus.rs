//! In-process message bus backed by a tokio broadcast channel.
//!
//! This is the embedded transport: it lets the engine run inside another
//! process, or under test, with no broker. The daemon publishes through
//! the MQTT adapter instead.

use std::future::Future;

use tokio::sync::broadcast;

use homeflow_domain::error::HomeflowError;
use homeflow_domain::message::Outbound;

use crate::ports::MessagePublisher;

/// In-process bus using a tokio [`broadcast`] channel.
///
/// Outbound only: callers feed inbound messages to
/// [`AutomationEngine::handle`](crate::engine::AutomationEngine::handle) or
/// [`AutomationEngine::run`](crate::engine::AutomationEngine::run)
/// themselves. Publishing succeeds even when there are no active subscribers
/// (the message is simply dropped).
pub struct InProcessBus {
    sender: broadcast::Sender<Outbound>,
}

impl InProcessBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to messages published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.sender.subscribe()
    }
}

impl MessagePublisher for InProcessBus {
    fn publish(&self, message: Outbound) -> impl Future<Output = Result<(), HomeflowError>> + Send {
        // Only fails when nobody is subscribed.
        let _ = self.sender.send(message);
        async { Ok(()) }
    }
}
