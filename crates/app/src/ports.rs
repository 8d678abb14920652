//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the engine and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod automation_registry;
pub mod clock;
pub mod message_bus;

pub use automation_registry::AutomationRegistry;
pub use clock::{Clock, SystemClock};
pub use message_bus::MessagePublisher;
