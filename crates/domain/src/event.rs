//! Event context — what an automation is being evaluated against.

use chrono::NaiveDateTime;

use crate::id::DeviceId;
use crate::value::Attributes;

/// The event that caused an evaluation, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EventContext {
    /// A device reported (part of) its state.
    DeviceState {
        device_id: DeviceId,
        /// The attributes carried by this report, not the merged cache entry.
        state: Attributes,
    },
    /// A periodic wall-clock tick.
    Time { at: NaiveDateTime },
    /// A named event was raised on the bus.
    Event { name: String },
}

impl EventContext {
    /// Short kind label, matching the trigger `type` names.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeviceState { .. } => "device_state",
            Self::Time { .. } => "time",
            Self::Event { .. } => "event",
        }
    }
}
