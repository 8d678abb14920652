//! Device state — the last-known attributes of a device.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::id::DeviceId;
use crate::time::Timestamp;
use crate::value::{AttributeValue, Attributes};

/// Device type used when a command targets a device whose type is unknown.
pub const UNKNOWN_DEVICE_TYPE: &str = "unknown";

/// Accumulated state of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub device_id: DeviceId,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    pub state: Attributes,
    pub online: bool,
    pub last_update: Timestamp,
}

impl DeviceState {
    /// An empty, online state for a device seen for the first time.
    #[must_use]
    pub fn new(device_id: DeviceId, at: Timestamp) -> Self {
        Self {
            device_id,
            device_type: None,
            state: Attributes::new(),
            online: true,
            last_update: at,
        }
    }

    /// Merge newly reported attributes into this state.
    ///
    /// Existing attributes not present in `attributes` are kept. A known
    /// device type is never cleared by a report that omits it.
    pub fn merge(&mut self, attributes: &Attributes, device_type: Option<&str>, at: Timestamp) {
        for (name, value) in attributes {
            self.state.insert(name.clone(), value.clone());
        }
        if let Some(device_type) = device_type.filter(|t| !t.is_empty()) {
            self.device_type = Some(device_type.to_string());
        }
        self.online = true;
        self.last_update = at;
    }

    /// Look up one attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.state.get(name)
    }

    /// The device type for addressing commands, or [`UNKNOWN_DEVICE_TYPE`].
    #[must_use]
    pub fn device_type_or_unknown(&self) -> &str {
        self.device_type.as_deref().unwrap_or(UNKNOWN_DEVICE_TYPE)
    }
}

/// Read access to last-known device attributes.
///
/// Conditions are evaluated against this trait so the domain does not
/// care how (or where) the cache is stored.
pub trait StateLookup {
    /// The current value of `attribute` on `device_id`, if known.
    fn attribute(&self, device_id: &DeviceId, attribute: &str) -> Option<AttributeValue>;
}

impl StateLookup for HashMap<DeviceId, DeviceState> {
    fn attribute(&self, device_id: &DeviceId, attribute: &str) -> Option<AttributeValue> {
        self.get(device_id)?.attribute(attribute).cloned()
    }
}
