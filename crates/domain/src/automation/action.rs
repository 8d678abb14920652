//! Action — one effect performed when an automation fires.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::id::DeviceId;

define_kind!(
    /// Discriminant of an [`Action`].
    ActionKind {
        DeviceCommand => "device_command",
        SceneActivate => "scene_activate",
        Notification => "notification",
    }
);

/// One step of an automation's effect list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Free-form parameters: command passthrough fields, or the
    /// `title`/`message`/`priority` of a notification.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    /// Seconds to wait before this action runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Action {
    fn empty(kind: ActionKind) -> Self {
        Self {
            kind,
            device_id: None,
            command: None,
            data: serde_json::Map::new(),
            scene: None,
            delay: None,
            service: None,
            extra: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn device_command(device_id: impl Into<DeviceId>, command: impl Into<String>) -> Self {
        Self {
            device_id: Some(device_id.into()),
            command: Some(command.into()),
            ..Self::empty(ActionKind::DeviceCommand)
        }
    }

    #[must_use]
    pub fn scene(scene: impl Into<String>) -> Self {
        Self {
            scene: Some(scene.into()),
            ..Self::empty(ActionKind::SceneActivate)
        }
    }

    #[must_use]
    pub fn notification(title: &str, message: &str) -> Self {
        Self::empty(ActionKind::Notification)
            .with_data("title", title)
            .with_data("message", message)
    }

    #[must_use]
    pub fn of_kind(kind: ActionKind) -> Self {
        Self::empty(kind)
    }

    #[must_use]
    pub fn with_data(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_delay(mut self, seconds: i64) -> Self {
        self.delay = Some(seconds);
        self
    }

    /// The wait before this action, if any. Zero and negative delays are ignored.
    #[must_use]
    pub fn delay(&self) -> Option<Duration> {
        self.delay
            .and_then(|s| u64::try_from(s).ok())
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }
}
