//! Bus messages — the subjects and payloads the engine consumes and produces.
//!
//! Subjects are dot-separated (`home.devices.light.l1.command`); transports
//! map them onto their own addressing. Payloads are JSON objects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::DecodeError;
use crate::id::{AutomationId, DeviceId};
use crate::time::Timestamp;
use crate::value::{AttributeValue, Attributes};

/// Well-known subjects.
pub mod subject {
    /// Device state reports, `home.devices.<type>.<device_id>.state`.
    pub const DEVICE_STATE: &str = "home.devices.*.*.state";
    /// Automation change notifications.
    pub const AUTOMATION_EVENTS: &str = "home.automations.events";
    /// Periodic wall-clock tick.
    pub const TIME_TICK: &str = "home.time.tick";
    /// Manual test runs requested by a management front end.
    pub const AUTOMATION_TEST: &str = "home.automations.test";
    /// Named events feeding `event` triggers.
    pub const EVENT_TRIGGER: &str = "home.events.trigger";
    /// Outbound notifications.
    pub const NOTIFICATIONS: &str = "home.notifications.send";

    /// Every subject the engine subscribes to.
    pub const SUBSCRIPTIONS: [&str; 5] = [
        DEVICE_STATE,
        AUTOMATION_EVENTS,
        TIME_TICK,
        AUTOMATION_TEST,
        EVENT_TRIGGER,
    ];

    #[must_use]
    pub fn device_state(device_type: &str, device_id: &str) -> String {
        format!("home.devices.{device_type}.{device_id}.state")
    }

    #[must_use]
    pub fn device_command(device_type: &str, device_id: &str) -> String {
        format!("home.devices.{device_type}.{device_id}.command")
    }

    #[must_use]
    pub fn scene_activate(scene: &str) -> String {
        format!("home.scenes.{scene}.activate")
    }

    #[must_use]
    pub fn system_event(event_type: &str) -> String {
        format!("home.events.system.{event_type}")
    }
}

/// What changed about an automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Enabled,
    Deleted,
    Disabled,
    #[serde(other)]
    Unknown,
}

/// An automation change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(default)]
    pub automation_id: AutomationId,
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    DeviceState {
        device_id: DeviceId,
        device_type: Option<String>,
        attributes: Attributes,
    },
    AutomationChanged(AutomationChange),
    TimeTick,
    NamedEvent {
        name: String,
    },
    TestRun {
        automation_id: AutomationId,
    },
}

impl Inbound {
    /// Decode a message received on subject `address`.
    ///
    /// Returns `Ok(None)` for subjects the engine does not handle.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the payload is not the expected JSON
    /// shape for its subject.
    pub fn decode(address: &str, payload: &[u8]) -> Result<Option<Self>, DecodeError> {
        let inbound = match address {
            subject::AUTOMATION_EVENTS => {
                Self::AutomationChanged(serde_json::from_slice(payload)?)
            }
            subject::TIME_TICK => Self::TimeTick,
            subject::AUTOMATION_TEST => {
                let object = decode_object(payload)?;
                let automation_id = string_field(&object, "automation_id")
                    .ok_or(DecodeError::MissingField("automation_id"))?;
                Self::TestRun {
                    automation_id: AutomationId::new(automation_id),
                }
            }
            subject::EVENT_TRIGGER => {
                let object = decode_object(payload)?;
                let name =
                    string_field(&object, "event").ok_or(DecodeError::MissingField("event"))?;
                Self::NamedEvent {
                    name: name.to_string(),
                }
            }
            other => match parse_device_state_subject(other) {
                Some((subject_type, subject_id)) => {
                    decode_device_state(subject_type, subject_id, payload)?
                }
                None => return Ok(None),
            },
        };
        Ok(Some(inbound))
    }
}

/// Split `home.devices.<type>.<id>.state` into `(type, id)`.
fn parse_device_state_subject(subject: &str) -> Option<(&str, &str)> {
    let rest = subject.strip_prefix("home.devices.")?;
    let rest = rest.strip_suffix(".state")?;
    let (device_type, device_id) = rest.split_once('.')?;
    if device_id.contains('.') {
        return None;
    }
    Some((device_type, device_id))
}

fn decode_device_state(
    subject_type: &str,
    subject_id: &str,
    payload: &[u8],
) -> Result<Inbound, DecodeError> {
    let object = decode_object(payload)?;
    let device_id = string_field(&object, "device_id")
        .or(Some(subject_id).filter(|id| !id.is_empty()))
        .ok_or(DecodeError::MissingField("device_id"))?;
    let device_type = string_field(&object, "type")
        .or(Some(subject_type))
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Ok(Inbound::DeviceState {
        device_id: DeviceId::new(device_id),
        device_type,
        attributes: object
            .into_iter()
            .map(|(k, v)| (k, AttributeValue::from(v)))
            .collect(),
    })
}

fn decode_object(payload: &[u8]) -> Result<Map<String, Value>, DecodeError> {
    Ok(serde_json::from_slice(payload)?)
}

fn string_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

/// An outbound message ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub subject: String,
    pub payload: Value,
}

impl Outbound {
    /// A command for one device. `data` fields are merged last and may
    /// override the standard ones.
    #[must_use]
    pub fn device_command(
        device_type: &str,
        device_id: &DeviceId,
        command: Option<&str>,
        data: &Map<String, Value>,
        at: Timestamp,
    ) -> Self {
        let mut payload = Map::new();
        payload.insert("device_id".to_string(), json!(device_id));
        payload.insert("command".to_string(), json!(command.unwrap_or_default()));
        payload.insert("timestamp".to_string(), json!(at.timestamp()));
        payload.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            subject: subject::device_command(device_type, device_id.as_str()),
            payload: Value::Object(payload),
        }
    }

    #[must_use]
    pub fn scene_activation(scene: &str, at: Timestamp) -> Self {
        Self {
            subject: subject::scene_activate(scene),
            payload: json!({
                "scene_id": scene,
                "timestamp": at.timestamp(),
            }),
        }
    }

    /// A notification built from the `title`, `message` and `priority`
    /// entries of `data`; missing entries are sent as `null`.
    #[must_use]
    pub fn notification(data: &Map<String, Value>, at: Timestamp) -> Self {
        let field = |key: &str| data.get(key).cloned().unwrap_or(Value::Null);
        Self {
            subject: subject::NOTIFICATIONS.to_string(),
            payload: json!({
                "message": field("message"),
                "title": field("title"),
                "priority": field("priority"),
                "timestamp": at.timestamp(),
            }),
        }
    }

    /// A system lifecycle event such as `service_started`.
    #[must_use]
    pub fn lifecycle(event_type: &str, data: Value, at: Timestamp) -> Self {
        Self {
            subject: subject::system_event(event_type),
            payload: json!({
                "timestamp": at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                "event_type": event_type,
                "data": data,
            }),
        }
    }

    /// Serialize the payload for the wire.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the payload cannot be encoded.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.payload)
    }
}
