//! Trigger — one event pattern that can fire an automation.

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::event::EventContext;
use crate::id::DeviceId;
use crate::time::parse_time_of_day;
use crate::value::{self, AttributeValue};

use super::within_bounds;

define_kind!(
    /// Discriminant of a [`Trigger`].
    TriggerKind {
        DeviceState => "device_state",
        Time => "time",
        TimePattern => "time_pattern",
        Event => "event",
    }
);

/// One disjunct of an automation's firing condition.
///
/// The record is flat: `kind` decides which fields are meaningful and the
/// rest are ignored. Fields this version does not know about are kept in
/// `extra` so they survive a round trip through the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Exact expected value; takes precedence over `above`/`below`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub above: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<f64>,
    /// `HH:MM` wall-clock time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Trigger {
    fn empty(kind: TriggerKind) -> Self {
        Self {
            kind,
            device_id: None,
            attribute: None,
            value: None,
            above: None,
            below: None,
            time: None,
            event: None,
            extra: serde_json::Map::new(),
        }
    }

    /// A `device_state` trigger on `attribute` of `device_id`.
    ///
    /// Refine it with [`Trigger::equal_to`] or [`Trigger::between`].
    #[must_use]
    pub fn device_state(device_id: impl Into<DeviceId>, attribute: impl Into<String>) -> Self {
        Self {
            device_id: Some(device_id.into()),
            attribute: Some(attribute.into()),
            ..Self::empty(TriggerKind::DeviceState)
        }
    }

    /// A `time` trigger firing at `HH:MM`.
    #[must_use]
    pub fn at(time: impl Into<String>) -> Self {
        Self {
            time: Some(time.into()),
            ..Self::empty(TriggerKind::Time)
        }
    }

    /// An `event` trigger on the named event.
    #[must_use]
    pub fn on_event(name: impl Into<String>) -> Self {
        Self {
            event: Some(name.into()),
            ..Self::empty(TriggerKind::Event)
        }
    }

    /// A trigger of an arbitrary kind with no fields set.
    #[must_use]
    pub fn of_kind(kind: TriggerKind) -> Self {
        Self::empty(kind)
    }

    #[must_use]
    pub fn equal_to(mut self, value: impl Into<AttributeValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn between(mut self, above: Option<f64>, below: Option<f64>) -> Self {
        self.above = above;
        self.below = below;
        self
    }

    /// Whether this trigger is satisfied by `ctx`.
    ///
    /// A context of another kind never matches. `time_pattern` and unknown
    /// kinds never match.
    #[must_use]
    pub fn matches(&self, ctx: &EventContext) -> bool {
        match (&self.kind, ctx) {
            (TriggerKind::DeviceState, EventContext::DeviceState { device_id, state }) => {
                if self.device_id.as_ref() != Some(device_id) {
                    return false;
                }
                let Some(reported) = self.attribute.as_deref().and_then(|a| state.get(a)) else {
                    return false;
                };
                if let Some(expected) = self.value.as_ref().filter(|v| !v.is_null()) {
                    return value::equal(Some(reported), Some(expected));
                }
                reported
                    .to_number()
                    .is_none_or(|n| within_bounds(n, self.above, self.below))
            }
            (TriggerKind::Time, EventContext::Time { at }) => self
                .time
                .as_deref()
                .and_then(parse_time_of_day)
                .is_some_and(|t| t.hour() == at.hour() && t.minute() == at.minute()),
            (TriggerKind::Event, EventContext::Event { name }) => {
                self.event.as_deref() == Some(name.as_str())
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::value::Attributes;

    fn state_event(device: &str, attribute: &str, value: AttributeValue) -> EventContext {
        EventContext::DeviceState {
            device_id: DeviceId::new(device),
            state: Attributes::from([(attribute.to_string(), value)]),
        }
    }

    fn tick(hour: u32, minute: u32) -> EventContext {
        EventContext::Time {
            at: NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(hour, minute, 42)
                .unwrap(),
        }
    }

    #[test]
    fn should_match_when_value_strictly_between_bounds() {
        let trigger =
            Trigger::device_state("sensor1", "temperature").between(Some(20.0), Some(30.0));
        assert!(trigger.matches(&state_event("sensor1", "temperature", AttributeValue::Int(25))));
        assert!(trigger.matches(&state_event("sensor1", "temperature", 20.5.into())));
    }

    #[test]
    fn should_not_match_when_value_exactly_on_bound() {
        let trigger =
            Trigger::device_state("sensor1", "temperature").between(Some(20.0), Some(30.0));
        assert!(!trigger.matches(&state_event("sensor1", "temperature", AttributeValue::Int(20))));
        assert!(!trigger.matches(&state_event("sensor1", "temperature", AttributeValue::Int(30))));
        assert!(!trigger.matches(&state_event("sensor1", "temperature", AttributeValue::Int(35))));
    }

    #[test]
    fn should_coerce_numeric_strings_when_checking_bounds() {
        let trigger = Trigger::device_state("sensor1", "temperature").between(Some(20.0), None);
        assert!(trigger.matches(&state_event("sensor1", "temperature", "25".into())));
        assert!(!trigger.matches(&state_event("sensor1", "temperature", "19".into())));
    }

    #[test]
    fn should_ignore_zero_bound_when_checking_bounds() {
        let trigger = Trigger::device_state("sensor1", "temperature").between(Some(0.0), None);
        assert!(trigger.matches(&state_event("sensor1", "temperature", AttributeValue::Int(-5))));
    }

    #[test]
    fn should_match_non_numeric_value_when_only_bounds_given() {
        let trigger = Trigger::device_state("door", "state").between(Some(20.0), None);
        assert!(trigger.matches(&state_event("door", "state", "open".into())));
    }

    #[test]
    fn should_match_expected_value_across_representations() {
        let trigger = Trigger::device_state("sensor1", "temperature").equal_to(22_i64);
        assert!(trigger.matches(&state_event("sensor1", "temperature", "22".into())));
        assert!(trigger.matches(&state_event("sensor1", "temperature", 22.0.into())));
        assert!(!trigger.matches(&state_event("sensor1", "temperature", AttributeValue::Int(23))));
    }

    #[test]
    fn should_not_match_when_device_differs() {
        let trigger = Trigger::device_state("sensor1", "temperature");
        assert!(!trigger.matches(&state_event("sensor2", "temperature", AttributeValue::Int(25))));
    }

    #[test]
    fn should_not_match_when_attribute_missing_from_report() {
        let trigger = Trigger::device_state("sensor1", "temperature");
        assert!(!trigger.matches(&state_event("sensor1", "humidity", AttributeValue::Int(25))));
    }

    #[test]
    fn should_match_time_trigger_on_exact_minute() {
        let trigger = Trigger::at("08:30");
        assert!(trigger.matches(&tick(8, 30)));
        assert!(!trigger.matches(&tick(8, 31)));
        assert!(!trigger.matches(&tick(20, 30)));
    }

    #[test]
    fn should_not_match_time_trigger_when_time_is_malformed() {
        assert!(!Trigger::at("8h30").matches(&tick(8, 30)));
        assert!(!Trigger::of_kind(TriggerKind::Time).matches(&tick(8, 30)));
    }

    #[test]
    fn should_match_event_trigger_by_exact_name() {
        let trigger = Trigger::on_event("doorbell");
        let ctx = |name: &str| EventContext::Event {
            name: name.to_string(),
        };
        assert!(trigger.matches(&ctx("doorbell")));
        assert!(!trigger.matches(&ctx("Doorbell")));
    }

    #[test]
    fn should_not_match_when_context_kind_differs() {
        let trigger = Trigger::at("08:30");
        assert!(!trigger.matches(&state_event("sensor1", "temperature", AttributeValue::Int(25))));
    }

    #[test]
    fn should_never_match_time_pattern_trigger() {
        let trigger = Trigger::of_kind(TriggerKind::TimePattern);
        assert!(!trigger.matches(&tick(8, 30)));
    }

    #[test]
    fn should_keep_unknown_kind_and_fields_when_round_tripped() {
        let json = r#"{"type":"sun","event":"sunset","offset":"-00:30"}"#;
        let trigger: Trigger = serde_json::from_str(json).unwrap();
        assert_eq!(trigger.kind, TriggerKind::Other("sun".to_string()));
        assert!(!trigger.matches(&EventContext::Event {
            name: "sunset".to_string()
        }));

        let back: serde_json::Value = serde_json::to_value(&trigger).unwrap();
        assert_eq!(back["type"], "sun");
        assert_eq!(back["offset"], "-00:30");
    }
}
