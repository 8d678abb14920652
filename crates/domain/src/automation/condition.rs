//! Condition — a guard that must hold for the automation to proceed.

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::device_state::StateLookup;
use crate::id::DeviceId;
use crate::time::{minutes_since_midnight, parse_time_of_day, weekday_name};
use crate::value::{self, AttributeValue};

use super::within_bounds;

define_kind!(
    /// Discriminant of a [`Condition`].
    ConditionKind {
        DeviceState => "device_state",
        NumericState => "numeric_state",
        Time => "time",
    }
);

/// One conjunct evaluated after a trigger fired.
///
/// Conditions are evaluated independently of which trigger fired, against
/// the device-state cache and the wall clock. Like [`Trigger`](super::Trigger)
/// the record is flat and loss-free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub above: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<f64>,
    /// Window start, `HH:MM`, inclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Window end, `HH:MM`, exclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// Allowed weekdays (`"monday"`, …); empty means every day.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weekday: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Condition {
    fn empty(kind: ConditionKind) -> Self {
        Self {
            kind,
            device_id: None,
            attribute: None,
            value: None,
            above: None,
            below: None,
            after: None,
            before: None,
            weekday: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn device_state(
        device_id: impl Into<DeviceId>,
        attribute: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self {
            device_id: Some(device_id.into()),
            attribute: Some(attribute.into()),
            value: Some(value.into()),
            ..Self::empty(ConditionKind::DeviceState)
        }
    }

    #[must_use]
    pub fn numeric_state(
        device_id: impl Into<DeviceId>,
        attribute: impl Into<String>,
        above: Option<f64>,
        below: Option<f64>,
    ) -> Self {
        Self {
            device_id: Some(device_id.into()),
            attribute: Some(attribute.into()),
            above,
            below,
            ..Self::empty(ConditionKind::NumericState)
        }
    }

    #[must_use]
    pub fn time_window(after: Option<&str>, before: Option<&str>) -> Self {
        Self {
            after: after.map(str::to_string),
            before: before.map(str::to_string),
            ..Self::empty(ConditionKind::Time)
        }
    }

    #[must_use]
    pub fn of_kind(kind: ConditionKind) -> Self {
        Self::empty(kind)
    }

    #[must_use]
    pub fn on_weekdays<I, S>(mut self, days: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.weekday = days.into_iter().map(Into::into).collect();
        self
    }

    /// Whether this condition holds for the given device states and wall clock.
    ///
    /// Unknown kinds always hold.
    #[must_use]
    pub fn holds<S: StateLookup + ?Sized>(&self, states: &S, now: NaiveDateTime) -> bool {
        match &self.kind {
            ConditionKind::DeviceState => {
                let Some(current) = self.lookup(states) else {
                    return false;
                };
                self.value
                    .as_ref()
                    .filter(|v| !v.is_null())
                    .is_some_and(|expected| value::equal(Some(&current), Some(expected)))
            }
            ConditionKind::NumericState => self
                .lookup(states)
                .and_then(|current| current.to_number())
                .is_some_and(|n| within_bounds(n, self.above, self.below)),
            ConditionKind::Time => self.time_holds(now),
            ConditionKind::Other(_) => true,
        }
    }

    fn lookup<S: StateLookup + ?Sized>(&self, states: &S) -> Option<AttributeValue> {
        let device_id = self.device_id.as_ref()?;
        let attribute = self.attribute.as_deref()?;
        states.attribute(device_id, attribute)
    }

    fn time_holds(&self, now: NaiveDateTime) -> bool {
        let current = minutes_since_midnight(now.time());
        let boundary = |b: &Option<String>| {
            b.as_deref()
                .and_then(parse_time_of_day)
                .map(minutes_since_midnight)
        };

        if boundary(&self.after).is_some_and(|after| current < after) {
            return false;
        }
        if boundary(&self.before).is_some_and(|before| current >= before) {
            return false;
        }
        if self.weekday.is_empty() {
            return true;
        }
        let today = weekday_name(now.weekday());
        self.weekday.iter().any(|d| d.eq_ignore_ascii_case(today))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::device_state::DeviceState;
    use crate::time::now;
    use crate::value::Attributes;

    fn states(device: &str, attribute: &str, value: AttributeValue) -> HashMap<DeviceId, DeviceState> {
        let id = DeviceId::new(device);
        let mut state = DeviceState::new(id.clone(), now());
        state.merge(
            &Attributes::from([(attribute.to_string(), value)]),
            None,
            now(),
        );
        HashMap::from([(id, state)])
    }

    /// 2024-03-04 is a Monday.
    fn monday_at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn tuesday_at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn should_hold_device_state_when_cached_value_equal() {
        let cache = states("lamp", "state", "on".into());
        let cond = Condition::device_state("lamp", "state", "on");
        assert!(cond.holds(&cache, monday_at(12, 0)));
    }

    #[test]
    fn should_hold_device_state_when_representations_differ() {
        let cache = states("sensor1", "temperature", AttributeValue::Float(22.0));
        let cond = Condition::device_state("sensor1", "temperature", "22");
        assert!(cond.holds(&cache, monday_at(12, 0)));
    }

    #[test]
    fn should_fail_device_state_when_device_not_cached() {
        let cache = HashMap::new();
        let cond = Condition::device_state("lamp", "state", "on");
        assert!(!cond.holds(&cache, monday_at(12, 0)));
    }

    #[test]
    fn should_fail_device_state_when_no_expected_value() {
        let cache = states("lamp", "state", "on".into());
        let mut cond = Condition::device_state("lamp", "state", "on");
        cond.value = None;
        assert!(!cond.holds(&cache, monday_at(12, 0)));
    }

    #[test]
    fn should_hold_numeric_state_when_strictly_within_bounds() {
        let cache = states("sensor1", "temperature", "21.5".into());
        let cond = Condition::numeric_state("sensor1", "temperature", Some(20.0), Some(25.0));
        assert!(cond.holds(&cache, monday_at(12, 0)));
    }

    #[test]
    fn should_fail_numeric_state_when_on_bound() {
        let cache = states("sensor1", "temperature", AttributeValue::Int(25));
        let cond = Condition::numeric_state("sensor1", "temperature", Some(20.0), Some(25.0));
        assert!(!cond.holds(&cache, monday_at(12, 0)));
    }

    #[test]
    fn should_treat_zero_bound_as_unbounded() {
        let cache = states("sensor1", "temperature", AttributeValue::Int(-3));
        let cond = Condition::numeric_state("sensor1", "temperature", Some(0.0), Some(0.0));
        assert!(cond.holds(&cache, monday_at(12, 0)));
    }

    #[test]
    fn should_fail_numeric_state_when_value_not_numeric() {
        let cache = states("sensor1", "temperature", "warm".into());
        let cond = Condition::numeric_state("sensor1", "temperature", None, None);
        assert!(!cond.holds(&cache, monday_at(12, 0)));
    }

    #[test]
    fn should_hold_time_window_inside_and_fail_outside() {
        let cache = HashMap::new();
        let cond = Condition::time_window(Some("08:00"), Some("18:00"));
        assert!(cond.holds(&cache, monday_at(12, 0)));
        assert!(cond.holds(&cache, tuesday_at(12, 0)));
        assert!(cond.holds(&cache, monday_at(8, 0)));
        assert!(!cond.holds(&cache, monday_at(18, 0)));
        assert!(!cond.holds(&cache, monday_at(19, 0)));
        assert!(!cond.holds(&cache, monday_at(7, 59)));
    }

    #[test]
    fn should_ignore_invalid_time_boundary() {
        let cache = HashMap::new();
        let cond = Condition::time_window(Some("later"), Some("18:00"));
        assert!(cond.holds(&cache, monday_at(1, 0)));
        assert!(Condition::of_kind(ConditionKind::Time).holds(&cache, monday_at(23, 59)));
    }

    #[test]
    fn should_fail_time_window_when_weekday_not_allowed() {
        let cache = HashMap::new();
        let cond = Condition::time_window(Some("08:00"), Some("18:00")).on_weekdays(["monday"]);
        assert!(cond.holds(&cache, monday_at(12, 0)));
        assert!(!cond.holds(&cache, tuesday_at(12, 0)));
    }

    #[test]
    fn should_match_weekday_case_insensitively() {
        let cache = HashMap::new();
        let cond = Condition::time_window(None, None).on_weekdays(["Monday"]);
        assert!(cond.holds(&cache, monday_at(3, 0)));
    }

    #[test]
    fn should_hold_unknown_condition_kind() {
        let cache = HashMap::new();
        let cond: Condition =
            serde_json::from_str(r#"{"type":"sun","after":"sunset"}"#).unwrap();
        assert_eq!(cond.kind, ConditionKind::Other("sun".to_string()));
        assert!(cond.holds(&cache, monday_at(12, 0)));
    }
}
