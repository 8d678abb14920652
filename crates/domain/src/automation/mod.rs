//! Automation — trigger → condition → action rules.
//!
//! An automation fires when **any** of its [`Trigger`]s matches the
//! incoming event and **all** of its [`Condition`]s hold, then runs its
//! [`Action`]s in order.
//!
//! Records are authored by other services and stored in a shared
//! registry. Kinds and fields this crate does not understand are kept
//! verbatim (`Other(_)` kinds and `extra` maps) so that writing back run
//! metadata never loses data.

/// Declare a string-backed kind enum with an `Other` fallback.
macro_rules! define_kind {
    ($(#[doc = $doc:expr])* $name:ident { $($variant:ident => $tag:literal,)+ }) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            /// A kind this version does not understand, kept verbatim.
            Other(String),
        }

        impl $name {
            /// The wire name of this kind.
            #[must_use]
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $tag,)+
                    Self::Other(raw) => raw,
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                let known = match value.as_str() {
                    $($tag => Some(Self::$variant),)+
                    _ => None,
                };
                known.unwrap_or_else(|| Self::Other(value))
            }
        }

        impl From<$name> for String {
            fn from(kind: $name) -> Self {
                match kind {
                    $name::Other(raw) => raw,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

mod action;
mod condition;
mod trigger;

pub use action::{Action, ActionKind};
pub use condition::{Condition, ConditionKind};
pub use trigger::{Trigger, TriggerKind};

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::device_state::StateLookup;
use crate::error::{HomeflowError, ValidationError};
use crate::event::EventContext;
use crate::id::{AutomationId, DeviceId};
use crate::time::Timestamp;

/// Strict exclusive bounds check where a zero bound means "unbounded".
#[allow(clippy::float_cmp)]
pub(crate) fn within_bounds(value: f64, above: Option<f64>, below: Option<f64>) -> bool {
    let bound = |b: Option<f64>| b.filter(|b| *b != 0.0);
    bound(above).is_none_or(|above| value > above)
        && bound(below).is_none_or(|below| value < below)
}

/// Accept `null` wherever a defaulted collection is expected.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A user-authored rule with its run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    pub id: AutomationId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub triggers: Vec<Trigger>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conditions: Vec<Condition>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<Timestamp>,
    #[serde(default)]
    pub run_count: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Automation {
    /// Create a builder for constructing an [`Automation`].
    #[must_use]
    pub fn builder() -> AutomationBuilder {
        AutomationBuilder::default()
    }

    /// Check the invariants a stored record must satisfy to be loaded.
    ///
    /// # Errors
    ///
    /// Returns [`HomeflowError::Validation`] when `id` is empty.
    pub fn validate(&self) -> Result<(), HomeflowError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        Ok(())
    }

    /// Whether at least one trigger matches `ctx`.
    #[must_use]
    pub fn is_triggered_by(&self, ctx: &EventContext) -> bool {
        self.triggers.iter().any(|t| t.matches(ctx))
    }

    /// Whether every condition holds. An empty list holds.
    #[must_use]
    pub fn conditions_hold<S: StateLookup + ?Sized>(&self, states: &S, now: NaiveDateTime) -> bool {
        self.conditions.iter().all(|c| c.holds(states, now))
    }

    /// Whether a `device_state` trigger names `device_id`.
    #[must_use]
    pub fn has_device_trigger(&self, device_id: &DeviceId) -> bool {
        self.triggers.iter().any(|t| {
            t.kind == TriggerKind::DeviceState && t.device_id.as_ref() == Some(device_id)
        })
    }

    /// Whether a `time` or `time_pattern` trigger is present.
    #[must_use]
    pub fn has_time_trigger(&self) -> bool {
        self.triggers
            .iter()
            .any(|t| matches!(t.kind, TriggerKind::Time | TriggerKind::TimePattern))
    }

    #[must_use]
    pub fn has_event_trigger(&self) -> bool {
        self.triggers.iter().any(|t| t.kind == TriggerKind::Event)
    }

    /// Record one successful run at `at`.
    pub fn record_run(&mut self, at: Timestamp) {
        self.run_count += 1;
        self.last_run = Some(at);
    }
}

/// Step-by-step builder for [`Automation`].
#[derive(Debug, Default)]
pub struct AutomationBuilder {
    id: Option<AutomationId>,
    name: Option<String>,
    description: String,
    enabled: Option<bool>,
    triggers: Vec<Trigger>,
    conditions: Vec<Condition>,
    actions: Vec<Action>,
    created_at: Option<Timestamp>,
}

impl AutomationBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<AutomationId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return an [`Automation`].
    ///
    /// # Errors
    ///
    /// Returns [`HomeflowError::Validation`] if the id or name is missing or empty.
    pub fn build(self) -> Result<Automation, HomeflowError> {
        let automation = Automation {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            description: self.description,
            enabled: self.enabled.unwrap_or(true),
            triggers: self.triggers,
            conditions: self.conditions,
            actions: self.actions,
            created_at: self.created_at,
            updated_at: self.created_at,
            last_run: None,
            run_count: 0,
            extra: serde_json::Map::new(),
        };
        automation.validate()?;
        if automation.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(automation)
    }
}
