//! In-memory fakes for the ports, shared by the unit tests of this crate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};

use homeflow_domain::automation::Automation;
use homeflow_domain::error::{DecodeError, HomeflowError};
use homeflow_domain::id::AutomationId;
use homeflow_domain::message::Outbound;
use homeflow_domain::time::Timestamp;

use crate::ports::{AutomationRegistry, Clock, MessagePublisher};

// ── Registry ───────────────────────────────────────────────────────

/// Registry holding raw JSON records, so malformed entries can be tested.
#[derive(Default)]
pub struct InMemoryRegistry {
    records: Mutex<HashMap<AutomationId, String>>,
    fail_puts: Mutex<bool>,
    read_delay: Mutex<Duration>,
}

impl InMemoryRegistry {
    pub fn with(automations: Vec<Automation>) -> Self {
        let registry = Self::default();
        for automation in automations {
            registry.insert(&automation);
        }
        registry
    }

    pub fn insert(&self, automation: &Automation) {
        let json = serde_json::to_string(automation).unwrap();
        self.records
            .lock()
            .unwrap()
            .insert(automation.id.clone(), json);
    }

    pub fn insert_raw(&self, id: &str, raw: &str) {
        self.records
            .lock()
            .unwrap()
            .insert(AutomationId::new(id), raw.to_string());
    }

    pub fn stored(&self, id: &str) -> Option<Automation> {
        let records = self.records.lock().unwrap();
        records
            .get(id)
            .map(|raw| serde_json::from_str(raw).unwrap())
    }

    pub fn remove(&self, id: &str) {
        self.records.lock().unwrap().remove(id);
    }

    pub fn fail_puts(&self) {
        *self.fail_puts.lock().unwrap() = true;
    }

    /// Make every `get` take `delay` (tokio time) before answering.
    pub fn slow_reads(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = delay;
    }
}

impl AutomationRegistry for InMemoryRegistry {
    fn keys(&self) -> impl Future<Output = Result<Vec<AutomationId>, HomeflowError>> + Send {
        let keys = self.records.lock().unwrap().keys().cloned().collect();
        async { Ok(keys) }
    }

    fn get(
        &self,
        id: &AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, HomeflowError>> + Send {
        let delay = *self.read_delay.lock().unwrap();
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let raw = self.records.lock().unwrap().get(id).cloned();
            raw.map(|raw| serde_json::from_str(&raw))
                .transpose()
                .map_err(|err| HomeflowError::Decode(DecodeError::Json(err)))
        }
    }

    fn put(
        &self,
        automation: &Automation,
    ) -> impl Future<Output = Result<(), HomeflowError>> + Send {
        let result = if *self.fail_puts.lock().unwrap() {
            Err(HomeflowError::Storage("registry unavailable".into()))
        } else {
            self.insert(automation);
            Ok(())
        };
        async { result }
    }
}

// ── Publisher ──────────────────────────────────────────────────────

/// Publisher recording every message with the (tokio) instant it was sent.
#[derive(Default)]
pub struct SpyPublisher {
    sent: Mutex<Vec<(Outbound, tokio::time::Instant)>>,
    failing_subject: Option<String>,
}

impl SpyPublisher {
    pub fn failing_on(subject: &str) -> Self {
        Self {
            failing_subject: Some(subject.to_string()),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.subject.clone())
            .collect()
    }

    pub fn sent_at(&self) -> Vec<tokio::time::Instant> {
        self.sent.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

impl MessagePublisher for SpyPublisher {
    fn publish(&self, message: Outbound) -> impl Future<Output = Result<(), HomeflowError>> + Send {
        let result = if self.failing_subject.as_deref() == Some(message.subject.as_str()) {
            Err(HomeflowError::Bus("broker unavailable".into()))
        } else {
            self.sent
                .lock()
                .unwrap()
                .push((message, tokio::time::Instant::now()));
            Ok(())
        };
        async { result }
    }
}

// ── Clock ──────────────────────────────────────────────────────────

/// Clock frozen at a chosen instant. Defaults to Monday 2024-03-04 12:00.
pub struct FixedClock {
    now: Timestamp,
    local: NaiveDateTime,
}

impl FixedClock {
    pub fn at_local(hour: u32, minute: u32) -> Self {
        Self {
            local: NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(hour, minute, 0)
                .unwrap(),
            ..Self::default()
        }
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self {
            now: Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap(),
            local: NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn local_now(&self) -> NaiveDateTime {
        self.local
    }
}
