//! In-memory automation store.
//!
//! Holds the enabled automations the engine evaluates. Entries are
//! `Arc` snapshots replaced wholesale on write, so a reader either sees the
//! old record or the new one, never a half-written one. The lock is only
//! held for the map operation itself.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use homeflow_domain::automation::Automation;
use homeflow_domain::id::AutomationId;
use homeflow_domain::time::Timestamp;

/// Enabled automations keyed by id.
#[derive(Debug, Default)]
pub struct AutomationStore {
    entries: RwLock<HashMap<AutomationId, Arc<Automation>>>,
}

impl AutomationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &AutomationId) -> Option<Arc<Automation>> {
        self.read().get(id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Insert or replace `automation` if it is enabled, remove it otherwise.
    ///
    /// Returns `true` when the automation is now in the store.
    pub fn upsert(&self, automation: Automation) -> bool {
        let mut entries = self.write();
        if automation.enabled {
            entries.insert(automation.id.clone(), Arc::new(automation));
            true
        } else {
            entries.remove(&automation.id);
            false
        }
    }

    /// Remove an automation. Returns whether it was present.
    pub fn remove(&self, id: &AutomationId) -> bool {
        self.write().remove(id).is_some()
    }

    /// Atomically replace the whole content with the enabled automations
    /// from `automations`.
    pub fn replace_all(&self, automations: impl IntoIterator<Item = Automation>) {
        let next: HashMap<_, _> = automations
            .into_iter()
            .filter(|a| a.enabled)
            .map(|a| (a.id.clone(), Arc::new(a)))
            .collect();
        *self.write() = next;
    }

    /// Snapshot every automation matching `predicate`.
    #[must_use]
    pub fn select(&self, predicate: impl Fn(&Automation) -> bool) -> Vec<Arc<Automation>> {
        self.read()
            .values()
            .filter(|a| predicate(a))
            .cloned()
            .collect()
    }

    /// Record one run of automation `id` at `at` and return the updated
    /// entry.
    ///
    /// The current entry is bumped, so concurrent runs of the same
    /// automation each count. Returns `None` without touching the store if
    /// the automation left it meanwhile (disabled or deleted).
    pub fn record_run(&self, id: &AutomationId, at: Timestamp) -> Option<Automation> {
        let mut entries = self.write();
        let entry = entries.get_mut(id)?;
        let mut updated = Automation::clone(entry);
        updated.record_run(at);
        *entry = Arc::new(updated.clone());
        Some(updated)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<AutomationId, Arc<Automation>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<AutomationId, Arc<Automation>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
