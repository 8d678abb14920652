//! Evaluator — runs one automation against one event.
//!
//! `TriggerCheck → ConditionCheck → ActionExecution → RunRecordUpdate`,
//! one pass, no retries. Action failures are logged and do not stop the
//! remaining actions; a failed registry write is logged and does not undo
//! anything.
//!
//! The run record is written onto the registry's current version of the
//! automation, never onto the snapshot the run started from, so a change
//! made while actions were running is not overwritten.

use std::sync::Arc;

use homeflow_domain::automation::Automation;
use homeflow_domain::error::HomeflowError;
use homeflow_domain::event::EventContext;
use homeflow_domain::id::AutomationId;
use homeflow_domain::time::Timestamp;

use crate::device_cache::DeviceStateCache;
use crate::executor::ActionExecutor;
use crate::ports::{AutomationRegistry, Clock, MessagePublisher};
use crate::store::AutomationStore;

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    NotTriggered,
    ConditionsNotMet,
    Executed(RunReport),
}

/// What happened while executing an automation's actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub automation_id: AutomationId,
    pub dispatched: usize,
    pub failed: usize,
    pub run_count: u64,
    pub persisted: bool,
}

/// Orchestrates trigger matching, condition checking, and action execution.
pub struct Evaluator<R, P> {
    registry: R,
    executor: ActionExecutor<P>,
    store: Arc<AutomationStore>,
    devices: Arc<DeviceStateCache>,
    clock: Arc<dyn Clock>,
    debug_evaluation: bool,
}

impl<R, P> Evaluator<R, P>
where
    R: AutomationRegistry,
    P: MessagePublisher,
{
    pub fn new(
        registry: R,
        publisher: P,
        store: Arc<AutomationStore>,
        devices: Arc<DeviceStateCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let executor = ActionExecutor::new(publisher, Arc::clone(&devices), Arc::clone(&clock));
        Self {
            registry,
            executor,
            store,
            devices,
            clock,
            debug_evaluation: false,
        }
    }

    /// Emit per-evaluation debug output (contexts, no-match reasons).
    #[must_use]
    pub fn with_debug_evaluation(mut self, enabled: bool) -> Self {
        self.debug_evaluation = enabled;
        self
    }

    /// Run the full pipeline for `automation` against `ctx`.
    #[tracing::instrument(skip_all, fields(automation_id = %automation.id, context = ctx.kind()))]
    pub async fn evaluate(&self, automation: &Automation, ctx: &EventContext) -> Evaluation {
        if self.debug_evaluation {
            tracing::debug!(?ctx, "evaluating automation");
        }

        if !automation.is_triggered_by(ctx) {
            if self.debug_evaluation {
                tracing::debug!("no trigger matched");
            }
            return Evaluation::NotTriggered;
        }

        if !automation.conditions_hold(self.devices.as_ref(), self.clock.local_now()) {
            if self.debug_evaluation {
                tracing::debug!("conditions not met");
            }
            return Evaluation::ConditionsNotMet;
        }

        tracing::info!(name = %automation.name, "automation triggered");
        Evaluation::Executed(self.execute(automation).await)
    }

    /// Execute every action in order, then record the run.
    pub async fn execute(&self, automation: &Automation) -> RunReport {
        self.run_actions(automation, false).await
    }

    /// Manual test run: skips the trigger and condition stages, and records
    /// the run even if the automation is disabled.
    pub async fn execute_test(&self, automation: &Automation) -> RunReport {
        self.run_actions(automation, true).await
    }

    async fn run_actions(&self, automation: &Automation, manual: bool) -> RunReport {
        let mut dispatched = 0;
        let mut failed = 0;
        for (index, action) in automation.actions.iter().enumerate() {
            match self.executor.execute(action, &automation.id).await {
                Ok(()) => dispatched += 1,
                Err(err) => {
                    failed += 1;
                    tracing::error!(
                        automation_id = %automation.id,
                        action_index = index,
                        error = %err,
                        source = ?std::error::Error::source(&err),
                        "action failed"
                    );
                }
            }
        }

        let at = self.clock.now();
        let in_store = self.store.record_run(&automation.id, at);
        let recorded = match self
            .record_in_registry(&automation.id, at, in_store.as_ref(), manual)
            .await
        {
            Ok(recorded) => recorded,
            Err(err) => {
                tracing::error!(automation_id = %automation.id, error = %err, "failed to persist run metadata");
                None
            }
        };

        let run_count = recorded
            .as_ref()
            .or(in_store.as_ref())
            .map_or(automation.run_count + 1, |a| a.run_count);
        RunReport {
            automation_id: automation.id.clone(),
            dispatched,
            failed,
            run_count,
            persisted: recorded.is_some(),
        }
    }

    /// Bump `run_count` and `last_run` on the current registry record and
    /// write it back. Every other field is kept as stored.
    ///
    /// Nothing is written when the record is gone, nor when it is disabled
    /// and the run was not manual.
    async fn record_in_registry(
        &self,
        id: &AutomationId,
        at: Timestamp,
        in_store: Option<&Automation>,
        manual: bool,
    ) -> Result<Option<Automation>, HomeflowError> {
        let Some(mut current) = self.registry.get(id).await? else {
            tracing::info!(automation_id = %id, "automation left the registry, run not recorded");
            return Ok(None);
        };
        if !current.enabled && !manual {
            tracing::info!(automation_id = %id, "automation disabled meanwhile, run not recorded");
            return Ok(None);
        }

        current.record_run(at);
        if let Some(in_store) = in_store {
            // Overlapping runs of one automation each bumped the store entry.
            current.run_count = current.run_count.max(in_store.run_count);
        }
        self.registry.put(&current).await?;
        Ok(Some(current))
    }
}
