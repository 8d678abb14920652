//! Automation engine — reacts to bus messages by evaluating automations.
//!
//! The engine owns the [`AutomationStore`] and [`DeviceStateCache`]. For
//! every inbound message it selects the automations whose triggers could
//! apply and submits one independent evaluation per candidate to the
//! [`EvaluationRunner`].
//!
//! While [`AutomationEngine::run`] is active, two background tasks do the
//! registry reads so the ingestion loop never waits on the registry: a
//! periodic full reload that heals missed change notifications, and a
//! change applier that handles change notifications and test runs one at a
//! time, in arrival order. Full reloads and single-automation changes are
//! serialized so a reload cannot resurrect a record removed while it ran.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use homeflow_domain::automation::Automation;
use homeflow_domain::error::HomeflowError;
use homeflow_domain::event::EventContext;
use homeflow_domain::id::AutomationId;
use homeflow_domain::message::{AutomationChange, ChangeKind, Inbound, Outbound};

use crate::device_cache::DeviceStateCache;
use crate::evaluator::Evaluator;
use crate::ports::{AutomationRegistry, Clock, MessagePublisher, SystemClock};
use crate::runner::EvaluationRunner;
use crate::store::AutomationStore;

/// Service name reported in lifecycle events.
pub const SERVICE_NAME: &str = "automation-engine";

/// Tuning knobs for [`AutomationEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Period of the full reload from the registry.
    pub update_interval: Duration,
    /// Emit per-evaluation debug output.
    pub debug_evaluation: bool,
    /// Evaluations allowed to run at the same time.
    pub max_concurrent_evaluations: usize,
    /// Evaluations allowed to wait for a slot before new ones are shed.
    pub queue_capacity: usize,
    /// How long shutdown waits for in-flight evaluations.
    pub drain_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(30),
            debug_evaluation: false,
            max_concurrent_evaluations: 64,
            queue_capacity: 1024,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Reactive automation engine.
///
/// Cloning is cheap; clones share the same store, cache and runner.
pub struct AutomationEngine<R, P> {
    registry: Arc<R>,
    publisher: Arc<P>,
    store: Arc<AutomationStore>,
    devices: Arc<DeviceStateCache>,
    clock: Arc<dyn Clock>,
    evaluator: Arc<Evaluator<Arc<R>, Arc<P>>>,
    runner: EvaluationRunner,
    store_sync: Arc<Mutex<()>>,
    config: EngineConfig,
}

impl<R, P> Clone for AutomationEngine<R, P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            publisher: Arc::clone(&self.publisher),
            store: Arc::clone(&self.store),
            devices: Arc::clone(&self.devices),
            clock: Arc::clone(&self.clock),
            evaluator: Arc::clone(&self.evaluator),
            runner: self.runner.clone(),
            store_sync: Arc::clone(&self.store_sync),
            config: self.config.clone(),
        }
    }
}

impl<R, P> AutomationEngine<R, P>
where
    R: AutomationRegistry + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    /// Create an engine using the system clock.
    pub fn new(registry: Arc<R>, publisher: Arc<P>, config: EngineConfig) -> Self {
        Self::with_clock(registry, publisher, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        registry: Arc<R>,
        publisher: Arc<P>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let store = Arc::new(AutomationStore::new());
        let devices = Arc::new(DeviceStateCache::new());
        let evaluator = Evaluator::new(
            Arc::clone(&registry),
            Arc::clone(&publisher),
            Arc::clone(&store),
            Arc::clone(&devices),
            Arc::clone(&clock),
        )
        .with_debug_evaluation(config.debug_evaluation);
        let runner = EvaluationRunner::new(config.max_concurrent_evaluations, config.queue_capacity);

        Self {
            registry,
            publisher,
            store,
            devices,
            clock,
            evaluator: Arc::new(evaluator),
            runner,
            store_sync: Arc::new(Mutex::new(())),
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &AutomationStore {
        &self.store
    }

    #[must_use]
    pub fn devices(&self) -> &DeviceStateCache {
        &self.devices
    }

    /// Wait until no evaluation is running or queued.
    pub async fn wait_idle(&self) {
        self.runner.wait_idle().await;
    }

    /// Re-read every automation from the registry and atomically replace
    /// the store content.
    ///
    /// Records that cannot be read or are invalid are skipped; if one of
    /// them was already loaded, the loaded version is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry keys cannot be listed; the store is
    /// left untouched in that case.
    #[tracing::instrument(skip_all)]
    pub async fn load_all(&self) -> Result<usize, HomeflowError> {
        let _sync = self.store_sync.lock().await;
        let keys = self.registry.keys().await?;
        let mut loaded = Vec::with_capacity(keys.len());

        for key in keys {
            let record = self
                .registry
                .get(&key)
                .await
                .and_then(|record| record.map(validated).transpose());
            match record {
                Ok(Some(automation)) => loaded.push(automation),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(automation_id = %key, error = %err, "skipping unreadable automation");
                    if let Some(current) = self.store.get(&key) {
                        loaded.push(Automation::clone(&current));
                    }
                }
            }
        }

        self.store.replace_all(loaded);
        let enabled = self.store.len();
        tracing::info!(enabled, "automations loaded");
        Ok(enabled)
    }

    /// Reload one automation after a change notification.
    #[tracing::instrument(skip_all, fields(automation_id = %id))]
    pub async fn reload_one(&self, id: &AutomationId) {
        let _sync = self.store_sync.lock().await;
        let record = self
            .registry
            .get(id)
            .await
            .and_then(|record| record.map(validated).transpose());
        match record {
            Ok(Some(automation)) => {
                let name = automation.name.clone();
                if self.store.upsert(automation) {
                    tracing::info!(%name, "automation loaded");
                } else {
                    tracing::info!("automation disabled, removed");
                }
            }
            Ok(None) => {
                self.store.remove(id);
                tracing::info!("automation not in registry, removed");
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to reload automation, keeping current version");
            }
        }
    }

    /// Handle one inbound message to completion.
    ///
    /// Evaluations are submitted to the runner and not awaited. Change
    /// notifications and test runs are applied before returning, registry
    /// read included; [`run`](Self::run) hands those to its change applier
    /// instead of calling this on the ingestion loop.
    pub async fn handle(&self, message: Inbound) {
        match message {
            Inbound::DeviceState {
                device_id,
                device_type,
                attributes,
            } => {
                self.devices.merge(
                    &device_id,
                    device_type.as_deref(),
                    &attributes,
                    self.clock.now(),
                );
                let candidates = self.store.select(|a| a.has_device_trigger(&device_id));
                self.dispatch(
                    candidates,
                    EventContext::DeviceState {
                        device_id,
                        state: attributes,
                    },
                );
            }
            Inbound::TimeTick => {
                let candidates = self.store.select(Automation::has_time_trigger);
                self.dispatch(
                    candidates,
                    EventContext::Time {
                        at: self.clock.local_now(),
                    },
                );
            }
            Inbound::NamedEvent { name } => {
                let candidates = self.store.select(Automation::has_event_trigger);
                self.dispatch(candidates, EventContext::Event { name });
            }
            Inbound::AutomationChanged(change) => self.apply_change(change).await,
            Inbound::TestRun { automation_id } => self.test_run(&automation_id).await,
        }
    }

    async fn apply_change(&self, change: AutomationChange) {
        let AutomationChange {
            kind,
            automation_id,
        } = change;
        if automation_id.is_empty() {
            tracing::warn!(?kind, "change notification without automation id ignored");
            return;
        }
        match kind {
            ChangeKind::Created | ChangeKind::Updated | ChangeKind::Enabled => {
                self.reload_one(&automation_id).await;
            }
            ChangeKind::Deleted | ChangeKind::Disabled => {
                let _sync = self.store_sync.lock().await;
                self.store.remove(&automation_id);
                tracing::info!(%automation_id, ?kind, "automation removed");
            }
            ChangeKind::Unknown => {
                tracing::debug!(%automation_id, "unknown change kind ignored");
            }
        }
    }

    /// Run an automation's actions right away, skipping triggers and
    /// conditions. Disabled automations can be tested too.
    async fn test_run(&self, id: &AutomationId) {
        let automation = match self.store.get(id) {
            Some(automation) => automation,
            None => match self.registry.get(id).await {
                Ok(Some(automation)) => Arc::new(automation),
                Ok(None) => {
                    tracing::warn!(automation_id = %id, "test run for unknown automation");
                    return;
                }
                Err(err) => {
                    tracing::warn!(automation_id = %id, error = %err, "test run failed to load automation");
                    return;
                }
            },
        };

        tracing::info!(automation_id = %id, "test run requested");
        let evaluator = Arc::clone(&self.evaluator);
        self.runner.submit(async move {
            evaluator.execute_test(&automation).await;
        });
    }

    fn dispatch(&self, candidates: Vec<Arc<Automation>>, ctx: EventContext) {
        if candidates.is_empty() {
            return;
        }
        let ctx = Arc::new(ctx);
        for automation in candidates {
            let evaluator = Arc::clone(&self.evaluator);
            let ctx = Arc::clone(&ctx);
            self.runner.submit(async move {
                evaluator.evaluate(&automation, &ctx).await;
            });
        }
    }

    /// Run until `shutdown` is cancelled or the inbound channel closes.
    ///
    /// Loads every automation, announces `service_started`, then processes
    /// inbound messages while the reload and change-applier tasks run
    /// beside the loop. On exit, closes `inbound`, stops the background
    /// tasks, drains the in-flight evaluations and announces
    /// `service_stopped`.
    pub async fn run(&self, mut inbound: mpsc::Receiver<Inbound>, shutdown: CancellationToken) {
        if let Err(err) = self.load_all().await {
            tracing::error!(error = %err, "initial automation load failed, waiting for next reload");
        }
        self.publish_lifecycle(
            "service_started",
            serde_json::json!({
                "service": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            }),
        )
        .await;
        tracing::info!("automation engine started");

        let background = shutdown.child_token();
        let tasks = TaskTracker::new();
        let (changes, pending) = mpsc::unbounded_channel();
        tasks.spawn(self.clone().reload_periodically(background.clone()));
        tasks.spawn(self.clone().apply_changes(pending, background.clone()));
        tasks.close();

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                message = inbound.recv() => match message {
                    Some(message @ (Inbound::AutomationChanged(_) | Inbound::TestRun { .. })) => {
                        if changes.send(message).is_err() {
                            tracing::warn!("change applier stopped, message dropped");
                        }
                    }
                    Some(message) => self.handle(message).await,
                    None => {
                        tracing::info!("inbound channel closed");
                        break;
                    }
                },
            }
        }

        inbound.close();
        background.cancel();
        tasks.wait().await;
        self.shutdown().await;
    }

    async fn reload_periodically(self, stop: CancellationToken) {
        let period = self.config.update_interval.max(Duration::from_secs(1));
        let mut reload = tokio::time::interval_at(Instant::now() + period, period);
        reload.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                _ = reload.tick() => {}
            }
            tokio::select! {
                () = stop.cancelled() => break,
                result = self.load_all() => {
                    if let Err(err) = result {
                        tracing::error!(error = %err, "periodic reload failed");
                    }
                }
            }
        }
    }

    async fn apply_changes(
        self,
        mut pending: mpsc::UnboundedReceiver<Inbound>,
        stop: CancellationToken,
    ) {
        loop {
            let message = tokio::select! {
                () = stop.cancelled() => break,
                message = pending.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            tokio::select! {
                () = stop.cancelled() => break,
                () = self.handle(message) => {}
            }
        }
    }

    /// Stop accepting evaluations, wait for in-flight ones, and announce
    /// `service_stopped`.
    pub async fn shutdown(&self) {
        tracing::info!(in_flight = self.runner.in_flight(), "automation engine stopping");
        let drained = self.runner.shutdown(self.config.drain_timeout).await;
        self.publish_lifecycle(
            "service_stopped",
            serde_json::json!({
                "service": SERVICE_NAME,
                "drained": drained,
            }),
        )
        .await;
    }

    async fn publish_lifecycle(&self, event_type: &str, data: serde_json::Value) {
        let message = Outbound::lifecycle(event_type, data, self.clock.now());
        if let Err(err) = self.publisher.publish(message).await {
            tracing::warn!(event_type, error = %err, "failed to publish lifecycle event");
        }
    }
}

fn validated(automation: Automation) -> Result<Automation, HomeflowError> {
    automation.validate()?;
    Ok(automation)
}
