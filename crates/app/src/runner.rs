//! Evaluation runner — bounded fan-out of independent evaluation tasks.
//!
//! Every candidate automation is evaluated in its own task so a slow or
//! delayed action never holds up another automation or the ingestion
//! loop. At most `max_concurrent` tasks run at once; up to
//! `queue_capacity` more wait for a slot, and anything beyond that is
//! shed with a warning.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore, TryAcquireError};
use tokio_util::task::TaskTracker;

/// Spawns evaluation jobs under a concurrency limit.
#[derive(Debug, Clone)]
pub struct EvaluationRunner {
    tracker: TaskTracker,
    permits: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
    queue_capacity: usize,
    activity: Arc<Activity>,
}

/// Count of unfinished jobs, signalling when it drops to zero.
#[derive(Debug, Default)]
struct Activity {
    active: AtomicUsize,
    idle: Notify,
}

impl Activity {
    fn enter(self: &Arc<Self>) -> ActivityGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        ActivityGuard(Arc::clone(self))
    }
}

/// Held by a job until it finishes, panics or is dropped.
struct ActivityGuard(Arc<Activity>);

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        if self.0.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl EvaluationRunner {
    #[must_use]
    pub fn new(max_concurrent: usize, queue_capacity: usize) -> Self {
        Self {
            tracker: TaskTracker::new(),
            permits: Arc::new(Semaphore::new(
                max_concurrent.clamp(1, Semaphore::MAX_PERMITS),
            )),
            queued: Arc::new(AtomicUsize::new(0)),
            queue_capacity,
            activity: Arc::default(),
        }
    }

    /// Submit a job. Returns `false` if it was dropped because the runner
    /// is shutting down or the wait queue is full.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tracker.is_closed() {
            tracing::debug!("runner is shutting down, job dropped");
            return false;
        }

        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => {
                let guard = self.activity.enter();
                self.tracker.spawn(async move {
                    let _guard = guard;
                    let _permit = permit;
                    job.await;
                });
                true
            }
            Err(TryAcquireError::Closed) => false,
            Err(TryAcquireError::NoPermits) => {
                if self.queued.fetch_add(1, Ordering::SeqCst) >= self.queue_capacity {
                    self.queued.fetch_sub(1, Ordering::SeqCst);
                    tracing::warn!(
                        queue_capacity = self.queue_capacity,
                        "evaluation queue full, job shed"
                    );
                    return false;
                }
                let permits = Arc::clone(&self.permits);
                let queued = Arc::clone(&self.queued);
                let guard = self.activity.enter();
                self.tracker.spawn(async move {
                    let _guard = guard;
                    let permit = permits.acquire_owned().await;
                    queued.fetch_sub(1, Ordering::SeqCst);
                    if let Ok(_permit) = permit {
                        job.await;
                    }
                });
                true
            }
        }
    }

    /// Number of submitted jobs not yet finished (running or waiting).
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every submitted job has finished, without closing the runner.
    pub async fn wait_idle(&self) {
        loop {
            // Registered before the check so a job finishing in between
            // still wakes us.
            let idle = self.activity.idle.notified();
            if self.activity.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Stop accepting jobs and wait up to `timeout` for submitted ones,
    /// pending action delays included, to finish.
    ///
    /// Returns `false` if the timeout elapsed first; the remaining jobs are
    /// then abandoned when the runtime stops.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        if !drained {
            tracing::warn!(
                remaining = self.tracker.len(),
                "drain timeout elapsed, abandoning evaluations"
            );
        }
        drained
    }
}
