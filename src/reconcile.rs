//! Step reconciliation: refetch on invalidation, rebuild stage state.
//!
//! A reconciler listens to a live session's invalidation signals for one
//! step. Whenever the step's records may have changed it refetches them
//! and recomputes the [`StageMap`] from scratch; the result is published
//! as a new immutable [`StepView`].

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, warn};

use crate::history::HistorySource;
use crate::model::{LiveSnapshot, StepHistory, StepRef};
use crate::pipeline::{StageMap, Topology, reconstruct};
use crate::stream::{CacheView, Invalidation};
use crate::telemetry::metrics;
use crate::telemetry::spans::start_reconcile_span;

/// Derived view of one step.
#[derive(Debug, Clone, Default)]
pub struct StepView {
    /// Number of successful refreshes so far; zero before the first fetch.
    pub revision: u64,
    pub history: Option<StepHistory>,
    pub stages: StageMap,
}

/// Handle to a running reconciler. Dropping it aborts the task.
pub struct StepReconciler {
    step: StepRef,
    view: watch::Receiver<Arc<StepView>>,
    snapshot: watch::Receiver<Option<Arc<LiveSnapshot>>>,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl StepReconciler {
    /// Fetch the step once, then refresh on every relevant invalidation.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(
        history: Arc<dyn HistorySource>,
        topology: Topology,
        step: StepRef,
        invalidations: broadcast::Receiver<Invalidation>,
    ) -> Self {
        let initial = StepView {
            revision: 0,
            history: None,
            stages: reconstruct(&topology, &[], &[]),
        };
        let (view_tx, view_rx) = watch::channel(Arc::new(initial));
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let shutdown = Arc::new(Notify::new());

        let worker = ReconcileWorker {
            history,
            topology,
            step,
            invalidations,
            view_tx,
            snapshot_tx,
            shutdown: Arc::clone(&shutdown),
            revision: 0,
        };
        let task = tokio::spawn(worker.run().instrument(start_reconcile_span(&step)));

        Self {
            step,
            view: view_rx,
            snapshot: snapshot_rx,
            shutdown,
            task: Some(task),
        }
    }

    pub fn step(&self) -> StepRef {
        self.step
    }

    /// The latest published view.
    pub fn view(&self) -> Arc<StepView> {
        Arc::clone(&self.view.borrow())
    }

    pub fn watch_view(&self) -> watch::Receiver<Arc<StepView>> {
        self.view.clone()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<Option<Arc<LiveSnapshot>>> {
        self.snapshot.clone()
    }

    /// Stop the reconciler, abandoning any in-flight fetch, and wait for
    /// its task to finish.
    pub async fn close(mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for StepReconciler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct ReconcileWorker {
    history: Arc<dyn HistorySource>,
    topology: Topology,
    step: StepRef,
    invalidations: broadcast::Receiver<Invalidation>,
    view_tx: watch::Sender<Arc<StepView>>,
    snapshot_tx: watch::Sender<Option<Arc<LiveSnapshot>>>,
    shutdown: Arc<Notify>,
    revision: u64,
}

impl ReconcileWorker {
    async fn run(mut self) {
        let shutdown = Arc::clone(&self.shutdown);

        tokio::select! {
            _ = shutdown.notified() => {
                debug!("reconciler stopped during initial fetch");
                return;
            }
            _ = self.apply(Invalidation::All) => {}
        }

        loop {
            let received = tokio::select! {
                _ = shutdown.notified() => break,
                received = self.invalidations.recv() => received,
            };
            let invalidation = match received {
                Ok(invalidation) => invalidation,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed invalidations, resyncing step");
                    Invalidation::All
                }
                Err(RecvError::Closed) => {
                    debug!("invalidation channel closed");
                    break;
                }
            };
            // An in-flight fetch must not hold up close().
            tokio::select! {
                _ = shutdown.notified() => break,
                _ = self.apply(invalidation) => {}
            }
        }
        debug!("reconciler stopped");
    }

    async fn apply(&mut self, invalidation: Invalidation) {
        if invalidation.covers(CacheView::Steps) {
            self.refresh_step().await;
        }
        if invalidation.covers(CacheView::LiveSnapshot) {
            self.refresh_snapshot().await;
        }
    }

    async fn refresh_step(&mut self) {
        let history = match self.history.step_history(self.step).await {
            Ok(history) => history,
            Err(e) => {
                warn!(step = %self.step, error = %e, "step fetch failed, keeping previous view");
                record_fetch("step", "error");
                return;
            }
        };
        record_fetch("step", "ok");

        let started = Instant::now();
        let stages = reconstruct(&self.topology, &history.transitions, &history.arbiter_events);
        metrics::reconstruct_duration_ms().record(started.elapsed().as_secs_f64() * 1000.0, &[]);

        self.revision += 1;
        debug!(
            revision = self.revision,
            transitions = history.transitions.len(),
            arbiter_events = history.arbiter_events.len(),
            "step view rebuilt"
        );
        self.view_tx.send_replace(Arc::new(StepView {
            revision: self.revision,
            history: Some(history),
            stages,
        }));
    }

    async fn refresh_snapshot(&mut self) {
        match self.history.live_snapshot().await {
            Ok(snapshot) => {
                record_fetch("snapshot", "ok");
                self.snapshot_tx.send_replace(snapshot.map(Arc::new));
            }
            Err(e) => {
                warn!(error = %e, "snapshot fetch failed, keeping previous value");
                record_fetch("snapshot", "error");
            }
        }
    }
}

fn record_fetch(resource: &'static str, result: &'static str) {
    metrics::history_fetches().add(
        1,
        &[
            KeyValue::new("resource", resource),
            KeyValue::new("result", result),
        ],
    );
}
