//! Rollout background worker.
//!
//! Runs a reconciliation pass over every workload on a periodic interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument};

use crate::error::ControllerResult;
use crate::reconciler::{ReconcileStats, Reconciler};

/// Worker that drives the reconciler.
pub struct RolloutWorker {
    reconciler: Arc<Reconciler>,
    interval: Duration,
}

impl RolloutWorker {
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Run until shutdown is signaled. The first pass runs immediately.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting rollout worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Rollout reconciliation failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Rollout worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run a single pass over every workload.
    pub async fn run_once(&self) -> ControllerResult<ReconcileStats> {
        let stats = self.reconciler.reconcile_all().await?;

        if stats.has_activity() || stats.workloads_failed > 0 {
            info!(
                workloads_processed = stats.workloads_processed,
                workloads_failed = stats.workloads_failed,
                workloads_skipped = stats.workloads_skipped,
                workloads_converged = stats.workloads_converged,
                pods_created = stats.pods_created,
                pods_deleted = stats.pods_deleted,
                dispatch_failures = stats.dispatch_failures,
                "Rollout reconciliation complete"
            );
        }

        Ok(stats)
    }
}
