//! Rollout reconciler.
//!
//! One pass for one workload:
//! - Skip if the cache has not caught up with the previous pass's actions
//! - Read eligible nodes, the workload's pods and the desired revision
//! - Resolve the availability budget and plan deletions and creations
//! - Record expectations, then dispatch every action concurrently
//!
//! Nothing is carried from one pass to the next except expectations. Passes
//! for the same workload are serialized; different workloads run in
//! parallel.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{join, join_all};
use nodeset_id::{NodeName, PodName, WorkloadId};
use nodeset_reconcile::{
    get_unavailable_budget, plan, BudgetRounding, ConvergenceStatus,
    ExpectationTracker, Node, NodeTopology, PendingActions, Revision, RolloutPlan,
    RolloutStatus, UnavailableBudget, Workload, DEFAULT_EXPECTATIONS_TIMEOUT,
};
use tracing::{debug, info, instrument, warn};

use crate::cluster::{ClusterError, ClusterState, PodControl, PodEvent};
use crate::error::{ControllerError, ControllerResult};
use crate::keyed_lock::KeyedAsyncLock;

/// Reconciler settings.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    pub rounding: BudgetRounding,
    pub expectations_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            rounding: BudgetRounding::Down,
            expectations_timeout: DEFAULT_EXPECTATIONS_TIMEOUT,
        }
    }
}

/// An action that was planned but refused by the pod client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchFailure {
    Create { node: NodeName, error: ClusterError },
    Delete { pod: PodName, error: ClusterError },
}

impl DispatchFailure {
    pub fn error(&self) -> &ClusterError {
        match self {
            Self::Create { error, .. } | Self::Delete { error, .. } => error,
        }
    }
}

/// What a pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Nodes that got a new pod.
    pub created: Vec<NodeName>,

    /// Pods whose deletion was accepted.
    pub deleted: Vec<PodName>,

    pub failed: Vec<DispatchFailure>,

    /// Progress as seen at the start of the pass.
    pub status: RolloutStatus,

    pub convergence: ConvergenceStatus,

    /// `None` when the pass stopped before resolving the budget.
    pub budget: Option<UnavailableBudget>,
}

impl ReconcileOutcome {
    fn empty(convergence: ConvergenceStatus) -> Self {
        Self {
            created: Vec::new(),
            deleted: Vec::new(),
            failed: Vec::new(),
            status: RolloutStatus::default(),
            convergence,
            budget: None,
        }
    }

    /// Returns true if no action was attempted.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty() && self.failed.is_empty()
    }

    /// Returns true if the pass waited on outstanding expectations.
    pub fn is_skipped(&self) -> bool {
        self.convergence == ConvergenceStatus::Unknown
    }
}

/// Aggregate result of one pass over every workload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub workloads_processed: usize,
    pub workloads_failed: usize,
    pub workloads_skipped: usize,
    pub workloads_converged: usize,
    pub pods_created: usize,
    pub pods_deleted: usize,
    pub dispatch_failures: usize,
}

impl ReconcileStats {
    fn add(&mut self, outcome: &ReconcileOutcome) {
        self.workloads_processed += 1;
        if outcome.is_skipped() {
            self.workloads_skipped += 1;
        }
        if outcome.convergence.is_converged() {
            self.workloads_converged += 1;
        }
        self.pods_created += outcome.created.len();
        self.pods_deleted += outcome.deleted.len();
        self.dispatch_failures += outcome.failed.len();
    }

    /// Returns true if any pod action was attempted.
    pub fn has_activity(&self) -> bool {
        self.pods_created > 0 || self.pods_deleted > 0 || self.dispatch_failures > 0
    }
}

/// The rollout reconciler.
pub struct Reconciler {
    state: Arc<dyn ClusterState>,
    control: Arc<dyn PodControl>,
    expectations: ExpectationTracker,
    locks: KeyedAsyncLock<WorkloadId>,
    rounding: BudgetRounding,
}

impl Reconciler {
    pub fn new(
        state: Arc<dyn ClusterState>,
        control: Arc<dyn PodControl>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            state,
            control,
            expectations: ExpectationTracker::new(config.expectations_timeout),
            locks: KeyedAsyncLock::new(),
            rounding: config.rounding,
        }
    }

    /// Run one pass for every known workload, concurrently.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> ControllerResult<ReconcileStats> {
        let workloads = self
            .state
            .list_workloads()
            .map_err(ControllerError::WorkloadList)?;
        debug!(workload_count = workloads.len(), "Found workloads to reconcile");
        self.expectations.retain_known(&workloads);

        let results = join_all(workloads.iter().map(|id| self.reconcile(id))).await;

        let mut stats = ReconcileStats::default();
        for (id, result) in workloads.iter().zip(results) {
            match result {
                Ok(outcome) => stats.add(&outcome),
                Err(e) => {
                    warn!(workload_id = %id, error = %e, "Failed to reconcile workload");
                    stats.workloads_failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Run one pass for `workload_id`.
    #[instrument(skip(self, workload_id), fields(workload_id = %workload_id))]
    pub async fn reconcile(&self, workload_id: &WorkloadId) -> ControllerResult<ReconcileOutcome> {
        let _guard = self.locks.lock(workload_id).await;

        let workload = self
            .state
            .get_workload(workload_id)
            .map_err(|source| ControllerError::WorkloadLookup {
                workload: *workload_id,
                source,
            })?;
        let Some(workload) = workload else {
            debug!("Workload is gone");
            self.forget(workload_id);
            return Ok(ReconcileOutcome::empty(ConvergenceStatus::Converged));
        };

        if !self.expectations.satisfied(workload_id) {
            debug!(
                pending = ?self.expectations.pending(workload_id),
                "Waiting for the cache to observe previous actions"
            );
            return Ok(ReconcileOutcome::empty(ConvergenceStatus::Unknown));
        }

        let nodes: Vec<Node> = self
            .state
            .list_eligible_nodes()
            .map_err(ControllerError::NodeList)?
            .into_iter()
            .filter(Node::is_eligible)
            .collect();
        let pods = self
            .state
            .list_pods(workload_id)
            .map_err(|source| ControllerError::PodList {
                workload: *workload_id,
                source,
            })?;
        let desired = self
            .state
            .current_revision(&workload)
            .map_err(|source| ControllerError::Revision {
                workload: *workload_id,
                source,
            })?;

        let topology = NodeTopology::build(&nodes, pods);
        let budget = self.unavailable_budget(&workload, &nodes, &topology)?;
        let status = RolloutStatus::from_topology(&topology, &desired);

        let mut rollout = plan(
            &topology,
            &desired,
            budget.max_unavailable,
            budget.num_unavailable,
        );
        if !workload.update_strategy.is_rolling() {
            rollout = rollout.without_stale_deletions();
        }

        debug!(
            revision = %desired,
            nodes = nodes.len(),
            max_unavailable = budget.max_unavailable,
            num_unavailable = budget.num_unavailable,
            deletions = rollout.deletions.len(),
            creations = rollout.creations.len(),
            "Planned rollout step"
        );

        if rollout.is_empty() {
            let convergence = if status.is_complete() {
                ConvergenceStatus::Converged
            } else {
                ConvergenceStatus::Converging
            };
            return Ok(ReconcileOutcome {
                convergence,
                status,
                budget: Some(budget),
                ..ReconcileOutcome::empty(convergence)
            });
        }

        self.expectations.record(
            *workload_id,
            rollout.creations.len(),
            rollout.deletions.len(),
        );
        let mut outcome = self.dispatch(&workload, &desired, &rollout).await;

        info!(
            created = outcome.created.len(),
            deleted = outcome.deleted.len(),
            failed = outcome.failed.len(),
            updated = status.updated_scheduled,
            desired = status.desired_scheduled,
            unavailable = status.number_unavailable,
            "Rollout step dispatched"
        );

        outcome.status = status;
        outcome.budget = Some(budget);
        Ok(outcome)
    }

    /// Issue every planned action at once. Failed actions lower the
    /// expectations since their effect will never be observed.
    async fn dispatch(
        &self,
        workload: &Workload,
        desired: &Revision,
        rollout: &RolloutPlan,
    ) -> ReconcileOutcome {
        let control = &self.control;

        let deletes = rollout.deletions.iter().map(|deletion| async move {
            let result = control.delete_pod(workload, &deletion.pod.name).await;
            (&deletion.pod.name, deletion.reason, result)
        });
        let creates = rollout.creations.iter().map(|node| async move {
            let result = control.create_pod(workload, node, desired).await;
            (node, result)
        });
        let (deleted, created) = join(join_all(deletes), join_all(creates)).await;

        let mut outcome = ReconcileOutcome::empty(ConvergenceStatus::Converging);

        for (pod, reason, result) in deleted {
            match result {
                Ok(()) => {
                    debug!(pod = %pod, reason = %reason, "Deleted pod");
                    outcome.deleted.push(pod.clone());
                }
                Err(error) => {
                    warn!(pod = %pod, reason = %reason, error = %error, "Failed to delete pod");
                    self.expectations.deletion_observed(&workload.id);
                    outcome.failed.push(DispatchFailure::Delete {
                        pod: pod.clone(),
                        error,
                    });
                }
            }
        }

        for (node, result) in created {
            match result {
                Ok(pod) => {
                    debug!(node = %node, pod = %pod, "Created pod");
                    outcome.created.push(node.clone());
                }
                Err(error) => {
                    warn!(node = %node, error = %error, "Failed to create pod");
                    self.expectations.creation_observed(&workload.id);
                    outcome.failed.push(DispatchFailure::Create {
                        node: node.clone(),
                        error,
                    });
                }
            }
        }

        outcome
    }

    /// Budget and unavailable count for `workload` against a snapshot.
    pub fn unavailable_budget(
        &self,
        workload: &Workload,
        nodes: &[Node],
        topology: &NodeTopology,
    ) -> ControllerResult<UnavailableBudget> {
        get_unavailable_budget(&workload.update_strategy, nodes, topology, self.rounding).map_err(
            |e| {
                warn!(
                    workload_id = %workload.id,
                    update_strategy = ?workload.update_strategy,
                    error = %e,
                    "Invalid availability budget"
                );
                ControllerError::from(e)
            },
        )
    }

    /// Feed a watch event into the expectation tracker.
    pub fn observe(&self, event: &PodEvent) {
        let workload = &event.pod().workload;
        match event {
            PodEvent::Added(_) => self.expectations.creation_observed(workload),
            PodEvent::Deleted(_) => self.expectations.deletion_observed(workload),
        }
    }

    /// Drop all state held for a deleted workload.
    pub fn forget(&self, workload_id: &WorkloadId) {
        self.expectations.forget(workload_id);
    }

    /// Outstanding actions for `workload_id`, if any.
    pub fn pending(&self, workload_id: &WorkloadId) -> Option<PendingActions> {
        self.expectations.pending(workload_id)
    }
}
