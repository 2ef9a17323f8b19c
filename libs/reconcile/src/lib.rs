//! Rollout engine for per-node workloads.
//!
//! A per-node workload runs exactly one pod on every eligible node. When its
//! template changes, every node has to move from a pod at the old revision
//! to a pod at the new one without taking too many nodes down at once. This
//! library decides, one reconciliation pass at a time, which pods to delete
//! and which nodes need a new pod.
//!
//! - **Revision**: opaque identifier of a template generation ([`revision`]).
//! - **Budget**: how many eligible nodes may be without an available pod
//!   ([`budget`]).
//! - **Topology**: pods grouped by the node they run on ([`topology`]).
//! - **Plan**: the deletions and creations for one pass ([`planner`]).
//! - **Expectations**: in-flight actions the cache has not observed yet
//!   ([`expectations`]).
//!
//! # Invariants
//!
//! - Planning is a pure function of one snapshot; nothing is carried across
//!   passes except expectations
//! - Decisions are deterministic given the same inputs
//! - Stale pods on available nodes are only deleted within the remaining
//!   budget

pub mod budget;
pub mod error;
pub mod expectations;
pub mod model;
pub mod planner;
pub mod revision;
pub mod status;
pub mod topology;

use std::time::Duration;

pub use budget::{
    compute_budget, compute_budget_with, count_unavailable, get_unavailable_budget,
    BudgetRounding, UnavailableBudget,
};
pub use error::BudgetError;
pub use expectations::{ExpectationTracker, PendingActions, DEFAULT_EXPECTATIONS_TIMEOUT};
pub use model::{MaxUnavailable, Node, Pod, UpdateStrategy, Workload};
pub use planner::{plan, DeletionReason, PlannedDeletion, RolloutPlan};
pub use revision::{classify, Revision, RevisionClass};
pub use status::RolloutStatus;
pub use topology::{NodeSlot, NodeTopology};

/// Convergence status of a workload after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// Every eligible node runs an available pod at the desired revision.
    Converged,

    /// Actions are outstanding or pods are still becoming available.
    Converging,

    /// The pass was skipped, so nothing new is known.
    Unknown,
}

impl ConvergenceStatus {
    /// Returns true if the workload has converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }

    /// Returns true if the workload is still converging.
    pub fn is_converging(&self) -> bool {
        matches!(self, Self::Converging)
    }
}

/// Default reconciliation interval.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);
