//! Rollout planning.
//!
//! `plan` is a pure function of one snapshot: it decides which pods to
//! delete and which nodes need a fresh pod, and holds nothing across
//! passes. Running it again on the same snapshot gives the same plan.
//!
//! Deletion priority, highest first:
//!
//! 1. Pods on nodes that are no longer eligible.
//! 2. Extra current pods when a node runs more than one.
//! 3. Stale pods on nodes that are already unavailable. The node is already
//!    counted against the budget, so these are free.
//! 4. Stale pods on available nodes, in node-name order, one unit of
//!    remaining budget each.
//!
//! Creation is never budget-limited: a node with no pod is already counted
//! unavailable, and giving it a pod cannot make things worse.

use nodeset_id::{NodeName, PodName};

use crate::model::Pod;
use crate::revision::Revision;
use crate::topology::NodeTopology;

/// Why a pod was selected for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeletionReason {
    /// Bound to a node outside the eligible set.
    Orphaned,

    /// An extra live pod on a node that already has one of the same kind
    /// (current or stale).
    Duplicate,

    /// Stale pod on a node that is already unavailable.
    StaleUnavailable,

    /// Stale pod on an available node, paid for with remaining budget.
    StaleWithinBudget,
}

impl DeletionReason {
    /// Returns true if this deletion spends rollout budget.
    pub fn consumes_budget(&self) -> bool {
        matches!(self, Self::StaleWithinBudget)
    }

    /// Returns true if the pod is deleted because it runs an old revision.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleUnavailable | Self::StaleWithinBudget)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orphaned => "orphaned",
            Self::Duplicate => "duplicate",
            Self::StaleUnavailable => "stale_unavailable",
            Self::StaleWithinBudget => "stale_within_budget",
        }
    }
}

impl std::fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pod the plan wants deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDeletion {
    pub pod: Pod,
    pub reason: DeletionReason,
}

/// The actions for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloutPlan {
    pub deletions: Vec<PlannedDeletion>,

    /// Nodes that have no pod at all and need one at the desired revision.
    pub creations: Vec<NodeName>,
}

impl RolloutPlan {
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.creations.is_empty()
    }

    /// Names of the pods to delete, in plan order.
    pub fn pods_to_delete(&self) -> impl Iterator<Item = &PodName> {
        self.deletions.iter().map(|d| &d.pod.name)
    }

    /// Number of deletions that spend rollout budget.
    pub fn budgeted_deletions(&self) -> usize {
        self.deletions
            .iter()
            .filter(|d| d.reason.consumes_budget())
            .count()
    }

    /// Drop stale-pod replacement, keeping creations and cleanup. Used for
    /// the `OnDelete` strategy.
    pub fn without_stale_deletions(mut self) -> Self {
        self.deletions.retain(|d| !d.reason.is_stale());
        self
    }
}

/// Compute the deletions and creations for one pass.
///
/// `max_unavailable` is the resolved budget and `num_unavailable` the number
/// of eligible nodes currently without an available pod.
pub fn plan(
    topology: &NodeTopology,
    desired: &Revision,
    max_unavailable: u32,
    num_unavailable: u32,
) -> RolloutPlan {
    let remaining = max_unavailable.saturating_sub(num_unavailable) as usize;

    let mut deletions: Vec<PlannedDeletion> = topology
        .orphans()
        .iter()
        .filter(|pod| !pod.is_terminating())
        .map(|pod| delete(pod, DeletionReason::Orphaned))
        .collect();
    let mut creations = Vec::new();
    let mut budgeted: Vec<&Pod> = Vec::new();

    for slot in topology.slots(desired) {
        if slot.is_empty() {
            creations.push(slot.node.clone());
            continue;
        }

        dedupe(&slot.current, &mut deletions);

        // At most one stale pod per node is left to the budget.
        if let Some(stale) = dedupe(&slot.stale, &mut deletions) {
            if slot.available {
                budgeted.push(stale);
            } else {
                deletions.push(delete(stale, DeletionReason::StaleUnavailable));
            }
        }
    }

    deletions.extend(
        budgeted
            .into_iter()
            .take(remaining)
            .map(|pod| delete(pod, DeletionReason::StaleWithinBudget)),
    );

    RolloutPlan {
        deletions,
        creations,
    }
}

fn delete(pod: &Pod, reason: DeletionReason) -> PlannedDeletion {
    PlannedDeletion {
        pod: pod.clone(),
        reason,
    }
}

/// Queue all but one of `pods` as duplicates and return the survivor:
/// available first, then the oldest, then by name.
fn dedupe<'a>(pods: &[&'a Pod], deletions: &mut Vec<PlannedDeletion>) -> Option<&'a Pod> {
    let keeper = pods.iter().copied().min_by(|a, b| {
        (!a.is_available(), a.created_at, &a.name).cmp(&(!b.is_available(), b.created_at, &b.name))
    })?;

    deletions.extend(
        pods.iter()
            .filter(|pod| pod.name != keeper.name)
            .map(|pod| delete(pod, DeletionReason::Duplicate)),
    );
    Some(keeper)
}
