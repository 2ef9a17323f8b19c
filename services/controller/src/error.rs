//! Controller errors.

use nodeset_id::WorkloadId;
use nodeset_reconcile::BudgetError;

use crate::cluster::ClusterError;

/// Result type for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors that abort one reconciliation pass for one workload.
///
/// None of these are fatal: the next tick retries from fresh state.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    InvalidBudget(#[from] BudgetError),

    #[error("failed to list workloads: {0}")]
    WorkloadList(#[source] ClusterError),

    #[error("failed to list eligible nodes: {0}")]
    NodeList(#[source] ClusterError),

    #[error("failed to list pods for {workload}: {source}")]
    PodList {
        workload: WorkloadId,
        #[source]
        source: ClusterError,
    },

    #[error("failed to look up workload {workload}: {source}")]
    WorkloadLookup {
        workload: WorkloadId,
        #[source]
        source: ClusterError,
    },

    #[error("failed to resolve current revision for {workload}: {source}")]
    Revision {
        workload: WorkloadId,
        #[source]
        source: ClusterError,
    },
}

impl ControllerError {
    /// Returns true if the error comes from a collaborator read and is
    /// expected to clear on its own.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidBudget(_))
    }
}
