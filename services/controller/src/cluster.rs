//! Collaborator interfaces.
//!
//! The controller reads cluster state from a cache it does not own and
//! issues pod actions through a client it does not own. Both sit behind
//! traits so the reconciler can run against the real cluster or the
//! in-memory [`MockCluster`](crate::mock::MockCluster).

use async_trait::async_trait;
use nodeset_id::{NodeName, PodName, WorkloadId};
use nodeset_reconcile::{Node, Pod, Revision, Workload};
use thiserror::Error;

/// Failure of a collaborator call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    /// The cache or API server could not be read.
    #[error("cluster read failed: {0}")]
    Unavailable(String),

    /// The object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A create or delete call was rejected.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Read access to the cached cluster state.
///
/// Reads come from an informer-style cache and never block on the network.
pub trait ClusterState: Send + Sync {
    /// All per-node workloads known to the cache.
    fn list_workloads(&self) -> Result<Vec<WorkloadId>, ClusterError>;

    /// Look up a workload; `Ok(None)` once it has been deleted.
    fn get_workload(&self, id: &WorkloadId) -> Result<Option<Workload>, ClusterError>;

    /// Nodes the workload should run on.
    fn list_eligible_nodes(&self) -> Result<Vec<Node>, ClusterError>;

    /// Pods owned by the workload, including terminating ones.
    fn list_pods(&self, workload: &WorkloadId) -> Result<Vec<Pod>, ClusterError>;

    /// Revision identifier of the workload's current template.
    fn current_revision(&self, workload: &Workload) -> Result<Revision, ClusterError>;
}

/// Pod create/delete client.
///
/// Calls are fire-and-forget from the cache's point of view: a successful
/// call only means the request was accepted. The effect shows up in the
/// cache later and is reported through [`PodEvent`]s.
#[async_trait]
pub trait PodControl: Send + Sync {
    /// Create a pod for `workload` on `node` at `revision`.
    async fn create_pod(
        &self,
        workload: &Workload,
        node: &NodeName,
        revision: &Revision,
    ) -> Result<PodName, ClusterError>;

    /// Request deletion of `pod`.
    async fn delete_pod(&self, workload: &Workload, pod: &PodName) -> Result<(), ClusterError>;
}

/// Pod change observed by the watch cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodEvent {
    /// A pod appeared in the cache.
    Added(Pod),

    /// A pod is gone from the cache.
    Deleted(Pod),
}

impl PodEvent {
    pub fn pod(&self) -> &Pod {
        match self {
            Self::Added(pod) | Self::Deleted(pod) => pod,
        }
    }
}
