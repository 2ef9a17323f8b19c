//! nodeset controller
//!
//! Drives rolling updates of per-node workloads: on every tick each workload
//! gets one reconciliation pass that plans against fresh cluster state and
//! dispatches the resulting pod creates and deletes.
//!
//! The cluster is reached through the [`cluster::ClusterState`] and
//! [`cluster::PodControl`] traits. [`mock::MockCluster`] implements both in
//! memory for dev mode and tests.

pub mod cluster;
pub mod config;
pub mod error;
pub mod keyed_lock;
pub mod mock;
pub mod reconciler;
pub mod worker;

pub use cluster::{ClusterError, ClusterState, PodControl, PodEvent};
pub use error::{ControllerError, ControllerResult};
pub use reconciler::{
    DispatchFailure, ReconcileOutcome, ReconcileStats, Reconciler, ReconcilerConfig,
};
pub use worker::RolloutWorker;
