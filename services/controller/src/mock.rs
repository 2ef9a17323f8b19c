//! In-memory cluster for development mode and tests.
//!
//! Behaves like a cache sitting in front of an API server: accepted creates
//! and deletes are queued and only become visible after [`MockCluster::flush`],
//! which returns the [`PodEvent`]s a watch would have delivered.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use nodeset_id::{NodeName, PodName, WorkloadId};
use nodeset_reconcile::{Node, Pod, Revision, UpdateStrategy, Workload};
use tracing::debug;

use crate::cluster::{ClusterError, ClusterState, PodControl, PodEvent};

#[derive(Debug, Clone)]
enum PendingChange {
    Create(Pod),
    Delete(PodName),
}

#[derive(Debug, Default)]
struct MockState {
    workloads: BTreeMap<WorkloadId, Workload>,
    nodes: Vec<Node>,
    pods: Vec<Pod>,
    pending: Vec<PendingChange>,
    next_pod: u64,
    fail_creates: bool,
    fail_deletes: bool,
    fail_node_list: bool,
    create_calls: usize,
    delete_calls: usize,
}

/// An in-memory cluster implementing both [`ClusterState`] and [`PodControl`].
#[derive(Debug, Default)]
pub struct MockCluster {
    state: Mutex<MockState>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cluster with schedulable nodes `node-0` .. `node-{count-1}`.
    pub fn with_nodes(count: usize) -> Self {
        let cluster = Self::new();
        for i in 0..count {
            cluster.add_node(&format!("node-{i}"));
        }
        cluster
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a schedulable node. Names that are not valid DNS labels are ignored.
    pub fn add_node(&self, name: &str) {
        let Ok(name) = name.parse::<NodeName>() else {
            debug!(node = name, "Ignoring invalid node name");
            return;
        };
        let mut state = self.state();
        if state.nodes.iter().all(|n| n.name != name) {
            state.nodes.push(Node::new(name));
            state.nodes.sort_by(|a, b| a.name.cmp(&b.name));
        }
    }

    /// Remove a node. Its pods stay behind and become orphans.
    pub fn remove_node(&self, name: &str) {
        self.state().nodes.retain(|n| n.name.as_str() != name);
    }

    pub fn set_schedulable(&self, name: &str, schedulable: bool) {
        for node in self.state().nodes.iter_mut() {
            if node.name.as_str() == name {
                node.schedulable = schedulable;
            }
        }
    }

    /// Register a workload with a rolling-update budget of one.
    pub fn add_workload(&self, name: &str, revision: &str) -> WorkloadId {
        self.add_workload_with(name, revision, UpdateStrategy::default())
    }

    pub fn add_workload_with(
        &self,
        name: &str,
        revision: &str,
        update_strategy: UpdateStrategy,
    ) -> WorkloadId {
        let workload = Workload {
            id: WorkloadId::new(),
            name: name.to_string(),
            revision: Revision::new(revision),
            update_strategy,
        };
        let id = workload.id;
        self.state().workloads.insert(id, workload);
        id
    }

    /// Delete a workload. Its pods are left for garbage collection.
    pub fn remove_workload(&self, id: &WorkloadId) {
        self.state().workloads.remove(id);
    }

    /// Change the template revision of a workload.
    pub fn set_revision(&self, id: &WorkloadId, revision: &str) {
        if let Some(workload) = self.state().workloads.get_mut(id) {
            workload.revision = Revision::new(revision);
        }
    }

    pub fn set_update_strategy(&self, id: &WorkloadId, update_strategy: UpdateStrategy) {
        if let Some(workload) = self.state().workloads.get_mut(id) {
            workload.update_strategy = update_strategy;
        }
    }

    /// Put a pod straight into the cache, bypassing the action queue.
    pub fn insert_pod(&self, pod: Pod) {
        let mut state = self.state();
        state.pods.retain(|p| p.name != pod.name);
        state.pods.push(pod);
    }

    /// Pods of `workload` currently visible in the cache.
    pub fn pods(&self, workload: &WorkloadId) -> Vec<Pod> {
        self.state()
            .pods
            .iter()
            .filter(|p| &p.workload == workload)
            .cloned()
            .collect()
    }

    pub fn set_ready(&self, pod: &PodName, ready: bool) {
        for p in self.state().pods.iter_mut() {
            if &p.name == pod {
                p.ready = ready;
            }
        }
    }

    /// Mark every live pod ready.
    pub fn mark_all_ready(&self) {
        for pod in self.state().pods.iter_mut() {
            if !pod.is_terminating() {
                pod.ready = true;
            }
        }
    }

    /// Apply every accepted action to the cache and return the resulting
    /// watch events in dispatch order.
    pub fn flush(&self) -> Vec<PodEvent> {
        let mut state = self.state();
        let pending = std::mem::take(&mut state.pending);
        let mut events = Vec::with_capacity(pending.len());

        for change in pending {
            match change {
                PendingChange::Create(pod) => {
                    state.pods.push(pod.clone());
                    events.push(PodEvent::Added(pod));
                }
                PendingChange::Delete(name) => {
                    if let Some(index) = state.pods.iter().position(|p| p.name == name) {
                        events.push(PodEvent::Deleted(state.pods.remove(index)));
                    }
                }
            }
        }

        events
    }

    /// Flush, then mark every pod ready.
    pub fn settle(&self) -> Vec<PodEvent> {
        let events = self.flush();
        self.mark_all_ready();
        events
    }

    /// Actions accepted but not yet visible in the cache.
    pub fn pending_changes(&self) -> usize {
        self.state().pending.len()
    }

    pub fn fail_creates(&self, fail: bool) {
        self.state().fail_creates = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state().fail_deletes = fail;
    }

    pub fn fail_node_list(&self, fail: bool) {
        self.state().fail_node_list = fail;
    }

    /// Number of create calls received, failed ones included.
    pub fn create_calls(&self) -> usize {
        self.state().create_calls
    }

    /// Number of delete calls received, failed ones included.
    pub fn delete_calls(&self) -> usize {
        self.state().delete_calls
    }
}

impl ClusterState for MockCluster {
    fn list_workloads(&self) -> Result<Vec<WorkloadId>, ClusterError> {
        Ok(self.state().workloads.keys().copied().collect())
    }

    fn get_workload(&self, id: &WorkloadId) -> Result<Option<Workload>, ClusterError> {
        Ok(self.state().workloads.get(id).cloned())
    }

    fn list_eligible_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        let state = self.state();
        if state.fail_node_list {
            return Err(ClusterError::Unavailable("node cache not synced".into()));
        }
        Ok(state
            .nodes
            .iter()
            .filter(|n| n.is_eligible())
            .cloned()
            .collect())
    }

    fn list_pods(&self, workload: &WorkloadId) -> Result<Vec<Pod>, ClusterError> {
        Ok(self.pods(workload))
    }

    fn current_revision(&self, workload: &Workload) -> Result<Revision, ClusterError> {
        Ok(workload.revision.clone())
    }
}

#[async_trait]
impl PodControl for MockCluster {
    async fn create_pod(
        &self,
        workload: &Workload,
        node: &NodeName,
        revision: &Revision,
    ) -> Result<PodName, ClusterError> {
        let mut state = self.state();
        state.create_calls += 1;
        if state.fail_creates {
            return Err(ClusterError::Rejected(format!("create on {node} refused")));
        }

        let name: PodName = format!("{}-{}", workload.name, state.next_pod)
            .parse()
            .map_err(|e| ClusterError::Rejected(format!("invalid pod name: {e}")))?;
        state.next_pod += 1;

        state.pending.push(PendingChange::Create(Pod {
            name: name.clone(),
            workload: workload.id,
            node_name: node.clone(),
            revision: Some(revision.clone()),
            ready: false,
            deletion_timestamp: None,
            created_at: Utc::now(),
        }));

        Ok(name)
    }

    async fn delete_pod(&self, _workload: &Workload, pod: &PodName) -> Result<(), ClusterError> {
        let mut state = self.state();
        state.delete_calls += 1;
        if state.fail_deletes {
            return Err(ClusterError::Rejected(format!("delete of {pod} refused")));
        }
        if state.pods.iter().all(|p| &p.name != pod) {
            return Err(ClusterError::NotFound(pod.to_string()));
        }

        state.pending.push(PendingChange::Delete(pod.clone()));
        Ok(())
    }
}
