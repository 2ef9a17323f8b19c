//! Test fixtures for nodeset.
//!
//! - [`node`], [`nodes`] and [`PodBuilder`] build cluster objects tersely.
//! - [`RolloutSim`] is an in-memory cluster that applies rollout plans the
//!   way a fake pod client would: deletions remove the pod at once,
//!   creations add a not-ready pod at the desired revision.

use chrono::{DateTime, Utc};
use nodeset_id::{NodeName, PodName, WorkloadId};
use nodeset_reconcile::{
    compute_budget, count_unavailable, plan, MaxUnavailable, Node, NodeTopology, Pod, Revision,
    RolloutPlan,
};

/// A schedulable node. Panics on an invalid name.
pub fn node(name: &str) -> Node {
    Node::new(node_name(name))
}

/// Nodes `node-0` .. `node-{count-1}`.
pub fn nodes(count: usize) -> Vec<Node> {
    (0..count).map(|i| node(&format!("node-{i}"))).collect()
}

pub fn node_name(name: &str) -> NodeName {
    name.parse()
        .unwrap_or_else(|e| panic!("invalid node name '{name}': {e}"))
}

pub fn pod_name(name: &str) -> PodName {
    name.parse()
        .unwrap_or_else(|e| panic!("invalid pod name '{name}': {e}"))
}

/// Builder for test pods. Defaults: not ready, not terminating, revision
/// `v1`, a fresh workload ID.
#[derive(Debug, Clone)]
pub struct PodBuilder {
    pod: Pod,
}

impl PodBuilder {
    pub fn new(name: &str, node: &str) -> Self {
        Self {
            pod: Pod {
                name: pod_name(name),
                workload: WorkloadId::new(),
                node_name: node_name(node),
                revision: Some(Revision::new("v1")),
                ready: false,
                deletion_timestamp: None,
                created_at: Utc::now(),
            },
        }
    }

    pub fn workload(mut self, workload: WorkloadId) -> Self {
        self.pod.workload = workload;
        self
    }

    pub fn revision(mut self, revision: &str) -> Self {
        self.pod.revision = Some(Revision::new(revision));
        self
    }

    pub fn no_revision(mut self) -> Self {
        self.pod.revision = None;
        self
    }

    pub fn ready(mut self) -> Self {
        self.pod.ready = true;
        self
    }

    pub fn terminating(mut self) -> Self {
        self.pod.deletion_timestamp = Some(Utc::now());
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.pod.created_at = at;
        self
    }

    pub fn build(self) -> Pod {
        self.pod
    }
}

/// What one simulated sync did.
#[derive(Debug, Clone)]
pub struct SyncResult {
    pub plan: RolloutPlan,
    pub max_unavailable: u32,
    pub num_unavailable: u32,
}

impl SyncResult {
    pub fn created(&self) -> usize {
        self.plan.creations.len()
    }

    pub fn deleted(&self) -> usize {
        self.plan.deletions.len()
    }

    pub fn deleted_names(&self) -> Vec<PodName> {
        self.plan.pods_to_delete().cloned().collect()
    }
}

/// In-memory cluster running one per-node workload.
#[derive(Debug, Clone)]
pub struct RolloutSim {
    workload: WorkloadId,
    nodes: Vec<Node>,
    pods: Vec<Pod>,
    revision: Revision,
    max_unavailable: MaxUnavailable,
    next_pod: u64,
}

impl RolloutSim {
    /// `node_count` empty nodes, desired revision `v1`, budget 1.
    pub fn new(node_count: usize) -> Self {
        Self {
            workload: WorkloadId::new(),
            nodes: nodes(node_count),
            pods: Vec::new(),
            revision: Revision::new("v1"),
            max_unavailable: MaxUnavailable::Int(1),
            next_pod: 0,
        }
    }

    pub fn workload(&self) -> WorkloadId {
        self.workload
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    /// Change the template; every existing pod becomes stale.
    pub fn set_revision(&mut self, revision: &str) {
        self.revision = Revision::new(revision);
    }

    pub fn set_max_unavailable(&mut self, max_unavailable: impl Into<MaxUnavailable>) {
        self.max_unavailable = max_unavailable.into();
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn pods(&self) -> &[Pod] {
        &self.pods
    }

    pub fn pods_mut(&mut self) -> &mut [Pod] {
        &mut self.pods
    }

    /// Names of ready pods, sorted.
    pub fn ready_pod_names(&self) -> Vec<PodName> {
        let mut names: Vec<PodName> = self
            .pods
            .iter()
            .filter(|p| p.is_ready())
            .map(|p| p.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn mark_all_ready(&mut self) {
        for pod in &mut self.pods {
            pod.ready = true;
        }
    }

    pub fn topology(&self) -> NodeTopology {
        NodeTopology::build(&self.nodes, self.pods.iter().cloned())
    }

    pub fn num_unavailable(&self) -> u32 {
        count_unavailable(&self.nodes, &self.topology())
    }

    /// Plan against the current state without applying anything.
    pub fn plan(&self) -> SyncResult {
        let topology = self.topology();
        let max_unavailable = compute_budget(&self.max_unavailable, self.nodes.len())
            .unwrap_or_else(|e| panic!("invalid budget in simulation: {e}"));
        let num_unavailable = count_unavailable(&self.nodes, &topology);
        SyncResult {
            plan: plan(&topology, &self.revision, max_unavailable, num_unavailable),
            max_unavailable,
            num_unavailable,
        }
    }

    /// Plan and apply: planned pods disappear, planned nodes get a new
    /// not-ready pod at the desired revision.
    pub fn sync(&mut self) -> SyncResult {
        let result = self.plan();

        let doomed: Vec<&PodName> = result.plan.pods_to_delete().collect();
        self.pods.retain(|pod| !doomed.contains(&&pod.name));

        for node in &result.plan.creations {
            let name = pod_name(&format!("pod-{}", self.next_pod));
            self.next_pod += 1;
            self.pods.push(Pod {
                name,
                workload: self.workload,
                node_name: node.clone(),
                revision: Some(self.revision.clone()),
                ready: false,
                deletion_timestamp: None,
                created_at: Utc::now(),
            });
        }

        result
    }
}
