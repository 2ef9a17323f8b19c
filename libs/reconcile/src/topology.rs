//! Node to pod mapping for one workload.

use std::collections::BTreeMap;

use nodeset_id::NodeName;

use crate::model::{Node, Pod};
use crate::revision::{classify, Revision, RevisionClass};

/// Pods grouped by the eligible node they are bound to.
///
/// Every eligible node has an entry, possibly empty. Pods bound to a node
/// outside the eligible set are kept aside as orphans so the planner can
/// clean them up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeTopology {
    nodes: BTreeMap<NodeName, Vec<Pod>>,
    orphans: Vec<Pod>,
}

impl NodeTopology {
    /// Group `pods` by node, restricted to `eligible_nodes`.
    ///
    /// Pods on each node are ordered by name so that the topology, and
    /// everything derived from it, does not depend on lister ordering.
    pub fn build<I>(eligible_nodes: &[Node], pods: I) -> Self
    where
        I: IntoIterator<Item = Pod>,
    {
        let mut nodes: BTreeMap<NodeName, Vec<Pod>> = eligible_nodes
            .iter()
            .map(|node| (node.name.clone(), Vec::new()))
            .collect();
        let mut orphans = Vec::new();

        for pod in pods {
            match nodes.get_mut(&pod.node_name) {
                Some(assigned) => assigned.push(pod),
                None => orphans.push(pod),
            }
        }

        for assigned in nodes.values_mut() {
            assigned.sort_by(|a, b| a.name.cmp(&b.name));
        }
        orphans.sort_by(|a, b| (&a.node_name, &a.name).cmp(&(&b.node_name, &b.name)));

        Self { nodes, orphans }
    }

    /// Pods on `node`, or `None` if the node is not eligible.
    pub fn pods_on(&self, node: &NodeName) -> Option<&[Pod]> {
        self.nodes.get(node).map(Vec::as_slice)
    }

    /// Iterate eligible nodes and their pods in node-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeName, &[Pod])> {
        self.nodes.iter().map(|(name, pods)| (name, pods.as_slice()))
    }

    /// Pods bound to nodes that are not eligible (removed, cordoned, ...).
    pub fn orphans(&self) -> &[Pod] {
        &self.orphans
    }

    /// Number of eligible nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if `node` has at least one ready, non-terminating pod.
    pub fn is_node_available(&self, node: &NodeName) -> bool {
        self.pods_on(node)
            .is_some_and(|pods| pods.iter().any(Pod::is_available))
    }

    /// Per-node view of the pods partitioned against `desired`.
    pub fn slots<'a>(&'a self, desired: &'a Revision) -> impl Iterator<Item = NodeSlot<'a>> + 'a {
        self.iter().map(move |(node, pods)| NodeSlot::new(node, pods, desired))
    }
}

/// The pods on one node, partitioned into current, stale and terminating.
#[derive(Debug, Clone)]
pub struct NodeSlot<'a> {
    pub node: &'a NodeName,

    /// Live pods created from the desired revision.
    pub current: Vec<&'a Pod>,

    /// Live pods from any other revision.
    pub stale: Vec<&'a Pod>,

    /// Pods already being deleted, whatever their revision.
    pub terminating: Vec<&'a Pod>,

    /// Whether any pod on the node is ready and not terminating.
    pub available: bool,
}

impl<'a> NodeSlot<'a> {
    fn new(node: &'a NodeName, pods: &'a [Pod], desired: &Revision) -> Self {
        let mut slot = Self {
            node,
            current: Vec::new(),
            stale: Vec::new(),
            terminating: Vec::new(),
            available: pods.iter().any(Pod::is_available),
        };

        for pod in pods {
            if pod.is_terminating() {
                slot.terminating.push(pod);
            } else if classify(pod, desired) == RevisionClass::Current {
                slot.current.push(pod);
            } else {
                slot.stale.push(pod);
            }
        }

        slot
    }

    /// Returns true if no pod at all is bound to the node.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.stale.is_empty() && self.terminating.is_empty()
    }

    /// Rolled: a current pod and nothing stale left.
    pub fn is_updated(&self) -> bool {
        !self.current.is_empty() && self.stale.is_empty()
    }
}
