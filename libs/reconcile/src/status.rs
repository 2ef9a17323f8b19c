//! Rollout progress counters.

use serde::{Deserialize, Serialize};

use crate::revision::Revision;
use crate::topology::NodeTopology;

/// Progress of a workload across its eligible nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutStatus {
    /// Eligible nodes, i.e. nodes that should run one pod.
    pub desired_scheduled: u32,

    /// Nodes running at least one live pod of any revision.
    pub current_scheduled: u32,

    /// Nodes running a live pod at the desired revision.
    pub updated_scheduled: u32,

    /// Nodes with at least one ready pod, terminating or not.
    pub number_ready: u32,

    /// Nodes with at least one ready, non-terminating pod.
    pub number_available: u32,

    pub number_unavailable: u32,

    /// Live pods from older revisions still running on eligible nodes.
    pub stale_pods: u32,
}

impl RolloutStatus {
    pub fn from_topology(topology: &NodeTopology, desired: &Revision) -> Self {
        let mut status = Self::default();

        for slot in topology.slots(desired) {
            status.desired_scheduled += 1;
            if !slot.current.is_empty() || !slot.stale.is_empty() {
                status.current_scheduled += 1;
            }
            if !slot.current.is_empty() {
                status.updated_scheduled += 1;
            }
            if slot
                .current
                .iter()
                .chain(&slot.stale)
                .chain(&slot.terminating)
                .any(|pod| pod.is_ready())
            {
                status.number_ready += 1;
            }
            if slot.available {
                status.number_available += 1;
            } else {
                status.number_unavailable += 1;
            }
            status.stale_pods += slot.stale.len() as u32;
        }

        status
    }

    /// Every eligible node runs an available pod at the desired revision and
    /// nothing stale is left.
    pub fn is_complete(&self) -> bool {
        self.stale_pods == 0
            && self.updated_scheduled == self.desired_scheduled
            && self.number_available == self.desired_scheduled
    }
}
