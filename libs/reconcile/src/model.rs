//! Cluster objects as seen by the rollout engine.
//!
//! These are read-only snapshots: the engine never mutates a `Node` or `Pod`,
//! it only decides which pods to delete and which nodes need a new pod.

use chrono::{DateTime, Utc};
use nodeset_id::{NodeName, PodName, WorkloadId};
use serde::{Deserialize, Serialize};

use crate::revision::Revision;

/// A cluster machine that may host the workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: NodeName,

    /// Scheduling eligibility as reported by the node lister. Taint and
    /// selector matching happen upstream; this is consumed as-is.
    #[serde(default = "default_schedulable")]
    pub schedulable: bool,
}

fn default_schedulable() -> bool {
    true
}

impl Node {
    pub fn new(name: NodeName) -> Self {
        Self {
            name,
            schedulable: true,
        }
    }

    /// Returns true if the workload should run on this node.
    pub fn is_eligible(&self) -> bool {
        self.schedulable
    }
}

/// One instance of the workload template, bound to exactly one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub name: PodName,

    /// Owning workload.
    pub workload: WorkloadId,

    pub node_name: NodeName,

    /// Template generation the pod was created from. Pods created before
    /// revisions were recorded have none and are always stale.
    pub revision: Option<Revision>,

    pub ready: bool,

    /// Set once deletion has been requested; the object lingers until the
    /// node finishes tearing it down.
    pub deletion_timestamp: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Pod {
    /// Returns true if the readiness probe reports the pod ready.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Returns true if deletion has been requested for the pod.
    pub fn is_terminating(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// A pod is available when it is ready and not on its way out.
    pub fn is_available(&self) -> bool {
        self.is_ready() && !self.is_terminating()
    }
}

/// Upper bound on simultaneously unavailable nodes, either an absolute
/// count or a percentage of eligible nodes (`"25%"`).
///
/// Kept in its raw form so that malformed values surface as budget errors
/// at reconcile time instead of failing deserialization of the whole
/// workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxUnavailable {
    Int(i64),
    Percent(String),
}

impl Default for MaxUnavailable {
    fn default() -> Self {
        Self::Int(1)
    }
}

impl From<i64> for MaxUnavailable {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for MaxUnavailable {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for MaxUnavailable {
    fn from(value: &str) -> Self {
        Self::Percent(value.to_string())
    }
}

impl std::fmt::Display for MaxUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Percent(p) => f.write_str(p),
        }
    }
}

/// How stale pods get replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateStrategy {
    /// Replace stale pods automatically, keeping at most `max_unavailable`
    /// nodes without an available pod.
    RollingUpdate {
        #[serde(default)]
        max_unavailable: MaxUnavailable,
    },

    /// Only replace a stale pod after it has been deleted by someone else.
    OnDelete,
}

impl Default for UpdateStrategy {
    fn default() -> Self {
        Self::RollingUpdate {
            max_unavailable: MaxUnavailable::default(),
        }
    }
}

impl UpdateStrategy {
    /// Shorthand for a rolling update with the given budget.
    pub fn rolling(max_unavailable: impl Into<MaxUnavailable>) -> Self {
        Self::RollingUpdate {
            max_unavailable: max_unavailable.into(),
        }
    }

    /// Returns true if stale pods are replaced by the controller.
    pub fn is_rolling(&self) -> bool {
        matches!(self, Self::RollingUpdate { .. })
    }
}

/// The desired state of a per-node workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub id: WorkloadId,
    pub name: String,

    /// Revision of the current template, precomputed by the template hasher.
    pub revision: Revision,

    #[serde(default)]
    pub update_strategy: UpdateStrategy,
}
