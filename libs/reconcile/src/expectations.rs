//! Expectations for in-flight pod actions.
//!
//! The pod cache lags behind the actions we issue. Without bookkeeping a
//! pass that runs before the cache has caught up would see the old state
//! and issue the same creates and deletes again. Each dispatch records how
//! many creations and deletions it expects to observe; the next pass only
//! plans once they have all been observed, or once the record is older than
//! the timeout.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use nodeset_id::WorkloadId;
use tracing::{debug, warn};

/// Default time to wait for the cache to observe dispatched actions.
pub const DEFAULT_EXPECTATIONS_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Outstanding actions for one workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingActions {
    pub creates: i64,
    pub deletes: i64,
}

impl PendingActions {
    /// Returns true if every recorded action has been observed.
    pub fn is_fulfilled(&self) -> bool {
        self.creates <= 0 && self.deletes <= 0
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    pending: PendingActions,
    recorded_at: Instant,
}

/// Per-workload expectation counters with a deadline.
///
/// Entries live in a sharded map, so updates for one workload never
/// contend with another workload's pass.
#[derive(Debug)]
pub struct ExpectationTracker {
    timeout: Duration,
    entries: DashMap<WorkloadId, Entry>,
}

impl Default for ExpectationTracker {
    fn default() -> Self {
        Self::new(DEFAULT_EXPECTATIONS_TIMEOUT)
    }
}

impl ExpectationTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: DashMap::new(),
        }
    }

    /// Record the actions about to be dispatched for `workload`.
    ///
    /// Replaces any previous record and restarts its deadline.
    pub fn record(&self, workload: WorkloadId, creates: usize, deletes: usize) {
        let pending = PendingActions {
            creates: i64::try_from(creates).unwrap_or(i64::MAX),
            deletes: i64::try_from(deletes).unwrap_or(i64::MAX),
        };
        debug!(
            workload_id = %workload,
            creates = pending.creates,
            deletes = pending.deletes,
            "Recording expectations"
        );
        self.entries.insert(
            workload,
            Entry {
                pending,
                recorded_at: Instant::now(),
            },
        );
    }

    /// Returns true if a new pass may plan for `workload`.
    ///
    /// A fulfilled record is reset so the pass starts from a clean slate. An
    /// expired record is dropped as well: the pass proceeds on fresh state
    /// instead of stalling forever on an observation that never arrives.
    pub fn satisfied(&self, workload: &WorkloadId) -> bool {
        let Some(entry) = self.entries.get(workload).map(|e| *e) else {
            return true;
        };

        if entry.pending.is_fulfilled() {
            self.entries
                .remove_if(workload, |_, e| e.pending.is_fulfilled());
            return true;
        }

        let age = entry.recorded_at.elapsed();
        if age >= self.timeout {
            warn!(
                workload_id = %workload,
                creates = entry.pending.creates,
                deletes = entry.pending.deletes,
                age_secs = age.as_secs(),
                "Expectations timed out, proceeding with a fresh plan"
            );
            self.entries.remove(workload);
            return true;
        }

        false
    }

    /// A pod created for `workload` has appeared in the cache, or its
    /// creation failed and will never appear.
    pub fn creation_observed(&self, workload: &WorkloadId) {
        if let Some(mut entry) = self.entries.get_mut(workload) {
            entry.pending.creates -= 1;
        }
    }

    /// A pod deleted for `workload` has left the cache, or its deletion
    /// failed and will never be observed.
    pub fn deletion_observed(&self, workload: &WorkloadId) {
        if let Some(mut entry) = self.entries.get_mut(workload) {
            entry.pending.deletes -= 1;
        }
    }

    /// Outstanding actions for `workload`, if any are recorded.
    pub fn pending(&self, workload: &WorkloadId) -> Option<PendingActions> {
        self.entries.get(workload).map(|e| e.pending)
    }

    /// Drop the record for `workload`.
    pub fn reset(&self, workload: &WorkloadId) {
        self.entries.remove(workload);
    }

    /// Drop everything known about a deleted workload.
    pub fn forget(&self, workload: &WorkloadId) {
        if self.entries.remove(workload).is_some() {
            debug!(workload_id = %workload, "Forgot expectations for deleted workload");
        }
    }

    /// Drop records for workloads not in `known`, i.e. workloads deleted
    /// without a final pass. Returns how many were dropped.
    pub fn retain_known(&self, known: &[WorkloadId]) -> usize {
        let known: HashSet<&WorkloadId> = known.iter().collect();
        let before = self.entries.len();
        self.entries.retain(|id, _| known.contains(id));

        let dropped = before.saturating_sub(self.entries.len());
        if dropped > 0 {
            debug!(dropped, "Dropped expectations for deleted workloads");
        }
        dropped
    }

    /// Number of workloads with a record.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
