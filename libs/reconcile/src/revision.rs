//! Revision classification.
//!
//! Revision identifiers are computed once per template generation, so
//! classification is an exact string comparison and never a template diff.

use serde::{Deserialize, Serialize};

use crate::model::Pod;

/// Opaque identifier of one template generation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pod classification relative to the desired revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionClass {
    /// Pod was created from the desired template.
    Current,

    /// Pod belongs to a prior revision, or has no revision at all.
    Stale,
}

/// Classify a pod against the desired revision.
pub fn classify(pod: &Pod, desired: &Revision) -> RevisionClass {
    match &pod.revision {
        Some(revision) if revision == desired => RevisionClass::Current,
        _ => RevisionClass::Stale,
    }
}
