//! # nodeset-id
//!
//! Typed identifiers for the nodeset rollout controller.
//!
//! Two kinds of identity exist in the controller:
//!
//! - **Generated IDs** (`WorkloadId`): prefixed ULIDs, `{prefix}_{ulid}`,
//!   e.g. `wl_01HV4Z2WQXKJNM8GPQY6VBKC3D`. Sortable and unique.
//! - **Resource names** (`NodeName`, `PodName`): names handed to us by the
//!   cluster. They are validated DNS-1123 subdomains and ordered
//!   lexicographically, which is what makes rollout plans reproducible.
//!
//! Both kinds parse strictly, roundtrip through `Display`/`FromStr`, and
//! serialize as plain strings.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
