//! Typed ID and name definitions for controller resources.

use crate::{define_id, define_name, IdError};

// =============================================================================
// Generated IDs
// =============================================================================

define_id!(WorkloadId, "wl");

// =============================================================================
// Cluster-assigned names
// =============================================================================

define_name!(NodeName);
define_name!(PodName);

/// Splits `{prefix}_{ulid}` and checks the prefix.
pub fn parse_prefixed(s: &str, prefix: &'static str) -> Result<crate::Ulid, IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }

    let (actual, ulid) = s.split_once('_').ok_or(IdError::MissingSeparator)?;
    if actual != prefix {
        return Err(IdError::InvalidPrefix {
            expected: prefix,
            actual: actual.to_string(),
        });
    }

    ulid.parse()
        .map_err(|e: ulid::DecodeError| IdError::InvalidUlid(e.to_string()))
}

/// Validates a DNS-1123 subdomain style resource name.
pub fn validate_name(s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }

    if s.len() > NodeName::MAX_LEN {
        return Err(IdError::TooLong {
            len: s.len(),
            max: NodeName::MAX_LEN,
        });
    }

    if !s
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err(IdError::InvalidName {
            name: s.to_string(),
            message: "only lowercase alphanumerics, '-' and '.' are allowed",
        });
    }

    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let bytes = s.as_bytes();
    if !alnum(bytes[0]) || !alnum(bytes[bytes.len() - 1]) {
        return Err(IdError::InvalidName {
            name: s.to_string(),
            message: "must start and end with an alphanumeric character",
        });
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
