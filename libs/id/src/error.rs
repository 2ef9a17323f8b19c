//! Error types for ID and name parsing.

use thiserror::Error;

/// Errors that can occur when parsing or validating IDs and names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("ID cannot be empty")]
    Empty,

    /// The ID has an invalid prefix.
    #[error("invalid ID prefix: expected '{expected}', got '{actual}'")]
    InvalidPrefix {
        expected: &'static str,
        actual: String,
    },

    /// The ID is missing the underscore separator.
    #[error("ID missing underscore separator")]
    MissingSeparator,

    /// The ULID portion of the ID is invalid.
    #[error("invalid ULID: {0}")]
    InvalidUlid(String),

    /// The resource name is longer than allowed.
    #[error("name is {len} characters, at most {max} allowed")]
    TooLong { len: usize, max: usize },

    /// The resource name contains a character outside `[a-z0-9.-]` or does not
    /// start and end with an alphanumeric character.
    #[error("invalid name '{name}': {message}")]
    InvalidName { name: String, message: &'static str },
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty)
    }

    /// Returns true if this error came from resource name validation.
    pub fn is_name_error(&self) -> bool {
        matches!(self, IdError::TooLong { .. } | IdError::InvalidName { .. })
    }
}
