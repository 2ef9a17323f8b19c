//! Errors raised by the rollout engine.

use thiserror::Error;

/// The rollout budget could not be resolved from the update strategy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BudgetError {
    /// Absolute budgets must be non-negative.
    #[error("invalid budget: max_unavailable must be non-negative, got {value}")]
    Negative { value: i64 },

    /// Percent budgets must look like `"25%"`.
    #[error("invalid budget: '{value}' is not a percentage of the form '<integer>%'")]
    MalformedPercent { value: String },
}
