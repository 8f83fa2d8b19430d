//! Error taxonomy for material and store operations.

use thiserror::Error;

/// Failures surfaced by the materials core. Nothing is retried internally;
/// every variant names the offending quantity so callers can log or abort
/// with full context.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A numeric precondition was violated (negative threshold, extracting
    /// more than held, composition that sums to zero, ...).
    #[error("value error: {reason}")]
    Value { reason: String },

    /// The store's finite capacity would be exceeded.
    #[error("inventory of {requested} kg would exceed capacity {capacity} kg")]
    OverCapacity { requested: f64, capacity: f64 },

    /// More was requested from a store than it holds.
    #[error("removal of {requested} exceeds inventory {available}")]
    NegQty { requested: f64, available: f64 },

    /// A mass unit string could not be decoded.
    #[error("unsupported mass unit '{unit}'")]
    Unit { unit: String },
}

impl CoreError {
    pub(crate) fn value(reason: impl Into<String>) -> Self {
        CoreError::Value { reason: reason.into() }
    }
}
