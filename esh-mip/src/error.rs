//! Error types for the dual layer.

use esh_core::EshError;
use thiserror::Error;

/// Errors reported by a MILP backend adapter.
///
/// Backends translate their native failures into these kinds instead of
/// panicking or unwinding through the callback.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The engine refused a constraint
    #[error("Constraint rejected: {0}")]
    CutRejected(String),

    /// The engine could not produce a solve status
    #[error("Solve failed: {0}")]
    Solve(String),

    /// The requested information is not available for this event or state
    #[error("Not available: {0}")]
    NotAvailable(String),

    /// Row, column or solution index out of range
    #[error("Invalid index {index} ({len} available)")]
    InvalidIndex {
        /// Requested index.
        index: usize,
        /// Number of valid indices.
        len: usize,
    },

    /// Error code returned by the native engine
    #[error("Native solver error {code}: {message}")]
    Native {
        /// Engine-specific code.
        code: i32,
        /// Engine message.
        message: String,
    },
}

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur in the dual layer.
#[derive(Error, Debug)]
pub enum MipError {
    /// Backend call failed outside the callback
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Core model error
    #[error("Core error: {0}")]
    Core(#[from] EshError),

    /// Internal inconsistency
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for dual layer operations.
pub type MipResult<T> = Result<T, MipError>;
