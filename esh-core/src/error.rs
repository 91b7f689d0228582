//! Error types for the core model.

use thiserror::Error;

/// Errors that can occur while evaluating or configuring the problem model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EshError {
    /// Problem construction or validation failed
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// A function value or gradient is undefined at the given point
    #[error("Evaluation of constraint {constraint} failed: {message}")]
    Evaluation {
        /// Index of the constraint (or `usize::MAX` for the objective).
        constraint: usize,
        /// Description of the failure.
        message: String,
    },

    /// A point has the wrong number of coordinates
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// A setting has a value outside its admissible range
    #[error("Invalid setting {category}.{key}: {message}")]
    InvalidSettings {
        /// Settings category.
        category: &'static str,
        /// Settings key.
        key: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// Line search could not be carried out
    #[error("Line search failed: {0}")]
    Linesearch(String),
}

impl EshError {
    /// Shorthand for an evaluation failure.
    pub fn evaluation(constraint: usize, message: impl Into<String>) -> Self {
        EshError::Evaluation {
            constraint,
            message: message.into(),
        }
    }
}

/// Result type for core operations.
pub type EshResult<T> = Result<T, EshError>;
