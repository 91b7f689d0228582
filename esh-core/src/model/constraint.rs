//! Nonlinear constraints g(x) = f(x) - ub <= 0.

use std::fmt;

use super::function::{NonlinearFunction, SparseGradient};
use crate::error::EshResult;

/// Evaluated constraint at a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericConstraintValue {
    /// Constraint index.
    pub constraint: usize,

    /// Raw value f(x) - ub (positive means violated).
    pub value: f64,

    /// Value scaled by max(1, |ub|). Undefined values map to +inf.
    pub normalized_value: f64,

    /// Whether the constraint is satisfied (value <= 0).
    pub is_fulfilled: bool,
}

/// A nonlinear constraint f(x) <= ub of the working model.
pub struct NumericConstraint {
    /// Position in the problem's nonlinear constraint list.
    pub index: usize,

    /// Name for diagnostics.
    pub name: String,

    /// The constraint function f.
    pub function: Box<dyn NonlinearFunction>,

    /// Right-hand side ub.
    pub upper_bound: f64,

    /// Whether f is known to be convex. Cuts from nonconvex sources are
    /// candidates for infeasibility repair.
    pub is_convex: bool,
}

impl NumericConstraint {
    /// g(x) = f(x) - ub.
    pub fn calculate_function_value(&self, point: &[f64]) -> f64 {
        self.function.value(point) - self.upper_bound
    }

    /// Gradient of g (equal to the gradient of f).
    pub fn calculate_gradient(&self, point: &[f64]) -> EshResult<SparseGradient> {
        self.function.gradient(point)
    }

    /// Evaluate the constraint at `point`.
    pub fn numeric_value(&self, point: &[f64]) -> NumericConstraintValue {
        let value = self.calculate_function_value(point);
        let normalized_value = if value.is_nan() {
            f64::INFINITY
        } else {
            value / self.upper_bound.abs().max(1.0)
        };

        NumericConstraintValue {
            constraint: self.index,
            value,
            normalized_value,
            is_fulfilled: value <= 0.0,
        }
    }
}

impl fmt::Debug for NumericConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumericConstraint")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("upper_bound", &self.upper_bound)
            .field("is_convex", &self.is_convex)
            .finish()
    }
}
