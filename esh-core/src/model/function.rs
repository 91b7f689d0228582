//! Function evaluation interface.
//!
//! The symbolic representation and automatic differentiation are external;
//! the loop only needs values and first derivatives at points.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::EshResult;

/// Sparse gradient: variable index to partial derivative.
///
/// Ordered so that linearizations built from it are deterministic.
pub type SparseGradient = BTreeMap<usize, f64>;

/// A scalar function of the working model's variables.
///
/// Implementations must be deterministic and side-effect-free.
pub trait NonlinearFunction: Send + Sync {
    /// Function value. May be NaN or infinite outside the function's domain.
    fn value(&self, point: &[f64]) -> f64;

    /// Gradient at `point`, or an evaluation error if it is undefined there.
    fn gradient(&self, point: &[f64]) -> EshResult<SparseGradient>;
}

/// Function given by a value closure and a gradient closure.
pub struct ClosureFunction<V, G> {
    value: V,
    gradient: G,
}

impl<V, G> ClosureFunction<V, G>
where
    V: Fn(&[f64]) -> f64 + Send + Sync,
    G: Fn(&[f64]) -> EshResult<SparseGradient> + Send + Sync,
{
    /// Create a function from its value and gradient.
    pub fn new(value: V, gradient: G) -> Self {
        Self { value, gradient }
    }
}

impl<V, G> NonlinearFunction for ClosureFunction<V, G>
where
    V: Fn(&[f64]) -> f64 + Send + Sync,
    G: Fn(&[f64]) -> EshResult<SparseGradient> + Send + Sync,
{
    fn value(&self, point: &[f64]) -> f64 {
        (self.value)(point)
    }

    fn gradient(&self, point: &[f64]) -> EshResult<SparseGradient> {
        (self.gradient)(point)
    }
}

impl<V, G> fmt::Debug for ClosureFunction<V, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClosureFunction")
    }
}

/// Affine function c^T x + c0.
#[derive(Debug, Clone, Default)]
pub struct LinearFunction {
    /// Nonzero coefficients as (variable, coefficient).
    pub terms: Vec<(usize, f64)>,

    /// Constant term.
    pub constant: f64,
}

impl LinearFunction {
    /// Create a linear function.
    pub fn new(terms: Vec<(usize, f64)>, constant: f64) -> Self {
        Self { terms, constant }
    }
}

impl NonlinearFunction for LinearFunction {
    fn value(&self, point: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(i, c)| c * point.get(i).copied().unwrap_or(f64::NAN))
            .sum::<f64>()
            + self.constant
    }

    fn gradient(&self, _point: &[f64]) -> EshResult<SparseGradient> {
        let mut g = SparseGradient::new();
        for &(i, c) in &self.terms {
            *g.entry(i).or_insert(0.0) += c;
        }
        Ok(g)
    }
}
