//! Gradient linearization of hyperplanes.

use esh_core::{EshResult, Problem, SparseGradient};
use sprs::CsVec;

use crate::hyperplane::{Hyperplane, HyperplaneTarget};

/// Linear terms of a cut `terms^T x + constant <= 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperplaneTerms {
    /// Gradient coefficients, one entry per nonzero.
    pub terms: CsVec<f64>,

    /// g(x0) - grad g(x0)^T x0.
    pub constant: f64,
}

impl HyperplaneTerms {
    /// Right-hand side of `terms^T x <= rhs`.
    pub fn rhs(&self) -> f64 {
        -self.constant
    }

    /// Value of the linearization at `point`.
    pub fn value_at(&self, point: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(i, &c)| c * point.get(i).copied().unwrap_or(f64::NAN))
            .sum::<f64>()
            + self.constant
    }
}

/// Turns hyperplanes into linear constraints.
#[derive(Debug, Clone, Copy)]
pub struct HyperplaneBuilder<'a> {
    problem: &'a Problem,
}

impl<'a> HyperplaneBuilder<'a> {
    /// Builder for hyperplanes of `problem`.
    pub fn new(problem: &'a Problem) -> Self {
        Self { problem }
    }

    /// First-order Taylor linearization at the generation point.
    ///
    /// Returns None (and logs) when the value or gradient cannot be
    /// evaluated there, or when any coefficient is not finite. A
    /// hyperplane is never partially built. A zero gradient still yields
    /// the empty row `0 <= -constant` when the point is violated.
    pub fn create_hyperplane_terms(&self, hyperplane: &Hyperplane) -> Option<HyperplaneTerms> {
        let point = &hyperplane.generated_point;
        let n = self.problem.num_variables();

        if point.len() != n {
            log::error!(
                "Hyperplane point has {} coordinates, problem has {} variables",
                point.len(),
                n
            );
            return None;
        }

        let (name, value, gradient) = match self.evaluate(hyperplane.source_constraint, point) {
            Some(evaluated) => evaluated,
            None => return None,
        };

        let gradient = match gradient {
            Ok(g) => g,
            Err(e) => {
                log::error!("Cannot linearize {}: {}", name, e);
                return None;
            }
        };

        if !value.is_finite() {
            log::error!("Cannot linearize {}: function value is {}", name, value);
            return None;
        }

        let mut constant = value;
        let mut indices = Vec::with_capacity(gradient.len());
        let mut data = Vec::with_capacity(gradient.len());

        for (&var, &coef) in &gradient {
            if var >= n {
                log::error!("Hyperplane for {} references unknown variable {}", name, var);
                return None;
            }
            if !coef.is_finite() {
                let var_name = self
                    .problem
                    .variable(var)
                    .map_or("?", |v| v.name.as_str());
                log::error!(
                    "Hyperplane for {} discarded: coefficient of variable {} is {}",
                    name,
                    var_name,
                    coef
                );
                return None;
            }
            if coef == 0.0 {
                continue;
            }

            constant -= coef * point[var];
            indices.push(var);
            data.push(coef);
        }

        if !constant.is_finite() {
            log::error!("Hyperplane for {} discarded: constant is {}", name, constant);
            return None;
        }
        if indices.is_empty() {
            // 0 <= -constant: redundant unless the point is violated, in
            // which case the row certifies infeasibility
            if constant <= 0.0 {
                log::debug!("Hyperplane for {} has no nonzero terms", name);
                return None;
            }
            log::warn!(
                "Hyperplane for {} has no nonzero terms at a violated point ({:.3e})",
                name,
                constant
            );
        }

        // BTreeMap iteration gives sorted unique indices below n
        Some(HyperplaneTerms {
            terms: CsVec::new(n, indices, data),
            constant,
        })
    }

    fn evaluate(
        &self,
        target: HyperplaneTarget,
        point: &[f64],
    ) -> Option<(String, f64, EshResult<SparseGradient>)> {
        match target {
            HyperplaneTarget::Constraint(index) => {
                let Some(constraint) = self.problem.constraint(index) else {
                    log::error!("Hyperplane references unknown constraint {}", index);
                    return None;
                };
                Some((
                    format!("constraint {}", constraint.name),
                    constraint.calculate_function_value(point),
                    constraint.calculate_gradient(point),
                ))
            }
            HyperplaneTarget::Objective => {
                let Some(value) = self.problem.objective_epigraph_value(point) else {
                    log::error!("Objective hyperplane requires an auxiliary objective variable");
                    return None;
                };
                Some((
                    "objective".to_string(),
                    value,
                    self.problem.objective_epigraph_gradient(point),
                ))
            }
        }
    }
}
