//! Primal/dual bound ledger.

use crate::settings::TerminationSettings;
use crate::solution::{DualSolution, PrimalSolution, PrimalSolutionSource, SolutionPoint};

/// Denominator floor for the relative gap.
const GAP_EPSILON: f64 = 1e-10;

/// Best known primal and dual objective bounds.
///
/// Bounds only move when a candidate strictly improves them in the
/// problem's direction, so neither bound ever regresses. For a
/// minimization problem dual <= primal holds at all times; maximization
/// mirrors it.
#[derive(Debug, Clone)]
pub struct BoundLedger {
    is_minimization: bool,
    constraint_tolerance: f64,
    absolute_gap_tolerance: f64,
    relative_gap_tolerance: f64,

    primal_bound: f64,
    dual_bound: f64,
    primal_solution: Option<PrimalSolution>,

    primal_history: Vec<PrimalSolution>,
    dual_history: Vec<DualSolution>,
}

impl BoundLedger {
    /// Create a ledger with infinite bounds.
    pub fn new(is_minimization: bool, termination: &TerminationSettings) -> Self {
        let (primal_bound, dual_bound) = if is_minimization {
            (f64::INFINITY, f64::NEG_INFINITY)
        } else {
            (f64::NEG_INFINITY, f64::INFINITY)
        };

        Self {
            is_minimization,
            constraint_tolerance: termination.constraint_tolerance,
            absolute_gap_tolerance: termination.absolute_gap_tolerance,
            relative_gap_tolerance: termination.relative_gap_tolerance,
            primal_bound,
            dual_bound,
            primal_solution: None,
            primal_history: Vec::new(),
            dual_history: Vec::new(),
        }
    }

    /// Objective sense.
    pub fn is_minimization(&self) -> bool {
        self.is_minimization
    }

    /// Best primal bound (objective of the best feasible solution).
    pub fn primal_bound(&self) -> f64 {
        self.primal_bound
    }

    /// Best dual bound.
    pub fn dual_bound(&self) -> f64 {
        self.dual_bound
    }

    /// Best primal solution.
    pub fn primal_solution(&self) -> Option<&PrimalSolution> {
        self.primal_solution.as_ref()
    }

    /// Every primal candidate offered, accepted or not.
    pub fn primal_history(&self) -> &[PrimalSolution] {
        &self.primal_history
    }

    /// Every dual candidate offered, accepted or not.
    pub fn dual_history(&self) -> &[DualSolution] {
        &self.dual_history
    }

    /// Whether `value` would strictly improve the primal bound.
    pub fn improves_primal(&self, value: f64) -> bool {
        if self.is_minimization {
            value < self.primal_bound
        } else {
            value > self.primal_bound
        }
    }

    /// Whether `value` would strictly improve the dual bound.
    pub fn improves_dual(&self, value: f64) -> bool {
        if self.is_minimization {
            value > self.dual_bound
        } else {
            value < self.dual_bound
        }
    }

    /// Offer a primal candidate.
    ///
    /// Accepted only if it is feasible, strictly improves the primal bound
    /// and does not cross the dual bound by more than the absolute gap
    /// tolerance. Returns true if the primal bound changed.
    pub fn add_primal_solution_candidate(
        &mut self,
        point: SolutionPoint,
        source: PrimalSolutionSource,
    ) -> bool {
        let value = point.objective_value;
        let feasible = point.is_feasible(self.constraint_tolerance);
        let candidate = PrimalSolution { point, source };

        let accepted = if !feasible {
            log::debug!(
                "Primal candidate {:.6} from {:?} rejected: max deviation {:.3e}",
                value,
                source,
                candidate.point.max_deviation_value()
            );
            false
        } else if value.is_nan() || !self.improves_primal(value) {
            false
        } else if self.crosses_dual(value) {
            log::warn!(
                "Primal candidate {:.6} from {:?} crosses dual bound {:.6}, rejected",
                value,
                source,
                self.dual_bound
            );
            false
        } else {
            true
        };

        if accepted {
            self.primal_bound = value;
            self.primal_solution = Some(candidate.clone());
        }
        self.primal_history.push(candidate);
        accepted
    }

    /// Offer a dual candidate.
    ///
    /// A candidate that would cross the primal bound is clamped to it.
    /// Returns true if the dual bound changed.
    pub fn add_dual_solution_candidate(&mut self, candidate: DualSolution) -> bool {
        let mut value = candidate.objective_value;
        self.dual_history.push(candidate);

        if value.is_nan() || !self.improves_dual(value) {
            return false;
        }

        if self.crosses_primal(value) {
            log::debug!(
                "Dual candidate {:.6} clamped to primal bound {:.6}",
                value,
                self.primal_bound
            );
            value = self.primal_bound;
            if !self.improves_dual(value) {
                return false;
            }
        }

        self.dual_bound = value;
        true
    }

    /// |primal - dual|, or +inf while either bound is infinite.
    pub fn absolute_gap(&self) -> f64 {
        if !self.bounds_finite() {
            return f64::INFINITY;
        }
        (self.primal_bound - self.dual_bound).abs()
    }

    /// |primal - dual| / max(|primal|, 1e-10), or +inf while either bound is infinite.
    pub fn relative_gap(&self) -> f64 {
        if !self.bounds_finite() {
            return f64::INFINITY;
        }
        (self.primal_bound - self.dual_bound).abs() / self.primal_bound.abs().max(GAP_EPSILON)
    }

    /// Absolute gap within tolerance.
    pub fn is_absolute_objective_gap_tolerance_met(&self) -> bool {
        self.bounds_finite() && self.absolute_gap() <= self.absolute_gap_tolerance
    }

    /// Relative gap within tolerance.
    pub fn is_relative_objective_gap_tolerance_met(&self) -> bool {
        self.bounds_finite() && self.relative_gap() <= self.relative_gap_tolerance
    }

    fn bounds_finite(&self) -> bool {
        self.primal_bound.is_finite() && self.dual_bound.is_finite()
    }

    fn crosses_dual(&self, primal: f64) -> bool {
        if !self.dual_bound.is_finite() {
            return false;
        }
        if self.is_minimization {
            primal < self.dual_bound - self.absolute_gap_tolerance
        } else {
            primal > self.dual_bound + self.absolute_gap_tolerance
        }
    }

    fn crosses_primal(&self, dual: f64) -> bool {
        if self.is_minimization {
            dual > self.primal_bound
        } else {
            dual < self.primal_bound
        }
    }
}
