//! Results of a solve session: bounds and iterations.

mod bounds;
mod iteration;

pub use bounds::BoundLedger;
pub use iteration::{Iteration, IterationLedger};

use crate::settings::TerminationSettings;

/// Session-scoped results.
#[derive(Debug, Clone)]
pub struct Results {
    /// Primal/dual bounds.
    pub bounds: BoundLedger,

    /// Iteration history.
    pub iterations: IterationLedger,
}

impl Results {
    /// Fresh results for a problem with the given sense.
    pub fn new(is_minimization: bool, termination: &TerminationSettings) -> Self {
        Self {
            bounds: BoundLedger::new(is_minimization, termination),
            iterations: IterationLedger::new(),
        }
    }

    /// Best primal bound.
    pub fn primal_bound(&self) -> f64 {
        self.bounds.primal_bound()
    }

    /// Best dual bound.
    pub fn dual_bound(&self) -> f64 {
        self.bounds.dual_bound()
    }

    /// Either gap tolerance is met.
    pub fn is_gap_tolerance_met(&self) -> bool {
        self.bounds.is_absolute_objective_gap_tolerance_met()
            || self.bounds.is_relative_objective_gap_tolerance_met()
    }

    /// Live iteration.
    pub fn current_iteration(&self) -> Option<&Iteration> {
        self.iterations.current()
    }

    /// Live iteration, mutably.
    pub fn current_iteration_mut(&mut self) -> Option<&mut Iteration> {
        self.iterations.current_mut()
    }
}
