//! Hyperplane point selection.
//!
//! Selectors decide which constraints to linearize at which points and
//! enqueue the requests on the waiting list. They never talk to the
//! backend; the callback flushes the list afterwards.

mod ecp;
mod esh;
mod objective;

pub use ecp::EcpSelector;
pub use esh::EshSelector;
pub use objective::ObjectiveSelector;

use esh_core::{CutStrategy, Environment, SolutionPoint};

use crate::hyperplane::{Hyperplane, HyperplaneSource, HyperplaneTarget, HyperplaneWaitingList};

/// A strategy that turns candidate points into hyperplane requests.
pub trait PointSelector {
    /// Enqueue hyperplanes for `points` and return how many were enqueued.
    ///
    /// Never enqueues more than `max_hyperplanes_per_iteration` per call.
    fn run(
        &self,
        env: &Environment,
        interior: Option<&SolutionPoint>,
        points: &[SolutionPoint],
        is_milp: bool,
        waiting: &mut HyperplaneWaitingList,
    ) -> usize;
}

/// The selector configured by the cut strategy.
#[derive(Debug, Clone)]
pub enum HyperplaneSelector {
    /// Cutting planes at the candidate points.
    Ecp(EcpSelector),
    /// Supporting hyperplanes at the boundary.
    Esh(EshSelector),
}

impl Default for HyperplaneSelector {
    fn default() -> Self {
        HyperplaneSelector::Esh(EshSelector::new())
    }
}

impl HyperplaneSelector {
    /// Selector for a cut strategy.
    pub fn from_strategy(strategy: CutStrategy) -> Self {
        match strategy {
            CutStrategy::Ecp => HyperplaneSelector::Ecp(EcpSelector),
            CutStrategy::Esh => HyperplaneSelector::Esh(EshSelector::new()),
        }
    }

    /// Whether this selector uses the interior point.
    pub fn needs_interior_point(&self) -> bool {
        matches!(self, HyperplaneSelector::Esh(_))
    }
}

impl PointSelector for HyperplaneSelector {
    fn run(
        &self,
        env: &Environment,
        interior: Option<&SolutionPoint>,
        points: &[SolutionPoint],
        is_milp: bool,
        waiting: &mut HyperplaneWaitingList,
    ) -> usize {
        match self {
            HyperplaneSelector::Ecp(s) => s.run(env, interior, points, is_milp, waiting),
            HyperplaneSelector::Esh(s) => s.run(env, interior, points, is_milp, waiting),
        }
    }
}

/// Enqueue the most deviating constraints at `point`.
///
/// `added` counts hyperplanes enqueued so far in this invocation. Returns
/// false once the cap has been reached.
pub(crate) fn enqueue_most_deviating(
    env: &Environment,
    point: &[f64],
    source: HyperplaneSource,
    waiting: &mut HyperplaneWaitingList,
    added: &mut usize,
) -> bool {
    let max = env.settings.dual.max_hyperplanes_per_iteration;
    let factor = env.settings.ecp.constraint_selection_factor;

    for deviation in env.problem.most_deviating_constraints(point, factor) {
        if *added >= max {
            return false;
        }

        if deviation.value < 0.0 {
            log::warn!(
                "Point is in the interior of constraint {} ({:.3e}), no hyperplane",
                deviation.constraint,
                deviation.value
            );
            continue;
        }

        waiting.push(Hyperplane {
            source_constraint: HyperplaneTarget::Constraint(deviation.constraint),
            generated_point: point.to_vec(),
            source,
        });
        *added += 1;
    }

    *added < max
}
