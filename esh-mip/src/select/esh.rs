//! Extended supporting hyperplane selection.

use esh_core::{Environment, FalsePositionLinesearch, LinesearchMethod, SolutionPoint};

use super::{enqueue_most_deviating, PointSelector};
use crate::hyperplane::{HyperplaneSource, HyperplaneWaitingList};

/// Projects each infeasible candidate onto the boundary of the nonlinear
/// feasible region before linearizing.
///
/// The projection is a line search between the interior point and the
/// candidate; the exterior end of the final bracket is linearized. Without
/// an interior point, for feasible candidates, or when the line search
/// fails, the candidate itself is linearized as ECP would.
#[derive(Debug, Clone, Default)]
pub struct EshSelector<L = FalsePositionLinesearch> {
    linesearch: L,
}

impl EshSelector {
    /// Selector with the default line search.
    pub fn new() -> Self {
        Self {
            linesearch: FalsePositionLinesearch,
        }
    }
}

impl<L: LinesearchMethod> EshSelector<L> {
    /// Selector using the given line search.
    pub fn with_linesearch(linesearch: L) -> Self {
        Self { linesearch }
    }
}

impl<L: LinesearchMethod> PointSelector for EshSelector<L> {
    fn run(
        &self,
        env: &Environment,
        interior: Option<&SolutionPoint>,
        points: &[SolutionPoint],
        is_milp: bool,
        waiting: &mut HyperplaneWaitingList,
    ) -> usize {
        let mut added = 0;

        let Some(interior) = interior else {
            log::debug!("No interior point, selecting hyperplanes with ECP");
            for (position, point) in points.iter().enumerate() {
                let source = HyperplaneSource::for_solution_point(position, is_milp, false);
                if !enqueue_most_deviating(env, &point.point, source, waiting, &mut added) {
                    break;
                }
            }
            return added;
        };

        let constraints = env.problem.nonlinear_constraint_indices();
        let esh = &env.settings.esh;

        for (position, point) in points.iter().enumerate() {
            let projected = if point.max_deviation_value() > 0.0 {
                match self.linesearch.find_zero(
                    &env.problem,
                    &interior.point,
                    &point.point,
                    esh.linesearch_max_iterations,
                    esh.linesearch_lambda_tolerance,
                    esh.linesearch_constraint_tolerance,
                    &constraints,
                    false,
                ) {
                    Ok(result) => Some(result.exterior),
                    Err(e) => {
                        log::warn!("Line search failed, using the candidate point: {}", e);
                        None
                    }
                }
            } else {
                None
            };

            let more = match projected {
                Some(boundary) => {
                    let source = HyperplaneSource::for_solution_point(position, is_milp, true);
                    enqueue_most_deviating(env, &boundary, source, waiting, &mut added)
                }
                None => {
                    let source = HyperplaneSource::for_solution_point(position, is_milp, false);
                    enqueue_most_deviating(env, &point.point, source, waiting, &mut added)
                }
            };
            if !more {
                break;
            }
        }

        added
    }
}
