//! Extended cutting plane selection.

use esh_core::{Environment, SolutionPoint};

use super::{enqueue_most_deviating, PointSelector};
use crate::hyperplane::{HyperplaneSource, HyperplaneWaitingList};

/// Linearizes the most deviating constraints directly at each point.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcpSelector;

impl PointSelector for EcpSelector {
    fn run(
        &self,
        env: &Environment,
        _interior: Option<&SolutionPoint>,
        points: &[SolutionPoint],
        is_milp: bool,
        waiting: &mut HyperplaneWaitingList,
    ) -> usize {
        let mut added = 0;

        for (position, point) in points.iter().enumerate() {
            let source = HyperplaneSource::for_solution_point(position, is_milp, false);
            if !enqueue_most_deviating(env, &point.point, source, waiting, &mut added) {
                break;
            }
        }

        added
    }
}
