//! Objective epigraph linearization.

use esh_core::{Environment, SolutionPoint};

use crate::hyperplane::{Hyperplane, HyperplaneSource, HyperplaneTarget, HyperplaneWaitingList};

/// Cuts for the epigraph constraint of an objective above quadratic.
///
/// Such objectives are carried by an auxiliary variable mu with the
/// constraint f(x) - mu <= 0 (minimization). Each candidate that violates
/// it is moved along the mu axis onto the epigraph boundary, mu = f(x),
/// and linearized there.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectiveSelector;

impl ObjectiveSelector {
    /// Whether the objective needs this pass at all.
    pub fn applies(env: &Environment) -> bool {
        env.problem.objective().classification.is_above_quadratic()
    }

    /// Enqueue objective hyperplanes and return how many were enqueued.
    pub fn run(
        &self,
        env: &Environment,
        points: &[SolutionPoint],
        waiting: &mut HyperplaneWaitingList,
    ) -> usize {
        if !Self::applies(env) {
            return 0;
        }

        let Some(aux) = env.problem.auxiliary_objective_variable() else {
            log::warn!("Nonlinear objective without an auxiliary objective variable");
            return 0;
        };

        let max = env.settings.dual.max_hyperplanes_per_iteration;
        let tol = env.settings.termination.constraint_tolerance;
        let mut added = 0;

        for point in points {
            if added >= max {
                break;
            }

            let Some(residual) = env.problem.objective_epigraph_value(&point.point) else {
                continue;
            };
            if !(residual > tol) {
                continue;
            }

            let mut projected = point.point.clone();
            projected[aux] = env.problem.objective_value(&point.point);

            waiting.push(Hyperplane {
                source_constraint: HyperplaneTarget::Objective,
                generated_point: projected,
                source: HyperplaneSource::ObjectiveLinesearch,
            });
            added += 1;
        }

        added
    }
}
