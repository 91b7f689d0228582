//! Primal heuristics driven from the callback.

use std::collections::HashSet;
use std::fmt;

use esh_core::{
    Environment, FalsePositionLinesearch, FixedNlpStrategy, LinesearchMethod, Problem,
    SolutionPoint, VariableType,
};

/// Integrality tolerance for primal candidates.
const INTEGER_TOLERANCE: f64 = 1e-6;

/// Line search between the interior point and an integer candidate.
///
/// The discrete coordinates of the interior anchor are replaced by the
/// candidate's, so every point of the segment keeps the candidate's
/// integer assignment. The feasible end of the final bracket is returned
/// as a primal candidate.
#[derive(Debug, Clone, Default)]
pub struct PrimalLinesearch<L = FalsePositionLinesearch> {
    linesearch: L,
}

impl PrimalLinesearch {
    /// Primal line search with the default root finder.
    pub fn new() -> Self {
        Self {
            linesearch: FalsePositionLinesearch,
        }
    }
}

impl<L: LinesearchMethod> PrimalLinesearch<L> {
    /// Search from `interior` towards the infeasible `candidate`.
    pub fn run(
        &self,
        env: &Environment,
        interior: &SolutionPoint,
        candidate: &SolutionPoint,
    ) -> Option<SolutionPoint> {
        let problem = &env.problem;
        if !(candidate.max_deviation_value() > 0.0) {
            return None;
        }
        // Nothing to move along when every variable is fixed by the candidate
        if problem.variables().iter().all(|v| v.is_discrete()) {
            return None;
        }

        let mut anchor = interior.point.clone();
        for v in problem.variables().iter().filter(|v| v.is_discrete()) {
            if let (Some(a), Some(&c)) = (anchor.get_mut(v.index), candidate.point.get(v.index)) {
                *a = c;
            }
        }

        let constraints = problem.nonlinear_constraint_indices();
        let esh = &env.settings.esh;
        // Only the bracket width stops the search: the feasible end has to
        // reach the boundary, not just the infeasible one
        let result = match self.linesearch.find_zero(
            problem,
            &anchor,
            &candidate.point,
            esh.linesearch_max_iterations,
            esh.linesearch_lambda_tolerance,
            0.0,
            &constraints,
            false,
        ) {
            Ok(r) => r,
            Err(e) => {
                log::debug!("Primal line search failed: {}", e);
                return None;
            }
        };

        let point = result.interior;
        if !problem.is_integer_feasible(&point, INTEGER_TOLERANCE) {
            return None;
        }

        let max_deviation = problem.max_deviation(&point);
        let tol = env.settings.termination.constraint_tolerance;
        if max_deviation.map_or(false, |d| d.value > tol) {
            return None;
        }

        Some(SolutionPoint {
            objective_value: problem.objective_value(&point),
            max_deviation,
            point,
            iteration_found: candidate.iteration_found,
        })
    }
}

/// Fixed-integer NLP local search.
///
/// The NLP engine is external; implementations solve the continuous
/// problem with the discrete variables fixed at the candidate's values.
pub trait FixedNlpSolver {
    /// A feasible point with the candidate's integer assignment, if found.
    fn solve_fixed(&mut self, problem: &Problem, candidate: &SolutionPoint) -> Option<Vec<f64>>;
}

/// What happened to one fixed-NLP candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixedNlpOutcome {
    /// Feasible point returned by the solver.
    pub solution: Option<SolutionPoint>,

    /// No-good cut excluding the candidate's binary assignment, when the
    /// fixed problem had no solution.
    pub integer_cut: Option<Vec<usize>>,
}

/// Decides which integer candidates go to the fixed-NLP hook and runs it.
#[derive(Default)]
pub struct FixedNlpQueue {
    solver: Option<Box<dyn FixedNlpSolver>>,
    tried: HashSet<Vec<i64>>,
    last_iteration: Option<usize>,
}

impl fmt::Debug for FixedNlpQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedNlpQueue")
            .field("has_solver", &self.solver.is_some())
            .field("tried", &self.tried.len())
            .field("last_iteration", &self.last_iteration)
            .finish()
    }
}

impl FixedNlpQueue {
    /// Queue without a solver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the NLP hook.
    pub fn set_solver(&mut self, solver: Box<dyn FixedNlpSolver>) {
        self.solver = Some(solver);
    }

    /// Whether a hook is installed.
    pub fn has_solver(&self) -> bool {
        self.solver.is_some()
    }

    /// Whether `candidate` should be handed to the hook under `strategy`.
    pub fn should_run(
        &mut self,
        strategy: FixedNlpStrategy,
        problem: &Problem,
        candidate: &SolutionPoint,
    ) -> bool {
        if self.solver.is_none() {
            return false;
        }

        let iteration = candidate.iteration_found;
        let run = match strategy {
            FixedNlpStrategy::Never => false,
            FixedNlpStrategy::Always => true,
            FixedNlpStrategy::NewIntegerCombination => {
                self.tried.insert(problem.integer_combination(&candidate.point))
            }
            FixedNlpStrategy::Frequency(n) => self
                .last_iteration
                .map_or(true, |last| iteration >= last + n),
        };

        if run {
            self.last_iteration = Some(iteration);
        }
        run
    }

    /// Run the hook on `candidate`.
    pub fn solve(&mut self, env: &Environment, candidate: &SolutionPoint) -> FixedNlpOutcome {
        let Some(solver) = self.solver.as_mut() else {
            return FixedNlpOutcome::default();
        };
        let problem = &env.problem;

        if let Some(point) = solver.solve_fixed(problem, candidate) {
            if problem.check_dimension(&point).is_ok() {
                return FixedNlpOutcome {
                    solution: Some(SolutionPoint {
                        objective_value: problem.objective_value(&point),
                        max_deviation: problem.max_deviation(&point),
                        point,
                        iteration_found: candidate.iteration_found,
                    }),
                    integer_cut: None,
                };
            }
            log::warn!("Fixed NLP returned a point of the wrong dimension");
            return FixedNlpOutcome::default();
        }

        // A no-good cut is only valid when every discrete variable is binary
        let discrete: Vec<_> = problem.variables().iter().filter(|v| v.is_discrete()).collect();
        if discrete.is_empty() || discrete.iter().any(|v| v.kind != VariableType::Binary) {
            return FixedNlpOutcome::default();
        }

        let ones: Vec<usize> = discrete
            .iter()
            .filter(|v| candidate.point.get(v.index).map_or(false, |x| *x > 0.5))
            .map(|v| v.index)
            .collect();

        FixedNlpOutcome {
            solution: None,
            integer_cut: if ones.is_empty() { None } else { Some(ones) },
        }
    }
}
