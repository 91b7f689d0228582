//! Single-tree ESH/ECP driver.

use std::sync::Arc;

use esh_core::{
    Environment, PrimalSolution, Problem, ProblemSolutionStatus, Settings, SolutionPoint,
};

use crate::backend::MipSolverBackend;
use crate::dual::DualSolver;
use crate::error::{MipError, MipResult};
use crate::hyperplane::Hyperplane;
use crate::primal::FixedNlpSolver;

/// Outcome of [`EshSolver::solve`].
#[derive(Debug, Clone)]
pub struct SolveReport {
    /// Final status.
    pub status: ProblemSolutionStatus,
    /// Best primal bound.
    pub primal_bound: f64,
    /// Best dual bound.
    pub dual_bound: f64,
    /// Best feasible solution found.
    pub primal_solution: Option<PrimalSolution>,
    /// Number of iterations (integer solutions that needed cuts).
    pub iterations: usize,
    /// Hyperplanes added in total, initial rows included.
    pub hyperplanes: usize,
    /// Integer cuts added in total.
    pub integer_cuts: usize,
    /// |primal - dual|.
    pub absolute_gap: f64,
    /// Relative gap.
    pub relative_gap: f64,
}

/// Outer approximation in a single branch-and-bound tree.
///
/// The backend holds the linear part of the problem; nonlinear constraints
/// are enforced through lazy hyperplanes added from the engine's callback.
///
/// # Example
///
/// ```ignore
/// let mut solver = EshSolver::new(Arc::new(problem), Settings::default(), backend)?;
/// solver.set_interior_point(vec![0.0, 0.0])?;
/// let report = solver.solve()?;
/// println!("{:?} {}", report.status, report.primal_bound);
/// ```
pub struct EshSolver<B> {
    env: Environment,
    dual: DualSolver<B>,
    initial_hyperplanes: usize,
    initial_integer_cuts: usize,
}

impl<B: MipSolverBackend> EshSolver<B> {
    /// Create a solver; the backend must have one column per problem variable.
    pub fn new(problem: Arc<Problem>, settings: Settings, backend: B) -> MipResult<Self> {
        if backend.num_variables() != problem.num_variables() {
            return Err(MipError::Internal(format!(
                "backend has {} columns, problem has {} variables",
                backend.num_variables(),
                problem.num_variables()
            )));
        }

        let strategy = settings.dual.cut_strategy;
        let env = Environment::new(problem, settings)?;

        Ok(Self {
            env,
            dual: DualSolver::new(backend, strategy),
            initial_hyperplanes: 0,
            initial_integer_cuts: 0,
        })
    }

    /// The session.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// The dual solver.
    pub fn dual(&self) -> &DualSolver<B> {
        &self.dual
    }

    /// The dual solver, mutably.
    pub fn dual_mut(&mut self) -> &mut DualSolver<B> {
        &mut self.dual
    }

    /// Install the ESH interior point. It must satisfy every nonlinear
    /// constraint strictly.
    pub fn set_interior_point(&mut self, point: Vec<f64>) -> MipResult<()> {
        let problem = &self.env.problem;
        problem.check_dimension(&point)?;

        let max_deviation = problem.max_deviation(&point);
        if let Some(d) = max_deviation {
            if !(d.value < 0.0) {
                return Err(MipError::Internal(format!(
                    "interior point violates or touches constraint {} ({:.3e})",
                    d.constraint, d.value
                )));
            }
        }

        let point = SolutionPoint {
            objective_value: problem.objective_value(&point),
            max_deviation,
            point,
            iteration_found: 0,
        };
        self.dual.store_mut().interior.set(point);
        Ok(())
    }

    /// Install the fixed-integer NLP hook.
    pub fn set_fixed_nlp_solver(&mut self, solver: Box<dyn FixedNlpSolver>) {
        self.dual.store_mut().fixed_nlp.set_solver(solver);
    }

    /// Queue an integer cut over the binaries in `indexes`.
    pub fn add_integer_cut(&mut self, indexes: Vec<usize>) {
        self.dual.add_integer_cut(indexes);
    }

    /// Add an integer cut over the binaries in `indexes` as a model row
    /// right away. Returns the row index.
    pub fn create_integer_cut(&mut self, indexes: &[usize]) -> MipResult<usize> {
        let row = self.dual.create_integer_cut(&mut self.env, indexes)?;
        self.initial_integer_cuts += 1;
        Ok(row)
    }

    /// Add hyperplanes to the model before the search starts. Returns how
    /// many rows were added.
    ///
    /// The rows are recorded as generated in iteration 0 and counted in the
    /// first iteration of every later solve.
    pub fn add_initial_hyperplanes(&mut self, hyperplanes: Vec<Hyperplane>) -> usize {
        let waiting = &mut self.dual.store_mut().waiting;
        for hyperplane in hyperplanes {
            waiting.push(hyperplane);
        }
        let added = self.dual.add_hyperplanes_to_model(&mut self.env);
        self.initial_hyperplanes += added;
        added
    }

    /// Consume the solver and return the backend.
    pub fn into_backend(self) -> B {
        self.dual.into_backend()
    }

    /// Run the single-tree search.
    pub fn solve(&mut self) -> MipResult<SolveReport> {
        self.env.settings.validate()?;
        self.env.reset();
        self.env
            .results
            .iterations
            .create_iteration(true)
            .add_hyperplanes(self.initial_hyperplanes);
        self.env.statistics.integer_cuts = self.initial_integer_cuts;

        let mut status = self.dual.solve_problem(&mut self.env);

        if status == ProblemSolutionStatus::Infeasible {
            if self.dual.repair_infeasibility(&mut self.env) {
                log::info!("Dual problem repaired, resolving");
                let repaired = self.dual.solve_problem(&mut self.env);
                if repaired != ProblemSolutionStatus::Infeasible {
                    status = repaired;
                }
            } else {
                log::info!("Dual problem infeasible and could not be repaired");
            }
        }

        let status = self.final_status(status);
        let report = self.report(status);

        log::info!(
            "Terminated with {:?}: primal {:.6}, dual {:.6}, {} iteration(s), {} hyperplane(s)",
            report.status,
            report.primal_bound,
            report.dual_bound,
            report.iterations,
            report.hyperplanes
        );
        Ok(report)
    }

    fn final_status(&self, backend: ProblemSolutionStatus) -> ProblemSolutionStatus {
        use ProblemSolutionStatus::*;

        if backend == Error {
            return Error;
        }
        if self.env.results.is_gap_tolerance_met() {
            return Optimal;
        }

        let has_primal = self.env.results.bounds.primal_solution().is_some();
        if self.env.is_iteration_limit_reached() {
            return IterationLimit;
        }
        if self.env.is_time_limit_reached() {
            return TimeLimit;
        }

        match backend {
            Optimal | Abort | Feasible if has_primal => Feasible,
            Optimal | Abort | Feasible => {
                log::warn!("Search ended with {:?} but no feasible solution was found", backend);
                NotSolved
            }
            status => status,
        }
    }

    fn report(&self, status: ProblemSolutionStatus) -> SolveReport {
        let results = &self.env.results;

        SolveReport {
            status,
            primal_bound: results.primal_bound(),
            dual_bound: results.dual_bound(),
            primal_solution: results.bounds.primal_solution().cloned(),
            iterations: results.iterations.solved_count(),
            hyperplanes: results.iterations.total_hyperplanes(),
            integer_cuts: self.env.statistics.integer_cuts,
            absolute_gap: results.bounds.absolute_gap(),
            relative_gap: results.bounds.relative_gap(),
        }
    }
}
