//! MILP backend capability traits.

use esh_core::ProblemSolutionStatus;
use sprs::CsVec;

use crate::error::BackendResult;

/// Why the engine invoked the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackReason {
    /// Periodic polling.
    Polling,
    /// Presolve progress.
    Presolve,
    /// Simplex progress.
    Simplex,
    /// Log message.
    Message,
    /// Barrier progress.
    Barrier,
    /// Branch-and-bound progress (node counts, bound).
    Progress,
    /// A node LP relaxation has been solved.
    RelaxationNode,
    /// A new integer-feasible solution has been found.
    IntegerSolution,
}

impl CallbackReason {
    /// Events that carry nothing for the cut loop.
    pub fn is_passive(&self) -> bool {
        matches!(
            self,
            CallbackReason::Polling
                | CallbackReason::Presolve
                | CallbackReason::Simplex
                | CallbackReason::Message
                | CallbackReason::Barrier
        )
    }
}

/// Reads and writes available to a handler during one engine callback.
///
/// Reads that do not apply to the current reason return
/// [`BackendError::NotAvailable`](crate::BackendError::NotAvailable).
pub trait CallbackContext {
    /// Reason for this invocation.
    fn reason(&self) -> CallbackReason;

    /// Best objective bound of the search.
    fn objective_bound(&self) -> BackendResult<f64>;

    /// Objective of the reported integer solution.
    fn solution_objective(&self) -> BackendResult<f64>;

    /// Values of the reported integer solution.
    fn solution_values(&self) -> BackendResult<Vec<f64>>;

    /// Values of the node LP relaxation.
    fn node_relaxation_values(&self) -> BackendResult<Vec<f64>>;

    /// Whether the node LP was solved to optimality.
    fn node_relaxation_is_optimal(&self) -> BackendResult<bool>;

    /// Nodes explored so far.
    fn explored_nodes(&self) -> BackendResult<u64>;

    /// Nodes still open.
    fn open_nodes(&self) -> BackendResult<u64>;

    /// Add the lazy constraint `terms^T x <= rhs` to the active search.
    fn add_lazy_constraint(&mut self, terms: &CsVec<f64>, rhs: f64) -> BackendResult<()>;

    /// Offer a (heuristic) solution to the engine.
    fn set_solution(&mut self, values: &[f64]) -> BackendResult<()>;

    /// Prune nodes whose bound is worse than `cutoff`, in the objective sense.
    fn set_cutoff(&mut self, cutoff: f64) -> BackendResult<()>;

    /// Request a cooperative stop at the engine's next safe point.
    fn abort(&mut self);
}

/// Callback handler installed on the engine for one solve.
///
/// The engine invokes at most one handler call at a time; `&mut self`
/// makes that a requirement. An engine that calls back from several
/// threads concurrently must serialize the calls behind a `Mutex`.
pub trait LazyConstraintHandler {
    /// Handle one engine event.
    fn handle(&mut self, ctx: &mut dyn CallbackContext);
}

/// Result of an elastic (slack-penalized) solve.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticSolution {
    /// Status of the elastic problem.
    pub status: ProblemSolutionStatus,

    /// Slack of each requested row, in request order.
    pub slacks: Vec<f64>,
}

/// Capability interface of a MILP engine.
///
/// The cut loop depends only on this trait; each engine binding is one
/// implementation.
pub trait MipSolverBackend {
    /// Number of columns.
    fn num_variables(&self) -> usize;

    /// Number of model rows.
    fn num_constraints(&self) -> usize;

    /// Add the model row `terms^T x <= rhs` and return its row index.
    fn add_linear_constraint(
        &mut self,
        terms: &CsVec<f64>,
        rhs: f64,
        name: &str,
    ) -> BackendResult<usize>;

    /// Current (lower, upper) bounds of a column.
    fn variable_bounds(&self, var: usize) -> BackendResult<(f64, f64)>;

    /// Change the bounds of a column.
    fn update_variable_bound(&mut self, var: usize, lower: f64, upper: f64) -> BackendResult<()>;

    /// Right-hand side of a model row.
    fn row_upper(&self, row: usize) -> BackendResult<f64>;

    /// Change the right-hand side of a model row.
    fn set_row_upper(&mut self, row: usize, rhs: f64) -> BackendResult<()>;

    /// Run the search, invoking `handler` on engine events.
    fn solve_problem(
        &mut self,
        handler: &mut dyn LazyConstraintHandler,
    ) -> BackendResult<ProblemSolutionStatus>;

    /// Solve with a nonnegative slack on each of `rows`, penalized in the
    /// objective by the matching entry of `penalties`.
    fn solve_elastic(&mut self, rows: &[usize], penalties: &[f64]) -> BackendResult<ElasticSolution>;

    /// Status of the last solve.
    fn solution_status(&self) -> ProblemSolutionStatus;

    /// Number of solutions in the engine's pool.
    fn number_of_solutions(&self) -> usize;

    /// Values of pool solution `index` (0 is the best).
    fn variable_solution(&self, index: usize) -> BackendResult<Vec<f64>>;

    /// Objective of the best solution.
    fn objective_value(&self) -> BackendResult<f64>;

    /// Final objective bound of the last solve.
    fn dual_objective_bound(&self) -> BackendResult<f64>;
}
