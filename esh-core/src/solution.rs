//! Solution points and bound candidates.

/// A (constraint, normalized violation) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintDeviation {
    /// Nonlinear constraint index.
    pub constraint: usize,

    /// Normalized value; positive means violated.
    pub value: f64,
}

impl ConstraintDeviation {
    /// Create a deviation record.
    pub fn new(constraint: usize, value: f64) -> Self {
        Self { constraint, value }
    }
}

/// A candidate point produced by the MILP solver or a line search.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionPoint {
    /// Coordinates, one per variable.
    pub point: Vec<f64>,

    /// Objective value at the point.
    pub objective_value: f64,

    /// Largest normalized nonlinear constraint violation, if the problem
    /// has nonlinear constraints.
    pub max_deviation: Option<ConstraintDeviation>,

    /// Iteration in which the point was found.
    pub iteration_found: usize,
}

impl SolutionPoint {
    /// Whether the point satisfies every nonlinear constraint within `tol`.
    pub fn is_feasible(&self, tol: f64) -> bool {
        self.max_deviation.map_or(true, |d| d.value <= tol)
    }

    /// Max deviation value, or -inf when there are no nonlinear constraints.
    pub fn max_deviation_value(&self) -> f64 {
        self.max_deviation.map_or(f64::NEG_INFINITY, |d| d.value)
    }
}

/// Origin of a primal candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimalSolutionSource {
    /// Incumbent reported inside the lazy-constraint callback.
    LazyConstraintCallback,
    /// Feasible end of a primal line search.
    Linesearch,
    /// Fixed-integer NLP local search.
    FixedNlp,
    /// Interior point search.
    InteriorPointSearch,
    /// Supplied by the caller.
    External,
}

/// Origin of a dual candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualSolutionSource {
    /// Objective bound reported by the MILP solver.
    MipSolverBound,
    /// Objective of an LP relaxation.
    LpSolution,
    /// Supplied by the caller.
    External,
}

/// A dual bound candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct DualSolution {
    /// Point associated with the bound (may be empty).
    pub point: Vec<f64>,

    /// Where the bound came from.
    pub source: DualSolutionSource,

    /// Bound value.
    pub objective_value: f64,

    /// Iteration in which the bound was found.
    pub iteration_found: usize,
}

impl DualSolution {
    /// A bound value without an associated point.
    pub fn bound(objective_value: f64, source: DualSolutionSource, iteration_found: usize) -> Self {
        Self {
            point: Vec::new(),
            source,
            objective_value,
            iteration_found,
        }
    }
}

/// An accepted primal solution.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimalSolution {
    /// The solution point.
    pub point: SolutionPoint,

    /// Where it came from.
    pub source: PrimalSolutionSource,
}

/// Status of a (MILP) solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProblemSolutionStatus {
    /// Optimal within tolerance.
    Optimal,
    /// A feasible solution was found.
    Feasible,
    /// Proven infeasible.
    Infeasible,
    /// Unbounded.
    Unbounded,
    /// Solution limit reached.
    SolutionLimit,
    /// Time limit reached.
    TimeLimit,
    /// Node limit reached.
    NodeLimit,
    /// Iteration limit reached.
    IterationLimit,
    /// Search aborted by the callback.
    Abort,
    /// The solver failed.
    Error,
    /// Not solved yet.
    #[default]
    NotSolved,
}

impl ProblemSolutionStatus {
    /// Statuses after which the backend may hold a solution.
    pub fn may_have_solution(&self) -> bool {
        matches!(
            self,
            ProblemSolutionStatus::Optimal
                | ProblemSolutionStatus::Feasible
                | ProblemSolutionStatus::SolutionLimit
                | ProblemSolutionStatus::TimeLimit
                | ProblemSolutionStatus::NodeLimit
                | ProblemSolutionStatus::IterationLimit
                | ProblemSolutionStatus::Abort
        )
    }
}
