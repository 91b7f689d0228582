//! Per-iteration statistics.

use crate::solution::{ConstraintDeviation, ProblemSolutionStatus, SolutionPoint};

/// One iteration of the outer approximation loop.
///
/// In single-tree mode a new iteration opens whenever the MILP solver
/// reports an integer-feasible solution after the previous one closed.
#[derive(Debug, Clone)]
pub struct Iteration {
    /// 1-based iteration number.
    pub iteration_number: usize,

    /// Closed iterations are never modified again.
    is_solved: bool,

    /// Whether the iteration came from an integer-feasible (MILP) solve.
    pub is_milp: bool,

    /// Status recorded for the iteration.
    pub solution_status: ProblemSolutionStatus,

    /// Objective value of the candidate that drove the iteration.
    pub objective_value: f64,

    /// Nodes explored since the previous iteration.
    pub explored_nodes: u64,

    /// Open nodes when the iteration was recorded.
    pub open_nodes: u64,

    /// Hyperplanes added in this iteration.
    pub hyperplanes_added: usize,

    /// Hyperplanes added in all iterations up to and including this one.
    pub total_hyperplanes: usize,

    /// Lazy hyperplanes generated at relaxation nodes in this iteration.
    pub relaxed_lazy_hyperplanes_added: usize,

    /// (dual, primal) bounds when the iteration was recorded.
    pub objective_bounds: (f64, f64),

    /// Candidate points of the iteration.
    pub solution_points: Vec<SolutionPoint>,

    /// Largest constraint deviation among the candidate points.
    pub max_deviation: Option<ConstraintDeviation>,

    /// Set when bounds were tightened to recover from an unbounded or
    /// infeasible dual problem.
    pub infeasibility_repair_performed: bool,
}

impl Iteration {
    fn new(iteration_number: usize, is_milp: bool, total_hyperplanes: usize) -> Self {
        Self {
            iteration_number,
            is_solved: false,
            is_milp,
            solution_status: ProblemSolutionStatus::NotSolved,
            objective_value: f64::NAN,
            explored_nodes: 0,
            open_nodes: 0,
            hyperplanes_added: 0,
            total_hyperplanes,
            relaxed_lazy_hyperplanes_added: 0,
            objective_bounds: (f64::NAN, f64::NAN),
            solution_points: Vec::new(),
            max_deviation: None,
            infeasibility_repair_performed: false,
        }
    }

    /// Whether the iteration has been closed.
    pub fn is_solved(&self) -> bool {
        self.is_solved
    }

    /// Count hyperplanes added to the dual problem.
    pub fn add_hyperplanes(&mut self, count: usize) {
        self.hyperplanes_added += count;
        self.total_hyperplanes += count;
    }
}

/// Append-only list of iterations with a single live (current) one.
#[derive(Debug, Clone, Default)]
pub struct IterationLedger {
    iterations: Vec<Iteration>,
    solved: usize,
}

impl IterationLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new iteration, carrying the hyperplane total forward.
    pub fn create_iteration(&mut self, is_milp: bool) -> &mut Iteration {
        let number = self.iterations.len() + 1;
        let total = self.iterations.last().map_or(0, |it| it.total_hyperplanes);
        self.iterations.push(Iteration::new(number, is_milp, total));

        log::trace!("Created iteration {}", number);
        let last = self.iterations.len() - 1;
        &mut self.iterations[last]
    }

    /// The live iteration.
    pub fn current(&self) -> Option<&Iteration> {
        self.iterations.last()
    }

    /// The live iteration, mutably. Earlier iterations are not reachable.
    pub fn current_mut(&mut self) -> Option<&mut Iteration> {
        self.iterations.last_mut()
    }

    /// Close the live iteration. Returns false if there is none or it was
    /// already closed.
    pub fn close_current(&mut self) -> bool {
        match self.iterations.last_mut() {
            Some(it) if !it.is_solved => {
                it.is_solved = true;
                self.solved += 1;
                true
            }
            _ => false,
        }
    }

    /// Number of closed iterations.
    pub fn solved_count(&self) -> usize {
        self.solved
    }

    /// The iteration before the live one.
    pub fn previous(&self) -> Option<&Iteration> {
        let n = self.iterations.len();
        if n >= 2 {
            self.iterations.get(n - 2)
        } else {
            None
        }
    }

    /// All iterations in order.
    pub fn iterations(&self) -> &[Iteration] {
        &self.iterations
    }

    /// Number of iterations.
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    /// No iterations yet.
    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    /// Hyperplanes added over all iterations.
    pub fn total_hyperplanes(&self) -> usize {
        self.iterations.last().map_or(0, |it| it.total_hyperplanes)
    }
}
