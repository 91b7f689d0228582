//! Session context shared by the components of one solve.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::EshResult;
use crate::model::Problem;
use crate::results::Results;
use crate::settings::Settings;

/// Counters maintained by the callback loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolutionStatistics {
    /// Nodes explored by the MILP solver so far.
    pub explored_nodes: u64,

    /// Open nodes at the last progress event.
    pub open_nodes: u64,

    /// Integer (no-good) cuts added.
    pub integer_cuts: usize,

    /// Iteration in which lazy hyperplanes were last added.
    pub iteration_last_lazy_added: usize,

    /// Callback invocations that were not passive.
    pub lazy_callback_calls: usize,

    /// Candidates handed to the fixed-integer NLP hook.
    pub fixed_nlp_calls: usize,
}

/// Everything that lives for one solve session.
///
/// Components receive the environment by reference instead of reaching
/// for global state; [`Environment::reset`] starts a new session.
#[derive(Debug)]
pub struct Environment {
    /// The working problem.
    pub problem: Arc<Problem>,

    /// Settings for the session.
    pub settings: Settings,

    /// Bounds and iterations.
    pub results: Results,

    /// Counters.
    pub statistics: SolutionStatistics,

    started: Instant,
}

impl Environment {
    /// Create a session, validating the settings.
    pub fn new(problem: Arc<Problem>, settings: Settings) -> EshResult<Self> {
        settings.validate()?;
        let results = Results::new(problem.is_minimization(), &settings.termination);

        Ok(Self {
            problem,
            settings,
            results,
            statistics: SolutionStatistics::default(),
            started: Instant::now(),
        })
    }

    /// Discard results and counters and restart the clock.
    pub fn reset(&mut self) {
        self.results = Results::new(self.problem.is_minimization(), &self.settings.termination);
        self.statistics = SolutionStatistics::default();
        self.started = Instant::now();
    }

    /// Time since the session started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Wall clock limit reached.
    pub fn is_time_limit_reached(&self) -> bool {
        match self.settings.termination.time_limit {
            Some(limit) => self.elapsed() >= limit,
            None => false,
        }
    }

    /// Iteration limit reached, counting closed iterations.
    pub fn is_iteration_limit_reached(&self) -> bool {
        self.results.iterations.solved_count() >= self.settings.termination.iteration_limit
    }

    /// Any termination criterion met: gap, iteration or time limit.
    pub fn is_termination_reached(&self) -> bool {
        self.results.is_gap_tolerance_met()
            || self.is_iteration_limit_reached()
            || self.is_time_limit_reached()
    }
}
