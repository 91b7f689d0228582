//! Enumeration MILP backend for integration tests.
//!
//! The "search" walks an explicit list of integer points in objective
//! order, reporting each one to the lazy-constraint handler the way a
//! branch-and-bound engine reports new incumbents. Lazy constraints cut
//! later candidates; the last accepted point is the optimum.

#![allow(dead_code)]

use esh_core::{
    ClosureFunction, NonlinearFunction, ObjectiveFunction, Problem, ProblemSolutionStatus,
    SparseGradient, VariableType,
};
use esh_mip::{
    BackendError, BackendResult, CallbackContext, CallbackReason, ElasticSolution,
    LazyConstraintHandler, MipSolverBackend,
};
use sprs::CsVec;

/// A linear row `terms^T x <= rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub terms: Vec<(usize, f64)>,
    pub rhs: f64,
}

impl Row {
    fn from_sparse(terms: &CsVec<f64>, rhs: f64) -> Self {
        Self {
            terms: terms.iter().map(|(i, &c)| (i, c)).collect(),
            rhs,
        }
    }

    fn activity(&self, x: &[f64]) -> f64 {
        self.terms.iter().map(|&(i, c)| c * x[i]).sum()
    }

    fn is_satisfied(&self, x: &[f64]) -> bool {
        self.activity(x) <= self.rhs + 1e-9
    }
}

/// Backend over an explicit candidate list.
#[derive(Debug, Clone)]
pub struct EnumerationBackend {
    objective: Vec<f64>,
    is_minimization: bool,
    candidates: Vec<Vec<f64>>,
    bounds: Vec<(f64, f64)>,
    rows: Vec<Row>,

    /// Rows added as lazy constraints during the last solve.
    pub lazy: Vec<Row>,
    /// Points reported as node relaxations before the first incumbent.
    pub relaxation_points: Vec<Vec<f64>>,
    /// Reject every lazy constraint.
    pub fail_lazy: bool,
    /// Fail the whole solve.
    pub fail_solve: bool,
    /// Report Unbounded while this column has an infinite-looking bound.
    pub unbounded_column: Option<usize>,
    /// Report Infeasible while this column has an infinite-looking bound.
    pub infeasible_column: Option<usize>,
    /// Every bound update as (column, lower, upper).
    pub bound_updates: Vec<(usize, f64, f64)>,
    /// Penalties passed to the last elastic solve.
    pub elastic_penalties: Vec<f64>,
    /// Number of search runs.
    pub solves: usize,
    /// Cutoff values set by the handler.
    pub cutoffs: Vec<f64>,

    status: ProblemSolutionStatus,
    incumbent: Option<(Vec<f64>, f64)>,
    bound: f64,
}

impl EnumerationBackend {
    pub fn new(objective: Vec<f64>, is_minimization: bool, candidates: Vec<Vec<f64>>) -> Self {
        let n = objective.len();
        Self {
            objective,
            is_minimization,
            candidates,
            bounds: vec![(f64::NEG_INFINITY, f64::INFINITY); n],
            rows: Vec::new(),
            lazy: Vec::new(),
            relaxation_points: Vec::new(),
            fail_lazy: false,
            fail_solve: false,
            unbounded_column: None,
            infeasible_column: None,
            bound_updates: Vec::new(),
            elastic_penalties: Vec::new(),
            solves: 0,
            cutoffs: Vec::new(),
            status: ProblemSolutionStatus::NotSolved,
            incumbent: None,
            bound: f64::NAN,
        }
    }

    /// Integer grid `lo..=hi` in every coordinate.
    pub fn grid(objective: Vec<f64>, is_minimization: bool, lo: i32, hi: i32) -> Self {
        let n = objective.len();
        let mut candidates = vec![Vec::new()];
        for _ in 0..n {
            candidates = candidates
                .into_iter()
                .flat_map(|prefix: Vec<f64>| {
                    (lo..=hi).map(move |v| {
                        let mut p = prefix.clone();
                        p.push(v as f64);
                        p
                    })
                })
                .collect();
        }
        Self::new(objective, is_minimization, candidates)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    fn value(&self, x: &[f64]) -> f64 {
        self.objective.iter().zip(x).map(|(c, v)| c * v).sum()
    }

    fn better(&self, a: f64, b: f64) -> bool {
        if self.is_minimization {
            a < b
        } else {
            a > b
        }
    }

    fn within_bounds(&self, x: &[f64]) -> bool {
        x.iter()
            .zip(&self.bounds)
            .all(|(v, &(lo, up))| *v >= lo - 1e-9 && *v <= up + 1e-9)
    }

    fn is_model_feasible(&self, x: &[f64]) -> bool {
        self.within_bounds(x) && self.rows.iter().all(|r| r.is_satisfied(x))
    }

    fn is_feasible(&self, x: &[f64], lazy: &[Row], cutoff: Option<f64>) -> bool {
        if !self.is_model_feasible(x) || !lazy.iter().all(|r| r.is_satisfied(x)) {
            return false;
        }
        match cutoff {
            Some(c) if self.is_minimization => self.value(x) <= c,
            Some(c) => self.value(x) >= c,
            None => true,
        }
    }

    /// Best candidate feasible for every row that beats the incumbent.
    fn next_candidate(&self, lazy: &[Row], cutoff: Option<f64>) -> Option<Vec<f64>> {
        let mut best: Option<(&Vec<f64>, f64)> = None;
        for x in &self.candidates {
            if !self.is_feasible(x, lazy, cutoff) {
                continue;
            }
            let v = self.value(x);
            if let Some((_, inc)) = &self.incumbent {
                if !self.better(v, *inc) {
                    continue;
                }
            }
            if best.map_or(true, |(_, b)| self.better(v, b)) {
                best = Some((x, v));
            }
        }
        best.map(|(x, _)| x.clone())
    }
}

struct Event<'a> {
    reason: CallbackReason,
    bound: f64,
    objective: f64,
    values: Vec<f64>,
    explored: u64,
    open: u64,
    lazy: &'a mut Vec<Row>,
    fail_lazy: bool,
    cutoff: &'a mut Option<f64>,
    injected: &'a mut Option<Vec<f64>>,
    aborted: bool,
}

impl CallbackContext for Event<'_> {
    fn reason(&self) -> CallbackReason {
        self.reason
    }

    fn objective_bound(&self) -> BackendResult<f64> {
        Ok(self.bound)
    }

    fn solution_objective(&self) -> BackendResult<f64> {
        match self.reason {
            CallbackReason::IntegerSolution => Ok(self.objective),
            _ => Err(BackendError::NotAvailable("solution objective".to_string())),
        }
    }

    fn solution_values(&self) -> BackendResult<Vec<f64>> {
        match self.reason {
            CallbackReason::IntegerSolution => Ok(self.values.clone()),
            _ => Err(BackendError::NotAvailable("solution values".to_string())),
        }
    }

    fn node_relaxation_values(&self) -> BackendResult<Vec<f64>> {
        match self.reason {
            CallbackReason::RelaxationNode => Ok(self.values.clone()),
            _ => Err(BackendError::NotAvailable("node relaxation".to_string())),
        }
    }

    fn node_relaxation_is_optimal(&self) -> BackendResult<bool> {
        Ok(self.reason == CallbackReason::RelaxationNode)
    }

    fn explored_nodes(&self) -> BackendResult<u64> {
        Ok(self.explored)
    }

    fn open_nodes(&self) -> BackendResult<u64> {
        Ok(self.open)
    }

    fn add_lazy_constraint(&mut self, terms: &CsVec<f64>, rhs: f64) -> BackendResult<()> {
        if self.fail_lazy {
            return Err(BackendError::CutRejected("lazy constraints disabled".to_string()));
        }
        self.lazy.push(Row::from_sparse(terms, rhs));
        Ok(())
    }

    fn set_solution(&mut self, values: &[f64]) -> BackendResult<()> {
        *self.injected = Some(values.to_vec());
        Ok(())
    }

    fn set_cutoff(&mut self, cutoff: f64) -> BackendResult<()> {
        *self.cutoff = Some(cutoff);
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

impl MipSolverBackend for EnumerationBackend {
    fn num_variables(&self) -> usize {
        self.objective.len()
    }

    fn num_constraints(&self) -> usize {
        self.rows.len()
    }

    fn add_linear_constraint(
        &mut self,
        terms: &CsVec<f64>,
        rhs: f64,
        _name: &str,
    ) -> BackendResult<usize> {
        self.rows.push(Row::from_sparse(terms, rhs));
        Ok(self.rows.len() - 1)
    }

    fn variable_bounds(&self, var: usize) -> BackendResult<(f64, f64)> {
        self.bounds.get(var).copied().ok_or(BackendError::InvalidIndex {
            index: var,
            len: self.bounds.len(),
        })
    }

    fn update_variable_bound(&mut self, var: usize, lower: f64, upper: f64) -> BackendResult<()> {
        let len = self.bounds.len();
        let b = self
            .bounds
            .get_mut(var)
            .ok_or(BackendError::InvalidIndex { index: var, len })?;
        *b = (lower, upper);
        self.bound_updates.push((var, lower, upper));
        Ok(())
    }

    fn row_upper(&self, row: usize) -> BackendResult<f64> {
        self.rows.get(row).map(|r| r.rhs).ok_or(BackendError::InvalidIndex {
            index: row,
            len: self.rows.len(),
        })
    }

    fn set_row_upper(&mut self, row: usize, rhs: f64) -> BackendResult<()> {
        let len = self.rows.len();
        let r = self
            .rows
            .get_mut(row)
            .ok_or(BackendError::InvalidIndex { index: row, len })?;
        r.rhs = rhs;
        Ok(())
    }

    fn solve_problem(
        &mut self,
        handler: &mut dyn LazyConstraintHandler,
    ) -> BackendResult<ProblemSolutionStatus> {
        self.solves += 1;
        self.incumbent = None;
        self.lazy.clear();
        self.bound = f64::NAN;

        if self.fail_solve {
            self.status = ProblemSolutionStatus::Error;
            return Err(BackendError::Solve("scripted failure".to_string()));
        }
        if let Some(col) = self.unbounded_column {
            let (lo, up) = self.bounds[col];
            if lo <= -1e30 || up >= 1e30 {
                self.status = ProblemSolutionStatus::Unbounded;
                return Ok(self.status);
            }
        }
        if let Some(col) = self.infeasible_column {
            let (lo, up) = self.bounds[col];
            if lo <= -1e30 || up >= 1e30 {
                self.status = ProblemSolutionStatus::Infeasible;
                return Ok(self.status);
            }
        }

        let mut lazy = Vec::new();
        let mut cutoff = None;
        let mut injected = None;
        let mut explored = 0;
        let unbounded = if self.is_minimization {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };

        for point in self.relaxation_points.clone() {
            let mut ev = Event {
                reason: CallbackReason::RelaxationNode,
                bound: unbounded,
                objective: f64::NAN,
                values: point,
                explored,
                open: 1,
                lazy: &mut lazy,
                fail_lazy: self.fail_lazy,
                cutoff: &mut cutoff,
                injected: &mut injected,
                aborted: false,
            };
            handler.handle(&mut ev);
        }

        let status = loop {
            let Some(x) = self.next_candidate(&lazy, cutoff) else {
                let exhausted = if self.incumbent.is_some() {
                    ProblemSolutionStatus::Optimal
                } else {
                    ProblemSolutionStatus::Infeasible
                };
                break exhausted;
            };
            let value = self.value(&x);
            // Every remaining point is at most as good as the best one
            self.bound = value;
            explored += 1;

            let mut ev = Event {
                reason: CallbackReason::Progress,
                bound: value,
                objective: f64::NAN,
                values: Vec::new(),
                explored,
                open: 1,
                lazy: &mut lazy,
                fail_lazy: self.fail_lazy,
                cutoff: &mut cutoff,
                injected: &mut injected,
                aborted: false,
            };
            handler.handle(&mut ev);
            if ev.aborted {
                break ProblemSolutionStatus::Abort;
            }

            let mut ev = Event {
                reason: CallbackReason::IntegerSolution,
                bound: value,
                objective: value,
                values: x.clone(),
                explored,
                open: 1,
                lazy: &mut lazy,
                fail_lazy: self.fail_lazy,
                cutoff: &mut cutoff,
                injected: &mut injected,
                aborted: false,
            };
            handler.handle(&mut ev);
            let aborted = ev.aborted;

            if lazy.iter().all(|r| r.is_satisfied(&x)) {
                self.incumbent = Some((x, value));
            }
            if let Some(values) = injected.take() {
                let v = self.value(&values);
                let improves = self
                    .incumbent
                    .as_ref()
                    .map_or(true, |(_, inc)| self.better(v, *inc));
                if improves && self.is_feasible(&values, &lazy, None) {
                    self.incumbent = Some((values, v));
                }
            }
            if let Some(c) = cutoff {
                if !self.cutoffs.last().map_or(false, |&last| last == c) {
                    self.cutoffs.push(c);
                }
            }
            if aborted {
                break ProblemSolutionStatus::Abort;
            }
        };

        if status == ProblemSolutionStatus::Optimal {
            if let Some((_, v)) = &self.incumbent {
                self.bound = *v;
            }
        }
        self.lazy = lazy;
        self.status = status;
        Ok(status)
    }

    fn solve_elastic(&mut self, rows: &[usize], penalties: &[f64]) -> BackendResult<ElasticSolution> {
        self.elastic_penalties = penalties.to_vec();
        let mut best: Option<(f64, Vec<f64>)> = None;

        for x in &self.candidates {
            if !self.within_bounds(x) {
                continue;
            }
            let hard_ok = self
                .rows
                .iter()
                .enumerate()
                .filter(|(i, _)| !rows.contains(i))
                .all(|(_, r)| r.is_satisfied(x));
            if !hard_ok {
                continue;
            }

            let slacks: Vec<f64> = rows
                .iter()
                .map(|&i| (self.rows[i].activity(x) - self.rows[i].rhs).max(0.0))
                .collect();
            let penalty: f64 = slacks.iter().zip(penalties).map(|(s, p)| s * p).sum();

            if best.as_ref().map_or(true, |(b, _)| penalty < *b) {
                best = Some((penalty, slacks));
            }
        }

        Ok(match best {
            Some((_, slacks)) => ElasticSolution {
                status: ProblemSolutionStatus::Optimal,
                slacks,
            },
            None => ElasticSolution {
                status: ProblemSolutionStatus::Infeasible,
                slacks: Vec::new(),
            },
        })
    }

    fn solution_status(&self) -> ProblemSolutionStatus {
        self.status
    }

    fn number_of_solutions(&self) -> usize {
        usize::from(self.incumbent.is_some())
    }

    fn variable_solution(&self, index: usize) -> BackendResult<Vec<f64>> {
        match (&self.incumbent, index) {
            (Some((x, _)), 0) => Ok(x.clone()),
            _ => Err(BackendError::InvalidIndex {
                index,
                len: self.number_of_solutions(),
            }),
        }
    }

    fn objective_value(&self) -> BackendResult<f64> {
        self.incumbent
            .as_ref()
            .map(|(_, v)| *v)
            .ok_or_else(|| BackendError::NotAvailable("no solution".to_string()))
    }

    fn dual_objective_bound(&self) -> BackendResult<f64> {
        if self.bound.is_nan() {
            return Err(BackendError::NotAvailable("no bound".to_string()));
        }
        Ok(self.bound)
    }
}

/// x^2 + y^2 (+ shift).
pub fn disc(shift: f64) -> impl NonlinearFunction {
    ClosureFunction::new(
        move |x: &[f64]| x[0] * x[0] + x[1] * x[1] + shift,
        |x: &[f64]| Ok(SparseGradient::from([(0, 2.0 * x[0]), (1, 2.0 * x[1])])),
    )
}

/// Optimize x + y over integers x, y in [0, 5] with x^2 + y^2 <= 10.
pub fn disc_problem(is_minimization: bool) -> Problem {
    let sign = if is_minimization { -1.0 } else { 1.0 };
    let mut p = Problem::new(ObjectiveFunction::linear(
        vec![(0, sign), (1, sign)],
        0.0,
        is_minimization,
    ));
    p.add_variable("x", 0.0, 5.0, VariableType::Integer);
    p.add_variable("y", 0.0, 5.0, VariableType::Integer);
    p.add_nonlinear_constraint("disc", disc(0.0), 10.0, true);
    p
}
