//! Dual (MILP master) solver.

use esh_core::{
    DualSolution, DualSolutionSource, Environment, ObjectiveClassification,
    ProblemSolutionStatus,
};
use sprs::CsVec;

use crate::backend::MipSolverBackend;
use crate::builder::HyperplaneBuilder;
use crate::callback::LazyConstraintCallback;
use crate::error::{BackendError, MipError, MipResult};
use crate::hyperplane::{HyperplaneLedger, HyperplaneTarget, HyperplaneWaitingList};
use crate::interior::InteriorPointTracker;
use crate::primal::FixedNlpQueue;
use crate::select::HyperplaneSelector;

/// Cut-generation state that outlives a single callback invocation.
#[derive(Debug, Default)]
pub struct CutStore {
    /// Every hyperplane added to the backend.
    pub ledger: HyperplaneLedger,

    /// Hyperplanes selected but not yet added.
    pub waiting: HyperplaneWaitingList,

    /// Integer cuts waiting to be added, each the set of binaries at one.
    pub integer_cuts: Vec<Vec<usize>>,

    /// ESH interior point.
    pub interior: InteriorPointTracker,

    /// Fixed-integer NLP hook.
    pub fixed_nlp: FixedNlpQueue,
}

impl CutStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// No-good cut `sum_{i in S} x_i <= |S| - 1`.
///
/// Returns None when `indexes` is empty or names a column outside `n`.
pub(crate) fn integer_cut_terms(n: usize, indexes: &[usize]) -> Option<(CsVec<f64>, f64)> {
    let mut indices = indexes.to_vec();
    indices.sort_unstable();
    indices.dedup();

    if indices.is_empty() || indices.last().map_or(false, |&i| i >= n) {
        return None;
    }

    let rhs = (indices.len() - 1) as f64;
    let data = vec![1.0; indices.len()];
    Some((CsVec::new(n, indices, data), rhs))
}

/// Owns the MILP backend and the hyperplanes added to it.
pub struct DualSolver<B> {
    backend: B,
    store: CutStore,
    selector: HyperplaneSelector,
}

impl<B: MipSolverBackend> DualSolver<B> {
    /// Dual solver using the selector for `strategy`.
    pub fn new(backend: B, strategy: esh_core::CutStrategy) -> Self {
        Self {
            backend,
            store: CutStore::new(),
            selector: HyperplaneSelector::from_strategy(strategy),
        }
    }

    /// The MILP backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The MILP backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Cut-generation state.
    pub fn store(&self) -> &CutStore {
        &self.store
    }

    /// Cut-generation state, mutably.
    pub fn store_mut(&mut self) -> &mut CutStore {
        &mut self.store
    }

    /// Active selector.
    pub fn selector(&self) -> &HyperplaneSelector {
        &self.selector
    }

    /// Consume the solver and return the backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Run one lazy-constraint solve, retrying once on unboundedness or on
    /// infeasibility caused by a free auxiliary objective variable.
    pub fn solve_problem(&mut self, env: &mut Environment) -> ProblemSolutionStatus {
        let mut status = self.run_lazy(env);

        let classification = env.problem.objective().classification;
        let aux = env.problem.auxiliary_objective_variable();

        if status == ProblemSolutionStatus::Infeasible
            && classification == ObjectiveClassification::QuadraticConsideredAsNonlinear
        {
            if let Some(aux) = aux {
                let bound = env.settings.dual.auxiliary_objective_bound;
                log::info!(
                    "Problem infeasible, bounding objective variable to [{:e}, {:e}] and resolving",
                    -bound,
                    bound
                );

                if self.set_bounds(aux, -bound, bound) {
                    status = self.run_lazy(env);

                    let restore = env.settings.dual.unbounded_variable_bound;
                    self.set_bounds(aux, -restore, restore);
                }
            }
        }

        if status == ProblemSolutionStatus::Unbounded {
            status = self.solve_bounded(env);
        }

        self.record_final_bound(env, status);
        status
    }

    fn run_lazy(&mut self, env: &mut Environment) -> ProblemSolutionStatus {
        let mut callback = LazyConstraintCallback::new(env, &mut self.store, &self.selector);

        match self.backend.solve_problem(&mut callback) {
            Ok(status) => status,
            Err(e) => {
                log::error!("Error when solving dual problem: {}", e);
                ProblemSolutionStatus::Error
            }
        }
    }

    /// Bound the culprit variables, resolve once and restore them.
    fn solve_bounded(&mut self, env: &mut Environment) -> ProblemSolutionStatus {
        let dual = &env.settings.dual;
        let bound = dual.unbounded_variable_bound / dual.unbounded_bound_scaling;

        let variables = if env.problem.objective().classification.is_above_quadratic() {
            env.problem.auxiliary_objective_variable().into_iter().collect()
        } else {
            env.problem.dual_unbounded_variables(dual.unbounded_variable_bound)
        };

        if variables.is_empty() {
            log::warn!("Dual problem unbounded and no variable to bound");
            return ProblemSolutionStatus::Unbounded;
        }

        let mut original = Vec::with_capacity(variables.len());
        for &var in &variables {
            match self.backend.variable_bounds(var) {
                Ok(bounds) => original.push((var, bounds)),
                Err(e) => log::error!("Cannot read bounds of variable {}: {}", var, e),
            }
        }

        log::info!(
            "Dual problem unbounded, bounding {} variable(s) to [{:e}, {:e}] and resolving",
            original.len(),
            -bound,
            bound
        );
        for &(var, _) in &original {
            self.set_bounds(var, -bound, bound);
        }

        let status = self.run_lazy(env);

        for &(var, (lower, upper)) in &original {
            self.set_bounds(var, lower, upper);
        }
        if let Some(it) = env.results.current_iteration_mut() {
            it.infeasibility_repair_performed = true;
        }

        status
    }

    fn set_bounds(&mut self, var: usize, lower: f64, upper: f64) -> bool {
        match self.backend.update_variable_bound(var, lower, upper) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Cannot update bounds of variable {}: {}", var, e);
                false
            }
        }
    }

    /// The engine's final bound holds for every status that ran the search
    /// to completion or to a limit.
    fn record_final_bound(&self, env: &mut Environment, status: ProblemSolutionStatus) {
        if !status.may_have_solution() {
            return;
        }

        match self.backend.dual_objective_bound() {
            Ok(bound) if bound.is_finite() => {
                let iteration = env
                    .results
                    .current_iteration()
                    .map_or(0, |it| it.iteration_number);
                env.results.bounds.add_dual_solution_candidate(DualSolution::bound(
                    bound,
                    DualSolutionSource::MipSolverBound,
                    iteration,
                ));
            }
            Ok(_) => {}
            Err(e) => log::error!("Cannot read final objective bound: {}", e),
        }
    }

    /// Relax rows generated from nonconvex constraints until the model is
    /// feasible again. Returns true if any row was relaxed.
    pub fn repair_infeasibility(&mut self, env: &mut Environment) -> bool {
        if self.store.ledger.is_empty() {
            return false;
        }

        let max = env.settings.dual.repair_max_constraints;
        let rows: Vec<usize> = self
            .store
            .ledger
            .entries()
            .iter()
            .filter(|h| !h.is_removed && !h.is_source_convex)
            .filter_map(|h| h.backend_row)
            .take(max)
            .collect();

        if rows.is_empty() {
            log::debug!("No nonconvex hyperplane rows to repair");
            return false;
        }

        // Later rows are cheaper to relax
        let penalties: Vec<f64> = rows.iter().map(|&row| 1.0 / (row as f64 + 1.0)).collect();

        let elastic = match self.backend.solve_elastic(&rows, &penalties) {
            Ok(e) => e,
            Err(e) => {
                log::error!("Elastic solve failed: {}", e);
                return false;
            }
        };

        if elastic.status != ProblemSolutionStatus::Optimal {
            log::debug!("Could not repair the infeasible dual problem");
            return false;
        }

        let factor = env.settings.dual.repair_slack_factor;
        let mut repaired = 0;

        for (&row, &slack) in rows.iter().zip(&elastic.slacks) {
            if slack <= 0.0 {
                continue;
            }
            let upper = match self.backend.row_upper(row) {
                Ok(u) => u,
                Err(e) => {
                    log::error!("Cannot read row {}: {}", row, e);
                    continue;
                }
            };
            let relaxed = upper + factor * slack;
            match self.backend.set_row_upper(row, relaxed) {
                Ok(()) => {
                    log::debug!("Relaxed row {} from {:.6} to {:.6}", row, upper, relaxed);
                    repaired += 1;
                }
                Err(e) => log::error!("Cannot relax row {}: {}", row, e),
            }
        }

        log::debug!("Repaired {} row(s) of the dual problem", repaired);
        if let Some(it) = env.results.current_iteration_mut() {
            it.infeasibility_repair_performed = true;
        }
        true
    }

    /// Add the waiting hyperplanes as ordinary model rows.
    pub fn add_hyperplanes_to_model(&mut self, env: &mut Environment) -> usize {
        let problem = std::sync::Arc::clone(&env.problem);
        let builder = HyperplaneBuilder::new(&problem);
        let iteration = env
            .results
            .current_iteration()
            .map_or(0, |it| it.iteration_number);
        let mut added = 0;

        for hyperplane in self.store.waiting.drain() {
            let Some(terms) = builder.create_hyperplane_terms(&hyperplane) else {
                continue;
            };

            let name = format!("h_{}", self.store.ledger.len());
            let row = match self.backend.add_linear_constraint(&terms.terms, terms.rhs(), &name) {
                Ok(row) => row,
                Err(e) => {
                    log::error!("Cannot add hyperplane {}: {}", name, e);
                    continue;
                }
            };

            let is_source_convex = match hyperplane.source_constraint {
                HyperplaneTarget::Constraint(i) => problem.constraint(i).map_or(true, |c| c.is_convex),
                HyperplaneTarget::Objective => true,
            };
            self.store
                .ledger
                .record(hyperplane, iteration, false, is_source_convex, Some(row));
            added += 1;
        }

        if added > 0 {
            if let Some(it) = env.results.current_iteration_mut() {
                it.add_hyperplanes(added);
            }
        }
        added
    }

    /// Queue an integer cut for the next integer solution.
    pub fn add_integer_cut(&mut self, indexes: Vec<usize>) {
        self.store.integer_cuts.push(indexes);
    }

    /// Add an integer cut as a model row and return the row index.
    pub fn create_integer_cut(&mut self, env: &mut Environment, indexes: &[usize]) -> MipResult<usize> {
        let n = env.problem.num_variables();
        let (terms, rhs) = integer_cut_terms(n, indexes).ok_or_else(|| {
            MipError::Backend(BackendError::CutRejected(format!(
                "invalid integer cut over {:?}",
                indexes
            )))
        })?;

        let name = format!("ic_{}", env.statistics.integer_cuts);
        let row = self.backend.add_linear_constraint(&terms, rhs, &name)?;
        env.statistics.integer_cuts += 1;
        Ok(row)
    }
}
