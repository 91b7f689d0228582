//! Lazy-constraint callback.
//!
//! The MILP engine calls [`LazyConstraintCallback::handle`] on its own
//! events. Each non-passive event runs through
//!
//! ```text
//! Idle -> EvaluatingNode -> UpdatingBounds -> [GeneratingCuts] -> CheckingTermination -> Idle
//! ```
//!
//! Integer-feasible solutions that violate a nonlinear constraint are cut
//! off with linearizations added as lazy constraints; relaxation nodes may
//! contribute a bounded number of cuts per iteration. The callback never
//! propagates backend errors: a failed read or insertion is logged and
//! that sub-step is skipped.

use std::sync::Arc;

use esh_core::{
    DualSolution, DualSolutionSource, Environment, PrimalSolutionSource, ProblemSolutionStatus,
    SolutionPoint,
};

use crate::backend::{CallbackContext, CallbackReason, LazyConstraintHandler};
use crate::builder::HyperplaneBuilder;
use crate::dual::{integer_cut_terms, CutStore};
use crate::error::BackendError;
use crate::hyperplane::HyperplaneTarget;
use crate::primal::PrimalLinesearch;
use crate::select::{HyperplaneSelector, ObjectiveSelector, PointSelector};

/// Objective values at or above this are treated as "no solution".
const NO_SOLUTION_OBJECTIVE: f64 = 1e100;

/// Callback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackState {
    /// Waiting for the next event.
    Idle,
    /// Reading the event.
    EvaluatingNode,
    /// Updating primal and dual bounds.
    UpdatingBounds,
    /// Selecting points and adding cuts.
    GeneratingCuts,
    /// Checking gap and limits.
    CheckingTermination,
}

/// The handler installed on the engine for one lazy solve.
pub struct LazyConstraintCallback<'a> {
    env: &'a mut Environment,
    store: &'a mut CutStore,
    selector: &'a HyperplaneSelector,
    primal_linesearch: PrimalLinesearch,

    state: CallbackState,
    aborted: bool,
    last_explored_nodes: u64,
    last_open_nodes: u64,
    last_injected_primal: Option<f64>,
}

impl<'a> LazyConstraintCallback<'a> {
    /// Callback over a session and the dual solver's cut store.
    pub fn new(
        env: &'a mut Environment,
        store: &'a mut CutStore,
        selector: &'a HyperplaneSelector,
    ) -> Self {
        env.statistics.iteration_last_lazy_added = 0;
        let last_explored_nodes = env.statistics.explored_nodes;

        Self {
            env,
            store,
            selector,
            primal_linesearch: PrimalLinesearch::new(),
            state: CallbackState::Idle,
            aborted: false,
            last_explored_nodes,
            last_open_nodes: 0,
            last_injected_primal: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> CallbackState {
        self.state
    }

    /// Whether the callback asked the engine to stop.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    fn enter(&mut self, state: CallbackState) {
        log::trace!("Callback {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn current_iteration_number(&self) -> usize {
        self.env
            .results
            .current_iteration()
            .map_or(0, |it| it.iteration_number)
    }

    /// Number of the live iteration, opening one if the last is closed.
    fn open_iteration(&mut self) -> usize {
        let needs_new = self
            .env
            .results
            .current_iteration()
            .map_or(true, |it| it.is_solved());
        if needs_new {
            self.env.results.iterations.create_iteration(true);
        }
        self.current_iteration_number()
    }

    fn is_minimization(&self) -> bool {
        self.env.problem.is_minimization()
    }

    fn check_termination(&mut self, ctx: &mut dyn CallbackContext) -> bool {
        self.enter(CallbackState::CheckingTermination);

        let bounds = &self.env.results.bounds;
        let reason = if bounds.is_absolute_objective_gap_tolerance_met() {
            Some("absolute gap tolerance met")
        } else if bounds.is_relative_objective_gap_tolerance_met() {
            Some("relative gap tolerance met")
        } else if self.env.is_iteration_limit_reached() {
            Some("iteration limit reached")
        } else if self.env.is_time_limit_reached() {
            Some("time limit reached")
        } else {
            None
        };

        match reason {
            Some(reason) => {
                log::info!("Terminating search: {}", reason);
                ctx.abort();
                self.aborted = true;
                true
            }
            None => false,
        }
    }

    fn update_dual_bound(&mut self, ctx: &mut dyn CallbackContext) {
        self.enter(CallbackState::UpdatingBounds);

        match ctx.objective_bound() {
            Ok(bound) => {
                if self.env.results.bounds.improves_dual(bound) {
                    let iteration = self.current_iteration_number();
                    self.env.results.bounds.add_dual_solution_candidate(DualSolution::bound(
                        bound,
                        DualSolutionSource::MipSolverBound,
                        iteration,
                    ));
                }
            }
            Err(e) => report("reading objective bound", &e),
        }
    }

    fn record_progress(&mut self, ctx: &mut dyn CallbackContext) {
        match ctx.explored_nodes() {
            Ok(n) => self.last_explored_nodes = n,
            Err(e) => report("reading explored nodes", &e),
        }
        match ctx.open_nodes() {
            Ok(n) => self.last_open_nodes = n,
            Err(e) => report("reading open nodes", &e),
        }
    }

    fn solution_point(&self, values: Vec<f64>, iteration: usize) -> SolutionPoint {
        let problem = &self.env.problem;
        SolutionPoint {
            objective_value: problem.objective_value(&values),
            max_deviation: problem.max_deviation(&values),
            point: values,
            iteration_found: iteration,
        }
    }

    /// Turn every queued hyperplane into a lazy constraint.
    fn flush_hyperplanes(&mut self, ctx: &mut dyn CallbackContext) -> usize {
        let problem = Arc::clone(&self.env.problem);
        let builder = HyperplaneBuilder::new(&problem);
        let iteration = self.current_iteration_number();
        let mut added = 0;

        for hyperplane in self.store.waiting.drain() {
            let Some(terms) = builder.create_hyperplane_terms(&hyperplane) else {
                continue;
            };

            if let Err(e) = ctx.add_lazy_constraint(&terms.terms, terms.rhs()) {
                report("adding lazy hyperplane", &e);
                continue;
            }

            let is_source_convex = match hyperplane.source_constraint {
                HyperplaneTarget::Constraint(i) => problem.constraint(i).map_or(true, |c| c.is_convex),
                HyperplaneTarget::Objective => true,
            };
            self.store
                .ledger
                .record(hyperplane, iteration, true, is_source_convex, None);
            added += 1;
        }

        if added > 0 {
            if let Some(it) = self.env.results.current_iteration_mut() {
                it.add_hyperplanes(added);
            }
            self.env.statistics.iteration_last_lazy_added = iteration;
        }
        added
    }

    fn flush_integer_cuts(&mut self, ctx: &mut dyn CallbackContext) {
        let cuts = std::mem::take(&mut self.store.integer_cuts);
        if cuts.is_empty() {
            return;
        }

        let n = self.env.problem.num_variables();
        let mut added = 0;

        for indexes in &cuts {
            let Some((terms, rhs)) = integer_cut_terms(n, indexes) else {
                log::error!("Integer cut over {:?} is invalid", indexes);
                continue;
            };
            match ctx.add_lazy_constraint(&terms, rhs) {
                Ok(()) => added += 1,
                Err(e) => report("adding lazy integer cut", &e),
            }
        }

        self.env.statistics.integer_cuts += added;
        log::info!("Added {} integer cut(s)", added);
    }

    fn handle_relaxation_node(&mut self, ctx: &mut dyn CallbackContext) {
        let optimal = match ctx.node_relaxation_is_optimal() {
            Ok(optimal) => optimal,
            Err(e) => {
                report("reading node status", &e);
                return;
            }
        };
        if !optimal {
            return;
        }

        let cap = self.env.settings.dual.relaxation_max_lazy_constraints;
        let used = self
            .env
            .results
            .current_iteration()
            .map_or(0, |it| it.relaxed_lazy_hyperplanes_added);
        if used >= cap {
            return;
        }

        let values = match ctx.node_relaxation_values() {
            Ok(values) => values,
            Err(e) => {
                report("reading node relaxation", &e);
                return;
            }
        };
        if self.env.problem.check_dimension(&values).is_err() {
            log::error!("Node relaxation has {} values", values.len());
            return;
        }

        self.enter(CallbackState::GeneratingCuts);
        let iteration = self.current_iteration_number();
        let points = [self.solution_point(values, iteration)];

        self.selector.run(
            self.env,
            self.store.interior.current(),
            &points,
            false,
            &mut self.store.waiting,
        );
        let added = self.flush_hyperplanes(ctx);

        if let Some(it) = self.env.results.current_iteration_mut() {
            it.relaxed_lazy_hyperplanes_added += added;
        }
    }

    /// Whether the candidate needs no cuts.
    fn is_accepted(&self, candidate: &SolutionPoint) -> bool {
        let tol = self.env.settings.termination.constraint_tolerance;
        if !candidate.is_feasible(tol) {
            return false;
        }
        if ObjectiveSelector::applies(self.env) {
            if let Some(residual) = self.env.problem.objective_epigraph_value(&candidate.point) {
                return residual <= tol;
            }
        }
        true
    }

    fn handle_integer_solution(&mut self, ctx: &mut dyn CallbackContext) {
        let solver_objective = match ctx.solution_objective() {
            Ok(v) => v,
            Err(e) => {
                report("reading solution objective", &e);
                return;
            }
        };
        let values = match ctx.solution_values() {
            Ok(values) => values,
            Err(e) => {
                report("reading solution values", &e);
                return;
            }
        };
        if self.env.problem.check_dimension(&values).is_err() {
            log::error!("Integer solution has {} values", values.len());
            return;
        }

        let iteration = self.open_iteration();
        let candidate = self.solution_point(values, iteration);

        if solver_objective < NO_SOLUTION_OBJECTIVE
            && self.env.results.bounds.improves_primal(candidate.objective_value)
        {
            self.env.results.bounds.add_primal_solution_candidate(
                candidate.clone(),
                PrimalSolutionSource::LazyConstraintCallback,
            );
        }

        if self.check_termination(ctx) {
            return;
        }

        if self.is_accepted(&candidate) {
            log::debug!(
                "Integer solution {:.6} accepted without cuts",
                candidate.objective_value
            );
            return;
        }

        self.enter(CallbackState::GeneratingCuts);
        if self.selector.needs_interior_point() {
            self.store.interior.run(self.env);
        }

        let points = [candidate];
        self.selector.run(
            self.env,
            self.store.interior.current(),
            &points,
            true,
            &mut self.store.waiting,
        );
        if ObjectiveSelector::applies(self.env) {
            ObjectiveSelector.run(self.env, &points, &mut self.store.waiting);
        }
        let [candidate] = points;
        let added = self.flush_hyperplanes(ctx);
        if added == 0 {
            log::error!(
                "No hyperplane added for violated integer solution {:.6}",
                candidate.objective_value
            );
        }

        // Iteration statistics
        let explored = self
            .last_explored_nodes
            .saturating_sub(self.env.statistics.explored_nodes);
        self.env.statistics.explored_nodes = self.last_explored_nodes;
        self.env.statistics.open_nodes = self.last_open_nodes;
        let bounds = (self.env.results.dual_bound(), self.env.results.primal_bound());
        if let Some(it) = self.env.results.current_iteration_mut() {
            it.solution_status = ProblemSolutionStatus::Feasible;
            it.objective_value = solver_objective;
            it.explored_nodes = explored;
            it.open_nodes = self.last_open_nodes;
            it.objective_bounds = bounds;
            it.max_deviation = candidate.max_deviation;
            it.solution_points.push(candidate.clone());
        }

        self.run_primal_heuristics(&candidate);

        if self.env.settings.dual.use_integer_cuts {
            self.flush_integer_cuts(ctx);
        }

        self.env.results.iterations.close_current();
        self.print_iteration_report(&candidate, added);

        if self.check_termination(ctx) {
            return;
        }
        self.inject_incumbent(ctx);
    }

    fn run_primal_heuristics(&mut self, candidate: &SolutionPoint) {
        let problem = Arc::clone(&self.env.problem);

        if self.env.settings.primal.use_linesearch && !problem.nonlinear_constraints().is_empty() {
            if let Some(interior) = self.store.interior.current() {
                if let Some(point) = self.primal_linesearch.run(self.env, interior, candidate) {
                    self.env
                        .results
                        .bounds
                        .add_primal_solution_candidate(point, PrimalSolutionSource::Linesearch);
                }
            }
        }

        let strategy = self.env.settings.primal.fixed_nlp;
        if self.store.fixed_nlp.should_run(strategy, &problem, candidate) {
            self.env.statistics.fixed_nlp_calls += 1;
            let outcome = self.store.fixed_nlp.solve(self.env, candidate);

            if let Some(point) = outcome.solution {
                self.env
                    .results
                    .bounds
                    .add_primal_solution_candidate(point, PrimalSolutionSource::FixedNlp);
            }
            if let Some(cut) = outcome.integer_cut {
                self.store.integer_cuts.push(cut);
            }
        }
    }

    /// Offer the incumbent back to the engine and tighten the cutoff.
    fn inject_incumbent(&mut self, ctx: &mut dyn CallbackContext) {
        let bounds = &self.env.results.bounds;
        let primal = bounds.primal_bound();
        if !primal.is_finite() {
            return;
        }

        let improved = match self.last_injected_primal {
            Some(last) if self.is_minimization() => primal < last,
            Some(last) => primal > last,
            None => true,
        };
        if !improved {
            return;
        }

        if let Some(solution) = bounds.primal_solution() {
            let mut values = solution.point.point.clone();
            if let Some(aux) = self.env.problem.auxiliary_objective_variable() {
                if let Some(v) = values.get_mut(aux) {
                    *v = primal;
                }
            }
            if let Err(e) = ctx.set_solution(&values) {
                report("setting incumbent", &e);
            }
        }
        self.last_injected_primal = Some(primal);

        let tol = self.env.settings.dual.cutoff_tolerance;
        let cutoff = if self.is_minimization() {
            primal + tol
        } else {
            primal - tol
        };
        match ctx.set_cutoff(cutoff) {
            Ok(()) => log::info!("Setting cutoff value to {:.6}", cutoff),
            Err(e) => report("setting cutoff", &e),
        }
    }

    fn print_iteration_report(&self, candidate: &SolutionPoint, added: usize) {
        if !self.env.settings.output.iteration_report {
            return;
        }
        let Some(it) = self.env.results.current_iteration() else {
            return;
        };

        log::info!(
            "Iteration {:>4} | nodes {:>6}/{:<6} | hyperplanes {:>3}/{:<5} | dual {:>14.6} | primal {:>14.6} | gap {:.2e} | max dev {:.2e} (c{})",
            it.iteration_number,
            it.explored_nodes,
            it.open_nodes,
            added,
            it.total_hyperplanes,
            self.env.results.dual_bound(),
            self.env.results.primal_bound(),
            self.env.results.bounds.relative_gap(),
            candidate.max_deviation_value(),
            candidate.max_deviation.map_or(0, |d| d.constraint),
        );
    }
}

impl LazyConstraintHandler for LazyConstraintCallback<'_> {
    fn handle(&mut self, ctx: &mut dyn CallbackContext) {
        let reason = ctx.reason();
        if reason.is_passive() {
            return;
        }
        self.env.statistics.lazy_callback_calls += 1;
        if self.aborted {
            ctx.abort();
            return;
        }

        self.enter(CallbackState::EvaluatingNode);
        if self.check_termination(ctx) {
            self.enter(CallbackState::Idle);
            return;
        }

        self.update_dual_bound(ctx);

        match reason {
            CallbackReason::Progress => self.record_progress(ctx),
            CallbackReason::RelaxationNode => self.handle_relaxation_node(ctx),
            CallbackReason::IntegerSolution => self.handle_integer_solution(ctx),
            _ => {}
        }

        if !self.aborted {
            self.check_termination(ctx);
        }
        self.enter(CallbackState::Idle);
    }
}

fn report(what: &str, e: &BackendError) {
    log::error!("Backend error when {}: {}", what, e);
}
