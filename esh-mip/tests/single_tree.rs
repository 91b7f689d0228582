//! End-to-end tests of the single-tree driver over the enumeration backend.

mod common;

use std::sync::Arc;

use common::{disc, disc_problem, EnumerationBackend};
use esh_core::{
    ClosureFunction, FixedNlpStrategy, ObjectiveClassification, ObjectiveFunction,
    PrimalSolutionSource, Problem, ProblemSolutionStatus, Settings, SolutionPoint, SparseGradient,
    VariableType,
};
use esh_mip::{
    EshSolver, FixedNlpSolver, Hyperplane, HyperplaneSource, HyperplaneTarget, MipSolverBackend,
};

fn disc_backend(is_minimization: bool) -> EnumerationBackend {
    let sign = if is_minimization { -1.0 } else { 1.0 };
    EnumerationBackend::grid(vec![sign, sign], is_minimization, 0, 5)
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
}

#[test]
fn test_ecp_disc() {
    let mut solver =
        EshSolver::new(Arc::new(disc_problem(true)), Settings::ecp(), disc_backend(true)).unwrap();
    let report = solver.solve().unwrap();

    assert_eq!(report.status, ProblemSolutionStatus::Optimal);
    assert_close(report.primal_bound, -4.0);
    assert_close(report.dual_bound, -4.0);
    assert!(report.hyperplanes > 0);
    assert!(report.iterations > 0);

    let x = &report.primal_solution.unwrap().point.point;
    assert!(x[0] * x[0] + x[1] * x[1] <= 10.0);
    assert!(!solver.dual().backend().lazy.is_empty());
}

#[test]
fn test_esh_disc_with_interior_point() {
    let mut solver = EshSolver::new(
        Arc::new(disc_problem(true)),
        Settings::default(),
        disc_backend(true),
    )
    .unwrap();
    solver.set_interior_point(vec![1.0, 1.0]).unwrap();
    let report = solver.solve().unwrap();

    assert_eq!(report.status, ProblemSolutionStatus::Optimal);
    assert_close(report.primal_bound, -4.0);

    let ledger = &solver.dual().store().ledger;
    assert!(!ledger.is_empty());
    assert!(ledger.entries().iter().all(|h| h.source.is_linesearch()));
    assert!(ledger.entries().iter().all(|h| h.is_lazy));
}

#[test]
fn test_esh_without_interior_point_falls_back() {
    let mut solver = EshSolver::new(
        Arc::new(disc_problem(true)),
        Settings::default(),
        disc_backend(true),
    )
    .unwrap();
    let report = solver.solve().unwrap();

    assert_eq!(report.status, ProblemSolutionStatus::Optimal);
    assert_close(report.primal_bound, -4.0);
    assert!(solver
        .dual()
        .store()
        .ledger
        .entries()
        .iter()
        .all(|h| h.source == HyperplaneSource::MipOptimalSolutionPoint));
}

#[test]
fn test_interior_point_must_be_strictly_feasible() {
    let mut solver = EshSolver::new(
        Arc::new(disc_problem(true)),
        Settings::default(),
        disc_backend(true),
    )
    .unwrap();
    assert!(solver.set_interior_point(vec![1.0, 3.0]).is_err());
    assert!(solver.set_interior_point(vec![1.0]).is_err());
    assert!(solver.set_interior_point(vec![0.5, 0.5]).is_ok());
}

#[test]
fn test_column_count_must_match() {
    let backend = EnumerationBackend::grid(vec![1.0, 1.0, 0.0], true, 0, 1);
    assert!(EshSolver::new(Arc::new(disc_problem(true)), Settings::ecp(), backend).is_err());
}

#[test]
fn test_ecp_disc_maximization() {
    let mut solver =
        EshSolver::new(Arc::new(disc_problem(false)), Settings::ecp(), disc_backend(false)).unwrap();
    let report = solver.solve().unwrap();

    assert_eq!(report.status, ProblemSolutionStatus::Optimal);
    assert_close(report.primal_bound, 4.0);
    assert_close(report.dual_bound, 4.0);
}

#[test]
fn test_candidate_within_tolerance_needs_no_hyperplane() {
    let mut problem = Problem::new(ObjectiveFunction::linear(vec![(0, -1.0), (1, -1.0)], 0.0, true));
    problem.add_variable("x", 0.0, 5.0, VariableType::Integer);
    problem.add_variable("y", 0.0, 5.0, VariableType::Integer);
    // Deviation 0.0005 at (2, 2)
    problem.add_nonlinear_constraint("disc", disc(-7.9995), 0.0, true);

    let backend = EnumerationBackend::new(vec![-1.0, -1.0], true, vec![vec![2.0, 2.0]]);
    let settings = Settings::ecp().with_constraint_tolerance(0.001);
    let mut solver = EshSolver::new(Arc::new(problem), settings, backend).unwrap();
    let report = solver.solve().unwrap();

    assert_eq!(report.hyperplanes, 0);
    assert!(solver.dual().backend().lazy.is_empty());
    assert_eq!(report.status, ProblemSolutionStatus::Optimal);
    assert_close(report.primal_bound, -4.0);
}

#[test]
fn test_infeasible_problem() {
    let mut problem = Problem::new(ObjectiveFunction::linear(vec![(0, -1.0), (1, -1.0)], 0.0, true));
    problem.add_variable("x", 0.0, 5.0, VariableType::Integer);
    problem.add_variable("y", 0.0, 5.0, VariableType::Integer);
    problem.add_nonlinear_constraint("empty", disc(0.0), -1.0, true);

    let mut solver = EshSolver::new(Arc::new(problem), Settings::ecp(), disc_backend(true)).unwrap();
    let report = solver.solve().unwrap();

    assert_eq!(report.status, ProblemSolutionStatus::Infeasible);
    assert!(report.primal_solution.is_none());
    // Convex cuts are never relaxed
    assert_eq!(solver.dual().backend().solves, 1);
}

/// min x + y over binaries-like integers in {0, 1} with the nonconvex
/// constraint x^2 + y^2 >= 1, and an initial row x >= 1.25 that makes the
/// model infeasible. A redundant convex row comes first.
#[test]
fn test_repair_relaxes_nonconvex_rows() {
    let mut problem = Problem::new(ObjectiveFunction::linear(vec![(0, 1.0), (1, 1.0)], 0.0, true));
    problem.add_variable("x", 0.0, 1.0, VariableType::Integer);
    problem.add_variable("y", 0.0, 1.0, VariableType::Integer);
    let inside = problem.add_nonlinear_constraint("inside", disc(0.0), 2.0, true);
    let outside = problem.add_nonlinear_constraint(
        "outside",
        ClosureFunction::new(
            |x: &[f64]| -(x[0] * x[0] + x[1] * x[1]),
            |x: &[f64]| Ok(SparseGradient::from([(0, -2.0 * x[0]), (1, -2.0 * x[1])])),
        ),
        -1.0,
        false,
    );

    let backend = EnumerationBackend::grid(vec![1.0, 1.0], true, 0, 1);
    let mut solver = EshSolver::new(Arc::new(problem), Settings::ecp(), backend).unwrap();

    // 2x + 2y <= 4, then -x <= -1.25
    let added = solver.add_initial_hyperplanes(vec![
        Hyperplane {
            source_constraint: HyperplaneTarget::Constraint(inside),
            generated_point: vec![1.0, 1.0],
            source: HyperplaneSource::MipOptimalSolutionPoint,
        },
        Hyperplane {
            source_constraint: HyperplaneTarget::Constraint(outside),
            generated_point: vec![0.5, 0.0],
            source: HyperplaneSource::MipOptimalSolutionPoint,
        },
    ]);
    assert_eq!(added, 2);
    assert_close(solver.dual().backend().rows()[0].rhs, 4.0);
    assert_close(solver.dual().backend().rows()[1].rhs, -1.25);

    let report = solver.solve().unwrap();

    let backend = solver.dual().backend();
    assert_eq!(backend.solves, 2);
    // Only the nonconvex row, weighted by its row index
    assert_eq!(backend.elastic_penalties, vec![0.5]);
    assert_close(backend.rows()[0].rhs, 4.0);
    // Slack 0.25 at x = 1, relaxed by 1.5 times the slack
    assert_close(backend.rows()[1].rhs, -1.25 + 1.5 * 0.25);

    assert_eq!(report.status, ProblemSolutionStatus::Optimal);
    assert_close(report.primal_bound, 1.0);
    assert_eq!(report.primal_solution.unwrap().point.point, vec![1.0, 0.0]);
}

#[test]
fn test_unbounded_retry_restores_bounds() {
    let mut problem = disc_problem(true);
    problem.add_variable("z", -1e50, 1e50, VariableType::Real);

    let mut backend = EnumerationBackend::grid(vec![-1.0, -1.0, 0.0], true, 0, 5);
    backend.update_variable_bound(2, -1e50, 1e50).unwrap();
    backend.unbounded_column = Some(2);

    let mut solver = EshSolver::new(Arc::new(problem), Settings::ecp(), backend).unwrap();
    let report = solver.solve().unwrap();

    assert_eq!(report.status, ProblemSolutionStatus::Optimal);
    assert_close(report.primal_bound, -4.0);

    let backend = solver.dual().backend();
    assert_eq!(backend.solves, 2);
    assert_eq!(backend.variable_bounds(2).unwrap(), (-1e50, 1e50));
    assert!(solver
        .environment()
        .results
        .current_iteration()
        .unwrap()
        .infeasibility_repair_performed);
}

/// min (x - 2)^2 + 1 through mu over x in {0..3}, where the engine finds no
/// solution while mu is free.
#[test]
fn test_infeasible_free_objective_variable_is_bounded() {
    let mut problem = Problem::new(ObjectiveFunction::new(
        ClosureFunction::new(
            |x: &[f64]| (x[0] - 2.0) * (x[0] - 2.0) + 1.0,
            |x: &[f64]| Ok(SparseGradient::from([(0, 2.0 * (x[0] - 2.0))])),
        ),
        ObjectiveClassification::QuadraticConsideredAsNonlinear,
        true,
    ));
    problem.add_variable("x", 0.0, 3.0, VariableType::Integer);
    let mu = problem.add_variable("mu", -1e50, 1e50, VariableType::Real);
    problem.set_auxiliary_objective_variable(mu).unwrap();

    let candidates = (0..=3)
        .flat_map(|x| (0..=9).map(move |m| vec![x as f64, m as f64]))
        .collect();
    let mut backend = EnumerationBackend::new(vec![0.0, 1.0], true, candidates);
    backend.update_variable_bound(mu, -1e50, 1e50).unwrap();
    backend.bound_updates.clear();
    backend.infeasible_column = Some(mu);

    let mut solver = EshSolver::new(Arc::new(problem), Settings::ecp(), backend).unwrap();
    let report = solver.solve().unwrap();

    assert_eq!(report.status, ProblemSolutionStatus::Optimal);
    assert_close(report.primal_bound, 1.0);
    assert_eq!(report.primal_solution.unwrap().point.point[0], 2.0);

    let backend = solver.dual().backend();
    assert_eq!(backend.solves, 2);
    assert_eq!(
        backend.bound_updates,
        vec![(mu, -1e9, 1e9), (mu, -1e50, 1e50)]
    );
    assert!(solver
        .dual()
        .store()
        .ledger
        .entries()
        .iter()
        .all(|h| h.source == HyperplaneSource::ObjectiveLinesearch));
}

#[test]
fn test_unbounded_without_culprit_is_reported() {
    let mut backend = disc_backend(true);
    backend.unbounded_column = Some(0);
    backend.update_variable_bound(0, -1e50, 0.0).unwrap();

    // x is bounded in the problem, so nothing is flagged dual unbounded
    let mut solver = EshSolver::new(Arc::new(disc_problem(true)), Settings::ecp(), backend).unwrap();
    let report = solver.solve().unwrap();
    assert_eq!(report.status, ProblemSolutionStatus::Unbounded);
    assert_eq!(solver.dual().backend().solves, 1);
}

#[test]
fn test_backend_error_becomes_error_status() {
    let mut backend = disc_backend(true);
    backend.fail_solve = true;

    let mut solver = EshSolver::new(Arc::new(disc_problem(true)), Settings::ecp(), backend).unwrap();
    let report = solver.solve().unwrap();
    assert_eq!(report.status, ProblemSolutionStatus::Error);
    assert!(report.primal_solution.is_none());
}

#[test]
fn test_rejected_lazy_constraints_are_tolerated() {
    let mut backend = disc_backend(true);
    backend.fail_lazy = true;

    let mut solver = EshSolver::new(Arc::new(disc_problem(true)), Settings::ecp(), backend).unwrap();
    let report = solver.solve().unwrap();

    assert_eq!(report.hyperplanes, 0);
    assert!(report.primal_solution.is_none());
    assert_close(report.dual_bound, -10.0);
    assert_eq!(report.status, ProblemSolutionStatus::NotSolved);
}

#[test]
fn test_relaxation_node_cuts() {
    let mut backend = disc_backend(true);
    backend.relaxation_points = vec![vec![4.5, 4.5]];

    let mut settings = Settings::ecp();
    settings.dual.relaxation_max_lazy_constraints = 5;

    let mut solver = EshSolver::new(Arc::new(disc_problem(true)), settings, backend).unwrap();
    let report = solver.solve().unwrap();

    assert_eq!(report.status, ProblemSolutionStatus::Optimal);
    assert_close(report.primal_bound, -4.0);
    assert_eq!(
        solver.dual().store().ledger.entries()[0].source,
        HyperplaneSource::LpRelaxedSolutionPoint
    );
}

#[test]
fn test_queued_integer_cut_is_flushed() {
    let mut solver =
        EshSolver::new(Arc::new(disc_problem(true)), Settings::ecp(), disc_backend(true)).unwrap();
    // x + y <= 1
    solver.add_integer_cut(vec![0, 1]);
    let report = solver.solve().unwrap();

    assert_eq!(report.integer_cuts, 1);
    assert_eq!(report.status, ProblemSolutionStatus::Optimal);
    assert_close(report.primal_bound, -1.0);
}

#[test]
fn test_iteration_limit() {
    let settings = Settings::ecp().with_iteration_limit(1);
    let mut solver = EshSolver::new(Arc::new(disc_problem(true)), settings, disc_backend(true)).unwrap();
    let report = solver.solve().unwrap();

    assert_eq!(report.status, ProblemSolutionStatus::IterationLimit);
    assert_eq!(report.iterations, 1);
}

struct KnownPoint;

impl FixedNlpSolver for KnownPoint {
    fn solve_fixed(&mut self, _problem: &Problem, _candidate: &SolutionPoint) -> Option<Vec<f64>> {
        Some(vec![1.0, 3.0])
    }
}

#[test]
fn test_fixed_nlp_solution_sets_cutoff() {
    let mut settings = Settings::ecp();
    settings.primal.fixed_nlp = FixedNlpStrategy::Always;

    let mut solver = EshSolver::new(Arc::new(disc_problem(true)), settings, disc_backend(true)).unwrap();
    solver.set_fixed_nlp_solver(Box::new(KnownPoint));
    let report = solver.solve().unwrap();

    assert_eq!(report.status, ProblemSolutionStatus::Optimal);
    assert_close(report.primal_bound, -4.0);
    assert_eq!(
        report.primal_solution.unwrap().source,
        PrimalSolutionSource::FixedNlp
    );

    let cutoffs = &solver.dual().backend().cutoffs;
    assert_eq!(cutoffs.len(), 1);
    assert_close(cutoffs[0], -4.0 + 1e-5);
    assert!(solver.environment().statistics.fixed_nlp_calls > 0);
}

#[test]
fn test_model_integer_cut_is_kept_across_solve() {
    let mut solver =
        EshSolver::new(Arc::new(disc_problem(true)), Settings::ecp(), disc_backend(true)).unwrap();

    // x + y <= 1
    let row = solver.create_integer_cut(&[1, 0, 1]).unwrap();
    assert_eq!(row, 0);
    assert_eq!(solver.dual().backend().rows()[0].terms, vec![(0, 1.0), (1, 1.0)]);
    assert_close(solver.dual().backend().rows()[0].rhs, 1.0);
    assert_eq!(solver.environment().statistics.integer_cuts, 1);

    assert!(solver.create_integer_cut(&[]).is_err());
    assert!(solver.create_integer_cut(&[7]).is_err());
    assert_eq!(solver.dual().backend().rows().len(), 1);

    let report = solver.solve().unwrap();
    assert_eq!(report.status, ProblemSolutionStatus::Optimal);
    assert_close(report.primal_bound, -1.0);
    assert_eq!(report.integer_cuts, 1);

    let backend = solver.into_backend();
    assert_eq!(backend.solves, 1);
    assert_eq!(backend.rows().len(), 1);
}

#[test]
fn test_initial_hyperplanes_are_counted() {
    let mut solver =
        EshSolver::new(Arc::new(disc_problem(true)), Settings::ecp(), disc_backend(true)).unwrap();

    // 10x + 10y <= 60 at (5, 5)
    let added = solver.add_initial_hyperplanes(vec![Hyperplane {
        source_constraint: HyperplaneTarget::Constraint(0),
        generated_point: vec![5.0, 5.0],
        source: HyperplaneSource::MipOptimalSolutionPoint,
    }]);
    assert_eq!(added, 1);

    let report = solver.solve().unwrap();
    assert_eq!(report.status, ProblemSolutionStatus::Optimal);
    assert_close(report.primal_bound, -4.0);

    let ledger = &solver.dual().store().ledger;
    let first = &ledger.entries()[0];
    assert!(!first.is_lazy);
    assert_eq!(first.backend_row, Some(0));
    assert_eq!(first.generated_iteration, 0);

    let iterations = &solver.environment().results.iterations;
    assert!(iterations.iterations()[0].hyperplanes_added >= 1);
    assert_eq!(report.hyperplanes, ledger.len());
    assert_eq!(iterations.total_hyperplanes(), ledger.len());
}
