//! Core data model for ESH/ECP outer approximation.
//!
//! This crate holds everything the hyperplane generation loop needs that is
//! independent of a particular MILP backend:
//!
//! - **Problem model**: variables, nonlinear constraints and the objective,
//!   evaluated through the [`NonlinearFunction`] trait
//! - **Solution data**: solution points, constraint deviations, primal and
//!   dual solution candidates
//! - **Ledgers**: the primal/dual [`BoundLedger`] and the [`IterationLedger`]
//! - **Line search**: root finding between an interior and an exterior point
//! - **Settings**: typed configuration grouped by category
//!
//! The dual (MILP master) layer lives in `esh-mip`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod env;
pub mod error;
pub mod linesearch;
pub mod model;
pub mod results;
pub mod settings;
pub mod solution;

pub use env::{Environment, SolutionStatistics};
pub use error::{EshError, EshResult};
pub use linesearch::{FalsePositionLinesearch, LinesearchMethod, LinesearchResult};
pub use model::{
    ClosureFunction, LinearFunction, NonlinearFunction, NumericConstraint, NumericConstraintValue,
    ObjectiveClassification, ObjectiveFunction, Problem, ProblemProperties, SparseGradient,
    Variable, VariableType,
};
pub use results::{BoundLedger, Iteration, IterationLedger, Results};
pub use settings::{
    CutStrategy, DualSettings, EcpSettings, EshSettings, FixedNlpStrategy, InteriorPointUpdate,
    OutputSettings, PrimalSettings, SettingValue, Settings, TerminationSettings,
};
pub use solution::{
    ConstraintDeviation, DualSolution, DualSolutionSource, PrimalSolution, PrimalSolutionSource,
    ProblemSolutionStatus, SolutionPoint,
};
