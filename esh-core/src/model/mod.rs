//! Problem model consumed by the hyperplane generation loop.

mod constraint;
mod function;
mod problem;

pub use constraint::{NumericConstraint, NumericConstraintValue};
pub use function::{ClosureFunction, LinearFunction, NonlinearFunction, SparseGradient};
pub use problem::{
    ObjectiveClassification, ObjectiveFunction, Problem, ProblemProperties, Variable, VariableType,
};
