//! Working problem representation.

use std::fmt;

use super::constraint::{NumericConstraint, NumericConstraintValue};
use super::function::{LinearFunction, NonlinearFunction, SparseGradient};
use crate::error::{EshError, EshResult};
use crate::solution::ConstraintDeviation;

/// Sentinel constraint index used in evaluation errors for the objective.
pub const OBJECTIVE_INDEX: usize = usize::MAX;

/// Variable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    /// Continuous.
    Real,
    /// 0/1 variable.
    Binary,
    /// General integer.
    Integer,
}

/// A variable of the working model.
#[derive(Debug, Clone)]
pub struct Variable {
    /// Column index.
    pub index: usize,

    /// Name for diagnostics.
    pub name: String,

    /// Lower bound (may be -inf).
    pub lower_bound: f64,

    /// Upper bound (may be +inf).
    pub upper_bound: f64,

    /// Domain.
    pub kind: VariableType,

    /// Marked by the reformulation as able to make the dual problem unbounded.
    pub dual_unbounded: bool,
}

impl Variable {
    /// Binary or integer.
    pub fn is_discrete(&self) -> bool {
        !matches!(self.kind, VariableType::Real)
    }

    /// Flagged, or with a bound at least `threshold` in magnitude.
    pub fn is_dual_unbounded(&self, threshold: f64) -> bool {
        self.dual_unbounded || self.lower_bound <= -threshold || self.upper_bound >= threshold
    }
}

/// Objective classification, ordered by difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ObjectiveClassification {
    /// Affine objective.
    #[default]
    Linear,
    /// Quadratic objective handled natively by the MILP solver.
    Quadratic,
    /// Quadratic objective moved into an epigraph constraint.
    QuadraticConsideredAsNonlinear,
    /// Signomial objective.
    Signomial,
    /// General nonlinear objective.
    Nonlinear,
}

impl ObjectiveClassification {
    /// Whether the objective needs its own linearization cuts.
    pub fn is_above_quadratic(&self) -> bool {
        *self > ObjectiveClassification::Quadratic
    }
}

/// Objective function with its sense and classification.
pub struct ObjectiveFunction {
    /// The function f.
    pub function: Box<dyn NonlinearFunction>,

    /// Classification.
    pub classification: ObjectiveClassification,

    /// Minimize (true) or maximize (false).
    pub is_minimize: bool,
}

impl ObjectiveFunction {
    /// Create an objective.
    pub fn new(
        function: impl NonlinearFunction + 'static,
        classification: ObjectiveClassification,
        is_minimize: bool,
    ) -> Self {
        Self {
            function: Box::new(function),
            classification,
            is_minimize,
        }
    }

    /// Linear objective c^T x + c0.
    pub fn linear(terms: Vec<(usize, f64)>, constant: f64, is_minimize: bool) -> Self {
        Self::new(
            LinearFunction::new(terms, constant),
            ObjectiveClassification::Linear,
            is_minimize,
        )
    }

    /// Evaluate f.
    pub fn calculate_value(&self, point: &[f64]) -> f64 {
        self.function.value(point)
    }
}

impl fmt::Debug for ObjectiveFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectiveFunction")
            .field("classification", &self.classification)
            .field("is_minimize", &self.is_minimize)
            .finish()
    }
}

/// Summary properties of a problem.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemProperties {
    /// Number of variables.
    pub number_of_variables: usize,
    /// Number of binary and integer variables.
    pub number_of_discrete_variables: usize,
    /// Number of nonlinear constraints.
    pub number_of_nonlinear_constraints: usize,
    /// Objective sense.
    pub is_minimization: bool,
    /// Objective classification.
    pub objective_classification: ObjectiveClassification,
    /// Whether an auxiliary epigraph variable carries the objective.
    pub has_auxiliary_objective_variable: bool,
}

/// The (reformulated) working problem.
///
/// Linear constraints live in the MILP backend; this model holds what the
/// cut loop has to evaluate: variables, nonlinear constraints and the
/// objective.
#[derive(Debug)]
pub struct Problem {
    variables: Vec<Variable>,
    nonlinear_constraints: Vec<NumericConstraint>,
    objective: ObjectiveFunction,
    auxiliary_objective_variable: Option<usize>,
}

impl Problem {
    /// Create an empty problem with the given objective.
    pub fn new(objective: ObjectiveFunction) -> Self {
        Self {
            variables: Vec::new(),
            nonlinear_constraints: Vec::new(),
            objective,
            auxiliary_objective_variable: None,
        }
    }

    /// Add a variable and return its index.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        lower_bound: f64,
        upper_bound: f64,
        kind: VariableType,
    ) -> usize {
        let index = self.variables.len();
        let (lower_bound, upper_bound) = match kind {
            VariableType::Binary => (lower_bound.max(0.0), upper_bound.min(1.0)),
            _ => (lower_bound, upper_bound),
        };

        self.variables.push(Variable {
            index,
            name: name.into(),
            lower_bound,
            upper_bound,
            kind,
            dual_unbounded: false,
        });
        index
    }

    /// Flag a variable as dual unbounded.
    pub fn set_dual_unbounded(&mut self, var: usize, flag: bool) -> EshResult<()> {
        let n = self.variables.len();
        let v = self.variables.get_mut(var).ok_or_else(|| {
            EshError::InvalidProblem(format!("variable {} out of range ({} variables)", var, n))
        })?;
        v.dual_unbounded = flag;
        Ok(())
    }

    /// Add a nonlinear constraint f(x) <= upper_bound and return its index.
    pub fn add_nonlinear_constraint(
        &mut self,
        name: impl Into<String>,
        function: impl NonlinearFunction + 'static,
        upper_bound: f64,
        is_convex: bool,
    ) -> usize {
        let index = self.nonlinear_constraints.len();
        self.nonlinear_constraints.push(NumericConstraint {
            index,
            name: name.into(),
            function: Box::new(function),
            upper_bound,
            is_convex,
        });
        index
    }

    /// Declare the column holding the epigraph variable of the objective.
    pub fn set_auxiliary_objective_variable(&mut self, var: usize) -> EshResult<()> {
        if var >= self.variables.len() {
            return Err(EshError::InvalidProblem(format!(
                "auxiliary objective variable {} out of range ({} variables)",
                var,
                self.variables.len()
            )));
        }
        self.auxiliary_objective_variable = Some(var);
        Ok(())
    }

    /// All variables.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Variable by index.
    pub fn variable(&self, index: usize) -> Option<&Variable> {
        self.variables.get(index)
    }

    /// Number of variables.
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// All nonlinear constraints.
    pub fn nonlinear_constraints(&self) -> &[NumericConstraint] {
        &self.nonlinear_constraints
    }

    /// Nonlinear constraint by index.
    pub fn constraint(&self, index: usize) -> Option<&NumericConstraint> {
        self.nonlinear_constraints.get(index)
    }

    /// Indices of all nonlinear constraints.
    pub fn nonlinear_constraint_indices(&self) -> Vec<usize> {
        (0..self.nonlinear_constraints.len()).collect()
    }

    /// Objective.
    pub fn objective(&self) -> &ObjectiveFunction {
        &self.objective
    }

    /// Epigraph variable, if any.
    pub fn auxiliary_objective_variable(&self) -> Option<usize> {
        self.auxiliary_objective_variable
    }

    /// Objective sense.
    pub fn is_minimization(&self) -> bool {
        self.objective.is_minimize
    }

    /// Summary properties.
    pub fn properties(&self) -> ProblemProperties {
        ProblemProperties {
            number_of_variables: self.variables.len(),
            number_of_discrete_variables: self.variables.iter().filter(|v| v.is_discrete()).count(),
            number_of_nonlinear_constraints: self.nonlinear_constraints.len(),
            is_minimization: self.objective.is_minimize,
            objective_classification: self.objective.classification,
            has_auxiliary_objective_variable: self.auxiliary_objective_variable.is_some(),
        }
    }

    /// Fail unless `point` has one coordinate per variable.
    pub fn check_dimension(&self, point: &[f64]) -> EshResult<()> {
        if point.len() != self.variables.len() {
            return Err(EshError::DimensionMismatch {
                expected: self.variables.len(),
                actual: point.len(),
            });
        }
        Ok(())
    }

    /// Objective value f(x).
    pub fn objective_value(&self, point: &[f64]) -> f64 {
        self.objective.calculate_value(point)
    }

    /// Evaluate a subset of the nonlinear constraints. Unknown indices are skipped.
    pub fn numeric_constraint_values(
        &self,
        point: &[f64],
        constraints: &[usize],
    ) -> Vec<NumericConstraintValue> {
        constraints
            .iter()
            .filter_map(|&i| self.nonlinear_constraints.get(i))
            .map(|c| c.numeric_value(point))
            .collect()
    }

    /// The constraint in `constraints` with the largest normalized value.
    ///
    /// Ties keep the first constraint in `constraints` order.
    pub fn max_numeric_constraint_value(
        &self,
        point: &[f64],
        constraints: &[usize],
    ) -> Option<NumericConstraintValue> {
        self.numeric_constraint_values(point, constraints)
            .into_iter()
            .fold(None, |best: Option<NumericConstraintValue>, v| match best {
                Some(b) if b.normalized_value >= v.normalized_value => Some(b),
                _ => Some(v),
            })
    }

    /// Maximum normalized deviation over all nonlinear constraints.
    pub fn max_deviation(&self, point: &[f64]) -> Option<ConstraintDeviation> {
        let all = self.nonlinear_constraint_indices();
        self.max_numeric_constraint_value(point, &all)
            .map(|v| ConstraintDeviation::new(v.constraint, v.normalized_value))
    }

    /// Constraints to linearize at `point`.
    ///
    /// When the point violates some constraint, returns every violated
    /// constraint whose normalized value is at least `factor` times the
    /// maximum, ordered by decreasing violation. Otherwise returns only the
    /// (non-positive) maximum so the caller can see the point is interior.
    pub fn most_deviating_constraints(&self, point: &[f64], factor: f64) -> Vec<ConstraintDeviation> {
        let all = self.nonlinear_constraint_indices();
        let values = self.numeric_constraint_values(point, &all);

        let max = match self.max_numeric_constraint_value(point, &all) {
            Some(m) => m,
            None => return Vec::new(),
        };

        if max.normalized_value <= 0.0 {
            return vec![ConstraintDeviation::new(max.constraint, max.normalized_value)];
        }

        let threshold = factor * max.normalized_value;
        let mut selected: Vec<ConstraintDeviation> = values
            .into_iter()
            .filter(|v| v.normalized_value > 0.0 && v.normalized_value >= threshold)
            .map(|v| ConstraintDeviation::new(v.constraint, v.normalized_value))
            .collect();

        // Stable: equal violations keep constraint order
        selected.sort_by(|a, b| b.value.total_cmp(&a.value));
        selected
    }

    /// Epigraph residual f(x) - mu (min) or mu - f(x) (max).
    ///
    /// None when the problem has no auxiliary objective variable.
    pub fn objective_epigraph_value(&self, point: &[f64]) -> Option<f64> {
        let aux = self.auxiliary_objective_variable?;
        let mu = *point.get(aux)?;
        let f = self.objective.calculate_value(point);

        Some(if self.objective.is_minimize { f - mu } else { mu - f })
    }

    /// Gradient of the epigraph residual.
    pub fn objective_epigraph_gradient(&self, point: &[f64]) -> EshResult<SparseGradient> {
        let aux = self.auxiliary_objective_variable.ok_or_else(|| {
            EshError::evaluation(OBJECTIVE_INDEX, "problem has no auxiliary objective variable")
        })?;

        let mut gradient = self.objective.function.gradient(point)?;
        let sign = if self.objective.is_minimize { 1.0 } else { -1.0 };

        for coef in gradient.values_mut() {
            *coef *= sign;
        }
        *gradient.entry(aux).or_insert(0.0) -= sign;

        Ok(gradient)
    }

    /// Whether every discrete variable is integral within `tol`.
    pub fn is_integer_feasible(&self, point: &[f64], tol: f64) -> bool {
        self.variables
            .iter()
            .filter(|v| v.is_discrete())
            .all(|v| match point.get(v.index) {
                Some(x) => (x - x.round()).abs() <= tol,
                None => false,
            })
    }

    /// Integer values of the discrete variables (the integer combination).
    pub fn integer_combination(&self, point: &[f64]) -> Vec<i64> {
        self.variables
            .iter()
            .filter(|v| v.is_discrete())
            .map(|v| point.get(v.index).map_or(0, |x| x.round() as i64))
            .collect()
    }

    /// Variables that may be responsible for an unbounded dual problem.
    pub fn dual_unbounded_variables(&self, threshold: f64) -> Vec<usize> {
        self.variables
            .iter()
            .filter(|v| v.is_dual_unbounded(threshold))
            .map(|v| v.index)
            .collect()
    }
}
