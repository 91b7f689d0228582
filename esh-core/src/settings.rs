//! Configuration settings for the outer approximation loop.
//!
//! Settings are grouped by category the same way they are looked up by
//! [`Settings::value`]: `dual`, `ecp`, `esh`, `primal`, `termination` and
//! `output`.

use std::time::Duration;

use crate::error::{EshError, EshResult};

/// Cut generation strategy for the dual problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutStrategy {
    /// Extended cutting plane: linearize directly at the candidate points.
    Ecp,

    /// Extended supporting hyperplane: project candidates onto the boundary
    /// of the nonlinear feasible region before linearizing.
    #[default]
    Esh,
}

/// How a new primal solution updates the ESH interior point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteriorPointUpdate {
    /// Never change the interior point once it is set.
    KeepOriginal,

    /// Replace the interior point with a more interior primal solution.
    Replace,

    /// Move the interior point to the midpoint with the primal solution.
    #[default]
    Average,
}

/// When integer-feasible candidates are queued for a fixed-integer NLP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixedNlpStrategy {
    /// Never queue candidates.
    #[default]
    Never,

    /// Queue every candidate that needed cuts.
    Always,

    /// Queue candidates whose integer assignment has not been tried before.
    NewIntegerCombination,

    /// Queue a candidate at most every N iterations.
    Frequency(usize),
}

/// Value returned by the key/category settings lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    /// Floating point setting.
    Float(f64),
    /// Integer setting.
    Int(i64),
    /// Boolean setting.
    Bool(bool),
}

impl SettingValue {
    /// Numeric view of the value (booleans map to 0/1).
    pub fn as_f64(&self) -> f64 {
        match *self {
            SettingValue::Float(v) => v,
            SettingValue::Int(v) => v as f64,
            SettingValue::Bool(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Settings for the dual (MILP master) problem.
#[derive(Debug, Clone)]
pub struct DualSettings {
    /// Cut generation strategy.
    pub cut_strategy: CutStrategy,

    /// Maximum hyperplanes a point selector may enqueue per invocation.
    pub max_hyperplanes_per_iteration: usize,

    /// Maximum lazy hyperplanes generated at relaxation nodes per iteration.
    pub relaxation_max_lazy_constraints: usize,

    /// Flush pending integer (no-good) cuts after each integer solution.
    pub use_integer_cuts: bool,

    /// Added to the primal bound when setting the MILP objective cutoff.
    pub cutoff_tolerance: f64,

    /// Magnitude used in place of infinite variable bounds.
    pub unbounded_variable_bound: f64,

    /// Divisor applied to `unbounded_variable_bound` when retrying an
    /// unbounded dual problem.
    pub unbounded_bound_scaling: f64,

    /// Bound on the auxiliary objective variable when an infeasible dual
    /// problem with a quadratic-as-nonlinear objective is retried.
    pub auxiliary_objective_bound: f64,

    /// Maximum number of generated hyperplanes relaxed by infeasibility repair.
    pub repair_max_constraints: usize,

    /// Multiplier on the elastic slack when a repaired row is relaxed.
    pub repair_slack_factor: f64,
}

/// Settings for the ECP point selector.
#[derive(Debug, Clone)]
pub struct EcpSettings {
    /// Constraints with violation at least this fraction of the maximum
    /// violation are linearized.
    pub constraint_selection_factor: f64,
}

/// Settings for the ESH point selector and its line search.
#[derive(Debug, Clone)]
pub struct EshSettings {
    /// Maximum line search iterations per candidate.
    pub linesearch_max_iterations: usize,

    /// Bracket width (in the segment parameter) at which the search stops.
    pub linesearch_lambda_tolerance: f64,

    /// Normalized deviation at the exterior end at which the search stops.
    pub linesearch_constraint_tolerance: f64,

    /// Interior point update rule.
    pub interior_point_update: InteriorPointUpdate,
}

/// Settings for primal heuristics driven by the callback.
#[derive(Debug, Clone)]
pub struct PrimalSettings {
    /// Search between the interior point and integer candidates for
    /// feasible primal points.
    pub use_linesearch: bool,

    /// Fixed-integer NLP candidate strategy.
    pub fixed_nlp: FixedNlpStrategy,
}

/// Termination criteria.
#[derive(Debug, Clone)]
pub struct TerminationSettings {
    /// Absolute objective gap tolerance.
    pub absolute_gap_tolerance: f64,

    /// Relative objective gap tolerance.
    /// Met when |primal - dual| / max(|primal|, 1e-10) <= tolerance.
    pub relative_gap_tolerance: f64,

    /// Nonlinear constraint tolerance (normalized).
    pub constraint_tolerance: f64,

    /// Maximum number of iterations.
    pub iteration_limit: usize,

    /// Wall clock limit (None = unlimited).
    pub time_limit: Option<Duration>,
}

/// Output settings.
#[derive(Debug, Clone)]
pub struct OutputSettings {
    /// Emit one info line per closed iteration.
    pub iteration_report: bool,
}

/// All settings for one solve session.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Dual problem settings.
    pub dual: DualSettings,
    /// ECP selector settings.
    pub ecp: EcpSettings,
    /// ESH selector settings.
    pub esh: EshSettings,
    /// Primal heuristic settings.
    pub primal: PrimalSettings,
    /// Termination settings.
    pub termination: TerminationSettings,
    /// Output settings.
    pub output: OutputSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Dual
            dual: DualSettings {
                cut_strategy: CutStrategy::default(),
                max_hyperplanes_per_iteration: 200,
                relaxation_max_lazy_constraints: 0,
                use_integer_cuts: true,
                cutoff_tolerance: 1e-5,
                unbounded_variable_bound: 1e50,
                unbounded_bound_scaling: 1e31,
                auxiliary_objective_bound: 1e9,
                repair_max_constraints: 100,
                repair_slack_factor: 1.5,
            },

            // ECP
            ecp: EcpSettings {
                constraint_selection_factor: 0.25,
            },

            // ESH
            esh: EshSettings {
                linesearch_max_iterations: 100,
                linesearch_lambda_tolerance: 1e-12,
                linesearch_constraint_tolerance: 1e-8,
                interior_point_update: InteriorPointUpdate::default(),
            },

            // Primal
            primal: PrimalSettings {
                use_linesearch: true,
                fixed_nlp: FixedNlpStrategy::default(),
            },

            // Termination
            termination: TerminationSettings {
                absolute_gap_tolerance: 1e-3,
                relative_gap_tolerance: 1e-3,
                constraint_tolerance: 1e-8,
                iteration_limit: 200_000,
                time_limit: None,
            },

            // Output
            output: OutputSettings {
                iteration_report: true,
            },
        }
    }
}

impl Settings {
    /// Settings for the ECP strategy, otherwise default.
    pub fn ecp() -> Self {
        let mut s = Self::default();
        s.dual.cut_strategy = CutStrategy::Ecp;
        s
    }

    /// Set the cut strategy.
    pub fn with_cut_strategy(mut self, strategy: CutStrategy) -> Self {
        self.dual.cut_strategy = strategy;
        self
    }

    /// Set the time limit in seconds.
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.termination.time_limit = Some(Duration::from_secs_f64(seconds.max(0.0)));
        self
    }

    /// Set the iteration limit.
    pub fn with_iteration_limit(mut self, limit: usize) -> Self {
        self.termination.iteration_limit = limit;
        self
    }

    /// Set both objective gap tolerances.
    pub fn with_gap_tolerances(mut self, absolute: f64, relative: f64) -> Self {
        self.termination.absolute_gap_tolerance = absolute;
        self.termination.relative_gap_tolerance = relative;
        self
    }

    /// Set the nonlinear constraint tolerance.
    pub fn with_constraint_tolerance(mut self, tol: f64) -> Self {
        self.termination.constraint_tolerance = tol;
        self
    }

    /// Set the per-invocation hyperplane cap.
    pub fn with_max_hyperplanes(mut self, max: usize) -> Self {
        self.dual.max_hyperplanes_per_iteration = max;
        self
    }

    /// Read-only key/category lookup.
    ///
    /// Keys are the field names of the category structs. Enum-valued
    /// settings are reported by their discriminant.
    pub fn value(&self, category: &str, key: &str) -> Option<SettingValue> {
        use SettingValue::{Bool, Float, Int};

        let v = match (category, key) {
            ("dual", "cut_strategy") => Int(match self.dual.cut_strategy {
                CutStrategy::Ecp => 0,
                CutStrategy::Esh => 1,
            }),
            ("dual", "max_hyperplanes_per_iteration") => {
                Int(self.dual.max_hyperplanes_per_iteration as i64)
            }
            ("dual", "relaxation_max_lazy_constraints") => {
                Int(self.dual.relaxation_max_lazy_constraints as i64)
            }
            ("dual", "use_integer_cuts") => Bool(self.dual.use_integer_cuts),
            ("dual", "cutoff_tolerance") => Float(self.dual.cutoff_tolerance),
            ("dual", "unbounded_variable_bound") => Float(self.dual.unbounded_variable_bound),
            ("dual", "unbounded_bound_scaling") => Float(self.dual.unbounded_bound_scaling),
            ("dual", "auxiliary_objective_bound") => Float(self.dual.auxiliary_objective_bound),
            ("dual", "repair_max_constraints") => Int(self.dual.repair_max_constraints as i64),
            ("dual", "repair_slack_factor") => Float(self.dual.repair_slack_factor),
            ("ecp", "constraint_selection_factor") => {
                Float(self.ecp.constraint_selection_factor)
            }
            ("esh", "linesearch_max_iterations") => {
                Int(self.esh.linesearch_max_iterations as i64)
            }
            ("esh", "linesearch_lambda_tolerance") => {
                Float(self.esh.linesearch_lambda_tolerance)
            }
            ("esh", "linesearch_constraint_tolerance") => {
                Float(self.esh.linesearch_constraint_tolerance)
            }
            ("esh", "interior_point_update") => Int(match self.esh.interior_point_update {
                InteriorPointUpdate::KeepOriginal => 0,
                InteriorPointUpdate::Replace => 1,
                InteriorPointUpdate::Average => 2,
            }),
            ("primal", "use_linesearch") => Bool(self.primal.use_linesearch),
            ("termination", "absolute_gap_tolerance") => {
                Float(self.termination.absolute_gap_tolerance)
            }
            ("termination", "relative_gap_tolerance") => {
                Float(self.termination.relative_gap_tolerance)
            }
            ("termination", "constraint_tolerance") => {
                Float(self.termination.constraint_tolerance)
            }
            ("termination", "iteration_limit") => Int(self.termination.iteration_limit as i64),
            ("termination", "time_limit") => {
                Float(self.termination.time_limit.map_or(f64::INFINITY, |d| d.as_secs_f64()))
            }
            ("output", "iteration_report") => Bool(self.output.iteration_report),
            _ => return None,
        };

        Some(v)
    }

    /// Check that every setting is within its admissible range.
    pub fn validate(&self) -> EshResult<()> {
        fn invalid(category: &'static str, key: &'static str, message: &str) -> EshError {
            EshError::InvalidSettings {
                category,
                key,
                message: message.to_string(),
            }
        }

        let f = self.ecp.constraint_selection_factor;
        if !(f > 0.0 && f <= 1.0) {
            return Err(invalid("ecp", "constraint_selection_factor", "must be in (0, 1]"));
        }
        if self.dual.max_hyperplanes_per_iteration == 0 {
            return Err(invalid("dual", "max_hyperplanes_per_iteration", "must be positive"));
        }
        if !(self.dual.unbounded_bound_scaling >= 1.0) {
            return Err(invalid("dual", "unbounded_bound_scaling", "must be at least 1"));
        }
        if !(self.dual.unbounded_variable_bound > 0.0) {
            return Err(invalid("dual", "unbounded_variable_bound", "must be positive"));
        }
        if !(self.dual.repair_slack_factor >= 1.0) {
            return Err(invalid("dual", "repair_slack_factor", "must be at least 1"));
        }
        if !(self.esh.linesearch_lambda_tolerance > 0.0) {
            return Err(invalid("esh", "linesearch_lambda_tolerance", "must be positive"));
        }
        if !(self.esh.linesearch_constraint_tolerance >= 0.0) {
            return Err(invalid("esh", "linesearch_constraint_tolerance", "must be nonnegative"));
        }
        if !(self.termination.absolute_gap_tolerance >= 0.0) {
            return Err(invalid("termination", "absolute_gap_tolerance", "must be nonnegative"));
        }
        if !(self.termination.relative_gap_tolerance >= 0.0) {
            return Err(invalid("termination", "relative_gap_tolerance", "must be nonnegative"));
        }
        if !(self.termination.constraint_tolerance >= 0.0) {
            return Err(invalid("termination", "constraint_tolerance", "must be nonnegative"));
        }
        if let FixedNlpStrategy::Frequency(0) = self.primal.fixed_nlp {
            return Err(invalid("primal", "fixed_nlp", "frequency must be positive"));
        }

        Ok(())
    }
}
