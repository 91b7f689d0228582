//! Root finding along the segment between an interior and an exterior point.
//!
//! The ESH selector projects infeasible candidates onto the boundary of the
//! nonlinear feasible region by searching for the zero of
//!
//! ```text
//! h(t) = max_j g_j(interior + t (exterior - interior)) / max(1, |ub_j|),  t in [0, 1]
//! ```
//!
//! over a set of constraints. The bracket `[t_in, t_out]` always has
//! `h(t_in) <= 0 < h(t_out)` when the search starts from a feasible
//! interior point.

use crate::error::{EshError, EshResult};
use crate::model::{NumericConstraintValue, Problem};

/// Outcome of a line search.
#[derive(Debug, Clone, PartialEq)]
pub struct LinesearchResult {
    /// Feasible end of the final bracket.
    pub interior: Vec<f64>,

    /// Infeasible end of the final bracket; the boundary point.
    pub exterior: Vec<f64>,

    /// Number of function evaluations inside the bracket.
    pub iterations: usize,

    /// Final bracket in the segment parameter.
    pub bracket: (f64, f64),

    /// Most deviating constraint at the exterior end, if requested.
    pub most_deviating: Option<NumericConstraintValue>,
}

impl LinesearchResult {
    /// Width of the final bracket.
    pub fn bracket_width(&self) -> f64 {
        self.bracket.1 - self.bracket.0
    }
}

/// A root finder on the interior/exterior segment.
pub trait LinesearchMethod {
    /// Find the boundary crossing between `interior` and `exterior`.
    ///
    /// Stops when the bracket is narrower than `tol_abs` (in the segment
    /// parameter), when the normalized deviation at the exterior end is at
    /// most `tol_rel`, or after `max_iterations` evaluations.
    #[allow(clippy::too_many_arguments)]
    fn find_zero(
        &self,
        problem: &Problem,
        interior: &[f64],
        exterior: &[f64],
        max_iterations: usize,
        tol_abs: f64,
        tol_rel: f64,
        constraints: &[usize],
        return_most_deviating: bool,
    ) -> EshResult<LinesearchResult>;
}

/// Illinois false position with a bisection fallback.
///
/// Each new probe is clamped strictly inside the bracket, so the bracket
/// width strictly decreases every iteration. When the same end has been
/// retained three times in a row the method switches to bisection until
/// the other end moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct FalsePositionLinesearch;

/// Retained-end streak after which the probe is the midpoint.
const STALL_LIMIT: usize = 3;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Moved {
    None,
    Interior,
    Exterior,
}

fn segment_point(interior: &[f64], exterior: &[f64], t: f64) -> Vec<f64> {
    interior
        .iter()
        .zip(exterior)
        .map(|(a, b)| a + t * (b - a))
        .collect()
}

impl LinesearchMethod for FalsePositionLinesearch {
    fn find_zero(
        &self,
        problem: &Problem,
        interior: &[f64],
        exterior: &[f64],
        max_iterations: usize,
        tol_abs: f64,
        tol_rel: f64,
        constraints: &[usize],
        return_most_deviating: bool,
    ) -> EshResult<LinesearchResult> {
        problem.check_dimension(interior)?;
        problem.check_dimension(exterior)?;
        if constraints.is_empty() {
            return Err(EshError::Linesearch("no constraints to search".to_string()));
        }

        let h = |t: f64| -> EshResult<f64> {
            let x = segment_point(interior, exterior, t);
            problem
                .max_numeric_constraint_value(&x, constraints)
                .map(|v| v.normalized_value)
                .ok_or_else(|| EshError::Linesearch("unknown constraint indices".to_string()))
        };

        let most_deviating_at = |x: &[f64]| {
            if return_most_deviating {
                problem.max_numeric_constraint_value(x, constraints)
            } else {
                None
            }
        };

        let mut f_out = h(1.0)?;
        if f_out <= 0.0 {
            log::trace!("Line search: exterior point is feasible ({:.3e})", f_out);
            return Ok(LinesearchResult {
                interior: interior.to_vec(),
                exterior: exterior.to_vec(),
                iterations: 0,
                bracket: (0.0, 1.0),
                most_deviating: most_deviating_at(exterior),
            });
        }

        let mut f_in = h(0.0)?;
        let bisect_only = !(f_in <= 0.0) || !f_in.is_finite() || !f_out.is_finite();
        if f_in > 0.0 {
            log::warn!(
                "Line search: interior point is infeasible ({:.3e}), using bisection",
                f_in
            );
        }

        let (mut t_in, mut t_out) = (0.0_f64, 1.0_f64);
        // Illinois-weighted end values
        let (mut w_in, mut w_out) = (f_in, f_out);
        let mut moved = Moved::None;
        let mut streak = 0usize;
        let mut iterations = 0usize;

        while iterations < max_iterations {
            if t_out - t_in <= tol_abs || f_out <= tol_rel {
                break;
            }

            let mid = 0.5 * (t_in + t_out);
            let mut t = if bisect_only || streak >= STALL_LIMIT {
                mid
            } else {
                t_out - w_out * (t_out - t_in) / (w_out - w_in)
            };
            if !(t > t_in && t < t_out) {
                t = mid;
            }
            if !(t > t_in && t < t_out) {
                // Bracket is down to adjacent floats
                break;
            }

            let value = h(t)?;
            iterations += 1;

            if value <= 0.0 {
                t_in = t;
                f_in = value;
                w_in = value;
                if moved == Moved::Interior {
                    w_out *= 0.5;
                    streak += 1;
                } else {
                    streak = 1;
                }
                moved = Moved::Interior;
            } else {
                t_out = t;
                f_out = value;
                w_out = value;
                if moved == Moved::Exterior {
                    w_in *= 0.5;
                    streak += 1;
                } else {
                    streak = 1;
                }
                moved = Moved::Exterior;
            }
        }

        log::trace!(
            "Line search: {} iterations, bracket [{:.6e}, {:.6e}], h_in {:.3e}, h_out {:.3e}",
            iterations,
            t_in,
            t_out,
            f_in,
            f_out
        );

        let exterior_end = segment_point(interior, exterior, t_out);
        let most_deviating = most_deviating_at(&exterior_end);

        Ok(LinesearchResult {
            interior: segment_point(interior, exterior, t_in),
            exterior: exterior_end,
            iterations,
            bracket: (t_in, t_out),
            most_deviating,
        })
    }
}
