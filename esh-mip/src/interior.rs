//! Interior point used as the anchor of ESH line searches.

use esh_core::{Environment, InteriorPointUpdate, SolutionPoint};

/// Keeps the current strictly feasible reference point.
///
/// The first point usually comes from an external minimax NLP solve and is
/// installed with [`InteriorPointTracker::set`]. Later, primal solutions
/// that lie deeper inside the nonlinear feasible region can replace it or
/// be averaged into it.
#[derive(Debug, Clone, Default)]
pub struct InteriorPointTracker {
    current: Option<SolutionPoint>,
    last_candidate: Option<Vec<f64>>,
}

impl InteriorPointTracker {
    /// Tracker without a point.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an interior point.
    pub fn set(&mut self, point: SolutionPoint) {
        self.current = Some(point);
    }

    /// The current interior point.
    pub fn current(&self) -> Option<&SolutionPoint> {
        self.current.as_ref()
    }

    /// Whether an interior point is known.
    pub fn has_point(&self) -> bool {
        self.current.is_some()
    }

    /// Drop the interior point.
    pub fn clear(&mut self) {
        self.current = None;
        self.last_candidate = None;
    }

    /// Refresh from the best primal solution. Returns true if the point changed.
    pub fn run(&mut self, env: &Environment) -> bool {
        let rule = env.settings.esh.interior_point_update;
        if rule == InteriorPointUpdate::KeepOriginal {
            return false;
        }

        let Some(primal) = env.results.bounds.primal_solution() else {
            return false;
        };
        let candidate = &primal.point;

        if self.last_candidate.as_deref() == Some(&candidate.point[..]) {
            return false;
        }
        self.last_candidate = Some(candidate.point.clone());

        let Some(deviation) = candidate.max_deviation else {
            return false;
        };
        if !(deviation.value < 0.0) {
            return false;
        }
        if let Some(current) = &self.current {
            if deviation.value >= current.max_deviation_value() {
                return false;
            }
        }

        let updated = match (&self.current, rule) {
            (Some(current), InteriorPointUpdate::Average) => {
                let midpoint: Vec<f64> = current
                    .point
                    .iter()
                    .zip(&candidate.point)
                    .map(|(a, b)| 0.5 * (a + b))
                    .collect();
                let max_deviation = env.problem.max_deviation(&midpoint);

                if max_deviation.map_or(false, |d| d.value < 0.0) {
                    SolutionPoint {
                        objective_value: env.problem.objective_value(&midpoint),
                        max_deviation,
                        point: midpoint,
                        iteration_found: candidate.iteration_found,
                    }
                } else {
                    candidate.clone()
                }
            }
            _ => candidate.clone(),
        };

        log::debug!(
            "Interior point updated, max deviation {:.3e}",
            updated.max_deviation_value()
        );
        self.current = Some(updated);
        true
    }
}
