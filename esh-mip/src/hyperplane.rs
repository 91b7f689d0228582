//! Hyperplane data model and the generated hyperplane ledger.

/// What a hyperplane linearizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HyperplaneTarget {
    /// Nonlinear constraint by index.
    Constraint(usize),
    /// The objective epigraph constraint f(x) - mu <= 0.
    Objective,
}

/// How the generation point of a hyperplane was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HyperplaneSource {
    /// Best solution of a MILP iteration.
    MipOptimalSolutionPoint,
    /// Further solution pool point of a MILP iteration.
    MipSolutionPoolSolutionPoint,
    /// Point of an LP relaxation.
    LpRelaxedSolutionPoint,
    /// Line search from the best MILP solution.
    MipOptimalLinesearch,
    /// Line search from a solution pool point.
    MipSolutionPoolLinesearch,
    /// Line search from an LP relaxation point.
    LpRelaxedLinesearch,
    /// Projection onto the objective epigraph.
    ObjectiveLinesearch,
    /// Interior point search.
    InteriorPointSearch,
}

impl HyperplaneSource {
    /// Tag for the `position`-th point of an iteration.
    ///
    /// The first point of a MILP iteration is its optimal point, later ones
    /// come from the solution pool. LP iterations have one kind of point.
    pub fn for_solution_point(position: usize, is_milp: bool, linesearch: bool) -> Self {
        use HyperplaneSource::*;

        match (is_milp, position == 0, linesearch) {
            (true, true, false) => MipOptimalSolutionPoint,
            (true, false, false) => MipSolutionPoolSolutionPoint,
            (false, _, false) => LpRelaxedSolutionPoint,
            (true, true, true) => MipOptimalLinesearch,
            (true, false, true) => MipSolutionPoolLinesearch,
            (false, _, true) => LpRelaxedLinesearch,
        }
    }

    /// Whether the generation point came from a line search.
    pub fn is_linesearch(&self) -> bool {
        matches!(
            self,
            HyperplaneSource::MipOptimalLinesearch
                | HyperplaneSource::MipSolutionPoolLinesearch
                | HyperplaneSource::LpRelaxedLinesearch
                | HyperplaneSource::ObjectiveLinesearch
        )
    }
}

/// A pending linearization request.
#[derive(Debug, Clone, PartialEq)]
pub struct Hyperplane {
    /// What to linearize.
    pub source_constraint: HyperplaneTarget,

    /// Point to linearize at.
    pub generated_point: Vec<f64>,

    /// Origin of the point.
    pub source: HyperplaneSource,
}

/// A hyperplane that made it into the dual problem.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedHyperplane {
    /// Sequence-assigned row id of the cut.
    pub generated_constraint_index: usize,

    /// What was linearized.
    pub source_constraint: HyperplaneTarget,

    /// Point linearized at.
    pub generated_point: Vec<f64>,

    /// Origin of the point.
    pub source: HyperplaneSource,

    /// Iteration in which the cut was added.
    pub generated_iteration: usize,

    /// Added as a lazy constraint inside the callback.
    pub is_lazy: bool,

    /// Removed from the dual problem.
    pub is_removed: bool,

    /// The linearized function is convex, so the cut is globally valid.
    pub is_source_convex: bool,

    /// Model row in the backend, for cuts added as ordinary rows.
    pub backend_row: Option<usize>,
}

/// Append-only record of generated hyperplanes.
///
/// Row ids are assigned in insertion order and never reused. Only the
/// removal flag of an entry can change after it is recorded.
#[derive(Debug, Clone, Default)]
pub struct HyperplaneLedger {
    entries: Vec<GeneratedHyperplane>,
    next_row: usize,
}

impl HyperplaneLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hyperplane and return its row id.
    pub fn record(
        &mut self,
        hyperplane: Hyperplane,
        iteration: usize,
        is_lazy: bool,
        is_source_convex: bool,
        backend_row: Option<usize>,
    ) -> usize {
        let id = self.next_row;
        self.next_row += 1;

        self.entries.push(GeneratedHyperplane {
            generated_constraint_index: id,
            source_constraint: hyperplane.source_constraint,
            generated_point: hyperplane.generated_point,
            source: hyperplane.source,
            generated_iteration: iteration,
            is_lazy,
            is_removed: false,
            is_source_convex,
            backend_row,
        });
        id
    }

    /// Flag a hyperplane as removed. Returns false for unknown ids.
    pub fn mark_removed(&mut self, id: usize) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|h| h.generated_constraint_index == id)
        {
            Some(h) => {
                h.is_removed = true;
                true
            }
            None => false,
        }
    }

    /// Entry by row id.
    pub fn get(&self, id: usize) -> Option<&GeneratedHyperplane> {
        self.entries.iter().find(|h| h.generated_constraint_index == id)
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[GeneratedHyperplane] {
        &self.entries
    }

    /// Number of recorded hyperplanes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Nothing recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Hyperplanes waiting to be turned into constraints.
#[derive(Debug, Clone, Default)]
pub struct HyperplaneWaitingList {
    items: Vec<Hyperplane>,
}

impl HyperplaneWaitingList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a hyperplane.
    pub fn push(&mut self, hyperplane: Hyperplane) {
        self.items.push(hyperplane);
    }

    /// Take every queued hyperplane, leaving the list empty.
    pub fn drain(&mut self) -> Vec<Hyperplane> {
        std::mem::take(&mut self.items)
    }

    /// Queued hyperplanes.
    pub fn iter(&self) -> impl Iterator<Item = &Hyperplane> {
        self.items.iter()
    }

    /// Number queued.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Nothing queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
