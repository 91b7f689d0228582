//! Dual (MILP master) layer of the ESH/ECP outer approximation.
//!
//! Provides:
//! - **Backend capability traits**: [`MipSolverBackend`] for the MILP engine
//!   and [`CallbackContext`] for the reason-specific reads and writes the
//!   engine offers inside its callback
//! - **Hyperplanes**: closed source tags, the append-only
//!   [`HyperplaneLedger`] and the per-invocation waiting list
//! - **Point selectors**: ECP, ESH (line search to the boundary) and the
//!   objective epigraph pass
//! - **Lazy-constraint callback**: the state machine that turns candidate
//!   points reported by the engine into lazy cuts and bound updates
//! - **Dual solver** and the single-tree [`EshSolver`] driver

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod builder;
pub mod callback;
pub mod dual;
pub mod error;
pub mod hyperplane;
pub mod interior;
pub mod primal;
pub mod select;
pub mod solver;

pub use backend::{
    CallbackContext, CallbackReason, ElasticSolution, LazyConstraintHandler, MipSolverBackend,
};
pub use builder::{HyperplaneBuilder, HyperplaneTerms};
pub use callback::{CallbackState, LazyConstraintCallback};
pub use dual::{CutStore, DualSolver};
pub use error::{BackendError, BackendResult, MipError, MipResult};
pub use hyperplane::{
    GeneratedHyperplane, Hyperplane, HyperplaneLedger, HyperplaneSource, HyperplaneTarget,
    HyperplaneWaitingList,
};
pub use interior::InteriorPointTracker;
pub use primal::{FixedNlpQueue, FixedNlpSolver, PrimalLinesearch};
pub use select::{EcpSelector, EshSelector, HyperplaneSelector, ObjectiveSelector, PointSelector};
pub use solver::{EshSolver, SolveReport};
