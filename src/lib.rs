//! # flowpipe
//!
//! Set-based reachability analysis for linear affine dynamical systems with
//! nondeterministic bounded inputs:
//!
//! ```text
//!   x'(t) = A x(t) + u(t),    x(0) ∈ X0,    u(t) ∈ U(t)
//! ```
//!
//! The crate discretizes the continuous system into an abstraction
//! `(Φ, Ω0, V)` that over-approximates every trajectory on `[0, N·δ]`
//! ([`discretize`]), and decides whether a safety property holds along a
//! block-wise projection of that abstraction ([`check_blocks`]), reporting
//! the earliest time index at which it is violated (`0` means safe).
//!
//! Sets are manipulated lazily: Minkowski sums, linear maps, convex hulls
//! and interval hulls are expression trees evaluated on demand through
//! support-function queries ([`sets`]). The state-transition matrix can be
//! kept dense, sparse, or as a deferred matrix exponential that is never
//! materialized ([`linalg::LazyMatrixExp`]).

use derive_more::{Display, Error};

/// Scalar element type used throughout the crate.
pub type E = f64;
/// Index type used for sparse matrices.
pub type I = usize;

pub mod discretize;
pub mod inputs;
pub mod linalg;
pub mod progress;
pub mod reach;
pub mod sets;
pub mod system;

#[cfg(test)]
pub mod tests;

pub use discretize::{ApproxModel, DiscretizationOptions, discretize};
pub use inputs::NondeterministicInput;
pub use progress::{BarProgress, NoOpProgress, Progress};
pub use reach::{Block, Partition, Predicate, Property, SupportBound, check_blocks, decompose};
pub use sets::SetExpr;
pub use system::{ContinuousSystem, DiscreteSystem, InitialValueProblem};

use crate::linalg::solver::FactorizationError;

/// Errors reported by the discretization and reachability entry points.
#[derive(Debug, Display, Error, PartialEq)]
pub enum ReachError {
    /// A negative step size was passed to a discrete system.
    #[display("invalid step size {delta}: must be non-negative")]
    Domain { delta: E },

    /// The requested approximation model does not exist.
    #[display("unknown approximation model {name:?}")]
    InvalidApproxModel { name: String },

    /// The requested code path has no implementation.
    #[display("not implemented: {feature}")]
    NotImplemented { feature: &'static str },

    /// Operand shapes are inconsistent.
    #[display("dimension mismatch: {message}")]
    DimensionMismatch { message: String },

    /// A linear solve inside a matrix-exponential routine failed.
    Factorization(FactorizationError),
}

impl From<FactorizationError> for ReachError {
    fn from(err: FactorizationError) -> Self {
        ReachError::Factorization(err)
    }
}

pub(crate) fn dim_error(message: impl Into<String>) -> ReachError {
    ReachError::DimensionMismatch {
        message: message.into(),
    }
}
