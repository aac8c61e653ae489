//! System descriptors.
//!
//! Immutable records tying together the dynamics matrix, the initial set
//! and the nondeterministic input:
//!
//! ```text
//!   continuous:  x'(t) = A x(t) + u(t)       u(t) ∈ U
//!   discrete:    x[k+1] = Φ x[k] + w[k]      w[k] ∈ V
//! ```

use crate::inputs::{InputSequence, NondeterministicInput};
use crate::linalg::{MatOp, MatrixExp};
use crate::sets::{ConvexSet, SetExpr};
use crate::{E, ReachError, dim_error};

/// Common queries over continuous and discrete descriptors.
pub trait SystemDescriptor {
    /// State-space dimension (rows of the dynamics matrix).
    fn dim(&self) -> usize;
}

/// A continuous-time affine system `x' = A x + u`, `x(0) ∈ X0`, `u ∈ U`.
#[derive(Debug, Clone)]
pub struct ContinuousSystem {
    a: MatOp,
    x0: SetExpr,
    u: NondeterministicInput,
}

impl ContinuousSystem {
    /// System without input: `U` is the single-`VoidSet` placeholder.
    pub fn homogeneous(a: MatOp, x0: SetExpr) -> Result<Self, ReachError> {
        let n = a.nrows();
        Self::new(a, x0, NondeterministicInput::constant(SetExpr::void(n)))
    }

    /// System with one constant input set.
    pub fn with_constant_input(a: MatOp, x0: SetExpr, u: SetExpr) -> Result<Self, ReachError> {
        Self::new(a, x0, NondeterministicInput::constant(u))
    }

    /// System with a time-varying input sequence.
    pub fn with_varying_input(a: MatOp, x0: SetExpr, sets: Vec<SetExpr>) -> Result<Self, ReachError> {
        let n = a.nrows();
        if sets.is_empty() {
            return Err(dim_error("varying input needs at least one set"));
        }
        if let Some(bad) = sets.iter().find(|s| s.dim() != n) {
            return Err(dim_error(format!(
                "varying input set has dimension {}, system has {n}",
                bad.dim()
            )));
        }
        Self::new(a, x0, NondeterministicInput::varying(sets))
    }

    pub fn new(a: MatOp, x0: SetExpr, u: NondeterministicInput) -> Result<Self, ReachError> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(dim_error(format!("system matrix is {}x{}, expected square", n, a.ncols())));
        }
        if x0.dim() != n {
            return Err(dim_error(format!("initial set has dimension {}, system has {}", x0.dim(), n)));
        }
        if u.dim() != n {
            return Err(dim_error(format!("input sets have dimension {}, system has {}", u.dim(), n)));
        }
        Ok(Self { a, x0, u })
    }

    pub fn matrix(&self) -> &MatOp {
        &self.a
    }

    pub fn initial_set(&self) -> &SetExpr {
        &self.x0
    }

    pub fn inputs(&self) -> &NondeterministicInput {
        &self.u
    }
}

impl SystemDescriptor for ContinuousSystem {
    fn dim(&self) -> usize {
        self.a.nrows()
    }
}

/// A discrete-time affine abstraction `x[k+1] = Φ x[k] + w[k]` obtained
/// from a continuous system with step size `δ`.
#[derive(Debug, Clone)]
pub struct DiscreteSystem {
    phi: MatrixExp,
    x0: SetExpr,
    u: NondeterministicInput,
    delta: E,
}

impl DiscreteSystem {
    pub fn new(
        phi: MatrixExp,
        x0: SetExpr,
        u: NondeterministicInput,
        delta: E,
    ) -> Result<Self, ReachError> {
        if delta < 0.0 {
            return Err(ReachError::Domain { delta });
        }
        let n = phi.dim();
        if x0.dim() != n {
            return Err(dim_error(format!("initial set has dimension {}, system has {}", x0.dim(), n)));
        }
        if u.dim() != n {
            return Err(dim_error(format!("input sets have dimension {}, system has {}", u.dim(), n)));
        }
        Ok(Self { phi, x0, u, delta })
    }

    /// Abstraction without input.
    pub fn homogeneous(phi: MatrixExp, x0: SetExpr, delta: E) -> Result<Self, ReachError> {
        let n = phi.dim();
        Self::new(phi, x0, NondeterministicInput::constant(SetExpr::void(n)), delta)
    }

    pub fn matrix(&self) -> &MatrixExp {
        &self.phi
    }

    pub fn initial_set(&self) -> &SetExpr {
        &self.x0
    }

    pub fn inputs(&self) -> &NondeterministicInput {
        &self.u
    }

    pub fn step_size(&self) -> E {
        self.delta
    }
}

impl SystemDescriptor for DiscreteSystem {
    fn dim(&self) -> usize {
        self.phi.dim()
    }
}

/// A system paired with its role as an initial-value problem.
#[derive(Debug, Clone)]
pub struct InitialValueProblem<S> {
    system: S,
}

impl<S: SystemDescriptor> InitialValueProblem<S> {
    pub fn new(system: S) -> Self {
        Self { system }
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    pub fn dim(&self) -> usize {
        self.system.dim()
    }
}
