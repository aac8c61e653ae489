//! Lazy operation nodes.
//!
//! Each node owns its operands behind [`Arc`], so shared subexpressions
//! (the same input hull reused across steps, the same initial blocks in
//! every Minkowski accumulation) are reference-counted rather than copied.

use std::sync::{Arc, OnceLock};

use faer::{Col, ColRef};

use crate::E;
use crate::linalg::{LazyMatrixExp, MatOp};
use crate::sets::{ConvexSet, SetExpr, axis_radius};

/// `M·S`; the support query maps the direction through `Mᵀ`.
#[derive(Debug, Clone)]
pub struct LinearMap {
    pub matrix: MatOp,
    pub set: Arc<SetExpr>,
}

impl ConvexSet for LinearMap {
    fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    fn support(&self, d: ColRef<'_, E>) -> E {
        let mapped = self.matrix.transpose_apply(d);
        self.set.support(mapped.as_ref())
    }
}

/// `λ·S`.
#[derive(Debug, Clone)]
pub struct Scale {
    pub factor: E,
    pub set: Arc<SetExpr>,
}

impl ConvexSet for Scale {
    fn dim(&self) -> usize {
        self.set.dim()
    }

    fn support(&self, d: ColRef<'_, E>) -> E {
        let scaled = Col::from_fn(d.nrows(), |i| self.factor * d[i]);
        self.set.support(scaled.as_ref())
    }
}

/// `A ⊕ B`.
#[derive(Debug, Clone)]
pub struct MinkowskiSum {
    pub a: Arc<SetExpr>,
    pub b: Arc<SetExpr>,
}

impl ConvexSet for MinkowskiSum {
    fn dim(&self) -> usize {
        self.a.dim()
    }

    fn support(&self, d: ColRef<'_, E>) -> E {
        self.a.support(d) + self.b.support(d)
    }
}

/// `S₁ ⊕ ⋯ ⊕ Sₘ` with pre-sizable storage for iterative accumulation.
#[derive(Debug, Clone)]
pub struct MinkowskiSumArray {
    pub sets: Vec<Arc<SetExpr>>,
}

impl MinkowskiSumArray {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sets: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, set: Arc<SetExpr>) {
        self.sets.push(set);
    }
}

impl ConvexSet for MinkowskiSumArray {
    fn dim(&self) -> usize {
        self.sets.first().map_or(0, |s| s.dim())
    }

    fn support(&self, d: ColRef<'_, E>) -> E {
        self.sets.iter().map(|s| s.support(d)).sum()
    }
}

/// `S₁ × ⋯ × Sₘ`; the direction splits block-wise.
#[derive(Debug, Clone)]
pub struct CartesianProductArray {
    pub sets: Vec<Arc<SetExpr>>,
}

impl ConvexSet for CartesianProductArray {
    fn dim(&self) -> usize {
        self.sets.iter().map(|s| s.dim()).sum()
    }

    fn support(&self, d: ColRef<'_, E>) -> E {
        let mut acc = 0.0;
        let mut offset = 0;
        for s in &self.sets {
            let len = s.dim();
            let segment = Col::from_fn(len, |i| d[offset + i]);
            acc += s.support(segment.as_ref());
            offset += len;
        }
        acc
    }
}

/// `CH(A, B)`; the support is the pointwise maximum.
#[derive(Debug, Clone)]
pub struct ConvexHull {
    pub a: Arc<SetExpr>,
    pub b: Arc<SetExpr>,
}

impl ConvexSet for ConvexHull {
    fn dim(&self) -> usize {
        self.a.dim()
    }

    fn support(&self, d: ColRef<'_, E>) -> E {
        E::max(self.a.support(d), self.b.support(d))
    }
}

/// Lazy symmetric interval hull. The per-axis radii require `2n` support
/// queries against the wrapped set; they are resolved on first use and
/// cached for the lifetime of the node.
#[derive(Debug, Clone)]
pub struct SymmetricIntervalHull {
    set: Arc<SetExpr>,
    radius: OnceLock<Col<E>>,
}

impl SymmetricIntervalHull {
    pub fn new(set: Arc<SetExpr>) -> Self {
        Self {
            set,
            radius: OnceLock::new(),
        }
    }

    pub fn set(&self) -> &SetExpr {
        &self.set
    }

    fn radius(&self) -> &Col<E> {
        self.radius.get_or_init(|| {
            let n = self.set.dim();
            Col::from_fn(n, |i| axis_radius(&self.set, i))
        })
    }
}

impl ConvexSet for SymmetricIntervalHull {
    fn dim(&self) -> usize {
        self.set.dim()
    }

    fn support(&self, d: ColRef<'_, E>) -> E {
        let radius = self.radius();
        let mut acc = 0.0;
        for i in 0..radius.nrows() {
            acc += d[i].abs() * radius[i];
        }
        acc
    }
}

/// `exp(M)·S` where the exponential is never materialized; directions are
/// mapped through the transposed exponential action.
#[derive(Debug, Clone)]
pub struct ExponentialMap {
    pub exp: Arc<LazyMatrixExp>,
    pub set: Arc<SetExpr>,
}

impl ConvexSet for ExponentialMap {
    fn dim(&self) -> usize {
        self.exp.dim()
    }

    fn support(&self, d: ColRef<'_, E>) -> E {
        let mapped = self.exp.transpose_apply(d);
        self.set.support(mapped.as_ref())
    }
}
