//! Lazy convex-set algebra driven by support functions.
//!
//! Every set is a [`SetExpr`] node: either a concrete body (balls, boxes,
//! the origin, a void placeholder) or a lazy operation (linear map,
//! Minkowski sum, convex hull, Cartesian product, symmetric interval hull,
//! exponential map) that owns its operands behind [`Arc`] and is evaluated
//! on demand through [`ConvexSet::support`] queries:
//!
//! ```text
//!   ρ_S(d) = sup { ⟨d, x⟩ : x ∈ S }
//! ```
//!
//! Operations never materialize their result; the reachability loop builds
//! trees of sums and maps, and only property evaluation pulls actual
//! numbers out of them.

pub mod concrete;
pub mod lazy;

use std::sync::Arc;

use enum_dispatch::enum_dispatch;
use faer::{Col, ColRef};

use crate::E;
use crate::linalg::{LazyMatrixExp, MatOp};

pub use concrete::{Ball2, BallInf, Hyperrectangle, VoidSet, ZeroSet};
pub use lazy::{
    CartesianProductArray, ConvexHull, ExponentialMap, LinearMap, MinkowskiSum, MinkowskiSumArray,
    Scale, SymmetricIntervalHull,
};

/// A convex set queried through its support function.
#[enum_dispatch]
pub trait ConvexSet {
    /// Ambient dimension.
    fn dim(&self) -> usize;

    /// Support function `ρ_S(d)`.
    fn support(&self, d: ColRef<'_, E>) -> E;
}

/// A convex-set expression: concrete bodies and lazy operation nodes.
#[enum_dispatch(ConvexSet)]
#[derive(Debug, Clone)]
pub enum SetExpr {
    VoidSet,
    ZeroSet,
    Ball2,
    BallInf,
    Hyperrectangle,
    LinearMap,
    Scale,
    MinkowskiSum,
    MinkowskiSumArray,
    CartesianProductArray,
    ConvexHull,
    SymmetricIntervalHull,
    ExponentialMap,
}

impl SetExpr {
    /// Placeholder for an absent set.
    pub fn void(dim: usize) -> SetExpr {
        VoidSet { dim }.into()
    }

    /// The singleton `{0}`.
    pub fn zero(dim: usize) -> SetExpr {
        ZeroSet { dim }.into()
    }

    pub fn ball2(center: Col<E>, radius: E) -> SetExpr {
        assert!(radius >= 0.0, "ball radius must be non-negative");
        Ball2 { center, radius }.into()
    }

    pub fn ball_inf(center: Col<E>, radius: E) -> SetExpr {
        assert!(radius >= 0.0, "ball radius must be non-negative");
        BallInf { center, radius }.into()
    }

    pub fn hyperrectangle(center: Col<E>, radius: Col<E>) -> SetExpr {
        assert_eq!(center.nrows(), radius.nrows(), "hyperrectangle: center/radius length");
        Hyperrectangle { center, radius }.into()
    }

    pub fn is_void(&self) -> bool {
        matches!(self, SetExpr::VoidSet(_))
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, SetExpr::ZeroSet(_))
    }
}

/// `M·S` as a lazy node. Void and zero operands map to void and zero of
/// the target dimension.
pub fn linear_map(matrix: MatOp, set: SetExpr) -> SetExpr {
    assert_eq!(matrix.ncols(), set.dim(), "linear map: matrix/set dimensions");
    let out = matrix.nrows();
    if set.is_void() {
        return SetExpr::void(out);
    }
    if set.is_zero() {
        return SetExpr::zero(out);
    }
    LinearMap {
        matrix,
        set: Arc::new(set),
    }
    .into()
}

/// `λ·S` as a lazy node.
pub fn scale(factor: E, set: SetExpr) -> SetExpr {
    if set.is_void() || set.is_zero() {
        return set;
    }
    Scale {
        factor,
        set: Arc::new(set),
    }
    .into()
}

/// `A ⊕ B`. Void and zero operands are identities and short-circuit.
pub fn minkowski_sum(a: SetExpr, b: SetExpr) -> SetExpr {
    if a.is_void() || a.is_zero() {
        return b;
    }
    if b.is_void() || b.is_zero() {
        return a;
    }
    assert_eq!(a.dim(), b.dim(), "minkowski sum: dimensions differ");
    MinkowskiSum {
        a: Arc::new(a),
        b: Arc::new(b),
    }
    .into()
}

/// `S₁ ⊕ ⋯ ⊕ Sₘ`, dropping identity operands. An empty sum is `{0}`, a
/// singleton sum is the operand itself.
pub fn minkowski_sum_array(sets: Vec<SetExpr>, dim: usize) -> SetExpr {
    let mut kept: Vec<Arc<SetExpr>> = Vec::with_capacity(sets.len());
    for s in sets {
        if !s.is_void() && !s.is_zero() {
            assert_eq!(s.dim(), dim, "minkowski sum array: dimensions differ");
            kept.push(Arc::new(s));
        }
    }
    match kept.len() {
        0 => SetExpr::zero(dim),
        1 => (*kept.pop().unwrap()).clone(),
        _ => MinkowskiSumArray { sets: kept }.into(),
    }
}

/// `CH(A, B)`. A void operand yields the other one.
pub fn convex_hull(a: SetExpr, b: SetExpr) -> SetExpr {
    if a.is_void() {
        return b;
    }
    if b.is_void() {
        return a;
    }
    assert_eq!(a.dim(), b.dim(), "convex hull: dimensions differ");
    ConvexHull {
        a: Arc::new(a),
        b: Arc::new(b),
    }
    .into()
}

/// `S₁ × ⋯ × Sₘ` as a lazy node.
pub fn cartesian_product(sets: Vec<SetExpr>) -> SetExpr {
    assert!(!sets.is_empty(), "cartesian product of no sets");
    CartesianProductArray {
        sets: sets.into_iter().map(Arc::new).collect(),
    }
    .into()
}

/// Lazy symmetric interval hull; per-axis radii are resolved (and cached)
/// on the first support query.
pub fn symmetric_interval_hull_lazy(set: SetExpr) -> SetExpr {
    SymmetricIntervalHull::new(Arc::new(set)).into()
}

/// Concrete symmetric interval hull: the smallest origin-centred box
/// containing `set`, materialized as a [`Hyperrectangle`].
pub fn symmetric_interval_hull(set: &SetExpr) -> SetExpr {
    let n = set.dim();
    let radius = Col::from_fn(n, |i| axis_radius(set, i));
    SetExpr::hyperrectangle(Col::zeros(n), radius)
}

/// `exp(M)·S` without materializing the exponential.
pub fn exponential_map(exp: LazyMatrixExp, set: SetExpr) -> SetExpr {
    assert_eq!(exp.dim(), set.dim(), "exponential map: dimensions differ");
    if set.is_void() {
        return set;
    }
    ExponentialMap {
        exp: Arc::new(exp),
        set: Arc::new(set),
    }
    .into()
}

/// Support of `S` along `±eᵢ`.
pub fn support_on_axis(set: &SetExpr, axis: usize, positive: bool) -> E {
    let n = set.dim();
    let sign = if positive { 1.0 } else { -1.0 };
    let d = Col::from_fn(n, |k| if k == axis { sign } else { 0.0 });
    set.support(d.as_ref())
}

/// `‖S‖∞`: the largest absolute coordinate reached by the set.
pub fn norm_inf(set: &SetExpr) -> E {
    (0..set.dim()).map(|i| axis_radius(set, i)).fold(0.0, E::max)
}

pub(crate) fn axis_radius(set: &SetExpr, axis: usize) -> E {
    let hi = support_on_axis(set, axis, true);
    let lo = support_on_axis(set, axis, false);
    E::max(hi.abs(), lo.abs())
}

pub(crate) fn dot(a: ColRef<'_, E>, b: ColRef<'_, E>) -> E {
    let mut acc = 0.0;
    for i in 0..a.nrows() {
        acc += a[i] * b[i];
    }
    acc
}

pub(crate) fn norm_l1(d: ColRef<'_, E>) -> E {
    let mut acc = 0.0;
    for i in 0..d.nrows() {
        acc += d[i].abs();
    }
    acc
}
