//! Concrete set bodies.

use faer::{Col, ColRef};

use crate::E;
use crate::sets::{ConvexSet, dot, norm_l1};

/// Placeholder for an absent set (no input). Identity for Minkowski sums
/// and hulls; its own support is −∞ so it stays inert if queried directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoidSet {
    pub dim: usize,
}

impl ConvexSet for VoidSet {
    fn dim(&self) -> usize {
        self.dim
    }

    fn support(&self, _d: ColRef<'_, E>) -> E {
        E::NEG_INFINITY
    }
}

/// The singleton `{0}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZeroSet {
    pub dim: usize,
}

impl ConvexSet for ZeroSet {
    fn dim(&self) -> usize {
        self.dim
    }

    fn support(&self, _d: ColRef<'_, E>) -> E {
        0.0
    }
}

/// Euclidean ball `{x : ‖x − c‖₂ ≤ r}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ball2 {
    pub center: Col<E>,
    pub radius: E,
}

impl ConvexSet for Ball2 {
    fn dim(&self) -> usize {
        self.center.nrows()
    }

    fn support(&self, d: ColRef<'_, E>) -> E {
        dot(d, self.center.as_ref()) + self.radius * d.norm_l2()
    }
}

/// Infinity-norm ball `{x : ‖x − c‖∞ ≤ r}`.
#[derive(Debug, Clone, PartialEq)]
pub struct BallInf {
    pub center: Col<E>,
    pub radius: E,
}

impl ConvexSet for BallInf {
    fn dim(&self) -> usize {
        self.center.nrows()
    }

    fn support(&self, d: ColRef<'_, E>) -> E {
        dot(d, self.center.as_ref()) + self.radius * norm_l1(d)
    }
}

/// Axis-aligned box with per-axis radii; the concrete form of a symmetric
/// interval hull.
#[derive(Debug, Clone, PartialEq)]
pub struct Hyperrectangle {
    pub center: Col<E>,
    pub radius: Col<E>,
}

impl ConvexSet for Hyperrectangle {
    fn dim(&self) -> usize {
        self.center.nrows()
    }

    fn support(&self, d: ColRef<'_, E>) -> E {
        let mut acc = 0.0;
        for i in 0..self.center.nrows() {
            acc += d[i] * self.center[i] + d[i].abs() * self.radius[i];
        }
        acc
    }
}
