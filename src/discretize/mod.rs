//! Discretization of continuous affine systems.
//!
//! Turns `x' = A x + u` into a discrete abstraction `(Φ, Ω0, V)` with
//! `Φ = exp(A·δ)` such that the discrete evolution over-approximates every
//! continuous trajectory on `[0, N·δ]`. Four approximation models trade
//! conservativeness against cost:
//!
//! - `nobloating`: discrete-time semantics only; `Ω0 = X0` and the inputs
//!   are filtered through `Φ1(A, δ) = ∫₀^δ exp(A·s) ds`.
//! - `forward` / `backward`: interpolation models for dense-time
//!   reachability, bloating `Ω0` with symmetric-interval-hull error terms
//!   built from `Φ2(|A|, δ)`.
//! - `firstorder`: a coarse first-order bound in the infinity norm.
//!
//! `Φ1` and `Φ2` are read out of the exponential of the augmented matrix
//!
//! ```text
//!         [ A·δ  δ·I   0  ]
//!   G  =  [  0    0   δ·I ]         exp(G) = [ e^{Aδ}  Φ1  Φ2 ]
//!         [  0    0    0  ]                  [  ⋱ ]
//! ```
//!
//! materialized dense, via the sparse Padé routine, or extracted column-wise
//! from a lazy exponential, matching how `Φ` itself is represented.

use std::ops::Range;
use std::str::FromStr;

use faer::Mat;
use faer::sparse::{SparseColMat, Triplet};
use serde::{Deserialize, Serialize};

use crate::inputs::{InputSequence, NondeterministicInput};
use crate::linalg::expm::{ExpMode, expmat, expm, padm};
use crate::linalg::{LazyMatrixExp, MatOp, MatrixExp, sp_to_dense};
use crate::sets::{
    SetExpr, convex_hull, exponential_map, linear_map, minkowski_sum, norm_inf, scale,
    symmetric_interval_hull, symmetric_interval_hull_lazy,
};
use crate::system::{ContinuousSystem, DiscreteSystem, InitialValueProblem, SystemDescriptor};
use crate::{E, I, ReachError};

/// Approximation model used to build the discrete abstraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApproxModel {
    Forward,
    Backward,
    FirstOrder,
    NoBloating,
}

impl FromStr for ApproxModel {
    type Err = ReachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(ApproxModel::Forward),
            "backward" => Ok(ApproxModel::Backward),
            "firstorder" => Ok(ApproxModel::FirstOrder),
            "nobloating" => Ok(ApproxModel::NoBloating),
            other => Err(ReachError::InvalidApproxModel {
                name: other.to_string(),
            }),
        }
    }
}

/// Options controlling [`discretize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscretizationOptions {
    /// Approximation model; see [`ApproxModel`].
    pub approx_model: ApproxModel,
    /// Use the sparse Padé routine for the exponentials.
    pub pade_expm: bool,
    /// Keep the exponentials lazy, extracting rows/columns on demand.
    pub lazy_expm: bool,
    /// Keep symmetric interval hulls lazy.
    pub lazy_sih: bool,
    /// Select parallel hull/extraction routines (none are shipped).
    pub parallel: bool,
}

impl Default for DiscretizationOptions {
    fn default() -> Self {
        Self {
            approx_model: ApproxModel::Forward,
            pade_expm: false,
            lazy_expm: false,
            lazy_sih: true,
            parallel: false,
        }
    }
}

impl DiscretizationOptions {
    fn exp_mode(&self) -> ExpMode {
        if self.lazy_expm {
            ExpMode::Lazy
        } else if self.pade_expm {
            ExpMode::Pade
        } else {
            ExpMode::Dense
        }
    }

    fn sih(&self, set: SetExpr) -> SetExpr {
        if self.lazy_sih {
            symmetric_interval_hull_lazy(set)
        } else {
            symmetric_interval_hull(&set)
        }
    }
}

/// Discretizes a continuous initial-value problem with step size `delta`.
///
/// Returns the discrete problem `(Φ, Ω0, V)`; no partial result is ever
/// produced on error.
pub fn discretize(
    ivp: &InitialValueProblem<ContinuousSystem>,
    delta: E,
    opts: &DiscretizationOptions,
) -> Result<InitialValueProblem<DiscreteSystem>, ReachError> {
    if opts.parallel {
        return Err(ReachError::NotImplemented {
            feature: "parallel interval hulls and column extraction",
        });
    }
    if delta < 0.0 {
        return Err(ReachError::Domain { delta });
    }

    let system = match opts.approx_model {
        ApproxModel::NoBloating => discr_no_bloating(ivp.system(), delta, opts)?,
        ApproxModel::Forward => discr_interpolation(ivp.system(), delta, opts, true)?,
        ApproxModel::Backward => discr_interpolation(ivp.system(), delta, opts, false)?,
        ApproxModel::FirstOrder => discr_first_order(ivp.system(), delta, opts)?,
    };
    Ok(InitialValueProblem::new(system))
}

/// `Ω0 = X0`; inputs filtered through `Φ1(A, δ)`.
fn discr_no_bloating(
    sys: &ContinuousSystem,
    delta: E,
    opts: &DiscretizationOptions,
) -> Result<DiscreteSystem, ReachError> {
    let a = sys.matrix();
    let n = sys.dim();
    let phi = expmat(&a.scale(delta), opts.exp_mode())?;

    let v = if sys.inputs().is_absent() {
        NondeterministicInput::constant(SetExpr::void(n))
    } else {
        let phi1 = aug_exp_block(&a.scale(delta), delta, n, n..2 * n, opts)?;
        sys.inputs().map(&MatOp::Dense(phi1))
    };

    DiscreteSystem::new(phi, sys.initial_set().clone(), v, delta)
}

/// Interpolation models: bloats `Ω0` with interval-hull error terms so the
/// first step covers dense time; `forward` anchors the error at `X0`,
/// `backward` at `Φ·X0`.
fn discr_interpolation(
    sys: &ContinuousSystem,
    delta: E,
    opts: &DiscretizationOptions,
    forward: bool,
) -> Result<DiscreteSystem, ReachError> {
    let a = sys.matrix();
    let n = sys.dim();
    let x0 = sys.initial_set();
    let phi = expmat(&a.scale(delta), opts.exp_mode())?;
    let phi_x0 = phi_map(&phi, x0.clone());

    let u1 = sys.inputs().start().shared_set();
    if sys.inputs().is_absent() || u1.is_zero() {
        // Homogeneous: Ω0 = CH(X0, Φ·X0 ⊕ δ·{0}).
        let omega0 = convex_hull(x0.clone(), minkowski_sum(phi_x0, scale(delta, SetExpr::zero(n))));
        let v = NondeterministicInput::constant(SetExpr::void(n));
        return DiscreteSystem::new(phi, omega0, v, delta);
    }

    let phi2_abs = MatOp::Dense(aug_exp_block(
        &a.abs().scale(delta),
        delta,
        n,
        2 * n..3 * n,
        opts,
    )?);

    // V_U = δ·U ⊕ sih(Φ2|A| · sih(A·U)) per input set.
    let v_sets: Vec<SetExpr> = sys
        .inputs()
        .sets()
        .iter()
        .map(|u| {
            let e_psi = opts.sih(linear_map(
                phi2_abs.clone(),
                opts.sih(linear_map(a.clone(), (**u).clone())),
            ));
            minkowski_sum(scale(delta, (**u).clone()), e_psi)
        })
        .collect();

    let a2 = a.matmul(a);
    let e_omega_arg = if forward {
        linear_map(a2, x0.clone())
    } else {
        match &phi {
            MatrixExp::Dense(m) => linear_map(a2.matmul(&MatOp::Dense(m.clone())), x0.clone()),
            MatrixExp::Sparse(m) => linear_map(a2.matmul(&MatOp::Sparse(m.clone())), x0.clone()),
            MatrixExp::Lazy(l) => linear_map(a2, exponential_map(l.clone(), x0.clone())),
        }
    };
    let e_omega = opts.sih(linear_map(phi2_abs, opts.sih(e_omega_arg)));

    let omega0 = convex_hull(
        x0.clone(),
        minkowski_sum(minkowski_sum(phi_x0, v_sets[0].clone()), e_omega),
    );

    let v = match sys.inputs() {
        NondeterministicInput::Constant(_) => {
            NondeterministicInput::constant(v_sets.into_iter().next().unwrap())
        }
        NondeterministicInput::Varying(_) => NondeterministicInput::varying(v_sets),
    };
    DiscreteSystem::new(phi, omega0, v, delta)
}

/// First-order over-approximation in the infinity norm.
fn discr_first_order(
    sys: &ContinuousSystem,
    delta: E,
    opts: &DiscretizationOptions,
) -> Result<DiscreteSystem, ReachError> {
    let a = sys.matrix();
    let n = sys.dim();
    let x0 = sys.initial_set();
    let phi = expmat(&a.scale(delta), opts.exp_mode())?;
    let phi_x0 = phi_map(&phi, x0.clone());

    let a_norm = a.norm_inf();
    let r_x0 = norm_inf(x0);
    // Mathematically non-negative; clamp away rounding noise for tiny δ·‖A‖.
    let c = ((delta * a_norm).exp() - 1.0 - delta * a_norm).max(0.0);

    if sys.inputs().is_absent() {
        let alpha = c * r_x0;
        let omega0 = convex_hull(
            x0.clone(),
            minkowski_sum(phi_x0, SetExpr::ball2(faer::Col::zeros(n), alpha)),
        );
        let v = NondeterministicInput::constant(SetExpr::void(n));
        return DiscreteSystem::new(phi, omega0, v, delta);
    }

    let u1 = sys.inputs().start().shared_set();
    let r_u1 = norm_inf(&u1);
    let (alpha, beta1) = if a_norm == 0.0 {
        (0.0, 0.0)
    } else {
        (c * (r_x0 + r_u1 / a_norm), c * r_u1 / a_norm)
    };

    let omega0 = convex_hull(
        x0.clone(),
        minkowski_sum(
            minkowski_sum(phi_x0, scale(delta, (*u1).clone())),
            SetExpr::ball2(faer::Col::zeros(n), alpha),
        ),
    );

    let bloat = |u: &SetExpr, beta: E| {
        minkowski_sum(scale(delta, u.clone()), SetExpr::ball2(faer::Col::zeros(n), beta))
    };
    let v = match sys.inputs() {
        NondeterministicInput::Constant(_) => NondeterministicInput::constant(bloat(&u1, beta1)),
        NondeterministicInput::Varying(_) => NondeterministicInput::varying(
            sys.inputs()
                .sets()
                .iter()
                .map(|u| {
                    let beta = if a_norm == 0.0 { 0.0 } else { c * norm_inf(u) / a_norm };
                    bloat(u, beta)
                })
                .collect(),
        ),
    };
    DiscreteSystem::new(phi, omega0, v, delta)
}

/// `Φ·X0` in whichever representation `Φ` has.
fn phi_map(phi: &MatrixExp, set: SetExpr) -> SetExpr {
    match phi {
        MatrixExp::Dense(m) => linear_map(MatOp::Dense(m.clone()), set),
        MatrixExp::Sparse(m) => linear_map(MatOp::Sparse(m.clone()), set),
        MatrixExp::Lazy(l) => exponential_map(l.clone(), set),
    }
}

/// Builds the augmented 3n×3n generator with `top` in the (0,0) block and
/// `δ·I` on the two super-diagonals of blocks.
fn augmented_generator(top: &MatOp, delta: E, n: usize) -> SparseColMat<I, E> {
    let mut triplets = Vec::new();
    match top {
        MatOp::Dense(m) => {
            for j in 0..n {
                for i in 0..n {
                    if m[(i, j)] != 0.0 {
                        triplets.push(Triplet::new(i, j, m[(i, j)]));
                    }
                }
            }
        }
        MatOp::Sparse(m) => {
            for j in 0..n {
                for idx in m.col_ptr()[j]..m.col_ptr()[j + 1] {
                    triplets.push(Triplet::new(m.row_idx()[idx], j, m.val()[idx]));
                }
            }
        }
    }
    for i in 0..n {
        triplets.push(Triplet::new(i, n + i, delta));
        triplets.push(Triplet::new(n + i, 2 * n + i, delta));
    }
    SparseColMat::try_new_from_triplets(3 * n, 3 * n, &triplets).unwrap()
}

/// The block `exp(G)[0..n, cols]` of the augmented exponential, extracted
/// in the representation matching the configured backend.
fn aug_exp_block(
    top: &MatOp,
    delta: E,
    n: usize,
    cols: Range<usize>,
    opts: &DiscretizationOptions,
) -> Result<Mat<E>, ReachError> {
    let aug = augmented_generator(top, delta, n);
    match opts.exp_mode() {
        ExpMode::Lazy => {
            let lazy = LazyMatrixExp::new(MatOp::Sparse(aug));
            let strip = lazy.get_columns(cols);
            Ok(Mat::from_fn(n, n, |i, j| strip[(i, j)]))
        }
        ExpMode::Pade => {
            let exp = padm(&aug)?;
            Ok(MatOp::Sparse(exp).block(0..n, cols))
        }
        ExpMode::Dense => {
            let exp = expm(&sp_to_dense(&aug))?;
            Ok(Mat::from_fn(n, n, |i, j| exp[(i, cols.start + j)]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sets::support_on_axis;
    use faer::Col;
    use rstest::rstest;

    fn diag(entries: &[E]) -> MatOp {
        let n = entries.len();
        let entries = entries.to_vec();
        MatOp::Dense(Mat::from_fn(n, n, move |i, j| if i == j { entries[i] } else { 0.0 }))
    }

    fn ivp_homogeneous(a: MatOp) -> InitialValueProblem<ContinuousSystem> {
        let n = a.nrows();
        InitialValueProblem::new(
            ContinuousSystem::homogeneous(a, SetExpr::ball_inf(Col::zeros(n), 0.1)).unwrap(),
        )
    }

    #[test]
    fn phi1_block_matches_the_integral_of_the_exponential() {
        // For diagonal A, Φ1 = diag((e^{aδ} − 1)/a).
        let delta = 0.05;
        let a = diag(&[1.0, -2.0, 0.5]);
        let opts = DiscretizationOptions::default();
        let phi1 = aug_exp_block(&a.scale(delta), delta, 3, 3..6, &opts).unwrap();
        for (i, &ai) in [1.0, -2.0, 0.5].iter().enumerate() {
            let expected = ((ai * delta).exp() - 1.0) / ai;
            assert!((phi1[(i, i)] - expected).abs() < 1e-12);
        }
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn phi1_extraction_agrees_between_backends(#[case] lazy: bool) {
        let delta = 0.05;
        let a = diag(&[1.0, -2.0, 0.5]);
        let dense_opts = DiscretizationOptions::default();
        let other_opts = DiscretizationOptions {
            lazy_expm: lazy,
            pade_expm: !lazy,
            ..Default::default()
        };
        let reference = aug_exp_block(&a.scale(delta), delta, 3, 3..6, &dense_opts).unwrap();
        let other = aug_exp_block(&a.scale(delta), delta, 3, 3..6, &other_opts).unwrap();
        assert!((&reference - &other).norm_l2() < 1e-9);
    }

    #[test]
    fn discretization_preserves_dimension() {
        let ivp = ivp_homogeneous(diag(&[1.0, 2.0]));
        for model in [
            ApproxModel::Forward,
            ApproxModel::Backward,
            ApproxModel::FirstOrder,
            ApproxModel::NoBloating,
        ] {
            let opts = DiscretizationOptions {
                approx_model: model,
                ..Default::default()
            };
            let discrete = discretize(&ivp, 0.01, &opts).unwrap();
            assert_eq!(discrete.dim(), ivp.dim());
        }
    }

    #[test]
    fn unknown_model_name_is_rejected() {
        let err = "midpoint".parse::<ApproxModel>().unwrap_err();
        assert_eq!(
            err,
            ReachError::InvalidApproxModel {
                name: "midpoint".to_string()
            }
        );
        assert_eq!("nobloating".parse::<ApproxModel>().unwrap(), ApproxModel::NoBloating);
    }

    #[test]
    fn parallel_paths_are_not_implemented() {
        let ivp = ivp_homogeneous(diag(&[1.0]));
        let opts = DiscretizationOptions {
            parallel: true,
            ..Default::default()
        };
        assert!(matches!(
            discretize(&ivp, 0.01, &opts),
            Err(ReachError::NotImplemented { .. })
        ));
    }

    #[test]
    fn negative_step_size_is_a_domain_error() {
        let ivp = ivp_homogeneous(diag(&[1.0]));
        assert_eq!(
            discretize(&ivp, -1.0, &DiscretizationOptions::default()).unwrap_err(),
            ReachError::Domain { delta: -1.0 }
        );
    }

    #[test]
    fn forward_homogeneous_initial_set_contains_the_hull() {
        let ivp = ivp_homogeneous(diag(&[0.7, -0.4]));
        let opts = DiscretizationOptions {
            approx_model: ApproxModel::Forward,
            ..Default::default()
        };
        let discrete = discretize(&ivp, 0.1, &opts).unwrap();
        let omega0 = discrete.system().initial_set();

        let phi = expm(&diag(&[0.7, -0.4]).scale(0.1).to_dense()).unwrap();
        let hull = convex_hull(
            SetExpr::ball_inf(Col::zeros(2), 0.1),
            linear_map(MatOp::Dense(phi), SetExpr::ball_inf(Col::zeros(2), 0.1)),
        );
        for axis in 0..2 {
            for positive in [true, false] {
                assert!(
                    support_on_axis(omega0, axis, positive)
                        >= support_on_axis(&hull, axis, positive) - 1e-12
                );
            }
        }
    }

    #[test]
    fn first_order_bloating_grows_with_the_step_size() {
        let a = diag(&[1.0, 0.5]);
        let x0 = SetExpr::ball_inf(Col::zeros(2), 0.1);
        let u = SetExpr::ball2(Col::zeros(2), 0.3);
        let ivp = InitialValueProblem::new(
            ContinuousSystem::with_constant_input(a, x0, u).unwrap(),
        );
        let opts = DiscretizationOptions {
            approx_model: ApproxModel::FirstOrder,
            ..Default::default()
        };

        let beta_at = |delta: E| {
            let discrete = discretize(&ivp, delta, &opts).unwrap();
            match discrete.system().inputs().start().set() {
                SetExpr::MinkowskiSum(sum) => match sum.b.as_ref() {
                    SetExpr::Ball2(ball) => ball.radius,
                    other => panic!("expected a bloating ball, got {other:?}"),
                },
                other => panic!("expected a Minkowski sum, got {other:?}"),
            }
        };
        let beta_small = beta_at(0.01);
        let beta_large = beta_at(0.05);
        assert!(beta_small >= 0.0);
        assert!(beta_large >= beta_small);
    }
}
