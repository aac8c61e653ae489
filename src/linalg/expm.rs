//! Matrix-exponential routines and the backend facade.
//!
//! Three backends compute (or defer) `exp(A·δ)`:
//! - [`expm`]: dense scaling-and-squaring with a degree-13 diagonal Padé
//!   approximant (Higham's method),
//! - [`padm`]: Expokit-style degree-6 diagonal Padé that keeps the sparse
//!   column-major representation,
//! - [`LazyMatrixExp`]: no materialization at all; rows and columns are
//!   extracted on demand through the exponential action.

use faer::Mat;
use faer::sparse::SparseColMat;

use crate::linalg::lazy_exp::LazyMatrixExp;
use crate::linalg::lu::SparseLu;
use crate::linalg::solver::{FactorizationError, LinearSolver};
use crate::linalg::{MatOp, MatrixExp, sp_add, sp_from_dense, sp_scale, sp_to_dense, speye, spmm};
use crate::{E, I};

/// Which exponential backend to use for `Φ = exp(A·δ)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpMode {
    /// Materialize a dense exponential.
    Dense,
    /// Materialize a sparse exponential via Padé approximation.
    Pade,
    /// Defer; queries evaluate the exponential action on demand.
    Lazy,
}

/// Computes `exp(a_delta)` in the requested backend.
pub fn expmat(a_delta: &MatOp, mode: ExpMode) -> Result<MatrixExp, FactorizationError> {
    match mode {
        ExpMode::Dense => Ok(MatrixExp::Dense(expm(&a_delta.to_dense())?)),
        ExpMode::Pade => Ok(MatrixExp::Sparse(padm(&a_delta.to_sparse())?)),
        ExpMode::Lazy => Ok(MatrixExp::Lazy(LazyMatrixExp::new(a_delta.clone()))),
    }
}

/// Padé coefficients of the degree-13 diagonal approximant.
const PADE13: [E; 14] = [
    64764752532480000.0,
    32382376266240000.0,
    7771770303897600.0,
    1187353796428800.0,
    129060195264000.0,
    10559470521600.0,
    670442572800.0,
    33522128640.0,
    1323241920.0,
    40840800.0,
    960960.0,
    16380.0,
    182.0,
    1.0,
];

const THETA13: E = 5.371920351148152;

fn scaled(m: &Mat<E>, alpha: E) -> Mat<E> {
    Mat::from_fn(m.nrows(), m.ncols(), |i, j| alpha * m[(i, j)])
}

fn eye(n: usize) -> Mat<E> {
    Mat::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.0 })
}

/// Dense matrix exponential by scaling and squaring.
pub fn expm(a: &Mat<E>) -> Result<Mat<E>, FactorizationError> {
    assert_eq!(a.nrows(), a.ncols(), "expm: matrix must be square");
    let n = a.nrows();
    let norm = MatOp::Dense(a.clone()).norm_inf();

    let s = if norm > THETA13 {
        (norm / THETA13).log2().ceil() as u32
    } else {
        0
    };
    let a = scaled(a, 0.5f64.powi(s as i32));

    let id = eye(n);
    let a2 = &a * &a;
    let a4 = &a2 * &a2;
    let a6 = &a2 * &a4;

    let u_inner = &(&scaled(&a6, PADE13[13]) + &scaled(&a4, PADE13[11])) + &scaled(&a2, PADE13[9]);
    let u_poly = &(&(&(&a6 * &u_inner) + &scaled(&a6, PADE13[7])) + &scaled(&a4, PADE13[5]))
        + &(&scaled(&a2, PADE13[3]) + &scaled(&id, PADE13[1]));
    let u = &a * &u_poly;

    let v_inner = &(&scaled(&a6, PADE13[12]) + &scaled(&a4, PADE13[10])) + &scaled(&a2, PADE13[8]);
    let v = &(&(&(&a6 * &v_inner) + &scaled(&a6, PADE13[6])) + &scaled(&a4, PADE13[4]))
        + &(&scaled(&a2, PADE13[2]) + &scaled(&id, PADE13[0]));

    // (V - U) X = (V + U)
    let denom = sp_from_dense(&(&v - &u));
    let numer = &v + &u;
    let mut solver = SparseLu::new();
    solver.factorize(denom.as_ref())?;
    let mut result = solver.solve(numer.as_ref())?;

    for _ in 0..s {
        result = &result * &result;
    }
    Ok(result)
}

/// Sparse matrix exponential by a degree-6 diagonal Padé approximant.
///
/// The polynomial evaluation stays in the sparse representation; only the
/// final denominator solve goes through a dense right-hand side.
pub fn padm(a: &SparseColMat<I, E>) -> Result<SparseColMat<I, E>, FactorizationError> {
    assert_eq!(a.nrows(), a.ncols(), "padm: matrix must be square");
    const P: usize = 6;
    let n = a.nrows();

    let mut c = [0.0; P + 1];
    c[0] = 1.0;
    for k in 1..=P {
        c[k] = c[k - 1] * ((P + 1 - k) as E) / ((k * (2 * P + 1 - k)) as E);
    }

    let norm = MatOp::Sparse(a.clone()).norm_inf();
    let s = if norm > 0.5 {
        (norm.log2().floor() as i32 + 2).max(0) as u32
    } else {
        0
    };
    let a = sp_scale(a, 0.5f64.powi(s as i32));

    let id = speye(n);
    let a2 = spmm(&a, &a);
    let mut q = sp_scale(&id, c[P]);
    let mut p = sp_scale(&id, c[P - 1]);
    let mut odd = true;
    for k in (1..P).rev() {
        if odd {
            q = sp_add(&spmm(&q, &a2), &sp_scale(&id, c[k - 1]));
        } else {
            p = sp_add(&spmm(&p, &a2), &sp_scale(&id, c[k - 1]));
        }
        odd = !odd;
    }

    let mut solver = SparseLu::new();
    let result = if odd {
        q = spmm(&q, &a);
        let denom = sp_add(&q, &sp_scale(&p, -1.0));
        solver.factorize(denom.as_ref())?;
        let x = solver.solve(sp_to_dense(&p).as_ref())?;
        &scaled(&eye(n), -1.0) + &scaled(&x, -2.0)
    } else {
        p = spmm(&p, &a);
        let denom = sp_add(&q, &sp_scale(&p, -1.0));
        solver.factorize(denom.as_ref())?;
        let x = solver.solve(sp_to_dense(&p).as_ref())?;
        &eye(n) + &scaled(&x, 2.0)
    };

    let mut out = sp_from_dense(&result);
    for _ in 0..s {
        out = spmm(&out, &out);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sp_from_triplets;
    use faer::sparse::Triplet;

    #[test]
    fn expm_of_diagonal_is_elementwise_exp() {
        let a = Mat::from_fn(3, 3, |i, j| if i == j { (i as E + 1.0) * 0.3 } else { 0.0 });
        let e = expm(&a).unwrap();
        for i in 0..3 {
            assert!((e[(i, i)] - ((i as E + 1.0) * 0.3).exp()).abs() < 1e-12);
        }
        assert!(e[(0, 1)].abs() < 1e-12);
    }

    #[test]
    fn expm_of_nilpotent_matches_closed_form() {
        // exp([[0, 1], [0, 0]]) = [[1, 1], [0, 1]]
        let mut a = Mat::<E>::zeros(2, 2);
        a[(0, 1)] = 1.0;
        let e = expm(&a).unwrap();
        assert!((e[(0, 0)] - 1.0).abs() < 1e-14);
        assert!((e[(0, 1)] - 1.0).abs() < 1e-14);
        assert!(e[(1, 0)].abs() < 1e-14);
        assert!((e[(1, 1)] - 1.0).abs() < 1e-14);
    }

    #[test]
    fn expm_with_scaling_matches_known_value() {
        // Norm above the Padé threshold forces squaring steps.
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 8.0 } else { 0.0 });
        let e = expm(&a).unwrap();
        assert!((e[(0, 0)] - 8.0f64.exp()).abs() / 8.0f64.exp() < 1e-10);
    }

    #[test]
    fn padm_agrees_with_dense_expm() {
        let a = sp_from_triplets(
            4,
            4,
            &[
                Triplet::new(0, 0, 0.4),
                Triplet::new(0, 1, 0.2),
                Triplet::new(1, 1, -0.3),
                Triplet::new(2, 3, 0.7),
                Triplet::new(3, 2, -0.5),
            ],
        );
        let sparse_exp = padm(&a).unwrap();
        let dense_exp = expm(&sp_to_dense(&a)).unwrap();
        assert!((&sp_to_dense(&sparse_exp) - &dense_exp).norm_l2() < 1e-9);
    }

    #[test]
    fn expmat_selects_backend() {
        let a = MatOp::Dense(Mat::from_fn(2, 2, |i, j| if i == j { 0.1 } else { 0.0 }));
        assert!(matches!(expmat(&a, ExpMode::Dense).unwrap(), MatrixExp::Dense(_)));
        assert!(matches!(expmat(&a, ExpMode::Pade).unwrap(), MatrixExp::Sparse(_)));
        assert!(matches!(expmat(&a, ExpMode::Lazy).unwrap(), MatrixExp::Lazy(_)));
    }
}
