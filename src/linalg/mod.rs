//! Dense/sparse matrix facade and the CSC kernels behind it.
//!
//! The reachability engine manipulates the system matrix `A` and the
//! state-transition matrix `Φ` in three representations: dense
//! ([`faer::Mat`]), sparse column-major ([`faer::sparse::SparseColMat`]) and
//! as a deferred matrix exponential ([`LazyMatrixExp`]). [`MatOp`] unifies
//! the two concrete representations; [`MatrixExp`] adds the lazy one.

pub mod expm;
pub mod lazy_exp;
pub mod lu;
pub mod solver;

use std::ops::Range;

use faer::sparse::{SparseColMat, Triplet};
use faer::{Col, ColRef, Mat};

use crate::{E, I};

pub use expm::{ExpMode, expmat};
pub use lazy_exp::LazyMatrixExp;

/// A square matrix in either dense or sparse column-major form.
#[derive(Debug, Clone)]
pub enum MatOp {
    Dense(Mat<E>),
    Sparse(SparseColMat<I, E>),
}

impl MatOp {
    pub fn nrows(&self) -> usize {
        match self {
            MatOp::Dense(m) => m.nrows(),
            MatOp::Sparse(m) => m.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            MatOp::Dense(m) => m.ncols(),
            MatOp::Sparse(m) => m.ncols(),
        }
    }

    /// Matrix-vector product `M·v`.
    pub fn apply(&self, v: ColRef<'_, E>) -> Col<E> {
        match self {
            MatOp::Dense(m) => {
                let mut out = Col::zeros(m.nrows());
                for j in 0..m.ncols() {
                    let vj = v[j];
                    if vj != 0.0 {
                        for i in 0..m.nrows() {
                            out[i] += m[(i, j)] * vj;
                        }
                    }
                }
                out
            }
            MatOp::Sparse(m) => sp_apply(m, v),
        }
    }

    /// Transposed product `Mᵀ·v`.
    pub fn transpose_apply(&self, v: ColRef<'_, E>) -> Col<E> {
        match self {
            MatOp::Dense(m) => {
                let mut out = Col::zeros(m.ncols());
                for j in 0..m.ncols() {
                    let mut acc = 0.0;
                    for i in 0..m.nrows() {
                        acc += m[(i, j)] * v[i];
                    }
                    out[j] = acc;
                }
                out
            }
            MatOp::Sparse(m) => sp_transpose_apply(m, v),
        }
    }

    /// Matrix product, staying in the representation of `self`.
    pub fn matmul(&self, rhs: &MatOp) -> MatOp {
        match (self, rhs) {
            (MatOp::Sparse(a), MatOp::Sparse(b)) => MatOp::Sparse(spmm(a, b)),
            (a, b) => MatOp::Dense(&a.to_dense() * &b.to_dense()),
        }
    }

    /// Matrix sum, staying in the representation of `self`.
    pub fn add(&self, rhs: &MatOp) -> MatOp {
        match (self, rhs) {
            (MatOp::Sparse(a), MatOp::Sparse(b)) => MatOp::Sparse(sp_add(a, b)),
            (a, b) => MatOp::Dense(&a.to_dense() + &b.to_dense()),
        }
    }

    /// Scalar multiple `α·M`.
    pub fn scale(&self, alpha: E) -> MatOp {
        match self {
            MatOp::Dense(m) => MatOp::Dense(Mat::from_fn(m.nrows(), m.ncols(), |i, j| alpha * m[(i, j)])),
            MatOp::Sparse(m) => MatOp::Sparse(sp_scale(m, alpha)),
        }
    }

    /// Entry-wise absolute value `|M|`.
    pub fn abs(&self) -> MatOp {
        match self {
            MatOp::Dense(m) => MatOp::Dense(Mat::from_fn(m.nrows(), m.ncols(), |i, j| m[(i, j)].abs())),
            MatOp::Sparse(m) => MatOp::Sparse(sp_map(m, E::abs)),
        }
    }

    /// Induced infinity norm (maximum absolute row sum).
    pub fn norm_inf(&self) -> E {
        match self {
            MatOp::Dense(m) => {
                let mut best: E = 0.0;
                for i in 0..m.nrows() {
                    let mut row = 0.0;
                    for j in 0..m.ncols() {
                        row += m[(i, j)].abs();
                    }
                    best = best.max(row);
                }
                best
            }
            MatOp::Sparse(m) => {
                let mut rows = vec![0.0; m.nrows()];
                for j in 0..m.ncols() {
                    for idx in m.col_ptr()[j]..m.col_ptr()[j + 1] {
                        rows[m.row_idx()[idx]] += m.val()[idx].abs();
                    }
                }
                rows.into_iter().fold(0.0, E::max)
            }
        }
    }

    /// Copies the sub-block `M[rows, cols]` into a dense matrix.
    pub fn block(&self, rows: Range<usize>, cols: Range<usize>) -> Mat<E> {
        match self {
            MatOp::Dense(m) => dense_block(m, &rows, &cols),
            MatOp::Sparse(m) => sp_block(m, rows, cols),
        }
    }

    /// Whether the sub-block `M[rows, cols]` holds no non-zero entry.
    pub fn block_is_zero(&self, rows: &Range<usize>, cols: &Range<usize>) -> bool {
        match self {
            MatOp::Dense(m) => rows.clone().all(|i| cols.clone().all(|j| m[(i, j)] == 0.0)),
            MatOp::Sparse(m) => sp_block_is_zero(m, rows, cols),
        }
    }

    pub fn to_dense(&self) -> Mat<E> {
        match self {
            MatOp::Dense(m) => m.clone(),
            MatOp::Sparse(m) => sp_to_dense(m),
        }
    }

    pub fn to_sparse(&self) -> SparseColMat<I, E> {
        match self {
            MatOp::Dense(m) => sp_from_dense(m),
            MatOp::Sparse(m) => m.clone(),
        }
    }
}

/// The state-transition matrix `Φ` in one of its three backends.
#[derive(Debug, Clone)]
pub enum MatrixExp {
    /// Materialized dense exponential.
    Dense(Mat<E>),
    /// Materialized sparse exponential (Padé).
    Sparse(SparseColMat<I, E>),
    /// Deferred exponential; queries act on the stored exponent.
    Lazy(LazyMatrixExp),
}

impl MatrixExp {
    pub fn dim(&self) -> usize {
        match self {
            MatrixExp::Dense(m) => m.nrows(),
            MatrixExp::Sparse(m) => m.nrows(),
            MatrixExp::Lazy(m) => m.dim(),
        }
    }
}

/// Sparse identity matrix of order `n`.
pub fn speye(n: usize) -> SparseColMat<I, E> {
    let triplets: Vec<_> = (0..n).map(|i| Triplet::new(i, i, 1.0)).collect();
    SparseColMat::try_new_from_triplets(n, n, &triplets).unwrap()
}

/// Sparse matrix from an explicit triplet list.
///
/// Out-of-bounds triplets are a programming error and panic.
pub fn sp_from_triplets(nrows: usize, ncols: usize, triplets: &[Triplet<I, I, E>]) -> SparseColMat<I, E> {
    SparseColMat::try_new_from_triplets(nrows, ncols, triplets).unwrap()
}

fn sp_apply(m: &SparseColMat<I, E>, v: ColRef<'_, E>) -> Col<E> {
    let mut out = Col::zeros(m.nrows());
    for j in 0..m.ncols() {
        let vj = v[j];
        if vj != 0.0 {
            for idx in m.col_ptr()[j]..m.col_ptr()[j + 1] {
                out[m.row_idx()[idx]] += m.val()[idx] * vj;
            }
        }
    }
    out
}

fn sp_transpose_apply(m: &SparseColMat<I, E>, v: ColRef<'_, E>) -> Col<E> {
    let mut out = Col::zeros(m.ncols());
    for j in 0..m.ncols() {
        let mut acc = 0.0;
        for idx in m.col_ptr()[j]..m.col_ptr()[j + 1] {
            acc += m.val()[idx] * v[m.row_idx()[idx]];
        }
        out[j] = acc;
    }
    out
}

/// Sparse-sparse product `A·B` via column-wise gather.
pub fn spmm(a: &SparseColMat<I, E>, b: &SparseColMat<I, E>) -> SparseColMat<I, E> {
    assert_eq!(a.ncols(), b.nrows(), "spmm: inner dimensions differ");
    let nrows = a.nrows();
    let mut triplets = Vec::new();
    let mut acc = vec![0.0; nrows];
    let mut touched = Vec::with_capacity(nrows);
    for j in 0..b.ncols() {
        for idx_b in b.col_ptr()[j]..b.col_ptr()[j + 1] {
            let k = b.row_idx()[idx_b];
            let bkj = b.val()[idx_b];
            for idx_a in a.col_ptr()[k]..a.col_ptr()[k + 1] {
                let i = a.row_idx()[idx_a];
                if acc[i] == 0.0 {
                    touched.push(i);
                }
                acc[i] += a.val()[idx_a] * bkj;
            }
        }
        for &i in &touched {
            if acc[i] != 0.0 {
                triplets.push(Triplet::new(i, j, acc[i]));
            }
            acc[i] = 0.0;
        }
        touched.clear();
    }
    SparseColMat::try_new_from_triplets(nrows, b.ncols(), &triplets).unwrap()
}

/// Sparse sum `A + B` via column-wise merge.
pub fn sp_add(a: &SparseColMat<I, E>, b: &SparseColMat<I, E>) -> SparseColMat<I, E> {
    assert_eq!(a.nrows(), b.nrows(), "sp_add: row counts differ");
    assert_eq!(a.ncols(), b.ncols(), "sp_add: column counts differ");
    let mut triplets = Vec::with_capacity(a.compute_nnz() + b.compute_nnz());
    let mut acc = vec![0.0; a.nrows()];
    let mut touched = Vec::new();
    for j in 0..a.ncols() {
        for m in [a, b] {
            for idx in m.col_ptr()[j]..m.col_ptr()[j + 1] {
                let i = m.row_idx()[idx];
                if acc[i] == 0.0 {
                    touched.push(i);
                }
                acc[i] += m.val()[idx];
            }
        }
        for &i in &touched {
            if acc[i] != 0.0 {
                triplets.push(Triplet::new(i, j, acc[i]));
            }
            acc[i] = 0.0;
        }
        touched.clear();
    }
    SparseColMat::try_new_from_triplets(a.nrows(), a.ncols(), &triplets).unwrap()
}

pub fn sp_scale(m: &SparseColMat<I, E>, alpha: E) -> SparseColMat<I, E> {
    sp_map(m, |v| alpha * v)
}

fn sp_map(m: &SparseColMat<I, E>, f: impl Fn(E) -> E) -> SparseColMat<I, E> {
    let mut triplets = Vec::with_capacity(m.compute_nnz());
    for j in 0..m.ncols() {
        for idx in m.col_ptr()[j]..m.col_ptr()[j + 1] {
            triplets.push(Triplet::new(m.row_idx()[idx], j, f(m.val()[idx])));
        }
    }
    SparseColMat::try_new_from_triplets(m.nrows(), m.ncols(), &triplets).unwrap()
}

pub fn sp_to_dense(m: &SparseColMat<I, E>) -> Mat<E> {
    let mut out = Mat::zeros(m.nrows(), m.ncols());
    for j in 0..m.ncols() {
        for idx in m.col_ptr()[j]..m.col_ptr()[j + 1] {
            out[(m.row_idx()[idx], j)] += m.val()[idx];
        }
    }
    out
}

pub fn sp_from_dense(m: &Mat<E>) -> SparseColMat<I, E> {
    let mut triplets = Vec::new();
    for j in 0..m.ncols() {
        for i in 0..m.nrows() {
            if m[(i, j)] != 0.0 {
                triplets.push(Triplet::new(i, j, m[(i, j)]));
            }
        }
    }
    SparseColMat::try_new_from_triplets(m.nrows(), m.ncols(), &triplets).unwrap()
}

/// Whether the sparse sub-block `m[rows, cols]` holds no non-zero entry.
pub fn sp_block_is_zero(m: &SparseColMat<I, E>, rows: &Range<usize>, cols: &Range<usize>) -> bool {
    for j in cols.clone() {
        for idx in m.col_ptr()[j]..m.col_ptr()[j + 1] {
            let i = m.row_idx()[idx];
            if rows.contains(&i) && m.val()[idx] != 0.0 {
                return false;
            }
        }
    }
    true
}

/// Dense copy of `m[rows, cols]`.
pub fn dense_block(m: &Mat<E>, rows: &Range<usize>, cols: &Range<usize>) -> Mat<E> {
    Mat::from_fn(rows.len(), cols.len(), |i, j| m[(rows.start + i, cols.start + j)])
}

/// Dense copy of the sparse sub-block `m[rows, cols]`.
pub fn sp_block(m: &SparseColMat<I, E>, rows: Range<usize>, cols: Range<usize>) -> Mat<E> {
    let mut out = Mat::zeros(rows.len(), cols.len());
    for (jj, j) in cols.enumerate() {
        for idx in m.col_ptr()[j]..m.col_ptr()[j + 1] {
            let i = m.row_idx()[idx];
            if rows.contains(&i) {
                out[(i - rows.start, jj)] += m.val()[idx];
            }
        }
    }
    out
}

/// In-place dense product `dst = lhs · rhs` into a pre-sized scratch buffer.
pub fn mat_mul_into(dst: &mut Mat<E>, lhs: &Mat<E>, rhs: &Mat<E>) {
    faer::linalg::matmul::matmul(
        dst.as_mut(),
        faer::Accum::Replace,
        lhs.as_ref(),
        rhs.as_ref(),
        1.0,
        faer::Par::Seq,
    );
}
