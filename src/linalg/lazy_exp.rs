//! Deferred matrix exponential.
//!
//! [`LazyMatrixExp`] stores the *exponent* `M` and answers row/column
//! queries through the exponential action `exp(M)·v`, evaluated with a
//! scaled truncated Taylor expansion. Because the stored matrix is the
//! exponent, advancing to the next power of the transition matrix is the
//! in-place addition `M += M0`; after it, every query sees `exp(M + M0)`
//! exactly.

use std::ops::Range;

use faer::{Col, ColRef, Mat};

use crate::linalg::MatOp;
use crate::{E, ReachError};

/// Relative truncation tolerance of the Taylor expansion.
const TOL: E = 1e-15;
/// Hard cap on Taylor terms per scaling step.
const MAX_TERMS: usize = 120;

/// `exp(M)` represented by its exponent `M`, never materialized.
#[derive(Debug, Clone)]
pub struct LazyMatrixExp {
    exponent: MatOp,
}

impl LazyMatrixExp {
    pub fn new(exponent: MatOp) -> Self {
        assert_eq!(
            exponent.nrows(),
            exponent.ncols(),
            "lazy exponential: exponent must be square"
        );
        Self { exponent }
    }

    pub fn dim(&self) -> usize {
        self.exponent.nrows()
    }

    pub fn exponent(&self) -> &MatOp {
        &self.exponent
    }

    /// Advances the represented power: `exp(M)` becomes `exp(M + step)`.
    pub fn advance(&mut self, step: &MatOp) {
        assert_eq!(self.dim(), step.nrows(), "advance: dimension mismatch");
        self.exponent = self.exponent.add(step);
    }

    /// The action `exp(M)·v`.
    pub fn apply(&self, v: ColRef<'_, E>) -> Col<E> {
        expmv(&self.exponent, v, false)
    }

    /// The transposed action `exp(M)ᵀ·v = exp(Mᵀ)·v`.
    pub fn transpose_apply(&self, v: ColRef<'_, E>) -> Col<E> {
        expmv(&self.exponent, v, true)
    }

    /// Row `i` of `exp(M)`, as a length-`n` column.
    pub fn get_row(&self, i: usize) -> Col<E> {
        let n = self.dim();
        let e_i = Col::from_fn(n, |k| if k == i { 1.0 } else { 0.0 });
        self.transpose_apply(e_i.as_ref())
    }

    /// The row strip `exp(M)[rows, ..]`.
    pub fn get_rows(&self, rows: Range<usize>) -> Mat<E> {
        let n = self.dim();
        let mut out = Mat::zeros(rows.len(), n);
        for (ii, i) in rows.enumerate() {
            let row = self.get_row(i);
            for j in 0..n {
                out[(ii, j)] = row[j];
            }
        }
        out
    }

    /// The column strip `exp(M)[.., cols]`.
    pub fn get_columns(&self, cols: Range<usize>) -> Mat<E> {
        let n = self.dim();
        let mut out = Mat::zeros(n, cols.len());
        for (jj, j) in cols.enumerate() {
            let e_j = Col::from_fn(n, |k| if k == j { 1.0 } else { 0.0 });
            let col = self.apply(e_j.as_ref());
            for i in 0..n {
                out[(i, jj)] = col[i];
            }
        }
        out
    }

    /// Parallel column extraction. Not shipped; the sequential
    /// [`Self::get_columns`] is the only implementation.
    pub fn get_columns_parallel(&self, _cols: Range<usize>) -> Result<Mat<E>, ReachError> {
        Err(ReachError::NotImplemented {
            feature: "parallel column extraction of a lazy matrix exponential",
        })
    }
}

/// `exp(M)·v` (or `exp(Mᵀ)·v`) by `s`-fold scaling and truncated Taylor
/// expansion; `s` is chosen so the scaled exponent has norm at most one.
fn expmv(m: &MatOp, v: ColRef<'_, E>, transpose: bool) -> Col<E> {
    let n = m.nrows();
    let s = m.norm_inf().ceil().max(1.0) as usize;
    let inv_s = 1.0 / s as E;

    let mut y = Col::from_fn(n, |i| v[i]);
    for _ in 0..s {
        let mut term = y.clone();
        let mut acc = y.clone();
        for k in 1..=MAX_TERMS {
            let w = if transpose {
                m.transpose_apply(term.as_ref())
            } else {
                m.apply(term.as_ref())
            };
            let c = inv_s / k as E;
            term = Col::from_fn(n, |i| c * w[i]);
            acc = &acc + &term;
            if term.norm_l2() <= TOL * acc.norm_l2() {
                break;
            }
        }
        y = acc;
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::expm::expm;
    use crate::linalg::sp_from_triplets;
    use faer::sparse::Triplet;

    fn sample() -> MatOp {
        MatOp::Sparse(sp_from_triplets(
            3,
            3,
            &[
                Triplet::new(0, 0, 0.5),
                Triplet::new(0, 1, 1.2),
                Triplet::new(1, 2, -0.4),
                Triplet::new(2, 2, 0.9),
            ],
        ))
    }

    #[test]
    fn rows_and_columns_match_dense_exponential() {
        let lazy = LazyMatrixExp::new(sample());
        let dense = expm(&sample().to_dense()).unwrap();

        let cols = lazy.get_columns(0..3);
        assert!((&cols - &dense).norm_l2() < 1e-10);

        let row = lazy.get_row(0);
        for j in 0..3 {
            assert!((row[j] - dense[(0, j)]).abs() < 1e-10);
        }

        let strip = lazy.get_rows(1..3);
        for i in 0..2 {
            for j in 0..3 {
                assert!((strip[(i, j)] - dense[(i + 1, j)]).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn advance_shifts_to_the_next_power() {
        let base = sample();
        let mut lazy = LazyMatrixExp::new(base.clone());
        lazy.advance(&base);

        // exp(2M) = exp(M)·exp(M)
        let e1 = expm(&base.to_dense()).unwrap();
        let e2 = &e1 * &e1;
        assert!((&lazy.get_columns(0..3) - &e2).norm_l2() < 1e-9);
    }

    #[test]
    fn parallel_extraction_is_not_implemented() {
        let lazy = LazyMatrixExp::new(sample());
        assert!(matches!(
            lazy.get_columns_parallel(0..1),
            Err(ReachError::NotImplemented { .. })
        ));
    }
}
