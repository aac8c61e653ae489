use derive_more::{Display, Error};
use faer::sparse::SparseColMatRef;
use faer::{Mat, MatMut, MatRef};

use crate::{E, I};

#[derive(Debug, Display, Error, PartialEq)]
pub enum FactorizationError {
    #[display("symbolic analysis failed: {message}")]
    Symbolic { message: String },

    #[display("numeric LU factorization failed: {message}")]
    Numeric { message: String },

    #[display("solver used before factorization: {message}")]
    Uninitialized { message: &'static str },

    #[display("memory reservation failed")]
    MemoryReservation,

    #[display("memory allocation failed")]
    MemoryAllocation,
}

/// Direct solver for square sparse linear systems.
///
/// Implementors factorize once and then solve for any number of right-hand
/// sides. The matrix-exponential routines use this to apply the inverse of a
/// Padé denominator without ever forming it.
pub trait LinearSolver {
    fn new() -> Self
    where
        Self: Sized;

    /// Computes a fill-reducing ordering and the numeric factorization of
    /// `mat`. Must be called before any solve.
    fn factorize(&mut self, mat: SparseColMatRef<'_, I, E>) -> Result<(), FactorizationError>;

    /// Solves `A x = b` in place, overwriting `b` with the solution.
    fn solve_in_place(&self, b: MatMut<'_, E>) -> Result<(), FactorizationError>;

    /// Solves `A x = b` and returns the solution matrix.
    fn solve(&self, b: MatRef<'_, E>) -> Result<Mat<E>, FactorizationError> {
        let mut sol = Mat::zeros(b.nrows(), b.ncols());
        sol.copy_from(b);
        self.solve_in_place(sol.as_mut())?;
        Ok(sol)
    }
}
