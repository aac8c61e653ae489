//! Sparse LU factorization used by the matrix-exponential routines.
//!
//! A thin wrapper over faer's simplicial LU with a COLAMD fill-reducing
//! column ordering. The Padé denominators solved here are diagonally
//! dominant perturbations of the identity, so the simplicial factorization
//! is well suited.

use faer::dyn_stack::{MemBuffer, MemStack};
use faer::perm::Perm;
use faer::prelude::{Reborrow, ReborrowMut};
use faer::sparse::SparseColMatRef;
use faer::sparse::linalg::colamd;
use faer::sparse::linalg::lu::simplicial::{self, SimplicialLu};
use faer::MatMut;

use crate::linalg::solver::{FactorizationError, LinearSolver};
use crate::{E, I};

/// Sparse LU solver using the simplicial factorization method.
///
/// All fields stay empty until [`LinearSolver::factorize`] runs.
pub struct SparseLu {
    /// Numeric LU factors.
    lu: Option<SimplicialLu<I, E>>,
    /// Row permutation from partial pivoting.
    row_perm: Option<Perm<I>>,
    /// Fill-reducing column permutation.
    col_perm: Option<Perm<I>>,
}

impl LinearSolver for SparseLu {
    fn new() -> Self {
        Self {
            lu: None,
            row_perm: None,
            col_perm: None,
        }
    }

    fn factorize(&mut self, mat: SparseColMatRef<'_, I, E>) -> Result<(), FactorizationError> {
        let nrows = mat.nrows();
        let ncols = mat.ncols();
        let nnz = mat.compute_nnz();

        // COLAMD ordering of the columns.
        let (col_fwd, col_inv) = {
            let mut fwd = Vec::new();
            let mut inv = Vec::new();
            fwd.try_reserve_exact(ncols)
                .map_err(|_| FactorizationError::MemoryReservation)?;
            inv.try_reserve_exact(ncols)
                .map_err(|_| FactorizationError::MemoryReservation)?;
            fwd.resize(ncols, 0usize);
            inv.resize(ncols, 0usize);

            let mut mem = MemBuffer::try_new(colamd::order_scratch::<I>(nrows, ncols, nnz))
                .map_err(|_| FactorizationError::MemoryAllocation)?;
            colamd::order(
                &mut fwd,
                &mut inv,
                mat.symbolic(),
                colamd::Control::default(),
                MemStack::new(&mut mem),
            )
            .map_err(|e| FactorizationError::Symbolic {
                message: format!("colamd ordering failed: {e:?}"),
            })?;

            (fwd, inv)
        };
        let col_perm = unsafe { Perm::new_unchecked(col_fwd.into_boxed_slice(), col_inv.into_boxed_slice()) };

        // Numeric factorization with partial pivoting.
        let mut row_fwd = Vec::new();
        let mut row_inv = Vec::new();
        row_fwd
            .try_reserve_exact(nrows)
            .map_err(|_| FactorizationError::MemoryReservation)?;
        row_inv
            .try_reserve_exact(nrows)
            .map_err(|_| FactorizationError::MemoryReservation)?;
        row_fwd.resize(nrows, 0usize);
        row_inv.resize(nrows, 0usize);

        let mut lu = SimplicialLu::new();
        let mut mem =
            MemBuffer::try_new(simplicial::factorize_simplicial_numeric_lu_scratch::<I, E>(nrows, ncols))
                .map_err(|_| FactorizationError::MemoryAllocation)?;
        let mut stack = MemStack::new(&mut mem);

        simplicial::factorize_simplicial_numeric_lu::<I, E>(
            &mut row_fwd,
            &mut row_inv,
            &mut lu,
            mat.rb(),
            col_perm.as_ref(),
            &mut stack,
        )
        .map_err(|e| FactorizationError::Numeric {
            message: format!("{e:?}"),
        })?;

        self.row_perm = Some(unsafe { Perm::new_unchecked(row_fwd.into_boxed_slice(), row_inv.into_boxed_slice()) });
        self.col_perm = Some(col_perm);
        self.lu = Some(lu);

        Ok(())
    }

    fn solve_in_place(&self, mut sol: MatMut<'_, E>) -> Result<(), FactorizationError> {
        let lu = self.lu.as_ref().ok_or(FactorizationError::Uninitialized {
            message: "LU factors",
        })?;
        let row_perm = self.row_perm.as_ref().ok_or(FactorizationError::Uninitialized {
            message: "row permutation",
        })?;
        let col_perm = self.col_perm.as_ref().ok_or(FactorizationError::Uninitialized {
            message: "column permutation",
        })?;

        let mut mem = MemBuffer::try_new(faer::perm::permute_rows_in_place_scratch::<I, E>(
            lu.nrows(),
            sol.ncols(),
        ))
        .map_err(|_| FactorizationError::MemoryAllocation)?;
        let mut stack = MemStack::new(&mut mem);
        lu.solve_in_place_with_conj(
            row_perm.as_ref(),
            col_perm.as_ref(),
            faer::Conj::No,
            sol.rb_mut(),
            faer::Par::Seq,
            &mut stack,
        );

        Ok(())
    }
}
