//! Incremental Gauss-Jordan elimination over GF(2).
//!
//! The engine follows "When Boolean Satisfiability Meets Gaussian Elimination in a Simplex Way"
//! by Han and Jiang (CAV 2012): the XOR constraints are kept in reduced row echelon form and each
//! row watches two of its variables, one basic and one non-basic. Assignments to watched
//! variables trigger row inspection, which can produce propagations, conflicts, watch moves or a
//! column elimination restoring the echelon invariant.

use partial_ref::{partial, PartialRef};

use gaussat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::xor::Xor;

pub mod engine;
pub mod matrix;

pub use engine::{init_matrices, propagate_gauss};

use matrix::{BitRow, PackedMatrix};

/// Column sentinel for variables outside a matrix.
pub const UNASSIGNED_COL: u32 = u32::MAX;

/// Row sentinel for rows without a non-basic watch (zeroed rows).
pub const DEAD_ROW: u32 = u32::MAX;

/// Reference to a temporary reason or conflict clause owned by a matrix.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct GaussClauseRef {
    pub matrix: u32,
    pub index: u32,
}

/// A watch placed by a matrix row on a variable.
///
/// Unlike boolean clause watches these live in per-variable lists, as a parity row must react to
/// either polarity of its watched variables. `matrix` disambiguates watches of coexisting
/// matrices.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct GaussWatch {
    pub matrix: u32,
    pub row: u32,
}

/// One row-reduced matrix built from a connected component of XOR constraints.
pub struct GaussMatrix {
    pub(crate) rows: PackedMatrix,
    /// Variable owning each column.
    pub(crate) col_to_var: Vec<Var>,
    /// Column of each variable, `UNASSIGNED_COL` for variables outside this matrix.
    pub(crate) var_to_col: Vec<u32>,
    /// Whether a variable is currently the basic (pivot) variable of some row.
    pub(crate) var_is_basic: Vec<bool>,
    /// The non-basic watched variable of each row, `DEAD_ROW` for zeroed rows.
    pub(crate) nb_watch: Vec<u32>,
    /// Rows known to be satisfied until the next backtrack.
    pub(crate) sat_rows: BitRow,
    /// The constraints this matrix was built from.
    pub(crate) xors: Vec<Xor>,
    pub(crate) disabled: bool,
    /// Useful propagations and conflicts, for autodisable.
    pub(crate) useful: u64,
    /// Row inspections, for autodisable.
    pub(crate) calls: u64,
    /// Temporary reason/conflict clauses, freed on backtrack.
    pub(crate) temp_clauses: Vec<Vec<Lit>>,
    /// Trail length at allocation of each temporary clause.
    pub(crate) temp_marks: Vec<usize>,
}

impl GaussMatrix {
    /// Allocate a temporary clause and return its pool index.
    pub(crate) fn alloc_temp(&mut self, lits: Vec<Lit>, trail_len: usize) -> u32 {
        let index = self.temp_clauses.len() as u32;
        self.temp_clauses.push(lits);
        self.temp_marks.push(trail_len);
        index
    }
}

/// All Gauss matrices and their watches.
#[derive(Default)]
pub struct Matrices {
    pub(crate) matrices: Vec<GaussMatrix>,
    /// Per-variable watch lists.
    pub(crate) watches: Vec<Vec<GaussWatch>>,
    /// Cursor into the trail for Gauss propagation.
    pub(crate) queue_pos: usize,
    /// Set when autodisable found the matrices not worth their upkeep; suppresses rebuilding.
    pub(crate) suppressed: bool,
}

impl Matrices {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.watches.resize(count, vec![]);
    }

    /// Whether any enabled matrix exists.
    pub fn any_active(&self) -> bool {
        self.matrices.iter().any(|m| !m.disabled)
    }

    /// Number of matrices, including disabled ones.
    pub fn matrix_count(&self) -> usize {
        self.matrices.len()
    }

    /// The literals of a temporary reason or conflict clause.
    ///
    /// The propagated literal of a reason clause is in position 0.
    pub fn clause_lits(&self, gref: GaussClauseRef) -> &[Lit] {
        &self.matrices[gref.matrix as usize].temp_clauses[gref.index as usize]
    }

    /// Restart the propagation queue at the beginning of the trail.
    pub fn reset_queue(&mut self) {
        self.queue_pos = 0;
    }

    /// Drop all matrices and their watches.
    pub fn clear(&mut self) {
        self.matrices.clear();
        for list in self.watches.iter_mut() {
            list.clear();
        }
        self.queue_pos = 0;
    }

    /// Remove one specific row watch from a variable's list.
    pub(crate) fn remove_row_watch(&mut self, var: Var, matrix: u32, row: u32) {
        let list = &mut self.watches[var.index()];
        if let Some(pos) = list
            .iter()
            .position(|watch| watch.matrix == matrix && watch.row == row)
        {
            list.swap_remove(pos);
        }
    }
}

/// Release engine state that references the undone part of the trail.
///
/// Called on every backtrack: temporary clauses justified by undone assignments are freed and the
/// per-matrix satisfied-row bits are cleared wholesale.
pub fn canceling(mut ctx: partial!(Context, mut MatricesP), new_trail_len: usize) {
    let matrices = ctx.part_mut(MatricesP);

    matrices.queue_pos = matrices.queue_pos.min(new_trail_len);

    for matrix in matrices.matrices.iter_mut() {
        while let Some(&mark) = matrix.temp_marks.last() {
            if mark >= new_trail_len {
                matrix.temp_marks.pop();
                matrix.temp_clauses.pop();
            } else {
                break;
            }
        }
        matrix.sat_rows.clear();
    }
}
