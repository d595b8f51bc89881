//! Matrix construction and incremental Gauss-Jordan propagation.
use partial_ref::{partial, PartialRef};

use gaussat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, propagate, Assignment, Conflict, Reason};
use crate::xor::{attach_two_xor, clean_xor, CleanedXor, Xor};

use super::matrix::{BitRow, PackedMatrix};
use super::{GaussClauseRef, GaussMatrix, GaussWatch, DEAD_ROW, UNASSIGNED_COL};

/// Outcome of inspecting a single matrix row under the current assignment.
enum RowState {
    /// All variables assigned with matching parity.
    Sat,
    /// An unassigned non-basic variable that can take over a watch.
    NewWatch(Var),
    /// Exactly one variable unassigned; `clause` justifies assigning `lit` and has it in
    /// position 0.
    Propagate { lit: Lit, clause: Vec<Lit> },
    /// All variables assigned with violated parity; `clause` is falsified.
    Conflict { clause: Vec<Lit> },
}

/// What happens to the watch entry that triggered a row inspection.
enum FindOutcome {
    Keep,
    Drop,
    /// The watch moved to a variable that thereby became basic; `eliminate_col` has to run.
    Eliminate(Var),
    ConflictKeep(Conflict),
    ConflictDrop(Conflict),
}

/// Result of building a single matrix.
enum BuildOutcome {
    Built,
    /// Component over the size limit, left to the CNF encoding.
    Skipped,
    /// The build derived new top-level facts; all matrices have to be rebuilt.
    Restart,
}

/// Build Gauss matrices from the current XOR constraint set.
///
/// May only be called at decision level 0 with all assignments propagated. Cleans the XOR set
/// against the top-level assignment, partitions it into connected components and builds one
/// row-reduced matrix per component, within the configured matrix count and size limits.
///
/// Returns whether any matrix was created; `Err(())` signals top-level unsatisfiability.
pub fn init_matrices(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut EquivP,
        mut ImplGraphP,
        mut MatricesP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
        mut XorStoreP,
        SolverConfigP,
        VsidsP,
    ),
) -> Result<bool, ()> {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    ctx.part_mut(MatricesP).clear();
    ctx.part_mut(XorStoreP).updated = false;

    if ctx.part(MatricesP).suppressed {
        return Ok(false);
    }

    let max_num_matrices = ctx.part(SolverConfigP).max_num_matrices;
    let min_matrix_rows = ctx.part(SolverConfigP).min_matrix_rows;

    'rebuild: loop {
        clean_xor_set(ctx.borrow())?;

        let components = connected_components(ctx.borrow());
        if components.is_empty() {
            return Ok(false);
        }

        let mut built_any = false;
        let mut matrix_id = 0u32;

        for component in components {
            if (matrix_id as usize) >= max_num_matrices {
                break;
            }
            if component.len() < min_matrix_rows {
                continue;
            }

            match build_matrix(ctx.borrow(), matrix_id, component)? {
                BuildOutcome::Built => {
                    matrix_id += 1;
                    built_any = true;
                }
                BuildOutcome::Skipped => (),
                BuildOutcome::Restart => {
                    ctx.part_mut(MatricesP).clear();
                    continue 'rebuild;
                }
            }
        }

        let trail_len = ctx.part(TrailP).trail().len();
        ctx.part_mut(MatricesP).queue_pos = trail_len;
        ctx.part_mut(StatsP).gauss_matrices_built += matrix_id as u64;

        return Ok(built_any);
    }
}

/// Clean every stored XOR against the top-level assignment until a fixed point is reached.
///
/// Two-variable constraints are turned into binary clauses, single-variable ones into units.
/// `Err(())` signals top-level unsatisfiability.
fn clean_xor_set(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut EquivP,
        mut ImplGraphP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
        mut XorStoreP,
    ),
) -> Result<(), ()> {
    loop {
        let trail_len = ctx.part(TrailP).trail().len();

        let mut xors = std::mem::take(&mut ctx.part_mut(XorStoreP).xors);
        let mut kept = Vec::with_capacity(xors.len());
        let mut unsat = false;

        for mut xor in xors.drain(..) {
            if unsat {
                kept.push(xor);
                continue;
            }
            match clean_xor(ctx.borrow(), &mut xor) {
                CleanedXor::Kept if xor.len() == 2 => {
                    attach_two_xor(ctx.borrow(), xor.vars[0], xor.vars[1], xor.rhs);
                    if !xor.clash_vars.is_empty() {
                        ctx.part_mut(XorStoreP).unused.push(xor);
                    }
                }
                CleanedXor::Kept => kept.push(xor),
                CleanedXor::Trivial => {
                    if !xor.clash_vars.is_empty() {
                        ctx.part_mut(XorStoreP).unused.push(xor);
                    }
                }
                CleanedXor::Unsat => unsat = true,
            }
        }
        ctx.part_mut(XorStoreP).xors = kept;

        if unsat {
            return Err(());
        }

        if ctx.part(TrailP).trail().len() == trail_len {
            return Ok(());
        }
        if propagate(ctx.borrow()).is_err() {
            return Err(());
        }
    }
}

/// Partition the stored XORs into connected components over shared variables.
///
/// Each returned component is a set of cloned constraints, largest components first.
fn connected_components(mut ctx: partial!(Context, XorStoreP, AssignmentP)) -> Vec<Vec<Xor>> {
    let xors = &ctx.part(XorStoreP).xors;
    if xors.is_empty() {
        return vec![];
    }

    let var_count = ctx.part(AssignmentP).assignment().len();
    let mut root_of_var: Vec<u32> = vec![u32::max_value(); var_count];

    // Union-find over XOR indices, keyed through the first occurrence of each variable.
    let mut parent: Vec<u32> = (0..xors.len() as u32).collect();

    fn find(parent: &mut Vec<u32>, mut x: u32) -> u32 {
        while parent[x as usize] != x {
            let grand = parent[parent[x as usize] as usize];
            parent[x as usize] = grand;
            x = grand;
        }
        x
    }

    for (index, xor) in xors.iter().enumerate() {
        for &var in xor.vars.iter() {
            let slot = &mut root_of_var[var.index()];
            if *slot == u32::max_value() {
                *slot = index as u32;
            } else {
                let a = find(&mut parent, *slot);
                let b = find(&mut parent, index as u32);
                if a != b {
                    parent[a as usize] = b;
                }
            }
        }
    }

    let mut groups: Vec<Vec<Xor>> = vec![vec![]; xors.len()];
    for (index, xor) in xors.iter().enumerate() {
        let root = find(&mut parent, index as u32);
        groups[root as usize].push(xor.clone());
    }

    groups.retain(|group| !group.is_empty());
    groups.sort_by_key(|group| std::cmp::Reverse(group.len()));
    groups
}

/// Build and install a single matrix from one component of XOR constraints.
fn build_matrix(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut EquivP,
        mut ImplGraphP,
        mut MatricesP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
        SolverConfigP,
        VsidsP,
    ),
    matrix_id: u32,
    xors: Vec<Xor>,
) -> Result<BuildOutcome, ()> {
    let var_count = ctx.part(AssignmentP).assignment().len();
    let max_matrix_size = ctx
        .part(SolverConfigP)
        .max_matrix_size
        .min((u32::max_value() / 2 - 1) as usize);

    // Column order: high VSIDS activity first; variables outside the activity order would end up
    // at the tail either way since their activity is zero.
    let mut vars_needed: Vec<Var> = vec![];
    {
        let mut seen = vec![false; var_count];
        for xor in xors.iter() {
            for &var in xor.vars.iter() {
                debug_assert!(ctx.part(AssignmentP).var_is_unk(var));
                if !seen[var.index()] {
                    seen[var.index()] = true;
                    vars_needed.push(var);
                }
            }
        }
    }

    if xors.len() > max_matrix_size || vars_needed.len() > max_matrix_size {
        log::debug!(
            "matrix {} skipped: {} rows, {} cols over limit",
            matrix_id,
            xors.len(),
            vars_needed.len()
        );
        return Ok(BuildOutcome::Skipped);
    }

    {
        let vsids = ctx.part(VsidsP);
        vars_needed.sort_by(|&a, &b| {
            vsids
                .activity(b)
                .partial_cmp(&vsids.activity(a))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
    }

    let num_cols = vars_needed.len();
    let mut col_to_var = Vec::with_capacity(num_cols);
    let mut var_to_col = vec![UNASSIGNED_COL; var_count];
    for (col, &var) in vars_needed.iter().enumerate() {
        col_to_var.push(var);
        var_to_col[var.index()] = col as u32;
    }

    // Fill the dense matrix, one row per XOR.
    let mut rows = PackedMatrix::new(xors.len(), num_cols);
    for (row, xor) in xors.iter().enumerate() {
        for &var in xor.vars.iter() {
            rows.set(row, var_to_col[var.index()] as usize, true);
        }
        rows.set_rhs(row, xor.rhs);
    }

    // Gauss-Jordan reduction.
    let mut var_is_basic = vec![false; var_count];
    let rank = eliminate(&mut rows, &col_to_var, &mut var_is_basic);

    // All-zero rows end up past the rank; a remaining rhs bit there means 0 = 1.
    for row in rank..rows.num_rows() {
        debug_assert_eq!(rows.popcount(row), 0);
        if rows.rhs(row) {
            return Err(());
        }
    }
    rows.truncate_rows(rank);

    // Inspect each remaining row and install watches.
    let mut nb_watch = Vec::with_capacity(rank);
    let mut watches: Vec<(Var, u32)> = vec![];

    for row in 0..rank {
        let rhs = rows.rhs(row);
        let mut cols = rows.iter_set_cols(row);
        let first = cols.next();
        let second = cols.next();
        let third = cols.next();
        drop(cols);

        match (first, second, third) {
            (None, _, _) => unreachable!("rows within the rank have a pivot"),
            (Some(col), None, _) => {
                // Derived unit; enqueue it and rebuild from the cleaned XOR set.
                let lit = col_to_var[col].lit(rhs);
                ctx.part_mut(ProofP).add_clause(&[lit]);
                ctx.part_mut(StatsP).xor_units += 1;
                enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
                if propagate(ctx.borrow()).is_err() {
                    return Err(());
                }
                return Ok(BuildOutcome::Restart);
            }
            (Some(col_a), Some(col_b), None) => {
                // Derived binary; hand it to the watchlists and drop the row.
                attach_two_xor(ctx.borrow(), col_to_var[col_a], col_to_var[col_b], rhs);
                var_is_basic[col_to_var[col_a].index()] = false;
                rows.set_row_zero(row);
                nb_watch.push(DEAD_ROW);
            }
            (Some(col_basic), Some(col_nb), Some(_)) => {
                let basic_var = col_to_var[col_basic];
                let nb_var = col_to_var[col_nb];
                debug_assert!(var_is_basic[basic_var.index()]);
                debug_assert!(!var_is_basic[nb_var.index()]);

                watches.push((basic_var, row as u32));
                watches.push((nb_var, row as u32));
                nb_watch.push(nb_var.index() as u32);
            }
        }
    }

    let matrix = GaussMatrix {
        sat_rows: BitRow::new(rows.num_rows()),
        rows,
        col_to_var,
        var_to_col,
        var_is_basic,
        nb_watch,
        xors,
        disabled: false,
        useful: 0,
        calls: 0,
        temp_clauses: vec![],
        temp_marks: vec![],
    };

    let matrices = ctx.part_mut(MatricesP);
    debug_assert_eq!(matrices.matrices.len(), matrix_id as usize);
    matrices.matrices.push(matrix);
    for (var, row) in watches {
        matrices.watches[var.index()].push(GaussWatch {
            matrix: matrix_id,
            row,
        });
    }

    Ok(BuildOutcome::Built)
}

/// Gauss-Jordan reduction of a packed matrix.
///
/// Returns the rank. Pivot variables are flagged in `var_is_basic`.
fn eliminate(rows: &mut PackedMatrix, col_to_var: &[Var], var_is_basic: &mut [bool]) -> usize {
    let mut pivot_row = 0;

    for col in 0..rows.num_cols() {
        if pivot_row == rows.num_rows() {
            break;
        }

        let found = (pivot_row..rows.num_rows()).find(|&row| rows.get(row, col));
        let row = match found {
            Some(row) => row,
            None => continue,
        };

        rows.swap_rows(pivot_row, row);

        for other in 0..rows.num_rows() {
            if other != pivot_row && rows.get(other, col) {
                rows.xor_rows(other, pivot_row);
            }
        }

        var_is_basic[col_to_var[col].index()] = true;
        pivot_row += 1;
    }

    pivot_row
}

/// Propagate all trail assignments not yet seen by the Gauss engine.
///
/// Runs after boolean propagation has quiesced; any propagation enqueued here is in turn handled
/// by the boolean engine, so the caller alternates until an overall fixed point.
pub fn propagate_gauss(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut MatricesP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
    ),
) -> Result<(), Conflict> {
    loop {
        let pos = ctx.part(MatricesP).queue_pos;
        let lit = match ctx.part(TrailP).trail().get(pos) {
            Some(&lit) => lit,
            None => return Ok(()),
        };
        ctx.part_mut(MatricesP).queue_pos += 1;
        propagate_var(ctx.borrow(), lit.var())?;
    }
}

/// Handle all row watches of a newly assigned variable.
fn propagate_var(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut MatricesP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
    ),
    var: Var,
) -> Result<(), Conflict> {
    if ctx.part(MatricesP).watches[var.index()].is_empty() {
        return Ok(());
    }

    let mut watch_list = std::mem::take(&mut ctx.part_mut(MatricesP).watches[var.index()]);

    let mut read = 0;
    let mut write = 0;
    // Watches that rows re-placed on this variable during column elimination. They become active
    // again once the variable is unassigned by backtracking.
    let mut new_for_var: Vec<GaussWatch> = vec![];

    let mut result = Ok(());

    while read < watch_list.len() {
        let watch = watch_list[read];
        read += 1;

        match find_truths(ctx.borrow(), watch, var) {
            FindOutcome::Keep => {
                watch_list[write] = watch;
                write += 1;
            }
            FindOutcome::Drop => (),
            FindOutcome::Eliminate(e_var) => {
                if let Err(conflict) =
                    eliminate_col(ctx.borrow(), watch, e_var, var, &mut new_for_var)
                {
                    result = Err(conflict);
                    break;
                }
            }
            FindOutcome::ConflictKeep(conflict) => {
                watch_list[write] = watch;
                write += 1;
                result = Err(conflict);
                break;
            }
            FindOutcome::ConflictDrop(conflict) => {
                result = Err(conflict);
                break;
            }
        }
    }

    while read < watch_list.len() {
        watch_list[write] = watch_list[read];
        write += 1;
        read += 1;
    }
    watch_list.truncate(write);
    watch_list.extend(new_for_var);

    let list = &mut ctx.part_mut(MatricesP).watches[var.index()];
    debug_assert!(list.is_empty());
    *list = watch_list;

    result
}

/// Re-establish the watch invariant of one row after its watched variable `p` was assigned.
fn find_truths(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut MatricesP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
    ),
    watch: GaussWatch,
    p: Var,
) -> FindOutcome {
    let (matrices, mut ctx) = ctx.split_part_mut(MatricesP);

    let m_idx = watch.matrix as usize;
    let row = watch.row as usize;

    {
        let matrix = &matrices.matrices[m_idx];
        if matrix.disabled || matrix.nb_watch[row] == DEAD_ROW {
            return FindOutcome::Drop;
        }
        if matrix.sat_rows.get(row) {
            return FindOutcome::Keep;
        }
    }

    let matrix = &mut matrices.matrices[m_idx];
    matrix.calls += 1;

    let orig_basic = matrix.var_is_basic[p.index()];
    let old_nb = Var::from_index(matrix.nb_watch[row] as usize);

    if orig_basic {
        // Swap the basic and non-basic roles so the watch search proceeds uniformly.
        matrix.var_is_basic[old_nb.index()] = true;
        matrix.var_is_basic[p.index()] = false;
    }

    let restore = |matrix: &mut GaussMatrix| {
        if orig_basic {
            matrix.var_is_basic[old_nb.index()] = false;
            matrix.var_is_basic[p.index()] = true;
        }
    };

    match inspect_row(matrix, ctx.part(AssignmentP), row, p) {
        RowState::Sat => {
            matrix.sat_rows.set(row);
            restore(matrix);
            FindOutcome::Keep
        }
        RowState::NewWatch(v) => {
            if !orig_basic {
                // Plain watch move to another non-basic variable.
                matrix.nb_watch[row] = v.index() as u32;
                matrices.watches[v.index()].push(watch);
                FindOutcome::Drop
            } else {
                // `p` was basic, so the replacement variable becomes the new basic variable of
                // this row and has to be eliminated from every other row. The previous non-basic
                // watch keeps its role.
                matrix.var_is_basic[old_nb.index()] = false;
                matrix.var_is_basic[v.index()] = true;

                // The new basic variable may no longer watch any other row of this matrix; those
                // rows get new watches during elimination.
                matrices.watches[v.index()].retain(|w| w.matrix != watch.matrix);
                matrices.watches[v.index()].push(watch);
                debug_assert_eq!(
                    matrices.watches[v.index()]
                        .iter()
                        .filter(|w| w.matrix == watch.matrix)
                        .count(),
                    1
                );
                FindOutcome::Eliminate(v)
            }
        }
        RowState::Propagate { lit, clause } => {
            matrix.sat_rows.set(row);
            matrix.useful += 1;
            restore(matrix);
            ctx.part_mut(StatsP).gauss_propagations += 1;

            if ctx.part(TrailP).current_level() == 0 {
                enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
            } else {
                let trail_len = ctx.part(TrailP).trail().len();
                let index = matrices.matrices[m_idx].alloc_temp(clause, trail_len);
                enqueue_assignment(
                    ctx.borrow(),
                    lit,
                    Reason::Gauss(GaussClauseRef {
                        matrix: watch.matrix,
                        index,
                    }),
                );
            }
            FindOutcome::Keep
        }
        RowState::Conflict { clause } => {
            ctx.part_mut(StatsP).gauss_conflicts += 1;
            let matrix = &mut matrices.matrices[m_idx];
            matrix.useful += 1;

            if clause.len() == 2 {
                // The row reduced to a permanently binary constraint: attach it as a binary
                // clause and retire the row.
                let other = if clause[0].var() == p {
                    clause[1].var()
                } else {
                    clause[0].var()
                };
                matrices.remove_row_watch(other, watch.matrix, watch.row);

                let matrix = &mut matrices.matrices[m_idx];
                matrix.rows.set_row_zero(row);
                matrix.nb_watch[row] = DEAD_ROW;
                matrix.var_is_basic[clause[0].index()] = false;
                matrix.var_is_basic[clause[1].index()] = false;

                ctx.part_mut(ProofP).add_clause(&clause);
                ctx.part_mut(WatchlistsP).add_binary([clause[0], clause[1]]);

                FindOutcome::ConflictDrop(Conflict::Binary([clause[0], clause[1]]))
            } else {
                restore(matrix);
                let trail_len = ctx.part(TrailP).trail().len();
                let index = matrices.matrices[m_idx].alloc_temp(clause, trail_len);
                FindOutcome::ConflictKeep(Conflict::Gauss(GaussClauseRef {
                    matrix: watch.matrix,
                    index,
                }))
            }
        }
    }
}

/// Restore the single-basic-variable invariant after `e_var` became basic in row `e_watch.row`.
///
/// Every other row with a bit in `e_var`'s column gets the new pivot row xored in. Rows whose
/// non-basic watch disappears by that addition are re-examined and re-watched; rows that cannot
/// find a watch are parked on `p`, the variable whose assignment triggered all of this, so they
/// are revisited when `p` flips back on backtracking.
fn eliminate_col(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut MatricesP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
    ),
    e_watch: GaussWatch,
    e_var: Var,
    p: Var,
    new_for_p: &mut Vec<GaussWatch>,
) -> Result<(), Conflict> {
    let (matrices, mut ctx) = ctx.split_part_mut(MatricesP);

    let m_idx = e_watch.matrix as usize;
    let e_row = e_watch.row as usize;
    let e_col = matrices.matrices[m_idx].var_to_col[e_var.index()] as usize;
    let num_rows = matrices.matrices[m_idx].rows.num_rows();

    let mut conflict: Option<Conflict> = None;

    for row in 0..num_rows {
        if row == e_row {
            continue;
        }

        let matrix = &mut matrices.matrices[m_idx];
        if !matrix.rows.get(row, e_col) {
            continue;
        }
        debug_assert_ne!(matrix.nb_watch[row], DEAD_ROW);

        let ori_nb = Var::from_index(matrix.nb_watch[row] as usize);
        let ori_nb_col = matrix.var_to_col[ori_nb.index()] as usize;
        debug_assert!(matrix.rows.get(row, ori_nb_col));

        matrix.rows.xor_rows(row, e_row);

        if matrix.rows.get(row, ori_nb_col) {
            // The non-basic watch survived the row addition.
            continue;
        }

        if ori_nb != e_var {
            matrices.watches[ori_nb.index()]
                .retain(|w| !(w.matrix == e_watch.matrix && w.row == row as u32));
        }

        let matrix = &mut matrices.matrices[m_idx];
        matrix.calls += 1;
        let fresh_watch = GaussWatch {
            matrix: e_watch.matrix,
            row: row as u32,
        };

        match inspect_row(matrix, ctx.part(AssignmentP), row, ori_nb) {
            RowState::NewWatch(v) => {
                matrix.nb_watch[row] = v.index() as u32;
                matrices.watches[v.index()].push(fresh_watch);
            }
            RowState::Sat => {
                matrix.nb_watch[row] = p.index() as u32;
                matrix.sat_rows.set(row);
                new_for_p.push(fresh_watch);
            }
            RowState::Propagate { lit, clause } => {
                matrix.nb_watch[row] = p.index() as u32;
                new_for_p.push(fresh_watch);

                if conflict.is_none() {
                    matrix.sat_rows.set(row);
                    matrix.useful += 1;
                    ctx.part_mut(StatsP).gauss_propagations += 1;
                    if ctx.part(TrailP).current_level() == 0 {
                        enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
                    } else {
                        let trail_len = ctx.part(TrailP).trail().len();
                        let index = matrices.matrices[m_idx].alloc_temp(clause, trail_len);
                        enqueue_assignment(
                            ctx.borrow(),
                            lit,
                            Reason::Gauss(GaussClauseRef {
                                matrix: e_watch.matrix,
                                index,
                            }),
                        );
                    }
                }
            }
            RowState::Conflict { clause } => {
                matrix.nb_watch[row] = p.index() as u32;
                new_for_p.push(fresh_watch);

                if conflict.is_none() {
                    matrix.useful += 1;
                    ctx.part_mut(StatsP).gauss_conflicts += 1;
                    let trail_len = ctx.part(TrailP).trail().len();
                    let index = matrices.matrices[m_idx].alloc_temp(clause, trail_len);
                    conflict = Some(Conflict::Gauss(GaussClauseRef {
                        matrix: e_watch.matrix,
                        index,
                    }));
                }
            }
        }
    }

    match conflict {
        Some(conflict) => Err(conflict),
        None => Ok(()),
    }
}

/// Classify a row under the current assignment.
///
/// `skip` is the variable whose assignment (or elimination from the row) triggered the
/// inspection; it is never proposed as a new watch.
fn inspect_row(matrix: &GaussMatrix, assignment: &Assignment, row: usize, skip: Var) -> RowState {
    let mut parity = false;
    let mut nb_candidate: Option<Var> = None;
    let mut undef: Option<Var> = None;
    let mut undef_count = 0;
    let mut falsified: Vec<Lit> = vec![];

    for col in matrix.rows.iter_set_cols(row) {
        let var = matrix.col_to_var[col];
        match assignment.var_value(var) {
            Some(value) => {
                parity ^= value;
                falsified.push(var.lit(!value));
            }
            None => {
                undef_count += 1;
                if undef.is_none() {
                    undef = Some(var);
                }
                if nb_candidate.is_none() && var != skip && !matrix.var_is_basic[var.index()] {
                    nb_candidate = Some(var);
                }
            }
        }
    }

    let rhs = matrix.rows.rhs(row);

    if undef_count == 0 {
        if parity == rhs {
            RowState::Sat
        } else {
            RowState::Conflict { clause: falsified }
        }
    } else if undef_count == 1 {
        let var = undef.expect("unassigned variable counted");
        let lit = var.lit(rhs ^ parity);
        let mut clause = Vec::with_capacity(falsified.len() + 1);
        clause.push(lit);
        clause.extend(falsified);
        RowState::Propagate { lit, clause }
    } else {
        match nb_candidate {
            Some(var) => RowState::NewWatch(var),
            None => {
                // With two or more unassigned variables and at most one basic variable per row
                // there is always a non-basic candidate.
                debug_assert!(false, "no watch candidate in a row with unassigned variables");
                RowState::NewWatch(undef.expect("unassigned variable counted"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use gaussat_formula::vars;

    use crate::context::set_var_count;
    use crate::prop::backtrack;

    fn push_xor(ctx: &mut Context, vars: &[Var], rhs: bool) {
        ctx.xor_store.push(Xor::new(vars.to_vec(), rhs));
    }

    #[test]
    fn init_builds_one_matrix_per_component() {
        let mut ctx = Context::default();
        {
            let mut ctx_ref = ctx.into_partial_ref_mut();
            set_var_count(ctx_ref.borrow(), 6);
        }

        push_xor(&mut ctx, &vars![1, 2, 3], false);
        push_xor(&mut ctx, &vars![1, 4, 5], false);
        push_xor(&mut ctx, &vars![2, 4, 6], false);

        let mut ctx = ctx.into_partial_ref_mut();
        let created = init_matrices(ctx.borrow()).unwrap();
        assert!(created);

        let matrices = ctx.part(MatricesP);
        assert_eq!(matrices.matrix_count(), 1);
        assert!(matrices.any_active());
        assert_eq!(matrices.matrices[0].rows.num_rows(), 3);

        // Two watches per live row.
        let watch_entries: usize = matrices.watches.iter().map(|list| list.len()).sum();
        assert_eq!(watch_entries, 6);

        // The column permutation is consistent and every row has exactly one basic variable,
        // distinct across rows.
        let matrix = &matrices.matrices[0];
        for (col, &var) in matrix.col_to_var.iter().enumerate() {
            assert_eq!(matrix.var_to_col[var.index()] as usize, col);
        }
        let mut basics = vec![];
        for row in 0..matrix.rows.num_rows() {
            let row_basics: Vec<Var> = matrix
                .rows
                .iter_set_cols(row)
                .map(|col| matrix.col_to_var[col])
                .filter(|var| matrix.var_is_basic[var.index()])
                .collect();
            assert_eq!(row_basics.len(), 1);
            basics.push(row_basics[0]);
        }
        basics.sort_unstable();
        basics.dedup();
        assert_eq!(basics.len(), matrix.rows.num_rows());
    }

    #[test]
    fn dependent_rows_derive_units_and_binaries() {
        let mut ctx = Context::default();
        {
            let mut ctx_ref = ctx.into_partial_ref_mut();
            set_var_count(ctx_ref.borrow(), 4);
        }

        // Echelonization reduces these to the unit 1 = true plus pairwise equivalences.
        push_xor(&mut ctx, &vars![1, 2, 3], true);
        push_xor(&mut ctx, &vars![1, 2, 4], false);
        push_xor(&mut ctx, &vars![1, 3, 4], false);

        let mut ctx = ctx.into_partial_ref_mut();
        let created = init_matrices(ctx.borrow()).unwrap();

        // Everything reduced away, no matrix remains.
        assert!(!created);
        assert_eq!(
            ctx.part(AssignmentP).var_value(vars![1][0]),
            Some(true)
        );
        // 2 xor 3 = 0 survives as the binary equivalence of 2 and 3.
        assert!(ctx
            .part(WatchlistsP)
            .has_binary([vars![2][0].positive(), vars![3][0].negative()]));
    }

    #[test]
    fn contradicting_dependent_rows_are_unsat() {
        let mut ctx = Context::default();
        {
            let mut ctx_ref = ctx.into_partial_ref_mut();
            set_var_count(ctx_ref.borrow(), 5);
        }

        // The three rows sum to the empty parity with right hand side 1.
        push_xor(&mut ctx, &vars![1, 2, 3], true);
        push_xor(&mut ctx, &vars![3, 4, 5], false);
        push_xor(&mut ctx, &vars![1, 2, 4, 5], false);

        let mut ctx = ctx.into_partial_ref_mut();
        assert!(init_matrices(ctx.borrow()).is_err());
    }

    #[test]
    fn assigned_watches_move_and_rows_propagate() {
        let mut ctx = Context::default();
        {
            let mut ctx_ref = ctx.into_partial_ref_mut();
            set_var_count(ctx_ref.borrow(), 6);
        }

        push_xor(&mut ctx, &vars![1, 2, 3], false);
        push_xor(&mut ctx, &vars![1, 4, 5], false);
        push_xor(&mut ctx, &vars![2, 4, 6], false);

        let mut ctx = ctx.into_partial_ref_mut();
        assert!(init_matrices(ctx.borrow()).unwrap());

        // Decide 4 = true and 5 = true; the row 1 ⊕ 4 ⊕ 5 = 0 then forces 1 = false.
        for &lit in [vars![4][0].positive(), vars![5][0].positive()].iter() {
            ctx.part_mut(TrailP).new_decision_level();
            enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
            propagate(ctx.borrow()).unwrap();
            propagate_gauss(ctx.borrow()).unwrap();
            while !ctx.part(TrailP).fully_propagated() {
                propagate(ctx.borrow()).unwrap();
                propagate_gauss(ctx.borrow()).unwrap();
            }
        }

        assert_eq!(
            ctx.part(AssignmentP).var_value(vars![1][0]),
            Some(false)
        );
        assert!(matches!(
            *ctx.part(ImplGraphP).reason(vars![1][0]),
            Reason::Gauss(_)
        ));
        assert!(ctx
            .part(MatricesP)
            .matrices
            .iter()
            .any(|matrix| !matrix.temp_clauses.is_empty()));

        // Backtracking releases the temporary reason clauses.
        backtrack(ctx.borrow(), 0);
        assert!(ctx
            .part(MatricesP)
            .matrices
            .iter()
            .all(|matrix| matrix.temp_clauses.is_empty()));
        assert!(ctx.part(AssignmentP).var_is_unk(vars![1][0]));
    }
}
