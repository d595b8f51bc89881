//! Detaching XOR-encoding clauses once Gauss matrices own their constraints.
//!
//! When a matrix enforces a recovered XOR, the CNF clauses encoding it only duplicate the
//! matrix's propagation work. Their long watches are removed and the clauses flagged, so they no
//! longer participate in unit propagation; they remain in the clause database for the inverse
//! operation.

use partial_ref::{partial, PartialRef};

use gaussat_formula::Lit;

use crate::context::{parts::*, Context};
use crate::prop::enqueue_assignment;
use crate::prop::Reason;

/// Detach the CNF encodings of all matrix-owned XOR constraints.
///
/// A clause is detached only when every one of its variables belongs to a matrix row, none of
/// them is a clash variable of any stored constraint and none is among the assumptions.
pub fn detach_xor_clauses(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ProofP,
        mut StatsP,
        mut WatchlistsP,
        ClauseDbP,
        IncrementalP,
        MatricesP,
        SolverConfigP,
        VariablesP,
        XorStoreP,
    ),
) {
    if !ctx.part(SolverConfigP).xor_detach_reattach {
        return;
    }
    if !ctx.part(MatricesP).any_active() {
        return;
    }

    let var_count = ctx.part(VariablesP).count();

    let mut detachable_var = vec![false; var_count];
    {
        let matrices = ctx.part(MatricesP);
        for matrix in matrices.matrices.iter() {
            if matrix.disabled {
                continue;
            }
            for xor in matrix.xors.iter() {
                for &var in xor.vars.iter() {
                    detachable_var[var.index()] = true;
                }
            }
        }
    }

    // Clash variables still have uses outside the matrices.
    {
        let store = ctx.part(XorStoreP);
        for xor in store.xors.iter().chain(store.unused.iter()) {
            for &var in xor.clash_vars.iter() {
                detachable_var[var.index()] = false;
            }
        }
    }

    for &lit in ctx.part(IncrementalP).assumptions() {
        detachable_var[lit.index()] = false;
    }

    let clauses: Vec<_> = ctx.part(ClauseDbP).unchecked_clause_iter().collect();
    let mut detached = 0;

    for cref in clauses {
        let header = ctx.part(ClauseAllocP).header(cref);
        if header.deleted() || !header.used_in_xor() || header.xor_detached() {
            continue;
        }

        let lits: Vec<Lit> = ctx.part(ClauseAllocP).clause(cref).lits().to_vec();
        if !lits.iter().all(|lit| detachable_var[lit.index()]) {
            continue;
        }

        ctx.part_mut(WatchlistsP)
            .unwatch_clause(cref, [lits[0], lits[1]]);
        ctx.part_mut(ClauseAllocP)
            .header_mut(cref)
            .set_xor_detached(true);
        ctx.part_mut(ProofP).delay_delete(&lits);
        detached += 1;
    }

    if detached > 0 {
        ctx.part_mut(ProofP).finish_delay();
        log::debug!("detached {} xor-encoding clauses", detached);
    }
}

/// Reattach every detached XOR-encoding clause.
///
/// Each clause is cleaned against the current top-level assignment and watched again; the caller
/// re-propagates afterwards. Returns `Err(())` when cleaning derives unsatisfiability.
pub fn fully_undo_xor_detach(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProofP,
        mut TrailP,
        mut WatchlistsP,
    ),
) -> Result<(), ()> {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let clauses: Vec<_> = ctx.part(ClauseDbP).unchecked_clause_iter().collect();
    let mut result = Ok(());

    for cref in clauses {
        let header = ctx.part(ClauseAllocP).header(cref);
        if header.deleted() || !header.xor_detached() {
            continue;
        }
        ctx.part_mut(ClauseAllocP)
            .header_mut(cref)
            .set_xor_detached(false);

        if result.is_err() {
            continue;
        }

        // Clean against the top-level assignment before watching again.
        let mut new_lits: Vec<Lit> = vec![];
        let mut satisfied = false;
        for &lit in ctx.part(ClauseAllocP).clause(cref).lits() {
            match ctx.part(AssignmentP).lit_value(lit) {
                Some(true) => {
                    satisfied = true;
                    break;
                }
                Some(false) => (),
                None => new_lits.push(lit),
            }
        }

        if satisfied {
            // Was already reported deleted when it was detached.
            crate::clause::db::delete_clause(ctx.borrow(), cref);
            continue;
        }

        ctx.part_mut(ProofP).add_clause(&new_lits);

        match new_lits[..] {
            [] => result = Err(()),
            [unit] => {
                crate::clause::db::delete_clause(ctx.borrow(), cref);
                if ctx.part(AssignmentP).lit_is_unk(unit) {
                    enqueue_assignment(ctx.borrow(), unit, Reason::Unit);
                }
            }
            [lit_0, lit_1] => {
                crate::clause::db::delete_clause(ctx.borrow(), cref);
                if !ctx.part(WatchlistsP).has_binary([lit_0, lit_1]) {
                    ctx.part_mut(WatchlistsP).add_binary([lit_0, lit_1]);
                }
            }
            ref lits => {
                let clause = ctx.part_mut(ClauseAllocP).clause_mut(cref);
                clause.lits_mut()[..lits.len()].copy_from_slice(lits);
                clause.header_mut().set_len(lits.len());
                let watched = [lits[0], lits[1]];
                ctx.part_mut(WatchlistsP).watch_clause(cref, watched);
            }
        }
    }

    result
}
