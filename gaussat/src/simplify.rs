//! Simplification using top-level unit clauses.

use partial_ref::{partial, PartialRef};

use gaussat_formula::Lit;

use crate::clause::db::filter_clauses;
use crate::context::{parts::*, Context};
use crate::prop::Watch;

/// Turn all assignments at level 0 into unit reasons and remove them from the trail.
///
/// Returns whether any new unit was found.
pub fn prove_units(
    mut ctx: partial!(Context, mut ImplGraphP, mut MatricesP, mut TrailP, AssignmentP),
) -> bool {
    let mut new_unit = false;

    if ctx.part(TrailP).current_level() == 0 {
        let (impl_graph, mut ctx) = ctx.split_part_mut(ImplGraphP);
        let (trail, mut ctx) = ctx.split_part_mut(TrailP);

        for &lit in trail.trail() {
            new_unit = true;
            impl_graph.update_removed_unit(lit.var());
        }

        trail.clear();
        // The Gauss queue indexes into the trail; everything removed here was already processed.
        ctx.part_mut(MatricesP).reset_queue();
    }

    new_unit
}

/// Remove satisfied clauses and false literals.
///
/// May only be called at decision level 0 with all assignments fully propagated. The long watches
/// are rebuilt from scratch afterwards.
pub fn simplify(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ProofP,
        mut WatchlistsP,
        AssignmentP,
    ),
) {
    simplify_binary(ctx.borrow());

    let (assignment, mut ctx) = ctx.split_part(AssignmentP);
    let (proof, mut ctx) = ctx.split_part_mut(ProofP);
    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let alloc = ctx.part_mut(ClauseAllocP);

    let mut new_lits = vec![];
    let mut new_binaries = vec![];

    filter_clauses(alloc, db, |alloc, cref| {
        let clause = alloc.clause_mut(cref);
        if clause.header().xor_detached() {
            // Detached encodings are cleaned when they are reattached.
            return true;
        }
        new_lits.clear();
        for &lit in clause.lits() {
            match assignment.lit_value(lit) {
                None => new_lits.push(lit),
                Some(true) => {
                    proof.delete_clause(clause.lits());
                    return false;
                }
                Some(false) => (),
            }
        }
        if new_lits.len() < clause.lits().len() {
            proof.add_clause(&new_lits);
            proof.delete_clause(clause.lits());

            match new_lits[..] {
                // Cannot have empty or unit clauses after full propagation. An empty clause would
                // have been a conflict and a unit clause must be satisfied and thus would have
                // been dropped above.
                [] | [_] => unreachable!(),
                [lit_0, lit_1] => {
                    new_binaries.push([lit_0, lit_1]);
                    false
                }
                ref lits => {
                    clause.lits_mut()[..lits.len()].copy_from_slice(lits);
                    clause.header_mut().set_len(lits.len());
                    true
                }
            }
        } else {
            true
        }
    });

    for &lits in new_binaries.iter() {
        watchlists.add_binary(lits);
    }

    rebuild_long_watches(watchlists, alloc, db);
}

/// Remove binary clauses that contain an assigned variable.
///
/// At level 0 with a fully propagated trail any such clause is satisfied.
pub fn simplify_binary(
    mut ctx: partial!(Context, mut ProofP, mut WatchlistsP, AssignmentP),
) {
    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
    let (proof, ctx) = ctx.split_part_mut(ProofP);
    let assignment = ctx.part(AssignmentP);

    for clause in watchlists.binary_clause_iter() {
        if clause.iter().any(|&lit| !assignment.lit_is_unk(lit)) {
            debug_assert!(clause.iter().any(|&lit| assignment.lit_is_true(lit)));
            proof.delete_clause(&clause);
        }
    }

    let mut removed = 0;
    for code in 0..watchlists.len() {
        let trigger = Lit::from_code(code);
        let trigger_assigned = !assignment.lit_is_unk(trigger);
        let list = watchlists.watched_by_mut(trigger);
        list.retain(|watch| match watch {
            Watch::Binary { implied } => {
                let keep = !trigger_assigned && assignment.lit_is_unk(*implied);
                if !keep {
                    removed += 1;
                }
                keep
            }
            Watch::Long { .. } => true,
        });
    }

    debug_assert_eq!(removed % 2, 0);
    let count = watchlists.binary_count() - removed / 2;
    watchlists.set_binary_count(count);
}

/// Rebuild all long watches from the clause database.
///
/// All remaining literals of live clauses are unassigned, so watching the first two literals of
/// each clause is valid.
pub fn rebuild_long_watches(
    watchlists: &mut crate::prop::Watchlists,
    alloc: &mut crate::clause::ClauseAlloc,
    db: &mut crate::clause::ClauseDb,
) {
    watchlists.clear_long_watches();

    for cref in db.unchecked_clause_iter() {
        let clause = alloc.clause(cref);
        let header = clause.header();
        if header.deleted() || header.xor_detached() {
            continue;
        }
        let lits = clause.lits();
        watchlists.watch_clause(cref, [lits[0], lits[1]]);
    }
}
