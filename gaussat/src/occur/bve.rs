//! Bounded variable elimination.
//!
//! A candidate variable is eliminated when the set of irreducible resolvents between its positive
//! and negative clauses is not larger than the original clause set plus the current growth
//! allowance. The eliminated clauses move to the blocked-clause store, keyed by the variable, so
//! model extension can recompute its value.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use partial_ref::{partial, PartialRef};

use gaussat_formula::{Lit, Var};

use crate::clause::{ClauseHeader, ClauseRef, Tier};
use crate::context::{parts::*, Context};
use crate::variables::Removed;

use super::{
    add_binary_during_occ, add_long_during_occ, binaries_with_lit, count_occurrences,
    enqueue_unit, propagate_occur, remove_binary_during_occ, unlink_clause,
};

/// A clause containing the elimination candidate, in either representation.
enum OccClause {
    Long(ClauseRef),
    Binary([Lit; 2]),
}

/// Eliminate variables until the heap or the budget runs dry.
pub fn eliminate_vars(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BlockedStoreP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut OccurP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut VariablesP,
        mut WatchlistsP,
        IncrementalP,
        SolverConfigP,
    ),
) -> Result<(), ()> {
    // Min-heap on the product of the occurrence counts, with lazy rescoring: stale entries are
    // recognized by a score mismatch and skipped, touched variables are re-pushed.
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = BinaryHeap::new();

    let var_count = ctx.part(VariablesP).count();
    for index in 0..var_count {
        let var = Var::from_index(index);
        if can_eliminate(ctx.borrow(), var) {
            heap.push(Reverse((elim_score(ctx.borrow(), var), index)));
        }
    }

    ctx.part_mut(OccurP).drain_touched();

    while let Some(Reverse((score, index))) = heap.pop() {
        if ctx.part(OccurP).budget < 0 {
            break;
        }

        let var = Var::from_index(index);
        if !can_eliminate(ctx.borrow(), var) {
            continue;
        }
        if elim_score(ctx.borrow(), var) != score {
            // Stale entry; the rescored duplicate is elsewhere in the heap.
            continue;
        }

        maybe_eliminate(ctx.borrow(), var)?;

        for touched in ctx.part_mut(OccurP).drain_touched() {
            if can_eliminate(ctx.borrow(), touched) {
                heap.push(Reverse((elim_score(ctx.borrow(), touched), touched.index())));
            }
        }
    }

    ctx.part_mut(ProofP).finish_delay();

    propagate_occur(ctx.borrow())
}

/// Whether bounded variable elimination may remove this variable.
fn can_eliminate(
    mut ctx: partial!(Context, AssignmentP, IncrementalP, VariablesP),
    var: Var,
) -> bool {
    let data = ctx.part(VariablesP).var_data(var);
    data.removed == Removed::None
        && !data.in_xor
        && !data.must_set
        && ctx.part(AssignmentP).var_is_unk(var)
        && !ctx.part(IncrementalP).var_is_assumed(var)
}

/// Elimination priority: the product of the occurrence counts of the two polarities.
fn elim_score(
    mut ctx: partial!(Context, ClauseAllocP, OccurP, WatchlistsP),
    var: Var,
) -> u64 {
    let pos = count_occurrences(ctx.borrow(), var.positive()) as u64;
    let neg = count_occurrences(ctx.borrow(), var.negative()) as u64;
    pos * neg
}

/// Attempt to eliminate a single variable.
fn maybe_eliminate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BlockedStoreP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut OccurP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut VariablesP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    var: Var,
) -> Result<bool, ()> {
    let pos_lit = var.positive();
    let neg_lit = var.negative();

    let (pos_irred, pos_red) = gather_clauses(ctx.borrow(), pos_lit);
    let (neg_irred, neg_red) = gather_clauses(ctx.borrow(), neg_lit);

    if pos_irred.is_empty() && neg_irred.is_empty() && pos_red.is_empty() && neg_red.is_empty() {
        return Ok(false);
    }

    // Compute the resolvent set, aborting as soon as it outgrows the allowance.
    let before = pos_irred.len() + neg_irred.len();
    let allowance = before + ctx.part(OccurP).grow as usize;
    let size_limit = ctx.part(SolverConfigP).bve_resolvent_size_limit;

    let mut resolvents: Vec<Vec<Lit>> = vec![];

    for pos_clause in pos_irred.iter() {
        for neg_clause in neg_irred.iter() {
            ctx.part_mut(OccurP).budget -= 3;
            if ctx.part(OccurP).budget < -10_000 {
                return Ok(false);
            }

            let resolvent = match resolve(ctx.borrow(), pos_clause, neg_clause, var) {
                Some(resolvent) => resolvent,
                None => continue,
            };

            if resolvent.len() > size_limit {
                return Ok(false);
            }

            resolvents.push(resolvent);
            if resolvents.len() > allowance {
                return Ok(false);
            }
        }
    }

    // Committed: move the original clauses to the blocked store and delete them.
    ctx.part_mut(BlockedStoreP).begin_block(var);

    for clause in pos_irred.iter().chain(neg_irred.iter()) {
        let lits = clause_lits(ctx.borrow(), clause);
        ctx.part_mut(BlockedStoreP).push_clause(&lits);
        ctx.part_mut(ProofP).delay_delete(&lits);
        ctx.part_mut(StatsP).blocked_clauses_stored += 1;
    }

    for clause in pos_irred
        .iter()
        .chain(neg_irred.iter())
        .chain(pos_red.iter())
        .chain(neg_red.iter())
    {
        let redundant = match clause {
            OccClause::Long(cref) => ctx.part(ClauseAllocP).header(*cref).redundant(),
            OccClause::Binary(_) => false,
        };
        match clause {
            OccClause::Long(cref) => {
                if ctx.part(ClauseAllocP).header(*cref).deleted() {
                    continue;
                }
                // Irredundant deletions were already reported as delayed deletes.
                unlink_clause(ctx.borrow(), *cref, redundant, None);
            }
            OccClause::Binary(lits) => {
                remove_binary_during_occ(ctx.borrow(), *lits, false);
            }
        }
    }

    ctx.part_mut(VariablesP).var_data_mut(var).removed = Removed::Eliminated;
    ctx.part_mut(StatsP).eliminated_vars += 1;

    for resolvent in resolvents {
        match resolvent[..] {
            [] => return Err(()),
            [unit] => enqueue_unit(ctx.borrow(), unit, true)?,
            [lit_0, lit_1] => add_binary_during_occ(ctx.borrow(), [lit_0, lit_1], true),
            _ => {
                let mut header = ClauseHeader::new();
                header.set_tier(Tier::Irred);
                add_long_during_occ(ctx.borrow(), header, &resolvent);
            }
        }
    }

    Ok(true)
}

/// Put an eliminated variable back into the solver.
///
/// The clauses recorded at elimination time are re-added and their blocks dropped from the
/// blocked store. Reinserted clauses can name variables that were eliminated afterwards, so the
/// operation cascades. Required before an eliminated variable may appear among the assumptions.
pub fn uneliminate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BlockedStoreP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut MatricesP,
        mut ProofP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    var: Var,
) {
    let mut worklist = vec![var];

    while let Some(var) = worklist.pop() {
        if ctx.part(VariablesP).var_data(var).removed != Removed::Eliminated {
            continue;
        }

        ctx.part_mut(VariablesP).var_data_mut(var).removed = Removed::None;
        ctx.part_mut(VsidsP).make_available(var);

        let clauses = ctx.part_mut(BlockedStoreP).take_var_blocks(var);
        for clause in clauses {
            for &lit in clause.iter() {
                if ctx.part(VariablesP).var_data(lit.var()).removed == Removed::Eliminated {
                    worklist.push(lit.var());
                }
            }
            crate::load::load_clause(ctx.borrow(), &clause);
        }
    }
}

/// All live clauses containing a literal, split into irredundant and redundant ones.
fn gather_clauses(
    mut ctx: partial!(Context, ClauseAllocP, OccurP, WatchlistsP),
    lit: Lit,
) -> (Vec<OccClause>, Vec<OccClause>) {
    let mut irred = vec![];
    let mut red = vec![];

    for &cref in ctx.part(OccurP).occ_list(lit).iter() {
        let header = ctx.part(ClauseAllocP).header(cref);
        if header.deleted() {
            continue;
        }
        if header.redundant() {
            red.push(OccClause::Long(cref));
        } else {
            irred.push(OccClause::Long(cref));
        }
    }

    for lits in binaries_with_lit(ctx.borrow(), lit) {
        irred.push(OccClause::Binary(lits));
    }

    (irred, red)
}

/// The literals of a gathered clause.
fn clause_lits(
    mut ctx: partial!(Context, ClauseAllocP),
    clause: &OccClause,
) -> Vec<Lit> {
    match clause {
        OccClause::Long(cref) => ctx.part(ClauseAllocP).clause(*cref).lits().to_vec(),
        OccClause::Binary(lits) => lits.to_vec(),
    }
}

/// Resolve two clauses on the candidate variable.
///
/// Returns `None` for tautological resolvents.
fn resolve(
    mut ctx: partial!(Context, mut OccurP, ClauseAllocP),
    pos_clause: &OccClause,
    neg_clause: &OccClause,
    var: Var,
) -> Option<Vec<Lit>> {
    let pos_lits = clause_lits(ctx.borrow(), pos_clause);
    let neg_lits = clause_lits(ctx.borrow(), neg_clause);

    let mut resolvent = vec![];
    let mut tautological = false;

    {
        let seen = &mut ctx.part_mut(OccurP).seen;

        for &lit in pos_lits.iter() {
            if lit.var() != var && !seen[lit.code()] {
                seen[lit.code()] = true;
                resolvent.push(lit);
            }
        }

        for &lit in neg_lits.iter() {
            if lit.var() == var {
                continue;
            }
            if seen[(!lit).code()] {
                tautological = true;
                break;
            }
            if !seen[lit.code()] {
                seen[lit.code()] = true;
                resolvent.push(lit);
            }
        }

        for &lit in resolvent.iter() {
            seen[lit.code()] = false;
        }
    }

    if tautological {
        None
    } else {
        Some(resolvent)
    }
}
