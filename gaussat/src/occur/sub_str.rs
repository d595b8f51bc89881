//! Backward subsumption and self-subsuming resolution.
//!
//! For a subsuming clause `C`, every clause `D ⊇ C` is deleted and every clause
//! `D ⊇ (C ∖ {ℓ}) ∪ {¬ℓ}` is strengthened by removing `¬ℓ`. Candidates come from the occurrence
//! list of the least frequent literal of `C`; a per-clause abstraction bitmask prunes most
//! non-candidates before their literals are looked at.

use partial_ref::{partial, PartialRef};

use gaussat_formula::Lit;

use crate::clause::ClauseRef;
use crate::context::{parts::*, Context};

use super::{
    enqueue_unit, propagate_occur, remove_binary_during_occ, strengthen_clause, unlink_clause,
};

/// Variable-set abstraction of a clause.
fn abstraction(lits: &[Lit]) -> u32 {
    lits.iter()
        .fold(0, |abst, lit| abst | 1 << (lit.index() % 32))
}

/// Backward subsumption and strengthening over all irredundant clauses.
pub fn backward_sub_str(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut OccurP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
    ),
) -> Result<(), ()> {
    let clauses = ctx.part(OccurP).clauses.clone();

    for cref in clauses {
        if ctx.part(OccurP).budget < 0 {
            break;
        }
        let header = ctx.part(ClauseAllocP).header(cref);
        if header.deleted() || header.redundant() {
            continue;
        }
        sub_str_with_long(ctx.borrow(), cref)?;
    }

    let binaries: Vec<[Lit; 2]> = ctx.part(WatchlistsP).binary_clause_iter().collect();
    for lits in binaries {
        if ctx.part(OccurP).budget < 0 {
            break;
        }
        sub_str_with_binary(ctx.borrow(), lits)?;
    }

    propagate_occur(ctx.borrow())
}

/// Self-subsuming resolution with the clauses added since the last sweep.
pub fn sub_str_with_added(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut OccurP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
    ),
) -> Result<(), ()> {
    loop {
        let added_clauses = std::mem::take(&mut ctx.part_mut(OccurP).added_clauses);
        let added_binaries = std::mem::take(&mut ctx.part_mut(OccurP).added_binaries);

        if added_clauses.is_empty() && added_binaries.is_empty() {
            return propagate_occur(ctx.borrow());
        }

        for cref in added_clauses {
            let header = ctx.part(ClauseAllocP).header(cref);
            if header.deleted() {
                continue;
            }
            sub_str_with_long(ctx.borrow(), cref)?;
        }

        for lits in added_binaries {
            if !ctx.part(WatchlistsP).has_binary(lits) {
                continue;
            }
            sub_str_with_binary(ctx.borrow(), lits)?;
        }
    }
}

/// Use one long clause as the subsumer.
fn sub_str_with_long(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut OccurP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
    ),
    cref: ClauseRef,
) -> Result<(), ()> {
    let lits: Vec<Lit> = ctx.part(ClauseAllocP).clause(cref).lits().to_vec();
    let abst = abstraction(&lits);

    // Scan the occurrence list of the least frequent literal.
    let min_lit = lits
        .iter()
        .cloned()
        .min_by_key(|&lit| ctx.part(OccurP).occ_list(lit).len())
        .expect("empty subsumer");

    {
        let seen = &mut ctx.part_mut(OccurP).seen;
        for &lit in lits.iter() {
            seen[lit.code()] = true;
        }
    }

    let candidates = ctx.part(OccurP).occ_list(min_lit).to_vec();
    let mut subsumed = vec![];

    for &cand in candidates.iter() {
        if cand == cref {
            continue;
        }
        let header = ctx.part(ClauseAllocP).header(cand);
        if header.deleted() || header.len() < lits.len() {
            continue;
        }
        ctx.part_mut(OccurP).budget -= header.len() as i64 + 3;

        let cand_lits = ctx.part(ClauseAllocP).clause(cand).lits();
        if abst & !abstraction(cand_lits) != 0 {
            continue;
        }

        let seen = &ctx.part(OccurP).seen;
        let hits = cand_lits.iter().filter(|lit| seen[lit.code()]).count();
        if hits == lits.len() {
            subsumed.push(cand);
        }
    }

    {
        let seen = &mut ctx.part_mut(OccurP).seen;
        for &lit in lits.iter() {
            seen[lit.code()] = false;
        }
    }

    for cand in subsumed {
        if ctx.part(ClauseAllocP).header(cand).deleted() {
            continue;
        }
        unlink_clause(ctx.borrow(), cand, true, None);
        ctx.part_mut(StatsP).subsumed_clauses += 1;
    }

    // Strengthening: for each literal, look for clauses containing its negation and the rest of
    // this clause.
    for index in 0..lits.len() {
        let strengthen_on = !lits[index];

        {
            let seen = &mut ctx.part_mut(OccurP).seen;
            for (i, &lit) in lits.iter().enumerate() {
                let marked = if i == index { strengthen_on } else { lit };
                seen[marked.code()] = true;
            }
        }

        let candidates = ctx.part(OccurP).occ_list(strengthen_on).to_vec();
        let mut to_strengthen = vec![];

        for &cand in candidates.iter() {
            if cand == cref {
                continue;
            }
            let header = ctx.part(ClauseAllocP).header(cand);
            if header.deleted() || header.len() < lits.len() {
                continue;
            }
            ctx.part_mut(OccurP).budget -= header.len() as i64 + 3;

            let cand_lits = ctx.part(ClauseAllocP).clause(cand).lits();
            let seen = &ctx.part(OccurP).seen;
            let hits = cand_lits.iter().filter(|lit| seen[lit.code()]).count();
            if hits == lits.len() {
                to_strengthen.push(cand);
            }
        }

        {
            let seen = &mut ctx.part_mut(OccurP).seen;
            for (i, &lit) in lits.iter().enumerate() {
                let marked = if i == index { strengthen_on } else { lit };
                seen[marked.code()] = false;
            }
        }

        for cand in to_strengthen {
            if ctx.part(ClauseAllocP).header(cand).deleted() {
                continue;
            }
            strengthen_clause(ctx.borrow(), cand, strengthen_on)?;
            ctx.part_mut(StatsP).strengthened_clauses += 1;
        }
    }

    Ok(())
}

/// Use one binary clause as the subsumer.
fn sub_str_with_binary(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut OccurP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
    ),
    lits: [Lit; 2],
) -> Result<(), ()> {
    let [a, b] = lits;

    // Subsumption: long clauses containing both literals.
    let candidates = ctx.part(OccurP).occ_list(a).to_vec();
    for &cand in candidates.iter() {
        if ctx.part(ClauseAllocP).header(cand).deleted() {
            continue;
        }
        ctx.part_mut(OccurP).budget -= 3;
        if ctx.part(ClauseAllocP).clause(cand).lits().contains(&b) {
            unlink_clause(ctx.borrow(), cand, true, None);
            ctx.part_mut(StatsP).subsumed_clauses += 1;
        }
    }

    // Strengthening: remove the negation of one literal from clauses containing the other.
    for &(keep, remove) in [(a, !b), (b, !a)].iter() {
        let candidates = ctx.part(OccurP).occ_list(remove).to_vec();
        for &cand in candidates.iter() {
            if ctx.part(ClauseAllocP).header(cand).deleted() {
                continue;
            }
            ctx.part_mut(OccurP).budget -= 3;
            if ctx.part(ClauseAllocP).clause(cand).lits().contains(&keep) {
                strengthen_clause(ctx.borrow(), cand, remove)?;
                ctx.part_mut(StatsP).strengthened_clauses += 1;
            }
        }

        // Binary-binary self-subsumption gives a unit.
        if ctx.part(WatchlistsP).has_binary([keep, remove]) {
            remove_binary_during_occ(ctx.borrow(), [keep, remove], true);
            enqueue_unit(ctx.borrow(), keep, true)?;
        }
    }

    Ok(())
}
