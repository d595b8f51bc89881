//! Ternary resolution.
//!
//! Pairs of irredundant 3-literal clauses clashing on exactly one variable produce resolvents of
//! length two or three, which are added as redundant clauses. Each clause serves as the base of
//! the search at most once.

use partial_ref::{partial, PartialRef};

use gaussat_formula::Lit;

use crate::clause::{ClauseHeader, ClauseRef, Tier};
use crate::context::{parts::*, Context};

use super::{add_binary_during_occ, add_long_during_occ, count_occurrences, propagate_occur};

/// Run ternary resolution over all eligible 3-literal clauses.
pub fn ternary_res(
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
        ctx.part_mut(OccurP).budget -= 10;

        let header = ctx.part(ClauseAllocP).header(cref);
        if header.deleted()
            || header.redundant()
            || header.ternary_resolved()
            || header.len() != 3
        {
            continue;
        }
        ctx.part_mut(ClauseAllocP)
            .header_mut(cref)
            .set_ternary_resolved(true);

        perform_ternary(ctx.borrow(), cref)?;
    }

    propagate_occur(ctx.borrow())
}

/// Resolve one base clause against all partner candidates.
fn perform_ternary(
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
    let base: Vec<Lit> = ctx.part(ClauseAllocP).clause(cref).lits().to_vec();
    debug_assert_eq!(base.len(), 3);

    {
        let seen = &mut ctx.part_mut(OccurP).seen;
        for &lit in base.iter() {
            seen[lit.code()] = true;
        }
    }

    // The most frequent literal's lists are skipped, they are the most expensive and the least
    // likely to pay off.
    let dont_check = base
        .iter()
        .cloned()
        .max_by_key(|&lit| {
            count_occurrences(ctx.borrow(), lit) + count_occurrences(ctx.borrow(), !lit)
        })
        .expect("base clause is non-empty");

    let mut resolvents: Vec<Vec<Lit>> = vec![];

    for &lit in base.iter() {
        if lit == dont_check {
            continue;
        }
        for &scan_lit in [lit, !lit].iter() {
            let candidates = ctx.part(OccurP).occ_list(scan_lit).to_vec();
            check_candidates(ctx.borrow(), cref, &base, &candidates, &mut resolvents);
        }
    }

    {
        let seen = &mut ctx.part_mut(OccurP).seen;
        for &lit in base.iter() {
            seen[lit.code()] = false;
        }
    }

    for resolvent in resolvents {
        ctx.part_mut(OccurP).budget -= 20;

        match resolvent.len() {
            2 => {
                add_binary_during_occ(ctx.borrow(), [resolvent[0], resolvent[1]], true);
                ctx.part_mut(StatsP).ternary_resolvents += 1;
            }
            3 => {
                let mut header = ClauseHeader::new();
                header.set_tier(Tier::Core);
                header.set_glue(2);
                // Resolvents never serve as bases themselves.
                header.set_ternary_resolved(true);
                add_long_during_occ(ctx.borrow(), header, &resolvent);
                ctx.part_mut(StatsP).ternary_resolvents += 1;
            }
            _ => unreachable!("ternary resolvents have two or three literals"),
        }
    }

    Ok(())
}

/// Check one occurrence list for partners of the base clause.
///
/// A partner is an irredundant 3-clause sharing exactly one variable with opposite polarities.
/// The resolvent is collected when it stays at two or three literals.
fn check_candidates(
    mut ctx: partial!(Context, mut OccurP, ClauseAllocP),
    base_cref: ClauseRef,
    base: &[Lit],
    candidates: &[ClauseRef],
    resolvents: &mut Vec<Vec<Lit>>,
) {
    ctx.part_mut(OccurP).budget -= candidates.len() as i64 * 2;

    for &cand in candidates.iter() {
        if cand == base_cref {
            continue;
        }
        let header = ctx.part(ClauseAllocP).header(cand);
        if header.deleted() || header.redundant() || header.len() != 3 {
            continue;
        }
        ctx.part_mut(OccurP).budget -= 10;

        let cand_lits = ctx.part(ClauseAllocP).clause(cand).lits();
        let seen = &ctx.part(OccurP).seen;

        let mut num_lits = 3;
        let mut num_vars = 3;
        let mut clash: Option<Lit> = None;
        let mut symmetric_skip = false;

        for &cand_lit in cand_lits.iter() {
            if !seen[cand_lit.code()] && !seen[(!cand_lit).code()] {
                num_vars += 1;
            }
            if !seen[cand_lit.code()] {
                num_lits += 1;
            }
            if seen[(!cand_lit).code()] {
                clash = Some(cand_lit);

                // The resolution is symmetric, so only one orientation does the work.
                if cand_lit.is_positive() {
                    symmetric_skip = true;
                    break;
                }
            }
        }

        if symmetric_skip {
            continue;
        }
        let clash = match clash {
            Some(clash) => clash,
            None => continue,
        };

        // Exactly one clashing variable produces a 2- or 3-literal resolvent.
        let fits = (num_vars == 4 && num_lits == 5) || (num_vars == 3 && num_lits == 4);
        if !fits {
            continue;
        }

        let mut resolvent = vec![];
        for &lit in base.iter() {
            if lit.var() != clash.var() {
                resolvent.push(lit);
            }
        }
        for &lit in cand_lits.iter() {
            if lit.var() != clash.var() && !seen[lit.code()] {
                resolvent.push(lit);
            }
        }

        if resolvent.len() == 2 || resolvent.len() == 3 {
            resolvents.push(resolvent);
        }
    }
}
