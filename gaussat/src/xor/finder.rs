//! XOR recovery from CNF clauses.
//!
//! A parity constraint over k variables is encoded in CNF by the `2^(k-1)` clauses ruling out the
//! violating assignments. This pass scans irredundant clauses for such groups: a base clause
//! fixes the variable set and the parity class, candidate clauses from the occurrence lists fill
//! in the remaining sign patterns. Clauses shorter than the base cover two patterns at once.

use partial_ref::{partial, PartialRef};

use gaussat_formula::{Lit, Var};

use crate::clause::ClauseRef;
use crate::context::{parts::*, Context};
use crate::prop::Watch;
use crate::xor::Xor;

/// Accumulator for the clauses of one potential XOR.
struct PossibleXor {
    /// Sorted variables of the base clause.
    vars: Vec<Var>,
    /// Right hand side implied by the base clause's signs.
    rhs: bool,
    /// Bitset over the `2^(k-1)` sign patterns of the parity class, indexed by the first `k-1`
    /// sign bits.
    found_patterns: u64,
    /// Contributing long clauses, with whether they have the full length.
    contributors: Vec<(ClauseRef, bool)>,
}

impl PossibleXor {
    fn new(vars: Vec<Var>, rhs: bool) -> PossibleXor {
        PossibleXor {
            vars,
            rhs,
            found_patterns: 0,
            contributors: vec![],
        }
    }

    fn len(&self) -> usize {
        self.vars.len()
    }

    fn pattern_count(&self) -> u32 {
        1 << (self.len() - 1)
    }

    fn found_all(&self) -> bool {
        self.found_patterns.count_ones() == self.pattern_count()
    }

    /// Record a clause whose variables are a subset of the base variables.
    ///
    /// Returns `false` if the clause cannot be part of this encoding.
    fn add(&mut self, lits: &[Lit], cref: Option<ClauseRef>) -> bool {
        let mut covered = 0u32;
        let mut signs = 0u32;

        for &lit in lits {
            let pos = match self.vars.binary_search(&lit.var()) {
                Ok(pos) => pos,
                Err(_) => return false,
            };
            if covered & (1 << pos) != 0 {
                return false;
            }
            covered |= 1 << pos;
            if lit.is_negative() {
                signs |= 1 << pos;
            }
        }

        // Enumerate the sign combinations of the missing variables; only patterns in the parity
        // class of this encoding are recorded.
        let missing: Vec<u32> = (0..self.len() as u32)
            .filter(|&pos| covered & (1 << pos) == 0)
            .collect();

        let mut any = false;
        for combo in 0u32..(1 << missing.len()) {
            let mut pattern = signs;
            for (bit, &pos) in missing.iter().enumerate() {
                if combo >> bit & 1 != 0 {
                    pattern |= 1 << pos;
                }
            }
            // The encoding of `rhs` consists of exactly the sign patterns with parity `!rhs`.
            if (pattern.count_ones() & 1 == 1) == self.rhs {
                continue;
            }
            let index = pattern & (self.pattern_count() - 1);
            self.found_patterns |= 1 << index;
            any = true;
        }

        if any {
            if let Some(cref) = cref {
                self.contributors
                    .push((cref, lits.len() == self.vars.len()));
            }
        }
        any
    }
}

/// The parity class a clause belongs to.
///
/// A clause with negation-sign parity `p` can only be part of an encoding with `rhs = !p`.
fn clause_rhs(lits: &[Lit]) -> bool {
    let negations = lits.iter().filter(|lit| lit.is_negative()).count();
    negations % 2 == 0
}

/// Recover XOR constraints from the clause set.
///
/// Replaces the stored XOR set; constraints added through the API are re-recovered from their
/// CNF encodings. Contributing clauses are flagged `used_in_xor` and the variables of every
/// recovered constraint are flagged for the variable-elimination exclusion.
pub fn find_xors(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut OccurP,
        mut StatsP,
        mut VariablesP,
        mut XorStoreP,
        SolverConfigP,
        WatchlistsP,
    ),
) {
    let max_len = ctx.part(SolverConfigP).max_xor_to_find.min(7).max(3);

    // Reset the previous recovery.
    {
        let store = ctx.part_mut(XorStoreP);
        store.xors.clear();
        store.updated = true;
    }
    for index in 0..ctx.part(VariablesP).count() {
        ctx.part_mut(VariablesP)
            .var_data_mut(Var::from_index(index))
            .in_xor = false;
    }
    let clauses = ctx.part(OccurP).clauses.clone();
    for &cref in clauses.iter() {
        let header = ctx.part_mut(ClauseAllocP).header_mut(cref);
        header.set_used_in_xor(false);
        header.set_mark(false);
    }

    for &cref in clauses.iter() {
        if ctx.part(OccurP).budget < 0 {
            break;
        }
        ctx.part_mut(OccurP).budget -= 1;

        let header = ctx.part(ClauseAllocP).header(cref);
        if header.deleted() || header.redundant() || header.mark() {
            continue;
        }
        let len = header.len();
        if len < 3 || len > max_len {
            continue;
        }
        ctx.part_mut(ClauseAllocP).header_mut(cref).set_mark(true);

        // A complete encoding needs 2^(k-2) clauses per watchlist; allow shortened clauses by
        // halving the requirement.
        let needed_per_lit = (1usize << (len - 2)) >> 1;
        let base: Vec<Lit> = ctx.part(ClauseAllocP).clause(cref).lits().to_vec();

        let mut enough = true;
        'prune: for &lit in base.iter() {
            for &side in [lit, !lit].iter() {
                let size = ctx.part(OccurP).occ_list(side).len()
                    + ctx.part(WatchlistsP).watched_by(!side).len();
                if size < needed_per_lit {
                    enough = false;
                    break 'prune;
                }
            }
        }
        if !enough {
            continue;
        }

        find_xor_with_base(ctx.borrow(), cref, &base);
    }

    // Clear the base markers.
    for &cref in clauses.iter() {
        ctx.part_mut(ClauseAllocP).header_mut(cref).set_mark(false);
    }

    clean_equivalent_xors(ctx.borrow());

    log::debug!(
        "occ-xor found {} constraints",
        ctx.part(XorStoreP).xors.len()
    );
}

/// Try to complete an XOR encoding around one base clause.
fn find_xor_with_base(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut OccurP,
        mut StatsP,
        mut VariablesP,
        mut XorStoreP,
        WatchlistsP,
    ),
    base_cref: ClauseRef,
    base: &[Lit],
) {
    let mut vars: Vec<Var> = base.iter().map(|lit| lit.var()).collect();
    vars.sort_unstable();

    let mut poss_xor = PossibleXor::new(vars, clause_rhs(base));
    poss_xor.add(base, Some(base_cref));

    // Scan the two variables with the smallest candidate lists, both polarities each.
    let mut by_size: Vec<(usize, Lit)> = base
        .iter()
        .map(|&lit| {
            let size = ctx.part(OccurP).occ_list(lit).len()
                + ctx.part(OccurP).occ_list(!lit).len()
                + ctx.part(WatchlistsP).watched_by(lit).len()
                + ctx.part(WatchlistsP).watched_by(!lit).len();
            (size, lit)
        })
        .collect();
    by_size.sort_unstable();

    'scan: for &(_, scan_lit) in by_size.iter().take(2) {
        for &lit in [scan_lit, !scan_lit].iter() {
            // Long candidates.
            let candidates = ctx.part(OccurP).occ_list(lit).to_vec();
            for &cand in candidates.iter() {
                ctx.part_mut(OccurP).budget -= 3;
                if cand == base_cref {
                    continue;
                }
                let header = ctx.part(ClauseAllocP).header(cand);
                if header.deleted() || header.redundant() || header.len() > base.len() {
                    continue;
                }
                let cand_lits: Vec<Lit> = ctx.part(ClauseAllocP).clause(cand).lits().to_vec();
                if cand_lits.len() == base.len() && clause_rhs(&cand_lits) != poss_xor.rhs {
                    continue;
                }
                if poss_xor.add(&cand_lits, Some(cand)) && cand_lits.len() == base.len() {
                    // A same-size clause would find exactly this encoding again.
                    ctx.part_mut(ClauseAllocP).header_mut(cand).set_mark(true);
                }
                if poss_xor.found_all() {
                    break 'scan;
                }
            }

            // Binary candidates; the clause (!lit v implied) lives in lit's list.
            let binaries: Vec<Lit> = ctx
                .part(WatchlistsP)
                .watched_by(lit)
                .iter()
                .filter_map(|watch| match watch {
                    Watch::Binary { implied } => Some(*implied),
                    Watch::Long { .. } => None,
                })
                .collect();
            for implied in binaries {
                ctx.part_mut(OccurP).budget -= 1;
                poss_xor.add(&[!lit, implied], None);
                if poss_xor.found_all() {
                    break 'scan;
                }
            }
        }
    }

    if !poss_xor.found_all() {
        return;
    }

    let PossibleXor {
        vars, rhs, contributors, ..
    } = poss_xor;

    for &var in vars.iter() {
        ctx.part_mut(VariablesP).var_data_mut(var).in_xor = true;
    }
    for (cref, _fully_used) in contributors {
        ctx.part_mut(ClauseAllocP)
            .header_mut(cref)
            .set_used_in_xor(true);
    }

    ctx.part_mut(StatsP).xors_found += 1;
    ctx.part_mut(XorStoreP).push(Xor {
        vars,
        rhs,
        clash_vars: vec![],
        detached: false,
    });
}

/// Merge recovered XORs over the same variable set with the same right hand side.
fn clean_equivalent_xors(mut ctx: partial!(Context, mut XorStoreP)) {
    let store = ctx.part_mut(XorStoreP);
    let xors = &mut store.xors;
    if xors.is_empty() {
        return;
    }

    xors.sort();

    let mut write = 0;
    for read in 1..xors.len() {
        if xors[read].vars == xors[write].vars && xors[read].rhs == xors[write].rhs {
            let other = xors[read].clone();
            xors[write].merge_clash(&other);
            xors[write].detached |= other.detached;
        } else {
            write += 1;
            xors.swap(write, read);
        }
    }
    xors.truncate(write + 1);
}
