//! XOR recomposition.
//!
//! Two parity constraints sharing exactly one variable compose into one:
//! `(A ⊕ v = r₁) ⊕ (B ⊕ v = r₂)` is `(A ⊕ B = r₁ ⊕ r₂)`, with `v` joining the clash variables of
//! the merged result. Merging is driven by a worklist of variables that occur in exactly two
//! XORs and nowhere else.

use partial_ref::{partial, PartialRef};

use gaussat_formula::Var;

use crate::context::{parts::*, Context};
use crate::xor::Xor;

/// Merge the stored XORs over their connecting variables.
///
/// Variables that occur in any irredundant non-XOR clause, in a binary clause or among the
/// assumptions are never merged over.
pub fn xor_together_xors(
    mut ctx: partial!(
        Context,
        mut StatsP,
        mut XorStoreP,
        ClauseAllocP,
        IncrementalP,
        OccurP,
        VariablesP,
        WatchlistsP,
    ),
) -> Result<(), ()> {
    let var_count = ctx.part(VariablesP).count();

    let mut excluded = vec![false; var_count];

    // Variables in irredundant clauses that are not part of an XOR encoding.
    for &cref in ctx.part(OccurP).clauses.iter() {
        let header = ctx.part(ClauseAllocP).header(cref);
        if header.deleted() || header.redundant() || header.used_in_xor() {
            continue;
        }
        for &lit in ctx.part(ClauseAllocP).clause(cref).lits() {
            excluded[lit.index()] = true;
        }
    }

    // Variables in binary clauses.
    for lits in ctx.part(WatchlistsP).binary_clause_iter() {
        excluded[lits[0].index()] = true;
        excluded[lits[1].index()] = true;
    }

    // Assumption and sampling variables.
    for &lit in ctx.part(IncrementalP).assumptions() {
        excluded[lit.index()] = true;
    }
    for index in 0..var_count {
        if ctx.part(VariablesP).is_sampling(Var::from_index(index)) {
            excluded[index] = true;
        }
    }

    let mut xors = std::mem::take(&mut ctx.part_mut(XorStoreP).xors);

    let merged = merge_xors(&mut xors, &excluded, var_count);

    // Drop emptied entries; the ones carrying clash variables are kept for model extension.
    let mut kept = Vec::with_capacity(xors.len());
    for xor in xors.drain(..) {
        if xor.is_empty() {
            if !xor.clash_vars.is_empty() {
                ctx.part_mut(XorStoreP).unused.push(xor);
            }
        } else {
            kept.push(xor);
        }
    }

    let store = ctx.part_mut(XorStoreP);
    store.xors = kept;
    store.updated |= merged > 0;

    ctx.part_mut(StatsP).xors_merged += merged;

    Ok(())
}

/// Compose XOR pairs over variables occurring in exactly two of them.
///
/// Merged-away entries are left in place as empty constraints. Returns the number of performed
/// merges. This runs to a fixed point: afterwards no interesting variable remains.
pub fn merge_xors(xors: &mut Vec<Xor>, excluded: &[bool], var_count: usize) -> u64 {
    let mut occcnt = vec![0u32; var_count];
    let mut xors_of_var: Vec<Vec<u32>> = vec![vec![]; var_count];

    for (index, xor) in xors.iter().enumerate() {
        for &var in xor.vars.iter() {
            occcnt[var.index()] += 1;
            xors_of_var[var.index()].push(index as u32);
        }
    }

    let mut interesting: Vec<Var> = (0..var_count)
        .map(Var::from_index)
        .filter(|&var| occcnt[var.index()] == 2 && !excluded[var.index()])
        .collect();

    let mut merged = 0;
    let mut seen = vec![0u8; var_count];

    while let Some(var) = interesting.pop() {
        if occcnt[var.index()] != 2 {
            continue;
        }

        // The index lists can hold stale entries of emptied or rewritten constraints.
        let mut pair = [0u32; 2];
        let mut found = 0;
        xors_of_var[var.index()].retain(|&index| {
            let live = xors[index as usize].vars.binary_search(&var).is_ok();
            if live && found < 2 {
                pair[found] = index;
                found += 1;
            }
            live
        });
        if found != 2 {
            continue;
        }
        let [i0, i1] = pair;

        let (clash_num, clash_var, combined) =
            xor_two(&xors[i0 as usize], &xors[i1 as usize], &mut seen);

        let equivalent = xors[i0 as usize].len() == xors[i1 as usize].len()
            && xors[i0 as usize].rhs == xors[i1 as usize].rhs
            && clash_num == xors[i0 as usize].len();

        if equivalent {
            let removed = std::mem::take(&mut xors[i0 as usize]);
            let survivor = &mut xors[i1 as usize];
            survivor.merge_clash(&removed);
            survivor.detached |= removed.detached;

            for &v2 in removed.vars.iter() {
                occcnt[v2.index()] -= 1;
                if occcnt[v2.index()] == 2 && !excluded[v2.index()] {
                    interesting.push(v2);
                }
            }
            merged += 1;
        } else if clash_num != 1
            || xors[i0 as usize].detached
            || xors[i1 as usize].detached
        {
            // Merging over more than one shared variable would duplicate variables; detached
            // constraints stay as they are.
            continue;
        } else {
            let x0 = std::mem::take(&mut xors[i0 as usize]);
            let x1 = std::mem::take(&mut xors[i1 as usize]);

            let mut new_xor = Xor::new(combined, x0.rhs ^ x1.rhs);
            new_xor.clash_vars.push(clash_var);
            new_xor.merge_clash(&x0);
            new_xor.merge_clash(&x1);

            occcnt[var.index()] = 0;

            let new_index = xors.len() as u32;
            for &v2 in new_xor.vars.iter() {
                xors_of_var[v2.index()].push(new_index);
                if occcnt[v2.index()] == 2 && !excluded[v2.index()] {
                    interesting.push(v2);
                }
            }
            xors.push(new_xor);
            merged += 1;
        }
    }

    merged
}

/// Compose two XORs, counting the shared variables.
///
/// Returns the clash count, one clash variable and the symmetric difference of the variable
/// sets.
fn xor_two(x0: &Xor, x1: &Xor, seen: &mut [u8]) -> (usize, Var, Vec<Var>) {
    let mut clash_num = 0;
    let mut clash_var = Var::from_index(0);
    let mut combined = vec![];

    for &var in x0.vars.iter() {
        seen[var.index()] = 1;
    }

    for &var in x1.vars.iter() {
        if seen[var.index()] == 0 {
            combined.push(var);
        } else {
            clash_var = var;
            clash_num += 1;
        }
        seen[var.index()] = 2;
    }

    for &var in x0.vars.iter() {
        if seen[var.index()] != 2 {
            combined.push(var);
        }
        seen[var.index()] = 0;
    }
    for &var in x1.vars.iter() {
        seen[var.index()] = 0;
    }

    (clash_num, clash_var, combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    use gaussat_formula::vars;

    fn xor(vars: &[Var], rhs: bool) -> Xor {
        Xor::new(vars.to_vec(), rhs)
    }

    #[test]
    fn merges_over_single_shared_var() {
        let mut xors = vec![
            xor(&vars![1, 2, 3], false),
            xor(&vars![1, 4, 5, 6], false),
        ];
        let excluded = vec![false; 8];

        let merged = merge_xors(&mut xors, &excluded, 8);
        assert_eq!(merged, 1);

        let live: Vec<&Xor> = xors.iter().filter(|xor| !xor.is_empty()).collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].vars, vars![2, 3, 4, 5, 6]);
        assert!(!live[0].rhs);
        assert_eq!(live[0].clash_vars, vars![1]);
    }

    #[test]
    fn skips_multi_clash_pairs() {
        let mut xors = vec![xor(&vars![1, 2, 3], true), xor(&vars![1, 2, 4], false)];
        let excluded = vec![false; 8];

        let merged = merge_xors(&mut xors, &excluded, 8);
        assert_eq!(merged, 0);
        assert!(xors.iter().all(|xor| !xor.is_empty()));
    }

    #[test]
    fn equivalent_xors_collapse() {
        let mut a = xor(&vars![1, 2, 3], true);
        a.clash_vars = vars![5].to_vec();
        let b = xor(&vars![1, 2, 3], true);

        let mut xors = vec![a, b];
        let excluded = vec![false; 8];

        let merged = merge_xors(&mut xors, &excluded, 8);
        assert_eq!(merged, 1);

        let live: Vec<&Xor> = xors.iter().filter(|xor| !xor.is_empty()).collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].vars, vars![1, 2, 3]);
        assert_eq!(live[0].clash_vars, vars![5]);
    }

    #[test]
    fn excluded_vars_are_not_merged_over() {
        let mut xors = vec![xor(&vars![1, 2, 3], false), xor(&vars![1, 4, 5], false)];
        let mut excluded = vec![false; 8];
        excluded[vars![1][0].index()] = true;

        let merged = merge_xors(&mut xors, &excluded, 8);
        assert_eq!(merged, 0);
    }

    #[test]
    fn merging_is_idempotent_at_fixpoint() {
        let mut xors = vec![
            xor(&vars![1, 2, 3], false),
            xor(&vars![3, 4, 5], true),
            xor(&vars![5, 6, 7], false),
        ];
        let excluded = vec![false; 10];

        merge_xors(&mut xors, &excluded, 10);
        let after_first: Vec<Xor> = xors.iter().filter(|x| !x.is_empty()).cloned().collect();

        let mut again = after_first.clone();
        let merged_again = merge_xors(&mut again, &excluded, 10);
        assert_eq!(merged_again, 0);
        let after_second: Vec<Xor> = again.into_iter().filter(|x| !x.is_empty()).collect();
        assert_eq!(after_first, after_second);
    }
}
