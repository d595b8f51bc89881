//! Top-level Gaussian closure over the recovered XORs.
//!
//! The stored XORs are partitioned into connected components via a union-find over their
//! variables. Each component becomes a dense augmented GF(2) matrix that is fully echelonized;
//! any unit or binary row the reduction exposes is handed back to the CDCL engine.

use partial_ref::{partial, PartialRef};

use gaussat_formula::Var;

use crate::context::{parts::*, Context};
use crate::gauss::matrix::PackedMatrix;
use crate::occur::{add_binary_during_occ, enqueue_unit, propagate_occur};
use crate::xor::Xor;

/// Run the top-level Gaussian closure.
///
/// Returns `Err(())` when a component derives `() = 1`.
pub fn toplevel_gauss(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut EquivP,
        mut ImplGraphP,
        mut OccurP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
        SolverConfigP,
        VariablesP,
        XorStoreP,
    ),
) -> Result<(), ()> {
    let var_count = ctx.part(VariablesP).count();
    let max_matrix_size = ctx.part(SolverConfigP).max_matrix_size;

    let components = {
        let xors = &ctx.part(XorStoreP).xors;
        components_of(xors, var_count)
    };

    for component in components {
        if component.len() < 2 {
            // A lone constraint is already echelonized.
            continue;
        }

        let mut vars: Vec<Var> = vec![];
        {
            let mut seen = vec![false; var_count];
            for xor in component.iter() {
                for &var in xor.vars.iter() {
                    if !seen[var.index()] {
                        seen[var.index()] = true;
                        vars.push(var);
                    }
                }
            }
        }
        vars.sort_unstable();

        if (vars.len() + 1) * component.len() > max_matrix_size * max_matrix_size {
            continue;
        }

        let mut rows = PackedMatrix::new(component.len(), vars.len());
        for (row, xor) in component.iter().enumerate() {
            for &var in xor.vars.iter() {
                let col = vars.binary_search(&var).expect("component variable");
                rows.set(row, col, true);
            }
            rows.set_rhs(row, xor.rhs);
        }

        echelonize(&mut rows);

        for row in 0..rows.num_rows() {
            let rhs = rows.rhs(row);
            let row_vars: Vec<Var> = rows
                .iter_set_cols(row)
                .take(3)
                .map(|col| vars[col])
                .collect();

            match row_vars[..] {
                [] => {
                    if rhs {
                        return Err(());
                    }
                }
                [var] => {
                    enqueue_unit(ctx.borrow(), var.lit(rhs), true)?;
                    ctx.part_mut(StatsP).xor_units += 1;
                    propagate_occur(ctx.borrow())?;
                }
                [x, y] => {
                    emit_two_xor(ctx.borrow(), x, y, rhs);
                    propagate_occur(ctx.borrow())?;
                }
                _ => (),
            }
        }
    }

    Ok(())
}

/// Attach a derived two-variable parity during a simplifier session.
fn emit_two_xor(
    mut ctx: partial!(
        Context,
        mut EquivP,
        mut OccurP,
        mut ProofP,
        mut StatsP,
        mut WatchlistsP,
    ),
    x: Var,
    y: Var,
    rhs: bool,
) {
    use gaussat_formula::Lit;

    add_binary_during_occ(
        ctx.borrow(),
        [x.positive(), Lit::from_var(y, !rhs)],
        true,
    );
    add_binary_during_occ(ctx.borrow(), [x.negative(), Lit::from_var(y, rhs)], true);

    ctx.part_mut(StatsP).xor_binaries += 1;
    ctx.part_mut(EquivP).set_equiv(y, Lit::from_var(x, rhs));
}

/// Group the XORs into connected components over shared variables.
fn components_of(xors: &[Xor], var_count: usize) -> Vec<Vec<Xor>> {
    if xors.is_empty() {
        return vec![];
    }

    let mut root_of_var: Vec<u32> = vec![u32::max_value(); var_count];
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

/// Full Gauss-Jordan echelonization of an augmented bit matrix.
fn echelonize(rows: &mut PackedMatrix) {
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

        pivot_row += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use gaussat_formula::vars;

    #[test]
    fn echelonize_exposes_units() {
        // x1 + x2 + x3 = 1 and x1 + x2 = 0 force x3 = 1
        let mut rows = PackedMatrix::new(2, 3);
        rows.set(0, 0, true);
        rows.set(0, 1, true);
        rows.set(0, 2, true);
        rows.set_rhs(0, true);
        rows.set(1, 0, true);
        rows.set(1, 1, true);

        echelonize(&mut rows);

        let units: Vec<(Vec<usize>, bool)> = (0..rows.num_rows())
            .map(|row| (rows.iter_set_cols(row).collect(), rows.rhs(row)))
            .collect();

        assert!(units.contains(&(vec![2], true)));
    }

    #[test]
    fn components_split_disconnected_systems() {
        let xors = vec![
            Xor::new(vars![1, 2, 3].to_vec(), false),
            Xor::new(vars![3, 4].to_vec(), true),
            Xor::new(vars![7, 8, 9].to_vec(), true),
        ];

        let components = components_of(&xors, 10);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].len(), 2);
        assert_eq!(components[1].len(), 1);
    }
}
