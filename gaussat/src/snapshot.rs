//! Persisted solver state.
//!
//! A small binary format holding everything needed to extend a future model: the blocked-clause
//! store, the equivalent-literal table, the must-set flags and a summary of the statistics.
//! All integers are LEB128 encoded.

use std::io::{Read, Write};

use anyhow::{ensure, Result};

use partial_ref::{partial, PartialRef};

use gaussat_formula::{Lit, Var};

use crate::context::{parts::*, Context};

const MAGIC: u64 = 0x6761_7573_736e_7031; // "gaussnp1"

/// Write the persistable parts of the solver state.
pub fn save_state(
    mut ctx: partial!(Context, BlockedStoreP, EquivP, StatsP, VariablesP),
    target: &mut impl Write,
) -> Result<()> {
    leb128::write::unsigned(target, MAGIC)?;

    // Blocked-clause store, in elimination order.
    let blocked = ctx.part(BlockedStoreP);
    leb128::write::unsigned(target, blocked.block_count() as u64)?;
    for (var, clauses) in blocked.iter() {
        leb128::write::unsigned(target, var.index() as u64)?;
        let clauses: Vec<&[Lit]> = clauses.iter().collect();
        leb128::write::unsigned(target, clauses.len() as u64)?;
        for clause in clauses {
            leb128::write::unsigned(target, clause.len() as u64)?;
            for &lit in clause {
                leb128::write::unsigned(target, lit.code() as u64)?;
            }
        }
    }

    // Equivalent-literal table, bound entries only.
    let bound: Vec<(Var, Lit)> = ctx.part(EquivP).iter_bound().collect();
    leb128::write::unsigned(target, bound.len() as u64)?;
    for (var, lit) in bound {
        leb128::write::unsigned(target, var.index() as u64)?;
        leb128::write::unsigned(target, lit.code() as u64)?;
    }

    // Must-set flags.
    let variables = ctx.part(VariablesP);
    let must_set: Vec<usize> = (0..variables.count())
        .filter(|&index| variables.var_data(Var::from_index(index)).must_set)
        .collect();
    leb128::write::unsigned(target, variables.count() as u64)?;
    leb128::write::unsigned(target, must_set.len() as u64)?;
    for index in must_set {
        leb128::write::unsigned(target, index as u64)?;
    }

    // Summary statistics.
    let stats = ctx.part(StatsP);
    for &value in [stats.conflicts, stats.decisions, stats.propagations].iter() {
        leb128::write::unsigned(target, value)?;
    }

    Ok(())
}

/// Restore a state written by [`save_state`].
///
/// The formula itself is not part of the snapshot; this restores the model-extension data.
pub fn load_state(
    mut ctx: partial!(
        Context,
        mut BlockedStoreP,
        mut EquivP,
        mut StatsP,
        mut VariablesP,
    ),
    source: &mut impl Read,
) -> Result<()> {
    ensure!(
        leb128::read::unsigned(source)? == MAGIC,
        "not a gaussat snapshot"
    );

    let block_count = read_len(source)?;
    for _ in 0..block_count {
        let var = read_var(source)?;
        ctx.part_mut(BlockedStoreP).begin_block(var);

        let clause_count = read_len(source)?;
        for _ in 0..clause_count {
            let len = read_len(source)?;
            let mut lits = Vec::with_capacity(len);
            for _ in 0..len {
                lits.push(read_lit(source)?);
            }
            ctx.part_mut(BlockedStoreP).push_clause(&lits);
        }
    }

    let bound_count = read_len(source)?;
    for _ in 0..bound_count {
        let var = read_var(source)?;
        let lit = read_lit(source)?;
        ctx.part_mut(EquivP).load_entry(var, lit);
    }

    let var_count = read_len(source)?;
    if var_count > ctx.part(VariablesP).count() {
        ctx.part_mut(VariablesP).set_var_count(var_count);
    }
    let must_set_count = read_len(source)?;
    for _ in 0..must_set_count {
        let var = read_var(source)?;
        ctx.part_mut(VariablesP).var_data_mut(var).must_set = true;
    }

    let stats = ctx.part_mut(StatsP);
    stats.conflicts = leb128::read::unsigned(source)?;
    stats.decisions = leb128::read::unsigned(source)?;
    stats.propagations = leb128::read::unsigned(source)?;

    Ok(())
}

fn read_len(source: &mut impl Read) -> Result<usize> {
    let value = leb128::read::unsigned(source)?;
    ensure!(value <= usize::max_value() as u64, "snapshot field overflow");
    Ok(value as usize)
}

fn read_var(source: &mut impl Read) -> Result<Var> {
    let index = read_len(source)?;
    ensure!(index < Var::max_count(), "variable out of range");
    Ok(Var::from_index(index))
}

fn read_lit(source: &mut impl Read) -> Result<Lit> {
    let code = read_len(source)?;
    ensure!(code < Var::max_count() * 2, "literal out of range");
    Ok(Lit::from_code(code))
}
