//! Model extension.
//!
//! After the search finds a satisfying assignment, the trail only covers the variables the
//! simplified formula still contains. This reconstructs values for eliminated variables from the
//! blocked-clause store, applies the equivalent-literal table and defaults everything else, so
//! the reported model covers all original variables.

use partial_ref::{partial, PartialRef};

use gaussat_formula::{Lit, Var};

use crate::context::{parts::*, Context};

/// The extended model over all original variables.
#[derive(Default)]
pub struct Model {
    /// Valid whenever the solver state is SAT.
    assignment: Vec<Option<bool>>,
}

impl Model {
    /// Value of a variable in the extended model.
    pub fn var_value(&self, var: Var) -> Option<bool> {
        self.assignment.get(var.index()).cloned().flatten()
    }

    /// Whether a literal is true in the extended model.
    pub fn lit_is_true(&self, lit: Lit) -> bool {
        self.var_value(lit.var()) == Some(lit.is_positive())
    }

    /// All assigned literals of the extended model.
    pub fn lits(&self) -> Vec<Lit> {
        self.assignment
            .iter()
            .enumerate()
            .flat_map(|(index, assignment)| {
                assignment.map(|value| Var::from_index(index).lit(value))
            })
            .collect()
    }
}

/// Extend the trail assignment to a model over all original variables.
pub fn extend_model(
    mut ctx: partial!(
        Context,
        mut EquivP,
        mut ModelP,
        AssignmentP,
        BlockedStoreP,
        VariablesP,
    ),
) {
    let var_count = ctx.part(VariablesP).count();

    let mut assignment: Vec<Option<bool>> = Vec::with_capacity(var_count);
    for index in 0..var_count {
        assignment.push(ctx.part(AssignmentP).var_value(Var::from_index(index)));
    }

    // Walk the eliminated variables in reverse elimination order. Whenever a stored clause is not
    // already satisfied, its eliminated variable is set to satisfy it; the remaining clauses of
    // the block are then satisfied as well, which is exactly the invariant variable elimination
    // maintains.
    for (var, clauses) in ctx.part(BlockedStoreP).iter_rev() {
        let mut satisfied_by = None;

        for clause in clauses.iter() {
            let satisfied = clause
                .iter()
                .any(|&lit| assignment[lit.index()] == Some(lit.is_positive()));
            if satisfied {
                continue;
            }

            let own_lit = clause
                .iter()
                .find(|lit| lit.var() == var)
                .expect("blocked clause contains its eliminated variable");
            satisfied_by = Some(own_lit.is_positive());
            break;
        }

        assignment[var.index()] = Some(satisfied_by.unwrap_or(false));
    }

    // Bound variables take the value of their representative, with parity.
    for index in 0..var_count {
        let var = Var::from_index(index);
        if assignment[index].is_none() && ctx.part(EquivP).is_bound(var) {
            let root = ctx.part_mut(EquivP).resolve(var);
            if let Some(value) = assignment[root.index()] {
                assignment[index] = Some(value ^ root.is_negative());
            }
        }
    }

    // Whatever is still undefined gets a default. This covers the must-set variables (flagged
    // when a tautological input clause was dropped) as well as variables that never occurred in
    // any constraint.
    for value in assignment.iter_mut() {
        if value.is_none() {
            *value = Some(false);
        }
    }

    ctx.part_mut(ModelP).assignment = assignment;
}
