//! XOR constraints.
//!
//! A parity constraint `x₁ ⊕ x₂ ⊕ … ⊕ xₖ = rhs` over boolean variables. XOR constraints enter the
//! solver through the API or are recovered from groups of CNF clauses, get merged and normalized
//! by the recomposition passes, and finally feed the Gauss matrices.

use partial_ref::{partial, PartialRef};

use gaussat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, Reason};

pub mod detach;
pub mod finder;
pub mod merge;
pub mod toplevel;

/// A single parity constraint.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Xor {
    /// The variables of the parity, strictly sorted.
    pub vars: Vec<Var>,
    /// The parity the variables must sum to.
    pub rhs: bool,
    /// Variables internal to a cut that were removed when XORs were merged; carried for model
    /// extension.
    pub clash_vars: Vec<Var>,
    /// Whether the CNF encoding of this XOR has been detached from the watchlists.
    pub detached: bool,
}

impl Xor {
    /// Create a parity constraint, normalizing the variable list.
    ///
    /// The variables are sorted and duplicate pairs cancel (`x ⊕ x = 0`).
    pub fn new(mut vars: Vec<Var>, rhs: bool) -> Xor {
        vars.sort_unstable();
        let mut write = 0;
        let mut read = 0;
        while read < vars.len() {
            if read + 1 < vars.len() && vars[read] == vars[read + 1] {
                read += 2;
            } else {
                vars[write] = vars[read];
                write += 1;
                read += 1;
            }
        }
        vars.truncate(write);
        Xor {
            vars,
            rhs,
            clash_vars: vec![],
            detached: false,
        }
    }

    /// Number of variables in the parity.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the parity has no variables left.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Whether this is the trivially true empty parity.
    pub fn is_trivial(&self) -> bool {
        self.vars.is_empty() && !self.rhs
    }

    /// Merge the clash variables of another XOR into this one.
    pub fn merge_clash(&mut self, other: &Xor) {
        for &var in other.clash_vars.iter() {
            if !self.clash_vars.contains(&var) {
                self.clash_vars.push(var);
            }
        }
    }

    /// Whether the parity holds under a full assignment of its variables.
    pub fn evaluate(&self, mut value_of: impl FnMut(Var) -> bool) -> bool {
        let parity = self
            .vars
            .iter()
            .fold(false, |parity, &var| parity ^ value_of(var));
        parity == self.rhs
    }
}

/// The solver's current set of XOR constraints.
#[derive(Default)]
pub struct XorStore {
    /// Constraints available to the Gauss engine.
    pub xors: Vec<Xor>,
    /// Constraints set aside because they cannot currently contribute (no connecting variable).
    pub unused: Vec<Xor>,
    /// Raised whenever `xors` changed since the matrices were last built.
    pub updated: bool,
}

impl XorStore {
    /// Add a recovered or user-supplied XOR.
    pub fn push(&mut self, xor: Xor) {
        self.xors.push(xor);
        self.updated = true;
    }
}

/// Result of cleaning an XOR against the top-level assignment.
pub enum CleanedXor {
    /// Still a real parity over at least two variables.
    Kept,
    /// The constraint became trivially true and can be dropped.
    Trivial,
    /// The constraint reduced to `() = 1`.
    Unsat,
}

/// Remove assigned variables from an XOR, folding their values into the right hand side.
///
/// May only be called at decision level 0. Reduction to a single variable enqueues that variable
/// as a unit and reports the constraint as trivial.
pub fn clean_xor(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut StatsP,
        mut TrailP,
        mut ProofP,
    ),
    xor: &mut Xor,
) -> CleanedXor {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let mut rhs = xor.rhs;
    {
        let assignment = ctx.part(AssignmentP);
        xor.vars.retain(|&var| match assignment.var_value(var) {
            Some(value) => {
                rhs ^= value;
                false
            }
            None => true,
        });
    }
    xor.rhs = rhs;

    match xor.vars[..] {
        [] => {
            if xor.rhs {
                CleanedXor::Unsat
            } else {
                CleanedXor::Trivial
            }
        }
        [var] => {
            let lit = var.lit(xor.rhs);
            ctx.part_mut(ProofP).add_clause(&[lit]);
            ctx.part_mut(StatsP).xor_units += 1;
            enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
            CleanedXor::Trivial
        }
        _ => CleanedXor::Kept,
    }
}

/// Attach a two-variable XOR as its pair of binary clauses.
///
/// `x ⊕ y = rhs` also records `y ≡ x ^ rhs` in the equivalent-literal table.
pub fn attach_two_xor(
    mut ctx: partial!(Context, mut EquivP, mut ProofP, mut StatsP, mut WatchlistsP),
    x: Var,
    y: Var,
    rhs: bool,
) {
    // rhs = 1 forbids equal values, rhs = 0 forbids differing values
    let clauses = [
        [x.positive(), Lit::from_var(y, !rhs)],
        [x.negative(), Lit::from_var(y, rhs)],
    ];

    for lits in clauses.iter() {
        // Matrix rebuilds can re-derive the same binary constraint.
        if ctx.part(WatchlistsP).has_binary(*lits) {
            continue;
        }
        ctx.part_mut(ProofP).add_clause(lits);
        ctx.part_mut(WatchlistsP).add_binary(*lits);
        ctx.part_mut(StatsP).xor_binaries += 1;
    }

    ctx.part_mut(EquivP).set_equiv(y, Lit::from_var(x, rhs));
}

/// The CNF encoding of a parity constraint.
///
/// Produces the `2^(k-1)` clauses whose negation-sign parities match the right hand side's
/// violating assignments.
pub fn encode_xor(vars: &[Var], rhs: bool) -> Vec<Vec<Lit>> {
    debug_assert!(!vars.is_empty());
    let mut clauses = vec![];
    for pattern in 0..(1u32 << vars.len()) {
        // A clause with negation signs s rules out the assignment v = s, so the encoding needs
        // exactly the sign vectors of parity !rhs.
        if (pattern.count_ones() & 1 == 1) == rhs {
            continue;
        }
        let clause = vars
            .iter()
            .enumerate()
            .map(|(i, &var)| Lit::from_var(var, pattern >> i & 1 != 0))
            .collect();
        clauses.push(clause);
    }
    clauses
}

#[cfg(test)]
mod tests {
    use super::*;

    use gaussat_formula::vars;

    #[test]
    fn normalizes_duplicate_vars() {
        let xor = Xor::new(vec![var_at(3), var_at(1), var_at(3), var_at(2)], true);
        assert_eq!(xor.vars, vec![var_at(1), var_at(2)]);
        assert!(xor.rhs);

        let cancelled = Xor::new(vec![var_at(5), var_at(5)], false);
        assert!(cancelled.is_trivial());
    }

    #[test]
    fn encoding_size_and_parity() {
        let vars = vars![1, 2, 3];
        for &rhs in [false, true].iter() {
            let clauses = encode_xor(&vars, rhs);
            assert_eq!(clauses.len(), 4);
            for clause in clauses.iter() {
                let negations = clause.iter().filter(|lit| lit.is_negative()).count();
                assert_eq!(negations % 2 == 1, !rhs);
            }
        }
    }

    #[test]
    fn evaluate_respects_rhs() {
        let xor = Xor::new(vec![var_at(0), var_at(1), var_at(2)], true);
        assert!(xor.evaluate(|var| var.index() == 0));
        assert!(!xor.evaluate(|_| false));
    }

    fn var_at(index: usize) -> Var {
        Var::from_index(index)
    }
}
