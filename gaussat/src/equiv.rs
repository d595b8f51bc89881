//! Equivalent-literal table.
//!
//! Two-variable parity constraints pin a variable to another variable's value (possibly
//! inverted). The table maps each variable to a representative literal; chains are flattened by
//! path compression on lookup. Search correctness never depends on this table, as every recorded
//! equivalence is backed by its pair of implication binaries; the table's job is to give model
//! extension a value for variables the search never assigned.

use gaussat_formula::{Lit, Var};

/// Variable to representative-literal map with path compression.
#[derive(Default)]
pub struct EquivTable {
    /// `repr[v]` is `v`'s representative literal; a variable not (yet) equivalent to anything is
    /// its own representative.
    repr: Vec<Lit>,
}

impl EquivTable {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        let old_count = self.repr.len();
        self.repr.reserve(count.saturating_sub(old_count));
        for index in old_count..count {
            self.repr.push(Var::from_index(index).positive());
        }
    }

    /// Number of covered variables.
    pub fn var_count(&self) -> usize {
        self.repr.len()
    }

    /// Whether the variable is bound to another variable's literal.
    pub fn is_bound(&self, var: Var) -> bool {
        self.repr[var.index()].var() != var
    }

    /// The representative literal of a variable, compressing the lookup path.
    ///
    /// The result is a literal over a root variable; the variable equals the returned literal's
    /// value in every model.
    pub fn resolve(&mut self, var: Var) -> Lit {
        let direct = self.repr[var.index()];
        if direct.var() == var {
            return direct;
        }
        let root = self.resolve(direct.var()) ^ direct.is_negative();
        self.repr[var.index()] = root;
        root
    }

    /// Record `var ≡ lit`.
    ///
    /// Ignored if it would bind a variable to itself or form a cycle; a cycle means the
    /// equivalence is already implied.
    pub fn set_equiv(&mut self, var: Var, lit: Lit) {
        if self.resolve(var).var() == self.resolve(lit.var()).var() {
            return;
        }
        self.repr[var.index()] = lit;
    }

    /// Iterator over all bound variables and their direct representatives.
    pub fn iter_bound(&self) -> impl Iterator<Item = (Var, Lit)> + '_ {
        self.repr.iter().enumerate().filter_map(|(index, &lit)| {
            let var = Var::from_index(index);
            if lit.var() == var {
                None
            } else {
                Some((var, lit))
            }
        })
    }

    /// Restore an entry loaded from a snapshot.
    pub fn load_entry(&mut self, var: Var, lit: Lit) {
        if var.index() >= self.repr.len() {
            self.set_var_count(var.index() + 1);
        }
        self.repr[var.index()] = lit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use gaussat_formula::{lit, var};

    #[test]
    fn chains_compress_to_roots() {
        let mut table = EquivTable::default();
        table.set_var_count(5);

        // 2 ≡ 1, 3 ≡ ¬2, 4 ≡ 3
        table.set_equiv(var!(2), lit!(1));
        table.set_equiv(var!(3), lit!(-2));
        table.set_equiv(var!(4), lit!(3));

        assert_eq!(table.resolve(var!(4)), lit!(-1));
        assert_eq!(table.resolve(var!(3)), lit!(-1));
        assert_eq!(table.resolve(var!(2)), lit!(1));
        assert_eq!(table.resolve(var!(1)), lit!(1));
    }

    #[test]
    fn cycles_are_ignored() {
        let mut table = EquivTable::default();
        table.set_var_count(3);

        table.set_equiv(var!(2), lit!(1));
        // would close a cycle
        table.set_equiv(var!(1), lit!(-2));

        assert_eq!(table.resolve(var!(1)), lit!(1));
        assert_eq!(table.resolve(var!(2)), lit!(1));
    }
}
