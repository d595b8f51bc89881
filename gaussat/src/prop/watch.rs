//! Watchlists to detect clauses that became unit.
//!
//! Each long clause has always two watches pointing to it. The watches are kept in the watchlists
//! of two different literals of the clause. Whenever the watches are moved to different literals
//! the literals of the clause are permuted so the watched literals are in position 0 and 1.
//!
//! When a clause is not unit under the current assignment, the watched literals point at two
//! non-false literals. When a clause is unit and thus propagating, the true literal is watched and
//! in position 0, the other watched literal is the one with the largest decision level and kept in
//! position 1. When a clause becomes satisfied before becoming unit the watches can be kept as
//! they were.
//!
//! When a literal is assigned false that invariant can be invalidated. This can be detected by
//! scanning the watches of the assigned literal. When the assignment is processed the watches are
//! moved to restore that invariant. Unless there is a conflict, i.e. a clause with no non-false
//! literals, this can always be done. This also finds all clauses that became unit. The new unit
//! clauses are exactly those clauses where no two non-false literals can be found.
//!
//! There is no need to update watchlists on backtracking, as unassigning variables cannot
//! invalidate the invariant.
//!
//! See [Section 4.5.1 of the "Handbook of Satisfiability"][handbook-ch4] for more details and
//! references.
//!
//! As a further optimization we use blocking literals. This means that each long watch stores a
//! literal of the clause that is different from the watched literal. It can be the other watched
//! literal or any unwatched literal. When that literal is true, the clause is already satisfied,
//! meaning that no watches need to be updated. This can be detected by just looking at the watch,
//! avoiding access of the clause database. This variant was introduced by [Niklas Sörensson and
//! Niklas Eén in "MINISAT 2.1 and MINISAT++ 1.0 — SAT Race 2008 Editions"][minisat-2.1].
//!
//! Binary clauses are not stored in the clause database at all. Instead each binary clause is
//! represented by a pair of `Watch::Binary` entries, one in the watchlist of the negation of each
//! literal. This makes binary propagation a single lookup and gives the occurrence-based
//! simplifier a place to enumerate binary clauses from.
//!
//! [handbook-ch4]: https://www.satassociation.org/articles/FAIA185-0131.pdf
//! [minisat-2.1]: https://www.cril.univ-artois.fr/SAT09/solvers/booklet.pdf

use gaussat_formula::Lit;

use crate::clause::ClauseRef;

/// A watchlist entry.
///
/// An entry in the list of a literal `lit` is inspected when `lit` becomes true.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Watch {
    /// One half of a binary clause.
    ///
    /// An entry `Binary { implied }` in the list of `lit` represents the clause `(!lit, implied)`.
    Binary { implied: Lit },
    /// A watched long clause.
    ///
    /// The referring literal's negation is in position 0 or 1 of the clause.
    Long { cref: ClauseRef, blocking: Lit },
}

/// Watchlists to detect clauses that became unit.
#[derive(Default)]
pub struct Watchlists {
    /// Contains only valid data for indices of allocated variables.
    watches: Vec<Vec<Watch>>,
    /// Number of binary clauses present.
    binary_count: usize,
}

impl Watchlists {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.watches.resize(count * 2, vec![]);
    }

    /// Start watching a long clause.
    ///
    /// `lits` have to be the first two literals of the given clause.
    pub fn watch_clause(&mut self, cref: ClauseRef, lits: [Lit; 2]) {
        for i in 0..2 {
            let watch = Watch::Long {
                cref,
                blocking: lits[i ^ 1],
            };
            self.watches[(!lits[i]).code()].push(watch);
        }
    }

    /// Stop watching a long clause.
    ///
    /// `lits` have to be the first two literals of the given clause.
    pub fn unwatch_clause(&mut self, cref: ClauseRef, lits: [Lit; 2]) {
        for &lit in lits.iter() {
            let list = &mut self.watches[(!lit).code()];
            if let Some(pos) = list
                .iter()
                .position(|watch| matches!(watch, Watch::Long { cref: c, .. } if *c == cref))
            {
                list.swap_remove(pos);
            }
        }
    }

    /// Add a binary clause.
    pub fn add_binary(&mut self, lits: [Lit; 2]) {
        for i in 0..2 {
            self.watches[(!lits[i]).code()].push(Watch::Binary {
                implied: lits[i ^ 1],
            });
        }
        self.binary_count += 1;
    }

    /// Remove a binary clause.
    ///
    /// Does nothing if the clause is not present.
    pub fn remove_binary(&mut self, lits: [Lit; 2]) {
        let mut removed = false;
        for i in 0..2 {
            let implied = lits[i ^ 1];
            let list = &mut self.watches[(!lits[i]).code()];
            if let Some(pos) = list
                .iter()
                .position(|watch| matches!(watch, Watch::Binary { implied: l } if *l == implied))
            {
                list.swap_remove(pos);
                removed = true;
            }
        }
        if removed {
            self.binary_count -= 1;
        }
    }

    /// Whether the given binary clause is present.
    pub fn has_binary(&self, lits: [Lit; 2]) -> bool {
        self.watches[(!lits[0]).code()]
            .iter()
            .any(|watch| matches!(watch, Watch::Binary { implied } if *implied == lits[1]))
    }

    /// Return watches for a given literal.
    pub fn watched_by(&self, lit: Lit) -> &[Watch] {
        &self.watches[lit.code()]
    }

    /// Return watches for a given literal.
    pub fn watched_by_mut(&mut self, lit: Lit) -> &mut Vec<Watch> {
        &mut self.watches[lit.code()]
    }

    /// Make a literal watch a clause.
    pub fn add_watch(&mut self, lit: Lit, watch: Watch) {
        self.watches[lit.code()].push(watch)
    }

    /// Number of binary clauses.
    pub fn binary_count(&self) -> usize {
        self.binary_count
    }

    /// Correct the binary clause count after external removals.
    pub fn set_binary_count(&mut self, count: usize) {
        self.binary_count = count;
    }

    /// Remove all long watches, keeping binary entries.
    ///
    /// Used when the occurrence simplifier takes ownership of the long clauses and when the
    /// watchlists are rebuilt after garbage collection.
    pub fn clear_long_watches(&mut self) {
        for list in self.watches.iter_mut() {
            list.retain(|watch| matches!(watch, Watch::Binary { .. }));
        }
    }

    /// Number of watchlists (twice the variable count).
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    /// Iterate over the binary clauses `(a, b)` with `a < b`.
    ///
    /// Each binary clause is yielded exactly once.
    pub fn binary_clause_iter(&self) -> impl Iterator<Item = [Lit; 2]> + '_ {
        self.watches.iter().enumerate().flat_map(|(code, list)| {
            let lit = !Lit::from_code(code);
            list.iter().filter_map(move |watch| match watch {
                Watch::Binary { implied } if lit < *implied => Some([lit, *implied]),
                _ => None,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use gaussat_formula::lits;

    #[test]
    fn binary_bookkeeping() {
        let mut watchlists = Watchlists::default();
        watchlists.set_var_count(4);

        watchlists.add_binary(lits![1, 2]);
        watchlists.add_binary(lits![-1, 3]);
        watchlists.add_binary(lits![2, 4]);

        assert_eq!(watchlists.binary_count(), 3);

        let mut bins: Vec<_> = watchlists.binary_clause_iter().collect();
        bins.sort();
        // Sorted by literal code: positive literals order before their negations.
        assert_eq!(bins, vec![lits![1, 2], lits![-1, 3], lits![2, 4]]);

        watchlists.remove_binary(lits![1, 2]);
        assert_eq!(watchlists.binary_count(), 2);
        assert!(watchlists
            .binary_clause_iter()
            .all(|clause| clause != lits![1, 2]));

        // removing an absent clause is a no-op
        watchlists.remove_binary(lits![1, 2]);
        assert_eq!(watchlists.binary_count(), 2);
    }
}
