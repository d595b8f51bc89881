//! Blocked-clause store.
//!
//! Bounded variable elimination removes every clause containing the eliminated variable. Those
//! clauses are appended here so model extension can recompute the variable's value later. The
//! store is append-only: one block per eliminated variable, holding the clauses in a flat literal
//! buffer, walked in reverse elimination order during model extension.

use gaussat_formula::{Lit, Var};

/// One eliminated variable's worth of blocked clauses.
#[derive(Clone, Debug)]
pub struct BlockedBlock {
    /// The eliminated variable.
    pub var: Var,
    /// Range into the literal buffer. Clauses are separated by their length prefix encoded as a
    /// clause-start offset list.
    pub lits: std::ops::Range<usize>,
    /// Start offset of each clause within `lits`.
    pub clause_starts: Vec<usize>,
    /// The block's clauses were put back into the solver; model extension skips it.
    pub reinserted: bool,
}

/// Append-only store of clauses removed by variable elimination.
#[derive(Default)]
pub struct BlockedStore {
    lits: Vec<Lit>,
    blocks: Vec<BlockedBlock>,
}

impl BlockedStore {
    /// Open a new block for the given eliminated variable.
    pub fn begin_block(&mut self, var: Var) {
        let start = self.lits.len();
        self.blocks.push(BlockedBlock {
            var,
            lits: start..start,
            clause_starts: vec![],
            reinserted: false,
        });
    }

    /// Append a clause to the most recently opened block.
    pub fn push_clause(&mut self, lits: &[Lit]) {
        let block = self.blocks.last_mut().expect("no open block");
        block.clause_starts.push(self.lits.len() - block.lits.start);
        self.lits.extend_from_slice(lits);
        block.lits.end = self.lits.len();
    }

    /// Number of stored blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Total number of stored clauses.
    pub fn clause_count(&self) -> usize {
        self.blocks.iter().map(|b| b.clause_starts.len()).sum()
    }

    /// Iterate over the live blocks in reverse elimination order.
    ///
    /// Yields the eliminated variable and its clauses.
    pub fn iter_rev(&self) -> impl Iterator<Item = (Var, BlockedClauses<'_>)> + '_ {
        self.blocks
            .iter()
            .rev()
            .filter(|block| !block.reinserted)
            .map(move |block| {
                (
                    block.var,
                    BlockedClauses {
                        lits: &self.lits[block.lits.clone()],
                        clause_starts: &block.clause_starts,
                    },
                )
            })
    }

    /// Iterate over the live blocks in elimination order, for persistence.
    pub fn iter(&self) -> impl Iterator<Item = (Var, BlockedClauses<'_>)> + '_ {
        self.blocks
            .iter()
            .filter(|block| !block.reinserted)
            .map(move |block| {
                (
                    block.var,
                    BlockedClauses {
                        lits: &self.lits[block.lits.clone()],
                        clause_starts: &block.clause_starts,
                    },
                )
            })
    }

    /// Remove the blocks of one variable, returning their clauses.
    ///
    /// Used to put an eliminated variable back into the solver.
    pub fn take_var_blocks(&mut self, var: Var) -> Vec<Vec<Lit>> {
        let mut clauses = vec![];
        let lits = &self.lits;
        for block in self.blocks.iter_mut() {
            if block.var != var || block.reinserted {
                continue;
            }
            block.reinserted = true;
            let block_lits = &lits[block.lits.clone()];
            let starts = &block.clause_starts;
            for index in 0..starts.len() {
                let begin = starts[index];
                let end = starts
                    .get(index + 1)
                    .cloned()
                    .unwrap_or_else(|| block_lits.len());
                clauses.push(block_lits[begin..end].to_vec());
            }
        }
        clauses
    }
}

/// The clauses of one block.
#[derive(Copy, Clone)]
pub struct BlockedClauses<'a> {
    lits: &'a [Lit],
    clause_starts: &'a [usize],
}

impl<'a> BlockedClauses<'a> {
    /// Iterate over the clauses of the block.
    pub fn iter(&self) -> impl Iterator<Item = &'a [Lit]> + 'a {
        let lits = self.lits;
        let starts = self.clause_starts;
        (0..starts.len()).map(move |index| {
            let begin = starts[index];
            let end = starts.get(index + 1).cloned().unwrap_or_else(|| lits.len());
            &lits[begin..end]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use gaussat_formula::{lits, var};

    #[test]
    fn blocks_iterate_in_reverse() {
        let mut store = BlockedStore::default();

        store.begin_block(var!(1));
        store.push_clause(&lits![1, 2]);
        store.push_clause(&lits![-1, 3, 4]);

        store.begin_block(var!(5));
        store.push_clause(&lits![5, -2]);

        assert_eq!(store.block_count(), 2);
        assert_eq!(store.clause_count(), 3);

        let mut rev = store.iter_rev();

        let (var, clauses) = rev.next().unwrap();
        assert_eq!(var, var!(5));
        let collected: Vec<&[Lit]> = clauses.iter().collect();
        assert_eq!(collected, vec![&lits![5, -2][..]]);

        let (var, clauses) = rev.next().unwrap();
        assert_eq!(var, var!(1));
        let collected: Vec<&[Lit]> = clauses.iter().collect();
        assert_eq!(collected, vec![&lits![1, 2][..], &lits![-1, 3, 4][..]]);

        assert!(rev.next().is_none());
    }
}
