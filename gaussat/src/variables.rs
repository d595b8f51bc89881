//! Per-variable metadata.
//!
//! Variable identifiers are allocated from a single watermark counter; once allocated a variable
//! id is never reused. This stores everything the engine needs to know about a variable that is
//! not part of the assignment: whether it was eliminated or replaced, whether the model must
//! assign it, and whether it is a helper introduced by XOR cutting.

use rustc_hash::FxHashSet;

use gaussat_formula::Var;

/// Why a variable no longer takes part in the search.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Removed {
    /// The variable is in use.
    None,
    /// Removed by bounded variable elimination; its value is recovered from the blocked-clause
    /// store during model extension.
    Eliminated,
    /// Replaced by its equivalent-literal representative.
    Replaced,
}

impl Default for Removed {
    fn default() -> Removed {
        Removed::None
    }
}

/// Metadata for a single variable.
#[derive(Default, Copy, Clone)]
pub struct VarData {
    pub removed: Removed,
    /// The variable appeared as `l | !l` in an input clause, so the model must assign it.
    pub must_set: bool,
    /// Helper variable introduced when cutting a long XOR; excluded from decisions.
    pub cut_helper: bool,
    /// The variable occurs in a recovered or user-added XOR constraint.
    pub in_xor: bool,
}

/// Per-variable metadata.
#[derive(Default)]
pub struct Variables {
    var_data: Vec<VarData>,
    /// Variables whose values the caller samples; they are kept out of structure-changing
    /// rewrites like XOR recomposition.
    sampling: FxHashSet<Var>,
}

impl Variables {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_data.resize(count, VarData::default());
    }

    /// Number of allocated variables.
    pub fn count(&self) -> usize {
        self.var_data.len()
    }

    /// Metadata of a variable.
    pub fn var_data(&self, var: Var) -> &VarData {
        &self.var_data[var.index()]
    }

    /// Mutable metadata of a variable.
    pub fn var_data_mut(&mut self, var: Var) -> &mut VarData {
        &mut self.var_data[var.index()]
    }

    /// Whether the search may branch on this variable.
    pub fn var_is_decidable(&self, var: Var) -> bool {
        let data = &self.var_data[var.index()];
        data.removed == Removed::None
    }

    /// Whether the variable is neither eliminated nor replaced.
    pub fn var_in_use(&self, var: Var) -> bool {
        self.var_data[var.index()].removed == Removed::None
    }

    /// Replace the set of sampling variables.
    pub fn set_sampling_vars(&mut self, vars: &[Var]) {
        self.sampling = vars.iter().cloned().collect();
    }

    /// Whether the caller samples this variable.
    pub fn is_sampling(&self, var: Var) -> bool {
        self.sampling.contains(&var)
    }
}
