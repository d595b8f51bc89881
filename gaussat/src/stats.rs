//! Solver statistics.
use serde::{Deserialize, Serialize};

/// Counters tracked during solving and simplification.
///
/// These remain valid when `solve` returns unknown due to an interrupt or an exhausted budget.
#[derive(Default, Clone, Debug, Serialize, Deserialize)]
pub struct Stats {
    pub conflicts: u64,
    pub decisions: u64,
    pub propagations: u64,
    pub restarts: u64,
    pub learnt_units: u64,
    pub learnt_binaries: u64,

    pub gauss_propagations: u64,
    pub gauss_conflicts: u64,
    pub gauss_matrices_built: u64,
    pub gauss_matrices_disabled: u64,

    pub xors_found: u64,
    pub xors_merged: u64,
    pub xor_units: u64,
    pub xor_binaries: u64,

    pub subsumed_clauses: u64,
    pub strengthened_clauses: u64,
    pub ternary_resolvents: u64,
    pub eliminated_vars: u64,
    pub blocked_clauses_stored: u64,

    pub sync_units_received: u64,
    pub sync_units_sent: u64,
    pub sync_binaries_received: u64,
    pub sync_binaries_sent: u64,
}
