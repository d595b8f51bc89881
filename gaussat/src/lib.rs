//! gaussat — a CDCL SAT solver with on-the-fly Gauss-Jordan elimination for XOR constraints.
//!
//! The solver accepts ordinary disjunctive clauses and parity (XOR) constraints. Besides the
//! usual conflict-driven search it runs an occurrence-based simplifier (variable elimination,
//! subsumption, self-subsuming and ternary resolution), recovers parity constraints from groups
//! of CNF clauses, recomposes them, and keeps them in incrementally maintained row-reduced GF(2)
//! matrices that propagate and conflict alongside the boolean watchlists.

pub mod config;
pub mod solver;

mod analyze_conflict;
mod blocked;
mod cdcl;
mod clause;
mod context;
mod decision;
mod equiv;
mod extend;
mod gauss;
mod glue;
mod incremental;
mod load;
mod occur;
mod proof;
mod prop;
mod schedule;
mod simplify;
mod snapshot;
mod state;
mod stats;
mod sync;
mod tmp;
mod variables;
mod xor;

pub use gaussat_formula::{CnfFormula, ExtendFormula, Lit, Var};

pub use config::{PolarityMode, SimplifyPass, SolverConfig};
pub use solver::{InterruptHandle, Solver, SolverError};
pub use stats::Stats;
pub use sync::SharedData;
