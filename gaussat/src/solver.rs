//! Boolean satisfiability solver with XOR reasoning.
use std::io;
use std::sync::atomic::Ordering;
use std::sync::{atomic::AtomicBool, Arc};
use std::time::Instant;

use partial_ref::{IntoPartialRef, IntoPartialRefMut, PartialRef};

use thiserror::Error;

use gaussat_formula::{CnfFormula, Lit, Var};

use crate::config::SolverConfig;
use crate::context::{ensure_var_count, parts::*, Context};
use crate::extend::extend_model;
use crate::incremental::set_assumptions;
use crate::load::load_clause;
use crate::occur::{bve, run_simplifier};
use crate::schedule::{between_searches_housekeeping, schedule_step};
use crate::snapshot;
use crate::state::SatState;
use crate::stats::Stats;
use crate::sync::SharedData;
use crate::variables::Removed;
use crate::xor::{encode_xor, Xor};

/// Errors reported at the API boundary.
///
/// These fail the offending call without corrupting the solver state.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum SolverError {
    #[error("variable index exceeds the supported maximum")]
    TooManyVars,
    #[error("clause length exceeds the supported maximum")]
    TooLongClause,
}

/// Largest accepted clause length.
///
/// Chosen so a single clause can never exhaust the arena's 32-bit offset range.
const MAX_CLAUSE_LEN: usize = (u32::max_value() / 4) as usize;

/// A handle to interrupt a running solve from another thread.
#[derive(Clone)]
pub struct InterruptHandle {
    interrupt: Arc<AtomicBool>,
}

impl InterruptHandle {
    /// Make the ongoing (or next) `solve` return unknown as soon as possible.
    pub fn interrupt_asap(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }
}

/// A boolean satisfiability solver accepting disjunctive and parity constraints.
#[derive(Default)]
pub struct Solver {
    ctx: Box<Context>,
}

impl Solver {
    /// Create a new solver.
    pub fn new() -> Solver {
        Solver::default()
    }

    /// Allocate a fresh variable.
    pub fn new_var(&mut self) -> Result<Var, SolverError> {
        let mut vars = self.new_vars(1)?;
        Ok(vars.pop().expect("requested one variable"))
    }

    /// Allocate several fresh variables.
    pub fn new_vars(&mut self, count: usize) -> Result<Vec<Var>, SolverError> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let first = ctx.part(VariablesP).count();
        if count > Var::max_count() - first {
            return Err(SolverError::TooManyVars);
        }
        ensure_var_count(ctx.borrow(), first + count);
        Ok((first..first + count).map(Var::from_index).collect())
    }

    /// Add a disjunctive clause.
    ///
    /// Returns `false` when the formula became unsatisfiable at the top level.
    pub fn add_clause(&mut self, lits: &[Lit]) -> Result<bool, SolverError> {
        check_lits(lits)?;

        let mut ctx = self.ctx.into_partial_ref_mut();
        let count = ctx.part(VariablesP).count();
        let watermark = lits
            .iter()
            .map(|lit| lit.index() + 1)
            .max()
            .unwrap_or_default()
            .max(count);
        ensure_var_count(ctx.borrow(), watermark);

        load_clause(ctx.borrow(), lits);

        Ok(ctx.part(SolverStateP).sat_state != SatState::Unsat)
    }

    /// Add a whole formula.
    pub fn add_formula(&mut self, formula: &CnfFormula) -> Result<bool, SolverError> {
        let mut ok = true;
        for clause in formula.iter() {
            ok = self.add_clause(clause)?;
        }
        Ok(ok)
    }

    /// Add a parity constraint `vars[0] ⊕ … ⊕ vars[n] = rhs`.
    ///
    /// Long constraints are cut into chunks joined by fresh helper variables. The CNF encoding of
    /// each chunk is added alongside the constraint, so the formula is complete even when no
    /// matrix picks the constraint up.
    pub fn add_xor_clause(&mut self, vars: &[Var], rhs: bool) -> Result<bool, SolverError> {
        for &var in vars {
            if var.index() >= Var::max_count() {
                return Err(SolverError::TooManyVars);
            }
        }
        if vars.len() > MAX_CLAUSE_LEN {
            return Err(SolverError::TooLongClause);
        }

        let xor = Xor::new(vars.to_vec(), rhs);

        let mut ctx = self.ctx.into_partial_ref_mut();
        let count = ctx.part(VariablesP).count();
        let watermark = xor
            .vars
            .iter()
            .map(|var| var.index() + 1)
            .max()
            .unwrap_or_default()
            .max(count);
        ensure_var_count(ctx.borrow(), watermark);

        match xor.vars.len() {
            0 => {
                if xor.rhs {
                    load_clause(ctx.borrow(), &[]);
                }
            }
            1 => {
                let lit = xor.vars[0].lit(xor.rhs);
                load_clause(ctx.borrow(), &[lit]);
            }
            _ => {
                drop(ctx);
                self.add_cut_xor(xor)?;
                ctx = self.ctx.into_partial_ref_mut();
            }
        }

        Ok(ctx.part(SolverStateP).sat_state != SatState::Unsat)
    }

    /// Slice a long parity constraint and load the pieces.
    fn add_cut_xor(&mut self, xor: Xor) -> Result<(), SolverError> {
        let cut = self.ctx.solver_config.xor_var_per_cut.max(2);

        let mut remaining = xor.vars;
        let rhs = xor.rhs;

        while !remaining.is_empty() {
            let (chunk_vars, chunk_rhs) = if remaining.len() <= cut + 2 {
                (std::mem::take(&mut remaining), rhs)
            } else {
                // Take a slice of the constraint and tie it off with a fresh helper carrying the
                // parity of the rest.
                let mut chunk: Vec<Var> = remaining.drain(..cut + 1).collect();
                let helper = self.new_var()?;
                {
                    let mut ctx = self.ctx.into_partial_ref_mut();
                    let data = ctx.part_mut(VariablesP).var_data_mut(helper);
                    data.cut_helper = true;
                }
                chunk.push(helper);
                remaining.insert(0, helper);
                (chunk, false)
            };

            let chunk_xor = Xor::new(chunk_vars, chunk_rhs);

            let mut ctx = self.ctx.into_partial_ref_mut();
            for &var in chunk_xor.vars.iter() {
                ctx.part_mut(VariablesP).var_data_mut(var).in_xor = true;
            }
            for clause in encode_xor(&chunk_xor.vars, chunk_xor.rhs) {
                load_clause(ctx.borrow(), &clause);
            }
            ctx.part_mut(XorStoreP).push(chunk_xor);
        }

        Ok(())
    }

    /// Check satisfiability of the current formula.
    ///
    /// Returns `None` when the search was interrupted or a budget ran out.
    pub fn solve(&mut self) -> Option<bool> {
        self.solve_with(&[])
    }

    /// Check satisfiability under the given assumptions.
    pub fn solve_with(&mut self, assumptions: &[Lit]) -> Option<bool> {
        let mut ctx = self.ctx.into_partial_ref_mut();

        ctx.part(SolverStateP).clear_interrupt();
        ctx.part_mut(SolverStateP).solve_started = Some(Instant::now());

        {
            let count = ctx.part(VariablesP).count();
            let watermark = assumptions
                .iter()
                .map(|lit| lit.index() + 1)
                .max()
                .unwrap_or_default()
                .max(count);
            ensure_var_count(ctx.borrow(), watermark);
        }

        set_assumptions(ctx.borrow(), assumptions);

        // Assuming a variable that was eliminated requires putting its clauses back first.
        for &lit in assumptions {
            if ctx.part(VariablesP).var_data(lit.var()).removed == Removed::Eliminated {
                bve::uneliminate(ctx.borrow(), lit.var());
            }
        }

        if ctx.part(SolverStateP).sat_state == SatState::Unknown {
            // Simplify, recover XORs and build the matrices before searching.
            let interval = ctx.part(SolverConfigP).occur_simp_interval;
            ctx.part_mut(ScheduleP).reschedule_simplify(interval);
            between_searches_housekeeping(ctx.borrow());
        }

        while schedule_step(ctx.borrow()) {}

        match ctx.part(SolverStateP).sat_state {
            SatState::Unknown => None,
            SatState::Sat => {
                extend_model(ctx.borrow());
                Some(true)
            }
            SatState::Unsat | SatState::UnsatUnderAssumptions => Some(false),
        }
    }

    /// Run the simplifier without searching.
    ///
    /// Returns `Some(false)` when simplification finds the formula unsatisfiable.
    pub fn simplify(&mut self) -> Option<bool> {
        let mut ctx = self.ctx.into_partial_ref_mut();

        if ctx.part(SolverStateP).sat_state == SatState::Unsat {
            return Some(false);
        }

        set_assumptions(ctx.borrow(), &[]);
        if run_simplifier(ctx.borrow()).is_err() {
            return Some(false);
        }

        None
    }

    /// The satisfying assignment found by the last `solve` call.
    ///
    /// Covers all variables of the original formula, including eliminated ones.
    pub fn model(&self) -> Option<Vec<Lit>> {
        let ctx = self.ctx.into_partial_ref();
        if ctx.part(SolverStateP).sat_state == SatState::Sat {
            Some(ctx.part(ModelP).lits())
        } else {
            None
        }
    }

    /// The value of a variable in the last model.
    pub fn model_value(&self, var: Var) -> Option<bool> {
        let ctx = self.ctx.into_partial_ref();
        if ctx.part(SolverStateP).sat_state == SatState::Sat {
            ctx.part(ModelP).var_value(var)
        } else {
            None
        }
    }

    /// Subset of the negated assumptions that made the last `solve_with` call unsatisfiable.
    pub fn conflict(&self) -> Vec<Lit> {
        let ctx = self.ctx.into_partial_ref();
        match ctx.part(SolverStateP).sat_state {
            SatState::UnsatUnderAssumptions => ctx
                .part(IncrementalP)
                .failed_core()
                .iter()
                .map(|&lit| !lit)
                .collect(),
            _ => vec![],
        }
    }

    /// Raise the interrupt flag; an ongoing `solve` returns unknown at the next check point.
    pub fn interrupt_asap(&self) {
        self.ctx.solver_state.interrupt.store(true, Ordering::Relaxed);
    }

    /// A cloneable handle for interrupting this solver from other threads.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            interrupt: self.ctx.solver_state.interrupt.clone(),
        }
    }

    /// Connect this solver to a group's shared-data broker.
    pub fn set_shared_data(&mut self, shared: Arc<SharedData>) {
        self.ctx.data_sync.set_shared_data(shared);
    }

    /// Declare the variables whose values the caller samples.
    ///
    /// Sampling variables are kept out of structure-changing rewrites such as XOR
    /// recomposition, so their model values stay directly meaningful.
    pub fn set_sampling_vars(&mut self, vars: &[Var]) {
        self.ctx.variables.set_sampling_vars(vars);
    }

    /// Write a DRAT proof of all following clause additions and deletions.
    pub fn write_drat(&mut self, sink: impl io::Write + 'static) {
        self.ctx.proof.write_drat(Box::new(sink));
    }

    /// Stop DRAT proof writing and flush the sink.
    pub fn close_drat(&mut self) {
        self.ctx.proof.close();
    }

    /// The current solver configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.ctx.solver_config
    }

    /// Replace the solver configuration.
    pub fn set_config(&mut self, config: SolverConfig) {
        self.ctx.vsids.set_decay(config.vsids_decay);
        self.ctx
            .clause_activity
            .set_decay(config.clause_activity_decay);
        self.ctx.solver_config = config;
    }

    /// Counters gathered so far.
    pub fn stats(&self) -> Stats {
        self.ctx.stats.clone()
    }

    /// Persist the model-extension state.
    pub fn write_snapshot(&self, target: &mut impl io::Write) -> anyhow::Result<()> {
        let mut ctx = self.ctx.into_partial_ref();
        snapshot::save_state(ctx.borrow(), target)
    }

    /// Restore a state written by [`write_snapshot`](Solver::write_snapshot).
    pub fn read_snapshot(&mut self, source: &mut impl io::Read) -> anyhow::Result<()> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        snapshot::load_state(ctx.borrow(), source)?;

        // The snapshot may cover more variables than were mentioned so far.
        let count = ctx.part(VariablesP).count();
        ensure_var_count(ctx.borrow(), count);
        Ok(())
    }
}

/// Validate user supplied literals.
fn check_lits(lits: &[Lit]) -> Result<(), SolverError> {
    if lits.len() > MAX_CLAUSE_LEN {
        return Err(SolverError::TooLongClause);
    }
    for &lit in lits {
        if lit.index() >= Var::max_count() {
            return Err(SolverError::TooManyVars);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use gaussat_formula::test::{sat_formula, sat_xor_system, sgen_unsat_formula};

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..5usize)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula).unwrap();

            prop_assert_eq!(solver.solve(), Some(false));
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula).unwrap();

            prop_assert_eq!(solver.solve(), Some(true));

            let model = solver.model().unwrap();

            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }
        }

        #[test]
        fn sat_xors(xors in sat_xor_system(3..10usize, 1..6, 2..5usize)) {
            let mut solver = Solver::new();

            for (vars, rhs) in xors.iter() {
                solver.add_xor_clause(vars, *rhs).unwrap();
            }

            prop_assert_eq!(solver.solve(), Some(true));

            for (vars, rhs) in xors.iter() {
                let parity = vars
                    .iter()
                    .fold(false, |acc, &var| acc ^ (solver.model_value(var) == Some(true)));
                prop_assert_eq!(parity, *rhs);
            }
        }
    }
}
