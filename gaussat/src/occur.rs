//! Occurrence-based simplification.
//!
//! Between CDCL runs the simplifier takes the long clauses away from the watchlists and indexes
//! them in full occurrence lists, one entry per literal per clause. The configured passes rewrite
//! the clause set in place; afterwards the surviving clauses are handed back to the watchlists.
//! Binary clauses stay in the watchlists throughout and are consulted through them.

use partial_ref::{partial, PartialRef};

use gaussat_formula::{Lit, Var};

use crate::clause::{db, ClauseHeader, ClauseRef};
use crate::config::SimplifyPass;
use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, Reason, Watch};
use crate::simplify::{prove_units, rebuild_long_watches, simplify};
use crate::state::SatState;
use crate::xor::{finder, merge, toplevel};

pub mod bve;
pub mod sub_str;
pub mod ternary;

/// Occurrence index and simplifier session state.
#[derive(Default)]
pub struct Occur {
    /// Long-clause occurrence lists per literal code. Valid only while a session is active; may
    /// contain deleted clauses, which are skipped on traversal.
    occ: Vec<Vec<ClauseRef>>,
    /// All long clauses linked into the session, including ones deleted since.
    pub clauses: Vec<ClauseRef>,
    /// Long clauses added during the session, for the self-subsumption follow-up.
    pub added_clauses: Vec<ClauseRef>,
    /// Binary clauses added during the session, for the self-subsumption follow-up.
    pub added_binaries: Vec<[Lit; 2]>,
    /// Cursor into the trail for occurrence-based propagation.
    prop_head: usize,
    /// Scratch flag per literal code.
    pub seen: Vec<bool>,
    /// Variables whose clause set changed, for elimination rescoring.
    touched: Vec<Var>,
    touched_flag: Vec<bool>,
    /// Whether a session is active.
    pub active: bool,
    /// Current clause-growth allowance for variable elimination.
    pub grow: u32,
    /// Budget counter of the currently running pass.
    pub budget: i64,
}

impl Occur {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.occ.resize(count * 2, vec![]);
        self.seen.resize(count * 2, false);
        self.touched_flag.resize(count, false);
    }

    /// The occurrence list of a literal.
    ///
    /// May contain deleted clauses.
    pub fn occ_list(&self, lit: Lit) -> &[ClauseRef] {
        &self.occ[lit.code()]
    }

    /// Record that a variable's clause set changed.
    pub fn touch(&mut self, var: Var) {
        if !self.touched_flag[var.index()] {
            self.touched_flag[var.index()] = true;
            self.touched.push(var);
        }
    }

    /// Drain the touched set.
    pub fn drain_touched(&mut self) -> Vec<Var> {
        for &var in self.touched.iter() {
            self.touched_flag[var.index()] = false;
        }
        std::mem::take(&mut self.touched)
    }
}

/// Run the configured simplification schedule.
///
/// May only be called at decision level 0. Returns `Err(())` when the formula was found
/// unsatisfiable; the solver state is updated accordingly.
pub fn run_simplifier(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BlockedStoreP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut EquivP,
        mut ImplGraphP,
        mut MatricesP,
        mut OccurP,
        mut ProofP,
        mut SolverStateP,
        mut StatsP,
        mut TrailP,
        mut VariablesP,
        mut WatchlistsP,
        mut XorStoreP,
        IncrementalP,
        SolverConfigP,
    ),
) -> Result<(), ()> {
    if !ctx.part(SolverConfigP).perform_occur_based_simp {
        return Ok(());
    }
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    // Clean up pending units before taking the clause set.
    if crate::prop::propagate(ctx.borrow()).is_err() {
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        return Err(());
    }
    if prove_units(ctx.borrow()) {
        simplify(ctx.borrow());
    }

    setup(ctx.borrow());

    let result = run_passes(ctx.borrow());

    teardown(ctx.borrow());

    if result.is_err() {
        ctx.part_mut(ProofP).add_clause(&[]);
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
    }

    result
}

fn run_passes(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BlockedStoreP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut EquivP,
        mut ImplGraphP,
        mut MatricesP,
        mut OccurP,
        mut ProofP,
        mut StatsP,
        mut TrailP,
        mut VariablesP,
        mut WatchlistsP,
        mut XorStoreP,
        IncrementalP,
        SolverConfigP,
    ),
) -> Result<(), ()> {
    let schedule = ctx.part(SolverConfigP).simplify_schedule.clone();

    for pass in schedule {
        propagate_occur(ctx.borrow())?;

        match pass {
            SimplifyPass::BackwSubStr => {
                ctx.part_mut(OccurP).budget = ctx.part(SolverConfigP).subsumption_budget;
                sub_str::backward_sub_str(ctx.borrow())?;
            }
            SimplifyPass::Xor if ctx.part(SolverConfigP).do_find_xors => {
                ctx.part_mut(OccurP).budget = ctx.part(SolverConfigP).xor_find_budget;
                finder::find_xors(ctx.borrow());
                merge::xor_together_xors(ctx.borrow())?;
                toplevel::toplevel_gauss(ctx.borrow())?;
            }
            SimplifyPass::TernaryRes if ctx.part(SolverConfigP).do_tern_res => {
                ctx.part_mut(OccurP).budget = ctx.part(SolverConfigP).ternary_budget;
                ternary::ternary_res(ctx.borrow())?;
            }
            SimplifyPass::Bve if ctx.part(SolverConfigP).do_bve => {
                ctx.part_mut(OccurP).budget = ctx.part(SolverConfigP).bve_budget;
                bve::eliminate_vars(ctx.borrow())?;
            }
            SimplifyPass::Bva if ctx.part(SolverConfigP).do_bva => {
                // Bounded variable addition runs strictly after XOR recovery has stabilized; the
                // pass itself lives outside the core simplifier.
                log::debug!("occ-bva scheduled but not active");
            }
            _ => (),
        }

        sub_str::sub_str_with_added(ctx.borrow())?;
    }

    propagate_occur(ctx.borrow())?;

    // Double the elimination growth allowance for the next round.
    let start = ctx.part(SolverConfigP).bve_grow_start;
    let limit = ctx.part(SolverConfigP).bve_grow_limit;
    let occur = ctx.part_mut(OccurP);
    occur.grow = (occur.grow * 2).max(start).max(1).min(limit);

    Ok(())
}

/// Take the long clauses from the CDCL engine and build the occurrence index.
fn setup(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut OccurP,
        mut WatchlistsP,
        ClauseDbP,
        TrailP,
    ),
) {
    ctx.part_mut(WatchlistsP).clear_long_watches();

    let (occur, mut ctx) = ctx.split_part_mut(OccurP);
    let (alloc, ctx) = ctx.split_part_mut(ClauseAllocP);

    occur.active = true;
    occur.clauses.clear();
    occur.added_clauses.clear();
    occur.added_binaries.clear();
    occur.prop_head = ctx.part(TrailP).trail().len();

    for list in occur.occ.iter_mut() {
        list.clear();
    }

    for cref in ctx.part(ClauseDbP).unchecked_clause_iter() {
        let header = alloc.header(cref);
        if header.deleted() || header.xor_detached() {
            continue;
        }
        occur.clauses.push(cref);
        for &lit in alloc.clause(cref).lits() {
            occur.occ[lit.code()].push(cref);
        }
    }
}

/// Give the surviving clauses back to the CDCL engine.
fn teardown(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut MatricesP,
        mut OccurP,
        mut TrailP,
        mut WatchlistsP,
        AssignmentP,
    ),
) {
    let occur = ctx.part_mut(OccurP);
    occur.active = false;
    occur.clauses.clear();
    occur.added_clauses.clear();
    occur.added_binaries.clear();
    for list in occur.occ.iter_mut() {
        list.clear();
    }

    prove_units(ctx.borrow());

    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let alloc = ctx.part_mut(ClauseAllocP);

    rebuild_long_watches(watchlists, alloc, db);
}

/// Propagate all pending units over the occurrence index and the binary watchlists.
///
/// The boolean propagation loop cannot run during a session, as the long watches are detached.
/// This walks the trail with the session's own cursor, removing satisfied clauses and stripping
/// false literals.
pub fn propagate_occur(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut OccurP,
        mut ProofP,
        mut TrailP,
        mut WatchlistsP,
    ),
) -> Result<(), ()> {
    loop {
        let head = ctx.part(OccurP).prop_head;
        let lit = match ctx.part(TrailP).trail().get(head) {
            Some(&lit) => lit,
            None => return Ok(()),
        };
        ctx.part_mut(OccurP).prop_head += 1;

        propagate_occur_lit(ctx.borrow(), lit)?;
    }
}

fn propagate_occur_lit(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut OccurP,
        mut ProofP,
        mut TrailP,
        mut WatchlistsP,
    ),
    lit: Lit,
) -> Result<(), ()> {
    // Binary clauses (!lit v x) propagate x and are then satisfied; binary clauses (lit v y) are
    // satisfied outright. All of them are removed along with their partner entries.
    let mut implied_lits = vec![];
    let mut satisfied_partners = vec![];
    {
        let watchlists = ctx.part_mut(WatchlistsP);

        watchlists.watched_by_mut(lit).retain(|watch| match watch {
            Watch::Binary { implied } => {
                implied_lits.push(*implied);
                false
            }
            Watch::Long { .. } => true,
        });

        watchlists.watched_by_mut(!lit).retain(|watch| match watch {
            Watch::Binary { implied } => {
                satisfied_partners.push(*implied);
                false
            }
            Watch::Long { .. } => true,
        });
    }

    let removed_clauses = implied_lits.len() + satisfied_partners.len();

    let mut result = Ok(());

    for &implied in implied_lits.iter() {
        remove_binary_partner(ctx.borrow(), implied, !lit);
        ctx.part_mut(ProofP).delete_clause(&[!lit, implied]);
        ctx.part_mut(OccurP).touch(implied.var());

        match ctx.part(AssignmentP).lit_value(implied) {
            Some(true) => (),
            Some(false) => result = Err(()),
            None => enqueue_assignment(ctx.borrow(), implied, Reason::Unit),
        }
    }

    for &partner in satisfied_partners.iter() {
        remove_binary_partner(ctx.borrow(), partner, lit);
        ctx.part_mut(ProofP).delete_clause(&[lit, partner]);
        ctx.part_mut(OccurP).touch(partner.var());
    }

    {
        let watchlists = ctx.part_mut(WatchlistsP);
        let count = watchlists.binary_count() - removed_clauses;
        watchlists.set_binary_count(count);
    }

    result?;

    // Long clauses containing lit are satisfied.
    let satisfied = std::mem::take(&mut ctx.part_mut(OccurP).occ[lit.code()]);
    for &cref in satisfied.iter() {
        if ctx.part(ClauseAllocP).header(cref).deleted() {
            continue;
        }
        unlink_clause(ctx.borrow(), cref, true, Some(lit));
    }

    // Long clauses containing !lit lose that literal.
    let falsified = std::mem::take(&mut ctx.part_mut(OccurP).occ[(!lit).code()]);
    for &cref in falsified.iter() {
        if ctx.part(ClauseAllocP).header(cref).deleted() {
            continue;
        }
        strengthen_clause(ctx.borrow(), cref, !lit)?;
    }

    Ok(())
}

/// Remove the partner watch entry of a removed binary clause.
///
/// The clause `(other v implied)` keeps an entry `implied` in the list of `!other`.
fn remove_binary_partner(
    mut ctx: partial!(Context, mut WatchlistsP),
    other: Lit,
    implied: Lit,
) {
    let list = ctx.part_mut(WatchlistsP).watched_by_mut(!other);
    if let Some(pos) = list
        .iter()
        .position(|watch| matches!(watch, Watch::Binary { implied: l } if *l == implied))
    {
        list.swap_remove(pos);
    }
}

/// Remove a long clause from the session and the clause database.
///
/// `keep_lit` skips the occurrence-list removal for one literal whose list is currently detached
/// by the caller.
pub fn unlink_clause(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut OccurP,
        mut ProofP,
    ),
    cref: ClauseRef,
    emit_delete: bool,
    keep_lit: Option<Lit>,
) {
    let (occur, mut ctx) = ctx.split_part_mut(OccurP);
    let (proof, mut ctx) = ctx.split_part_mut(ProofP);

    {
        let lits = ctx.part(ClauseAllocP).clause(cref).lits();
        if emit_delete {
            proof.delete_clause(lits);
        }
        for &lit in lits {
            occur.touch(lit.var());
            if Some(lit) != keep_lit {
                let list = &mut occur.occ[lit.code()];
                if let Some(pos) = list.iter().position(|&c| c == cref) {
                    list.swap_remove(pos);
                }
            }
        }
    }

    db::delete_clause(ctx.borrow(), cref);
}

/// Remove one literal from a long clause.
///
/// Shrinking to two literals migrates the clause to the binary watchlists; shorter results turn
/// into units or unsatisfiability.
pub fn strengthen_clause(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut OccurP,
        mut ProofP,
        mut TrailP,
        mut WatchlistsP,
    ),
    cref: ClauseRef,
    lit: Lit,
) -> Result<(), ()> {
    let orig_lits: Vec<Lit>;
    {
        let clause = ctx.part_mut(ClauseAllocP).clause_mut(cref);
        let lits = clause.lits_mut();
        let pos = match lits.iter().position(|&l| l == lit) {
            Some(pos) => pos,
            None => return Ok(()),
        };
        orig_lits = lits.to_vec();
        let last = lits.len() - 1;
        lits.swap(pos, last);
        let new_len = last;
        clause.header_mut().set_len(new_len);
    }

    {
        let occur = ctx.part_mut(OccurP);
        let list = &mut occur.occ[lit.code()];
        if let Some(pos) = list.iter().position(|&c| c == cref) {
            list.swap_remove(pos);
        }
        occur.touch(lit.var());
    }

    let new_lits: Vec<Lit> = ctx.part(ClauseAllocP).clause(cref).lits().to_vec();
    ctx.part_mut(ProofP).add_clause(&new_lits);
    ctx.part_mut(ProofP).delete_clause(&orig_lits);

    match new_lits[..] {
        [] => Err(()),
        [unit] => {
            unlink_clause(ctx.borrow(), cref, false, None);
            enqueue_unit(ctx.borrow(), unit, false)
        }
        [lit_0, lit_1] => {
            // The arena only stores clauses of three or more literals; migrate to the binary
            // watchlists.
            unlink_clause(ctx.borrow(), cref, false, None);
            add_binary_during_occ(ctx.borrow(), [lit_0, lit_1], false);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Enqueue a unit derived during simplification.
///
/// `emit_add` controls whether the unit clause is reported to the proof sink; pass `false` when
/// the caller already did.
pub fn enqueue_unit(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut ProofP,
        mut TrailP,
    ),
    lit: Lit,
    emit_add: bool,
) -> Result<(), ()> {
    match ctx.part(AssignmentP).lit_value(lit) {
        Some(true) => Ok(()),
        Some(false) => Err(()),
        None => {
            if emit_add {
                ctx.part_mut(ProofP).add_clause(&[lit]);
            }
            enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
            Ok(())
        }
    }
}

/// Add a new long clause during a session.
pub fn add_long_during_occ(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut OccurP,
        mut ProofP,
    ),
    header: ClauseHeader,
    lits: &[Lit],
) -> ClauseRef {
    debug_assert!(lits.len() >= 3);

    ctx.part_mut(ProofP).add_clause(lits);

    let cref = db::add_clause(ctx.borrow(), header, lits);

    let occur = ctx.part_mut(OccurP);
    occur.clauses.push(cref);
    occur.added_clauses.push(cref);
    for &lit in lits {
        occur.occ[lit.code()].push(cref);
        occur.touch(lit.var());
    }

    cref
}

/// Add a new binary clause during a session.
pub fn add_binary_during_occ(
    mut ctx: partial!(Context, mut OccurP, mut ProofP, mut WatchlistsP),
    lits: [Lit; 2],
    emit_add: bool,
) {
    if ctx.part(WatchlistsP).has_binary(lits) {
        return;
    }
    if emit_add {
        ctx.part_mut(ProofP).add_clause(&lits);
    }
    ctx.part_mut(WatchlistsP).add_binary(lits);
    let occur = ctx.part_mut(OccurP);
    occur.added_binaries.push(lits);
    occur.touch(lits[0].var());
    occur.touch(lits[1].var());
}

/// Remove a binary clause during a session.
pub fn remove_binary_during_occ(
    mut ctx: partial!(Context, mut OccurP, mut ProofP, mut WatchlistsP),
    lits: [Lit; 2],
    emit_delete: bool,
) {
    if emit_delete {
        ctx.part_mut(ProofP).delete_clause(&lits);
    }
    ctx.part_mut(WatchlistsP).remove_binary(lits);
    let occur = ctx.part_mut(OccurP);
    occur.touch(lits[0].var());
    occur.touch(lits[1].var());
}

/// Count the live irredundant occurrences of a literal, long clauses and binaries.
pub fn count_occurrences(
    mut ctx: partial!(Context, ClauseAllocP, OccurP, WatchlistsP),
    lit: Lit,
) -> u32 {
    let mut count = 0;

    for &cref in ctx.part(OccurP).occ_list(lit).iter() {
        let header = ctx.part(ClauseAllocP).header(cref);
        if !header.deleted() && !header.redundant() {
            count += 1;
        }
    }

    // The clause (lit v x) has an entry in the list of !lit.
    for watch in ctx.part(WatchlistsP).watched_by(!lit).iter() {
        if let Watch::Binary { .. } = watch {
            count += 1;
        }
    }

    count
}

/// The binary clauses containing the given literal.
pub fn binaries_with_lit(
    mut ctx: partial!(Context, WatchlistsP),
    lit: Lit,
) -> Vec<[Lit; 2]> {
    ctx.part(WatchlistsP)
        .watched_by(!lit)
        .iter()
        .filter_map(|watch| match watch {
            Watch::Binary { implied } => Some([lit, *implied]),
            Watch::Long { .. } => None,
        })
        .collect()
}
