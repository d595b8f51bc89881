//! Scheduling of processing and solving steps.
use log::info;

use partial_ref::{partial, PartialRef};

use crate::cdcl::conflict_step;
use crate::clause::collect_garbage;
use crate::clause::reduce::{reduce_locals, reduce_mids};
use crate::clause::Tier;
use crate::context::{parts::*, Context};
use crate::gauss;
use crate::occur::run_simplifier;
use crate::prop::{full_restart, restart};
use crate::state::SatState;
use crate::sync::sync_data;
use crate::xor::detach;

mod luby;

use luby::LubySequence;

/// Scheduling of processing and solving steps.
#[derive(Default)]
pub struct Schedule {
    conflicts: u64,
    next_restart: u64,
    restarts: u64,
    luby: LubySequence,
    next_reduce_locals: u64,
    next_reduce_mids: u64,
    next_simplify: u64,
}

impl Schedule {
    /// Reset the simplification deadline, e.g. when a new solve round starts.
    pub fn reschedule_simplify(&mut self, interval: u64) {
        self.next_simplify = self.conflicts + interval;
    }
}

/// Whether the conflict and time budgets allow continuing the search.
fn budgets_exhausted(
    mut ctx: partial!(Context, ScheduleP, SolverConfigP, SolverStateP),
) -> bool {
    let state = ctx.part(SolverStateP);
    if state.interrupt_requested() {
        return true;
    }

    let config = ctx.part(SolverConfigP);
    if let Some(max_confl) = config.max_confl {
        if ctx.part(ScheduleP).conflicts >= max_confl {
            return true;
        }
    }
    if let (Some(max_time), Some(started)) = (config.max_time, state.solve_started) {
        if started.elapsed() >= max_time {
            return true;
        }
    }

    false
}

/// Perform one step of the schedule.
///
/// Returns `false` when solving is done or a budget ran out; the solver state tells which.
pub fn schedule_step(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BlockedStoreP,
        mut ClauseActivityP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut EquivP,
        mut ImplGraphP,
        mut IncrementalP,
        mut MatricesP,
        mut OccurP,
        mut ProofP,
        mut ScheduleP,
        mut SolverStateP,
        mut StatsP,
        mut SyncP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        mut XorStoreP,
        SolverConfigP,
    ),
) -> bool {
    if ctx.part(SolverStateP).sat_state != SatState::Unknown {
        return false;
    }
    if budgets_exhausted(ctx.borrow()) {
        return false;
    }

    let (schedule, mut ctx) = ctx.split_part_mut(ScheduleP);

    if schedule.conflicts > 0 && schedule.conflicts % 5000 == 0 {
        let db = ctx.part(ClauseDbP);
        let units = ctx.part(TrailP).top_level_assignment_count();
        info!(
            "confl: {}k rest: {} vars: {} bin: {} irred: {} core: {} mid: {} local: {} gauss: {}",
            schedule.conflicts / 1000,
            schedule.restarts,
            ctx.part(AssignmentP).assignment().len() - units,
            ctx.part(WatchlistsP).binary_count(),
            db.count_by_tier(Tier::Irred),
            db.count_by_tier(Tier::Core),
            db.count_by_tier(Tier::Mid),
            db.count_by_tier(Tier::Local),
            ctx.part(MatricesP).matrix_count(),
        );
    }

    if schedule.next_restart == schedule.conflicts {
        restart(ctx.borrow());
        schedule.restarts += 1;
        ctx.part_mut(StatsP).restarts += 1;
        let scale = ctx.part(SolverConfigP).luby_restart_interval_scale;
        schedule.next_restart += scale * schedule.luby.advance();
    }

    if schedule.conflicts >= schedule.next_simplify
        && ctx.part(SolverConfigP).perform_occur_based_simp
    {
        schedule.next_simplify = schedule.conflicts + ctx.part(SolverConfigP).occur_simp_interval;
        if !between_searches_housekeeping(ctx.borrow()) {
            return false;
        }
    }

    if schedule.conflicts >= schedule.next_reduce_locals {
        schedule.next_reduce_locals =
            schedule.conflicts + ctx.part(SolverConfigP).reduce_locals_interval;
        if schedule.conflicts > 0 {
            reduce_locals(ctx.borrow());
        }
    }
    if schedule.conflicts >= schedule.next_reduce_mids {
        schedule.next_reduce_mids =
            schedule.conflicts + ctx.part(SolverConfigP).reduce_mids_interval;
        if schedule.conflicts > 0 {
            reduce_mids(ctx.borrow());
        }
    }

    collect_garbage(ctx.borrow());

    conflict_step(ctx.borrow());
    schedule.conflicts += 1;

    true
}

/// Run the occurrence simplifier and rebuild the Gauss matrices.
///
/// Returns `false` when the formula became unsatisfiable.
pub fn between_searches_housekeeping(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BlockedStoreP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut EquivP,
        mut ImplGraphP,
        mut IncrementalP,
        mut MatricesP,
        mut OccurP,
        mut ProofP,
        mut SolverStateP,
        mut StatsP,
        mut SyncP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        mut XorStoreP,
        SolverConfigP,
    ),
) -> bool {
    full_restart(ctx.borrow());

    // The simplifier and the broker need the reattached clause set.
    let reattach_ok = detach::fully_undo_xor_detach(ctx.borrow()).is_ok()
        && crate::prop::propagate(ctx.borrow()).is_ok()
        && sync_data(ctx.borrow()).is_ok()
        && crate::prop::propagate(ctx.borrow()).is_ok();
    if !reattach_ok {
        ctx.part_mut(ProofP).add_clause(&[]);
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        return false;
    }

    if run_simplifier(ctx.borrow()).is_err() {
        return false;
    }

    // Matrices that did not pay for their upkeep are not rebuilt.
    if ctx.part(SolverConfigP).autodisable && !ctx.part(MatricesP).suppressed {
        let matrices = ctx.part_mut(MatricesP);
        let calls: u64 = matrices.matrices.iter().map(|m| m.calls).sum();
        let useful: u64 = matrices.matrices.iter().map(|m| m.useful).sum();
        if calls > 1000 && useful < 10 {
            matrices.suppressed = true;
            for matrix in matrices.matrices.iter_mut() {
                matrix.disabled = true;
            }
            let count = matrices.matrices.len() as u64;
            ctx.part_mut(StatsP).gauss_matrices_disabled += count;
            log::debug!("gauss matrices disabled after {} row inspections", calls);
        }
    }

    match gauss::init_matrices(ctx.borrow()) {
        Err(()) => {
            ctx.part_mut(ProofP).add_clause(&[]);
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            false
        }
        Ok(_created) => {
            detach::detach_xor_clauses(ctx.borrow());
            true
        }
    }
}
