//! Sharing learned facts between independent solvers.
//!
//! Multiple solvers working on the same formula communicate through a [`SharedData`] broker: a
//! vector of top-level units keyed by variable and, for each literal, a vector of binary-clause
//! partners any worker learned. Each worker keeps a cursor per broker list and periodically
//! merges the news, always at decision level 0. No solver invariants are held across the broker
//! calls; each mutex is taken for one short section.

use std::sync::{Arc, Mutex};

use partial_ref::{partial, PartialRef};

use gaussat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, Reason};
use crate::variables::Removed;

/// The broker shared by a group of solvers.
#[derive(Default)]
pub struct SharedData {
    /// Top-level units by variable index.
    units: Mutex<Vec<Option<bool>>>,
    /// Binary partners by literal code: `bins[a.code()]` holds all `b` with a published clause
    /// `(a v b)`.
    bins: Mutex<Vec<Vec<Lit>>>,
}

impl SharedData {
    /// Create a broker for a new solver group.
    pub fn new() -> Arc<SharedData> {
        Arc::new(SharedData::default())
    }
}

/// A solver's view of the broker.
#[derive(Default)]
pub struct DataSync {
    shared: Option<Arc<SharedData>>,
    /// Units already merged, by variable index.
    units_seen: usize,
    /// Binary partners already merged, by literal code.
    bin_cursors: Vec<usize>,
    /// Conflict count at the last synchronization.
    last_sync_conflicts: u64,
}

impl DataSync {
    /// Connect this solver to a broker.
    pub fn set_shared_data(&mut self, shared: Arc<SharedData>) {
        self.shared = Some(shared);
    }

    /// Whether this solver shares data at all.
    pub fn enabled(&self) -> bool {
        self.shared.is_some()
    }
}

/// Merge with the broker if the synchronization interval has passed.
///
/// May only be called at decision level 0. Returns `Err(())` when a foreign unit contradicts the
/// local assignment, which makes the formula unsatisfiable for all workers.
pub fn sync_data(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut ProofP,
        mut StatsP,
        mut SyncP,
        mut TrailP,
        mut WatchlistsP,
        SolverConfigP,
        VariablesP,
    ),
) -> Result<(), ()> {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let conflicts = ctx.part(StatsP).conflicts;
    let interval = ctx.part(SolverConfigP).sync_interval;
    {
        let sync = ctx.part_mut(SyncP);
        if sync.shared.is_none() || sync.last_sync_conflicts + interval > conflicts {
            return Ok(());
        }
        sync.last_sync_conflicts = conflicts;
    }

    sync_units(ctx.borrow())?;
    sync_binaries(ctx.borrow());

    Ok(())
}

/// Merge foreign units and publish our own.
fn sync_units(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut ProofP,
        mut StatsP,
        mut SyncP,
        mut TrailP,
    ),
) -> Result<(), ()> {
    let shared = match &ctx.part(SyncP).shared {
        Some(shared) => shared.clone(),
        None => return Ok(()),
    };
    let var_count = ctx.part(AssignmentP).assignment().len();

    let mut units = match shared.units.lock() {
        Ok(units) => units,
        Err(_) => return Ok(()),
    };
    if units.len() < var_count {
        units.resize(var_count, None);
    }

    let mut result = Ok(());

    for index in 0..var_count {
        let var = Var::from_index(index);
        let local = ctx.part(AssignmentP).var_value(var);

        match (units[index], local) {
            (Some(foreign), Some(local)) if foreign != local => {
                result = Err(());
                break;
            }
            (Some(foreign), None) => {
                let lit = var.lit(foreign);
                ctx.part_mut(ProofP).add_clause(&[lit]);
                enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
                ctx.part_mut(StatsP).sync_units_received += 1;
            }
            (None, Some(local)) => {
                units[index] = Some(local);
                ctx.part_mut(StatsP).sync_units_sent += 1;
            }
            _ => (),
        }
    }

    result
}

/// Merge foreign binary clauses past our cursors and publish our own.
fn sync_binaries(
    mut ctx: partial!(
        Context,
        mut ProofP,
        mut StatsP,
        mut SyncP,
        mut WatchlistsP,
        AssignmentP,
        VariablesP,
    ),
) {
    let shared = match &ctx.part(SyncP).shared {
        Some(shared) => shared.clone(),
        None => return,
    };
    let lit_count = ctx.part(AssignmentP).assignment().len() * 2;

    let mut bins = match shared.bins.lock() {
        Ok(bins) => bins,
        Err(_) => return,
    };
    if bins.len() < lit_count {
        bins.resize(lit_count, vec![]);
    }
    ctx.part_mut(SyncP).bin_cursors.resize(lit_count, 0);

    for code in 0..lit_count {
        let lit = Lit::from_code(code);

        // Read foreign binaries past the cursor.
        let cursor = ctx.part(SyncP).bin_cursors[code];
        for pos in cursor..bins[code].len() {
            let partner = bins[code][pos];
            let usable = |var: Var| {
                ctx.part(VariablesP).var_data(var).removed == Removed::None
                    && ctx.part(AssignmentP).var_is_unk(var)
            };
            if !usable(lit.var()) || !usable(partner.var()) {
                continue;
            }
            if ctx.part(WatchlistsP).has_binary([lit, partner]) {
                continue;
            }
            ctx.part_mut(ProofP).add_clause(&[lit, partner]);
            ctx.part_mut(WatchlistsP).add_binary([lit, partner]);
            ctx.part_mut(StatsP).sync_binaries_received += 1;
        }
        ctx.part_mut(SyncP).bin_cursors[code] = bins[code].len();

        // Publish our own binaries the broker doesn't know yet.
        let ours: Vec<Lit> = ctx
            .part(WatchlistsP)
            .watched_by(!lit)
            .iter()
            .filter_map(|watch| match watch {
                crate::prop::Watch::Binary { implied } if lit < *implied => Some(*implied),
                _ => None,
            })
            .collect();
        for partner in ours {
            if !bins[code].contains(&partner) {
                bins[code].push(partner);
                ctx.part_mut(StatsP).sync_binaries_sent += 1;
            }
        }
        ctx.part_mut(SyncP).bin_cursors[code] = bins[code].len();
    }
}
