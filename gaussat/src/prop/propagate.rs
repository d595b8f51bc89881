//! Propagation of binary and long clauses.
use partial_ref::{partial, PartialRef};

use gaussat_formula::Lit;

use crate::context::{parts::*, Context};

use super::enqueue_assignment;
use super::{Conflict, Reason, Watch};

/// Propagate all enqueued assignments.
///
/// Propagates all assignments on the trail that are not yet propagated, adding resulting
/// assignments to the trail.
///
/// On conflict the propagating clause is returned. Any assignments enqueued before the conflict
/// was detected remain on the trail.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
    ),
) -> Result<(), Conflict> {
    while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
        propagate_lit(ctx.borrow(), lit)?;
    }
    Ok(())
}

/// Propagate all consequences of a single newly true literal.
///
/// See [`watch`](super::watch) for the invariants this has to uphold.
fn propagate_lit(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut StatsP,
        mut TrailP,
        mut WatchlistsP,
    ),
    lit: Lit,
) -> Result<(), Conflict> {
    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);

    // The watchlist of the triggering literal is detached while it is processed. Watches that
    // move to other literals are pushed into those literals' lists, everything else is compacted
    // in place and reattached.
    let mut watches = std::mem::take(watchlists.watched_by_mut(lit));

    let false_lit = !lit;

    let mut read = 0;
    let mut write = 0;

    let result = loop {
        if read == watches.len() {
            break Ok(());
        }
        let watch = watches[read];
        read += 1;

        match watch {
            Watch::Binary { implied } => {
                watches[write] = watch;
                write += 1;

                let assignment = ctx.part(AssignmentP);
                if assignment.lit_is_false(implied) {
                    break Err(Conflict::Binary([implied, false_lit]));
                } else if !assignment.lit_is_true(implied) {
                    ctx.part_mut(StatsP).propagations += 1;
                    enqueue_assignment(ctx.borrow(), implied, Reason::Binary([false_lit]));
                }
            }
            Watch::Long { cref, blocking } => {
                // If the blocking literal (which is part of the watched clause) is already true,
                // the watched clause is satisfied and we don't even have to look at it.
                if ctx.part(AssignmentP).lit_is_true(blocking) {
                    watches[write] = watch;
                    write += 1;
                    continue;
                }

                let lits = alloc.clause_mut(cref).lits_mut();

                // First we ensure that the literal we're currently propagating is at index 1. This
                // prepares the literal order for further propagations, as the propagating literal
                // has to be at index 0.
                if lits[0] == false_lit {
                    lits.swap(0, 1);
                }
                let first = lits[0];

                // The new watch has the other watched literal as blocking literal. It will either
                // replace the currently processed watch or move to another literal's list.
                let new_watch = Watch::Long {
                    cref,
                    blocking: first,
                };

                // If the other watched literal (now the first) isn't the blocking literal, check
                // whether that one is true. If so nothing else needs to be done.
                if first != blocking && ctx.part(AssignmentP).lit_is_true(first) {
                    watches[write] = new_watch;
                    write += 1;
                    continue;
                }

                // Try to find a non-false unwatched literal to replace our current literal as the
                // watched literal.
                let mut moved = false;
                for pos in 2..lits.len() {
                    let rest_lit = lits[pos];
                    if !ctx.part(AssignmentP).lit_is_false(rest_lit) {
                        lits[1] = rest_lit;
                        lits[pos] = false_lit;

                        debug_assert_ne!(!rest_lit, lit);
                        watchlists.add_watch(!rest_lit, new_watch);
                        moved = true;
                        break;
                    }
                }
                if moved {
                    continue;
                }

                // We didn't find a non-false unwatched literal, so either we're propagating or we
                // have a conflict.
                watches[write] = new_watch;
                write += 1;

                if ctx.part(AssignmentP).lit_is_false(first) {
                    break Err(Conflict::Long(cref));
                }

                ctx.part_mut(StatsP).propagations += 1;
                enqueue_assignment(ctx.borrow(), first, Reason::Long(cref));
            }
        }
    };

    // On conflict the unprocessed watches are kept as they are.
    while read < watches.len() {
        watches[write] = watches[read];
        write += 1;
        read += 1;
    }
    watches.truncate(write);

    let list = watchlists.watched_by_mut(lit);
    debug_assert!(list.is_empty());
    *list = watches;

    result
}
