//! Decision heuristics.
//!
//! Branching variables are picked by VSIDS. The polarity of the decision literal is governed by
//! the configured [`PolarityMode`](crate::config::PolarityMode).

use partial_ref::{partial, PartialRef};

use gaussat_formula::{Lit, Var};

use crate::config::PolarityMode;
use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, Reason};

pub mod vsids;

pub use vsids::Vsids;

/// Make a decision and enqueue it.
///
/// Returns `false` if no decision was made because all decidable variables are assigned.
pub fn make_decision(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut StatsP,
        mut TrailP,
        mut VsidsP,
        SolverConfigP,
        VariablesP,
    ),
) -> bool {
    let decision_var = loop {
        let candidate = ctx.part_mut(VsidsP).next();
        match candidate {
            None => return false,
            Some(var) => {
                if ctx.part(AssignmentP).var_is_unk(var)
                    && ctx.part(VariablesP).var_is_decidable(var)
                {
                    break var;
                }
            }
        }
    };

    let polarity = decision_polarity(ctx.borrow(), decision_var);
    let decision = Lit::from_var(decision_var, !polarity);

    ctx.part_mut(StatsP).decisions += 1;
    ctx.part_mut(TrailP).new_decision_level();

    enqueue_assignment(ctx.borrow(), decision, Reason::Unit);

    true
}

/// Choose the value a decision variable is set to.
fn decision_polarity(
    mut ctx: partial!(Context, mut VsidsP, AssignmentP, SolverConfigP, StatsP),
    var: Var,
) -> bool {
    match ctx.part(SolverConfigP).polarity_mode {
        PolarityMode::Pos => true,
        PolarityMode::Neg => false,
        PolarityMode::Saved => ctx.part(AssignmentP).last_var_value(var),
        PolarityMode::Random => ctx.part_mut(VsidsP).random_bool(),
        PolarityMode::Stable => {
            // Saved phase, inverted during short bursts so the search visits both sides of the
            // phase space over time.
            let saved = ctx.part(AssignmentP).last_var_value(var);
            let flip = ctx.part(StatsP).conflicts / 4096 % 8 == 7;
            saved ^ flip
        }
    }
}

/// Adds a variable to the decision heuristic's queue.
///
/// Called when a variable is unassigned during backtracking.
pub fn make_available(mut ctx: partial!(Context, mut VsidsP), var: Var) {
    ctx.part_mut(VsidsP).make_available(var);
}
