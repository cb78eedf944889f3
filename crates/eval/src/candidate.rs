//! Candidate move scoring and selection.
//!
//! Every selection pass walks the registered moves in order, scores each
//! against every eligible unit, and keeps the single best candidate.
//! Only a strictly greater score replaces the current best, so ties go
//! to the earliest move registered and, within a move, the first unit
//! seen. That rule is load-bearing: formula authors order their move
//! lists by priority and rely on replays staying stable.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::Context;
use crate::formula::FormulaRef;
use crate::host::{HostHandle, UnitId, UnitView};
use crate::value::Value;

/// Scores equal to this exclude the unit outright. Declared moves use it
/// to say "never pick me for this unit" without a precondition.
pub const SENTINEL_SCORE: i64 = i64::MIN;

/// A compiled candidate move.
#[derive(Debug)]
pub struct CandidateMove {
    pub name: String,
    pub score: FormulaRef,
    pub action: FormulaRef,
    pub precondition: Option<FormulaRef>,
    pub args: Vec<String>,
}

/// The winner of one selection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub move_name: String,
    pub unit: UnitId,
    pub score: i64,
}

/// Score one move across the given units and return its best candidate.
///
/// A failing or false precondition skips the whole move. A score that
/// fails to evaluate, is not numeric, or equals [`SENTINEL_SCORE`]
/// excludes that unit only; scoring continues with the rest.
pub fn evaluate_move(
    mv: &CandidateMove,
    ctx: &Context<'_>,
    units: &[UnitView],
) -> Option<Choice> {
    if let Some(pre) = &mv.precondition {
        match pre.eval(ctx) {
            Ok(v) if v.is_true() => {}
            Ok(_) => {
                debug!(move_name = %mv.name, "precondition false, move skipped");
                return None;
            }
            Err(err) => {
                warn!(move_name = %mv.name, %err, "precondition failed, move skipped");
                return None;
            }
        }
    }
    let mut best: Option<Choice> = None;
    for unit in units {
        let frame = ctx.overlay("me", Value::Callable(HostHandle::Unit(unit.clone())));
        let score = match mv.score.eval(&frame).and_then(|v| v.as_int()) {
            Ok(s) => s,
            Err(err) => {
                debug!(move_name = %mv.name, unit = unit.id, %err, "unit excluded");
                continue;
            }
        };
        if score == SENTINEL_SCORE {
            debug!(move_name = %mv.name, unit = unit.id, "sentinel score, unit excluded");
            continue;
        }
        debug!(move_name = %mv.name, unit = unit.id, score, "candidate scored");
        let replaces = match &best {
            Some(b) => score > b.score,
            None => true,
        };
        if replaces {
            best = Some(Choice {
                move_name: mv.name.clone(),
                unit: unit.id,
                score,
            });
        }
    }
    best
}

/// Pick the best candidate across all moves.
pub fn select(
    moves: &[Arc<CandidateMove>],
    ctx: &Context<'_>,
    units: &[UnitView],
) -> Option<Choice> {
    let mut best: Option<Choice> = None;
    for mv in moves {
        if let Some(choice) = evaluate_move(mv, ctx, units) {
            let replaces = match &best {
                Some(b) => choice.score > b.score,
                None => true,
            };
            if replaces {
                best = Some(choice);
            }
        }
    }
    best
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
