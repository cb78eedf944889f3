//! The per-side turn controller.
//!
//! A turn runs RECRUIT, then alternating SELECT and EXECUTE until no
//! candidate scores, with every phase drawing its bindings from a fresh
//! base context. A scripted move formula, when configured, is consulted
//! ahead of each candidate scan and drives the turn for as long as it
//! yields actions. Executed actions invalidate the move cache, so the
//! next selection pass sees the board as it now is. A configurable step
//! limit bounds the whole turn; a move set that keeps producing rejected
//! or empty actions ends in [`TurnOutcome::StepLimit`] instead of
//! spinning.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::MoveCache;
use crate::candidate::{self, SENTINEL_SCORE};
use crate::content::AiConfig;
use crate::context::Context;
use crate::error::{ConsoleError, RegistryError};
use crate::formula::FormulaRef;
use crate::host::{Action, HostHandle, SideId, UnitId, UnitView};
use crate::registry::Registry;
use crate::value::Value;
use crate::world::{MoveMap, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TurnOutcome {
    /// No candidate scored; the side is done.
    Completed,
    /// The step limit cut the turn short.
    StepLimit,
}

/// One entry in the turn transcript.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub phase: String,
    pub move_name: Option<String>,
    pub unit: Option<UnitId>,
    pub score: Option<i64>,
    pub result: String,
}

#[derive(Debug, Serialize)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    pub steps: Vec<StepRecord>,
    pub actions_executed: usize,
}

#[derive(Debug)]
pub struct TurnController {
    side: SideId,
    registry: Registry,
    cache: MoveCache,
    recruit: Option<FormulaRef>,
    scripted: Option<FormulaRef>,
    vars: BTreeMap<String, Value>,
    max_steps: usize,
}

impl TurnController {
    /// Compile a controller from an AI block: register the moves, then
    /// compile the recruit and move formulas against the finished table
    /// so they can call them, and convert the configuration vars.
    pub fn new(config: &AiConfig) -> Result<TurnController, RegistryError> {
        let registry = Registry::from_decls(&config.moves)?;
        let recruit = match &config.recruit {
            Some(src) => Some(Arc::new(
                registry
                    .compile(src)
                    .map_err(|source| RegistryError::RecruitParse { source })?,
            )),
            None => None,
        };
        let scripted = match &config.move_formula {
            Some(src) => Some(Arc::new(
                registry
                    .compile(src)
                    .map_err(|source| RegistryError::MoveParse { source })?,
            )),
            None => None,
        };
        let mut vars = BTreeMap::new();
        for (name, json) in &config.vars {
            let value = Value::from_json(json).map_err(|source| RegistryError::Var {
                name: name.clone(),
                source,
            })?;
            vars.insert(name.clone(), value);
        }
        Ok(TurnController {
            side: config.side,
            registry,
            cache: MoveCache::new(),
            recruit,
            scripted,
            vars,
            max_steps: config.max_steps,
        })
    }

    pub fn side(&self) -> SideId {
        self.side
    }

    /// Drop cached move maps at a turn boundary. The host advances its
    /// own turn state separately.
    pub fn new_turn(&mut self) {
        self.cache.invalidate();
        debug!(side = self.side, "move maps dropped for the new turn");
    }

    /// Play out one full turn against the world.
    pub fn play_turn<W: World + ?Sized>(&mut self, world: &mut W) -> TurnReport {
        info!(side = self.side, turn = world.turn(), "turn started");
        self.cache.invalidate();
        let mut steps = Vec::new();
        let mut executed = 0usize;
        let mut outcome = self.run_recruit_phase(world, &mut steps, &mut executed);
        if outcome == TurnOutcome::Completed {
            outcome = self.run_select_phase(world, &mut steps, &mut executed);
        }
        info!(
            side = self.side,
            ?outcome,
            steps = steps.len(),
            actions = executed,
            "turn finished"
        );
        TurnReport {
            outcome,
            steps,
            actions_executed: executed,
        }
    }

    /// Evaluate arbitrary source against the current base context. This
    /// is the diagnostic console: the same compile table and the same
    /// bindings declared moves see, read-only with respect to the world.
    pub fn evaluate_formula<W: World + ?Sized>(
        &mut self,
        world: &W,
        src: &str,
    ) -> Result<Value, ConsoleError> {
        let formula = self.registry.compile(src)?;
        let ctx = self.base_context(world);
        Ok(formula.eval(&ctx)?)
    }

    // ──────────────────────────────────────────────
    // Phases
    // ──────────────────────────────────────────────

    fn run_recruit_phase<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        steps: &mut Vec<StepRecord>,
        executed: &mut usize,
    ) -> TurnOutcome {
        let Some(recruit) = self.recruit.clone() else {
            return TurnOutcome::Completed;
        };
        loop {
            if steps.len() >= self.max_steps {
                warn!(side = self.side, "step limit reached during recruitment");
                return TurnOutcome::StepLimit;
            }
            let ctx = self.base_context(&*world);
            let mut record = StepRecord {
                phase: "recruit".to_string(),
                move_name: None,
                unit: None,
                score: None,
                result: String::new(),
            };
            let actions = match recruit.eval(&ctx) {
                Ok(v) => action_list(v),
                Err(err) => {
                    warn!(side = self.side, %err, "recruit formula failed");
                    record.result = format!("error: {}", err);
                    steps.push(record);
                    return TurnOutcome::Completed;
                }
            };
            if actions.is_empty() {
                record.result = "no recruit requested".to_string();
                steps.push(record);
                return TurnOutcome::Completed;
            }
            let (result, rejected) = self.run_actions(world, &actions, executed);
            record.result = result;
            steps.push(record);
            if rejected {
                return TurnOutcome::Completed;
            }
        }
    }

    fn run_select_phase<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        steps: &mut Vec<StepRecord>,
        executed: &mut usize,
    ) -> TurnOutcome {
        let scripted = self.scripted.clone();
        loop {
            if steps.len() >= self.max_steps {
                warn!(side = self.side, "step limit reached");
                return TurnOutcome::StepLimit;
            }
            let ctx = self.base_context(&*world);
            // the scripted move formula gets first claim; an empty result
            // or an error defers to the candidate scan
            if let Some(formula) = &scripted {
                match formula.eval(&ctx) {
                    Ok(v) => {
                        let actions = action_list(v);
                        if !actions.is_empty() {
                            let (result, _) = self.run_actions(world, &actions, executed);
                            steps.push(StepRecord {
                                phase: "execute".to_string(),
                                move_name: None,
                                unit: None,
                                score: None,
                                result,
                            });
                            continue;
                        }
                    }
                    Err(err) => {
                        warn!(side = self.side, %err, "move formula failed");
                        steps.push(StepRecord {
                            phase: "execute".to_string(),
                            move_name: None,
                            unit: None,
                            score: None,
                            result: format!("error: {}", err),
                        });
                    }
                }
            }
            let my_units: Vec<UnitView> = world
                .units()
                .into_iter()
                .filter(|u| u.side == self.side)
                .collect();
            let Some(choice) =
                candidate::select(self.registry.candidate_moves(), &ctx, &my_units)
            else {
                debug!(side = self.side, "no candidate scored, turn complete");
                return TurnOutcome::Completed;
            };
            let Some(mv) = self
                .registry
                .candidate_moves()
                .iter()
                .find(|m| m.name == choice.move_name)
                .map(Arc::clone)
            else {
                return TurnOutcome::Completed;
            };
            let mut record = StepRecord {
                phase: "execute".to_string(),
                move_name: Some(choice.move_name.clone()),
                unit: Some(choice.unit),
                score: Some(choice.score),
                result: String::new(),
            };
            let Some(unit) = world.unit(choice.unit) else {
                record.result = format!("unit {} left the board", choice.unit);
                steps.push(record);
                continue;
            };
            let frame = ctx.overlay("me", Value::Callable(HostHandle::Unit(unit)));
            let actions = match mv.action.eval(&frame) {
                Ok(v) => action_list(v),
                Err(err) => {
                    warn!(move_name = %choice.move_name, %err, "action formula failed");
                    record.result = format!("error: {}", err);
                    steps.push(record);
                    continue;
                }
            };
            if actions.is_empty() {
                record.result = "no action produced".to_string();
                steps.push(record);
                continue;
            }
            let (result, _) = self.run_actions(world, &actions, executed);
            record.result = result;
            steps.push(record);
        }
    }

    /// Execute a batch of actions in order, invalidating the move cache
    /// after each success. A rejection stops the batch. The returned
    /// result line carries one outcome per attempted action.
    fn run_actions<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        actions: &[Action],
        executed: &mut usize,
    ) -> (String, bool) {
        let mut outcomes = Vec::with_capacity(actions.len());
        let mut rejected = false;
        for action in actions {
            match world.execute(action) {
                Ok(()) => {
                    *executed += 1;
                    self.cache.invalidate();
                    outcomes.push(format!("ok: {}", action));
                    debug!(side = self.side, %action, "action executed");
                }
                Err(err) => {
                    warn!(side = self.side, %action, %err, "action rejected");
                    outcomes.push(format!("rejected: {}", err));
                    rejected = true;
                    break;
                }
            }
        }
        (outcomes.join("; "), rejected)
    }

    // ──────────────────────────────────────────────
    // Context assembly
    // ──────────────────────────────────────────────

    /// Build the base context for this instant: configuration vars first,
    /// then the computed bindings, which therefore cannot be shadowed by
    /// configuration.
    fn base_context<W: World + ?Sized>(&mut self, world: &W) -> Context<'static> {
        let mut vars = self.vars.clone();
        let units = world.units();
        let my: Vec<UnitView> = units
            .iter()
            .filter(|u| u.side == self.side)
            .cloned()
            .collect();
        let enemy: Vec<UnitView> = units
            .iter()
            .filter(|u| u.side != self.side)
            .cloned()
            .collect();
        vars.insert("fail".to_string(), Value::Int(SENTINEL_SCORE));
        vars.insert("turn".to_string(), Value::Int(world.turn()));
        if let Some(side) = world.side(self.side) {
            vars.insert("my_side".to_string(), Value::Callable(HostHandle::Side(side)));
        }
        vars.insert("units".to_string(), unit_list(&units));
        vars.insert("my_units".to_string(), unit_list(&my));
        vars.insert("enemy_units".to_string(), unit_list(&enemy));
        vars.insert(
            "keeps".to_string(),
            self.cache.keeps(world, self.side).clone(),
        );
        vars.insert(
            "attacks".to_string(),
            self.cache.attacks(world, self.side).clone(),
        );
        vars.insert(
            "my_moves".to_string(),
            moves_by_unit(&my, &self.cache.own_moves(world, self.side).by_source),
        );
        vars.insert(
            "my_full_moves".to_string(),
            moves_by_unit(&my, &self.cache.own_full_moves(world, self.side).by_source),
        );
        vars.insert(
            "enemy_moves".to_string(),
            moves_by_unit(&enemy, &self.cache.enemy_moves(world, self.side).by_source),
        );
        Context::from_map(vars)
    }
}

fn unit_list(units: &[UnitView]) -> Value {
    Value::List(
        units
            .iter()
            .map(|u| Value::Callable(HostHandle::Unit(u.clone())))
            .collect(),
    )
}

/// Move maps keyed by source tile, re-keyed by unit id for formulas.
fn moves_by_unit(units: &[UnitView], by_source: &MoveMap) -> Value {
    let mut map = BTreeMap::new();
    for u in units {
        let tiles: Vec<Value> = by_source
            .get(&u.loc)
            .map(|set| {
                set.iter()
                    .map(|l| Value::Callable(HostHandle::Location(*l)))
                    .collect()
            })
            .unwrap_or_default();
        map.insert(u.id.to_string(), Value::List(tiles));
    }
    Value::Map(map)
}

/// The actions a formula result carries: a single action handle, or every
/// action handle in a list. Anything else means "nothing to do".
fn action_list(v: Value) -> Vec<Action> {
    match v {
        Value::Callable(HostHandle::Action(a)) => vec![a],
        Value::List(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Callable(HostHandle::Action(a)) => Some(a),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
