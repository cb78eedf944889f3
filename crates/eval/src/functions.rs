//! The callable surface of the language.
//!
//! Three kinds of functions share one namespace: language builtins,
//! host functions that bridge into game state, and candidate moves
//! registered at startup. The [`FunctionTable`] maps names to entries;
//! compilation resolves every call site against it once, so evaluation
//! never does a name lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::Context;
use crate::error::EvalError;
use crate::formula::FormulaRef;
use crate::host::{Action, HostHandle, Location, UnitView};
use crate::value::Value;

/// Host functions are plain function pointers; they see the evaluated
/// arguments and the call-site context.
pub type HostFn = fn(&[Value], &Context<'_>) -> Result<Value, EvalError>;

/// A candidate move exposed as a callable: calling it binds the declared
/// parameter names and evaluates the move's action formula.
#[derive(Debug)]
pub(crate) struct MoveFn {
    pub(crate) params: Vec<String>,
    pub(crate) body: FormulaRef,
}

/// Built-in functions evaluated directly by the interpreter. `if` is the
/// only lazy one; the rest see evaluated arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    If,
    Abs,
    Min,
    Max,
    Sum,
    Size,
    Head,
}

impl Builtin {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Builtin::If => "if",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Sum => "sum",
            Builtin::Size => "size",
            Builtin::Head => "head",
        }
    }

    /// (min, max) argument counts; `None` means unbounded.
    fn arity(self) -> (usize, Option<usize>) {
        match self {
            Builtin::If => (3, Some(3)),
            Builtin::Abs => (1, Some(1)),
            Builtin::Min | Builtin::Max => (1, None),
            Builtin::Sum => (1, Some(1)),
            Builtin::Size => (1, Some(1)),
            Builtin::Head => (1, Some(1)),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Entry {
    Builtin(Builtin),
    Host {
        f: HostFn,
        min: usize,
        max: Option<usize>,
    },
    Move(Arc<MoveFn>),
}

impl Entry {
    pub(crate) fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Entry::Builtin(b) => b.arity(),
            Entry::Host { min, max, .. } => (*min, *max),
            Entry::Move(m) => (m.params.len(), Some(m.params.len())),
        }
    }
}

// ──────────────────────────────────────────────
// Function table
// ──────────────────────────────────────────────

#[derive(Debug)]
pub struct FunctionTable {
    entries: BTreeMap<String, Entry>,
}

impl FunctionTable {
    /// The standard table: all builtins plus the game-facing host set.
    pub fn standard() -> FunctionTable {
        let mut table = FunctionTable {
            entries: BTreeMap::new(),
        };
        for b in [
            Builtin::If,
            Builtin::Abs,
            Builtin::Min,
            Builtin::Max,
            Builtin::Sum,
            Builtin::Size,
            Builtin::Head,
        ] {
            table.entries.insert(b.name().to_string(), Entry::Builtin(b));
        }
        table.host("loc", host_loc, 2, Some(2));
        table.host("move_to", host_move_to, 2, Some(2));
        table.host("attack", host_attack, 2, Some(2));
        table.host("recruit", host_recruit, 1, Some(2));
        table.host("distance_between", host_distance_between, 2, Some(2));
        table.host("distance_to_enemy", host_distance_to_enemy, 1, Some(1));
        table.host("unit_at", host_unit_at, 1, Some(1));
        table.host("reachable", host_reachable, 1, Some(1));
        table
    }

    fn host(&mut self, name: &str, f: HostFn, min: usize, max: Option<usize>) {
        self.entries
            .insert(name.to_string(), Entry::Host { f, min, max });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    /// Expose a registered move as a callable. The caller is responsible
    /// for rejecting duplicate names first.
    pub(crate) fn register_move(&mut self, name: &str, f: MoveFn) {
        self.entries
            .insert(name.to_string(), Entry::Move(Arc::new(f)));
    }
}

// ──────────────────────────────────────────────
// Host functions
// ──────────────────────────────────────────────

fn unit_of(v: &Value) -> Result<&UnitView, EvalError> {
    match v {
        Value::Callable(HostHandle::Unit(u)) => Ok(u),
        other => Err(EvalError::Type {
            message: format!("expected a unit, got {}", other.type_name()),
        }),
    }
}

/// Accepts either a location handle or a unit (taken at its position).
fn loc_of(v: &Value) -> Result<Location, EvalError> {
    match v {
        Value::Callable(HostHandle::Location(l)) => Ok(*l),
        Value::Callable(HostHandle::Unit(u)) => Ok(u.loc),
        other => Err(EvalError::Type {
            message: format!("expected a unit or location, got {}", other.type_name()),
        }),
    }
}

fn host_loc(args: &[Value], _ctx: &Context<'_>) -> Result<Value, EvalError> {
    let x = args[0].as_int()?;
    let y = args[1].as_int()?;
    Ok(Value::Callable(HostHandle::Location(Location::new(x, y))))
}

fn host_move_to(args: &[Value], _ctx: &Context<'_>) -> Result<Value, EvalError> {
    let unit = unit_of(&args[0])?;
    let to = match &args[1] {
        Value::Callable(HostHandle::Location(l)) => *l,
        other => {
            return Err(EvalError::Type {
                message: format!("move_to: expected a location, got {}", other.type_name()),
            })
        }
    };
    Ok(Value::Callable(HostHandle::Action(Action::Move {
        unit: unit.id,
        to,
    })))
}

fn host_attack(args: &[Value], _ctx: &Context<'_>) -> Result<Value, EvalError> {
    let unit = unit_of(&args[0])?;
    let target = unit_of(&args[1])?;
    Ok(Value::Callable(HostHandle::Action(Action::Attack {
        unit: unit.id,
        target: target.id,
    })))
}

fn host_recruit(args: &[Value], ctx: &Context<'_>) -> Result<Value, EvalError> {
    let unit_type = args[0].as_str()?.to_string();
    let at = match args.get(1) {
        Some(v) => Some(loc_of(v)?),
        None => None,
    };
    let side = match ctx.get("my_side") {
        Some(v) => match v.as_handle()? {
            HostHandle::Side(s) => s.id,
            other => {
                return Err(EvalError::Type {
                    message: format!("my_side is bound to a {}, not a side", other.kind()),
                })
            }
        },
        None => {
            return Err(EvalError::UnknownIdent {
                name: "my_side".to_string(),
            })
        }
    };
    Ok(Value::Callable(HostHandle::Action(Action::Recruit {
        side,
        unit_type,
        at,
    })))
}

fn host_distance_between(args: &[Value], _ctx: &Context<'_>) -> Result<Value, EvalError> {
    let a = loc_of(&args[0])?;
    let b = loc_of(&args[1])?;
    Ok(Value::Int(a.distance(b)))
}

/// Distance from a unit to the nearest enemy, or null when no enemy is
/// left on the board.
fn host_distance_to_enemy(args: &[Value], ctx: &Context<'_>) -> Result<Value, EvalError> {
    let from = loc_of(&args[0])?;
    let enemies = match ctx.get("enemy_units") {
        Some(v) => v.as_list()?,
        None => {
            return Err(EvalError::UnknownIdent {
                name: "enemy_units".to_string(),
            })
        }
    };
    let mut best: Option<i64> = None;
    for enemy in enemies {
        let d = from.distance(loc_of(enemy)?);
        best = Some(match best {
            Some(b) if b <= d => b,
            _ => d,
        });
    }
    Ok(match best {
        Some(d) => Value::Int(d),
        None => Value::Null,
    })
}

fn host_unit_at(args: &[Value], ctx: &Context<'_>) -> Result<Value, EvalError> {
    let at = loc_of(&args[0])?;
    let units = match ctx.get("units") {
        Some(v) => v.as_list()?,
        None => {
            return Err(EvalError::UnknownIdent {
                name: "units".to_string(),
            })
        }
    };
    for u in units {
        if let Value::Callable(HostHandle::Unit(view)) = u {
            if view.loc == at {
                return Ok(u.clone());
            }
        }
    }
    Ok(Value::Null)
}

/// Tiles the given unit can still reach this turn, read from the cached
/// move map bound as `my_moves`. Units with no entry get an empty list.
fn host_reachable(args: &[Value], ctx: &Context<'_>) -> Result<Value, EvalError> {
    let unit = unit_of(&args[0])?;
    let moves = match ctx.get("my_moves") {
        Some(v) => v,
        None => {
            return Err(EvalError::UnknownIdent {
                name: "my_moves".to_string(),
            })
        }
    };
    let map = match moves {
        Value::Map(m) => m,
        other => {
            return Err(EvalError::Conversion {
                expected: "Map",
                got: other.type_name(),
            })
        }
    };
    Ok(match map.get(&unit.id.to_string()) {
        Some(tiles) => tiles.clone(),
        None => Value::List(Vec::new()),
    })
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SideView;

    fn unit(id: i64, side: i64, x: i64, y: i64) -> Value {
        Value::Callable(HostHandle::Unit(UnitView {
            id,
            name: format!("u{}", id),
            side,
            loc: Location::new(x, y),
            hitpoints: 30,
            max_hitpoints: 30,
            movement_left: 5,
            max_movement: 5,
            level: 1,
        }))
    }

    #[test]
    fn standard_table_has_the_full_surface() {
        let t = FunctionTable::standard();
        for name in [
            "if", "abs", "min", "max", "sum", "size", "head", "loc", "move_to", "attack",
            "recruit", "distance_between", "distance_to_enemy", "unit_at", "reachable",
        ] {
            assert!(t.contains(name), "missing {}", name);
        }
        assert!(!t.contains("grab_villages"));
    }

    #[test]
    fn loc_builds_a_location_handle() {
        let ctx = Context::root();
        let v = host_loc(&[Value::Int(3), Value::Int(4)], &ctx).unwrap();
        assert_eq!(
            v,
            Value::Callable(HostHandle::Location(Location::new(3, 4)))
        );
    }

    #[test]
    fn move_to_requires_a_location() {
        let ctx = Context::root();
        let err = host_move_to(&[unit(1, 1, 0, 0), Value::Int(7)], &ctx).unwrap_err();
        assert!(err.to_string().contains("expected a location"));
    }

    #[test]
    fn distance_between_accepts_units_and_locations() {
        let ctx = Context::root();
        let v = host_distance_between(
            &[
                unit(1, 1, 0, 0),
                Value::Callable(HostHandle::Location(Location::new(4, 2))),
            ],
            &ctx,
        )
        .unwrap();
        assert_eq!(v, Value::Int(4));
    }

    #[test]
    fn distance_to_enemy_is_null_without_enemies() {
        let mut ctx = Context::root();
        ctx.set("enemy_units", Value::List(vec![]));
        let v = host_distance_to_enemy(&[unit(1, 1, 0, 0)], &ctx).unwrap();
        assert_eq!(v, Value::Null);
    }

    #[test]
    fn distance_to_enemy_takes_the_minimum() {
        let mut ctx = Context::root();
        ctx.set(
            "enemy_units",
            Value::List(vec![unit(2, 2, 9, 0), unit(3, 2, 3, 3)]),
        );
        let v = host_distance_to_enemy(&[unit(1, 1, 0, 0)], &ctx).unwrap();
        assert_eq!(v, Value::Int(3));
    }

    #[test]
    fn recruit_reads_the_side_from_context() {
        let mut ctx = Context::root();
        ctx.set(
            "my_side",
            Value::Callable(HostHandle::Side(SideView { id: 2, gold: 100 })),
        );
        let v = host_recruit(&[Value::Str("grunt".to_string())], &ctx).unwrap();
        match v {
            Value::Callable(HostHandle::Action(Action::Recruit {
                side,
                unit_type,
                at,
            })) => {
                assert_eq!(side, 2);
                assert_eq!(unit_type, "grunt");
                assert_eq!(at, None);
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn recruit_without_side_binding_fails() {
        let ctx = Context::root();
        let err = host_recruit(&[Value::Str("grunt".to_string())], &ctx).unwrap_err();
        assert_eq!(err.to_string(), "no binding named 'my_side' in scope");
    }

    #[test]
    fn unit_at_finds_by_position() {
        let mut ctx = Context::root();
        ctx.set("units", Value::List(vec![unit(1, 1, 2, 2), unit(2, 2, 5, 5)]));
        let at = |x, y| Value::Callable(HostHandle::Location(Location::new(x, y)));
        let hit = host_unit_at(&[at(5, 5)], &ctx).unwrap();
        assert_eq!(hit, unit(2, 2, 5, 5));
        let miss = host_unit_at(&[at(0, 0)], &ctx).unwrap();
        assert_eq!(miss, Value::Null);
    }

    #[test]
    fn reachable_defaults_to_empty_for_unmapped_units() {
        let mut ctx = Context::root();
        ctx.set("my_moves", Value::Map(BTreeMap::new()));
        let v = host_reachable(&[unit(1, 1, 0, 0)], &ctx).unwrap();
        assert_eq!(v, Value::List(vec![]));
    }
}
