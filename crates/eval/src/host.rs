//! Read-only host object facades and the actions formulas can construct.
//!
//! The set of host object kinds a formula value can hold is closed: a
//! unit, a side, a map location, or a pending action. Each kind answers
//! `get` for a fixed member list, so there is no way to smuggle a live
//! game object into a value. Facades are snapshots taken when the context
//! is built; mutating the world never changes a value already handed out.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

pub type UnitId = i64;
pub type SideId = i64;

// ──────────────────────────────────────────────
// Map locations
// ──────────────────────────────────────────────

/// A tile coordinate. Distance is Chebyshev (8-neighbour grid), which is
/// what the bundled grid world uses for movement and adjacency.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Location {
    pub x: i64,
    pub y: i64,
}

impl Location {
    pub fn new(x: i64, y: i64) -> Self {
        Location { x, y }
    }

    pub fn distance(self, other: Location) -> i64 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub fn is_adjacent(self, other: Location) -> bool {
        self.distance(other) == 1
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ──────────────────────────────────────────────
// Unit and side facades
// ──────────────────────────────────────────────

/// Snapshot of one unit, as formulas see it via the `me` binding and the
/// unit lists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnitView {
    pub id: UnitId,
    pub name: String,
    pub side: SideId,
    pub loc: Location,
    pub hitpoints: i64,
    pub max_hitpoints: i64,
    pub movement_left: i64,
    pub max_movement: i64,
    pub level: i64,
}

/// Snapshot of one side, as formulas see it via `my_side`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SideView {
    pub id: SideId,
    pub gold: i64,
}

// ──────────────────────────────────────────────
// Actions
// ──────────────────────────────────────────────

/// An order a formula can construct. Evaluation never mutates the world;
/// actions describe mutations the turn controller later hands to the
/// executor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Action {
    Move {
        unit: UnitId,
        to: Location,
    },
    Attack {
        unit: UnitId,
        target: UnitId,
    },
    Recruit {
        side: SideId,
        unit_type: String,
        at: Option<Location>,
    },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Move { unit, to } => write!(f, "move unit {} to {}", unit, to),
            Action::Attack { unit, target } => {
                write!(f, "unit {} attacks unit {}", unit, target)
            }
            Action::Recruit {
                side,
                unit_type,
                at: Some(loc),
            } => write!(f, "side {} recruits '{}' at {}", side, unit_type, loc),
            Action::Recruit {
                side,
                unit_type,
                at: None,
            } => write!(f, "side {} recruits '{}'", side, unit_type),
        }
    }
}

// ──────────────────────────────────────────────
// The closed callable set
// ──────────────────────────────────────────────

/// The closed set of host objects a [`Value::Callable`] can reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum HostHandle {
    Unit(UnitView),
    Side(SideView),
    Location(Location),
    Action(Action),
}

impl HostHandle {
    pub fn kind(&self) -> &'static str {
        match self {
            HostHandle::Unit(_) => "unit",
            HostHandle::Side(_) => "side",
            HostHandle::Location(_) => "location",
            HostHandle::Action(_) => "action",
        }
    }

    /// Member lookup. `None` means the member does not exist; the
    /// evaluator turns that into a recoverable error.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self {
            HostHandle::Unit(u) => match name {
                "id" => Some(Value::Int(u.id)),
                "name" => Some(Value::Str(u.name.clone())),
                "side" => Some(Value::Int(u.side)),
                "loc" => Some(Value::Callable(HostHandle::Location(u.loc))),
                "x" => Some(Value::Int(u.loc.x)),
                "y" => Some(Value::Int(u.loc.y)),
                "hitpoints" => Some(Value::Int(u.hitpoints)),
                "max_hitpoints" => Some(Value::Int(u.max_hitpoints)),
                "movement_left" => Some(Value::Int(u.movement_left)),
                "max_movement" => Some(Value::Int(u.max_movement)),
                "level" => Some(Value::Int(u.level)),
                _ => None,
            },
            HostHandle::Side(s) => match name {
                "id" => Some(Value::Int(s.id)),
                "gold" => Some(Value::Int(s.gold)),
                _ => None,
            },
            HostHandle::Location(l) => match name {
                "x" => Some(Value::Int(l.x)),
                "y" => Some(Value::Int(l.y)),
                _ => None,
            },
            HostHandle::Action(a) => match (a, name) {
                (_, "kind") => Some(Value::Str(action_kind(a).to_string())),
                (Action::Move { unit, .. }, "unit") => Some(Value::Int(*unit)),
                (Action::Move { to, .. }, "to") => {
                    Some(Value::Callable(HostHandle::Location(*to)))
                }
                (Action::Attack { unit, .. }, "unit") => Some(Value::Int(*unit)),
                (Action::Attack { target, .. }, "target") => Some(Value::Int(*target)),
                (Action::Recruit { side, .. }, "side") => Some(Value::Int(*side)),
                (Action::Recruit { unit_type, .. }, "type") => {
                    Some(Value::Str(unit_type.clone()))
                }
                (Action::Recruit { at, .. }, "at") => Some(match at {
                    Some(loc) => Value::Callable(HostHandle::Location(*loc)),
                    None => Value::Null,
                }),
                _ => None,
            },
        }
    }

    /// All members in declaration order, for enumeration and JSON output.
    pub fn members(&self) -> Vec<(&'static str, Value)> {
        let keys: &[&'static str] = match self {
            HostHandle::Unit(_) => &[
                "id",
                "name",
                "side",
                "loc",
                "x",
                "y",
                "hitpoints",
                "max_hitpoints",
                "movement_left",
                "max_movement",
                "level",
            ],
            HostHandle::Side(_) => &["id", "gold"],
            HostHandle::Location(_) => &["x", "y"],
            HostHandle::Action(a) => match a {
                Action::Move { .. } => &["kind", "unit", "to"],
                Action::Attack { .. } => &["kind", "unit", "target"],
                Action::Recruit { .. } => &["kind", "side", "type", "at"],
            },
        };
        keys.iter()
            .filter_map(|k| self.get(k).map(|v| (*k, v)))
            .collect()
    }
}

fn action_kind(a: &Action) -> &'static str {
    match a {
        Action::Move { .. } => "move",
        Action::Attack { .. } => "attack",
        Action::Recruit { .. } => "recruit",
    }
}

impl fmt::Display for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostHandle::Unit(u) => write!(f, "unit {} at {}", u.id, u.loc),
            HostHandle::Side(s) => write!(f, "side {} (gold {})", s.id, s.gold),
            HostHandle::Location(l) => write!(f, "{}", l),
            HostHandle::Action(a) => write!(f, "{}", a),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: UnitId, x: i64, y: i64) -> UnitView {
        UnitView {
            id,
            name: "grunt".to_string(),
            side: 1,
            loc: Location::new(x, y),
            hitpoints: 20,
            max_hitpoints: 20,
            movement_left: 4,
            max_movement: 4,
            level: 1,
        }
    }

    #[test]
    fn chebyshev_distance() {
        let a = Location::new(0, 0);
        assert_eq!(a.distance(Location::new(3, 1)), 3);
        assert_eq!(a.distance(Location::new(-2, -2)), 2);
        assert!(a.is_adjacent(Location::new(1, 1)));
        assert!(!a.is_adjacent(a));
    }

    #[test]
    fn unit_members_resolve() {
        let h = HostHandle::Unit(unit(7, 2, 3));
        assert_eq!(h.get("id"), Some(Value::Int(7)));
        assert_eq!(h.get("x"), Some(Value::Int(2)));
        assert_eq!(
            h.get("loc"),
            Some(Value::Callable(HostHandle::Location(Location::new(2, 3))))
        );
        assert_eq!(h.get("missing"), None);
    }

    #[test]
    fn action_members_follow_variant() {
        let h = HostHandle::Action(Action::Recruit {
            side: 2,
            unit_type: "archer".to_string(),
            at: None,
        });
        assert_eq!(h.get("kind"), Some(Value::Str("recruit".to_string())));
        assert_eq!(h.get("at"), Some(Value::Null));
        assert_eq!(h.get("to"), None);
    }

    #[test]
    fn members_enumerates_every_key() {
        let h = HostHandle::Side(SideView { id: 1, gold: 50 });
        let members = h.members();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0], ("id", Value::Int(1)));
    }
}
