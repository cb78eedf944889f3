//! The bundled square-grid world.
//!
//! An 8-neighbour board with flat terrain: every step costs one movement
//! point, distance is Chebyshev, and any unit blocks the tiles it stands
//! on. Combat is deliberately crude (a flat damage number, no retaliation)
//! since the interesting behavior under test is decision-making, not
//! combat resolution.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::content::{Scenario, UnitTypeDef};
use crate::error::{ExecError, ScenarioError};
use crate::host::{Action, Location, SideId, SideView, UnitId, UnitView};
use crate::world::{ActionExecutor, GameView, MoveMap, MoveScope, ReachabilityProvider};

const DIRS: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

const ATTACK_DAMAGE: i64 = 10;

#[derive(Debug, Clone)]
pub struct GridWorld {
    width: i64,
    height: i64,
    turn: i64,
    keeps: Vec<Location>,
    sides: BTreeMap<SideId, SideView>,
    units: BTreeMap<UnitId, UnitView>,
    unit_types: BTreeMap<String, UnitTypeDef>,
}

impl GridWorld {
    /// Build and validate a board from a scenario document.
    pub fn from_scenario(scenario: &Scenario) -> Result<GridWorld, ScenarioError> {
        let sides: BTreeMap<SideId, SideView> = scenario
            .sides
            .iter()
            .map(|s| (s.id, SideView { id: s.id, gold: s.gold }))
            .collect();
        if !sides.contains_key(&scenario.ai.side) {
            return Err(ScenarioError::UnknownAiSide {
                side: scenario.ai.side,
            });
        }
        let mut units: BTreeMap<UnitId, UnitView> = BTreeMap::new();
        let mut occupied: BTreeSet<Location> = BTreeSet::new();
        for def in &scenario.units {
            let loc = Location::new(def.x, def.y);
            if def.x < 0 || def.x >= scenario.width || def.y < 0 || def.y >= scenario.height {
                return Err(ScenarioError::OutOfBounds {
                    id: def.id,
                    x: def.x,
                    y: def.y,
                });
            }
            if !sides.contains_key(&def.side) {
                return Err(ScenarioError::UnknownSide {
                    id: def.id,
                    side: def.side,
                });
            }
            if !occupied.insert(loc) {
                return Err(ScenarioError::OccupiedTile { x: def.x, y: def.y });
            }
            let clash = units.insert(
                def.id,
                UnitView {
                    id: def.id,
                    name: def.name.clone(),
                    side: def.side,
                    loc,
                    hitpoints: def.hitpoints,
                    max_hitpoints: def.hitpoints,
                    movement_left: def.movement,
                    max_movement: def.movement,
                    level: def.level,
                },
            );
            if clash.is_some() {
                return Err(ScenarioError::DuplicateUnitId { id: def.id });
            }
        }
        Ok(GridWorld {
            width: scenario.width,
            height: scenario.height,
            turn: 1,
            keeps: scenario.keeps.clone(),
            sides,
            units,
            unit_types: scenario.unit_types.clone(),
        })
    }

    /// Start the next turn: bump the counter and restore every unit's
    /// movement.
    pub fn advance_turn(&mut self) {
        self.turn += 1;
        for unit in self.units.values_mut() {
            unit.movement_left = unit.max_movement;
        }
    }

    fn in_bounds(&self, loc: Location) -> bool {
        loc.x >= 0 && loc.x < self.width && loc.y >= 0 && loc.y < self.height
    }

    fn occupant(&self, loc: Location) -> Option<UnitId> {
        self.units.values().find(|u| u.loc == loc).map(|u| u.id)
    }

    /// Breadth-first flood from the unit's tile: reachable tile to step
    /// cost, within `budget` steps. Any unit blocks both passage and
    /// arrival. The source tile is not part of the result.
    fn range_map(&self, unit: &UnitView, budget: i64) -> BTreeMap<Location, i64> {
        let mut dist: BTreeMap<Location, i64> = BTreeMap::new();
        let mut queue = VecDeque::new();
        dist.insert(unit.loc, 0);
        queue.push_back(unit.loc);
        while let Some(cur) = queue.pop_front() {
            let d = dist[&cur];
            if d >= budget {
                continue;
            }
            for (dx, dy) in DIRS {
                let next = Location::new(cur.x + dx, cur.y + dy);
                if !self.in_bounds(next)
                    || dist.contains_key(&next)
                    || self.occupant(next).is_some()
                {
                    continue;
                }
                dist.insert(next, d + 1);
                queue.push_back(next);
            }
        }
        dist.remove(&unit.loc);
        dist
    }

    fn do_move(&mut self, id: UnitId, to: Location) -> Result<(), ExecError> {
        let unit = self
            .units
            .get(&id)
            .cloned()
            .ok_or(ExecError::UnknownUnit { id })?;
        let cost = self
            .range_map(&unit, unit.movement_left)
            .get(&to)
            .copied()
            .ok_or_else(|| ExecError::InvalidAction {
                reason: format!("unit {} cannot reach {}", id, to),
            })?;
        let unit = self
            .units
            .get_mut(&id)
            .ok_or(ExecError::UnknownUnit { id })?;
        unit.loc = to;
        unit.movement_left -= cost;
        Ok(())
    }

    fn do_attack(&mut self, id: UnitId, target: UnitId) -> Result<(), ExecError> {
        let attacker = self
            .units
            .get(&id)
            .cloned()
            .ok_or(ExecError::UnknownUnit { id })?;
        let defender = self
            .units
            .get(&target)
            .cloned()
            .ok_or(ExecError::UnknownUnit { id: target })?;
        if attacker.side == defender.side {
            return Err(ExecError::InvalidAction {
                reason: format!("units {} and {} are on the same side", id, target),
            });
        }
        if !attacker.loc.is_adjacent(defender.loc) {
            return Err(ExecError::InvalidAction {
                reason: format!("unit {} is not adjacent to unit {}", id, target),
            });
        }
        if let Some(u) = self.units.get_mut(&target) {
            u.hitpoints -= ATTACK_DAMAGE;
            if u.hitpoints <= 0 {
                debug!(unit = target, "unit destroyed");
                self.units.remove(&target);
            }
        }
        if let Some(u) = self.units.get_mut(&id) {
            u.movement_left = 0;
        }
        Ok(())
    }

    fn do_recruit(
        &mut self,
        side: SideId,
        unit_type: &str,
        at: Option<Location>,
    ) -> Result<(), ExecError> {
        let ty = self
            .unit_types
            .get(unit_type)
            .cloned()
            .ok_or_else(|| ExecError::InvalidAction {
                reason: format!("unknown unit type '{}'", unit_type),
            })?;
        let gold = self
            .sides
            .get(&side)
            .map(|s| s.gold)
            .ok_or_else(|| ExecError::InvalidAction {
                reason: format!("unknown side {}", side),
            })?;
        if gold < ty.cost {
            return Err(ExecError::InvalidAction {
                reason: format!(
                    "side {} cannot afford '{}' ({} gold, cost {})",
                    side, unit_type, gold, ty.cost
                ),
            });
        }
        let spawn = match at {
            Some(loc) => {
                let free_keep = self.in_bounds(loc)
                    && self.keeps.contains(&loc)
                    && self.occupant(loc).is_none();
                if !free_keep {
                    return Err(ExecError::InvalidAction {
                        reason: format!("{} is not a free keep", loc),
                    });
                }
                loc
            }
            None => self
                .keeps
                .iter()
                .copied()
                .find(|k| self.occupant(*k).is_none())
                .ok_or_else(|| ExecError::InvalidAction {
                    reason: "no free keep to recruit on".to_string(),
                })?,
        };
        let id = self.units.keys().max().copied().unwrap_or(0) + 1;
        // fresh recruits cannot act until next turn
        self.units.insert(
            id,
            UnitView {
                id,
                name: unit_type.to_string(),
                side,
                loc: spawn,
                hitpoints: ty.hitpoints,
                max_hitpoints: ty.hitpoints,
                movement_left: 0,
                max_movement: ty.movement,
                level: ty.level,
            },
        );
        if let Some(s) = self.sides.get_mut(&side) {
            s.gold -= ty.cost;
        }
        debug!(unit = id, %unit_type, side, "unit recruited");
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Trait implementations
// ──────────────────────────────────────────────

impl GameView for GridWorld {
    fn turn(&self) -> i64 {
        self.turn
    }

    fn units(&self) -> Vec<UnitView> {
        self.units.values().cloned().collect()
    }

    fn unit(&self, id: UnitId) -> Option<UnitView> {
        self.units.get(&id).cloned()
    }

    fn sides(&self) -> Vec<SideView> {
        self.sides.values().copied().collect()
    }

    fn keeps(&self) -> Vec<Location> {
        self.keeps.clone()
    }
}

impl ReachabilityProvider for GridWorld {
    fn reachable_tiles(&self, side: SideId, scope: MoveScope) -> MoveMap {
        let mut map = MoveMap::new();
        for unit in self.units.values().filter(|u| u.side == side) {
            let budget = match scope {
                MoveScope::Remaining => unit.movement_left,
                MoveScope::Full => unit.max_movement,
            };
            let tiles: BTreeSet<Location> = self.range_map(unit, budget).into_keys().collect();
            map.insert(unit.loc, tiles);
        }
        map
    }
}

impl ActionExecutor for GridWorld {
    fn execute(&mut self, action: &Action) -> Result<(), ExecError> {
        debug!(%action, "executing");
        match action {
            Action::Move { unit, to } => self.do_move(*unit, *to),
            Action::Attack { unit, target } => self.do_attack(*unit, *target),
            Action::Recruit {
                side,
                unit_type,
                at,
            } => self.do_recruit(*side, unit_type, *at),
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{AiConfig, SideDef, UnitDef};

    fn scenario(width: i64, height: i64, units: Vec<UnitDef>) -> Scenario {
        Scenario {
            width,
            height,
            keeps: vec![],
            sides: vec![SideDef { id: 1, gold: 50 }, SideDef { id: 2, gold: 50 }],
            units,
            unit_types: BTreeMap::new(),
            ai: AiConfig {
                side: 1,
                vars: BTreeMap::new(),
                recruit: None,
                move_formula: None,
                moves: vec![],
                max_steps: 1000,
            },
        }
    }

    fn unit_def(id: i64, side: i64, x: i64, y: i64, movement: i64) -> UnitDef {
        UnitDef {
            id,
            name: format!("u{}", id),
            side,
            x,
            y,
            hitpoints: 30,
            movement,
            level: 1,
        }
    }

    fn world(units: Vec<UnitDef>) -> GridWorld {
        GridWorld::from_scenario(&scenario(10, 10, units)).unwrap()
    }

    #[test]
    fn validation_rejects_bad_placements() {
        let err = GridWorld::from_scenario(&scenario(5, 5, vec![unit_def(1, 1, 7, 0, 5)]))
            .unwrap_err();
        assert!(matches!(err, ScenarioError::OutOfBounds { id: 1, .. }));

        let err = GridWorld::from_scenario(&scenario(
            5,
            5,
            vec![unit_def(1, 1, 0, 0, 5), unit_def(1, 1, 1, 1, 5)],
        ))
        .unwrap_err();
        assert!(matches!(err, ScenarioError::DuplicateUnitId { id: 1 }));

        let err = GridWorld::from_scenario(&scenario(5, 5, vec![unit_def(1, 9, 0, 0, 5)]))
            .unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownSide { id: 1, side: 9 }));

        let err = GridWorld::from_scenario(&scenario(
            5,
            5,
            vec![unit_def(1, 1, 2, 2, 5), unit_def(2, 1, 2, 2, 5)],
        ))
        .unwrap_err();
        assert!(matches!(err, ScenarioError::OccupiedTile { x: 2, y: 2 }));
    }

    #[test]
    fn validation_rejects_an_undeclared_ai_side() {
        let mut s = scenario(5, 5, vec![]);
        s.ai.side = 7;
        let err = GridWorld::from_scenario(&s).unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownAiSide { side: 7 }));
    }

    #[test]
    fn units_come_back_in_ascending_id_order() {
        let w = world(vec![
            unit_def(9, 1, 0, 0, 5),
            unit_def(2, 1, 1, 1, 5),
            unit_def(5, 2, 2, 2, 5),
        ]);
        let ids: Vec<i64> = w.units().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[test]
    fn one_step_reaches_all_eight_neighbours() {
        let w = world(vec![unit_def(1, 1, 5, 5, 1)]);
        let map = w.reachable_tiles(1, MoveScope::Remaining);
        let tiles = &map[&Location::new(5, 5)];
        assert_eq!(tiles.len(), 8);
        assert!(!tiles.contains(&Location::new(5, 5)));
        assert!(tiles.contains(&Location::new(4, 4)));
        assert!(tiles.contains(&Location::new(6, 6)));
    }

    #[test]
    fn the_board_edge_clips_reachability() {
        let w = world(vec![unit_def(1, 1, 0, 0, 1)]);
        let map = w.reachable_tiles(1, MoveScope::Remaining);
        assert_eq!(map[&Location::new(0, 0)].len(), 3);
    }

    #[test]
    fn other_units_block_passage_and_arrival() {
        // a wall of side-2 units cuts the corridor
        let w = GridWorld::from_scenario(&scenario(
            3,
            10,
            vec![
                unit_def(1, 1, 1, 1, 9),
                unit_def(2, 2, 0, 4, 9),
                unit_def(3, 2, 1, 4, 9),
                unit_def(4, 2, 2, 4, 9),
            ],
        ))
        .unwrap();
        let tiles = &w.reachable_tiles(1, MoveScope::Remaining)[&Location::new(1, 1)];
        assert!(!tiles.contains(&Location::new(1, 4)), "occupied tile reachable");
        assert!(!tiles.contains(&Location::new(1, 6)), "wall was crossed");
        assert!(tiles.contains(&Location::new(1, 3)));
    }

    #[test]
    fn moving_spends_movement_by_path_length() {
        let mut w = world(vec![unit_def(1, 1, 0, 0, 5)]);
        w.execute(&Action::Move {
            unit: 1,
            to: Location::new(3, 3),
        })
        .unwrap();
        let u = w.unit(1).unwrap();
        assert_eq!(u.loc, Location::new(3, 3));
        // diagonal steps cost one each
        assert_eq!(u.movement_left, 2);
    }

    #[test]
    fn remaining_scope_shrinks_after_moving() {
        let mut w = world(vec![unit_def(1, 1, 0, 0, 5)]);
        let full_before = w.reachable_tiles(1, MoveScope::Full)[&Location::new(0, 0)].len();
        w.execute(&Action::Move {
            unit: 1,
            to: Location::new(4, 4),
        })
        .unwrap();
        let remaining = &w.reachable_tiles(1, MoveScope::Remaining)[&Location::new(4, 4)];
        let full = &w.reachable_tiles(1, MoveScope::Full)[&Location::new(4, 4)];
        assert_eq!(remaining.len(), 8, "one movement point left");
        assert!(full.len() > remaining.len());
        assert!(full_before > 0);
    }

    #[test]
    fn unreachable_moves_are_rejected() {
        let mut w = world(vec![unit_def(1, 1, 0, 0, 2)]);
        let err = w
            .execute(&Action::Move {
                unit: 1,
                to: Location::new(9, 9),
            })
            .unwrap_err();
        assert!(matches!(err, ExecError::InvalidAction { .. }));
        let err = w
            .execute(&Action::Move {
                unit: 42,
                to: Location::new(1, 1),
            })
            .unwrap_err();
        assert!(matches!(err, ExecError::UnknownUnit { id: 42 }));
    }

    #[test]
    fn attacks_require_adjacency_and_an_enemy() {
        let mut w = world(vec![
            unit_def(1, 1, 0, 0, 5),
            unit_def(2, 1, 0, 1, 5),
            unit_def(3, 2, 5, 5, 5),
        ]);
        let err = w
            .execute(&Action::Attack { unit: 1, target: 2 })
            .unwrap_err();
        assert!(err.to_string().contains("same side"));
        let err = w
            .execute(&Action::Attack { unit: 1, target: 3 })
            .unwrap_err();
        assert!(err.to_string().contains("not adjacent"));
    }

    #[test]
    fn attacking_deals_damage_and_ends_movement() {
        let mut w = world(vec![unit_def(1, 1, 0, 0, 5), unit_def(2, 2, 1, 1, 5)]);
        w.execute(&Action::Attack { unit: 1, target: 2 }).unwrap();
        assert_eq!(w.unit(2).unwrap().hitpoints, 20);
        assert_eq!(w.unit(1).unwrap().movement_left, 0);
    }

    #[test]
    fn lethal_damage_removes_the_unit() {
        let mut w = world(vec![unit_def(1, 1, 0, 0, 5), unit_def(2, 2, 1, 1, 5)]);
        for _ in 0..2 {
            w.advance_turn();
            w.execute(&Action::Attack { unit: 1, target: 2 }).unwrap();
        }
        w.advance_turn();
        w.execute(&Action::Attack { unit: 1, target: 2 }).unwrap();
        assert_eq!(w.unit(2), None);
        assert_eq!(w.units().len(), 1);
    }

    #[test]
    fn recruiting_spawns_on_a_keep_and_spends_gold() {
        let mut s = scenario(10, 10, vec![]);
        s.keeps = vec![Location::new(0, 0), Location::new(1, 0)];
        s.unit_types.insert(
            "grunt".to_string(),
            UnitTypeDef {
                cost: 12,
                hitpoints: 28,
                movement: 5,
                level: 1,
            },
        );
        let mut w = GridWorld::from_scenario(&s).unwrap();
        w.execute(&Action::Recruit {
            side: 1,
            unit_type: "grunt".to_string(),
            at: None,
        })
        .unwrap();
        let u = &w.units()[0];
        assert_eq!(u.loc, Location::new(0, 0));
        assert_eq!(u.movement_left, 0, "recruits arrive spent");
        assert_eq!(u.max_movement, 5);
        assert_eq!(w.side(1).unwrap().gold, 38);

        // second recruit takes the next free keep
        w.execute(&Action::Recruit {
            side: 1,
            unit_type: "grunt".to_string(),
            at: None,
        })
        .unwrap();
        assert_eq!(w.units()[1].loc, Location::new(1, 0));

        let err = w
            .execute(&Action::Recruit {
                side: 1,
                unit_type: "grunt".to_string(),
                at: None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("no free keep"));
    }

    #[test]
    fn recruiting_checks_gold_and_type() {
        let mut s = scenario(10, 10, vec![]);
        s.keeps = vec![Location::new(0, 0)];
        s.unit_types.insert(
            "knight".to_string(),
            UnitTypeDef {
                cost: 999,
                hitpoints: 50,
                movement: 7,
                level: 2,
            },
        );
        let mut w = GridWorld::from_scenario(&s).unwrap();
        let err = w
            .execute(&Action::Recruit {
                side: 1,
                unit_type: "knight".to_string(),
                at: None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("cannot afford"));
        let err = w
            .execute(&Action::Recruit {
                side: 1,
                unit_type: "wyvern".to_string(),
                at: None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("unknown unit type"));
    }

    #[test]
    fn advancing_the_turn_restores_movement() {
        let mut w = world(vec![unit_def(1, 1, 0, 0, 5)]);
        w.execute(&Action::Move {
            unit: 1,
            to: Location::new(2, 2),
        })
        .unwrap();
        assert_eq!(w.unit(1).unwrap().movement_left, 3);
        w.advance_turn();
        assert_eq!(w.turn(), 2);
        assert_eq!(w.unit(1).unwrap().movement_left, 5);
    }
}
