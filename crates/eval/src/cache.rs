//! Lazily recomputed move maps.
//!
//! Reachability is the expensive query, and most formulas ask for it
//! many times per selection pass. The cache computes all six indices in
//! one refresh -- own moves, own full-movement moves, and merged enemy
//! moves, each keyed by source and inverted by target -- plus the attack
//! options and keep list derived from them. Reads validate first; after
//! [`MoveCache::invalidate`] the next read recomputes everything.
//!
//! [`MoveCache::swap`] exchanges two caches in place. A caller evaluating
//! against a speculative board keeps a spare cache, swaps it in for the
//! what-if pass, and swaps the original back untouched.

use std::collections::BTreeSet;

use tracing::debug;

use crate::host::{HostHandle, Location, SideId, UnitView};
use crate::value::Value;
use crate::world::{GameView, MoveMap, MoveScope, ReachabilityProvider};

/// One reachability relation, indexed both ways.
#[derive(Debug, Clone, Default)]
pub struct MoveMaps {
    /// Source tile to the tiles reachable from it.
    pub by_source: MoveMap,
    /// Target tile to the source tiles that can reach it.
    pub by_target: MoveMap,
}

impl MoveMaps {
    fn from_sources(by_source: MoveMap) -> MoveMaps {
        let mut by_target = MoveMap::new();
        for (src, tiles) in &by_source {
            for t in tiles {
                by_target.entry(*t).or_default().insert(*src);
            }
        }
        MoveMaps {
            by_source,
            by_target,
        }
    }
}

#[derive(Debug, Default)]
pub struct MoveCache {
    valid: bool,
    own: MoveMaps,
    own_full: MoveMaps,
    enemy: MoveMaps,
    attacks: Value,
    keeps: Value,
}

impl MoveCache {
    pub fn new() -> MoveCache {
        MoveCache::default()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Mark everything stale. The next read recomputes.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Exchange contents with another cache. No recomputation happens;
    /// each cache keeps its own validity.
    pub fn swap(&mut self, other: &mut MoveCache) {
        std::mem::swap(self, other);
    }

    /// Recompute now if stale.
    pub fn ensure<W>(&mut self, world: &W, side: SideId)
    where
        W: GameView + ReachabilityProvider + ?Sized,
    {
        if !self.valid {
            self.refresh(world, side);
        }
    }

    pub fn own_moves<W>(&mut self, world: &W, side: SideId) -> &MoveMaps
    where
        W: GameView + ReachabilityProvider + ?Sized,
    {
        self.ensure(world, side);
        &self.own
    }

    pub fn own_full_moves<W>(&mut self, world: &W, side: SideId) -> &MoveMaps
    where
        W: GameView + ReachabilityProvider + ?Sized,
    {
        self.ensure(world, side);
        &self.own_full
    }

    pub fn enemy_moves<W>(&mut self, world: &W, side: SideId) -> &MoveMaps
    where
        W: GameView + ReachabilityProvider + ?Sized,
    {
        self.ensure(world, side);
        &self.enemy
    }

    /// Attack options for this side as a list of maps with `attacker`,
    /// `from`, and `target` entries.
    pub fn attacks<W>(&mut self, world: &W, side: SideId) -> &Value
    where
        W: GameView + ReachabilityProvider + ?Sized,
    {
        self.ensure(world, side);
        &self.attacks
    }

    /// Keep tiles as a list of location handles.
    pub fn keeps<W>(&mut self, world: &W, side: SideId) -> &Value
    where
        W: GameView + ReachabilityProvider + ?Sized,
    {
        self.ensure(world, side);
        &self.keeps
    }

    fn refresh<W>(&mut self, world: &W, side: SideId)
    where
        W: GameView + ReachabilityProvider + ?Sized,
    {
        let own_src = world.reachable_tiles(side, MoveScope::Remaining);
        let full_src = world.reachable_tiles(side, MoveScope::Full);
        let mut enemy_src = MoveMap::new();
        for s in world.sides() {
            if s.id != side {
                enemy_src.extend(world.reachable_tiles(s.id, MoveScope::Full));
            }
        }
        self.own = MoveMaps::from_sources(own_src);
        self.own_full = MoveMaps::from_sources(full_src);
        self.enemy = MoveMaps::from_sources(enemy_src);
        self.attacks = compute_attacks(&world.units(), side, &self.own.by_source);
        self.keeps = Value::List(
            world
                .keeps()
                .into_iter()
                .map(|k| Value::Callable(HostHandle::Location(k)))
                .collect(),
        );
        self.valid = true;
        debug!(
            side,
            own = self.own.by_source.len(),
            enemy = self.enemy.by_source.len(),
            "move maps refreshed"
        );
    }
}

/// Every (attacker, from-tile, target) combination where the attacker is
/// adjacent to the target now or after a remaining-movement step.
fn compute_attacks(units: &[UnitView], side: SideId, own_by_source: &MoveMap) -> Value {
    let empty = BTreeSet::new();
    let mut entries = Vec::new();
    for attacker in units.iter().filter(|u| u.side == side) {
        let reach = own_by_source.get(&attacker.loc).unwrap_or(&empty);
        for target in units.iter().filter(|u| u.side != side) {
            let mut froms: BTreeSet<Location> = BTreeSet::new();
            if attacker.loc.is_adjacent(target.loc) {
                froms.insert(attacker.loc);
            }
            for tile in reach {
                if tile.is_adjacent(target.loc) {
                    froms.insert(*tile);
                }
            }
            for from in froms {
                let mut entry = std::collections::BTreeMap::new();
                entry.insert(
                    "attacker".to_string(),
                    Value::Callable(HostHandle::Unit(attacker.clone())),
                );
                entry.insert("from".to_string(), Value::Callable(HostHandle::Location(from)));
                entry.insert(
                    "target".to_string(),
                    Value::Callable(HostHandle::Unit(target.clone())),
                );
                entries.push(Value::Map(entry));
            }
        }
    }
    Value::List(entries)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
