//! Scenario documents.
//!
//! A scenario is one JSON file: board dimensions, keep tiles, sides,
//! starting units, recruitable unit types, and the AI block with its
//! configuration variables and declarative move set. Everything the
//! engine runs is data; no move logic lives in Rust.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::host::{Location, SideId, UnitId};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub width: i64,
    pub height: i64,
    #[serde(default)]
    pub keeps: Vec<Location>,
    pub sides: Vec<SideDef>,
    #[serde(default)]
    pub units: Vec<UnitDef>,
    #[serde(default)]
    pub unit_types: BTreeMap<String, UnitTypeDef>,
    pub ai: AiConfig,
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Scenario, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SideDef {
    pub id: SideId,
    pub gold: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitDef {
    pub id: UnitId,
    pub name: String,
    pub side: SideId,
    pub x: i64,
    pub y: i64,
    pub hitpoints: i64,
    pub movement: i64,
    #[serde(default = "default_level")]
    pub level: i64,
}

/// A recruitable type: what it costs and what spawns.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitTypeDef {
    pub cost: i64,
    pub hitpoints: i64,
    pub movement: i64,
    #[serde(default = "default_level")]
    pub level: i64,
}

/// The AI block of a scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Which side this controller plays.
    pub side: SideId,
    /// Constants made visible to every formula, by name. Plain JSON;
    /// converted to runtime values once at startup.
    #[serde(default)]
    pub vars: BTreeMap<String, serde_json::Value>,
    /// Evaluated repeatedly at the start of each turn until it stops
    /// producing recruit actions.
    #[serde(default)]
    pub recruit: Option<String>,
    /// Scripted move formula, consulted ahead of the candidate scan
    /// each selection pass; an empty result defers to the scan.
    #[serde(default, rename = "move")]
    pub move_formula: Option<String>,
    /// Candidate moves, in priority order for ties.
    #[serde(default)]
    pub moves: Vec<MoveDecl>,
    /// Upper bound on evaluate/execute steps in one turn.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

/// One declared candidate move, all formulas as source text.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveDecl {
    pub name: String,
    pub score: String,
    pub action: String,
    #[serde(default)]
    pub precondition: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_level() -> i64 {
    1
}

fn default_max_steps() -> usize {
    1000
}
