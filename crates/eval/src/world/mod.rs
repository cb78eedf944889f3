//! World access traits.
//!
//! The engine reads game state and issues orders only through these
//! traits, so the decision logic never depends on how the host stores
//! its board. [`GridWorld`] is the bundled in-memory implementation.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ExecError;
use crate::host::{Action, Location, SideId, SideView, UnitId, UnitView};

pub mod grid;

pub use grid::GridWorld;

/// Which movement budget a reachability query uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveScope {
    /// Movement the units have left this turn.
    Remaining,
    /// Full movement, as if none had been spent.
    Full,
}

/// Reachability for one side: source tile to the set of tiles a unit
/// standing there can reach.
pub type MoveMap = BTreeMap<Location, BTreeSet<Location>>;

pub trait ReachabilityProvider {
    fn reachable_tiles(&self, side: SideId, scope: MoveScope) -> MoveMap;
}

/// Read-only board state.
pub trait GameView {
    fn turn(&self) -> i64;

    /// All units, in ascending id order. Every consumer relies on this
    /// order being stable between calls on an unchanged board.
    fn units(&self) -> Vec<UnitView>;

    fn unit(&self, id: UnitId) -> Option<UnitView>;

    fn sides(&self) -> Vec<SideView>;

    fn side(&self, id: SideId) -> Option<SideView> {
        self.sides().into_iter().find(|s| s.id == id)
    }

    fn keeps(&self) -> Vec<Location>;
}

/// The single mutation seam. Validation happens here, not in formulas;
/// an order the board cannot carry out comes back as [`ExecError`].
pub trait ActionExecutor {
    fn execute(&mut self, action: &Action) -> Result<(), ExecError>;
}

/// Everything the turn controller needs from a host.
pub trait World: GameView + ReachabilityProvider + ActionExecutor {}

impl<T: GameView + ReachabilityProvider + ActionExecutor> World for T {}
