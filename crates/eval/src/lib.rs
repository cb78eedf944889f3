//! gambit-eval: the decision engine runtime.
//!
//! Everything past parsing lives here: the value model, chained evaluation
//! contexts, compiled formulas and their evaluator, the builtin and host
//! function table, the candidate-move registry and scan, the move-map
//! cache, and the per-side turn controller. Game state is reached only
//! through the traits in [`world`]; the bundled [`world::GridWorld`] is an
//! in-memory implementation for tests and tooling.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root:
//!
//! - [`Value`] / [`HostHandle`] -- the closed dynamic value model
//! - [`Context`] -- chained read-only name resolution
//! - [`Formula`] / [`FormulaRef`] -- compile once, evaluate many
//! - [`Registry`] -- named candidate moves, registration order preserved
//! - [`MoveCache`] -- lazily recomputed reachability indices
//! - [`TurnController`] -- the RECRUIT/SELECT/EXECUTE loop

pub mod cache;
pub mod candidate;
pub mod content;
pub mod context;
pub mod error;
pub mod formula;
pub mod functions;
pub mod host;
mod interp;
pub mod registry;
pub mod turn;
pub mod value;
pub mod world;

pub use cache::{MoveCache, MoveMaps};
pub use candidate::{CandidateMove, Choice, SENTINEL_SCORE};
pub use content::{AiConfig, MoveDecl, Scenario};
pub use context::Context;
pub use error::{ConsoleError, EvalError, ExecError, RegistryError, ScenarioError};
pub use formula::{Formula, FormulaRef};
pub use functions::FunctionTable;
pub use host::{Action, HostHandle, Location, SideId, SideView, UnitId, UnitView};
pub use registry::Registry;
pub use turn::{StepRecord, TurnController, TurnOutcome, TurnReport};
pub use value::Value;
pub use world::{ActionExecutor, GameView, MoveMap, MoveScope, ReachabilityProvider, World};
