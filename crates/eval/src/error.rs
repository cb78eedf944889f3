//! Error types for the runtime.
//!
//! [`EvalError`] is the hot-path error: anything that can go wrong while
//! evaluating one formula against one context. It is always recoverable;
//! the candidate scan and the turn controller catch it, log it, and move
//! on. The registration/execution-side errors are thiserror enums since
//! they cross into caller code.

use std::fmt;

use gambit_core::ParseError;
use thiserror::Error;

use crate::host::{SideId, UnitId};

// ──────────────────────────────────────────────
// Evaluation errors
// ──────────────────────────────────────────────

/// Errors that can occur while evaluating a compiled formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// An identifier resolved against no binding in the context chain.
    UnknownIdent { name: String },
    /// Member access on a value that has no such member.
    UnknownMember { kind: String, member: String },
    /// A checked conversion was asked of an unsupported value tag.
    Conversion {
        expected: &'static str,
        got: &'static str,
    },
    /// Operand tags unsupported by an operator or function.
    Type { message: String },
    /// Integer overflow or division by zero.
    Arithmetic { message: String },
    /// List index outside `0..len`.
    IndexOutOfBounds { index: i64, len: usize },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnknownIdent { name } => {
                write!(f, "no binding named '{}' in scope", name)
            }
            EvalError::UnknownMember { kind, member } => {
                write!(f, "{} has no member '{}'", kind, member)
            }
            EvalError::Conversion { expected, got } => {
                write!(f, "cannot convert {} to {}", got, expected)
            }
            EvalError::Type { message } => {
                write!(f, "type error: {}", message)
            }
            EvalError::Arithmetic { message } => {
                write!(f, "arithmetic error: {}", message)
            }
            EvalError::IndexOutOfBounds { index, len } => {
                write!(f, "index {} out of bounds for list of length {}", index, len)
            }
        }
    }
}

impl std::error::Error for EvalError {}

// ──────────────────────────────────────────────
// Registration, execution, scenario, console
// ──────────────────────────────────────────────

/// Errors raised while building a [`crate::Registry`] from declarations.
/// A failed registration leaves the registry exactly as it was.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("duplicate declaration '{name}'")]
    DuplicateDeclaration { name: String },
    #[error("candidate move '{name}': {field} formula: {source}")]
    Parse {
        name: String,
        field: &'static str,
        source: ParseError,
    },
    #[error("recruit formula: {source}")]
    RecruitParse { source: ParseError },
    #[error("move formula: {source}")]
    MoveParse { source: ParseError },
    #[error("config var '{name}': {source}")]
    Var { name: String, source: EvalError },
}

/// Errors from the action executor. `InvalidAction` covers the gap between
/// selection time and execution time: the order was well formed but the
/// world no longer supports it.
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    #[error("invalid action: {reason}")]
    InvalidAction { reason: String },
    #[error("unknown unit {id}")]
    UnknownUnit { id: UnitId },
}

/// Errors building a world from a scenario document.
#[derive(Debug, Clone, Error)]
pub enum ScenarioError {
    #[error("unit {id} placed out of bounds at ({x}, {y})")]
    OutOfBounds { id: UnitId, x: i64, y: i64 },
    #[error("duplicate unit id {id}")]
    DuplicateUnitId { id: UnitId },
    #[error("unit {id} belongs to undeclared side {side}")]
    UnknownSide { id: UnitId, side: SideId },
    #[error("two units share tile ({x}, {y})")]
    OccupiedTile { x: i64, y: i64 },
    #[error("ai plays undeclared side {side}")]
    UnknownAiSide { side: SideId },
}

/// Errors surfaced by the diagnostic formula console.
#[derive(Debug, Clone, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}
