//! gambit-core: formula language frontend.
//!
//! Turns formula source text into a raw expression tree. Formulas arrive as
//! strings embedded in content declarations; this crate lexes and parses
//! them and reports errors with line/column positions. The runtime crate
//! compiles the raw tree against its function table -- nothing here knows
//! about values, contexts, or game state.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::{BinOp, Expr};
pub use error::ParseError;
pub use parser::parse_formula;
