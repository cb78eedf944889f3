//! Raw expression tree for the formula language.
//!
//! These nodes are plain syntax straight out of the parser. Function calls
//! are unresolved names here; binding them to concrete functions (and
//! checking arity) happens when the runtime compiles the tree against its
//! function table. Call nodes carry their source position so that
//! resolution failures can still point into the formula text.

use std::fmt;

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    /// Decimal literal -- kept as text so no precision is lost before
    /// compile; position is the literal token, for range errors
    Decimal {
        text: String,
        line: u32,
        column: u32,
    },
    Str(String),
    /// Bare identifier, resolved against the evaluation context at runtime
    Ident(String),
    /// `[a, b, c]`
    List(Vec<Expr>),
    /// `-e`
    Neg(Box<Expr>),
    /// `not e`
    Not(Box<Expr>),
    /// `e1 and e2` (short-circuit)
    And(Box<Expr>, Box<Expr>),
    /// `e1 or e2` (short-circuit)
    Or(Box<Expr>, Box<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `object.field`
    Member { object: Box<Expr>, field: String },
    /// `object[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    /// `name(args...)` -- position is the name token, for resolution errors
    Call {
        name: String,
        args: Vec<Expr>,
        line: u32,
        column: u32,
    },
    /// `body where name = expr, ...`
    Where {
        body: Box<Expr>,
        bindings: Vec<(String, Expr)>,
    },
}

// ──────────────────────────────────────────────
// Operators
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "=",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::Lte => "<=",
            BinOp::Gt => ">",
            BinOp::Gte => ">=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::Lte | BinOp::Gt | BinOp::Gte
        )
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
