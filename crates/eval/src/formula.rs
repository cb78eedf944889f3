//! Compiled formulas.
//!
//! [`Formula::compile`] parses source text and resolves every call site
//! against a [`FunctionTable`] in one pass. Unknown function names and
//! arity mismatches surface here, with source positions, instead of at
//! evaluation time. The resolved tree holds direct references to its
//! callees, so a formula compiled once can be evaluated many times with
//! no table in sight.

use std::sync::Arc;

use gambit_core::ast::{BinOp, Expr};
use gambit_core::{parse_formula, ParseError};
use rust_decimal::Decimal;

use crate::context::Context;
use crate::error::EvalError;
use crate::functions::{Builtin, Entry, FunctionTable, HostFn, MoveFn};
use crate::interp;
use crate::value::Value;

/// Shared handle to a compiled formula.
pub type FormulaRef = Arc<Formula>;

#[derive(Debug)]
pub struct Formula {
    src: String,
    root: Node,
}

impl Formula {
    pub fn compile(src: &str, table: &FunctionTable) -> Result<Formula, ParseError> {
        let expr = parse_formula(src)?;
        let root = resolve(&expr, table)?;
        Ok(Formula {
            src: src.to_string(),
            root,
        })
    }

    /// The original source text, kept for reports and logs.
    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn eval(&self, ctx: &Context<'_>) -> Result<Value, EvalError> {
        interp::eval_node(&self.root, ctx)
    }
}

// ──────────────────────────────────────────────
// Resolved tree
// ──────────────────────────────────────────────

/// The shape mirrors the surface syntax except that decimal literals are
/// parsed and calls carry a direct [`FnRef`].
#[derive(Debug)]
pub(crate) enum Node {
    Int(i64),
    Decimal(Decimal),
    Str(String),
    Ident(String),
    List(Vec<Node>),
    Neg(Box<Node>),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Binary {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Member {
        object: Box<Node>,
        field: String,
    },
    Index {
        object: Box<Node>,
        index: Box<Node>,
    },
    Call {
        func: FnRef,
        args: Vec<Node>,
    },
    Where {
        body: Box<Node>,
        bindings: Vec<(String, Node)>,
    },
}

#[derive(Debug, Clone)]
pub(crate) enum FnRef {
    Builtin(Builtin),
    Host(HostFn),
    Move(Arc<MoveFn>),
}

fn resolve(expr: &Expr, table: &FunctionTable) -> Result<Node, ParseError> {
    Ok(match expr {
        Expr::Int(n) => Node::Int(*n),
        Expr::Decimal { text, line, column } => {
            let d = text.parse::<Decimal>().map_err(|_| {
                ParseError::at(
                    *line,
                    *column,
                    format!("decimal literal '{}' out of range", text),
                )
            })?;
            Node::Decimal(d)
        }
        Expr::Str(s) => Node::Str(s.clone()),
        Expr::Ident(name) => Node::Ident(name.clone()),
        Expr::List(items) => {
            let resolved: Result<Vec<Node>, ParseError> =
                items.iter().map(|e| resolve(e, table)).collect();
            Node::List(resolved?)
        }
        Expr::Neg(e) => Node::Neg(Box::new(resolve(e, table)?)),
        Expr::Not(e) => Node::Not(Box::new(resolve(e, table)?)),
        Expr::And(l, r) => Node::And(
            Box::new(resolve(l, table)?),
            Box::new(resolve(r, table)?),
        ),
        Expr::Or(l, r) => Node::Or(
            Box::new(resolve(l, table)?),
            Box::new(resolve(r, table)?),
        ),
        Expr::Binary { op, left, right } => Node::Binary {
            op: *op,
            left: Box::new(resolve(left, table)?),
            right: Box::new(resolve(right, table)?),
        },
        Expr::Member { object, field } => Node::Member {
            object: Box::new(resolve(object, table)?),
            field: field.clone(),
        },
        Expr::Index { object, index } => Node::Index {
            object: Box::new(resolve(object, table)?),
            index: Box::new(resolve(index, table)?),
        },
        Expr::Call {
            name,
            args,
            line,
            column,
        } => {
            let entry = table.lookup(name).ok_or_else(|| {
                ParseError::at(*line, *column, format!("unknown function '{}'", name))
            })?;
            let (min, max) = entry.arity();
            if args.len() < min || max.is_some_and(|m| args.len() > m) {
                return Err(ParseError::at(
                    *line,
                    *column,
                    arity_message(name, min, max, args.len()),
                ));
            }
            let func = match entry {
                Entry::Builtin(b) => FnRef::Builtin(*b),
                Entry::Host { f, .. } => FnRef::Host(*f),
                Entry::Move(m) => FnRef::Move(Arc::clone(m)),
            };
            let resolved: Result<Vec<Node>, ParseError> =
                args.iter().map(|e| resolve(e, table)).collect();
            Node::Call {
                func,
                args: resolved?,
            }
        }
        Expr::Where { body, bindings } => {
            let mut resolved = Vec::with_capacity(bindings.len());
            for (name, e) in bindings {
                resolved.push((name.clone(), resolve(e, table)?));
            }
            Node::Where {
                body: Box::new(resolve(body, table)?),
                bindings: resolved,
            }
        }
    })
}

fn arity_message(name: &str, min: usize, max: Option<usize>, got: usize) -> String {
    match max {
        Some(m) if m == min && min == 1 => {
            format!("function '{}' expects 1 argument, got {}", name, got)
        }
        Some(m) if m == min => {
            format!("function '{}' expects {} arguments, got {}", name, min, got)
        }
        Some(m) => format!(
            "function '{}' expects {} to {} arguments, got {}",
            name, min, m, got
        ),
        None if min == 1 => {
            format!("function '{}' expects at least 1 argument, got {}", name, got)
        }
        None => format!(
            "function '{}' expects at least {} arguments, got {}",
            name, min, got
        ),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_function_is_a_compile_error_with_position() {
        let table = FunctionTable::standard();
        let err = Formula::compile("1 + nosuch(2)", &table).unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 5);
        assert_eq!(err.message, "unknown function 'nosuch'");
    }

    #[test]
    fn arity_is_checked_at_compile_time() {
        let table = FunctionTable::standard();
        let err = Formula::compile("abs(1, 2)", &table).unwrap_err();
        assert_eq!(err.message, "function 'abs' expects 1 argument, got 2");
        let err = Formula::compile("if(1, 2)", &table).unwrap_err();
        assert_eq!(err.message, "function 'if' expects 3 arguments, got 2");
        let err = Formula::compile("recruit()", &table).unwrap_err();
        assert_eq!(
            err.message,
            "function 'recruit' expects 1 to 2 arguments, got 0"
        );
        let err = Formula::compile("min()", &table).unwrap_err();
        assert_eq!(
            err.message,
            "function 'min' expects at least 1 argument, got 0"
        );
    }

    #[test]
    fn source_text_is_preserved() {
        let table = FunctionTable::standard();
        let f = Formula::compile("1 + 2 * 3", &table).unwrap();
        assert_eq!(f.src(), "1 + 2 * 3");
    }

    #[test]
    fn decimal_literals_parse_at_compile_time() {
        let table = FunctionTable::standard();
        let f = Formula::compile("2.5", &table).unwrap();
        let v = f.eval(&Context::root()).unwrap();
        assert_eq!(v, Value::Decimal("2.5".parse().unwrap()));
    }

    #[test]
    fn out_of_range_decimal_is_a_compile_error_with_position() {
        let table = FunctionTable::standard();
        let big = "99999999999999999999999999999999.0";
        let err = Formula::compile(&format!("1 + {}", big), &table).unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 5);
        assert_eq!(
            err.message,
            format!("decimal literal '{}' out of range", big)
        );
    }

    #[test]
    fn nested_calls_resolve_everywhere() {
        let table = FunctionTable::standard();
        assert!(Formula::compile("min([abs(-1), missing(2)])", &table).is_err());
        assert!(Formula::compile("min([abs(-1), size([2])])", &table).is_ok());
    }
}
