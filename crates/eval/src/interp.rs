//! The tree-walking evaluator.
//!
//! Comparisons yield `Int(1)` or `Int(0)`. `and` and `or` short-circuit
//! and return the deciding operand, and `if` evaluates only the taken
//! branch. Integer arithmetic is checked; decimals join in whenever one
//! operand is a decimal. All failures come back as [`EvalError`]; nothing
//! here panics on bad input.

use std::cmp::Ordering;

use gambit_core::ast::BinOp;
use rust_decimal::Decimal;

use crate::context::Context;
use crate::error::EvalError;
use crate::formula::{FnRef, Node};
use crate::functions::Builtin;
use crate::value::Value;

pub(crate) fn eval_node(node: &Node, ctx: &Context<'_>) -> Result<Value, EvalError> {
    match node {
        Node::Int(n) => Ok(Value::Int(*n)),
        Node::Decimal(d) => Ok(Value::Decimal(*d)),
        Node::Str(s) => Ok(Value::Str(s.clone())),
        Node::Ident(name) => {
            ctx.get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnknownIdent { name: name.clone() })
        }
        Node::List(items) => {
            let vals: Result<Vec<Value>, EvalError> =
                items.iter().map(|n| eval_node(n, ctx)).collect();
            Ok(Value::List(vals?))
        }
        Node::Neg(e) => match eval_node(e, ctx)? {
            Value::Int(n) => n.checked_neg().map(Value::Int).ok_or_else(|| {
                EvalError::Arithmetic {
                    message: "numeric overflow in negation".to_string(),
                }
            }),
            Value::Decimal(d) => Ok(Value::Decimal(-d)),
            other => Err(EvalError::Type {
                message: format!("cannot negate {}", other.type_name()),
            }),
        },
        Node::Not(e) => Ok(bool_value(!eval_node(e, ctx)?.is_true())),
        Node::And(l, r) => {
            let left = eval_node(l, ctx)?;
            if left.is_true() {
                eval_node(r, ctx)
            } else {
                Ok(left)
            }
        }
        Node::Or(l, r) => {
            let left = eval_node(l, ctx)?;
            if left.is_true() {
                Ok(left)
            } else {
                eval_node(r, ctx)
            }
        }
        Node::Binary { op, left, right } => {
            let l = eval_node(left, ctx)?;
            let r = eval_node(right, ctx)?;
            eval_binary(*op, l, r)
        }
        Node::Member { object, field } => eval_member(eval_node(object, ctx)?, field),
        Node::Index { object, index } => {
            eval_index(eval_node(object, ctx)?, eval_node(index, ctx)?)
        }
        Node::Call { func, args } => eval_call(func, args, ctx),
        Node::Where { body, bindings } => {
            // Binding expressions see the enclosing scope only; they do
            // not see each other or the names they introduce.
            let mut frame = ctx.child();
            for (name, rhs) in bindings {
                let v = eval_node(rhs, ctx)?;
                frame.set(name.clone(), v);
            }
            eval_node(body, &frame)
        }
    }
}

fn bool_value(b: bool) -> Value {
    Value::Int(if b { 1 } else { 0 })
}

// ──────────────────────────────────────────────
// Operators
// ──────────────────────────────────────────────

fn eval_binary(op: BinOp, left: Value, right: Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Eq => Ok(bool_value(left == right)),
        BinOp::Neq => Ok(bool_value(left != right)),
        BinOp::Lt => Ok(bool_value(left < right)),
        BinOp::Lte => Ok(bool_value(left <= right)),
        BinOp::Gt => Ok(bool_value(left > right)),
        BinOp::Gte => Ok(bool_value(left >= right)),
        BinOp::Add => arith("+", i64::checked_add, Decimal::checked_add, left, right),
        BinOp::Sub => arith("-", i64::checked_sub, Decimal::checked_sub, left, right),
        BinOp::Mul => arith("*", i64::checked_mul, Decimal::checked_mul, left, right),
        BinOp::Div => arith("/", i64::checked_div, Decimal::checked_div, left, right),
        BinOp::Mod => arith("%", i64::checked_rem, Decimal::checked_rem, left, right),
    }
}

fn arith(
    symbol: &'static str,
    int_op: fn(i64, i64) -> Option<i64>,
    dec_op: fn(Decimal, Decimal) -> Option<Decimal>,
    left: Value,
    right: Value,
) -> Result<Value, EvalError> {
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => int_op(*a, *b)
            .map(Value::Int)
            .ok_or_else(|| arith_error(symbol, *b == 0)),
        (Value::Int(_) | Value::Decimal(_), Value::Int(_) | Value::Decimal(_)) => {
            let b = right.as_decimal()?;
            dec_op(left.as_decimal()?, b)
                .map(Value::Decimal)
                .ok_or_else(|| arith_error(symbol, b.is_zero()))
        }
        _ => Err(EvalError::Type {
            message: format!(
                "cannot apply '{}' to {} and {}",
                symbol,
                left.type_name(),
                right.type_name()
            ),
        }),
    }
}

fn arith_error(symbol: &'static str, zero_divisor: bool) -> EvalError {
    EvalError::Arithmetic {
        message: if zero_divisor {
            "division by zero".to_string()
        } else {
            format!("numeric overflow in '{}'", symbol)
        },
    }
}

// ──────────────────────────────────────────────
// Member and index access
// ──────────────────────────────────────────────

/// Member access on a map requires the key to exist; `m.missing` is an
/// error where `m['missing']` is null. Dotted access is for shapes the
/// author relies on, bracketed access is a lookup.
fn eval_member(object: Value, field: &str) -> Result<Value, EvalError> {
    match object {
        Value::Map(map) => map.get(field).cloned().ok_or_else(|| {
            EvalError::UnknownMember {
                kind: "Map".to_string(),
                member: field.to_string(),
            }
        }),
        Value::Callable(h) => h.get(field).ok_or_else(|| EvalError::UnknownMember {
            kind: h.kind().to_string(),
            member: field.to_string(),
        }),
        other => Err(EvalError::Type {
            message: format!("{} has no members", other.type_name()),
        }),
    }
}

fn eval_index(object: Value, index: Value) -> Result<Value, EvalError> {
    match object {
        Value::List(items) => {
            let i = index.as_int()?;
            if i < 0 || i as usize >= items.len() {
                return Err(EvalError::IndexOutOfBounds {
                    index: i,
                    len: items.len(),
                });
            }
            Ok(items[i as usize].clone())
        }
        Value::Map(map) => {
            let key = index.as_str()?;
            Ok(map.get(key).cloned().unwrap_or(Value::Null))
        }
        other => Err(EvalError::Type {
            message: format!("cannot index {}", other.type_name()),
        }),
    }
}

// ──────────────────────────────────────────────
// Calls
// ──────────────────────────────────────────────

fn eval_call(func: &FnRef, args: &[Node], ctx: &Context<'_>) -> Result<Value, EvalError> {
    if let FnRef::Builtin(Builtin::If) = func {
        let cond = eval_node(&args[0], ctx)?;
        let branch = if cond.is_true() { &args[1] } else { &args[2] };
        return eval_node(branch, ctx);
    }
    let mut vals = Vec::with_capacity(args.len());
    for a in args {
        vals.push(eval_node(a, ctx)?);
    }
    match func {
        FnRef::Builtin(b) => apply_builtin(*b, &vals),
        FnRef::Host(f) => f(&vals, ctx),
        FnRef::Move(m) => {
            let mut frame = ctx.child();
            for (param, v) in m.params.iter().zip(vals) {
                frame.set(param.clone(), v);
            }
            m.body.eval(&frame)
        }
    }
}

fn apply_builtin(b: Builtin, args: &[Value]) -> Result<Value, EvalError> {
    match b {
        Builtin::If => unreachable!("if is evaluated before its arguments"),
        Builtin::Abs => match &args[0] {
            Value::Int(n) => n.checked_abs().map(Value::Int).ok_or_else(|| {
                EvalError::Arithmetic {
                    message: "numeric overflow in 'abs'".to_string(),
                }
            }),
            Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
            other => Err(type_error("abs", "a number", other)),
        },
        Builtin::Min => fold_extreme(args, Ordering::Less),
        Builtin::Max => fold_extreme(args, Ordering::Greater),
        Builtin::Sum => sum_list(&args[0]),
        Builtin::Size => match &args[0] {
            Value::List(items) => Ok(Value::Int(items.len() as i64)),
            Value::Map(map) => Ok(Value::Int(map.len() as i64)),
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            other => Err(type_error("size", "a list, map, or string", other)),
        },
        Builtin::Head => {
            let items = args[0].as_list()?;
            Ok(items.first().cloned().unwrap_or(Value::Null))
        }
    }
}

fn type_error(func: &str, expected: &str, got: &Value) -> EvalError {
    EvalError::Type {
        message: format!("{}: expected {}, got {}", func, expected, got.type_name()),
    }
}

/// `min`/`max` over either the argument list or a single list argument.
/// Ties keep the earliest operand; the empty list yields null.
fn fold_extreme(args: &[Value], keep: Ordering) -> Result<Value, EvalError> {
    let operands: &[Value] = match args {
        [Value::List(items)] => items,
        _ => args,
    };
    let mut best: Option<&Value> = None;
    for v in operands {
        best = Some(match best {
            Some(b) if v.cmp(b) == keep => v,
            Some(b) => b,
            None => v,
        });
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

fn sum_list(arg: &Value) -> Result<Value, EvalError> {
    let overflow = || EvalError::Arithmetic {
        message: "numeric overflow in 'sum'".to_string(),
    };
    let mut acc = Value::Int(0);
    for v in arg.as_list()? {
        acc = match (&acc, v) {
            (Value::Int(a), Value::Int(b)) => {
                Value::Int(a.checked_add(*b).ok_or_else(overflow)?)
            }
            (_, Value::Int(_) | Value::Decimal(_)) => Value::Decimal(
                acc.as_decimal()?
                    .checked_add(v.as_decimal()?)
                    .ok_or_else(overflow)?,
            ),
            (_, other) => return Err(type_error("sum", "a list of numbers", other)),
        };
    }
    Ok(acc)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::formula::Formula;
    use crate::functions::{FunctionTable, MoveFn};
    use crate::host::{HostHandle, UnitView};

    fn eval(src: &str) -> Value {
        eval_in(src, &Context::root())
    }

    fn eval_in(src: &str, ctx: &Context<'_>) -> Value {
        let table = FunctionTable::standard();
        Formula::compile(src, &table).unwrap().eval(ctx).unwrap()
    }

    fn eval_err(src: &str) -> EvalError {
        let table = FunctionTable::standard();
        Formula::compile(src, &table)
            .unwrap()
            .eval(&Context::root())
            .unwrap_err()
    }

    #[test]
    fn arithmetic_with_precedence() {
        assert_eq!(eval("2 + 3 * 4"), Value::Int(14));
        assert_eq!(eval("(2 + 3) * 4"), Value::Int(20));
        assert_eq!(eval("10 % 4"), Value::Int(2));
        assert_eq!(eval("-3 + 1"), Value::Int(-2));
    }

    #[test]
    fn integer_division_truncates() {
        assert_eq!(eval("7 / 2"), Value::Int(3));
        assert_eq!(eval("-7 / 2"), Value::Int(-3));
    }

    #[test]
    fn decimal_contaminates_integer_arithmetic() {
        assert_eq!(eval("1 + 0.5"), Value::Decimal("1.5".parse().unwrap()));
        assert_eq!(eval("5 / 2.0"), Value::Decimal("2.5".parse().unwrap()));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(eval_err("1 / 0").to_string(), "arithmetic error: division by zero");
        assert_eq!(eval_err("1 % 0").to_string(), "arithmetic error: division by zero");
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        assert_eq!(eval("1 < 2"), Value::Int(1));
        assert_eq!(eval("2 < 1"), Value::Int(0));
        assert_eq!(eval("2 = 2.0"), Value::Int(1));
        assert_eq!(eval("'a' != 'b'"), Value::Int(1));
        assert_eq!(eval("3 >= 3"), Value::Int(1));
    }

    #[test]
    fn and_or_return_the_deciding_operand() {
        assert_eq!(eval("0 or 'x'"), Value::Str("x".to_string()));
        assert_eq!(eval("5 or 'x'"), Value::Int(5));
        assert_eq!(eval("0 and 'x'"), Value::Int(0));
        assert_eq!(eval("5 and []"), Value::List(vec![]));
    }

    #[test]
    fn and_or_short_circuit() {
        assert_eq!(eval("1 or 1 / 0"), Value::Int(1));
        assert_eq!(eval("0 and 1 / 0"), Value::Int(0));
    }

    #[test]
    fn if_evaluates_only_the_taken_branch() {
        assert_eq!(eval("if(1, 2, 1 / 0)"), Value::Int(2));
        assert_eq!(eval("if(0, 1 / 0, 3)"), Value::Int(3));
    }

    #[test]
    fn where_introduces_bindings() {
        assert_eq!(eval("x + y where x = 2, y = 3"), Value::Int(5));
    }

    #[test]
    fn where_shadows_the_outer_scope() {
        let mut ctx = Context::root();
        ctx.set("x", Value::Int(1));
        assert_eq!(eval_in("x where x = 9", &ctx), Value::Int(9));
        assert_eq!(ctx.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn where_bindings_do_not_see_each_other() {
        let mut ctx = Context::root();
        ctx.set("x", Value::Int(10));
        assert_eq!(eval_in("y where x = 1, y = x", &ctx), Value::Int(10));
    }

    #[test]
    fn unknown_identifier_reports_the_name() {
        assert_eq!(
            eval_err("nonesuch + 1").to_string(),
            "no binding named 'nonesuch' in scope"
        );
    }

    #[test]
    fn member_access_on_handles() {
        let mut ctx = Context::root();
        ctx.set(
            "me",
            Value::Callable(HostHandle::Unit(UnitView {
                id: 7,
                name: "grunt".to_string(),
                side: 2,
                loc: crate::host::Location::new(3, 4),
                hitpoints: 24,
                max_hitpoints: 38,
                movement_left: 5,
                max_movement: 5,
                level: 1,
            })),
        );
        assert_eq!(eval_in("me.hitpoints", &ctx), Value::Int(24));
        assert_eq!(eval_in("me.loc.x", &ctx), Value::Int(3));
        let table = FunctionTable::standard();
        let err = Formula::compile("me.armour", &table)
            .unwrap()
            .eval(&ctx)
            .unwrap_err();
        assert_eq!(err.to_string(), "unit has no member 'armour'");
    }

    #[test]
    fn list_index_is_bounds_checked() {
        assert_eq!(eval("[10, 20, 30][1]"), Value::Int(20));
        assert_eq!(
            eval_err("[10][3]").to_string(),
            "index 3 out of bounds for list of length 1"
        );
        assert_eq!(
            eval_err("[10][-1]").to_string(),
            "index -1 out of bounds for list of length 1"
        );
    }

    #[test]
    fn map_member_errs_but_map_index_is_null() {
        let mut ctx = Context::root();
        let mut m = std::collections::BTreeMap::new();
        m.insert("a".to_string(), Value::Int(1));
        ctx.set("m", Value::Map(m));
        assert_eq!(eval_in("m.a", &ctx), Value::Int(1));
        assert_eq!(eval_in("m['nope']", &ctx), Value::Null);
        let table = FunctionTable::standard();
        let err = Formula::compile("m.nope", &table)
            .unwrap()
            .eval(&ctx)
            .unwrap_err();
        assert_eq!(err.to_string(), "Map has no member 'nope'");
    }

    #[test]
    fn min_max_over_varargs_and_lists() {
        assert_eq!(eval("min(3, 1, 2)"), Value::Int(1));
        assert_eq!(eval("max([3, 1, 2])"), Value::Int(3));
        assert_eq!(eval("min([])"), Value::Null);
        assert_eq!(eval("max(2, 2.5)"), Value::Decimal("2.5".parse().unwrap()));
    }

    #[test]
    fn sum_promotes_when_decimals_appear() {
        assert_eq!(eval("sum([1, 2, 3])"), Value::Int(6));
        assert_eq!(eval("sum([])"), Value::Int(0));
        assert_eq!(eval("sum([1, 0.5])"), Value::Decimal("1.5".parse().unwrap()));
    }

    #[test]
    fn head_and_size() {
        assert_eq!(eval("head([7, 8])"), Value::Int(7));
        assert_eq!(eval("head([])"), Value::Null);
        assert_eq!(eval("size([1, 2, 3])"), Value::Int(3));
        assert_eq!(eval("size('abc')"), Value::Int(3));
    }

    #[test]
    fn size_counts_map_entries() {
        let mut ctx = Context::root();
        let mut m = std::collections::BTreeMap::new();
        m.insert("a".to_string(), Value::Int(1));
        m.insert("b".to_string(), Value::Int(2));
        ctx.set("m", Value::Map(m));
        assert_eq!(eval_in("size(m)", &ctx), Value::Int(2));
        assert_eq!(
            eval_err("size(7)").to_string(),
            "type error: size: expected a list, map, or string, got Int"
        );
    }

    #[test]
    fn abs_overflow_is_reported() {
        let mut ctx = Context::root();
        ctx.set("n", Value::Int(i64::MIN));
        let table = FunctionTable::standard();
        let err = Formula::compile("abs(n)", &table)
            .unwrap()
            .eval(&ctx)
            .unwrap_err();
        assert_eq!(err.to_string(), "arithmetic error: numeric overflow in 'abs'");
    }

    #[test]
    fn move_calls_bind_parameters() {
        let mut table = FunctionTable::standard();
        let body = Arc::new(Formula::compile("x * 2 + y", &table).unwrap());
        table.register_move(
            "weigh",
            MoveFn {
                params: vec!["x".to_string(), "y".to_string()],
                body,
            },
        );
        let f = Formula::compile("weigh(20, 2)", &table).unwrap();
        assert_eq!(f.eval(&Context::root()).unwrap(), Value::Int(42));
    }
}
