//! Recursive-descent parser for the formula language.
//!
//! Precedence, loosest to tightest:
//! `where`, `or`, `and`, `not`, comparison, `+ -`, `* / %`, unary `-`,
//! postfix (`.field`, `[index]`), atoms. Comparison is non-associative:
//! `a = b = c` is a parse error at the second `=`.
//!
//! A `where` clause binds as far right as it can. After a binding, a comma
//! continues the binding list only when it is followed by `name =`;
//! otherwise the comma belongs to the surrounding call or list.

use crate::ast::{BinOp, Expr};
use crate::error::ParseError;
use crate::lexer::{lex, Spanned, Token};

const KEYWORDS: [&str; 4] = ["where", "and", "or", "not"];

/// Parse one formula. The whole input must be a single expression.
pub fn parse_formula(src: &str) -> Result<Expr, ParseError> {
    let tokens = lex(src)?;
    let mut parser = Parser::new(&tokens);
    let expr = parser.parse_expr()?;
    if parser.peek() != &Token::Eof {
        return Err(parser.err(format!("unexpected {:?} after expression", parser.peek())));
    }
    Ok(expr)
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let i = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[i].token
    }

    fn cur_line(&self) -> u32 {
        self.cur().line
    }

    fn cur_column(&self) -> u32 {
        self.cur().column
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError::at(self.cur_line(), self.cur_column(), msg)
    }

    fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Token::Word(x) if x == w)
    }

    fn take_word(&mut self) -> Result<String, ParseError> {
        if let Token::Word(w) = self.peek().clone() {
            self.advance();
            Ok(w)
        } else {
            Err(self.err(format!("expected identifier, got {:?}", self.peek())))
        }
    }

    fn expect_rparen(&mut self) -> Result<(), ParseError> {
        if self.peek() == &Token::RParen {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected ')', got {:?}", self.peek())))
        }
    }

    fn expect_rbracket(&mut self) -> Result<(), ParseError> {
        if self.peek() == &Token::RBracket {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected ']', got {:?}", self.peek())))
        }
    }

    // -- Expression grammar -------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_where()
    }

    fn parse_where(&mut self) -> Result<Expr, ParseError> {
        let body = self.parse_or_expr()?;
        if !self.is_word("where") {
            return Ok(body);
        }
        self.advance();
        let mut bindings = Vec::new();
        loop {
            let name = self.take_word()?;
            if KEYWORDS.contains(&name.as_str()) {
                return Err(self.err(format!("cannot bind keyword '{}'", name)));
            }
            if self.peek() != &Token::Eq {
                return Err(self.err(format!("expected '=' after binding name '{}'", name)));
            }
            self.advance();
            let value = self.parse_or_expr()?;
            bindings.push((name, value));
            if self.peek() == &Token::Comma && self.binding_follows() {
                self.advance();
                continue;
            }
            break;
        }
        Ok(Expr::Where {
            body: Box::new(body),
            bindings,
        })
    }

    /// After a binding and a comma: does `name =` follow?
    fn binding_follows(&self) -> bool {
        matches!(self.peek_at(1), Token::Word(w) if !KEYWORDS.contains(&w.as_str()))
            && self.peek_at(2) == &Token::Eq
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;
        while self.is_word("or") {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not_expr()?;
        while self.is_word("and") {
            self.advance();
            let right = self.parse_not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.is_word("not") {
            self.advance();
            let e = self.parse_not_expr()?;
            return Ok(Expr::Not(Box::new(e)));
        }
        self.parse_cmp_expr()
    }

    fn parse_cmp_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_add_expr()?;
        let op = match self.peek() {
            Token::Eq => BinOp::Eq,
            Token::Neq => BinOp::Neq,
            Token::Lt => BinOp::Lt,
            Token::Lte => BinOp::Lte,
            Token::Gt => BinOp::Gt,
            Token::Gte => BinOp::Gte,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_add_expr()?;
        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_mul_expr()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_mul_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == &Token::Minus {
            self.advance();
            let e = self.parse_unary_expr()?;
            return Ok(Expr::Neg(Box::new(e)));
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut e = self.parse_atom()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let field = self.take_word()?;
                    e = Expr::Member {
                        object: Box::new(e),
                        field,
                    };
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect_rbracket()?;
                    e = Expr::Index {
                        object: Box::new(e),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(e),
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Token::Int(n) => {
                self.advance();
                Ok(Expr::Int(n))
            }
            Token::Dec(d) => {
                let line = self.cur_line();
                let column = self.cur_column();
                self.advance();
                Ok(Expr::Decimal {
                    text: d,
                    line,
                    column,
                })
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::LParen => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect_rparen()?;
                Ok(e)
            }
            Token::LBracket => {
                self.advance();
                let items = self.parse_list_items()?;
                Ok(Expr::List(items))
            }
            Token::Word(w) => {
                if KEYWORDS.contains(&w.as_str()) {
                    return Err(self.err(format!("unexpected keyword '{}'", w)));
                }
                let line = self.cur_line();
                let column = self.cur_column();
                self.advance();
                if self.peek() == &Token::LParen {
                    self.advance();
                    let args = self.parse_call_args()?;
                    Ok(Expr::Call {
                        name: w,
                        args,
                        line,
                        column,
                    })
                } else {
                    Ok(Expr::Ident(w))
                }
            }
            other => Err(self.err(format!("expected expression, got {:?}", other))),
        }
    }

    /// Consumes through the closing ')'.
    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.peek() == &Token::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.peek() == &Token::Comma {
                self.advance();
                continue;
            }
            self.expect_rparen()?;
            return Ok(args);
        }
    }

    /// Consumes through the closing ']'.
    fn parse_list_items(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        if self.peek() == &Token::RBracket {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.parse_expr()?);
            if self.peek() == &Token::Comma {
                self.advance();
                continue;
            }
            self.expect_rbracket()?;
            return Ok(items);
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn precedence_mul_over_add() {
        let e = parse_formula("1 + 2 * 3").unwrap();
        assert_eq!(
            e,
            binary(
                BinOp::Add,
                Expr::Int(1),
                binary(BinOp::Mul, Expr::Int(2), Expr::Int(3))
            )
        );
    }

    #[test]
    fn precedence_cmp_over_and() {
        let e = parse_formula("a = 1 and b = 2").unwrap();
        assert_eq!(
            e,
            Expr::And(
                Box::new(binary(BinOp::Eq, ident("a"), Expr::Int(1))),
                Box::new(binary(BinOp::Eq, ident("b"), Expr::Int(2))),
            )
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let e = parse_formula("a or b and c").unwrap();
        assert_eq!(
            e,
            Expr::Or(
                Box::new(ident("a")),
                Box::new(Expr::And(Box::new(ident("b")), Box::new(ident("c")))),
            )
        );
    }

    #[test]
    fn comparison_is_non_associative() {
        let err = parse_formula("1 = 2 = 3").unwrap_err();
        assert_eq!(err.column, 7);
    }

    #[test]
    fn unary_minus_nests() {
        let e = parse_formula("--3").unwrap();
        assert_eq!(e, Expr::Neg(Box::new(Expr::Neg(Box::new(Expr::Int(3))))));
    }

    #[test]
    fn not_applies_to_comparison() {
        let e = parse_formula("not a = 1").unwrap();
        assert_eq!(
            e,
            Expr::Not(Box::new(binary(BinOp::Eq, ident("a"), Expr::Int(1))))
        );
    }

    #[test]
    fn member_and_index_chain() {
        let e = parse_formula("me.loc.x").unwrap();
        assert_eq!(
            e,
            Expr::Member {
                object: Box::new(Expr::Member {
                    object: Box::new(ident("me")),
                    field: "loc".to_string(),
                }),
                field: "x".to_string(),
            }
        );
        let e = parse_formula("units[0]").unwrap();
        assert_eq!(
            e,
            Expr::Index {
                object: Box::new(ident("units")),
                index: Box::new(Expr::Int(0)),
            }
        );
    }

    #[test]
    fn call_with_args_carries_position() {
        let e = parse_formula("  min(1, 2)").unwrap();
        match e {
            Expr::Call {
                name,
                args,
                line,
                column,
            } => {
                assert_eq!(name, "min");
                assert_eq!(args.len(), 2);
                assert_eq!((line, column), (1, 3));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn empty_call_and_empty_list() {
        assert_eq!(
            parse_formula("f()").unwrap(),
            Expr::Call {
                name: "f".to_string(),
                args: vec![],
                line: 1,
                column: 1,
            }
        );
        assert_eq!(parse_formula("[]").unwrap(), Expr::List(vec![]));
    }

    #[test]
    fn where_binds_body_and_values() {
        let e = parse_formula("x + y where x = 1, y = 2").unwrap();
        match e {
            Expr::Where { body, bindings } => {
                assert_eq!(*body, binary(BinOp::Add, ident("x"), ident("y")));
                assert_eq!(bindings.len(), 2);
                assert_eq!(bindings[0].0, "x");
                assert_eq!(bindings[1].0, "y");
            }
            other => panic!("expected where, got {:?}", other),
        }
    }

    #[test]
    fn where_inside_call_needs_binding_lookahead() {
        // the second comma argument is not `name =`, so it ends the bindings
        let e = parse_formula("max(a where a = 1, 5)").unwrap();
        match e {
            Expr::Call { name, args, .. } => {
                assert_eq!(name, "max");
                assert_eq!(args.len(), 2);
                assert!(matches!(args[0], Expr::Where { .. }));
                assert_eq!(args[1], Expr::Int(5));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn keyword_is_not_an_expression() {
        let err = parse_formula("1 + where").unwrap_err();
        assert!(err.message.contains("unexpected keyword"));
    }

    #[test]
    fn trailing_tokens_rejected() {
        let err = parse_formula("1 2").unwrap_err();
        assert!(err.message.contains("after expression"));
        assert_eq!(err.column, 3);
    }

    #[test]
    fn decimal_literal_survives_as_text() {
        assert_eq!(
            parse_formula("0.25").unwrap(),
            Expr::Decimal {
                text: "0.25".to_string(),
                line: 1,
                column: 1,
            }
        );
    }
}
