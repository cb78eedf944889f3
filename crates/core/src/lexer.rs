use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords -- distinguished in the parser
    Word(String),
    /// Single-quoted string literal (content without quotes, escapes resolved)
    Str(String),
    /// Integer literal
    Int(i64),
    /// Decimal literal -- kept as text so no precision is lost before compile
    Dec(String),
    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    // Arithmetic operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    // Comparison operators
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    // End of input
    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
    pub column: u32,
}

/// Lex formula source into a token stream ending in `Eof`.
///
/// `-` is always the operator token; negative literals are built in the
/// parser so that `a-1` lexes as a subtraction.
pub fn lex(src: &str) -> Result<Vec<Spanned>, ParseError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0usize;
    let mut line: u32 = 1;
    let mut col: u32 = 1;

    while pos < chars.len() {
        let c = chars[pos];

        // Whitespace
        if c.is_whitespace() {
            if c == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
            pos += 1;
            continue;
        }

        let tok_line = line;
        let tok_col = col;

        // String literal
        if c == '\'' {
            pos += 1;
            col += 1;
            let mut s = String::new();
            loop {
                if pos >= chars.len() {
                    return Err(ParseError::at(
                        tok_line,
                        tok_col,
                        "unterminated string literal",
                    ));
                }
                let sc = chars[pos];
                if sc == '\'' {
                    pos += 1;
                    col += 1;
                    break;
                }
                if sc == '\n' {
                    return Err(ParseError::at(
                        tok_line,
                        tok_col,
                        "unterminated string literal",
                    ));
                }
                if sc == '\\' {
                    pos += 1;
                    col += 1;
                    if pos >= chars.len() {
                        return Err(ParseError::at(
                            tok_line,
                            tok_col,
                            "unterminated escape in string",
                        ));
                    }
                    match chars[pos] {
                        '\'' => s.push('\''),
                        '\\' => s.push('\\'),
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        other => {
                            s.push('\\');
                            s.push(other);
                        }
                    }
                    pos += 1;
                    col += 1;
                    continue;
                }
                s.push(sc);
                pos += 1;
                col += 1;
            }
            tokens.push(Spanned {
                token: Token::Str(s),
                line: tok_line,
                column: tok_col,
            });
            continue;
        }

        // Number
        if c.is_ascii_digit() {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos < chars.len()
                && chars[pos] == '.'
                && pos + 1 < chars.len()
                && chars[pos + 1].is_ascii_digit()
            {
                pos += 1; // consume '.'
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
                let s: String = chars[start..pos].iter().collect();
                col += (pos - start) as u32;
                tokens.push(Spanned {
                    token: Token::Dec(s),
                    line: tok_line,
                    column: tok_col,
                });
            } else {
                let s: String = chars[start..pos].iter().collect();
                col += (pos - start) as u32;
                let n: i64 = s.parse().map_err(|_| {
                    ParseError::at(
                        tok_line,
                        tok_col,
                        format!("integer literal '{}' out of range", s),
                    )
                })?;
                tokens.push(Spanned {
                    token: Token::Int(n),
                    line: tok_line,
                    column: tok_col,
                });
            }
            continue;
        }

        // Identifier / keyword
        if c.is_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            col += (pos - start) as u32;
            tokens.push(Spanned {
                token: Token::Word(word),
                line: tok_line,
                column: tok_col,
            });
            continue;
        }

        // Operators and punctuation
        let next = if pos + 1 < chars.len() {
            Some(chars[pos + 1])
        } else {
            None
        };
        let (token, width) = match c {
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            ',' => (Token::Comma, 1),
            '.' => (Token::Dot, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' => (Token::Star, 1),
            '/' => (Token::Slash, 1),
            '%' => (Token::Percent, 1),
            '=' => (Token::Eq, 1),
            '<' if next == Some('=') => (Token::Lte, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::Gte, 2),
            '>' => (Token::Gt, 1),
            '!' if next == Some('=') => (Token::Neq, 2),
            _ => {
                return Err(ParseError::at(
                    tok_line,
                    tok_col,
                    format!("unexpected character '{}'", c),
                ));
            }
        };
        tokens.push(Spanned {
            token,
            line: tok_line,
            column: tok_col,
        });
        pos += width;
        col += width as u32;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
        column: col,
    });
    Ok(tokens)
}
