use serde::{Deserialize, Serialize};
use std::fmt;

/// A formula parse error carrying the source position of the offending
/// token. Positions are 1-based line and column within the formula text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl ParseError {
    pub fn at(line: u32, column: u32, message: impl Into<String>) -> Self {
        ParseError {
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parse error at {}:{}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position() {
        let e = ParseError::at(1, 7, "unexpected character '@'");
        assert_eq!(e.to_string(), "parse error at 1:7: unexpected character '@'");
    }

    #[test]
    fn serializes_to_flat_json() {
        let e = ParseError::at(2, 3, "boom");
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["line"], 2);
        assert_eq!(v["column"], 3);
        assert_eq!(v["message"], "boom");
    }
}
