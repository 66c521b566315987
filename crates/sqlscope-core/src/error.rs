//! Error types for SQL parsing.
//!
//! Parsing is the only stage with a structured error type; everything past
//! the parser reports through [`crate::types::Issue`] values so analysis can
//! keep going with partial data. `ParseError` itself never escapes
//! `analyze` either — the driver converts it into a `PARSE_ERROR` issue with
//! a span and moves on to the next statement chunk.

use crate::types::Dialect;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Error encountered while parsing one SQL statement.
///
/// Preserves the position information the underlying parser reports so the
/// driver can anchor the resulting issue to a source span.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Human-readable error message.
    pub message: String,
    /// Position where the error occurred, if the parser reported one.
    pub position: Option<Position>,
    /// The SQL dialect being parsed when the error occurred.
    pub dialect: Option<Dialect>,
}

/// Position information for a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
            dialect: None,
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Parses position from sqlparser's error message format.
    ///
    /// sqlparser reports "Expected ..., found ... at Line: X, Column: Y".
    /// Coupled to that message format; returns `None` when it is absent.
    fn parse_position_from_message(message: &str) -> Option<Position> {
        static POSITION_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = POSITION_REGEX.get_or_init(|| {
            Regex::new(r"Line:\s*(\d+)\s*,\s*Column:\s*(\d+)").expect("valid position pattern")
        });

        re.captures(message).and_then(|caps| {
            let line: usize = caps.get(1)?.as_str().parse().ok()?;
            let column: usize = caps.get(2)?.as_str().parse().ok()?;
            Some(Position { line, column })
        })
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error")?;

        if let Some(dialect) = self.dialect {
            write!(f, " ({dialect:?})")?;
        }

        if let Some(pos) = self.position {
            write!(f, " at line {}, column {}", pos.line, pos.column)?;
        }

        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        let message = err.to_string();
        let position = Self::parse_position_from_message(&message);

        Self {
            message,
            position,
            dialect: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_position_from_message() {
        let msg = "Expected SELECT, found 'INSERT' at Line: 1, Column: 5";
        let pos = ParseError::parse_position_from_message(msg);
        assert_eq!(pos, Some(Position { line: 1, column: 5 }));
    }

    #[test]
    fn missing_position_yields_none() {
        assert_eq!(
            ParseError::parse_position_from_message("Unexpected token"),
            None
        );
    }

    #[test]
    fn position_without_whitespace() {
        let pos = ParseError::parse_position_from_message("Error at Line:1,Column:5");
        assert_eq!(pos, Some(Position { line: 1, column: 5 }));
    }

    #[test]
    fn malformed_positions_rejected() {
        assert_eq!(
            ParseError::parse_position_from_message("Error at Line: abc, Column: 5"),
            None
        );
        assert_eq!(
            ParseError::parse_position_from_message("Error at Line: 5"),
            None
        );
        assert_eq!(
            ParseError::parse_position_from_message("Error at Column: 5, Line: 1"),
            None
        );
    }

    #[test]
    fn display_includes_dialect_and_position() {
        let err = ParseError {
            message: "Bad syntax".to_string(),
            position: Some(Position { line: 1, column: 5 }),
            dialect: Some(Dialect::Snowflake),
        };
        assert_eq!(
            err.to_string(),
            "Parse error (Snowflake) at line 1, column 5: Bad syntax"
        );
    }
}
