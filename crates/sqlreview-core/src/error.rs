//! Error types for parsing, configuration, and rule execution.
//!
//! # Error Handling Strategy
//!
//! Only configuration problems surface as `Err` from the review entry point:
//!
//! - [`AdvisorError`]: a rule payload, naming template, or review config is
//!   unusable. The review stops before any rule runs.
//!
//! Everything else degrades into the advice stream or a side-channel:
//!
//! - [`ParseError`]: the script does not parse. The review returns a single
//!   syntax-error advice instead of an error.
//! - [`RuleError`]: a rule failed on one node. The dispatcher records it as a
//!   [`crate::advisor::RuleFailure`] and keeps walking.
//! - [`DriverError`]: a live `EXPLAIN` failed. The rule turns it into an
//!   error-level advice.

use crate::types::{Engine, Position, RuleType};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
#[cfg(feature = "tracing")]
use tracing::trace;

/// Error encountered while tokenizing or parsing a statement.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Human-readable error message.
    pub message: String,
    /// Position of the error, if the parser reported one.
    pub position: Option<Position>,
    /// The engine whose dialect was used.
    pub engine: Option<Engine>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
            engine: None,
        }
    }

    pub fn with_position(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            position: Some(Position { line, column }),
            engine: None,
        }
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Moves a statement-relative position into script coordinates.
    ///
    /// `base_line` is the number of script lines before the statement and
    /// `first_column` is the column the statement starts at on its first line.
    pub fn relocate(mut self, base_line: usize, first_column: usize) -> Self {
        if let Some(pos) = self.position.as_mut() {
            if pos.line == 1 {
                pos.column += first_column.saturating_sub(1);
            }
            pos.line += base_line;
        }
        self
    }

    /// Parses position from sqlparser error message format.
    ///
    /// sqlparser uses format like "Expected ..., found ... at Line: X, Column: Y".
    /// This is coupled to the `sqlparser` message format and returns `None`
    /// when the format is not found.
    fn parse_position_from_message(message: &str) -> Option<Position> {
        static POSITION_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = POSITION_REGEX.get_or_init(|| {
            Regex::new(r"Line:\s*(\d+)\s*,\s*Column:\s*(\d+)").expect("Invalid regex pattern")
        });

        let result = re.captures(message).and_then(|caps| {
            let line: usize = caps.get(1)?.as_str().parse().ok()?;
            let column: usize = caps.get(2)?.as_str().parse().ok()?;
            Some(Position { line, column })
        });

        #[cfg(feature = "tracing")]
        if result.is_none() && (message.contains("Line") || message.contains("Column")) {
            trace!(
                "Failed to parse position from error message that appears to contain position info: {}",
                message
            );
        }

        result
    }

    fn from_message(message: String) -> Self {
        let position = Self::parse_position_from_message(&message);
        Self {
            message,
            position,
            engine: None,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error")?;

        if let Some(engine) = self.engine {
            write!(f, " ({engine})")?;
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
        Self::from_message(err.to_string())
    }
}

impl From<sqlparser::tokenizer::TokenizerError> for ParseError {
    fn from(err: sqlparser::tokenizer::TokenizerError) -> Self {
        Self::from_message(err.to_string())
    }
}

/// A review configuration that cannot be turned into runnable rules.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("invalid review config: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    #[error("rule {rule} requires a payload")]
    MissingPayload { rule: RuleType },

    #[error("invalid payload for rule {rule}: {reason}")]
    InvalidPayload { rule: RuleType, reason: String },

    #[error("invalid naming template for rule {rule}: {reason}")]
    InvalidTemplate { rule: RuleType, reason: String },

    #[error("invalid regular expression for rule {rule}: {source}")]
    InvalidRegex {
        rule: RuleType,
        #[source]
        source: regex::Error,
    },
}

/// A rule could not process one node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("node {kind} carries an unexpected payload")]
    UnexpectedNode { kind: &'static str },

    #[error("{0}")]
    Check(String),
}

/// A live database query issued on behalf of a rule failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("{0}")]
    Query(String),
}

/// A catalog snapshot could not be loaded.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid catalog snapshot: {0}")]
    InvalidSnapshot(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position_from_message() {
        let msg = "Expected SELECT, found 'INSERT' at Line: 1, Column: 5";
        let pos = ParseError::parse_position_from_message(msg);
        assert_eq!(pos, Some(Position { line: 1, column: 5 }));
    }

    #[test]
    fn test_parse_position_no_position() {
        assert_eq!(ParseError::parse_position_from_message("Unexpected token"), None);
    }

    #[test]
    fn test_parse_position_no_whitespace() {
        let pos = ParseError::parse_position_from_message("Error at Line:1,Column:5");
        assert_eq!(pos, Some(Position { line: 1, column: 5 }));
    }

    #[test]
    fn test_parse_position_reversed_order() {
        let pos = ParseError::parse_position_from_message("Error at Column: 5, Line: 1");
        assert_eq!(pos, None);
    }

    #[test]
    fn test_relocate_first_line_shifts_column() {
        let err = ParseError::with_position("bad", 1, 4).relocate(9, 3);
        assert_eq!(err.position, Some(Position { line: 10, column: 6 }));
    }

    #[test]
    fn test_relocate_later_line_keeps_column() {
        let err = ParseError::with_position("bad", 2, 4).relocate(9, 3);
        assert_eq!(err.position, Some(Position { line: 11, column: 4 }));
    }

    #[test]
    fn test_display_with_engine_and_position() {
        let err = ParseError::with_position("Bad syntax", 1, 5).with_engine(Engine::Postgres);
        assert_eq!(
            err.to_string(),
            "Parse error (POSTGRES) at line 1, column 5: Bad syntax"
        );
    }

    #[test]
    fn test_advisor_error_messages() {
        let err = AdvisorError::InvalidPayload {
            rule: RuleType::NamingTable,
            reason: "missing field `format`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid payload for rule naming.table: missing field `format`"
        );
    }
}
