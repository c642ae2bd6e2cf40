//! Advice records produced by a review run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Outcome level of a single advice entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdviceStatus {
    Success,
    Warning,
    Error,
}

/// A 1-based line/column position in the reviewed script.
///
/// A column of 0 means the advice applies to the whole line.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed, 0 when unknown).
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn line(line: usize) -> Self {
        Self { line, column: 0 }
    }
}

/// A single diagnostic finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Advice {
    /// Severity of the finding.
    pub status: AdviceStatus,

    /// Machine-readable advice code (see [`advice_codes`]).
    pub code: i32,

    /// Short title, usually the rule type that produced the advice.
    pub title: String,

    /// Human-readable description of the finding.
    pub content: String,

    /// Location of the finding in the reviewed script.
    pub position: Position,
}

impl Advice {
    pub fn new(
        status: AdviceStatus,
        code: i32,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code,
            title: title.into(),
            content: content.into(),
            position: Position::default(),
        }
    }

    pub fn error(code: i32, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(AdviceStatus::Error, code, title, content)
    }

    pub fn warning(code: i32, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(AdviceStatus::Warning, code, title, content)
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.position.line = line;
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

/// Machine-readable advice codes.
///
/// The numbering is grouped by area: 1xx compatibility, 2xx statement,
/// 3xx naming, 4xx column, 5xx engine, 6xx table, 7xx database, 8xx index,
/// 10xx charset, 11xx insert/update/delete, 12xx collation, 13xx comments.
pub mod advice_codes {
    pub const OK: i32 = 0;
    pub const INTERNAL: i32 = 1;

    // Compatibility
    pub const COMPATIBILITY_DROP_DATABASE: i32 = 101;
    pub const COMPATIBILITY_RENAME_TABLE: i32 = 102;
    pub const COMPATIBILITY_DROP_TABLE: i32 = 103;
    pub const COMPATIBILITY_RENAME_COLUMN: i32 = 104;
    pub const COMPATIBILITY_DROP_COLUMN: i32 = 105;
    pub const COMPATIBILITY_ADD_PRIMARY_KEY: i32 = 106;
    pub const COMPATIBILITY_ADD_UNIQUE_KEY: i32 = 107;
    pub const COMPATIBILITY_ADD_FOREIGN_KEY: i32 = 108;
    pub const COMPATIBILITY_ADD_CHECK: i32 = 109;
    pub const COMPATIBILITY_ALTER_CHECK: i32 = 110;
    pub const COMPATIBILITY_ALTER_COLUMN: i32 = 111;
    pub const COMPATIBILITY_DROP_SCHEMA: i32 = 112;

    // Statement
    pub const STATEMENT_SYNTAX_ERROR: i32 = 201;
    pub const STATEMENT_NO_WHERE: i32 = 202;
    pub const STATEMENT_SELECT_ALL: i32 = 203;
    pub const STATEMENT_LEADING_WILDCARD_LIKE: i32 = 204;
    pub const STATEMENT_CREATE_TABLE_AS: i32 = 205;
    pub const STATEMENT_DISALLOW_COMMIT: i32 = 206;
    pub const STATEMENT_REDUNDANT_ALTER_TABLE: i32 = 207;
    pub const STATEMENT_DML_DRY_RUN_FAILED: i32 = 208;
    pub const STATEMENT_AFFECTED_ROW_EXCEEDS_LIMIT: i32 = 209;
    pub const STATEMENT_ADD_COLUMN_WITH_DEFAULT: i32 = 210;
    pub const STATEMENT_ADD_CHECK_WITH_VALIDATION: i32 = 211;
    pub const STATEMENT_ADD_NOT_NULL: i32 = 212;
    pub const STATEMENT_DISALLOW_CASCADE: i32 = 213;
    pub const STATEMENT_CREATE_WITHOUT_SCHEMA_NAME: i32 = 216;
    pub const STATEMENT_EXPLAIN_QUERY_FAILED: i32 = 218;
    pub const STATEMENT_WHERE_NO_EQUAL_NULL: i32 = 221;
    pub const STATEMENT_MAXIMUM_JOIN_TABLE_COUNT: i32 = 223;
    pub const STATEMENT_WHERE_MAXIMUM_LOGICAL_OPERATOR_COUNT: i32 = 225;
    pub const STATEMENT_DISALLOW_MIX_DDL_DML: i32 = 227;
    pub const STATEMENT_ADD_FK_WITH_VALIDATION: i32 = 229;
    pub const STATEMENT_OBJECT_OWNER_CHECK: i32 = 238;

    // Naming
    pub const NAMING_TABLE_CONVENTION_MISMATCH: i32 = 301;
    pub const NAMING_COLUMN_CONVENTION_MISMATCH: i32 = 302;
    pub const NAMING_INDEX_CONVENTION_MISMATCH: i32 = 303;
    pub const NAMING_UK_CONVENTION_MISMATCH: i32 = 304;
    pub const NAMING_FK_CONVENTION_MISMATCH: i32 = 305;
    pub const NAMING_PK_CONVENTION_MISMATCH: i32 = 306;
    pub const NAME_IS_KEYWORD_IDENTIFIER: i32 = 308;
    pub const NAMING_CASE_MISMATCH: i32 = 309;

    // Column
    pub const NO_REQUIRED_COLUMN: i32 = 401;
    pub const COLUMN_CANNOT_NULL: i32 = 402;
    pub const CHANGE_COLUMN_TYPE: i32 = 403;
    pub const NOT_NULL_COLUMN_WITH_NO_DEFAULT: i32 = 404;
    pub const COLUMN_NOT_EXISTS: i32 = 405;
    pub const USE_CHANGE_COLUMN_STATEMENT: i32 = 406;
    pub const AUTO_INCREMENT_COLUMN_NOT_INTEGER: i32 = 410;
    pub const DISABLED_COLUMN_TYPE: i32 = 411;
    pub const COLUMN_EXISTS: i32 = 412;
    pub const CHAR_LENGTH_EXCEEDS_LIMIT: i32 = 415;
    pub const NO_DEFAULT: i32 = 420;
    pub const VARCHAR_LENGTH_EXCEEDS_LIMIT: i32 = 422;

    // Engine
    pub const NOT_INNODB_ENGINE: i32 = 501;

    // Table
    pub const TABLE_NO_PK: i32 = 601;
    pub const TABLE_HAS_FK: i32 = 602;
    pub const TABLE_DROP_NAMING_CONVENTION_MISMATCH: i32 = 603;
    pub const TABLE_NOT_EXISTS: i32 = 604;
    pub const TABLE_EXISTS: i32 = 607;

    // Database
    pub const DATABASE_NOT_EMPTY: i32 = 701;

    // Index
    pub const INDEX_KEY_NUMBER_EXCEEDS_LIMIT: i32 = 802;
    pub const INDEX_PK_TYPE: i32 = 803;
    pub const INDEX_TYPE_NO_BLOB: i32 = 804;
    pub const DUPLICATE_COLUMN_IN_INDEX: i32 = 812;
    pub const INDEX_COUNT_EXCEEDS_LIMIT: i32 = 813;
    pub const CREATE_INDEX_UNCONCURRENTLY: i32 = 814;
    pub const INDEX_TYPE_NOT_ALLOWED: i32 = 816;

    // Charset
    pub const DISABLED_CHARSET: i32 = 1001;

    // Insert / update / delete
    pub const INSERT_TOO_MANY_ROWS: i32 = 1101;
    pub const UPDATE_USE_LIMIT: i32 = 1102;
    pub const INSERT_USE_LIMIT: i32 = 1103;
    pub const DELETE_USE_ORDER_BY: i32 = 1105;
    pub const DELETE_USE_LIMIT: i32 = 1106;
    pub const INSERT_NOT_SPECIFY_COLUMN: i32 = 1107;
    pub const INSERT_USE_ORDER_BY_RAND: i32 = 1108;

    // Collation
    pub const DISABLED_COLLATION: i32 = 1201;

    // Comment
    pub const COMMENT_TOO_LONG: i32 = 1301;
    pub const COMMENT_EMPTY: i32 = 1032;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advice_builder() {
        let advice = Advice::warning(advice_codes::STATEMENT_NO_WHERE, "statement.where.require", "x")
            .at_line(4);
        assert_eq!(advice.status, AdviceStatus::Warning);
        assert_eq!(advice.code, 202);
        assert_eq!(advice.position, Position::line(4));
    }

    #[test]
    fn test_advice_serializes_camel_case() {
        let advice = Advice::error(advice_codes::STATEMENT_SYNTAX_ERROR, "Syntax error", "bad")
            .with_position(Position::new(2, 7));
        let json = serde_json::to_value(&advice).unwrap();
        assert_eq!(json["status"], "ERROR");
        assert_eq!(json["code"], 201);
        assert_eq!(json["position"]["line"], 2);
        assert_eq!(json["position"]["column"], 7);
    }
}
