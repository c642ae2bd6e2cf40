//! Review configuration types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AdvisorError;

/// Database engine a script is reviewed against.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Engine {
    Mysql,
    Mariadb,
    Tidb,
    Postgres,
    Mssql,
    Snowflake,
}

impl Engine {
    pub const ALL: [Engine; 6] = [
        Engine::Mysql,
        Engine::Mariadb,
        Engine::Tidb,
        Engine::Postgres,
        Engine::Mssql,
        Engine::Snowflake,
    ];

    pub fn to_sqlparser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        use sqlparser::dialect::{MsSqlDialect, MySqlDialect, PostgreSqlDialect, SnowflakeDialect};
        match self {
            Self::Mysql | Self::Mariadb | Self::Tidb => Box::new(MySqlDialect {}),
            Self::Postgres => Box::new(PostgreSqlDialect {}),
            Self::Mssql => Box::new(MsSqlDialect {}),
            Self::Snowflake => Box::new(SnowflakeDialect {}),
        }
    }

    /// True for engines that speak the MySQL wire dialect.
    pub fn is_mysql_family(&self) -> bool {
        matches!(self, Self::Mysql | Self::Mariadb | Self::Tidb)
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mysql => "MYSQL",
            Self::Mariadb => "MARIADB",
            Self::Tidb => "TIDB",
            Self::Postgres => "POSTGRES",
            Self::Mssql => "MSSQL",
            Self::Snowflake => "SNOWFLAKE",
        };
        f.write_str(name)
    }
}

/// Configured severity of a review rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleLevel {
    Error,
    Warning,
    Disabled,
}

macro_rules! rule_types {
    ($($variant:ident => $name:literal,)+) => {
        /// Identifier of a review rule, serialized as its dotted name.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
        pub enum RuleType {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl RuleType {
            /// Every rule type, in declaration order.
            pub const ALL: &'static [RuleType] = &[$(RuleType::$variant,)+];

            /// The dotted name used in configuration and advice titles.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(RuleType::$variant => $name,)+
                }
            }
        }
    };
}

rule_types! {
    StatementWhereRequire => "statement.where.require",
    StatementSelectNoSelectAll => "statement.select.no-select-all",
    StatementWhereNoLeadingWildcardLike => "statement.where.no-leading-wildcard-like",
    StatementWhereNoEqualNull => "statement.where.no-equal-null",
    StatementWhereMaximumLogicalOperatorCount => "statement.where.maximum-logical-operator-count",
    StatementMaximumJoinTableCount => "statement.maximum-join-table-count",
    StatementDisallowCommit => "statement.disallow-commit",
    StatementDisallowCascade => "statement.disallow-cascade",
    StatementMergeAlterTable => "statement.merge-alter-table",
    StatementDisallowMixDdlDml => "statement.disallow-mix-ddl-dml",
    StatementCreateSpecifySchema => "statement.create-specify-schema",
    StatementInsertMustSpecifyColumn => "statement.insert.must-specify-column",
    StatementInsertRowLimit => "statement.insert.row-limit",
    StatementInsertDisallowOrderByRand => "statement.insert.disallow-order-by-rand",
    StatementDisallowLimit => "statement.disallow-limit",
    StatementDisallowOrderBy => "statement.disallow-order-by",
    StatementAffectedRowLimit => "statement.affected-row-limit",
    StatementDmlDryRun => "statement.dml-dry-run",
    StatementDisallowAddColumnWithDefault => "statement.disallow-add-column-with-default",
    StatementAddCheckNotValid => "statement.add-check-not-valid",
    StatementAddFkNotValid => "statement.add-fk-not-valid",
    StatementDisallowAddNotNull => "statement.disallow-add-not-null",
    NamingTable => "naming.table",
    NamingColumn => "naming.column",
    NamingIndexIdx => "naming.index.idx",
    NamingIndexUk => "naming.index.uk",
    NamingIndexFk => "naming.index.fk",
    NamingIndexPk => "naming.index.pk",
    NamingTableNoKeyword => "naming.table.no-keyword",
    NamingIdentifierNoKeyword => "naming.identifier.no-keyword",
    NamingIdentifierCase => "naming.identifier.case",
    TableRequirePk => "table.require-pk",
    TableNoForeignKey => "table.no-foreign-key",
    TableDropNamingConvention => "table.drop-naming-convention",
    ColumnRequired => "column.required",
    ColumnNoNull => "column.no-null",
    ColumnDisallowChangeType => "column.disallow-change-type",
    ColumnSetDefaultForNotNull => "column.set-default-for-not-null",
    ColumnAddNotNullRequireDefault => "column.add-not-null-require-default",
    ColumnDisallowChange => "column.disallow-change",
    ColumnAutoIncrementMustInteger => "column.auto-increment-must-integer",
    ColumnTypeDisallowList => "column.type-disallow-list",
    ColumnMaximumCharacterLength => "column.maximum-character-length",
    ColumnRequireDefault => "column.require-default",
    ColumnMaximumVarcharLength => "column.maximum-varchar-length",
    SchemaBackwardCompatibility => "schema.backward-compatibility",
    SchemaIntegrity => "schema.integrity",
    DatabaseDropEmptyDatabase => "database.drop-empty-database",
    IndexNoDuplicateColumn => "index.no-duplicate-column",
    IndexKeyNumberLimit => "index.key-number-limit",
    IndexTotalNumberLimit => "index.total-number-limit",
    IndexPrimaryKeyTypeAllowlist => "index.primary-key-type-allowlist",
    IndexCreateConcurrently => "index.create-concurrently",
    IndexTypeAllowList => "index.type-allow-list",
    IndexTypeNoBlob => "index.type-no-blob",
    TableComment => "table.comment",
    ColumnComment => "column.comment",
    EngineMysqlUseInnodb => "engine.mysql.use-innodb",
    SystemCharsetAllowlist => "system.charset.allowlist",
    SystemCollationAllowlist => "system.collation.allowlist",
    SystemCommentLength => "system.comment.length",
    StatementObjectOwnerCheck => "statement.object-owner-check",
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured review rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SqlReviewRule {
    #[serde(rename = "type")]
    pub rule_type: RuleType,

    pub level: RuleLevel,

    /// Restricts the rule to one engine. `None` applies to every engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<Engine>,

    /// Rule-specific settings; the expected shape depends on `rule_type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl SqlReviewRule {
    pub fn new(rule_type: RuleType, level: RuleLevel) -> Self {
        Self {
            rule_type,
            level,
            engine: None,
            payload: None,
            comment: String::new(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.level != RuleLevel::Disabled
    }

    pub fn applies_to(&self, engine: Engine) -> bool {
        self.engine.is_none_or(|configured| configured == engine)
    }
}

/// A named set of review rules, as loaded from a policy file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub rules: Vec<SqlReviewRule>,
}

impl ReviewConfig {
    pub fn from_json(json: &str) -> Result<Self, AdvisorError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rules that are not disabled and apply to `engine`.
    pub fn enabled_rules(&self, engine: Engine) -> impl Iterator<Item = &SqlReviewRule> {
        self.rules
            .iter()
            .filter(move |rule| rule.is_enabled() && rule.applies_to(engine))
    }
}
