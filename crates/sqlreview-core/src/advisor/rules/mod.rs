//! Built-in review rules and their engine registrations.

/// Implements [`Rule::base`](crate::advisor::Rule::base) and
/// [`Rule::base_mut`](crate::advisor::Rule::base_mut) for a rule with a
/// `base` field.
macro_rules! rule_base {
    () => {
        fn base(&self) -> &$crate::advisor::BaseRule {
            &self.base
        }

        fn base_mut(&mut self) -> &mut $crate::advisor::BaseRule {
            &mut self.base
        }
    };
}

pub mod column;
pub mod comment;
pub mod compatibility;
mod helpers;
pub mod index;
pub mod integrity;
mod keywords;
pub mod naming;
pub mod naming_index;
pub mod owner;
pub mod statement_dml;
pub mod statement_explain;
pub mod statement_online_ddl;
pub mod statement_script;
pub mod statement_select;
pub mod statement_where;
pub mod storage;
pub mod table;

use super::registry::{AdvisorRegistry, RuleFactory};
use crate::types::{Engine, RuleType};

const ALL: &[Engine] = &Engine::ALL;
const MYSQL_FAMILY: &[Engine] = &[Engine::Mysql, Engine::Mariadb, Engine::Tidb];
const POSTGRES: &[Engine] = &[Engine::Postgres];
const SCHEMA_QUALIFIED: &[Engine] = &[Engine::Postgres, Engine::Mssql, Engine::Snowflake];
const MYSQL_INNODB: &[Engine] = &[Engine::Mysql, Engine::Mariadb];
const MYSQL_FAMILY_AND_POSTGRES: &[Engine] =
    &[Engine::Mysql, Engine::Mariadb, Engine::Tidb, Engine::Postgres];

/// Every built-in rule with the engines it supports.
const BUILTIN_RULES: &[(RuleType, &[Engine], RuleFactory)] = &[
    // Statement
    (RuleType::StatementWhereRequire, ALL, statement_where::WhereRequire::build),
    (RuleType::StatementSelectNoSelectAll, ALL, statement_select::NoSelectAll::build),
    (
        RuleType::StatementWhereNoLeadingWildcardLike,
        ALL,
        statement_where::NoLeadingWildcardLike::build,
    ),
    (RuleType::StatementWhereNoEqualNull, ALL, statement_where::NoEqualNull::build),
    (
        RuleType::StatementWhereMaximumLogicalOperatorCount,
        ALL,
        statement_where::MaximumLogicalOperatorCount::build,
    ),
    (
        RuleType::StatementMaximumJoinTableCount,
        ALL,
        statement_select::MaximumJoinTableCount::build,
    ),
    (RuleType::StatementDisallowCommit, ALL, statement_script::DisallowCommit::build),
    (RuleType::StatementDisallowCascade, POSTGRES, statement_script::DisallowCascade::build),
    (RuleType::StatementMergeAlterTable, ALL, statement_script::MergeAlterTable::build),
    (RuleType::StatementDisallowMixDdlDml, ALL, statement_script::DisallowMixDdlDml::build),
    (
        RuleType::StatementCreateSpecifySchema,
        SCHEMA_QUALIFIED,
        statement_script::CreateSpecifySchema::build,
    ),
    (
        RuleType::StatementInsertMustSpecifyColumn,
        ALL,
        statement_dml::InsertMustSpecifyColumn::build,
    ),
    (RuleType::StatementInsertRowLimit, ALL, statement_explain::InsertRowLimit::build),
    (
        RuleType::StatementInsertDisallowOrderByRand,
        MYSQL_FAMILY,
        statement_dml::InsertDisallowOrderByRand::build,
    ),
    (RuleType::StatementDisallowLimit, MYSQL_FAMILY, statement_dml::DisallowLimit::build),
    (RuleType::StatementDisallowOrderBy, MYSQL_FAMILY, statement_dml::DisallowOrderBy::build),
    (RuleType::StatementAffectedRowLimit, ALL, statement_explain::AffectedRowLimit::build),
    (RuleType::StatementDmlDryRun, ALL, statement_explain::DmlDryRun::build),
    (
        RuleType::StatementDisallowAddColumnWithDefault,
        POSTGRES,
        statement_online_ddl::DisallowAddColumnWithDefault::build,
    ),
    (
        RuleType::StatementAddCheckNotValid,
        POSTGRES,
        statement_online_ddl::AddCheckNotValid::build,
    ),
    (RuleType::StatementAddFkNotValid, POSTGRES, statement_online_ddl::AddFkNotValid::build),
    (
        RuleType::StatementDisallowAddNotNull,
        POSTGRES,
        statement_online_ddl::DisallowAddNotNull::build,
    ),
    // Naming
    (RuleType::NamingTable, ALL, naming::TableNaming::build),
    (RuleType::NamingColumn, ALL, naming::ColumnNaming::build),
    (RuleType::NamingIndexIdx, ALL, naming_index::IndexNaming::build),
    (RuleType::NamingIndexUk, ALL, naming_index::IndexNaming::build),
    (RuleType::NamingIndexFk, ALL, naming_index::IndexNaming::build),
    (RuleType::NamingIndexPk, ALL, naming_index::IndexNaming::build),
    (RuleType::NamingTableNoKeyword, ALL, naming::TableNoKeyword::build),
    (RuleType::NamingIdentifierNoKeyword, ALL, naming::IdentifierNoKeyword::build),
    (RuleType::NamingIdentifierCase, ALL, naming::IdentifierCase::build),
    // Table
    (RuleType::TableRequirePk, ALL, table::RequirePk::build),
    (RuleType::TableNoForeignKey, ALL, table::NoForeignKey::build),
    (RuleType::TableDropNamingConvention, ALL, naming::DropTableNaming::build),
    // Column
    (RuleType::ColumnRequired, ALL, column::RequiredColumns::build),
    (RuleType::ColumnNoNull, ALL, column::NoNull::build),
    (RuleType::ColumnDisallowChangeType, ALL, column::DisallowChangeType::build),
    (RuleType::ColumnSetDefaultForNotNull, ALL, column::SetDefaultForNotNull::build),
    (
        RuleType::ColumnAddNotNullRequireDefault,
        ALL,
        column::AddNotNullRequireDefault::build,
    ),
    (RuleType::ColumnDisallowChange, MYSQL_FAMILY, column::DisallowChange::build),
    (
        RuleType::ColumnAutoIncrementMustInteger,
        MYSQL_FAMILY,
        column::AutoIncrementMustInteger::build,
    ),
    (RuleType::ColumnTypeDisallowList, ALL, column::TypeDisallowList::build),
    (RuleType::ColumnMaximumCharacterLength, ALL, column::MaximumCharacterLength::build),
    (RuleType::ColumnRequireDefault, ALL, column::RequireDefault::build),
    (RuleType::ColumnMaximumVarcharLength, ALL, column::MaximumVarcharLength::build),
    // Schema
    (
        RuleType::SchemaBackwardCompatibility,
        ALL,
        compatibility::BackwardCompatibility::build,
    ),
    (RuleType::SchemaIntegrity, ALL, integrity::SchemaIntegrity::build),
    (
        RuleType::DatabaseDropEmptyDatabase,
        MYSQL_FAMILY,
        integrity::DropEmptyDatabase::build,
    ),
    // Index
    (RuleType::IndexNoDuplicateColumn, ALL, index::NoDuplicateColumn::build),
    (RuleType::IndexKeyNumberLimit, ALL, index::KeyNumberLimit::build),
    (RuleType::IndexTotalNumberLimit, ALL, index::TotalNumberLimit::build),
    (
        RuleType::IndexPrimaryKeyTypeAllowlist,
        ALL,
        index::PrimaryKeyTypeAllowlist::build,
    ),
    (RuleType::IndexCreateConcurrently, POSTGRES, index::CreateConcurrently::build),
    (
        RuleType::IndexTypeAllowList,
        MYSQL_FAMILY_AND_POSTGRES,
        index::TypeAllowList::build,
    ),
    (RuleType::IndexTypeNoBlob, MYSQL_FAMILY, index::TypeNoBlob::build),
    // Comment
    (RuleType::TableComment, MYSQL_FAMILY, comment::TableComment::build),
    (RuleType::ColumnComment, MYSQL_FAMILY, comment::ColumnComment::build),
    // Engine
    (RuleType::EngineMysqlUseInnodb, MYSQL_INNODB, storage::UseInnodb::build),
    // System
    (RuleType::SystemCharsetAllowlist, MYSQL_FAMILY, storage::Allowlist::build_charset),
    (
        RuleType::SystemCollationAllowlist,
        MYSQL_FAMILY_AND_POSTGRES,
        storage::Allowlist::build_collation,
    ),
    (RuleType::SystemCommentLength, POSTGRES, comment::CommentLength::build),
    (RuleType::StatementObjectOwnerCheck, POSTGRES, owner::ObjectOwnerCheck::build),
];

pub(super) fn register_builtin(registry: &mut AdvisorRegistry) {
    for &(rule_type, engines, factory) in BUILTIN_RULES {
        registry.register_engines(engines, rule_type, factory);
    }
}
