//! AST helpers shared by the built-in rules.

use crate::advisor::payload::NumberTypeRulePayload;
use crate::advisor::RuleContext;
use crate::error::{AdvisorError, RuleError};
use crate::syntax::names::{index_column_name, simple_name, TableName};
use crate::syntax::{NodeKind, NodeRef};
use regex::Regex;
use sqlparser::ast::{
    AlterColumnOperation, AlterTableOperation, ColumnDef, ColumnOption, CommentDef, CreateTable,
    CreateTableOptions, DataType, Expr, ObjectName, SqlOption, TableConstraint,
};
use std::sync::OnceLock;

/// Table owning the node's statement, if it targets one.
pub(super) fn owning_table(node: NodeRef<'_>) -> Option<TableName> {
    node.owning_table().map(TableName::from_object_name)
}

/// Unqualified name of the owning table, empty when there is none.
pub(super) fn owning_table_name(node: NodeRef<'_>) -> String {
    node.owning_table().map(simple_name).unwrap_or_default()
}

/// Schema assumed for unqualified names when the catalog names none.
const FALLBACK_SCHEMA: &str = "public";

/// Per-table bookkeeping keys, `schema.table` lower-cased.
///
/// Unqualified names resolve against the catalog's default schema, so
/// `orders` and `public.orders` share a key while `sales.orders` does not.
#[derive(Debug, Clone)]
pub(super) struct TableKeys {
    default_schema: String,
}

impl TableKeys {
    pub(super) fn from_context(ctx: &RuleContext<'_>) -> Self {
        let default_schema = ctx
            .catalog
            .as_ref()
            .and_then(|catalog| catalog.default_schema().map(str::to_string))
            .unwrap_or_else(|| FALLBACK_SCHEMA.to_string());
        Self { default_schema }
    }

    fn resolve(&self, table: TableName) -> TableName {
        match table.schema {
            Some(_) => table,
            None => TableName::new(Some(&self.default_schema), table.name),
        }
    }

    pub(super) fn key(&self, name: &ObjectName) -> String {
        self.resolve(TableName::from_object_name(name)).key()
    }

    pub(super) fn default_schema(&self) -> &str {
        &self.default_schema
    }

    /// Schema an object name lives in once the default is applied.
    pub(super) fn schema_of(&self, name: &ObjectName) -> String {
        TableName::from_object_name(name)
            .schema
            .unwrap_or_else(|| self.default_schema.clone())
    }

    /// Key of the table `name` becomes after `RENAME TO new_name`, which
    /// stays in the schema of the renamed table.
    pub(super) fn renamed(&self, name: &ObjectName, new_name: &str) -> String {
        let schema = self.resolve(TableName::from_object_name(name)).schema;
        TableName::new(schema.as_deref(), new_name).key()
    }
}

/// Numeric limit from a `{ number }` payload; negative values disable the rule.
pub(super) fn payload_limit(ctx: &RuleContext<'_>) -> Result<u64, AdvisorError> {
    let payload: NumberTypeRulePayload = ctx.payload()?;
    Ok(u64::try_from(payload.number).unwrap_or(0))
}

/// Index of the statement the node belongs to.
pub(super) fn statement_index(node: NodeRef<'_>) -> Option<usize> {
    node.statement_source().map(|source| source.index)
}

fn unquote(identifier: &str) -> String {
    identifier
        .trim()
        .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
        .to_string()
}

/// Columns removed by an `ALTER TABLE ... DROP COLUMN` command.
pub(super) fn dropped_column_names(op: &AlterTableOperation) -> Vec<String> {
    if !matches!(op, AlterTableOperation::DropColumn { .. }) {
        return Vec::new();
    }
    let text = op.to_string();
    let rest = text.strip_prefix("DROP ").unwrap_or(&text);
    let rest = rest.strip_prefix("COLUMN ").unwrap_or(rest);
    let rest = rest.strip_prefix("IF EXISTS ").unwrap_or(rest);
    let rest = rest
        .strip_suffix(" CASCADE")
        .or_else(|| rest.strip_suffix(" RESTRICT"))
        .unwrap_or(rest);
    rest.split(',')
        .map(unquote)
        .filter(|name| !name.is_empty())
        .collect()
}

/// True when the command carries `IF EXISTS`.
pub(super) fn has_if_exists(op: &AlterTableOperation) -> bool {
    op.to_string().to_uppercase().contains("IF EXISTS")
}

/// New table name of an `ALTER TABLE ... RENAME TO` command.
pub(super) fn renamed_table_name(op: &AlterTableOperation) -> Option<String> {
    if !matches!(op, AlterTableOperation::RenameTable { .. }) {
        return None;
    }
    let text = op.to_string();
    let target = text.split_whitespace().last()?;
    Some(unquote(target.rsplit('.').next().unwrap_or(target)))
}

/// Column name and declared type at a node that defines or retypes a column.
///
/// Covers column definitions plus `MODIFY COLUMN`, `CHANGE COLUMN` and
/// `ALTER COLUMN ... TYPE` commands.
pub(super) fn declared_column_type<'t>(
    node: NodeRef<'t>,
    kind: NodeKind,
) -> Result<Option<(String, &'t DataType)>, RuleError> {
    match kind {
        NodeKind::ColumnDef => {
            let column = node.column_def()?;
            Ok(Some((column.name.value.clone(), &column.data_type)))
        }
        NodeKind::AlterTableCmd => Ok(match node.alter_cmd()? {
            AlterTableOperation::ModifyColumn {
                col_name,
                data_type,
                ..
            } => Some((col_name.value.clone(), data_type)),
            AlterTableOperation::ChangeColumn {
                new_name,
                data_type,
                ..
            } => Some((new_name.value.clone(), data_type)),
            AlterTableOperation::AlterColumn {
                column_name,
                op: AlterColumnOperation::SetDataType { data_type, .. },
                ..
            } => Some((column_name.value.clone(), data_type)),
            _ => None,
        }),
        _ => Ok(None),
    }
}

/// Column name and options at a node that defines or redefines a column.
///
/// Covers column definitions plus `MODIFY COLUMN` and `CHANGE COLUMN`.
pub(super) fn declared_column_options<'t>(
    node: NodeRef<'t>,
    kind: NodeKind,
) -> Result<Option<(String, Vec<&'t ColumnOption>)>, RuleError> {
    match kind {
        NodeKind::ColumnDef => {
            let column = node.column_def()?;
            let options = column.options.iter().map(|def| &def.option).collect();
            Ok(Some((column.name.value.clone(), options)))
        }
        NodeKind::AlterTableCmd => Ok(match node.alter_cmd()? {
            AlterTableOperation::ModifyColumn {
                col_name, options, ..
            } => Some((col_name.value.clone(), options.iter().collect())),
            AlterTableOperation::ChangeColumn {
                new_name, options, ..
            } => Some((new_name.value.clone(), options.iter().collect())),
            _ => None,
        }),
        _ => Ok(None),
    }
}

/// True for commands that change an existing column's type.
pub(super) fn is_column_type_change(op: &AlterTableOperation) -> bool {
    matches!(
        op,
        AlterTableOperation::ModifyColumn { .. }
            | AlterTableOperation::ChangeColumn { .. }
            | AlterTableOperation::AlterColumn {
                op: AlterColumnOperation::SetDataType { .. },
                ..
            }
    )
}

/// Options written after the column list of a CREATE TABLE.
pub(super) fn table_options(create: &CreateTable) -> &[SqlOption] {
    match &create.table_options {
        CreateTableOptions::With(options)
        | CreateTableOptions::Options(options)
        | CreateTableOptions::Plain(options)
        | CreateTableOptions::TableProperties(options) => options,
        CreateTableOptions::None => &[],
    }
}

/// Unquoted text of an option value such as `utf8mb4` or `'utf8mb4'`.
pub(super) fn option_value_text(value: &Expr) -> String {
    match value {
        Expr::Identifier(ident) => ident.value.clone(),
        Expr::Value(value) => value
            .value
            .clone()
            .into_string()
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

/// Values of the `key = value` table options whose key is one of `keys`.
pub(super) fn table_option_values(create: &CreateTable, keys: &[&str]) -> Vec<String> {
    table_options(create)
        .iter()
        .filter_map(|option| match option {
            SqlOption::KeyValue { key, value }
                if keys.iter().any(|wanted| key.value.eq_ignore_ascii_case(wanted)) =>
            {
                Some(option_value_text(value))
            }
            _ => None,
        })
        .collect()
}

/// Storage engine named by `ENGINE = ...`.
pub(super) fn table_engine(create: &CreateTable) -> Option<&str> {
    table_options(create).iter().find_map(|option| match option {
        SqlOption::NamedParenthesizedList(list) if list.key.value.eq_ignore_ascii_case("ENGINE") => {
            list.name.as_ref().map(|name| name.value.as_str())
        }
        _ => None,
    })
}

/// Table comment, from the option list or the trailing `COMMENT '...'`.
pub(super) fn table_comment(create: &CreateTable) -> Option<&str> {
    let from_options = table_options(create).iter().find_map(|option| match option {
        SqlOption::Comment(comment) => Some(comment),
        _ => None,
    });
    create
        .comment
        .as_ref()
        .or(from_options)
        .map(|comment| match comment {
            CommentDef::WithEq(text) | CommentDef::WithoutEq(text) => text.as_str(),
        })
}

/// Upper-cased SQL rendering of a column type, e.g. `VARCHAR(20)`.
pub(super) fn type_text(data_type: &DataType) -> String {
    data_type.to_string().to_uppercase()
}

/// Type name without length or modifiers, e.g. `VARCHAR` for `VARCHAR(20)`.
pub(super) fn base_type_name(type_text: &str) -> &str {
    type_text
        .split('(')
        .next()
        .unwrap_or(type_text)
        .trim()
}

pub(super) fn is_integer_type(type_text: &str) -> bool {
    let head = type_text
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or_default();
    matches!(
        head,
        "INT"
            | "INTEGER"
            | "TINYINT"
            | "SMALLINT"
            | "MEDIUMINT"
            | "BIGINT"
            | "INT2"
            | "INT4"
            | "INT8"
            | "SERIAL"
            | "SMALLSERIAL"
            | "BIGSERIAL"
    )
}

fn char_length_regex() -> &'static Regex {
    static CHAR: OnceLock<Regex> = OnceLock::new();
    CHAR.get_or_init(|| {
        Regex::new(r"^(?:N?CHAR|CHARACTER)\s*\(\s*(\d+)").expect("Invalid char length regex")
    })
}

fn varchar_length_regex() -> &'static Regex {
    static VARCHAR: OnceLock<Regex> = OnceLock::new();
    VARCHAR.get_or_init(|| {
        Regex::new(r"^(?:N?VARCHAR2?|CHARACTER VARYING|CHAR VARYING)\s*\(\s*(\d+)")
            .expect("Invalid varchar length regex")
    })
}

fn captured_length(regex: &Regex, type_text: &str) -> Option<u64> {
    regex
        .captures(type_text)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Declared length of a fixed-length `CHAR(n)` type.
pub(super) fn char_length(type_text: &str) -> Option<u64> {
    captured_length(char_length_regex(), type_text)
}

/// Declared length of a `VARCHAR(n)` type.
pub(super) fn varchar_length(type_text: &str) -> Option<u64> {
    captured_length(varchar_length_regex(), type_text)
}

pub(super) fn is_primary_key_column(column: &ColumnDef) -> bool {
    column.options.iter().any(|option| {
        matches!(
            option.option,
            ColumnOption::Unique {
                is_primary: true,
                ..
            }
        )
    })
}

pub(super) fn has_not_null(column: &ColumnDef) -> bool {
    column
        .options
        .iter()
        .any(|option| matches!(option.option, ColumnOption::NotNull))
}

pub(super) fn has_default(column: &ColumnDef) -> bool {
    column
        .options
        .iter()
        .any(|option| matches!(option.option, ColumnOption::Default(_)))
}

pub(super) fn has_foreign_key(column: &ColumnDef) -> bool {
    column
        .options
        .iter()
        .any(|option| matches!(option.option, ColumnOption::ForeignKey { .. }))
}

pub(super) fn is_auto_increment(column: &ColumnDef) -> bool {
    column.options.iter().any(|option| {
        let text = option.option.to_string().to_uppercase();
        text.contains("AUTO_INCREMENT") || text.contains("AUTOINCREMENT")
    })
}

/// Columns whose value the database fills in: auto increment, identity,
/// generated, or serial types.
pub(super) fn is_value_generated(column: &ColumnDef) -> bool {
    let generated_option = column.options.iter().any(|option| {
        let text = option.option.to_string().to_uppercase();
        text.contains("AUTO_INCREMENT")
            || text.contains("AUTOINCREMENT")
            || text.contains("IDENTITY")
            || text.starts_with("GENERATED")
    });
    generated_option || type_text(&column.data_type).contains("SERIAL")
}

/// Names of the columns listed in a table-level primary key.
pub(super) fn primary_key_columns(create: &CreateTable) -> Vec<String> {
    create
        .constraints
        .iter()
        .filter_map(|constraint| match constraint {
            TableConstraint::PrimaryKey { columns, .. } => {
                Some(columns.iter().map(index_column_name).collect::<Vec<_>>())
            }
            _ => None,
        })
        .flatten()
        .collect()
}

/// True when the column rejects NULL, directly or through the table key.
pub(super) fn is_not_null_column(column: &ColumnDef, pk_columns: &[String]) -> bool {
    has_not_null(column)
        || is_primary_key_column(column)
        || pk_columns
            .iter()
            .any(|pk| pk.eq_ignore_ascii_case(&column.name.value))
}

/// Key columns of an index-like constraint, in declaration order.
pub(super) fn constraint_columns(constraint: &TableConstraint) -> Vec<String> {
    match constraint {
        TableConstraint::Unique { columns, .. }
        | TableConstraint::PrimaryKey { columns, .. }
        | TableConstraint::Index { columns, .. } => {
            columns.iter().map(index_column_name).collect()
        }
        TableConstraint::ForeignKey { columns, .. } => {
            columns.iter().map(|column| column.value.clone()).collect()
        }
        _ => Vec::new(),
    }
}

/// Label used in advice text for an index-like constraint.
pub(super) fn constraint_label(constraint: &TableConstraint) -> &'static str {
    match constraint {
        TableConstraint::PrimaryKey { .. } => "PRIMARY KEY",
        TableConstraint::Unique { .. } => "UNIQUE KEY",
        TableConstraint::ForeignKey { .. } => "FOREIGN KEY",
        TableConstraint::Check { .. } => "CHECK",
        _ => "INDEX",
    }
}

/// First name that appears twice in `names`, compared case-insensitively.
pub(super) fn first_duplicate(names: &[String]) -> Option<&str> {
    names.iter().enumerate().find_map(|(i, name)| {
        names[..i]
            .iter()
            .any(|seen| seen.eq_ignore_ascii_case(name))
            .then_some(name.as_str())
    })
}
