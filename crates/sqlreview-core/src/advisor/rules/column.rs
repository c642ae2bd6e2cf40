//! Column definition rules.
//!
//! Most of these look at [`NodeKind::ColumnDef`] nodes, which cover both
//! `CREATE TABLE` columns and `ALTER TABLE ... ADD COLUMN`. The type rules
//! also see `MODIFY`, `CHANGE` and `ALTER COLUMN ... TYPE` commands.

use super::helpers::{
    base_type_name, char_length, declared_column_type, dropped_column_names, has_default,
    has_not_null, is_auto_increment, is_integer_type, is_not_null_column, is_primary_key_column,
    is_value_generated, owning_table, owning_table_name, payload_limit, primary_key_columns,
    type_text, varchar_length, TableKeys,
};
use crate::advisor::payload::{RequiredColumnRulePayload, StringArrayTypeRulePayload};
use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::catalog::Catalog;
use crate::error::{AdvisorError, RuleError};
use crate::syntax::names::simple_name;
use crate::syntax::{NodeKind, NodeRef};
use crate::types::advice_codes;
use sqlparser::ast::{AlterColumnOperation, AlterTableOperation, ColumnDef, Statement};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Columns of the table-level primary key, when `node` sits in a CREATE TABLE.
fn table_pk_columns(node: NodeRef<'_>) -> Vec<String> {
    match node.parent().map(|parent| parent.statement()) {
        Some(Ok(Statement::CreateTable(create))) => primary_key_columns(create),
        _ => Vec::new(),
    }
}

fn in_create_table(node: NodeRef<'_>) -> bool {
    node.parent()
        .is_some_and(|parent| parent.kind() == NodeKind::CreateTableStmt)
}

struct ColumnSet {
    table: String,
    /// Present columns, keyed by lower-cased name.
    columns: BTreeMap<String, String>,
    line: usize,
}

/// Created tables must carry the required columns, and existing tables
/// must not lose them.
pub struct RequiredColumns {
    base: BaseRule,
    required: Vec<String>,
    keys: TableKeys,
    tables: BTreeMap<String, ColumnSet>,
}

impl RequiredColumns {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        let payload: RequiredColumnRulePayload = ctx.payload()?;
        Ok(Box::new(Self {
            base: ctx.base(),
            required: payload.columns().to_vec(),
            keys: TableKeys::from_context(ctx),
            tables: BTreeMap::new(),
        }))
    }

    fn on_create(&mut self, node: NodeRef<'_>) -> Result<(), RuleError> {
        let Statement::CreateTable(create) = node.statement()? else {
            return Ok(());
        };
        let columns = create
            .columns
            .iter()
            .map(|column| (column.name.value.to_lowercase(), column.name.value.clone()))
            .collect();
        self.tables.insert(
            self.keys.key(&create.name),
            ColumnSet {
                table: simple_name(&create.name),
                columns,
                line: node.script_line(),
            },
        );
        Ok(())
    }

    fn on_alter(&mut self, node: NodeRef<'_>) -> Result<(), RuleError> {
        let Some(name) = node.owning_table() else {
            return Ok(());
        };
        let op = node.alter_cmd()?;
        let (removed, added): (Vec<String>, Vec<String>) = match op {
            AlterTableOperation::AddColumn { column_def, .. } => {
                (Vec::new(), vec![column_def.name.value.clone()])
            }
            AlterTableOperation::RenameColumn {
                old_column_name,
                new_column_name,
                ..
            } => (
                vec![old_column_name.value.clone()],
                vec![new_column_name.value.clone()],
            ),
            AlterTableOperation::ChangeColumn {
                old_name, new_name, ..
            } => (vec![old_name.value.clone()], vec![new_name.value.clone()]),
            AlterTableOperation::DropColumn { .. } => (dropped_column_names(op), Vec::new()),
            _ => return Ok(()),
        };

        let required = &self.required;
        // Existing tables are assumed to carry every required column.
        let state = self
            .tables
            .entry(self.keys.key(name))
            .or_insert_with(|| ColumnSet {
                table: simple_name(name),
                columns: required
                    .iter()
                    .map(|column| (column.to_lowercase(), column.clone()))
                    .collect(),
                line: 0,
            });
        for column in removed {
            state.columns.remove(&column.to_lowercase());
        }
        for column in added {
            state.columns.insert(column.to_lowercase(), column);
        }
        state.line = node.script_line();
        Ok(())
    }
}

impl Rule for RequiredColumns {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        match kind {
            NodeKind::CreateTableStmt => self.on_create(node),
            NodeKind::AlterTableCmd => self.on_alter(node),
            _ => Ok(()),
        }
    }

    fn on_exit(&mut self, _node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::Root {
            return Ok(());
        }
        let mut findings = Vec::new();
        for state in self.tables.values() {
            let missing: Vec<&str> = self
                .required
                .iter()
                .filter(|column| !state.columns.contains_key(&column.to_lowercase()))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                findings.push((state.table.clone(), missing.join(", "), state.line));
            }
        }
        for (table, missing, line) in findings {
            self.base.report(
                advice_codes::NO_REQUIRED_COLUMN,
                format!("Table \"{table}\" requires columns: {missing}"),
                line,
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct NoNull {
    base: BaseRule,
}

impl NoNull {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }

    fn report(&mut self, node: NodeRef<'_>, column: &str) {
        self.base.report(
            advice_codes::COLUMN_CANNOT_NULL,
            format!(
                "Column \"{column}\" in \"{}\" can not have NULL value",
                owning_table_name(node)
            ),
            node.line(),
        );
    }
}

impl Rule for NoNull {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        match kind {
            NodeKind::ColumnDef => {
                let column = node.column_def()?;
                if !is_not_null_column(column, &table_pk_columns(node)) {
                    self.report(node, &column.name.value);
                }
            }
            NodeKind::AlterTableCmd => {
                if let AlterTableOperation::AlterColumn {
                    column_name,
                    op: AlterColumnOperation::DropNotNull,
                    ..
                } = node.alter_cmd()?
                {
                    self.report(node, &column_name.value);
                }
            }
            _ => {}
        }
        Ok(())
    }

    rule_base!();
}

fn normalized_type(type_text: &str) -> String {
    type_text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Flags column type changes.
///
/// `ALTER COLUMN ... TYPE` always changes the type. `MODIFY` and `CHANGE`
/// restate the full definition, so they only count when the catalog shows a
/// different type.
pub struct DisallowChangeType {
    base: BaseRule,
    catalog: Option<Arc<dyn Catalog>>,
}

impl DisallowChangeType {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            catalog: ctx.catalog.clone(),
        }))
    }

    fn differs_from_catalog(&self, node: NodeRef<'_>, column: &str, declared: &str) -> bool {
        let (Some(catalog), Some(table)) = (self.catalog.as_ref(), owning_table(node)) else {
            return false;
        };
        catalog
            .find_column(&table, column)
            .is_some_and(|existing| {
                normalized_type(&existing.data_type) != normalized_type(declared)
            })
    }
}

impl Rule for DisallowChangeType {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::AlterTableCmd {
            return Ok(());
        }
        let changed = match node.alter_cmd()? {
            AlterTableOperation::AlterColumn {
                op: AlterColumnOperation::SetDataType { .. },
                ..
            } => true,
            AlterTableOperation::ModifyColumn {
                col_name,
                data_type,
                ..
            } => self.differs_from_catalog(node, &col_name.value, &type_text(data_type)),
            AlterTableOperation::ChangeColumn {
                old_name,
                data_type,
                ..
            } => self.differs_from_catalog(node, &old_name.value, &type_text(data_type)),
            _ => false,
        };
        if changed {
            self.base.report(
                advice_codes::CHANGE_COLUMN_TYPE,
                format!("\"{}\" changes column type", node.statement_text()),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct SetDefaultForNotNull {
    base: BaseRule,
}

impl SetDefaultForNotNull {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for SetDefaultForNotNull {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::ColumnDef || !in_create_table(node) {
            return Ok(());
        }
        let column = node.column_def()?;
        let pk_columns = table_pk_columns(node);
        let in_pk = is_primary_key_column(column)
            || pk_columns
                .iter()
                .any(|pk| pk.eq_ignore_ascii_case(&column.name.value));
        if has_not_null(column) && !has_default(column) && !in_pk && !is_value_generated(column) {
            self.base.report(
                advice_codes::NOT_NULL_COLUMN_WITH_NO_DEFAULT,
                format!(
                    "Column \"{}\" in \"{}\" is NOT NULL but doesn't have DEFAULT",
                    column.name.value,
                    owning_table_name(node)
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct AddNotNullRequireDefault {
    base: BaseRule,
}

impl AddNotNullRequireDefault {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for AddNotNullRequireDefault {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::AlterTableCmd {
            return Ok(());
        }
        if let AlterTableOperation::AddColumn { column_def, .. } = node.alter_cmd()? {
            if has_not_null(column_def)
                && !has_default(column_def)
                && !is_value_generated(column_def)
            {
                self.base.report(
                    advice_codes::NOT_NULL_COLUMN_WITH_NO_DEFAULT,
                    format!(
                        "Adding not null column \"{}\" requires default",
                        column_def.name.value
                    ),
                    node.line(),
                );
            }
        }
        Ok(())
    }

    rule_base!();
}

pub struct DisallowChange {
    base: BaseRule,
}

impl DisallowChange {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for DisallowChange {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::AlterTableCmd {
            return Ok(());
        }
        if matches!(node.alter_cmd()?, AlterTableOperation::ChangeColumn { .. }) {
            self.base.report(
                advice_codes::USE_CHANGE_COLUMN_STATEMENT,
                format!(
                    "\"{}\" contains CHANGE COLUMN statement",
                    node.statement_text()
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct AutoIncrementMustInteger {
    base: BaseRule,
}

impl AutoIncrementMustInteger {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for AutoIncrementMustInteger {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::ColumnDef {
            return Ok(());
        }
        let column = node.column_def()?;
        if is_auto_increment(column) && !is_integer_type(&type_text(&column.data_type)) {
            self.base.report(
                advice_codes::AUTO_INCREMENT_COLUMN_NOT_INTEGER,
                format!(
                    "Auto-increment column \"{}\".\"{}\" requires integer type",
                    owning_table_name(node),
                    column.name.value
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct TypeDisallowList {
    base: BaseRule,
    disallowed: StringArrayTypeRulePayload,
}

impl TypeDisallowList {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            disallowed: ctx.payload()?,
        }))
    }
}

impl Rule for TypeDisallowList {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let Some((column, data_type)) = declared_column_type(node, kind)? else {
            return Ok(());
        };
        let full = type_text(data_type);
        let base_name = base_type_name(&full);
        if self.disallowed.contains(&full) || self.disallowed.contains(base_name) {
            self.base.report(
                advice_codes::DISABLED_COLUMN_TYPE,
                format!("Disallow column type {base_name} but column \"{column}\" is"),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct MaximumCharacterLength {
    base: BaseRule,
    maximum: u64,
}

impl MaximumCharacterLength {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            maximum: payload_limit(ctx)?,
        }))
    }
}

impl Rule for MaximumCharacterLength {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if self.maximum == 0 {
            return Ok(());
        }
        let Some((column, data_type)) = declared_column_type(node, kind)? else {
            return Ok(());
        };
        if char_length(&type_text(data_type)).is_some_and(|length| length > self.maximum) {
            self.base.report(
                advice_codes::CHAR_LENGTH_EXCEEDS_LIMIT,
                format!(
                    "The length of the CHAR column \"{column}\" is bigger than {}, please use VARCHAR instead",
                    self.maximum
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct MaximumVarcharLength {
    base: BaseRule,
    maximum: u64,
}

impl MaximumVarcharLength {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            maximum: payload_limit(ctx)?,
        }))
    }
}

impl Rule for MaximumVarcharLength {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if self.maximum == 0 {
            return Ok(());
        }
        let Some((column, data_type)) = declared_column_type(node, kind)? else {
            return Ok(());
        };
        if varchar_length(&type_text(data_type)).is_some_and(|length| length > self.maximum) {
            self.base.report(
                advice_codes::VARCHAR_LENGTH_EXCEEDS_LIMIT,
                format!(
                    "The length of the VARCHAR column \"{column}\" is bigger than {}",
                    self.maximum
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

/// Types that cannot carry a literal default on MySQL.
const NO_DEFAULT_TYPES: &[&str] = &[
    "BLOB",
    "TINYBLOB",
    "MEDIUMBLOB",
    "LONGBLOB",
    "TEXT",
    "TINYTEXT",
    "MEDIUMTEXT",
    "LONGTEXT",
    "JSON",
    "GEOMETRY",
];

fn needs_default(column: &ColumnDef, pk_columns: &[String]) -> bool {
    let in_pk = is_primary_key_column(column)
        || pk_columns
            .iter()
            .any(|pk| pk.eq_ignore_ascii_case(&column.name.value));
    let full = type_text(&column.data_type);
    !in_pk && !is_value_generated(column) && !NO_DEFAULT_TYPES.contains(&base_type_name(&full))
}

pub struct RequireDefault {
    base: BaseRule,
}

impl RequireDefault {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for RequireDefault {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::ColumnDef {
            return Ok(());
        }
        let column = node.column_def()?;
        if !has_default(column) && needs_default(column, &table_pk_columns(node)) {
            self.base.report(
                advice_codes::NO_DEFAULT,
                format!(
                    "Column \"{}\".\"{}\" doesn't have DEFAULT.",
                    owning_table_name(node),
                    column.name.value
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}
