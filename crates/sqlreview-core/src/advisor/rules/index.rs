//! Index and key rules.

use super::helpers::{
    base_type_name, constraint_columns, constraint_label, first_duplicate, is_primary_key_column,
    owning_table, owning_table_name, payload_limit, type_text, TableKeys,
};
use crate::advisor::payload::StringArrayTypeRulePayload;
use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::catalog::Catalog;
use crate::error::{AdvisorError, RuleError};
use crate::syntax::names::{index_column_name, simple_name};
use crate::syntax::{constraint_name, NodeKind, NodeRef};
use crate::types::advice_codes;
use sqlparser::ast::{ColumnOption, Statement, TableConstraint};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// An index-like object declared by a node: a key constraint or `CREATE INDEX`.
struct KeyDef {
    label: &'static str,
    name: Option<String>,
    table: String,
    columns: Vec<String>,
}

impl KeyDef {
    fn at(node: NodeRef<'_>, kind: NodeKind) -> Result<Option<Self>, RuleError> {
        match kind {
            NodeKind::TableConstraint => {
                let constraint = node.table_constraint()?;
                if matches!(constraint, TableConstraint::Check { .. }) {
                    return Ok(None);
                }
                Ok(Some(Self {
                    label: constraint_label(constraint),
                    name: constraint_name(constraint).map(|ident| ident.value.clone()),
                    table: owning_table_name(node),
                    columns: constraint_columns(constraint),
                }))
            }
            NodeKind::CreateIndexStmt => {
                let Statement::CreateIndex(create) = node.statement()? else {
                    return Ok(None);
                };
                Ok(Some(Self {
                    label: if create.unique { "UNIQUE KEY" } else { "INDEX" },
                    name: create.name.as_ref().map(simple_name),
                    table: simple_name(&create.table_name),
                    columns: create.columns.iter().map(index_column_name).collect(),
                }))
            }
            _ => Ok(None),
        }
    }

    /// `INDEX "idx"`, or just `INDEX` for an unnamed key.
    fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("{} \"{name}\"", self.label),
            None => self.label.to_string(),
        }
    }
}

pub struct NoDuplicateColumn {
    base: BaseRule,
}

impl NoDuplicateColumn {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for NoDuplicateColumn {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let Some(key) = KeyDef::at(node, kind)? else {
            return Ok(());
        };
        if let Some(column) = first_duplicate(&key.columns) {
            self.base.report(
                advice_codes::DUPLICATE_COLUMN_IN_INDEX,
                format!(
                    "{} has duplicate column \"{column}\" in table \"{}\"",
                    key.describe(),
                    key.table
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct KeyNumberLimit {
    base: BaseRule,
    maximum: u64,
}

impl KeyNumberLimit {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            maximum: payload_limit(ctx)?,
        }))
    }
}

impl Rule for KeyNumberLimit {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if self.maximum == 0 {
            return Ok(());
        }
        let Some(key) = KeyDef::at(node, kind)? else {
            return Ok(());
        };
        if key.columns.len() as u64 > self.maximum {
            self.base.report(
                advice_codes::INDEX_KEY_NUMBER_EXCEEDS_LIMIT,
                format!(
                    "The number of index keys of {} in table \"{}\" should be not greater than {}",
                    key.describe(),
                    key.table,
                    self.maximum
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

struct IndexCount {
    table: String,
    count: u64,
    line: usize,
}

/// Caps the number of indexes per table, counting the catalog's indexes
/// plus every index the script adds. Reported once per table at the end.
pub struct TotalNumberLimit {
    base: BaseRule,
    catalog: Option<Arc<dyn Catalog>>,
    maximum: u64,
    keys: TableKeys,
    tables: BTreeMap<String, IndexCount>,
}

impl TotalNumberLimit {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            catalog: ctx.catalog.clone(),
            maximum: payload_limit(ctx)?,
            keys: TableKeys::from_context(ctx),
            tables: BTreeMap::new(),
        }))
    }

    fn add(&mut self, node: NodeRef<'_>, added: u64) {
        let Some(name) = node.owning_table() else {
            return;
        };
        let catalog = self.catalog.as_ref();
        let state = self.tables.entry(self.keys.key(name)).or_insert_with(|| {
            let existing = owning_table(node)
                .zip(catalog)
                .and_then(|(table, catalog)| {
                    catalog.find_table(&table).map(|meta| meta.indexes.len())
                })
                .unwrap_or(0);
            IndexCount {
                table: simple_name(name),
                count: existing as u64,
                line: node.script_line(),
            }
        });
        state.count += added;
        state.line = node.script_line();
    }
}

impl Rule for TotalNumberLimit {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let added = match kind {
            NodeKind::CreateIndexStmt => 1,
            NodeKind::TableConstraint => match node.table_constraint()? {
                TableConstraint::PrimaryKey { .. }
                | TableConstraint::Unique { .. }
                | TableConstraint::Index { .. } => 1,
                _ => 0,
            },
            NodeKind::ColumnDef => {
                let column = node.column_def()?;
                let keyed = column
                    .options
                    .iter()
                    .any(|option| matches!(option.option, ColumnOption::Unique { .. }));
                u64::from(keyed)
            }
            _ => 0,
        };
        if added > 0 {
            self.add(node, added);
        }
        Ok(())
    }

    fn on_exit(&mut self, _node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::Root || self.maximum == 0 {
            return Ok(());
        }
        let over: Vec<(String, u64, usize)> = self
            .tables
            .values()
            .filter(|state| state.count > self.maximum)
            .map(|state| (state.table.clone(), state.count, state.line))
            .collect();
        for (table, count, line) in over {
            self.base.report(
                advice_codes::INDEX_COUNT_EXCEEDS_LIMIT,
                format!(
                    "The count of index in table \"{table}\" should be no more than {}, but found {count}",
                    self.maximum
                ),
                line,
            );
        }
        Ok(())
    }

    rule_base!();
}

/// Upper-cased type of a key column: from the CREATE TABLE it appears in,
/// otherwise from the catalog.
fn key_column_type(
    catalog: Option<&Arc<dyn Catalog>>,
    node: NodeRef<'_>,
    column: &str,
) -> Option<String> {
    if let Some(Ok(Statement::CreateTable(create))) =
        node.enclosing_statement().map(|stmt| stmt.statement())
    {
        return create
            .columns
            .iter()
            .find(|def| def.name.value.eq_ignore_ascii_case(column))
            .map(|def| type_text(&def.data_type));
    }
    let table = owning_table(node)?;
    catalog?
        .find_column(&table, column)
        .map(|meta| meta.data_type.to_uppercase())
}

pub struct PrimaryKeyTypeAllowlist {
    base: BaseRule,
    catalog: Option<Arc<dyn Catalog>>,
    allowed: StringArrayTypeRulePayload,
}

impl PrimaryKeyTypeAllowlist {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            catalog: ctx.catalog.clone(),
            allowed: ctx.payload()?,
        }))
    }

    fn check(&mut self, node: NodeRef<'_>, column: &str, data_type: &str) {
        if self.allowed.contains(data_type) || self.allowed.contains(base_type_name(data_type)) {
            return;
        }
        self.base.report(
            advice_codes::INDEX_PK_TYPE,
            format!(
                "The column \"{column}\" in table \"{}\" is one of the primary key, but its type \"{data_type}\" is not in allowlist",
                owning_table_name(node)
            ),
            node.line(),
        );
    }
}

impl Rule for PrimaryKeyTypeAllowlist {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        match kind {
            NodeKind::ColumnDef => {
                let column = node.column_def()?;
                if is_primary_key_column(column) {
                    let data_type = type_text(&column.data_type);
                    self.check(node, &column.name.value, &data_type);
                }
            }
            NodeKind::TableConstraint => {
                let constraint = node.table_constraint()?;
                if !matches!(constraint, TableConstraint::PrimaryKey { .. }) {
                    return Ok(());
                }
                for column in constraint_columns(constraint) {
                    if let Some(data_type) = key_column_type(self.catalog.as_ref(), node, &column)
                    {
                        self.check(node, &column, &data_type);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    rule_base!();
}

/// Plain `CREATE INDEX` takes a lock that blocks writes on PostgreSQL.
pub struct CreateConcurrently {
    base: BaseRule,
    keys: TableKeys,
    created: HashSet<String>,
}

impl CreateConcurrently {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            keys: TableKeys::from_context(ctx),
            created: HashSet::new(),
        }))
    }
}

impl Rule for CreateConcurrently {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if !matches!(kind, NodeKind::CreateTableStmt | NodeKind::CreateIndexStmt) {
            return Ok(());
        }
        match node.statement()? {
            Statement::CreateTable(create) => {
                self.created.insert(self.keys.key(&create.name));
            }
            Statement::CreateIndex(create)
                if !create.concurrently
                    && !self.created.contains(&self.keys.key(&create.table_name)) =>
            {
                self.base.report(
                    advice_codes::CREATE_INDEX_UNCONCURRENTLY,
                    format!(
                        "Creating indexes will block writes on table \"{}\", unless use CONCURRENTLY",
                        simple_name(&create.table_name)
                    ),
                    node.line(),
                );
            }
            _ => {}
        }
        Ok(())
    }

    rule_base!();
}

/// Index access methods are limited to a configured list; an index without
/// `USING` is a B-tree.
pub struct TypeAllowList {
    base: BaseRule,
    allowed: StringArrayTypeRulePayload,
}

impl TypeAllowList {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            allowed: ctx.payload()?,
        }))
    }
}

impl Rule for TypeAllowList {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let method = match kind {
            NodeKind::CreateIndexStmt => match node.statement()? {
                Statement::CreateIndex(create) => create.using.as_ref().map(|m| m.to_string()),
                _ => return Ok(()),
            },
            NodeKind::TableConstraint => match node.table_constraint()? {
                TableConstraint::Index { index_type, .. }
                | TableConstraint::Unique { index_type, .. } => {
                    index_type.as_ref().map(|m| m.to_string())
                }
                _ => return Ok(()),
            },
            _ => return Ok(()),
        };
        let method = method.unwrap_or_else(|| "BTREE".to_string());
        if !self.allowed.contains(&method) {
            self.base.report(
                advice_codes::INDEX_TYPE_NOT_ALLOWED,
                format!("Index type \"{method}\" is not allowed"),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

const BLOB_TYPES: [&str; 4] = ["BLOB", "TINYBLOB", "MEDIUMBLOB", "LONGBLOB"];

fn is_blob(data_type: &str) -> bool {
    BLOB_TYPES.contains(&base_type_name(data_type))
}

/// BLOB columns used as index keys.
///
/// Column types come from the CREATE TABLE being checked, then from tables
/// created earlier in the script, then from the catalog.
pub struct TypeNoBlob {
    base: BaseRule,
    catalog: Option<Arc<dyn Catalog>>,
    keys: TableKeys,
    created: HashMap<String, HashMap<String, String>>,
}

impl TypeNoBlob {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            catalog: ctx.catalog.clone(),
            keys: TableKeys::from_context(ctx),
            created: HashMap::new(),
        }))
    }

    fn column_type(&self, node: NodeRef<'_>, column: &str) -> Option<String> {
        let in_script = node.owning_table().and_then(|table| {
            self.created
                .get(&self.keys.key(table))?
                .get(&column.to_lowercase())
                .cloned()
        });
        let in_statement = || key_column_type(self.catalog.as_ref(), node, column);
        match node.enclosing_statement().map(|stmt| stmt.kind()) {
            Some(NodeKind::CreateTableStmt) => in_statement(),
            _ => in_script.or_else(in_statement),
        }
    }

    fn check(&mut self, node: NodeRef<'_>, column: &str, data_type: &str) {
        if is_blob(data_type) {
            self.base.report(
                advice_codes::INDEX_TYPE_NO_BLOB,
                format!(
                    "Columns in index must not be BLOB but `{}`.`{column}` is blob",
                    owning_table_name(node)
                ),
                node.line(),
            );
        }
    }
}

impl Rule for TypeNoBlob {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        match kind {
            NodeKind::CreateTableStmt => {
                if let Statement::CreateTable(create) = node.statement()? {
                    let columns = create
                        .columns
                        .iter()
                        .map(|def| (def.name.value.to_lowercase(), type_text(&def.data_type)))
                        .collect();
                    self.created.insert(self.keys.key(&create.name), columns);
                }
            }
            NodeKind::ColumnDef => {
                let column = node.column_def()?;
                let keyed = column
                    .options
                    .iter()
                    .any(|def| matches!(def.option, ColumnOption::Unique { .. }));
                if keyed {
                    self.check(node, &column.name.value, &type_text(&column.data_type));
                }
            }
            NodeKind::TableConstraint
                if matches!(node.table_constraint()?, TableConstraint::ForeignKey { .. }) => {}
            NodeKind::TableConstraint | NodeKind::CreateIndexStmt => {
                let Some(key) = KeyDef::at(node, kind)? else {
                    return Ok(());
                };
                for column in &key.columns {
                    if let Some(data_type) = self.column_type(node, column) {
                        self.check(node, column, &data_type);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    rule_base!();
}
