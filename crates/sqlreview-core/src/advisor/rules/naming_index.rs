//! Index and key naming templates.
//!
//! One rule type per object kind (`naming.index.idx`, `.uk`, `.fk`, `.pk`);
//! all four share [`IndexNaming`], which picks its kind from the configured
//! rule type. Unnamed objects are skipped since the engine names them.

use super::helpers::{constraint_columns, owning_table_name};
use crate::advisor::payload::{
    NamingTemplate, COLUMN_LIST_TOKEN, REFERENCED_COLUMN_NAME_TOKEN, REFERENCED_TABLE_NAME_TOKEN,
    REFERENCING_COLUMN_NAME_TOKEN, REFERENCING_TABLE_NAME_TOKEN, TABLE_NAME_TOKEN,
};
use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::error::{AdvisorError, RuleError};
use crate::syntax::names::{index_column_name, simple_name};
use crate::syntax::{constraint_name, NodeKind, NodeRef};
use crate::types::{advice_codes, RuleType};
use sqlparser::ast::{Statement, TableConstraint};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexKind {
    Index,
    UniqueKey,
    ForeignKey,
    PrimaryKey,
}

impl IndexKind {
    fn from_rule_type(rule_type: RuleType) -> Option<Self> {
        match rule_type {
            RuleType::NamingIndexIdx => Some(Self::Index),
            RuleType::NamingIndexUk => Some(Self::UniqueKey),
            RuleType::NamingIndexFk => Some(Self::ForeignKey),
            RuleType::NamingIndexPk => Some(Self::PrimaryKey),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Index => "Index",
            Self::UniqueKey => "Unique key",
            Self::ForeignKey => "Foreign key",
            Self::PrimaryKey => "Primary key",
        }
    }

    fn code(self) -> i32 {
        match self {
            Self::Index => advice_codes::NAMING_INDEX_CONVENTION_MISMATCH,
            Self::UniqueKey => advice_codes::NAMING_UK_CONVENTION_MISMATCH,
            Self::ForeignKey => advice_codes::NAMING_FK_CONVENTION_MISMATCH,
            Self::PrimaryKey => advice_codes::NAMING_PK_CONVENTION_MISMATCH,
        }
    }

    fn of_constraint(constraint: &TableConstraint) -> Option<Self> {
        match constraint {
            TableConstraint::Index { .. } => Some(Self::Index),
            TableConstraint::Unique { .. } => Some(Self::UniqueKey),
            TableConstraint::ForeignKey { .. } => Some(Self::ForeignKey),
            TableConstraint::PrimaryKey { .. } => Some(Self::PrimaryKey),
            _ => None,
        }
    }
}

/// A named index-like object and its template values.
struct NamedIndex {
    kind: IndexKind,
    name: String,
    table: String,
    values: HashMap<&'static str, String>,
}

/// MySQL keeps the key name apart from the constraint name.
fn index_name(constraint: &TableConstraint) -> Option<String> {
    let name = match constraint {
        TableConstraint::Unique {
            name, index_name, ..
        }
        | TableConstraint::PrimaryKey {
            name, index_name, ..
        } => name.as_ref().or(index_name.as_ref()),
        other => constraint_name(other),
    };
    name.map(|ident| ident.value.clone())
}

fn from_constraint(node: NodeRef<'_>) -> Result<Option<NamedIndex>, RuleError> {
    let constraint = node.table_constraint()?;
    let (Some(kind), Some(name)) = (IndexKind::of_constraint(constraint), index_name(constraint))
    else {
        return Ok(None);
    };
    let table = owning_table_name(node);
    let columns = constraint_columns(constraint).join("_");
    let values = match constraint {
        TableConstraint::ForeignKey {
            foreign_table,
            referred_columns,
            ..
        } => HashMap::from([
            (REFERENCING_TABLE_NAME_TOKEN, table.clone()),
            (REFERENCING_COLUMN_NAME_TOKEN, columns),
            (REFERENCED_TABLE_NAME_TOKEN, simple_name(foreign_table)),
            (
                REFERENCED_COLUMN_NAME_TOKEN,
                referred_columns
                    .iter()
                    .map(|column| column.value.as_str())
                    .collect::<Vec<_>>()
                    .join("_"),
            ),
        ]),
        _ => HashMap::from([(TABLE_NAME_TOKEN, table.clone()), (COLUMN_LIST_TOKEN, columns)]),
    };
    Ok(Some(NamedIndex {
        kind,
        name,
        table,
        values,
    }))
}

fn from_create_index(node: NodeRef<'_>) -> Result<Option<NamedIndex>, RuleError> {
    let Statement::CreateIndex(create) = node.statement()? else {
        return Ok(None);
    };
    let Some(name) = &create.name else {
        return Ok(None);
    };
    let table = simple_name(&create.table_name);
    let columns: Vec<String> = create.columns.iter().map(index_column_name).collect();
    Ok(Some(NamedIndex {
        kind: if create.unique {
            IndexKind::UniqueKey
        } else {
            IndexKind::Index
        },
        name: simple_name(name),
        values: HashMap::from([
            (TABLE_NAME_TOKEN, table.clone()),
            (COLUMN_LIST_TOKEN, columns.join("_")),
        ]),
        table,
    }))
}

pub struct IndexNaming {
    base: BaseRule,
    kind: IndexKind,
    template: NamingTemplate,
}

impl IndexNaming {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        let kind = IndexKind::from_rule_type(ctx.rule.rule_type).ok_or_else(|| {
            AdvisorError::InvalidTemplate {
                rule: ctx.rule.rule_type,
                reason: "not an index naming rule".to_string(),
            }
        })?;
        Ok(Box::new(Self {
            base: ctx.base(),
            kind,
            template: NamingTemplate::from_rule(ctx.rule)?,
        }))
    }

    fn check(&mut self, index: NamedIndex, line: usize) -> Result<(), RuleError> {
        let regex = self
            .template
            .regex(&index.values)
            .map_err(|err| RuleError::Check(err.to_string()))?;
        let label = self.kind.label();
        if !regex.is_match(&index.name) {
            self.base.report(
                self.kind.code(),
                format!(
                    "{label} in table \"{}\" mismatches the naming convention, expect \"{}\" but found \"{}\"",
                    index.table,
                    regex.as_str(),
                    index.name
                ),
                line,
            );
        } else if index.name.chars().count() > self.template.max_length {
            self.base.report(
                self.kind.code(),
                format!(
                    "{label} \"{}\" in table \"{}\" mismatches the naming convention, its length should be within {} characters",
                    index.name, index.table, self.template.max_length
                ),
                line,
            );
        }
        Ok(())
    }
}

impl Rule for IndexNaming {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let index = match kind {
            NodeKind::TableConstraint => from_constraint(node)?,
            NodeKind::CreateIndexStmt => from_create_index(node)?,
            _ => None,
        };
        match index {
            Some(index) if index.kind == self.kind => self.check(index, node.line()),
            _ => Ok(()),
        }
    }

    rule_base!();
}
