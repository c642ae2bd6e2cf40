//! Table and column naming rules.
//!
//! A table name is checked where it is introduced: `CREATE TABLE`,
//! `RENAME TABLE` and `ALTER TABLE ... RENAME TO`. A column name is checked
//! in its definition and in `RENAME COLUMN` / `CHANGE COLUMN`.

use super::helpers::{owning_table_name, renamed_table_name};
use super::keywords::is_reserved_keyword;
use crate::advisor::payload::{NamingCaseRulePayload, NamingFormat, NamingViolation};
use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::error::{AdvisorError, RuleError};
use crate::syntax::names::simple_name;
use crate::syntax::{NodeKind, NodeRef};
use crate::types::advice_codes;
use sqlparser::ast::{AlterTableOperation, ObjectType, Statement};

/// Table names introduced at `node`.
fn introduced_tables(node: NodeRef<'_>, kind: NodeKind) -> Result<Vec<String>, RuleError> {
    Ok(match kind {
        NodeKind::CreateTableStmt => match node.statement()? {
            Statement::CreateTable(create) => vec![simple_name(&create.name)],
            _ => Vec::new(),
        },
        NodeKind::OtherStmt => match node.statement()? {
            Statement::RenameTable(renames) => renames
                .iter()
                .map(|rename| simple_name(&rename.new_name))
                .collect(),
            _ => Vec::new(),
        },
        NodeKind::AlterTableCmd => renamed_table_name(node.alter_cmd()?).into_iter().collect(),
        _ => Vec::new(),
    })
}

/// Column names introduced at `node`.
fn introduced_columns(node: NodeRef<'_>, kind: NodeKind) -> Result<Vec<String>, RuleError> {
    Ok(match kind {
        NodeKind::ColumnDef => vec![node.column_def()?.name.value.clone()],
        NodeKind::AlterTableCmd => match node.alter_cmd()? {
            AlterTableOperation::RenameColumn {
                new_column_name, ..
            } => vec![new_column_name.value.clone()],
            AlterTableOperation::ChangeColumn {
                old_name, new_name, ..
            } if old_name.value != new_name.value => vec![new_name.value.clone()],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    })
}

fn mismatch(
    subject: &str,
    convention: &str,
    format: &NamingFormat,
    violation: NamingViolation,
) -> String {
    match violation {
        NamingViolation::Format => format!(
            "{subject} mismatches {convention} naming convention, naming format should be \"{}\"",
            format.format
        ),
        NamingViolation::Length => format!(
            "{subject} mismatches {convention} naming convention, its length should be within {} characters",
            format.max_length
        ),
    }
}

pub struct TableNaming {
    base: BaseRule,
    format: NamingFormat,
}

impl TableNaming {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            format: NamingFormat::from_rule(ctx.rule)?,
        }))
    }
}

impl Rule for TableNaming {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        for table in introduced_tables(node, kind)? {
            if let Some(violation) = self.format.check(&table) {
                self.base.report(
                    advice_codes::NAMING_TABLE_CONVENTION_MISMATCH,
                    mismatch(&format!("\"{table}\""), "table", &self.format, violation),
                    node.line(),
                );
            }
        }
        Ok(())
    }

    rule_base!();
}

pub struct ColumnNaming {
    base: BaseRule,
    format: NamingFormat,
}

impl ColumnNaming {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            format: NamingFormat::from_rule(ctx.rule)?,
        }))
    }
}

impl Rule for ColumnNaming {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let columns = introduced_columns(node, kind)?;
        if columns.is_empty() {
            return Ok(());
        }
        let table = owning_table_name(node);
        for column in columns {
            if let Some(violation) = self.format.check(&column) {
                self.base.report(
                    advice_codes::NAMING_COLUMN_CONVENTION_MISMATCH,
                    mismatch(
                        &format!("\"{table}\".\"{column}\""),
                        "column",
                        &self.format,
                        violation,
                    ),
                    node.line(),
                );
            }
        }
        Ok(())
    }

    rule_base!();
}

/// Only tables whose name matches the format may be dropped.
pub struct DropTableNaming {
    base: BaseRule,
    format: NamingFormat,
}

impl DropTableNaming {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            format: NamingFormat::from_rule(ctx.rule)?,
        }))
    }
}

impl Rule for DropTableNaming {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::DropStmt {
            return Ok(());
        }
        let Statement::Drop {
            object_type: ObjectType::Table,
            names,
            ..
        } = node.statement()?
        else {
            return Ok(());
        };
        for name in names {
            let table = simple_name(name);
            if !self.format.regex.is_match(&table) {
                self.base.report(
                    advice_codes::TABLE_DROP_NAMING_CONVENTION_MISMATCH,
                    format!(
                        "\"{table}\" mismatches drop table naming convention, naming format should be \"{}\"",
                        self.format.format
                    ),
                    node.line(),
                );
            }
        }
        Ok(())
    }

    rule_base!();
}

pub struct TableNoKeyword {
    base: BaseRule,
}

impl TableNoKeyword {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for TableNoKeyword {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        for table in introduced_tables(node, kind)? {
            if is_reserved_keyword(&table) {
                self.base.report(
                    advice_codes::NAME_IS_KEYWORD_IDENTIFIER,
                    format!("Table name \"{table}\" is a keyword identifier and should be avoided."),
                    node.line(),
                );
            }
        }
        Ok(())
    }

    rule_base!();
}

pub struct IdentifierNoKeyword {
    base: BaseRule,
}

impl IdentifierNoKeyword {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for IdentifierNoKeyword {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        for column in introduced_columns(node, kind)? {
            if is_reserved_keyword(&column) {
                self.base.report(
                    advice_codes::NAME_IS_KEYWORD_IDENTIFIER,
                    format!("Identifier \"{column}\" is a keyword and should be avoided"),
                    node.line(),
                );
            }
        }
        Ok(())
    }

    rule_base!();
}

/// Table and column identifiers must be all upper or all lower case.
pub struct IdentifierCase {
    base: BaseRule,
    upper: bool,
}

impl IdentifierCase {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        // A missing payload means lower case.
        let payload: NamingCaseRulePayload = match ctx.rule.payload {
            Some(_) => ctx.payload()?,
            None => NamingCaseRulePayload::default(),
        };
        Ok(Box::new(Self {
            base: ctx.base(),
            upper: payload.upper,
        }))
    }

    fn matches_case(&self, identifier: &str) -> bool {
        if self.upper {
            identifier == identifier.to_uppercase()
        } else {
            identifier == identifier.to_lowercase()
        }
    }
}

impl Rule for IdentifierCase {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let mut identifiers = introduced_tables(node, kind)?;
        identifiers.extend(introduced_columns(node, kind)?);
        let expected = if self.upper { "upper" } else { "lower" };
        for identifier in identifiers {
            if !self.matches_case(&identifier) {
                self.base.report(
                    advice_codes::NAMING_CASE_MISMATCH,
                    format!("Identifier \"{identifier}\" should be {expected} case"),
                    node.line(),
                );
            }
        }
        Ok(())
    }

    rule_base!();
}
