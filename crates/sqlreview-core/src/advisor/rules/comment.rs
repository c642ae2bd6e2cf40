//! Comment conventions for tables, columns and `COMMENT ON`.

use super::helpers::{declared_column_options, owning_table_name, table_comment};
use crate::advisor::payload::CommentConventionRulePayload;
use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::error::{AdvisorError, RuleError};
use crate::syntax::names::simple_name;
use crate::syntax::{NodeKind, NodeRef};
use crate::types::advice_codes;
use sqlparser::ast::{ColumnOption, Statement};

/// `required` plus a length cap, where a non-positive `maxLength` means no cap.
struct Convention {
    required: bool,
    max_length: usize,
}

impl Convention {
    fn from_context(ctx: &RuleContext<'_>) -> Result<Self, AdvisorError> {
        let payload: CommentConventionRulePayload = ctx.payload()?;
        Ok(Self {
            required: payload.required,
            max_length: usize::try_from(payload.max_length).unwrap_or(0),
        })
    }

    fn too_long(&self, text: &str) -> bool {
        self.max_length > 0 && text.chars().count() > self.max_length
    }
}

/// Tables created without a comment, or with one over the length cap.
pub struct TableComment {
    base: BaseRule,
    convention: Convention,
}

impl TableComment {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            convention: Convention::from_context(ctx)?,
        }))
    }
}

impl Rule for TableComment {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::CreateTableStmt {
            return Ok(());
        }
        let Statement::CreateTable(create) = node.statement()? else {
            return Ok(());
        };
        let table = simple_name(&create.name);
        match table_comment(create) {
            None if self.convention.required => self.base.report(
                advice_codes::COMMENT_EMPTY,
                format!("Table `{table}` requires comments"),
                node.line(),
            ),
            Some(text) if self.convention.too_long(text) => self.base.report(
                advice_codes::COMMENT_TOO_LONG,
                format!(
                    "The length of table `{table}` comment should be within {} characters",
                    self.convention.max_length
                ),
                node.line(),
            ),
            _ => {}
        }
        Ok(())
    }

    rule_base!();
}

/// Columns defined or redefined without a comment, or with one over the
/// length cap.
pub struct ColumnComment {
    base: BaseRule,
    convention: Convention,
}

impl ColumnComment {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            convention: Convention::from_context(ctx)?,
        }))
    }
}

impl Rule for ColumnComment {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let Some((column, options)) = declared_column_options(node, kind)? else {
            return Ok(());
        };
        let comment = options.iter().find_map(|option| match option {
            ColumnOption::Comment(text) => Some(text.as_str()),
            _ => None,
        });
        let table = owning_table_name(node);
        match comment {
            None if self.convention.required => self.base.report(
                advice_codes::COMMENT_EMPTY,
                format!("Column `{table}`.`{column}` requires comments"),
                node.line(),
            ),
            Some(text) if self.convention.too_long(text) => self.base.report(
                advice_codes::COMMENT_TOO_LONG,
                format!(
                    "The length of column `{table}`.`{column}` comment should be within {} characters",
                    self.convention.max_length
                ),
                node.line(),
            ),
            _ => {}
        }
        Ok(())
    }

    rule_base!();
}

/// Caps the length of `COMMENT ON ... IS '...'` text. A non-positive
/// `maxLength` disables the check.
pub struct CommentLength {
    base: BaseRule,
    convention: Convention,
}

impl CommentLength {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            convention: Convention::from_context(ctx)?,
        }))
    }
}

impl Rule for CommentLength {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::CommentStmt {
            return Ok(());
        }
        let Statement::Comment {
            comment: Some(text),
            ..
        } = node.statement()?
        else {
            return Ok(());
        };
        if self.convention.too_long(text) {
            self.base.report(
                advice_codes::COMMENT_TOO_LONG,
                format!(
                    "The length of comment should be within {} characters",
                    self.convention.max_length
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}
