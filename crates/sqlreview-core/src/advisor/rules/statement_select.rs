//! SELECT shape rules.

use super::helpers::statement_index;
use crate::advisor::payload::NumberTypeRulePayload;
use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::error::{AdvisorError, RuleError};
use crate::syntax::{NodeKind, NodeRef};
use crate::types::advice_codes;
use sqlparser::ast::SelectItem;

/// Flags `SELECT *`, once per statement.
pub struct NoSelectAll {
    base: BaseRule,
    reported: Option<usize>,
}

impl NoSelectAll {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            reported: None,
        }))
    }
}

impl Rule for NoSelectAll {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::Select {
            return Ok(());
        }
        let statement = statement_index(node);
        if statement.is_some() && self.reported == statement {
            return Ok(());
        }
        let select_all = node.select()?.projection.iter().any(|item| {
            matches!(
                item,
                SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..)
            )
        });
        if select_all {
            self.reported = statement;
            self.base.report(
                advice_codes::STATEMENT_SELECT_ALL,
                format!("\"{}\" uses SELECT all", node.statement_text()),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct MaximumJoinTableCount {
    base: BaseRule,
    maximum: usize,
}

impl MaximumJoinTableCount {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        let payload: NumberTypeRulePayload = ctx.payload()?;
        Ok(Box::new(Self {
            base: ctx.base(),
            maximum: usize::try_from(payload.number).unwrap_or(0),
        }))
    }
}

impl Rule for MaximumJoinTableCount {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::Select {
            return Ok(());
        }
        // Joins inside derived tables belong to their own SELECT node.
        let joins: usize = node.select()?.from.iter().map(|table| table.joins.len()).sum();
        if joins > self.maximum {
            self.base.report(
                advice_codes::STATEMENT_MAXIMUM_JOIN_TABLE_COUNT,
                format!(
                    "\"{}\" exceeds the maximum number of joins {}.",
                    node.statement_text(),
                    self.maximum
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}
