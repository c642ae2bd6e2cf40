//! WHERE clause rules.
//!
//! - `statement.where.require`: UPDATE and DELETE must filter rows.
//! - `statement.where.no-leading-wildcard-like`: `LIKE '%x'` defeats indexes.
//! - `statement.where.no-equal-null`: `= NULL` never matches.
//! - `statement.where.maximum-logical-operator-count`: long OR chains and IN lists.

use super::helpers::statement_index;
use crate::advisor::payload::NumberTypeRulePayload;
use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::error::{AdvisorError, RuleError};
use crate::syntax::visit::walk_expr;
use crate::syntax::{NodeKind, NodeRef};
use crate::types::advice_codes;
use sqlparser::ast::{BinaryOperator, Expr, Statement, Value};

pub struct WhereRequire {
    base: BaseRule,
}

impl WhereRequire {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for WhereRequire {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let has_where = match kind {
            NodeKind::UpdateStmt => matches!(
                node.statement()?,
                Statement::Update {
                    selection: Some(_),
                    ..
                }
            ),
            NodeKind::DeleteStmt => match node.statement()? {
                Statement::Delete(delete) => delete.selection.is_some(),
                _ => true,
            },
            _ => return Ok(()),
        };
        if !has_where {
            self.base.report(
                advice_codes::STATEMENT_NO_WHERE,
                format!("\"{}\" requires WHERE clause", node.statement_text()),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

/// Reports each statement at most once.
pub struct NoLeadingWildcardLike {
    base: BaseRule,
    reported: Option<usize>,
}

impl NoLeadingWildcardLike {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            reported: None,
        }))
    }
}

fn is_leading_wildcard(pattern: &Expr) -> bool {
    match pattern {
        Expr::Value(value) => match &value.value {
            Value::SingleQuotedString(text) | Value::DoubleQuotedString(text) => {
                text.starts_with('%')
            }
            _ => false,
        },
        _ => false,
    }
}

impl Rule for NoLeadingWildcardLike {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::WhereClause {
            return Ok(());
        }
        let statement = statement_index(node);
        if statement.is_some() && self.reported == statement {
            return Ok(());
        }

        let mut found = false;
        walk_expr(node.where_expr()?, &mut |expr| {
            if let Expr::Like { pattern, .. } | Expr::ILike { pattern, .. } = expr {
                found |= is_leading_wildcard(pattern);
            }
        });
        if found {
            self.reported = statement;
            self.base.report(
                advice_codes::STATEMENT_LEADING_WILDCARD_LIKE,
                format!("\"{}\" uses leading wildcard LIKE", node.statement_text()),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct NoEqualNull {
    base: BaseRule,
}

impl NoEqualNull {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

fn is_null_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::Value(value) if matches!(value.value, Value::Null))
}

impl Rule for NoEqualNull {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::WhereClause {
            return Ok(());
        }
        let mut comparisons = Vec::new();
        walk_expr(node.where_expr()?, &mut |expr| {
            if let Expr::BinaryOp { left, op, right } = expr {
                if matches!(op, BinaryOperator::Eq | BinaryOperator::NotEq)
                    && (is_null_literal(left) || is_null_literal(right))
                {
                    comparisons.push(expr.to_string());
                }
            }
        });
        for comparison in comparisons {
            self.base.report(
                advice_codes::STATEMENT_WHERE_NO_EQUAL_NULL,
                format!("WHERE clause contains equal null: {comparison}"),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct MaximumLogicalOperatorCount {
    base: BaseRule,
    maximum: usize,
}

impl MaximumLogicalOperatorCount {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        let payload: NumberTypeRulePayload = ctx.payload()?;
        Ok(Box::new(Self {
            base: ctx.base(),
            maximum: usize::try_from(payload.number).unwrap_or(0),
        }))
    }
}

/// Number of operands of the OR chain rooted at `expr`.
fn or_operands(expr: &Expr) -> usize {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => or_operands(left) + or_operands(right),
        Expr::Nested(inner) => or_operands(inner),
        _ => 1,
    }
}

impl Rule for MaximumLogicalOperatorCount {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::WhereClause || self.maximum == 0 {
            return Ok(());
        }
        let where_expr = node.where_expr()?;

        let or_count = or_operands(where_expr);
        if or_count > self.maximum {
            self.base.report(
                advice_codes::STATEMENT_WHERE_MAXIMUM_LOGICAL_OPERATOR_COUNT,
                format!(
                    "Number of tokens ({or_count}) in the OR predicate operation exceeds limit ({}) in statement \"{}\"",
                    self.maximum,
                    node.statement_text()
                ),
                node.line(),
            );
        }

        let mut in_lists = Vec::new();
        walk_expr(where_expr, &mut |expr| {
            if let Expr::InList { list, .. } = expr {
                in_lists.push(list.len());
            }
        });
        for count in in_lists.into_iter().filter(|count| *count > self.maximum) {
            self.base.report(
                advice_codes::STATEMENT_WHERE_MAXIMUM_LOGICAL_OPERATOR_COUNT,
                format!(
                    "Number of tokens ({count}) in IN predicate operation exceeds limit ({}) in statement \"{}\"",
                    self.maximum,
                    node.statement_text()
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{check_sql, rule_with_payload, rule_without_payload};
    use crate::types::{advice_codes, Advice, Engine, RuleType};
    use serde_json::json;

    fn codes(advice: &[Advice]) -> Vec<i32> {
        advice.iter().map(|a| a.code).collect()
    }

    #[test]
    fn test_update_and_delete_without_where() {
        let rule = rule_without_payload(RuleType::StatementWhereRequire);
        let advice = check_sql(
            "UPDATE t SET x = 1;\nDELETE FROM t WHERE id = 1;\nDELETE FROM t;",
            Engine::Postgres,
            rule,
        );
        assert_eq!(
            codes(&advice),
            vec![advice_codes::STATEMENT_NO_WHERE, advice_codes::STATEMENT_NO_WHERE]
        );
        assert_eq!(advice[0].position.line, 1);
        assert_eq!(advice[0].content, "\"UPDATE t SET x = 1\" requires WHERE clause");
        assert_eq!(advice[1].position.line, 3);
    }

    #[test]
    fn test_select_is_ignored_by_where_require() {
        let rule = rule_without_payload(RuleType::StatementWhereRequire);
        assert!(check_sql("SELECT * FROM t", Engine::Mysql, rule).is_empty());
    }

    #[test]
    fn test_leading_wildcard_like_once_per_statement() {
        let rule = rule_without_payload(RuleType::StatementWhereNoLeadingWildcardLike);
        let advice = check_sql(
            "SELECT * FROM t WHERE a LIKE '%x' AND b LIKE '%y';\nSELECT * FROM t WHERE a LIKE 'x%'",
            Engine::Mysql,
            rule,
        );
        assert_eq!(
            codes(&advice),
            vec![advice_codes::STATEMENT_LEADING_WILDCARD_LIKE]
        );
    }

    #[test]
    fn test_equal_null() {
        let rule = rule_without_payload(RuleType::StatementWhereNoEqualNull);
        let advice = check_sql(
            "SELECT * FROM t WHERE a = NULL OR b IS NULL",
            Engine::Postgres,
            rule,
        );
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].content, "WHERE clause contains equal null: a = NULL");
    }

    #[test]
    fn test_or_chain_and_in_list_limits() {
        let rule = rule_with_payload(
            RuleType::StatementWhereMaximumLogicalOperatorCount,
            json!({"number": 2}),
        );
        let advice = check_sql(
            "SELECT * FROM t WHERE a = 1 OR a = 2 OR a = 3;\nSELECT * FROM t WHERE a IN (1, 2, 3);\nSELECT * FROM t WHERE a = 1 OR b IN (1, 2)",
            Engine::Postgres,
            rule,
        );
        let lines: Vec<_> = advice.iter().map(|a| a.position.line).collect();
        assert_eq!(lines, vec![1, 2]);
        assert!(advice[0].content.contains("OR predicate"));
        assert!(advice[1].content.contains("IN predicate"));
    }
}
