//! INSERT, UPDATE and DELETE shape rules.

use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::error::{AdvisorError, RuleError};
use crate::syntax::{NodeKind, NodeRef};
use crate::types::advice_codes;
use sqlparser::ast::{Expr, OrderByKind, Query, Statement};

fn insert_source<'t>(node: NodeRef<'t>) -> Result<Option<&'t Query>, RuleError> {
    Ok(match node.statement()? {
        Statement::Insert(insert) => insert.source.as_deref(),
        _ => None,
    })
}

pub struct InsertMustSpecifyColumn {
    base: BaseRule,
}

impl InsertMustSpecifyColumn {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for InsertMustSpecifyColumn {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::InsertStmt {
            return Ok(());
        }
        if let Statement::Insert(insert) = node.statement()? {
            if insert.columns.is_empty() {
                self.base.report(
                    advice_codes::INSERT_NOT_SPECIFY_COLUMN,
                    format!(
                        "The INSERT statement must specify columns but \"{}\" does not",
                        node.statement_text()
                    ),
                    node.line(),
                );
            }
        }
        Ok(())
    }

    rule_base!();
}

fn is_rand_call(expr: &Expr) -> bool {
    match expr {
        Expr::Function(function) => {
            let name = function.name.to_string();
            name.eq_ignore_ascii_case("rand") || name.eq_ignore_ascii_case("random")
        }
        _ => false,
    }
}

pub struct InsertDisallowOrderByRand {
    base: BaseRule,
}

impl InsertDisallowOrderByRand {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for InsertDisallowOrderByRand {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::InsertStmt {
            return Ok(());
        }
        let Some(source) = insert_source(node)? else {
            return Ok(());
        };
        let uses_rand = source.order_by.as_ref().is_some_and(|order_by| {
            matches!(&order_by.kind, OrderByKind::Expressions(exprs)
                if exprs.iter().any(|item| is_rand_call(&item.expr)))
        });
        if uses_rand {
            self.base.report(
                advice_codes::INSERT_USE_ORDER_BY_RAND,
                format!(
                    "\"{}\" uses ORDER BY RAND in the INSERT statement",
                    node.statement_text()
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct DisallowLimit {
    base: BaseRule,
}

impl DisallowLimit {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for DisallowLimit {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let found = match kind {
            NodeKind::UpdateStmt => matches!(node.statement()?, Statement::Update { limit: Some(_), .. })
                .then_some((advice_codes::UPDATE_USE_LIMIT, "UPDATE")),
            NodeKind::DeleteStmt => match node.statement()? {
                Statement::Delete(delete) => delete
                    .limit
                    .is_some()
                    .then_some((advice_codes::DELETE_USE_LIMIT, "DELETE")),
                _ => None,
            },
            NodeKind::InsertStmt => insert_source(node)?
                .is_some_and(|source| source.limit_clause.is_some())
                .then_some((advice_codes::INSERT_USE_LIMIT, "INSERT")),
            _ => None,
        };
        if let Some((code, verb)) = found {
            self.base.report(
                code,
                format!(
                    "LIMIT clause is forbidden in {verb} statement, but \"{}\" uses",
                    node.statement_text()
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct DisallowOrderBy {
    base: BaseRule,
}

impl DisallowOrderBy {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for DisallowOrderBy {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::DeleteStmt {
            return Ok(());
        }
        if let Statement::Delete(delete) = node.statement()? {
            if !delete.order_by.is_empty() {
                self.base.report(
                    advice_codes::DELETE_USE_ORDER_BY,
                    format!(
                        "ORDER BY clause is forbidden in DELETE statement, but \"{}\" uses",
                        node.statement_text()
                    ),
                    node.line(),
                );
            }
        }
        Ok(())
    }

    rule_base!();
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{check_sql, rule_without_payload};
    use crate::types::{advice_codes, Advice, Engine, RuleType};

    fn codes(advice: &[Advice]) -> Vec<i32> {
        advice.iter().map(|a| a.code).collect()
    }

    #[test]
    fn test_insert_must_specify_column() {
        let rule = rule_without_payload(RuleType::StatementInsertMustSpecifyColumn);
        let advice = check_sql(
            "INSERT INTO t VALUES (1, 2);\nINSERT INTO t (a, b) VALUES (1, 2)",
            Engine::Postgres,
            rule,
        );
        assert_eq!(codes(&advice), vec![advice_codes::INSERT_NOT_SPECIFY_COLUMN]);
        assert_eq!(
            advice[0].content,
            "The INSERT statement must specify columns but \"INSERT INTO t VALUES (1, 2)\" does not"
        );
    }

    #[test]
    fn test_insert_order_by_rand() {
        let rule = rule_without_payload(RuleType::StatementInsertDisallowOrderByRand);
        let sql = "INSERT INTO t (a) SELECT a FROM s ORDER BY RAND();\nINSERT INTO t (a) SELECT a FROM s ORDER BY a";
        let advice = check_sql(sql, Engine::Mysql, rule);
        assert_eq!(codes(&advice), vec![advice_codes::INSERT_USE_ORDER_BY_RAND]);
        assert_eq!(advice[0].position.line, 1);
    }

    #[test]
    fn test_disallow_limit_per_statement_kind() {
        let rule = rule_without_payload(RuleType::StatementDisallowLimit);
        let sql = "UPDATE t SET a = 1 WHERE b = 1 LIMIT 10;\nDELETE FROM t WHERE b = 1 LIMIT 10;\nINSERT INTO t (a) SELECT a FROM s LIMIT 10;\nDELETE FROM t WHERE b = 2";
        let advice = check_sql(sql, Engine::Mysql, rule);
        assert_eq!(
            codes(&advice),
            vec![
                advice_codes::UPDATE_USE_LIMIT,
                advice_codes::DELETE_USE_LIMIT,
                advice_codes::INSERT_USE_LIMIT,
            ]
        );
        assert!(advice[0]
            .content
            .starts_with("LIMIT clause is forbidden in UPDATE statement"));
    }

    #[test]
    fn test_delete_order_by() {
        let rule = rule_without_payload(RuleType::StatementDisallowOrderBy);
        let advice = check_sql(
            "DELETE FROM t WHERE a = 1 ORDER BY id LIMIT 1",
            Engine::Mariadb,
            rule,
        );
        assert_eq!(codes(&advice), vec![advice_codes::DELETE_USE_ORDER_BY]);
    }
}
