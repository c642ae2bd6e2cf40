//! Rules backed by a live `EXPLAIN`.
//!
//! Each rule instance explains at most [`MAXIMUM_EXPLAIN_COUNT`] statements.
//! Without a driver the rules only check what the syntax alone tells them.
//!
//! [`MAXIMUM_EXPLAIN_COUNT`]: crate::advisor::MAXIMUM_EXPLAIN_COUNT

use super::helpers::payload_limit;
use crate::advisor::{estimated_rows, BaseRule, ExplainBudget, QueryDriver, Rule, RuleContext};
use crate::error::{AdvisorError, DriverError, RuleError};
use crate::syntax::{NodeKind, NodeRef};
use crate::types::{advice_codes, Advice};
use sqlparser::ast::{SetExpr, Statement};
use std::sync::Arc;
#[cfg(feature = "tracing")]
use tracing::debug;

/// Title of the advice produced when an `EXPLAIN` fails.
pub const DRY_RUN_FAILED_TITLE: &str = "Dry run failed";

/// Driver plus the per-instance explain budget.
struct Explainer {
    driver: Option<Arc<dyn QueryDriver>>,
    budget: ExplainBudget,
}

impl Explainer {
    fn new(ctx: &RuleContext<'_>) -> Self {
        Self {
            driver: ctx.driver.clone(),
            budget: ExplainBudget::default(),
        }
    }

    /// Explains `statement`; `None` when there is no driver or budget left.
    fn explain(&mut self, statement: &str) -> Option<Result<Vec<String>, DriverError>> {
        let driver = self.driver.as_ref()?;
        if !self.budget.try_spend() {
            #[cfg(feature = "tracing")]
            debug!("explain budget exhausted, skipping statement");
            return None;
        }
        Some(driver.explain(statement))
    }
}

fn dry_run_failure(code: i32, node: NodeRef<'_>, error: &DriverError) -> Advice {
    #[cfg(feature = "tracing")]
    debug!(%error, line = node.script_line(), "explain failed");
    Advice::error(
        code,
        DRY_RUN_FAILED_TITLE,
        format!("\"{}\" dry runs failed: {error}", node.statement_text()),
    )
    .at_line(node.line())
}

/// INSERT row count: literal VALUES rows, or the estimate for INSERT ... SELECT.
pub struct InsertRowLimit {
    base: BaseRule,
    maximum: u64,
    explainer: Explainer,
}

impl InsertRowLimit {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            maximum: payload_limit(ctx)?,
            explainer: Explainer::new(ctx),
        }))
    }

    fn report_rows(&mut self, node: NodeRef<'_>, rows: u64) {
        if rows > self.maximum {
            self.base.report(
                advice_codes::INSERT_TOO_MANY_ROWS,
                format!(
                    "\"{}\" inserts {rows} rows. The count exceeds {}.",
                    node.statement_text(),
                    self.maximum
                ),
                node.line(),
            );
        }
    }
}

impl Rule for InsertRowLimit {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::InsertStmt || self.maximum == 0 {
            return Ok(());
        }
        let Statement::Insert(insert) = node.statement()? else {
            return Ok(());
        };
        let Some(source) = insert.source.as_deref() else {
            return Ok(());
        };

        if let SetExpr::Values(values) = source.body.as_ref() {
            self.report_rows(node, values.rows.len() as u64);
            return Ok(());
        }

        match self.explainer.explain(node.statement_text()) {
            Some(Ok(plan)) => {
                if let Some(rows) = estimated_rows(&plan) {
                    self.report_rows(node, rows);
                }
            }
            Some(Err(error)) => self.base.add_advice(dry_run_failure(
                advice_codes::STATEMENT_EXPLAIN_QUERY_FAILED,
                node,
                &error,
            )),
            None => {}
        }
        Ok(())
    }

    rule_base!();
}

/// Estimated rows touched by UPDATE and DELETE.
pub struct AffectedRowLimit {
    base: BaseRule,
    maximum: u64,
    explainer: Explainer,
}

impl AffectedRowLimit {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            maximum: payload_limit(ctx)?,
            explainer: Explainer::new(ctx),
        }))
    }
}

impl Rule for AffectedRowLimit {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if !matches!(kind, NodeKind::UpdateStmt | NodeKind::DeleteStmt) || self.maximum == 0 {
            return Ok(());
        }
        match self.explainer.explain(node.statement_text()) {
            Some(Ok(plan)) => match estimated_rows(&plan) {
                Some(rows) if rows > self.maximum => self.base.report(
                    advice_codes::STATEMENT_AFFECTED_ROW_EXCEEDS_LIMIT,
                    format!(
                        "\"{}\" affected {rows} rows (estimated). The count exceeds {}.",
                        node.statement_text(),
                        self.maximum
                    ),
                    node.line(),
                ),
                _ => {}
            },
            Some(Err(error)) => self.base.add_advice(dry_run_failure(
                advice_codes::STATEMENT_EXPLAIN_QUERY_FAILED,
                node,
                &error,
            )),
            None => {}
        }
        Ok(())
    }

    rule_base!();
}

/// Explains every DML statement and reports the ones the database rejects.
pub struct DmlDryRun {
    base: BaseRule,
    explainer: Explainer,
}

impl DmlDryRun {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            explainer: Explainer::new(ctx),
        }))
    }
}

impl Rule for DmlDryRun {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if !kind.is_dml() {
            return Ok(());
        }
        if let Some(Err(error)) = self.explainer.explain(node.statement_text()) {
            self.base.add_advice(dry_run_failure(
                advice_codes::STATEMENT_DML_DRY_RUN_FAILED,
                node,
                &error,
            ));
        }
        Ok(())
    }

    rule_base!();
}

#[cfg(test)]
mod tests {
    use super::DRY_RUN_FAILED_TITLE;
    use crate::advisor::{CheckContext, MAXIMUM_EXPLAIN_COUNT};
    use crate::test_utils::{
        check_sql, check_with, rule_with_payload, rule_without_payload, StaticDriver,
    };
    use crate::types::{advice_codes, AdviceStatus, Engine, RuleType};
    use serde_json::json;
    use std::sync::Arc;

    fn with_driver(driver: StaticDriver) -> CheckContext {
        CheckContext::new(Engine::Postgres).with_driver(Arc::new(driver))
    }

    #[test]
    fn test_insert_values_counted_without_driver() {
        let rule = rule_with_payload(RuleType::StatementInsertRowLimit, json!({"number": 2}));
        let advice = check_sql(
            "INSERT INTO t (a) VALUES (1), (2), (3);\nINSERT INTO t (a) VALUES (1)",
            Engine::Mysql,
            rule,
        );
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::INSERT_TOO_MANY_ROWS);
        assert_eq!(
            advice[0].content,
            "\"INSERT INTO t (a) VALUES (1), (2), (3)\" inserts 3 rows. The count exceeds 2."
        );
    }

    #[test]
    fn test_insert_select_uses_explain_estimate() {
        let driver = StaticDriver::default().with_plan(
            "FROM big",
            &[
                "Insert on t  (cost=0.00..1.00 rows=0 width=0)",
                "  ->  Seq Scan on big  (cost=0.00..1.00 rows=5000 width=4)",
            ],
        );
        let rule = rule_with_payload(RuleType::StatementInsertRowLimit, json!({"number": 100}));
        let advice = check_with("INSERT INTO t (a) SELECT a FROM big", &with_driver(driver), rule);
        assert_eq!(advice.len(), 1);
        assert!(advice[0].content.contains("inserts 5000 rows"));
    }

    #[test]
    fn test_affected_rows_and_explain_failure() {
        let driver = StaticDriver::default()
            .with_plan("FROM big", &["Delete on big  (cost=0.00..10.00 rows=2000 width=6)"])
            .with_error("missing", "relation \"missing\" does not exist");
        let rule = rule_with_payload(RuleType::StatementAffectedRowLimit, json!({"number": 1000}));
        let sql = "DELETE FROM big WHERE a > 1;\nUPDATE missing SET a = 1 WHERE b = 2;\nDELETE FROM small WHERE a = 1";
        let advice = check_with(sql, &with_driver(driver), rule);
        assert_eq!(advice.len(), 2);

        assert_eq!(advice[0].code, advice_codes::STATEMENT_AFFECTED_ROW_EXCEEDS_LIMIT);
        assert_eq!(advice[0].position.line, 1);
        assert_eq!(advice[0].title, "statement.affected-row-limit");

        assert_eq!(advice[1].code, advice_codes::STATEMENT_EXPLAIN_QUERY_FAILED);
        assert_eq!(advice[1].status, AdviceStatus::Error);
        assert_eq!(advice[1].title, DRY_RUN_FAILED_TITLE);
        assert_eq!(advice[1].position.line, 2);
        assert_eq!(
            advice[1].content,
            "\"UPDATE missing SET a = 1 WHERE b = 2\" dry runs failed: relation \"missing\" does not exist"
        );
    }

    #[test]
    fn test_row_rules_skip_without_driver() {
        let rule = rule_with_payload(RuleType::StatementAffectedRowLimit, json!({"number": 1}));
        assert!(check_sql("DELETE FROM t WHERE a = 1", Engine::Postgres, rule).is_empty());
    }

    #[test]
    fn test_dry_run_reports_failures_only() {
        let driver = StaticDriver::default().with_error("nope", "column \"nope\" does not exist");
        let rule = rule_without_payload(RuleType::StatementDmlDryRun);
        let sql = "UPDATE t SET a = 1 WHERE id = 1;\nSELECT nope FROM t;\nUPDATE t SET nope = 1 WHERE id = 1";
        let advice = check_with(sql, &with_driver(driver), rule);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::STATEMENT_DML_DRY_RUN_FAILED);
        assert_eq!(advice[0].position.line, 3);
    }

    #[test]
    fn test_explain_budget_caps_queries() {
        let driver = StaticDriver::default().with_error("t", "boom");
        let rule = rule_without_payload(RuleType::StatementDmlDryRun);
        let sql = vec!["DELETE FROM t WHERE a = 1"; MAXIMUM_EXPLAIN_COUNT + 5].join(";\n");
        let advice = check_with(&sql, &with_driver(driver), rule);
        assert_eq!(advice.len(), MAXIMUM_EXPLAIN_COUNT);
    }
}
