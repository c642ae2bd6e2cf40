//! SQL review engine: rule dispatch, registry, and the check entry point.
//!
//! A check parses the script, builds one fresh instance of every enabled
//! rule, and walks the syntax tree exactly once with a [`RuleDispatcher`].
//! Configuration problems abort the check; everything else ends up in the
//! advice list or in [`CheckResult::failures`].

mod dispatch;
pub mod driver;
pub mod payload;
mod registry;
mod rule;
pub mod rules;
#[cfg(feature = "live-driver")]
mod sqlx_driver;

pub use dispatch::{RuleDispatcher, RuleFailure, WalkPhase};
pub use driver::{estimated_rows, ExplainBudget, QueryDriver, MAXIMUM_EXPLAIN_COUNT};
pub use registry::{AdvisorRegistry, RuleFactory};
pub use rule::{BaseRule, Rule, RuleContext};
#[cfg(feature = "live-driver")]
pub use sqlx_driver::SqlxQueryDriver;

use crate::catalog::Catalog;
use crate::error::{AdvisorError, ParseError};
use crate::parser::parse_script;
use crate::syntax::SyntaxTree;
use crate::types::{advice_codes, Advice, Engine, Position, SqlReviewRule};
use std::sync::Arc;
#[cfg(feature = "tracing")]
use tracing::{debug, info_span, trace};

/// Title of the advice returned for a script that does not parse.
pub const SYNTAX_ERROR_TITLE: &str = "Syntax error";

/// Collaborators injected into a check.
#[derive(Clone)]
pub struct CheckContext {
    pub engine: Engine,
    pub catalog: Option<Arc<dyn Catalog>>,
    pub driver: Option<Arc<dyn QueryDriver>>,
}

impl CheckContext {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            catalog: None,
            driver: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_driver(mut self, driver: Arc<dyn QueryDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    fn rule_context<'a>(&self, rule: &'a SqlReviewRule) -> RuleContext<'a> {
        RuleContext {
            rule,
            engine: self.engine,
            catalog: self.catalog.clone(),
            driver: self.driver.clone(),
        }
    }
}

impl std::fmt::Debug for CheckContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckContext")
            .field("engine", &self.engine)
            .field("catalog", &self.catalog.as_ref().map(|c| c.database_name()))
            .field("driver", &self.driver.is_some())
            .finish()
    }
}

/// Advice plus the rule failures the dispatcher swallowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResult {
    pub advice: Vec<Advice>,
    pub failures: Vec<RuleFailure>,
}

/// Reviews `sql` against `rules` and returns the advice, sorted by line.
pub fn sql_review_check(
    sql: &str,
    rules: &[SqlReviewRule],
    ctx: &CheckContext,
    registry: &AdvisorRegistry,
) -> Result<Vec<Advice>, AdvisorError> {
    check_with_diagnostics(sql, rules, ctx, registry).map(|result| result.advice)
}

/// Like [`sql_review_check`], also returning rule failures.
pub fn check_with_diagnostics(
    sql: &str,
    rules: &[SqlReviewRule],
    ctx: &CheckContext,
    registry: &AdvisorRegistry,
) -> Result<CheckResult, AdvisorError> {
    #[cfg(feature = "tracing")]
    let _span = info_span!("sql_review_check", engine = %ctx.engine, rules = rules.len()).entered();

    let instances = instantiate_rules(rules, ctx, registry)?;

    let script = match parse_script(sql, ctx.engine) {
        Ok(script) => script,
        Err(err) => {
            #[cfg(feature = "tracing")]
            debug!(error = %err, "script failed to parse");
            return Ok(CheckResult {
                advice: vec![syntax_error_advice(&err)],
                failures: Vec::new(),
            });
        }
    };

    let tree = SyntaxTree::build(&script);
    #[cfg(feature = "tracing")]
    debug!(
        statements = tree.statement_count(),
        nodes = tree.len(),
        rules = instances.len(),
        "walking syntax tree"
    );
    let mut dispatcher = RuleDispatcher::new(instances);
    dispatcher.walk(&tree);

    let (mut advice, failures) = dispatcher.into_parts();
    advice.sort_by(|a, b| {
        a.position
            .line
            .cmp(&b.position.line)
            .then_with(|| a.content.cmp(&b.content))
    });

    Ok(CheckResult { advice, failures })
}

fn instantiate_rules(
    rules: &[SqlReviewRule],
    ctx: &CheckContext,
    registry: &AdvisorRegistry,
) -> Result<Vec<Box<dyn Rule>>, AdvisorError> {
    let mut instances = Vec::new();
    for rule in rules {
        if !rule.is_enabled() || !rule.applies_to(ctx.engine) {
            #[cfg(feature = "tracing")]
            trace!(rule = %rule.rule_type, "rule disabled for this check");
            continue;
        }
        let Some(factory) = registry.lookup(ctx.engine, rule.rule_type) else {
            #[cfg(feature = "tracing")]
            debug!(rule = %rule.rule_type, engine = %ctx.engine, "no advisor registered");
            continue;
        };
        instances.push(factory(&ctx.rule_context(rule))?);
    }
    Ok(instances)
}

fn syntax_error_advice(err: &ParseError) -> Advice {
    Advice::error(
        advice_codes::STATEMENT_SYNTAX_ERROR,
        SYNTAX_ERROR_TITLE,
        err.message.clone(),
    )
    .with_position(err.position.unwrap_or(Position::line(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AdviceStatus, RuleLevel, RuleType};
    use serde_json::json;

    fn check(sql: &str, rules: &[SqlReviewRule]) -> Result<CheckResult, AdvisorError> {
        check_with_diagnostics(
            sql,
            rules,
            &CheckContext::new(Engine::Postgres),
            &AdvisorRegistry::builtin(),
        )
    }

    #[test]
    fn test_syntax_error_is_single_advice() {
        let rules = [SqlReviewRule::new(RuleType::StatementWhereRequire, RuleLevel::Error)];
        let result = check("SELECT 1;\nSELEC 2;", &rules).unwrap();
        assert_eq!(result.advice.len(), 1);
        let advice = &result.advice[0];
        assert_eq!(advice.code, advice_codes::STATEMENT_SYNTAX_ERROR);
        assert_eq!(advice.status, AdviceStatus::Error);
        assert_eq!(advice.title, SYNTAX_ERROR_TITLE);
        assert_eq!(advice.position.line, 2);
    }

    #[test]
    fn test_bad_payload_fails_fast() {
        let rules = [SqlReviewRule::new(RuleType::NamingTable, RuleLevel::Error)];
        assert!(matches!(
            check("SELECT 1", &rules),
            Err(AdvisorError::MissingPayload { .. })
        ));
    }

    #[test]
    fn test_disabled_and_unregistered_rules_are_skipped() {
        let rules = [
            SqlReviewRule::new(RuleType::StatementWhereRequire, RuleLevel::Disabled),
            // MySQL-only rule under Postgres: no advisor registered.
            SqlReviewRule::new(RuleType::StatementDisallowLimit, RuleLevel::Error),
            SqlReviewRule::new(RuleType::NamingTable, RuleLevel::Error)
                .with_engine(Engine::Mysql)
                .with_payload(json!({"format": "^x$"})),
        ];
        let result = check("DELETE FROM t", &rules).unwrap();
        assert!(result.advice.is_empty());
        assert!(result.failures.is_empty());
    }

    #[test]
    fn test_advice_sorted_by_line_then_content() {
        let rules = [
            SqlReviewRule::new(RuleType::StatementWhereRequire, RuleLevel::Warning),
            SqlReviewRule::new(RuleType::StatementSelectNoSelectAll, RuleLevel::Error),
        ];
        let sql = "SELECT * FROM b;\nDELETE FROM a;\nSELECT * FROM a;";
        let lines: Vec<_> = check(sql, &rules)
            .unwrap()
            .advice
            .iter()
            .map(|advice| advice.position.line)
            .collect();
        assert_eq!(lines, vec![1, 2, 3]);
    }

    #[test]
    fn test_context_debug_hides_collaborators() {
        let rendered = format!("{:?}", CheckContext::new(Engine::Mysql));
        assert!(rendered.contains("Mysql"));
        assert!(rendered.contains("driver: false"));
    }
}
