//! Helpers for rule unit tests.

use crate::advisor::{check_with_diagnostics, AdvisorRegistry, CheckContext, QueryDriver};
use crate::catalog::{Catalog, DatabaseMetadata};
use crate::error::DriverError;
use crate::types::{Advice, Engine, RuleLevel, RuleType, SqlReviewRule};
use std::sync::Arc;

/// Schema snapshot shared by catalog-aware rule tests.
pub const SHOP_CATALOG: &str = r#"{
    "name": "shop",
    "defaultSchema": "public",
    "schemas": [{
        "name": "public",
        "tables": [
            {"name": "orders",
             "columns": [
                {"name": "id", "type": "integer", "nullable": false},
                {"name": "customer_id", "type": "integer"},
                {"name": "note", "type": "varchar(20)"}
             ],
             "indexes": [
                {"name": "orders_pkey", "expressions": ["id"], "unique": true, "primary": true},
                {"name": "idx_orders_customer_id", "expressions": ["customer_id"]}
             ]},
            {"name": "customers",
             "columns": [{"name": "id", "type": "integer", "nullable": false}],
             "indexes": [{"name": "customers_pkey", "expressions": ["id"], "unique": true, "primary": true}]}
        ]
    }]
}"#;

pub fn shop_catalog() -> Arc<dyn Catalog> {
    Arc::new(DatabaseMetadata::from_json(SHOP_CATALOG).expect("valid catalog fixture"))
}

pub fn rule_without_payload(rule_type: RuleType) -> SqlReviewRule {
    SqlReviewRule::new(rule_type, RuleLevel::Warning)
}

pub fn rule_with_payload(rule_type: RuleType, payload: serde_json::Value) -> SqlReviewRule {
    SqlReviewRule::new(rule_type, RuleLevel::Warning).with_payload(payload)
}

/// Runs a single rule, asserting the walk recorded no rule failures.
pub fn check_sql(sql: &str, engine: Engine, rule: SqlReviewRule) -> Vec<Advice> {
    check_with(sql, &CheckContext::new(engine), rule)
}

pub fn check_with(sql: &str, ctx: &CheckContext, rule: SqlReviewRule) -> Vec<Advice> {
    let result = check_with_diagnostics(sql, &[rule], ctx, &AdvisorRegistry::builtin())
        .expect("rule configuration should be valid");
    assert!(
        result.failures.is_empty(),
        "rule failed during walk: {:?}",
        result.failures
    );
    result.advice
}

/// Driver answering `explain` from canned plans keyed by a statement fragment.
#[derive(Default)]
pub struct StaticDriver {
    plans: Vec<(String, Result<Vec<String>, DriverError>)>,
}

impl StaticDriver {
    pub fn with_plan(mut self, fragment: &str, plan: &[&str]) -> Self {
        let plan = plan.iter().map(|line| line.to_string()).collect();
        self.plans.push((fragment.to_string(), Ok(plan)));
        self
    }

    pub fn with_error(mut self, fragment: &str, message: &str) -> Self {
        self.plans.push((
            fragment.to_string(),
            Err(DriverError::Query(message.to_string())),
        ));
        self
    }
}

impl QueryDriver for StaticDriver {
    fn explain(&self, statement: &str) -> Result<Vec<String>, DriverError> {
        self.plans
            .iter()
            .find(|(fragment, _)| statement.contains(fragment.as_str()))
            .map(|(_, plan)| plan.clone())
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
