#![allow(dead_code)]

use serde_json::Value;
use sqlreview_core::{
    sql_review_check, Advice, AdvisorRegistry, Catalog, CheckContext, DatabaseMetadata, Engine,
    RuleLevel, RuleType, SqlReviewRule,
};
use std::sync::Arc;

/// A two-table schema snapshot used by the catalog-aware scenarios.
pub const INVENTORY_SNAPSHOT: &str = r#"{
    "name": "inventory",
    "owner": "inventory_owner",
    "defaultSchema": "public",
    "schemas": [{
        "name": "public",
        "owner": "pg_database_owner",
        "tables": [
            {"name": "items",
             "columns": [
                {"name": "id", "type": "bigint", "nullable": false},
                {"name": "sku", "type": "varchar(32)"}
             ],
             "indexes": [
                {"name": "items_pkey", "expressions": ["id"], "unique": true, "primary": true}
             ]},
            {"name": "stock",
             "columns": [
                {"name": "id", "type": "bigint", "nullable": false},
                {"name": "item_id", "type": "bigint"}
             ],
             "indexes": [
                {"name": "stock_pkey", "expressions": ["id"], "unique": true, "primary": true}
             ]}
        ]
    }]
}"#;

pub fn inventory() -> Arc<dyn Catalog> {
    Arc::new(DatabaseMetadata::from_json(INVENTORY_SNAPSHOT).expect("valid snapshot"))
}

pub fn error_rule(rule_type: RuleType) -> SqlReviewRule {
    SqlReviewRule::new(rule_type, RuleLevel::Error)
}

pub fn error_rule_with(rule_type: RuleType, payload: Value) -> SqlReviewRule {
    error_rule(rule_type).with_payload(payload)
}

/// Runs a review with the built-in registry.
pub fn review(sql: &str, engine: Engine, rules: &[SqlReviewRule]) -> Vec<Advice> {
    review_in(sql, &CheckContext::new(engine), rules)
}

pub fn review_in(sql: &str, ctx: &CheckContext, rules: &[SqlReviewRule]) -> Vec<Advice> {
    sql_review_check(sql, rules, ctx, &AdvisorRegistry::builtin())
        .expect("rule configuration should be valid")
}
