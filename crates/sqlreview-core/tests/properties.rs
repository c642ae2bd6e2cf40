mod common;

use proptest::prelude::*;
use serde_json::json;
use sqlreview_core::advisor::{BaseRule, Rule, RuleContext, RuleDispatcher};
use sqlreview_core::syntax::{NodeId, NodeKind, NodeRef, SyntaxTree};
use sqlreview_core::{
    parse_script, Advice, AdviceStatus, AdvisorRegistry, Engine, RuleError, RuleLevel, RuleType,
    SqlReviewRule,
};

const STATEMENTS: &[&str] = &[
    "SELECT * FROM t",
    "SELECT a FROM t WHERE a LIKE '%x'",
    "UPDATE t SET a = 1",
    "DELETE FROM t WHERE a = NULL",
    "INSERT INTO t VALUES (1)",
    "CREATE TABLE Orders (id int, note text)",
    "CREATE TABLE items (id int PRIMARY KEY, a int, UNIQUE (a, a))",
    "ALTER TABLE t ADD COLUMN b int NOT NULL",
    "CREATE INDEX idx_t_a ON t (a)",
    "SELECT a FROM t JOIN u ON t.id = u.id WHERE a = 1 AND b = 2 OR c = 3",
];

const QUERIES: &[&str] = &[
    "SELECT 1",
    "SELECT a FROM t",
    "SELECT a, b FROM t WHERE a = 1",
    "SELECT t.a FROM t JOIN u ON t.id = u.id",
];

fn script(picks: &[usize], pool: &[&str]) -> String {
    picks
        .iter()
        .map(|&i| pool[i % pool.len()])
        .collect::<Vec<_>>()
        .join(";\n")
}

fn configured_rules() -> Vec<SqlReviewRule> {
    vec![
        SqlReviewRule::new(RuleType::StatementWhereRequire, RuleLevel::Error),
        SqlReviewRule::new(RuleType::StatementSelectNoSelectAll, RuleLevel::Warning),
        SqlReviewRule::new(RuleType::StatementWhereNoLeadingWildcardLike, RuleLevel::Error),
        SqlReviewRule::new(RuleType::StatementWhereNoEqualNull, RuleLevel::Warning),
        SqlReviewRule::new(RuleType::TableRequirePk, RuleLevel::Error),
        SqlReviewRule::new(RuleType::IndexNoDuplicateColumn, RuleLevel::Error),
        SqlReviewRule::new(RuleType::ColumnNoNull, RuleLevel::Warning),
        SqlReviewRule::new(RuleType::NamingTable, RuleLevel::Error)
            .with_payload(json!({"format": "^[a-z]+(_[a-z]+)*$"})),
        SqlReviewRule::new(RuleType::StatementWhereMaximumLogicalOperatorCount, RuleLevel::Error)
            .with_payload(json!({"number": 1})),
    ]
}

fn instantiate(rules: &[SqlReviewRule]) -> Vec<Box<dyn Rule>> {
    let registry = AdvisorRegistry::builtin();
    rules
        .iter()
        .filter_map(|rule| {
            let factory = registry.lookup(Engine::Postgres, rule.rule_type)?;
            Some(factory(&RuleContext::new(rule, Engine::Postgres)).expect("valid rule"))
        })
        .collect()
}

fn walk(sql: &str, base_line: usize, rules: Vec<Box<dyn Rule>>) -> Vec<Advice> {
    let script = parse_script(sql, Engine::Postgres).expect("valid script");
    let tree = SyntaxTree::build(&script);
    let mut dispatcher = RuleDispatcher::new(rules);
    dispatcher.set_base_line(base_line);
    dispatcher.walk(&tree);
    dispatcher.into_parts().0
}

/// Checks the walk against a stack of open nodes and reports one advice per
/// visit at the node's line.
struct OrderRecorder {
    base: BaseRule,
    open: Vec<NodeId>,
}

impl Default for OrderRecorder {
    fn default() -> Self {
        Self {
            base: BaseRule::new(AdviceStatus::Warning, "order-recorder"),
            open: Vec::new(),
        }
    }
}

impl Rule for OrderRecorder {
    fn on_enter(&mut self, node: NodeRef<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        if node.parent().map(|parent| parent.id()) != self.open.last().copied() {
            return Err(RuleError::Check("entered before parent".to_string()));
        }
        self.open.push(node.id());
        self.base.report(0, "enter", node.line());
        Ok(())
    }

    fn on_exit(&mut self, node: NodeRef<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        if self.open.pop() != Some(node.id()) {
            return Err(RuleError::Check("exited out of order".to_string()));
        }
        Ok(())
    }

    fn base(&self) -> &BaseRule {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseRule {
        &mut self.base
    }
}

struct AlwaysFails {
    base: BaseRule,
}

impl Default for AlwaysFails {
    fn default() -> Self {
        Self {
            base: BaseRule::new(AdviceStatus::Error, "always-fails"),
        }
    }
}

impl Rule for AlwaysFails {
    fn on_enter(&mut self, _node: NodeRef<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        Err(RuleError::Check("broken rule".to_string()))
    }

    fn base(&self) -> &BaseRule {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseRule {
        &mut self.base
    }
}

proptest! {
    #[test]
    fn walk_is_pre_and_post_order(picks in prop::collection::vec(0usize..100, 1..6)) {
        let sql = script(&picks, STATEMENTS);
        let parsed = parse_script(&sql, Engine::Postgres).expect("valid script");
        let tree = SyntaxTree::build(&parsed);
        let recorder: Box<dyn Rule> = Box::new(OrderRecorder::default());
        let mut dispatcher = RuleDispatcher::new(vec![recorder]);
        dispatcher.walk(&tree);

        prop_assert!(dispatcher.failures().is_empty(), "{:?}", dispatcher.failures());
        prop_assert_eq!(dispatcher.advice_list().len(), tree.len());
    }

    #[test]
    fn base_line_shifts_every_advice(
        picks in prop::collection::vec(0usize..100, 1..6),
        offset in 0usize..500,
    ) {
        let sql = script(&picks, STATEMENTS);
        let unshifted = walk(&sql, 0, instantiate(&configured_rules()));
        let shifted = walk(&sql, offset, instantiate(&configured_rules()));

        prop_assert_eq!(unshifted.len(), shifted.len());
        for (before, after) in unshifted.iter().zip(&shifted) {
            prop_assert_eq!(before.position.line + offset, after.position.line);
            prop_assert_eq!(&before.content, &after.content);
        }
    }

    #[test]
    fn fresh_rules_give_identical_advice(picks in prop::collection::vec(0usize..100, 1..6)) {
        let sql = script(&picks, STATEMENTS);
        let first = common::review(&sql, Engine::Postgres, &configured_rules());
        let second = common::review(&sql, Engine::Postgres, &configured_rules());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn failing_rule_is_isolated(picks in prop::collection::vec(0usize..100, 1..6)) {
        let sql = script(&picks, STATEMENTS);
        let parsed = parse_script(&sql, Engine::Postgres).expect("valid script");
        let tree = SyntaxTree::build(&parsed);

        let alone = walk(&sql, 0, instantiate(&configured_rules()));

        let failing: Box<dyn Rule> = Box::new(AlwaysFails::default());
        let mut rules = vec![failing];
        rules.extend(instantiate(&configured_rules()));
        let mut dispatcher = RuleDispatcher::new(rules);
        dispatcher.walk(&tree);
        let failures = dispatcher.failures().len();
        let (with_failing, _) = dispatcher.into_parts();

        prop_assert_eq!(failures, tree.len());
        prop_assert_eq!(alone, with_failing);
    }

    #[test]
    fn unmatched_rules_stay_silent(picks in prop::collection::vec(0usize..100, 1..6)) {
        let sql = script(&picks, QUERIES);
        let rules = [
            SqlReviewRule::new(RuleType::TableRequirePk, RuleLevel::Error),
            SqlReviewRule::new(RuleType::IndexNoDuplicateColumn, RuleLevel::Error),
            SqlReviewRule::new(RuleType::StatementDisallowCommit, RuleLevel::Error),
            SqlReviewRule::new(RuleType::ColumnNoNull, RuleLevel::Error),
            SqlReviewRule::new(RuleType::NamingTable, RuleLevel::Error)
                .with_payload(json!({"format": "^x$"})),
        ];
        prop_assert!(common::review(&sql, Engine::Postgres, &rules).is_empty());
    }
}
