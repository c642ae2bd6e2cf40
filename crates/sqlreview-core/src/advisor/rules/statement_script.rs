//! Script-level statement rules.
//!
//! [`MergeAlterTable`] and [`DisallowMixDdlDml`] look at the script as a
//! whole: they record what they see on the way down and report when the
//! walk leaves the root.

use super::helpers::TableKeys;
use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::error::{AdvisorError, RuleError};
use crate::syntax::names::{simple_name, TableName};
use crate::syntax::{NodeKind, NodeRef};
use crate::types::advice_codes;
use sqlparser::ast::Statement;
use std::collections::BTreeMap;

pub struct DisallowCommit {
    base: BaseRule,
}

impl DisallowCommit {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for DisallowCommit {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind == NodeKind::CommitStmt {
            self.base.report(
                advice_codes::STATEMENT_DISALLOW_COMMIT,
                format!(
                    "Commit is not allowed, related statement: \"{}\"",
                    node.statement_text()
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct DisallowCascade {
    base: BaseRule,
}

impl DisallowCascade {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for DisallowCascade {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let cascade = match kind {
            NodeKind::DropStmt => matches!(node.statement()?, Statement::Drop { cascade: true, .. }),
            NodeKind::OtherStmt => match node.statement()? {
                truncate @ Statement::Truncate { .. } => {
                    truncate.to_string().to_uppercase().ends_with(" CASCADE")
                }
                _ => false,
            },
            _ => false,
        };
        if cascade {
            self.base.report(
                advice_codes::STATEMENT_DISALLOW_CASCADE,
                "The use of CASCADE is not permitted when dropping or truncating an object",
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

struct AlterCount {
    table: String,
    count: usize,
    last_line: usize,
}

/// Flags tables touched by more than one ALTER TABLE (or CREATE then ALTER).
pub struct MergeAlterTable {
    base: BaseRule,
    keys: TableKeys,
    tables: BTreeMap<String, AlterCount>,
}

impl MergeAlterTable {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            keys: TableKeys::from_context(ctx),
            tables: BTreeMap::new(),
        }))
    }

    fn touch(&mut self, name: &sqlparser::ast::ObjectName, line: usize) {
        let entry = self
            .tables
            .entry(self.keys.key(name))
            .or_insert_with(|| AlterCount {
                table: simple_name(name),
                count: 0,
                last_line: line,
            });
        entry.count += 1;
        entry.last_line = line;
    }
}

impl Rule for MergeAlterTable {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        match (kind, node.statement()) {
            (NodeKind::CreateTableStmt, Ok(Statement::CreateTable(create))) => {
                self.touch(&create.name, node.script_line());
            }
            (NodeKind::AlterTableStmt, Ok(Statement::AlterTable { name, .. })) => {
                self.touch(name, node.script_line());
            }
            _ => {}
        }
        Ok(())
    }

    fn on_exit(&mut self, _node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::Root {
            return Ok(());
        }
        let repeated: Vec<(String, usize, usize)> = self
            .tables
            .values()
            .filter(|entry| entry.count > 1)
            .map(|entry| (entry.table.clone(), entry.count, entry.last_line))
            .collect();
        for (table, count, line) in repeated {
            self.base.report(
                advice_codes::STATEMENT_REDUNDANT_ALTER_TABLE,
                format!("There are {count} statements to modify table `{table}`"),
                line,
            );
        }
        Ok(())
    }

    rule_base!();
}

/// Flags scripts that mix schema changes with data changes.
///
/// Reported once, at the first statement that switches between the two.
pub struct DisallowMixDdlDml {
    base: BaseRule,
    first: Option<NodeKind>,
    mixed: Option<(usize, String, bool)>,
}

impl DisallowMixDdlDml {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            first: None,
            mixed: None,
        }))
    }
}

impl Rule for DisallowMixDdlDml {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if !(kind.is_ddl() || kind.is_dml()) || self.mixed.is_some() {
            return Ok(());
        }
        match self.first {
            None => self.first = Some(kind),
            Some(first) if first.is_ddl() != kind.is_ddl() => {
                self.mixed = Some((
                    node.script_line(),
                    node.statement_text().to_string(),
                    kind.is_ddl(),
                ));
            }
            Some(_) => {}
        }
        Ok(())
    }

    fn on_exit(&mut self, _node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::Root {
            return Ok(());
        }
        if let Some((line, text, is_ddl)) = self.mixed.take() {
            let (found, expected) = if is_ddl { ("DDL", "DML") } else { ("DML", "DDL") };
            self.base.report(
                advice_codes::STATEMENT_DISALLOW_MIX_DDL_DML,
                format!(
                    "Mixing DDL and DML is not allowed, \"{text}\" is {found} but the script started with {expected}"
                ),
                line,
            );
        }
        Ok(())
    }

    rule_base!();
}

/// CREATE TABLE, VIEW and INDEX targets must be schema-qualified.
pub struct CreateSpecifySchema {
    base: BaseRule,
}

impl CreateSpecifySchema {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for CreateSpecifySchema {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let target = match kind {
            NodeKind::CreateTableStmt | NodeKind::CreateIndexStmt => node.owning_table(),
            NodeKind::CreateViewStmt => match node.statement()? {
                Statement::CreateView { name, .. } => Some(name),
                _ => None,
            },
            _ => None,
        };
        let Some(target) = target else {
            return Ok(());
        };
        if !TableName::from_object_name(target).is_qualified() {
            self.base.report(
                advice_codes::STATEMENT_CREATE_WITHOUT_SCHEMA_NAME,
                "Table schema should be specified.",
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{check_sql, rule_without_payload};
    use crate::types::{advice_codes, Engine, RuleType};

    #[test]
    fn test_commit_is_flagged() {
        let rule = rule_without_payload(RuleType::StatementDisallowCommit);
        let advice = check_sql(
            "START TRANSACTION;\nUPDATE t SET a = 1 WHERE b = 2;\nCOMMIT;",
            Engine::Mysql,
            rule,
        );
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::STATEMENT_DISALLOW_COMMIT);
        assert_eq!(advice[0].position.line, 3);
        assert_eq!(
            advice[0].content,
            "Commit is not allowed, related statement: \"COMMIT\""
        );
    }

    #[test]
    fn test_drop_cascade() {
        let rule = rule_without_payload(RuleType::StatementDisallowCascade);
        let advice = check_sql(
            "DROP TABLE a CASCADE;\nDROP TABLE b;\nDROP SCHEMA s CASCADE",
            Engine::Postgres,
            rule,
        );
        let lines: Vec<_> = advice.iter().map(|a| a.position.line).collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn test_merge_alter_table_counts_create_and_alters() {
        let rule = rule_without_payload(RuleType::StatementMergeAlterTable);
        let sql = "CREATE TABLE t (a int);\nALTER TABLE t ADD COLUMN b int;\nALTER TABLE u ADD COLUMN c int;\nALTER TABLE T ADD COLUMN d int;";
        let advice = check_sql(sql, Engine::Mysql, rule);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::STATEMENT_REDUNDANT_ALTER_TABLE);
        assert_eq!(advice[0].content, "There are 3 statements to modify table `t`");
        assert_eq!(advice[0].position.line, 4);
    }

    #[test]
    fn test_merge_alter_table_keeps_schemas_apart() {
        let rule = rule_without_payload(RuleType::StatementMergeAlterTable);
        let sql = "ALTER TABLE sales.t ADD COLUMN a int;\nALTER TABLE archive.t ADD COLUMN b int;";
        assert!(check_sql(sql, Engine::Postgres, rule).is_empty());

        let rule = rule_without_payload(RuleType::StatementMergeAlterTable);
        let sql = "ALTER TABLE t ADD COLUMN a int;\nALTER TABLE public.t ADD COLUMN b int;";
        let advice = check_sql(sql, Engine::Postgres, rule);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].content, "There are 2 statements to modify table `t`");
    }

    #[test]
    fn test_mix_ddl_dml_reports_first_switch() {
        let rule = rule_without_payload(RuleType::StatementDisallowMixDdlDml);
        let sql = "CREATE TABLE t (a int);\nSELECT 1;\nINSERT INTO t VALUES (1);\nALTER TABLE t ADD COLUMN b int;";
        let advice = check_sql(sql, Engine::Postgres, rule);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::STATEMENT_DISALLOW_MIX_DDL_DML);
        assert_eq!(advice[0].position.line, 3);
        assert!(advice[0].content.contains("is DML"));

        let rule = rule_without_payload(RuleType::StatementDisallowMixDdlDml);
        assert!(check_sql("UPDATE t SET a = 1;\nDELETE FROM t;", Engine::Postgres, rule).is_empty());
    }

    #[test]
    fn test_create_specify_schema() {
        let rule = rule_without_payload(RuleType::StatementCreateSpecifySchema);
        let sql = "CREATE TABLE public.a (id int);\nCREATE TABLE b (id int);\nCREATE INDEX idx_a ON a (id);\nCREATE VIEW v AS SELECT 1";
        let advice = check_sql(sql, Engine::Postgres, rule);
        let lines: Vec<_> = advice.iter().map(|a| a.position.line).collect();
        assert_eq!(lines, vec![2, 3, 4]);
        assert!(advice
            .iter()
            .all(|a| a.content == "Table schema should be specified."));
    }
}
