//! Backward-incompatible schema changes.

use super::helpers::{is_column_type_change, renamed_table_name, statement_index, TableKeys};
use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::error::{AdvisorError, RuleError};
use crate::syntax::{NodeKind, NodeRef};
use crate::types::advice_codes;
use sqlparser::ast::{AlterTableOperation, ObjectType, Statement, TableConstraint};
use std::collections::HashSet;

/// Flags changes that can break code or data written against the current
/// schema. Tables created earlier in the same script are exempt, and each
/// statement is reported at most once.
pub struct BackwardCompatibility {
    base: BaseRule,
    keys: TableKeys,
    created: HashSet<String>,
    reported: Option<usize>,
}

impl BackwardCompatibility {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            keys: TableKeys::from_context(ctx),
            created: HashSet::new(),
            reported: None,
        }))
    }

    fn created_in_script(&self, node: NodeRef<'_>) -> bool {
        node.owning_table()
            .is_some_and(|name| self.created.contains(&self.keys.key(name)))
    }

    fn incompatible_code(
        &mut self,
        node: NodeRef<'_>,
        kind: NodeKind,
    ) -> Result<Option<i32>, RuleError> {
        Ok(match kind {
            NodeKind::CreateTableStmt => {
                if let Statement::CreateTable(create) = node.statement()? {
                    self.created.insert(self.keys.key(&create.name));
                }
                None
            }
            NodeKind::DropStmt => match node.statement()? {
                Statement::Drop {
                    object_type, names, ..
                } => match object_type {
                    ObjectType::Database => Some(advice_codes::COMPATIBILITY_DROP_DATABASE),
                    ObjectType::Schema => Some(advice_codes::COMPATIBILITY_DROP_SCHEMA),
                    ObjectType::Table
                        if names
                            .iter()
                            .any(|name| !self.created.contains(&self.keys.key(name))) =>
                    {
                        Some(advice_codes::COMPATIBILITY_DROP_TABLE)
                    }
                    _ => None,
                },
                _ => None,
            },
            NodeKind::OtherStmt => match node.statement()? {
                Statement::RenameTable(_) => Some(advice_codes::COMPATIBILITY_RENAME_TABLE),
                _ => None,
            },
            NodeKind::CreateIndexStmt => match node.statement()? {
                Statement::CreateIndex(create)
                    if create.unique && !self.created.contains(&self.keys.key(&create.table_name)) =>
                {
                    Some(advice_codes::COMPATIBILITY_ADD_UNIQUE_KEY)
                }
                _ => None,
            },
            NodeKind::AlterTableCmd if !self.created_in_script(node) => {
                let op = node.alter_cmd()?;
                match op {
                    AlterTableOperation::RenameColumn { .. } => {
                        Some(advice_codes::COMPATIBILITY_RENAME_COLUMN)
                    }
                    AlterTableOperation::DropColumn { .. } => {
                        Some(advice_codes::COMPATIBILITY_DROP_COLUMN)
                    }
                    AlterTableOperation::AddConstraint { constraint, .. } => match constraint {
                        TableConstraint::PrimaryKey { .. } => {
                            Some(advice_codes::COMPATIBILITY_ADD_PRIMARY_KEY)
                        }
                        TableConstraint::Unique { .. } => {
                            Some(advice_codes::COMPATIBILITY_ADD_UNIQUE_KEY)
                        }
                        TableConstraint::ForeignKey { .. } => {
                            Some(advice_codes::COMPATIBILITY_ADD_FOREIGN_KEY)
                        }
                        TableConstraint::Check { .. } => Some(advice_codes::COMPATIBILITY_ADD_CHECK),
                        _ => None,
                    },
                    _ if renamed_table_name(op).is_some() => {
                        Some(advice_codes::COMPATIBILITY_RENAME_TABLE)
                    }
                    _ if is_column_type_change(op) => {
                        Some(advice_codes::COMPATIBILITY_ALTER_COLUMN)
                    }
                    _ => None,
                }
            }
            _ => None,
        })
    }
}

impl Rule for BackwardCompatibility {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let statement = statement_index(node);
        if statement.is_some() && self.reported == statement {
            return Ok(());
        }
        if let Some(code) = self.incompatible_code(node, kind)? {
            self.reported = statement;
            self.base.report(
                code,
                format!(
                    "\"{}\" may cause incompatibility with the existing data and code",
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
    use crate::test_utils::{check_sql, rule_without_payload};
    use crate::types::{advice_codes, Advice, Engine, RuleType};

    fn codes(sql: &str, engine: Engine) -> Vec<i32> {
        let rule = rule_without_payload(RuleType::SchemaBackwardCompatibility);
        check_sql(sql, engine, rule)
            .iter()
            .map(|advice: &Advice| advice.code)
            .collect()
    }

    #[test]
    fn test_drops_and_renames() {
        let sql = "DROP DATABASE shop;\nDROP TABLE orders;\nRENAME TABLE a TO b;\nALTER TABLE c RENAME COLUMN x TO y;";
        assert_eq!(
            codes(sql, Engine::Mysql),
            vec![
                advice_codes::COMPATIBILITY_DROP_DATABASE,
                advice_codes::COMPATIBILITY_DROP_TABLE,
                advice_codes::COMPATIBILITY_RENAME_TABLE,
                advice_codes::COMPATIBILITY_RENAME_COLUMN,
            ]
        );
    }

    #[test]
    fn test_constraints_and_type_changes() {
        let sql = "ALTER TABLE t ADD CONSTRAINT uk_a UNIQUE (a);\nALTER TABLE t ADD CONSTRAINT ck_a CHECK (a > 0);\nALTER TABLE t ALTER COLUMN a TYPE bigint;\nALTER TABLE t DROP COLUMN b;\nCREATE UNIQUE INDEX uk_t_c ON t (c);\nDROP SCHEMA s;";
        assert_eq!(
            codes(sql, Engine::Postgres),
            vec![
                advice_codes::COMPATIBILITY_ADD_UNIQUE_KEY,
                advice_codes::COMPATIBILITY_ADD_CHECK,
                advice_codes::COMPATIBILITY_ALTER_COLUMN,
                advice_codes::COMPATIBILITY_DROP_COLUMN,
                advice_codes::COMPATIBILITY_ADD_UNIQUE_KEY,
                advice_codes::COMPATIBILITY_DROP_SCHEMA,
            ]
        );
    }

    #[test]
    fn test_tables_created_in_script_are_exempt() {
        let sql = "CREATE TABLE t (a int);\nALTER TABLE t DROP COLUMN a;\nCREATE UNIQUE INDEX uk_t_a ON t (a);\nDROP TABLE t;";
        assert!(codes(sql, Engine::Postgres).is_empty());
    }

    #[test]
    fn test_one_advice_per_statement() {
        let sql = "ALTER TABLE t DROP COLUMN a, DROP COLUMN b;";
        let rule = rule_without_payload(RuleType::SchemaBackwardCompatibility);
        let advice = check_sql(sql, Engine::Postgres, rule);
        assert_eq!(advice.len(), 1);
        assert_eq!(
            advice[0].content,
            "\"ALTER TABLE t DROP COLUMN a, DROP COLUMN b\" may cause incompatibility with the existing data and code"
        );
    }
}
