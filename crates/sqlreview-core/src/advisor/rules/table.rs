//! Table-level key rules.

use super::helpers::{has_foreign_key, is_primary_key_column, owning_table, TableKeys};
use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::catalog::Catalog;
use crate::error::{AdvisorError, RuleError};
use crate::syntax::names::simple_name;
use crate::syntax::{NodeKind, NodeRef};
use crate::types::advice_codes;
use sqlparser::ast::{AlterTableOperation, Statement, TableConstraint};
use std::collections::BTreeMap;
use std::sync::Arc;

fn primary_key_name(constraint: &TableConstraint) -> Option<String> {
    match constraint {
        TableConstraint::PrimaryKey {
            name, index_name, ..
        } => name
            .as_ref()
            .or(index_name.as_ref())
            .map(|ident| ident.value.clone()),
        _ => None,
    }
}

struct PkState {
    table: String,
    has_pk: bool,
    pk_name: Option<String>,
    line: usize,
}

/// Tables must end the script with a primary key.
///
/// Tracks tables created in the script and primary keys dropped from
/// existing tables; the verdict is reported when the walk leaves the root.
pub struct RequirePk {
    base: BaseRule,
    catalog: Option<Arc<dyn Catalog>>,
    keys: TableKeys,
    tables: BTreeMap<String, PkState>,
}

impl RequirePk {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            catalog: ctx.catalog.clone(),
            keys: TableKeys::from_context(ctx),
            tables: BTreeMap::new(),
        }))
    }

    fn on_create(&mut self, node: NodeRef<'_>) -> Result<(), RuleError> {
        let Statement::CreateTable(create) = node.statement()? else {
            return Ok(());
        };
        if create.query.is_some() {
            return Ok(());
        }
        let pk_name = create.constraints.iter().find_map(primary_key_name);
        let has_pk = create.columns.iter().any(is_primary_key_column)
            || create
                .constraints
                .iter()
                .any(|constraint| matches!(constraint, TableConstraint::PrimaryKey { .. }));
        self.tables.insert(
            self.keys.key(&create.name),
            PkState {
                table: simple_name(&create.name),
                has_pk,
                pk_name,
                line: node.script_line(),
            },
        );
        Ok(())
    }

    /// Name of the current primary key of the command's table.
    fn current_pk_name(&self, node: NodeRef<'_>, key: &str) -> Option<String> {
        if let Some(state) = self.tables.get(key) {
            return state.pk_name.clone();
        }
        let table = owning_table(node)?;
        let catalog = self.catalog.as_ref()?;
        catalog
            .find_table(&table)?
            .primary_key()
            .map(|pk| pk.name.clone())
    }

    fn on_alter(&mut self, node: NodeRef<'_>) -> Result<(), RuleError> {
        let Some(name) = node.owning_table() else {
            return Ok(());
        };
        let key = self.keys.key(name);
        let op = node.alter_cmd()?;
        let has_pk = match op {
            AlterTableOperation::AddConstraint {
                constraint: constraint @ TableConstraint::PrimaryKey { .. },
                ..
            } => {
                let pk_name = primary_key_name(constraint);
                self.set(name, &key, true, node.script_line()).pk_name = pk_name;
                return Ok(());
            }
            AlterTableOperation::AddColumn { column_def, .. }
                if is_primary_key_column(column_def) =>
            {
                true
            }
            AlterTableOperation::DropConstraint { name: dropped, .. } => {
                match self.current_pk_name(node, &key) {
                    Some(pk) if pk.eq_ignore_ascii_case(&dropped.value) => false,
                    _ => return Ok(()),
                }
            }
            other if other.to_string().to_uppercase().starts_with("DROP PRIMARY KEY") => false,
            _ => return Ok(()),
        };
        let state = self.set(name, &key, has_pk, node.script_line());
        if !has_pk {
            state.pk_name = None;
        }
        Ok(())
    }

    fn set(
        &mut self,
        name: &sqlparser::ast::ObjectName,
        key: &str,
        has_pk: bool,
        line: usize,
    ) -> &mut PkState {
        let state = self.tables.entry(key.to_string()).or_insert_with(|| PkState {
            table: simple_name(name),
            has_pk,
            pk_name: None,
            line,
        });
        state.has_pk = has_pk;
        state.line = line;
        state
    }
}

impl Rule for RequirePk {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        match kind {
            NodeKind::CreateTableStmt => self.on_create(node),
            NodeKind::AlterTableCmd => self.on_alter(node),
            _ => Ok(()),
        }
    }

    fn on_exit(&mut self, _node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::Root {
            return Ok(());
        }
        let missing: Vec<(String, usize)> = self
            .tables
            .values()
            .filter(|state| !state.has_pk)
            .map(|state| (state.table.clone(), state.line))
            .collect();
        for (table, line) in missing {
            self.base.report(
                advice_codes::TABLE_NO_PK,
                format!("Table \"{table}\" requires PRIMARY KEY"),
                line,
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct NoForeignKey {
    base: BaseRule,
}

impl NoForeignKey {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for NoForeignKey {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let found = match kind {
            NodeKind::TableConstraint => matches!(
                node.table_constraint()?,
                TableConstraint::ForeignKey { .. }
            ),
            NodeKind::ColumnDef => has_foreign_key(node.column_def()?),
            _ => false,
        };
        if found {
            let table = owning_table(node).map(|table| table.name).unwrap_or_default();
            self.base.report(
                advice_codes::TABLE_HAS_FK,
                format!("FOREIGN KEY is not allowed in the table \"{table}\""),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

#[cfg(test)]
mod tests {
    use crate::advisor::CheckContext;
    use crate::test_utils::{check_sql, check_with, rule_without_payload, shop_catalog};
    use crate::types::{advice_codes, Engine, RuleType};

    #[test]
    fn test_create_without_pk() {
        let sql = "CREATE TABLE a (id int PRIMARY KEY);\nCREATE TABLE b (id int);\nCREATE TABLE c (id int, CONSTRAINT pk_c PRIMARY KEY (id));";
        let rule = rule_without_payload(RuleType::TableRequirePk);
        let advice = check_sql(sql, Engine::Postgres, rule);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::TABLE_NO_PK);
        assert_eq!(advice[0].content, "Table \"b\" requires PRIMARY KEY");
        assert_eq!(advice[0].position.line, 2);
    }

    #[test]
    fn test_pk_added_later_in_script() {
        let sql = "CREATE TABLE b (id int);\nALTER TABLE b ADD CONSTRAINT pk_b PRIMARY KEY (id);";
        let rule = rule_without_payload(RuleType::TableRequirePk);
        let advice = check_sql(sql, Engine::Postgres, rule);
        assert!(advice.is_empty());
    }

    #[test]
    fn test_dropping_catalog_pk() {
        let ctx = CheckContext::new(Engine::Postgres).with_catalog(shop_catalog());
        let sql = "ALTER TABLE orders DROP CONSTRAINT orders_pkey;\nALTER TABLE customers DROP CONSTRAINT customers_name_key;";
        let advice = check_with(sql, &ctx, rule_without_payload(RuleType::TableRequirePk));
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].content, "Table \"orders\" requires PRIMARY KEY");
        assert_eq!(advice[0].position.line, 1);
    }

    #[test]
    fn test_pk_tracked_per_schema() {
        let sql = "CREATE TABLE sales.t (id int);\nCREATE TABLE archive.t (id int PRIMARY KEY);";
        let rule = rule_without_payload(RuleType::TableRequirePk);
        let advice = check_sql(sql, Engine::Postgres, rule);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].position.line, 1);
    }

    #[test]
    fn test_mysql_drop_primary_key() {
        let sql = "CREATE TABLE t (id int, PRIMARY KEY (id));\nALTER TABLE t DROP PRIMARY KEY;";
        let rule = rule_without_payload(RuleType::TableRequirePk);
        let advice = check_sql(sql, Engine::Mysql, rule);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].position.line, 2);
    }

    #[test]
    fn test_no_foreign_key() {
        let sql = "CREATE TABLE t (\n  id int,\n  u_id int REFERENCES u (id),\n  CONSTRAINT fk_t_v FOREIGN KEY (id) REFERENCES v (id)\n)";
        let rule = rule_without_payload(RuleType::TableNoForeignKey);
        let advice = check_sql(sql, Engine::Postgres, rule);
        let lines: Vec<_> = advice.iter().map(|a| a.position.line).collect();
        assert_eq!(lines, vec![3, 4]);
        assert_eq!(advice[0].content, "FOREIGN KEY is not allowed in the table \"t\"");
    }
}
