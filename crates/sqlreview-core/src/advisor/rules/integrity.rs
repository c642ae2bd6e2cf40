//! Catalog-backed existence checks.
//!
//! Both rules need a catalog snapshot and do nothing without one.

use super::helpers::{dropped_column_names, has_if_exists, renamed_table_name, TableKeys};
use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::catalog::Catalog;
use crate::error::{AdvisorError, RuleError};
use crate::syntax::names::{simple_name, TableName};
use crate::syntax::{NodeKind, NodeRef};
use crate::types::advice_codes;
use sqlparser::ast::{AlterTableOperation, Expr, ObjectName, ObjectType, Statement};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
#[cfg(feature = "tracing")]
use tracing::debug;

/// Lower-cased column names of a table that exists at this point of the script.
type Columns = HashSet<String>;

/// Checks that referenced tables and columns exist, and that created ones
/// do not, against the catalog plus the effect of earlier statements.
///
/// Only the first violation is reported: later statements may depend on the
/// failed one, so their findings would be noise.
pub struct SchemaIntegrity {
    base: BaseRule,
    catalog: Option<Arc<dyn Catalog>>,
    keys: TableKeys,
    /// `None` marks a table dropped earlier in the script.
    tables: HashMap<String, Option<Columns>>,
    halted: bool,
}

impl SchemaIntegrity {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            catalog: ctx.catalog.clone(),
            keys: TableKeys::from_context(ctx),
            tables: HashMap::new(),
            halted: false,
        }))
    }

    /// Columns of `name` if the table exists, loading it from the catalog
    /// on first use.
    fn table(&mut self, name: &ObjectName) -> Option<&mut Columns> {
        let key = self.keys.key(name);
        if !self.tables.contains_key(&key) {
            let catalog = self.catalog.as_ref()?;
            let table = catalog.find_table(&TableName::from_object_name(name))?;
            let columns = table
                .columns
                .iter()
                .map(|column| column.name.to_lowercase())
                .collect();
            self.tables.insert(key.clone(), Some(columns));
        }
        self.tables.get_mut(&key)?.as_mut()
    }

    fn violation(&mut self, code: i32, content: String, node: NodeRef<'_>) {
        #[cfg(feature = "tracing")]
        debug!(code, "schema integrity violated, skipping the rest of the script");
        self.base.report(code, content, node.line());
        self.halted = true;
    }

    fn on_create_table(&mut self, node: NodeRef<'_>) -> Result<(), RuleError> {
        let Statement::CreateTable(create) = node.statement()? else {
            return Ok(());
        };
        if self.table(&create.name).is_some() {
            if !create.if_not_exists {
                self.violation(
                    advice_codes::TABLE_EXISTS,
                    format!("Table `{}` already exists", simple_name(&create.name)),
                    node,
                );
            }
            return Ok(());
        }
        let columns = create
            .columns
            .iter()
            .map(|column| column.name.value.to_lowercase())
            .collect();
        self.tables.insert(self.keys.key(&create.name), Some(columns));
        Ok(())
    }

    fn on_drop(&mut self, node: NodeRef<'_>) -> Result<(), RuleError> {
        let Statement::Drop {
            object_type: ObjectType::Table,
            names,
            if_exists,
            ..
        } = node.statement()?
        else {
            return Ok(());
        };
        for name in names {
            if self.table(name).is_none() {
                if !*if_exists {
                    self.violation(
                        advice_codes::TABLE_NOT_EXISTS,
                        format!("Table `{}` does not exist", simple_name(name)),
                        node,
                    );
                    return Ok(());
                }
                continue;
            }
            self.tables.insert(self.keys.key(name), None);
        }
        Ok(())
    }

    fn on_alter_table(&mut self, node: NodeRef<'_>) -> Result<(), RuleError> {
        let Statement::AlterTable {
            name, if_exists, ..
        } = node.statement()?
        else {
            return Ok(());
        };
        if self.table(name).is_none() && !*if_exists {
            self.violation(
                advice_codes::TABLE_NOT_EXISTS,
                format!("Table `{}` does not exist", simple_name(name)),
                node,
            );
        }
        Ok(())
    }

    fn on_alter_cmd(&mut self, node: NodeRef<'_>) -> Result<(), RuleError> {
        let Some(name) = node.owning_table() else {
            return Ok(());
        };
        let table = simple_name(name);
        let op = node.alter_cmd()?;
        let Some(columns) = self.table(name) else {
            return Ok(());
        };

        let missing = |column: &str| format!("Column `{column}` does not exist in table `{table}`");
        let present = |column: &str| format!("Column `{column}` already exists in table `{table}`");
        let finding = match op {
            AlterTableOperation::AddColumn {
                column_def,
                if_not_exists,
                ..
            } => {
                let column = &column_def.name.value;
                if !columns.insert(column.to_lowercase()) && !*if_not_exists {
                    Some((advice_codes::COLUMN_EXISTS, present(column)))
                } else {
                    None
                }
            }
            AlterTableOperation::DropColumn { .. } => {
                let tolerant = has_if_exists(op);
                dropped_column_names(op).into_iter().find_map(|column| {
                    (!columns.remove(&column.to_lowercase()) && !tolerant)
                        .then(|| (advice_codes::COLUMN_NOT_EXISTS, missing(&column)))
                })
            }
            AlterTableOperation::RenameColumn {
                old_column_name,
                new_column_name,
                ..
            } => {
                if !columns.remove(&old_column_name.value.to_lowercase()) {
                    Some((advice_codes::COLUMN_NOT_EXISTS, missing(&old_column_name.value)))
                } else if !columns.insert(new_column_name.value.to_lowercase()) {
                    Some((advice_codes::COLUMN_EXISTS, present(&new_column_name.value)))
                } else {
                    None
                }
            }
            AlterTableOperation::ChangeColumn {
                old_name, new_name, ..
            } => {
                if columns.remove(&old_name.value.to_lowercase()) {
                    columns.insert(new_name.value.to_lowercase());
                    None
                } else {
                    Some((advice_codes::COLUMN_NOT_EXISTS, missing(&old_name.value)))
                }
            }
            AlterTableOperation::AlterColumn { column_name, .. }
                if !columns.contains(&column_name.value.to_lowercase()) =>
            {
                Some((advice_codes::COLUMN_NOT_EXISTS, missing(&column_name.value)))
            }
            AlterTableOperation::ModifyColumn { col_name, .. }
                if !columns.contains(&col_name.value.to_lowercase()) =>
            {
                Some((advice_codes::COLUMN_NOT_EXISTS, missing(&col_name.value)))
            }
            _ => {
                if let Some(new_name) = renamed_table_name(op) {
                    let moved = self.tables.insert(self.keys.key(name), None).flatten();
                    self.tables.insert(self.keys.renamed(name, &new_name), moved);
                }
                None
            }
        };
        if let Some((code, content)) = finding {
            self.violation(code, content, node);
        }
        Ok(())
    }

    fn on_create_index(&mut self, node: NodeRef<'_>) -> Result<(), RuleError> {
        let Statement::CreateIndex(create) = node.statement()? else {
            return Ok(());
        };
        let table = simple_name(&create.table_name);
        let Some(columns) = self.table(&create.table_name) else {
            self.violation(
                advice_codes::TABLE_NOT_EXISTS,
                format!("Table `{table}` does not exist"),
                node,
            );
            return Ok(());
        };
        // Expression keys are not column references and are not checked.
        let unknown = create
            .columns
            .iter()
            .filter_map(|key| match &key.column.expr {
                Expr::Identifier(ident) => Some(ident.value.clone()),
                _ => None,
            })
            .find(|column| !columns.contains(&column.to_lowercase()));
        if let Some(column) = unknown {
            self.violation(
                advice_codes::COLUMN_NOT_EXISTS,
                format!("Column `{column}` does not exist in table `{table}`"),
                node,
            );
        }
        Ok(())
    }
}

impl Rule for SchemaIntegrity {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if self.halted || self.catalog.is_none() {
            return Ok(());
        }
        match kind {
            NodeKind::CreateTableStmt => self.on_create_table(node),
            NodeKind::DropStmt => self.on_drop(node),
            NodeKind::AlterTableStmt => self.on_alter_table(node),
            NodeKind::AlterTableCmd => self.on_alter_cmd(node),
            NodeKind::CreateIndexStmt => self.on_create_index(node),
            _ => Ok(()),
        }
    }

    rule_base!();
}

pub struct DropEmptyDatabase {
    base: BaseRule,
    catalog: Option<Arc<dyn Catalog>>,
}

impl DropEmptyDatabase {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            catalog: ctx.catalog.clone(),
        }))
    }
}

impl Rule for DropEmptyDatabase {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::DropStmt {
            return Ok(());
        }
        let Some(catalog) = self.catalog.as_ref() else {
            return Ok(());
        };
        let Statement::Drop {
            object_type: ObjectType::Database,
            names,
            ..
        } = node.statement()?
        else {
            return Ok(());
        };
        let database = catalog.database_name().to_string();
        let targets_catalog = names
            .iter()
            .any(|name| simple_name(name).eq_ignore_ascii_case(&database));
        if targets_catalog && !catalog.is_database_empty() {
            self.base.report(
                advice_codes::DATABASE_NOT_EMPTY,
                format!("Database `{database}` is not allowed to drop if not empty"),
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
    use crate::types::{advice_codes, Advice, Engine, RuleType};

    fn integrity(sql: &str, engine: Engine) -> Vec<Advice> {
        let ctx = CheckContext::new(engine).with_catalog(shop_catalog());
        check_with(sql, &ctx, rule_without_payload(RuleType::SchemaIntegrity))
    }

    #[test]
    fn test_unknown_table() {
        let advice = integrity("ALTER TABLE missing ADD COLUMN a int", Engine::Postgres);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::TABLE_NOT_EXISTS);
        assert_eq!(advice[0].content, "Table `missing` does not exist");
    }

    #[test]
    fn test_existing_table_and_if_not_exists() {
        let advice = integrity(
            "CREATE TABLE IF NOT EXISTS orders (id int);\nCREATE TABLE orders (id int);",
            Engine::Postgres,
        );
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::TABLE_EXISTS);
        assert_eq!(advice[0].position.line, 2);
    }

    #[test]
    fn test_column_checks_follow_script_state() {
        let sql = "ALTER TABLE orders ADD COLUMN total int;\nALTER TABLE orders DROP COLUMN total;\nALTER TABLE orders DROP COLUMN total;";
        let advice = integrity(sql, Engine::Postgres);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::COLUMN_NOT_EXISTS);
        assert_eq!(advice[0].content, "Column `total` does not exist in table `orders`");
        assert_eq!(advice[0].position.line, 3);
    }

    #[test]
    fn test_add_existing_column() {
        let advice = integrity("ALTER TABLE orders ADD COLUMN note text", Engine::Postgres);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::COLUMN_EXISTS);
    }

    #[test]
    fn test_first_violation_halts() {
        let sql = "DROP TABLE customers;\nCREATE INDEX idx_customers_id ON customers (id);\nDROP TABLE nope;";
        let advice = integrity(sql, Engine::Postgres);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].position.line, 2);
        assert_eq!(advice[0].content, "Table `customers` does not exist");
    }

    #[test]
    fn test_created_tables_are_known() {
        let sql = "CREATE TABLE items (id int, sku text);\nCREATE INDEX idx_items_sku ON items (sku);\nCREATE INDEX idx_items_x ON items (x);";
        let advice = integrity(sql, Engine::Postgres);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].content, "Column `x` does not exist in table `items`");
    }

    #[test]
    fn test_schemas_do_not_share_table_state() {
        let sql = "CREATE TABLE sales.orders (x int);\nALTER TABLE public.orders DROP COLUMN note;";
        assert!(integrity(sql, Engine::Postgres).is_empty());

        let sql = "CREATE TABLE public.orders2 (id int);\nCREATE TABLE sales.orders2 (id int);";
        assert!(integrity(sql, Engine::Postgres).is_empty());

        let sql = "CREATE TABLE public.orders2 (id int);\nCREATE TABLE orders2 (id int);";
        let advice = integrity(sql, Engine::Postgres);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::TABLE_EXISTS);
    }

    #[test]
    fn test_renamed_table_keeps_its_schema() {
        let sql = "CREATE TABLE sales.items (id int);\nALTER TABLE sales.items RENAME TO goods;\nCREATE INDEX idx_goods_id ON sales.goods (id);";
        assert!(integrity(sql, Engine::Postgres).is_empty());
    }

    #[test]
    fn test_expression_index_keys_are_skipped() {
        let advice = integrity(
            "CREATE INDEX idx_orders_lower_note ON orders (lower(note));",
            Engine::Postgres,
        );
        assert!(advice.is_empty(), "unexpected advice: {advice:?}");

        let advice = integrity(
            "CREATE INDEX idx_orders_mixed ON orders (lower(note), missing);",
            Engine::Postgres,
        );
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].content, "Column `missing` does not exist in table `orders`");
    }

    #[test]
    fn test_no_catalog_is_silent() {
        let rule = rule_without_payload(RuleType::SchemaIntegrity);
        assert!(check_sql("DROP TABLE missing", Engine::Postgres, rule).is_empty());
    }

    #[test]
    fn test_drop_non_empty_database() {
        let ctx = CheckContext::new(Engine::Mysql).with_catalog(shop_catalog());
        let rule = rule_without_payload(RuleType::DatabaseDropEmptyDatabase);
        let advice = check_with("DROP DATABASE other;\nDROP DATABASE shop;", &ctx, rule);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::DATABASE_NOT_EMPTY);
        assert_eq!(
            advice[0].content,
            "Database `shop` is not allowed to drop if not empty"
        );
        assert_eq!(advice[0].position.line, 2);
    }
}
