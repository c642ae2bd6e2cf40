//! Object ownership checks against the catalog's recorded owners.

use super::helpers::TableKeys;
use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::catalog::Catalog;
use crate::error::{AdvisorError, RuleError};
use crate::syntax::names::{simple_name, TableName};
use crate::syntax::{NodeKind, NodeRef};
use crate::types::advice_codes;
use sqlparser::ast::{ObjectName, ObjectType, Set, Statement};
use std::sync::Arc;

/// Owner name PostgreSQL uses for objects owned by the database owner.
const DATABASE_OWNER_ROLE: &str = "pg_database_owner";

/// The object whose owner a statement needs to match.
enum Owned {
    Database,
    Schema(String),
    Table(ObjectName),
}

/// Statements run by a role that does not own the object they change.
///
/// The current role starts as the database owner and follows `SET ROLE`.
/// Objects without a recorded owner are skipped, as is everything when no
/// catalog is attached.
pub struct ObjectOwnerCheck {
    base: BaseRule,
    catalog: Option<Arc<dyn Catalog>>,
    keys: TableKeys,
    current_role: Option<String>,
}

impl ObjectOwnerCheck {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        let current_role = ctx
            .catalog
            .as_ref()
            .and_then(|catalog| catalog.database_owner().map(str::to_string));
        Ok(Box::new(Self {
            base: ctx.base(),
            catalog: ctx.catalog.clone(),
            keys: TableKeys::from_context(ctx),
            current_role,
        }))
    }

    fn owned_objects(&self, statement: &Statement) -> Vec<Owned> {
        let schema_of = |name: &ObjectName| Owned::Schema(self.keys.schema_of(name));
        match statement {
            Statement::CreateSchema { .. } => vec![Owned::Database],
            Statement::AlterTable { name, .. } => vec![Owned::Table(name.clone())],
            Statement::Drop {
                object_type, names, ..
            } => match object_type {
                ObjectType::Table => names.iter().cloned().map(Owned::Table).collect(),
                ObjectType::Schema => names
                    .iter()
                    .map(|name| Owned::Schema(simple_name(name)))
                    .collect(),
                ObjectType::View
                | ObjectType::Index
                | ObjectType::Sequence
                | ObjectType::Type => names.iter().map(schema_of).collect(),
                _ => Vec::new(),
            },
            Statement::CreateTable(create) => vec![schema_of(&create.name)],
            Statement::CreateView { name, .. } => vec![schema_of(name)],
            Statement::CreateIndex(create) => vec![schema_of(&create.table_name)],
            Statement::CreateSequence { name, .. } | Statement::CreateType { name, .. } => {
                vec![schema_of(name)]
            }
            Statement::CreateFunction(create) => vec![schema_of(&create.name)],
            Statement::CreateExtension { schema, .. } => {
                let schema = schema
                    .as_ref()
                    .map(|ident| ident.value.clone())
                    .unwrap_or_else(|| self.keys.default_schema().to_string());
                vec![Owned::Schema(schema)]
            }
            _ => Vec::new(),
        }
    }

    /// Recorded owner with `pg_database_owner` resolved.
    fn owner_of(&self, catalog: &dyn Catalog, object: &Owned) -> Option<String> {
        let owner = match object {
            Owned::Database => catalog.database_owner(),
            Owned::Schema(schema) => catalog.schema_owner(schema),
            Owned::Table(name) => {
                let table = TableName::from_object_name(name);
                let table = TableName::new(Some(&self.keys.schema_of(name)), table.name);
                catalog.find_table(&table)?.owner.as_deref()
            }
        }?;
        if owner == DATABASE_OWNER_ROLE {
            return catalog.database_owner().map(str::to_string);
        }
        Some(owner.to_string())
    }

    fn describe(catalog: &dyn Catalog, object: &Owned) -> String {
        match object {
            Owned::Database => format!("Database \"{}\"", catalog.database_name()),
            Owned::Schema(schema) => format!("Schema \"{schema}\""),
            Owned::Table(name) => format!("Table \"{}\"", simple_name(name)),
        }
    }
}

impl Rule for ObjectOwnerCheck {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if !kind.is_statement() {
            return Ok(());
        }
        let statement = node.statement()?;
        if let Statement::Set(Set::SetRole { role_name, .. }) = statement {
            self.current_role = match role_name {
                Some(role) => Some(role.value.clone()),
                None => self
                    .catalog
                    .as_ref()
                    .and_then(|catalog| catalog.database_owner().map(str::to_string)),
            };
            return Ok(());
        }
        let Some(catalog) = self.catalog.clone() else {
            return Ok(());
        };
        let current = self.current_role.clone().unwrap_or_default();
        for object in self.owned_objects(statement) {
            let Some(owner) = self.owner_of(catalog.as_ref(), &object) else {
                continue;
            };
            if owner != current {
                self.base.report(
                    advice_codes::STATEMENT_OBJECT_OWNER_CHECK,
                    format!(
                        "{} is owned by \"{owner}\", but the current role is \"{current}\".",
                        Self::describe(catalog.as_ref(), &object)
                    ),
                    node.line(),
                );
            }
        }
        Ok(())
    }

    rule_base!();
}
