//! Serializable database schema snapshot.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Catalog;
use crate::error::CatalogError;
use crate::syntax::names::TableName;

/// A database with its schemas, as captured before the review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseMetadata {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Schema searched for unqualified table names (e.g. `public`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,

    #[serde(default)]
    pub schemas: Vec<SchemaMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMetadata {
    #[serde(default)]
    pub name: String,

    /// Owning role; `pg_database_owner` stands for the database owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(default)]
    pub tables: Vec<TableMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(default)]
    pub columns: Vec<ColumnMetadata>,

    #[serde(default)]
    pub indexes: Vec<IndexMetadata>,
}

impl TableMetadata {
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    pub fn index(&self, name: &str) -> Option<&IndexMetadata> {
        self.indexes
            .iter()
            .find(|index| index.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_key(&self) -> Option<&IndexMetadata> {
        self.indexes.iter().find(|index| index.primary)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,

    #[serde(rename = "type", default)]
    pub data_type: String,

    #[serde(default = "default_nullable")]
    pub nullable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub name: String,

    /// Key columns or expressions, in key order.
    #[serde(default)]
    pub expressions: Vec<String>,

    #[serde(default)]
    pub unique: bool,

    #[serde(default)]
    pub primary: bool,

    /// Access method, e.g. `btree` or `hash`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub index_type: Option<String>,
}

impl DatabaseMetadata {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    fn schema(&self, name: &str) -> Option<&SchemaMetadata> {
        self.schemas
            .iter()
            .find(|schema| schema.name.eq_ignore_ascii_case(name))
    }

    /// Schemas searched for an unqualified name.
    fn search_schemas(&self) -> Vec<&SchemaMetadata> {
        match self.default_schema.as_deref().and_then(|name| self.schema(name)) {
            Some(schema) => vec![schema],
            None => self.schemas.iter().collect(),
        }
    }
}

impl Catalog for DatabaseMetadata {
    fn database_name(&self) -> &str {
        &self.name
    }

    fn default_schema(&self) -> Option<&str> {
        self.default_schema.as_deref()
    }

    fn database_owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn schema_owner(&self, schema: &str) -> Option<&str> {
        self.schema(schema)?.owner.as_deref()
    }

    fn find_table(&self, table: &TableName) -> Option<&TableMetadata> {
        let schemas: Vec<&SchemaMetadata> = match table.schema.as_deref() {
            Some(schema) => self.schema(schema).into_iter().collect(),
            None => self.search_schemas(),
        };
        schemas.into_iter().find_map(|schema| {
            schema
                .tables
                .iter()
                .find(|candidate| candidate.name.eq_ignore_ascii_case(&table.name))
        })
    }

    fn list_tables(&self, schema: Option<&str>) -> Vec<&TableMetadata> {
        match schema {
            Some(name) => self
                .schema(name)
                .map(|schema| schema.tables.iter().collect())
                .unwrap_or_default(),
            None => self
                .schemas
                .iter()
                .flat_map(|schema| schema.tables.iter())
                .collect(),
        }
    }
}
