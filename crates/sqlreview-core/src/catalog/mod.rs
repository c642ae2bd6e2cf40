//! Read-only schema lookups used by catalog-aware rules.
//!
//! Rules never mutate the catalog. A missing entry means "unknown", and
//! rules skip the occurrence instead of reporting it.

mod metadata;

pub use metadata::{ColumnMetadata, DatabaseMetadata, IndexMetadata, SchemaMetadata, TableMetadata};

use crate::syntax::names::TableName;

/// A snapshot of database schema that rules can query by name.
///
/// Name matching is case-insensitive.
pub trait Catalog: Send + Sync {
    fn database_name(&self) -> &str;

    /// Schema that unqualified names resolve to, if the snapshot names one.
    fn default_schema(&self) -> Option<&str> {
        None
    }

    /// Role owning the database, if the snapshot records it.
    fn database_owner(&self) -> Option<&str> {
        None
    }

    fn schema_owner(&self, _schema: &str) -> Option<&str> {
        None
    }

    /// Finds a table; an unqualified name searches the default schema.
    fn find_table(&self, table: &TableName) -> Option<&TableMetadata>;

    /// Tables of one schema, or of every schema when `schema` is `None`.
    fn list_tables(&self, schema: Option<&str>) -> Vec<&TableMetadata>;

    fn find_column(&self, table: &TableName, column: &str) -> Option<&ColumnMetadata> {
        self.find_table(table)?.column(column)
    }

    fn find_index(&self, table: &TableName, index: &str) -> Option<&IndexMetadata> {
        self.find_table(table)?.index(index)
    }

    fn is_database_empty(&self) -> bool {
        self.list_tables(None).is_empty()
    }
}
