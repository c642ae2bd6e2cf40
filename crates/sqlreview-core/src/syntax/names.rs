//! Helpers for reading identifiers out of the AST.

use sqlparser::ast::{Expr, Ident, IndexColumn, ObjectName, ObjectNamePart};
use std::fmt;

fn object_name_part_value(part: &ObjectNamePart) -> String {
    part.as_ident()
        .map(|ident| ident.value.clone())
        .unwrap_or_else(|| part.to_string())
}

/// A possibly schema-qualified table name with quotes removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn new(schema: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.into(),
        }
    }

    /// Reads the last two parts of `name` as schema and table.
    pub fn from_object_name(name: &ObjectName) -> Self {
        let parts: Vec<String> = name.0.iter().map(object_name_part_value).collect();
        match parts.as_slice() {
            [] => Self::new(None, String::new()),
            [table] => Self::new(None, table.clone()),
            [.., schema, table] => Self::new(Some(schema), table.clone()),
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.schema.is_some()
    }

    /// Lower-cased `schema.table` key for case-insensitive bookkeeping.
    pub fn key(&self) -> String {
        self.to_string().to_lowercase()
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// The unqualified last part of an object name.
pub fn simple_name(name: &ObjectName) -> String {
    name.0
        .last()
        .map(object_name_part_value)
        .unwrap_or_default()
}

/// Column name of an index key; expressions keep their SQL text.
pub fn index_column_name(column: &IndexColumn) -> String {
    match &column.column.expr {
        Expr::Identifier(ident) => ident.value.clone(),
        other => other.to_string(),
    }
}

/// Line recorded by the parser for `ident`, `None` when unknown.
pub fn ident_line(ident: &Ident) -> Option<usize> {
    let line = ident.span.start.line as usize;
    (line > 0).then_some(line)
}

/// Line of the last part of `name`, `None` when unknown.
pub fn object_name_line(name: &ObjectName) -> Option<usize> {
    name.0.last().and_then(|part| part.as_ident()).and_then(ident_line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_from_object_name() {
        let name = ObjectName::from(vec![Ident::new("public"), Ident::new("Users")]);
        let table = TableName::from_object_name(&name);
        assert_eq!(table.schema.as_deref(), Some("public"));
        assert_eq!(table.name, "Users");
        assert_eq!(table.to_string(), "public.Users");
        assert_eq!(table.key(), "public.users");
        assert_eq!(simple_name(&name), "Users");
    }

    #[test]
    fn test_three_part_name_keeps_schema_and_table() {
        let name = ObjectName::from(vec![
            Ident::new("db"),
            Ident::new("sales"),
            Ident::new("orders"),
        ]);
        let table = TableName::from_object_name(&name);
        assert_eq!(table, TableName::new(Some("sales"), "orders"));
    }

    #[test]
    fn test_quoted_identifier_is_unquoted() {
        let name = ObjectName::from(vec![Ident::with_quote('"', "Order Items")]);
        assert_eq!(TableName::from_object_name(&name).name, "Order Items");
    }
}
