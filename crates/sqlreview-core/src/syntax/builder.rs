//! Builds a [`SyntaxTree`] from a parsed script.

use super::names::{ident_line, object_name_line};
use super::tree::{Node, NodeData, NodeId, NodeKind, SyntaxTree};
use super::visit::{expr_line, subqueries_in_expr};
use crate::parser::ParsedScript;
use sqlparser::ast::{
    AlterTableOperation, ColumnDef, Expr, Join, Query, Select, SetExpr, Statement,
    TableConstraint, TableFactor,
};

impl<'a> SyntaxTree<'a> {
    /// Builds the tree for every statement of `script`.
    pub fn build(script: &'a ParsedScript<'a>) -> Self {
        let mut builder = TreeBuilder::default();
        let root = builder.push(None, NodeKind::Root, NodeData::Root, 0);

        for (index, parsed) in script.statements.iter().enumerate() {
            builder.statement = Some(index);
            builder.add_statement(root, &parsed.statement);
        }

        SyntaxTree {
            nodes: builder.nodes,
            statements: script.statements.iter().collect(),
        }
    }
}

pub(crate) fn statement_kind(statement: &Statement) -> NodeKind {
    match statement {
        Statement::CreateTable(_) => NodeKind::CreateTableStmt,
        Statement::AlterTable { .. } => NodeKind::AlterTableStmt,
        Statement::CreateIndex(_) => NodeKind::CreateIndexStmt,
        Statement::CreateView { .. } => NodeKind::CreateViewStmt,
        Statement::Drop { .. } => NodeKind::DropStmt,
        Statement::Insert(_) => NodeKind::InsertStmt,
        Statement::Update { .. } => NodeKind::UpdateStmt,
        Statement::Delete(_) => NodeKind::DeleteStmt,
        Statement::Query(_) => NodeKind::SelectStmt,
        Statement::Commit { .. } => NodeKind::CommitStmt,
        Statement::Comment { .. } => NodeKind::CommentStmt,
        _ => NodeKind::OtherStmt,
    }
}

#[derive(Default)]
struct TreeBuilder<'a> {
    nodes: Vec<Node<'a>>,
    statement: Option<usize>,
}

impl<'a> TreeBuilder<'a> {
    fn push(
        &mut self,
        parent: Option<NodeId>,
        kind: NodeKind,
        data: NodeData<'a>,
        line: usize,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            data,
            parent,
            children: Vec::new(),
            statement: self.statement,
            line,
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(id);
        }
        id
    }

    fn line_of(&self, id: NodeId) -> usize {
        self.nodes[id].line
    }

    fn add_statement(&mut self, root: NodeId, statement: &'a Statement) {
        // Statement fragments are parsed on their own, so they start on line 1.
        let id = self.push(
            Some(root),
            statement_kind(statement),
            NodeData::Statement(statement),
            1,
        );

        match statement {
            Statement::CreateTable(create) => {
                for column in &create.columns {
                    self.add_column_def(id, column);
                }
                for constraint in &create.constraints {
                    self.add_table_constraint(id, constraint);
                }
                if let Some(query) = &create.query {
                    self.add_query(id, query);
                }
            }
            Statement::AlterTable { operations, .. } => {
                for operation in operations {
                    self.add_alter_cmd(id, operation);
                }
            }
            Statement::CreateView { query, .. } => self.add_query(id, query),
            Statement::Insert(insert) => {
                if let Some(source) = &insert.source {
                    self.add_query(id, source);
                }
            }
            Statement::Update { selection, .. } => {
                if let Some(selection) = selection {
                    self.add_where(id, selection);
                }
            }
            Statement::Delete(delete) => {
                if let Some(selection) = &delete.selection {
                    self.add_where(id, selection);
                }
            }
            Statement::Query(query) => self.add_query(id, query),
            _ => {}
        }
    }

    fn add_column_def(&mut self, parent: NodeId, column: &'a ColumnDef) {
        let line = ident_line(&column.name).unwrap_or_else(|| self.line_of(parent));
        self.push(
            Some(parent),
            NodeKind::ColumnDef,
            NodeData::ColumnDef(column),
            line,
        );
    }

    fn add_table_constraint(&mut self, parent: NodeId, constraint: &'a TableConstraint) {
        let line = constraint_name(constraint)
            .and_then(ident_line)
            .unwrap_or_else(|| self.line_of(parent));
        self.push(
            Some(parent),
            NodeKind::TableConstraint,
            NodeData::TableConstraint(constraint),
            line,
        );
    }

    fn add_alter_cmd(&mut self, parent: NodeId, operation: &'a AlterTableOperation) {
        let line = match operation {
            AlterTableOperation::AddColumn { column_def, .. } => ident_line(&column_def.name),
            AlterTableOperation::AlterColumn { column_name, .. } => ident_line(column_name),
            AlterTableOperation::RenameColumn {
                old_column_name, ..
            } => ident_line(old_column_name),
            AlterTableOperation::AddConstraint { constraint, .. } => {
                constraint_name(constraint).and_then(ident_line)
            }
            _ => None,
        }
        .unwrap_or_else(|| self.line_of(parent));

        let id = self.push(
            Some(parent),
            NodeKind::AlterTableCmd,
            NodeData::AlterTableCmd(operation),
            line,
        );

        match operation {
            AlterTableOperation::AddColumn { column_def, .. } => self.add_column_def(id, column_def),
            AlterTableOperation::AddConstraint { constraint, .. } => {
                self.add_table_constraint(id, constraint)
            }
            _ => {}
        }
    }

    fn add_query(&mut self, parent: NodeId, query: &'a Query) {
        let line = self.line_of(parent);
        let id = self.push(Some(parent), NodeKind::Query, NodeData::Query(query), line);
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.add_query(id, &cte.query);
            }
        }
        self.add_set_expr(id, &query.body);
    }

    fn add_set_expr(&mut self, parent: NodeId, body: &'a SetExpr) {
        match body {
            SetExpr::Select(select) => self.add_select(parent, select),
            SetExpr::Query(query) => self.add_query(parent, query),
            SetExpr::SetOperation { left, right, .. } => {
                self.add_set_expr(parent, left);
                self.add_set_expr(parent, right);
            }
            _ => {}
        }
    }

    fn add_select(&mut self, parent: NodeId, select: &'a Select) {
        let line = match select.select_token.0.span.start.line {
            0 => self.line_of(parent),
            line => line as usize,
        };
        let id = self.push(Some(parent), NodeKind::Select, NodeData::Select(select), line);

        for table in &select.from {
            self.add_table_factor(id, &table.relation);
            for join in &table.joins {
                self.add_join(id, join);
            }
        }
        if let Some(selection) = &select.selection {
            self.add_where(id, selection);
        }
    }

    fn add_join(&mut self, parent: NodeId, join: &'a Join) {
        let line = match &join.relation {
            TableFactor::Table { name, .. } => object_name_line(name),
            _ => None,
        }
        .unwrap_or_else(|| self.line_of(parent));
        let id = self.push(Some(parent), NodeKind::Join, NodeData::Join(join), line);
        self.add_table_factor(id, &join.relation);
    }

    fn add_table_factor(&mut self, parent: NodeId, factor: &'a TableFactor) {
        match factor {
            TableFactor::Derived { subquery, .. } => self.add_query(parent, subquery),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => {
                self.add_table_factor(parent, &table_with_joins.relation);
                for join in &table_with_joins.joins {
                    self.add_join(parent, join);
                }
            }
            _ => {}
        }
    }

    fn add_where(&mut self, parent: NodeId, expr: &'a Expr) {
        let line = expr_line(expr).unwrap_or_else(|| self.line_of(parent));
        let id = self.push(Some(parent), NodeKind::WhereClause, NodeData::Where(expr), line);
        for query in subqueries_in_expr(expr) {
            self.add_query(id, query);
        }
    }
}

pub(crate) fn constraint_name(constraint: &TableConstraint) -> Option<&sqlparser::ast::Ident> {
    match constraint {
        TableConstraint::Unique { name, .. }
        | TableConstraint::PrimaryKey { name, .. }
        | TableConstraint::ForeignKey { name, .. }
        | TableConstraint::Check { name, .. }
        | TableConstraint::Index { name, .. } => name.as_ref(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_script;
    use crate::types::Engine;

    fn kinds(sql: &str) -> Vec<(NodeKind, usize)> {
        let script = parse_script(sql, Engine::Postgres).unwrap();
        let tree = SyntaxTree::build(&script);
        (0..tree.len())
            .filter_map(|id| tree.node(id))
            .map(|node| (node.kind(), node.script_line()))
            .collect()
    }

    #[test]
    fn test_create_table_children() {
        let nodes = kinds("CREATE TABLE t (\n  a int,\n  b int,\n  CONSTRAINT pk_t PRIMARY KEY (a)\n)");
        assert_eq!(
            nodes,
            vec![
                (NodeKind::Root, 0),
                (NodeKind::CreateTableStmt, 1),
                (NodeKind::ColumnDef, 2),
                (NodeKind::ColumnDef, 3),
                (NodeKind::TableConstraint, 4),
            ]
        );
    }

    #[test]
    fn test_alter_table_commands_nest_column_defs() {
        let nodes = kinds("ALTER TABLE t ADD COLUMN c int, ADD CONSTRAINT uk_c UNIQUE (c)");
        let names: Vec<_> = nodes.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(
            names,
            vec![
                NodeKind::Root,
                NodeKind::AlterTableStmt,
                NodeKind::AlterTableCmd,
                NodeKind::ColumnDef,
                NodeKind::AlterTableCmd,
                NodeKind::TableConstraint,
            ]
        );
    }

    #[test]
    fn test_where_subquery_becomes_query_node() {
        let sql = "SELECT * FROM a JOIN b ON a.id = b.id WHERE a.x IN (SELECT x FROM c)";
        let names: Vec<_> = kinds(sql).into_iter().map(|(kind, _)| kind).collect();
        assert_eq!(
            names,
            vec![
                NodeKind::Root,
                NodeKind::SelectStmt,
                NodeKind::Query,
                NodeKind::Select,
                NodeKind::Join,
                NodeKind::WhereClause,
                NodeKind::Query,
                NodeKind::Select,
            ]
        );
    }

    #[test]
    fn test_statement_lines_follow_script() {
        let nodes = kinds("SELECT 1;\n\nUPDATE t SET a = 1\nWHERE b = 2;");
        let update = nodes
            .iter()
            .find(|(kind, _)| *kind == NodeKind::UpdateStmt)
            .unwrap();
        assert_eq!(update.1, 3);
        let where_clause = nodes
            .iter()
            .find(|(kind, _)| *kind == NodeKind::WhereClause)
            .unwrap();
        assert_eq!(where_clause.1, 4);
    }

    #[test]
    fn test_node_helpers() {
        let script = parse_script(
            "CREATE TABLE s.t (a int)",
            Engine::Postgres,
        )
        .unwrap();
        let tree = SyntaxTree::build(&script);
        let column = tree.node(2).unwrap();
        assert_eq!(column.kind(), NodeKind::ColumnDef);
        assert!(!column.is_top_level());
        assert_eq!(
            column.enclosing_statement().map(|n| n.kind()),
            Some(NodeKind::CreateTableStmt)
        );
        assert_eq!(column.owning_table().map(|n| n.to_string()), Some("s.t".to_string()));
        assert_eq!(column.statement_text(), "CREATE TABLE s.t (a int)");
        assert!(column.column_def().is_ok());
        assert!(column.statement().is_err());
        assert_eq!(column.ancestors().count(), 2);
    }
}
