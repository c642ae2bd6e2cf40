//! Arena tree over the parsed statements of a script.

use crate::error::RuleError;
use crate::parser::ParsedStatement;
use sqlparser::ast::{
    AlterTableOperation, ColumnDef, Expr, Join, ObjectName, Query, Select, Statement,
    TableConstraint,
};

pub type NodeId = usize;

/// Semantic kind of a syntax tree node.
///
/// Rules match on this tag to decide whether a node is relevant to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    CreateTableStmt,
    AlterTableStmt,
    CreateIndexStmt,
    CreateViewStmt,
    DropStmt,
    InsertStmt,
    UpdateStmt,
    DeleteStmt,
    SelectStmt,
    CommitStmt,
    CommentStmt,
    OtherStmt,
    ColumnDef,
    TableConstraint,
    AlterTableCmd,
    Query,
    Select,
    Join,
    WhereClause,
}

impl NodeKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::CreateTableStmt => "CreateTableStmt",
            Self::AlterTableStmt => "AlterTableStmt",
            Self::CreateIndexStmt => "CreateIndexStmt",
            Self::CreateViewStmt => "CreateViewStmt",
            Self::DropStmt => "DropStmt",
            Self::InsertStmt => "InsertStmt",
            Self::UpdateStmt => "UpdateStmt",
            Self::DeleteStmt => "DeleteStmt",
            Self::SelectStmt => "SelectStmt",
            Self::CommitStmt => "CommitStmt",
            Self::CommentStmt => "CommentStmt",
            Self::OtherStmt => "OtherStmt",
            Self::ColumnDef => "ColumnDef",
            Self::TableConstraint => "TableConstraint",
            Self::AlterTableCmd => "AlterTableCmd",
            Self::Query => "Query",
            Self::Select => "Select",
            Self::Join => "Join",
            Self::WhereClause => "WhereClause",
        }
    }

    pub const fn is_statement(self) -> bool {
        matches!(
            self,
            Self::CreateTableStmt
                | Self::AlterTableStmt
                | Self::CreateIndexStmt
                | Self::CreateViewStmt
                | Self::DropStmt
                | Self::InsertStmt
                | Self::UpdateStmt
                | Self::DeleteStmt
                | Self::SelectStmt
                | Self::CommitStmt
                | Self::CommentStmt
                | Self::OtherStmt
        )
    }

    pub const fn is_ddl(self) -> bool {
        matches!(
            self,
            Self::CreateTableStmt
                | Self::AlterTableStmt
                | Self::CreateIndexStmt
                | Self::CreateViewStmt
                | Self::DropStmt
        )
    }

    pub const fn is_dml(self) -> bool {
        matches!(self, Self::InsertStmt | Self::UpdateStmt | Self::DeleteStmt)
    }
}

/// Borrowed AST payload of a node.
#[derive(Debug, Clone, Copy)]
pub enum NodeData<'a> {
    Root,
    Statement(&'a Statement),
    ColumnDef(&'a ColumnDef),
    TableConstraint(&'a TableConstraint),
    AlterTableCmd(&'a AlterTableOperation),
    Query(&'a Query),
    Select(&'a Select),
    Join(&'a Join),
    Where(&'a Expr),
}

#[derive(Debug)]
pub(crate) struct Node<'a> {
    pub(crate) kind: NodeKind,
    pub(crate) data: NodeData<'a>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) statement: Option<usize>,
    pub(crate) line: usize,
}

/// Read-only tree of typed nodes. Node 0 is the root.
#[derive(Debug)]
pub struct SyntaxTree<'a> {
    pub(crate) nodes: Vec<Node<'a>>,
    pub(crate) statements: Vec<&'a ParsedStatement<'a>>,
}

impl<'a> SyntaxTree<'a> {
    pub const ROOT: NodeId = 0;

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            tree: self,
            id: Self::ROOT,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id < self.nodes.len()).then_some(NodeRef { tree: self, id })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

/// A cheap handle to one node of a [`SyntaxTree`].
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t SyntaxTree<'t>,
    id: NodeId,
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("line", &self.line())
            .finish()
    }
}

impl<'t> NodeRef<'t> {
    fn raw(&self) -> &'t Node<'t> {
        &self.tree.nodes[self.id]
    }

    fn at(&self, id: NodeId) -> NodeRef<'t> {
        NodeRef {
            tree: self.tree,
            id,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.raw().kind
    }

    pub fn data(&self) -> NodeData<'t> {
        self.raw().data
    }

    pub fn parent(&self) -> Option<NodeRef<'t>> {
        self.raw().parent.map(|id| self.at(id))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'t>> + 't {
        let tree = self.tree;
        self.raw()
            .children
            .iter()
            .map(move |&id| NodeRef { tree, id })
    }

    /// Parents of this node, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = NodeRef<'t>> + 't {
        std::iter::successors(self.parent(), |node| node.parent())
    }

    /// The statement node this node belongs to (itself for statement nodes).
    pub fn enclosing_statement(&self) -> Option<NodeRef<'t>> {
        std::iter::once(*self)
            .chain(self.ancestors())
            .find(|node| node.kind().is_statement())
    }

    /// True when the node's parent is the root.
    pub fn is_top_level(&self) -> bool {
        self.parent().is_some_and(|parent| parent.kind() == NodeKind::Root)
    }

    pub fn statement_source(&self) -> Option<&'t ParsedStatement<'t>> {
        self.raw()
            .statement
            .and_then(|index| self.tree.statements.get(index).copied())
    }

    /// Exact source text of the enclosing statement, empty for the root.
    pub fn statement_text(&self) -> &'t str {
        self.statement_source().map_or("", |source| source.text)
    }

    /// Line of the node relative to its statement (1-indexed).
    pub fn line(&self) -> usize {
        self.raw().line
    }

    /// Line of the node relative to the whole script (1-indexed).
    pub fn script_line(&self) -> usize {
        self.line() + self.statement_source().map_or(0, |source| source.base_line)
    }

    /// Table targeted by the enclosing CREATE TABLE, ALTER TABLE or CREATE INDEX.
    pub fn owning_table(&self) -> Option<&'t ObjectName> {
        let statement = self.enclosing_statement()?;
        match statement.data() {
            NodeData::Statement(Statement::CreateTable(create)) => Some(&create.name),
            NodeData::Statement(Statement::AlterTable { name, .. }) => Some(name),
            NodeData::Statement(Statement::CreateIndex(create)) => Some(&create.table_name),
            _ => None,
        }
    }

    fn unexpected(&self) -> RuleError {
        RuleError::UnexpectedNode {
            kind: self.kind().name(),
        }
    }

    pub fn statement(&self) -> Result<&'t Statement, RuleError> {
        match self.data() {
            NodeData::Statement(statement) => Ok(statement),
            _ => Err(self.unexpected()),
        }
    }

    pub fn column_def(&self) -> Result<&'t ColumnDef, RuleError> {
        match self.data() {
            NodeData::ColumnDef(column) => Ok(column),
            _ => Err(self.unexpected()),
        }
    }

    pub fn table_constraint(&self) -> Result<&'t TableConstraint, RuleError> {
        match self.data() {
            NodeData::TableConstraint(constraint) => Ok(constraint),
            _ => Err(self.unexpected()),
        }
    }

    pub fn alter_cmd(&self) -> Result<&'t AlterTableOperation, RuleError> {
        match self.data() {
            NodeData::AlterTableCmd(op) => Ok(op),
            _ => Err(self.unexpected()),
        }
    }

    pub fn query(&self) -> Result<&'t Query, RuleError> {
        match self.data() {
            NodeData::Query(query) => Ok(query),
            _ => Err(self.unexpected()),
        }
    }

    pub fn select(&self) -> Result<&'t Select, RuleError> {
        match self.data() {
            NodeData::Select(select) => Ok(select),
            _ => Err(self.unexpected()),
        }
    }

    pub fn join(&self) -> Result<&'t Join, RuleError> {
        match self.data() {
            NodeData::Join(join) => Ok(join),
            _ => Err(self.unexpected()),
        }
    }

    pub fn where_expr(&self) -> Result<&'t Expr, RuleError> {
        match self.data() {
            NodeData::Where(expr) => Ok(expr),
            _ => Err(self.unexpected()),
        }
    }
}
