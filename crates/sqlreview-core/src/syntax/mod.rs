//! Typed syntax tree used by the rule dispatcher.
//!
//! The tree is a thin index over sqlparser's AST: every node borrows its
//! payload and carries a [`NodeKind`] tag so rules can match on it.

mod builder;
pub mod names;
mod tree;
pub mod visit;

pub(crate) use builder::constraint_name;
pub use tree::{NodeData, NodeId, NodeKind, NodeRef, SyntaxTree};
