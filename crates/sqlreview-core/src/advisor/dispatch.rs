//! Walks a syntax tree once and fans every node out to the registered rules.

use super::rule::Rule;
use crate::error::RuleError;
use crate::syntax::{NodeId, NodeKind, NodeRef, SyntaxTree};
use crate::types::Advice;
#[cfg(feature = "tracing")]
use tracing::warn;

/// Which callback a rule failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkPhase {
    Enter,
    Exit,
}

/// A rule error recorded during the walk; the walk itself keeps going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    /// Title of the failing rule.
    pub rule: String,
    pub node_kind: NodeKind,
    pub phase: WalkPhase,
    /// Script line of the node being visited.
    pub line: usize,
    pub error: RuleError,
}

enum Frame {
    Enter(NodeId),
    Exit(NodeId),
}

/// Runs a set of rules over a tree in a single pre-order/post-order walk.
///
/// Rules see every node in document order, in their registration order. A
/// rule that errors on one node is recorded in [`RuleDispatcher::failures`]
/// and still receives the remaining nodes.
pub struct RuleDispatcher {
    rules: Vec<Box<dyn Rule>>,
    base_line: usize,
    failures: Vec<RuleFailure>,
}

impl RuleDispatcher {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self {
            rules,
            base_line: 0,
            failures: Vec::new(),
        }
    }

    pub fn register(&mut self, mut rule: Box<dyn Rule>) {
        rule.set_base_line(self.base_line);
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Line offset of the whole script within a larger document.
    pub fn set_base_line(&mut self, line: usize) {
        self.base_line = line;
        for rule in &mut self.rules {
            rule.set_base_line(line);
        }
    }

    pub fn base_line(&self) -> usize {
        self.base_line
    }

    /// Visits every node of `tree`, calling `on_enter` before the children
    /// and `on_exit` after them.
    pub fn walk(&mut self, tree: &SyntaxTree<'_>) {
        let mut stack = vec![Frame::Enter(SyntaxTree::ROOT)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id) => {
                    let Some(node) = tree.node(id) else {
                        continue;
                    };
                    self.align_base_line(node);
                    self.dispatch(node, WalkPhase::Enter);

                    stack.push(Frame::Exit(id));
                    let children: Vec<NodeId> = node.children().map(|child| child.id()).collect();
                    stack.extend(children.into_iter().rev().map(Frame::Enter));
                }
                Frame::Exit(id) => {
                    let Some(node) = tree.node(id) else {
                        continue;
                    };
                    self.align_base_line(node);
                    self.dispatch(node, WalkPhase::Exit);
                }
            }
        }
    }

    /// Statement nodes shift rule lines to the statement's script position;
    /// the root resets them to the script offset.
    fn align_base_line(&mut self, node: NodeRef<'_>) {
        let kind = node.kind();
        if kind != NodeKind::Root && !kind.is_statement() {
            return;
        }
        let line = self.base_line + node.statement_source().map_or(0, |source| source.base_line);
        for rule in &mut self.rules {
            rule.set_base_line(line);
        }
    }

    fn dispatch(&mut self, node: NodeRef<'_>, phase: WalkPhase) {
        let kind = node.kind();
        for rule in &mut self.rules {
            let result = match phase {
                WalkPhase::Enter => rule.on_enter(node, kind),
                WalkPhase::Exit => rule.on_exit(node, kind),
            };
            if let Err(error) = result {
                #[cfg(feature = "tracing")]
                warn!(
                    rule = rule.name(),
                    node = kind.name(),
                    ?phase,
                    %error,
                    "rule failed on node, continuing walk"
                );
                self.failures.push(RuleFailure {
                    rule: rule.name().to_string(),
                    node_kind: kind,
                    phase,
                    line: self.base_line + node.script_line(),
                    error,
                });
            }
        }
    }

    pub fn failures(&self) -> &[RuleFailure] {
        &self.failures
    }

    /// Advice of every rule, concatenated in registration order.
    pub fn advice_list(&self) -> Vec<Advice> {
        self.rules
            .iter()
            .flat_map(|rule| rule.advice_list().iter().cloned())
            .collect()
    }

    /// Consumes the dispatcher, returning advice and failures.
    pub fn into_parts(self) -> (Vec<Advice>, Vec<RuleFailure>) {
        let advice = self
            .rules
            .into_iter()
            .flat_map(|mut rule| rule.take_advice())
            .collect();
        (advice, self.failures)
    }
}
