//! Review rule trait, shared rule state, and construction context.

use super::driver::QueryDriver;
use super::payload::parse_payload;
use crate::catalog::Catalog;
use crate::error::{AdvisorError, RuleError};
use crate::syntax::{NodeKind, NodeRef};
use crate::types::{Advice, AdviceStatus, Engine, RuleLevel, SqlReviewRule};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Everything a rule factory may read while building a rule instance.
pub struct RuleContext<'a> {
    /// The configured rule being instantiated.
    pub rule: &'a SqlReviewRule,
    /// Engine the script is reviewed against.
    pub engine: Engine,
    /// Schema snapshot for catalog-aware rules.
    pub catalog: Option<Arc<dyn Catalog>>,
    /// Live connection for rules that run `EXPLAIN`.
    pub driver: Option<Arc<dyn QueryDriver>>,
}

impl<'a> RuleContext<'a> {
    pub fn new(rule: &'a SqlReviewRule, engine: Engine) -> Self {
        Self {
            rule,
            engine,
            catalog: None,
            driver: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_driver(mut self, driver: Arc<dyn QueryDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Decodes the rule payload into `T`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, AdvisorError> {
        parse_payload(self.rule)
    }

    /// Base state for a rule built from this context.
    pub fn base(&self) -> BaseRule {
        BaseRule::from_config(self.rule)
    }
}

/// A review rule driven by the syntax tree walk.
///
/// The dispatcher calls [`Rule::on_enter`] when it reaches a node and
/// [`Rule::on_exit`] after the node's subtree is done. Rules accumulate
/// advice in their [`BaseRule`] and hand it over through
/// [`Rule::take_advice`].
pub trait Rule: Send {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError>;

    fn on_exit(&mut self, _node: NodeRef<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        Ok(())
    }

    fn base(&self) -> &BaseRule;

    fn base_mut(&mut self) -> &mut BaseRule;

    /// Rule title used in logs and advice.
    fn name(&self) -> &str {
        self.base().title()
    }

    fn set_base_line(&mut self, line: usize) {
        self.base_mut().set_base_line(line);
    }

    fn advice_list(&self) -> &[Advice] {
        self.base().advice_list()
    }

    fn take_advice(&mut self) -> Vec<Advice> {
        self.base_mut().take_advice()
    }
}

/// State every rule carries: severity, title, line offset, and findings.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRule {
    status: AdviceStatus,
    title: String,
    base_line: usize,
    advice: Vec<Advice>,
}

impl BaseRule {
    pub fn new(status: AdviceStatus, title: impl Into<String>) -> Self {
        Self {
            status,
            title: title.into(),
            base_line: 0,
            advice: Vec::new(),
        }
    }

    /// Status follows the configured level; the title is the rule type.
    pub fn from_config(rule: &SqlReviewRule) -> Self {
        let status = match rule.level {
            RuleLevel::Error => AdviceStatus::Error,
            RuleLevel::Warning => AdviceStatus::Warning,
            RuleLevel::Disabled => AdviceStatus::Success,
        };
        Self::new(status, rule.rule_type.as_str())
    }

    pub fn status(&self) -> AdviceStatus {
        self.status
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn base_line(&self) -> usize {
        self.base_line
    }

    pub fn set_base_line(&mut self, line: usize) {
        self.base_line = line;
    }

    /// Records `advice`, shifting its line by the current base line.
    pub fn add_advice(&mut self, mut advice: Advice) {
        advice.position.line += self.base_line;
        self.advice.push(advice);
    }

    /// Records a finding with the rule's own status and title.
    pub fn report(&mut self, code: i32, content: impl Into<String>, line: usize) {
        let advice = Advice::new(self.status, code, self.title.clone(), content).at_line(line);
        self.add_advice(advice);
    }

    pub fn advice_list(&self) -> &[Advice] {
        &self.advice
    }

    pub fn take_advice(&mut self) -> Vec<Advice> {
        std::mem::take(&mut self.advice)
    }
}
