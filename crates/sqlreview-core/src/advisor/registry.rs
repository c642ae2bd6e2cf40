//! Maps (engine, rule type) pairs to rule factories.

use super::rule::{Rule, RuleContext};
use super::rules;
use crate::error::AdvisorError;
use crate::types::{Engine, RuleType};
use std::collections::BTreeMap;
use std::fmt;

/// Builds a rule instance from its configuration.
pub type RuleFactory = fn(&RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError>;

/// Lookup table of the rules available per engine.
///
/// A rule type without a factory for an engine is silently skipped by the
/// review entry point.
#[derive(Clone, Default)]
pub struct AdvisorRegistry {
    factories: BTreeMap<(Engine, RuleType), RuleFactory>,
}

impl fmt::Debug for AdvisorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries()).finish()
    }
}

impl AdvisorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in rule.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        rules::register_builtin(&mut registry);
        registry
    }

    /// Registers `factory`, returning the factory it replaced.
    pub fn register(
        &mut self,
        engine: Engine,
        rule_type: RuleType,
        factory: RuleFactory,
    ) -> Option<RuleFactory> {
        self.factories.insert((engine, rule_type), factory)
    }

    /// Registers `factory` for each of `engines`.
    pub fn register_engines(
        &mut self,
        engines: &[Engine],
        rule_type: RuleType,
        factory: RuleFactory,
    ) {
        for &engine in engines {
            self.register(engine, rule_type, factory);
        }
    }

    pub fn lookup(&self, engine: Engine, rule_type: RuleType) -> Option<RuleFactory> {
        self.factories.get(&(engine, rule_type)).copied()
    }

    pub fn contains(&self, engine: Engine, rule_type: RuleType) -> bool {
        self.factories.contains_key(&(engine, rule_type))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered pairs in (engine, rule type) order.
    pub fn entries(&self) -> impl Iterator<Item = (Engine, RuleType)> + '_ {
        self.factories.keys().copied()
    }

    /// Rule types available for `engine`.
    pub fn rule_types(&self, engine: Engine) -> Vec<RuleType> {
        self.entries()
            .filter(|(candidate, _)| *candidate == engine)
            .map(|(_, rule_type)| rule_type)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::rule::BaseRule;
    use crate::error::RuleError;
    use crate::syntax::{NodeKind, NodeRef};

    struct Noop(BaseRule);

    impl Rule for Noop {
        fn on_enter(&mut self, _node: NodeRef<'_>, _kind: NodeKind) -> Result<(), RuleError> {
            Ok(())
        }

        fn base(&self) -> &BaseRule {
            &self.0
        }

        fn base_mut(&mut self) -> &mut BaseRule {
            &mut self.0
        }
    }

    fn noop(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Noop(ctx.base())))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = AdvisorRegistry::new();
        assert!(registry.is_empty());
        assert!(registry
            .register(Engine::Postgres, RuleType::NamingTable, noop)
            .is_none());
        assert!(registry.contains(Engine::Postgres, RuleType::NamingTable));
        assert!(registry.lookup(Engine::Mysql, RuleType::NamingTable).is_none());
        assert!(registry
            .register(Engine::Postgres, RuleType::NamingTable, noop)
            .is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_engines() {
        let mut registry = AdvisorRegistry::new();
        registry.register_engines(
            &[Engine::Mysql, Engine::Tidb],
            RuleType::StatementDisallowLimit,
            noop,
        );
        assert_eq!(
            registry.rule_types(Engine::Tidb),
            vec![RuleType::StatementDisallowLimit]
        );
        assert!(registry.rule_types(Engine::Postgres).is_empty());
    }

    #[test]
    fn test_builtin_covers_portable_rules_on_every_engine() {
        let registry = AdvisorRegistry::builtin();
        for engine in Engine::ALL {
            assert!(registry.contains(engine, RuleType::StatementWhereRequire));
            assert!(registry.contains(engine, RuleType::NamingTable));
            assert!(registry.contains(engine, RuleType::IndexNoDuplicateColumn));
        }
        assert!(registry.contains(Engine::Postgres, RuleType::IndexCreateConcurrently));
        assert!(!registry.contains(Engine::Mysql, RuleType::IndexCreateConcurrently));
        assert!(registry.contains(Engine::Mariadb, RuleType::StatementDisallowLimit));
        assert!(!registry.contains(Engine::Postgres, RuleType::StatementDisallowLimit));
    }
}
