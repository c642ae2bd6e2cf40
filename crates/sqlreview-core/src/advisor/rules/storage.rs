//! Storage engine, character set and collation rules.

use super::helpers::{
    declared_column_options, option_value_text, table_engine, table_option_values,
};
use crate::advisor::payload::StringArrayTypeRulePayload;
use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::error::{AdvisorError, RuleError};
use crate::syntax::names::simple_name;
use crate::syntax::{NodeKind, NodeRef};
use crate::types::advice_codes;
use sqlparser::ast::{ColumnOption, Set, Statement};

const INNODB: &str = "innodb";

/// Tables created with a storage engine other than InnoDB, and sessions
/// that switch `default_storage_engine` away from it.
pub struct UseInnodb {
    base: BaseRule,
}

impl UseInnodb {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }

    fn engine_at(node: NodeRef<'_>, kind: NodeKind) -> Result<Option<String>, RuleError> {
        Ok(match (kind, node.statement()?) {
            (NodeKind::CreateTableStmt, Statement::CreateTable(create)) => {
                table_engine(create).map(str::to_string)
            }
            (
                NodeKind::OtherStmt,
                Statement::Set(Set::SingleAssignment {
                    variable, values, ..
                }),
            ) if simple_name(variable).eq_ignore_ascii_case("default_storage_engine") => {
                values.first().map(option_value_text)
            }
            _ => None,
        })
    }
}

impl Rule for UseInnodb {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if !matches!(kind, NodeKind::CreateTableStmt | NodeKind::OtherStmt) {
            return Ok(());
        }
        match Self::engine_at(node, kind)? {
            Some(engine) if !engine.eq_ignore_ascii_case(INNODB) => {
                self.base.report(
                    advice_codes::NOT_INNODB_ENGINE,
                    format!("\"{}\" doesn't use InnoDB engine", node.statement_text()),
                    node.line(),
                );
            }
            _ => {}
        }
        Ok(())
    }

    rule_base!();
}

/// A named setting that tables and columns can declare.
#[derive(Debug, Clone, Copy)]
enum Setting {
    Charset,
    Collation,
}

impl Setting {
    fn table_keys(self) -> &'static [&'static str] {
        match self {
            Self::Charset => &[
                "CHARSET",
                "DEFAULT CHARSET",
                "CHARACTER SET",
                "DEFAULT CHARACTER SET",
            ],
            Self::Collation => &["COLLATE", "DEFAULT COLLATE"],
        }
    }

    fn column_value(self, option: &ColumnOption) -> Option<String> {
        match (self, option) {
            (Self::Charset, ColumnOption::CharacterSet(name))
            | (Self::Collation, ColumnOption::Collation(name)) => Some(simple_name(name)),
            _ => None,
        }
    }

    fn code(self) -> i32 {
        match self {
            Self::Charset => advice_codes::DISABLED_CHARSET,
            Self::Collation => advice_codes::DISABLED_COLLATION,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Charset => "charset",
            Self::Collation => "collation",
        }
    }
}

/// Charsets or collations outside the `list` payload, declared as table
/// options or on column definitions.
pub struct Allowlist {
    base: BaseRule,
    setting: Setting,
    allowed: StringArrayTypeRulePayload,
}

impl Allowlist {
    pub fn build_charset(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Self::build(ctx, Setting::Charset)
    }

    pub fn build_collation(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Self::build(ctx, Setting::Collation)
    }

    fn build(ctx: &RuleContext<'_>, setting: Setting) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self {
            base: ctx.base(),
            setting,
            allowed: ctx.payload()?,
        }))
    }

    fn declared_values(&self, node: NodeRef<'_>, kind: NodeKind) -> Result<Vec<String>, RuleError> {
        if kind == NodeKind::CreateTableStmt {
            return Ok(match node.statement()? {
                Statement::CreateTable(create) => {
                    table_option_values(create, self.setting.table_keys())
                }
                _ => Vec::new(),
            });
        }
        Ok(declared_column_options(node, kind)?
            .map(|(_, options)| {
                options
                    .into_iter()
                    .filter_map(|option| self.setting.column_value(option))
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl Rule for Allowlist {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        for value in self.declared_values(node, kind)? {
            if self.allowed.contains(&value) {
                continue;
            }
            self.base.report(
                self.setting.code(),
                format!(
                    "\"{}\" used disabled {} '{}'",
                    node.statement_text(),
                    self.setting.label(),
                    value.to_lowercase()
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{check_sql, rule_with_payload, rule_without_payload};
    use crate::types::{advice_codes, Engine, RuleType};
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("CREATE TABLE t (id int)", 0)]
    #[case("CREATE TABLE t (id int) ENGINE=InnoDB", 0)]
    #[case("CREATE TABLE t (id int) ENGINE = innodb", 0)]
    #[case("CREATE TABLE t (id int) ENGINE=MyISAM", 1)]
    #[case("SET default_storage_engine = MyISAM", 1)]
    #[case("SET default_storage_engine = InnoDB", 0)]
    #[case("SET sql_mode = 'ANSI'", 0)]
    fn test_use_innodb(#[case] sql: &str, #[case] expected: usize) {
        let rule = rule_without_payload(RuleType::EngineMysqlUseInnodb);
        let advice = check_sql(sql, Engine::Mysql, rule);
        assert_eq!(advice.len(), expected);
        if let Some(first) = advice.first() {
            assert_eq!(first.code, advice_codes::NOT_INNODB_ENGINE);
            assert_eq!(first.content, format!("\"{sql}\" doesn't use InnoDB engine"));
        }
    }

    #[test]
    fn test_charset_allowlist() {
        let rule = rule_with_payload(RuleType::SystemCharsetAllowlist, json!({"list": ["utf8mb4"]}));
        let sql = "CREATE TABLE t (\n  a varchar(10) CHARACTER SET latin1,\n  b varchar(10) CHARACTER SET UTF8MB4\n) DEFAULT CHARSET=utf8mb4";
        let advice = check_sql(sql, Engine::Mysql, rule);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::DISABLED_CHARSET);
        assert_eq!(advice[0].position.line, 2);
        assert_eq!(advice[0].content, format!("\"{sql}\" used disabled charset 'latin1'"));
    }

    #[rstest]
    #[case("CREATE TABLE t (id int) CHARSET=latin1", 1)]
    #[case("CREATE TABLE t (id int) DEFAULT CHARACTER SET = utf8mb4", 0)]
    #[case("ALTER TABLE t MODIFY COLUMN a varchar(10) CHARACTER SET gbk", 1)]
    #[case("ALTER TABLE t ADD COLUMN a varchar(10) CHARACTER SET utf8mb4", 0)]
    fn test_charset_statements(#[case] sql: &str, #[case] expected: usize) {
        let rule = rule_with_payload(RuleType::SystemCharsetAllowlist, json!({"list": ["utf8mb4"]}));
        assert_eq!(check_sql(sql, Engine::Mysql, rule).len(), expected);
    }

    #[rstest]
    #[case("CREATE TABLE t (id int) COLLATE=utf8mb4_bin", Engine::Mysql, 0)]
    #[case("CREATE TABLE t (id int) DEFAULT COLLATE=latin1_swedish_ci", Engine::Mysql, 1)]
    #[case("CREATE TABLE t (a varchar(10) COLLATE utf8mb4_general_ci)", Engine::Mysql, 1)]
    #[case("CREATE TABLE t (a text COLLATE \"C\")", Engine::Postgres, 1)]
    #[case("ALTER TABLE t ADD COLUMN a text COLLATE utf8mb4_bin", Engine::Postgres, 0)]
    fn test_collation_allowlist(#[case] sql: &str, #[case] engine: Engine, #[case] expected: usize) {
        let rule = rule_with_payload(
            RuleType::SystemCollationAllowlist,
            json!({"list": ["utf8mb4_bin"]}),
        );
        let advice = check_sql(sql, engine, rule);
        assert_eq!(advice.len(), expected);
        assert!(advice
            .iter()
            .all(|item| item.code == advice_codes::DISABLED_COLLATION));
    }
}
