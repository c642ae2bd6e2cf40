//! PostgreSQL ALTER TABLE commands that take long locks.

use super::helpers::has_default;
use crate::advisor::{BaseRule, Rule, RuleContext};
use crate::error::{AdvisorError, RuleError};
use crate::syntax::{NodeKind, NodeRef};
use crate::types::advice_codes;
use sqlparser::ast::{AlterColumnOperation, AlterTableOperation, TableConstraint};

/// The constraint added by an `ADD CONSTRAINT` command, unless it is `NOT VALID`.
fn validated_constraint<'t>(
    node: NodeRef<'t>,
    kind: NodeKind,
) -> Result<Option<&'t TableConstraint>, RuleError> {
    if kind != NodeKind::AlterTableCmd {
        return Ok(None);
    }
    let op = node.alter_cmd()?;
    Ok(match op {
        AlterTableOperation::AddConstraint { constraint, .. }
            if !op.to_string().to_uppercase().ends_with("NOT VALID") =>
        {
            Some(constraint)
        }
        _ => None,
    })
}

pub struct DisallowAddColumnWithDefault {
    base: BaseRule,
}

impl DisallowAddColumnWithDefault {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for DisallowAddColumnWithDefault {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::AlterTableCmd {
            return Ok(());
        }
        if let AlterTableOperation::AddColumn { column_def, .. } = node.alter_cmd()? {
            if has_default(column_def) {
                self.base.report(
                    advice_codes::STATEMENT_ADD_COLUMN_WITH_DEFAULT,
                    "Adding column with DEFAULT will lock the whole table and rewrite each rows",
                    node.line(),
                );
            }
        }
        Ok(())
    }

    rule_base!();
}

pub struct AddCheckNotValid {
    base: BaseRule,
}

impl AddCheckNotValid {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for AddCheckNotValid {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if let Some(TableConstraint::Check { .. }) = validated_constraint(node, kind)? {
            self.base.report(
                advice_codes::STATEMENT_ADD_CHECK_WITH_VALIDATION,
                "Adding check constraints with validation will block reads and writes. You can add check constraints not valid and then validate separately",
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct AddFkNotValid {
    base: BaseRule,
}

impl AddFkNotValid {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for AddFkNotValid {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if let Some(TableConstraint::ForeignKey { .. }) = validated_constraint(node, kind)? {
            self.base.report(
                advice_codes::STATEMENT_ADD_FK_WITH_VALIDATION,
                "Adding foreign keys with validation will block reads and writes. You can add foreign keys not valid and then validate separately",
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}

pub struct DisallowAddNotNull {
    base: BaseRule,
}

impl DisallowAddNotNull {
    pub fn build(ctx: &RuleContext<'_>) -> Result<Box<dyn Rule>, AdvisorError> {
        Ok(Box::new(Self { base: ctx.base() }))
    }
}

impl Rule for DisallowAddNotNull {
    fn on_enter(&mut self, node: NodeRef<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if kind != NodeKind::AlterTableCmd {
            return Ok(());
        }
        if let AlterTableOperation::AlterColumn {
            column_name,
            op: AlterColumnOperation::SetNotNull,
            ..
        } = node.alter_cmd()?
        {
            self.base.report(
                advice_codes::STATEMENT_ADD_NOT_NULL,
                format!(
                    "Setting NOT NULL will block reads and writes. You can use CHECK (\"{}\" IS NOT NULL) instead",
                    column_name.value
                ),
                node.line(),
            );
        }
        Ok(())
    }

    rule_base!();
}
