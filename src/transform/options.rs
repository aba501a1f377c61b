//! Compile-time option resolution.
//!
//! `Conditional` nodes branch on option values supplied by the caller of a
//! writer (feature toggles, quality tiers). Both backends run this pass
//! before generating, so no conditional survives into emission.

use std::collections::BTreeMap;

use crate::ast::*;
use crate::diagnostic::CompileError;
use crate::rewrite::{walk_expression, walk_statement, Rewriter};
use crate::validate::Module;

/// Replace every conditional node with its selected path. An option value
/// of zero selects the false path, anything else the true path.
pub fn apply_options(
    module: &Module,
    options: &BTreeMap<String, u64>,
) -> Result<Module, CompileError> {
    let mut resolver = OptionResolver { options };
    let resolved = resolver.rewrite_statement(&module.root)?;
    Ok(Module::rebuild(resolved))
}

struct OptionResolver<'a> {
    options: &'a BTreeMap<String, u64>,
}

impl OptionResolver<'_> {
    fn enabled(&self, name: &str) -> Result<bool, CompileError> {
        match self.options.get(name) {
            Some(value) => Ok(*value != 0),
            None => Err(CompileError::semantic(format!(
                "shader references option '{}' but no value was supplied",
                name
            ))),
        }
    }
}

impl Rewriter for OptionResolver<'_> {
    fn rewrite_statement(&mut self, stmt: &Statement) -> Result<Statement, CompileError> {
        if let Statement::Conditional {
            condition_name,
            statement,
        } = stmt
        {
            return if self.enabled(condition_name)? {
                self.rewrite_statement(statement)
            } else {
                Ok(Statement::NoOp)
            };
        }
        walk_statement(self, stmt)
    }

    fn rewrite_expression(&mut self, expr: &Expression) -> Result<Expression, CompileError> {
        if let ExpressionKind::Conditional {
            condition_name,
            true_path,
            false_path,
        } = &expr.kind
        {
            return if self.enabled(condition_name)? {
                self.rewrite_expression(true_path)
            } else {
                self.rewrite_expression(false_path)
            };
        }
        walk_expression(self, expr)
    }
}
