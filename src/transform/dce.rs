//! Dead-code elimination.
//!
//! Drops declarations whose index is never referenced by any retained
//! expression or signature, and collapses empty blocks. Entry-point
//! functions are the roots; a module with no entry points keeps all its
//! functions (library module). Runs its mark/sweep to a fixpoint, so a
//! declaration that only dead code referenced goes away too and the pass
//! as a whole is idempotent.

use std::collections::BTreeSet;

use crate::ast::*;
use crate::diagnostic::CompileError;
use crate::validate::Module;
use crate::visit::{walk_expression, walk_statement, Visitor};

pub fn eliminate_dead_code(module: &Module) -> Result<Module, CompileError> {
    let mut root = module.root.clone();
    loop {
        let usage = collect_usage(&root);
        let swept = sweep(&root, &usage);
        if swept == root {
            return Ok(Module::rebuild(swept));
        }
        root = swept;
    }
}

#[derive(Default)]
struct Usage {
    vars: BTreeSet<u32>,
    funcs: BTreeSet<u32>,
    structs: BTreeSet<u32>,
}

impl Usage {
    fn mark_type(&mut self, ty: &ExpressionType) {
        match ty {
            ExpressionType::Struct(index) => {
                self.structs.insert(*index);
            }
            ExpressionType::Uniform(inner) => self.mark_type(inner),
            _ => {}
        }
    }
}

struct UsageCollector {
    usage: Usage,
}

impl Visitor for UsageCollector {
    fn visit_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::DeclareFunction(func) => {
                if func.entry_stage().is_some() {
                    self.usage
                        .funcs
                        .insert(func.func_index.expect("unvalidated function"));
                }
                for parameter in &func.parameters {
                    self.usage.mark_type(&parameter.ty);
                }
                self.usage.mark_type(&func.return_type);
            }
            Statement::DeclareStruct { description, .. } => {
                // A struct keeps alive the structs its members mention.
                for member in &description.members {
                    self.usage.mark_type(&member.ty);
                }
            }
            Statement::DeclareExternal { external_vars, .. } => {
                for var in external_vars {
                    self.usage.mark_type(&var.ty);
                }
            }
            Statement::DeclareVariable { var_type, .. } => {
                self.usage.mark_type(var_type);
            }
            _ => {}
        }
        walk_statement(self, stmt);
    }

    fn visit_expression(&mut self, expr: &Expression) {
        match &expr.kind {
            ExpressionKind::Variable { var_index } => {
                self.usage.vars.insert(*var_index);
            }
            ExpressionKind::Call { func_index, .. } => {
                self.usage
                    .funcs
                    .insert(func_index.expect("unresolved call in validated tree"));
            }
            ExpressionKind::Cast { target_type, .. } => {
                self.usage.mark_type(target_type);
            }
            _ => {}
        }
        if let Some(ty) = &expr.cached_type {
            self.usage.mark_type(ty);
        }
        walk_expression(self, expr);
    }
}

fn collect_usage(root: &Statement) -> Usage {
    let mut collector = UsageCollector {
        usage: Usage::default(),
    };
    collector.visit_statement(root);

    // A module without entry points is a library: every function is a root.
    let mut has_entry = false;
    mark_entries(root, &mut has_entry);
    if !has_entry {
        mark_all_functions(root, &mut collector.usage);
    }
    collector.usage
}

fn mark_entries(stmt: &Statement, has_entry: &mut bool) {
    match stmt {
        Statement::DeclareFunction(func) => {
            if func.entry_stage().is_some() {
                *has_entry = true;
            }
        }
        Statement::Multi(statements) => {
            for statement in statements {
                mark_entries(statement, has_entry);
            }
        }
        Statement::Conditional { statement, .. } => mark_entries(statement, has_entry),
        _ => {}
    }
}

fn mark_all_functions(stmt: &Statement, usage: &mut Usage) {
    match stmt {
        Statement::DeclareFunction(func) => {
            usage
                .funcs
                .insert(func.func_index.expect("unvalidated function"));
        }
        Statement::Multi(statements) => {
            for statement in statements {
                mark_all_functions(statement, usage);
            }
        }
        Statement::Conditional { statement, .. } => mark_all_functions(statement, usage),
        _ => {}
    }
}

/// Remove unreferenced declarations and collapse empty blocks.
fn sweep(stmt: &Statement, usage: &Usage) -> Statement {
    match stmt {
        Statement::DeclareVariable { var_index, .. } => {
            let index = var_index.expect("unvalidated variable");
            if usage.vars.contains(&index) {
                stmt.clone()
            } else {
                Statement::NoOp
            }
        }
        Statement::DeclareStruct { struct_index, .. } => {
            let index = struct_index.expect("unvalidated struct");
            if usage.structs.contains(&index) {
                stmt.clone()
            } else {
                Statement::NoOp
            }
        }
        Statement::DeclareFunction(func) => {
            let index = func.func_index.expect("unvalidated function");
            if !usage.funcs.contains(&index) {
                return Statement::NoOp;
            }
            let statements = func
                .statements
                .iter()
                .map(|s| sweep(s, usage))
                .filter(|s| !s.is_noop())
                .collect();
            Statement::DeclareFunction(DeclareFunction {
                statements,
                ..func.clone()
            })
        }
        Statement::DeclareExternal {
            external_vars,
            var_index,
            ..
        } => {
            // External vars share one consecutive index run; the block goes
            // away only when none of its variables is referenced.
            let first = var_index.expect("unvalidated external");
            let any_used = (0..external_vars.len() as u32)
                .any(|offset| usage.vars.contains(&(first + offset)));
            if any_used {
                stmt.clone()
            } else {
                Statement::NoOp
            }
        }
        Statement::Multi(statements) => {
            let swept: Vec<Statement> = statements
                .iter()
                .map(|s| sweep(s, usage))
                .filter(|s| !s.is_noop())
                .collect();
            if swept.is_empty() {
                Statement::NoOp
            } else {
                Statement::Multi(swept)
            }
        }
        Statement::Conditional {
            condition_name,
            statement,
        } => {
            let inner = sweep(statement, usage);
            if inner.is_noop() {
                Statement::NoOp
            } else {
                Statement::Conditional {
                    condition_name: condition_name.clone(),
                    statement: Box::new(inner),
                }
            }
        }
        Statement::Branch {
            cond_statements,
            else_statement,
        } => Statement::Branch {
            cond_statements: cond_statements
                .iter()
                .map(|c| CondStatement {
                    condition: c.condition.clone(),
                    statement: sweep(&c.statement, usage),
                })
                .collect(),
            else_statement: else_statement.as_ref().map(|s| Box::new(sweep(s, usage))),
        },
        Statement::While { condition, body } => Statement::While {
            condition: condition.clone(),
            body: Box::new(sweep(body, usage)),
        },
        Statement::For {
            var_name,
            from,
            to,
            step,
            body,
            var_index,
        } => Statement::For {
            var_name: var_name.clone(),
            from: from.clone(),
            to: to.clone(),
            step: step.clone(),
            body: Box::new(sweep(body, usage)),
            var_index: *var_index,
        },
        Statement::ForEach {
            var_name,
            expr,
            body,
            var_index,
        } => Statement::ForEach {
            var_name: var_name.clone(),
            expr: expr.clone(),
            body: Box::new(sweep(body, usage)),
            var_index: *var_index,
        },
        other => other.clone(),
    }
}
