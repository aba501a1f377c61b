//! Read-only AST traversal.
//!
//! [`Visitor`] dispatches over the closed node-kind sets with `match`, so a
//! new node kind is a compile error in every traversal until handled. A pass
//! overrides `visit_statement`/`visit_expression`, handles the kinds it cares
//! about, and falls back to [`walk_statement`]/[`walk_expression`] for the
//! rest.
//!
//! [`ScopeStack`] is the shared lexical symbol table used by validation and
//! the writers' pre-visitors.

use std::collections::BTreeMap;

use crate::ast::*;

/// A read-only traversal with default recursion.
pub trait Visitor: Sized {
    fn visit_statement(&mut self, stmt: &Statement) {
        walk_statement(self, stmt);
    }

    fn visit_expression(&mut self, expr: &Expression) {
        walk_expression(self, expr);
    }
}

/// Recurse into every child of a statement.
pub fn walk_statement<V: Visitor>(v: &mut V, stmt: &Statement) {
    match stmt {
        Statement::Branch {
            cond_statements,
            else_statement,
        } => {
            for cond in cond_statements {
                v.visit_expression(&cond.condition);
                v.visit_statement(&cond.statement);
            }
            if let Some(else_statement) = else_statement {
                v.visit_statement(else_statement);
            }
        }
        Statement::Conditional { statement, .. } => v.visit_statement(statement),
        Statement::DeclareExternal { .. } => {}
        Statement::DeclareFunction(func) => {
            for statement in &func.statements {
                v.visit_statement(statement);
            }
        }
        Statement::DeclareStruct { .. } => {}
        Statement::DeclareVariable { initial, .. } => {
            if let Some(initial) = initial {
                v.visit_expression(initial);
            }
        }
        Statement::Discard | Statement::NoOp => {}
        Statement::Expression(expr) => v.visit_expression(expr),
        Statement::For {
            from, to, step, body, ..
        } => {
            v.visit_expression(from);
            v.visit_expression(to);
            if let Some(step) = step {
                v.visit_expression(step);
            }
            v.visit_statement(body);
        }
        Statement::ForEach { expr, body, .. } => {
            v.visit_expression(expr);
            v.visit_statement(body);
        }
        Statement::Multi(statements) => {
            for statement in statements {
                v.visit_statement(statement);
            }
        }
        Statement::Return(expr) => {
            if let Some(expr) = expr {
                v.visit_expression(expr);
            }
        }
        Statement::While { condition, body } => {
            v.visit_expression(condition);
            v.visit_statement(body);
        }
    }
}

/// Recurse into every child of an expression.
pub fn walk_expression<V: Visitor>(v: &mut V, expr: &Expression) {
    match &expr.kind {
        ExpressionKind::AccessMember { expr, .. } => v.visit_expression(expr),
        ExpressionKind::AccessIndex { expr, .. } => v.visit_expression(expr),
        ExpressionKind::Assign { left, right, .. } => {
            v.visit_expression(left);
            v.visit_expression(right);
        }
        ExpressionKind::Binary { left, right, .. } => {
            v.visit_expression(left);
            v.visit_expression(right);
        }
        ExpressionKind::Call { parameters, .. } => {
            for parameter in parameters {
                v.visit_expression(parameter);
            }
        }
        ExpressionKind::Cast { expressions, .. } => {
            for expression in expressions {
                v.visit_expression(expression);
            }
        }
        ExpressionKind::Conditional {
            true_path,
            false_path,
            ..
        } => {
            v.visit_expression(true_path);
            v.visit_expression(false_path);
        }
        ExpressionKind::Constant(_)
        | ExpressionKind::Identifier(_)
        | ExpressionKind::Variable { .. } => {}
        ExpressionKind::Intrinsic { parameters, .. } => {
            for parameter in parameters {
                v.visit_expression(parameter);
            }
        }
        ExpressionKind::Swizzle { expr, .. } => v.visit_expression(expr),
        ExpressionKind::Unary { expr, .. } => v.visit_expression(expr),
    }
}

// ─── Scopes ───────────────────────────────────────────────────────

/// What a name in scope refers to.
#[derive(Clone, Debug)]
pub enum ScopeEntry {
    Variable { var_index: u32, ty: ExpressionType },
    Struct { struct_index: u32 },
    Function { func_index: u32 },
    External { var_index: u32, ty: ExpressionType },
}

/// A stack of lexical scopes mapping names to declarations.
/// Pushed/popped at block boundaries.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<BTreeMap<String, ScopeEntry>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![BTreeMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(BTreeMap::new());
    }

    pub fn pop(&mut self) {
        let popped = self.scopes.pop();
        debug_assert!(popped.is_some(), "scope stack underflow");
    }

    /// Declare a name in the innermost scope. Returns the entry it shadows
    /// within that same scope, if any (redeclaration).
    pub fn declare(&mut self, name: &str, entry: ScopeEntry) -> Option<ScopeEntry> {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name.to_string(), entry)
    }

    /// Look a name up, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&ScopeEntry> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build;

    struct CountingVisitor {
        constants: usize,
        statements: usize,
    }

    impl Visitor for CountingVisitor {
        fn visit_statement(&mut self, stmt: &Statement) {
            self.statements += 1;
            walk_statement(self, stmt);
        }

        fn visit_expression(&mut self, expr: &Expression) {
            if expr.is_constant() {
                self.constants += 1;
            }
            walk_expression(self, expr);
        }
    }

    #[test]
    fn test_walk_counts_nested_nodes() {
        let tree = build::multi(vec![
            build::declare_variable(
                "x",
                build::float(),
                Some(build::binary(
                    BinaryOp::Add,
                    build::float_constant(1.0),
                    build::float_constant(2.0),
                )),
            ),
            build::ret(build::float_constant(3.0)),
        ]);

        let mut v = CountingVisitor {
            constants: 0,
            statements: 0,
        };
        v.visit_statement(&tree);

        assert_eq!(v.constants, 3);
        // multi + declare + return
        assert_eq!(v.statements, 3);
    }

    #[test]
    fn test_scope_shadowing_and_lookup() {
        let mut scopes = ScopeStack::new();
        scopes.declare(
            "x",
            ScopeEntry::Variable {
                var_index: 0,
                ty: build::float(),
            },
        );
        scopes.push();
        scopes.declare(
            "x",
            ScopeEntry::Variable {
                var_index: 1,
                ty: build::vec3(),
            },
        );

        match scopes.lookup("x") {
            Some(ScopeEntry::Variable { var_index, .. }) => assert_eq!(*var_index, 1),
            _ => panic!("inner x should win"),
        }

        scopes.pop();
        match scopes.lookup("x") {
            Some(ScopeEntry::Variable { var_index, .. }) => assert_eq!(*var_index, 0),
            _ => panic!("outer x should be restored"),
        }
    }

    #[test]
    fn test_scope_redeclaration_reported() {
        let mut scopes = ScopeStack::new();
        assert!(scopes
            .declare("x", ScopeEntry::Struct { struct_index: 0 })
            .is_none());
        assert!(scopes
            .declare("x", ScopeEntry::Struct { struct_index: 1 })
            .is_some());
    }
}
