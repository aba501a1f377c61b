//! Tree-to-tree rewriting — the backbone of every transform pass.
//!
//! A [`Rewriter`] is a fallible function from node to node. The default
//! behaviour ([`walk_statement`]/[`walk_expression`]) reconstructs each node
//! from rewritten children, i.e. the identity rewrite is a deep clone that
//! carries type caches and declaration indices over. A pass overrides
//! `rewrite_statement`/`rewrite_expression`, intercepts only the node kinds
//! it transforms, and delegates everything else back to the walk functions.
//!
//! Rewriters never mutate the input tree; the caller splices the returned
//! replacement in.

use crate::ast::*;
use crate::diagnostic::CompileError;

pub trait Rewriter: Sized {
    fn rewrite_statement(&mut self, stmt: &Statement) -> Result<Statement, CompileError> {
        walk_statement(self, stmt)
    }

    fn rewrite_expression(&mut self, expr: &Expression) -> Result<Expression, CompileError> {
        walk_expression(self, expr)
    }
}

/// Reconstruct a statement from rewritten children.
pub fn walk_statement<R: Rewriter>(r: &mut R, stmt: &Statement) -> Result<Statement, CompileError> {
    Ok(match stmt {
        Statement::Branch {
            cond_statements,
            else_statement,
        } => {
            let mut rewritten = Vec::with_capacity(cond_statements.len());
            for cond in cond_statements {
                rewritten.push(CondStatement {
                    condition: r.rewrite_expression(&cond.condition)?,
                    statement: r.rewrite_statement(&cond.statement)?,
                });
            }
            let else_statement = match else_statement {
                Some(s) => Some(Box::new(r.rewrite_statement(s)?)),
                None => None,
            };
            Statement::Branch {
                cond_statements: rewritten,
                else_statement,
            }
        }
        Statement::Conditional {
            condition_name,
            statement,
        } => Statement::Conditional {
            condition_name: condition_name.clone(),
            statement: Box::new(r.rewrite_statement(statement)?),
        },
        Statement::DeclareExternal {
            attributes,
            external_vars,
            var_index,
        } => Statement::DeclareExternal {
            attributes: attributes.clone(),
            external_vars: external_vars.clone(),
            var_index: *var_index,
        },
        Statement::DeclareFunction(func) => {
            let mut statements = Vec::with_capacity(func.statements.len());
            for statement in &func.statements {
                statements.push(r.rewrite_statement(statement)?);
            }
            Statement::DeclareFunction(DeclareFunction {
                name: func.name.clone(),
                parameters: func.parameters.clone(),
                return_type: func.return_type.clone(),
                attributes: func.attributes.clone(),
                statements,
                func_index: func.func_index,
                var_index: func.var_index,
            })
        }
        Statement::DeclareStruct {
            description,
            struct_index,
        } => Statement::DeclareStruct {
            description: description.clone(),
            struct_index: *struct_index,
        },
        Statement::DeclareVariable {
            name,
            var_type,
            initial,
            var_index,
        } => Statement::DeclareVariable {
            name: name.clone(),
            var_type: var_type.clone(),
            initial: match initial {
                Some(e) => Some(r.rewrite_expression(e)?),
                None => None,
            },
            var_index: *var_index,
        },
        Statement::Discard => Statement::Discard,
        Statement::Expression(expr) => Statement::Expression(r.rewrite_expression(expr)?),
        Statement::For {
            var_name,
            from,
            to,
            step,
            body,
            var_index,
        } => Statement::For {
            var_name: var_name.clone(),
            from: r.rewrite_expression(from)?,
            to: r.rewrite_expression(to)?,
            step: match step {
                Some(e) => Some(r.rewrite_expression(e)?),
                None => None,
            },
            body: Box::new(r.rewrite_statement(body)?),
            var_index: *var_index,
        },
        Statement::ForEach {
            var_name,
            expr,
            body,
            var_index,
        } => Statement::ForEach {
            var_name: var_name.clone(),
            expr: r.rewrite_expression(expr)?,
            body: Box::new(r.rewrite_statement(body)?),
            var_index: *var_index,
        },
        Statement::Multi(statements) => {
            let mut rewritten = Vec::with_capacity(statements.len());
            for statement in statements {
                rewritten.push(r.rewrite_statement(statement)?);
            }
            Statement::Multi(rewritten)
        }
        Statement::NoOp => Statement::NoOp,
        Statement::Return(expr) => Statement::Return(match expr {
            Some(e) => Some(r.rewrite_expression(e)?),
            None => None,
        }),
        Statement::While { condition, body } => Statement::While {
            condition: r.rewrite_expression(condition)?,
            body: Box::new(r.rewrite_statement(body)?),
        },
    })
}

/// Reconstruct an expression from rewritten children, carrying the type
/// cache over unchanged.
pub fn walk_expression<R: Rewriter>(
    r: &mut R,
    expr: &Expression,
) -> Result<Expression, CompileError> {
    let kind = match &expr.kind {
        ExpressionKind::AccessMember { expr, member_names } => ExpressionKind::AccessMember {
            expr: Box::new(r.rewrite_expression(expr)?),
            member_names: member_names.clone(),
        },
        ExpressionKind::AccessIndex {
            expr,
            member_indices,
        } => ExpressionKind::AccessIndex {
            expr: Box::new(r.rewrite_expression(expr)?),
            member_indices: member_indices.clone(),
        },
        ExpressionKind::Assign { op, left, right } => ExpressionKind::Assign {
            op: *op,
            left: Box::new(r.rewrite_expression(left)?),
            right: Box::new(r.rewrite_expression(right)?),
        },
        ExpressionKind::Binary { op, left, right } => ExpressionKind::Binary {
            op: *op,
            left: Box::new(r.rewrite_expression(left)?),
            right: Box::new(r.rewrite_expression(right)?),
        },
        ExpressionKind::Call {
            function,
            func_index,
            parameters,
        } => ExpressionKind::Call {
            function: function.clone(),
            func_index: *func_index,
            parameters: rewrite_all(r, parameters)?,
        },
        ExpressionKind::Cast {
            target_type,
            expressions,
        } => ExpressionKind::Cast {
            target_type: target_type.clone(),
            expressions: rewrite_all(r, expressions)?,
        },
        ExpressionKind::Conditional {
            condition_name,
            true_path,
            false_path,
        } => ExpressionKind::Conditional {
            condition_name: condition_name.clone(),
            true_path: Box::new(r.rewrite_expression(true_path)?),
            false_path: Box::new(r.rewrite_expression(false_path)?),
        },
        ExpressionKind::Constant(value) => ExpressionKind::Constant(value.clone()),
        ExpressionKind::Identifier(name) => ExpressionKind::Identifier(name.clone()),
        ExpressionKind::Intrinsic {
            intrinsic,
            parameters,
        } => ExpressionKind::Intrinsic {
            intrinsic: *intrinsic,
            parameters: rewrite_all(r, parameters)?,
        },
        ExpressionKind::Swizzle { expr, components } => ExpressionKind::Swizzle {
            expr: Box::new(r.rewrite_expression(expr)?),
            components: components.clone(),
        },
        ExpressionKind::Unary { op, expr } => ExpressionKind::Unary {
            op: *op,
            expr: Box::new(r.rewrite_expression(expr)?),
        },
        ExpressionKind::Variable { var_index } => ExpressionKind::Variable {
            var_index: *var_index,
        },
    };
    Ok(Expression {
        kind,
        cached_type: expr.cached_type.clone(),
    })
}

fn rewrite_all<R: Rewriter>(
    r: &mut R,
    exprs: &[Expression],
) -> Result<Vec<Expression>, CompileError> {
    exprs.iter().map(|e| r.rewrite_expression(e)).collect()
}

/// The identity rewriter: produces a structurally identical, independently
/// owned copy of any subtree.
pub struct Cloner;

impl Rewriter for Cloner {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build;

    #[test]
    fn test_identity_rewrite_is_deep_clone() {
        let tree = build::multi(vec![
            build::declare_variable(
                "color",
                build::vec4(),
                Some(build::cast(
                    build::vec4(),
                    vec![
                        build::float_constant(1.0),
                        build::float_constant(0.5),
                        build::float_constant(0.0),
                        build::float_constant(1.0),
                    ],
                )),
            ),
            build::ret(build::identifier("color")),
        ]);

        let cloned = Cloner.rewrite_statement(&tree).unwrap();
        assert_eq!(cloned, tree);
    }

    #[test]
    fn test_identity_rewrite_preserves_cache_and_indices() {
        let mut var = build::variable(7);
        var.cached_type = Some(build::vec3());
        let tree = Statement::Expression(var);

        let cloned = Cloner.rewrite_statement(&tree).unwrap();
        match &cloned {
            Statement::Expression(e) => {
                assert_eq!(e.cached_type, Some(build::vec3()));
                assert_eq!(e.kind, ExpressionKind::Variable { var_index: 7 });
            }
            _ => panic!("expected expression statement"),
        }
    }

    struct NegateFolder;

    impl Rewriter for NegateFolder {
        fn rewrite_expression(&mut self, expr: &Expression) -> Result<Expression, CompileError> {
            if let ExpressionKind::Unary {
                op: UnaryOp::Minus,
                expr: inner,
            } = &expr.kind
            {
                if let ExpressionKind::Constant(ConstantValue::Float32(v)) = inner.kind {
                    return Ok(build::float_constant(-v));
                }
            }
            walk_expression(self, expr)
        }
    }

    #[test]
    fn test_targeted_override_rewrites_only_matching_nodes() {
        let tree = Statement::Expression(build::binary(
            BinaryOp::Add,
            build::unary(UnaryOp::Minus, build::float_constant(2.0)),
            build::identifier("x"),
        ));

        let rewritten = NegateFolder.rewrite_statement(&tree).unwrap();
        match rewritten {
            Statement::Expression(e) => match e.kind {
                ExpressionKind::Binary { left, right, .. } => {
                    assert_eq!(
                        left.kind,
                        ExpressionKind::Constant(ConstantValue::Float32(-2.0))
                    );
                    assert_eq!(right.kind, ExpressionKind::Identifier("x".into()));
                }
                _ => panic!("expected binary"),
            },
            _ => panic!("expected expression statement"),
        }
    }
}
