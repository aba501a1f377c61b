//! SPIR-V pre-lowering.
//!
//! Rewrites the validated tree into a target-friendlier shape before
//! emission:
//!
//! - member access by name becomes member access by index (access chains
//!   want integer indices, not names);
//! - `for` loops become `while` loops over an explicit counter variable;
//! - `for-each` over vector components unrolls into one block per
//!   component (the component count is statically 2..=4).

use crate::ast::*;
use crate::diagnostic::CompileError;
use crate::rewrite::{walk_expression, walk_statement, Rewriter};
use crate::validate::Module;

pub fn lower(module: &Module) -> Result<Module, CompileError> {
    let mut lowering = Lowering { module };
    let lowered = lowering.rewrite_statement(&module.root)?;
    Ok(Module::rebuild(lowered))
}

struct Lowering<'a> {
    module: &'a Module,
}

impl Rewriter for Lowering<'_> {
    fn rewrite_expression(&mut self, expr: &Expression) -> Result<Expression, CompileError> {
        if let ExpressionKind::AccessMember { expr: base, member_names } = &expr.kind {
            let base = self.rewrite_expression(base)?;
            let mut indices = Vec::with_capacity(member_names.len());
            let mut ty = base.resolved_type().clone();
            for name in member_names {
                let desc = self.module.struct_desc(expect_struct_index(&ty));
                let index = desc.member_index(name).unwrap_or_else(|| {
                    panic!("validated member '{}' missing from struct '{}'", name, desc.name)
                });
                ty = desc.members[index as usize].ty.clone();
                indices.push(index);
            }
            return Ok(Expression {
                kind: ExpressionKind::AccessIndex {
                    expr: Box::new(base),
                    member_indices: indices,
                },
                cached_type: expr.cached_type.clone(),
            });
        }
        walk_expression(self, expr)
    }

    fn rewrite_statement(&mut self, stmt: &Statement) -> Result<Statement, CompileError> {
        match stmt {
            Statement::For {
                var_name,
                from,
                to,
                step,
                body,
                var_index,
            } => {
                let var_index = var_index.expect("unvalidated for loop");
                let counter_ty = from.resolved_type().clone();
                let from = self.rewrite_expression(from)?;
                let to = self.rewrite_expression(to)?;
                let body = self.rewrite_statement(body)?;

                let counter = || {
                    Expression::typed(
                        ExpressionKind::Variable { var_index },
                        counter_ty.clone(),
                    )
                };
                let step = match step {
                    Some(step) => self.rewrite_expression(step)?,
                    None => one_constant(&counter_ty),
                };

                let condition = Expression::typed(
                    ExpressionKind::Binary {
                        op: BinaryOp::CompLt,
                        left: Box::new(counter()),
                        right: Box::new(to),
                    },
                    ExpressionType::Primitive(PrimitiveType::Bool),
                );
                let increment = Expression::typed(
                    ExpressionKind::Assign {
                        op: AssignOp::Simple,
                        left: Box::new(counter()),
                        right: Box::new(Expression::typed(
                            ExpressionKind::Binary {
                                op: BinaryOp::Add,
                                left: Box::new(counter()),
                                right: Box::new(step),
                            },
                            counter_ty.clone(),
                        )),
                    },
                    counter_ty.clone(),
                );

                Ok(Statement::Multi(vec![
                    Statement::DeclareVariable {
                        name: var_name.clone(),
                        var_type: counter_ty,
                        initial: Some(from),
                        var_index: Some(var_index),
                    },
                    Statement::While {
                        condition,
                        body: Box::new(Statement::Multi(vec![
                            body,
                            Statement::Expression(increment),
                        ])),
                    },
                ]))
            }
            Statement::ForEach {
                var_name,
                expr,
                body,
                var_index,
            } => {
                let var_index = var_index.expect("unvalidated for-each loop");
                let expr = self.rewrite_expression(expr)?;
                let body = self.rewrite_statement(body)?;
                let vector = match expr.resolved_type() {
                    ExpressionType::Vector(v) => *v,
                    other => panic!("for-each over non-vector type {}", other),
                };
                let component_ty = ExpressionType::Primitive(vector.component_type);

                // One declare+body block per component; the declaration
                // reuses the same slot each round.
                let components = [
                    SwizzleComponent::First,
                    SwizzleComponent::Second,
                    SwizzleComponent::Third,
                    SwizzleComponent::Fourth,
                ];
                let mut blocks = Vec::with_capacity(vector.component_count as usize);
                for component in components.iter().take(vector.component_count as usize) {
                    let element = Expression::typed(
                        ExpressionKind::Swizzle {
                            expr: Box::new(expr.clone()),
                            components: vec![*component],
                        },
                        component_ty.clone(),
                    );
                    blocks.push(Statement::Multi(vec![
                        Statement::DeclareVariable {
                            name: var_name.clone(),
                            var_type: component_ty.clone(),
                            initial: Some(element),
                            var_index: Some(var_index),
                        },
                        body.clone(),
                    ]));
                }
                Ok(Statement::Multi(blocks))
            }
            _ => walk_statement(self, stmt),
        }
    }
}

fn one_constant(ty: &ExpressionType) -> Expression {
    let value = match ty {
        ExpressionType::Primitive(PrimitiveType::UInt32) => ConstantValue::UInt32(1),
        _ => ConstantValue::Int32(1),
    };
    Expression::typed(ExpressionKind::Constant(value), ty.clone())
}

fn expect_struct_index(ty: &ExpressionType) -> u32 {
    match ty {
        ExpressionType::Struct(index) => *index,
        ExpressionType::Uniform(inner) => expect_struct_index(inner),
        other => panic!("member access on non-struct type {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::validate::validate;
    use crate::visit::{walk_expression as visit_walk, Visitor};

    struct Finder {
        access_member: usize,
        access_index: usize,
        for_loops: usize,
        while_loops: usize,
    }

    impl Visitor for Finder {
        fn visit_statement(&mut self, stmt: &Statement) {
            match stmt {
                Statement::For { .. } | Statement::ForEach { .. } => self.for_loops += 1,
                Statement::While { .. } => self.while_loops += 1,
                _ => {}
            }
            crate::visit::walk_statement(self, stmt);
        }

        fn visit_expression(&mut self, expr: &Expression) {
            match expr.kind {
                ExpressionKind::AccessMember { .. } => self.access_member += 1,
                ExpressionKind::AccessIndex { .. } => self.access_index += 1,
                _ => {}
            }
            visit_walk(self, expr);
        }
    }

    fn count(module: &Module) -> Finder {
        let mut finder = Finder {
            access_member: 0,
            access_index: 0,
            for_loops: 0,
            while_loops: 0,
        };
        finder.visit_statement(&module.root);
        finder
    }

    #[test]
    fn test_member_access_becomes_index_access() {
        let root = multi(vec![
            declare_struct("Data", vec![member("scale", float()), member("offset", vec2())]),
            declare_function(
                "main",
                Vec::new(),
                ExpressionType::Void,
                vec![
                    declare_variable("d", named_type("Data"), None),
                    declare_variable(
                        "o",
                        vec2(),
                        Some(access_member(identifier("d"), &["offset"])),
                    ),
                    expr_statement(assign(identifier("o"), identifier("o"))),
                ],
            ),
        ]);
        let module = validate(&root).unwrap();
        let lowered = lower(&module).unwrap();

        let counts = count(&lowered);
        assert_eq!(counts.access_member, 0);
        assert!(counts.access_index >= 1);
    }

    #[test]
    fn test_for_becomes_while() {
        let root = multi(vec![declare_function(
            "main",
            Vec::new(),
            ExpressionType::Void,
            vec![
                declare_variable("acc", int(), Some(int_constant(0))),
                for_loop(
                    "i",
                    int_constant(0),
                    int_constant(4),
                    None,
                    expr_statement(assign(
                        identifier("acc"),
                        binary(BinaryOp::Add, identifier("acc"), identifier("i")),
                    )),
                ),
                expr_statement(assign(identifier("acc"), int_constant(0))),
            ],
        )]);
        let module = validate(&root).unwrap();
        let lowered = lower(&module).unwrap();

        let counts = count(&lowered);
        assert_eq!(counts.for_loops, 0);
        assert_eq!(counts.while_loops, 1);
    }

    #[test]
    fn test_for_each_unrolls_per_component() {
        let root = multi(vec![declare_function(
            "main",
            Vec::new(),
            ExpressionType::Void,
            vec![
                declare_variable("v", vec3(), None),
                declare_variable("acc", float(), Some(float_constant(0.0))),
                for_each(
                    "c",
                    identifier("v"),
                    expr_statement(assign(
                        identifier("acc"),
                        binary(BinaryOp::Add, identifier("acc"), identifier("c")),
                    )),
                ),
                expr_statement(assign(identifier("acc"), float_constant(0.0))),
            ],
        )]);
        let module = validate(&root).unwrap();
        let lowered = lower(&module).unwrap();

        let counts = count(&lowered);
        assert_eq!(counts.for_loops, 0);
        // Three unrolled component reads via single-component swizzles.
        let text = format!("{:?}", lowered.root);
        assert_eq!(text.matches("Swizzle").count(), 3);
    }
}
