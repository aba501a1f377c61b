use std::collections::BTreeMap;

use crate::ast::build::*;
use crate::ast::*;
use crate::transform::{apply_options, eliminate_dead_code, fold_constants};
use crate::validate::validate;

fn main_with(statements: Vec<Statement>) -> crate::validate::Module {
    let root = multi(vec![declare_function(
        "main",
        Vec::new(),
        ExpressionType::Void,
        statements,
    )]);
    validate(&root).expect("test tree must validate")
}

fn main_body(module: &crate::validate::Module) -> &[Statement] {
    match &module.root {
        Statement::Multi(stmts) => match &stmts[0] {
            Statement::DeclareFunction(f) => &f.statements,
            _ => panic!("expected function"),
        },
        _ => panic!("expected multi root"),
    }
}

#[test]
fn test_fold_float_addition() {
    let module = main_with(vec![declare_variable(
        "x",
        float(),
        Some(binary(BinaryOp::Add, float_constant(2.0), float_constant(3.0))),
    )]);
    let folded = fold_constants(&module).unwrap();

    match &main_body(&folded)[0] {
        Statement::DeclareVariable {
            initial: Some(init), ..
        } => {
            assert_eq!(init.kind, ExpressionKind::Constant(ConstantValue::Float32(5.0)));
            assert_eq!(init.cached_type, Some(float()));
        }
        _ => panic!("expected declaration"),
    }
}

#[test]
fn test_fold_nested_expression() {
    // (1 + 2) * (10 - 4) == 18
    let module = main_with(vec![declare_variable(
        "x",
        int(),
        Some(binary(
            BinaryOp::Multiply,
            binary(BinaryOp::Add, int_constant(1), int_constant(2)),
            binary(BinaryOp::Subtract, int_constant(10), int_constant(4)),
        )),
    )]);
    let folded = fold_constants(&module).unwrap();

    match &main_body(&folded)[0] {
        Statement::DeclareVariable {
            initial: Some(init), ..
        } => assert_eq!(init.kind, ExpressionKind::Constant(ConstantValue::Int32(18))),
        _ => panic!("expected declaration"),
    }
}

#[test]
fn test_fold_vector_constructor_and_swizzle() {
    let module = main_with(vec![declare_variable(
        "v",
        vec2(),
        Some(swizzle(
            cast(
                vec3(),
                vec![
                    float_constant(1.0),
                    float_constant(2.0),
                    float_constant(3.0),
                ],
            ),
            &[SwizzleComponent::Third, SwizzleComponent::First],
        )),
    )]);
    let folded = fold_constants(&module).unwrap();

    match &main_body(&folded)[0] {
        Statement::DeclareVariable {
            initial: Some(init), ..
        } => assert_eq!(
            init.kind,
            ExpressionKind::Constant(ConstantValue::Vec2Float([3.0, 1.0]))
        ),
        _ => panic!("expected declaration"),
    }
}

#[test]
fn test_fold_comparison_and_not() {
    let module = main_with(vec![declare_variable(
        "b",
        boolean(),
        Some(unary(
            UnaryOp::LogicalNot,
            binary(BinaryOp::CompLt, float_constant(1.0), float_constant(2.0)),
        )),
    )]);
    let folded = fold_constants(&module).unwrap();

    match &main_body(&folded)[0] {
        Statement::DeclareVariable {
            initial: Some(init), ..
        } => assert_eq!(init.kind, ExpressionKind::Constant(ConstantValue::Bool(false))),
        _ => panic!("expected declaration"),
    }
}

#[test]
fn test_fold_leaves_division_by_zero_alone() {
    let module = main_with(vec![declare_variable(
        "x",
        int(),
        Some(binary(BinaryOp::Divide, int_constant(1), int_constant(0))),
    )]);
    let folded = fold_constants(&module).unwrap();

    match &main_body(&folded)[0] {
        Statement::DeclareVariable {
            initial: Some(init), ..
        } => assert!(matches!(init.kind, ExpressionKind::Binary { .. })),
        _ => panic!("expected declaration"),
    }
}

#[test]
fn test_fold_is_idempotent() {
    let module = main_with(vec![
        declare_variable("y", float(), Some(float_constant(4.0))),
        declare_variable(
            "x",
            float(),
            Some(binary(
                BinaryOp::Multiply,
                binary(BinaryOp::Add, float_constant(2.0), float_constant(3.0)),
                identifier("y"),
            )),
        ),
    ]);
    let once = fold_constants(&module).unwrap();
    let twice = fold_constants(&once).unwrap();
    assert_eq!(once.root, twice.root);
}

#[test]
fn test_dce_removes_unused_variable() {
    let module = main_with(vec![
        declare_variable("unused", float(), Some(float_constant(1.0))),
        declare_variable("used", float(), Some(float_constant(2.0))),
        expr_statement(assign(identifier("used"), float_constant(3.0))),
    ]);
    let swept = eliminate_dead_code(&module).unwrap();

    let body = main_body(&swept);
    assert_eq!(body.len(), 2);
    match &body[0] {
        Statement::DeclareVariable { name, .. } => assert_eq!(name, "used"),
        other => panic!("expected declaration, got {}", other.kind_name()),
    }
}

#[test]
fn test_dce_removes_transitively_dead_declarations() {
    // `a` is only used by `b`, and `b` is used by nothing.
    let module = main_with(vec![
        declare_variable("a", float(), Some(float_constant(1.0))),
        declare_variable("b", float(), Some(identifier("a"))),
    ]);
    let swept = eliminate_dead_code(&module).unwrap();
    assert!(main_body(&swept).is_empty() || main_body(&swept).iter().all(|s| s.is_noop()));
}

#[test]
fn test_dce_keeps_entry_reachable_functions_only() {
    let root = multi(vec![
        declare_function(
            "helper",
            Vec::new(),
            float(),
            vec![ret(float_constant(1.0))],
        ),
        declare_function(
            "orphan",
            Vec::new(),
            float(),
            vec![ret(float_constant(2.0))],
        ),
        declare_function_with(
            "main",
            Vec::new(),
            ExpressionType::Void,
            vec![entry("frag")],
            vec![
                declare_variable("x", float(), Some(call("helper", Vec::new()))),
                expr_statement(assign(identifier("x"), float_constant(0.0))),
            ],
        ),
    ]);
    let module = validate(&root).unwrap();
    let swept = eliminate_dead_code(&module).unwrap();

    let names: Vec<&str> = swept.functions.values().map(|f| f.name.as_str()).collect();
    assert!(names.contains(&"helper"));
    assert!(names.contains(&"main"));
    assert!(!names.contains(&"orphan"));
}

#[test]
fn test_dce_collapses_empty_blocks() {
    let module = main_with(vec![multi(vec![multi(Vec::new()), Statement::NoOp])]);
    let swept = eliminate_dead_code(&module).unwrap();
    assert!(main_body(&swept).iter().all(|s| s.is_noop()) || main_body(&swept).is_empty());
}

#[test]
fn test_dce_is_idempotent() {
    let module = main_with(vec![
        declare_variable("a", float(), Some(float_constant(1.0))),
        declare_variable("b", float(), Some(identifier("a"))),
        declare_variable("c", float(), Some(float_constant(2.0))),
        expr_statement(assign(identifier("c"), float_constant(3.0))),
    ]);
    let once = eliminate_dead_code(&module).unwrap();
    let twice = eliminate_dead_code(&once).unwrap();
    assert_eq!(once.root, twice.root);
}

#[test]
fn test_apply_options_selects_paths() {
    let module = main_with(vec![
        declare_variable(
            "samples",
            int(),
            Some(conditional("HIGH_QUALITY", int_constant(16), int_constant(4))),
        ),
        expr_statement(assign(identifier("samples"), int_constant(0))),
    ]);

    let mut options = BTreeMap::new();
    options.insert("HIGH_QUALITY".to_string(), 1);
    let resolved = apply_options(&module, &options).unwrap();
    match &main_body(&resolved)[0] {
        Statement::DeclareVariable {
            initial: Some(init), ..
        } => assert_eq!(init.kind, ExpressionKind::Constant(ConstantValue::Int32(16))),
        _ => panic!("expected declaration"),
    }

    options.insert("HIGH_QUALITY".to_string(), 0);
    let resolved = apply_options(&module, &options).unwrap();
    match &main_body(&resolved)[0] {
        Statement::DeclareVariable {
            initial: Some(init), ..
        } => assert_eq!(init.kind, ExpressionKind::Constant(ConstantValue::Int32(4))),
        _ => panic!("expected declaration"),
    }
}

#[test]
fn test_apply_options_missing_value_is_rejected() {
    let module = main_with(vec![Statement::Conditional {
        condition_name: "MISSING".into(),
        statement: Box::new(Statement::NoOp),
    }]);
    let err = apply_options(&module, &BTreeMap::new()).unwrap_err();
    assert!(err.message.contains("option 'MISSING'"));
}
