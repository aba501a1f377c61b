use crate::ast::build::*;
use crate::ast::*;
use crate::validate::validate;

fn validate_expr_in_main(expr: Expression) -> Result<crate::validate::Module, crate::CompileError> {
    let root = multi(vec![declare_function(
        "main",
        Vec::new(),
        ExpressionType::Void,
        vec![declare_variable("tmp_v3", vec3(), None), expr_statement(expr)],
    )]);
    validate(&root)
}

#[test]
fn test_vec3_plus_vec3_is_vec3() {
    let root = multi(vec![declare_function(
        "main",
        Vec::new(),
        ExpressionType::Void,
        vec![
            declare_variable("a", vec3(), None),
            declare_variable("b", vec3(), None),
            declare_variable(
                "c",
                vec3(),
                Some(binary(BinaryOp::Add, identifier("a"), identifier("b"))),
            ),
        ],
    )]);
    let module = validate(&root).expect("vec3 + vec3 must validate");

    // Dig the initializer out and check its cached type.
    let func = match &module.root {
        Statement::Multi(stmts) => match &stmts[0] {
            Statement::DeclareFunction(f) => f,
            _ => panic!("expected function"),
        },
        _ => panic!("expected multi root"),
    };
    match &func.statements[2] {
        Statement::DeclareVariable {
            initial: Some(init),
            var_index,
            ..
        } => {
            assert_eq!(init.cached_type, Some(vec3()));
            assert_eq!(*var_index, Some(2));
        }
        other => panic!("expected declaration, got {}", other.kind_name()),
    }
}

#[test]
fn test_vec3_plus_vec4_is_rejected() {
    for op in [
        BinaryOp::Add,
        BinaryOp::Subtract,
        BinaryOp::Multiply,
        BinaryOp::Divide,
    ] {
        let root = multi(vec![declare_function(
            "main",
            Vec::new(),
            ExpressionType::Void,
            vec![
                declare_variable("a", vec3(), None),
                declare_variable("b", vec4(), None),
                expr_statement(binary(op, identifier("a"), identifier("b"))),
            ],
        )]);
        let err = validate(&root).expect_err("vec3 op vec4 must be rejected");
        assert!(
            err.message.contains("cannot apply"),
            "unexpected message: {}",
            err.message
        );
    }
}

#[test]
fn test_identifier_resolves_to_variable_index() {
    let module = validate_expr_in_main(assign(identifier("tmp_v3"), cast(
        vec3(),
        vec![
            float_constant(0.0),
            float_constant(0.0),
            float_constant(0.0),
        ],
    )))
    .expect("assignment must validate");

    let func = match &module.root {
        Statement::Multi(stmts) => match &stmts[0] {
            Statement::DeclareFunction(f) => f,
            _ => panic!(),
        },
        _ => panic!(),
    };
    match &func.statements[1] {
        Statement::Expression(e) => match &e.kind {
            ExpressionKind::Assign { left, .. } => {
                assert_eq!(left.kind, ExpressionKind::Variable { var_index: 0 });
                assert_eq!(left.cached_type, Some(vec3()));
            }
            _ => panic!("expected assignment"),
        },
        _ => panic!("expected expression statement"),
    }
}

#[test]
fn test_unknown_identifier_is_rejected() {
    let err = validate_expr_in_main(identifier("nonexistent")).unwrap_err();
    assert!(err.message.contains("unknown identifier 'nonexistent'"));
}

#[test]
fn test_duplicate_declaration_is_rejected() {
    let root = multi(vec![declare_function(
        "main",
        Vec::new(),
        ExpressionType::Void,
        vec![
            declare_variable("x", float(), None),
            declare_variable("x", float(), None),
        ],
    )]);
    let err = validate(&root).unwrap_err();
    assert!(err.message.contains("duplicate declaration of 'x'"));
}

#[test]
fn test_member_access_through_struct() {
    let root = multi(vec![
        declare_struct(
            "Light",
            vec![member("direction", vec3()), member("intensity", float())],
        ),
        declare_function(
            "main",
            Vec::new(),
            ExpressionType::Void,
            vec![
                declare_variable("light", named_type("Light"), None),
                declare_variable(
                    "i",
                    float(),
                    Some(access_member(identifier("light"), &["intensity"])),
                ),
            ],
        ),
    ]);
    let module = validate(&root).expect("struct member access must validate");
    assert_eq!(module.structs.len(), 1);
    assert_eq!(module.structs[&0].name, "Light");
}

#[test]
fn test_unknown_member_is_rejected() {
    let root = multi(vec![
        declare_struct("Light", vec![member("direction", vec3())]),
        declare_function(
            "main",
            Vec::new(),
            ExpressionType::Void,
            vec![
                declare_variable("light", named_type("Light"), None),
                expr_statement(access_member(identifier("light"), &["color"])),
            ],
        ),
    ]);
    let err = validate(&root).unwrap_err();
    assert!(err.message.contains("no member 'color'"));
}

#[test]
fn test_swizzle_types() {
    let module = validate_expr_in_main(swizzle(
        identifier("tmp_v3"),
        &[SwizzleComponent::First, SwizzleComponent::Second],
    ))
    .expect("swizzle must validate");
    drop(module);

    // Single component yields the scalar type.
    let root = multi(vec![declare_function(
        "main",
        Vec::new(),
        ExpressionType::Void,
        vec![
            declare_variable("v", vec3(), None),
            declare_variable(
                "x",
                float(),
                Some(swizzle(identifier("v"), &[SwizzleComponent::First])),
            ),
        ],
    )]);
    validate(&root).expect("single-component swizzle is the scalar");
}

#[test]
fn test_swizzle_out_of_range_is_rejected() {
    let root = multi(vec![declare_function(
        "main",
        Vec::new(),
        ExpressionType::Void,
        vec![
            declare_variable("v", vec2(), None),
            expr_statement(swizzle(identifier("v"), &[SwizzleComponent::Third])),
        ],
    )]);
    let err = validate(&root).unwrap_err();
    assert!(err.message.contains("out of range"));
}

#[test]
fn test_call_resolves_function_index() {
    let root = multi(vec![
        declare_function(
            "luminance",
            vec![param("color", vec3())],
            float(),
            vec![ret(intrinsic(
                IntrinsicKind::DotProduct,
                vec![
                    identifier("color"),
                    cast(
                        vec3(),
                        vec![
                            float_constant(0.2126),
                            float_constant(0.7152),
                            float_constant(0.0722),
                        ],
                    ),
                ],
            ))],
        ),
        declare_function(
            "main",
            Vec::new(),
            ExpressionType::Void,
            vec![
                declare_variable("c", vec3(), None),
                declare_variable(
                    "l",
                    float(),
                    Some(call("luminance", vec![identifier("c")])),
                ),
            ],
        ),
    ]);
    let module = validate(&root).expect("call must validate");
    assert_eq!(module.functions.len(), 2);
    assert_eq!(module.functions[&0].name, "luminance");

    let main = match &module.root {
        Statement::Multi(stmts) => match &stmts[1] {
            Statement::DeclareFunction(f) => f,
            _ => panic!(),
        },
        _ => panic!(),
    };
    match &main.statements[1] {
        Statement::DeclareVariable {
            initial: Some(init), ..
        } => match &init.kind {
            ExpressionKind::Call { func_index, .. } => assert_eq!(*func_index, Some(0)),
            _ => panic!("expected call"),
        },
        _ => panic!("expected declaration"),
    }
}

#[test]
fn test_call_with_wrong_arity_is_rejected() {
    let root = multi(vec![
        declare_function("noop", Vec::new(), ExpressionType::Void, Vec::new()),
        declare_function(
            "main",
            Vec::new(),
            ExpressionType::Void,
            vec![expr_statement(call("noop", vec![float_constant(1.0)]))],
        ),
    ]);
    let err = validate(&root).unwrap_err();
    assert!(err.message.contains("takes 0 parameter(s), 1 given"));
}

#[test]
fn test_recursion_is_rejected() {
    let root = multi(vec![
        declare_function(
            "ping",
            Vec::new(),
            ExpressionType::Void,
            vec![expr_statement(call("ping", Vec::new()))],
        ),
        declare_function("main", Vec::new(), ExpressionType::Void, Vec::new()),
    ]);
    let err = validate(&root).unwrap_err();
    assert!(err.message.contains("recursive call cycle"));
}

#[test]
fn test_return_type_mismatch_is_rejected() {
    let root = multi(vec![declare_function(
        "f",
        Vec::new(),
        float(),
        vec![ret(bool_constant(true))],
    )]);
    let err = validate(&root).unwrap_err();
    assert!(err.message.contains("return type mismatch"));
}

#[test]
fn test_entry_function_signature_checked() {
    // Non-struct parameter on an entry function is rejected.
    let root = multi(vec![declare_function_with(
        "main",
        vec![param("x", float())],
        ExpressionType::Void,
        vec![entry("frag")],
        Vec::new(),
    )]);
    let err = validate(&root).unwrap_err();
    assert!(err.message.contains("must be a struct"));
}

#[test]
fn test_unknown_entry_stage_is_rejected() {
    let root = multi(vec![declare_function_with(
        "main",
        Vec::new(),
        ExpressionType::Void,
        vec![entry("geom")],
        Vec::new(),
    )]);
    let err = validate(&root).unwrap_err();
    assert!(err.message.contains("unknown entry stage 'geom'"));
}

#[test]
fn test_conditional_paths_must_agree() {
    let err = validate_expr_in_main(conditional(
        "HIGH_QUALITY",
        float_constant(1.0),
        int_constant(1),
    ))
    .unwrap_err();
    assert!(err.message.contains("conditional paths disagree"));
}

#[test]
fn test_uniform_block_member_access() {
    let root = multi(vec![
        declare_struct(
            "Viewer",
            vec![member("view_proj", mat4()), member("eye", vec3())],
        ),
        declare_external(vec![external_var(
            "viewer",
            uniform(named_type("Viewer")),
            vec![binding(0), layout("std140")],
        )]),
        declare_function(
            "main",
            Vec::new(),
            ExpressionType::Void,
            vec![declare_variable(
                "eye",
                vec3(),
                Some(access_member(identifier("viewer"), &["eye"])),
            )],
        ),
    ]);
    let module = validate(&root).expect("uniform access must validate");
    assert_eq!(module.externals.len(), 1);
    assert_eq!(module.externals[&0].name, "viewer");
}

#[test]
fn test_external_must_be_sampler_or_uniform() {
    let root = multi(vec![declare_external(vec![external_var(
        "bad",
        float(),
        vec![binding(0)],
    )])]);
    let err = validate(&root).unwrap_err();
    assert!(err.message.contains("must be a sampler or a uniform block"));
}

#[test]
fn test_matrix_vector_multiply() {
    let root = multi(vec![declare_function(
        "main",
        Vec::new(),
        ExpressionType::Void,
        vec![
            declare_variable("m", mat4(), None),
            declare_variable("v", vec4(), None),
            declare_variable(
                "r",
                vec4(),
                Some(binary(BinaryOp::Multiply, identifier("m"), identifier("v"))),
            ),
        ],
    )]);
    validate(&root).expect("mat4 * vec4 must validate");
}

#[test]
fn test_module_rebuild_matches_validation() {
    let root = multi(vec![
        declare_struct("Data", vec![member("value", float())]),
        declare_function(
            "main",
            Vec::new(),
            ExpressionType::Void,
            vec![declare_variable("x", float(), Some(float_constant(1.0)))],
        ),
    ]);
    let module = validate(&root).unwrap();
    let rebuilt = crate::validate::Module::rebuild(module.root.clone());

    assert_eq!(rebuilt.structs.len(), module.structs.len());
    assert_eq!(rebuilt.functions.len(), module.functions.len());
    assert_eq!(rebuilt.variable_count, module.variable_count);
}
