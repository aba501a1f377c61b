use std::collections::BTreeSet;

use super::{Environment, GlslWriter, States};
use crate::ast::build::*;
use crate::ast::*;
use crate::diagnostic::ErrorKind;
use crate::validate::validate;

/// A vertex+fragment shader exercising structs, externals, intrinsics and
/// the stage interface.
fn sample_shader() -> Statement {
    multi(vec![
        declare_struct("Viewer", vec![member("view_proj", mat4())]),
        declare_struct(
            "VertIn",
            vec![
                member_with("pos", vec3(), vec![location(0)]),
                member_with("uv", vec2(), vec![location(1)]),
            ],
        ),
        declare_struct(
            "VertOut",
            vec![
                member_with("position", vec4(), vec![builtin("position")]),
                member_with("uv", vec2(), vec![location(0)]),
            ],
        ),
        declare_struct(
            "FragIn",
            vec![member_with("uv", vec2(), vec![location(0)])],
        ),
        declare_struct(
            "FragOut",
            vec![member_with("color", vec4(), vec![location(0)])],
        ),
        declare_external(vec![
            external_var(
                "viewer",
                uniform(named_type("Viewer")),
                vec![binding(0), layout("std140")],
            ),
            external_var("diffuse_map", sampler2d(), vec![binding(1)]),
        ]),
        declare_function_with(
            "vert_entry",
            vec![param("stage_in", named_type("VertIn"))],
            named_type("VertOut"),
            vec![entry("vert")],
            vec![
                declare_variable("result", named_type("VertOut"), None),
                expr_statement(assign(
                    access_member(identifier("result"), &["position"]),
                    binary(
                        BinaryOp::Multiply,
                        access_member(identifier("viewer"), &["view_proj"]),
                        cast(
                            vec4(),
                            vec![
                                access_member(identifier("stage_in"), &["pos"]),
                                float_constant(1.0),
                            ],
                        ),
                    ),
                )),
                expr_statement(assign(
                    access_member(identifier("result"), &["uv"]),
                    access_member(identifier("stage_in"), &["uv"]),
                )),
                ret(identifier("result")),
            ],
        ),
        declare_function_with(
            "frag_entry",
            vec![param("stage_in", named_type("FragIn"))],
            named_type("FragOut"),
            vec![entry("frag")],
            vec![
                declare_variable("result", named_type("FragOut"), None),
                expr_statement(assign(
                    access_member(identifier("result"), &["color"]),
                    intrinsic(
                        IntrinsicKind::SampleTexture,
                        vec![
                            identifier("diffuse_map"),
                            access_member(identifier("stage_in"), &["uv"]),
                        ],
                    ),
                )),
                ret(identifier("result")),
            ],
        ),
    ])
}

#[test]
fn test_fragment_glsl_has_single_main_and_version() {
    let module = validate(&sample_shader()).unwrap();
    let writer = GlslWriter::new();
    let glsl = writer
        .generate(ShaderStage::Fragment, &module, &States::default())
        .unwrap();

    assert!(glsl.starts_with("#version 330\n"));
    assert_eq!(glsl.matches("void main()").count(), 1);
    assert!(glsl.contains("layout(location = 0) in vec2 _glint_in_uv;"));
    assert!(glsl.contains("layout(location = 0) out vec4 _glint_out_color;"));
    assert!(glsl.contains("texture(diffuse_map, "));
    // The vertex entry is absent from the fragment stage output.
    assert!(!glsl.contains("vert_entry"));
}

#[test]
fn test_vertex_glsl_uses_builtin_position() {
    let module = validate(&sample_shader()).unwrap();
    let writer = GlslWriter::new();
    let glsl = writer
        .generate(ShaderStage::Vertex, &module, &States::default())
        .unwrap();

    assert!(glsl.contains("gl_Position = _glint_output.position;"));
    // The builtin member gets no location declaration.
    assert!(!glsl.contains("out vec4 _glint_out_position"));
    assert!(glsl.contains("layout(binding = 0, std140) uniform _glint_binding_viewer"));
}

#[test]
fn test_user_main_is_renamed() {
    let root = multi(vec![
        declare_struct(
            "FragOut",
            vec![member_with("color", vec4(), vec![location(0)])],
        ),
        declare_function_with(
            "main",
            Vec::new(),
            named_type("FragOut"),
            vec![entry("frag")],
            vec![
                declare_variable("result", named_type("FragOut"), None),
                ret(identifier("result")),
            ],
        ),
    ]);
    let module = validate(&root).unwrap();
    let glsl = GlslWriter::new()
        .generate(ShaderStage::Fragment, &module, &States::default())
        .unwrap();

    assert_eq!(glsl.matches("void main()").count(), 1);
    assert!(glsl.contains("_glint_main"));
}

#[test]
fn test_missing_entry_point_fails_before_output() {
    let root = multi(vec![declare_function(
        "helper",
        Vec::new(),
        ExpressionType::Void,
        Vec::new(),
    )]);
    let module = validate(&root).unwrap();
    let err = GlslWriter::new()
        .generate(ShaderStage::Fragment, &module, &States::default())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert_eq!(err.message, "missing entry point");
}

#[test]
fn test_compute_stage_is_not_implemented() {
    let module = validate(&sample_shader()).unwrap();
    let err = GlslWriter::new()
        .generate(ShaderStage::Compute, &module, &States::default())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotImplemented);
}

#[test]
fn test_int_scalar_maps_to_int() {
    let root = multi(vec![declare_function_with(
        "shade",
        Vec::new(),
        ExpressionType::Void,
        vec![entry("frag")],
        vec![
            declare_variable("counter", int(), Some(int_constant(3))),
            expr_statement(assign(identifier("counter"), int_constant(4))),
        ],
    )]);
    let module = validate(&root).unwrap();
    let glsl = GlslWriter::new()
        .generate(ShaderStage::Fragment, &module, &States::default())
        .unwrap();

    assert!(glsl.contains("int counter = 3;"));
    assert!(!glsl.contains("ivec2 counter"));
}

#[test]
fn test_extension_emitted_when_available_below_420() {
    let mut env = Environment::default();
    env.available_extensions = BTreeSet::from(["GL_ARB_shading_language_420pack".to_string()]);
    let mut writer = GlslWriter::new();
    writer.set_env(env);

    let module = validate(&sample_shader()).unwrap();
    let glsl = writer
        .generate(ShaderStage::Fragment, &module, &States::default())
        .unwrap();
    assert!(glsl.contains("#extension GL_ARB_shading_language_420pack : require"));
}

#[test]
fn test_extension_not_emitted_when_unavailable() {
    let module = validate(&sample_shader()).unwrap();
    let glsl = GlslWriter::new()
        .generate(ShaderStage::Fragment, &module, &States::default())
        .unwrap();
    assert!(!glsl.contains("#extension"));
}

#[test]
fn test_flip_y_multiplies_position_output() {
    let mut env = Environment::default();
    env.flip_y_position = true;
    let mut writer = GlslWriter::new();
    writer.set_env(env);

    let module = validate(&sample_shader()).unwrap();
    let glsl = writer
        .generate(ShaderStage::Vertex, &module, &States::default())
        .unwrap();
    assert!(glsl.contains("uniform float _glint_flip_value;"));
    assert!(glsl.contains(
        "gl_Position = _glint_output.position * vec4(1.0, _glint_flip_value, 1.0, 1.0);"
    ));
}

#[test]
fn test_es_environment_emits_precision_block() {
    let env = Environment {
        gl_es: true,
        gl_major_version: 3,
        gl_minor_version: 0,
        ..Environment::default()
    };
    let mut writer = GlslWriter::new();
    writer.set_env(env);

    let module = validate(&sample_shader()).unwrap();
    let glsl = writer
        .generate(ShaderStage::Fragment, &module, &States::default())
        .unwrap();
    assert!(glsl.starts_with("#version 300 es\n"));
    assert!(glsl.contains("precision highp float;"));
}

#[test]
fn test_version_ladder() {
    for ((major, minor), expected) in [
        ((2, 0), 110),
        ((2, 1), 120),
        ((3, 0), 130),
        ((3, 1), 140),
        ((3, 2), 150),
        ((3, 3), 330),
        ((4, 6), 460),
    ] {
        let env = Environment {
            gl_major_version: major,
            gl_minor_version: minor,
            ..Environment::default()
        };
        let mut writer = GlslWriter::new();
        writer.set_env(env);
        let module = validate(&sample_shader()).unwrap();
        let glsl = writer
            .generate(ShaderStage::Fragment, &module, &States::default())
            .unwrap();
        assert!(
            glsl.starts_with(&format!("#version {}\n", expected)),
            "GL {}.{} should map to GLSL {}",
            major,
            minor,
            expected
        );
    }
}

#[test]
fn test_float_literals_keep_a_decimal_point() {
    let root = multi(vec![declare_function_with(
        "shade",
        Vec::new(),
        ExpressionType::Void,
        vec![entry("frag")],
        vec![
            declare_variable("x", float(), Some(float_constant(5.0))),
            expr_statement(assign(identifier("x"), float_constant(0.25))),
        ],
    )]);
    let module = validate(&root).unwrap();
    let glsl = GlslWriter::new()
        .generate(ShaderStage::Fragment, &module, &States::default())
        .unwrap();
    assert!(glsl.contains("float x = 5.0;"));
    assert!(glsl.contains("x = 0.25;"));
}
