//! Shared test fixtures: a representative vertex+fragment shader program.

use glint::ast::build::*;
use glint::ast::*;

/// A program exercising structs, a std140 uniform block, a sampler, both
/// entry stages, intrinsics and the stage interface attributes.
pub fn sample_shader() -> Statement {
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
                    binary(
                        BinaryOp::Multiply,
                        intrinsic(
                            IntrinsicKind::SampleTexture,
                            vec![
                                identifier("diffuse_map"),
                                access_member(identifier("stage_in"), &["uv"]),
                            ],
                        ),
                        binary(BinaryOp::Add, float_constant(0.5), float_constant(0.5)),
                    ),
                )),
                ret(identifier("result")),
            ],
        ),
    ])
}
