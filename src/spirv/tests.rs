use super::ops::*;
use super::{SpirvWriter, States};
use crate::ast::build::*;
use crate::ast::*;
use crate::diagnostic::ErrorKind;
use crate::validate::validate;

/// A vertex+fragment program covering uniforms, samplers, intrinsics and
/// the stage interface; both entries end up in one module.
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

fn generate(root: &Statement) -> Vec<u32> {
    let module = validate(root).expect("test shader must validate");
    SpirvWriter::new()
        .generate(&module, &States::default())
        .expect("generation must succeed")
}

/// Split a module into (opcode, operands) instructions, checking that the
/// word counts tile the stream exactly.
fn instructions(words: &[u32]) -> Vec<(u16, Vec<u32>)> {
    assert!(words.len() > 5, "module too short for a header");
    let mut out = Vec::new();
    let mut i = 5;
    while i < words.len() {
        let count = (words[i] >> 16) as usize;
        let op = (words[i] & 0xFFFF) as u16;
        assert!(count >= 1, "zero-length instruction at word {}", i);
        assert!(i + count <= words.len(), "instruction overruns the module");
        out.push((op, words[i + 1..i + count].to_vec()));
        i += count;
    }
    out
}

/// The result id of an instruction, for the ops this writer emits.
fn result_id(op: u16, operands: &[u32]) -> Option<u32> {
    use SpirvOp::*;
    let op_19_to_33 = (OpTypeVoid as u16)..=(OpTypeFunction as u16);
    let typed_results = [
        OpExtInst as u16,
        OpFunctionCall as u16,
        OpLoad as u16,
        OpAccessChain as u16,
        OpVectorShuffle as u16,
        OpCompositeConstruct as u16,
        OpCompositeExtract as u16,
        OpImageSampleImplicitLod as u16,
        OpConvertFToU as u16,
        OpConvertFToS as u16,
        OpConvertSToF as u16,
        OpConvertUToF as u16,
        OpBitcast as u16,
        OpDot as u16,
    ];

    if op_19_to_33.contains(&op) || op == OpLabel as u16 || op == OpExtInstImport as u16 {
        return Some(operands[0]);
    }
    if (126..=191).contains(&op)
        || typed_results.contains(&op)
        || op == OpConstantTrue as u16
        || op == OpConstantFalse as u16
        || op == OpConstant as u16
        || op == OpConstantComposite as u16
        || op == OpVariable as u16
        || op == OpFunction as u16
        || op == OpFunctionParameter as u16
    {
        return Some(operands[1]);
    }
    None
}

/// Decode the NUL-terminated string starting at `operands[start]`;
/// returns the word index just past it.
fn skip_string(operands: &[u32], start: usize) -> usize {
    let mut i = start;
    loop {
        let word = operands[i];
        i += 1;
        if word.to_le_bytes().contains(&0) {
            return i;
        }
    }
}

#[test]
fn test_module_header() {
    let words = generate(&sample_shader());
    assert_eq!(words[0], SPIRV_MAGIC);
    assert_eq!(words[1], SPIRV_VERSION_1_0);
    assert_eq!(words[4], 0, "instruction schema must be zero");
    assert!(words[3] > 1, "bound must cover allocated ids");
}

#[test]
fn test_bound_is_one_past_highest_result_id() {
    let words = generate(&sample_shader());
    let bound = words[3];

    let mut highest = 0;
    for (op, operands) in instructions(&words) {
        if let Some(id) = result_id(op, &operands) {
            assert!(id < bound, "result id {} outside bound {}", id, bound);
            highest = highest.max(id);
        }
    }
    assert_eq!(bound, highest + 1);
}

#[test]
fn test_first_instruction_is_shader_capability() {
    let words = generate(&sample_shader());
    let all = instructions(&words);
    assert_eq!(all[0].0, SpirvOp::OpCapability as u16);
    assert_eq!(all[0].1, vec![SpirvCapability::Shader as u32]);
}

#[test]
fn test_entry_point_interface_ids_are_io_variables() {
    let words = generate(&sample_shader());
    let all = instructions(&words);

    // Collect OpVariable results with Input/Output storage.
    let mut io_variables = Vec::new();
    for (op, operands) in &all {
        if *op == SpirvOp::OpVariable as u16 {
            let storage = operands[2];
            if storage == SpirvStorageClass::Input as u32
                || storage == SpirvStorageClass::Output as u32
            {
                io_variables.push(operands[1]);
            }
        }
    }
    assert!(!io_variables.is_empty());

    let mut entry_points = 0;
    for (op, operands) in &all {
        if *op == SpirvOp::OpEntryPoint as u16 {
            entry_points += 1;
            let after_name = skip_string(operands, 2);
            for interface_id in &operands[after_name..] {
                assert!(
                    io_variables.contains(interface_id),
                    "interface id {} is not an Input/Output variable",
                    interface_id
                );
            }
            assert!(
                operands[after_name..].len() >= 2,
                "entry point should list its interface variables"
            );
        }
    }
    assert_eq!(entry_points, 2, "vertex and fragment entries expected");
}

#[test]
fn test_fragment_entry_has_origin_upper_left() {
    let words = generate(&sample_shader());
    let all = instructions(&words);

    let fragment_id = all
        .iter()
        .find_map(|(op, operands)| {
            (*op == SpirvOp::OpEntryPoint as u16
                && operands[0] == SpirvExecutionModel::Fragment as u32)
                .then(|| operands[1])
        })
        .expect("fragment entry point");

    assert!(all.iter().any(|(op, operands)| {
        *op == SpirvOp::OpExecutionMode as u16
            && operands[0] == fragment_id
            && operands[1] == SpirvExecutionMode::OriginUpperLeft as u32
    }));
}

#[test]
fn test_types_are_emitted_once() {
    let words = generate(&sample_shader());
    let all = instructions(&words);

    let floats = all
        .iter()
        .filter(|(op, _)| *op == SpirvOp::OpTypeFloat as u16)
        .count();
    assert_eq!(floats, 1, "float type must be deduplicated");

    let vec4s = all
        .iter()
        .filter(|(op, operands)| *op == SpirvOp::OpTypeVector as u16 && operands[2] == 4)
        .count();
    assert_eq!(vec4s, 1, "vec4 type must be deduplicated");
}

#[test]
fn test_uniform_block_is_decorated() {
    let words = generate(&sample_shader());
    let all = instructions(&words);

    assert!(all.iter().any(|(op, operands)| {
        *op == SpirvOp::OpDecorate as u16 && operands[1] == SpirvDecoration::Block as u32
    }));
    assert!(all.iter().any(|(op, operands)| {
        *op == SpirvOp::OpDecorate as u16
            && operands[1] == SpirvDecoration::Binding as u32
            && operands[2] == 1
    }));
    // The matrix member is laid out column-major with a 16-byte stride.
    assert!(all.iter().any(|(op, operands)| {
        *op == SpirvOp::OpMemberDecorate as u16
            && operands[2] == SpirvDecoration::MatrixStride as u32
            && operands[3] == 16
    }));
}

#[test]
fn test_cross_product_imports_glsl_std_450() {
    let root = multi(vec![declare_function_with(
        "shade",
        Vec::new(),
        ExpressionType::Void,
        vec![entry("frag")],
        vec![
            declare_variable("a", vec3(), None),
            declare_variable("b", vec3(), None),
            declare_variable(
                "c",
                vec3(),
                Some(intrinsic(
                    IntrinsicKind::CrossProduct,
                    vec![identifier("a"), identifier("b")],
                )),
            ),
            expr_statement(assign(identifier("c"), identifier("c"))),
        ],
    )]);
    let words = generate(&root);
    let all = instructions(&words);

    let import = all
        .iter()
        .find(|(op, _)| *op == SpirvOp::OpExtInstImport as u16)
        .expect("GLSL.std.450 must be imported");
    // The import's name decodes back to GLSL.std.450.
    let name_bytes: Vec<u8> = import.1[1..]
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .take_while(|b| *b != 0)
        .collect();
    assert_eq!(name_bytes, b"GLSL.std.450");

    assert!(all.iter().any(|(op, operands)| {
        *op == SpirvOp::OpExtInst as u16 && operands[3] == GLSL_STD_450_CROSS
    }));
}

#[test]
fn test_plain_dot_product_needs_no_import() {
    let root = multi(vec![declare_function_with(
        "shade",
        Vec::new(),
        ExpressionType::Void,
        vec![entry("frag")],
        vec![
            declare_variable("a", vec3(), None),
            declare_variable(
                "d",
                float(),
                Some(intrinsic(
                    IntrinsicKind::DotProduct,
                    vec![identifier("a"), identifier("a")],
                )),
            ),
            expr_statement(assign(identifier("d"), identifier("d"))),
        ],
    )]);
    let words = generate(&root);
    let all = instructions(&words);
    assert!(!all
        .iter()
        .any(|(op, _)| *op == SpirvOp::OpExtInstImport as u16));
    assert!(all.iter().any(|(op, _)| *op == SpirvOp::OpDot as u16));
}

#[test]
fn test_missing_entry_point_is_rejected() {
    let root = multi(vec![declare_function(
        "helper",
        Vec::new(),
        ExpressionType::Void,
        Vec::new(),
    )]);
    let module = validate(&root).unwrap();
    let err = SpirvWriter::new()
        .generate(&module, &States::default())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert_eq!(err.message, "missing entry point");
}

#[test]
fn test_compute_stage_is_not_implemented() {
    let root = multi(vec![declare_function_with(
        "simulate",
        Vec::new(),
        ExpressionType::Void,
        vec![entry("compute")],
        Vec::new(),
    )]);
    let module = validate(&root).unwrap();
    let err = SpirvWriter::new()
        .generate(&module, &States::default())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotImplemented);
    assert_eq!(err.message, "not yet implemented");
}

#[test]
fn test_branch_emits_structured_selection() {
    let root = multi(vec![declare_function_with(
        "shade",
        Vec::new(),
        ExpressionType::Void,
        vec![entry("frag")],
        vec![
            declare_variable("x", float(), Some(float_constant(1.0))),
            branch_else(
                binary(
                    BinaryOp::CompGt,
                    identifier("x"),
                    float_constant(0.5),
                ),
                expr_statement(assign(identifier("x"), float_constant(1.0))),
                expr_statement(assign(identifier("x"), float_constant(0.0))),
            ),
        ],
    )]);
    let words = generate(&root);
    let all = instructions(&words);
    assert!(all
        .iter()
        .any(|(op, _)| *op == SpirvOp::OpSelectionMerge as u16));
    assert!(all
        .iter()
        .any(|(op, _)| *op == SpirvOp::OpBranchConditional as u16));
}

#[test]
fn test_while_emits_structured_loop() {
    let root = multi(vec![declare_function_with(
        "shade",
        Vec::new(),
        ExpressionType::Void,
        vec![entry("frag")],
        vec![
            declare_variable("i", int(), Some(int_constant(0))),
            while_loop(
                binary(BinaryOp::CompLt, identifier("i"), int_constant(8)),
                expr_statement(assign(
                    identifier("i"),
                    binary(BinaryOp::Add, identifier("i"), int_constant(1)),
                )),
            ),
        ],
    )]);
    let words = generate(&root);
    let all = instructions(&words);
    assert!(all.iter().any(|(op, _)| *op == SpirvOp::OpLoopMerge as u16));
}

#[test]
fn test_discard_emits_kill() {
    let root = multi(vec![declare_function_with(
        "shade",
        Vec::new(),
        ExpressionType::Void,
        vec![entry("frag")],
        vec![Statement::Discard],
    )]);
    let words = generate(&root);
    let all = instructions(&words);
    assert!(all.iter().any(|(op, _)| *op == SpirvOp::OpKill as u16));
}
