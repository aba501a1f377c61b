//! End-to-end latency benchmark for the compilation pipeline:
//! validate -> fold -> strip -> GLSL text / SPIR-V words / codec round trip.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use glint::ast::build::*;
use glint::ast::*;
use glint::transform::{eliminate_dead_code, fold_constants};
use glint::{compile_glsl, compile_spirv, deserialize_shader, glsl, serialize_shader, spirv, validate};

/// A synthetic fragment shader with `n` scalar declarations feeding one
/// output, to scale the tree size.
fn synthetic_shader(n: usize) -> Statement {
    let mut statements = vec![declare_variable(
        "acc",
        float(),
        Some(float_constant(0.0)),
    )];
    for i in 0..n {
        let name = format!("v{}", i);
        statements.push(declare_variable(
            name.clone(),
            float(),
            Some(binary(
                BinaryOp::Multiply,
                float_constant(i as f32),
                float_constant(0.5),
            )),
        ));
        statements.push(expr_statement(assign(
            identifier("acc"),
            binary(BinaryOp::Add, identifier("acc"), identifier(name)),
        )));
    }
    statements.push(expr_statement(assign(
        access_member(identifier("result"), &["color"]),
        cast(
            vec4(),
            vec![
                identifier("acc"),
                identifier("acc"),
                identifier("acc"),
                float_constant(1.0),
            ],
        ),
    )));
    statements.insert(
        0,
        declare_variable("result", named_type("FragOut"), None),
    );
    statements.push(ret(identifier("result")));

    multi(vec![
        declare_struct(
            "FragOut",
            vec![member_with("color", vec4(), vec![location(0)])],
        ),
        declare_function_with(
            "shade",
            Vec::new(),
            named_type("FragOut"),
            vec![entry("frag")],
            statements,
        ),
    ])
}

fn bench_validate(c: &mut Criterion) {
    let small = synthetic_shader(10);
    let large = synthetic_shader(100);

    let mut group = c.benchmark_group("validate");
    group.bench_function("10_decls", |b| b.iter(|| validate(black_box(&small))));
    group.bench_function("100_decls", |b| b.iter(|| validate(black_box(&large))));
    group.finish();
}

fn bench_transforms(c: &mut Criterion) {
    let module = validate(&synthetic_shader(100)).unwrap();

    let mut group = c.benchmark_group("transform");
    group.bench_function("fold_100", |b| {
        b.iter(|| fold_constants(black_box(&module)))
    });
    group.bench_function("dce_100", |b| {
        b.iter(|| eliminate_dead_code(black_box(&module)))
    });
    group.finish();
}

fn bench_backends(c: &mut Criterion) {
    let module = validate(&synthetic_shader(100)).unwrap();

    let mut group = c.benchmark_group("generate");
    group.bench_function("glsl_100", |b| {
        b.iter(|| {
            compile_glsl(
                black_box(&module),
                ShaderStage::Fragment,
                glsl::Environment::default(),
                &glsl::States::default(),
            )
        })
    });
    group.bench_function("spirv_100", |b| {
        b.iter(|| {
            compile_spirv(
                black_box(&module),
                spirv::Environment::default(),
                &spirv::States::default(),
            )
        })
    });
    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let module = validate(&synthetic_shader(100)).unwrap();
    let bytes = serialize_shader(&module.root);

    let mut group = c.benchmark_group("codec");
    group.bench_function("serialize_100", |b| {
        b.iter(|| serialize_shader(black_box(&module.root)))
    });
    group.bench_function("deserialize_100", |b| {
        b.iter(|| deserialize_shader(black_box(&bytes)))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_validate,
    bench_transforms,
    bench_backends,
    bench_codec,
);
criterion_main!(benches);
