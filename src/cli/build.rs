use std::path::{Path, PathBuf};
use std::process;

use rayon::prelude::*;

use glint::ast::ShaderStage;
use glint::validate::Module;
use glint::{glsl, spirv, transform, CompileError};

use super::{load_module_or_exit, parse_gl_version, parse_option_values};

pub struct BuildArgs {
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub target: String,
    pub stage: Option<String>,
    pub gl_version: String,
    pub gl_es: bool,
    pub flip_y: bool,
    pub no_opt: bool,
    pub set: Vec<String>,
}

pub fn run(args: BuildArgs) {
    if args.inputs.is_empty() {
        eprintln!("error: no input modules");
        process::exit(1);
    }
    if args.output.is_some() && args.inputs.len() > 1 {
        eprintln!("error: -o only works with a single input");
        process::exit(1);
    }

    let failed = args
        .inputs
        .par_iter()
        .map(|input| build_one(input, &args))
        .filter(|ok| !ok)
        .count();
    if failed > 0 {
        eprintln!("error: {} module(s) failed to compile", failed);
        process::exit(1);
    }
}

fn build_one(input: &Path, args: &BuildArgs) -> bool {
    let module = load_module_or_exit(input);
    let module = match optimize(module, args.no_opt) {
        Ok(module) => module,
        Err(e) => {
            e.render();
            return false;
        }
    };

    match args.target.as_str() {
        "glsl" => build_glsl(input, args, &module),
        "spirv" => build_spirv(input, args, &module),
        other => {
            eprintln!("error: unknown target '{}' (expected glsl or spirv)", other);
            process::exit(1);
        }
    }
}

fn optimize(module: Module, no_opt: bool) -> Result<Module, CompileError> {
    if no_opt {
        return Ok(module);
    }
    let module = transform::fold_constants(&module)?;
    transform::eliminate_dead_code(&module)
}

fn build_glsl(input: &Path, args: &BuildArgs, module: &Module) -> bool {
    let (gl_major_version, gl_minor_version) = parse_gl_version(&args.gl_version);
    let environment = glsl::Environment {
        gl_es: args.gl_es,
        gl_major_version,
        gl_minor_version,
        flip_y_position: args.flip_y,
        available_extensions: Default::default(),
    };
    let states = glsl::States {
        options: parse_option_values(&args.set),
    };

    let stages: Vec<(ShaderStage, &str)> = match args.stage.as_deref() {
        Some("vert") => vec![(ShaderStage::Vertex, "vert")],
        Some("frag") => vec![(ShaderStage::Fragment, "frag")],
        Some(other) => {
            eprintln!("error: unknown stage '{}' (expected vert or frag)", other);
            process::exit(1);
        }
        // No stage requested: emit every entry stage the module declares.
        None => [
            (ShaderStage::Vertex, "vert"),
            (ShaderStage::Fragment, "frag"),
        ]
        .into_iter()
        .filter(|(stage, _)| module.entry_point(*stage).is_some())
        .collect(),
    };
    if stages.is_empty() {
        eprintln!("error: '{}' declares no entry points", input.display());
        return false;
    }

    let mut ok = true;
    for (stage, suffix) in stages {
        let mut writer = glsl::GlslWriter::new();
        writer.set_env(environment.clone());
        match writer.generate(stage, module, &states) {
            Ok(text) => {
                let out_path = match (&args.output, suffix) {
                    (Some(output), _) => output.clone(),
                    (None, suffix) => input.with_extension(format!("{}.glsl", suffix)),
                };
                if let Err(e) = std::fs::write(&out_path, &text) {
                    eprintln!("error: cannot write '{}': {}", out_path.display(), e);
                    ok = false;
                    continue;
                }
                eprintln!("Compiled -> {}", out_path.display());
            }
            Err(e) => {
                e.render();
                ok = false;
            }
        }
    }
    ok
}

fn build_spirv(input: &Path, args: &BuildArgs, module: &Module) -> bool {
    let states = spirv::States {
        options: parse_option_values(&args.set),
    };
    let mut writer = spirv::SpirvWriter::new();
    writer.set_env(spirv::Environment::default());

    match writer.generate(module, &states) {
        Ok(words) => {
            let out_path = args
                .output
                .clone()
                .unwrap_or_else(|| input.with_extension("spv"));
            let bytes: &[u8] = bytemuck::cast_slice(&words);
            if let Err(e) = std::fs::write(&out_path, bytes) {
                eprintln!("error: cannot write '{}': {}", out_path.display(), e);
                return false;
            }
            eprintln!(
                "Compiled -> {} ({} words)",
                out_path.display(),
                words.len()
            );
            true
        }
        Err(e) => {
            e.render();
            false
        }
    }
}
