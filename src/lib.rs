//! glint — a shader IR compiler.
//!
//! The crate takes a typed shader AST (built programmatically via
//! [`ast::build`] or deserialized from a `.gsb` module), validates it,
//! optionally runs transform passes, and generates either GLSL source text
//! or a SPIR-V binary module. The front-end parser and the rendering engine
//! that consumes the artifacts live outside this crate.
//!
//! One compilation is single-threaded and owns all of its state; separate
//! compilations can run on separate threads freely.

pub mod ast;
pub mod diagnostic;
pub mod glsl;
pub mod hash;
pub mod rewrite;
pub mod serialize;
pub mod spirv;
pub mod transform;
pub mod validate;
pub mod visit;

pub use diagnostic::{CompileError, ErrorKind};
pub use serialize::{deserialize_shader, serialize_shader};
pub use validate::{validate, Module};

use ast::{ShaderStage, Statement};

/// Validate, fold, and strip a tree in one call: the standard pipeline in
/// front of either backend.
pub fn prepare(root: &Statement) -> Result<Module, CompileError> {
    let module = validate(root)?;
    let module = transform::fold_constants(&module)?;
    transform::eliminate_dead_code(&module)
}

/// Compile a validated module to GLSL for one stage.
pub fn compile_glsl(
    module: &Module,
    stage: ShaderStage,
    environment: glsl::Environment,
    states: &glsl::States,
) -> Result<String, CompileError> {
    let mut writer = glsl::GlslWriter::new();
    writer.set_env(environment);
    writer.generate(stage, module, states)
}

/// Compile a validated module (all entry stages at once) to SPIR-V words.
pub fn compile_spirv(
    module: &Module,
    environment: spirv::Environment,
    states: &spirv::States,
) -> Result<Vec<u32>, CompileError> {
    let mut writer = spirv::SpirvWriter::new();
    writer.set_env(environment);
    writer.generate(module, states)
}

/// Deserialize and validate a `.gsb` byte stream.
pub fn load_module(bytes: &[u8]) -> Result<Module, CompileError> {
    let root = deserialize_shader(bytes)?;
    validate(&root)
}
