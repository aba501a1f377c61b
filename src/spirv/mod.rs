//! SPIR-V binary writer.
//!
//! Produces one complete module for the whole validated AST: every entry
//! function present (vertex and fragment, typically both) is compiled into
//! the same word stream. A lowering pass reshapes the tree first, a
//! pre-visitor registers types/constants/interface variables, then the
//! emitter writes function bodies and the sections are concatenated in the
//! order the module grammar mandates.

mod cache;
mod emit;
mod lower;
pub mod ops;
mod section;
#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use crate::ast::*;
use crate::diagnostic::CompileError;
use crate::transform::apply_options;
use crate::validate::Module;
use crate::visit::{walk_expression, walk_statement, Visitor};

use cache::SpirvConstantCache;
use emit::{Emitter, EntryPointData, ExternalSlot, FuncData, InterfaceVar, LocalVar};
use lower::lower;
use ops::*;
use section::{string_words, SpirvSection};

/// Target SPIR-V version.
#[derive(Clone, Debug)]
pub struct Environment {
    pub spv_major_version: u32,
    pub spv_minor_version: u32,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            spv_major_version: 1,
            spv_minor_version: 0,
        }
    }
}

/// Per-generation inputs: compile-time option values.
#[derive(Clone, Debug, Default)]
pub struct States {
    pub options: BTreeMap<String, u64>,
}

struct BuiltinSpirv {
    decoration: SpirvBuiltIn,
    stages: &'static [ShaderStage],
}

fn builtin_mapping(semantic: &str) -> Option<BuiltinSpirv> {
    match semantic {
        "position" => Some(BuiltinSpirv {
            decoration: SpirvBuiltIn::Position,
            stages: &[ShaderStage::Vertex],
        }),
        _ => None,
    }
}

/// A pending annotation, flushed into the decoration section at assembly.
enum Decoration {
    Plain {
        id: u32,
        decoration: SpirvDecoration,
        operands: Vec<u32>,
    },
    Member {
        struct_id: u32,
        member: u32,
        decoration: SpirvDecoration,
        operands: Vec<u32>,
    },
}

/// SPIR-V code generator.
#[derive(Default)]
pub struct SpirvWriter {
    environment: Environment,
}

impl SpirvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_env(&mut self, environment: Environment) {
        self.environment = environment;
    }

    /// Generate a complete SPIR-V module from a validated AST. All state is
    /// local to this call; concurrent generations never share anything.
    pub fn generate(&self, module: &Module, states: &States) -> Result<Vec<u32>, CompileError> {
        let module = apply_options(module, &states.options)?;
        let module = lower(&module)?;

        let mut cache = SpirvConstantCache::new();
        let mut funcs: BTreeMap<u32, FuncData> = BTreeMap::new();
        let mut externals: BTreeMap<u32, ExternalSlot> = BTreeMap::new();
        let mut decorations: Vec<Decoration> = Vec::new();

        previsit(
            &module,
            &mut cache,
            &mut funcs,
            &mut externals,
            &mut decorations,
        )?;

        if !funcs.values().any(|f| f.entry_point.is_some()) {
            return Err(CompileError::semantic("missing entry point"));
        }

        let glsl_ext_id = if uses_cross_product(&module.root) {
            Some(cache.allocate_id())
        } else {
            None
        };

        // Function bodies first; the header needs the final id bound.
        let mut instructions = SpirvSection::new();
        {
            let mut emitter = Emitter::new(
                &module,
                &mut cache,
                &funcs,
                &externals,
                glsl_ext_id,
                &mut instructions,
            );
            emit_functions(&module.root, &mut emitter)?;
        }

        let mut header = SpirvSection::new();
        header.append_raw(SPIRV_MAGIC);
        header.append_raw(
            (self.environment.spv_major_version << 16) | (self.environment.spv_minor_version << 8),
        );
        header.append_raw(0); // generator id (unregistered)
        header.append_raw(cache.bound());
        header.append_raw(0); // instruction schema

        header.append(SpirvOp::OpCapability, &[SpirvCapability::Shader as u32]);
        if let Some(ext_id) = glsl_ext_id {
            let mut operands = vec![ext_id];
            operands.extend(string_words("GLSL.std.450"));
            header.append(SpirvOp::OpExtInstImport, &operands);
        }
        header.append(
            SpirvOp::OpMemoryModel,
            &[
                SpirvAddressingModel::Logical as u32,
                SpirvMemoryModel::Glsl450 as u32,
            ],
        );

        let mut debug = SpirvSection::new();
        let mut fragment_entries = Vec::new();
        for data in funcs.values() {
            let mut name_operands = vec![data.func_id];
            name_operands.extend(string_words(&data.name));
            debug.append(SpirvOp::OpName, &name_operands);

            if let Some(entry) = &data.entry_point {
                let mut operands = vec![entry.execution_model as u32, data.func_id];
                operands.extend(string_words(&data.name));
                for input in &entry.inputs {
                    operands.push(input.global_id);
                }
                for output in &entry.outputs {
                    operands.push(output.global_id);
                }
                header.append(SpirvOp::OpEntryPoint, &operands);

                if entry.execution_model == SpirvExecutionModel::Fragment {
                    fragment_entries.push(data.func_id);
                }
            }
        }
        for func_id in fragment_entries {
            header.append(
                SpirvOp::OpExecutionMode,
                &[func_id, SpirvExecutionMode::OriginUpperLeft as u32],
            );
        }

        let mut annotations = SpirvSection::new();
        for decoration in &decorations {
            match decoration {
                Decoration::Plain {
                    id,
                    decoration,
                    operands,
                } => {
                    let mut words = vec![*id, *decoration as u32];
                    words.extend(operands);
                    annotations.append(SpirvOp::OpDecorate, &words);
                }
                Decoration::Member {
                    struct_id,
                    member,
                    decoration,
                    operands,
                } => {
                    let mut words = vec![*struct_id, *member, *decoration as u32];
                    words.extend(operands);
                    annotations.append(SpirvOp::OpMemberDecorate, &words);
                }
            }
        }

        let mut constants = SpirvSection::new();
        cache.write(&module, &mut constants, &mut debug);

        let mut output = Vec::with_capacity(
            header.len() + debug.len() + annotations.len() + constants.len() + instructions.len(),
        );
        output.extend_from_slice(header.words());
        output.extend_from_slice(debug.words());
        output.extend_from_slice(annotations.words());
        output.extend_from_slice(constants.words());
        output.extend_from_slice(instructions.words());
        Ok(output)
    }
}

// ─── Pre-visit ────────────────────────────────────────────────────

fn previsit(
    module: &Module,
    cache: &mut SpirvConstantCache,
    funcs: &mut BTreeMap<u32, FuncData>,
    externals: &mut BTreeMap<u32, ExternalSlot>,
    decorations: &mut Vec<Decoration>,
) -> Result<(), CompileError> {
    previsit_statement(&module.root, module, cache, funcs, externals, decorations)
}

fn previsit_statement(
    stmt: &Statement,
    module: &Module,
    cache: &mut SpirvConstantCache,
    funcs: &mut BTreeMap<u32, FuncData>,
    externals: &mut BTreeMap<u32, ExternalSlot>,
    decorations: &mut Vec<Decoration>,
) -> Result<(), CompileError> {
    match stmt {
        Statement::Multi(statements) => {
            for statement in statements {
                previsit_statement(statement, module, cache, funcs, externals, decorations)?;
            }
            Ok(())
        }
        Statement::DeclareExternal {
            external_vars,
            var_index,
            ..
        } => {
            let first = var_index.expect("unvalidated external");
            for (offset, var) in external_vars.iter().enumerate() {
                let storage = if var.ty.is_sampler() {
                    SpirvStorageClass::UniformConstant
                } else {
                    SpirvStorageClass::Uniform
                };
                let pointer_id = cache.register_global(module, &var.ty, storage, &var.name);

                if let Some(binding) =
                    find_attribute(&var.attributes, AttributeKind::Binding).and_then(Attribute::as_int)
                {
                    decorations.push(Decoration::Plain {
                        id: pointer_id,
                        decoration: SpirvDecoration::Binding,
                        operands: vec![binding as u32],
                    });
                    decorations.push(Decoration::Plain {
                        id: pointer_id,
                        decoration: SpirvDecoration::DescriptorSet,
                        operands: vec![0],
                    });
                }

                if let ExpressionType::Uniform(inner) = &var.ty {
                    decorate_uniform_block(module, cache, inner, decorations);
                }

                externals.insert(
                    first + offset as u32,
                    ExternalSlot {
                        pointer_id,
                        ty: var.ty.clone(),
                        storage,
                    },
                );
            }
            Ok(())
        }
        Statement::DeclareFunction(func) => {
            previsit_function(func, module, cache, funcs, decorations)
        }
        _ => Ok(()),
    }
}

/// Block/offset decorations making a std140 uniform struct loadable.
fn decorate_uniform_block(
    module: &Module,
    cache: &mut SpirvConstantCache,
    inner: &ExpressionType,
    decorations: &mut Vec<Decoration>,
) {
    let struct_index = match inner {
        ExpressionType::Struct(index) => *index,
        other => panic!("uniform block around non-struct type {}", other),
    };
    let struct_id = cache.register_type(module, inner);

    // One Block decoration per struct type is enough even when several
    // externals share it.
    if decorations.iter().any(|d| {
        matches!(d, Decoration::Plain { id, decoration: SpirvDecoration::Block, .. } if *id == struct_id)
    }) {
        return;
    }

    decorations.push(Decoration::Plain {
        id: struct_id,
        decoration: SpirvDecoration::Block,
        operands: Vec::new(),
    });

    let desc = module.struct_desc(struct_index).clone();
    let mut offset = 0u32;
    for (member_index, member) in desc.members.iter().enumerate() {
        let (size, align) = std140_size_align(module, &member.ty);
        offset = offset.div_ceil(align) * align;
        decorations.push(Decoration::Member {
            struct_id,
            member: member_index as u32,
            decoration: SpirvDecoration::Offset,
            operands: vec![offset],
        });
        if matches!(member.ty, ExpressionType::Matrix(_)) {
            decorations.push(Decoration::Member {
                struct_id,
                member: member_index as u32,
                decoration: SpirvDecoration::ColMajor,
                operands: Vec::new(),
            });
            decorations.push(Decoration::Member {
                struct_id,
                member: member_index as u32,
                decoration: SpirvDecoration::MatrixStride,
                operands: vec![16],
            });
        }
        offset += size;
    }
}

/// std140 size/alignment for the types a uniform block can contain.
fn std140_size_align(module: &Module, ty: &ExpressionType) -> (u32, u32) {
    match ty {
        ExpressionType::Primitive(_) => (4, 4),
        ExpressionType::Vector(v) => match v.component_count {
            2 => (8, 8),
            _ => ((v.component_count.min(4)) * 4, 16),
        },
        ExpressionType::Matrix(m) => (m.column_count * 16, 16),
        ExpressionType::Struct(index) => {
            let desc = module.struct_desc(*index);
            let mut offset = 0u32;
            for member in &desc.members {
                let (size, align) = std140_size_align(module, &member.ty);
                offset = offset.div_ceil(align) * align + size;
            }
            (offset.div_ceil(16) * 16, 16)
        }
        other => panic!("type {} inside a uniform block", other),
    }
}

fn previsit_function(
    func: &DeclareFunction,
    module: &Module,
    cache: &mut SpirvConstantCache,
    funcs: &mut BTreeMap<u32, FuncData>,
    decorations: &mut Vec<Decoration>,
) -> Result<(), CompileError> {
    let func_index = func.func_index.expect("unvalidated function");
    let func_id = cache.allocate_id();
    let mut locals: BTreeMap<u32, LocalVar> = BTreeMap::new();
    collect_locals(&func.statements, module, cache, &mut locals);

    let entry_stage = func.entry_stage();
    let data = match entry_stage {
        None => {
            let parameter_types: Vec<ExpressionType> =
                func.parameters.iter().map(|p| p.ty.clone()).collect();
            let return_type_id = cache.register_type(module, &func.return_type);
            let func_type_id =
                cache.register_function_type(module, &func.return_type, &parameter_types);

            let mut parameters = Vec::with_capacity(func.parameters.len());
            if let Some(first) = func.var_index {
                for (offset, parameter) in func.parameters.iter().enumerate() {
                    let var_index = first + offset as u32;
                    parameters.push((var_index, parameter.ty.clone()));
                    register_local(module, cache, &mut locals, var_index, &parameter.ty);
                }
            }

            FuncData {
                name: func.name.clone(),
                func_id,
                func_type_id,
                return_type: func.return_type.clone(),
                return_type_id,
                parameters,
                entry_point: None,
                locals,
            }
        }
        Some(stage) => {
            let execution_model = match stage {
                ShaderStage::Vertex => SpirvExecutionModel::Vertex,
                ShaderStage::Fragment => SpirvExecutionModel::Fragment,
                ShaderStage::Compute => {
                    return Err(CompileError::not_implemented("not yet implemented"))
                }
            };

            let return_type_id = cache.register_type(module, &ExpressionType::Void);
            let func_type_id =
                cache.register_function_type(module, &ExpressionType::Void, &[]);

            // Inputs: the single struct parameter's decorated members.
            let mut inputs = Vec::new();
            let mut input_struct = None;
            if let Some(parameter) = func.parameters.first() {
                let struct_index = match &parameter.ty {
                    ExpressionType::Struct(index) => *index,
                    _ => panic!("entry parameter is not a struct after validation"),
                };
                let desc = module.struct_desc(struct_index).clone();
                for (member_index, member) in desc.members.iter().enumerate() {
                    if let Some(var) = interface_variable(
                        module,
                        cache,
                        member,
                        stage,
                        SpirvStorageClass::Input,
                        member_index as u32,
                        decorations,
                    )? {
                        inputs.push(var);
                    }
                }
                let var_index = func.var_index.expect("entry parameter without an index");
                register_local(module, cache, &mut locals, var_index, &parameter.ty);
                input_struct = Some((var_index, parameter.ty.clone()));
            }

            // Outputs: the returned struct's decorated members.
            let mut outputs = Vec::new();
            if !func.return_type.is_void() {
                let struct_index = match &func.return_type {
                    ExpressionType::Struct(index) => *index,
                    _ => panic!("entry return type is not a struct after validation"),
                };
                cache.register_type(module, &func.return_type);
                let desc = module.struct_desc(struct_index).clone();
                for (member_index, member) in desc.members.iter().enumerate() {
                    if let Some(var) = interface_variable(
                        module,
                        cache,
                        member,
                        stage,
                        SpirvStorageClass::Output,
                        member_index as u32,
                        decorations,
                    )? {
                        outputs.push(var);
                    }
                }
            }

            FuncData {
                name: func.name.clone(),
                func_id,
                func_type_id,
                return_type: ExpressionType::Void,
                return_type_id,
                parameters: Vec::new(),
                entry_point: Some(EntryPointData {
                    execution_model,
                    inputs,
                    outputs,
                    input_struct,
                }),
                locals,
            }
        }
    };

    funcs.insert(func_index, data);
    Ok(())
}

/// Allocate the Input/Output global for one decorated struct member, or
/// `None` when the member carries no interface attribute (dropped) or its
/// builtin is incompatible with the stage.
fn interface_variable(
    module: &Module,
    cache: &mut SpirvConstantCache,
    member: &StructMember,
    stage: ShaderStage,
    storage: SpirvStorageClass,
    member_index: u32,
    decorations: &mut Vec<Decoration>,
) -> Result<Option<InterfaceVar>, CompileError> {
    if let Some(attr) = find_attribute(&member.attributes, AttributeKind::Builtin) {
        let semantic = attr
            .as_str()
            .ok_or_else(|| CompileError::semantic("builtin attribute expects a name"))?;
        let builtin = builtin_mapping(semantic).ok_or_else(|| {
            CompileError::semantic(format!("unknown builtin semantic '{}'", semantic))
        })?;
        if !builtin.stages.contains(&stage) {
            return Ok(None);
        }
        let global_id = cache.register_global(module, &member.ty, storage, &member.name);
        decorations.push(Decoration::Plain {
            id: global_id,
            decoration: SpirvDecoration::BuiltIn,
            operands: vec![builtin.decoration as u32],
        });
        return Ok(Some(InterfaceVar {
            global_id,
            member_index,
            member_ty: member.ty.clone(),
        }));
    }

    if let Some(attr) = find_attribute(&member.attributes, AttributeKind::Location) {
        let location = attr
            .as_int()
            .ok_or_else(|| CompileError::semantic("location attribute expects an index"))?;
        let global_id = cache.register_global(module, &member.ty, storage, &member.name);
        decorations.push(Decoration::Plain {
            id: global_id,
            decoration: SpirvDecoration::Location,
            operands: vec![location as u32],
        });
        return Ok(Some(InterfaceVar {
            global_id,
            member_index,
            member_ty: member.ty.clone(),
        }));
    }

    Ok(None)
}

fn register_local(
    module: &Module,
    cache: &mut SpirvConstantCache,
    locals: &mut BTreeMap<u32, LocalVar>,
    var_index: u32,
    ty: &ExpressionType,
) {
    if locals.contains_key(&var_index) {
        return;
    }
    let pointer_type_id = cache.register_pointer(module, ty, SpirvStorageClass::Function);
    let pointer_id = cache.allocate_id();
    locals.insert(
        var_index,
        LocalVar {
            pointer_id,
            pointer_type_id,
            ty: ty.clone(),
        },
    );
}

/// Collect every declared variable slot in a function body. Lowered
/// for-each blocks redeclare the same slot; it is registered once.
fn collect_locals(
    statements: &[Statement],
    module: &Module,
    cache: &mut SpirvConstantCache,
    locals: &mut BTreeMap<u32, LocalVar>,
) {
    struct LocalCollector<'a> {
        module: &'a Module,
        cache: &'a mut SpirvConstantCache,
        locals: &'a mut BTreeMap<u32, LocalVar>,
    }

    impl Visitor for LocalCollector<'_> {
        fn visit_statement(&mut self, stmt: &Statement) {
            if let Statement::DeclareVariable {
                var_type,
                var_index,
                ..
            } = stmt
            {
                register_local(
                    self.module,
                    self.cache,
                    self.locals,
                    var_index.expect("unvalidated variable"),
                    var_type,
                );
            }
            walk_statement(self, stmt);
        }
    }

    let mut collector = LocalCollector {
        module,
        cache,
        locals,
    };
    for statement in statements {
        collector.visit_statement(statement);
    }
}

fn uses_cross_product(root: &Statement) -> bool {
    struct CrossFinder {
        found: bool,
    }

    impl Visitor for CrossFinder {
        fn visit_expression(&mut self, expr: &Expression) {
            if let ExpressionKind::Intrinsic {
                intrinsic: IntrinsicKind::CrossProduct,
                ..
            } = expr.kind
            {
                self.found = true;
            }
            walk_expression(self, expr);
        }
    }

    let mut finder = CrossFinder { found: false };
    finder.visit_statement(root);
    finder.found
}

fn emit_functions(root: &Statement, emitter: &mut Emitter<'_>) -> Result<(), CompileError> {
    match root {
        Statement::Multi(statements) => {
            for statement in statements {
                emit_functions(statement, emitter)?;
            }
            Ok(())
        }
        Statement::DeclareFunction(func) => {
            emitter.emit_function(func.func_index.expect("unvalidated function"), func)
        }
        _ => Ok(()),
    }
}
