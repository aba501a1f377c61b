//! GLSL text writer.
//!
//! Renders a validated module as GLSL source for one stage. A pre-visitor
//! keeps only the functions relevant to the requested stage and renames a
//! user function literally called `main`; the writer then emits the version
//! pragma, required extensions, the declarations, and finally a synthesized
//! `void main()` that wires the entry function's struct interface to global
//! `in`/`out` variables.

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::*;
use crate::diagnostic::CompileError;
use crate::rewrite::{walk_statement, Rewriter};
use crate::transform::apply_options;
use crate::validate::Module;
use crate::visit::{walk_statement as visit_walk_statement, Visitor};

const FLIP_Y_UNIFORM_NAME: &str = "_glint_flip_value";
const RENAMED_MAIN: &str = "_glint_main";
const INPUT_LOCAL: &str = "_glint_input";
const OUTPUT_LOCAL: &str = "_glint_output";
const INPUT_PREFIX: &str = "_glint_in_";
const OUTPUT_PREFIX: &str = "_glint_out_";

/// Target OpenGL environment. The writer derives the GLSL version from the
/// context version rather than taking a shading-language version directly.
#[derive(Clone, Debug)]
pub struct Environment {
    pub gl_es: bool,
    pub gl_major_version: u32,
    pub gl_minor_version: u32,
    /// Multiply the builtin position output by (1, flip, 1, 1) to undo the
    /// clip-space Y convention difference against other APIs.
    pub flip_y_position: bool,
    /// Extensions the driver reported; required extensions outside this set
    /// are simply not emitted.
    pub available_extensions: BTreeSet<String>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            gl_es: false,
            gl_major_version: 3,
            gl_minor_version: 3,
            flip_y_position: false,
            available_extensions: BTreeSet::new(),
        }
    }
}

/// Per-generation inputs: compile-time option values.
#[derive(Clone, Debug, Default)]
pub struct States {
    pub options: BTreeMap<String, u64>,
}

struct BuiltinGlsl {
    target: &'static str,
    stages: &'static [ShaderStage],
}

/// Fixed builtin-semantic table. Members tagged with a semantic outside a
/// compatible stage are dropped from the interface.
fn builtin_mapping(semantic: &str) -> Option<BuiltinGlsl> {
    match semantic {
        "position" => Some(BuiltinGlsl {
            target: "gl_Position",
            stages: &[ShaderStage::Vertex],
        }),
        _ => None,
    }
}

/// GLSL code generator.
#[derive(Default)]
pub struct GlslWriter {
    environment: Environment,
}

impl GlslWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_env(&mut self, environment: Environment) {
        self.environment = environment;
    }

    /// The name of the uniform driving the Y-flip multiply, for the caller
    /// that has to feed it.
    pub fn flip_y_uniform_name() -> &'static str {
        FLIP_Y_UNIFORM_NAME
    }

    /// Generate GLSL source for one stage of a validated module.
    pub fn generate(
        &self,
        stage: ShaderStage,
        module: &Module,
        states: &States,
    ) -> Result<String, CompileError> {
        if stage == ShaderStage::Compute {
            return Err(CompileError::not_implemented(
                "compute stage is not yet implemented",
            ));
        }

        let glsl_version = self.resolve_glsl_version()?;
        let module = apply_options(module, &states.options)?;

        let mut previsitor = PreVisitor {
            selected_stage: stage,
            entry: None,
        };
        let adapted_root = previsitor.rewrite_statement(&module.root)?;
        let entry = previsitor
            .entry
            .ok_or_else(|| CompileError::semantic("missing entry point"))?;
        let adapted = Module::rebuild(adapted_root);

        let mut state = State {
            module: &adapted,
            environment: &self.environment,
            stage,
            entry,
            stream: String::new(),
            indent_level: 0,
            variable_names: BTreeMap::new(),
            function_names: BTreeMap::new(),
        };
        state.collect_names();

        // Header
        state.append(format!("#version {}", glsl_version));
        if self.environment.gl_es {
            state.append(" es");
        }
        state.append_line("");
        state.append_line("");

        // Extensions
        let mut required_extensions: Vec<&str> = Vec::new();
        if !self.environment.gl_es {
            if glsl_version < 420
                && has_explicit_binding(&adapted)
                && self
                    .environment
                    .available_extensions
                    .contains("GL_ARB_shading_language_420pack")
            {
                required_extensions.push("GL_ARB_shading_language_420pack");
            }
            if glsl_version < 410
                && has_explicit_location(&adapted)
                && self
                    .environment
                    .available_extensions
                    .contains("GL_ARB_separate_shader_objects")
            {
                required_extensions.push("GL_ARB_separate_shader_objects");
            }
        }
        if !required_extensions.is_empty() {
            for extension in &required_extensions {
                state.append_line(&format!("#extension {} : require", extension));
            }
            state.append_line("");
        }

        if self.environment.gl_es {
            state.append_line("#if GL_FRAGMENT_PRECISION_HIGH");
            state.append_line("precision highp float;");
            state.append_line("#else");
            state.append_line("precision mediump float;");
            state.append_line("#endif");
            state.append_line("");
        }

        state.emit_statement(&adapted.root);
        state.append_entry_point()?;

        Ok(state.stream)
    }

    /// Map the GL context version to the GLSL version it ships with.
    fn resolve_glsl_version(&self) -> Result<u32, CompileError> {
        let major = self.environment.gl_major_version;
        let minor = self.environment.gl_minor_version;

        if self.environment.gl_es {
            return match (major, minor) {
                (3, m) if m >= 2 => Ok(320),
                (3, 1) => Ok(310),
                (3, _) => Ok(300),
                (m, _) if m > 3 => Ok(320),
                (2, _) => Ok(100),
                _ => Err(CompileError::semantic(
                    "this OpenGL ES version does not support shaders",
                )),
            };
        }

        match (major, minor) {
            (m, n) if m > 3 || (m == 3 && n >= 3) => Ok(m * 100 + n * 10),
            (3, 2) => Ok(150),
            (3, 1) => Ok(140),
            (3, _) => Ok(130),
            (2, n) if n >= 1 => Ok(120),
            (2, _) => Ok(110),
            _ => Err(CompileError::semantic(
                "this OpenGL version does not support shaders",
            )),
        }
    }
}

// ─── Pre-visitor ──────────────────────────────────────────────────

/// Keeps only the requested stage's entry function (other stages' entries
/// become no-ops) and renames a user `main` out of the way of the
/// synthesized one.
struct PreVisitor {
    selected_stage: ShaderStage,
    entry: Option<DeclareFunction>,
}

impl Rewriter for PreVisitor {
    fn rewrite_statement(&mut self, stmt: &Statement) -> Result<Statement, CompileError> {
        if let Statement::DeclareFunction(func) = stmt {
            match func.entry_stage() {
                Some(stage) if stage == self.selected_stage => {
                    let mut clone = func.clone();
                    if clone.name == "main" {
                        clone.name = RENAMED_MAIN.to_string();
                    }
                    self.entry = Some(clone.clone());
                    return Ok(Statement::DeclareFunction(clone));
                }
                Some(_) => return Ok(Statement::NoOp),
                None => {}
            }
        }
        walk_statement(self, stmt)
    }
}

// ─── Interface scans ──────────────────────────────────────────────

fn has_explicit_binding(module: &Module) -> bool {
    module
        .externals
        .values()
        .any(|e| find_attribute(&e.attributes, AttributeKind::Binding).is_some())
}

fn has_explicit_location(module: &Module) -> bool {
    module.structs.values().any(|desc| {
        desc.members
            .iter()
            .any(|m| find_attribute(&m.attributes, AttributeKind::Location).is_some())
    })
}

// ─── Emission state ───────────────────────────────────────────────

/// All mutable generation state, scoped to one `generate` call.
struct State<'a> {
    module: &'a Module,
    environment: &'a Environment,
    stage: ShaderStage,
    entry: DeclareFunction,
    stream: String,
    indent_level: usize,
    variable_names: BTreeMap<u32, String>,
    function_names: BTreeMap<u32, String>,
}

impl State<'_> {
    /// Build variable/function index -> emitted name tables from the
    /// adapted tree.
    fn collect_names(&mut self) {
        struct NameCollector<'b> {
            variable_names: &'b mut BTreeMap<u32, String>,
            function_names: &'b mut BTreeMap<u32, String>,
        }

        impl Visitor for NameCollector<'_> {
            fn visit_statement(&mut self, stmt: &Statement) {
                match stmt {
                    Statement::DeclareVariable {
                        name, var_index, ..
                    } => {
                        self.variable_names
                            .insert(var_index.expect("unvalidated variable"), name.clone());
                    }
                    Statement::DeclareExternal {
                        external_vars,
                        var_index,
                        ..
                    } => {
                        let first = var_index.expect("unvalidated external");
                        for (offset, var) in external_vars.iter().enumerate() {
                            self.variable_names
                                .insert(first + offset as u32, var.name.clone());
                        }
                    }
                    Statement::DeclareFunction(func) => {
                        self.function_names.insert(
                            func.func_index.expect("unvalidated function"),
                            func.name.clone(),
                        );
                        if let Some(first) = func.var_index {
                            for (offset, parameter) in func.parameters.iter().enumerate() {
                                self.variable_names
                                    .insert(first + offset as u32, parameter.name.clone());
                            }
                        }
                    }
                    Statement::For {
                        var_name,
                        var_index,
                        ..
                    }
                    | Statement::ForEach {
                        var_name,
                        var_index,
                        ..
                    } => {
                        self.variable_names
                            .insert(var_index.expect("unvalidated loop variable"), var_name.clone());
                    }
                    _ => {}
                }
                visit_walk_statement(self, stmt);
            }
        }

        let mut collector = NameCollector {
            variable_names: &mut self.variable_names,
            function_names: &mut self.function_names,
        };
        collector.visit_statement(&self.module.root);
    }

    // --- Low-level text helpers ---

    fn append(&mut self, text: impl AsRef<str>) {
        self.stream.push_str(text.as_ref());
    }

    fn append_line(&mut self, text: &str) {
        self.stream.push_str(text);
        self.stream.push('\n');
        for _ in 0..self.indent_level {
            self.stream.push('\t');
        }
    }

    fn enter_scope(&mut self) {
        self.indent_level += 1;
        self.append_line("{");
    }

    fn leave_scope(&mut self) {
        self.leave_scope_suffix("");
    }

    /// Close a scope, with `suffix` glued right after the brace (`";"` for
    /// struct declarations, the instance name for uniform blocks).
    fn leave_scope_suffix(&mut self, suffix: &str) {
        self.indent_level -= 1;
        // Drop the indentation already emitted for this line.
        while self.stream.ends_with('\t') {
            self.stream.pop();
        }
        for _ in 0..self.indent_level {
            self.stream.push('\t');
        }
        self.append_line(&format!("}}{}", suffix));
    }

    // --- Types ---

    fn append_type(&mut self, ty: &ExpressionType) {
        match ty {
            ExpressionType::Void => self.append("void"),
            ExpressionType::Primitive(p) => self.append(primitive_name(*p)),
            ExpressionType::Vector(v) => {
                self.append(vector_prefix(v.component_type));
                self.append(format!("vec{}", v.component_count));
            }
            ExpressionType::Matrix(m) => {
                if m.column_count == m.row_count {
                    self.append(format!("mat{}", m.column_count));
                } else {
                    self.append(format!("mat{}x{}", m.column_count, m.row_count));
                }
            }
            ExpressionType::Sampler(s) => {
                self.append(vector_prefix(s.sampled_type));
                self.append("sampler");
                self.append(match s.dim {
                    ImageDim::Dim1D => "1D",
                    ImageDim::Dim1DArray => "1DArray",
                    ImageDim::Dim2D => "2D",
                    ImageDim::Dim2DArray => "2DArray",
                    ImageDim::Dim3D => "3D",
                    ImageDim::Cubemap => "Cube",
                });
            }
            ExpressionType::Struct(index) => {
                let name = self.module.struct_desc(*index).name.clone();
                self.append(name);
            }
            ExpressionType::Uniform(inner) => self.append_type(inner),
            ExpressionType::Identifier(name) => {
                panic!("unresolved type '{}' reached the GLSL writer", name)
            }
        }
    }

    // --- Statements ---

    fn emit_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Branch {
                cond_statements,
                else_statement,
            } => {
                for (i, cond) in cond_statements.iter().enumerate() {
                    if i != 0 {
                        self.append("else ");
                    }
                    self.append("if (");
                    self.emit_expression(&cond.condition);
                    self.append_line(")");
                    self.enter_scope();
                    self.emit_statement(&cond.statement);
                    self.leave_scope();
                }
                if let Some(else_statement) = else_statement {
                    self.append_line("else");
                    self.enter_scope();
                    self.emit_statement(else_statement);
                    self.leave_scope();
                }
            }
            Statement::Conditional { .. } => {
                panic!("conditional statement survived option resolution")
            }
            Statement::DeclareExternal { external_vars, .. } => {
                for var in external_vars {
                    self.emit_external_var(var);
                }
            }
            Statement::DeclareFunction(func) => self.emit_function(func),
            Statement::DeclareStruct { description, .. } => {
                self.append("struct ");
                self.append_line(&description.name);
                self.enter_scope();
                for (i, member) in description.members.iter().enumerate() {
                    if i != 0 {
                        self.append_line("");
                    }
                    self.append_type(&member.ty);
                    self.append(" ");
                    self.append(&member.name);
                    self.append(";");
                }
                self.leave_scope_suffix(";");
                self.append_line("");
            }
            Statement::DeclareVariable {
                var_type,
                initial,
                var_index,
                ..
            } => {
                self.append_type(var_type);
                self.append(" ");
                let name = self.variable_name(var_index.expect("unvalidated variable"));
                self.append(name);
                if let Some(initial) = initial {
                    self.append(" = ");
                    self.emit_expression(initial);
                }
                self.append_line(";");
            }
            Statement::Discard => self.append_line("discard;"),
            Statement::Expression(expr) => {
                self.emit_expression(expr);
                self.append_line(";");
            }
            Statement::For {
                from,
                to,
                step,
                body,
                var_index,
                ..
            } => {
                let counter_ty = from.resolved_type().clone();
                let name = self.variable_name(var_index.expect("unvalidated loop variable"));
                self.append("for (");
                self.append_type(&counter_ty);
                self.append(format!(" {} = ", name));
                self.emit_expression(from);
                self.append(format!("; {} < ", name));
                self.emit_expression(to);
                self.append(format!("; {} += ", name));
                match step {
                    Some(step) => self.emit_expression(step),
                    None => self.append(if counter_ty
                        == ExpressionType::Primitive(PrimitiveType::UInt32)
                    {
                        "1u"
                    } else {
                        "1"
                    }),
                }
                self.append_line(")");
                self.enter_scope();
                self.emit_statement(body);
                self.leave_scope();
            }
            Statement::ForEach {
                expr,
                body,
                var_index,
                ..
            } => {
                // Iterate the components of the vector by index; indexing a
                // vector value is plain GLSL.
                let vector = match expr.resolved_type() {
                    ExpressionType::Vector(v) => *v,
                    other => panic!("for-each over non-vector type {}", other),
                };
                let name = self.variable_name(var_index.expect("unvalidated loop variable"));
                let counter = format!("_glint_idx_{}", name);
                self.append(format!(
                    "for (int {c} = 0; {c} < {n}; ++{c})",
                    c = counter,
                    n = vector.component_count
                ));
                self.append_line("");
                self.enter_scope();
                self.append(primitive_name(vector.component_type));
                self.append(format!(" {} = ", name));
                self.emit_enclosed(expr);
                self.append(format!("[{}];", counter));
                self.append_line("");
                self.emit_statement(body);
                self.leave_scope();
            }
            Statement::Multi(statements) => {
                let mut first = true;
                for statement in statements {
                    if !first && !statement.is_noop() {
                        self.append_line("");
                    }
                    self.emit_statement(statement);
                    first = false;
                }
            }
            Statement::NoOp => {}
            Statement::Return(expr) => {
                match expr {
                    Some(expr) => {
                        self.append("return ");
                        self.emit_expression(expr);
                        self.append(";");
                    }
                    None => self.append("return;"),
                }
                self.append_line("");
            }
            Statement::While { condition, body } => {
                self.append("while (");
                self.emit_expression(condition);
                self.append_line(")");
                self.enter_scope();
                self.emit_statement(body);
                self.leave_scope();
            }
        }
    }

    fn emit_external_var(&mut self, var: &ExternalVar) {
        let binding = find_attribute(&var.attributes, AttributeKind::Binding).and_then(Attribute::as_int);
        let std140 = find_attribute(&var.attributes, AttributeKind::Layout)
            .and_then(Attribute::as_str)
            .is_some_and(|l| l == "std140");

        if let Some(binding) = binding {
            self.append(format!("layout(binding = {}", binding));
            if std140 {
                self.append(", std140");
            }
            self.append(") ");
        } else if std140 {
            self.append("layout(std140) ");
        }

        self.append("uniform ");

        if let ExpressionType::Uniform(inner) = &var.ty {
            // Uniform block: named block, instance named after the external.
            let struct_index = match inner.as_ref() {
                ExpressionType::Struct(index) => *index,
                other => panic!("uniform block around non-struct type {}", other),
            };
            self.append(format!("_glint_binding_{}", var.name));
            self.append_line("");
            self.enter_scope();
            let desc = self.module.struct_desc(struct_index).clone();
            for (i, member) in desc.members.iter().enumerate() {
                if i != 0 {
                    self.append_line("");
                }
                self.append_type(&member.ty);
                self.append(" ");
                self.append(&member.name);
                self.append(";");
            }
            self.leave_scope_suffix(&format!(" {};", var.name));
        } else {
            self.append_type(&var.ty);
            self.append(format!(" {};", var.name));
            self.append_line("");
        }
    }

    fn emit_function(&mut self, func: &DeclareFunction) {
        self.append_type(&func.return_type);
        self.append(format!(" {}(", func.name));
        for (i, parameter) in func.parameters.iter().enumerate() {
            if i != 0 {
                self.append(", ");
            }
            self.append_type(&parameter.ty);
            self.append(format!(" {}", parameter.name));
        }
        self.append_line(")");
        self.enter_scope();
        for statement in &func.statements {
            self.emit_statement(statement);
        }
        self.leave_scope();
        self.append_line("");
    }

    // --- Expressions ---

    fn emit_expression(&mut self, expr: &Expression) {
        match &expr.kind {
            ExpressionKind::AccessMember { expr, member_names } => {
                self.emit_enclosed(expr);
                for name in member_names {
                    self.append(format!(".{}", name));
                }
            }
            ExpressionKind::AccessIndex {
                expr: base,
                member_indices,
            } => {
                // Resolve indices back to names through the struct tables.
                self.emit_enclosed(base);
                let mut ty = base.resolved_type().clone();
                for index in member_indices {
                    let desc = self.module.struct_desc(expect_struct_index(&ty));
                    let member = &desc.members[*index as usize];
                    let member_name = member.name.clone();
                    let member_ty = member.ty.clone();
                    self.append(format!(".{}", member_name));
                    ty = member_ty;
                }
            }
            ExpressionKind::Assign { op, left, right } => {
                self.emit_expression(left);
                match op {
                    AssignOp::Simple => self.append(" = "),
                }
                self.emit_expression(right);
            }
            ExpressionKind::Binary { op, left, right } => {
                self.emit_enclosed(left);
                self.append(format!(" {} ", op));
                self.emit_enclosed(right);
            }
            ExpressionKind::Call {
                func_index,
                parameters,
                ..
            } => {
                let index = func_index.expect("unresolved call in validated tree");
                let name = self
                    .function_names
                    .get(&index)
                    .expect("call to a function outside the module")
                    .clone();
                self.append(name);
                self.append("(");
                for (i, parameter) in parameters.iter().enumerate() {
                    if i != 0 {
                        self.append(", ");
                    }
                    self.emit_expression(parameter);
                }
                self.append(")");
            }
            ExpressionKind::Cast {
                target_type,
                expressions,
            } => {
                self.append_type(target_type);
                self.append("(");
                for (i, expression) in expressions.iter().enumerate() {
                    if i != 0 {
                        self.append(", ");
                    }
                    self.emit_expression(expression);
                }
                self.append(")");
            }
            ExpressionKind::Conditional { .. } => {
                panic!("conditional expression survived option resolution")
            }
            ExpressionKind::Constant(value) => self.emit_constant(value),
            ExpressionKind::Identifier(name) => {
                panic!("unresolved identifier '{}' reached the GLSL writer", name)
            }
            ExpressionKind::Intrinsic {
                intrinsic,
                parameters,
            } => {
                self.append(match intrinsic {
                    IntrinsicKind::CrossProduct => "cross",
                    IntrinsicKind::DotProduct => "dot",
                    IntrinsicKind::SampleTexture => "texture",
                });
                self.append("(");
                for (i, parameter) in parameters.iter().enumerate() {
                    if i != 0 {
                        self.append(", ");
                    }
                    self.emit_expression(parameter);
                }
                self.append(")");
            }
            ExpressionKind::Swizzle { expr, components } => {
                self.emit_enclosed(expr);
                self.append(".");
                for component in components {
                    self.append(match component {
                        SwizzleComponent::First => "x",
                        SwizzleComponent::Second => "y",
                        SwizzleComponent::Third => "z",
                        SwizzleComponent::Fourth => "w",
                    });
                }
            }
            ExpressionKind::Unary { op, expr } => {
                self.append(format!("{}", op));
                self.emit_enclosed(expr);
            }
            ExpressionKind::Variable { var_index } => {
                let name = self.variable_name(*var_index);
                self.append(name);
            }
        }
    }

    /// Emit with parentheses when precedence could bite.
    fn emit_enclosed(&mut self, expr: &Expression) {
        let enclose = matches!(
            expr.kind,
            ExpressionKind::Binary { .. }
                | ExpressionKind::Unary { .. }
                | ExpressionKind::Assign { .. }
        );
        if enclose {
            self.append("(");
        }
        self.emit_expression(expr);
        if enclose {
            self.append(")");
        }
    }

    fn emit_constant(&mut self, value: &ConstantValue) {
        match value {
            ConstantValue::Bool(v) => self.append(if *v { "true" } else { "false" }),
            ConstantValue::Float32(v) => self.append(float_literal(*v)),
            ConstantValue::Int32(v) => self.append(v.to_string()),
            ConstantValue::UInt32(v) => self.append(format!("{}u", v)),
            ConstantValue::Vec2Float(v) => self.append(format!(
                "vec2({}, {})",
                float_literal(v[0]),
                float_literal(v[1])
            )),
            ConstantValue::Vec3Float(v) => self.append(format!(
                "vec3({}, {}, {})",
                float_literal(v[0]),
                float_literal(v[1]),
                float_literal(v[2])
            )),
            ConstantValue::Vec4Float(v) => self.append(format!(
                "vec4({}, {}, {}, {})",
                float_literal(v[0]),
                float_literal(v[1]),
                float_literal(v[2]),
                float_literal(v[3])
            )),
            ConstantValue::Vec2Int(v) => self.append(format!("ivec2({}, {})", v[0], v[1])),
            ConstantValue::Vec3Int(v) => {
                self.append(format!("ivec3({}, {}, {})", v[0], v[1], v[2]))
            }
            ConstantValue::Vec4Int(v) => {
                self.append(format!("ivec4({}, {}, {}, {})", v[0], v[1], v[2], v[3]))
            }
        }
    }

    fn variable_name(&self, var_index: u32) -> String {
        self.variable_names
            .get(&var_index)
            .unwrap_or_else(|| panic!("variable #{} has no declaration in scope", var_index))
            .clone()
    }

    // --- Entry point synthesis ---

    fn append_entry_point(&mut self) -> Result<(), CompileError> {
        self.append_line("");
        self.append_line("// Entry point handling");

        struct InOutField {
            src: String,
            dst: String,
        }

        let entry = self.entry.clone();
        let mut input_fields: Vec<InOutField> = Vec::new();
        let mut output_fields: Vec<InOutField> = Vec::new();

        // Input globals: declare and plan the copy into the local struct.
        let input_struct = match entry.parameters.first() {
            Some(parameter) => {
                let index = expect_struct_index(&parameter.ty);
                let desc = self.module.struct_desc(index).clone();
                for member in &desc.members {
                    match self.interface_target(member, "in", INPUT_PREFIX)? {
                        InterfaceMember::Skip => {}
                        InterfaceMember::Named(global) => input_fields.push(InOutField {
                            src: global,
                            dst: format!("{}.{}", INPUT_LOCAL, member.name),
                        }),
                    }
                }
                self.append_line("");
                Some(desc)
            }
            None => None,
        };

        // Output globals.
        let output_struct = if !entry.return_type.is_void() {
            let index = expect_struct_index(&entry.return_type);
            let desc = self.module.struct_desc(index).clone();
            for member in &desc.members {
                match self.interface_target(member, "out", OUTPUT_PREFIX)? {
                    InterfaceMember::Skip => {}
                    InterfaceMember::Named(global) => output_fields.push(InOutField {
                        src: format!("{}.{}", OUTPUT_LOCAL, member.name),
                        dst: global,
                    }),
                }
            }
            self.append_line("");
            Some(desc)
        } else {
            None
        };

        if self.stage == ShaderStage::Vertex && self.environment.flip_y_position {
            self.append_line(&format!("uniform float {};", FLIP_Y_UNIFORM_NAME));
        }

        self.append_line("void main()");
        self.enter_scope();

        if let Some(desc) = &input_struct {
            self.append(format!("{} {};", desc.name, INPUT_LOCAL));
            self.append_line("");
            for field in &input_fields {
                self.append(format!("{} = {};", field.dst, field.src));
                self.append_line("");
            }
            self.append_line("");
        }

        if let Some(desc) = &output_struct {
            self.append(format!("{} {} = ", desc.name, OUTPUT_LOCAL));
        }
        self.append(entry.name.clone());
        self.append("(");
        if input_struct.is_some() {
            self.append(INPUT_LOCAL);
        }
        self.append(");");
        self.append_line("");

        for field in &output_fields {
            let flip = self.stage == ShaderStage::Vertex
                && self.environment.flip_y_position
                && field.dst == "gl_Position";
            self.append(format!("{} = {}", field.dst, field.src));
            if flip {
                self.append(format!(" * vec4(1.0, {}, 1.0, 1.0)", FLIP_Y_UNIFORM_NAME));
            }
            self.append(";");
            self.append_line("");
        }

        self.leave_scope();
        Ok(())
    }

    /// Decide what a struct member maps to at the stage interface: a builtin
    /// name, a declared location global, or nothing at all.
    fn interface_target(
        &mut self,
        member: &StructMember,
        keyword: &str,
        prefix: &str,
    ) -> Result<InterfaceMember, CompileError> {
        if let Some(attr) = find_attribute(&member.attributes, AttributeKind::Builtin) {
            let semantic = attr
                .as_str()
                .ok_or_else(|| CompileError::semantic("builtin attribute expects a name"))?;
            let builtin = builtin_mapping(semantic).ok_or_else(|| {
                CompileError::semantic(format!("unknown builtin semantic '{}'", semantic))
            })?;
            if !builtin.stages.contains(&self.stage) {
                return Ok(InterfaceMember::Skip);
            }
            return Ok(InterfaceMember::Named(builtin.target.to_string()));
        }

        if let Some(attr) = find_attribute(&member.attributes, AttributeKind::Location) {
            let location = attr
                .as_int()
                .ok_or_else(|| CompileError::semantic("location attribute expects an index"))?;
            let global = format!("{}{}", prefix, member.name);
            self.append(format!("layout(location = {}) {} ", location, keyword));
            self.append_type(&member.ty);
            self.append(format!(" {};", global));
            self.append_line("");
            return Ok(InterfaceMember::Named(global));
        }

        // No interface attribute: dropped from the stage interface.
        Ok(InterfaceMember::Skip)
    }
}

enum InterfaceMember {
    Skip,
    Named(String),
}

fn expect_struct_index(ty: &ExpressionType) -> u32 {
    match ty {
        ExpressionType::Struct(index) => *index,
        ExpressionType::Uniform(inner) => expect_struct_index(inner),
        other => panic!("expected a struct type, got {}", other),
    }
}

fn primitive_name(p: PrimitiveType) -> &'static str {
    match p {
        PrimitiveType::Bool => "bool",
        PrimitiveType::Float32 => "float",
        PrimitiveType::Int32 => "int",
        PrimitiveType::UInt32 => "uint",
    }
}

fn vector_prefix(p: PrimitiveType) -> &'static str {
    match p {
        PrimitiveType::Bool => "b",
        PrimitiveType::Float32 => "",
        PrimitiveType::Int32 => "i",
        PrimitiveType::UInt32 => "u",
    }
}

/// A float literal that always reads back as a float (`5.0`, not `5`).
fn float_literal(v: f32) -> String {
    let text = format!("{}", v);
    if text.contains('.') || text.contains('e') || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{}.0", text)
    }
}

