//! SPIR-V function body emission.
//!
//! Walks lowered function bodies and appends the instruction stream.
//! Lvalues are emitted as pointers (`OpAccessChain` + `OpStore`), rvalues
//! as loaded values; parameters are copied into function-storage locals at
//! entry so every named value is reachable through one pointer scheme.

use std::collections::BTreeMap;

use super::cache::SpirvConstantCache;
use super::ops::*;
use super::section::SpirvSection;
use crate::ast::*;
use crate::diagnostic::CompileError;
use crate::validate::Module;

/// One addressable slot inside a function (declared variable, parameter
/// backing store, or the entry function's input struct local).
pub(super) struct LocalVar {
    pub pointer_id: u32,
    pub pointer_type_id: u32,
    pub ty: ExpressionType,
}

/// One decorated interface variable of an entry function.
pub(super) struct InterfaceVar {
    pub global_id: u32,
    pub member_index: u32,
    pub member_ty: ExpressionType,
}

pub(super) struct EntryPointData {
    pub execution_model: SpirvExecutionModel,
    pub inputs: Vec<InterfaceVar>,
    pub outputs: Vec<InterfaceVar>,
    /// Variable index and type of the single struct input parameter.
    pub input_struct: Option<(u32, ExpressionType)>,
}

pub(super) struct FuncData {
    pub name: String,
    pub func_id: u32,
    pub func_type_id: u32,
    pub return_type: ExpressionType,
    pub return_type_id: u32,
    /// (variable index, type) per parameter, in order.
    pub parameters: Vec<(u32, ExpressionType)>,
    pub entry_point: Option<EntryPointData>,
    pub locals: BTreeMap<u32, LocalVar>,
}

/// A module-scope external variable slot (uniform block or sampler).
pub(super) struct ExternalSlot {
    pub pointer_id: u32,
    pub ty: ExpressionType,
    pub storage: SpirvStorageClass,
}

pub(super) struct Emitter<'a> {
    pub module: &'a Module,
    pub cache: &'a mut SpirvConstantCache,
    pub funcs: &'a BTreeMap<u32, FuncData>,
    pub externals: &'a BTreeMap<u32, ExternalSlot>,
    pub glsl_ext_id: Option<u32>,
    pub out: &'a mut SpirvSection,
    current_func: Option<u32>,
    block_terminated: bool,
}

impl<'a> Emitter<'a> {
    pub fn new(
        module: &'a Module,
        cache: &'a mut SpirvConstantCache,
        funcs: &'a BTreeMap<u32, FuncData>,
        externals: &'a BTreeMap<u32, ExternalSlot>,
        glsl_ext_id: Option<u32>,
        out: &'a mut SpirvSection,
    ) -> Self {
        Self {
            module,
            cache,
            funcs,
            externals,
            glsl_ext_id,
            out,
            current_func: None,
            block_terminated: false,
        }
    }

    fn data(&self) -> &'a FuncData {
        let index = self.current_func.expect("emission outside a function");
        &self.funcs[&index]
    }

    pub fn emit_function(
        &mut self,
        func_index: u32,
        func: &DeclareFunction,
    ) -> Result<(), CompileError> {
        self.current_func = Some(func_index);
        let data = &self.funcs[&func_index];

        self.out.append(
            SpirvOp::OpFunction,
            &[data.return_type_id, data.func_id, 0, data.func_type_id],
        );

        // Parameter value ids (entry functions take no parameters).
        let mut param_values = Vec::new();
        if data.entry_point.is_none() {
            for (_, ty) in &data.parameters {
                let type_id = self.cache.register_type(self.module, ty);
                let value_id = self.cache.allocate_id();
                self.out
                    .append(SpirvOp::OpFunctionParameter, &[type_id, value_id]);
                param_values.push(value_id);
            }
        }

        let entry_label = self.cache.allocate_id();
        self.out.append(SpirvOp::OpLabel, &[entry_label]);

        // All OpVariables must open the first block.
        let data = &self.funcs[&func_index];
        for local in data.locals.values() {
            self.out.append(
                SpirvOp::OpVariable,
                &[
                    local.pointer_type_id,
                    local.pointer_id,
                    SpirvStorageClass::Function as u32,
                ],
            );
        }

        // Copy parameters into their backing locals.
        let stores: Vec<(u32, u32)> = data
            .parameters
            .iter()
            .zip(&param_values)
            .map(|((var_index, _), value_id)| (data.locals[var_index].pointer_id, *value_id))
            .collect();
        for (pointer_id, value_id) in stores {
            self.out.append(SpirvOp::OpStore, &[pointer_id, value_id]);
        }

        // Entry functions: gather decorated inputs into the struct local.
        if let Some(entry) = &data.entry_point {
            if let Some((input_var, _)) = &entry.input_struct {
                let struct_pointer = data.locals[input_var].pointer_id;
                let copies: Vec<(u32, u32, ExpressionType)> = entry
                    .inputs
                    .iter()
                    .map(|i| (i.global_id, i.member_index, i.member_ty.clone()))
                    .collect();
                for (global_id, member_index, member_ty) in copies {
                    let member_type_id = self.cache.register_type(self.module, &member_ty);
                    let member_pointer_id = self.cache.register_pointer(
                        self.module,
                        &member_ty,
                        SpirvStorageClass::Function,
                    );
                    let index_id = self
                        .cache
                        .register_i32_constant(self.module, member_index as i32);

                    let loaded = self.cache.allocate_id();
                    self.out
                        .append(SpirvOp::OpLoad, &[member_type_id, loaded, global_id]);
                    let chained = self.cache.allocate_id();
                    self.out.append(
                        SpirvOp::OpAccessChain,
                        &[member_pointer_id, chained, struct_pointer, index_id],
                    );
                    self.out.append(SpirvOp::OpStore, &[chained, loaded]);
                }
            }
        }

        self.block_terminated = false;
        for statement in &func.statements {
            self.emit_statement(statement)?;
        }

        if !self.block_terminated {
            let data = self.data();
            if data.return_type.is_void() || data.entry_point.is_some() {
                self.out.append(SpirvOp::OpReturn, &[]);
            } else {
                // A value-returning body that falls off its end; the
                // validator does not do flow analysis, the module stays
                // loadable via an explicit unreachable.
                self.out.append(SpirvOp::OpUnreachable, &[]);
            }
        }
        self.out.append(SpirvOp::OpFunctionEnd, &[]);
        self.current_func = None;
        Ok(())
    }

    /// Open a fresh (unreachable) block if the previous statement
    /// terminated the current one.
    fn ensure_block(&mut self) {
        if self.block_terminated {
            let label = self.cache.allocate_id();
            self.out.append(SpirvOp::OpLabel, &[label]);
            self.block_terminated = false;
        }
    }

    fn emit_statement(&mut self, stmt: &Statement) -> Result<(), CompileError> {
        match stmt {
            Statement::Multi(statements) => {
                for statement in statements {
                    self.emit_statement(statement)?;
                }
                Ok(())
            }
            Statement::NoOp => Ok(()),
            Statement::DeclareVariable {
                initial, var_index, ..
            } => {
                if let Some(initial) = initial {
                    self.ensure_block();
                    let value = self.emit_value(initial)?;
                    let pointer = self.data().locals
                        [&var_index.expect("unvalidated variable")]
                        .pointer_id;
                    self.out.append(SpirvOp::OpStore, &[pointer, value]);
                }
                Ok(())
            }
            Statement::Expression(expr) => {
                self.ensure_block();
                self.emit_value(expr)?;
                Ok(())
            }
            Statement::Branch {
                cond_statements,
                else_statement,
            } => {
                self.ensure_block();
                self.emit_branch(cond_statements, else_statement.as_deref())
            }
            Statement::While { condition, body } => {
                self.ensure_block();
                let header = self.cache.allocate_id();
                let cond_block = self.cache.allocate_id();
                let body_block = self.cache.allocate_id();
                let continue_block = self.cache.allocate_id();
                let merge_block = self.cache.allocate_id();

                self.out.append(SpirvOp::OpBranch, &[header]);
                self.out.append(SpirvOp::OpLabel, &[header]);
                self.out
                    .append(SpirvOp::OpLoopMerge, &[merge_block, continue_block, 0]);
                self.out.append(SpirvOp::OpBranch, &[cond_block]);

                self.out.append(SpirvOp::OpLabel, &[cond_block]);
                let cond_value = self.emit_value(condition)?;
                self.out.append(
                    SpirvOp::OpBranchConditional,
                    &[cond_value, body_block, merge_block],
                );

                self.out.append(SpirvOp::OpLabel, &[body_block]);
                self.block_terminated = false;
                self.emit_statement(body)?;
                if !self.block_terminated {
                    self.out.append(SpirvOp::OpBranch, &[continue_block]);
                }

                self.out.append(SpirvOp::OpLabel, &[continue_block]);
                self.out.append(SpirvOp::OpBranch, &[header]);

                self.out.append(SpirvOp::OpLabel, &[merge_block]);
                self.block_terminated = false;
                Ok(())
            }
            Statement::Return(expr) => {
                self.ensure_block();
                let entry_outputs: Option<Vec<(u32, u32, ExpressionType)>> =
                    self.data().entry_point.as_ref().map(|entry| {
                        entry
                            .outputs
                            .iter()
                            .map(|o| (o.global_id, o.member_index, o.member_ty.clone()))
                            .collect()
                    });
                match (expr, entry_outputs) {
                    (Some(expr), Some(outputs)) => {
                        // Scatter the returned struct to the Output globals.
                        let value = self.emit_value(expr)?;
                        for (global_id, member_index, member_ty) in outputs {
                            let member_type_id =
                                self.cache.register_type(self.module, &member_ty);
                            let extracted = self.cache.allocate_id();
                            self.out.append(
                                SpirvOp::OpCompositeExtract,
                                &[member_type_id, extracted, value, member_index],
                            );
                            self.out
                                .append(SpirvOp::OpStore, &[global_id, extracted]);
                        }
                        self.out.append(SpirvOp::OpReturn, &[]);
                    }
                    (Some(expr), None) => {
                        let value = self.emit_value(expr)?;
                        self.out.append(SpirvOp::OpReturnValue, &[value]);
                    }
                    (None, _) => self.out.append(SpirvOp::OpReturn, &[]),
                }
                self.block_terminated = true;
                Ok(())
            }
            Statement::Discard => {
                self.ensure_block();
                self.out.append(SpirvOp::OpKill, &[]);
                self.block_terminated = true;
                Ok(())
            }
            Statement::Conditional { .. } => {
                panic!("conditional statement survived option resolution")
            }
            Statement::For { .. } | Statement::ForEach { .. } => {
                panic!("loop statement survived SPIR-V lowering")
            }
            Statement::DeclareExternal { .. }
            | Statement::DeclareStruct { .. }
            | Statement::DeclareFunction(_) => Ok(()),
        }
    }

    fn emit_branch(
        &mut self,
        conds: &[CondStatement],
        else_statement: Option<&Statement>,
    ) -> Result<(), CompileError> {
        let (first, rest) = match conds.split_first() {
            Some(split) => split,
            None => {
                if let Some(else_statement) = else_statement {
                    self.emit_statement(else_statement)?;
                }
                return Ok(());
            }
        };

        let condition = self.emit_value(&first.condition)?;
        let merge_block = self.cache.allocate_id();
        let true_block = self.cache.allocate_id();
        let has_alternative = !rest.is_empty() || else_statement.is_some();
        let false_block = if has_alternative {
            self.cache.allocate_id()
        } else {
            merge_block
        };

        self.out.append(SpirvOp::OpSelectionMerge, &[merge_block, 0]);
        self.out.append(
            SpirvOp::OpBranchConditional,
            &[condition, true_block, false_block],
        );

        self.out.append(SpirvOp::OpLabel, &[true_block]);
        self.block_terminated = false;
        self.emit_statement(&first.statement)?;
        if !self.block_terminated {
            self.out.append(SpirvOp::OpBranch, &[merge_block]);
        }

        if has_alternative {
            self.out.append(SpirvOp::OpLabel, &[false_block]);
            self.block_terminated = false;
            self.emit_branch(rest, else_statement)?;
            if !self.block_terminated {
                self.out.append(SpirvOp::OpBranch, &[merge_block]);
            }
        }

        self.out.append(SpirvOp::OpLabel, &[merge_block]);
        self.block_terminated = false;
        Ok(())
    }

    // --- Expressions ---

    fn emit_value(&mut self, expr: &Expression) -> Result<u32, CompileError> {
        let result_ty = expr.resolved_type().clone();
        match &expr.kind {
            ExpressionKind::Constant(value) => {
                Ok(self.cache.register_constant(self.module, value))
            }
            ExpressionKind::Variable { .. } | ExpressionKind::AccessIndex { .. }
                if self.is_place(expr) =>
            {
                let (pointer, _) = self.emit_pointer(expr)?;
                let type_id = self.cache.register_type(self.module, &result_ty);
                let result = self.cache.allocate_id();
                self.out.append(SpirvOp::OpLoad, &[type_id, result, pointer]);
                Ok(result)
            }
            ExpressionKind::AccessIndex {
                expr: base,
                member_indices,
            } => {
                // Non-place base (call result, constructed value): extract.
                let base_value = self.emit_value(base)?;
                let type_id = self.cache.register_type(self.module, &result_ty);
                let result = self.cache.allocate_id();
                let mut operands = vec![type_id, result, base_value];
                operands.extend(member_indices.iter().copied());
                self.out.append(SpirvOp::OpCompositeExtract, &operands);
                Ok(result)
            }
            ExpressionKind::AccessMember { .. } => {
                panic!("member-name access survived SPIR-V lowering")
            }
            ExpressionKind::Assign { left, right, .. } => {
                let (pointer, _) = self.emit_pointer(left)?;
                let value = self.emit_value(right)?;
                self.out.append(SpirvOp::OpStore, &[pointer, value]);
                Ok(value)
            }
            ExpressionKind::Binary { op, left, right } => {
                self.emit_binary(*op, left, right, &result_ty)
            }
            ExpressionKind::Unary { op, expr: inner } => {
                let value = self.emit_value(inner)?;
                let type_id = self.cache.register_type(self.module, &result_ty);
                let opcode = match op {
                    UnaryOp::LogicalNot => SpirvOp::OpLogicalNot,
                    UnaryOp::Minus => match scalar_kind(&result_ty) {
                        ScalarKind::Float => SpirvOp::OpFNegate,
                        ScalarKind::Sint => SpirvOp::OpSNegate,
                        other => panic!("negation of {:?} passed validation", other),
                    },
                };
                let result = self.cache.allocate_id();
                self.out.append(opcode, &[type_id, result, value]);
                Ok(result)
            }
            ExpressionKind::Swizzle {
                expr: base,
                components,
            } => {
                let base_value = self.emit_value(base)?;
                let type_id = self.cache.register_type(self.module, &result_ty);
                let result = self.cache.allocate_id();
                if components.len() == 1 {
                    self.out.append(
                        SpirvOp::OpCompositeExtract,
                        &[type_id, result, base_value, components[0].index()],
                    );
                } else {
                    let mut operands = vec![type_id, result, base_value, base_value];
                    operands.extend(components.iter().map(|c| c.index()));
                    self.out.append(SpirvOp::OpVectorShuffle, &operands);
                }
                Ok(result)
            }
            ExpressionKind::Cast {
                target_type,
                expressions,
            } => self.emit_cast(target_type, expressions),
            ExpressionKind::Call {
                func_index,
                parameters,
                ..
            } => {
                let callee = &self.funcs[&func_index.expect("unresolved call")];
                let callee_id = callee.func_id;
                let return_type_id = callee.return_type_id;
                let mut arguments = Vec::with_capacity(parameters.len());
                for parameter in parameters {
                    arguments.push(self.emit_value(parameter)?);
                }
                let result = self.cache.allocate_id();
                let mut operands = vec![return_type_id, result, callee_id];
                operands.extend(arguments);
                self.out.append(SpirvOp::OpFunctionCall, &operands);
                Ok(result)
            }
            ExpressionKind::Intrinsic {
                intrinsic,
                parameters,
            } => self.emit_intrinsic(*intrinsic, parameters, &result_ty),
            ExpressionKind::Conditional { .. } => {
                panic!("conditional expression survived option resolution")
            }
            ExpressionKind::Identifier(name) => {
                panic!("unresolved identifier '{}' reached the SPIR-V writer", name)
            }
            ExpressionKind::Variable { .. } => unreachable!("covered by the place arm"),
        }
    }

    fn is_place(&self, expr: &Expression) -> bool {
        match &expr.kind {
            ExpressionKind::Variable { .. } => true,
            ExpressionKind::AccessIndex { expr, .. }
            | ExpressionKind::Swizzle { expr, .. } => self.is_place(expr),
            _ => false,
        }
    }

    fn emit_pointer(
        &mut self,
        expr: &Expression,
    ) -> Result<(u32, SpirvStorageClass), CompileError> {
        match &expr.kind {
            ExpressionKind::Variable { var_index } => {
                if let Some(local) = self.data().locals.get(var_index) {
                    return Ok((local.pointer_id, SpirvStorageClass::Function));
                }
                match self.externals.get(var_index) {
                    Some(slot) => Ok((slot.pointer_id, slot.storage)),
                    None => panic!("variable #{} has no slot", var_index),
                }
            }
            ExpressionKind::AccessIndex {
                expr: base,
                member_indices,
            } => {
                let (base_pointer, storage) = self.emit_pointer(base)?;
                let pointer_type_id =
                    self.cache
                        .register_pointer(self.module, expr.resolved_type(), storage);
                let mut operands = vec![pointer_type_id, 0, base_pointer];
                for index in member_indices {
                    operands.push(
                        self.cache
                            .register_i32_constant(self.module, *index as i32),
                    );
                }
                let result = self.cache.allocate_id();
                operands[1] = result;
                self.out.append(SpirvOp::OpAccessChain, &operands);
                Ok((result, storage))
            }
            ExpressionKind::Swizzle {
                expr: base,
                components,
            } => {
                if components.len() != 1 {
                    return Err(CompileError::not_implemented(
                        "stores through multi-component swizzles are not yet implemented",
                    ));
                }
                let (base_pointer, storage) = self.emit_pointer(base)?;
                let pointer_type_id =
                    self.cache
                        .register_pointer(self.module, expr.resolved_type(), storage);
                let index_id = self
                    .cache
                    .register_i32_constant(self.module, components[0].index() as i32);
                let result = self.cache.allocate_id();
                self.out.append(
                    SpirvOp::OpAccessChain,
                    &[pointer_type_id, result, base_pointer, index_id],
                );
                Ok((result, storage))
            }
            _ => panic!("store target {} passed validation", expr.kind_name()),
        }
    }

    fn emit_binary(
        &mut self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        result_ty: &ExpressionType,
    ) -> Result<u32, CompileError> {
        use ExpressionType as T;

        let left_ty = left.resolved_type().clone();
        let right_ty = right.resolved_type().clone();
        let mut left_id = self.emit_value(left)?;
        let mut right_id = self.emit_value(right)?;
        let type_id = self.cache.register_type(self.module, result_ty);

        // Mixed-shape multiplies have dedicated opcodes.
        if op == BinaryOp::Multiply {
            let special = match (&left_ty, &right_ty) {
                (T::Matrix(_), T::Matrix(_)) => Some(SpirvOp::OpMatrixTimesMatrix),
                (T::Matrix(_), T::Vector(_)) => Some(SpirvOp::OpMatrixTimesVector),
                (T::Vector(_), T::Matrix(_)) => Some(SpirvOp::OpVectorTimesMatrix),
                (T::Matrix(_), T::Primitive(_)) => Some(SpirvOp::OpMatrixTimesScalar),
                (T::Primitive(_), T::Matrix(_)) => {
                    std::mem::swap(&mut left_id, &mut right_id);
                    Some(SpirvOp::OpMatrixTimesScalar)
                }
                (T::Vector(v), T::Primitive(_)) if v.component_type == PrimitiveType::Float32 => {
                    Some(SpirvOp::OpVectorTimesScalar)
                }
                (T::Primitive(_), T::Vector(v)) if v.component_type == PrimitiveType::Float32 => {
                    std::mem::swap(&mut left_id, &mut right_id);
                    Some(SpirvOp::OpVectorTimesScalar)
                }
                _ => None,
            };
            if let Some(opcode) = special {
                let result = self.cache.allocate_id();
                self.out.append(opcode, &[type_id, result, left_id, right_id]);
                return Ok(result);
            }
        }

        // Vector-scalar arithmetic without a dedicated opcode: splat the
        // scalar first.
        if let (T::Vector(v), T::Primitive(_)) = (&left_ty, &right_ty) {
            right_id = self.splat(*v, right_id);
        } else if let (T::Primitive(_), T::Vector(v)) = (&left_ty, &right_ty) {
            left_id = self.splat(*v, left_id);
        }

        let kind = scalar_kind(&left_ty);
        let opcode = binary_opcode(op, kind);
        let result = self.cache.allocate_id();
        self.out.append(opcode, &[type_id, result, left_id, right_id]);
        Ok(result)
    }

    fn splat(&mut self, vector: VectorType, scalar_id: u32) -> u32 {
        let type_id = self
            .cache
            .register_type(self.module, &ExpressionType::Vector(vector));
        let result = self.cache.allocate_id();
        let mut operands = vec![type_id, result];
        operands.extend(std::iter::repeat(scalar_id).take(vector.component_count as usize));
        self.out.append(SpirvOp::OpCompositeConstruct, &operands);
        result
    }

    fn emit_cast(
        &mut self,
        target_type: &ExpressionType,
        expressions: &[Expression],
    ) -> Result<u32, CompileError> {
        use ExpressionType as T;

        // Scalar conversion.
        if let (T::Primitive(to), [single]) = (target_type, expressions) {
            let from = match single.resolved_type() {
                T::Primitive(p) => *p,
                other => panic!("scalar cast from {} passed validation", other),
            };
            let value = self.emit_value(single)?;
            if from == *to {
                return Ok(value);
            }
            let opcode = match (from, to) {
                (PrimitiveType::Float32, PrimitiveType::Int32) => SpirvOp::OpConvertFToS,
                (PrimitiveType::Float32, PrimitiveType::UInt32) => SpirvOp::OpConvertFToU,
                (PrimitiveType::Int32, PrimitiveType::Float32) => SpirvOp::OpConvertSToF,
                (PrimitiveType::UInt32, PrimitiveType::Float32) => SpirvOp::OpConvertUToF,
                (PrimitiveType::Int32, PrimitiveType::UInt32)
                | (PrimitiveType::UInt32, PrimitiveType::Int32) => SpirvOp::OpBitcast,
                (from, to) => panic!("conversion {} -> {} passed validation", from, to),
            };
            let type_id = self.cache.register_type(self.module, target_type);
            let result = self.cache.allocate_id();
            self.out.append(opcode, &[type_id, result, value]);
            return Ok(result);
        }

        // Vector/matrix construction.
        let type_id = self.cache.register_type(self.module, target_type);
        let mut components = Vec::with_capacity(expressions.len());
        for expression in expressions {
            components.push(self.emit_value(expression)?);
        }
        let result = self.cache.allocate_id();
        let mut operands = vec![type_id, result];
        operands.extend(components);
        self.out.append(SpirvOp::OpCompositeConstruct, &operands);
        Ok(result)
    }

    fn emit_intrinsic(
        &mut self,
        intrinsic: IntrinsicKind,
        parameters: &[Expression],
        result_ty: &ExpressionType,
    ) -> Result<u32, CompileError> {
        let type_id = self.cache.register_type(self.module, result_ty);
        match intrinsic {
            IntrinsicKind::DotProduct => {
                let a = self.emit_value(&parameters[0])?;
                let b = self.emit_value(&parameters[1])?;
                let result = self.cache.allocate_id();
                self.out.append(SpirvOp::OpDot, &[type_id, result, a, b]);
                Ok(result)
            }
            IntrinsicKind::CrossProduct => {
                let set = self
                    .glsl_ext_id
                    .expect("GLSL.std.450 import missed by the pre-visitor");
                let a = self.emit_value(&parameters[0])?;
                let b = self.emit_value(&parameters[1])?;
                let result = self.cache.allocate_id();
                self.out.append(
                    SpirvOp::OpExtInst,
                    &[type_id, result, set, GLSL_STD_450_CROSS, a, b],
                );
                Ok(result)
            }
            IntrinsicKind::SampleTexture => {
                let sampler = self.emit_value(&parameters[0])?;
                let coords = self.emit_value(&parameters[1])?;
                let result = self.cache.allocate_id();
                self.out.append(
                    SpirvOp::OpImageSampleImplicitLod,
                    &[type_id, result, sampler, coords],
                );
                Ok(result)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScalarKind {
    Bool,
    Float,
    Sint,
    Uint,
}

fn scalar_kind(ty: &ExpressionType) -> ScalarKind {
    let primitive = match ty {
        ExpressionType::Primitive(p) => *p,
        ExpressionType::Vector(v) => v.component_type,
        ExpressionType::Matrix(m) => m.component_type,
        other => panic!("arithmetic on {} passed validation", other),
    };
    match primitive {
        PrimitiveType::Bool => ScalarKind::Bool,
        PrimitiveType::Float32 => ScalarKind::Float,
        PrimitiveType::Int32 => ScalarKind::Sint,
        PrimitiveType::UInt32 => ScalarKind::Uint,
    }
}

fn binary_opcode(op: BinaryOp, kind: ScalarKind) -> SpirvOp {
    use BinaryOp::*;
    use ScalarKind::*;
    match (op, kind) {
        (Add, Float) => SpirvOp::OpFAdd,
        (Add, Sint) | (Add, Uint) => SpirvOp::OpIAdd,
        (Subtract, Float) => SpirvOp::OpFSub,
        (Subtract, Sint) | (Subtract, Uint) => SpirvOp::OpISub,
        (Multiply, Float) => SpirvOp::OpFMul,
        (Multiply, Sint) | (Multiply, Uint) => SpirvOp::OpIMul,
        (Divide, Float) => SpirvOp::OpFDiv,
        (Divide, Sint) => SpirvOp::OpSDiv,
        (Divide, Uint) => SpirvOp::OpUDiv,
        (CompEq, Float) => SpirvOp::OpFOrdEqual,
        (CompNe, Float) => SpirvOp::OpFOrdNotEqual,
        (CompLt, Float) => SpirvOp::OpFOrdLessThan,
        (CompLe, Float) => SpirvOp::OpFOrdLessThanEqual,
        (CompGt, Float) => SpirvOp::OpFOrdGreaterThan,
        (CompGe, Float) => SpirvOp::OpFOrdGreaterThanEqual,
        (CompEq, Sint) | (CompEq, Uint) => SpirvOp::OpIEqual,
        (CompNe, Sint) | (CompNe, Uint) => SpirvOp::OpINotEqual,
        (CompLt, Sint) => SpirvOp::OpSLessThan,
        (CompLe, Sint) => SpirvOp::OpSLessThanEqual,
        (CompGt, Sint) => SpirvOp::OpSGreaterThan,
        (CompGe, Sint) => SpirvOp::OpSGreaterThanEqual,
        (CompLt, Uint) => SpirvOp::OpULessThan,
        (CompLe, Uint) => SpirvOp::OpULessThanEqual,
        (CompGt, Uint) => SpirvOp::OpUGreaterThan,
        (CompGe, Uint) => SpirvOp::OpUGreaterThanEqual,
        (CompEq, Bool) => SpirvOp::OpLogicalEqual,
        (CompNe, Bool) => SpirvOp::OpLogicalNotEqual,
        (op, kind) => panic!("operator {} on {:?} operands passed validation", op, kind),
    }
}
