//! Binary module codec.
//!
//! A bijective mapping between an AST and a versioned byte stream:
//! `[u32 magic][u32 version]` then a recursive tagged node encoding. Writer
//! and reader share one tag table, and every optional child is preceded by a
//! tag so `NONE` cleanly encodes absence. The format is schema-less beyond
//! the tag dispatch: a new node kind is a new tag, existing kinds keep their
//! wire layout.
//!
//! `deserialize_shader(serialize_shader(tree))` reproduces the tree exactly,
//! including attribute values, declaration indices and cached types.

use crate::ast::*;
use crate::diagnostic::CompileError;

/// "GLNT"
pub const MAGIC: u32 = 0x474C_4E54;
pub const VERSION: u32 = 1;

/// Node tags. One shared space for both node families, `NONE` for absent
/// optional children.
mod tag {
    pub const NONE: u8 = 0;

    // Expressions
    pub const ACCESS_MEMBER: u8 = 1;
    pub const ACCESS_INDEX: u8 = 2;
    pub const ASSIGN: u8 = 3;
    pub const BINARY: u8 = 4;
    pub const CALL: u8 = 5;
    pub const CAST: u8 = 6;
    pub const CONDITIONAL_EXPR: u8 = 7;
    pub const CONSTANT: u8 = 8;
    pub const IDENTIFIER: u8 = 9;
    pub const INTRINSIC: u8 = 10;
    pub const SWIZZLE: u8 = 11;
    pub const UNARY: u8 = 12;
    pub const VARIABLE: u8 = 13;

    // Statements
    pub const BRANCH: u8 = 20;
    pub const CONDITIONAL_STMT: u8 = 21;
    pub const DECLARE_EXTERNAL: u8 = 22;
    pub const DECLARE_FUNCTION: u8 = 23;
    pub const DECLARE_STRUCT: u8 = 24;
    pub const DECLARE_VARIABLE: u8 = 25;
    pub const DISCARD: u8 = 26;
    pub const EXPRESSION: u8 = 27;
    pub const FOR: u8 = 28;
    pub const FOR_EACH: u8 = 29;
    pub const MULTI: u8 = 30;
    pub const NO_OP: u8 = 31;
    pub const RETURN: u8 = 32;
    pub const WHILE: u8 = 33;
}

/// Serialize a shader tree to a `.gsb` byte stream.
pub fn serialize_shader(root: &Statement) -> Vec<u8> {
    let mut w = Writer { out: Vec::new() };
    w.u32(MAGIC);
    w.u32(VERSION);
    w.statement(root);
    w.out
}

/// Deserialize a `.gsb` byte stream back into a shader tree.
pub fn deserialize_shader(data: &[u8]) -> Result<Statement, CompileError> {
    let mut r = Reader { data, offset: 0 };

    if r.u32()? != MAGIC {
        return Err(CompileError::format("not a shader module"));
    }
    let version = r.u32()?;
    if version > VERSION {
        return Err(CompileError::format(format!(
            "unsupported module version {} (newest supported is {})",
            version, VERSION
        )));
    }

    match r.opt_statement()? {
        Some(root) => Ok(root),
        None => Err(CompileError::format("empty module")),
    }
}

// ─── Writing ──────────────────────────────────────────────────────

struct Writer {
    out: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.out.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.u32(v.to_bits());
    }

    fn i32(&mut self, v: i32) {
        self.u32(v as u32);
    }

    fn bool(&mut self, v: bool) {
        self.u8(v as u8);
    }

    fn string(&mut self, v: &str) {
        self.u32(v.len() as u32);
        self.out.extend_from_slice(v.as_bytes());
    }

    fn count(&mut self, n: usize) {
        self.u32(n as u32);
    }

    fn opt_index(&mut self, index: Option<u32>) {
        match index {
            Some(v) => {
                self.u8(1);
                self.u32(v);
            }
            None => self.u8(0),
        }
    }

    fn ty(&mut self, ty: &ExpressionType) {
        match ty {
            ExpressionType::Void => self.u8(0),
            ExpressionType::Primitive(p) => {
                self.u8(1);
                self.u8(primitive_to_u8(*p));
            }
            ExpressionType::Identifier(name) => {
                self.u8(2);
                self.string(name);
            }
            ExpressionType::Matrix(m) => {
                self.u8(3);
                self.u32(m.column_count);
                self.u32(m.row_count);
                self.u8(primitive_to_u8(m.component_type));
            }
            ExpressionType::Sampler(s) => {
                self.u8(4);
                self.u8(image_dim_to_u8(s.dim));
                self.u8(primitive_to_u8(s.sampled_type));
            }
            ExpressionType::Struct(index) => {
                self.u8(5);
                self.u32(*index);
            }
            ExpressionType::Uniform(inner) => {
                self.u8(6);
                self.ty(inner);
            }
            ExpressionType::Vector(v) => {
                self.u8(7);
                self.u32(v.component_count);
                self.u8(primitive_to_u8(v.component_type));
            }
        }
    }

    fn opt_type(&mut self, ty: Option<&ExpressionType>) {
        match ty {
            Some(ty) => {
                self.u8(1);
                self.ty(ty);
            }
            None => self.u8(0),
        }
    }

    fn constant(&mut self, value: &ConstantValue) {
        // Variant index then payload, matching the reader's table.
        match value {
            ConstantValue::Bool(v) => {
                self.u32(0);
                self.bool(*v);
            }
            ConstantValue::Float32(v) => {
                self.u32(1);
                self.f32(*v);
            }
            ConstantValue::Int32(v) => {
                self.u32(2);
                self.i32(*v);
            }
            ConstantValue::UInt32(v) => {
                self.u32(3);
                self.u32(*v);
            }
            ConstantValue::Vec2Float(v) => {
                self.u32(4);
                v.iter().for_each(|c| self.f32(*c));
            }
            ConstantValue::Vec3Float(v) => {
                self.u32(5);
                v.iter().for_each(|c| self.f32(*c));
            }
            ConstantValue::Vec4Float(v) => {
                self.u32(6);
                v.iter().for_each(|c| self.f32(*c));
            }
            ConstantValue::Vec2Int(v) => {
                self.u32(7);
                v.iter().for_each(|c| self.i32(*c));
            }
            ConstantValue::Vec3Int(v) => {
                self.u32(8);
                v.iter().for_each(|c| self.i32(*c));
            }
            ConstantValue::Vec4Int(v) => {
                self.u32(9);
                v.iter().for_each(|c| self.i32(*c));
            }
        }
    }

    fn attributes(&mut self, attributes: &[Attribute]) {
        self.count(attributes.len());
        for attribute in attributes {
            self.u8(attribute_kind_to_u8(attribute.kind));
            match &attribute.value {
                AttributeValue::None => self.u8(0),
                AttributeValue::Int(v) => {
                    self.u8(1);
                    self.i64(*v);
                }
                AttributeValue::Str(s) => {
                    self.u8(2);
                    self.string(s);
                }
            }
        }
    }

    fn struct_description(&mut self, desc: &StructDescription) {
        self.string(&desc.name);
        self.count(desc.members.len());
        for member in &desc.members {
            self.string(&member.name);
            self.ty(&member.ty);
            self.attributes(&member.attributes);
        }
    }

    fn opt_expression(&mut self, expr: Option<&Expression>) {
        match expr {
            Some(expr) => self.expression(expr),
            None => self.u8(tag::NONE),
        }
    }

    fn expression(&mut self, expr: &Expression) {
        match &expr.kind {
            ExpressionKind::AccessMember { .. } => self.u8(tag::ACCESS_MEMBER),
            ExpressionKind::AccessIndex { .. } => self.u8(tag::ACCESS_INDEX),
            ExpressionKind::Assign { .. } => self.u8(tag::ASSIGN),
            ExpressionKind::Binary { .. } => self.u8(tag::BINARY),
            ExpressionKind::Call { .. } => self.u8(tag::CALL),
            ExpressionKind::Cast { .. } => self.u8(tag::CAST),
            ExpressionKind::Conditional { .. } => self.u8(tag::CONDITIONAL_EXPR),
            ExpressionKind::Constant(_) => self.u8(tag::CONSTANT),
            ExpressionKind::Identifier(_) => self.u8(tag::IDENTIFIER),
            ExpressionKind::Intrinsic { .. } => self.u8(tag::INTRINSIC),
            ExpressionKind::Swizzle { .. } => self.u8(tag::SWIZZLE),
            ExpressionKind::Unary { .. } => self.u8(tag::UNARY),
            ExpressionKind::Variable { .. } => self.u8(tag::VARIABLE),
        }
        self.opt_type(expr.cached_type.as_ref());

        match &expr.kind {
            ExpressionKind::AccessMember { expr, member_names } => {
                self.expression(expr);
                self.count(member_names.len());
                for name in member_names {
                    self.string(name);
                }
            }
            ExpressionKind::AccessIndex {
                expr,
                member_indices,
            } => {
                self.expression(expr);
                self.count(member_indices.len());
                for index in member_indices {
                    self.u32(*index);
                }
            }
            ExpressionKind::Assign { op, left, right } => {
                self.u8(match op {
                    AssignOp::Simple => 0,
                });
                self.expression(left);
                self.expression(right);
            }
            ExpressionKind::Binary { op, left, right } => {
                self.u8(binary_op_to_u8(*op));
                self.expression(left);
                self.expression(right);
            }
            ExpressionKind::Call {
                function,
                func_index,
                parameters,
            } => {
                self.string(function);
                self.opt_index(*func_index);
                self.count(parameters.len());
                for parameter in parameters {
                    self.expression(parameter);
                }
            }
            ExpressionKind::Cast {
                target_type,
                expressions,
            } => {
                self.ty(target_type);
                self.count(expressions.len());
                for expression in expressions {
                    self.expression(expression);
                }
            }
            ExpressionKind::Conditional {
                condition_name,
                true_path,
                false_path,
            } => {
                self.string(condition_name);
                self.expression(true_path);
                self.expression(false_path);
            }
            ExpressionKind::Constant(value) => self.constant(value),
            ExpressionKind::Identifier(name) => self.string(name),
            ExpressionKind::Intrinsic {
                intrinsic,
                parameters,
            } => {
                self.u8(intrinsic_to_u8(*intrinsic));
                self.count(parameters.len());
                for parameter in parameters {
                    self.expression(parameter);
                }
            }
            ExpressionKind::Swizzle { expr, components } => {
                self.count(components.len());
                self.expression(expr);
                for component in components {
                    self.u8(component.index() as u8);
                }
            }
            ExpressionKind::Unary { op, expr } => {
                self.u8(match op {
                    UnaryOp::Minus => 0,
                    UnaryOp::LogicalNot => 1,
                });
                self.expression(expr);
            }
            ExpressionKind::Variable { var_index } => self.u32(*var_index),
        }
    }

    fn opt_statement(&mut self, stmt: Option<&Statement>) {
        match stmt {
            Some(stmt) => self.statement(stmt),
            None => self.u8(tag::NONE),
        }
    }

    fn statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Branch {
                cond_statements,
                else_statement,
            } => {
                self.u8(tag::BRANCH);
                self.count(cond_statements.len());
                for cond in cond_statements {
                    self.expression(&cond.condition);
                    self.statement(&cond.statement);
                }
                self.opt_statement(else_statement.as_deref());
            }
            Statement::Conditional {
                condition_name,
                statement,
            } => {
                self.u8(tag::CONDITIONAL_STMT);
                self.string(condition_name);
                self.statement(statement);
            }
            Statement::DeclareExternal {
                attributes,
                external_vars,
                var_index,
            } => {
                self.u8(tag::DECLARE_EXTERNAL);
                self.attributes(attributes);
                self.opt_index(*var_index);
                self.count(external_vars.len());
                for var in external_vars {
                    self.string(&var.name);
                    self.ty(&var.ty);
                    self.attributes(&var.attributes);
                }
            }
            Statement::DeclareFunction(func) => {
                self.u8(tag::DECLARE_FUNCTION);
                self.string(&func.name);
                self.ty(&func.return_type);
                self.attributes(&func.attributes);
                self.opt_index(func.func_index);
                self.opt_index(func.var_index);
                self.count(func.parameters.len());
                for parameter in &func.parameters {
                    self.string(&parameter.name);
                    self.ty(&parameter.ty);
                }
                self.count(func.statements.len());
                for statement in &func.statements {
                    self.statement(statement);
                }
            }
            Statement::DeclareStruct {
                description,
                struct_index,
            } => {
                self.u8(tag::DECLARE_STRUCT);
                self.opt_index(*struct_index);
                self.struct_description(description);
            }
            Statement::DeclareVariable {
                name,
                var_type,
                initial,
                var_index,
            } => {
                self.u8(tag::DECLARE_VARIABLE);
                self.string(name);
                self.ty(var_type);
                self.opt_index(*var_index);
                self.opt_expression(initial.as_ref());
            }
            Statement::Discard => self.u8(tag::DISCARD),
            Statement::Expression(expr) => {
                self.u8(tag::EXPRESSION);
                self.expression(expr);
            }
            Statement::For {
                var_name,
                from,
                to,
                step,
                body,
                var_index,
            } => {
                self.u8(tag::FOR);
                self.string(var_name);
                self.opt_index(*var_index);
                self.expression(from);
                self.expression(to);
                self.opt_expression(step.as_ref());
                self.statement(body);
            }
            Statement::ForEach {
                var_name,
                expr,
                body,
                var_index,
            } => {
                self.u8(tag::FOR_EACH);
                self.string(var_name);
                self.opt_index(*var_index);
                self.expression(expr);
                self.statement(body);
            }
            Statement::Multi(statements) => {
                self.u8(tag::MULTI);
                self.count(statements.len());
                for statement in statements {
                    self.statement(statement);
                }
            }
            Statement::NoOp => self.u8(tag::NO_OP),
            Statement::Return(expr) => {
                self.u8(tag::RETURN);
                self.opt_expression(expr.as_ref());
            }
            Statement::While { condition, body } => {
                self.u8(tag::WHILE);
                self.expression(condition);
                self.statement(body);
            }
        }
    }
}

// ─── Reading ──────────────────────────────────────────────────────

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

fn corrupt(detail: impl std::fmt::Display) -> CompileError {
    CompileError::format(format!("corrupt module stream: {}", detail))
}

impl Reader<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], CompileError> {
        if self.offset + n > self.data.len() {
            return Err(corrupt("unexpected end of data"));
        }
        let bytes = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, CompileError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, CompileError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4 bytes")))
    }

    fn i64(&mut self) -> Result<i64, CompileError> {
        let bytes = self.take(8)?;
        Ok(i64::from_le_bytes(bytes.try_into().expect("8 bytes")))
    }

    fn f32(&mut self) -> Result<f32, CompileError> {
        Ok(f32::from_bits(self.u32()?))
    }

    fn i32(&mut self) -> Result<i32, CompileError> {
        Ok(self.u32()? as i32)
    }

    fn bool(&mut self) -> Result<bool, CompileError> {
        Ok(self.u8()? != 0)
    }

    fn string(&mut self) -> Result<String, CompileError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| corrupt("invalid utf-8 in string"))
    }

    fn count(&mut self) -> Result<usize, CompileError> {
        let count = self.u32()? as usize;
        // Every element takes at least one byte; a count beyond the
        // remaining data is corruption, not a huge allocation.
        if count > self.data.len() - self.offset {
            return Err(corrupt("container length exceeds the stream"));
        }
        Ok(count)
    }

    fn opt_index(&mut self) -> Result<Option<u32>, CompileError> {
        match self.u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.u32()?)),
            other => Err(corrupt(format!("invalid index presence byte {}", other))),
        }
    }

    fn ty(&mut self) -> Result<ExpressionType, CompileError> {
        match self.u8()? {
            0 => Ok(ExpressionType::Void),
            1 => Ok(ExpressionType::Primitive(primitive_from_u8(self.u8()?)?)),
            2 => Ok(ExpressionType::Identifier(self.string()?)),
            3 => {
                let column_count = self.u32()?;
                let row_count = self.u32()?;
                let component_type = primitive_from_u8(self.u8()?)?;
                Ok(ExpressionType::Matrix(MatrixType {
                    column_count,
                    row_count,
                    component_type,
                }))
            }
            4 => {
                let dim = image_dim_from_u8(self.u8()?)?;
                let sampled_type = primitive_from_u8(self.u8()?)?;
                Ok(ExpressionType::Sampler(SamplerType { dim, sampled_type }))
            }
            5 => Ok(ExpressionType::Struct(self.u32()?)),
            6 => Ok(ExpressionType::Uniform(Box::new(self.ty()?))),
            7 => {
                let component_count = self.u32()?;
                let component_type = primitive_from_u8(self.u8()?)?;
                Ok(ExpressionType::Vector(VectorType {
                    component_count,
                    component_type,
                }))
            }
            other => Err(corrupt(format!("unknown type tag {}", other))),
        }
    }

    fn opt_type(&mut self) -> Result<Option<ExpressionType>, CompileError> {
        match self.u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.ty()?)),
            other => Err(corrupt(format!("invalid type presence byte {}", other))),
        }
    }

    fn constant(&mut self) -> Result<ConstantValue, CompileError> {
        Ok(match self.u32()? {
            0 => ConstantValue::Bool(self.bool()?),
            1 => ConstantValue::Float32(self.f32()?),
            2 => ConstantValue::Int32(self.i32()?),
            3 => ConstantValue::UInt32(self.u32()?),
            4 => ConstantValue::Vec2Float([self.f32()?, self.f32()?]),
            5 => ConstantValue::Vec3Float([self.f32()?, self.f32()?, self.f32()?]),
            6 => ConstantValue::Vec4Float([self.f32()?, self.f32()?, self.f32()?, self.f32()?]),
            7 => ConstantValue::Vec2Int([self.i32()?, self.i32()?]),
            8 => ConstantValue::Vec3Int([self.i32()?, self.i32()?, self.i32()?]),
            9 => ConstantValue::Vec4Int([self.i32()?, self.i32()?, self.i32()?, self.i32()?]),
            other => return Err(corrupt(format!("unknown constant tag {}", other))),
        })
    }

    fn attributes(&mut self) -> Result<Vec<Attribute>, CompileError> {
        let count = self.count()?;
        let mut attributes = Vec::with_capacity(count);
        for _ in 0..count {
            let kind = attribute_kind_from_u8(self.u8()?)?;
            let value = match self.u8()? {
                0 => AttributeValue::None,
                1 => AttributeValue::Int(self.i64()?),
                2 => AttributeValue::Str(self.string()?),
                other => return Err(corrupt(format!("unknown attribute value tag {}", other))),
            };
            attributes.push(Attribute { kind, value });
        }
        Ok(attributes)
    }

    fn struct_description(&mut self) -> Result<StructDescription, CompileError> {
        let name = self.string()?;
        let count = self.count()?;
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            members.push(StructMember {
                name: self.string()?,
                ty: self.ty()?,
                attributes: self.attributes()?,
            });
        }
        Ok(StructDescription { name, members })
    }

    fn expression(&mut self) -> Result<Expression, CompileError> {
        match self.opt_expression()? {
            Some(expr) => Ok(expr),
            None => Err(corrupt("expected an expression, found none")),
        }
    }

    fn opt_expression(&mut self) -> Result<Option<Expression>, CompileError> {
        let node_tag = self.u8()?;
        if node_tag == tag::NONE {
            return Ok(None);
        }
        let cached_type = self.opt_type()?;

        let kind = match node_tag {
            tag::ACCESS_MEMBER => {
                let expr = Box::new(self.expression()?);
                let count = self.count()?;
                let mut member_names = Vec::with_capacity(count);
                for _ in 0..count {
                    member_names.push(self.string()?);
                }
                ExpressionKind::AccessMember { expr, member_names }
            }
            tag::ACCESS_INDEX => {
                let expr = Box::new(self.expression()?);
                let count = self.count()?;
                let mut member_indices = Vec::with_capacity(count);
                for _ in 0..count {
                    member_indices.push(self.u32()?);
                }
                ExpressionKind::AccessIndex {
                    expr,
                    member_indices,
                }
            }
            tag::ASSIGN => {
                let op = match self.u8()? {
                    0 => AssignOp::Simple,
                    other => return Err(corrupt(format!("unknown assign op {}", other))),
                };
                ExpressionKind::Assign {
                    op,
                    left: Box::new(self.expression()?),
                    right: Box::new(self.expression()?),
                }
            }
            tag::BINARY => {
                let op = binary_op_from_u8(self.u8()?)?;
                ExpressionKind::Binary {
                    op,
                    left: Box::new(self.expression()?),
                    right: Box::new(self.expression()?),
                }
            }
            tag::CALL => {
                let function = self.string()?;
                let func_index = self.opt_index()?;
                let count = self.count()?;
                let mut parameters = Vec::with_capacity(count);
                for _ in 0..count {
                    parameters.push(self.expression()?);
                }
                ExpressionKind::Call {
                    function,
                    func_index,
                    parameters,
                }
            }
            tag::CAST => {
                let target_type = self.ty()?;
                let count = self.count()?;
                let mut expressions = Vec::with_capacity(count);
                for _ in 0..count {
                    expressions.push(self.expression()?);
                }
                ExpressionKind::Cast {
                    target_type,
                    expressions,
                }
            }
            tag::CONDITIONAL_EXPR => ExpressionKind::Conditional {
                condition_name: self.string()?,
                true_path: Box::new(self.expression()?),
                false_path: Box::new(self.expression()?),
            },
            tag::CONSTANT => ExpressionKind::Constant(self.constant()?),
            tag::IDENTIFIER => ExpressionKind::Identifier(self.string()?),
            tag::INTRINSIC => {
                let intrinsic = intrinsic_from_u8(self.u8()?)?;
                let count = self.count()?;
                let mut parameters = Vec::with_capacity(count);
                for _ in 0..count {
                    parameters.push(self.expression()?);
                }
                ExpressionKind::Intrinsic {
                    intrinsic,
                    parameters,
                }
            }
            tag::SWIZZLE => {
                let count = self.count()?;
                if count == 0 || count > 4 {
                    return Err(corrupt(format!("swizzle with {} components", count)));
                }
                let expr = Box::new(self.expression()?);
                let mut components = Vec::with_capacity(count);
                for _ in 0..count {
                    components.push(match self.u8()? {
                        0 => SwizzleComponent::First,
                        1 => SwizzleComponent::Second,
                        2 => SwizzleComponent::Third,
                        3 => SwizzleComponent::Fourth,
                        other => {
                            return Err(corrupt(format!("unknown swizzle component {}", other)))
                        }
                    });
                }
                ExpressionKind::Swizzle { expr, components }
            }
            tag::UNARY => {
                let op = match self.u8()? {
                    0 => UnaryOp::Minus,
                    1 => UnaryOp::LogicalNot,
                    other => return Err(corrupt(format!("unknown unary op {}", other))),
                };
                ExpressionKind::Unary {
                    op,
                    expr: Box::new(self.expression()?),
                }
            }
            tag::VARIABLE => ExpressionKind::Variable {
                var_index: self.u32()?,
            },
            other => return Err(corrupt(format!("unknown node tag {}", other))),
        };

        Ok(Some(Expression { kind, cached_type }))
    }

    fn statement(&mut self) -> Result<Statement, CompileError> {
        match self.opt_statement()? {
            Some(stmt) => Ok(stmt),
            None => Err(corrupt("expected a statement, found none")),
        }
    }

    fn opt_statement(&mut self) -> Result<Option<Statement>, CompileError> {
        let node_tag = self.u8()?;
        let stmt = match node_tag {
            tag::NONE => return Ok(None),
            tag::BRANCH => {
                let count = self.count()?;
                let mut cond_statements = Vec::with_capacity(count);
                for _ in 0..count {
                    cond_statements.push(CondStatement {
                        condition: self.expression()?,
                        statement: self.statement()?,
                    });
                }
                Statement::Branch {
                    cond_statements,
                    else_statement: self.opt_statement()?.map(Box::new),
                }
            }
            tag::CONDITIONAL_STMT => Statement::Conditional {
                condition_name: self.string()?,
                statement: Box::new(self.statement()?),
            },
            tag::DECLARE_EXTERNAL => {
                let attributes = self.attributes()?;
                let var_index = self.opt_index()?;
                let count = self.count()?;
                let mut external_vars = Vec::with_capacity(count);
                for _ in 0..count {
                    external_vars.push(ExternalVar {
                        name: self.string()?,
                        ty: self.ty()?,
                        attributes: self.attributes()?,
                    });
                }
                Statement::DeclareExternal {
                    attributes,
                    external_vars,
                    var_index,
                }
            }
            tag::DECLARE_FUNCTION => {
                let name = self.string()?;
                let return_type = self.ty()?;
                let attributes = self.attributes()?;
                let func_index = self.opt_index()?;
                let var_index = self.opt_index()?;
                let param_count = self.count()?;
                let mut parameters = Vec::with_capacity(param_count);
                for _ in 0..param_count {
                    parameters.push(Parameter {
                        name: self.string()?,
                        ty: self.ty()?,
                    });
                }
                let statement_count = self.count()?;
                let mut statements = Vec::with_capacity(statement_count);
                for _ in 0..statement_count {
                    statements.push(self.statement()?);
                }
                Statement::DeclareFunction(DeclareFunction {
                    name,
                    parameters,
                    return_type,
                    attributes,
                    statements,
                    func_index,
                    var_index,
                })
            }
            tag::DECLARE_STRUCT => {
                let struct_index = self.opt_index()?;
                Statement::DeclareStruct {
                    description: self.struct_description()?,
                    struct_index,
                }
            }
            tag::DECLARE_VARIABLE => {
                let name = self.string()?;
                let var_type = self.ty()?;
                let var_index = self.opt_index()?;
                let initial = self.opt_expression()?;
                Statement::DeclareVariable {
                    name,
                    var_type,
                    initial,
                    var_index,
                }
            }
            tag::DISCARD => Statement::Discard,
            tag::EXPRESSION => Statement::Expression(self.expression()?),
            tag::FOR => {
                let var_name = self.string()?;
                let var_index = self.opt_index()?;
                let from = self.expression()?;
                let to = self.expression()?;
                let step = self.opt_expression()?;
                let body = Box::new(self.statement()?);
                Statement::For {
                    var_name,
                    from,
                    to,
                    step,
                    body,
                    var_index,
                }
            }
            tag::FOR_EACH => {
                let var_name = self.string()?;
                let var_index = self.opt_index()?;
                let expr = self.expression()?;
                let body = Box::new(self.statement()?);
                Statement::ForEach {
                    var_name,
                    expr,
                    body,
                    var_index,
                }
            }
            tag::MULTI => {
                let count = self.count()?;
                let mut statements = Vec::with_capacity(count);
                for _ in 0..count {
                    statements.push(self.statement()?);
                }
                Statement::Multi(statements)
            }
            tag::NO_OP => Statement::NoOp,
            tag::RETURN => Statement::Return(self.opt_expression()?),
            tag::WHILE => Statement::While {
                condition: self.expression()?,
                body: Box::new(self.statement()?),
            },
            other => return Err(corrupt(format!("unknown node tag {}", other))),
        };
        Ok(Some(stmt))
    }
}

// ─── Enum tables (shared between writer and reader) ──────────────

fn primitive_to_u8(p: PrimitiveType) -> u8 {
    match p {
        PrimitiveType::Bool => 0,
        PrimitiveType::Float32 => 1,
        PrimitiveType::Int32 => 2,
        PrimitiveType::UInt32 => 3,
    }
}

fn primitive_from_u8(v: u8) -> Result<PrimitiveType, CompileError> {
    Ok(match v {
        0 => PrimitiveType::Bool,
        1 => PrimitiveType::Float32,
        2 => PrimitiveType::Int32,
        3 => PrimitiveType::UInt32,
        other => return Err(corrupt(format!("unknown primitive type {}", other))),
    })
}

fn image_dim_to_u8(dim: ImageDim) -> u8 {
    match dim {
        ImageDim::Dim1D => 0,
        ImageDim::Dim1DArray => 1,
        ImageDim::Dim2D => 2,
        ImageDim::Dim2DArray => 3,
        ImageDim::Dim3D => 4,
        ImageDim::Cubemap => 5,
    }
}

fn image_dim_from_u8(v: u8) -> Result<ImageDim, CompileError> {
    Ok(match v {
        0 => ImageDim::Dim1D,
        1 => ImageDim::Dim1DArray,
        2 => ImageDim::Dim2D,
        3 => ImageDim::Dim2DArray,
        4 => ImageDim::Dim3D,
        5 => ImageDim::Cubemap,
        other => return Err(corrupt(format!("unknown image dimension {}", other))),
    })
}

fn attribute_kind_to_u8(kind: AttributeKind) -> u8 {
    match kind {
        AttributeKind::Binding => 0,
        AttributeKind::Builtin => 1,
        AttributeKind::Entry => 2,
        AttributeKind::Layout => 3,
        AttributeKind::Location => 4,
    }
}

fn attribute_kind_from_u8(v: u8) -> Result<AttributeKind, CompileError> {
    Ok(match v {
        0 => AttributeKind::Binding,
        1 => AttributeKind::Builtin,
        2 => AttributeKind::Entry,
        3 => AttributeKind::Layout,
        4 => AttributeKind::Location,
        other => return Err(corrupt(format!("unknown attribute kind {}", other))),
    })
}

fn binary_op_to_u8(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Add => 0,
        BinaryOp::Subtract => 1,
        BinaryOp::Multiply => 2,
        BinaryOp::Divide => 3,
        BinaryOp::CompEq => 4,
        BinaryOp::CompGe => 5,
        BinaryOp::CompGt => 6,
        BinaryOp::CompLe => 7,
        BinaryOp::CompLt => 8,
        BinaryOp::CompNe => 9,
    }
}

fn binary_op_from_u8(v: u8) -> Result<BinaryOp, CompileError> {
    Ok(match v {
        0 => BinaryOp::Add,
        1 => BinaryOp::Subtract,
        2 => BinaryOp::Multiply,
        3 => BinaryOp::Divide,
        4 => BinaryOp::CompEq,
        5 => BinaryOp::CompGe,
        6 => BinaryOp::CompGt,
        7 => BinaryOp::CompLe,
        8 => BinaryOp::CompLt,
        9 => BinaryOp::CompNe,
        other => return Err(corrupt(format!("unknown binary op {}", other))),
    })
}

fn intrinsic_to_u8(i: IntrinsicKind) -> u8 {
    match i {
        IntrinsicKind::CrossProduct => 0,
        IntrinsicKind::DotProduct => 1,
        IntrinsicKind::SampleTexture => 2,
    }
}

fn intrinsic_from_u8(v: u8) -> Result<IntrinsicKind, CompileError> {
    Ok(match v {
        0 => IntrinsicKind::CrossProduct,
        1 => IntrinsicKind::DotProduct,
        2 => IntrinsicKind::SampleTexture,
        other => return Err(corrupt(format!("unknown intrinsic {}", other))),
    })
}
