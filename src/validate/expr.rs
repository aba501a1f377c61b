//! Expression validation: bottom-up type inference.
//!
//! Children are validated first; each node's type is computed from its
//! children's cached types and stored in the node's own cache. Identifier
//! references are rewritten to resolved `Variable` nodes along the way.

use super::Validator;
use crate::ast::*;
use crate::diagnostic::CompileError;
use crate::visit::ScopeEntry;

impl Validator {
    pub(super) fn validate_expression(
        &mut self,
        expr: &Expression,
    ) -> Result<Expression, CompileError> {
        match &expr.kind {
            ExpressionKind::AccessMember { expr, member_names } => {
                let base = self.validate_expression(expr)?;
                let mut ty = base.resolved_type().clone();
                for name in member_names {
                    ty = self.member_type(&ty, name)?;
                }
                Ok(Expression::typed(
                    ExpressionKind::AccessMember {
                        expr: Box::new(base),
                        member_names: member_names.clone(),
                    },
                    ty,
                ))
            }
            ExpressionKind::AccessIndex {
                expr,
                member_indices,
            } => {
                let base = self.validate_expression(expr)?;
                let mut ty = base.resolved_type().clone();
                for index in member_indices {
                    ty = self.member_type_by_index(&ty, *index)?;
                }
                Ok(Expression::typed(
                    ExpressionKind::AccessIndex {
                        expr: Box::new(base),
                        member_indices: member_indices.clone(),
                    },
                    ty,
                ))
            }
            ExpressionKind::Assign { op, left, right } => {
                let left = self.validate_expression(left)?;
                if !is_place_expression(&left) {
                    return Err(CompileError::semantic(format!(
                        "cannot assign to a {}",
                        left.kind_name()
                    )));
                }
                let right = self.validate_expression(right)?;
                let left_ty = left.resolved_type().clone();
                if right.resolved_type() != &left_ty {
                    return Err(CompileError::semantic(format!(
                        "cannot assign a value of type {} to a place of type {}",
                        right.resolved_type(),
                        left_ty
                    )));
                }
                Ok(Expression::typed(
                    ExpressionKind::Assign {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    left_ty,
                ))
            }
            ExpressionKind::Binary { op, left, right } => {
                let left = self.validate_expression(left)?;
                let right = self.validate_expression(right)?;
                let ty = binary_result_type(
                    *op,
                    left.resolved_type(),
                    right.resolved_type(),
                )?;
                Ok(Expression::typed(
                    ExpressionKind::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    ty,
                ))
            }
            ExpressionKind::Call {
                function,
                parameters,
                ..
            } => {
                let func_index = match self.scopes.lookup(function) {
                    Some(ScopeEntry::Function { func_index }) => *func_index,
                    Some(_) => {
                        return Err(CompileError::semantic(format!(
                            "'{}' is not a function",
                            function
                        )))
                    }
                    None => {
                        return Err(CompileError::semantic(format!(
                            "unknown function '{}'",
                            function
                        )))
                    }
                };
                let data = self.functions[&func_index].clone();
                if parameters.len() != data.parameters.len() {
                    return Err(CompileError::semantic(format!(
                        "'{}' takes {} parameter(s), {} given",
                        function,
                        data.parameters.len(),
                        parameters.len()
                    )));
                }
                let mut resolved = Vec::with_capacity(parameters.len());
                for (argument, parameter) in parameters.iter().zip(&data.parameters) {
                    let argument = self.validate_expression(argument)?;
                    if argument.resolved_type() != &parameter.ty {
                        return Err(CompileError::semantic(format!(
                            "parameter '{}' of '{}' expects {}, got {}",
                            parameter.name,
                            function,
                            parameter.ty,
                            argument.resolved_type()
                        )));
                    }
                    resolved.push(argument);
                }
                if let Some(caller) = self.current_func_index {
                    self.call_graph.entry(caller).or_default().push(func_index);
                }
                Ok(Expression::typed(
                    ExpressionKind::Call {
                        function: function.clone(),
                        func_index: Some(func_index),
                        parameters: resolved,
                    },
                    data.return_type.clone(),
                ))
            }
            ExpressionKind::Cast {
                target_type,
                expressions,
            } => {
                let target_type = self.resolve_type(target_type)?;
                let mut resolved = Vec::with_capacity(expressions.len());
                for expression in expressions {
                    resolved.push(self.validate_expression(expression)?);
                }
                check_cast(&target_type, &resolved)?;
                Ok(Expression::typed(
                    ExpressionKind::Cast {
                        target_type: target_type.clone(),
                        expressions: resolved,
                    },
                    target_type,
                ))
            }
            ExpressionKind::Conditional {
                condition_name,
                true_path,
                false_path,
            } => {
                if condition_name.is_empty() {
                    return Err(CompileError::semantic(
                        "conditional expression with empty option name",
                    ));
                }
                let true_path = self.validate_expression(true_path)?;
                let false_path = self.validate_expression(false_path)?;
                let ty = true_path.resolved_type().clone();
                if false_path.resolved_type() != &ty {
                    return Err(CompileError::semantic(format!(
                        "conditional paths disagree: {} vs {}",
                        ty,
                        false_path.resolved_type()
                    )));
                }
                Ok(Expression::typed(
                    ExpressionKind::Conditional {
                        condition_name: condition_name.clone(),
                        true_path: Box::new(true_path),
                        false_path: Box::new(false_path),
                    },
                    ty,
                ))
            }
            ExpressionKind::Constant(value) => Ok(Expression::typed(
                ExpressionKind::Constant(value.clone()),
                value.expression_type(),
            )),
            ExpressionKind::Identifier(name) => match self.scopes.lookup(name) {
                Some(ScopeEntry::Variable { var_index, ty })
                | Some(ScopeEntry::External { var_index, ty }) => Ok(Expression::typed(
                    ExpressionKind::Variable {
                        var_index: *var_index,
                    },
                    ty.clone(),
                )),
                Some(_) => Err(CompileError::semantic(format!(
                    "'{}' is not a value",
                    name
                ))),
                None => Err(CompileError::semantic(format!(
                    "unknown identifier '{}'",
                    name
                ))),
            },
            ExpressionKind::Intrinsic {
                intrinsic,
                parameters,
            } => {
                let mut resolved = Vec::with_capacity(parameters.len());
                for parameter in parameters {
                    resolved.push(self.validate_expression(parameter)?);
                }
                let ty = intrinsic_result_type(*intrinsic, &resolved)?;
                Ok(Expression::typed(
                    ExpressionKind::Intrinsic {
                        intrinsic: *intrinsic,
                        parameters: resolved,
                    },
                    ty,
                ))
            }
            ExpressionKind::Swizzle { expr, components } => {
                assert!(
                    !components.is_empty() && components.len() <= 4,
                    "swizzle with {} components reached validation",
                    components.len()
                );
                let base = self.validate_expression(expr)?;
                let vector = match base.resolved_type() {
                    ExpressionType::Vector(v) => *v,
                    other => {
                        return Err(CompileError::semantic(format!(
                            "cannot swizzle a value of type {}",
                            other
                        )))
                    }
                };
                for component in components {
                    if component.index() >= vector.component_count {
                        return Err(CompileError::semantic(format!(
                            "swizzle component out of range for vec{}",
                            vector.component_count
                        )));
                    }
                }
                let ty = if components.len() == 1 {
                    ExpressionType::Primitive(vector.component_type)
                } else {
                    ExpressionType::Vector(VectorType {
                        component_count: components.len() as u32,
                        component_type: vector.component_type,
                    })
                };
                Ok(Expression::typed(
                    ExpressionKind::Swizzle {
                        expr: Box::new(base),
                        components: components.clone(),
                    },
                    ty,
                ))
            }
            ExpressionKind::Unary { op, expr } => {
                let inner = self.validate_expression(expr)?;
                let ty = unary_result_type(*op, inner.resolved_type())?;
                Ok(Expression::typed(
                    ExpressionKind::Unary {
                        op: *op,
                        expr: Box::new(inner),
                    },
                    ty,
                ))
            }
            ExpressionKind::Variable { var_index } => {
                let ty = self.variables.get(var_index).cloned().ok_or_else(|| {
                    CompileError::semantic(format!(
                        "variable reference #{} has no declaration",
                        var_index
                    ))
                })?;
                Ok(Expression::typed(
                    ExpressionKind::Variable {
                        var_index: *var_index,
                    },
                    ty,
                ))
            }
        }
    }

    /// Type of `base.name`; unwraps uniform blocks transparently.
    fn member_type(
        &self,
        base: &ExpressionType,
        name: &str,
    ) -> Result<ExpressionType, CompileError> {
        let struct_index = self.expect_struct(base)?;
        let desc = &self.structs[&struct_index];
        desc.members
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.ty.clone())
            .ok_or_else(|| {
                CompileError::semantic(format!(
                    "struct '{}' has no member '{}'",
                    desc.name, name
                ))
            })
    }

    fn member_type_by_index(
        &self,
        base: &ExpressionType,
        index: u32,
    ) -> Result<ExpressionType, CompileError> {
        let struct_index = self.expect_struct(base)?;
        let desc = &self.structs[&struct_index];
        desc.members
            .get(index as usize)
            .map(|m| m.ty.clone())
            .ok_or_else(|| {
                CompileError::semantic(format!(
                    "struct '{}' has no member #{}",
                    desc.name, index
                ))
            })
    }

    fn expect_struct(&self, ty: &ExpressionType) -> Result<u32, CompileError> {
        match ty {
            ExpressionType::Struct(index) => Ok(*index),
            ExpressionType::Uniform(inner) => self.expect_struct(inner),
            other => Err(CompileError::semantic(format!(
                "member access on non-struct type {}",
                other
            ))),
        }
    }
}

/// Can this expression appear on the left of an assignment?
fn is_place_expression(expr: &Expression) -> bool {
    match &expr.kind {
        ExpressionKind::Variable { .. } => true,
        ExpressionKind::AccessMember { expr, .. }
        | ExpressionKind::AccessIndex { expr, .. }
        | ExpressionKind::Swizzle { expr, .. } => is_place_expression(expr),
        _ => false,
    }
}

/// Result type of a binary operation, or a type-mismatch error.
/// Shared with the constant folder so folding never changes meaning.
pub(crate) fn binary_result_type(
    op: BinaryOp,
    left: &ExpressionType,
    right: &ExpressionType,
) -> Result<ExpressionType, CompileError> {
    use ExpressionType as T;

    let mismatch = || {
        CompileError::semantic(format!(
            "cannot apply {} to {} and {}",
            op, left, right
        ))
    };

    if op.is_comparison() {
        // Comparisons work on matching scalars; equality also on bool.
        return match (left, right) {
            (T::Primitive(a), T::Primitive(b)) if a == b => {
                let ordered = !matches!(a, PrimitiveType::Bool);
                let equality = matches!(op, BinaryOp::CompEq | BinaryOp::CompNe);
                if ordered || equality {
                    Ok(T::Primitive(PrimitiveType::Bool))
                } else {
                    Err(mismatch())
                }
            }
            _ => Err(mismatch()),
        };
    }

    match (left, right) {
        // Scalar op scalar.
        (T::Primitive(a), T::Primitive(b)) if a == b && *a != PrimitiveType::Bool => {
            Ok(T::Primitive(*a))
        }
        // Component-wise vector arithmetic.
        (T::Vector(a), T::Vector(b)) if a == b && a.component_type != PrimitiveType::Bool => {
            Ok(T::Vector(*a))
        }
        // Vector and scalar (scale/divide), either order for multiply.
        (T::Vector(v), T::Primitive(s))
            if v.component_type == *s
                && matches!(op, BinaryOp::Multiply | BinaryOp::Divide) =>
        {
            Ok(T::Vector(*v))
        }
        (T::Primitive(s), T::Vector(v))
            if v.component_type == *s && op == BinaryOp::Multiply =>
        {
            Ok(T::Vector(*v))
        }
        // Matrix algebra (multiply only).
        (T::Matrix(a), T::Matrix(b))
            if op == BinaryOp::Multiply
                && a.component_type == b.component_type
                && a.column_count == b.row_count =>
        {
            Ok(T::Matrix(MatrixType {
                column_count: b.column_count,
                row_count: a.row_count,
                component_type: a.component_type,
            }))
        }
        (T::Matrix(m), T::Vector(v))
            if op == BinaryOp::Multiply
                && m.component_type == v.component_type
                && m.column_count == v.component_count =>
        {
            Ok(T::Vector(VectorType {
                component_count: m.row_count,
                component_type: m.component_type,
            }))
        }
        (T::Vector(v), T::Matrix(m))
            if op == BinaryOp::Multiply
                && m.component_type == v.component_type
                && m.row_count == v.component_count =>
        {
            Ok(T::Vector(VectorType {
                component_count: m.column_count,
                component_type: m.component_type,
            }))
        }
        (T::Matrix(m), T::Primitive(s))
            if m.component_type == *s && op == BinaryOp::Multiply =>
        {
            Ok(T::Matrix(*m))
        }
        (T::Primitive(s), T::Matrix(m))
            if m.component_type == *s && op == BinaryOp::Multiply =>
        {
            Ok(T::Matrix(*m))
        }
        _ => Err(mismatch()),
    }
}

pub(crate) fn unary_result_type(
    op: UnaryOp,
    operand: &ExpressionType,
) -> Result<ExpressionType, CompileError> {
    use ExpressionType as T;
    match op {
        UnaryOp::Minus => match operand {
            T::Primitive(PrimitiveType::Float32) | T::Primitive(PrimitiveType::Int32) => {
                Ok(operand.clone())
            }
            T::Vector(v) if v.component_type != PrimitiveType::Bool
                && v.component_type != PrimitiveType::UInt32 =>
            {
                Ok(operand.clone())
            }
            _ => Err(CompileError::semantic(format!(
                "cannot negate a value of type {}",
                operand
            ))),
        },
        UnaryOp::LogicalNot => match operand {
            T::Primitive(PrimitiveType::Bool) => Ok(operand.clone()),
            _ => Err(CompileError::semantic(format!(
                "cannot apply ! to a value of type {}",
                operand
            ))),
        },
    }
}

/// Validate a constructor/conversion expression against its target type.
fn check_cast(target: &ExpressionType, expressions: &[Expression]) -> Result<(), CompileError> {
    use ExpressionType as T;

    if expressions.is_empty() {
        return Err(CompileError::semantic(format!(
            "cannot construct {} from nothing",
            target
        )));
    }

    match target {
        // Scalar conversion from a single numeric scalar. Bool converts to
        // nothing and nothing converts to bool.
        T::Primitive(to) => {
            if expressions.len() != 1 {
                return Err(CompileError::semantic(format!(
                    "scalar cast to {} takes exactly one argument",
                    target
                )));
            }
            match expressions[0].resolved_type() {
                T::Primitive(from)
                    if from == to
                        || (*from != PrimitiveType::Bool && *to != PrimitiveType::Bool) =>
                {
                    Ok(())
                }
                other => Err(CompileError::semantic(format!(
                    "cannot convert {} to {}",
                    other, target
                ))),
            }
        }
        // Vector construction: component counts add up, scalar types match.
        T::Vector(v) => {
            let mut total = 0;
            for expression in expressions {
                total += match expression.resolved_type() {
                    T::Primitive(p) if *p == v.component_type => 1,
                    T::Vector(inner) if inner.component_type == v.component_type => {
                        inner.component_count
                    }
                    other => {
                        return Err(CompileError::semantic(format!(
                            "cannot use a {} component in a {} constructor",
                            other, target
                        )))
                    }
                };
            }
            if total != v.component_count {
                return Err(CompileError::semantic(format!(
                    "{} constructor needs {} components, got {}",
                    target, v.component_count, total
                )));
            }
            Ok(())
        }
        // Matrix construction from column vectors.
        T::Matrix(m) => {
            if expressions.len() != m.column_count as usize {
                return Err(CompileError::semantic(format!(
                    "{} constructor needs {} column vectors, got {} argument(s)",
                    target,
                    m.column_count,
                    expressions.len()
                )));
            }
            for expression in expressions {
                match expression.resolved_type() {
                    T::Vector(v)
                        if v.component_count == m.row_count
                            && v.component_type == m.component_type => {}
                    other => {
                        return Err(CompileError::semantic(format!(
                            "{} constructor columns must be vec{}<{}>, got {}",
                            target, m.row_count, m.component_type, other
                        )))
                    }
                }
            }
            Ok(())
        }
        other => Err(CompileError::semantic(format!(
            "cannot construct a value of type {}",
            other
        ))),
    }
}

fn intrinsic_result_type(
    intrinsic: IntrinsicKind,
    parameters: &[Expression],
) -> Result<ExpressionType, CompileError> {
    use ExpressionType as T;

    let float_vec = |expr: &Expression| match expr.resolved_type() {
        T::Vector(v) if v.component_type == PrimitiveType::Float32 => Some(*v),
        _ => None,
    };

    match intrinsic {
        IntrinsicKind::CrossProduct => {
            let (a, b) = match parameters {
                [a, b] => (a, b),
                _ => {
                    return Err(CompileError::semantic(
                        "cross product takes exactly two parameters",
                    ))
                }
            };
            match (float_vec(a), float_vec(b)) {
                (Some(va), Some(vb)) if va.component_count == 3 && vb.component_count == 3 => {
                    Ok(a.resolved_type().clone())
                }
                _ => Err(CompileError::semantic(format!(
                    "cross product expects two vec3<f32>, got {} and {}",
                    a.resolved_type(),
                    b.resolved_type()
                ))),
            }
        }
        IntrinsicKind::DotProduct => {
            let (a, b) = match parameters {
                [a, b] => (a, b),
                _ => {
                    return Err(CompileError::semantic(
                        "dot product takes exactly two parameters",
                    ))
                }
            };
            match (float_vec(a), float_vec(b)) {
                (Some(va), Some(vb)) if va == vb => {
                    Ok(T::Primitive(PrimitiveType::Float32))
                }
                _ => Err(CompileError::semantic(format!(
                    "dot product expects two matching float vectors, got {} and {}",
                    a.resolved_type(),
                    b.resolved_type()
                ))),
            }
        }
        IntrinsicKind::SampleTexture => {
            let (sampler, coords) = match parameters {
                [s, c] => (s, c),
                _ => {
                    return Err(CompileError::semantic(
                        "texture sampling takes a sampler and coordinates",
                    ))
                }
            };
            let sampled = match sampler.resolved_type() {
                T::Sampler(s) => s.sampled_type,
                other => {
                    return Err(CompileError::semantic(format!(
                        "texture sampling expects a sampler, got {}",
                        other
                    )))
                }
            };
            match coords.resolved_type() {
                T::Vector(v) if v.component_type == PrimitiveType::Float32 => {}
                other => {
                    return Err(CompileError::semantic(format!(
                        "texture coordinates must be a float vector, got {}",
                        other
                    )))
                }
            }
            Ok(T::Vector(VectorType {
                component_count: 4,
                component_type: sampled,
            }))
        }
    }
}
