//! Constant propagation.
//!
//! Rewrites any expression whose operands are all compile-time constants
//! into the literal result, following the same operator semantics as
//! validation so folding never changes program meaning. Combinations the
//! fold table does not cover (matrix algebra, integer division by zero)
//! are left untouched rather than guessed at.

use crate::ast::*;
use crate::diagnostic::CompileError;
use crate::rewrite::{walk_expression, Rewriter};
use crate::validate::Module;

/// Fold every constant subexpression in the module.
pub fn fold_constants(module: &Module) -> Result<Module, CompileError> {
    let folded = Folder.rewrite_statement(&module.root)?;
    Ok(Module::rebuild(folded))
}

struct Folder;

impl Rewriter for Folder {
    fn rewrite_expression(&mut self, expr: &Expression) -> Result<Expression, CompileError> {
        // Children first, so nested constant trees collapse bottom-up.
        let rewritten = walk_expression(self, expr)?;

        let folded = match &rewritten.kind {
            ExpressionKind::Binary { op, left, right } => {
                match (left.as_constant(), right.as_constant()) {
                    (Some(l), Some(r)) => fold_binary(*op, l, r),
                    _ => None,
                }
            }
            ExpressionKind::Unary { op, expr } => {
                expr.as_constant().and_then(|v| fold_unary(*op, v))
            }
            ExpressionKind::Swizzle { expr, components } => {
                expr.as_constant().and_then(|v| fold_swizzle(v, components))
            }
            ExpressionKind::Cast {
                target_type,
                expressions,
            } => fold_cast(target_type, expressions),
            _ => None,
        };

        match folded {
            Some(value) => {
                let ty = value.expression_type();
                debug_assert_eq!(
                    rewritten.cached_type.as_ref(),
                    Some(&ty),
                    "folding changed the expression type"
                );
                Ok(Expression::typed(ExpressionKind::Constant(value), ty))
            }
            None => Ok(rewritten),
        }
    }
}

fn fold_binary(op: BinaryOp, left: &ConstantValue, right: &ConstantValue) -> Option<ConstantValue> {
    use ConstantValue as C;

    // Component-wise float arithmetic.
    let float_op = |a: f32, b: f32| -> Option<f32> {
        Some(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Subtract => a - b,
            BinaryOp::Multiply => a * b,
            BinaryOp::Divide => a / b,
            _ => return None,
        })
    };
    let int_op = |a: i32, b: i32| -> Option<i32> {
        Some(match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Subtract => a.wrapping_sub(b),
            BinaryOp::Multiply => a.wrapping_mul(b),
            BinaryOp::Divide if b != 0 => a.wrapping_div(b),
            _ => return None,
        })
    };

    if op.is_comparison() {
        let result = match (left, right) {
            (C::Float32(a), C::Float32(b)) => compare(op, a.partial_cmp(b)?),
            (C::Int32(a), C::Int32(b)) => compare(op, a.cmp(b)),
            (C::UInt32(a), C::UInt32(b)) => compare(op, a.cmp(b)),
            (C::Bool(a), C::Bool(b)) => match op {
                BinaryOp::CompEq => a == b,
                BinaryOp::CompNe => a != b,
                _ => return None,
            },
            _ => return None,
        };
        return Some(C::Bool(result));
    }

    match (left, right) {
        (C::Float32(a), C::Float32(b)) => float_op(*a, *b).map(C::Float32),
        (C::Int32(a), C::Int32(b)) => int_op(*a, *b).map(C::Int32),
        (C::UInt32(a), C::UInt32(b)) => Some(C::UInt32(match op {
            BinaryOp::Add => a.wrapping_add(*b),
            BinaryOp::Subtract => a.wrapping_sub(*b),
            BinaryOp::Multiply => a.wrapping_mul(*b),
            BinaryOp::Divide if *b != 0 => a / b,
            _ => return None,
        })),
        (C::Vec2Float(a), C::Vec2Float(b)) => {
            Some(C::Vec2Float([float_op(a[0], b[0])?, float_op(a[1], b[1])?]))
        }
        (C::Vec3Float(a), C::Vec3Float(b)) => Some(C::Vec3Float([
            float_op(a[0], b[0])?,
            float_op(a[1], b[1])?,
            float_op(a[2], b[2])?,
        ])),
        (C::Vec4Float(a), C::Vec4Float(b)) => Some(C::Vec4Float([
            float_op(a[0], b[0])?,
            float_op(a[1], b[1])?,
            float_op(a[2], b[2])?,
            float_op(a[3], b[3])?,
        ])),
        (C::Vec2Int(a), C::Vec2Int(b)) => {
            Some(C::Vec2Int([int_op(a[0], b[0])?, int_op(a[1], b[1])?]))
        }
        (C::Vec3Int(a), C::Vec3Int(b)) => Some(C::Vec3Int([
            int_op(a[0], b[0])?,
            int_op(a[1], b[1])?,
            int_op(a[2], b[2])?,
        ])),
        (C::Vec4Int(a), C::Vec4Int(b)) => Some(C::Vec4Int([
            int_op(a[0], b[0])?,
            int_op(a[1], b[1])?,
            int_op(a[2], b[2])?,
            int_op(a[3], b[3])?,
        ])),
        _ => None,
    }
}

fn compare(op: BinaryOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinaryOp::CompEq => ordering == Equal,
        BinaryOp::CompNe => ordering != Equal,
        BinaryOp::CompLt => ordering == Less,
        BinaryOp::CompLe => ordering != Greater,
        BinaryOp::CompGt => ordering == Greater,
        BinaryOp::CompGe => ordering != Less,
        _ => unreachable!("not a comparison operator"),
    }
}

fn fold_unary(op: UnaryOp, value: &ConstantValue) -> Option<ConstantValue> {
    use ConstantValue as C;
    match op {
        UnaryOp::Minus => Some(match value {
            C::Float32(v) => C::Float32(-v),
            C::Int32(v) => C::Int32(v.wrapping_neg()),
            C::Vec2Float(v) => C::Vec2Float([-v[0], -v[1]]),
            C::Vec3Float(v) => C::Vec3Float([-v[0], -v[1], -v[2]]),
            C::Vec4Float(v) => C::Vec4Float([-v[0], -v[1], -v[2], -v[3]]),
            C::Vec2Int(v) => C::Vec2Int([v[0].wrapping_neg(), v[1].wrapping_neg()]),
            C::Vec3Int(v) => C::Vec3Int([
                v[0].wrapping_neg(),
                v[1].wrapping_neg(),
                v[2].wrapping_neg(),
            ]),
            C::Vec4Int(v) => C::Vec4Int([
                v[0].wrapping_neg(),
                v[1].wrapping_neg(),
                v[2].wrapping_neg(),
                v[3].wrapping_neg(),
            ]),
            _ => return None,
        }),
        UnaryOp::LogicalNot => match value {
            C::Bool(v) => Some(C::Bool(!v)),
            _ => None,
        },
    }
}

fn fold_swizzle(value: &ConstantValue, components: &[SwizzleComponent]) -> Option<ConstantValue> {
    use ConstantValue as C;

    let floats: Option<Vec<f32>> = match value {
        C::Vec2Float(v) => Some(v.to_vec()),
        C::Vec3Float(v) => Some(v.to_vec()),
        C::Vec4Float(v) => Some(v.to_vec()),
        _ => None,
    }
    .map(|source| {
        components
            .iter()
            .map(|c| source[c.index() as usize])
            .collect()
    });

    if let Some(picked) = floats {
        return Some(match picked.as_slice() {
            [x] => C::Float32(*x),
            [x, y] => C::Vec2Float([*x, *y]),
            [x, y, z] => C::Vec3Float([*x, *y, *z]),
            [x, y, z, w] => C::Vec4Float([*x, *y, *z, *w]),
            _ => unreachable!("swizzle component count is 1..=4"),
        });
    }

    let ints: Option<Vec<i32>> = match value {
        C::Vec2Int(v) => Some(v.to_vec()),
        C::Vec3Int(v) => Some(v.to_vec()),
        C::Vec4Int(v) => Some(v.to_vec()),
        _ => None,
    }
    .map(|source| {
        components
            .iter()
            .map(|c| source[c.index() as usize])
            .collect()
    });

    ints.map(|picked| match picked.as_slice() {
        [x] => C::Int32(*x),
        [x, y] => C::Vec2Int([*x, *y]),
        [x, y, z] => C::Vec3Int([*x, *y, *z]),
        [x, y, z, w] => C::Vec4Int([*x, *y, *z, *w]),
        _ => unreachable!("swizzle component count is 1..=4"),
    })
}

/// Fold vector constructors with all-constant components and scalar
/// conversions of constants.
fn fold_cast(target: &ExpressionType, expressions: &[Expression]) -> Option<ConstantValue> {
    use ConstantValue as C;

    // Scalar conversion.
    if let (ExpressionType::Primitive(p), [single]) = (target, expressions) {
        let value = single.as_constant()?;
        return match p {
            PrimitiveType::Float32 => Some(C::Float32(match value {
                C::Float32(v) => *v,
                C::Int32(v) => *v as f32,
                C::UInt32(v) => *v as f32,
                _ => return None,
            })),
            PrimitiveType::Int32 => Some(C::Int32(match value {
                C::Float32(v) => *v as i32,
                C::Int32(v) => *v,
                C::UInt32(v) => *v as i32,
                _ => return None,
            })),
            PrimitiveType::UInt32 => Some(C::UInt32(match value {
                C::Float32(v) => *v as u32,
                C::Int32(v) => *v as u32,
                C::UInt32(v) => *v,
                _ => return None,
            })),
            PrimitiveType::Bool => None,
        };
    }

    // Vector construction from constant scalars and vectors.
    let vector = match target {
        ExpressionType::Vector(v) => v,
        _ => return None,
    };

    match vector.component_type {
        PrimitiveType::Float32 => {
            let mut parts = Vec::new();
            for expression in expressions {
                match expression.as_constant()? {
                    C::Float32(v) => parts.push(*v),
                    C::Vec2Float(v) => parts.extend(v),
                    C::Vec3Float(v) => parts.extend(v),
                    C::Vec4Float(v) => parts.extend(v),
                    _ => return None,
                }
            }
            match (vector.component_count, parts.as_slice()) {
                (2, [x, y]) => Some(C::Vec2Float([*x, *y])),
                (3, [x, y, z]) => Some(C::Vec3Float([*x, *y, *z])),
                (4, [x, y, z, w]) => Some(C::Vec4Float([*x, *y, *z, *w])),
                _ => None,
            }
        }
        PrimitiveType::Int32 => {
            let mut parts = Vec::new();
            for expression in expressions {
                match expression.as_constant()? {
                    C::Int32(v) => parts.push(*v),
                    C::Vec2Int(v) => parts.extend(v),
                    C::Vec3Int(v) => parts.extend(v),
                    C::Vec4Int(v) => parts.extend(v),
                    _ => return None,
                }
            }
            match (vector.component_count, parts.as_slice()) {
                (2, [x, y]) => Some(C::Vec2Int([*x, *y])),
                (3, [x, y, z]) => Some(C::Vec3Int([*x, *y, *z])),
                (4, [x, y, z, w]) => Some(C::Vec4Int([*x, *y, *z, *w])),
                _ => None,
            }
        }
        _ => None,
    }
}
