//! Display impls for types, operators and stages, used by diagnostics and
//! the `view` command.

use std::fmt;

use super::*;

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::Float32 => "f32",
            PrimitiveType::Int32 => "i32",
            PrimitiveType::UInt32 => "u32",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionType::Void => write!(f, "()"),
            ExpressionType::Primitive(p) => write!(f, "{}", p),
            ExpressionType::Vector(v) => write!(f, "vec{}<{}>", v.component_count, v.component_type),
            ExpressionType::Matrix(m) => {
                write!(f, "mat{}x{}<{}>", m.column_count, m.row_count, m.component_type)
            }
            ExpressionType::Sampler(s) => {
                let dim = match s.dim {
                    ImageDim::Dim1D => "1d",
                    ImageDim::Dim1DArray => "1d_array",
                    ImageDim::Dim2D => "2d",
                    ImageDim::Dim2DArray => "2d_array",
                    ImageDim::Dim3D => "3d",
                    ImageDim::Cubemap => "cube",
                };
                write!(f, "sampler{}<{}>", dim, s.sampled_type)
            }
            ExpressionType::Struct(index) => write!(f, "struct#{}", index),
            ExpressionType::Uniform(inner) => write!(f, "uniform<{}>", inner),
            ExpressionType::Identifier(name) => write!(f, "{}", name),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::CompEq => "==",
            BinaryOp::CompGe => ">=",
            BinaryOp::CompGt => ">",
            BinaryOp::CompLe => "<=",
            BinaryOp::CompLt => "<",
            BinaryOp::CompNe => "!=",
        };
        write!(f, "{}", op)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            UnaryOp::Minus => "-",
            UnaryOp::LogicalNot => "!",
        };
        write!(f, "{}", op)
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display() {
        let vec3 = ExpressionType::Vector(VectorType {
            component_count: 3,
            component_type: PrimitiveType::Float32,
        });
        assert_eq!(format!("{}", vec3), "vec3<f32>");

        let mat = ExpressionType::Matrix(MatrixType {
            column_count: 4,
            row_count: 4,
            component_type: PrimitiveType::Float32,
        });
        assert_eq!(format!("{}", mat), "mat4x4<f32>");

        let sampler = ExpressionType::Sampler(SamplerType {
            dim: ImageDim::Dim2D,
            sampled_type: PrimitiveType::Float32,
        });
        assert_eq!(format!("{}", sampler), "sampler2d<f32>");

        assert_eq!(format!("{}", ExpressionType::Void), "()");
        assert_eq!(format!("{}", ExpressionType::Struct(2)), "struct#2");
    }

    #[test]
    fn test_op_display() {
        assert_eq!(format!("{}", BinaryOp::Add), "+");
        assert_eq!(format!("{}", BinaryOp::CompNe), "!=");
        assert_eq!(format!("{}", UnaryOp::LogicalNot), "!");
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(format!("{}", ShaderStage::Vertex), "vertex");
        assert_eq!(format!("{}", ShaderStage::Fragment), "fragment");
    }
}
