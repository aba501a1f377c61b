//! Shader AST — the typed tree between the front-end and the code writers.
//!
//! Two disjoint node families: [`Expression`] and [`Statement`]. Every node
//! owns its children exclusively (tree ownership, no sharing). Expressions
//! carry a `cached_type` that validation populates exactly once; writers and
//! the codec require it to be set. Declarations carry a small integer index
//! assigned during validation; cross-references (calls, variable reads) are
//! resolved to these indices rather than pointers so trees stay clonable and
//! serializable without fixups.

pub mod build;
mod display;

/// Scalar types a value or a vector/matrix component can have.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrimitiveType {
    Bool,
    Float32,
    Int32,
    UInt32,
}

/// A `vecN` of some scalar type, 2 <= N <= 4.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct VectorType {
    pub component_count: u32,
    pub component_type: PrimitiveType,
}

/// A column-major matrix of some scalar type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatrixType {
    pub column_count: u32,
    pub row_count: u32,
    pub component_type: PrimitiveType,
}

/// Texture dimensionality for sampler types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImageDim {
    Dim1D,
    Dim1DArray,
    Dim2D,
    Dim2DArray,
    Dim3D,
    Cubemap,
}

/// A combined texture+sampler type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SamplerType {
    pub dim: ImageDim,
    pub sampled_type: PrimitiveType,
}

/// The resolved type of an expression.
///
/// `Identifier` is the pending-resolution form produced by the builder (and
/// the external parser); validation replaces it with `Struct` references.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExpressionType {
    /// No value (function without return value, statement position).
    Void,
    Primitive(PrimitiveType),
    Vector(VectorType),
    Matrix(MatrixType),
    Sampler(SamplerType),
    /// Reference to a declared struct, by declaration index.
    Struct(u32),
    /// A uniform block wrapping a struct type.
    Uniform(Box<ExpressionType>),
    /// An unresolved type name.
    Identifier(String),
}

impl ExpressionType {
    pub fn is_void(&self) -> bool {
        matches!(self, ExpressionType::Void)
    }

    pub fn is_sampler(&self) -> bool {
        matches!(self, ExpressionType::Sampler(_))
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, ExpressionType::Uniform(_))
    }

    /// The scalar type of a primitive or vector, if any.
    pub fn component_type(&self) -> Option<PrimitiveType> {
        match self {
            ExpressionType::Primitive(p) => Some(*p),
            ExpressionType::Vector(v) => Some(v.component_type),
            ExpressionType::Matrix(m) => Some(m.component_type),
            _ => None,
        }
    }
}

/// A compile-time constant value. Ten variants, matching the codec's
/// constant encoding one to one.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantValue {
    Bool(bool),
    Float32(f32),
    Int32(i32),
    UInt32(u32),
    Vec2Float([f32; 2]),
    Vec3Float([f32; 3]),
    Vec4Float([f32; 4]),
    Vec2Int([i32; 2]),
    Vec3Int([i32; 3]),
    Vec4Int([i32; 4]),
}

impl ConstantValue {
    /// The type this constant has, independent of any context.
    pub fn expression_type(&self) -> ExpressionType {
        let vec = |n, ty| {
            ExpressionType::Vector(VectorType {
                component_count: n,
                component_type: ty,
            })
        };
        match self {
            ConstantValue::Bool(_) => ExpressionType::Primitive(PrimitiveType::Bool),
            ConstantValue::Float32(_) => ExpressionType::Primitive(PrimitiveType::Float32),
            ConstantValue::Int32(_) => ExpressionType::Primitive(PrimitiveType::Int32),
            ConstantValue::UInt32(_) => ExpressionType::Primitive(PrimitiveType::UInt32),
            ConstantValue::Vec2Float(_) => vec(2, PrimitiveType::Float32),
            ConstantValue::Vec3Float(_) => vec(3, PrimitiveType::Float32),
            ConstantValue::Vec4Float(_) => vec(4, PrimitiveType::Float32),
            ConstantValue::Vec2Int(_) => vec(2, PrimitiveType::Int32),
            ConstantValue::Vec3Int(_) => vec(3, PrimitiveType::Int32),
            ConstantValue::Vec4Int(_) => vec(4, PrimitiveType::Int32),
        }
    }
}

// ─── Attributes ───────────────────────────────────────────────────

/// Attribute kinds attachable to declarations and struct members.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeKind {
    /// Resource binding index (uniform blocks, samplers).
    Binding,
    /// Hardware-semantic input/output (e.g. "position").
    Builtin,
    /// Entry point for a stage ("vert", "frag", "compute").
    Entry,
    /// Memory layout of a uniform block ("std140").
    Layout,
    /// User-assigned stage input/output slot.
    Location,
}

/// An attribute payload: absent, integer, or string.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    None,
    Int(i64),
    Str(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub kind: AttributeKind,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(kind: AttributeKind, value: AttributeValue) -> Self {
        Self { kind, value }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.value {
            AttributeValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Find the first attribute of a given kind in a list.
pub fn find_attribute(attributes: &[Attribute], kind: AttributeKind) -> Option<&Attribute> {
    attributes.iter().find(|a| a.kind == kind)
}

// ─── Shader stages ────────────────────────────────────────────────

/// The pipeline stage an entry function is compiled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    /// Parsed and validated, but neither backend implements it yet.
    Compute,
}

impl ShaderStage {
    /// Map an `entry(...)` attribute string to a stage.
    pub fn from_entry_name(name: &str) -> Option<ShaderStage> {
        match name {
            "vert" => Some(ShaderStage::Vertex),
            "frag" => Some(ShaderStage::Fragment),
            "compute" => Some(ShaderStage::Compute),
            _ => None,
        }
    }
}

// ─── Operators ────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    CompEq,
    CompGe,
    CompGt,
    CompLe,
    CompLt,
    CompNe,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::CompEq
                | BinaryOp::CompGe
                | BinaryOp::CompGt
                | BinaryOp::CompLe
                | BinaryOp::CompLt
                | BinaryOp::CompNe
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    LogicalNot,
}

/// Assignment operators. Only simple assignment for now; compound forms are
/// desugared by the front-end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Simple,
}

/// One component of a swizzle, `.x` through `.w`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwizzleComponent {
    First,
    Second,
    Third,
    Fourth,
}

impl SwizzleComponent {
    pub fn index(&self) -> u32 {
        match self {
            SwizzleComponent::First => 0,
            SwizzleComponent::Second => 1,
            SwizzleComponent::Third => 2,
            SwizzleComponent::Fourth => 3,
        }
    }
}

/// Intrinsic functions with fixed semantics in both backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntrinsicKind {
    CrossProduct,
    DotProduct,
    SampleTexture,
}

// ─── Expressions ──────────────────────────────────────────────────

/// An expression node: a kind plus the type cache validation fills in.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub cached_type: Option<ExpressionType>,
}

impl Expression {
    pub fn new(kind: ExpressionKind) -> Self {
        Self {
            kind,
            cached_type: None,
        }
    }

    pub fn typed(kind: ExpressionKind, ty: ExpressionType) -> Self {
        Self {
            kind,
            cached_type: Some(ty),
        }
    }

    /// The cached type. Panics if validation has not run on this tree; that
    /// is a bug in the calling pass, not an input error.
    pub fn resolved_type(&self) -> &ExpressionType {
        self.cached_type
            .as_ref()
            .expect("expression type cache not populated; run validation first")
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, ExpressionKind::Constant(_))
    }

    pub fn as_constant(&self) -> Option<&ConstantValue> {
        match &self.kind {
            ExpressionKind::Constant(v) => Some(v),
            _ => None,
        }
    }

    /// Stable name of the node kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ExpressionKind::AccessMember { .. } => "member access",
            ExpressionKind::AccessIndex { .. } => "member index access",
            ExpressionKind::Assign { .. } => "assignment",
            ExpressionKind::Binary { .. } => "binary expression",
            ExpressionKind::Call { .. } => "function call",
            ExpressionKind::Cast { .. } => "cast",
            ExpressionKind::Conditional { .. } => "conditional expression",
            ExpressionKind::Constant(_) => "constant",
            ExpressionKind::Identifier(_) => "identifier",
            ExpressionKind::Intrinsic { .. } => "intrinsic call",
            ExpressionKind::Swizzle { .. } => "swizzle",
            ExpressionKind::Unary { .. } => "unary expression",
            ExpressionKind::Variable { .. } => "variable reference",
        }
    }
}

/// The closed set of expression node kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum ExpressionKind {
    /// `expr.member` (possibly chained) by member name.
    AccessMember {
        expr: Box<Expression>,
        member_names: Vec<String>,
    },
    /// `expr.member` resolved to member indices; produced by the SPIR-V
    /// lowering pass, never by the front-end.
    AccessIndex {
        expr: Box<Expression>,
        member_indices: Vec<u32>,
    },
    Assign {
        op: AssignOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Call of a user-declared function. `func_index` is resolved by
    /// validation; the name is kept for diagnostics and round-trips.
    Call {
        function: String,
        func_index: Option<u32>,
        parameters: Vec<Expression>,
    },
    /// Type constructor / conversion, e.g. `vec4(pos, 1.0)`.
    Cast {
        target_type: ExpressionType,
        expressions: Vec<Expression>,
    },
    /// Compile-time branch on an externally supplied option value.
    Conditional {
        condition_name: String,
        true_path: Box<Expression>,
        false_path: Box<Expression>,
    },
    Constant(ConstantValue),
    /// Unresolved name; validation rewrites this to `Variable`.
    Identifier(String),
    Intrinsic {
        intrinsic: IntrinsicKind,
        parameters: Vec<Expression>,
    },
    Swizzle {
        expr: Box<Expression>,
        components: Vec<SwizzleComponent>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expression>,
    },
    /// Resolved reference to a declared variable/parameter/external.
    Variable { var_index: u32 },
}

// ─── Statements ───────────────────────────────────────────────────

/// A function parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: ExpressionType,
}

/// A struct member with its interface attributes (builtin/location).
#[derive(Clone, Debug, PartialEq)]
pub struct StructMember {
    pub name: String,
    pub ty: ExpressionType,
    pub attributes: Vec<Attribute>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructDescription {
    pub name: String,
    pub members: Vec<StructMember>,
}

impl StructDescription {
    pub fn member_index(&self, name: &str) -> Option<u32> {
        self.members.iter().position(|m| m.name == name).map(|i| i as u32)
    }
}

/// One external (uniform block or sampler) variable.
#[derive(Clone, Debug, PartialEq)]
pub struct ExternalVar {
    pub name: String,
    pub ty: ExpressionType,
    pub attributes: Vec<Attribute>,
}

/// A function declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct DeclareFunction {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: ExpressionType,
    pub attributes: Vec<Attribute>,
    pub statements: Vec<Statement>,
    pub func_index: Option<u32>,
    /// Variable index of the first parameter; the remaining parameters
    /// follow consecutively.
    pub var_index: Option<u32>,
}

impl DeclareFunction {
    /// The stage this function is an entry point for, if any.
    /// An `entry` attribute naming an unknown stage yields `None` here;
    /// validation rejects it with a proper error.
    pub fn entry_stage(&self) -> Option<ShaderStage> {
        find_attribute(&self.attributes, AttributeKind::Entry)
            .and_then(|a| a.as_str())
            .and_then(ShaderStage::from_entry_name)
    }
}

/// One `if`/`else if` arm of a branch statement.
#[derive(Clone, Debug, PartialEq)]
pub struct CondStatement {
    pub condition: Expression,
    pub statement: Statement,
}

/// The closed set of statement node kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Branch {
        cond_statements: Vec<CondStatement>,
        else_statement: Option<Box<Statement>>,
    },
    /// Compile-time branch on an externally supplied option value.
    Conditional {
        condition_name: String,
        statement: Box<Statement>,
    },
    DeclareExternal {
        attributes: Vec<Attribute>,
        external_vars: Vec<ExternalVar>,
        /// Index of the first external variable; the rest follow
        /// consecutively.
        var_index: Option<u32>,
    },
    DeclareFunction(DeclareFunction),
    DeclareStruct {
        description: StructDescription,
        struct_index: Option<u32>,
    },
    DeclareVariable {
        name: String,
        var_type: ExpressionType,
        initial: Option<Expression>,
        var_index: Option<u32>,
    },
    Discard,
    Expression(Expression),
    For {
        var_name: String,
        from: Expression,
        to: Expression,
        step: Option<Expression>,
        body: Box<Statement>,
        var_index: Option<u32>,
    },
    /// Iterate the components of a vector expression.
    ForEach {
        var_name: String,
        expr: Expression,
        body: Box<Statement>,
        var_index: Option<u32>,
    },
    Multi(Vec<Statement>),
    NoOp,
    Return(Option<Expression>),
    While {
        condition: Expression,
        body: Box<Statement>,
    },
}

impl Statement {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Statement::Branch { .. } => "branch",
            Statement::Conditional { .. } => "conditional statement",
            Statement::DeclareExternal { .. } => "external declaration",
            Statement::DeclareFunction(_) => "function declaration",
            Statement::DeclareStruct { .. } => "struct declaration",
            Statement::DeclareVariable { .. } => "variable declaration",
            Statement::Discard => "discard",
            Statement::Expression(_) => "expression statement",
            Statement::For { .. } => "for loop",
            Statement::ForEach { .. } => "for-each loop",
            Statement::Multi(_) => "block",
            Statement::NoOp => "no-op",
            Statement::Return(_) => "return",
            Statement::While { .. } => "while loop",
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Statement::NoOp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_types() {
        assert_eq!(
            ConstantValue::Float32(1.0).expression_type(),
            ExpressionType::Primitive(PrimitiveType::Float32)
        );
        assert_eq!(
            ConstantValue::Vec3Float([0.0; 3]).expression_type(),
            ExpressionType::Vector(VectorType {
                component_count: 3,
                component_type: PrimitiveType::Float32
            })
        );
        assert_eq!(
            ConstantValue::Vec2Int([1, 2]).expression_type(),
            ExpressionType::Vector(VectorType {
                component_count: 2,
                component_type: PrimitiveType::Int32
            })
        );
    }

    #[test]
    fn test_entry_stage_mapping() {
        assert_eq!(ShaderStage::from_entry_name("vert"), Some(ShaderStage::Vertex));
        assert_eq!(ShaderStage::from_entry_name("frag"), Some(ShaderStage::Fragment));
        assert_eq!(ShaderStage::from_entry_name("compute"), Some(ShaderStage::Compute));
        assert_eq!(ShaderStage::from_entry_name("geom"), None);
    }

    #[test]
    fn test_struct_member_index() {
        let desc = StructDescription {
            name: "VertOut".into(),
            members: vec![
                StructMember {
                    name: "position".into(),
                    ty: ExpressionType::Vector(VectorType {
                        component_count: 4,
                        component_type: PrimitiveType::Float32,
                    }),
                    attributes: Vec::new(),
                },
                StructMember {
                    name: "uv".into(),
                    ty: ExpressionType::Vector(VectorType {
                        component_count: 2,
                        component_type: PrimitiveType::Float32,
                    }),
                    attributes: Vec::new(),
                },
            ],
        };
        assert_eq!(desc.member_index("uv"), Some(1));
        assert_eq!(desc.member_index("normal"), None);
    }

    #[test]
    fn test_swizzle_component_index() {
        assert_eq!(SwizzleComponent::First.index(), 0);
        assert_eq!(SwizzleComponent::Fourth.index(), 3);
    }

    #[test]
    #[should_panic(expected = "type cache not populated")]
    fn test_resolved_type_panics_without_validation() {
        let e = Expression::new(ExpressionKind::Identifier("x".into()));
        let _ = e.resolved_type();
    }
}
