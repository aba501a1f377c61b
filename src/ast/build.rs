//! Node constructors — the programmatic front door to the AST.
//!
//! The text parser lives outside this crate; trees are built either through
//! these helpers or by deserializing a compiled module. Constructors return
//! untyped nodes; run [`crate::validate::validate`] before handing the tree
//! to a transform or a writer.

use super::*;

// ─── Types ────────────────────────────────────────────────────────

pub fn primitive(p: PrimitiveType) -> ExpressionType {
    ExpressionType::Primitive(p)
}

pub fn float() -> ExpressionType {
    ExpressionType::Primitive(PrimitiveType::Float32)
}

pub fn boolean() -> ExpressionType {
    ExpressionType::Primitive(PrimitiveType::Bool)
}

pub fn int() -> ExpressionType {
    ExpressionType::Primitive(PrimitiveType::Int32)
}

pub fn uint() -> ExpressionType {
    ExpressionType::Primitive(PrimitiveType::UInt32)
}

pub fn vec(component_count: u32, component_type: PrimitiveType) -> ExpressionType {
    ExpressionType::Vector(VectorType {
        component_count,
        component_type,
    })
}

pub fn vec2() -> ExpressionType {
    vec(2, PrimitiveType::Float32)
}

pub fn vec3() -> ExpressionType {
    vec(3, PrimitiveType::Float32)
}

pub fn vec4() -> ExpressionType {
    vec(4, PrimitiveType::Float32)
}

pub fn mat4() -> ExpressionType {
    ExpressionType::Matrix(MatrixType {
        column_count: 4,
        row_count: 4,
        component_type: PrimitiveType::Float32,
    })
}

pub fn sampler2d() -> ExpressionType {
    ExpressionType::Sampler(SamplerType {
        dim: ImageDim::Dim2D,
        sampled_type: PrimitiveType::Float32,
    })
}

pub fn named_type(name: impl Into<String>) -> ExpressionType {
    ExpressionType::Identifier(name.into())
}

pub fn uniform(inner: ExpressionType) -> ExpressionType {
    ExpressionType::Uniform(Box::new(inner))
}

// ─── Attributes ───────────────────────────────────────────────────

pub fn entry(stage: &str) -> Attribute {
    Attribute::new(AttributeKind::Entry, AttributeValue::Str(stage.into()))
}

pub fn builtin(semantic: &str) -> Attribute {
    Attribute::new(AttributeKind::Builtin, AttributeValue::Str(semantic.into()))
}

pub fn location(index: i64) -> Attribute {
    Attribute::new(AttributeKind::Location, AttributeValue::Int(index))
}

pub fn binding(index: i64) -> Attribute {
    Attribute::new(AttributeKind::Binding, AttributeValue::Int(index))
}

pub fn layout(name: &str) -> Attribute {
    Attribute::new(AttributeKind::Layout, AttributeValue::Str(name.into()))
}

// ─── Expressions ──────────────────────────────────────────────────

pub fn constant(value: ConstantValue) -> Expression {
    Expression::new(ExpressionKind::Constant(value))
}

pub fn float_constant(v: f32) -> Expression {
    constant(ConstantValue::Float32(v))
}

pub fn int_constant(v: i32) -> Expression {
    constant(ConstantValue::Int32(v))
}

pub fn bool_constant(v: bool) -> Expression {
    constant(ConstantValue::Bool(v))
}

pub fn identifier(name: impl Into<String>) -> Expression {
    Expression::new(ExpressionKind::Identifier(name.into()))
}

pub fn variable(var_index: u32) -> Expression {
    Expression::new(ExpressionKind::Variable { var_index })
}

pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::new(ExpressionKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn unary(op: UnaryOp, expr: Expression) -> Expression {
    Expression::new(ExpressionKind::Unary {
        op,
        expr: Box::new(expr),
    })
}

pub fn assign(left: Expression, right: Expression) -> Expression {
    Expression::new(ExpressionKind::Assign {
        op: AssignOp::Simple,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn access_member(expr: Expression, members: &[&str]) -> Expression {
    Expression::new(ExpressionKind::AccessMember {
        expr: Box::new(expr),
        member_names: members.iter().map(|m| (*m).to_string()).collect(),
    })
}

pub fn access_index(expr: Expression, indices: &[u32]) -> Expression {
    Expression::new(ExpressionKind::AccessIndex {
        expr: Box::new(expr),
        member_indices: indices.to_vec(),
    })
}

pub fn call(function: impl Into<String>, parameters: Vec<Expression>) -> Expression {
    Expression::new(ExpressionKind::Call {
        function: function.into(),
        func_index: None,
        parameters,
    })
}

pub fn cast(target_type: ExpressionType, expressions: Vec<Expression>) -> Expression {
    Expression::new(ExpressionKind::Cast {
        target_type,
        expressions,
    })
}

pub fn conditional(
    condition_name: impl Into<String>,
    true_path: Expression,
    false_path: Expression,
) -> Expression {
    Expression::new(ExpressionKind::Conditional {
        condition_name: condition_name.into(),
        true_path: Box::new(true_path),
        false_path: Box::new(false_path),
    })
}

pub fn intrinsic(intrinsic: IntrinsicKind, parameters: Vec<Expression>) -> Expression {
    Expression::new(ExpressionKind::Intrinsic {
        intrinsic,
        parameters,
    })
}

pub fn swizzle(expr: Expression, components: &[SwizzleComponent]) -> Expression {
    assert!(
        !components.is_empty() && components.len() <= 4,
        "swizzle takes 1 to 4 components"
    );
    Expression::new(ExpressionKind::Swizzle {
        expr: Box::new(expr),
        components: components.to_vec(),
    })
}

// ─── Statements ───────────────────────────────────────────────────

pub fn declare_variable(
    name: impl Into<String>,
    var_type: ExpressionType,
    initial: Option<Expression>,
) -> Statement {
    Statement::DeclareVariable {
        name: name.into(),
        var_type,
        initial,
        var_index: None,
    }
}

pub fn declare_struct(name: impl Into<String>, members: Vec<StructMember>) -> Statement {
    Statement::DeclareStruct {
        description: StructDescription {
            name: name.into(),
            members,
        },
        struct_index: None,
    }
}

pub fn member(name: impl Into<String>, ty: ExpressionType) -> StructMember {
    StructMember {
        name: name.into(),
        ty,
        attributes: Vec::new(),
    }
}

pub fn member_with(
    name: impl Into<String>,
    ty: ExpressionType,
    attributes: Vec<Attribute>,
) -> StructMember {
    StructMember {
        name: name.into(),
        ty,
        attributes,
    }
}

pub fn declare_function(
    name: impl Into<String>,
    parameters: Vec<Parameter>,
    return_type: ExpressionType,
    statements: Vec<Statement>,
) -> Statement {
    declare_function_with(name, parameters, return_type, Vec::new(), statements)
}

pub fn declare_function_with(
    name: impl Into<String>,
    parameters: Vec<Parameter>,
    return_type: ExpressionType,
    attributes: Vec<Attribute>,
    statements: Vec<Statement>,
) -> Statement {
    Statement::DeclareFunction(DeclareFunction {
        name: name.into(),
        parameters,
        return_type,
        attributes,
        statements,
        func_index: None,
        var_index: None,
    })
}

pub fn param(name: impl Into<String>, ty: ExpressionType) -> Parameter {
    Parameter {
        name: name.into(),
        ty,
    }
}

pub fn declare_external(external_vars: Vec<ExternalVar>) -> Statement {
    Statement::DeclareExternal {
        attributes: Vec::new(),
        external_vars,
        var_index: None,
    }
}

pub fn external_var(
    name: impl Into<String>,
    ty: ExpressionType,
    attributes: Vec<Attribute>,
) -> ExternalVar {
    ExternalVar {
        name: name.into(),
        ty,
        attributes,
    }
}

pub fn branch(condition: Expression, then: Statement) -> Statement {
    Statement::Branch {
        cond_statements: vec![CondStatement {
            condition,
            statement: then,
        }],
        else_statement: None,
    }
}

pub fn branch_else(condition: Expression, then: Statement, otherwise: Statement) -> Statement {
    Statement::Branch {
        cond_statements: vec![CondStatement {
            condition,
            statement: then,
        }],
        else_statement: Some(Box::new(otherwise)),
    }
}

pub fn multi(statements: Vec<Statement>) -> Statement {
    Statement::Multi(statements)
}

pub fn expr_statement(expr: Expression) -> Statement {
    Statement::Expression(expr)
}

pub fn ret(expr: Expression) -> Statement {
    Statement::Return(Some(expr))
}

pub fn ret_void() -> Statement {
    Statement::Return(None)
}

pub fn while_loop(condition: Expression, body: Statement) -> Statement {
    Statement::While {
        condition,
        body: Box::new(body),
    }
}

pub fn for_loop(
    var_name: impl Into<String>,
    from: Expression,
    to: Expression,
    step: Option<Expression>,
    body: Statement,
) -> Statement {
    Statement::For {
        var_name: var_name.into(),
        from,
        to,
        step,
        body: Box::new(body),
        var_index: None,
    }
}

pub fn for_each(var_name: impl Into<String>, expr: Expression, body: Statement) -> Statement {
    Statement::ForEach {
        var_name: var_name.into(),
        expr,
        body: Box::new(body),
        var_index: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_builders_are_untyped() {
        let e = binary(BinaryOp::Add, float_constant(1.0), float_constant(2.0));
        assert!(e.cached_type.is_none());
        match e.kind {
            ExpressionKind::Binary { op, .. } => assert_eq!(op, BinaryOp::Add),
            _ => panic!("expected binary node"),
        }
    }

    #[test]
    fn test_function_builder_entry_stage() {
        let f = declare_function_with(
            "main",
            Vec::new(),
            ExpressionType::Void,
            vec![entry("frag")],
            Vec::new(),
        );
        match f {
            Statement::DeclareFunction(func) => {
                assert_eq!(func.entry_stage(), Some(ShaderStage::Fragment));
                assert!(func.func_index.is_none());
            }
            _ => panic!("expected function declaration"),
        }
    }

    #[test]
    #[should_panic(expected = "1 to 4 components")]
    fn test_swizzle_component_bounds() {
        let _ = swizzle(identifier("v"), &[]);
    }
}
