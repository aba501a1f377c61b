//! Semantic validation.
//!
//! One scope-aware walk over the tree that assigns declaration indices,
//! resolves identifiers to variable/function indices, and populates every
//! expression's type cache. The walk is a rewrite: the input tree is left
//! untouched and a fully resolved copy comes back inside a [`Module`]
//! together with the declaration side-tables the writers consume.
//!
//! First error wins: validation aborts on the first ill-typed construct and
//! never attempts recovery.

mod analysis;
mod expr;
#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use crate::ast::*;
use crate::diagnostic::CompileError;
use crate::visit::{ScopeEntry, ScopeStack};

/// A function's resolved signature and entry-point role.
#[derive(Clone, Debug)]
pub struct FunctionData {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: ExpressionType,
    pub entry_stage: Option<ShaderStage>,
}

/// A resolved external (uniform block or sampler) variable.
#[derive(Clone, Debug)]
pub struct ExternalData {
    pub name: String,
    pub ty: ExpressionType,
    pub attributes: Vec<Attribute>,
}

/// A validated shader: the resolved tree plus the side-tables declarations
/// are referenced through. Struct/function/external lookups go through the
/// maps, keyed by declaration index, never through tree walks.
#[derive(Clone, Debug)]
pub struct Module {
    pub root: Statement,
    pub structs: BTreeMap<u32, StructDescription>,
    pub functions: BTreeMap<u32, FunctionData>,
    pub externals: BTreeMap<u32, ExternalData>,
    pub variable_count: u32,
}

impl Module {
    /// The struct behind an index. Panics on a dangling index: trees are
    /// only constructed by validation or passes that preserve indices, so a
    /// miss is a pass bug.
    pub fn struct_desc(&self, index: u32) -> &StructDescription {
        self.structs
            .get(&index)
            .expect("dangling struct index in validated tree")
    }

    /// Entry function for a stage, if the module declares one.
    pub fn entry_point(&self, stage: ShaderStage) -> Option<(u32, &FunctionData)> {
        self.functions
            .iter()
            .find(|(_, f)| f.entry_stage == Some(stage))
            .map(|(i, f)| (*i, f))
    }

    /// Re-collect the side-tables from an already-indexed tree (after
    /// deserialization or a transform pass). Does not re-run type checks.
    pub fn rebuild(root: Statement) -> Self {
        let mut module = Module {
            root: Statement::NoOp,
            structs: BTreeMap::new(),
            functions: BTreeMap::new(),
            externals: BTreeMap::new(),
            variable_count: 0,
        };
        module.collect(&root);
        module.root = root;
        module
    }

    fn collect(&mut self, stmt: &Statement) {
        match stmt {
            Statement::DeclareStruct {
                description,
                struct_index,
            } => {
                let index = struct_index.expect("unvalidated struct declaration");
                self.structs.insert(index, description.clone());
            }
            Statement::DeclareFunction(func) => {
                let index = func.func_index.expect("unvalidated function declaration");
                self.functions.insert(
                    index,
                    FunctionData {
                        name: func.name.clone(),
                        parameters: func.parameters.clone(),
                        return_type: func.return_type.clone(),
                        entry_stage: func.entry_stage(),
                    },
                );
                if let Some(first) = func.var_index {
                    self.variable_count = self
                        .variable_count
                        .max(first + func.parameters.len() as u32);
                }
                for statement in &func.statements {
                    self.collect(statement);
                }
            }
            Statement::DeclareExternal {
                external_vars,
                var_index,
                ..
            } => {
                let first = var_index.expect("unvalidated external declaration");
                for (offset, var) in external_vars.iter().enumerate() {
                    let index = first + offset as u32;
                    self.externals.insert(
                        index,
                        ExternalData {
                            name: var.name.clone(),
                            ty: var.ty.clone(),
                            attributes: var.attributes.clone(),
                        },
                    );
                    self.variable_count = self.variable_count.max(index + 1);
                }
            }
            Statement::DeclareVariable { var_index, .. } => {
                let index = var_index.expect("unvalidated variable declaration");
                self.variable_count = self.variable_count.max(index + 1);
            }
            Statement::For { var_index, body, .. } | Statement::ForEach { var_index, body, .. } => {
                let index = var_index.expect("unvalidated loop variable");
                self.variable_count = self.variable_count.max(index + 1);
                self.collect(body);
            }
            Statement::Multi(statements) => {
                for statement in statements {
                    self.collect(statement);
                }
            }
            Statement::Conditional { statement, .. } => self.collect(statement),
            Statement::Branch {
                cond_statements,
                else_statement,
            } => {
                for cond in cond_statements {
                    self.collect(&cond.statement);
                }
                if let Some(else_statement) = else_statement {
                    self.collect(else_statement);
                }
            }
            Statement::While { body, .. } => self.collect(body),
            _ => {}
        }
    }
}

/// Validate an unresolved tree, producing a [`Module`].
pub fn validate(root: &Statement) -> Result<Module, CompileError> {
    let mut validator = Validator::new();
    validator.register_declarations(root)?;
    let resolved = validator.validate_statement(root)?;
    validator.check_recursion()?;
    validator.check_entry_signatures()?;

    Ok(Module {
        root: resolved,
        structs: validator.structs,
        functions: validator.functions,
        externals: validator.externals,
        variable_count: validator.next_var_index,
    })
}

pub(crate) struct Validator {
    scopes: ScopeStack,
    structs: BTreeMap<u32, StructDescription>,
    functions: BTreeMap<u32, FunctionData>,
    externals: BTreeMap<u32, ExternalData>,
    /// var index -> resolved type, for `Variable` expressions.
    variables: BTreeMap<u32, ExpressionType>,
    /// func index -> indices of functions it calls (for recursion checks).
    call_graph: BTreeMap<u32, Vec<u32>>,
    next_var_index: u32,
    next_func_index: u32,
    next_struct_index: u32,
    /// Return type of the function currently being validated.
    current_return_type: Option<ExpressionType>,
    current_func_index: Option<u32>,
}

impl Validator {
    fn new() -> Self {
        Self {
            scopes: ScopeStack::new(),
            structs: BTreeMap::new(),
            functions: BTreeMap::new(),
            externals: BTreeMap::new(),
            variables: BTreeMap::new(),
            call_graph: BTreeMap::new(),
            next_var_index: 0,
            next_func_index: 0,
            next_struct_index: 0,
            current_return_type: None,
            current_func_index: None,
        }
    }

    // --- First pass: register top-level declarations ---

    /// Walk the top level (including option-conditional wrappers), assigning
    /// indices to structs, functions and externals so later bodies can
    /// reference them in declaration order.
    fn register_declarations(&mut self, stmt: &Statement) -> Result<(), CompileError> {
        match stmt {
            Statement::Multi(statements) => {
                for statement in statements {
                    self.register_declarations(statement)?;
                }
            }
            Statement::Conditional { statement, .. } => {
                self.register_declarations(statement)?;
            }
            Statement::DeclareStruct {
                description,
                struct_index,
            } => {
                let mut resolved = description.clone();
                for member in &mut resolved.members {
                    member.ty = self.resolve_type(&member.ty)?;
                }
                // An already-indexed tree (reloaded module, transformed
                // tree) keeps its indices; fresh declarations get the next
                // free one.
                let index = match struct_index {
                    Some(index) => *index,
                    None => self.next_struct_index,
                };
                self.next_struct_index = self.next_struct_index.max(index + 1);
                let shadowed = self
                    .scopes
                    .declare(&resolved.name, ScopeEntry::Struct { struct_index: index });
                if shadowed.is_some() {
                    return Err(CompileError::semantic(format!(
                        "duplicate declaration of '{}'",
                        resolved.name
                    )));
                }
                self.structs.insert(index, resolved);
            }
            Statement::DeclareFunction(func) => {
                let mut parameters = Vec::with_capacity(func.parameters.len());
                for parameter in &func.parameters {
                    parameters.push(Parameter {
                        name: parameter.name.clone(),
                        ty: self.resolve_type(&parameter.ty)?,
                    });
                }
                let return_type = self.resolve_type(&func.return_type)?;

                if let Some(attr) = find_attribute(&func.attributes, AttributeKind::Entry) {
                    let name = attr.as_str().ok_or_else(|| {
                        CompileError::semantic("entry attribute expects a stage name")
                    })?;
                    if ShaderStage::from_entry_name(name).is_none() {
                        return Err(CompileError::semantic(format!(
                            "unknown entry stage '{}'",
                            name
                        ))
                        .with_help("known stages are \"vert\", \"frag\" and \"compute\""));
                    }
                }

                let index = match func.func_index {
                    Some(index) => index,
                    None => self.next_func_index,
                };
                self.next_func_index = self.next_func_index.max(index + 1);
                let shadowed = self
                    .scopes
                    .declare(&func.name, ScopeEntry::Function { func_index: index });
                if shadowed.is_some() {
                    return Err(CompileError::semantic(format!(
                        "duplicate declaration of '{}'",
                        func.name
                    )));
                }
                self.functions.insert(
                    index,
                    FunctionData {
                        name: func.name.clone(),
                        parameters,
                        return_type,
                        entry_stage: func.entry_stage(),
                    },
                );
            }
            Statement::DeclareExternal {
                external_vars,
                var_index,
                ..
            } => {
                for (offset, var) in external_vars.iter().enumerate() {
                    let ty = self.resolve_type(&var.ty)?;
                    if !ty.is_sampler() && !ty.is_uniform() {
                        return Err(CompileError::semantic(format!(
                            "external '{}' must be a sampler or a uniform block, got {}",
                            var.name, ty
                        )));
                    }
                    let index = match var_index {
                        Some(first) => first + offset as u32,
                        None => self.next_var_index,
                    };
                    self.next_var_index = self.next_var_index.max(index + 1);
                    let shadowed = self.scopes.declare(
                        &var.name,
                        ScopeEntry::External {
                            var_index: index,
                            ty: ty.clone(),
                        },
                    );
                    if shadowed.is_some() {
                        return Err(CompileError::semantic(format!(
                            "duplicate declaration of '{}'",
                            var.name
                        )));
                    }
                    self.variables.insert(index, ty.clone());
                    self.externals.insert(
                        index,
                        ExternalData {
                            name: var.name.clone(),
                            ty,
                            attributes: var.attributes.clone(),
                        },
                    );
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Resolve identifier types to struct references; reject unknown names.
    fn resolve_type(&self, ty: &ExpressionType) -> Result<ExpressionType, CompileError> {
        match ty {
            ExpressionType::Identifier(name) => match self.scopes.lookup(name) {
                Some(ScopeEntry::Struct { struct_index }) => {
                    Ok(ExpressionType::Struct(*struct_index))
                }
                _ => Err(CompileError::semantic(format!("unknown type '{}'", name))),
            },
            ExpressionType::Uniform(inner) => Ok(ExpressionType::Uniform(Box::new(
                self.resolve_type(inner)?,
            ))),
            other => Ok(other.clone()),
        }
    }

    // --- Second pass: statement validation ---

    fn validate_statement(&mut self, stmt: &Statement) -> Result<Statement, CompileError> {
        match stmt {
            Statement::Branch {
                cond_statements,
                else_statement,
            } => {
                let mut resolved = Vec::with_capacity(cond_statements.len());
                for cond in cond_statements {
                    let condition = self.validate_expression(&cond.condition)?;
                    let cond_ty = condition.resolved_type();
                    if *cond_ty != ExpressionType::Primitive(PrimitiveType::Bool) {
                        return Err(CompileError::semantic(format!(
                            "branch condition must be bool, got {}",
                            cond_ty
                        )));
                    }
                    self.scopes.push();
                    let statement = self.validate_statement(&cond.statement)?;
                    self.scopes.pop();
                    resolved.push(CondStatement {
                        condition,
                        statement,
                    });
                }
                let else_statement = match else_statement {
                    Some(s) => {
                        self.scopes.push();
                        let resolved = self.validate_statement(s)?;
                        self.scopes.pop();
                        Some(Box::new(resolved))
                    }
                    None => None,
                };
                Ok(Statement::Branch {
                    cond_statements: resolved,
                    else_statement,
                })
            }
            Statement::Conditional {
                condition_name,
                statement,
            } => {
                if condition_name.is_empty() {
                    return Err(CompileError::semantic(
                        "conditional statement with empty option name",
                    ));
                }
                Ok(Statement::Conditional {
                    condition_name: condition_name.clone(),
                    statement: Box::new(self.validate_statement(statement)?),
                })
            }
            Statement::DeclareExternal {
                attributes,
                external_vars,
                ..
            } => {
                // Registered in the first pass; re-emit with resolved types
                // and the assigned first index.
                let first_name = match external_vars.first() {
                    Some(var) => &var.name,
                    None => {
                        return Err(CompileError::semantic(
                            "external declaration without variables",
                        ))
                    }
                };
                let first_index = match self.scopes.lookup(first_name) {
                    Some(ScopeEntry::External { var_index, .. }) => *var_index,
                    _ => {
                        return Err(CompileError::semantic(format!(
                            "external '{}' must be declared at module scope",
                            first_name
                        )))
                    }
                };
                let mut resolved_vars = Vec::with_capacity(external_vars.len());
                for var in external_vars {
                    resolved_vars.push(ExternalVar {
                        name: var.name.clone(),
                        ty: self.resolve_type(&var.ty)?,
                        attributes: var.attributes.clone(),
                    });
                }
                Ok(Statement::DeclareExternal {
                    attributes: attributes.clone(),
                    external_vars: resolved_vars,
                    var_index: Some(first_index),
                })
            }
            Statement::DeclareFunction(func) => self.validate_function(func),
            Statement::DeclareStruct { description, .. } => {
                let index = match self.scopes.lookup(&description.name) {
                    Some(ScopeEntry::Struct { struct_index }) => *struct_index,
                    _ => {
                        return Err(CompileError::semantic(format!(
                            "struct '{}' must be declared at module scope",
                            description.name
                        )))
                    }
                };
                Ok(Statement::DeclareStruct {
                    description: self.structs[&index].clone(),
                    struct_index: Some(index),
                })
            }
            Statement::DeclareVariable {
                name,
                var_type,
                initial,
                var_index,
            } => {
                let var_type = self.resolve_type(var_type)?;
                let initial = match initial {
                    Some(expr) => {
                        let resolved = self.validate_expression(expr)?;
                        let init_ty = resolved.resolved_type();
                        if *init_ty != var_type {
                            return Err(CompileError::semantic(format!(
                                "cannot initialize '{}' of type {} with a value of type {}",
                                name, var_type, init_ty
                            )));
                        }
                        Some(resolved)
                    }
                    None => None,
                };
                let index = self.declare_variable(name, var_type.clone(), *var_index)?;
                Ok(Statement::DeclareVariable {
                    name: name.clone(),
                    var_type,
                    initial,
                    var_index: Some(index),
                })
            }
            Statement::Discard => Ok(Statement::Discard),
            Statement::Expression(expr) => {
                Ok(Statement::Expression(self.validate_expression(expr)?))
            }
            Statement::For {
                var_name,
                from,
                to,
                step,
                body,
                var_index,
            } => {
                let from = self.validate_expression(from)?;
                let to = self.validate_expression(to)?;
                let counter_ty = from.resolved_type().clone();
                match counter_ty {
                    ExpressionType::Primitive(PrimitiveType::Int32)
                    | ExpressionType::Primitive(PrimitiveType::UInt32) => {}
                    ref other => {
                        return Err(CompileError::semantic(format!(
                            "for counter must be i32 or u32, got {}",
                            other
                        )))
                    }
                }
                if to.resolved_type() != &counter_ty {
                    return Err(CompileError::semantic(format!(
                        "for bounds disagree: {} vs {}",
                        counter_ty,
                        to.resolved_type()
                    )));
                }
                let step = match step {
                    Some(expr) => {
                        let resolved = self.validate_expression(expr)?;
                        if resolved.resolved_type() != &counter_ty {
                            return Err(CompileError::semantic(format!(
                                "for step must be {}, got {}",
                                counter_ty,
                                resolved.resolved_type()
                            )));
                        }
                        Some(resolved)
                    }
                    None => None,
                };
                self.scopes.push();
                let index = self.declare_variable(var_name, counter_ty, *var_index)?;
                let body = self.validate_statement(body)?;
                self.scopes.pop();
                Ok(Statement::For {
                    var_name: var_name.clone(),
                    from,
                    to,
                    step,
                    body: Box::new(body),
                    var_index: Some(index),
                })
            }
            Statement::ForEach {
                var_name,
                expr,
                body,
                var_index,
            } => {
                let expr = self.validate_expression(expr)?;
                let component_ty = match expr.resolved_type() {
                    ExpressionType::Vector(v) => ExpressionType::Primitive(v.component_type),
                    other => {
                        return Err(CompileError::semantic(format!(
                            "for-each iterates vector components, got {}",
                            other
                        )))
                    }
                };
                self.scopes.push();
                let index = self.declare_variable(var_name, component_ty, *var_index)?;
                let body = self.validate_statement(body)?;
                self.scopes.pop();
                Ok(Statement::ForEach {
                    var_name: var_name.clone(),
                    expr,
                    body: Box::new(body),
                    var_index: Some(index),
                })
            }
            Statement::Multi(statements) => {
                self.scopes.push();
                let mut resolved = Vec::with_capacity(statements.len());
                for statement in statements {
                    resolved.push(self.validate_statement(statement)?);
                }
                self.scopes.pop();
                Ok(Statement::Multi(resolved))
            }
            Statement::NoOp => Ok(Statement::NoOp),
            Statement::Return(expr) => {
                let expected = self
                    .current_return_type
                    .clone()
                    .ok_or_else(|| CompileError::semantic("return outside of a function"))?;
                match expr {
                    Some(expr) => {
                        let resolved = self.validate_expression(expr)?;
                        if resolved.resolved_type() != &expected {
                            return Err(CompileError::semantic(format!(
                                "return type mismatch: expected {}, got {}",
                                expected,
                                resolved.resolved_type()
                            )));
                        }
                        Ok(Statement::Return(Some(resolved)))
                    }
                    None => {
                        if !expected.is_void() {
                            return Err(CompileError::semantic(format!(
                                "return without value in a function returning {}",
                                expected
                            )));
                        }
                        Ok(Statement::Return(None))
                    }
                }
            }
            Statement::While { condition, body } => {
                let condition = self.validate_expression(condition)?;
                if *condition.resolved_type() != ExpressionType::Primitive(PrimitiveType::Bool) {
                    return Err(CompileError::semantic(format!(
                        "while condition must be bool, got {}",
                        condition.resolved_type()
                    )));
                }
                self.scopes.push();
                let body = self.validate_statement(body)?;
                self.scopes.pop();
                Ok(Statement::While {
                    condition,
                    body: Box::new(body),
                })
            }
        }
    }

    fn validate_function(&mut self, func: &DeclareFunction) -> Result<Statement, CompileError> {
        let index = match self.scopes.lookup(&func.name) {
            Some(ScopeEntry::Function { func_index }) => *func_index,
            _ => {
                return Err(CompileError::semantic(format!(
                    "function '{}' must be declared at module scope",
                    func.name
                )))
            }
        };
        let data = self.functions[&index].clone();

        self.scopes.push();
        let first_param_index = func.var_index.unwrap_or(self.next_var_index);
        for (offset, parameter) in data.parameters.iter().enumerate() {
            self.declare_variable(
                &parameter.name,
                parameter.ty.clone(),
                Some(first_param_index + offset as u32),
            )?;
        }
        let param_base = if data.parameters.is_empty() {
            None
        } else {
            Some(first_param_index)
        };

        let previous_return = self.current_return_type.replace(data.return_type.clone());
        let previous_func = self.current_func_index.replace(index);
        self.call_graph.entry(index).or_default();

        let mut statements = Vec::with_capacity(func.statements.len());
        let mut result = Ok(());
        for statement in &func.statements {
            match self.validate_statement(statement) {
                Ok(resolved) => statements.push(resolved),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        self.current_return_type = previous_return;
        self.current_func_index = previous_func;
        self.scopes.pop();
        result?;

        Ok(Statement::DeclareFunction(DeclareFunction {
            name: func.name.clone(),
            parameters: data.parameters.clone(),
            return_type: data.return_type.clone(),
            attributes: func.attributes.clone(),
            statements,
            func_index: Some(index),
            var_index: param_base,
        }))
    }

    /// Bind a variable into scope, reusing `existing` when the tree already
    /// carries an index (revalidation of a reloaded or transformed module).
    fn declare_variable(
        &mut self,
        name: &str,
        ty: ExpressionType,
        existing: Option<u32>,
    ) -> Result<u32, CompileError> {
        let index = match existing {
            Some(index) => index,
            None => self.next_var_index,
        };
        self.next_var_index = self.next_var_index.max(index + 1);
        let shadowed = self.scopes.declare(
            name,
            ScopeEntry::Variable {
                var_index: index,
                ty: ty.clone(),
            },
        );
        if shadowed.is_some() {
            return Err(CompileError::semantic(format!(
                "duplicate declaration of '{}'",
                name
            )));
        }
        self.variables.insert(index, ty);
        Ok(index)
    }

    fn check_entry_signatures(&self) -> Result<(), CompileError> {
        for data in self.functions.values() {
            if data.entry_stage.is_none() {
                continue;
            }
            if data.parameters.len() > 1 {
                return Err(CompileError::semantic(format!(
                    "entry function '{}' must take at most one struct parameter",
                    data.name
                )));
            }
            if let Some(parameter) = data.parameters.first() {
                if !matches!(parameter.ty, ExpressionType::Struct(_)) {
                    return Err(CompileError::semantic(format!(
                        "entry function '{}' parameter must be a struct, got {}",
                        data.name, parameter.ty
                    )));
                }
            }
            if !data.return_type.is_void()
                && !matches!(data.return_type, ExpressionType::Struct(_))
            {
                return Err(CompileError::semantic(format!(
                    "entry function '{}' must return a struct or nothing, got {}",
                    data.name, data.return_type
                )));
            }
        }
        Ok(())
    }
}
