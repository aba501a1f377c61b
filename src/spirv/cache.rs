//! Deduplicating type/constant/global-variable registry.
//!
//! Every distinct type, constant value and global variable gets exactly one
//! result id, keyed by structural equality, so two uses of `float` or of
//! the literal `1.0` share one id. The cache owns the module's single
//! monotonically increasing id allocator; the final header's "bound" field
//! is whatever the allocator reaches. One cache instance lives for one
//! `generate` call.

use std::collections::BTreeMap;

use super::ops::{SpirvImageDim, SpirvOp, SpirvStorageClass};
use super::section::{string_words, SpirvSection};
use crate::ast::*;
use crate::validate::Module;

/// Structural identity of a SPIR-V type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeKey {
    Void,
    Bool,
    Int { signed: bool },
    Float,
    Vector { component: Box<TypeKey>, count: u32 },
    Matrix { column: Box<TypeKey>, columns: u32 },
    Image { sampled: Box<TypeKey>, dim: SpirvImageDim, arrayed: bool },
    SampledImage { image: Box<TypeKey> },
    Struct { index: u32 },
    Pointer { storage: SpirvStorageClass, pointee: Box<TypeKey> },
    Function { return_type: Box<TypeKey>, parameters: Vec<TypeKey> },
}

/// Structural identity of a constant. Floats are keyed by bit pattern.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConstKey {
    Bool(bool),
    F32(u32),
    I32(i32),
    U32(u32),
    Composite { ty: TypeKey, components: Vec<ConstKey> },
}

#[derive(Clone, Debug)]
pub struct GlobalVariable {
    pub id: u32,
    pub pointer_type_id: u32,
    pub storage: SpirvStorageClass,
    pub debug_name: String,
}

/// Registration-ordered entries; dependencies always precede dependents.
enum CacheEntry {
    Type(TypeKey, u32),
    Const(ConstKey, u32),
}

pub struct SpirvConstantCache {
    next_id: u32,
    types: BTreeMap<TypeKey, u32>,
    constants: BTreeMap<ConstKey, u32>,
    entries: Vec<CacheEntry>,
    globals: Vec<GlobalVariable>,
}

impl SpirvConstantCache {
    /// Ids start at 1; id 0 is invalid in SPIR-V.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            types: BTreeMap::new(),
            constants: BTreeMap::new(),
            entries: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// One past the highest allocated id; the module header's "bound".
    pub fn bound(&self) -> u32 {
        self.next_id
    }

    // --- Keys ---

    /// The structural key for an AST type. Uniform wrappers share the
    /// underlying struct type; the difference lives in the pointer storage
    /// class and the Block decoration.
    pub fn type_key(ty: &ExpressionType) -> TypeKey {
        match ty {
            ExpressionType::Void => TypeKey::Void,
            ExpressionType::Primitive(p) => Self::primitive_key(*p),
            ExpressionType::Vector(v) => TypeKey::Vector {
                component: Box::new(Self::primitive_key(v.component_type)),
                count: v.component_count,
            },
            ExpressionType::Matrix(m) => TypeKey::Matrix {
                column: Box::new(TypeKey::Vector {
                    component: Box::new(Self::primitive_key(m.component_type)),
                    count: m.row_count,
                }),
                columns: m.column_count,
            },
            ExpressionType::Sampler(s) => {
                let (dim, arrayed) = image_dim(s.dim);
                TypeKey::SampledImage {
                    image: Box::new(TypeKey::Image {
                        sampled: Box::new(Self::primitive_key(s.sampled_type)),
                        dim,
                        arrayed,
                    }),
                }
            }
            ExpressionType::Struct(index) => TypeKey::Struct { index: *index },
            ExpressionType::Uniform(inner) => Self::type_key(inner),
            ExpressionType::Identifier(name) => {
                panic!("unresolved type '{}' reached the SPIR-V writer", name)
            }
        }
    }

    fn primitive_key(p: PrimitiveType) -> TypeKey {
        match p {
            PrimitiveType::Bool => TypeKey::Bool,
            PrimitiveType::Float32 => TypeKey::Float,
            PrimitiveType::Int32 => TypeKey::Int { signed: true },
            PrimitiveType::UInt32 => TypeKey::Int { signed: false },
        }
    }

    // --- Registration ---

    pub fn register_type(&mut self, module: &Module, ty: &ExpressionType) -> u32 {
        let key = Self::type_key(ty);
        self.register_type_key(module, key)
    }

    fn register_type_key(&mut self, module: &Module, key: TypeKey) -> u32 {
        if let Some(id) = self.types.get(&key) {
            return *id;
        }

        // Register dependencies first so write-out order is valid.
        match &key {
            TypeKey::Vector { component, .. } => {
                self.register_type_key(module, (**component).clone());
            }
            TypeKey::Matrix { column, .. } => {
                self.register_type_key(module, (**column).clone());
            }
            TypeKey::Image { sampled, .. } => {
                self.register_type_key(module, (**sampled).clone());
            }
            TypeKey::SampledImage { image } => {
                self.register_type_key(module, (**image).clone());
            }
            TypeKey::Struct { index } => {
                let desc = module.struct_desc(*index).clone();
                for member in &desc.members {
                    self.register_type(module, &member.ty);
                }
            }
            TypeKey::Pointer { pointee, .. } => {
                self.register_type_key(module, (**pointee).clone());
            }
            TypeKey::Function {
                return_type,
                parameters,
            } => {
                self.register_type_key(module, (**return_type).clone());
                for parameter in parameters.clone() {
                    self.register_type_key(module, parameter);
                }
            }
            _ => {}
        }

        let id = self.allocate_id();
        self.types.insert(key.clone(), id);
        self.entries.push(CacheEntry::Type(key, id));
        id
    }

    pub fn register_pointer(
        &mut self,
        module: &Module,
        ty: &ExpressionType,
        storage: SpirvStorageClass,
    ) -> u32 {
        let pointee = Self::type_key(ty);
        self.register_type_key(
            module,
            TypeKey::Pointer {
                storage,
                pointee: Box::new(pointee),
            },
        )
    }

    pub fn register_function_type(
        &mut self,
        module: &Module,
        return_type: &ExpressionType,
        parameters: &[ExpressionType],
    ) -> u32 {
        let key = TypeKey::Function {
            return_type: Box::new(Self::type_key(return_type)),
            parameters: parameters.iter().map(Self::type_key).collect(),
        };
        self.register_type_key(module, key)
    }

    pub fn register_constant(&mut self, module: &Module, value: &ConstantValue) -> u32 {
        // The constant's type must exist before the constant itself.
        self.register_type(module, &value.expression_type());
        let key = Self::constant_key(value);
        self.register_constant_key(key)
    }

    /// A plain i32 constant (member indices for access chains).
    pub fn register_i32_constant(&mut self, module: &Module, value: i32) -> u32 {
        self.register_constant(module, &ConstantValue::Int32(value))
    }

    fn constant_key(value: &ConstantValue) -> ConstKey {
        let float_vec = |v: &[f32]| ConstKey::Composite {
            ty: TypeKey::Vector {
                component: Box::new(TypeKey::Float),
                count: v.len() as u32,
            },
            components: v.iter().map(|c| ConstKey::F32(c.to_bits())).collect(),
        };
        let int_vec = |v: &[i32]| ConstKey::Composite {
            ty: TypeKey::Vector {
                component: Box::new(TypeKey::Int { signed: true }),
                count: v.len() as u32,
            },
            components: v.iter().map(|c| ConstKey::I32(*c)).collect(),
        };
        match value {
            ConstantValue::Bool(v) => ConstKey::Bool(*v),
            ConstantValue::Float32(v) => ConstKey::F32(v.to_bits()),
            ConstantValue::Int32(v) => ConstKey::I32(*v),
            ConstantValue::UInt32(v) => ConstKey::U32(*v),
            ConstantValue::Vec2Float(v) => float_vec(v),
            ConstantValue::Vec3Float(v) => float_vec(v),
            ConstantValue::Vec4Float(v) => float_vec(v),
            ConstantValue::Vec2Int(v) => int_vec(v),
            ConstantValue::Vec3Int(v) => int_vec(v),
            ConstantValue::Vec4Int(v) => int_vec(v),
        }
    }

    fn register_constant_key(&mut self, key: ConstKey) -> u32 {
        if let Some(id) = self.constants.get(&key) {
            return *id;
        }
        if let ConstKey::Composite { components, .. } = &key {
            for component in components.clone() {
                self.register_constant_key(component);
            }
        }
        let id = self.allocate_id();
        self.constants.insert(key.clone(), id);
        self.entries.push(CacheEntry::Const(key, id));
        id
    }

    /// Register a module-scope variable (interface/external). Returns its
    /// pointer id.
    pub fn register_global(
        &mut self,
        module: &Module,
        ty: &ExpressionType,
        storage: SpirvStorageClass,
        debug_name: &str,
    ) -> u32 {
        let pointer_type_id = self.register_pointer(module, ty, storage);
        let id = self.allocate_id();
        self.globals.push(GlobalVariable {
            id,
            pointer_type_id,
            storage,
            debug_name: debug_name.to_string(),
        });
        id
    }

    // --- Lookup ---

    pub fn type_id(&self, key: &TypeKey) -> u32 {
        *self
            .types
            .get(key)
            .unwrap_or_else(|| panic!("type {:?} was never registered", key))
    }

    pub fn expression_type_id(&self, ty: &ExpressionType) -> u32 {
        self.type_id(&Self::type_key(ty))
    }

    pub fn constant_id(&self, value: &ConstantValue) -> u32 {
        let key = Self::constant_key(value);
        *self
            .constants
            .get(&key)
            .unwrap_or_else(|| panic!("constant {:?} was never registered", value))
    }

    // --- Write-out ---

    /// Emit the deduplicated type/constant section followed by the global
    /// variables, and `OpName`s for globals into the debug section.
    pub fn write(&self, module: &Module, constants: &mut SpirvSection, debug: &mut SpirvSection) {
        for entry in &self.entries {
            match entry {
                CacheEntry::Type(key, id) => self.write_type(module, constants, key, *id),
                CacheEntry::Const(key, id) => self.write_constant(constants, key, *id),
            }
        }
        for global in &self.globals {
            constants.append(
                SpirvOp::OpVariable,
                &[global.pointer_type_id, global.id, global.storage as u32],
            );
            let mut operands = vec![global.id];
            operands.extend(string_words(&global.debug_name));
            debug.append(SpirvOp::OpName, &operands);
        }
    }

    fn write_type(&self, module: &Module, out: &mut SpirvSection, key: &TypeKey, id: u32) {
        match key {
            TypeKey::Void => out.append(SpirvOp::OpTypeVoid, &[id]),
            TypeKey::Bool => out.append(SpirvOp::OpTypeBool, &[id]),
            TypeKey::Int { signed } => {
                out.append(SpirvOp::OpTypeInt, &[id, 32, *signed as u32])
            }
            TypeKey::Float => out.append(SpirvOp::OpTypeFloat, &[id, 32]),
            TypeKey::Vector { component, count } => {
                let component_id = self.type_id(component);
                out.append(SpirvOp::OpTypeVector, &[id, component_id, *count]);
            }
            TypeKey::Matrix { column, columns } => {
                let column_id = self.type_id(column);
                out.append(SpirvOp::OpTypeMatrix, &[id, column_id, *columns]);
            }
            TypeKey::Image { sampled, dim, arrayed } => {
                let sampled_id = self.type_id(sampled);
                // depth=0, ms=0, sampled=1, format=Unknown.
                out.append(
                    SpirvOp::OpTypeImage,
                    &[id, sampled_id, *dim as u32, 0, *arrayed as u32, 0, 1, 0],
                );
            }
            TypeKey::SampledImage { image } => {
                let image_id = self.type_id(image);
                out.append(SpirvOp::OpTypeSampledImage, &[id, image_id]);
            }
            TypeKey::Struct { index } => {
                let desc = module.struct_desc(*index);
                let mut operands = vec![id];
                for member in &desc.members {
                    operands.push(self.expression_type_id(&member.ty));
                }
                out.append(SpirvOp::OpTypeStruct, &operands);
            }
            TypeKey::Pointer { storage, pointee } => {
                let pointee_id = self.type_id(pointee);
                out.append(SpirvOp::OpTypePointer, &[id, *storage as u32, pointee_id]);
            }
            TypeKey::Function {
                return_type,
                parameters,
            } => {
                let mut operands = vec![id, self.type_id(return_type)];
                for parameter in parameters {
                    operands.push(self.type_id(parameter));
                }
                out.append(SpirvOp::OpTypeFunction, &operands);
            }
        }
    }

    fn write_constant(&self, out: &mut SpirvSection, key: &ConstKey, id: u32) {
        match key {
            ConstKey::Bool(v) => {
                let type_id = self.type_id(&TypeKey::Bool);
                let op = if *v {
                    SpirvOp::OpConstantTrue
                } else {
                    SpirvOp::OpConstantFalse
                };
                out.append(op, &[type_id, id]);
            }
            ConstKey::F32(bits) => {
                let type_id = self.type_id(&TypeKey::Float);
                out.append(SpirvOp::OpConstant, &[type_id, id, *bits]);
            }
            ConstKey::I32(v) => {
                let type_id = self.type_id(&TypeKey::Int { signed: true });
                out.append(SpirvOp::OpConstant, &[type_id, id, *v as u32]);
            }
            ConstKey::U32(v) => {
                let type_id = self.type_id(&TypeKey::Int { signed: false });
                out.append(SpirvOp::OpConstant, &[type_id, id, *v]);
            }
            ConstKey::Composite { ty, components } => {
                let mut operands = vec![self.type_id(ty), id];
                for component in components {
                    operands.push(
                        *self
                            .constants
                            .get(component)
                            .expect("composite component registered before composite"),
                    );
                }
                out.append(SpirvOp::OpConstantComposite, &operands);
            }
        }
    }
}

fn image_dim(dim: ImageDim) -> (SpirvImageDim, bool) {
    match dim {
        ImageDim::Dim1D => (SpirvImageDim::Dim1D, false),
        ImageDim::Dim1DArray => (SpirvImageDim::Dim1D, true),
        ImageDim::Dim2D => (SpirvImageDim::Dim2D, false),
        ImageDim::Dim2DArray => (SpirvImageDim::Dim2D, true),
        ImageDim::Dim3D => (SpirvImageDim::Dim3D, false),
        ImageDim::Cubemap => (SpirvImageDim::Cube, false),
    }
}

impl Default for SpirvConstantCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build;

    fn empty_module() -> Module {
        Module::rebuild(Statement::NoOp)
    }

    #[test]
    fn test_types_are_deduplicated() {
        let module = empty_module();
        let mut cache = SpirvConstantCache::new();
        let a = cache.register_type(&module, &build::float());
        let b = cache.register_type(&module, &build::float());
        assert_eq!(a, b);

        let v3 = cache.register_type(&module, &build::vec3());
        let v3_again = cache.register_type(&module, &build::vec3());
        assert_eq!(v3, v3_again);
        assert_ne!(a, v3);
    }

    #[test]
    fn test_constants_are_deduplicated() {
        let module = empty_module();
        let mut cache = SpirvConstantCache::new();
        let one = cache.register_constant(&module, &ConstantValue::Float32(1.0));
        let one_again = cache.register_constant(&module, &ConstantValue::Float32(1.0));
        let two = cache.register_constant(&module, &ConstantValue::Float32(2.0));
        assert_eq!(one, one_again);
        assert_ne!(one, two);
    }

    #[test]
    fn test_vector_constant_registers_scalar_components() {
        let module = empty_module();
        let mut cache = SpirvConstantCache::new();
        cache.register_constant(&module, &ConstantValue::Vec2Float([1.0, 2.0]));
        // The scalar components exist and are shared.
        let one = cache.constant_id(&ConstantValue::Float32(1.0));
        let one_direct = cache.register_constant(&module, &ConstantValue::Float32(1.0));
        assert_eq!(one, one_direct);
    }

    #[test]
    fn test_bound_is_one_past_last_id() {
        let module = empty_module();
        let mut cache = SpirvConstantCache::new();
        assert_eq!(cache.bound(), 1);
        let id = cache.register_type(&module, &build::boolean());
        assert_eq!(cache.bound(), id + 1);
    }

    #[test]
    fn test_write_orders_dependencies_first() {
        let module = empty_module();
        let mut cache = SpirvConstantCache::new();
        cache.register_constant(&module, &ConstantValue::Vec3Float([0.0, 0.5, 1.0]));

        let mut constants = SpirvSection::new();
        let mut debug = SpirvSection::new();
        cache.write(&module, &mut constants, &mut debug);

        // First instruction must be the scalar float type, not the vector
        // or the composite.
        let words = constants.words();
        let first_op = words[0] & 0xFFFF;
        assert_eq!(first_op, SpirvOp::OpTypeFloat as u32);
    }
}
