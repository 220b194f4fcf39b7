//! shdc intermediate representation.
//!
//! A typed, block-structured SSA IR for GPU shader modules. Every entity is
//! stored in an arena owned by the [`Module`]; instructions refer to their
//! operands, child blocks, and callees through [`Handle`]s.

pub mod arena;
mod builder;
mod display;
mod error;
mod func;
mod inst;
mod io;
mod layout;
mod names;
mod space;
mod types;
pub mod validate;
mod value;

pub use arena::{Arena, Handle, UniqueArena};
pub use builder::Builder;
pub use display::{dump_module, format_type};
pub use error::ValidationError;
pub use func::{Function, FunctionParam, PipelineStage};
pub use inst::{BinaryOp, Block, BuiltinFunction, Instruction, InstructionKind, SwitchCase};
pub use io::{BuiltIn, Interpolation, InterpolationSampling, InterpolationType, IoAttributes};
pub use names::Namer;
pub use space::{AddressSpace, ResourceBinding, StorageAccess};
pub use types::{
    ArraySize, BUILTIN_STRUCT_PREFIX, Bytes, Scalar, ScalarKind, StructMember, Type, TypeInner,
    VectorSize,
};
pub use validate::{Capabilities, validate};
pub use value::{Constant, Literal, Value, ValueKind};

/// A shader module.
#[derive(Clone, Debug)]
pub struct Module {
    /// Deduplicated type arena.
    pub types: UniqueArena<Type>,
    /// Every value: instruction results, parameters, and constants.
    pub values: Arena<Value>,
    pub instructions: Arena<Instruction>,
    pub blocks: Arena<Block>,
    /// Functions in declaration order.
    pub functions: Arena<Function>,
    /// Holds the module-scope `Var` declarations.
    pub root_block: Handle<Block>,
}

impl Default for Module {
    fn default() -> Self {
        let mut blocks = Arena::new();
        let root_block = blocks.append(Block::default());
        Self {
            types: UniqueArena::new(),
            values: Arena::new(),
            instructions: Arena::new(),
            blocks,
            functions: Arena::new(),
            root_block,
        }
    }
}

impl Module {
    pub fn scalar_type(&mut self, scalar: Scalar) -> Handle<Type> {
        self.types.insert(Type::anonymous(TypeInner::Scalar(scalar)))
    }

    pub fn vector_type(&mut self, size: VectorSize, scalar: Scalar) -> Handle<Type> {
        self.types
            .insert(Type::anonymous(TypeInner::Vector { size, scalar }))
    }

    pub fn atomic_type(&mut self, scalar: Scalar) -> Handle<Type> {
        self.types.insert(Type::anonymous(TypeInner::Atomic(scalar)))
    }

    pub fn pointer_type(
        &mut self,
        base: Handle<Type>,
        space: AddressSpace,
        access: StorageAccess,
    ) -> Handle<Type> {
        self.types.insert(Type::anonymous(TypeInner::Pointer {
            base,
            space,
            access,
        }))
    }

    /// A fixed-size array of `count` elements with the natural stride.
    pub fn array_type(&mut self, base: Handle<Type>, count: u32) -> Handle<Type> {
        let stride = self.array_stride(base);
        self.types.insert(Type::anonymous(TypeInner::Array {
            base,
            size: ArraySize::Constant(count),
            stride,
        }))
    }

    /// Appends a constant value.
    pub fn constant(&mut self, ty: Handle<Type>, constant: Constant) -> Handle<Value> {
        self.values.append(Value {
            ty,
            name: None,
            kind: ValueKind::Constant(constant),
        })
    }

    pub fn literal(&mut self, literal: Literal) -> Handle<Value> {
        let ty = self.scalar_type(literal.scalar());
        self.constant(ty, Constant::Scalar(literal))
    }

    pub fn constant_u32(&mut self, value: u32) -> Handle<Value> {
        self.literal(Literal::U32(value))
    }

    pub fn constant_f32(&mut self, value: f32) -> Handle<Value> {
        self.literal(Literal::F32(value))
    }

    pub fn constant_bool(&mut self, value: bool) -> Handle<Value> {
        self.literal(Literal::Bool(value))
    }

    /// The zero value of `ty`: a scalar zero literal, or a zero composite.
    pub fn zero_value(&mut self, ty: Handle<Type>) -> Handle<Value> {
        match self.types[ty].inner {
            TypeInner::Scalar(scalar) => self.constant(ty, Constant::Scalar(Literal::zero(scalar))),
            _ => self.constant(ty, Constant::Zero),
        }
    }

    /// Appends a function with an empty body block.
    pub fn new_function(
        &mut self,
        name: impl Into<String>,
        return_type: Option<Handle<Type>>,
    ) -> Handle<Function> {
        let block = self.blocks.append(Block::default());
        let mut function = Function::new(name, block);
        function.return_type = return_type;
        self.functions.append(function)
    }

    /// Appends a parameter to `function` and returns its value.
    pub fn add_param(
        &mut self,
        function: Handle<Function>,
        name: Option<&str>,
        ty: Handle<Type>,
        attributes: IoAttributes,
    ) -> Handle<Value> {
        let value = self.values.append(Value {
            ty,
            name: name.map(str::to_owned),
            kind: ValueKind::FunctionParam { function },
        });
        self.functions[function]
            .params
            .push(FunctionParam { value, attributes });
        value
    }

    pub fn find_function(&self, name: &str) -> Option<Handle<Function>> {
        self.functions
            .iter()
            .find(|(_, f)| f.name.as_deref() == Some(name))
            .map(|(h, _)| h)
    }

    /// Handles of all entry-point functions, in declaration order.
    pub fn entry_points(&self) -> Vec<Handle<Function>> {
        self.functions
            .iter()
            .filter(|(_, f)| f.is_entry_point())
            .map(|(h, _)| h)
            .collect()
    }

    /// Module-scope variables as `(instruction, pointer value)` pairs.
    pub fn root_vars(&self) -> Vec<(Handle<Instruction>, Handle<Value>)> {
        self.blocks[self.root_block]
            .instructions
            .iter()
            .filter_map(|&inst| match self.instructions[inst] {
                Instruction {
                    kind: InstructionKind::Var { .. },
                    result: Some(result),
                } => Some((inst, result)),
                _ => None,
            })
            .collect()
    }

    pub fn value_type(&self, value: Handle<Value>) -> &TypeInner {
        &self.types[self.values[value].ty].inner
    }

    /// The address space of a pointer-typed value.
    pub fn pointer_space(&self, value: Handle<Value>) -> Option<AddressSpace> {
        match *self.value_type(value) {
            TypeInner::Pointer { space, .. } => Some(space),
            _ => None,
        }
    }

    /// The type a pointer-typed value points at.
    pub fn pointee(&self, value: Handle<Value>) -> Option<Handle<Type>> {
        self.value_type(value).pointer_base()
    }
}
