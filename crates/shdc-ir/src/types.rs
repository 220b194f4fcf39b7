//! Type system for the shdc IR.

use crate::arena::Handle;
use crate::io::IoAttributes;
use crate::space::{AddressSpace, StorageAccess};

/// Width of a scalar type in bytes.
pub type Bytes = u8;

/// Name prefix reserved for compiler-generated builtin structs
/// (e.g. `__frexp_result_f32`).
pub const BUILTIN_STRUCT_PREFIX: &str = "__";

/// The kind of a scalar type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ScalarKind {
    Bool,
    Sint,
    Uint,
    Float,
}

/// A scalar type: kind + byte width.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Scalar {
    pub kind: ScalarKind,
    pub width: Bytes,
}

impl Scalar {
    pub const BOOL: Self = Self {
        kind: ScalarKind::Bool,
        width: 1,
    };
    pub const I32: Self = Self {
        kind: ScalarKind::Sint,
        width: 4,
    };
    pub const U32: Self = Self {
        kind: ScalarKind::Uint,
        width: 4,
    };
    pub const F16: Self = Self {
        kind: ScalarKind::Float,
        width: 2,
    };
    pub const F32: Self = Self {
        kind: ScalarKind::Float,
        width: 4,
    };
}

/// Number of components in a vector.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum VectorSize {
    Bi = 2,
    Tri = 3,
    Quad = 4,
}

/// Size of an array.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ArraySize {
    /// Fixed element count.
    Constant(u32),
    /// Runtime-sized; only legal in storage buffers.
    Dynamic,
}

/// A member of a struct type.
///
/// Member order defines layout, so passes visit members in this order.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct StructMember {
    pub name: String,
    pub ty: Handle<Type>,
    /// Byte offset from the start of the struct.
    pub offset: u32,
    /// Shader I/O attributes; empty for data-only members.
    pub attributes: IoAttributes,
}

/// A possibly named type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Type {
    pub name: Option<String>,
    pub inner: TypeInner,
}

impl Type {
    /// An unnamed type.
    pub fn anonymous(inner: TypeInner) -> Self {
        Self { name: None, inner }
    }

    /// Returns `true` for compiler-generated structs such as the result of
    /// `frexp` or `atomicCompareExchangeWeak`.
    pub fn is_builtin_struct(&self) -> bool {
        matches!(self.inner, TypeInner::Struct { .. })
            && self
                .name
                .as_deref()
                .is_some_and(|name| name.starts_with(BUILTIN_STRUCT_PREFIX))
    }
}

/// The concrete shape of a type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum TypeInner {
    Scalar(Scalar),
    Vector {
        size: VectorSize,
        scalar: Scalar,
    },
    /// A matrix of `columns` column vectors with `rows` components each.
    Matrix {
        columns: VectorSize,
        rows: VectorSize,
        scalar: Scalar,
    },
    Atomic(Scalar),
    Pointer {
        base: Handle<Type>,
        space: AddressSpace,
        access: StorageAccess,
    },
    Array {
        base: Handle<Type>,
        size: ArraySize,
        stride: u32,
    },
    Struct {
        members: Vec<StructMember>,
        span: u32,
    },
}

impl TypeInner {
    /// The pointee of a pointer type.
    pub fn pointer_base(&self) -> Option<Handle<Type>> {
        match *self {
            Self::Pointer { base, .. } => Some(base),
            _ => None,
        }
    }

    /// The element count of a fixed-size array.
    pub fn constant_array_len(&self) -> Option<u32> {
        match *self {
            Self::Array {
                size: ArraySize::Constant(n),
                ..
            } => Some(n),
            _ => None,
        }
    }

    pub fn struct_members(&self) -> Option<&[StructMember]> {
        match self {
            Self::Struct { members, .. } => Some(members),
            _ => None,
        }
    }
}
