//! Memory layout: size, alignment, and struct member offsets.
//!
//! Follows the WGSL layout rules for host-shareable types. `bool` is laid
//! out like a 32-bit scalar. Pointers have no storable size.

use crate::Module;
use crate::arena::Handle;
use crate::io::IoAttributes;
use crate::types::{ArraySize, StructMember, Type, TypeInner, VectorSize};

fn round_up(alignment: u32, value: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

fn vector_align(size: VectorSize, width: u32) -> u32 {
    match size {
        VectorSize::Bi => 2 * width,
        VectorSize::Tri | VectorSize::Quad => 4 * width,
    }
}

fn scalar_width(width: u8) -> u32 {
    // bool
    if width == 1 { 4 } else { u32::from(width) }
}

impl Module {
    /// Byte size of a value of type `ty`. Runtime-sized arrays report their
    /// stride as the size of a single element.
    pub fn size_of(&self, ty: Handle<Type>) -> u32 {
        match &self.types[ty].inner {
            TypeInner::Scalar(s) | TypeInner::Atomic(s) => scalar_width(s.width),
            TypeInner::Vector { size, scalar } => *size as u32 * scalar_width(scalar.width),
            TypeInner::Matrix {
                columns,
                rows,
                scalar,
            } => {
                let width = scalar_width(scalar.width);
                let column = round_up(vector_align(*rows, width), *rows as u32 * width);
                *columns as u32 * column
            }
            TypeInner::Pointer { .. } => 0,
            TypeInner::Array { size, stride, .. } => match size {
                ArraySize::Constant(n) => n * stride,
                ArraySize::Dynamic => *stride,
            },
            TypeInner::Struct { span, .. } => *span,
        }
    }

    /// Required alignment of a value of type `ty`.
    pub fn align_of(&self, ty: Handle<Type>) -> u32 {
        match &self.types[ty].inner {
            TypeInner::Scalar(s) | TypeInner::Atomic(s) => scalar_width(s.width),
            TypeInner::Vector { size, scalar } => vector_align(*size, scalar_width(scalar.width)),
            TypeInner::Matrix { rows, scalar, .. } => {
                vector_align(*rows, scalar_width(scalar.width))
            }
            TypeInner::Pointer { .. } => 1,
            TypeInner::Array { base, .. } => self.align_of(*base),
            TypeInner::Struct { members, .. } => members
                .iter()
                .map(|m| self.align_of(m.ty))
                .max()
                .unwrap_or(1),
        }
    }

    /// Distance in bytes between consecutive elements of an array of `base`.
    pub fn array_stride(&self, base: Handle<Type>) -> u32 {
        round_up(self.align_of(base), self.size_of(base))
    }

    /// Inserts a named struct, laying its members out in declaration order.
    pub fn new_struct(
        &mut self,
        name: impl Into<String>,
        members: Vec<(String, Handle<Type>, IoAttributes)>,
    ) -> Handle<Type> {
        let mut offset = 0;
        let mut alignment = 1;
        let mut laid_out = Vec::with_capacity(members.len());
        for (name, ty, attributes) in members {
            let align = self.align_of(ty);
            offset = round_up(align, offset);
            alignment = alignment.max(align);
            laid_out.push(StructMember {
                name,
                ty,
                offset,
                attributes,
            });
            offset += self.size_of(ty);
        }
        let span = round_up(alignment, offset);
        self.types.insert(Type {
            name: Some(name.into()),
            inner: TypeInner::Struct {
                members: laid_out,
                span,
            },
        })
    }
}
