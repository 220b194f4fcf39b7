//! Values: instruction results, function parameters, and constants.

use crate::arena::Handle;
use crate::func::Function;
use crate::inst::Instruction;
use crate::types::{Scalar, ScalarKind, Type};

/// A scalar literal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    I32(i32),
    U32(u32),
    F32(f32),
    /// An `f16` value, held at `f32` precision.
    F16(f32),
}

impl Literal {
    pub fn scalar(&self) -> Scalar {
        match *self {
            Self::Bool(_) => Scalar::BOOL,
            Self::I32(_) => Scalar::I32,
            Self::U32(_) => Scalar::U32,
            Self::F32(_) => Scalar::F32,
            Self::F16(_) => Scalar::F16,
        }
    }

    /// The zero literal of a scalar type.
    pub fn zero(scalar: Scalar) -> Self {
        match (scalar.kind, scalar.width) {
            (ScalarKind::Bool, _) => Self::Bool(false),
            (ScalarKind::Sint, _) => Self::I32(0),
            (ScalarKind::Uint, _) => Self::U32(0),
            (ScalarKind::Float, 2) => Self::F16(0.0),
            (ScalarKind::Float, _) => Self::F32(0.0),
        }
    }
}

/// A compile-time constant.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Scalar(Literal),
    /// A composite built from other constant values, one per component.
    Composite(Vec<Handle<Value>>),
    /// The zero value of the constant's type, whatever its shape.
    Zero,
}

/// Where a value comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    /// Produced by an instruction; the instruction owns the value.
    InstructionResult(Handle<Instruction>),
    /// A parameter of `function`.
    FunctionParam { function: Handle<Function> },
    Constant(Constant),
}

/// A typed SSA value.
#[derive(Clone, Debug)]
pub struct Value {
    pub ty: Handle<Type>,
    /// User-visible name; unnamed values are never renamed.
    pub name: Option<String>,
    pub kind: ValueKind,
}

impl Value {
    pub fn is_constant(&self) -> bool {
        matches!(self.kind, ValueKind::Constant(_))
    }

    /// The instruction that produced this value, if any.
    pub fn instruction(&self) -> Option<Handle<Instruction>> {
        match self.kind {
            ValueKind::InstructionResult(inst) => Some(inst),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_scalars() {
        assert_eq!(Literal::F32(1.0).scalar(), Scalar::F32);
        assert_eq!(Literal::I32(-1).scalar(), Scalar::I32);
        assert_eq!(Literal::U32(42).scalar(), Scalar::U32);
        assert_eq!(Literal::F16(0.5).scalar(), Scalar::F16);
    }

    #[test]
    fn zero_literals() {
        assert_eq!(Literal::zero(Scalar::BOOL), Literal::Bool(false));
        assert_eq!(Literal::zero(Scalar::U32), Literal::U32(0));
        assert_eq!(Literal::zero(Scalar::F16), Literal::F16(0.0));
        assert_eq!(Literal::zero(Scalar::F32), Literal::F32(0.0));
    }
}
