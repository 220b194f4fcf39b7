//! Instructions and blocks.

use crate::arena::Handle;
use crate::func::Function;
use crate::space::ResourceBinding;
use crate::value::Value;

/// An ordered list of instructions.
///
/// Blocks owned by a function or a control instruction end with exactly one
/// terminator. The module root block holds module-scope `Var`s and has no
/// terminator.
#[derive(Clone, Debug, Default)]
pub struct Block {
    pub instructions: Vec<Handle<Instruction>>,
}

impl Block {
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// A binary operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Xor,
    ShiftLeft,
    ShiftRight,
}

impl BinaryOp {
    /// Returns `true` for operators producing `bool`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::LessEqual
                | Self::Greater
                | Self::GreaterEqual
        )
    }
}

/// A builtin function callable through [`InstructionKind::BuiltinCall`].
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BuiltinFunction {
    AtomicLoad,
    AtomicStore,
    AtomicAdd,
    WorkgroupBarrier,
    StorageBarrier,
    Select,
    Min,
    Max,
}

impl BuiltinFunction {
    /// The source-level identifier; it must stay resolvable wherever the
    /// builtin is called.
    pub fn name(self) -> &'static str {
        match self {
            Self::AtomicLoad => "atomicLoad",
            Self::AtomicStore => "atomicStore",
            Self::AtomicAdd => "atomicAdd",
            Self::WorkgroupBarrier => "workgroupBarrier",
            Self::StorageBarrier => "storageBarrier",
            Self::Select => "select",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// One case of a `Switch`.
#[derive(Clone, Debug)]
pub struct SwitchCase {
    /// Constant selectors; `None` is the `default` selector.
    pub selectors: Vec<Option<Handle<Value>>>,
    pub block: Handle<Block>,
}

/// The operation an instruction performs.
#[derive(Clone, Debug)]
pub enum InstructionKind {
    /// Declares a variable; the result is a pointer to its storage.
    Var {
        initializer: Option<Handle<Value>>,
        binding: Option<ResourceBinding>,
    },
    /// Binds a value to a (usually named) result.
    Let { value: Handle<Value> },
    /// Builds a composite of the result type from its components.
    Construct { args: Vec<Handle<Value>> },
    /// Indexes into a composite value or through a pointer to one.
    Access {
        object: Handle<Value>,
        indices: Vec<Handle<Value>>,
    },
    Load { from: Handle<Value> },
    Store {
        to: Handle<Value>,
        value: Handle<Value>,
    },
    Binary {
        op: BinaryOp,
        lhs: Handle<Value>,
        rhs: Handle<Value>,
    },
    BuiltinCall {
        function: BuiltinFunction,
        args: Vec<Handle<Value>>,
    },
    UserCall {
        function: Handle<Function>,
        args: Vec<Handle<Value>>,
    },
    If {
        condition: Handle<Value>,
        accept: Handle<Block>,
        reject: Handle<Block>,
    },
    /// A loop: `initializer` runs once, then `body` and `continuing` repeat.
    Loop {
        initializer: Handle<Block>,
        body: Handle<Block>,
        continuing: Handle<Block>,
    },
    Switch {
        selector: Handle<Value>,
        cases: Vec<SwitchCase>,
    },
    Return { value: Option<Handle<Value>> },
    /// Leaves the innermost `If`.
    ExitIf,
    /// Leaves the innermost `Loop`.
    ExitLoop,
    /// Leaves the innermost `Switch`.
    ExitSwitch,
    /// Jumps from a loop body to its continuing block.
    Continue,
    /// Jumps from a loop initializer or continuing block to the body.
    NextIteration,
    /// Ends a continuing block: leaves the loop if `condition` holds.
    BreakIf { condition: Handle<Value> },
    Unreachable,
}

impl InstructionKind {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Return { .. }
                | Self::ExitIf
                | Self::ExitLoop
                | Self::ExitSwitch
                | Self::Continue
                | Self::NextIteration
                | Self::BreakIf { .. }
                | Self::Unreachable
        )
    }

    pub fn is_control(&self) -> bool {
        matches!(self, Self::If { .. } | Self::Loop { .. } | Self::Switch { .. })
    }

    /// Returns every value operand, in operand order.
    pub fn operands(&self) -> Vec<Handle<Value>> {
        match self {
            Self::Var { initializer, .. } => initializer.iter().copied().collect(),
            Self::Let { value } => vec![*value],
            Self::Construct { args }
            | Self::BuiltinCall { args, .. }
            | Self::UserCall { args, .. } => args.clone(),
            Self::Access { object, indices } => {
                let mut ops = vec![*object];
                ops.extend(indices.iter().copied());
                ops
            }
            Self::Load { from } => vec![*from],
            Self::Store { to, value } => vec![*to, *value],
            Self::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Self::If { condition, .. } => vec![*condition],
            Self::Switch { selector, cases } => {
                let mut ops = vec![*selector];
                for case in cases {
                    ops.extend(case.selectors.iter().flatten().copied());
                }
                ops
            }
            Self::Return { value } => value.iter().copied().collect(),
            Self::BreakIf { condition } => vec![*condition],
            Self::Loop { .. }
            | Self::ExitIf
            | Self::ExitLoop
            | Self::ExitSwitch
            | Self::Continue
            | Self::NextIteration
            | Self::Unreachable => Vec::new(),
        }
    }

    /// Rewrites every operand through `f`.
    pub fn map_operands(&mut self, mut f: impl FnMut(Handle<Value>) -> Handle<Value>) {
        match self {
            Self::Var { initializer, .. } => {
                if let Some(init) = initializer {
                    *init = f(*init);
                }
            }
            Self::Let { value } => *value = f(*value),
            Self::Construct { args }
            | Self::BuiltinCall { args, .. }
            | Self::UserCall { args, .. } => {
                for arg in args {
                    *arg = f(*arg);
                }
            }
            Self::Access { object, indices } => {
                *object = f(*object);
                for index in indices {
                    *index = f(*index);
                }
            }
            Self::Load { from } => *from = f(*from),
            Self::Store { to, value } => {
                *to = f(*to);
                *value = f(*value);
            }
            Self::Binary { lhs, rhs, .. } => {
                *lhs = f(*lhs);
                *rhs = f(*rhs);
            }
            Self::If { condition, .. } | Self::BreakIf { condition } => {
                *condition = f(*condition);
            }
            Self::Switch { selector, cases } => {
                *selector = f(*selector);
                for selector in cases.iter_mut().flat_map(|c| c.selectors.iter_mut().flatten()) {
                    *selector = f(*selector);
                }
            }
            Self::Return { value } => {
                if let Some(v) = value {
                    *v = f(*v);
                }
            }
            Self::Loop { .. }
            | Self::ExitIf
            | Self::ExitLoop
            | Self::ExitSwitch
            | Self::Continue
            | Self::NextIteration
            | Self::Unreachable => {}
        }
    }

    /// Returns the child blocks owned by a control instruction.
    pub fn blocks(&self) -> Vec<Handle<Block>> {
        match self {
            Self::If { accept, reject, .. } => vec![*accept, *reject],
            Self::Loop {
                initializer,
                body,
                continuing,
            } => vec![*initializer, *body, *continuing],
            Self::Switch { cases, .. } => cases.iter().map(|c| c.block).collect(),
            _ => Vec::new(),
        }
    }
}

/// An instruction and its optional result.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub kind: InstructionKind,
    /// The value this instruction produces; owned by the instruction.
    pub result: Option<Handle<Value>>,
}
