//! A reference interpreter for IR modules.
//!
//! Runs functions over concrete values so tests can compare what a module
//! computes before and after a transform. Workgroup variables start out
//! holding garbage, and every store into them is logged.

use std::collections::HashMap;

use shdc_ir::{
    AddressSpace, BinaryOp, Block, BuiltinFunction, Constant, Function, Handle, Instruction,
    InstructionKind, Literal, Module, Scalar, ScalarKind, Type, TypeInner, Value, ValueKind,
};

const MAX_LOOP_ITERATIONS: usize = 1 << 16;

#[derive(Clone, Debug, PartialEq)]
pub enum Val {
    Bool(bool),
    I32(i32),
    U32(u32),
    F32(f32),
    Composite(Vec<Val>),
    Ptr(Pointer),
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Root {
    /// A module-scope variable.
    Global(Handle<Value>),
    /// A function-scope variable, numbered in allocation order.
    Local(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pointer {
    pub root: Root,
    pub path: Vec<usize>,
}

/// A store into workgroup memory.
#[derive(Clone, Debug, PartialEq)]
pub struct Write {
    pub var: Handle<Value>,
    pub path: Vec<usize>,
    pub value: Val,
    pub invocation: u32,
}

impl Val {
    pub fn zero(module: &Module, ty: Handle<Type>) -> Self {
        Self::fill(module, ty, &|scalar| Self::from_literal(Literal::zero(scalar)))
    }

    /// A recognizable non-zero value of `ty`.
    pub fn garbage(module: &Module, ty: Handle<Type>) -> Self {
        Self::fill(module, ty, &|scalar| match scalar.kind {
            ScalarKind::Bool => Self::Bool(true),
            ScalarKind::Sint => Self::I32(-7),
            ScalarKind::Uint => Self::U32(0xDEAD_BEEF),
            ScalarKind::Float => Self::F32(13.5),
        })
    }

    fn fill(module: &Module, ty: Handle<Type>, leaf: &dyn Fn(Scalar) -> Self) -> Self {
        match &module.types[ty].inner {
            TypeInner::Scalar(scalar) | TypeInner::Atomic(scalar) => leaf(*scalar),
            TypeInner::Vector { size, scalar } => {
                Self::Composite(vec![leaf(*scalar); *size as usize])
            }
            TypeInner::Matrix {
                columns,
                rows,
                scalar,
            } => Self::Composite(vec![
                Self::Composite(vec![leaf(*scalar); *rows as usize]);
                *columns as usize
            ]),
            TypeInner::Array { base, .. } => {
                let len = module.types[ty].inner.constant_array_len().unwrap_or(0);
                Self::Composite((0..len).map(|_| Self::fill(module, *base, leaf)).collect())
            }
            TypeInner::Struct { members, .. } => Self::Composite(
                members
                    .iter()
                    .map(|m| Self::fill(module, m.ty, leaf))
                    .collect(),
            ),
            TypeInner::Pointer { .. } => panic!("pointer types have no storage"),
        }
    }

    pub fn from_literal(literal: Literal) -> Self {
        match literal {
            Literal::Bool(v) => Self::Bool(v),
            Literal::I32(v) => Self::I32(v),
            Literal::U32(v) => Self::U32(v),
            Literal::F32(v) | Literal::F16(v) => Self::F32(v),
        }
    }

    /// Returns `true` if every leaf is zero or `false`.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Bool(v) => !v,
            Self::I32(v) => *v == 0,
            Self::U32(v) => *v == 0,
            Self::F32(v) => *v == 0.0,
            Self::Composite(items) => items.iter().all(Self::is_zero),
            Self::Ptr(_) => false,
        }
    }

    fn as_index(&self) -> usize {
        match *self {
            Self::U32(v) => v as usize,
            Self::I32(v) => usize::try_from(v).expect("negative index"),
            ref other => panic!("not an index: {other:?}"),
        }
    }

    fn as_bool(&self) -> bool {
        match *self {
            Self::Bool(v) => v,
            ref other => panic!("not a bool: {other:?}"),
        }
    }

    fn as_pointer(&self) -> &Pointer {
        match self {
            Self::Ptr(ptr) => ptr,
            other => panic!("not a pointer: {other:?}"),
        }
    }
}

/// How a block ended.
#[derive(Debug)]
enum Flow {
    /// The block was empty or ran off its end.
    FallThrough,
    Return(Option<Val>),
    ExitIf,
    ExitLoop,
    ExitSwitch,
    Continue,
    NextIteration,
    BreakIf(bool),
}

#[derive(Default)]
struct Frame {
    values: HashMap<Handle<Value>, Val>,
}

pub struct Evaluator<'m> {
    module: &'m Module,
    memory: HashMap<Root, Val>,
    next_local: usize,
    /// Tags the writes of the invocation currently running.
    pub invocation: u32,
    pub writes: Vec<Write>,
    pub barriers: usize,
}

impl<'m> Evaluator<'m> {
    pub fn new(module: &'m Module) -> Self {
        let mut eval = Self {
            module,
            memory: HashMap::new(),
            next_local: 0,
            invocation: 0,
            writes: Vec::new(),
            barriers: 0,
        };
        for (inst, var) in module.root_vars() {
            let ty = module.pointee(var).expect("variables are pointers");
            let initial = match (module.pointer_space(var), &module.instructions[inst].kind) {
                (Some(AddressSpace::Workgroup), _) => Val::garbage(module, ty),
                (
                    _,
                    InstructionKind::Var {
                        initializer: Some(init),
                        ..
                    },
                ) => eval.constant(*init),
                _ => Val::zero(module, ty),
            };
            eval.memory.insert(Root::Global(var), initial);
        }
        eval
    }

    /// The current contents of a module-scope variable.
    pub fn global(&self, var: Handle<Value>) -> &Val {
        &self.memory[&Root::Global(var)]
    }

    /// Workgroup writes into `var`, in execution order.
    pub fn writes_to(&self, var: Handle<Value>) -> Vec<&Write> {
        self.writes.iter().filter(|w| w.var == var).collect()
    }

    pub fn call(&mut self, function: Handle<Function>, args: Vec<Val>) -> Option<Val> {
        let f = &self.module.functions[function];
        assert_eq!(
            f.params.len(),
            args.len(),
            "wrong argument count for {:?}",
            f.name
        );
        let mut frame = Frame::default();
        for (param, arg) in f.params.iter().zip(args) {
            frame.values.insert(param.value, arg);
        }
        match self.exec_block(&mut frame, f.block) {
            Flow::Return(value) => value,
            other => panic!("function {:?} ended with {other:?}", f.name),
        }
    }

    fn constant(&self, value: Handle<Value>) -> Val {
        let v = &self.module.values[value];
        match &v.kind {
            ValueKind::Constant(Constant::Scalar(literal)) => Val::from_literal(*literal),
            ValueKind::Constant(Constant::Composite(parts)) => {
                Val::Composite(parts.iter().map(|&p| self.constant(p)).collect())
            }
            ValueKind::Constant(Constant::Zero) => Val::zero(self.module, v.ty),
            other => panic!("{value:?} is not a constant: {other:?}"),
        }
    }

    fn value(&self, frame: &Frame, value: Handle<Value>) -> Val {
        if self.module.values[value].is_constant() {
            return self.constant(value);
        }
        if let Some(v) = frame.values.get(&value) {
            return v.clone();
        }
        let root = Root::Global(value);
        assert!(
            self.memory.contains_key(&root),
            "{value:?} read before its definition"
        );
        Val::Ptr(Pointer {
            root,
            path: Vec::new(),
        })
    }

    fn read(&self, ptr: &Pointer) -> Val {
        let mut slot = &self.memory[&ptr.root];
        for &i in &ptr.path {
            slot = match slot {
                Val::Composite(items) => &items[i],
                other => panic!("cannot index {other:?}"),
            };
        }
        slot.clone()
    }

    fn write(&mut self, ptr: &Pointer, value: Val) {
        if let Root::Global(var) = ptr.root
            && self.module.pointer_space(var) == Some(AddressSpace::Workgroup)
        {
            self.writes.push(Write {
                var,
                path: ptr.path.clone(),
                value: value.clone(),
                invocation: self.invocation,
            });
        }
        let mut slot = self.memory.get_mut(&ptr.root).expect("dangling pointer");
        for &i in &ptr.path {
            slot = match slot {
                Val::Composite(items) => &mut items[i],
                other => panic!("cannot index {other:?}"),
            };
        }
        *slot = value;
    }

    fn exec_block(&mut self, frame: &mut Frame, block: Handle<Block>) -> Flow {
        let module = self.module;
        for &inst in &module.blocks[block].instructions {
            if let Some(flow) = self.exec(frame, &module.instructions[inst]) {
                return flow;
            }
        }
        Flow::FallThrough
    }

    /// Runs one instruction; returns the flow if it transferred control.
    fn exec(&mut self, frame: &mut Frame, instruction: &Instruction) -> Option<Flow> {
        let module = self.module;
        let result_ty = instruction.result.map(|r| module.values[r].ty);
        let produced = match &instruction.kind {
            InstructionKind::Var { initializer, .. } => {
                let ptr_ty = result_ty.expect("var has a result");
                let base = module.types[ptr_ty]
                    .inner
                    .pointer_base()
                    .expect("var result is a pointer");
                let initial = match initializer {
                    Some(init) => self.value(frame, *init),
                    None => Val::zero(module, base),
                };
                let root = Root::Local(self.next_local);
                self.next_local += 1;
                self.memory.insert(root, initial);
                Some(Val::Ptr(Pointer {
                    root,
                    path: Vec::new(),
                }))
            }
            InstructionKind::Let { value } => Some(self.value(frame, *value)),
            InstructionKind::Construct { args } => {
                let mut values: Vec<_> = args.iter().map(|&a| self.value(frame, a)).collect();
                let ty = result_ty.expect("construct has a result");
                Some(match module.types[ty].inner {
                    TypeInner::Scalar(_) if values.len() == 1 => values.remove(0),
                    TypeInner::Vector { size, .. } if values.len() == 1 => {
                        Val::Composite(vec![values.remove(0); size as usize])
                    }
                    _ => Val::Composite(values),
                })
            }
            InstructionKind::Access { object, indices } => {
                let indices: Vec<_> = indices
                    .iter()
                    .map(|&i| self.value(frame, i).as_index())
                    .collect();
                Some(match self.value(frame, *object) {
                    Val::Ptr(mut ptr) => {
                        ptr.path.extend(indices);
                        Val::Ptr(ptr)
                    }
                    mut composite => {
                        for i in indices {
                            composite = match composite {
                                Val::Composite(mut items) => items.swap_remove(i),
                                other => panic!("cannot index {other:?}"),
                            };
                        }
                        composite
                    }
                })
            }
            InstructionKind::Load { from } => {
                let ptr = self.value(frame, *from);
                Some(self.read(ptr.as_pointer()))
            }
            InstructionKind::Store { to, value } => {
                let ptr = self.value(frame, *to);
                let value = self.value(frame, *value);
                self.write(ptr.as_pointer(), value);
                None
            }
            InstructionKind::Binary { op, lhs, rhs } => Some(binary(
                *op,
                self.value(frame, *lhs),
                self.value(frame, *rhs),
            )),
            InstructionKind::BuiltinCall { function, args } => {
                let args: Vec<_> = args.iter().map(|&a| self.value(frame, a)).collect();
                self.builtin(*function, args)
            }
            InstructionKind::UserCall { function, args } => {
                let args = args.iter().map(|&a| self.value(frame, a)).collect();
                self.call(*function, args)
            }
            InstructionKind::If {
                condition,
                accept,
                reject,
            } => {
                let block = if self.value(frame, *condition).as_bool() {
                    *accept
                } else {
                    *reject
                };
                match self.exec_block(frame, block) {
                    Flow::ExitIf | Flow::FallThrough => None,
                    other => return Some(other),
                }
            }
            InstructionKind::Loop {
                initializer,
                body,
                continuing,
            } => {
                return self.run_loop(frame, *initializer, *body, *continuing);
            }
            InstructionKind::Switch { selector, cases } => {
                let selector = self.value(frame, *selector);
                let matches = |case: &&shdc_ir::SwitchCase, default: bool| {
                    case.selectors.iter().any(|s| match s {
                        Some(s) => !default && self.constant(*s) == selector,
                        None => default,
                    })
                };
                let case = cases
                    .iter()
                    .find(|c| matches(c, false))
                    .or_else(|| cases.iter().find(|c| matches(c, true)))
                    .expect("switch has a default case");
                match self.exec_block(frame, case.block) {
                    Flow::ExitSwitch | Flow::FallThrough => None,
                    other => return Some(other),
                }
            }
            InstructionKind::Return { value } => {
                return Some(Flow::Return(value.map(|v| self.value(frame, v))));
            }
            InstructionKind::ExitIf => return Some(Flow::ExitIf),
            InstructionKind::ExitLoop => return Some(Flow::ExitLoop),
            InstructionKind::ExitSwitch => return Some(Flow::ExitSwitch),
            InstructionKind::Continue => return Some(Flow::Continue),
            InstructionKind::NextIteration => return Some(Flow::NextIteration),
            InstructionKind::BreakIf { condition } => {
                return Some(Flow::BreakIf(self.value(frame, *condition).as_bool()));
            }
            InstructionKind::Unreachable => panic!("executed unreachable"),
        };
        if let (Some(result), Some(value)) = (instruction.result, produced) {
            frame.values.insert(result, value);
        }
        None
    }

    fn run_loop(
        &mut self,
        frame: &mut Frame,
        initializer: Handle<Block>,
        body: Handle<Block>,
        continuing: Handle<Block>,
    ) -> Option<Flow> {
        match self.exec_block(frame, initializer) {
            Flow::NextIteration | Flow::FallThrough => {}
            Flow::Return(value) => return Some(Flow::Return(value)),
            other => panic!("loop initializer ended with {other:?}"),
        }
        for _ in 0..MAX_LOOP_ITERATIONS {
            match self.exec_block(frame, body) {
                Flow::Continue => {}
                Flow::ExitLoop => return None,
                Flow::Return(value) => return Some(Flow::Return(value)),
                other => panic!("loop body ended with {other:?}"),
            }
            match self.exec_block(frame, continuing) {
                Flow::NextIteration | Flow::FallThrough | Flow::BreakIf(false) => {}
                Flow::BreakIf(true) => return None,
                other => panic!("continuing block ended with {other:?}"),
            }
        }
        panic!("loop did not terminate after {MAX_LOOP_ITERATIONS} iterations")
    }

    fn builtin(&mut self, function: BuiltinFunction, mut args: Vec<Val>) -> Option<Val> {
        match function {
            BuiltinFunction::AtomicStore => {
                let value = args.pop().expect("atomicStore value");
                self.write(args[0].as_pointer(), value);
                None
            }
            BuiltinFunction::AtomicLoad => Some(self.read(args[0].as_pointer())),
            BuiltinFunction::AtomicAdd => {
                let ptr = args[0].as_pointer().clone();
                let old = self.read(&ptr);
                let new = binary(BinaryOp::Add, old.clone(), args[1].clone());
                self.write(&ptr, new);
                Some(old)
            }
            BuiltinFunction::WorkgroupBarrier | BuiltinFunction::StorageBarrier => {
                self.barriers += 1;
                None
            }
            BuiltinFunction::Select => {
                let condition = args.pop().expect("select condition").as_bool();
                let accept = args.pop().expect("select accept");
                let reject = args.pop().expect("select reject");
                Some(if condition { accept } else { reject })
            }
            BuiltinFunction::Min | BuiltinFunction::Max => {
                let (a, b) = (args[0].clone(), args[1].clone());
                let a_less = binary(BinaryOp::Less, a.clone(), b.clone()).as_bool();
                Some(match (function, a_less) {
                    (BuiltinFunction::Min, true) | (BuiltinFunction::Max, false) => a,
                    _ => b,
                })
            }
        }
    }
}

fn compare<T: PartialOrd>(op: BinaryOp, a: T, b: T) -> Val {
    Val::Bool(match op {
        BinaryOp::Equal => a == b,
        BinaryOp::NotEqual => a != b,
        BinaryOp::Less => a < b,
        BinaryOp::LessEqual => a <= b,
        BinaryOp::Greater => a > b,
        BinaryOp::GreaterEqual => a >= b,
        other => panic!("{other:?} is not a comparison"),
    })
}

/// Applies `op` with WGSL semantics: integer arithmetic wraps, and integer
/// division by zero yields the dividend.
fn binary(op: BinaryOp, lhs: Val, rhs: Val) -> Val {
    if op.is_comparison() {
        return match (lhs, rhs) {
            (Val::Bool(a), Val::Bool(b)) => compare(op, a, b),
            (Val::I32(a), Val::I32(b)) => compare(op, a, b),
            (Val::U32(a), Val::U32(b)) => compare(op, a, b),
            (Val::F32(a), Val::F32(b)) => compare(op, a, b),
            (a, b) => panic!("cannot compare {a:?} and {b:?}"),
        };
    }
    match (lhs, rhs) {
        (Val::U32(a), Val::U32(b)) => Val::U32(match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Subtract => a.wrapping_sub(b),
            BinaryOp::Multiply => a.wrapping_mul(b),
            BinaryOp::Divide => a.checked_div(b).unwrap_or(a),
            BinaryOp::Modulo => a.checked_rem(b).unwrap_or(0),
            BinaryOp::And => a & b,
            BinaryOp::Or => a | b,
            BinaryOp::Xor => a ^ b,
            BinaryOp::ShiftLeft => a.wrapping_shl(b),
            BinaryOp::ShiftRight => a.wrapping_shr(b),
            other => panic!("{other:?} on u32"),
        }),
        (Val::I32(a), Val::I32(b)) => Val::I32(match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Subtract => a.wrapping_sub(b),
            BinaryOp::Multiply => a.wrapping_mul(b),
            BinaryOp::Divide => a.checked_div(b).unwrap_or(a),
            BinaryOp::Modulo => a.checked_rem(b).unwrap_or(0),
            BinaryOp::And => a & b,
            BinaryOp::Or => a | b,
            BinaryOp::Xor => a ^ b,
            other => panic!("{other:?} on i32"),
        }),
        (Val::F32(a), Val::F32(b)) => Val::F32(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Subtract => a - b,
            BinaryOp::Multiply => a * b,
            BinaryOp::Divide => a / b,
            BinaryOp::Modulo => a % b,
            other => panic!("{other:?} on f32"),
        }),
        (Val::Bool(a), Val::Bool(b)) => Val::Bool(match op {
            BinaryOp::And => a & b,
            BinaryOp::Or => a | b,
            BinaryOp::Xor => a ^ b,
            other => panic!("{other:?} on bool"),
        }),
        (Val::Composite(a), Val::Composite(b)) => Val::Composite(
            a.into_iter()
                .zip(b)
                .map(|(a, b)| binary(op, a, b))
                .collect(),
        ),
        (a, b) => panic!("cannot apply {op:?} to {a:?} and {b:?}"),
    }
}
