//! Instruction builder.
//!
//! A [`Builder`] inserts instructions into one block, either appending at the
//! end or inserting consecutively from the start, and creates result values
//! with the type each instruction produces.

use crate::Module;
use crate::arena::Handle;
use crate::func::Function;
use crate::inst::{BinaryOp, Block, BuiltinFunction, Instruction, InstructionKind, SwitchCase};
use crate::space::AddressSpace;
use crate::types::{Scalar, Type};
use crate::value::{Value, ValueKind};

/// Blocks of a freshly built `If`.
#[derive(Clone, Copy, Debug)]
pub struct IfBlocks {
    pub inst: Handle<Instruction>,
    pub accept: Handle<Block>,
    pub reject: Handle<Block>,
}

/// Blocks of a freshly built `Loop`.
#[derive(Clone, Copy, Debug)]
pub struct LoopBlocks {
    pub inst: Handle<Instruction>,
    pub initializer: Handle<Block>,
    pub body: Handle<Block>,
    pub continuing: Handle<Block>,
}

/// Inserts instructions into a block of a [`Module`].
pub struct Builder<'m> {
    module: &'m mut Module,
    block: Handle<Block>,
    /// Insertion index; `None` appends.
    position: Option<usize>,
}

impl<'m> Builder<'m> {
    /// A builder appending to the end of `block`.
    pub fn append(module: &'m mut Module, block: Handle<Block>) -> Self {
        Self {
            module,
            block,
            position: None,
        }
    }

    /// A builder inserting at the start of `block`; successive instructions
    /// keep their relative order ahead of the existing ones.
    pub fn prepend(module: &'m mut Module, block: Handle<Block>) -> Self {
        Self {
            module,
            block,
            position: Some(0),
        }
    }

    pub fn module(&mut self) -> &mut Module {
        self.module
    }

    pub fn block(&self) -> Handle<Block> {
        self.block
    }

    /// A builder appending to `block`, borrowing this builder's module.
    pub fn nested(&mut self, block: Handle<Block>) -> Builder<'_> {
        Builder::append(self.module, block)
    }

    fn push(
        &mut self,
        kind: InstructionKind,
        result_ty: Option<Handle<Type>>,
        name: Option<&str>,
    ) -> (Handle<Instruction>, Option<Handle<Value>>) {
        let inst = self.module.instructions.next_handle();
        let result = result_ty.map(|ty| {
            self.module.values.append(Value {
                ty,
                name: name.map(str::to_owned),
                kind: ValueKind::InstructionResult(inst),
            })
        });
        self.module.instructions.append(Instruction { kind, result });
        let instructions = &mut self.module.blocks[self.block].instructions;
        match self.position.as_mut() {
            Some(position) => {
                instructions.insert(*position, inst);
                *position += 1;
            }
            None => instructions.push(inst),
        }
        (inst, result)
    }

    fn push_value(
        &mut self,
        kind: InstructionKind,
        ty: Handle<Type>,
        name: Option<&str>,
    ) -> Handle<Value> {
        match self.push(kind, Some(ty), name) {
            (_, Some(value)) => value,
            (inst, None) => unreachable!("instruction {inst:?} built with a result type"),
        }
    }

    /// Declares a variable of `store_ty` in `space`; returns the pointer.
    pub fn var(
        &mut self,
        name: Option<&str>,
        store_ty: Handle<Type>,
        space: AddressSpace,
        initializer: Option<Handle<Value>>,
    ) -> Handle<Value> {
        let ptr = self
            .module
            .pointer_type(store_ty, space, space.default_access());
        self.push_value(
            InstructionKind::Var {
                initializer,
                binding: None,
            },
            ptr,
            name,
        )
    }

    pub fn let_(&mut self, name: &str, value: Handle<Value>) -> Handle<Value> {
        let ty = self.module.values[value].ty;
        self.push_value(InstructionKind::Let { value }, ty, Some(name))
    }

    pub fn construct(&mut self, ty: Handle<Type>, args: Vec<Handle<Value>>) -> Handle<Value> {
        self.push_value(InstructionKind::Construct { args }, ty, None)
    }

    /// Indexes `object`; `result_ty` is the element type, or a pointer to it
    /// when `object` is a pointer.
    pub fn access(
        &mut self,
        result_ty: Handle<Type>,
        object: Handle<Value>,
        indices: Vec<Handle<Value>>,
    ) -> Handle<Value> {
        self.push_value(InstructionKind::Access { object, indices }, result_ty, None)
    }

    /// Loads through `from`; the result has the pointee type.
    pub fn load(&mut self, from: Handle<Value>) -> Handle<Value> {
        let ty = self
            .module
            .pointee(from)
            .unwrap_or(self.module.values[from].ty);
        self.push_value(InstructionKind::Load { from }, ty, None)
    }

    pub fn store(&mut self, to: Handle<Value>, value: Handle<Value>) -> Handle<Instruction> {
        self.push(InstructionKind::Store { to, value }, None, None).0
    }

    /// Comparisons produce `bool`; every other operator produces the type of `lhs`.
    pub fn binary(
        &mut self,
        op: BinaryOp,
        lhs: Handle<Value>,
        rhs: Handle<Value>,
    ) -> Handle<Value> {
        let ty = if op.is_comparison() {
            self.module.scalar_type(Scalar::BOOL)
        } else {
            self.module.values[lhs].ty
        };
        self.push_value(InstructionKind::Binary { op, lhs, rhs }, ty, None)
    }

    pub fn call_builtin(
        &mut self,
        function: BuiltinFunction,
        result_ty: Option<Handle<Type>>,
        args: Vec<Handle<Value>>,
    ) -> Option<Handle<Value>> {
        self.push(InstructionKind::BuiltinCall { function, args }, result_ty, None)
            .1
    }

    /// Calls a user function; the result has the callee's return type.
    pub fn call(
        &mut self,
        function: Handle<Function>,
        args: Vec<Handle<Value>>,
    ) -> Option<Handle<Value>> {
        let ty = self.module.functions[function].return_type;
        self.push(InstructionKind::UserCall { function, args }, ty, None)
            .1
    }

    pub fn if_(&mut self, condition: Handle<Value>) -> IfBlocks {
        let accept = self.module.blocks.append(Block::default());
        let reject = self.module.blocks.append(Block::default());
        let (inst, _) = self.push(
            InstructionKind::If {
                condition,
                accept,
                reject,
            },
            None,
            None,
        );
        IfBlocks {
            inst,
            accept,
            reject,
        }
    }

    pub fn loop_(&mut self) -> LoopBlocks {
        let initializer = self.module.blocks.append(Block::default());
        let body = self.module.blocks.append(Block::default());
        let continuing = self.module.blocks.append(Block::default());
        let (inst, _) = self.push(
            InstructionKind::Loop {
                initializer,
                body,
                continuing,
            },
            None,
            None,
        );
        LoopBlocks {
            inst,
            initializer,
            body,
            continuing,
        }
    }

    /// Builds a `Switch` with one case block per selector list.
    pub fn switch(
        &mut self,
        selector: Handle<Value>,
        selectors: Vec<Vec<Option<Handle<Value>>>>,
    ) -> (Handle<Instruction>, Vec<Handle<Block>>) {
        let cases: Vec<SwitchCase> = selectors
            .into_iter()
            .map(|selectors| SwitchCase {
                selectors,
                block: self.module.blocks.append(Block::default()),
            })
            .collect();
        let blocks = cases.iter().map(|c| c.block).collect();
        let (inst, _) = self.push(InstructionKind::Switch { selector, cases }, None, None);
        (inst, blocks)
    }

    pub fn return_(&mut self, value: Option<Handle<Value>>) {
        self.push(InstructionKind::Return { value }, None, None);
    }

    pub fn exit_if(&mut self) {
        self.push(InstructionKind::ExitIf, None, None);
    }

    pub fn exit_loop(&mut self) {
        self.push(InstructionKind::ExitLoop, None, None);
    }

    pub fn exit_switch(&mut self) {
        self.push(InstructionKind::ExitSwitch, None, None);
    }

    pub fn continue_(&mut self) {
        self.push(InstructionKind::Continue, None, None);
    }

    pub fn next_iteration(&mut self) {
        self.push(InstructionKind::NextIteration, None, None);
    }

    pub fn break_if(&mut self, condition: Handle<Value>) {
        self.push(InstructionKind::BreakIf { condition }, None, None);
    }

    pub fn unreachable(&mut self) {
        self.push(InstructionKind::Unreachable, None, None);
    }
}
