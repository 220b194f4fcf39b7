//! Structural validation of a [`Module`].
//!
//! Every transform runs [`validate`] before touching a module. The checks
//! cover what the transforms rely on: handles in bounds, one owner per block
//! and per instruction, properly terminated blocks, operands that are
//! defined where they are used, pointer-typed load/store targets, and
//! well-formed entry points.

use std::collections::HashSet;

use crate::Module;
use crate::arena::Handle;
use crate::error::ValidationError;
use crate::format_type;
use crate::func::{Function, PipelineStage};
use crate::inst::{Block, Instruction, InstructionKind};
use crate::space::AddressSpace;
use crate::types::{ArraySize, Scalar, Type, TypeInner};
use crate::value::{Constant, Value, ValueKind};

/// Bitflags relaxing individual validation rules.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct Capabilities(u32);

impl Capabilities {
    /// No relaxations.
    pub const EMPTY: Self = Self(0);
    /// Entry-point parameters and results may lack `@location`/`@builtin`.
    pub const ALLOW_UNANNOTATED_IO: Self = Self(1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Capabilities {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Whether a block may be left empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BlockRole {
    /// Function bodies, `If` true branches, switch cases, loop bodies.
    Terminated,
    /// `If` false branches, loop initializers and continuing blocks.
    OptionallyEmpty,
}

/// Checks that `module` is well-formed.
pub fn validate(module: &Module, capabilities: Capabilities) -> Result<(), ValidationError> {
    let mut validator = Validator {
        module,
        capabilities,
        owned_blocks: HashSet::new(),
        seen_instructions: HashSet::new(),
        scopes: Vec::new(),
    };
    validator.run()
}

struct Validator<'a> {
    module: &'a Module,
    capabilities: Capabilities,
    owned_blocks: HashSet<Handle<Block>>,
    seen_instructions: HashSet<Handle<Instruction>>,
    /// Results visible at the current point, innermost block last.
    scopes: Vec<HashSet<Handle<Value>>>,
}

fn bad_handle(context: &str, kind: &'static str, index: usize, size: usize) -> ValidationError {
    ValidationError::BadHandle {
        context: context.to_owned(),
        kind,
        index,
        size,
    }
}

impl Validator<'_> {
    fn run(&mut self) -> Result<(), ValidationError> {
        let module = self.module;
        self.check_types()?;
        self.check_values()?;
        self.check_root()?;
        for (handle, function) in module.functions.iter() {
            let context = match &function.name {
                Some(name) => format!("function '{name}'"),
                None => format!("function {}", handle.index()),
            };
            self.check_function(&context, handle, function)?;
        }
        log::debug!(
            "validated module: {} functions, {} instructions",
            self.module.functions.len(),
            self.seen_instructions.len()
        );
        Ok(())
    }

    fn type_ref(&self, context: &str, ty: Handle<Type>) -> Result<(), ValidationError> {
        if self.module.types.contains(ty) {
            Ok(())
        } else {
            Err(bad_handle(context, "type", ty.index(), self.module.types.len()))
        }
    }

    fn value_ref(&self, context: &str, value: Handle<Value>) -> Result<(), ValidationError> {
        if self.module.values.contains(value) {
            Ok(())
        } else {
            Err(bad_handle(context, "value", value.index(), self.module.values.len()))
        }
    }

    fn check_types(&self) -> Result<(), ValidationError> {
        for (handle, ty) in self.module.types.iter() {
            let context = format!("type {}", handle.index());
            match &ty.inner {
                TypeInner::Pointer { base, .. } | TypeInner::Array { base, .. } => {
                    self.type_ref(&context, *base)?;
                }
                TypeInner::Struct { members, .. } => {
                    for member in members {
                        self.type_ref(&context, member.ty)?;
                    }
                }
                TypeInner::Scalar(_)
                | TypeInner::Vector { .. }
                | TypeInner::Matrix { .. }
                | TypeInner::Atomic(_) => {}
            }
        }
        Ok(())
    }

    fn check_values(&self) -> Result<(), ValidationError> {
        for (handle, value) in self.module.values.iter() {
            let context = format!("value {}", handle.index());
            self.type_ref(&context, value.ty)?;
            match &value.kind {
                ValueKind::InstructionResult(inst) => {
                    if !self.module.instructions.contains(*inst) {
                        return Err(bad_handle(
                            &context,
                            "instruction",
                            inst.index(),
                            self.module.instructions.len(),
                        ));
                    }
                }
                ValueKind::FunctionParam { function } => {
                    if !self.module.functions.contains(*function) {
                        return Err(bad_handle(
                            &context,
                            "function",
                            function.index(),
                            self.module.functions.len(),
                        ));
                    }
                }
                ValueKind::Constant(Constant::Composite(components)) => {
                    for &component in components {
                        self.value_ref(&context, component)?;
                    }
                }
                ValueKind::Constant(_) => {}
            }
        }
        Ok(())
    }

    fn check_root(&mut self) -> Result<(), ValidationError> {
        let module = self.module;
        let root = module.root_block;
        if !module.blocks.contains(root) {
            return Err(bad_handle(
                "module root",
                "block",
                root.index(),
                module.blocks.len(),
            ));
        }
        self.owned_blocks.insert(root);
        let mut visible = HashSet::new();
        for &inst in &module.blocks[root].instructions {
            self.claim_instruction("module root", inst)?;
            let instruction = &module.instructions[inst];
            if !matches!(instruction.kind, InstructionKind::Var { .. }) {
                return Err(ValidationError::RootInstruction {
                    instruction: inst.index(),
                });
            }
            for operand in instruction.kind.operands() {
                self.value_ref("module root", operand)?;
                if !module.values[operand].is_constant() {
                    return Err(ValidationError::UndefinedValue {
                        context: "module root".into(),
                        instruction: inst.index(),
                        value: operand.index(),
                    });
                }
            }
            let result = self.check_result("module root", inst, instruction)?;
            if let Some(result) = result {
                self.check_var_type("module root", result)?;
                visible.insert(result);
            }
        }
        self.scopes.push(visible);
        Ok(())
    }

    fn claim_instruction(
        &mut self,
        context: &str,
        inst: Handle<Instruction>,
    ) -> Result<(), ValidationError> {
        if !self.module.instructions.contains(inst) {
            return Err(bad_handle(
                context,
                "instruction",
                inst.index(),
                self.module.instructions.len(),
            ));
        }
        if !self.seen_instructions.insert(inst) {
            return Err(ValidationError::SharedInstruction {
                instruction: inst.index(),
            });
        }
        Ok(())
    }

    fn check_result(
        &self,
        context: &str,
        inst: Handle<Instruction>,
        instruction: &Instruction,
    ) -> Result<Option<Handle<Value>>, ValidationError> {
        let Some(result) = instruction.result else {
            return Ok(None);
        };
        self.value_ref(context, result)?;
        if self.module.values[result].kind != ValueKind::InstructionResult(inst) {
            return Err(ValidationError::ForeignResult {
                context: context.to_owned(),
                instruction: inst.index(),
            });
        }
        Ok(Some(result))
    }

    fn check_var_type(&self, context: &str, result: Handle<Value>) -> Result<(), ValidationError> {
        let ty = self.module.values[result].ty;
        let TypeInner::Pointer { base, space, .. } = self.module.types[ty].inner else {
            return Err(self.mismatch(context, "pointer", ty));
        };
        if space != AddressSpace::Workgroup {
            return Ok(());
        }
        let ty = || format_type(&self.module.types[base], &self.module.types);
        if !self.has_fixed_footprint(base) {
            return Err(ValidationError::WorkgroupType {
                value: result.index(),
                ty: ty(),
            });
        }
        if self.element_count(base).is_none() {
            return Err(ValidationError::WorkgroupTooLarge {
                value: result.index(),
                ty: ty(),
            });
        }
        Ok(())
    }

    /// Number of scalar leaves in a fixed-size type, or `None` if it does
    /// not fit in a `u32`.
    fn element_count(&self, ty: Handle<Type>) -> Option<u32> {
        match &self.module.types[ty].inner {
            TypeInner::Array {
                base,
                size: ArraySize::Constant(n),
                ..
            } => n.checked_mul(self.element_count(*base)?),
            TypeInner::Struct { members, .. } => members
                .iter()
                .try_fold(0u32, |sum, m| sum.checked_add(self.element_count(m.ty)?)),
            _ => Some(1),
        }
    }

    fn has_fixed_footprint(&self, ty: Handle<Type>) -> bool {
        match &self.module.types[ty].inner {
            TypeInner::Scalar(_)
            | TypeInner::Vector { .. }
            | TypeInner::Matrix { .. }
            | TypeInner::Atomic(_) => true,
            TypeInner::Pointer { .. } => false,
            TypeInner::Array { base, size, .. } => {
                matches!(size, ArraySize::Constant(_)) && self.has_fixed_footprint(*base)
            }
            TypeInner::Struct { members, .. } => {
                members.iter().all(|m| self.has_fixed_footprint(m.ty))
            }
        }
    }

    fn mismatch(&self, context: &str, expected: &str, found: Handle<Type>) -> ValidationError {
        ValidationError::TypeMismatch {
            context: context.to_owned(),
            expected: expected.to_owned(),
            found: format_type(&self.module.types[found], &self.module.types),
        }
    }

    fn check_function(
        &mut self,
        context: &str,
        handle: Handle<Function>,
        function: &Function,
    ) -> Result<(), ValidationError> {
        for param in &function.params {
            self.value_ref(context, param.value)?;
            let expected = ValueKind::FunctionParam { function: handle };
            if self.module.values[param.value].kind != expected {
                return Err(ValidationError::UndefinedValue {
                    context: context.to_owned(),
                    instruction: function.block.index(),
                    value: param.value.index(),
                });
            }
        }
        if let Some(ty) = function.return_type {
            self.type_ref(context, ty)?;
        }
        if let Some(stage) = function.stage {
            self.check_entry_point(function, stage)?;
        }

        self.claim_block(context, function.block)?;
        self.scopes.push(HashSet::new());
        let result = self.check_block(context, handle, function.block, BlockRole::Terminated);
        self.scopes.pop();
        result
    }

    fn check_entry_point(
        &self,
        function: &Function,
        stage: PipelineStage,
    ) -> Result<(), ValidationError> {
        let name = function.name.clone().unwrap_or_default();
        if stage == PipelineStage::Compute
            && !function
                .invocations_per_workgroup()
                .is_some_and(|n| n > 0)
        {
            return Err(ValidationError::InvalidWorkgroupSize {
                function: name,
                size: function.workgroup_size,
            });
        }
        if self
            .capabilities
            .contains(Capabilities::ALLOW_UNANNOTATED_IO)
        {
            return Ok(());
        }
        for (i, param) in function.params.iter().enumerate() {
            let value = &self.module.values[param.value];
            if !param.attributes.is_io() && !self.is_annotated_struct(value.ty) {
                let what = match &value.name {
                    Some(n) => format!("parameter '{n}'"),
                    None => format!("parameter {i}"),
                };
                return Err(ValidationError::UnannotatedIo {
                    function: name,
                    what,
                });
            }
        }
        if let Some(ty) = function.return_type
            && !function.return_attributes.is_io()
            && !self.is_annotated_struct(ty)
        {
            return Err(ValidationError::UnannotatedIo {
                function: name,
                what: "return value".into(),
            });
        }
        Ok(())
    }

    fn is_annotated_struct(&self, ty: Handle<Type>) -> bool {
        self.module.types[ty]
            .inner
            .struct_members()
            .is_some_and(|members| members.iter().all(|m| m.attributes.is_io()))
    }

    fn claim_block(&mut self, context: &str, block: Handle<Block>) -> Result<(), ValidationError> {
        if !self.module.blocks.contains(block) {
            return Err(bad_handle(
                context,
                "block",
                block.index(),
                self.module.blocks.len(),
            ));
        }
        if !self.owned_blocks.insert(block) {
            return Err(ValidationError::SharedBlock {
                block: block.index(),
            });
        }
        Ok(())
    }

    fn is_visible(&self, value: Handle<Value>) -> bool {
        self.scopes.iter().any(|scope| scope.contains(&value))
    }

    fn check_operand(
        &self,
        context: &str,
        function: Handle<Function>,
        inst: Handle<Instruction>,
        operand: Handle<Value>,
    ) -> Result<(), ValidationError> {
        self.value_ref(context, operand)?;
        let defined = match self.module.values[operand].kind {
            ValueKind::Constant(_) => true,
            ValueKind::FunctionParam { function: owner } => owner == function,
            ValueKind::InstructionResult(_) => self.is_visible(operand),
        };
        if defined {
            Ok(())
        } else {
            Err(ValidationError::UndefinedValue {
                context: context.to_owned(),
                instruction: inst.index(),
                value: operand.index(),
            })
        }
    }

    /// Checks `block` inside the scope the caller pushed for it.
    fn check_block(
        &mut self,
        context: &str,
        function: Handle<Function>,
        block: Handle<Block>,
        role: BlockRole,
    ) -> Result<(), ValidationError> {
        let module = self.module;
        let instructions = &module.blocks[block].instructions;
        let Some(&last) = instructions.last() else {
            return match role {
                BlockRole::Terminated => Err(ValidationError::MissingTerminator {
                    context: context.to_owned(),
                    block: block.index(),
                }),
                BlockRole::OptionallyEmpty => Ok(()),
            };
        };

        for &inst in instructions {
            self.claim_instruction(context, inst)?;
            let instruction = &module.instructions[inst];
            if instruction.kind.is_terminator() && inst != last {
                return Err(ValidationError::MisplacedTerminator {
                    context: context.to_owned(),
                    block: block.index(),
                    instruction: inst.index(),
                });
            }
            for operand in instruction.kind.operands() {
                self.check_operand(context, function, inst, operand)?;
            }
            self.check_instruction(context, function, &instruction.kind)?;
            if let Some(result) = self.check_result(context, inst, instruction)? {
                if let InstructionKind::Var { .. } = instruction.kind {
                    self.check_var_type(context, result)?;
                }
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(result);
                }
            }
        }

        if !module.instructions[last].kind.is_terminator() {
            return Err(ValidationError::MissingTerminator {
                context: context.to_owned(),
                block: block.index(),
            });
        }
        Ok(())
    }

    fn check_child(
        &mut self,
        context: &str,
        function: Handle<Function>,
        block: Handle<Block>,
        role: BlockRole,
    ) -> Result<(), ValidationError> {
        self.claim_block(context, block)?;
        self.scopes.push(HashSet::new());
        let result = self.check_block(context, function, block, role);
        self.scopes.pop();
        result
    }

    fn check_instruction(
        &mut self,
        context: &str,
        function: Handle<Function>,
        kind: &InstructionKind,
    ) -> Result<(), ValidationError> {
        match kind {
            InstructionKind::Load { from: pointer } | InstructionKind::Store { to: pointer, .. } => {
                let ty = self.module.values[*pointer].ty;
                if self.module.types[ty].inner.pointer_base().is_none() {
                    return Err(self.mismatch(context, "pointer", ty));
                }
            }
            InstructionKind::If {
                condition,
                accept,
                reject,
            } => {
                self.expect_bool(context, *condition)?;
                self.check_child(context, function, *accept, BlockRole::Terminated)?;
                self.check_child(context, function, *reject, BlockRole::OptionallyEmpty)?;
            }
            InstructionKind::BreakIf { condition } => self.expect_bool(context, *condition)?,
            InstructionKind::Loop {
                initializer,
                body,
                continuing,
            } => {
                // The initializer's results are visible in the body, and the
                // body's results in the continuing block.
                for (block, role) in [
                    (*initializer, BlockRole::OptionallyEmpty),
                    (*body, BlockRole::Terminated),
                    (*continuing, BlockRole::OptionallyEmpty),
                ] {
                    self.claim_block(context, block)?;
                    self.scopes.push(HashSet::new());
                    self.check_block(context, function, block, role)?;
                }
                self.scopes.truncate(self.scopes.len() - 3);
            }
            InstructionKind::Switch { cases, .. } => {
                for case in cases {
                    self.check_child(context, function, case.block, BlockRole::Terminated)?;
                }
            }
            InstructionKind::UserCall { function: callee, .. } => {
                if !self.module.functions.contains(*callee) {
                    return Err(bad_handle(
                        context,
                        "function",
                        callee.index(),
                        self.module.functions.len(),
                    ));
                }
            }
            InstructionKind::Var { .. }
            | InstructionKind::Let { .. }
            | InstructionKind::Construct { .. }
            | InstructionKind::Access { .. }
            | InstructionKind::Binary { .. }
            | InstructionKind::BuiltinCall { .. }
            | InstructionKind::Return { .. }
            | InstructionKind::ExitIf
            | InstructionKind::ExitLoop
            | InstructionKind::ExitSwitch
            | InstructionKind::Continue
            | InstructionKind::NextIteration
            | InstructionKind::Unreachable => {}
        }
        Ok(())
    }

    fn expect_bool(&self, context: &str, value: Handle<Value>) -> Result<(), ValidationError> {
        let ty = self.module.values[value].ty;
        match self.module.types[ty].inner {
            TypeInner::Scalar(Scalar::BOOL) => Ok(()),
            _ => Err(self.mismatch(context, "bool", ty)),
        }
    }
}
