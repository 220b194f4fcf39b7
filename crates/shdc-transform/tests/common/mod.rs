#![allow(dead_code)]

pub mod eval;

use shdc_ir::{
    AddressSpace, BinaryOp, Builder, BuiltIn, Capabilities, Constant, Function, Handle,
    InstructionKind, Literal, Module, PipelineStage, Type, Value, ValueKind, validate,
};

use eval::{Evaluator, Val};

/// Adds a compute entry point `name` with the given workgroup size.
pub fn compute_entry(module: &mut Module, name: &str, size: [u32; 3]) -> Handle<Function> {
    let f = module.new_function(name, None);
    module.functions[f].stage = Some(PipelineStage::Compute);
    module.functions[f].workgroup_size = Some(size);
    f
}

/// Declares `var<workgroup> name: ty` at module scope.
pub fn workgroup_var(module: &mut Module, name: &str, ty: Handle<Type>) -> Handle<Value> {
    let root = module.root_block;
    Builder::append(module, root).var(Some(name), ty, AddressSpace::Workgroup, None)
}

pub fn assert_valid(module: &Module) {
    if let Err(err) = validate(module, Capabilities::EMPTY) {
        panic!("module failed validation: {err}");
    }
}

/// The value of a compute built-in input for invocation `index` of the
/// first workgroup.
pub fn builtin_value(builtin: BuiltIn, index: u32, size: [u32; 3]) -> Val {
    let id = [
        index % size[0],
        index / size[0] % size[1],
        index / (size[0] * size[1]),
    ];
    match builtin {
        BuiltIn::LocalInvocationIndex => Val::U32(index),
        BuiltIn::LocalInvocationId | BuiltIn::GlobalInvocationId => {
            Val::Composite(id.iter().map(|&c| Val::U32(c)).collect())
        }
        BuiltIn::WorkgroupId => Val::Composite(vec![Val::U32(0); 3]),
        BuiltIn::NumWorkgroups => Val::Composite(vec![Val::U32(1); 3]),
        other => panic!("{other:?} is not a compute input"),
    }
}

/// Arguments for invocation `index` of a compute entry point.
pub fn compute_args(module: &Module, function: Handle<Function>, index: u32) -> Vec<Val> {
    let f = &module.functions[function];
    let size = f.workgroup_size.expect("compute entry point");
    f.params
        .iter()
        .map(|param| match param.attributes.builtin {
            Some(builtin) => builtin_value(builtin, index, size),
            None => {
                let ty = module.values[param.value].ty;
                let members = module.types[ty]
                    .inner
                    .struct_members()
                    .expect("unannotated input must be a struct");
                Val::Composite(
                    members
                        .iter()
                        .map(|m| {
                            let builtin = m.attributes.builtin.expect("built-in member");
                            builtin_value(builtin, index, size)
                        })
                        .collect(),
                )
            }
        })
        .collect()
}

/// Runs every invocation of one workgroup of `function`, one after the
/// other, over shared workgroup memory.
pub fn run_workgroup(module: &Module, function: Handle<Function>) -> Evaluator<'_> {
    let invocations = module.functions[function]
        .invocations_per_workgroup()
        .expect("compute entry point");
    let mut eval = Evaluator::new(module);
    for index in 0..invocations {
        eval.invocation = index;
        let args = compute_args(module, function, index);
        eval.call(function, args);
    }
    eval
}

/// The value of a `u32` literal constant.
pub fn const_u32(module: &Module, value: Handle<Value>) -> Option<u32> {
    match module.values[value].kind {
        ValueKind::Constant(Constant::Scalar(Literal::U32(n))) => Some(n),
        _ => None,
    }
}

/// The operator and operands of the `Binary` instruction producing `value`.
pub fn binary_of(
    module: &Module,
    value: Handle<Value>,
) -> Option<(BinaryOp, Handle<Value>, Handle<Value>)> {
    let inst = module.values[value].instruction()?;
    match module.instructions[inst].kind {
        InstructionKind::Binary { op, lhs, rhs } => Some((op, lhs, rhs)),
        _ => None,
    }
}

/// Every instruction kind in the module, in arena order.
pub fn all_instructions(module: &Module) -> Vec<&InstructionKind> {
    module
        .instructions
        .iter()
        .map(|(_, inst)| &inst.kind)
        .collect()
}
