//! Workgroup memory zero-initialization.
//!
//! Workgroup memory starts out undefined. For every compute entry point this
//! transform prepends code that zeroes each workgroup variable the entry
//! point can reach, spread across the invocations of the workgroup by their
//! local invocation index, followed by a single `workgroupBarrier`.

use std::collections::{BTreeMap, HashMap, HashSet};

use shdc_ir::{
    AddressSpace, ArraySize, BinaryOp, Block, Builder, BuiltIn, BuiltinFunction, Function, Handle,
    InstructionKind, IoAttributes, Literal, Module, Namer, PipelineStage, Scalar, StorageAccess,
    Type, TypeInner, ValidationError, Value,
};

use crate::Transform;

/// Which workgroup variables an entry point initializes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ZeroInitEmit {
    /// Every workgroup variable in the module.
    Always,
    /// Only the variables the entry point's call graph uses.
    #[default]
    OnlyIfReferenced,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ZeroInitConfig {
    pub emit: ZeroInitEmit,
}

/// Zero-initializes workgroup memory at compute entry points.
#[derive(Debug, Default)]
pub struct ZeroInitWorkgroupMemory {
    config: ZeroInitConfig,
}

impl ZeroInitWorkgroupMemory {
    pub fn new(config: ZeroInitConfig) -> Self {
        Self { config }
    }
}

impl Transform for ZeroInitWorkgroupMemory {
    fn name(&self) -> &str {
        "zero-init-workgroup-memory"
    }

    fn run(&self, module: &mut Module) -> Result<(), ValidationError> {
        zero_init_workgroup_memory(module, &self.config)
    }
}

/// One level of the path from a variable to a store target.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum IndexStep {
    /// An array level with `count` elements; the index is derived from the
    /// local invocation index.
    ArrayIndex { count: u32 },
    /// A fixed struct member.
    MemberIndex(u32),
}

/// A store that zeroes one leaf of a variable per iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZeroStore {
    pub path: Vec<IndexStep>,
    /// Type of the stored leaf.
    pub ty: Handle<Type>,
    /// The leaf is an atomic and is zeroed with `atomicStore`.
    pub atomic: bool,
    /// Product of the array extents along `path`.
    pub iterations: u32,
}

/// The stores that zero a value of a given type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorePlan {
    pub stores: Vec<ZeroStore>,
}

impl StorePlan {
    /// Plans the stores for a variable of type `ty`.
    ///
    /// Types without atomics or arrays of more than one element are stored
    /// whole with a single zero value. Arrays multiply the iteration count
    /// of their element's stores; structs contribute their members' stores.
    pub fn new(module: &Module, ty: Handle<Type>) -> Self {
        let mut plan = Self::default();
        plan.prepare(module, ty, 1, &mut Vec::new());
        plan
    }

    fn prepare(
        &mut self,
        module: &Module,
        ty: Handle<Type>,
        iterations: u32,
        path: &mut Vec<IndexStep>,
    ) {
        if is_trivially_zeroable(module, ty) {
            self.push(ty, false, iterations, path);
            return;
        }
        match &module.types[ty].inner {
            TypeInner::Atomic(_) => self.push(ty, true, iterations, path),
            TypeInner::Array { base, size, .. } => {
                let count = match size {
                    ArraySize::Constant(n) => *n,
                    ArraySize::Dynamic => 1,
                };
                path.push(IndexStep::ArrayIndex { count });
                self.prepare(module, *base, iterations * count, path);
                path.pop();
            }
            TypeInner::Struct { members, .. } => {
                for (i, member) in members.iter().enumerate() {
                    path.push(IndexStep::MemberIndex(i as u32));
                    self.prepare(module, member.ty, iterations, path);
                    path.pop();
                }
            }
            TypeInner::Scalar(_)
            | TypeInner::Vector { .. }
            | TypeInner::Matrix { .. }
            | TypeInner::Pointer { .. } => self.push(ty, false, iterations, path),
        }
    }

    fn push(&mut self, ty: Handle<Type>, atomic: bool, iterations: u32, path: &[IndexStep]) {
        self.stores.push(ZeroStore {
            path: path.to_vec(),
            ty,
            atomic,
            iterations,
        });
    }
}

/// Returns `true` if a value of type `ty` can be zeroed by one store of a
/// zero value.
fn is_trivially_zeroable(module: &Module, ty: Handle<Type>) -> bool {
    match &module.types[ty].inner {
        TypeInner::Scalar(_) | TypeInner::Vector { .. } | TypeInner::Matrix { .. } => true,
        TypeInner::Atomic(_) | TypeInner::Pointer { .. } => false,
        TypeInner::Array { base, size, .. } => {
            *size == ArraySize::Constant(1) && is_trivially_zeroable(module, *base)
        }
        TypeInner::Struct { members, .. } => {
            members.iter().all(|m| is_trivially_zeroable(module, m.ty))
        }
    }
}

/// How the stores of one iteration count are spread across invocations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// `if (local_index < count)`: each invocation stores at most once.
    Guarded,
    /// A loop starting at the local index and striding by the workgroup's
    /// invocation count.
    Loop,
}

impl Strategy {
    pub fn choose(iterations: u32, invocations: u32) -> Self {
        if iterations <= invocations {
            Self::Guarded
        } else {
            Self::Loop
        }
    }
}

/// Validates `module`, then zero-initializes workgroup memory in every
/// compute entry point.
pub fn zero_init_workgroup_memory(
    module: &mut Module,
    config: &ZeroInitConfig,
) -> Result<(), ValidationError> {
    crate::validate(module)?;

    let workgroup_vars: Vec<Handle<Value>> = module
        .root_vars()
        .into_iter()
        .map(|(_, var)| var)
        .filter(|&var| module.pointer_space(var) == Some(AddressSpace::Workgroup))
        .collect();
    if workgroup_vars.is_empty() {
        return Ok(());
    }

    let mut namer = Namer::new(module);
    let mut usage = HashMap::new();
    let mut instrumented = 0;
    for function in module.entry_points() {
        if module.functions[function].stage != Some(PipelineStage::Compute) {
            continue;
        }
        let vars: Vec<_> = match config.emit {
            ZeroInitEmit::Always => workgroup_vars.clone(),
            ZeroInitEmit::OnlyIfReferenced => {
                let used = referenced_values(module, function, &mut usage);
                workgroup_vars
                    .iter()
                    .copied()
                    .filter(|var| used.contains(var))
                    .collect()
            }
        };
        if vars.is_empty() {
            continue;
        }
        log::debug!(
            "zero-init: entry point {:?} initializes {} workgroup variables",
            module.functions[function].name,
            vars.len()
        );
        instrument(module, function, &vars, &mut namer);
        instrumented += 1;
    }
    log::info!("zero-init-workgroup-memory: instrumented {instrumented} entry points");
    Ok(())
}

/// Every value used as an operand anywhere in the call graph rooted at
/// `function`.
fn referenced_values(
    module: &Module,
    function: Handle<Function>,
    memo: &mut HashMap<Handle<Function>, HashSet<Handle<Value>>>,
) -> HashSet<Handle<Value>> {
    if let Some(used) = memo.get(&function) {
        return used.clone();
    }
    memo.insert(function, HashSet::new());
    let mut used = HashSet::new();
    collect_block(module, module.functions[function].block, memo, &mut used);
    memo.insert(function, used.clone());
    used
}

fn collect_block(
    module: &Module,
    block: Handle<Block>,
    memo: &mut HashMap<Handle<Function>, HashSet<Handle<Value>>>,
    used: &mut HashSet<Handle<Value>>,
) {
    for &inst in &module.blocks[block].instructions {
        let kind = &module.instructions[inst].kind;
        used.extend(kind.operands());
        if let InstructionKind::UserCall { function, .. } = kind {
            used.extend(referenced_values(module, *function, memo));
        }
        for child in kind.blocks() {
            collect_block(module, child, memo, used);
        }
    }
}

/// Prepends the initialization code for `vars` to `function`.
fn instrument(
    module: &mut Module,
    function: Handle<Function>,
    vars: &[Handle<Value>],
    namer: &mut Namer,
) {
    let invocations = module.functions[function]
        .invocations_per_workgroup()
        .unwrap_or(1);

    let mut groups: BTreeMap<u32, Vec<(Handle<Value>, ZeroStore)>> = BTreeMap::new();
    for &var in vars {
        let Some(store_ty) = module.pointee(var) else {
            continue;
        };
        for store in StorePlan::new(module, store_ty).stores {
            groups.entry(store.iterations).or_default().push((var, store));
        }
    }

    let block = module.functions[function].block;
    let existing = existing_local_index(module, function);
    let mut b = Builder::prepend(module, block);
    let local_index = match existing {
        Some(LocalIndex::Param(value)) => value,
        Some(LocalIndex::Member { param, index }) => {
            let u32_ty = b.module().scalar_type(Scalar::U32);
            let member = b.module().constant_u32(index);
            b.access(u32_ty, param, vec![member])
        }
        None => {
            let u32_ty = b.module().scalar_type(Scalar::U32);
            let name = namer.fresh("local_index");
            b.module().add_param(
                function,
                Some(&name),
                u32_ty,
                IoAttributes::builtin(BuiltIn::LocalInvocationIndex),
            )
        }
    };

    for (iterations, stores) in groups {
        let strategy = Strategy::choose(iterations, invocations);
        log::debug!(
            "zero-init: {} stores x {iterations} iterations over {invocations} invocations: {strategy:?}",
            stores.len()
        );
        match strategy {
            Strategy::Guarded => {
                let count = b.module().constant_u32(iterations);
                let in_range = b.binary(BinaryOp::Less, local_index, count);
                let blocks = b.if_(in_range);
                let mut accept = b.nested(blocks.accept);
                for (var, store) in &stores {
                    emit_store(&mut accept, *var, store, local_index);
                }
                accept.exit_if();
            }
            Strategy::Loop => {
                let u32_ty = b.module().scalar_type(Scalar::U32);
                let lp = b.loop_();

                let mut init = b.nested(lp.initializer);
                let counter = init.var(None, u32_ty, AddressSpace::Function, Some(local_index));
                init.next_iteration();

                let mut body = b.nested(lp.body);
                let index = body.load(counter);
                let count = body.module().constant_u32(iterations);
                let done = body.binary(BinaryOp::GreaterEqual, index, count);
                let exit = body.if_(done);
                body.nested(exit.accept).exit_loop();
                for (var, store) in &stores {
                    emit_store(&mut body, *var, store, index);
                }
                body.continue_();

                let mut continuing = b.nested(lp.continuing);
                let current = continuing.load(counter);
                let stride = continuing.module().constant_u32(invocations);
                let next = continuing.binary(BinaryOp::Add, current, stride);
                continuing.store(counter, next);
                continuing.next_iteration();
            }
        }
    }

    b.call_builtin(BuiltinFunction::WorkgroupBarrier, None, vec![]);
}

enum LocalIndex {
    Param(Handle<Value>),
    Member { param: Handle<Value>, index: u32 },
}

/// Finds a `local_invocation_index` input, as a parameter or as a member
/// of a struct parameter.
fn existing_local_index(module: &Module, function: Handle<Function>) -> Option<LocalIndex> {
    let is_local_index =
        |attrs: &IoAttributes| attrs.builtin == Some(BuiltIn::LocalInvocationIndex);
    for param in &module.functions[function].params {
        if is_local_index(&param.attributes) {
            return Some(LocalIndex::Param(param.value));
        }
        let ty = module.values[param.value].ty;
        if let Some(members) = module.types[ty].inner.struct_members()
            && let Some(index) = members.iter().position(|m| is_local_index(&m.attributes))
        {
            return Some(LocalIndex::Member {
                param: param.value,
                index: index as u32,
            });
        }
    }
    None
}

/// Emits the zeroing store of `store` into `var` for element `index`.
fn emit_store(b: &mut Builder<'_>, var: Handle<Value>, store: &ZeroStore, index: Handle<Value>) {
    let target = if store.path.is_empty() {
        var
    } else {
        let indices = element_indices(b, &store.path, store.iterations, index);
        let ptr = b.module().pointer_type(
            store.ty,
            AddressSpace::Workgroup,
            StorageAccess::LOAD_STORE,
        );
        b.access(ptr, var, indices)
    };
    if store.atomic {
        let scalar = match b.module().types[store.ty].inner {
            TypeInner::Atomic(scalar) => scalar,
            _ => Scalar::U32,
        };
        let zero = b.module().literal(Literal::zero(scalar));
        b.call_builtin(BuiltinFunction::AtomicStore, None, vec![target, zero]);
    } else {
        let zero = b.module().zero_value(store.ty);
        b.store(target, zero);
    }
}

/// Decomposes the flat element `index` into one index per path step.
///
/// Walking from the innermost array outwards, each axis divides by the
/// product of the extents inside it and takes the remainder by its own
/// extent. The division is skipped when that product is 1, the remainder
/// when `total` cannot exceed the axis, and axes of extent 1 are always 0.
fn element_indices(
    b: &mut Builder<'_>,
    path: &[IndexStep],
    total: u32,
    index: Handle<Value>,
) -> Vec<Handle<Value>> {
    let mut count = 1u32;
    let mut indices = Vec::with_capacity(path.len());
    for step in path.iter().rev() {
        let value = match *step {
            IndexStep::MemberIndex(member) => b.module().constant_u32(member),
            IndexStep::ArrayIndex { count: 1 } => b.module().constant_u32(0),
            IndexStep::ArrayIndex { count: extent } => {
                let mut value = index;
                if count > 1 {
                    let divisor = b.module().constant_u32(count);
                    value = b.binary(BinaryOp::Divide, value, divisor);
                }
                if total > count * extent {
                    let modulus = b.module().constant_u32(extent);
                    value = b.binary(BinaryOp::Modulo, value, modulus);
                }
                count *= extent;
                value
            }
        };
        indices.push(value);
    }
    indices.reverse();
    indices
}
