//! Shader I/O lowering.
//!
//! Each entry point `name` is split in two. The original function becomes
//! an ordinary function `name_inner` that keeps its parameters and result.
//! A new entry point `name` takes the `position` and `front_facing` inputs
//! as separate parameters and every other input as one `name_inputs`
//! struct, calls `name_inner`, and returns all outputs as one
//! `name_outputs` struct.
//!
//! Afterwards no other struct in the module carries I/O attributes.

use std::collections::HashSet;

use shdc_ir::{
    AddressSpace, BinaryOp, Builder, BuiltIn, Function, Handle, IoAttributes, Module, Namer,
    PipelineStage, Scalar, StorageAccess, Type, TypeInner, ValidationError, Value,
};

use crate::Transform;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShaderIoConfig {
    /// Add a `point_size` output of `1.0` to vertex entry points.
    pub emit_vertex_point_size: bool,
    /// AND every sample mask output with this value, or output exactly this
    /// value when the shader writes no sample mask.
    pub fixed_sample_mask: Option<u32>,
}

/// Lowers entry-point I/O to per-entry-point input and output structs.
#[derive(Debug, Default)]
pub struct ShaderIo {
    config: ShaderIoConfig,
}

impl ShaderIo {
    pub fn new(config: ShaderIoConfig) -> Self {
        Self { config }
    }
}

impl Transform for ShaderIo {
    fn name(&self) -> &str {
        "shader-io"
    }

    fn run(&self, module: &mut Module) -> Result<(), ValidationError> {
        lower_shader_io(module, &self.config)
    }
}

/// Validates `module`, then lowers the I/O of every entry point.
pub fn lower_shader_io(module: &mut Module, config: &ShaderIoConfig) -> Result<(), ValidationError> {
    crate::validate(module)?;

    let mut namer = Namer::new(module);
    let mut synthesized = HashSet::new();
    let entry_points = module.entry_points();
    for &function in &entry_points {
        lower_entry_point(module, function, config, &mut namer, &mut synthesized);
    }
    let stripped = strip_struct_attributes(module, &synthesized);
    log::info!(
        "shader-io: lowered {} entry points, stripped I/O attributes from {stripped} structs",
        entry_points.len()
    );
    Ok(())
}

/// Inputs that stay separate wrapper parameters.
fn keeps_separate(attributes: &IoAttributes) -> bool {
    matches!(
        attributes.builtin,
        Some(BuiltIn::Position | BuiltIn::FrontFacing)
    )
}

/// A member of a synthesized struct.
struct Field {
    name: String,
    ty: Handle<Type>,
    attributes: IoAttributes,
}

/// Collects the members of one synthesized struct, keeping names unique.
#[derive(Default)]
struct FieldSet {
    fields: Vec<Field>,
}

impl FieldSet {
    fn push(&mut self, name: &str, ty: Handle<Type>, attributes: IoAttributes) -> u32 {
        let taken = |candidate: &str| self.fields.iter().any(|f| f.name == candidate);
        let mut unique = name.to_owned();
        let mut suffix = 1;
        while taken(&unique) {
            unique = format!("{name}_{suffix}");
            suffix += 1;
        }
        self.fields.push(Field {
            name: unique,
            ty,
            attributes,
        });
        (self.fields.len() - 1) as u32
    }

    fn types(&self) -> Vec<Handle<Type>> {
        self.fields.iter().map(|f| f.ty).collect()
    }

    fn into_struct(self, module: &mut Module, name: &str) -> Handle<Type> {
        let members = self
            .fields
            .into_iter()
            .map(|f| (f.name, f.ty, f.attributes))
            .collect();
        module.new_struct(name, members)
    }
}

/// Where the wrapper finds an input value.
#[derive(Clone, Copy)]
enum InputSource {
    /// The wrapper parameter at this index among the separate parameters.
    Separate(usize),
    /// This member of the inputs struct.
    Field(u32),
}

/// How the wrapper rebuilds one argument of the inner function.
enum Argument {
    Direct(InputSource),
    Struct {
        ty: Handle<Type>,
        members: Vec<InputSource>,
    },
}

/// Where the wrapper finds an output value.
enum OutputSource {
    /// The inner function's result itself.
    Result,
    /// A member of the inner function's struct result.
    Member(u32),
    Constant(Handle<Value>),
}

struct Output {
    source: OutputSource,
    /// AND the value with this mask before storing it.
    mask: Option<u32>,
}

fn lower_entry_point(
    module: &mut Module,
    inner: Handle<Function>,
    config: &ShaderIoConfig,
    namer: &mut Namer,
    synthesized: &mut HashSet<Handle<Type>>,
) {
    let original = &module.functions[inner];
    let Some(stage) = original.stage else {
        return;
    };
    let name = match original.name.clone() {
        Some(name) => name,
        None => namer.fresh("entry"),
    };
    let workgroup_size = original.workgroup_size;
    let params = original.params.clone();
    let return_type = original.return_type;
    let return_attributes = original.return_attributes;

    // ---- Inputs ----
    let mut separate: Vec<(Option<String>, Handle<Type>, IoAttributes)> = Vec::new();
    let mut inputs = FieldSet::default();
    let mut arguments = Vec::with_capacity(params.len());
    for (i, param) in params.iter().enumerate() {
        let value = &module.values[param.value];
        let ty = value.ty;
        let param_name = value.name.clone();
        let argument = match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => {
                let struct_name = module.types[ty].name.clone().unwrap_or_default();
                let members = members
                    .iter()
                    .map(|m| {
                        if keeps_separate(&m.attributes) {
                            separate.push((Some(m.name.clone()), m.ty, m.attributes));
                            InputSource::Separate(separate.len() - 1)
                        } else {
                            let field = format!("{struct_name}_{}", m.name);
                            InputSource::Field(inputs.push(&field, m.ty, m.attributes))
                        }
                    })
                    .collect();
                Argument::Struct { ty, members }
            }
            _ if keeps_separate(&param.attributes) => {
                separate.push((param_name, ty, param.attributes));
                Argument::Direct(InputSource::Separate(separate.len() - 1))
            }
            _ => {
                let field = param_name.unwrap_or_else(|| format!("param_{i}"));
                Argument::Direct(InputSource::Field(inputs.push(
                    &field,
                    ty,
                    param.attributes,
                )))
            }
        };
        arguments.push(argument);
    }

    // ---- Outputs ----
    let mut outputs = FieldSet::default();
    let mut sources = Vec::new();
    if let Some(ty) = return_type {
        match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => {
                let struct_name = module.types[ty].name.clone().unwrap_or_default();
                for (i, m) in members.iter().enumerate() {
                    let field = format!("{struct_name}_{}", m.name);
                    outputs.push(&field, m.ty, m.attributes);
                    sources.push(Output {
                        source: OutputSource::Member(i as u32),
                        mask: None,
                    });
                }
            }
            _ => {
                outputs.push("result", ty, return_attributes);
                sources.push(Output {
                    source: OutputSource::Result,
                    mask: None,
                });
            }
        }
    }
    if stage == PipelineStage::Vertex && config.emit_vertex_point_size {
        let f32_ty = module.scalar_type(Scalar::F32);
        let one = module.constant_f32(1.0);
        outputs.push("point_size", f32_ty, IoAttributes::builtin(BuiltIn::PointSize));
        sources.push(Output {
            source: OutputSource::Constant(one),
            mask: None,
        });
    }
    if let Some(mask) = config.fixed_sample_mask {
        let existing = outputs
            .fields
            .iter()
            .position(|f| f.attributes.builtin == Some(BuiltIn::SampleMask));
        match existing {
            Some(index) => sources[index].mask = Some(mask),
            None => {
                let u32_ty = module.scalar_type(Scalar::U32);
                let value = module.constant_u32(mask);
                outputs.push("sample_mask", u32_ty, IoAttributes::builtin(BuiltIn::SampleMask));
                sources.push(Output {
                    source: OutputSource::Constant(value),
                    mask: None,
                });
            }
        }
    }
    if return_type.is_some() && outputs.fields.is_empty() {
        log::warn!("shader-io: entry point '{name}' returns a struct with no members");
    }

    // ---- Inner function ----
    let inner_name = namer.fresh(&format!("{name}_inner"));
    let function = &mut module.functions[inner];
    function.name = Some(inner_name);
    function.stage = None;
    function.workgroup_size = None;
    function.return_attributes = IoAttributes::default();
    for param in &mut function.params {
        param.attributes = IoAttributes::default();
    }

    // ---- Wrapper ----
    let input_types = inputs.types();
    let output_types = outputs.types();
    let inputs_ty = (!inputs.fields.is_empty()).then(|| {
        let ty = inputs.into_struct(module, &namer.fresh(&format!("{name}_inputs")));
        synthesized.insert(ty);
        ty
    });
    let outputs_ty = (!outputs.fields.is_empty()).then(|| {
        let ty = outputs.into_struct(module, &namer.fresh(&format!("{name}_outputs")));
        synthesized.insert(ty);
        ty
    });
    log::debug!(
        "shader-io: '{name}': {} separate inputs, {} packed inputs, {} outputs",
        separate.len(),
        input_types.len(),
        output_types.len()
    );

    let wrapper = module.new_function(name, outputs_ty);
    module.functions[wrapper].stage = Some(stage);
    module.functions[wrapper].workgroup_size = workgroup_size;
    let separate_values: Vec<_> = separate
        .into_iter()
        .map(|(name, ty, attributes)| module.add_param(wrapper, name.as_deref(), ty, attributes))
        .collect();
    let inputs_value =
        inputs_ty.map(|ty| module.add_param(wrapper, Some("inputs"), ty, IoAttributes::default()));

    let block = module.functions[wrapper].block;
    let mut b = Builder::append(module, block);
    let read = |b: &mut Builder<'_>, source: InputSource| match (source, inputs_value) {
        (InputSource::Separate(index), _) => separate_values[index],
        (InputSource::Field(index), Some(inputs)) => {
            let member = b.module().constant_u32(index);
            b.access(input_types[index as usize], inputs, vec![member])
        }
        (InputSource::Field(_), None) => unreachable!("input field without an inputs struct"),
    };
    let mut args = Vec::with_capacity(arguments.len());
    for argument in arguments {
        let value = match argument {
            Argument::Direct(source) => read(&mut b, source),
            Argument::Struct { ty, members } => {
                let values = members.into_iter().map(|s| read(&mut b, s)).collect();
                b.construct(ty, values)
            }
        };
        args.push(value);
    }
    let result = b.call(inner, args);

    let Some(outputs_ty) = outputs_ty else {
        b.return_(None);
        return;
    };
    let out = b.var(Some("outputs"), outputs_ty, AddressSpace::Function, None);
    for (index, (output, field_ty)) in sources.into_iter().zip(output_types).enumerate() {
        let mut value = match (output.source, result) {
            (OutputSource::Result, Some(result)) => result,
            (OutputSource::Member(member), Some(result)) => {
                let member = b.module().constant_u32(member);
                b.access(field_ty, result, vec![member])
            }
            (OutputSource::Constant(value), _) => value,
            (OutputSource::Result | OutputSource::Member(_), None) => {
                unreachable!("output read from a call without a result")
            }
        };
        if let Some(mask) = output.mask {
            let mask = b.module().constant_u32(mask);
            value = b.binary(BinaryOp::And, value, mask);
        }
        let ptr = b
            .module()
            .pointer_type(field_ty, AddressSpace::Function, StorageAccess::LOAD_STORE);
        let member = b.module().constant_u32(index as u32);
        let target = b.access(ptr, out, vec![member]);
        b.store(target, value);
    }
    let loaded = b.load(out);
    b.return_(Some(loaded));
}

/// Clears the I/O attributes of every struct not in `keep`; returns how
/// many structs changed.
fn strip_struct_attributes(module: &mut Module, keep: &HashSet<Handle<Type>>) -> usize {
    let targets: Vec<_> = module
        .types
        .iter()
        .filter(|(handle, ty)| {
            !keep.contains(handle)
                && ty
                    .inner
                    .struct_members()
                    .is_some_and(|members| members.iter().any(|m| !m.attributes.is_empty()))
        })
        .map(|(handle, _)| handle)
        .collect();
    for &handle in &targets {
        let mut stripped = module.types[handle].clone();
        if let TypeInner::Struct { members, .. } = &mut stripped.inner {
            for member in members {
                member.attributes = IoAttributes::default();
            }
        }
        log::debug!("shader-io: stripped I/O attributes from {:?}", stripped.name);
        module.types.replace(handle, stripped);
    }
    targets.len()
}
