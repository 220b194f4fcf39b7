//! Display implementations and text dump for debugging.

use std::fmt;
use std::fmt::Write as _;

use crate::Module;
use crate::arena::{Handle, UniqueArena};
use crate::func::{Function, PipelineStage};
use crate::inst::{BinaryOp, Block, BuiltinFunction, InstructionKind};
use crate::io::{BuiltIn, Interpolation, InterpolationSampling, InterpolationType, IoAttributes};
use crate::space::{AddressSpace, ResourceBinding, StorageAccess};
use crate::types::{ArraySize, Scalar, ScalarKind, Type, TypeInner, VectorSize};
use crate::value::{Constant, Literal, Value, ValueKind};

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScalarKind::Bool => write!(f, "bool"),
            ScalarKind::Sint => write!(f, "i{}", self.width * 8),
            ScalarKind::Uint => write!(f, "u{}", self.width * 8),
            ScalarKind::Float => write!(f, "f{}", self.width * 8),
        }
    }
}

impl fmt::Display for VectorSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u32)
    }
}

impl fmt::Display for StorageAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl fmt::Display for ResourceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@group({}) @binding({})", self.group, self.binding)
    }
}

impl fmt::Display for BuiltIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Position => "position",
            Self::FrontFacing => "front_facing",
            Self::FragDepth => "frag_depth",
            Self::SampleIndex => "sample_index",
            Self::SampleMask => "sample_mask",
            Self::PointSize => "point_size",
            Self::VertexIndex => "vertex_index",
            Self::InstanceIndex => "instance_index",
            Self::LocalInvocationId => "local_invocation_id",
            Self::LocalInvocationIndex => "local_invocation_index",
            Self::GlobalInvocationId => "global_invocation_id",
            Self::WorkgroupId => "workgroup_id",
            Self::NumWorkgroups => "num_workgroups",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = match self.ty {
            InterpolationType::Perspective => "perspective",
            InterpolationType::Linear => "linear",
            InterpolationType::Flat => "flat",
        };
        match self.sampling {
            None => write!(f, "@interpolate({ty})"),
            Some(sampling) => {
                let sampling = match sampling {
                    InterpolationSampling::Center => "center",
                    InterpolationSampling::Centroid => "centroid",
                    InterpolationSampling::Sample => "sample",
                };
                write!(f, "@interpolate({ty}, {sampling})")
            }
        }
    }
}

impl fmt::Display for IoAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(location) = self.location {
            parts.push(format!("@location({location})"));
        }
        if let Some(builtin) = self.builtin {
            parts.push(format!("@builtin({builtin})"));
        }
        if let Some(interpolation) = self.interpolation {
            parts.push(interpolation.to_string());
        }
        if self.invariant {
            parts.push("@invariant".into());
        }
        if let Some(index) = self.blend_src {
            parts.push(format!("@blend_src({index})"));
        }
        f.write_str(&parts.join(" "))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}i"),
            Self::U32(v) => write!(f, "{v}u"),
            Self::F32(v) => write!(f, "{v}f"),
            Self::F16(v) => write!(f, "{v}h"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
        };
        f.write_str(op)
    }
}

impl fmt::Display for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => write!(f, "@vertex"),
            Self::Fragment => write!(f, "@fragment"),
            Self::Compute => write!(f, "@compute"),
        }
    }
}

/// Formats a type using the type arena for resolving inner references.
///
/// Named types print as their name.
pub fn format_type(ty: &Type, types: &UniqueArena<Type>) -> String {
    if let Some(ref name) = ty.name {
        return name.clone();
    }
    format_type_inner(&ty.inner, types)
}

fn format_type_inner(inner: &TypeInner, types: &UniqueArena<Type>) -> String {
    match inner {
        TypeInner::Scalar(s) => format!("{s}"),
        TypeInner::Vector { size, scalar } => format!("vec{size}<{scalar}>"),
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } => format!("mat{columns}x{rows}<{scalar}>"),
        TypeInner::Atomic(s) => format!("atomic<{s}>"),
        TypeInner::Pointer {
            base,
            space,
            access,
        } => {
            let base_str = format_type(&types[*base], types);
            format!("ptr<{space}, {base_str}, {access}>")
        }
        TypeInner::Array { base, size, .. } => {
            let base_str = format_type(&types[*base], types);
            match size {
                ArraySize::Constant(n) => format!("array<{base_str}, {n}>"),
                ArraySize::Dynamic => format!("array<{base_str}>"),
            }
        }
        TypeInner::Struct { members, span } => {
            format!("struct({} members, span {span})", members.len())
        }
    }
}

/// Formats a value operand: constants inline, named values as `%name`,
/// unnamed values as `%N`.
fn format_value(module: &Module, handle: Handle<Value>) -> String {
    let value = &module.values[handle];
    match &value.kind {
        ValueKind::Constant(Constant::Scalar(lit)) => lit.to_string(),
        ValueKind::Constant(Constant::Zero) => {
            format!("{}()", format_type(&module.types[value.ty], &module.types))
        }
        ValueKind::Constant(Constant::Composite(components)) => {
            let args: Vec<_> = components
                .iter()
                .map(|&c| format_value(module, c))
                .collect();
            format!(
                "{}({})",
                format_type(&module.types[value.ty], &module.types),
                args.join(", ")
            )
        }
        ValueKind::InstructionResult(_) | ValueKind::FunctionParam { .. } => match &value.name {
            Some(name) => format!("%{name}"),
            None => format!("%{}", handle.index()),
        },
    }
}

fn format_values(module: &Module, values: &[Handle<Value>]) -> String {
    values
        .iter()
        .map(|&v| format_value(module, v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_block(out: &mut String, module: &Module, block: Handle<Block>, indent: usize) {
    let pad = " ".repeat(indent);
    for &inst in &module.blocks[block].instructions {
        let instruction = &module.instructions[inst];
        let lhs = match instruction.result {
            Some(result) => {
                let ty = format_type(&module.types[module.values[result].ty], &module.types);
                format!("{}: {ty} = ", format_value(module, result))
            }
            None => String::new(),
        };
        let _ = write!(out, "{pad}{lhs}");
        match &instruction.kind {
            InstructionKind::Var {
                initializer,
                binding,
            } => {
                if let Some(binding) = binding {
                    let _ = write!(out, "{binding} ");
                }
                out.push_str("var");
                if let Some(init) = initializer {
                    let _ = write!(out, " {}", format_value(module, *init));
                }
                out.push('\n');
            }
            InstructionKind::Let { value } => {
                let _ = writeln!(out, "let {}", format_value(module, *value));
            }
            InstructionKind::Construct { args } => {
                let _ = writeln!(out, "construct {}", format_values(module, args));
            }
            InstructionKind::Access { object, indices } => {
                let _ = writeln!(
                    out,
                    "access {}, {}",
                    format_value(module, *object),
                    format_values(module, indices)
                );
            }
            InstructionKind::Load { from } => {
                let _ = writeln!(out, "load {}", format_value(module, *from));
            }
            InstructionKind::Store { to, value } => {
                let _ = writeln!(
                    out,
                    "store {}, {}",
                    format_value(module, *to),
                    format_value(module, *value)
                );
            }
            InstructionKind::Binary { op, lhs, rhs } => {
                let _ = writeln!(
                    out,
                    "{} {op} {}",
                    format_value(module, *lhs),
                    format_value(module, *rhs)
                );
            }
            InstructionKind::BuiltinCall { function, args } => {
                let _ = writeln!(out, "{function}({})", format_values(module, args));
            }
            InstructionKind::UserCall { function, args } => {
                let name = module.functions[*function].name.as_deref().unwrap_or("_");
                let _ = writeln!(out, "call {name}({})", format_values(module, args));
            }
            InstructionKind::If {
                condition,
                accept,
                reject,
            } => {
                let _ = writeln!(out, "if {} {{", format_value(module, *condition));
                write_block(out, module, *accept, indent + 2);
                if !module.blocks[*reject].is_empty() {
                    let _ = writeln!(out, "{pad}}} else {{");
                    write_block(out, module, *reject, indent + 2);
                }
                let _ = writeln!(out, "{pad}}}");
            }
            InstructionKind::Loop {
                initializer,
                body,
                continuing,
            } => {
                out.push_str("loop ");
                if !module.blocks[*initializer].is_empty() {
                    out.push_str("[i: {\n");
                    write_block(out, module, *initializer, indent + 2);
                    let _ = write!(out, "{pad}}}] ");
                }
                out.push_str("{\n");
                write_block(out, module, *body, indent + 2);
                if module.blocks[*continuing].is_empty() {
                    let _ = writeln!(out, "{pad}}}");
                } else {
                    let _ = writeln!(out, "{pad}}} continuing {{");
                    write_block(out, module, *continuing, indent + 2);
                    let _ = writeln!(out, "{pad}}}");
                }
            }
            InstructionKind::Switch { selector, cases } => {
                let _ = writeln!(out, "switch {} {{", format_value(module, *selector));
                for case in cases {
                    let selectors: Vec<_> = case
                        .selectors
                        .iter()
                        .map(|s| match s {
                            Some(v) => format_value(module, *v),
                            None => "default".into(),
                        })
                        .collect();
                    let _ = writeln!(out, "{pad}  case {} {{", selectors.join(", "));
                    write_block(out, module, case.block, indent + 4);
                    let _ = writeln!(out, "{pad}  }}");
                }
                let _ = writeln!(out, "{pad}}}");
            }
            InstructionKind::Return { value } => match value {
                Some(v) => {
                    let _ = writeln!(out, "return {}", format_value(module, *v));
                }
                None => out.push_str("return\n"),
            },
            InstructionKind::ExitIf => out.push_str("exit_if\n"),
            InstructionKind::ExitLoop => out.push_str("exit_loop\n"),
            InstructionKind::ExitSwitch => out.push_str("exit_switch\n"),
            InstructionKind::Continue => out.push_str("continue\n"),
            InstructionKind::NextIteration => out.push_str("next_iteration\n"),
            InstructionKind::BreakIf { condition } => {
                let _ = writeln!(out, "break_if {}", format_value(module, *condition));
            }
            InstructionKind::Unreachable => out.push_str("unreachable\n"),
        }
    }
}

fn dump_function(out: &mut String, module: &Module, func: &Function) {
    let name = func.name.as_deref().unwrap_or("_");
    if let Some(stage) = func.stage {
        let _ = write!(out, "{stage} ");
        if let Some([x, y, z]) = func.workgroup_size {
            let _ = write!(out, "@workgroup_size({x}, {y}, {z}) ");
        }
    }

    let params: Vec<_> = func
        .params
        .iter()
        .map(|param| {
            let value = &module.values[param.value];
            let ty = format_type(&module.types[value.ty], &module.types);
            let attrs = if param.attributes.is_empty() {
                String::new()
            } else {
                format!("{} ", param.attributes)
            };
            format!("{attrs}{}: {ty}", format_value(module, param.value))
        })
        .collect();
    let ret = match func.return_type {
        Some(ty) => {
            let attrs = if func.return_attributes.is_empty() {
                String::new()
            } else {
                format!("{} ", func.return_attributes)
            };
            format!(" -> {attrs}{}", format_type(&module.types[ty], &module.types))
        }
        None => String::new(),
    };
    let _ = writeln!(out, "fn {name}({}){ret} {{", params.join(", "));
    write_block(out, module, func.block, 2);
    out.push_str("}\n");
}

/// Produces a human-readable text dump of a [`Module`] for debugging.
pub fn dump_module(module: &Module) -> String {
    let mut out = String::new();

    let structs: Vec<_> = module
        .types
        .iter()
        .filter_map(|(_, ty)| Some((ty.name.as_deref()?, ty.inner.struct_members()?)))
        .collect();
    for (name, members) in structs {
        let _ = writeln!(out, "struct {name} {{");
        for member in members {
            let ty = format_type(&module.types[member.ty], &module.types);
            let attrs = if member.attributes.is_empty() {
                String::new()
            } else {
                format!("{} ", member.attributes)
            };
            let _ = writeln!(out, "  {attrs}{}: {ty},", member.name);
        }
        out.push_str("}\n\n");
    }

    if !module.blocks[module.root_block].is_empty() {
        write_block(&mut out, module, module.root_block, 0);
        out.push('\n');
    }

    for (_, func) in module.functions.iter() {
        dump_function(&mut out, module, func);
        out.push('\n');
    }

    out
}
