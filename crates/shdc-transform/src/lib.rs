//! IR-to-IR lowering transforms for shdc.
//!
//! Provides a [`Transform`] trait, a [`Pipeline`] that runs transforms in
//! order, and the built-in transforms:
//!
//! - [`ZeroInitWorkgroupMemory`] zero-fills workgroup memory at compute
//!   entry points.
//! - [`ShaderIo`] packs entry-point inputs and outputs into per-entry-point
//!   structs behind a wrapper function.
//! - [`RenameConflicts`] renames user declarations that shadow names a
//!   printer must be able to resolve.
//!
//! Every transform validates the module first and leaves it untouched when
//! validation fails.

mod rename;
mod scope;
mod shader_io;
mod zero_init;

pub use rename::{RenameConflicts, rename_conflicts};
pub use scope::{Decl, ScopeStack};
pub use shader_io::{ShaderIo, ShaderIoConfig, lower_shader_io};
pub use zero_init::{
    IndexStep, StorePlan, Strategy, ZeroInitConfig, ZeroInitEmit, ZeroInitWorkgroupMemory,
    ZeroStore, zero_init_workgroup_memory,
};

use std::fmt::Debug;

use shdc_ir::{Capabilities, Module, ValidationError};

/// A transform that rewrites an IR module in place.
pub trait Transform: Debug {
    /// Human-readable name of the transform.
    fn name(&self) -> &str;

    /// Runs the transform. On error the module is unchanged.
    fn run(&self, module: &mut Module) -> Result<(), ValidationError>;
}

/// Validates `module` with the capabilities every transform accepts.
pub(crate) fn validate(module: &Module) -> Result<(), ValidationError> {
    shdc_ir::validate(module, Capabilities::EMPTY)
}

/// Which transforms a [`Pipeline`] runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Zero-initialize workgroup memory; `None` skips the transform.
    pub zero_init: Option<ZeroInitConfig>,
    /// Lower shader I/O; `None` skips the transform.
    pub shader_io: Option<ShaderIoConfig>,
    pub rename_conflicts: bool,
}

/// Runs transforms in sequence, stopping at the first error.
#[derive(Debug, Default)]
pub struct Pipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pipeline with the transforms `config` enables, ordered
    /// zero-init, shader I/O, then renaming.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut pipeline = Self::new();
        if let Some(zero_init) = config.zero_init {
            pipeline.add(Box::new(ZeroInitWorkgroupMemory::new(zero_init)));
        }
        if let Some(shader_io) = config.shader_io {
            pipeline.add(Box::new(ShaderIo::new(shader_io)));
        }
        if config.rename_conflicts {
            pipeline.add(Box::new(RenameConflicts));
        }
        pipeline
    }

    /// Adds a transform to the end of the pipeline.
    pub fn add(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    /// Names of the transforms, in run order.
    pub fn names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    /// Runs every transform in order.
    pub fn run(&self, module: &mut Module) -> Result<(), ValidationError> {
        for transform in &self.transforms {
            log::debug!("running transform '{}'", transform.name());
            transform.run(module).inspect_err(|err| {
                log::warn!("transform '{}' rejected the module: {err}", transform.name());
            })?;
        }
        Ok(())
    }
}
