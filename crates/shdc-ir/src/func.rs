//! Functions and entry points.

use crate::arena::Handle;
use crate::inst::Block;
use crate::io::IoAttributes;
use crate::types::Type;
use crate::value::Value;

/// Pipeline stage of an entry point.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum PipelineStage {
    Vertex,
    Fragment,
    Compute,
}

/// A function parameter.
///
/// Name and type live on the parameter's [`Value`].
#[derive(Clone, Debug)]
pub struct FunctionParam {
    pub value: Handle<Value>,
    pub attributes: IoAttributes,
}

/// An IR function.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<FunctionParam>,
    /// `None` for functions that return nothing.
    pub return_type: Option<Handle<Type>>,
    pub return_attributes: IoAttributes,
    /// `None` unless the function is an entry point.
    pub stage: Option<PipelineStage>,
    /// Workgroup dimensions `[x, y, z]` of a compute entry point.
    pub workgroup_size: Option<[u32; 3]>,
    /// The function body.
    pub block: Handle<Block>,
}

impl Function {
    /// Creates an ordinary function with no parameters around `block`.
    pub fn new(name: impl Into<String>, block: Handle<Block>) -> Self {
        Self {
            name: Some(name.into()),
            params: Vec::new(),
            return_type: None,
            return_attributes: IoAttributes::default(),
            stage: None,
            workgroup_size: None,
            block,
        }
    }

    pub fn is_entry_point(&self) -> bool {
        self.stage.is_some()
    }

    /// Total invocations of a compute workgroup.
    pub fn invocations_per_workgroup(&self) -> Option<u32> {
        self.workgroup_size.and_then(|[x, y, z]| x.checked_mul(y)?.checked_mul(z))
    }
}
