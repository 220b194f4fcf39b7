//! The validation error reported when a module is not well-formed.

/// A structural problem found by [`validate`](crate::validate).
///
/// Every transform validates its input first and returns this error
/// unchanged, without touching the module.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum ValidationError {
    /// A handle index is out of bounds for its arena.
    #[error("{context}: {kind} handle {index} out of bounds (arena size: {size})")]
    #[diagnostic(code(shdc::ir::bad_handle))]
    BadHandle {
        context: String,
        kind: &'static str,
        index: usize,
        size: usize,
    },

    /// A block does not end with a terminator.
    #[error("{context}: block {block} is not terminated")]
    #[diagnostic(
        code(shdc::ir::missing_terminator),
        help("end the block with return, exit, continue, next_iteration, or break_if")
    )]
    MissingTerminator { context: String, block: usize },

    /// A terminator appears before the end of its block.
    #[error("{context}: terminator {instruction} is not the last instruction of block {block}")]
    #[diagnostic(code(shdc::ir::misplaced_terminator))]
    MisplacedTerminator {
        context: String,
        block: usize,
        instruction: usize,
    },

    /// A block is owned by more than one function or control instruction.
    #[error("block {block} has more than one owner")]
    #[diagnostic(code(shdc::ir::shared_block))]
    SharedBlock { block: usize },

    /// An instruction appears in more than one block.
    #[error("instruction {instruction} appears in more than one block")]
    #[diagnostic(code(shdc::ir::shared_instruction))]
    SharedInstruction { instruction: usize },

    /// The root block holds something other than variable declarations.
    #[error("module root block holds non-variable instruction {instruction}")]
    #[diagnostic(
        code(shdc::ir::root_instruction),
        help("only `var` declarations may appear at module scope")
    )]
    RootInstruction { instruction: usize },

    /// An instruction result does not point back at its instruction.
    #[error("{context}: result of instruction {instruction} is not owned by it")]
    #[diagnostic(code(shdc::ir::foreign_result))]
    ForeignResult { context: String, instruction: usize },

    /// An operand is not a constant, a visible parameter, or an emitted result.
    #[error("{context}: instruction {instruction} uses undefined value {value}")]
    #[diagnostic(code(shdc::ir::undefined_value))]
    UndefinedValue {
        context: String,
        instruction: usize,
        value: usize,
    },

    /// A type mismatch was detected.
    #[error("{context}: type mismatch: expected {expected}, found {found}")]
    #[diagnostic(code(shdc::ir::type_mismatch))]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    /// A workgroup variable has a type that cannot live in workgroup memory.
    #[error("workgroup variable {value} has non-fixed-size type {ty}")]
    #[diagnostic(code(shdc::ir::workgroup_type))]
    WorkgroupType { value: usize, ty: String },

    /// A workgroup variable has more elements than a `u32` can count.
    #[error("workgroup variable {value} of type {ty} has more than u32::MAX elements")]
    #[diagnostic(
        code(shdc::ir::workgroup_too_large),
        help("split the variable into smaller arrays")
    )]
    WorkgroupTooLarge { value: usize, ty: String },

    /// An invalid workgroup size was specified.
    #[error("entry point '{function}' has invalid workgroup size {size:?}")]
    #[diagnostic(code(shdc::ir::workgroup_size))]
    InvalidWorkgroupSize {
        function: String,
        size: Option<[u32; 3]>,
    },

    /// An entry-point parameter or member crosses the interface without attributes.
    #[error("entry point '{function}': {what} has no location or builtin attribute")]
    #[diagnostic(
        code(shdc::ir::unannotated_io),
        help("annotate it with @location or @builtin")
    )]
    UnannotatedIo { function: String, what: String },
}
