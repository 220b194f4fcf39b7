//! Integration test: build small shader modules through the public API,
//! validate them, and check the text dump.

use shdc_ir::*;

/// Builds a histogram-style compute shader:
///
/// ```wgsl
/// var<workgroup> bins: array<atomic<u32>, 16>;
///
/// @compute @workgroup_size(64)
/// fn main(@builtin(local_invocation_index) idx: u32) {
///     let bin = idx % 16u;
///     atomicAdd(&bins[bin], 1u);
///     return;
/// }
/// ```
#[test]
fn build_histogram_module() {
    let mut module = Module::default();

    // ---- Types ----
    let u32_ty = module.scalar_type(Scalar::U32);
    let atomic_ty = module.atomic_type(Scalar::U32);
    let bins_ty = module.array_type(atomic_ty, 16);
    let atomic_ptr = module.pointer_type(
        atomic_ty,
        AddressSpace::Workgroup,
        StorageAccess::LOAD_STORE,
    );
    assert_eq!(
        module.scalar_type(Scalar::U32),
        u32_ty,
        "u32 type should be deduplicated"
    );

    // ---- Module-scope variables ----
    let root = module.root_block;
    let bins = Builder::append(&mut module, root).var(
        Some("bins"),
        bins_ty,
        AddressSpace::Workgroup,
        None,
    );

    // ---- Entry point ----
    let main = module.new_function("main", None);
    module.functions[main].stage = Some(PipelineStage::Compute);
    module.functions[main].workgroup_size = Some([64, 1, 1]);
    let idx = module.add_param(
        main,
        Some("idx"),
        u32_ty,
        IoAttributes::builtin(BuiltIn::LocalInvocationIndex),
    );
    let body = module.functions[main].block;
    let sixteen = module.constant_u32(16);
    let one = module.constant_u32(1);
    let mut b = Builder::append(&mut module, body);
    let rem = b.binary(BinaryOp::Modulo, idx, sixteen);
    let bin = b.let_("bin", rem);
    let slot = b.access(atomic_ptr, bins, vec![bin]);
    b.call_builtin(BuiltinFunction::AtomicAdd, Some(u32_ty), vec![slot, one]);
    b.return_(None);

    assert_eq!(validate(&module, Capabilities::EMPTY), Ok(()));
    assert_eq!(module.entry_points(), vec![main]);
    assert_eq!(module.root_vars().len(), 1);
    assert_eq!(module.functions[main].invocations_per_workgroup(), Some(64));

    let dump = dump_module(&module);
    assert!(
        dump.contains("%bins: ptr<workgroup, array<atomic<u32>, 16>, read_write> = var"),
        "dump should declare the workgroup array:\n{dump}"
    );
    assert!(
        dump.contains("fn main(@builtin(local_invocation_index) %idx: u32)"),
        "dump should show the annotated parameter:\n{dump}"
    );
    assert!(dump.contains("%bin: u32 = let"), "dump should bind bin");
    assert!(dump.contains("atomicAdd(%"), "dump should call atomicAdd");
}

/// Builds a fragment shader taking and returning I/O structs.
#[test]
fn build_fragment_module_with_io_structs() {
    let mut module = Module::default();
    let f32_ty = module.scalar_type(Scalar::F32);
    let bool_ty = module.scalar_type(Scalar::BOOL);
    let vec4 = module.vector_type(VectorSize::Quad, Scalar::F32);

    let input = module.new_struct(
        "FragIn",
        vec![
            (
                "facing".into(),
                bool_ty,
                IoAttributes::builtin(BuiltIn::FrontFacing),
            ),
            ("uv".into(), f32_ty, IoAttributes::location(0)),
        ],
    );
    let output = module.new_struct(
        "FragOut",
        vec![("color".into(), vec4, IoAttributes::location(0))],
    );

    let main = module.new_function("fs_main", Some(output));
    module.functions[main].stage = Some(PipelineStage::Fragment);
    let arg = module.add_param(main, Some("frag"), input, IoAttributes::default());
    let body = module.functions[main].block;
    let uv_index = module.constant_u32(1);
    let mut b = Builder::append(&mut module, body);
    let uv = b.access(f32_ty, arg, vec![uv_index]);
    let color = b.construct(vec4, vec![uv, uv, uv, uv]);
    let out = b.construct(output, vec![color]);
    b.return_(Some(out));

    assert_eq!(validate(&module, Capabilities::EMPTY), Ok(()));

    let dump = dump_module(&module);
    assert!(dump.contains("struct FragIn {"));
    assert!(dump.contains("  @builtin(front_facing) facing: bool,"));
    assert!(dump.contains("@fragment fn fs_main(%frag: FragIn) -> FragOut {"));
}

#[test]
fn validation_errors_render_as_diagnostics() {
    use miette::Diagnostic;

    let mut module = Module::default();
    let main = module.new_function("main", None);
    module.functions[main].stage = Some(PipelineStage::Compute);
    module.functions[main].workgroup_size = Some([8, 8, 1]);

    let err = validate(&module, Capabilities::EMPTY).unwrap_err();
    assert_eq!(
        err.code().map(|c| c.to_string()).as_deref(),
        Some("shdc::ir::missing_terminator")
    );
    assert!(err.help().is_some());
    assert!(err.to_string().starts_with("function 'main'"));
}
