//! Shader I/O attributes for entry-point parameters, results, and struct members.

/// Built-in shader inputs/outputs.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BuiltIn {
    /// `@builtin(position)`: vec4<f32>
    Position,
    /// `@builtin(front_facing)`: bool
    FrontFacing,
    /// `@builtin(frag_depth)`: f32
    FragDepth,
    /// `@builtin(sample_index)`: u32
    SampleIndex,
    /// `@builtin(sample_mask)`: u32
    SampleMask,
    /// `@builtin(point_size)`: f32, vertex output only
    PointSize,
    /// `@builtin(vertex_index)`: u32
    VertexIndex,
    /// `@builtin(instance_index)`: u32
    InstanceIndex,
    /// `@builtin(local_invocation_id)`: vec3<u32>
    LocalInvocationId,
    /// `@builtin(local_invocation_index)`: u32
    LocalInvocationIndex,
    /// `@builtin(global_invocation_id)`: vec3<u32>
    GlobalInvocationId,
    /// `@builtin(workgroup_id)`: vec3<u32>
    WorkgroupId,
    /// `@builtin(num_workgroups)`: vec3<u32>
    NumWorkgroups,
}

/// Interpolation type of a user-defined varying.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum InterpolationType {
    Perspective,
    Linear,
    Flat,
}

/// Interpolation sampling of a user-defined varying.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum InterpolationSampling {
    Center,
    Centroid,
    Sample,
}

/// `@interpolate(type, sampling)`.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Interpolation {
    pub ty: InterpolationType,
    pub sampling: Option<InterpolationSampling>,
}

/// The I/O attribute set of a parameter, return value, or struct member.
///
/// Only meaningful at an entry-point boundary; everywhere else it is
/// carried along untouched or stripped.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct IoAttributes {
    pub location: Option<u32>,
    pub builtin: Option<BuiltIn>,
    pub interpolation: Option<Interpolation>,
    pub invariant: bool,
    /// `@blend_src(N)` for dual-source blending fragment outputs.
    pub blend_src: Option<u32>,
}

impl IoAttributes {
    /// `@location(N)`.
    pub fn location(location: u32) -> Self {
        Self {
            location: Some(location),
            ..Self::default()
        }
    }

    /// `@builtin(B)`.
    pub fn builtin(builtin: BuiltIn) -> Self {
        Self {
            builtin: Some(builtin),
            ..Self::default()
        }
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = Some(interpolation);
        self
    }

    pub fn with_invariant(mut self) -> Self {
        self.invariant = true;
        self
    }

    pub fn with_blend_src(mut self, index: u32) -> Self {
        self.blend_src = Some(index);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns `true` if this set carries a location or a builtin, i.e. the
    /// value crosses the shader interface.
    pub fn is_io(&self) -> bool {
        self.location.is_some() || self.builtin.is_some()
    }
}
