//! Address spaces, access modes, and resource bindings.

/// Bitflags for pointer access modes.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct StorageAccess(u32);

impl StorageAccess {
    /// No access.
    pub const EMPTY: Self = Self(0);
    /// Read access.
    pub const LOAD: Self = Self(1);
    /// Write access.
    pub const STORE: Self = Self(2);
    /// Read and write access.
    pub const LOAD_STORE: Self = Self(3);

    /// Returns `true` if `self` contains all flags in `other`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The access-mode keyword a printer emits for this mode.
    pub fn keyword(self) -> &'static str {
        match (self.contains(Self::LOAD), self.contains(Self::STORE)) {
            (true, true) => "read_write",
            (true, false) => "read",
            (false, true) => "write",
            (false, false) => "none",
        }
    }
}

impl std::ops::BitOr for StorageAccess {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for StorageAccess {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Memory address space of a variable or pointer.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum AddressSpace {
    /// Function-local storage.
    Function,
    /// Module-scope, per-invocation storage.
    Private,
    /// Shared by every invocation of a workgroup; never initialized by the runtime.
    Workgroup,
    /// Externally bound, read-only.
    Uniform,
    /// Externally bound buffer.
    Storage,
}

impl AddressSpace {
    /// The address-space keyword a printer emits.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Private => "private",
            Self::Workgroup => "workgroup",
            Self::Uniform => "uniform",
            Self::Storage => "storage",
        }
    }

    /// Default access mode of a variable declared in this space.
    pub fn default_access(self) -> StorageAccess {
        match self {
            Self::Uniform => StorageAccess::LOAD,
            _ => StorageAccess::LOAD_STORE,
        }
    }
}

/// `@group(N) @binding(N)` resource binding.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct ResourceBinding {
    pub group: u32,
    pub binding: u32,
}
