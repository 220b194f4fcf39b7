//! Module-wide name allocation.

use std::collections::HashSet;

use crate::Module;
use crate::types::TypeInner;

/// Hands out names that are unique across a module.
///
/// A fresh name is the requested name itself when nothing uses it yet,
/// otherwise the requested name with the smallest free `_N` suffix, so every
/// generated name traces back to the name it was derived from.
#[derive(Clone, Debug, Default)]
pub struct Namer {
    used: HashSet<String>,
}

impl Namer {
    /// Reserves every value, function, and struct name already in `module`.
    pub fn new(module: &Module) -> Self {
        let mut used = HashSet::new();
        used.extend(module.values.iter().filter_map(|(_, v)| v.name.clone()));
        used.extend(module.functions.iter().filter_map(|(_, f)| f.name.clone()));
        used.extend(
            module
                .types
                .iter()
                .filter(|(_, t)| matches!(t.inner, TypeInner::Struct { .. }))
                .filter_map(|(_, t)| t.name.clone()),
        );
        Self { used }
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Marks `name` as taken.
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_owned());
    }

    /// Returns an unused name derived from `base` and reserves it.
    pub fn fresh(&mut self, base: &str) -> String {
        if self.used.insert(base.to_owned()) {
            return base.to_owned();
        }
        let mut suffix = 1u32;
        loop {
            let candidate = format!("{base}_{suffix}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}
