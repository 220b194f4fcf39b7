//! Lexical scope tracking for name resolution.

use std::collections::HashMap;

use shdc_ir::{Function, Handle, Type, Value};

/// Something a name can resolve to.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Decl {
    Value(Handle<Value>),
    Struct(Handle<Type>),
    Function(Handle<Function>),
}

/// A stack of name → declaration maps, outermost scope first.
#[derive(Clone, Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<HashMap<String, Decl>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Binds `name` in the innermost scope.
    pub fn declare(&mut self, name: impl Into<String>, decl: Decl) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), decl);
        }
    }

    /// Binds `name` in the scope at `depth` (0 is outermost).
    pub fn declare_at(&mut self, depth: usize, name: impl Into<String>, decl: Decl) {
        if let Some(scope) = self.scopes.get_mut(depth) {
            scope.insert(name.into(), decl);
        }
    }

    /// Removes `name` from the scope at `depth`.
    pub fn remove_at(&mut self, depth: usize, name: &str) -> Option<Decl> {
        self.scopes.get_mut(depth)?.remove(name)
    }

    /// Finds the innermost binding of `name` and the depth of its scope.
    pub fn resolve(&self, name: &str) -> Option<(usize, Decl)> {
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(depth, scope)| scope.get(name).map(|&decl| (depth, decl)))
    }

    /// Returns `true` if `name` is bound in any scope to something other
    /// than `decl`.
    pub fn conflicts(&self, name: &str, decl: Decl) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.get(name).is_some_and(|&d| d != decl))
    }
}
