//! Scope-conflict renaming.
//!
//! Printers resolve type names, address-space and access keywords, builtin
//! function names and user declarations by name. This transform renames any
//! user declaration that would shadow one of those names at a point where
//! the name has to resolve, and any declaration that shadows a declaration
//! visible from an enclosing scope.

use shdc_ir::{
    Block, Handle, Instruction, InstructionKind, Module, Namer, Type, TypeInner, ValidationError,
};

use crate::Transform;
use crate::scope::{Decl, ScopeStack};

/// Renames user declarations that collide with names a printer must resolve.
#[derive(Debug)]
pub struct RenameConflicts;

impl Transform for RenameConflicts {
    fn name(&self) -> &str {
        "rename-conflicts"
    }

    fn run(&self, module: &mut Module) -> Result<(), ValidationError> {
        rename_conflicts(module)
    }
}

/// Validates `module`, then renames every conflicting declaration.
pub fn rename_conflicts(module: &mut Module) -> Result<(), ValidationError> {
    crate::validate(module)?;
    let namer = Namer::new(module);
    let mut renamer = Renamer {
        module,
        namer,
        scopes: ScopeStack::new(),
        renamed: 0,
    };
    renamer.run();
    log::info!("rename-conflicts: {} declarations renamed", renamer.renamed);
    Ok(())
}

struct Renamer<'m> {
    module: &'m mut Module,
    namer: Namer,
    scopes: ScopeStack,
    renamed: usize,
}

impl Renamer<'_> {
    fn run(&mut self) {
        self.scopes.push();

        // Everything at module scope is visible everywhere, so register it
        // all before resolving any use.
        let structs: Vec<_> = self
            .module
            .types
            .iter()
            .filter(|(_, ty)| {
                matches!(ty.inner, TypeInner::Struct { .. }) && !ty.is_builtin_struct()
            })
            .map(|(handle, _)| handle)
            .collect();
        for &ty in &structs {
            self.declare(Decl::Struct(ty));
        }
        for (_, var) in self.module.root_vars() {
            self.declare(Decl::Value(var));
        }
        let functions: Vec<_> = self.module.functions.handles().collect();
        for &function in &functions {
            self.declare(Decl::Function(function));
        }

        for &ty in &structs {
            let members: Vec<_> = self.module.types[ty]
                .inner
                .struct_members()
                .map(|members| members.iter().map(|m| m.ty).collect())
                .unwrap_or_default();
            for member in members {
                self.ensure_type_resolvable(member);
            }
        }

        let root = self.module.blocks[self.module.root_block].instructions.clone();
        for inst in root {
            self.process_instruction(inst, false);
        }

        for function in functions {
            self.scoped(|this| {
                let params: Vec<_> = this.module.functions[function]
                    .params
                    .iter()
                    .map(|p| p.value)
                    .collect();
                // Signature types are printed before any parameter is in scope.
                if let Some(ret) = this.module.functions[function].return_type {
                    this.ensure_type_resolvable(ret);
                }
                for &param in &params {
                    let ty = this.module.values[param].ty;
                    this.ensure_type_resolvable(ty);
                }
                for param in params {
                    this.declare(Decl::Value(param));
                }
                let block = this.module.functions[function].block;
                this.process_block(block);
            });
        }

        self.scopes.pop();
    }

    /// Runs `f` inside a fresh innermost scope.
    fn scoped(&mut self, f: impl FnOnce(&mut Self)) {
        self.scopes.push();
        f(self);
        self.scopes.pop();
    }

    fn process_block(&mut self, block: Handle<Block>) {
        let instructions = self.module.blocks[block].instructions.clone();
        for inst in instructions {
            self.process_instruction(inst, true);
        }
    }

    fn process_instruction(&mut self, inst: Handle<Instruction>, declare_result: bool) {
        let Instruction { kind, result } = self.module.instructions[inst].clone();

        for operand in kind.operands() {
            let value = &self.module.values[operand];
            let ty = value.ty;
            let is_named = value.name.is_some();
            if value.is_constant() {
                self.ensure_type_resolvable(ty);
            } else if is_named {
                self.ensure_resolves_to_decl(Decl::Value(operand));
            }
        }

        match &kind {
            InstructionKind::Var { .. }
            | InstructionKind::Let { .. }
            | InstructionKind::Construct { .. } => {
                if let Some(result) = result {
                    let ty = self.module.values[result].ty;
                    self.ensure_type_resolvable(ty);
                }
            }
            InstructionKind::BuiltinCall { function, .. } => {
                self.ensure_resolves_to(function.name(), None);
            }
            InstructionKind::UserCall { function, .. } => {
                self.ensure_resolves_to_decl(Decl::Function(*function));
            }
            InstructionKind::If { accept, reject, .. } => {
                let (accept, reject) = (*accept, *reject);
                self.scoped(|this| this.process_block(accept));
                self.scoped(|this| this.process_block(reject));
            }
            InstructionKind::Loop {
                initializer,
                body,
                continuing,
            } => {
                // The body sees the initializer's names, and the continuing
                // block sees the body's.
                let (initializer, body, continuing) = (*initializer, *body, *continuing);
                self.scoped(|this| {
                    this.process_block(initializer);
                    this.scoped(|this| {
                        this.process_block(body);
                        this.scoped(|this| this.process_block(continuing));
                    });
                });
            }
            InstructionKind::Switch { cases, .. } => {
                for case in cases {
                    let block = case.block;
                    self.scoped(|this| this.process_block(block));
                }
            }
            InstructionKind::Access { .. }
            | InstructionKind::Load { .. }
            | InstructionKind::Store { .. }
            | InstructionKind::Binary { .. }
            | InstructionKind::Return { .. }
            | InstructionKind::ExitIf
            | InstructionKind::ExitLoop
            | InstructionKind::ExitSwitch
            | InstructionKind::Continue
            | InstructionKind::NextIteration
            | InstructionKind::BreakIf { .. }
            | InstructionKind::Unreachable => {}
        }

        if declare_result && let Some(result) = result {
            self.declare(Decl::Value(result));
        }
    }

    /// Makes every name the printed form of `ty` depends on resolve to the
    /// builtin, or to the struct itself for user structs.
    fn ensure_type_resolvable(&mut self, ty: Handle<Type>) {
        match self.module.types[ty].inner.clone() {
            TypeInner::Scalar(scalar) => self.ensure_resolves_to(&scalar.to_string(), None),
            TypeInner::Vector { size, scalar } => {
                self.ensure_resolves_to(&format!("vec{size}"), None);
                self.ensure_resolves_to(&scalar.to_string(), None);
            }
            TypeInner::Matrix {
                columns,
                rows,
                scalar,
            } => {
                self.ensure_resolves_to(&format!("mat{columns}x{rows}"), None);
                self.ensure_resolves_to(&scalar.to_string(), None);
            }
            TypeInner::Atomic(scalar) => {
                self.ensure_resolves_to("atomic", None);
                self.ensure_resolves_to(&scalar.to_string(), None);
            }
            TypeInner::Pointer {
                base,
                space,
                access,
            } => {
                self.ensure_resolves_to("ptr", None);
                self.ensure_resolves_to(space.keyword(), None);
                self.ensure_resolves_to(access.keyword(), None);
                self.ensure_type_resolvable(base);
            }
            TypeInner::Array { base, .. } => {
                self.ensure_resolves_to("array", None);
                self.ensure_type_resolvable(base);
            }
            TypeInner::Struct { .. } => {
                let struct_ty = &self.module.types[ty];
                if struct_ty.is_builtin_struct() {
                    if let Some(name) = struct_ty.name.clone() {
                        self.ensure_resolves_to(&name, None);
                    }
                } else {
                    self.ensure_resolves_to_decl(Decl::Struct(ty));
                }
            }
        }
    }

    fn ensure_resolves_to_decl(&mut self, decl: Decl) {
        if let Some(name) = self.name_of(decl) {
            self.ensure_resolves_to(&name, Some(decl));
        }
    }

    /// Makes `name` resolve to `expected` (`None` for a builtin): the
    /// innermost declaration of `name`, if it is something else, is renamed.
    fn ensure_resolves_to(&mut self, name: &str, expected: Option<Decl>) {
        let Some((depth, found)) = self.scopes.resolve(name) else {
            return;
        };
        if Some(found) == expected {
            return;
        }
        self.scopes.remove_at(depth, name);
        let new_name = self.rename(found);
        self.scopes.declare_at(depth, new_name, found);
    }

    /// Declares `decl` in the innermost scope, renaming it first if its name
    /// is already bound to something else in any enclosing scope.
    fn declare(&mut self, decl: Decl) {
        let Some(name) = self.name_of(decl) else {
            return;
        };
        let name = if self.scopes.conflicts(&name, decl) {
            self.rename(decl)
        } else {
            name
        };
        self.scopes.declare(name, decl);
    }

    fn name_of(&self, decl: Decl) -> Option<String> {
        match decl {
            Decl::Value(value) => self.module.values[value].name.clone(),
            Decl::Struct(ty) => self.module.types[ty].name.clone(),
            Decl::Function(function) => self.module.functions[function].name.clone(),
        }
    }

    /// Gives `decl` a fresh module-unique name derived from its current one.
    fn rename(&mut self, decl: Decl) -> String {
        let old = self.name_of(decl).unwrap_or_default();
        let new = self.namer.fresh(&old);
        match decl {
            Decl::Value(value) => self.module.values[value].name = Some(new.clone()),
            Decl::Function(function) => self.module.functions[function].name = Some(new.clone()),
            Decl::Struct(ty) => {
                let mut renamed: Type = self.module.types[ty].clone();
                renamed.name = Some(new.clone());
                self.module.types.replace(ty, renamed);
            }
        }
        log::debug!("renamed {decl:?} '{old}' to '{new}'");
        self.renamed += 1;
        new
    }
}

/// Every named declaration of `module` as `(name, decl)` pairs; used by
/// tests to check uniqueness.
#[cfg(test)]
fn named_decls(module: &Module) -> Vec<(String, Decl)> {
    let mut decls = Vec::new();
    for (handle, value) in module.values.iter() {
        if let Some(name) = &value.name {
            decls.push((name.clone(), Decl::Value(handle)));
        }
    }
    for (handle, function) in module.functions.iter() {
        if let Some(name) = &function.name {
            decls.push((name.clone(), Decl::Function(handle)));
        }
    }
    decls
}
