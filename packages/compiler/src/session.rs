//! The compilation session: the single pass-object instance described in
//! spec §5 — one arena set, one template-instantiation memo, one
//! currently-processing-file slot, and the container/template-parameter
//! context stacks shared (sequentially, never concurrently) by every pass.

use std::collections::HashMap;

use crate::arena::Arena;
use crate::ast::{Cont, Decl, DeclId, Expr, Stmt};
use crate::ast::attr::UnresolvedAttr;
use crate::ast::decl::{DeclKind, Visibility, Modifiers};
use crate::ast::types::TypeNode;
use crate::diagnostics::CompileError;
use crate::ident::Identifier;

/// One parsed source file: a bundle of top-level declarations awaiting the
/// cross-file namespace-prototype merge (spec §4.3.1), grounded on the
/// original `ASTFile` container noted in `SPEC_FULL.md` §E.
#[derive(Debug, Clone)]
pub struct AstFile {
    pub path: String,
    pub top_level: Vec<DeclId>,
}

/// Owns every AST arena plus the whole-program file list. Template
/// instantiation allocates new nodes into these same arenas (spec §9).
pub struct Session {
    pub decls: Arena<Decl>,
    pub types: Arena<TypeNode>,
    pub stmts: Arena<Stmt>,
    pub exprs: Arena<Expr>,
    pub conts: Arena<Cont>,
    pub attrs: Arena<UnresolvedAttr>,
    pub files: Vec<AstFile>,

    /// Scoped-acquisition stacks (spec §5): saved and restored by callers
    /// on every exit path, including error propagation.
    container_stack: Vec<DeclId>,
    template_param_stack: Vec<Vec<DeclId>>,

    /// Memoized `DeclKind::Parameter` nodes, one per `(owning function/method,
    /// parameter index)`. Pass S allocates these the first time it resolves a
    /// bare reference to a parameter name, and codegen's prototype-declaring
    /// pass calls the same accessor so both sides bind the same `DeclId` to
    /// the same argument slot without either owning the other's bookkeeping.
    param_decls: HashMap<(DeclId, usize), DeclId>,

    pub diagnostics: Vec<CompileError>,
}

impl Session {
    pub fn new() -> Self {
        Session {
            decls: Arena::new(),
            types: Arena::new(),
            stmts: Arena::new(),
            exprs: Arena::new(),
            conts: Arena::new(),
            attrs: Arena::new(),
            files: Vec::new(),
            container_stack: Vec::new(),
            template_param_stack: Vec::new(),
            param_decls: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// The `DeclId` standing in for parameter `index` of `owner`'s signature,
    /// allocating it on first use. `param` supplies the shape for a
    /// first-time allocation; later callers for the same `(owner, index)`
    /// get back the same id regardless of what they pass.
    pub fn parameter_decl(&mut self, owner: DeclId, index: usize, param: crate::ast::decl::Parameter) -> DeclId {
        if let Some(&id) = self.param_decls.get(&(owner, index)) {
            return id;
        }
        let range = self.decls.get(owner).range;
        let id = self.decls.alloc(Decl::new(
            DeclKind::Parameter(param),
            Visibility::Public,
            Modifiers::empty(),
            range,
        ));
        self.decls.get_mut(id).container = Some(owner);
        self.param_decls.insert((owner, index), id);
        id
    }

    /// Read-only counterpart to `parameter_decl`: the code-gen driver binds
    /// a parameter's stack slot only if pass S actually materialized a
    /// `DeclId` for it (an unreferenced parameter never gets one, and never
    /// needs binding either).
    pub fn parameter_decl_id(&self, owner: DeclId, index: usize) -> Option<DeclId> {
        self.param_decls.get(&(owner, index)).copied()
    }

    pub fn current_container(&self) -> Option<DeclId> {
        self.container_stack.last().copied()
    }

    /// RAII-style scoped push: the guard restores the stack on drop,
    /// including on unwinding from an `Err` return inside the closure,
    /// satisfying the "save current container pointer and push ... on any
    /// exit path ... restore" rule in spec §5.
    pub fn with_container<R>(&mut self, container: DeclId, f: impl FnOnce(&mut Self) -> R) -> R {
        self.container_stack.push(container);
        let result = f(self);
        self.container_stack.pop();
        result
    }

    pub fn with_template_params<R>(&mut self, params: Vec<DeclId>, f: impl FnOnce(&mut Self) -> R) -> R {
        self.template_param_stack.push(params);
        let result = f(self);
        self.template_param_stack.pop();
        result
    }

    /// Innermost-first view of in-scope template parameters, used by type
    /// resolution step 2 (spec §4.4) and by the template instantiator's
    /// nested-context rule (spec §4.5).
    pub fn find_template_param(&self, name: &str) -> Option<DeclId> {
        for scope in self.template_param_stack.iter().rev() {
            for &id in scope.iter().rev() {
                if let Some(n) = self.decls.get(id).name() {
                    if n.text_eq(name) {
                        return Some(id);
                    }
                }
            }
        }
        None
    }

    pub fn enclosing_decls(&self) -> &[DeclId] {
        &self.container_stack
    }

    pub fn report(&mut self, error: CompileError) {
        self.diagnostics.push(error);
    }

    pub fn has_fatal(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_fatal())
    }

    pub fn decl_name_matches(&self, id: DeclId, name: &str) -> bool {
        self.decls.get(id).name().map(|n| n.text_eq(name)).unwrap_or(false)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

pub fn identifier_eq(a: &Identifier, b: &str) -> bool {
    a.text_eq(b)
}
