//! The code-generation driver (pass G, spec §4.8): walks the resolved
//! tree and emits SSA IR against an abstract [`emitter::Emitter`] sink.
//!
//! Runs in four passes over the program's declarations rather than one:
//! layouts first (a field's size can need its own struct's layout),
//! function/constructor/destructor prototypes second (so a call can
//! reference a callee declared later in the same file, and so a vtable's
//! element values exist before the vtable global that holds them), vtable
//! globals third, and function bodies last. `self`/`sret`/parameter
//! binding happens once per body via `Emitter::get_param`, keyed off the
//! same `DeclId`s pass S (`passes::signature_resolver`) already minted
//! through `Session::parameter_decl`.

pub mod emitter;
pub mod layout;

use crate::ast::decl::{DeclKind, Modifiers, Parameter};
use crate::ast::expr::{BinOp, ExprKind, LabeledArgument, Literal};
use crate::ast::stmt::StmtKind;
use crate::ast::types::TypeKind;
use crate::ast::{DeclId, ExprId, StmtId, TypeId};
use crate::diagnostics::{CompileError, CompileResult, ErrorKind, Phase, SourceRange};
use crate::session::Session;
use crate::target::TargetDescriptor;
use emitter::{Emitter, FloatArith, FloatPredicate, IntArith, IntPredicate, IrType};
use layout::LayoutCache;
use std::collections::HashMap;

fn internal(range: SourceRange, msg: impl Into<String>) -> CompileError {
    CompileError::fatal(Phase::CodeGen, "<codegen>", range, ErrorKind::Internal(msg.into()))
}

/// For a gulc surface feature this driver doesn't lower yet — as opposed
/// to `internal`, which means an earlier pass handed down something that
/// should have been impossible.
fn not_yet_supported(range: SourceRange, msg: impl Into<String>) -> CompileError {
    CompileError::fatal(Phase::CodeGen, "<codegen>", range, ErrorKind::NotYetSupported(msg.into()))
}

/// `true` iff a value of this type is returned through the `sret` pointer
/// convention rather than as an ordinary SSA return value (spec §4.8).
fn is_struct_valued(session: &Session, ty: TypeId) -> bool {
    matches!(session.types.get(ty).kind, TypeKind::Struct { .. })
}

fn ir_type(session: &Session, target: &TargetDescriptor, ty: TypeId) -> CompileResult<IrType> {
    match &session.types.get(ty).kind {
        TypeKind::Bool => Ok(IrType::Int(1)),
        TypeKind::BuiltIn(b) if b.floating => Ok(if b.size_bytes == 4 { IrType::Float32 } else { IrType::Float64 }),
        TypeKind::BuiltIn(b) if b.name == "void" => Ok(IrType::Void),
        TypeKind::BuiltIn(b) => Ok(IrType::Int(b.size_bytes * 8)),
        TypeKind::Pointer { .. } | TypeKind::Reference { .. } | TypeKind::FunctionPointer { .. } => Ok(IrType::Ptr),
        TypeKind::Struct { .. } => Ok(IrType::Ptr), // sret-rewritten: passed/returned by pointer
        TypeKind::Enum { decl } => match &session.decls.get(*decl).kind {
            DeclKind::Enum { underlying: Some(u), .. } => ir_type(session, target, *u),
            _ => Ok(IrType::Int(32)),
        },
        other => Err(internal(SourceRange::zero(), format!("no IR representation for type kind: {other:?}"))),
    }
}

/// `true` iff `decl` is called with an implicit leading `self` pointer: a
/// non-static member of a struct or trait. Constructors/destructors carry
/// their own always-true case directly in `callable_shape`, since their
/// "self" is also their only pointer argument.
fn is_instance_member(session: &Session, decl: DeclId) -> bool {
    let d = session.decls.get(decl);
    if d.modifiers.contains(Modifiers::STATIC) {
        return false;
    }
    match d.container {
        Some(c) => matches!(session.decls.get(c).kind, DeclKind::Struct { .. } | DeclKind::Trait { .. }),
        None => false,
    }
}

fn is_callable(kind: &DeclKind) -> bool {
    matches!(
        kind,
        DeclKind::Function { .. } | DeclKind::Operator { .. } | DeclKind::CallOperator { .. } | DeclKind::Constructor { .. } | DeclKind::Destructor { .. }
    )
}

fn body_of(kind: &DeclKind) -> Option<StmtId> {
    match kind {
        DeclKind::Function { sig, .. } | DeclKind::Operator { sig, .. } | DeclKind::CallOperator { sig } | DeclKind::Constructor { sig, .. } => sig.body,
        DeclKind::Destructor { body } => *body,
        _ => None,
    }
}

fn params_of(kind: &DeclKind) -> &[Parameter] {
    match kind {
        DeclKind::Function { sig, .. } | DeclKind::Operator { sig, .. } | DeclKind::CallOperator { sig } | DeclKind::Constructor { sig, .. } => &sig.params,
        DeclKind::Destructor { .. } => &[],
        _ => &[],
    }
}

/// The calling convention a declared callable was given: which leading
/// pointer slots precede its declared parameter list, and how many of
/// those it has (spec §4.8). Shared between the declare pass (which sizes
/// the prototype) and the define pass (which binds each slot via
/// `Emitter::get_param`), so the two can never disagree about layout.
#[derive(Debug, Clone, Copy)]
struct CallableShape {
    has_sret: bool,
    has_self: bool,
    declared_params: usize,
}

impl CallableShape {
    fn self_index(&self) -> u32 {
        self.has_sret as u32
    }
    fn base_index(&self) -> u32 {
        self.has_sret as u32 + self.has_self as u32
    }
}

fn callable_shape(session: &Session, target: &TargetDescriptor, decl: DeclId) -> CompileResult<(CallableShape, Vec<IrType>, IrType)> {
    let d = session.decls.get(decl);
    match &d.kind {
        DeclKind::Constructor { sig, .. } => {
            let mut params = vec![IrType::Ptr];
            for p in &sig.params {
                params.push(ir_type(session, target, p.ty)?);
            }
            Ok((CallableShape { has_sret: false, has_self: true, declared_params: sig.params.len() }, params, IrType::Void))
        }
        DeclKind::Destructor { .. } => Ok((CallableShape { has_sret: false, has_self: true, declared_params: 0 }, vec![IrType::Ptr], IrType::Void)),
        DeclKind::Function { sig, .. } | DeclKind::Operator { sig, .. } | DeclKind::CallOperator { sig } => {
            let has_self = is_instance_member(session, decl);
            let has_sret = is_struct_valued(session, sig.return_type);
            let mut params = Vec::new();
            if has_sret {
                params.push(IrType::Ptr);
            }
            if has_self {
                params.push(IrType::Ptr);
            }
            for p in &sig.params {
                params.push(ir_type(session, target, p.ty)?);
            }
            let ret_ir = if has_sret { IrType::Void } else { ir_type(session, target, sig.return_type)? };
            Ok((CallableShape { has_sret, has_self, declared_params: sig.params.len() }, params, ret_ir))
        }
        _ => Err(internal(d.range, "callable_shape requested for a non-callable declaration")),
    }
}

struct FunctionCtx<E: Emitter> {
    /// Local variable / parameter decl -> stack slot, populated as each
    /// `StmtKind::Decl` and each declared parameter is lowered. A
    /// struct-typed entry holds a slot of `Ptr`s pointing at the struct's
    /// real backing storage (see `Driver::alloca_backing`), exactly the
    /// same shape a scalar entry's slot has for its own type — so
    /// `LocalVariableRef`/`ParameterRef` never need to special-case which
    /// kind of value they're loading.
    locals: HashMap<DeclId, E::Value>,
    /// `sret` pointer, present when the function's declared return type is
    /// a struct (spec §4.8).
    sret: Option<E::Value>,
    /// The `self` pointer, present on every instance method and on every
    /// constructor/destructor (whose sole pointer argument doubles as
    /// `self`).
    self_value: Option<E::Value>,
    /// Named loop blocks for labelled `break`/`continue` (spec §4.8).
    loop_stack: Vec<(Option<String>, E::Block, E::Block)>,
    labels: HashMap<String, E::Block>,
}

pub struct Driver<'a, E: Emitter> {
    session: &'a Session,
    target: &'a TargetDescriptor,
    layouts: LayoutCache,
    emitter: &'a mut E,
    /// Every declared function/operator/call-operator/constructor/
    /// destructor, keyed by its `DeclId`, populated by `declare_callables`
    /// before any body is lowered so forward and mutually recursive calls
    /// always find their target.
    functions: HashMap<DeclId, (E::Value, CallableShape)>,
    /// Each vtable-bearing struct's vtable global, populated by
    /// `declare_vtables` once every member it points at is in `functions`.
    vtables: HashMap<DeclId, E::Value>,
}

impl<'a, E: Emitter> Driver<'a, E> {
    pub fn new(session: &'a Session, target: &'a TargetDescriptor, emitter: &'a mut E) -> Self {
        Driver { session, target, layouts: LayoutCache::default(), emitter, functions: HashMap::new(), vtables: HashMap::new() }
    }

    pub fn run(&mut self) -> CompileResult<()> {
        let files: Vec<Vec<DeclId>> = self.session.files.iter().map(|f| f.top_level.clone()).collect();

        for top_level in &files {
            for &id in top_level {
                self.collect_layouts(id)?;
            }
        }
        for top_level in &files {
            for &id in top_level {
                self.declare_callables(id)?;
            }
        }
        for top_level in &files {
            for &id in top_level {
                self.declare_vtables(id)?;
            }
        }
        for top_level in &files {
            for &id in top_level {
                self.define_bodies(id)?;
            }
        }
        Ok(())
    }

    fn collect_layouts(&mut self, id: DeclId) -> CompileResult<()> {
        if let DeclKind::Struct { .. } = &self.session.decls.get(id).kind {
            self.layouts.layout_of(self.session, self.target, id)?;
        }
        for m in self.session.decls.get(id).members().to_vec() {
            self.collect_layouts(m)?;
        }
        Ok(())
    }

    fn declare_callables(&mut self, id: DeclId) -> CompileResult<()> {
        let kind = self.session.decls.get(id).kind.clone();
        if is_callable(&kind) {
            let (shape, params, ret) = callable_shape(self.session, self.target, id)?;
            let value = self.emitter.declare_function(id, &params, ret);
            self.functions.insert(id, (value, shape));
        }
        for m in self.session.decls.get(id).members().to_vec() {
            self.declare_callables(m)?;
        }
        Ok(())
    }

    /// Builds the vtable global for every struct that has one: the array
    /// of already-declared method pointers in slot order, plus the global
    /// itself (spec §4.8). Constructors read this back in
    /// `emit_vtable_init` to store the pointer into a fresh instance.
    fn declare_vtables(&mut self, id: DeclId) -> CompileResult<()> {
        if let DeclKind::Struct { .. } = &self.session.decls.get(id).kind {
            let layout = self.layouts.layout_of(self.session, self.target, id)?.clone();
            if layout.has_vtable {
                let mut slots = Vec::with_capacity(layout.vtable_slots.len());
                for &m in &layout.vtable_slots {
                    let &(value, _) = self.functions.get(&m).ok_or_else(|| internal(self.session.decls.get(id).range, "vtable slot references an undeclared method"))?;
                    slots.push(value);
                }
                let array = self.emitter.const_array(IrType::Ptr, &slots);
                let global = self.emitter.declare_global(id, IrType::Array(Box::new(IrType::Ptr), slots.len() as u32), Some(array));
                self.vtables.insert(id, global);
            }
        }
        for m in self.session.decls.get(id).members().to_vec() {
            self.declare_vtables(m)?;
        }
        Ok(())
    }

    fn define_bodies(&mut self, id: DeclId) -> CompileResult<()> {
        let kind = self.session.decls.get(id).kind.clone();
        if let Some(body) = body_of(&kind) {
            self.define_function(id, &kind, body)?;
        }
        for m in self.session.decls.get(id).members().to_vec() {
            self.define_bodies(m)?;
        }
        Ok(())
    }

    fn define_function(&mut self, decl: DeclId, kind: &DeclKind, body: StmtId) -> CompileResult<()> {
        let &(value, shape) = self
            .functions
            .get(&decl)
            .ok_or_else(|| internal(self.session.decls.get(decl).range, "function body lowered before its prototype was declared"))?;

        let entry = self.emitter.create_block("entry");
        self.emitter.set_insert_block(entry);

        let mut ctx: FunctionCtx<E> = FunctionCtx { locals: HashMap::new(), sret: None, self_value: None, loop_stack: Vec::new(), labels: HashMap::new() };

        if shape.has_sret {
            ctx.sret = Some(self.emitter.get_param(value, 0));
        }
        if shape.has_self {
            ctx.self_value = Some(self.emitter.get_param(value, shape.self_index()));
        }

        let params = params_of(kind).to_vec();
        let base = shape.base_index();
        for (i, p) in params.iter().enumerate() {
            if let Some(pdecl) = self.session.parameter_decl_id(decl, i) {
                let ir_ty = ir_type(self.session, self.target, p.ty)?;
                let arg = self.emitter.get_param(value, base + i as u32);
                let slot = self.emitter.create_alloca(ir_ty);
                self.emitter.create_store(slot, arg);
                ctx.locals.insert(pdecl, slot);
            }
        }

        if matches!(kind, DeclKind::Constructor { .. }) {
            self.emit_vtable_init(decl, &ctx)?;
        }

        self.lower_stmt(body, &mut ctx)?;
        Ok(())
    }

    /// Stores the owning struct's vtable pointer into the freshly
    /// constructed object, iff that struct actually has a vtable — the
    /// "vtable-assigning vs. plain constructor" split spec §4.8 calls for.
    /// A struct with no vtable slots never reaches `self.vtables`, so this
    /// is a no-op for it.
    fn emit_vtable_init(&mut self, constructor: DeclId, ctx: &FunctionCtx<E>) -> CompileResult<()> {
        let Some(container) = self.session.decls.get(constructor).container else {
            return Ok(());
        };
        let Some(&vtable_global) = self.vtables.get(&container) else {
            return Ok(());
        };
        let self_ptr = ctx.self_value.ok_or_else(|| internal(self.session.decls.get(constructor).range, "vtable-assigning constructor has no self pointer"))?;
        self.emitter.create_store(self_ptr, vtable_global);
        Ok(())
    }

    /// Reserves real backing storage for a struct-typed local/temporary:
    /// its full byte size rather than a pointer-sized slot, since the
    /// slot in `ctx.locals` holds a `Ptr` *to* this storage, not the bytes
    /// themselves (mirrors the `sret` pointer every struct-returning call
    /// already writes through). Non-struct types just alloca their own
    /// `IrType` as before.
    fn alloca_backing(&mut self, ty: TypeId) -> CompileResult<E::Value> {
        if is_struct_valued(self.session, ty) {
            let container = match &self.session.types.get(ty).kind {
                TypeKind::Struct { decl } => *decl,
                _ => unreachable!("is_struct_valued guarantees a Struct type"),
            };
            let size = self.layouts.layout_of(self.session, self.target, container)?.size.max(1);
            Ok(self.emitter.create_alloca(IrType::Int(size * 8)))
        } else {
            let ir_ty = ir_type(self.session, self.target, ty)?;
            Ok(self.emitter.create_alloca(ir_ty))
        }
    }

    fn lower_stmt(&mut self, stmt: StmtId, ctx: &mut FunctionCtx<E>) -> CompileResult<()> {
        let range = self.session.stmts.get(stmt).range;
        match self.session.stmts.get(stmt).kind.clone() {
            StmtKind::Compound { body, .. } => {
                for s in body {
                    self.lower_stmt(s, ctx)?;
                }
            }
            StmtKind::Expr(e) => {
                self.lower_expr(e, ctx)?;
            }
            StmtKind::Decl(d) => {
                if let DeclKind::Variable { ty, initializer, .. } = self.session.decls.get(d).kind.clone() {
                    if is_struct_valued(self.session, ty) {
                        let backing = self.alloca_backing(ty)?;
                        if let Some(init) = initializer {
                            self.lower_into(init, backing, ctx)?;
                        }
                        let slot = self.emitter.create_alloca(IrType::Ptr);
                        self.emitter.create_store(slot, backing);
                        ctx.locals.insert(d, slot);
                    } else {
                        let ir_ty = ir_type(self.session, self.target, ty)?;
                        let slot = self.emitter.create_alloca(ir_ty);
                        if let Some(init) = initializer {
                            let value = self.lower_expr(init, ctx)?;
                            self.emitter.create_store(slot, value);
                        }
                        ctx.locals.insert(d, slot);
                    }
                }
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                let cond_v = self.lower_expr(cond, ctx)?;
                let then_b = self.emitter.create_block("if.then");
                let else_b = self.emitter.create_block("if.else");
                let end_b = self.emitter.create_block("if.end");
                self.emitter.create_cond_br(cond_v, then_b, else_b);
                self.emitter.set_insert_block(then_b);
                self.lower_stmt(then_branch, ctx)?;
                self.emitter.create_br(end_b);
                self.emitter.set_insert_block(else_b);
                if let Some(e) = else_branch {
                    self.lower_stmt(e, ctx)?;
                }
                self.emitter.create_br(end_b);
                self.emitter.set_insert_block(end_b);
            }
            StmtKind::While { cond, body } => {
                let cond_b = self.emitter.create_block("while.cond");
                let body_b = self.emitter.create_block("while.body");
                let end_b = self.emitter.create_block("while.end");
                self.emitter.create_br(cond_b);
                self.emitter.set_insert_block(cond_b);
                let cond_v = self.lower_expr(cond, ctx)?;
                self.emitter.create_cond_br(cond_v, body_b, end_b);
                self.emitter.set_insert_block(body_b);
                ctx.loop_stack.push((None, cond_b, end_b));
                self.lower_stmt(body, ctx)?;
                ctx.loop_stack.pop();
                self.emitter.create_br(cond_b);
                self.emitter.set_insert_block(end_b);
            }
            StmtKind::DoWhile { body, cond } => {
                let body_b = self.emitter.create_block("dowhile.body");
                let cond_b = self.emitter.create_block("dowhile.cond");
                let end_b = self.emitter.create_block("dowhile.end");
                self.emitter.create_br(body_b);
                self.emitter.set_insert_block(body_b);
                ctx.loop_stack.push((None, cond_b, end_b));
                self.lower_stmt(body, ctx)?;
                ctx.loop_stack.pop();
                self.emitter.create_br(cond_b);
                self.emitter.set_insert_block(cond_b);
                let cond_v = self.lower_expr(cond, ctx)?;
                self.emitter.create_cond_br(cond_v, body_b, end_b);
                self.emitter.set_insert_block(end_b);
            }
            StmtKind::For { init, cond, step, body } => {
                if let Some(i) = init {
                    self.lower_stmt(i, ctx)?;
                }
                let cond_b = self.emitter.create_block("for.cond");
                let body_b = self.emitter.create_block("for.body");
                let step_b = self.emitter.create_block("for.step");
                let end_b = self.emitter.create_block("for.end");
                self.emitter.create_br(cond_b);
                self.emitter.set_insert_block(cond_b);
                if let Some(c) = cond {
                    let cond_v = self.lower_expr(c, ctx)?;
                    self.emitter.create_cond_br(cond_v, body_b, end_b);
                } else {
                    self.emitter.create_br(body_b);
                }
                self.emitter.set_insert_block(body_b);
                ctx.loop_stack.push((None, step_b, end_b));
                self.lower_stmt(body, ctx)?;
                ctx.loop_stack.pop();
                self.emitter.create_br(step_b);
                self.emitter.set_insert_block(step_b);
                if let Some(s) = step {
                    self.lower_expr(s, ctx)?;
                }
                self.emitter.create_br(cond_b);
                self.emitter.set_insert_block(end_b);
            }
            StmtKind::Return { value } => match (value, ctx.sret) {
                // Constructed directly against the `sret` pointer (spec
                // §4.8/P8): no intermediate load of the full aggregate
                // into an SSA value and no subsequent store of it either.
                (Some(v), Some(sret_ptr)) => {
                    self.lower_into(v, sret_ptr, ctx)?;
                    self.emitter.create_ret(None);
                }
                (Some(v), None) => {
                    let value = self.lower_expr(v, ctx)?;
                    self.emitter.create_ret(Some(value));
                }
                (None, _) => self.emitter.create_ret(None),
            },
            StmtKind::Break { label } => {
                let target = self.find_loop_block(ctx, label.as_ref().map(|l| l.name.as_str()), range, false)?;
                self.emitter.create_br(target);
            }
            StmtKind::Continue { label } => {
                let target = self.find_loop_block(ctx, label.as_ref().map(|l| l.name.as_str()), range, true)?;
                self.emitter.create_br(target);
            }
            StmtKind::Labeled { label, stmt } => {
                let block = self.emitter.create_block(&label.name);
                self.emitter.create_br(block);
                self.emitter.set_insert_block(block);
                ctx.labels.insert(label.name.clone(), block);
                self.lower_stmt(stmt, ctx)?;
            }
            StmtKind::Goto { label } => {
                let block = *ctx
                    .labels
                    .get(&label.name)
                    .ok_or_else(|| internal(range, format!("goto target `{}` not registered", label.name)))?;
                self.emitter.create_br(block);
            }
            // Valid surface syntax the driver doesn't lower yet, not an
            // earlier-pass invariant violation (finding that routed these
            // through `Internal` was wrong about which error kind fits).
            StmtKind::Fallthrough => return Err(not_yet_supported(range, "fallthrough lowering")),
            StmtKind::Switch { .. } => return Err(not_yet_supported(range, "switch lowering")),
            StmtKind::DoCatch { .. } => return Err(not_yet_supported(range, "do/catch lowering")),
        }
        Ok(())
    }

    fn find_loop_block(&self, ctx: &FunctionCtx<E>, label: Option<&str>, range: SourceRange, continue_target: bool) -> CompileResult<E::Block> {
        let entry = match label {
            None => ctx.loop_stack.last(),
            Some(name) => ctx.loop_stack.iter().rev().find(|(l, ..)| l.as_deref() == Some(name)),
        };
        let (_, cont, brk) = entry.ok_or_else(|| internal(range, "break/continue outside any active loop"))?;
        Ok(if continue_target { *cont } else { *brk })
    }

    /// Lowers a struct-valued expression directly against `dest` instead
    /// of producing an intermediate SSA value, so a constructor call or a
    /// struct-returning call writes straight into the slot it's destined
    /// for (spec §4.8's `sret` discipline, generalized to any destination
    /// a struct value is headed for — a local's backing storage as much
    /// as a caller's `sret` argument).
    fn lower_into(&mut self, expr: ExprId, dest: E::Value, ctx: &mut FunctionCtx<E>) -> CompileResult<()> {
        let range = self.session.exprs.get(expr).range;
        match self.session.exprs.get(expr).kind.clone() {
            ExprKind::Paren(inner) => self.lower_into(inner, dest, ctx),
            ExprKind::ConstructorCall { constructor, args } => {
                let &(callee_value, _) = self.functions.get(&constructor).ok_or_else(|| internal(range, "constructor call to an undeclared constructor"))?;
                let mut call_args = vec![dest];
                for a in args {
                    call_args.push(self.lower_expr(a, ctx)?);
                }
                self.emitter.create_call(callee_value, &call_args);
                Ok(())
            }
            ExprKind::FunctionCall { callee, args } => {
                self.resolve_and_call(callee, &args, Some(dest), ctx, range)?;
                Ok(())
            }
            // No `memcpy`-equivalent primitive exists on `Emitter` yet, so
            // copying an already-materialized struct value (as opposed to
            // constructing a fresh one in place) only round-trips through
            // whatever `create_store` does with a pointer-typed value.
            _ => {
                let value = self.lower_expr(expr, ctx)?;
                self.emitter.create_store(dest, value);
                Ok(())
            }
        }
    }

    /// Evaluates a resolved call's callee and argument list and emits the
    /// `create_call`, threading `sret` through as the leading argument
    /// when present. Handles all three forms pass S can hand down: a
    /// direct dispatch (`StaticFunctionReference`), a vtable dispatch
    /// (`VTableFunctionReference`, loaded off the `self` argument's vtable
    /// pointer at its assigned slot), and a plain function-pointer value
    /// (anything else, called with no implicit `self`). Returns the call's
    /// result, or `None` for a `void`/`sret` callee.
    fn resolve_and_call(&mut self, callee: ExprId, args: &[LabeledArgument], sret: Option<E::Value>, ctx: &mut FunctionCtx<E>, range: SourceRange) -> CompileResult<Option<E::Value>> {
        let callee_kind = self.session.exprs.get(callee).kind.clone();
        match callee_kind {
            ExprKind::StaticFunctionReference(decl) | ExprKind::VTableFunctionReference { function: decl, .. } => {
                let &(static_value, shape) = self.functions.get(&decl).ok_or_else(|| internal(range, "call to an undeclared function"))?;
                let mut call_args = Vec::new();
                if let Some(s) = sret {
                    call_args.push(s);
                }
                let mut rest = args;
                let func_value = if let ExprKind::VTableFunctionReference { slot, .. } = callee_kind {
                    let self_arg = rest.first().ok_or_else(|| internal(range, "virtual call missing its self argument"))?;
                    let self_value = self.lower_expr(self_arg.value, ctx)?;
                    let vtable_ptr = self.emitter.create_load(self_value, IrType::Ptr);
                    let slot_ptr = self.emitter.create_gep(vtable_ptr, slot as u32 * self.target.pointer_size);
                    let loaded = self.emitter.create_load(slot_ptr, IrType::Ptr);
                    call_args.push(self_value);
                    rest = &rest[1..];
                    loaded
                } else if shape.has_self {
                    let self_arg = rest.first().ok_or_else(|| internal(range, "call missing its self argument"))?;
                    let self_value = self.lower_expr(self_arg.value, ctx)?;
                    call_args.push(self_value);
                    rest = &rest[1..];
                    static_value
                } else {
                    static_value
                };
                for a in rest {
                    call_args.push(self.lower_expr(a.value, ctx)?);
                }
                let result = self.emitter.create_call(func_value, &call_args);
                Ok(if shape.has_sret { None } else { Some(result) })
            }
            _ => {
                let func_value = self.lower_expr(callee, ctx)?;
                let mut call_args = Vec::new();
                if let Some(s) = sret {
                    call_args.push(s);
                }
                for a in args {
                    call_args.push(self.lower_expr(a.value, ctx)?);
                }
                let result = self.emitter.create_call(func_value, &call_args);
                Ok(if sret.is_some() { None } else { Some(result) })
            }
        }
    }

    fn lower_expr(&mut self, expr: ExprId, ctx: &mut FunctionCtx<E>) -> CompileResult<E::Value> {
        let range = self.session.exprs.get(expr).range;
        match self.session.exprs.get(expr).kind.clone() {
            ExprKind::Literal(Literal::Integer { text, .. }) => {
                let n: i64 = text.parse().map_err(|_| internal(range, format!("malformed integer literal `{text}`")))?;
                Ok(self.emitter.const_int(IrType::Int(32), n))
            }
            ExprKind::Literal(Literal::Float { text, .. }) => {
                let f: f64 = text.parse().map_err(|_| internal(range, format!("malformed float literal `{text}`")))?;
                Ok(self.emitter.const_float(IrType::Float64, f))
            }
            ExprKind::Literal(Literal::Char(c)) => Ok(self.emitter.const_int(IrType::Int(32), c as i64)),
            ExprKind::Paren(inner) => self.lower_expr(inner, ctx),
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(op, lhs, rhs, ctx, range),
            ExprKind::LocalVariableRef(d) => {
                let slot = *ctx.locals.get(&d).ok_or_else(|| internal(range, "reference to a local with no stack slot"))?;
                let ty = match &self.session.decls.get(d).kind {
                    DeclKind::Variable { ty, .. } => *ty,
                    _ => return Err(internal(range, "local variable reference to a non-variable declaration")),
                };
                let ir_ty = ir_type(self.session, self.target, ty)?;
                Ok(self.emitter.create_load(slot, ir_ty))
            }
            ExprKind::ParameterRef(d) => {
                let slot = *ctx.locals.get(&d).ok_or_else(|| internal(range, "reference to a parameter with no stack slot"))?;
                let ty = match &self.session.decls.get(d).kind {
                    DeclKind::Parameter(p) => p.ty,
                    _ => return Err(internal(range, "parameter reference to a non-parameter declaration")),
                };
                let ir_ty = ir_type(self.session, self.target, ty)?;
                Ok(self.emitter.create_load(slot, ir_ty))
            }
            ExprKind::CurrentSelf => ctx.self_value.ok_or_else(|| internal(range, "`self` referenced outside an instance method")),
            ExprKind::MemberVariableRef { base, member } => {
                let base_ptr = self.lower_expr(base, ctx)?;
                let container = self.session.decls.get(member).container.ok_or_else(|| internal(range, "member has no owning struct"))?;
                let layout = self.layouts.layout_of(self.session, self.target, container)?.clone();
                let field = layout.fields.iter().find(|f| f.member == member).ok_or_else(|| internal(range, "member not found in its struct's layout"))?;
                let field_ptr = self.emitter.create_gep(base_ptr, field.offset);
                let ty = match &self.session.decls.get(member).kind {
                    DeclKind::Variable { ty, .. } => *ty,
                    _ => return Err(internal(range, "member variable reference to a non-variable declaration")),
                };
                let ir_ty = ir_type(self.session, self.target, ty)?;
                Ok(self.emitter.create_load(field_ptr, ir_ty))
            }
            ExprKind::TemporaryValueRef { temporary } => {
                let slot = *ctx.locals.get(&temporary).ok_or_else(|| internal(range, "reference to a temporary with no stack slot"))?;
                let ty = match &self.session.decls.get(temporary).kind {
                    DeclKind::Variable { ty, .. } => *ty,
                    _ => return Err(internal(range, "temporary value reference to a non-variable declaration")),
                };
                let ir_ty = ir_type(self.session, self.target, ty)?;
                Ok(self.emitter.create_load(slot, ir_ty))
            }
            ExprKind::StoreTemporaryValue { temporary, value } => {
                let ty = match &self.session.decls.get(temporary).kind {
                    DeclKind::Variable { ty, .. } => *ty,
                    _ => return Err(internal(range, "store into a temporary that is not a variable declaration")),
                };
                let ir_ty = ir_type(self.session, self.target, ty)?;
                let slot = self.emitter.create_alloca(ir_ty);
                let v = self.lower_expr(value, ctx)?;
                self.emitter.create_store(slot, v);
                ctx.locals.insert(temporary, slot);
                Ok(v)
            }
            ExprKind::ConstructorCall { constructor, .. } => {
                let container = self.session.decls.get(constructor).container.ok_or_else(|| internal(range, "constructor has no owning struct"))?;
                let size = self.layouts.layout_of(self.session, self.target, container)?.size.max(1);
                let slot = self.emitter.create_alloca(IrType::Int(size * 8));
                self.lower_into(expr, slot, ctx)?;
                Ok(slot)
            }
            ExprKind::DestructorCall { destructor, target } => {
                let target_ptr = self.lower_expr(target, ctx)?;
                let &(value, _) = self.functions.get(&destructor).ok_or_else(|| internal(range, "destructor call to an undeclared destructor"))?;
                self.emitter.create_call(value, &[target_ptr]);
                Ok(target_ptr)
            }
            ExprKind::FunctionCall { callee, args } => self
                .resolve_and_call(callee, &args, None, ctx, range)?
                .ok_or_else(|| internal(range, "struct-returning call used in a value position without a destination")),
            other => Err(not_yet_supported(range, format!("expression kind not yet lowered: {other:?}"))),
        }
    }

    fn lower_binary(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId, ctx: &mut FunctionCtx<E>, range: SourceRange) -> CompileResult<E::Value> {
        if op == BinOp::Assign {
            return self.lower_assign(lhs, rhs, ctx, range);
        }
        if let Some(fused) = fused_assign_op(op) {
            let current = self.lower_expr(lhs, ctx)?;
            let rhs_v = self.lower_expr(rhs, ctx)?;
            let combined = if let Some(arith) = int_arith(fused) {
                self.emitter.create_int_arith(arith, current, rhs_v)
            } else if let Some(arith) = float_arith(fused) {
                self.emitter.create_float_arith(arith, current, rhs_v)
            } else {
                return Err(not_yet_supported(range, format!("fused assignment operator not yet lowered: {op:?}")));
            };
            return self.store_into_lvalue(lhs, combined, ctx, range);
        }
        let l = self.lower_expr(lhs, ctx)?;
        let r = self.lower_expr(rhs, ctx)?;
        let is_float = matches!(self.session.exprs.get(lhs).value_type.map(|t| self.session.types.get(t).kind.clone()), Some(TypeKind::BuiltIn(b)) if b.floating);

        if is_float {
            if let Some(arith) = float_arith(op) {
                return Ok(self.emitter.create_float_arith(arith, l, r));
            }
            if let Some(pred) = float_predicate(op) {
                return Ok(self.emitter.create_float_compare(pred, l, r));
            }
        } else {
            if let Some(arith) = int_arith(op) {
                return Ok(self.emitter.create_int_arith(arith, l, r));
            }
            if let Some(pred) = int_predicate(op) {
                return Ok(self.emitter.create_int_compare(pred, l, r));
            }
        }
        Err(not_yet_supported(range, format!("binary operator not yet lowered: {op:?}")))
    }

    fn lower_assign(&mut self, lhs: ExprId, rhs: ExprId, ctx: &mut FunctionCtx<E>, range: SourceRange) -> CompileResult<E::Value> {
        let value = self.lower_expr(rhs, ctx)?;
        self.store_into_lvalue(lhs, value, ctx, range)
    }

    fn store_into_lvalue(&mut self, lhs: ExprId, value: E::Value, ctx: &mut FunctionCtx<E>, range: SourceRange) -> CompileResult<E::Value> {
        let slot = match self.session.exprs.get(lhs).kind.clone() {
            ExprKind::LocalVariableRef(d) | ExprKind::ParameterRef(d) => *ctx.locals.get(&d).ok_or_else(|| internal(range, "assignment to a local with no stack slot"))?,
            ExprKind::MemberVariableRef { base, member } => {
                let base_ptr = self.lower_expr(base, ctx)?;
                let container = self.session.decls.get(member).container.ok_or_else(|| internal(range, "member has no owning struct"))?;
                let layout = self.layouts.layout_of(self.session, self.target, container)?.clone();
                let field = layout.fields.iter().find(|f| f.member == member).ok_or_else(|| internal(range, "member not found in its struct's layout"))?;
                self.emitter.create_gep(base_ptr, field.offset)
            }
            _ => return Err(internal(range, "assignment to a non-lvalue expression")),
        };
        self.emitter.create_store(slot, value);
        Ok(value)
    }
}

fn fused_assign_op(op: BinOp) -> Option<BinOp> {
    Some(match op {
        BinOp::AddAssign => BinOp::Add,
        BinOp::SubAssign => BinOp::Sub,
        BinOp::MulAssign => BinOp::Mul,
        BinOp::DivAssign => BinOp::Div,
        BinOp::RemAssign => BinOp::Rem,
        BinOp::AndAssign => BinOp::BitAnd,
        BinOp::OrAssign => BinOp::BitOr,
        BinOp::XorAssign => BinOp::BitXor,
        BinOp::ShlAssign => BinOp::Shl,
        BinOp::ShrAssign => BinOp::Shr,
        _ => return None,
    })
}

fn int_arith(op: BinOp) -> Option<IntArith> {
    Some(match op {
        BinOp::Add => IntArith::Add,
        BinOp::Sub => IntArith::Sub,
        BinOp::Mul => IntArith::Mul,
        BinOp::Div => IntArith::SDiv,
        BinOp::Rem => IntArith::SRem,
        BinOp::BitAnd => IntArith::And,
        BinOp::BitOr => IntArith::Or,
        BinOp::BitXor => IntArith::Xor,
        BinOp::Shl => IntArith::Shl,
        BinOp::Shr => IntArith::AShr,
        _ => return None,
    })
}

fn int_predicate(op: BinOp) -> Option<IntPredicate> {
    Some(match op {
        BinOp::Eq => IntPredicate::Eq,
        BinOp::Ne => IntPredicate::Ne,
        BinOp::Lt => IntPredicate::SignedLt,
        BinOp::Le => IntPredicate::SignedLe,
        BinOp::Gt => IntPredicate::SignedGt,
        BinOp::Ge => IntPredicate::SignedGe,
        _ => return None,
    })
}

fn float_arith(op: BinOp) -> Option<FloatArith> {
    Some(match op {
        BinOp::Add => FloatArith::Add,
        BinOp::Sub => FloatArith::Sub,
        BinOp::Mul => FloatArith::Mul,
        BinOp::Div => FloatArith::Div,
        _ => return None,
    })
}

fn float_predicate(op: BinOp) -> Option<FloatPredicate> {
    Some(match op {
        BinOp::Eq => FloatPredicate::Eq,
        BinOp::Ne => FloatPredicate::Ne,
        BinOp::Lt => FloatPredicate::Lt,
        BinOp::Le => FloatPredicate::Le,
        BinOp::Gt => FloatPredicate::Gt,
        BinOp::Ge => FloatPredicate::Ge,
        _ => return None,
    })
}
