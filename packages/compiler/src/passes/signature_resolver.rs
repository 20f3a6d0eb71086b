//! Signature / overload resolver (pass S, spec §4.6): the three comparison
//! primitives it's built from (`compareFunctions`, `compareArgsToParams`,
//! `compareTemplateArgsToParams`), lexicographic overload selection over a
//! candidate list, and functor dispatch for a callable value of arbitrary
//! type. Grounded on `type_compare.rs`'s `same`/`is_subtype`/
//! `specialization_strength` (this module is the next consumer the doc
//! comments on those functions already anticipate) and on the teacher's
//! habit of keeping a pass's pure comparison logic separate from its
//! session-walking driver.
//!
//! `run(session, target)` is the driver: it walks every function-like body
//! in the program and rewrites each syntactic `Identifier`/`Member`/
//! `FunctionCall`/`SubscriptCall` node into the semantic form spec §3 lists
//! (`ParameterRef`, `LocalVariableRef`, `MemberVariableRef`,
//! `MemberPropertyRef`, `StaticFunctionReference`/`VTableFunctionReference`),
//! stamping `Expr.value_type` along the way, using the primitives above to
//! pick the overload. Grounded on `type_resolver.rs`'s per-file `Ctx` +
//! recursive decl/stmt/expr walk shape and scoped-stack discipline.

use crate::ast::decl::{Decl, DeclId, DeclKind, FunctionSig, Modifiers, Parameter, TemplateParam, TemplateParamKind};
use crate::ast::expr::{Expr, ExprKind, LabeledArgument};
use crate::ast::stmt::StmtKind;
use crate::ast::types::{ArgTuple, TemplateArg, TypeId, TypeKind};
use crate::ast::{ExprId, StmtId};
use crate::diagnostics::{CompileError, CompileResult, ErrorKind, Phase, SourceRange};
use crate::ident::ANONYMOUS;
use crate::session::Session;
use crate::target::TargetDescriptor;
use crate::type_compare::{self, TypenamePolicy};

fn fatal(file: &str, range: SourceRange, kind: ErrorKind) -> CompileError {
    CompileError::fatal(Phase::SignatureResolver, file, range, kind)
}

/// Result category for `compareArgsToParams`, ordered worst-to-best so
/// `Ord`/`max`/`min` directly implement spec §4.6's lexicographic
/// `Match > Castable > DefaultValues` preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchCategory {
    Fail,
    DefaultValues,
    Castable,
    Match,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    Exact,
    Similar,
    Different,
}

/// A single positional call argument: its label (`None` for an anonymous
/// `_` argument) and its already-resolved type.
#[derive(Debug, Clone)]
pub struct ArgDesc {
    pub label: Option<String>,
    pub ty: TypeId,
}

pub struct OverloadPick {
    pub decl: DeclId,
    pub category: MatchCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctorTarget {
    FunctionPointer,
    CallOperator(DeclId),
}

fn sig_of(decl: &Decl) -> Option<&FunctionSig> {
    match &decl.kind {
        DeclKind::Function { sig, .. }
        | DeclKind::Operator { sig, .. }
        | DeclKind::CallOperator { sig }
        | DeclKind::Constructor { sig, .. }
        | DeclKind::TemplateFunction { sig, .. } => Some(sig),
        _ => None,
    }
}

fn template_params_of(decl: &Decl) -> Option<&Vec<DeclId>> {
    match &decl.kind {
        DeclKind::TemplateFunction { params, .. } => Some(params),
        _ => None,
    }
}

fn param_label_text(param: &Parameter) -> &str {
    param.label.as_ref().map(|i| i.name.as_str()).unwrap_or(ANONYMOUS)
}

fn arg_label_text(arg: &ArgDesc) -> &str {
    arg.label.as_deref().unwrap_or(ANONYMOUS)
}

// ---------------------------------------------------------------------
// compareArgsToParams (spec §4.6)
// ---------------------------------------------------------------------

/// Matches one argument's type against one parameter's declared type,
/// covering lvalue-to-rvalue / unqualified-reference shedding (already
/// transparent inside `type_compare::same`), the target's numeric
/// implicit-conversion table, and struct upcasting along the inheritance
/// chain (`is_subtype`'s non-reflexive branches).
fn arg_type_match(session: &Session, target: &TargetDescriptor, from: TypeId, to: TypeId) -> MatchCategory {
    if type_compare::same(session, from, to, TypenamePolicy::ByParamIdentity) {
        return MatchCategory::Match;
    }
    if let (TypeKind::BuiltIn(f), TypeKind::BuiltIn(t)) = (&session.types.get(from).kind, &session.types.get(to).kind) {
        if target.implicit_conv_table.numeric_castable(f, t) {
            return MatchCategory::Castable;
        }
    }
    if type_compare::is_subtype(session, from, to) {
        return MatchCategory::Castable;
    }
    MatchCategory::Fail
}

/// `compareArgsToParams(params, args)` (spec §4.6). Labels are strictly
/// positional; an anonymous parameter or argument label only matches
/// another anonymous one.
pub fn compare_args_to_params(session: &Session, target: &TargetDescriptor, params: &[Parameter], args: &[ArgDesc]) -> MatchCategory {
    if args.len() > params.len() {
        return MatchCategory::Fail;
    }
    let mut category = MatchCategory::Match;
    for (param, arg) in params.iter().zip(args.iter()) {
        if param_label_text(param) != arg_label_text(arg) {
            return MatchCategory::Fail;
        }
        match arg_type_match(session, target, arg.ty, param.ty) {
            MatchCategory::Fail => return MatchCategory::Fail,
            found if found < category => category = found,
            _ => {}
        }
    }
    if args.len() < params.len() {
        if !params[args.len()..].iter().all(|p| p.default_value.is_some()) {
            return MatchCategory::Fail;
        }
        if MatchCategory::DefaultValues < category {
            category = MatchCategory::DefaultValues;
        }
    }
    category
}

// ---------------------------------------------------------------------
// compareFunctions (spec §4.6)
// ---------------------------------------------------------------------

fn param_labels_eq(a: &Parameter, b: &Parameter) -> bool {
    param_label_text(a) == param_label_text(b)
}

/// `Similar` per spec §4.6: the shorter parameter list's prefix exactly
/// matches the longer one's, and every parameter the longer list adds
/// beyond that prefix is optional — so a call written against the shorter
/// signature would also be accepted by the longer one via default-argument
/// expansion.
fn params_similar(session: &Session, a: &FunctionSig, b: &FunctionSig) -> bool {
    let (shorter, longer) = if a.params.len() <= b.params.len() { (a, b) } else { (b, a) };
    let prefix_matches = shorter
        .params
        .iter()
        .zip(longer.params.iter())
        .all(|(x, y)| param_labels_eq(x, y) && type_compare::same(session, x.ty, y.ty, TypenamePolicy::AllTemplatesAreSame));
    prefix_matches && longer.params[shorter.params.len()..].iter().all(|p| p.default_value.is_some())
}

/// `compareFunctions(L, R, allowSimilarity)` (spec §4.6), used by
/// `decl_validator`'s redefinition check once it has types to compare
/// (today it only has arity, see `DESIGN.md`'s subscript-operator note) and
/// directly by `select_overload`'s ambiguity reasoning.
pub fn compare_functions(session: &Session, l: DeclId, r: DeclId, allow_similarity: bool) -> CompareResult {
    let ld = session.decls.get(l);
    let rd = session.decls.get(r);
    let (Some(lname), Some(rname)) = (ld.name(), rd.name()) else {
        return CompareResult::Different;
    };
    if !lname.text_eq(&rname.name) {
        return CompareResult::Different;
    }
    let (Some(lsig), Some(rsig)) = (sig_of(ld), sig_of(rd)) else {
        return CompareResult::Different;
    };
    if ld.modifiers.contains(Modifiers::STATIC) != rd.modifiers.contains(Modifiers::STATIC)
        || ld.modifiers.contains(Modifiers::MUT) != rd.modifiers.contains(Modifiers::MUT)
    {
        return CompareResult::Different;
    }

    let exact = lsig.params.len() == rsig.params.len()
        && lsig
            .params
            .iter()
            .zip(rsig.params.iter())
            .all(|(a, b)| param_labels_eq(a, b) && type_compare::same(session, a.ty, b.ty, TypenamePolicy::AllTemplatesAreSame));
    if exact {
        return CompareResult::Exact;
    }
    if allow_similarity && params_similar(session, lsig, rsig) {
        return CompareResult::Similar;
    }
    CompareResult::Different
}

// ---------------------------------------------------------------------
// compareTemplateArgsToParams (spec §4.6)
// ---------------------------------------------------------------------

/// Stand-in for spec §4.6's `∞`: large enough that a single unconstrained
/// `typename` parameter always loses a tie-break against any candidate
/// with at least one constrained/specialized parameter, without risking
/// overflow under repeated `saturating_add`.
const UNSPECIALIZED_STRENGTH: u32 = 1_000_000;

/// `compareTemplateArgsToParams(tparams, targs)` (spec §4.6): `None` is
/// `Fail` (arity mismatch, or a `typename` parameter whose specialization
/// constraint the argument can't satisfy); `Some(total)` is the summed
/// specialization strength, lower winning.
pub fn compare_template_args_to_params(session: &Session, tparams: &[DeclId], targs: &ArgTuple) -> Option<u32> {
    if tparams.len() != targs.len() {
        return None;
    }
    let mut total = 0u32;
    for (&param, arg) in tparams.iter().zip(targs.iter()) {
        let DeclKind::TemplateParameter(TemplateParam { kind, constraint_or_type, .. }) = &session.decls.get(param).kind else {
            return None;
        };
        match (kind, arg) {
            (TemplateParamKind::ConstValue, TemplateArg::Const(_)) => {}
            (TemplateParamKind::Typename, TemplateArg::Type(t)) => {
                if constraint_or_type.is_empty() {
                    total = total.saturating_add(UNSPECIALIZED_STRENGTH);
                } else {
                    let best = constraint_or_type.iter().filter_map(|&c| type_compare::specialization_strength(session, *t, c)).min();
                    match best {
                        Some(s) => total = total.saturating_add(s),
                        None => return None,
                    }
                }
            }
            _ => return None,
        }
    }
    Some(total)
}

// ---------------------------------------------------------------------
// Overload selection (spec §4.6)
// ---------------------------------------------------------------------

/// Picks the single best candidate by spec §4.6's lexicographic order:
/// highest `MatchCategory`, ties broken by lowest total specialization
/// strength (non-template candidates all score 0 and so never lose a tie
/// to each other on this axis). A residual tie after both is ambiguous.
pub fn select_overload(
    session: &Session,
    target: &TargetDescriptor,
    candidates: &[DeclId],
    args: &[ArgDesc],
    targs: Option<&ArgTuple>,
    name_for_error: &str,
    file: &str,
    range: SourceRange,
) -> CompileResult<OverloadPick> {
    let mut scored: Vec<(DeclId, MatchCategory, u32)> = Vec::new();
    for &cand in candidates {
        let decl = session.decls.get(cand);
        let Some(sig) = sig_of(decl) else { continue };
        let category = compare_args_to_params(session, target, &sig.params, args);
        if category == MatchCategory::Fail {
            continue;
        }
        let strength = match (targs, template_params_of(decl)) {
            (Some(ta), Some(tp)) => match compare_template_args_to_params(session, tp, ta) {
                Some(s) => s,
                None => continue,
            },
            (None, None) => 0,
            // A template candidate with no supplied arguments, or a plain
            // candidate with some, can't be this call's target at all.
            _ => continue,
        };
        scored.push((cand, category, strength));
    }

    if scored.is_empty() {
        return Err(fatal(file, range, ErrorKind::NoMatchingOverload(name_for_error.to_string())));
    }

    let best_category = scored.iter().map(|&(_, c, _)| c).max().unwrap();
    scored.retain(|&(_, c, _)| c == best_category);
    let best_strength = scored.iter().map(|&(_, _, s)| s).min().unwrap();
    scored.retain(|&(_, _, s)| s == best_strength);

    if scored.len() > 1 {
        return Err(fatal(file, range, ErrorKind::AmbiguousOverload(name_for_error.to_string())));
    }
    let (decl, category, _) = scored[0];
    Ok(OverloadPick { decl, category })
}

// ---------------------------------------------------------------------
// Functor dispatch (spec §4.6)
// ---------------------------------------------------------------------

fn unwrap_references(session: &Session, ty: TypeId) -> TypeId {
    match &session.types.get(ty).kind {
        TypeKind::Reference { inner } => unwrap_references(session, *inner),
        _ => ty,
    }
}

/// A value of type `ty` is callable if it's (unwrapped of outer references)
/// a matching `FunctionPointer`, or a `Struct`/`Trait` exposing at least one
/// non-static `call` operator whose parameters match (spec §4.6). Returns
/// the best-matching member along with its category; ties are left to the
/// caller the same way `select_overload` would resolve them, since a
/// functor call site is itself just a one-candidate-family overload pick.
pub fn resolve_functor(session: &Session, target: &TargetDescriptor, ty: TypeId, args: &[ArgDesc]) -> Option<(FunctorTarget, MatchCategory)> {
    let unwrapped = unwrap_references(session, ty);
    match &session.types.get(unwrapped).kind {
        TypeKind::FunctionPointer { params, .. } => {
            if params.len() != args.len() {
                return None;
            }
            let mut category = MatchCategory::Match;
            for (&p, a) in params.iter().zip(args.iter()) {
                match arg_type_match(session, target, a.ty, p) {
                    MatchCategory::Fail => return None,
                    found if found < category => category = found,
                    _ => {}
                }
            }
            Some((FunctorTarget::FunctionPointer, category))
        }
        TypeKind::Struct { decl } | TypeKind::TemplateStruct { decl, .. } | TypeKind::Trait { decl, .. } | TypeKind::TemplateTrait { decl, .. } => {
            let members = session.decls.get(*decl).members().to_vec();
            let mut best: Option<(DeclId, MatchCategory)> = None;
            for m in members {
                let md = session.decls.get(m);
                if md.modifiers.contains(Modifiers::STATIC) {
                    continue;
                }
                if let DeclKind::CallOperator { sig } = &md.kind {
                    let category = compare_args_to_params(session, target, &sig.params, args);
                    if category == MatchCategory::Fail {
                        continue;
                    }
                    let better = match best {
                        Some((_, bc)) => category > bc,
                        None => true,
                    };
                    if better {
                        best = Some((m, category));
                    }
                }
            }
            best.map(|(m, c)| (FunctorTarget::CallOperator(m), c))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------
// Driver: call-site / name-use resolution (spec §4.6)
// ---------------------------------------------------------------------

/// Local-variable scope, rebuilt per function body: a plain stack of
/// name->decl maps pushed on block entry, matching the block nesting a
/// `Compound` statement introduces.
struct Scope {
    frames: Vec<Vec<(String, DeclId)>>,
}

impl Scope {
    fn new() -> Self {
        Scope { frames: vec![Vec::new()] }
    }
    fn push(&mut self) {
        self.frames.push(Vec::new());
    }
    fn pop(&mut self) {
        self.frames.pop();
    }
    fn bind(&mut self, name: String, decl: DeclId) {
        self.frames.last_mut().expect("scope always has a frame").push((name, decl));
    }
    fn lookup(&self, name: &str) -> Option<DeclId> {
        for frame in self.frames.iter().rev() {
            for (n, d) in frame.iter().rev() {
                if n == name {
                    return Some(*d);
                }
            }
        }
        None
    }
}

/// The function/method/constructor/etc. a body walk is currently inside,
/// carrying just what call-site resolution needs from its signature.
struct FnCtx {
    owner: DeclId,
    params: Vec<Parameter>,
    /// The struct/trait `owner` is a member of, if any — implicit `self`
    /// lookups (bare identifier resolving to a field, bare call resolving
    /// to a sibling method) search this.
    container: Option<DeclId>,
}

pub fn run(session: &mut Session, target: &TargetDescriptor) -> CompileResult<()> {
    let files: Vec<(String, Vec<DeclId>)> = session.files.iter().map(|f| (f.path.clone(), f.top_level.clone())).collect();
    for (file, top_level) in &files {
        for &id in top_level {
            walk_decl(session, target, id, &file, top_level)?;
        }
    }
    Ok(())
}

fn function_like_sig(kind: &DeclKind) -> Option<&FunctionSig> {
    match kind {
        DeclKind::Function { sig, .. } | DeclKind::Operator { sig, .. } | DeclKind::CallOperator { sig } | DeclKind::Constructor { sig, .. } => Some(sig),
        _ => None,
    }
}

fn walk_decl(session: &mut Session, target: &TargetDescriptor, id: DeclId, file: &str, top_level: &[DeclId]) -> CompileResult<()> {
    let kind_clone_sig = function_like_sig(&session.decls.get(id).kind).cloned();
    if let Some(sig) = kind_clone_sig {
        if let Some(body) = sig.body {
            let fn_ctx = FnCtx { owner: id, params: sig.params.clone(), container: session.decls.get(id).container };
            let mut scope = Scope::new();
            walk_stmt(session, target, &fn_ctx, &mut scope, body, file, top_level)?;
        }
    } else if let DeclKind::Destructor { body: Some(body) } = &session.decls.get(id).kind.clone() {
        let fn_ctx = FnCtx { owner: id, params: Vec::new(), container: session.decls.get(id).container };
        let mut scope = Scope::new();
        walk_stmt(session, target, &fn_ctx, &mut scope, *body, file, top_level)?;
    }

    let members = session.decls.get(id).members().to_vec();
    for m in members {
        walk_decl(session, target, m, file, top_level)?;
    }
    Ok(())
}

fn walk_stmt(session: &mut Session, target: &TargetDescriptor, fn_ctx: &FnCtx, scope: &mut Scope, stmt: StmtId, file: &str, top_level: &[DeclId]) -> CompileResult<()> {
    match session.stmts.get(stmt).kind.clone() {
        StmtKind::Compound { body, .. } => {
            scope.push();
            for s in body {
                walk_stmt(session, target, fn_ctx, scope, s, file, top_level)?;
            }
            scope.pop();
        }
        StmtKind::Expr(e) => {
            walk_expr(session, target, fn_ctx, scope, e, file, top_level)?;
        }
        StmtKind::Decl(d) => {
            if let DeclKind::Variable { name, initializer, .. } = session.decls.get(d).kind.clone() {
                if let Some(init) = initializer {
                    walk_expr(session, target, fn_ctx, scope, init, file, top_level)?;
                }
                scope.bind(name.name.clone(), d);
            }
        }
        StmtKind::If { cond, then_branch, else_branch } => {
            walk_expr(session, target, fn_ctx, scope, cond, file, top_level)?;
            walk_stmt(session, target, fn_ctx, scope, then_branch, file, top_level)?;
            if let Some(e) = else_branch {
                walk_stmt(session, target, fn_ctx, scope, e, file, top_level)?;
            }
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
            walk_expr(session, target, fn_ctx, scope, cond, file, top_level)?;
            walk_stmt(session, target, fn_ctx, scope, body, file, top_level)?;
        }
        StmtKind::For { init, cond, step, body } => {
            scope.push();
            if let Some(i) = init {
                walk_stmt(session, target, fn_ctx, scope, i, file, top_level)?;
            }
            if let Some(c) = cond {
                walk_expr(session, target, fn_ctx, scope, c, file, top_level)?;
            }
            walk_stmt(session, target, fn_ctx, scope, body, file, top_level)?;
            if let Some(s) = step {
                walk_expr(session, target, fn_ctx, scope, s, file, top_level)?;
            }
            scope.pop();
        }
        StmtKind::Switch { discriminant, cases } => {
            walk_expr(session, target, fn_ctx, scope, discriminant, file, top_level)?;
            for case in cases {
                for v in case.values {
                    walk_expr(session, target, fn_ctx, scope, v, file, top_level)?;
                }
                for s in case.body {
                    walk_stmt(session, target, fn_ctx, scope, s, file, top_level)?;
                }
            }
        }
        StmtKind::DoCatch { body, catches, finally } => {
            walk_stmt(session, target, fn_ctx, scope, body, file, top_level)?;
            for c in catches {
                walk_stmt(session, target, fn_ctx, scope, c.body, file, top_level)?;
            }
            if let Some(f) = finally {
                walk_stmt(session, target, fn_ctx, scope, f, file, top_level)?;
            }
        }
        StmtKind::Labeled { stmt, .. } => {
            walk_stmt(session, target, fn_ctx, scope, stmt, file, top_level)?;
        }
        StmtKind::Return { value: Some(v) } => {
            walk_expr(session, target, fn_ctx, scope, v, file, top_level)?;
        }
        StmtKind::Return { value: None } | StmtKind::Break { .. } | StmtKind::Continue { .. } | StmtKind::Goto { .. } | StmtKind::Fallthrough => {}
    }
    Ok(())
}

/// Resolves `expr` in place, returning its (now-populated) `value_type`.
fn walk_expr(session: &mut Session, target: &TargetDescriptor, fn_ctx: &FnCtx, scope: &mut Scope, expr: ExprId, file: &str, top_level: &[DeclId]) -> CompileResult<TypeId> {
    let range = session.exprs.get(expr).range;
    let kind = session.exprs.get(expr).kind.clone();
    let ty = match kind {
        ExprKind::FunctionCall { callee, args } => resolve_call(session, target, fn_ctx, scope, expr, callee, args, file, top_level, range)?,
        ExprKind::SubscriptCall { base, args } => resolve_subscript_call(session, target, fn_ctx, scope, expr, base, args, file, top_level, range)?,
        ExprKind::Member { base, name, .. } => {
            let base_ty = walk_expr(session, target, fn_ctx, scope, base, file, top_level)?;
            resolve_member(session, expr, base, base_ty, &name.name, file, range)?
        }
        ExprKind::Identifier { name, .. } => resolve_bare_name(session, fn_ctx, scope, expr, &name.name, file, range)?,
        ExprKind::Binary { op, lhs, rhs } => {
            walk_expr(session, target, fn_ctx, scope, lhs, file, top_level)?;
            let rty = walk_expr(session, target, fn_ctx, scope, rhs, file, top_level)?;
            if matches!(op, crate::ast::expr::BinOp::Assign) {
                rty
            } else {
                session.exprs.get(lhs).value_type.unwrap_or(rty)
            }
        }
        ExprKind::Prefix { operand, .. } | ExprKind::Postfix { operand, .. } | ExprKind::Paren(operand) => {
            walk_expr(session, target, fn_ctx, scope, operand, file, top_level)?
        }
        ExprKind::Ternary { cond, then_expr, else_expr } => {
            walk_expr(session, target, fn_ctx, scope, cond, file, top_level)?;
            walk_expr(session, target, fn_ctx, scope, then_expr, file, top_level)?;
            walk_expr(session, target, fn_ctx, scope, else_expr, file, top_level)?
        }
        ExprKind::As { value, ty } | ExprKind::Is { value, ty } => {
            walk_expr(session, target, fn_ctx, scope, value, file, top_level)?;
            ty
        }
        ExprKind::Has { value, .. } => {
            walk_expr(session, target, fn_ctx, scope, value, file, top_level)?;
            bool_type(session)
        }
        ExprKind::LabeledArgument(a) => walk_expr(session, target, fn_ctx, scope, a.value, file, top_level)?,
        ExprKind::ArrayLiteral(items) => {
            let mut last = bool_type(session);
            for i in items {
                last = walk_expr(session, target, fn_ctx, scope, i, file, top_level)?;
            }
            last
        }
        ExprKind::Literal(lit) => literal_type(session, &lit),
        ExprKind::VariableDecl { decl } => {
            if let DeclKind::Variable { ty, .. } = session.decls.get(decl).kind {
                ty
            } else {
                bool_type(session)
            }
        }
        // Already resolved by an earlier walk of a shared subtree, or a
        // semantic node this pass itself just produced.
        _ => session.exprs.get(expr).value_type.unwrap_or_else(|| bool_type(session)),
    };
    session.exprs.get_mut(expr).value_type = Some(ty);
    Ok(ty)
}

fn bool_type(session: &mut Session) -> TypeId {
    session.types.alloc(crate::ast::types::TypeNode::new(TypeKind::Bool))
}

fn literal_type(session: &mut Session, lit: &crate::ast::expr::Literal) -> TypeId {
    use crate::ast::expr::Literal;
    use crate::ast::types::{lookup_builtin, BuiltIn};
    let kind = match lit {
        Literal::Integer { .. } => lookup_builtin("i32").unwrap_or(TypeKind::BuiltIn(BuiltIn { name: "i32", size_bytes: 4, signed: Some(true), floating: false })),
        Literal::Float { .. } => lookup_builtin("f64").unwrap_or(TypeKind::BuiltIn(BuiltIn { name: "f64", size_bytes: 8, signed: None, floating: true })),
        Literal::Char(_) => lookup_builtin("i8").unwrap_or(TypeKind::BuiltIn(BuiltIn { name: "i8", size_bytes: 1, signed: Some(true), floating: false })),
        Literal::String(_) => TypeKind::Pointer { inner: lookup_builtin("i8").map(|k| session.types.alloc(crate::ast::types::TypeNode::new(k))).unwrap_or_else(|| bool_type(session)) },
    };
    session.types.alloc(crate::ast::types::TypeNode::new(kind))
}

/// A bare identifier resolves, in order: to a parameter, to an
/// already-declared local, to an implicit-`self` field/property of the
/// enclosing struct, or to an enum constant visible in scope (spec §4.6's
/// functor/name-use resolution, applied to value position).
fn resolve_bare_name(session: &mut Session, fn_ctx: &FnCtx, scope: &mut Scope, expr: ExprId, name: &str, file: &str, range: SourceRange) -> CompileResult<TypeId> {
    if let Some(idx) = fn_ctx.params.iter().position(|p| p.name.text_eq(name)) {
        let param = fn_ctx.params[idx].clone();
        let ty = param.ty;
        let decl = session.parameter_decl(fn_ctx.owner, idx, param);
        session.exprs.get_mut(expr).kind = ExprKind::ParameterRef(decl);
        return Ok(ty);
    }
    if let Some(decl) = scope.lookup(name) {
        let ty = match &session.decls.get(decl).kind {
            DeclKind::Variable { ty, .. } => *ty,
            _ => return Err(fatal(file, range, ErrorKind::Internal("scoped name did not resolve to a variable".into()))),
        };
        session.exprs.get_mut(expr).kind = ExprKind::LocalVariableRef(decl);
        return Ok(ty);
    }
    if let Some(container) = fn_ctx.container {
        let members = session.decls.get(container).members().to_vec();
        for m in members {
            match session.decls.get(m).kind.clone() {
                DeclKind::Variable { name: n, ty, .. } if n.text_eq(name) => {
                    let self_ref = session.exprs.alloc(Expr::new(ExprKind::CurrentSelf, range));
                    session.exprs.get_mut(expr).kind = ExprKind::MemberVariableRef { base: self_ref, member: m };
                    return Ok(ty);
                }
                DeclKind::Property { name: n, ty, .. } if n.text_eq(name) => {
                    let self_ref = session.exprs.alloc(Expr::new(ExprKind::CurrentSelf, range));
                    session.exprs.get_mut(expr).kind = ExprKind::MemberPropertyRef { base: self_ref, property: m };
                    return Ok(ty);
                }
                DeclKind::EnumConst { name: n, .. } if n.text_eq(name) => {
                    session.exprs.get_mut(expr).kind = ExprKind::EnumConstRef(m);
                    return Ok(session.types.alloc(crate::ast::types::TypeNode::new(TypeKind::Enum { decl: container })));
                }
                _ => {}
            }
        }
    }
    Err(fatal(file, range, ErrorKind::UnknownName(name.to_string())))
}

fn resolve_member(session: &mut Session, expr: ExprId, base: ExprId, base_ty: TypeId, name: &str, file: &str, range: SourceRange) -> CompileResult<TypeId> {
    let decl = nominal_decl(session, base_ty).ok_or_else(|| fatal(file, range, ErrorKind::UnknownName(name.to_string())))?;
    let members = session.decls.get(decl).members().to_vec();
    for m in members {
        match session.decls.get(m).kind.clone() {
            DeclKind::Variable { name: n, ty, .. } if n.text_eq(name) => {
                session.exprs.get_mut(expr).kind = ExprKind::MemberVariableRef { base, member: m };
                return Ok(ty);
            }
            DeclKind::Property { name: n, ty, .. } if n.text_eq(name) => {
                session.exprs.get_mut(expr).kind = ExprKind::MemberPropertyRef { base, property: m };
                return Ok(ty);
            }
            _ => {}
        }
    }
    Err(fatal(file, range, ErrorKind::UnknownName(name.to_string())))
}

fn nominal_decl(session: &Session, ty: TypeId) -> Option<DeclId> {
    match &session.types.get(ty).kind {
        TypeKind::Struct { decl } | TypeKind::Trait { decl, .. } | TypeKind::Enum { decl } => Some(*decl),
        TypeKind::Reference { inner } | TypeKind::Pointer { inner } => nominal_decl(session, *inner),
        _ => None,
    }
}

/// Looks a struct's own `vtable` list up for `decl`'s slot index.
fn vtable_slot_of(session: &Session, container: DeclId, decl: DeclId) -> Option<usize> {
    if let DeclKind::Struct { vtable, .. } = &session.decls.get(container).kind {
        vtable.iter().position(|&v| v == decl)
    } else {
        None
    }
}

fn resolve_args(session: &mut Session, target: &TargetDescriptor, fn_ctx: &FnCtx, scope: &mut Scope, args: &[LabeledArgument], file: &str, top_level: &[DeclId]) -> CompileResult<Vec<ArgDesc>> {
    let mut out = Vec::with_capacity(args.len());
    for a in args {
        let ty = walk_expr(session, target, fn_ctx, scope, a.value, file, top_level)?;
        out.push(ArgDesc { label: a.label.as_ref().map(|i| i.name.clone()), ty });
    }
    Ok(out)
}

/// Candidate set for a bare call: every function/operator sharing `name`
/// found on the enclosing containers (innermost first, giving implicit
/// `self` dispatch) and then at file top level.
fn bare_call_candidates(session: &Session, fn_ctx: &FnCtx, name: &str, top_level: &[DeclId]) -> Vec<DeclId> {
    let mut out = Vec::new();
    let mut container = fn_ctx.container;
    while let Some(c) = container {
        for &m in session.decls.get(c).members() {
            if matches!(session.decls.get(m).kind, DeclKind::Function { .. }) && session.decl_name_matches(m, name) {
                out.push(m);
            }
        }
        container = session.decls.get(c).container;
    }
    for &id in top_level {
        if matches!(session.decls.get(id).kind, DeclKind::Function { .. }) && session.decl_name_matches(id, name) {
            out.push(id);
        }
    }
    out
}

fn return_type_of(session: &Session, decl: DeclId) -> TypeId {
    match &session.decls.get(decl).kind {
        DeclKind::Function { sig, .. } | DeclKind::Operator { sig, .. } | DeclKind::CallOperator { sig } | DeclKind::Constructor { sig, .. } => sig.return_type,
        _ => unreachable!("return_type_of called on a non-callable declaration"),
    }
}

/// Rewrites `call_expr`'s callee to the resolved dispatch form and, for a
/// member/functor call, prepends `base` as the call's implicit first
/// argument (spec §4.6/§4.8: the codegen driver then lowers every call's
/// `args` purely positionally against the target's declared parameter
/// list, with no separate "receiver" concept in the IR layer).
fn finish_call(session: &mut Session, call_expr: ExprId, decl: DeclId, implicit_self: Option<ExprId>, mut args: Vec<LabeledArgument>, container: Option<DeclId>) {
    let is_virtual = session.decls.get(decl).modifiers.contains(Modifiers::VIRTUAL);
    let callee_kind = match (is_virtual, container.and_then(|c| vtable_slot_of(session, c, decl))) {
        (true, Some(slot)) => ExprKind::VTableFunctionReference { slot, function: decl },
        _ => ExprKind::StaticFunctionReference(decl),
    };
    if let Some(base) = implicit_self {
        args.insert(0, LabeledArgument { label: None, value: base });
    }
    let range = session.exprs.get(call_expr).range;
    let callee = session.exprs.alloc(Expr::new(callee_kind, range));
    session.exprs.get_mut(call_expr).kind = ExprKind::FunctionCall { callee, args };
}

fn resolve_call(
    session: &mut Session,
    target: &TargetDescriptor,
    fn_ctx: &FnCtx,
    scope: &mut Scope,
    call_expr: ExprId,
    callee: ExprId,
    args: Vec<LabeledArgument>,
    file: &str,
    top_level: &[DeclId],
    range: SourceRange,
) -> CompileResult<TypeId> {
    let callee_kind = session.exprs.get(callee).kind.clone();
    match callee_kind {
        ExprKind::Member { base, name, .. } => {
            let base_ty = walk_expr(session, target, fn_ctx, scope, base, file, top_level)?;
            let arg_descs = resolve_args(session, target, fn_ctx, scope, &args, file, top_level)?;
            let container = nominal_decl(session, base_ty).ok_or_else(|| fatal(file, range, ErrorKind::UnknownName(name.name.clone())))?;
            let candidates: Vec<DeclId> = session
                .decls
                .get(container)
                .members()
                .iter()
                .copied()
                .filter(|&m| matches!(session.decls.get(m).kind, DeclKind::Function { .. }) && session.decl_name_matches(m, &name.name))
                .collect();
            let pick = select_overload(session, target, &candidates, &arg_descs, None, &name.name, file, range)?;
            let ret = return_type_of(session, pick.decl);
            finish_call(session, call_expr, pick.decl, Some(base), args, Some(container));
            Ok(ret)
        }
        ExprKind::Identifier { name, template_args } if template_args.is_empty() => {
            let arg_descs = resolve_args(session, target, fn_ctx, scope, &args, file, top_level)?;
            let candidates = bare_call_candidates(session, fn_ctx, &name.name, top_level);
            let pick = select_overload(session, target, &candidates, &arg_descs, None, &name.name, file, range)?;
            let ret = return_type_of(session, pick.decl);
            let implicit_self = if session.decls.get(pick.decl).container.map(|c| matches!(session.decls.get(c).kind, DeclKind::Struct { .. } | DeclKind::Trait { .. })).unwrap_or(false) {
                Some(session.exprs.alloc(Expr::new(ExprKind::CurrentSelf, range)))
            } else {
                None
            };
            let container = session.decls.get(pick.decl).container;
            finish_call(session, call_expr, pick.decl, implicit_self, args, container);
            Ok(ret)
        }
        _ => {
            let callee_ty = walk_expr(session, target, fn_ctx, scope, callee, file, top_level)?;
            let arg_descs = resolve_args(session, target, fn_ctx, scope, &args, file, top_level)?;
            let (functor, _category) = resolve_functor(session, target, callee_ty, &arg_descs).ok_or_else(|| fatal(file, range, ErrorKind::NoMatchingOverload("<call>".into())))?;
            match functor {
                FunctorTarget::FunctionPointer => {
                    session.exprs.get_mut(call_expr).kind = ExprKind::FunctionCall { callee, args };
                    Ok(match &session.types.get(callee_ty).kind {
                        TypeKind::FunctionPointer { return_type, .. } => *return_type,
                        _ => callee_ty,
                    })
                }
                FunctorTarget::CallOperator(decl) => {
                    let ret = return_type_of(session, decl);
                    let container = nominal_decl(session, callee_ty);
                    finish_call(session, call_expr, decl, Some(callee), args, container);
                    Ok(ret)
                }
            }
        }
    }
}

/// `base[args]` (spec §3's `SubscriptCall`): resolved against the base
/// type's own `SubscriptOperator` member the same way a named call is
/// resolved against a function overload set, since a subscript operator
/// has no name to search by.
fn resolve_subscript_call(
    session: &mut Session,
    target: &TargetDescriptor,
    fn_ctx: &FnCtx,
    scope: &mut Scope,
    _call_expr: ExprId,
    base: ExprId,
    args: Vec<LabeledArgument>,
    file: &str,
    top_level: &[DeclId],
    range: SourceRange,
) -> CompileResult<TypeId> {
    let base_ty = walk_expr(session, target, fn_ctx, scope, base, file, top_level)?;
    let arg_descs = resolve_args(session, target, fn_ctx, scope, &args, file, top_level)?;
    let container = nominal_decl(session, base_ty).ok_or_else(|| fatal(file, range, ErrorKind::UnknownName("<subscript>".into())))?;
    let members = session.decls.get(container).members().to_vec();
    for m in members {
        if let DeclKind::SubscriptOperator { params, element_type, .. } = session.decls.get(m).kind.clone() {
            let category = compare_args_to_params(session, target, &params, &arg_descs);
            if category != MatchCategory::Fail {
                return Ok(element_type);
            }
        }
    }
    Err(fatal(file, range, ErrorKind::NoMatchingOverload("<subscript>".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::decl::{StructKind, Visibility};
    use crate::ast::types::{BuiltIn, TypeNode};
    use crate::diagnostics::SourceRange;
    use crate::ident::Identifier;

    fn builtin(session: &mut Session, name: &'static str, size: u32, signed: bool) -> TypeId {
        session.types.alloc(TypeNode::new(TypeKind::BuiltIn(BuiltIn { name, size_bytes: size, signed: Some(signed), floating: false })))
    }

    fn param(name: &str, label: Option<&str>, ty: TypeId, default_value: Option<crate::ast::ExprId>) -> Parameter {
        Parameter {
            name: Identifier::new(name, SourceRange::zero()),
            label: label.map(|l| Identifier::new(l, SourceRange::zero())),
            kind: crate::ast::decl::ParamKind::Val,
            ty,
            default_value,
        }
    }

    fn function_decl(session: &mut Session, name: &str, params: Vec<Parameter>, return_type: TypeId) -> DeclId {
        session.decls.alloc(Decl::new(
            DeclKind::Function {
                name: Identifier::new(name, SourceRange::zero()),
                sig: FunctionSig { params, return_type, contracts: vec![], body: None },
            },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ))
    }

    #[test]
    fn compare_args_to_params_is_exact_on_matching_types_and_labels() {
        let mut session = Session::new();
        let i32_ty = builtin(&mut session, "i32", 4, true);
        let target = TargetDescriptor::host_default();
        let params = vec![param("x", Some("with"), i32_ty, None)];
        let args = vec![ArgDesc { label: Some("with".into()), ty: i32_ty }];
        assert_eq!(compare_args_to_params(&session, &target, &params, &args), MatchCategory::Match);
    }

    #[test]
    fn compare_args_to_params_widens_as_castable_and_fails_on_mismatched_label() {
        let mut session = Session::new();
        let i8_ty = builtin(&mut session, "i8", 1, true);
        let i32_ty = builtin(&mut session, "i32", 4, true);
        let target = TargetDescriptor::host_default();
        let params = vec![param("x", None, i32_ty, None)];

        let widened = vec![ArgDesc { label: None, ty: i8_ty }];
        assert_eq!(compare_args_to_params(&session, &target, &params, &widened), MatchCategory::Castable);

        let labeled_params = vec![param("x", Some("of"), i32_ty, None)];
        let mislabeled = vec![ArgDesc { label: Some("by".into()), ty: i32_ty }];
        assert_eq!(compare_args_to_params(&session, &target, &labeled_params, &mislabeled), MatchCategory::Fail);
    }

    #[test]
    fn compare_args_to_params_accepts_missing_optional_trailing_params() {
        let mut session = Session::new();
        let unit = session.exprs.alloc(crate::ast::Expr::new(crate::ast::ExprKind::SolvedConst(crate::ast::types::ConstValue::Int(0)), SourceRange::zero()));
        let i32_ty = builtin(&mut session, "i32", 4, true);
        let target = TargetDescriptor::host_default();
        let params = vec![param("x", None, i32_ty, None), param("y", None, i32_ty, Some(unit))];
        let args = vec![ArgDesc { label: None, ty: i32_ty }];
        assert_eq!(compare_args_to_params(&session, &target, &params, &args), MatchCategory::DefaultValues);
    }

    #[test]
    fn select_overload_prefers_exact_match_over_castable_and_flags_ambiguity() {
        let mut session = Session::new();
        let i8_ty = builtin(&mut session, "i8", 1, true);
        let i32_ty = builtin(&mut session, "i32", 4, true);
        let target = TargetDescriptor::host_default();

        let castable = function_decl(&mut session, "f", vec![param("x", None, i32_ty, None)], i32_ty);
        let exact = function_decl(&mut session, "f", vec![param("x", None, i8_ty, None)], i32_ty);
        let args = vec![ArgDesc { label: None, ty: i8_ty }];

        let pick = select_overload(&session, &target, &[castable, exact], &args, None, "f", "t.gulc", SourceRange::zero()).unwrap();
        assert_eq!(pick.decl, exact);
        assert_eq!(pick.category, MatchCategory::Match);

        let identical = function_decl(&mut session, "f", vec![param("x", None, i8_ty, None)], i32_ty);
        let err = select_overload(&session, &target, &[exact, identical], &args, None, "f", "t.gulc", SourceRange::zero());
        assert!(matches!(err, Err(e) if matches!(e.kind, ErrorKind::AmbiguousOverload(_))));
    }

    #[test]
    fn resolve_functor_dispatches_to_a_call_operator() {
        let mut session = Session::new();
        let i32_ty = builtin(&mut session, "i32", 4, true);
        let target = TargetDescriptor::host_default();

        let call_op = session.decls.alloc(Decl::new(
            DeclKind::CallOperator { sig: FunctionSig { params: vec![param("x", None, i32_ty, None)], return_type: i32_ty, contracts: vec![], body: None } },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        let multiplier = session.decls.alloc(Decl::new(
            DeclKind::Struct {
                name: Identifier::new("Multiplier", SourceRange::zero()),
                kind: StructKind::Struct,
                inherited: vec![],
                members: vec![call_op],
                vtable: vec![],
                cached_copy_constructor: None,
                cached_move_constructor: None,
            },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        let multiplier_ty = session.types.alloc(TypeNode::new(TypeKind::Struct { decl: multiplier }));
        let args = vec![ArgDesc { label: None, ty: i32_ty }];

        let (target_kind, category) = resolve_functor(&session, &target, multiplier_ty, &args).unwrap();
        assert_eq!(target_kind, FunctorTarget::CallOperator(call_op));
        assert_eq!(category, MatchCategory::Match);
    }

    #[test]
    fn compare_functions_finds_similar_via_default_value_expansion() {
        let mut session = Session::new();
        let unit = session.exprs.alloc(crate::ast::Expr::new(crate::ast::ExprKind::SolvedConst(crate::ast::types::ConstValue::Int(0)), SourceRange::zero()));
        let i32_ty = builtin(&mut session, "i32", 4, true);
        let short = function_decl(&mut session, "f", vec![param("x", None, i32_ty, None)], i32_ty);
        let long = function_decl(&mut session, "f", vec![param("x", None, i32_ty, None), param("y", None, i32_ty, Some(unit))], i32_ty);
        assert_eq!(compare_functions(&session, short, long, true), CompareResult::Similar);
        assert_eq!(compare_functions(&session, short, long, false), CompareResult::Different);
    }
}
