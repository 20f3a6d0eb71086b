//! Type resolver (pass R, spec §4.4): turns `Unresolved` / `UnresolvedNested`
//! type nodes into resolved nominal, template, or dependent forms.
//!
//! Resolution mutates a `TypeNode`'s `kind` in place through its existing
//! `TypeId` rather than allocating a fresh node — every `Decl`/`Expr` field
//! that already holds that `TypeId` sees the resolved form for free.

use crate::ast::decl::DeclKind;
use crate::ast::expr::ExprKind;
use crate::ast::stmt::StmtKind;
use crate::ast::types::{ArgTuple, TemplateArg, TemplatedCandidates, TypeKind, TypeNode};
use crate::ast::{ContId, DeclId, ExprId, StmtId, TypeId};
use crate::diagnostics::{CompileError, CompileResult, ErrorKind, Phase, SourceRange};
use crate::ident::Identifier;
use crate::namespace::NamespaceTree;
use crate::session::Session;

struct Ctx<'a> {
    top_level: &'a [DeclId],
    namespaces: &'a NamespaceTree,
    file: &'a str,
}

/// Where we are (for diagnostics) and whether we're currently resolving
/// inside a still-generic template body — in which case a nominal hit
/// gets wrapped in `Dependent` rather than taken at face value, since the
/// real answer can only be known once the template is instantiated with
/// concrete arguments (spec §4.4, §4.5).
#[derive(Clone, Copy)]
struct Loc {
    range: SourceRange,
    dependent: Option<TypeId>,
}

pub fn run(session: &mut Session) -> CompileResult<()> {
    let namespaces = NamespaceTree::build(session);
    let files: Vec<(String, Vec<DeclId>)> =
        session.files.iter().map(|f| (f.path.clone(), f.top_level.clone())).collect();
    for (file, top_level) in &files {
        let ctx = Ctx { top_level, namespaces: &namespaces, file };
        for &id in top_level {
            resolve_decl(session, id, None, &ctx)?;
        }
    }
    Ok(())
}

/// Re-run name resolution on a freshly-instantiated declaration (spec §4.5
/// step 6): substitution can turn a `Dependent`/still-template container
/// concrete, unblocking an `UnresolvedNested` reference that pass R left
/// alone the first time around because its container wasn't resolvable
/// yet. An instantiation only ever refers to names its generic original
/// already resolved against (outer scope references were fixed at the
/// original's own pass R run, or substituted outright by the instantiator),
/// so an empty top-level scope is sufficient here.
pub(crate) fn resolve_instantiated(session: &mut Session, id: DeclId, file: &str) -> CompileResult<()> {
    let namespaces = NamespaceTree::build(session);
    let ctx = Ctx { top_level: &[], namespaces: &namespaces, file };
    resolve_decl(session, id, None, &ctx)
}

fn fatal(file: &str, range: SourceRange, kind: ErrorKind) -> CompileError {
    CompileError::fatal(Phase::TypeResolver, file, range, kind)
}

fn is_type_producing(kind: &DeclKind) -> bool {
    matches!(
        kind,
        DeclKind::Struct { .. }
            | DeclKind::Trait { .. }
            | DeclKind::Enum { .. }
            | DeclKind::TypeAlias { .. }
            | DeclKind::TemplateStruct { .. }
            | DeclKind::TemplateTrait { .. }
    )
}

fn matching_in_list(session: &Session, list: &[DeclId], name: &str) -> Vec<DeclId> {
    list.iter()
        .copied()
        .filter(|&id| is_type_producing(&session.decls.get(id).kind) && session.decl_name_matches(id, name))
        .collect()
}

fn matching_type_members(session: &Session, container: DeclId, name: &str) -> Vec<DeclId> {
    matching_in_list(session, session.decls.get(container).members(), name)
}

fn decl_arity(session: &Session, decl: DeclId) -> usize {
    match &session.decls.get(decl).kind {
        DeclKind::TemplateStruct { params, .. }
        | DeclKind::TemplateTrait { params, .. }
        | DeclKind::TypeAlias { params, .. } => params.len(),
        _ => 0,
    }
}

// ---------------------------------------------------------------------
// Declaration walk
// ---------------------------------------------------------------------

/// Resolve every type reachable from `id`. `inherited_dependent` is the
/// dependent-context of the lexically enclosing declaration, used for
/// declarations pass V never back-pointers (locals nested in statement
/// bodies); declarations pass V did visit override it with their own
/// recorded `containedInTemplate` / `containerTemplateType`.
fn resolve_decl(session: &mut Session, id: DeclId, inherited_dependent: Option<TypeId>, ctx: &Ctx) -> CompileResult<()> {
    let decl = session.decls.get(id);
    let range = decl.range;
    let dependent = if decl.contained_in_template { decl.container_template_type } else { inherited_dependent };
    let loc = Loc { range, dependent };

    let template_params: Option<Vec<DeclId>> = match &session.decls.get(id).kind {
        DeclKind::TemplateStruct { params, .. }
        | DeclKind::TemplateTrait { params, .. }
        | DeclKind::TemplateFunction { params, .. } => Some(params.clone()),
        _ => None,
    };

    let body = |session: &mut Session| -> CompileResult<()> {
        resolve_decl_own_types(session, id, loc, ctx)?;
        let members = session.decls.get(id).members().to_vec();
        session.with_container(id, |session| {
            for m in members {
                resolve_decl(session, m, dependent, ctx)?;
            }
            Ok(())
        })
    };

    match template_params {
        Some(params) => session.with_template_params(params, body),
        None => body(session),
    }
}

fn resolve_decl_own_types(session: &mut Session, id: DeclId, loc: Loc, ctx: &Ctx) -> CompileResult<()> {
    match session.decls.get(id).kind.clone() {
        DeclKind::Struct { inherited, .. } | DeclKind::Trait { inherited, .. } => {
            for t in inherited {
                resolve_type(session, t, loc, ctx)?;
            }
        }
        DeclKind::TemplateStruct { inherited, params, .. } | DeclKind::TemplateTrait { inherited, params, .. } => {
            resolve_template_params(session, &params, loc, ctx)?;
            for t in inherited {
                resolve_type(session, t, loc, ctx)?;
            }
        }
        DeclKind::Enum { underlying, .. } => {
            if let Some(t) = underlying {
                resolve_type(session, t, loc, ctx)?;
            }
        }
        DeclKind::EnumConst { value, .. } => {
            if let Some(e) = value {
                resolve_expr_types(session, e, loc, ctx)?;
            }
        }
        DeclKind::Function { sig, .. } | DeclKind::Operator { sig, .. } | DeclKind::CallOperator { sig } => {
            resolve_sig(session, &sig, loc, ctx)?;
        }
        DeclKind::TemplateFunction { params, sig, .. } => {
            resolve_template_params(session, &params, loc, ctx)?;
            resolve_sig(session, &sig, loc, ctx)?;
        }
        DeclKind::SubscriptOperator { params, element_type, .. } => {
            for p in &params {
                resolve_type(session, p.ty, loc, ctx)?;
                if let Some(d) = p.default_value {
                    resolve_expr_types(session, d, loc, ctx)?;
                }
            }
            resolve_type(session, element_type, loc, ctx)?;
        }
        DeclKind::Property { ty, .. } => {
            resolve_type(session, ty, loc, ctx)?;
        }
        DeclKind::Getter { body, .. } | DeclKind::Setter { body } => {
            if let Some(b) = body {
                resolve_stmt_types(session, b, loc, ctx)?;
            }
        }
        DeclKind::Constructor { sig, base_init, .. } => {
            resolve_sig(session, &sig, loc, ctx)?;
            if let Some(e) = base_init {
                resolve_expr_types(session, e, loc, ctx)?;
            }
        }
        DeclKind::Destructor { body } => {
            if let Some(b) = body {
                resolve_stmt_types(session, b, loc, ctx)?;
            }
        }
        DeclKind::Variable { ty, initializer, .. } => {
            resolve_type(session, ty, loc, ctx)?;
            if let Some(e) = initializer {
                resolve_expr_types(session, e, loc, ctx)?;
            }
        }
        DeclKind::Parameter(p) => {
            resolve_type(session, p.ty, loc, ctx)?;
            if let Some(d) = p.default_value {
                resolve_expr_types(session, d, loc, ctx)?;
            }
        }
        DeclKind::TemplateParameter(p) => {
            for t in p.constraint_or_type {
                resolve_type(session, t, loc, ctx)?;
            }
        }
        DeclKind::Extension { target, .. } => {
            resolve_type(session, target, loc, ctx)?;
        }
        DeclKind::TypeAlias { aliased, params, .. } => {
            resolve_template_params(session, &params, loc, ctx)?;
            resolve_type(session, aliased, loc, ctx)?;
        }
        DeclKind::TypeSuffix { params, return_type, body, .. } => {
            for p in &params {
                resolve_type(session, p.ty, loc, ctx)?;
            }
            resolve_type(session, return_type, loc, ctx)?;
            if let Some(b) = body {
                resolve_stmt_types(session, b, loc, ctx)?;
            }
        }
        DeclKind::Namespace { .. } | DeclKind::Import { .. } | DeclKind::TemplateXInst { .. } => {}
    }
    Ok(())
}

fn resolve_template_params(session: &mut Session, params: &[DeclId], loc: Loc, ctx: &Ctx) -> CompileResult<()> {
    for &p in params {
        let constraints = match &session.decls.get(p).kind {
            DeclKind::TemplateParameter(tp) => tp.constraint_or_type.clone(),
            _ => continue,
        };
        for t in constraints {
            resolve_type(session, t, loc, ctx)?;
        }
    }
    Ok(())
}

fn resolve_sig(session: &mut Session, sig: &crate::ast::decl::FunctionSig, loc: Loc, ctx: &Ctx) -> CompileResult<()> {
    for p in &sig.params {
        resolve_type(session, p.ty, loc, ctx)?;
        if let Some(d) = p.default_value {
            resolve_expr_types(session, d, loc, ctx)?;
        }
    }
    resolve_type(session, sig.return_type, loc, ctx)?;
    for &c in &sig.contracts {
        resolve_cont(session, c, loc, ctx)?;
    }
    if let Some(b) = sig.body {
        resolve_stmt_types(session, b, loc, ctx)?;
    }
    Ok(())
}

fn resolve_cont(session: &mut Session, cont: ContId, loc: Loc, ctx: &Ctx) -> CompileResult<()> {
    match session.conts.get(cont).kind.clone() {
        crate::ast::contract::ContKind::Requires(e) | crate::ast::contract::ContKind::Ensures(e) | crate::ast::contract::ContKind::Where(e) => {
            resolve_expr_types(session, e, loc, ctx)
        }
        crate::ast::contract::ContKind::Throws(Some(t)) => resolve_type(session, t, loc, ctx),
        crate::ast::contract::ContKind::Throws(None) => Ok(()),
    }
}

// ---------------------------------------------------------------------
// Statement / expression walk (for embedded `as`/`is`/`has` and template
// arguments on identifiers)
// ---------------------------------------------------------------------

fn resolve_stmt_types(session: &mut Session, stmt: StmtId, loc: Loc, ctx: &Ctx) -> CompileResult<()> {
    match session.stmts.get(stmt).kind.clone() {
        StmtKind::Compound { body, .. } => {
            for s in body {
                resolve_stmt_types(session, s, loc, ctx)?;
            }
        }
        StmtKind::If { cond, then_branch, else_branch } => {
            resolve_expr_types(session, cond, loc, ctx)?;
            resolve_stmt_types(session, then_branch, loc, ctx)?;
            if let Some(e) = else_branch {
                resolve_stmt_types(session, e, loc, ctx)?;
            }
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
            resolve_expr_types(session, cond, loc, ctx)?;
            resolve_stmt_types(session, body, loc, ctx)?;
        }
        StmtKind::For { init, cond, step, body } => {
            if let Some(i) = init {
                resolve_stmt_types(session, i, loc, ctx)?;
            }
            if let Some(c) = cond {
                resolve_expr_types(session, c, loc, ctx)?;
            }
            if let Some(s) = step {
                resolve_expr_types(session, s, loc, ctx)?;
            }
            resolve_stmt_types(session, body, loc, ctx)?;
        }
        StmtKind::Switch { discriminant, cases } => {
            resolve_expr_types(session, discriminant, loc, ctx)?;
            for case in cases {
                for v in case.values {
                    resolve_expr_types(session, v, loc, ctx)?;
                }
                for s in case.body {
                    resolve_stmt_types(session, s, loc, ctx)?;
                }
            }
        }
        StmtKind::Return { value: Some(e) } => resolve_expr_types(session, e, loc, ctx)?,
        StmtKind::Labeled { stmt, .. } => resolve_stmt_types(session, stmt, loc, ctx)?,
        StmtKind::DoCatch { body, catches, finally } => {
            resolve_stmt_types(session, body, loc, ctx)?;
            for c in catches {
                if let Some(t) = c.exception_type {
                    resolve_type(session, t, loc, ctx)?;
                }
                resolve_stmt_types(session, c.body, loc, ctx)?;
            }
            if let Some(f) = finally {
                resolve_stmt_types(session, f, loc, ctx)?;
            }
        }
        StmtKind::Expr(e) => resolve_expr_types(session, e, loc, ctx)?,
        // A local declaration inherits the current dependent context
        // rather than recomputing it — pass V never back-pointers
        // statement-local declarations (it only walks `members()`).
        StmtKind::Decl(d) => resolve_decl_own_types(session, d, loc, ctx)?,
        StmtKind::Return { value: None }
        | StmtKind::Fallthrough
        | StmtKind::Break { .. }
        | StmtKind::Continue { .. }
        | StmtKind::Goto { .. } => {}
    }
    Ok(())
}

fn resolve_expr_types(session: &mut Session, expr: ExprId, loc: Loc, ctx: &Ctx) -> CompileResult<()> {
    match session.exprs.get(expr).kind.clone() {
        ExprKind::Identifier { template_args, .. } => {
            for a in template_args {
                if let TemplateArg::Type(t) = a {
                    resolve_type(session, t, loc, ctx)?;
                }
            }
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            resolve_expr_types(session, lhs, loc, ctx)?;
            resolve_expr_types(session, rhs, loc, ctx)?;
        }
        ExprKind::Prefix { operand, .. } | ExprKind::Postfix { operand, .. } | ExprKind::Paren(operand) => {
            resolve_expr_types(session, operand, loc, ctx)?;
        }
        ExprKind::Ternary { cond, then_expr, else_expr } => {
            resolve_expr_types(session, cond, loc, ctx)?;
            resolve_expr_types(session, then_expr, loc, ctx)?;
            resolve_expr_types(session, else_expr, loc, ctx)?;
        }
        ExprKind::As { value, ty } | ExprKind::Is { value, ty } => {
            resolve_expr_types(session, value, loc, ctx)?;
            resolve_type(session, ty, loc, ctx)?;
        }
        ExprKind::Has { value, clause } => {
            resolve_expr_types(session, value, loc, ctx)?;
            resolve_has_clause(session, &clause, loc, ctx)?;
        }
        ExprKind::Member { base, .. } => resolve_expr_types(session, base, loc, ctx)?,
        ExprKind::FunctionCall { callee, args } => {
            resolve_expr_types(session, callee, loc, ctx)?;
            for a in args {
                resolve_expr_types(session, a.value, loc, ctx)?;
            }
        }
        ExprKind::SubscriptCall { base, args } => {
            resolve_expr_types(session, base, loc, ctx)?;
            for a in args {
                resolve_expr_types(session, a.value, loc, ctx)?;
            }
        }
        ExprKind::ArrayLiteral(items) => {
            for i in items {
                resolve_expr_types(session, i, loc, ctx)?;
            }
        }
        ExprKind::LabeledArgument(a) => resolve_expr_types(session, a.value, loc, ctx)?,
        ExprKind::VariableDecl { decl } => resolve_decl_own_types(session, decl, loc, ctx)?,
        ExprKind::Literal(_)
        | ExprKind::SolvedConst(_)
        | ExprKind::CurrentSelf
        | ExprKind::LocalVariableRef(_)
        | ExprKind::ParameterRef(_)
        | ExprKind::EnumConstRef(_) => {}
        // semantic node kinds are only introduced after this pass runs.
        _ => {}
    }
    Ok(())
}

fn resolve_has_clause(session: &mut Session, clause: &crate::ast::expr::HasClause, loc: Loc, ctx: &Ctx) -> CompileResult<()> {
    use crate::ast::expr::HasClause;
    match clause {
        HasClause::Trait(t) => resolve_type(session, *t, loc, ctx),
        HasClause::Init { params } | HasClause::Func { params, .. } | HasClause::Operator { params, .. } | HasClause::Call { params } => {
            for &p in params {
                resolve_type(session, p, loc, ctx)?;
            }
            Ok(())
        }
        HasClause::Var { ty, .. } => resolve_type(session, *ty, loc, ctx),
        HasClause::Property { ty, .. } => resolve_type(session, *ty, loc, ctx),
        HasClause::Subscript { params, ret, .. } => {
            for &p in params {
                resolve_type(session, p, loc, ctx)?;
            }
            resolve_type(session, *ret, loc, ctx)
        }
        HasClause::Deinit { .. } | HasClause::Case { .. } => Ok(()),
    }
}

// ---------------------------------------------------------------------
// Core name resolution (spec §4.4)
// ---------------------------------------------------------------------

fn resolve_type(session: &mut Session, ty: TypeId, loc: Loc, ctx: &Ctx) -> CompileResult<()> {
    let kind = session.types.get(ty).kind.clone();
    match kind {
        TypeKind::Unresolved { path, name, args } => resolve_unresolved(session, ty, &path, &name, args, loc, ctx),
        TypeKind::UnresolvedNested { container, name, args } => {
            resolve_type(session, container, loc, ctx)?;
            resolve_unresolved_nested(session, ty, container, &name, args, loc, ctx)
        }
        TypeKind::Pointer { inner } | TypeKind::Reference { inner } => resolve_type(session, inner, loc, ctx),
        TypeKind::FlatArray { element, .. } => resolve_type(session, element, loc, ctx),
        TypeKind::Dimension { inner, .. } => resolve_type(session, inner, loc, ctx),
        TypeKind::FunctionPointer { params, return_type } => {
            for p in params {
                resolve_type(session, p, loc, ctx)?;
            }
            resolve_type(session, return_type, loc, ctx)
        }
        TypeKind::TemplateStruct { args, .. } | TypeKind::TemplateTrait { args, .. } => resolve_args(session, args, loc, ctx),
        TypeKind::Templated(tc) => resolve_args(session, tc.args, loc, ctx),
        _ => Ok(()),
    }
}

fn resolve_args(session: &mut Session, args: ArgTuple, loc: Loc, ctx: &Ctx) -> CompileResult<()> {
    for a in args {
        if let TemplateArg::Type(t) = a {
            resolve_type(session, t, loc, ctx)?;
        }
    }
    Ok(())
}

fn set_resolved(session: &mut Session, ty: TypeId, kind: TypeKind) {
    session.types.get_mut(ty).kind = kind;
}

fn resolve_unresolved(
    session: &mut Session,
    ty: TypeId,
    path: &[Identifier],
    name: &Identifier,
    args: ArgTuple,
    loc: Loc,
    ctx: &Ctx,
) -> CompileResult<()> {
    resolve_args(session, args.clone(), loc, ctx)?;

    if !path.is_empty() {
        let container = resolve_path_to_decl(session, path, ctx, loc.range)?;
        let candidates = matching_type_members(session, container, &name.name);
        if candidates.is_empty() {
            return Err(fatal(ctx.file, loc.range, ErrorKind::UnknownName(name.name.clone())));
        }
        return finish_name_resolution(session, ty, candidates, args, loc.dependent, ctx, loc.range);
    }

    if args.is_empty() {
        if let Some(k) = crate::ast::types::lookup_builtin(&name.name) {
            set_resolved(session, ty, k);
            return Ok(());
        }
        if let Some(param) = session.find_template_param(&name.name) {
            set_resolved(session, ty, TypeKind::TemplateTypenameRef { param });
            return Ok(());
        }
    }

    let enclosing: Vec<DeclId> = session.enclosing_decls().to_vec();
    for &container in enclosing.iter().rev() {
        let candidates = matching_type_members(session, container, &name.name);
        if !candidates.is_empty() {
            return finish_name_resolution(session, ty, candidates, args, loc.dependent, ctx, loc.range);
        }
    }

    let candidates = matching_in_list(session, ctx.top_level, &name.name);
    if !candidates.is_empty() {
        return finish_name_resolution(session, ty, candidates, args, loc.dependent, ctx, loc.range);
    }

    let mut hits = Vec::new();
    for &imp in ctx.top_level {
        if let DeclKind::Import { alias: None, resolved: Some(target), .. } = &session.decls.get(imp).kind {
            hits.extend(matching_type_members(session, *target, &name.name));
        }
    }
    if hits.len() > 1 {
        return Err(fatal(ctx.file, loc.range, ErrorKind::AmbiguousName(name.name.clone())));
    }
    if !hits.is_empty() {
        return finish_name_resolution(session, ty, hits, args, loc.dependent, ctx, loc.range);
    }

    Err(fatal(ctx.file, loc.range, ErrorKind::UnknownName(name.name.clone())))
}

fn resolve_unresolved_nested(
    session: &mut Session,
    ty: TypeId,
    container: TypeId,
    name: &Identifier,
    args: ArgTuple,
    loc: Loc,
    ctx: &Ctx,
) -> CompileResult<()> {
    resolve_args(session, args.clone(), loc, ctx)?;
    let container_decl = match &session.types.get(container).kind {
        TypeKind::Struct { decl } | TypeKind::Trait { decl } | TypeKind::Enum { decl } | TypeKind::Alias { decl } => Some(*decl),
        TypeKind::TemplateStruct { decl, .. } | TypeKind::TemplateTrait { decl, .. } => Some(*decl),
        _ => None,
    };
    let Some(decl) = container_decl else {
        // container is itself still a template/dependent context; this
        // nested reference can only be resolved once that template is
        // instantiated (spec §4.5's nested-context rule).
        return Ok(());
    };
    let candidates = matching_type_members(session, decl, &name.name);
    if candidates.is_empty() {
        return Err(fatal(ctx.file, loc.range, ErrorKind::UnresolvedNestedType(name.name.clone())));
    }
    finish_name_resolution(session, ty, candidates, args, loc.dependent, ctx, loc.range)
}

fn resolve_path_to_decl(session: &mut Session, path: &[Identifier], ctx: &Ctx, range: SourceRange) -> CompileResult<DeclId> {
    ctx.namespaces
        .resolve_path(session, path)
        .ok_or_else(|| {
            let dotted = path.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(".");
            fatal(ctx.file, range, ErrorKind::UnknownName(dotted))
        })
}

fn finish_name_resolution(
    session: &mut Session,
    ty: TypeId,
    candidates: Vec<DeclId>,
    args: ArgTuple,
    dependent: Option<TypeId>,
    ctx: &Ctx,
    range: SourceRange,
) -> CompileResult<()> {
    let arity_matches: Vec<DeclId> = candidates.iter().copied().filter(|&d| decl_arity(session, d) == args.len()).collect();

    let chosen = if arity_matches.len() == 1 {
        Some(arity_matches[0])
    } else if candidates.len() == 1 && args.is_empty() {
        Some(candidates[0])
    } else {
        None
    };

    let Some(decl) = chosen else {
        set_resolved(session, ty, TypeKind::Templated(TemplatedCandidates { candidates, args }));
        return Ok(());
    };

    let kind = build_nominal_kind(session, decl, args);
    set_resolved(session, ty, kind);

    // A reference still nested inside a dependent (not-yet-instantiated)
    // context can't be driven through pass I yet — it gets its chance once
    // the enclosing template is itself instantiated and `resolve_instantiated`
    // walks this node again with `dependent` resolved away (spec §5).
    if dependent.is_none() {
        maybe_instantiate(session, ty, ctx, range)?;
    }

    if let Some(container_template) = dependent {
        let inner_kind = session.types.get(ty).kind.clone();
        let inner = session.types.alloc(TypeNode::new(inner_kind));
        session.types.get_mut(ty).kind = TypeKind::Dependent { container_template, inner };
    }
    Ok(())
}

/// Drives a just-resolved `TemplateStruct`/`TemplateTrait` reference through
/// pass I the moment its argument tuple is fully concrete (spec §5: template
/// instantiation is triggered eagerly off of name resolution, not deferred to
/// a separate discovery scan). Leaves anything else — and any reference still
/// carrying a type-parameter or unresolved argument — untouched; those wait
/// for a later round of this same fixed point, once their own arguments
/// resolve concretely.
fn maybe_instantiate(session: &mut Session, ty: TypeId, ctx: &Ctx, range: SourceRange) -> CompileResult<()> {
    let (decl, args) = match &session.types.get(ty).kind {
        TypeKind::TemplateStruct { decl, args } => (*decl, args.clone()),
        TypeKind::TemplateTrait { decl, args } => (*decl, args.clone()),
        _ => return Ok(()),
    };
    if !args_are_concrete(session, &args) {
        return Ok(());
    }
    let inst = crate::passes::template_instantiator::instantiate(session, decl, args, ctx.file, range)?;
    let underlying = crate::passes::template_instantiator::underlying_decl(session, inst);
    let new_kind = match &session.decls.get(underlying).kind {
        DeclKind::Trait { .. } => TypeKind::Trait { decl: underlying },
        _ => TypeKind::Struct { decl: underlying },
    };
    session.types.get_mut(ty).kind = new_kind;
    Ok(())
}

/// A type argument is concrete once it no longer refers to an unbound
/// template parameter or an unresolved/overload-ambiguous placeholder —
/// exactly the condition spec §4.5 requires before an argument tuple can key
/// the instantiation cache.
fn is_concrete_type(session: &Session, ty: TypeId) -> bool {
    match &session.types.get(ty).kind {
        TypeKind::TemplateTypenameRef { .. }
        | TypeKind::Unresolved { .. }
        | TypeKind::UnresolvedNested { .. }
        | TypeKind::Templated(_)
        | TypeKind::Dependent { .. } => false,
        TypeKind::Pointer { inner } | TypeKind::Reference { inner } | TypeKind::Dimension { inner, .. } => {
            is_concrete_type(session, *inner)
        }
        TypeKind::FlatArray { element, .. } => is_concrete_type(session, *element),
        TypeKind::FunctionPointer { params, return_type } => {
            params.iter().all(|&p| is_concrete_type(session, p)) && is_concrete_type(session, *return_type)
        }
        TypeKind::TemplateStruct { args, .. } | TypeKind::TemplateTrait { args, .. } => args_are_concrete(session, args),
        _ => true,
    }
}

fn args_are_concrete(session: &Session, args: &ArgTuple) -> bool {
    args.iter().all(|a| match a {
        TemplateArg::Type(t) => is_concrete_type(session, *t),
        TemplateArg::Const(_) => true,
    })
}

fn build_nominal_kind(session: &Session, decl: DeclId, args: ArgTuple) -> TypeKind {
    match &session.decls.get(decl).kind {
        DeclKind::Struct { .. } => TypeKind::Struct { decl },
        DeclKind::Trait { .. } => TypeKind::Trait { decl },
        DeclKind::Enum { .. } => TypeKind::Enum { decl },
        DeclKind::TypeAlias { aliased, params, .. } if params.is_empty() => session.types.get(*aliased).kind.clone(),
        DeclKind::TypeAlias { .. } => TypeKind::Alias { decl },
        DeclKind::TemplateStruct { .. } => TypeKind::TemplateStruct { decl, args },
        DeclKind::TemplateTrait { .. } => TypeKind::TemplateTrait { decl, args },
        _ => TypeKind::Struct { decl },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::decl::{Decl, Visibility};
    use crate::session::AstFile;

    fn unresolved(session: &mut Session, name: &str) -> TypeId {
        session.types.alloc(TypeNode::new(TypeKind::Unresolved {
            path: vec![],
            name: Identifier::new(name, SourceRange::zero()),
            args: ArgTuple::new(),
        }))
    }

    #[test]
    fn resolves_builtin_name() {
        let mut session = Session::new();
        let ty = unresolved(&mut session, "i32");
        session.files.push(AstFile { path: "t.gulc".into(), top_level: vec![] });
        assert!(run(&mut session).is_ok());
        assert!(matches!(session.types.get(ty).kind, TypeKind::BuiltIn(_)));
    }

    #[test]
    fn resolves_sibling_struct_at_file_scope() {
        let mut session = Session::new();
        let widget = session.decls.alloc(Decl::new(
            DeclKind::Struct {
                name: Identifier::new("Widget", SourceRange::zero()),
                kind: crate::ast::decl::StructKind::Struct,
                inherited: vec![],
                members: vec![],
                vtable: vec![],
                cached_copy_constructor: None,
                cached_move_constructor: None,
            },
            Visibility::Public,
            crate::ast::decl::Modifiers::empty(),
            SourceRange::zero(),
        ));
        let field_ty = unresolved(&mut session, "Widget");
        let holder = session.decls.alloc(Decl::new(
            DeclKind::Variable { name: Identifier::new("w", SourceRange::zero()), ty: field_ty, initializer: None },
            Visibility::Public,
            crate::ast::decl::Modifiers::empty(),
            SourceRange::zero(),
        ));
        session.files.push(AstFile { path: "t.gulc".into(), top_level: vec![widget, holder] });
        assert!(run(&mut session).is_ok());
        assert!(matches!(session.types.get(field_ty).kind, TypeKind::Struct { decl } if decl == widget));
    }

    #[test]
    fn rejects_unknown_name() {
        let mut session = Session::new();
        let ty = unresolved(&mut session, "Nonexistent");
        let holder = session.decls.alloc(Decl::new(
            DeclKind::Variable { name: Identifier::new("v", SourceRange::zero()), ty, initializer: None },
            Visibility::Public,
            crate::ast::decl::Modifiers::empty(),
            SourceRange::zero(),
        ));
        session.files.push(AstFile { path: "t.gulc".into(), top_level: vec![holder] });
        assert!(run(&mut session).is_err());
    }

    #[test]
    fn wraps_member_of_template_struct_as_dependent() {
        let mut session = Session::new();
        let helper = session.decls.alloc(Decl::new(
            DeclKind::Struct {
                name: Identifier::new("Helper", SourceRange::zero()),
                kind: crate::ast::decl::StructKind::Struct,
                inherited: vec![],
                members: vec![],
                vtable: vec![],
                cached_copy_constructor: None,
                cached_move_constructor: None,
            },
            Visibility::Public,
            crate::ast::decl::Modifiers::empty(),
            SourceRange::zero(),
        ));
        let param = session.decls.alloc(Decl::new(
            DeclKind::TemplateParameter(crate::ast::decl::TemplateParam {
                name: Identifier::new("T", SourceRange::zero()),
                kind: crate::ast::decl::TemplateParamKind::Typename,
                constraint_or_type: vec![],
            }),
            Visibility::Public,
            crate::ast::decl::Modifiers::empty(),
            SourceRange::zero(),
        ));
        let field_ty = unresolved(&mut session, "Helper");
        let field = session.decls.alloc(Decl::new(
            DeclKind::Variable { name: Identifier::new("value", SourceRange::zero()), ty: field_ty, initializer: None },
            Visibility::Public,
            crate::ast::decl::Modifiers::empty(),
            SourceRange::zero(),
        ));
        let boxed = session.decls.alloc(Decl::new(
            DeclKind::TemplateStruct {
                name: Identifier::new("Box", SourceRange::zero()),
                params: vec![param],
                kind: crate::ast::decl::StructKind::Struct,
                inherited: vec![],
                members: vec![field],
                where_conts: vec![],
                instantiations: Default::default(),
            },
            Visibility::Public,
            crate::ast::decl::Modifiers::empty(),
            SourceRange::zero(),
        ));
        session.files.push(AstFile { path: "t.gulc".into(), top_level: vec![helper, boxed] });
        super::super::decl_validator::run(&mut session).unwrap();
        assert!(session.decls.get(field).contained_in_template);
        assert!(run(&mut session).is_ok());
        assert!(matches!(session.types.get(field_ty).kind, TypeKind::Dependent { .. }));
    }
}
