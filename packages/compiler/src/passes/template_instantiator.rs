//! Template instantiator (pass I, spec §4.5): deep-copies a generic
//! declaration's body, substitutes every `TemplateTypenameRef`/const-
//! parameter reference for the supplied argument tuple, evaluates `where`
//! contracts against the arguments, re-runs passes V/R on the copy, and
//! memoizes the result in the generic's own `instantiations` cache.
//!
//! Memoization follows spec §5's placeholder-before-recursing discipline:
//! a `TemplateXInst` placeholder is inserted into the cache before the body
//! is walked, so a self-reference inside the generic's own body (`List<T>`
//! mentioning `List<T>` internally) resolves to that same placeholder
//! rather than recursing forever.

use crate::ast::contract::{Cont, ContId, ContKind};
use crate::ast::decl::{
    Decl, DeclId, DeclKind, FunctionSig, Modifiers, Parameter, TemplateParam, TemplateParamKind, Visibility,
};
use crate::ast::expr::{Expr, ExprId, ExprKind, HasClause, LabeledArgument};
use crate::ast::stmt::{CatchClause, Stmt, StmtId, StmtKind, SwitchCase};
use crate::ast::types::{ArgTuple, ConstValue, TemplateArg, TypeId, TypeKind, TypeNode};
use crate::const_eval::{self, ConstEnv};
use crate::diagnostics::{CompileError, CompileResult, ErrorKind, Phase, SourceRange};
use crate::passes::{decl_validator, type_resolver};
use crate::session::Session;
use crate::type_compare;
use std::collections::HashMap;

/// A single template parameter's bound value for this instantiation.
enum Subst {
    Type(TypeId),
    Const(ConstValue),
}

/// State threaded through one `instantiate` call's deep copy.
struct InstCtx {
    generic: DeclId,
    inst_id: DeclId,
    args: ArgTuple,
    subst: HashMap<DeclId, Subst>,
    /// Original member `DeclId` -> its fresh copy, so sibling references
    /// within the same instantiation (a struct's `vtable` pointing at one
    /// of its own copied methods) land on the right copy.
    decl_map: HashMap<DeclId, DeclId>,
    file: String,
}

fn fatal(file: &str, range: SourceRange, kind: ErrorKind) -> CompileError {
    CompileError::fatal(Phase::TemplateInstantiator, file, range, kind)
}

/// Instantiate `generic` with `args`, returning the cached instantiation if
/// one already exists for this exact canonical argument tuple.
///
/// `args` is assumed canonical already (spec §4.5 step 1): every `Const`
/// slot already holds a folded [`ConstValue`], since that's the only shape
/// [`ArgTuple`] can carry — there is no raw-expression form left to fold.
pub fn instantiate(session: &mut Session, generic: DeclId, args: ArgTuple, file: &str, range: SourceRange) -> CompileResult<DeclId> {
    if let Some(existing) = lookup_cache(session, generic, &args) {
        return Ok(existing);
    }

    let params = template_params_of(session, generic);
    if params.len() != args.len() {
        return Err(fatal(
            file,
            range,
            ErrorKind::WrongTemplateArgCount(decl_label(session, generic), params.len(), args.len()),
        ));
    }

    let mut subst = HashMap::new();
    for (&param, arg) in params.iter().zip(args.iter()) {
        let bound = match arg {
            TemplateArg::Type(t) => Subst::Type(*t),
            TemplateArg::Const(v) => Subst::Const(v.clone()),
        };
        subst.insert(param, bound);
    }

    // Placeholder first (spec §5): this decl is now "the instantiation of
    // (generic, args)" for the rest of this call, including any recursive
    // reference to itself the deep copy below discovers.
    let inst_id = session.decls.alloc(Decl::new(
        DeclKind::TemplateXInst { args: args.clone(), body_decl: generic },
        Visibility::Public,
        Modifiers::empty(),
        range,
    ));
    session.decls.get_mut(inst_id).original_decl = Some(generic);
    insert_cache(session, generic, args.clone(), inst_id);

    let mut ctx = InstCtx { generic, inst_id, args: args.clone(), subst, decl_map: HashMap::new(), file: file.to_string() };

    let body_decl = match copy_generic_body(session, &mut ctx, generic) {
        Ok(id) => id,
        Err(e) => {
            remove_cache(session, generic, &args);
            return Err(e);
        }
    };
    if let DeclKind::TemplateXInst { body_decl: slot, .. } = &mut session.decls.get_mut(inst_id).kind {
        *slot = body_decl;
    }

    if let Err(e) = check_where_conts(session, generic, &ctx, range) {
        remove_cache(session, generic, &args);
        return Err(e);
    }

    let container = session.decls.get(generic).container;
    if let Err(e) = decl_validator::populate_instantiated(session, body_decl, container, &ctx.file) {
        remove_cache(session, generic, &args);
        return Err(e);
    }
    if let Err(e) = type_resolver::resolve_instantiated(session, body_decl, &ctx.file) {
        remove_cache(session, generic, &args);
        return Err(e);
    }

    Ok(inst_id)
}

/// Follow a `TemplateXInst` wrapper to the concrete declaration it stands
/// for; a no-op for anything else. Consumers that walk `members()`/`name()`
/// on a decl that might be an instantiation result should go through this
/// first (pass S/G territory once those exist — see `DESIGN.md`).
pub fn underlying_decl(session: &Session, id: DeclId) -> DeclId {
    match &session.decls.get(id).kind {
        DeclKind::TemplateXInst { body_decl, .. } => *body_decl,
        _ => id,
    }
}

fn decl_label(session: &Session, id: DeclId) -> String {
    session.decls.get(id).name().map(|n| n.name.clone()).unwrap_or_else(|| "<anonymous>".into())
}

fn template_params_of(session: &Session, generic: DeclId) -> Vec<DeclId> {
    match &session.decls.get(generic).kind {
        DeclKind::TemplateStruct { params, .. } | DeclKind::TemplateTrait { params, .. } | DeclKind::TemplateFunction { params, .. } => params.clone(),
        _ => Vec::new(),
    }
}

fn lookup_cache(session: &Session, generic: DeclId, args: &ArgTuple) -> Option<DeclId> {
    match &session.decls.get(generic).kind {
        DeclKind::TemplateStruct { instantiations, .. }
        | DeclKind::TemplateTrait { instantiations, .. }
        | DeclKind::TemplateFunction { instantiations, .. } => instantiations.get(args).copied(),
        _ => None,
    }
}

fn insert_cache(session: &mut Session, generic: DeclId, args: ArgTuple, inst_id: DeclId) {
    match &mut session.decls.get_mut(generic).kind {
        DeclKind::TemplateStruct { instantiations, .. }
        | DeclKind::TemplateTrait { instantiations, .. }
        | DeclKind::TemplateFunction { instantiations, .. } => {
            instantiations.insert(args, inst_id);
        }
        _ => {}
    }
}

fn remove_cache(session: &mut Session, generic: DeclId, args: &ArgTuple) {
    match &mut session.decls.get_mut(generic).kind {
        DeclKind::TemplateStruct { instantiations, .. }
        | DeclKind::TemplateTrait { instantiations, .. }
        | DeclKind::TemplateFunction { instantiations, .. } => {
            instantiations.shift_remove(args);
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------
// Where-contract evaluation (spec §4.5 step 5, §4.7)
// ---------------------------------------------------------------------

fn check_where_conts(session: &mut Session, generic: DeclId, ctx: &InstCtx, range: SourceRange) -> CompileResult<()> {
    let conts: Vec<ContId> = match &session.decls.get(generic).kind {
        DeclKind::TemplateStruct { where_conts, .. } | DeclKind::TemplateTrait { where_conts, .. } => where_conts.clone(),
        DeclKind::TemplateFunction { sig, .. } => sig
            .contracts
            .iter()
            .copied()
            .filter(|&c| matches!(session.conts.get(c).kind, ContKind::Where(_)))
            .collect(),
        _ => Vec::new(),
    };
    for cont in conts {
        let ContKind::Where(expr) = session.conts.get(cont).kind.clone() else { continue };
        if !eval_where(session, expr, ctx) {
            return Err(fatal(&ctx.file, range, ErrorKind::WhereClauseUnsatisfied(decl_label(session, generic))));
        }
    }
    Ok(())
}

/// `T : SomeType` (spec §4.7's `CheckExtendsType`), with a constant-folding
/// fallback for anything else a `where` clause's expression might hold.
fn eval_where(session: &Session, expr: ExprId, ctx: &InstCtx) -> bool {
    if let ExprKind::Is { value, ty } = &session.exprs.get(expr).kind {
        if let ExprKind::Identifier { name, .. } = &session.exprs.get(*value).kind {
            if let Some(&param) = ctx
                .subst
                .keys()
                .find(|&&p| session.decls.get(p).name().map(|n| n.text_eq(&name.name)).unwrap_or(false))
            {
                return match ctx.subst.get(&param) {
                    Some(Subst::Type(bound)) => type_compare::is_subtype(session, *bound, *ty),
                    _ => false,
                };
            }
        }
    }
    let mut env: ConstEnv = HashMap::new();
    for (&param, bound) in &ctx.subst {
        if let Subst::Const(v) = bound {
            env.insert(param, v.clone());
        }
    }
    matches!(const_eval::eval(session, expr, &env), Some(ConstValue::Bool(true)))
}

// ---------------------------------------------------------------------
// Deep copy + substitution (spec §4.5 steps 3-4)
// ---------------------------------------------------------------------

fn copy_generic_body(session: &mut Session, ctx: &mut InstCtx, generic: DeclId) -> CompileResult<DeclId> {
    let range = session.decls.get(generic).range;
    let visibility = session.decls.get(generic).visibility;
    let modifiers = session.decls.get(generic).modifiers;

    let kind = match session.decls.get(generic).kind.clone() {
        DeclKind::TemplateStruct { name, kind, inherited, members, .. } => {
            let new_members = copy_member_list(session, ctx, &members)?;
            DeclKind::Struct {
                name,
                kind,
                inherited: inherited.iter().map(|&t| copy_type(session, ctx, t)).collect(),
                members: new_members,
                vtable: Vec::new(),
                cached_copy_constructor: None,
                cached_move_constructor: None,
            }
        }
        DeclKind::TemplateTrait { name, inherited, members, .. } => {
            let new_members = copy_member_list(session, ctx, &members)?;
            DeclKind::Trait { name, inherited: inherited.iter().map(|&t| copy_type(session, ctx, t)).collect(), members: new_members }
        }
        DeclKind::TemplateFunction { name, sig, .. } => DeclKind::Function { name, sig: copy_sig(session, ctx, &sig)? },
        other => return Err(fatal(&ctx.file, range, ErrorKind::Internal(format!("not a generic declaration: {other:?}")))),
    };

    let mut decl = Decl::new(kind, visibility, modifiers, range);
    decl.original_decl = Some(generic);
    Ok(session.decls.alloc(decl))
}

fn copy_member_list(session: &mut Session, ctx: &mut InstCtx, members: &[DeclId]) -> CompileResult<Vec<DeclId>> {
    members.iter().map(|&m| copy_decl_ref(session, ctx, m)).collect()
}

fn copy_decl_ref(session: &mut Session, ctx: &mut InstCtx, old: DeclId) -> CompileResult<DeclId> {
    if let Some(&new_id) = ctx.decl_map.get(&old) {
        return Ok(new_id);
    }
    let new_id = copy_decl(session, ctx, old)?;
    ctx.decl_map.insert(old, new_id);
    Ok(new_id)
}

fn copy_decl(session: &mut Session, ctx: &mut InstCtx, old: DeclId) -> CompileResult<DeclId> {
    let range = session.decls.get(old).range;
    let visibility = session.decls.get(old).visibility;
    let modifiers = session.decls.get(old).modifiers;
    let original = session.decls.get(old).kind.clone();

    let kind = match original {
        DeclKind::Variable { name, ty, initializer } => DeclKind::Variable {
            name,
            ty: copy_type(session, ctx, ty),
            initializer: initializer.map(|e| copy_expr(session, ctx, e)).transpose()?,
        },
        DeclKind::Function { name, sig } => DeclKind::Function { name, sig: copy_sig(session, ctx, &sig)? },
        DeclKind::Operator { fix, symbol, sig } => DeclKind::Operator { fix, symbol, sig: copy_sig(session, ctx, &sig)? },
        DeclKind::CallOperator { sig } => DeclKind::CallOperator { sig: copy_sig(session, ctx, &sig)? },
        DeclKind::SubscriptOperator { params, element_type, getter, setter } => DeclKind::SubscriptOperator {
            params: params.iter().map(|p| copy_param(session, ctx, p)).collect::<CompileResult<_>>()?,
            element_type: copy_type(session, ctx, element_type),
            getter: getter.map(|g| copy_decl_ref(session, ctx, g)).transpose()?,
            setter: setter.map(|s| copy_decl_ref(session, ctx, s)).transpose()?,
        },
        DeclKind::Property { name, ty, getter, setter } => DeclKind::Property {
            name,
            ty: copy_type(session, ctx, ty),
            getter: getter.map(|g| copy_decl_ref(session, ctx, g)).transpose()?,
            setter: setter.map(|s| copy_decl_ref(session, ctx, s)).transpose()?,
        },
        DeclKind::Getter { is_ref, is_ref_mut, body } => {
            DeclKind::Getter { is_ref, is_ref_mut, body: body.map(|b| copy_stmt(session, ctx, b)).transpose()? }
        }
        DeclKind::Setter { body } => DeclKind::Setter { body: body.map(|b| copy_stmt(session, ctx, b)).transpose()? },
        DeclKind::Constructor { sub_kind, sig, base_init } => DeclKind::Constructor {
            sub_kind,
            sig: copy_sig(session, ctx, &sig)?,
            base_init: base_init.map(|e| copy_expr(session, ctx, e)).transpose()?,
        },
        DeclKind::Destructor { body } => DeclKind::Destructor { body: body.map(|b| copy_stmt(session, ctx, b)).transpose()? },
        DeclKind::EnumConst { name, value } => {
            DeclKind::EnumConst { name, value: value.map(|e| copy_expr(session, ctx, e)).transpose()? }
        }
        DeclKind::Enum { name, underlying, consts } => DeclKind::Enum {
            name,
            underlying: underlying.map(|t| copy_type(session, ctx, t)),
            consts: consts.iter().map(|&c| copy_decl_ref(session, ctx, c)).collect::<CompileResult<_>>()?,
        },
        DeclKind::TypeAlias { name, params, aliased, is_prefix } if params.is_empty() => {
            DeclKind::TypeAlias { name, params, aliased: copy_type(session, ctx, aliased), is_prefix }
        }
        DeclKind::TypeSuffix { name, params, return_type, body } => DeclKind::TypeSuffix {
            name,
            params: params.iter().map(|p| copy_param(session, ctx, p)).collect::<CompileResult<_>>()?,
            return_type: copy_type(session, ctx, return_type),
            body: body.map(|b| copy_stmt(session, ctx, b)).transpose()?,
        },
        // A nested struct/trait/enum, an extension, or a nested templated
        // member declared *inside* a generic: relocated by reference only,
        // one level of generic nesting at a time (see DESIGN.md). Its own
        // body is re-walked for outer-parameter substitution but keeps its
        // own member/param `DeclId`s, so two instantiations of the outer
        // generic that both declare such a nested decl still share it.
        other => other,
    };

    let mut decl = Decl::new(kind, visibility, modifiers, range);
    decl.original_decl = Some(old);
    Ok(session.decls.alloc(decl))
}

fn copy_param(session: &mut Session, ctx: &mut InstCtx, p: &Parameter) -> CompileResult<Parameter> {
    Ok(Parameter {
        name: p.name.clone(),
        label: p.label.clone(),
        kind: p.kind,
        ty: copy_type(session, ctx, p.ty),
        default_value: p.default_value.map(|e| copy_expr(session, ctx, e)).transpose()?,
    })
}

fn copy_sig(session: &mut Session, ctx: &mut InstCtx, sig: &FunctionSig) -> CompileResult<FunctionSig> {
    Ok(FunctionSig {
        params: sig.params.iter().map(|p| copy_param(session, ctx, p)).collect::<CompileResult<_>>()?,
        return_type: copy_type(session, ctx, sig.return_type),
        contracts: sig.contracts.iter().map(|&c| copy_cont(session, ctx, c)).collect::<CompileResult<_>>()?,
        body: sig.body.map(|b| copy_stmt(session, ctx, b)).transpose()?,
    })
}

fn copy_cont(session: &mut Session, ctx: &mut InstCtx, old: ContId) -> CompileResult<ContId> {
    let range = session.conts.get(old).range;
    let kind = match session.conts.get(old).kind.clone() {
        ContKind::Requires(e) => ContKind::Requires(copy_expr(session, ctx, e)?),
        ContKind::Ensures(e) => ContKind::Ensures(copy_expr(session, ctx, e)?),
        ContKind::Where(e) => ContKind::Where(copy_expr(session, ctx, e)?),
        ContKind::Throws(t) => ContKind::Throws(t.map(|t| copy_type(session, ctx, t))),
    };
    Ok(session.conts.alloc(Cont::new(kind, range)))
}

fn copy_stmt(session: &mut Session, ctx: &mut InstCtx, old: StmtId) -> CompileResult<StmtId> {
    let range = session.stmts.get(old).range;
    let kind = match session.stmts.get(old).kind.clone() {
        StmtKind::Compound { body, .. } => {
            StmtKind::Compound { body: body.iter().map(|&s| copy_stmt(session, ctx, s)).collect::<CompileResult<_>>()?, temporaries: Vec::new() }
        }
        StmtKind::If { cond, then_branch, else_branch } => StmtKind::If {
            cond: copy_expr(session, ctx, cond)?,
            then_branch: copy_stmt(session, ctx, then_branch)?,
            else_branch: else_branch.map(|s| copy_stmt(session, ctx, s)).transpose()?,
        },
        StmtKind::While { cond, body } => StmtKind::While { cond: copy_expr(session, ctx, cond)?, body: copy_stmt(session, ctx, body)? },
        StmtKind::DoWhile { body, cond } => StmtKind::DoWhile { body: copy_stmt(session, ctx, body)?, cond: copy_expr(session, ctx, cond)? },
        StmtKind::For { init, cond, step, body } => StmtKind::For {
            init: init.map(|s| copy_stmt(session, ctx, s)).transpose()?,
            cond: cond.map(|e| copy_expr(session, ctx, e)).transpose()?,
            step: step.map(|e| copy_expr(session, ctx, e)).transpose()?,
            body: copy_stmt(session, ctx, body)?,
        },
        StmtKind::Switch { discriminant, cases } => StmtKind::Switch {
            discriminant: copy_expr(session, ctx, discriminant)?,
            cases: cases
                .iter()
                .map(|c| {
                    Ok(SwitchCase {
                        is_default: c.is_default,
                        values: c.values.iter().map(|&v| copy_expr(session, ctx, v)).collect::<CompileResult<_>>()?,
                        body: c.body.iter().map(|&s| copy_stmt(session, ctx, s)).collect::<CompileResult<_>>()?,
                    })
                })
                .collect::<CompileResult<_>>()?,
        },
        StmtKind::Fallthrough => StmtKind::Fallthrough,
        StmtKind::Break { label } => StmtKind::Break { label },
        StmtKind::Continue { label } => StmtKind::Continue { label },
        StmtKind::Goto { label } => StmtKind::Goto { label },
        StmtKind::Return { value } => StmtKind::Return { value: value.map(|e| copy_expr(session, ctx, e)).transpose()? },
        StmtKind::Labeled { label, stmt } => StmtKind::Labeled { label, stmt: copy_stmt(session, ctx, stmt)? },
        StmtKind::DoCatch { body, catches, finally } => StmtKind::DoCatch {
            body: copy_stmt(session, ctx, body)?,
            catches: catches
                .iter()
                .map(|c| {
                    Ok(CatchClause {
                        exception_type: c.exception_type.map(|t| copy_type(session, ctx, t)),
                        binding: c.binding.clone(),
                        body: copy_stmt(session, ctx, c.body)?,
                    })
                })
                .collect::<CompileResult<_>>()?,
            finally: finally.map(|s| copy_stmt(session, ctx, s)).transpose()?,
        },
        StmtKind::Expr(e) => StmtKind::Expr(copy_expr(session, ctx, e)?),
        StmtKind::Decl(d) => StmtKind::Decl(copy_decl_ref(session, ctx, d)?),
    };
    Ok(session.stmts.alloc(Stmt::new(kind, range)))
}

fn copy_expr(session: &mut Session, ctx: &mut InstCtx, old: ExprId) -> CompileResult<ExprId> {
    let range = session.exprs.get(old).range;
    let kind = match session.exprs.get(old).kind.clone() {
        ExprKind::Literal(l) => ExprKind::Literal(l),
        ExprKind::Identifier { name, template_args } => {
            // A bare reference to a const template parameter folds
            // straight to its bound value (spec §4.5 step 4's
            // `TemplateConstRefExpr` substitution).
            if let Some(&param) = ctx.subst.keys().find(|&&p| session.decls.get(p).name().map(|n| n.text_eq(&name.name)).unwrap_or(false)) {
                if let Some(Subst::Const(v)) = ctx.subst.get(&param) {
                    ExprKind::SolvedConst(v.clone())
                } else {
                    ExprKind::Identifier { name, template_args: copy_args(session, ctx, &template_args) }
                }
            } else {
                ExprKind::Identifier { name, template_args: copy_args(session, ctx, &template_args) }
            }
        }
        ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary { op, lhs: copy_expr(session, ctx, lhs)?, rhs: copy_expr(session, ctx, rhs)? },
        ExprKind::Prefix { op, operand } => ExprKind::Prefix { op, operand: copy_expr(session, ctx, operand)? },
        ExprKind::Postfix { op, operand } => ExprKind::Postfix { op, operand: copy_expr(session, ctx, operand)? },
        ExprKind::Ternary { cond, then_expr, else_expr } => ExprKind::Ternary {
            cond: copy_expr(session, ctx, cond)?,
            then_expr: copy_expr(session, ctx, then_expr)?,
            else_expr: copy_expr(session, ctx, else_expr)?,
        },
        ExprKind::Paren(e) => ExprKind::Paren(copy_expr(session, ctx, e)?),
        ExprKind::As { value, ty } => ExprKind::As { value: copy_expr(session, ctx, value)?, ty: copy_type(session, ctx, ty) },
        ExprKind::Is { value, ty } => ExprKind::Is { value: copy_expr(session, ctx, value)?, ty: copy_type(session, ctx, ty) },
        ExprKind::Has { value, clause } => ExprKind::Has { value: copy_expr(session, ctx, value)?, clause: copy_has_clause(session, ctx, &clause) },
        ExprKind::Member { base, name, is_arrow } => ExprKind::Member { base: copy_expr(session, ctx, base)?, name, is_arrow },
        ExprKind::FunctionCall { callee, args } => ExprKind::FunctionCall {
            callee: copy_expr(session, ctx, callee)?,
            args: args.iter().map(|a| copy_labeled_arg(session, ctx, a)).collect::<CompileResult<_>>()?,
        },
        ExprKind::SubscriptCall { base, args } => ExprKind::SubscriptCall {
            base: copy_expr(session, ctx, base)?,
            args: args.iter().map(|a| copy_labeled_arg(session, ctx, a)).collect::<CompileResult<_>>()?,
        },
        ExprKind::ArrayLiteral(items) => ExprKind::ArrayLiteral(items.iter().map(|&i| copy_expr(session, ctx, i)).collect::<CompileResult<_>>()?),
        ExprKind::LabeledArgument(a) => ExprKind::LabeledArgument(Box::new(copy_labeled_arg(session, ctx, &a)?)),
        ExprKind::VariableDecl { decl } => ExprKind::VariableDecl { decl: copy_decl_ref(session, ctx, decl)? },
        // Semantic node kinds never appear before pass S/C run, which
        // haven't touched a still-generic body.
        other => other,
    };
    let mut e = Expr::new(kind, range);
    e.value_type = session.exprs.get(old).value_type;
    e.is_lvalue = session.exprs.get(old).is_lvalue;
    Ok(session.exprs.alloc(e))
}

fn copy_labeled_arg(session: &mut Session, ctx: &mut InstCtx, a: &LabeledArgument) -> CompileResult<LabeledArgument> {
    Ok(LabeledArgument { label: a.label.clone(), value: copy_expr(session, ctx, a.value)? })
}

fn copy_has_clause(session: &mut Session, ctx: &mut InstCtx, clause: &HasClause) -> HasClause {
    match clause {
        HasClause::Trait(t) => HasClause::Trait(copy_type(session, ctx, *t)),
        HasClause::Init { params } => HasClause::Init { params: params.iter().map(|&p| copy_type(session, ctx, p)).collect() },
        HasClause::Deinit { virtual_required } => HasClause::Deinit { virtual_required: *virtual_required },
        HasClause::Case { name } => HasClause::Case { name: name.clone() },
        HasClause::Var { name, ty } => HasClause::Var { name: name.clone(), ty: copy_type(session, ctx, *ty) },
        HasClause::Property { name, ty, needs_get, needs_set } => {
            HasClause::Property { name: name.clone(), ty: copy_type(session, ctx, *ty), needs_get: *needs_get, needs_set: *needs_set }
        }
        HasClause::Subscript { params, ret, needs_get, needs_set } => HasClause::Subscript {
            params: params.iter().map(|&p| copy_type(session, ctx, p)).collect(),
            ret: copy_type(session, ctx, *ret),
            needs_get: *needs_get,
            needs_set: *needs_set,
        },
        HasClause::Func { name, params } => HasClause::Func { name: name.clone(), params: params.iter().map(|&p| copy_type(session, ctx, p)).collect() },
        HasClause::Operator { symbol, params } => {
            HasClause::Operator { symbol: symbol.clone(), params: params.iter().map(|&p| copy_type(session, ctx, p)).collect() }
        }
        HasClause::Call { params } => HasClause::Call { params: params.iter().map(|&p| copy_type(session, ctx, p)).collect() },
    }
}

fn copy_args(session: &mut Session, ctx: &mut InstCtx, args: &ArgTuple) -> ArgTuple {
    args.iter()
        .map(|a| match a {
            TemplateArg::Type(t) => TemplateArg::Type(copy_type(session, ctx, *t)),
            TemplateArg::Const(v) => TemplateArg::Const(v.clone()),
        })
        .collect()
}

/// Substitute through a type node (spec §4.5 step 4). Reuses the bound
/// `TypeId` directly rather than allocating a fresh node for it: the
/// argument's own type tree is immutable once resolved, so aliasing it is
/// indistinguishable from a deep copy and avoids needlessly doubling arena
/// growth on every instantiation.
fn copy_type(session: &mut Session, ctx: &mut InstCtx, old: TypeId) -> TypeId {
    let qualifier = session.types.get(old).qualifier;
    let kind = session.types.get(old).kind.clone();

    let new_kind = match kind {
        TypeKind::TemplateTypenameRef { param } => match ctx.subst.get(&param) {
            Some(Subst::Type(bound)) => return *bound,
            _ => TypeKind::TemplateTypenameRef { param },
        },
        // Instantiation resolves the "depends on an outer template" context
        // this wrapper existed to express; what's left underneath is
        // concrete (or will become so once its own refs are substituted).
        TypeKind::Dependent { inner, .. } => return copy_type(session, ctx, inner),
        TypeKind::Pointer { inner } => TypeKind::Pointer { inner: copy_type(session, ctx, inner) },
        TypeKind::Reference { inner } => TypeKind::Reference { inner: copy_type(session, ctx, inner) },
        TypeKind::FlatArray { element, length_const } => TypeKind::FlatArray { element: copy_type(session, ctx, element), length_const },
        TypeKind::Dimension { inner, rank } => TypeKind::Dimension { inner: copy_type(session, ctx, inner), rank },
        TypeKind::FunctionPointer { params, return_type } => TypeKind::FunctionPointer {
            params: params.iter().map(|&p| copy_type(session, ctx, p)).collect(),
            return_type: copy_type(session, ctx, return_type),
        },
        TypeKind::TemplateStruct { decl, args } => {
            let new_args = copy_args(session, ctx, &args);
            if decl == ctx.generic && new_args == ctx.args {
                TypeKind::Struct { decl: ctx.inst_id }
            } else {
                TypeKind::TemplateStruct { decl, args: new_args }
            }
        }
        TypeKind::TemplateTrait { decl, args } => {
            let new_args = copy_args(session, ctx, &args);
            if decl == ctx.generic && new_args == ctx.args {
                TypeKind::Trait { decl: ctx.inst_id }
            } else {
                TypeKind::TemplateTrait { decl, args: new_args }
            }
        }
        TypeKind::Templated(tc) => TypeKind::Templated(crate::ast::types::TemplatedCandidates { candidates: tc.candidates, args: copy_args(session, ctx, &tc.args) }),
        TypeKind::UnresolvedNested { container, name, args } => {
            TypeKind::UnresolvedNested { container: copy_type(session, ctx, container), name, args: copy_args(session, ctx, &args) }
        }
        TypeKind::Unresolved { path, name, args } => TypeKind::Unresolved { path, name, args: copy_args(session, ctx, &args) },
        // Bool, BuiltIn, Struct, Trait, Enum, Alias, SelfType: nothing to
        // substitute through, copied by value/reference as-is.
        other => other,
    };

    session.types.alloc(TypeNode::with_qualifier(new_kind, qualifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::decl::{Modifiers, StructKind};
    use crate::ast::types::BuiltIn;
    use crate::ident::Identifier;
    use crate::session::AstFile;

    fn i32_type(session: &mut Session) -> TypeId {
        session.types.alloc(TypeNode::new(TypeKind::BuiltIn(BuiltIn { name: "i32", size_bytes: 4, signed: Some(true), floating: false })))
    }

    fn typename_param(session: &mut Session, name: &str) -> DeclId {
        session.decls.alloc(Decl::new(
            DeclKind::TemplateParameter(TemplateParam { name: Identifier::new(name, SourceRange::zero()), kind: TemplateParamKind::Typename, constraint_or_type: vec![] }),
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ))
    }

    #[test]
    fn substitutes_typename_field_with_concrete_argument() {
        let mut session = Session::new();
        let t = typename_param(&mut session, "T");
        let t_ref = session.types.alloc(TypeNode::new(TypeKind::TemplateTypenameRef { param: t }));
        let field = session.decls.alloc(Decl::new(
            DeclKind::Variable { name: Identifier::new("value", SourceRange::zero()), ty: t_ref, initializer: None },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        let boxed = session.decls.alloc(Decl::new(
            DeclKind::TemplateStruct {
                name: Identifier::new("Box", SourceRange::zero()),
                params: vec![t],
                kind: StructKind::Struct,
                inherited: vec![],
                members: vec![field],
                where_conts: vec![],
                instantiations: Default::default(),
            },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        session.files.push(AstFile { path: "t.gulc".into(), top_level: vec![boxed] });
        decl_validator::run(&mut session).unwrap();

        let i32_ty = i32_type(&mut session);
        let args: ArgTuple = vec![TemplateArg::Type(i32_ty)].into();
        let inst = instantiate(&mut session, boxed, args, "t.gulc", SourceRange::zero()).unwrap();

        let body = underlying_decl(&session, inst);
        let DeclKind::Struct { members, .. } = &session.decls.get(body).kind else { panic!("expected Struct") };
        let DeclKind::Variable { ty, .. } = &session.decls.get(members[0]).kind else { panic!("expected Variable") };
        assert!(matches!(session.types.get(*ty).kind, TypeKind::BuiltIn(ref b) if b.name == "i32"));
    }

    #[test]
    fn second_instantiation_with_same_args_hits_the_cache() {
        let mut session = Session::new();
        let t = typename_param(&mut session, "T");
        let boxed = session.decls.alloc(Decl::new(
            DeclKind::TemplateStruct {
                name: Identifier::new("Box", SourceRange::zero()),
                params: vec![t],
                kind: StructKind::Struct,
                inherited: vec![],
                members: vec![],
                where_conts: vec![],
                instantiations: Default::default(),
            },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        session.files.push(AstFile { path: "t.gulc".into(), top_level: vec![boxed] });
        decl_validator::run(&mut session).unwrap();

        let i32_ty = i32_type(&mut session);
        let args: ArgTuple = vec![TemplateArg::Type(i32_ty)].into();
        let first = instantiate(&mut session, boxed, args.clone(), "t.gulc", SourceRange::zero()).unwrap();
        let second = instantiate(&mut session, boxed, args, "t.gulc", SourceRange::zero()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn self_reference_inside_body_resolves_to_the_same_instantiation() {
        let mut session = Session::new();
        let t = typename_param(&mut session, "T");
        // `next: Box<T>*` inside `struct Box<T>` — a field pointing back at
        // the container's own self-view type (what `decl_validator`
        // installs as `containerTemplateType`).
        let self_args: ArgTuple = vec![TemplateArg::Type(session.types.alloc(TypeNode::new(TypeKind::TemplateTypenameRef { param: t })))].into();
        let boxed = session.decls.alloc(Decl::new(
            DeclKind::TemplateStruct {
                name: Identifier::new("Box", SourceRange::zero()),
                params: vec![t],
                kind: StructKind::Struct,
                inherited: vec![],
                members: vec![],
                where_conts: vec![],
                instantiations: Default::default(),
            },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        let self_ty = session.types.alloc(TypeNode::new(TypeKind::TemplateStruct { decl: boxed, args: self_args }));
        let next_ty = session.types.alloc(TypeNode::new(TypeKind::Pointer { inner: self_ty }));
        let next = session.decls.alloc(Decl::new(
            DeclKind::Variable { name: Identifier::new("next", SourceRange::zero()), ty: next_ty, initializer: None },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        if let DeclKind::TemplateStruct { members, .. } = &mut session.decls.get_mut(boxed).kind {
            members.push(next);
        }
        session.files.push(AstFile { path: "t.gulc".into(), top_level: vec![boxed] });
        decl_validator::run(&mut session).unwrap();

        let i32_ty = i32_type(&mut session);
        let args: ArgTuple = vec![TemplateArg::Type(i32_ty)].into();
        let inst = instantiate(&mut session, boxed, args, "t.gulc", SourceRange::zero()).unwrap();

        let body = underlying_decl(&session, inst);
        let DeclKind::Struct { members, .. } = &session.decls.get(body).kind else { panic!("expected Struct") };
        let DeclKind::Variable { ty: field_ty, .. } = &session.decls.get(members[0]).kind else { panic!("expected Variable") };
        let TypeKind::Pointer { inner } = &session.types.get(*field_ty).kind else { panic!("expected Pointer") };
        assert!(matches!(session.types.get(*inner).kind, TypeKind::Struct { decl } if decl == inst));
    }

    #[test]
    fn where_clause_rejects_a_non_matching_argument() {
        let mut session = Session::new();
        let t = typename_param(&mut session, "T");
        let comparable = session.decls.alloc(Decl::new(
            DeclKind::Trait { name: Identifier::new("Comparable", SourceRange::zero()), inherited: vec![], members: vec![] },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        let comparable_ty = session.types.alloc(TypeNode::new(TypeKind::Trait { decl: comparable }));
        let t_ref = session.types.alloc(TypeNode::new(TypeKind::TemplateTypenameRef { param: t }));
        let t_ident = session.exprs.alloc(Expr::new(ExprKind::Identifier { name: Identifier::new("T", SourceRange::zero()), template_args: ArgTuple::new() }, SourceRange::zero()));
        let where_expr = session.exprs.alloc(Expr::new(ExprKind::Is { value: t_ident, ty: comparable_ty }, SourceRange::zero()));
        let where_cont = session.conts.alloc(Cont::new(ContKind::Where(where_expr), SourceRange::zero()));
        let boxed = session.decls.alloc(Decl::new(
            DeclKind::TemplateStruct {
                name: Identifier::new("Sorted", SourceRange::zero()),
                params: vec![t],
                kind: StructKind::Struct,
                inherited: vec![],
                members: vec![],
                where_conts: vec![where_cont],
                instantiations: Default::default(),
            },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        session.files.push(AstFile { path: "t.gulc".into(), top_level: vec![boxed, comparable] });
        decl_validator::run(&mut session).unwrap();

        let i32_ty = i32_type(&mut session);
        let args: ArgTuple = vec![TemplateArg::Type(i32_ty)].into();
        assert!(instantiate(&mut session, boxed, args, "t.gulc", SourceRange::zero()).is_err());
    }
}
