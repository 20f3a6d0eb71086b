//! Basic declaration validator (pass V, spec §4.3): import resolution,
//! redefinition checking, modifier legality, and populating each
//! declaration's `container` / `containedInTemplate` / `containerTemplateType`
//! back-pointers.

use crate::ast::decl::{Decl, DeclKind, Modifiers};
use crate::ast::types::{ArgTuple, ConstValue, TemplateArg, TypeKind, TypeNode};
use crate::ast::{DeclId, TypeId};
use crate::diagnostics::{CompileError, CompileResult, ErrorKind, Phase, SourceRange};
use crate::namespace::NamespaceTree;
use crate::session::Session;

pub fn run(session: &mut Session) -> CompileResult<()> {
    let namespaces = NamespaceTree::build(session);
    resolve_imports(session, &namespaces)?;

    let files: Vec<(String, Vec<DeclId>)> =
        session.files.iter().map(|f| (f.path.clone(), f.top_level.clone())).collect();
    for (path, top_level) in &files {
        check_redefinitions(session, top_level, path)?;
    }
    for (path, top_level) in files {
        for id in top_level {
            populate(session, id, None, false, None, &path)?;
        }
    }
    Ok(())
}

fn err(file: &str, range: SourceRange, kind: ErrorKind) -> CompileError {
    CompileError::fatal(Phase::DeclValidator, file, range, kind)
}

// ---------------------------------------------------------------------
// 1. Import resolution
// ---------------------------------------------------------------------

fn resolve_imports(session: &mut Session, namespaces: &NamespaceTree) -> CompileResult<()> {
    let files: Vec<(String, Vec<DeclId>)> =
        session.files.iter().map(|f| (f.path.clone(), f.top_level.clone())).collect();

    for (file, top_level) in files {
        let mut seen_aliases: Vec<String> = Vec::new();
        for id in walk_imports(session, &top_level) {
            let (path, alias_name, range) = match &session.decls.get(id).kind {
                DeclKind::Import { path, alias, .. } => {
                    (path.clone(), alias.as_ref().map(|a| a.name.clone()), session.decls.get(id).range)
                }
                _ => continue,
            };
            if let Some(ref name) = alias_name {
                if seen_aliases.contains(name) {
                    return Err(err(&file, range, ErrorKind::Redefinition(name.clone())));
                }
                seen_aliases.push(name.clone());
            }
            let resolved = namespaces.resolve_path(session, &path);
            if resolved.is_none() {
                let dotted = path.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(".");
                return Err(err(&file, range, ErrorKind::UnknownName(dotted)));
            }
            if let DeclKind::Import { resolved: slot, .. } = &mut session.decls.get_mut(id).kind {
                *slot = resolved;
            }
        }
    }
    Ok(())
}

fn walk_imports(session: &Session, top_level: &[DeclId]) -> Vec<DeclId> {
    let mut out = Vec::new();
    for &id in top_level {
        if matches!(session.decls.get(id).kind, DeclKind::Import { .. }) {
            out.push(id);
        }
        out.extend(walk_imports(session, session.decls.get(id).members()));
    }
    out
}

// ---------------------------------------------------------------------
// 2. Redefinition check
// ---------------------------------------------------------------------

/// Whether a declaration's signature isn't typed yet at this stage, so
/// collisions among its kind are deferred to pass S (spec §4.3).
fn signature_not_yet_typed(kind: &DeclKind) -> bool {
    match kind {
        DeclKind::Function { .. }
        | DeclKind::Operator { .. }
        | DeclKind::CallOperator { .. }
        | DeclKind::SubscriptOperator { .. }
        | DeclKind::TemplateFunction { .. } => true,
        DeclKind::TypeAlias { params, .. } => !params.is_empty(),
        _ => false,
    }
}

/// `true` iff `a` and `b` are shape-compatible redefinitions of one another,
/// per the table in spec §4.3. Assumes both have the same name already.
fn collide(a: &DeclKind, b: &DeclKind) -> bool {
    if signature_not_yet_typed(a) && signature_not_yet_typed(b) {
        return false;
    }
    match (a, b) {
        (DeclKind::SubscriptOperator { params: pa, .. }, DeclKind::SubscriptOperator { params: pb, .. }) => {
            pa.len() == pb.len()
        }
        // template vs non-template: collide only when the template takes
        // zero arguments (it is then indistinguishable from a plain decl
        // at the use site).
        (DeclKind::TemplateStruct { params, .. }, _) | (_, DeclKind::TemplateStruct { params, .. }) => params.is_empty(),
        (DeclKind::TemplateTrait { params, .. }, _) | (_, DeclKind::TemplateTrait { params, .. }) => params.is_empty(),
        (DeclKind::TemplateFunction { params, .. }, _) | (_, DeclKind::TemplateFunction { params, .. }) => params.is_empty(),
        _ => true,
    }
}

fn check_redefinitions(session: &Session, members: &[DeclId], file: &str) -> CompileResult<()> {
    for (i, &a) in members.iter().enumerate() {
        let decl_a = session.decls.get(a);
        let Some(name_a) = decl_a.name().cloned() else { continue };
        for &b in &members[i + 1..] {
            let decl_b = session.decls.get(b);
            let Some(name_b) = decl_b.name() else { continue };
            if !name_a.redefinition_matches(name_b) {
                continue;
            }
            if collide(&decl_a.kind, &decl_b.kind) {
                return Err(err(file, decl_b.range, ErrorKind::Redefinition(name_a.name.clone())));
            }
        }
        check_redefinitions(session, decl_a.members(), file)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// 3. Modifier legality + container/containedInTemplate/containerTemplateType
// ---------------------------------------------------------------------

fn populate(
    session: &mut Session,
    id: DeclId,
    container: Option<DeclId>,
    contained_in_template: bool,
    container_template_type: Option<TypeId>,
    file: &str,
) -> CompileResult<()> {
    {
        let decl = session.decls.get_mut(id);
        decl.container = container;
        decl.contained_in_template = contained_in_template;
        decl.container_template_type = container_template_type;
    }

    check_modifiers(session, id, file)?;

    let is_template = session.decls.get(id).is_template();
    let next_contained_in_template = contained_in_template || is_template;
    let next_container_template_type = if is_template {
        Some(self_view_type(session, id))
    } else {
        container_template_type
    };

    let members = session.decls.get(id).members().to_vec();
    for m in members {
        populate(session, m, Some(id), next_contained_in_template, next_container_template_type, file)?;
    }
    Ok(())
}

/// A self-referential `TemplateStruct`/`TemplateTrait` type view of a
/// generic container, used as `containerTemplateType` for its members
/// (spec §4.3). Const parameters get a zero placeholder: nothing reads
/// their value before the real instantiation substitutes it.
fn self_view_type(session: &mut Session, template_decl: DeclId) -> TypeId {
    let (params, is_struct) = match &session.decls.get(template_decl).kind {
        DeclKind::TemplateStruct { params, .. } => (params.clone(), true),
        DeclKind::TemplateTrait { params, .. } => (params.clone(), false),
        DeclKind::TemplateFunction { params, .. } => (params.clone(), true),
        _ => (Vec::new(), true),
    };
    let args: ArgTuple = params
        .iter()
        .map(|&p| {
            let is_const = matches!(
                &session.decls.get(p).kind,
                DeclKind::TemplateParameter(tp) if matches!(tp.kind, crate::ast::decl::TemplateParamKind::ConstValue)
            );
            if is_const {
                TemplateArg::Const(ConstValue::Int(0))
            } else {
                let ty = session.types.alloc(TypeNode::new(TypeKind::TemplateTypenameRef { param: p }));
                TemplateArg::Type(ty)
            }
        })
        .collect();
    let kind = if is_struct {
        TypeKind::TemplateStruct { decl: template_decl, args }
    } else {
        TypeKind::TemplateTrait { decl: template_decl, args }
    };
    session.types.alloc(TypeNode::new(kind))
}

/// Re-run back-pointer population on a freshly-instantiated declaration
/// (spec §4.5's "re-run the relevant parts of the earlier passes" note).
/// Unlike a freshly-parsed decl, an instantiation is never itself still
/// generic from its own body's point of view — its `containedInTemplate`
/// starts `false` regardless of whether the *original* generic was nested
/// inside another one, since `container` here is the original's container,
/// not the original itself.
pub(crate) fn populate_instantiated(session: &mut Session, id: DeclId, container: Option<DeclId>, file: &str) -> CompileResult<()> {
    populate(session, id, container, false, None, file)
}

fn illegal(msg: impl Into<String>) -> ErrorKind {
    ErrorKind::IllegalModifierPosition(msg.into())
}

fn check_modifiers(session: &mut Session, id: DeclId, file: &str) -> CompileResult<()> {
    let decl = session.decls.get(id);
    let range = decl.range;
    let modifiers = decl.modifiers;
    let container_kind_is_trait = decl
        .container
        .map(|c| matches!(session.decls.get(c).kind, DeclKind::Trait { .. }))
        .unwrap_or(false);

    match &decl.kind {
        DeclKind::Import { .. } => {
            if !modifiers.is_empty() {
                return Err(err(file, range, illegal("imports cannot carry modifiers")));
            }
        }
        DeclKind::Struct { kind, members, .. } => {
            if *kind == crate::ast::decl::StructKind::Union && modifiers.contains(Modifiers::ABSTRACT) {
                return Err(err(file, range, illegal("unions cannot be `abstract`")));
            }
            if modifiers.contains(Modifiers::STATIC) {
                for &m in members {
                    if matches!(session.decls.get(m).kind, DeclKind::Constructor { .. } | DeclKind::Destructor { .. }) {
                        return Err(err(
                            file,
                            session.decls.get(m).range,
                            illegal("static structs cannot have constructors or destructors"),
                        ));
                    }
                }
            }
        }
        DeclKind::Trait { members, .. } => {
            for &m in members {
                if matches!(session.decls.get(m).kind, DeclKind::Variable { .. }) {
                    return Err(err(file, session.decls.get(m).range, illegal("traits cannot contain instance data")));
                }
            }
        }
        DeclKind::Extension { members, .. } => {
            for &m in members {
                if matches!(
                    session.decls.get(m).kind,
                    DeclKind::Destructor { .. } | DeclKind::Variable { .. }
                ) {
                    return Err(err(
                        file,
                        session.decls.get(m).range,
                        illegal("extensions cannot define destructors or instance data members"),
                    ));
                }
            }
        }
        DeclKind::Constructor { sig, .. } => {
            if modifiers.contains(Modifiers::VIRTUAL) || modifiers.contains(Modifiers::STATIC) {
                return Err(err(file, range, illegal("`init` cannot be `virtual` or `static`")));
            }
            check_body(session, id, sig.body, modifiers, container_kind_is_trait, file)?;
        }
        DeclKind::Destructor { body } => {
            if modifiers.contains(Modifiers::STATIC) {
                return Err(err(file, range, illegal("`deinit` cannot be `static`")));
            }
            check_body(session, id, *body, modifiers, container_kind_is_trait, file)?;
        }
        DeclKind::Function { sig, .. } | DeclKind::Operator { sig, .. } | DeclKind::CallOperator { sig } => {
            check_body(session, id, sig.body, modifiers, container_kind_is_trait, file)?;
        }
        DeclKind::Getter { body, .. } | DeclKind::Setter { body } => {
            check_body(session, id, *body, modifiers, container_kind_is_trait, file)?;
        }
        DeclKind::TypeSuffix { body, .. } => {
            check_body(session, id, *body, modifiers, container_kind_is_trait, file)?;
        }
        _ => {}
    }
    Ok(())
}

fn check_body(
    session: &mut Session,
    id: DeclId,
    body: Option<crate::ast::StmtId>,
    modifiers: Modifiers,
    container_is_trait: bool,
    file: &str,
) -> CompileResult<()> {
    let name = session.decls.get(id).name().map(|n| n.name.clone()).unwrap_or_default();
    let range = session.decls.get(id).range;
    let has_body = body.is_some();
    let extern_ = modifiers.contains(Modifiers::EXTERN);
    let abstract_ = modifiers.contains(Modifiers::ABSTRACT);

    if extern_ && has_body {
        return Err(err(file, range, ErrorKind::ExternWithBody(name)));
    }
    if abstract_ && has_body {
        return Err(err(file, range, ErrorKind::AbstractWithBody(name)));
    }
    if !has_body && !extern_ && !abstract_ && !container_is_trait {
        return Err(err(file, range, ErrorKind::MissingRequiredBody(name)));
    }
    if !has_body {
        session.decls.get_mut(id).modifiers |= Modifiers::PROTOTYPE;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::decl::{ConstructorKind, FunctionSig, StructKind, Visibility};
    use crate::ast::types::TypeKind as TK;
    use crate::ident::Identifier;
    use crate::session::AstFile;

    fn unit_type(session: &mut Session) -> TypeId {
        session.types.alloc(TypeNode::new(TK::BuiltIn(crate::ast::types::BuiltIn {
            name: "void",
            size_bytes: 0,
            signed: None,
            floating: false,
        })))
    }

    #[test]
    fn rejects_redefinition_of_two_variables() {
        let mut session = Session::new();
        let ty = unit_type(&mut session);
        let mk = |session: &mut Session, name: &str| {
            session.decls.alloc(Decl::new(
                DeclKind::Variable { name: Identifier::new(name, SourceRange::zero()), ty, initializer: None },
                Visibility::Public,
                Modifiers::empty(),
                SourceRange::zero(),
            ))
        };
        let a = mk(&mut session, "count");
        let b = mk(&mut session, "count");
        session.files.push(AstFile { path: "t.gulc".into(), top_level: vec![a, b] });
        assert!(run(&mut session).is_err());
    }

    #[test]
    fn allows_distinct_function_overloads_at_this_stage() {
        let mut session = Session::new();
        let ty = unit_type(&mut session);
        let body_stmt = session.stmts.alloc(crate::ast::Stmt::new(
            crate::ast::stmt::StmtKind::Compound { body: vec![], temporaries: vec![] },
            SourceRange::zero(),
        ));
        let sig = FunctionSig { params: vec![], return_type: ty, contracts: vec![], body: Some(body_stmt) };
        let mk = |session: &mut Session, name: &str| {
            session.decls.alloc(Decl::new(
                DeclKind::Function { name: Identifier::new(name, SourceRange::zero()), sig: sig.clone() },
                Visibility::Public,
                Modifiers::empty(),
                SourceRange::zero(),
            ))
        };
        let a = mk(&mut session, "draw");
        let b = mk(&mut session, "draw");
        session.files.push(AstFile { path: "t.gulc".into(), top_level: vec![a, b] });
        assert!(run(&mut session).is_ok());
    }

    #[test]
    fn rejects_init_marked_virtual() {
        let mut session = Session::new();
        let ty = unit_type(&mut session);
        let body_stmt = session.stmts.alloc(crate::ast::Stmt::new(crate::ast::stmt::StmtKind::Compound { body: vec![], temporaries: vec![] }, SourceRange::zero()));
        let sig = FunctionSig { params: vec![], return_type: ty, contracts: vec![], body: Some(body_stmt) };
        let ctor = session.decls.alloc(Decl::new(
            DeclKind::Constructor { sub_kind: ConstructorKind::Normal, sig, base_init: None },
            Visibility::Public,
            Modifiers::VIRTUAL,
            SourceRange::zero(),
        ));
        let strct = session.decls.alloc(Decl::new(
            DeclKind::Struct {
                name: Identifier::new("Foo", SourceRange::zero()),
                kind: StructKind::Class,
                inherited: vec![],
                members: vec![ctor],
                vtable: vec![],
                cached_copy_constructor: None,
                cached_move_constructor: None,
            },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        session.files.push(AstFile { path: "t.gulc".into(), top_level: vec![strct] });
        assert!(run(&mut session).is_err());
    }

    #[test]
    fn trait_members_may_be_bodyless() {
        let mut session = Session::new();
        let ty = unit_type(&mut session);
        let sig = FunctionSig { params: vec![], return_type: ty, contracts: vec![], body: None };
        let f = session.decls.alloc(Decl::new(
            DeclKind::Function { name: Identifier::new("draw", SourceRange::zero()), sig },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        let t = session.decls.alloc(Decl::new(
            DeclKind::Trait { name: Identifier::new("Drawable", SourceRange::zero()), inherited: vec![], members: vec![f] },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        session.files.push(AstFile { path: "t.gulc".into(), top_level: vec![t] });
        assert!(run(&mut session).is_ok());
        assert!(session.decls.get(f).modifiers.contains(Modifiers::PROTOTYPE));
    }
}
