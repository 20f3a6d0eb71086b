//! Contract solver (pass C, spec §4.7): folds a `has` expression's RHS
//! clause against its LHS value's type into a plain boolean, the one piece
//! of constant-folding input `const_eval` cannot produce on its own because
//! it requires a member-shape search rather than arithmetic.
//!
//! Grounded on `inherit.rs`'s closure walk for the `Trait` rule (the same
//! "does this nominal type's inheritance closure contain that type" query
//! `type_compare::is_subtype` already answers) and on
//! `passes::signature_resolver::resolve_functor`'s member-search pattern for
//! the remaining seven rules, which all reduce to "does some member of this
//! declaration's member list have this shape".

use crate::ast::decl::{Decl, DeclId, DeclKind};
use crate::ast::expr::HasClause;
use crate::ast::types::TypeKind;
use crate::ast::TypeId;
use crate::diagnostics::{CompileError, CompileResult, ErrorKind, Phase, SourceRange};
use crate::ident::Identifier;
use crate::session::Session;
use crate::type_compare::{self, TypenamePolicy};

fn fatal(file: &str, range: SourceRange, kind: ErrorKind) -> CompileError {
    CompileError::fatal(Phase::ContractSolver, file, range, kind)
}

/// `has` can only be folded against a fully concrete type (spec §4.7): an
/// uninstantiated template or a type still `Dependent` on an enclosing
/// template's own parameters has no fixed member set yet.
fn is_uninstantiated_template(session: &Session, ty: TypeId) -> bool {
    matches!(
        &session.types.get(ty).kind,
        TypeKind::TemplateStruct { .. } | TypeKind::TemplateTrait { .. } | TypeKind::Dependent { .. }
    )
}

fn nominal_decl_of(session: &Session, ty: TypeId) -> Option<DeclId> {
    match &session.types.get(ty).kind {
        TypeKind::Struct { decl } | TypeKind::Trait { decl } | TypeKind::Enum { decl } | TypeKind::Alias { decl } => Some(*decl),
        _ => None,
    }
}

fn types_match(session: &Session, a: &[TypeId], b: &[TypeId]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| type_compare::same(session, *x, *y, TypenamePolicy::ByParamIdentity))
}

fn name_eq(name: &Identifier, other: &Identifier) -> bool {
    name.text_eq(&other.name)
}

/// Folds `value has clause` to a boolean, per the eight-rule table in
/// spec §4.7. `value_ty` is the already-resolved type of the `has`
/// expression's LHS.
pub fn eval_has(session: &Session, file: &str, range: SourceRange, value_ty: TypeId, clause: &HasClause) -> CompileResult<bool> {
    if is_uninstantiated_template(session, value_ty) {
        return Err(fatal(file, range, ErrorKind::HasOnUninstantiatedTemplate));
    }

    if let HasClause::Trait(trait_ty) = clause {
        return Ok(type_compare::is_subtype(session, value_ty, *trait_ty));
    }

    let Some(decl) = nominal_decl_of(session, value_ty) else {
        return Ok(false);
    };
    let members = session.decls.get(decl).members();

    let found = members.iter().any(|&m| member_matches(session, session.decls.get(m), clause));
    Ok(found)
}

fn member_matches(session: &Session, member: &Decl, clause: &HasClause) -> bool {
    match (clause, &member.kind) {
        (HasClause::Init { params }, DeclKind::Constructor { sig, .. }) => {
            types_match(session, &sig.params.iter().map(|p| p.ty).collect::<Vec<_>>(), params)
        }
        (HasClause::Deinit { virtual_required }, DeclKind::Destructor { .. }) => {
            !virtual_required || member.modifiers.contains(crate::ast::decl::Modifiers::VIRTUAL)
        }
        (HasClause::Case { name }, DeclKind::EnumConst { name: member_name, .. }) => name_eq(name, member_name),
        (HasClause::Var { name, ty }, DeclKind::Variable { name: member_name, ty: member_ty, .. }) => {
            name_eq(name, member_name) && type_compare::same(session, *ty, *member_ty, TypenamePolicy::ByParamIdentity)
        }
        (HasClause::Property { name, ty, needs_get, needs_set }, DeclKind::Property { name: member_name, ty: member_ty, getter, setter }) => {
            name_eq(name, member_name)
                && type_compare::same(session, *ty, *member_ty, TypenamePolicy::ByParamIdentity)
                && (!needs_get || getter.is_some())
                && (!needs_set || setter.is_some())
        }
        (
            HasClause::Subscript { params, ret, needs_get, needs_set },
            DeclKind::SubscriptOperator { params: member_params, element_type, getter, setter },
        ) => {
            types_match(session, &member_params.iter().map(|p| p.ty).collect::<Vec<_>>(), params)
                && type_compare::same(session, *ret, *element_type, TypenamePolicy::ByParamIdentity)
                && (!needs_get || getter.is_some())
                && (!needs_set || setter.is_some())
        }
        (HasClause::Func { name, params }, DeclKind::Function { name: member_name, sig }) => {
            name_eq(name, member_name) && types_match(session, &sig.params.iter().map(|p| p.ty).collect::<Vec<_>>(), params)
        }
        (HasClause::Operator { symbol, params }, DeclKind::Operator { symbol: member_symbol, sig, .. }) => {
            symbol == member_symbol && types_match(session, &sig.params.iter().map(|p| p.ty).collect::<Vec<_>>(), params)
        }
        (HasClause::Call { params }, DeclKind::CallOperator { sig }) => {
            types_match(session, &sig.params.iter().map(|p| p.ty).collect::<Vec<_>>(), params)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::decl::{ConstructorKind, FunctionSig, Modifiers, StructKind, Visibility};
    use crate::ast::types::{BuiltIn, TypeNode};
    use crate::session::AstFile;

    fn i32_ty(session: &mut Session) -> TypeId {
        session.types.alloc(TypeNode::new(TypeKind::BuiltIn(BuiltIn { name: "i32", size_bytes: 4, signed: Some(true), floating: false })))
    }

    #[test]
    fn finds_a_constructor_with_matching_parameter_types() {
        let mut session = Session::new();
        let i32_ty = i32_ty(&mut session);
        let sig = FunctionSig {
            params: vec![crate::ast::decl::Parameter {
                name: Identifier::new("x", SourceRange::zero()),
                label: None,
                kind: crate::ast::decl::ParamKind::Val,
                ty: i32_ty,
                default_value: None,
            }],
            return_type: i32_ty,
            contracts: vec![],
            body: None,
        };
        let ctor = session.decls.alloc(Decl::new(
            DeclKind::Constructor { sub_kind: ConstructorKind::Normal, sig, base_init: None },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        let strct = session.decls.alloc(Decl::new(
            DeclKind::Struct {
                name: Identifier::new("Point", SourceRange::zero()),
                kind: StructKind::Struct,
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
        let strct_ty = session.types.alloc(TypeNode::new(TypeKind::Struct { decl: strct }));
        session.files.push(AstFile { path: "t.gulc".into(), top_level: vec![strct] });

        let clause = HasClause::Init { params: vec![i32_ty] };
        assert_eq!(eval_has(&session, "t.gulc", SourceRange::zero(), strct_ty, &clause).unwrap(), true);

        let miss = HasClause::Init { params: vec![] };
        assert_eq!(eval_has(&session, "t.gulc", SourceRange::zero(), strct_ty, &miss).unwrap(), false);
    }

    #[test]
    fn rejects_has_against_an_uninstantiated_template() {
        let mut session = Session::new();
        let strct = session.decls.alloc(Decl::new(
            DeclKind::TemplateStruct {
                name: Identifier::new("Box", SourceRange::zero()),
                params: vec![],
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
        let ty = session.types.alloc(TypeNode::new(TypeKind::TemplateStruct { decl: strct, args: Default::default() }));
        let clause = HasClause::Deinit { virtual_required: false };
        let err = eval_has(&session, "t.gulc", SourceRange::zero(), ty, &clause);
        assert!(matches!(err, Err(e) if matches!(e.kind, ErrorKind::HasOnUninstantiatedTemplate)));
    }
}
