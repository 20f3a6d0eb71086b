//! Type equivalence and the subtype check (spec §4.4), grounded on
//! `original_source/src/utilities/TypeCompareUtil.cpp`.

use crate::ast::types::{Qualifier, TemplateArg, TypeKind};
use crate::ast::TypeId;
use crate::inherit::{inheritance_closure, typename_ref_closure};
use crate::session::Session;

/// How a template-typename reference should compare against another type
/// during signature matching. Plain equality is used for ordinary type
/// comparison; `AllTemplatesAreSame` is used when matching a generic
/// function's *signature shape* against another (redefinition/compare-
/// functions checks, spec §4.6), where any two typename references count
/// as the same slot regardless of which parameter declared them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypenamePolicy {
    ByParamIdentity,
    AllTemplatesAreSame,
}

/// `same(T, U)` from spec §4.4 / P3.
pub fn same(session: &Session, a: TypeId, b: TypeId, policy: TypenamePolicy) -> bool {
    let na = session.types.get(a);
    let nb = session.types.get(b);

    // `ref int` compares equal to `int` at a call site (reference shedding
    // is transparent for `same`), but the qualifier on the referent still
    // must match because `mut` is observable (spec §4.4 note).
    match (&na.kind, &nb.kind) {
        (TypeKind::Reference { inner }, _) => return same(session, *inner, b, policy),
        (_, TypeKind::Reference { inner }) => return same(session, a, *inner, policy),
        _ => {}
    }

    if na.qualifier != Qualifier::Unassigned && nb.qualifier != Qualifier::Unassigned && na.qualifier != nb.qualifier {
        return false;
    }

    match (&na.kind, &nb.kind) {
        (TypeKind::Bool, TypeKind::Bool) => true,
        (TypeKind::BuiltIn(x), TypeKind::BuiltIn(y)) => x.name == y.name,
        (TypeKind::SelfType, TypeKind::SelfType) => true,
        (TypeKind::Pointer { inner: x }, TypeKind::Pointer { inner: y }) => same(session, *x, *y, policy),
        (TypeKind::FlatArray { element: x, .. }, TypeKind::FlatArray { element: y, .. }) => same(session, *x, *y, policy),
        (TypeKind::Dimension { inner: x, rank: rx }, TypeKind::Dimension { inner: y, rank: ry }) => {
            rx == ry && same(session, *x, *y, policy)
        }
        (
            TypeKind::FunctionPointer { params: xp, return_type: xr },
            TypeKind::FunctionPointer { params: yp, return_type: yr },
        ) => {
            xp.len() == yp.len()
                && xp.iter().zip(yp.iter()).all(|(x, y)| same(session, *x, *y, policy))
                && same(session, *xr, *yr, policy)
        }
        (TypeKind::Struct { decl: x }, TypeKind::Struct { decl: y }) => x == y,
        (TypeKind::Trait { decl: x }, TypeKind::Trait { decl: y }) => x == y,
        (TypeKind::Enum { decl: x }, TypeKind::Enum { decl: y }) => x == y,
        (TypeKind::Alias { decl: x }, TypeKind::Alias { decl: y }) => x == y,
        (TypeKind::TemplateStruct { decl: x, args: xa }, TypeKind::TemplateStruct { decl: y, args: ya })
        | (TypeKind::TemplateTrait { decl: x, args: xa }, TypeKind::TemplateTrait { decl: y, args: ya }) => {
            x == y && same_args(session, xa, ya, policy)
        }
        (TypeKind::TemplateTypenameRef { param: x }, TypeKind::TemplateTypenameRef { param: y }) => {
            policy == TypenamePolicy::AllTemplatesAreSame || x == y
        }
        _ => false,
    }
}

fn same_args(session: &Session, a: &[TemplateArg], b: &[TemplateArg], policy: TypenamePolicy) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| match (x, y) {
        (TemplateArg::Type(x), TemplateArg::Type(y)) => same(session, *x, *y, policy),
        (TemplateArg::Const(x), TemplateArg::Const(y)) => x == y,
        _ => false,
    })
}

/// `A : B` (spec §4.4's subtype check, P4's transitivity).
pub fn is_subtype(session: &Session, a: TypeId, b: TypeId) -> bool {
    if same(session, a, b, TypenamePolicy::ByParamIdentity) {
        return true;
    }
    let na = &session.types.get(a).kind;
    match na {
        TypeKind::Struct { decl } | TypeKind::TemplateStruct { decl, .. } | TypeKind::Trait { decl, .. } => {
            inheritance_closure(session, *decl).iter().any(|t| same(session, *t, b, TypenamePolicy::ByParamIdentity))
        }
        TypeKind::TemplateTrait { decl, .. } => {
            inheritance_closure(session, *decl).iter().any(|t| same(session, *t, b, TypenamePolicy::ByParamIdentity))
        }
        TypeKind::TemplateTypenameRef { param } => {
            typename_ref_closure(session, *param).iter().any(|t| same(session, *t, b, TypenamePolicy::ByParamIdentity))
        }
        _ => false,
    }
}

/// The specialization-strength integer from spec §4.6's
/// `compareTemplateArgsToParams`: 0 for exact, k for k inheritance hops,
/// `None` standing in for `∞` (a non-specialized `typename` parameter).
pub fn specialization_strength(session: &Session, arg: TypeId, constraint: TypeId) -> Option<u32> {
    if same(session, arg, constraint, TypenamePolicy::ByParamIdentity) {
        return Some(0);
    }
    let mut frontier = vec![(arg, 0u32)];
    let mut visited = Vec::new();
    while let Some((cur, depth)) = frontier.pop() {
        let decl = match &session.types.get(cur).kind {
            TypeKind::Struct { decl } | TypeKind::TemplateStruct { decl, .. } | TypeKind::Trait { decl, .. } | TypeKind::TemplateTrait { decl, .. } => *decl,
            _ => continue,
        };
        if visited.contains(&decl) {
            continue;
        }
        visited.push(decl);
        for parent in inheritance_closure(session, decl) {
            if same(session, parent, constraint, TypenamePolicy::ByParamIdentity) {
                return Some(depth + 1);
            }
            frontier.push((parent, depth + 1));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::decl::{Decl, DeclKind, Modifiers, StructKind, Visibility};
    use crate::ast::types::TypeNode;
    use crate::diagnostics::SourceRange;
    use crate::ident::Identifier;

    fn make_struct(session: &mut Session, name: &str, inherited: Vec<TypeId>) -> (crate::ast::DeclId, TypeId) {
        let decl = session.decls.alloc(Decl::new(
            DeclKind::Struct {
                name: Identifier::new(name, SourceRange::zero()),
                kind: StructKind::Class,
                inherited,
                members: vec![],
                vtable: vec![],
                cached_copy_constructor: None,
                cached_move_constructor: None,
            },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        let ty = session.types.alloc(TypeNode::new(TypeKind::Struct { decl }));
        (decl, ty)
    }

    #[test]
    fn same_is_reflexive_and_congruent_on_pointers() {
        let mut session = Session::new();
        let (_, view_ty) = make_struct(&mut session, "View", vec![]);
        assert!(same(&session, view_ty, view_ty, TypenamePolicy::ByParamIdentity));

        let ptr_a = session.types.alloc(TypeNode::new(TypeKind::Pointer { inner: view_ty }));
        let ptr_b = session.types.alloc(TypeNode::new(TypeKind::Pointer { inner: view_ty }));
        assert!(same(&session, ptr_a, ptr_b, TypenamePolicy::ByParamIdentity));
    }

    #[test]
    fn subtype_is_transitive_across_two_hops() {
        let mut session = Session::new();
        let (_, view_ty) = make_struct(&mut session, "View", vec![]);
        let (_, window_decl_ty) = make_struct(&mut session, "Window", vec![view_ty]);
        let (_button_decl, button_ty) = {
            let (d, t) = make_struct(&mut session, "Button", vec![window_decl_ty]);
            (d, t)
        };

        assert!(is_subtype(&session, button_ty, window_decl_ty));
        assert!(is_subtype(&session, button_ty, view_ty));
    }

    #[test]
    fn specialization_strength_counts_hops() {
        let mut session = Session::new();
        let (_, view_ty) = make_struct(&mut session, "View", vec![]);
        let (_, window_ty) = make_struct(&mut session, "Window", vec![view_ty]);
        let (_, button_ty) = make_struct(&mut session, "Button", vec![window_ty]);

        assert_eq!(specialization_strength(&session, button_ty, view_ty), Some(2));
        assert_eq!(specialization_strength(&session, button_ty, window_ty), Some(1));
        assert_eq!(specialization_strength(&session, button_ty, button_ty), Some(0));
    }
}
