//! Shared inheritance-closure walk, grounded on `original_source/src/
//! utilities/InheritUtil.cpp` (see `SPEC_FULL.md` §E). The subtype check
//! (spec §4.4) and the `has Trait` fold (spec §4.7) both need "does this
//! nominal type's inherited-type list, recursively, contain that type" —
//! the original split this into two copies; this rewrite shares one walk.

use crate::ast::decl::DeclKind;
use crate::ast::types::TypeKind;
use crate::ast::{DeclId, TypeId};
use crate::session::Session;

/// All types reachable by following `inherited` lists from `decl`,
/// breadth-first, without infinite-looping on accidental cycles.
pub fn inheritance_closure(session: &Session, decl: DeclId) -> Vec<TypeId> {
    let mut out = Vec::new();
    let mut seen_decls = vec![decl];
    let mut frontier = direct_inherited(session, decl);
    while let Some(ty) = frontier.pop() {
        out.push(ty);
        if let Some(inner_decl) = nominal_decl_of(session, ty) {
            if seen_decls.contains(&inner_decl) {
                continue;
            }
            seen_decls.push(inner_decl);
            frontier.extend(direct_inherited(session, inner_decl));
        }
    }
    out
}

fn direct_inherited(session: &Session, decl: DeclId) -> Vec<TypeId> {
    match &session.decls.get(decl).kind {
        DeclKind::Struct { inherited, .. }
        | DeclKind::Trait { inherited, .. }
        | DeclKind::TemplateStruct { inherited, .. }
        | DeclKind::TemplateTrait { inherited, .. } => inherited.clone(),
        _ => Vec::new(),
    }
}

fn nominal_decl_of(session: &Session, ty: TypeId) -> Option<DeclId> {
    match &session.types.get(ty).kind {
        TypeKind::Struct { decl }
        | TypeKind::Trait { decl }
        | TypeKind::Enum { decl }
        | TypeKind::Alias { decl }
        | TypeKind::TemplateStruct { decl, .. }
        | TypeKind::TemplateTrait { decl, .. } => Some(*decl),
        _ => None,
    }
}

/// `decl`'s inheritance closure also reachable through a `TemplateTypenameRef`
/// parameter's own constraint list (spec §4.4's subtype-check third clause).
pub fn typename_ref_closure(session: &Session, param: DeclId) -> Vec<TypeId> {
    if let DeclKind::TemplateParameter(p) = &session.decls.get(param).kind {
        let mut out = p.constraint_or_type.clone();
        let direct = out.clone();
        for ty in direct {
            if let Some(d) = nominal_decl_of(session, ty) {
                out.extend(inheritance_closure(session, d));
            }
        }
        out
    } else {
        Vec::new()
    }
}
