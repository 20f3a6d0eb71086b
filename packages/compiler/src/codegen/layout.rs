//! Struct layout, vtable slot assignment, and size/alignment queries for
//! the code-gen driver (spec §4.8).
//!
//! Layouts are memoized per struct `DeclId` since a field of struct type
//! needs its pointee's layout, and the same nominal struct is referenced
//! from many sites across the resolved tree.

use crate::ast::decl::DeclKind;
use crate::ast::types::TypeKind;
use crate::ast::{DeclId, TypeId};
use crate::diagnostics::{CompileError, CompileResult, ErrorKind, Phase, SourceRange};
use crate::session::Session;
use crate::target::TargetDescriptor;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy)]
pub struct FieldLayout {
    pub member: DeclId,
    pub offset: u32,
    pub size: u32,
}

/// A struct's layout in both forms spec §4.8 calls for: the padded form
/// used when the struct is a standalone value, and the unpadded form used
/// when it's embedded as another struct's base (offset 0, no trailing
/// padding of its own).
#[derive(Debug, Clone)]
pub struct StructLayout {
    pub fields: Vec<FieldLayout>,
    pub unpadded_size: u32,
    pub size: u32,
    pub has_vtable: bool,
    pub vtable_slots: Vec<DeclId>,
}

#[derive(Default)]
pub struct LayoutCache {
    structs: IndexMap<DeclId, StructLayout>,
}

impl LayoutCache {
    pub fn get(&self, decl: DeclId) -> Option<&StructLayout> {
        self.structs.get(&decl)
    }

    /// Compute (and memoize) the layout of `decl`, recursing into any
    /// member whose type is itself a struct.
    pub fn layout_of(&mut self, session: &Session, target: &TargetDescriptor, decl: DeclId) -> CompileResult<&StructLayout> {
        if !self.structs.contains_key(&decl) {
            let layout = self.compute(session, target, decl)?;
            self.structs.insert(decl, layout);
        }
        Ok(self.structs.get(&decl).unwrap())
    }

    fn compute(&mut self, session: &Session, target: &TargetDescriptor, decl: DeclId) -> CompileResult<StructLayout> {
        let (members, vtable) = match &session.decls.get(decl).kind {
            DeclKind::Struct { members, vtable, .. } => (members.clone(), vtable.clone()),
            _ => return Err(internal(session.decls.get(decl).range, "layout requested for a non-struct declaration")),
        };

        let has_vtable = !vtable.is_empty();
        let mut offset: u32 = if has_vtable { target.pointer_size } else { 0 };
        let mut fields = Vec::new();

        for &m in &members {
            let ty = match &session.decls.get(m).kind {
                DeclKind::Variable { ty, .. } => *ty,
                _ => continue,
            };
            let size = self.size_of(session, target, ty)?;
            let align = size.min(target.alignof_struct).max(1);
            offset = align_up(offset, align);
            fields.push(FieldLayout { member: m, offset, size });
            offset += size;
        }

        let unpadded_size = offset;
        let size = align_up(unpadded_size, target.alignof_struct);
        Ok(StructLayout { fields, unpadded_size, size, has_vtable, vtable_slots: vtable })
    }

    /// The storage size of an arbitrary resolved type. Only reachable from
    /// the fully-resolved tree the driver operates on; an uninstantiated
    /// template or dangling placeholder reaching here is an internal error
    /// (spec §4.8's failure model).
    pub fn size_of(&mut self, session: &Session, target: &TargetDescriptor, ty: TypeId) -> CompileResult<u32> {
        match &session.types.get(ty).kind {
            TypeKind::Bool => Ok(1),
            TypeKind::BuiltIn(b) => Ok(b.size_bytes),
            TypeKind::Pointer { .. } | TypeKind::Reference { .. } | TypeKind::FunctionPointer { .. } => Ok(target.pointer_size),
            TypeKind::FlatArray { element, length_const } => {
                let elem_size = self.size_of(session, target, *element)?;
                let len = match length_const {
                    Some(crate::ast::types::ConstValue::Int(n)) => *n as u32,
                    _ => return Err(internal(SourceRange::zero(), "flat array length not folded before codegen")),
                };
                Ok(elem_size * len)
            }
            // A dimensioned array is represented as a fat pointer: data
            // pointer plus one length word per rank.
            TypeKind::Dimension { rank, .. } => Ok(target.pointer_size * (1 + rank)),
            TypeKind::Struct { decl } => Ok(self.layout_of(session, target, *decl)?.size),
            TypeKind::Enum { decl } => match &session.decls.get(*decl).kind {
                DeclKind::Enum { underlying: Some(u), .. } => self.size_of(session, target, *u),
                _ => Ok(4),
            },
            TypeKind::Alias { decl } => match &session.decls.get(*decl).kind {
                DeclKind::TypeAlias { aliased, .. } => self.size_of(session, target, *aliased),
                _ => Err(internal(SourceRange::zero(), "alias decl without an aliased type")),
            },
            other => Err(internal(SourceRange::zero(), format!("cannot size unresolved type kind: {other:?}"))),
        }
    }
}

fn align_up(offset: u32, align: u32) -> u32 {
    if align == 0 {
        return offset;
    }
    (offset + align - 1) / align * align
}

fn internal(range: SourceRange, msg: impl Into<String>) -> CompileError {
    CompileError::fatal(Phase::CodeGen, "<codegen>", range, ErrorKind::Internal(msg.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::decl::{Decl, Modifiers, StructKind, Visibility};
    use crate::ast::types::{BuiltIn, TypeNode};
    use crate::ident::Identifier;

    fn builtin(session: &mut Session, name: &'static str, size: u32) -> TypeId {
        session.types.alloc(TypeNode::new(TypeKind::BuiltIn(BuiltIn { name, size_bytes: size, signed: Some(true), floating: false })))
    }

    #[test]
    fn packs_fields_and_pads_to_struct_alignment() {
        let mut session = Session::new();
        let i8_ty = builtin(&mut session, "i8", 1);
        let i32_ty = builtin(&mut session, "i32", 4);
        let a = session.decls.alloc(Decl::new(
            DeclKind::Variable { name: Identifier::new("a", SourceRange::zero()), ty: i8_ty, initializer: None },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        let b = session.decls.alloc(Decl::new(
            DeclKind::Variable { name: Identifier::new("b", SourceRange::zero()), ty: i32_ty, initializer: None },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        let strct = session.decls.alloc(Decl::new(
            DeclKind::Struct {
                name: Identifier::new("Pair", SourceRange::zero()),
                kind: StructKind::Struct,
                inherited: vec![],
                members: vec![a, b],
                vtable: vec![],
                cached_copy_constructor: None,
                cached_move_constructor: None,
            },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));

        let target = TargetDescriptor::host_default();
        let mut cache = LayoutCache::default();
        let layout = cache.layout_of(&session, &target, strct).unwrap();
        assert_eq!(layout.fields[0].offset, 0);
        assert_eq!(layout.fields[1].offset, 4);
        assert_eq!(layout.unpadded_size, 8);
        assert_eq!(layout.size, 8);
    }

    #[test]
    fn reserves_leading_pointer_slot_when_struct_has_a_vtable() {
        let mut session = Session::new();
        let i32_ty = builtin(&mut session, "i32", 4);
        let f = session.decls.alloc(Decl::new(
            DeclKind::Variable { name: Identifier::new("f", SourceRange::zero()), ty: i32_ty, initializer: None },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));
        let method = session.decls.alloc(Decl::new(
            DeclKind::Function {
                name: Identifier::new("draw", SourceRange::zero()),
                sig: crate::ast::decl::FunctionSig { params: vec![], return_type: i32_ty, contracts: vec![], body: None },
            },
            Visibility::Public,
            Modifiers::VIRTUAL,
            SourceRange::zero(),
        ));
        let strct = session.decls.alloc(Decl::new(
            DeclKind::Struct {
                name: Identifier::new("Shape", SourceRange::zero()),
                kind: StructKind::Class,
                inherited: vec![],
                members: vec![f],
                vtable: vec![method],
                cached_copy_constructor: None,
                cached_move_constructor: None,
            },
            Visibility::Public,
            Modifiers::empty(),
            SourceRange::zero(),
        ));

        let target = TargetDescriptor::host_default();
        let mut cache = LayoutCache::default();
        let layout = cache.layout_of(&session, &target, strct).unwrap();
        assert!(layout.has_vtable);
        assert_eq!(layout.fields[0].offset, target.pointer_size);
    }
}
