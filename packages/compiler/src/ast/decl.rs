//! The `Decl` algebraic family (spec §3, §4.3).

use crate::arena::Id;
use crate::ast::contract::ContId;
use crate::ast::expr::ExprId;
use crate::ast::stmt::StmtId;
use crate::ast::types::{ArgTuple, TypeId};
use crate::diagnostics::SourceRange;
use crate::ident::Identifier;
use bitflags::bitflags;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub type DeclId = Id<Decl>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
    Protected,
    Internal,
    ProtectedInternal,
    Unassigned,
}

bitflags! {
    /// Declaration modifiers (spec §3). `isConstExpr` is logically a
    /// modifier and lives in this bit-set too, per the spec's own note.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Modifiers: u16 {
        const STATIC      = 1 << 0;
        const EXTERN      = 1 << 1;
        const MUT         = 1 << 2;
        const VOLATILE    = 1 << 3;
        const ABSTRACT    = 1 << 4;
        const VIRTUAL     = 1 << 5;
        const OVERRIDE    = 1 << 6;
        const PROTOTYPE   = 1 << 7;
        const CONST_EXPR  = 1 << 8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructKind {
    Struct,
    Class,
    Union,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Val,
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstructorKind {
    Normal,
    Copy,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateParamKind {
    Typename,
    ConstValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: Identifier,
    pub label: Option<Identifier>,
    pub kind: ParamKind,
    pub ty: TypeId,
    pub default_value: Option<ExprId>,
}

/// A function/operator/constructor body. `None` marks a prototype
/// declaration (trait member, `extern` decl) per the GLOSSARY.
pub type Body = Option<StmtId>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSig {
    pub params: Vec<Parameter>,
    pub return_type: TypeId,
    pub contracts: Vec<ContId>,
    pub body: Body,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateParam {
    pub name: Identifier,
    pub kind: TemplateParamKind,
    /// For a `typename` parameter, the `T: Trait` constraint list; for a
    /// `const` parameter, its declared type.
    pub constraint_or_type: Vec<TypeId>,
}

/// `templateInstantiations : Map<ArgTuple, Decl>` — keyed by the canonical
/// argument tuple, insertion-ordered so diagnostics referencing "the Nth
/// instantiation of X" stay stable across runs (spec §5's memoization
/// discipline; `IndexMap` usage grounded in the teacher's namespace/member
/// tables, see DESIGN.md).
pub type InstantiationCache = IndexMap<ArgTuple, DeclId>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeclKind {
    Namespace { name: Identifier, members: Vec<DeclId> },
    Import { path: Vec<Identifier>, alias: Option<Identifier>, resolved: Option<DeclId> },

    Struct {
        name: Identifier,
        kind: StructKind,
        inherited: Vec<TypeId>,
        members: Vec<DeclId>,
        vtable: Vec<DeclId>,
        cached_copy_constructor: Option<DeclId>,
        cached_move_constructor: Option<DeclId>,
    },
    Trait { name: Identifier, inherited: Vec<TypeId>, members: Vec<DeclId> },
    Enum { name: Identifier, underlying: Option<TypeId>, consts: Vec<DeclId> },
    EnumConst { name: Identifier, value: Option<ExprId> },

    Function { name: Identifier, sig: FunctionSig },
    Operator { fix: OperatorFixity, symbol: String, sig: FunctionSig },
    CallOperator { sig: FunctionSig },
    SubscriptOperator { params: Vec<Parameter>, element_type: TypeId, getter: Option<DeclId>, setter: Option<DeclId> },
    Property { name: Identifier, ty: TypeId, getter: Option<DeclId>, setter: Option<DeclId> },
    Getter { is_ref: bool, is_ref_mut: bool, body: Body },
    Setter { body: Body },

    Constructor { sub_kind: ConstructorKind, sig: FunctionSig, base_init: Option<ExprId> },
    Destructor { body: Body },

    Variable { name: Identifier, ty: TypeId, initializer: Option<ExprId> },
    Parameter(Parameter),

    TemplateParameter(TemplateParam),

    TemplateFunction { name: Identifier, params: Vec<DeclId>, sig: FunctionSig, instantiations: InstantiationCache },
    TemplateStruct {
        name: Identifier,
        params: Vec<DeclId>,
        kind: StructKind,
        inherited: Vec<TypeId>,
        members: Vec<DeclId>,
        /// `where` contracts checked against an argument tuple before an
        /// instantiation is accepted (spec §4.5 step 5, §4.7).
        where_conts: Vec<ContId>,
        instantiations: InstantiationCache,
    },
    TemplateTrait {
        name: Identifier,
        params: Vec<DeclId>,
        inherited: Vec<TypeId>,
        members: Vec<DeclId>,
        where_conts: Vec<ContId>,
        instantiations: InstantiationCache,
    },

    /// A materialized instantiation; `original_decl` on its `Decl` points
    /// back at the generic it was cloned from (spec §3).
    TemplateXInst { args: ArgTuple, body_decl: DeclId },

    Extension { target: TypeId, members: Vec<DeclId> },
    TypeAlias { name: Identifier, params: Vec<DeclId>, aliased: TypeId, is_prefix: bool },
    TypeSuffix { name: Identifier, params: Vec<Parameter>, return_type: TypeId, body: Body },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorFixity {
    Prefix,
    Infix,
    Postfix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decl {
    pub kind: DeclKind,
    pub visibility: Visibility,
    pub modifiers: Modifiers,
    pub container: Option<DeclId>,
    pub contained_in_template: bool,
    pub container_template_type: Option<TypeId>,
    pub original_decl: Option<DeclId>,
    pub range: SourceRange,
}

impl Decl {
    pub fn new(kind: DeclKind, visibility: Visibility, modifiers: Modifiers, range: SourceRange) -> Self {
        Decl {
            kind,
            visibility,
            modifiers,
            container: None,
            contained_in_template: false,
            container_template_type: None,
            original_decl: None,
            range,
        }
    }

    pub fn is_const_expr(&self) -> bool {
        self.modifiers.contains(Modifiers::CONST_EXPR)
    }

    pub fn name(&self) -> Option<&Identifier> {
        match &self.kind {
            DeclKind::Namespace { name, .. }
            | DeclKind::Struct { name, .. }
            | DeclKind::Trait { name, .. }
            | DeclKind::Enum { name, .. }
            | DeclKind::EnumConst { name, .. }
            | DeclKind::Function { name, .. }
            | DeclKind::Property { name, .. }
            | DeclKind::Variable { name, .. }
            | DeclKind::TemplateFunction { name, .. }
            | DeclKind::TemplateStruct { name, .. }
            | DeclKind::TemplateTrait { name, .. }
            | DeclKind::TypeAlias { name, .. }
            | DeclKind::TypeSuffix { name, .. } => Some(name),
            DeclKind::TemplateParameter(p) => Some(&p.name),
            DeclKind::Parameter(p) => Some(&p.name),
            _ => None,
        }
    }

    /// Members owned directly by this declaration, used by the "walk each
    /// decl's owned members" step of type resolution (spec §4.4 step 3).
    pub fn members(&self) -> &[DeclId] {
        match &self.kind {
            DeclKind::Namespace { members, .. }
            | DeclKind::Struct { members, .. }
            | DeclKind::Trait { members, .. }
            | DeclKind::TemplateStruct { members, .. }
            | DeclKind::TemplateTrait { members, .. }
            | DeclKind::Extension { members, .. } => members,
            DeclKind::Enum { consts, .. } => consts,
            _ => &[],
        }
    }

    pub fn is_template(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::TemplateFunction { .. } | DeclKind::TemplateStruct { .. } | DeclKind::TemplateTrait { .. }
        )
    }
}
