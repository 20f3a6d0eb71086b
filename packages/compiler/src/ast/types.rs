//! The `Type` algebraic family (spec §3, §4.4).

use crate::arena::Id;
use crate::ast::decl::DeclId;
use crate::ident::Identifier;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub type TypeId = Id<TypeNode>;

/// `Unassigned` means "inherit from context"; `Mut`/`Immut` never compose
/// (the parser rejects `mut immut` before this type even exists).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Qualifier {
    Unassigned,
    Mut,
    Immut,
}

impl Qualifier {
    /// Resolve an `Unassigned` qualifier against an enclosing context,
    /// used wherever spec §3 says "inherit from context".
    pub fn or_inherit(self, context: Qualifier) -> Qualifier {
        match self {
            Qualifier::Unassigned => context,
            q => q,
        }
    }
}

/// A small vector of template arguments — argument tuples are rarely larger
/// than a handful of parameters (spec §4.5's `ArgTuple`).
pub type ArgTuple = SmallVec<[TemplateArg; 4]>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TemplateArg {
    Type(TypeId),
    Const(ConstValue),
}

/// A folded constant value, produced by `const_eval` (spec §4.7/§5 and the
/// `original_source/ConstSolver` grounding noted in SPEC_FULL.md §E).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl PartialEq for ConstValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConstValue::Bool(a), ConstValue::Bool(b)) => a == b,
            (ConstValue::Int(a), ConstValue::Int(b)) => a == b,
            (ConstValue::Float(a), ConstValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ConstValue::String(a), ConstValue::String(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for ConstValue {}

/// Hashes in lockstep with the `PartialEq` above — `Float` by bit pattern,
/// so an `ArgTuple` carrying a `ConstValue::Float` can still key the
/// per-generic instantiation cache (spec §4.5 step 2).
impl std::hash::Hash for ConstValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ConstValue::Bool(b) => b.hash(state),
            ConstValue::Int(i) => i.hash(state),
            ConstValue::Float(f) => f.to_bits().hash(state),
            ConstValue::String(s) => s.hash(state),
        }
    }
}

impl PartialEq for TemplateArg {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TemplateArg::Type(a), TemplateArg::Type(b)) => a == b,
            (TemplateArg::Const(a), TemplateArg::Const(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for TemplateArg {}

impl std::hash::Hash for TemplateArg {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            TemplateArg::Type(t) => t.hash(state),
            TemplateArg::Const(c) => c.hash(state),
        }
    }
}

/// Canonical key for the template-instantiation memo (spec §4.5 step 2,
/// §5: "each generic declaration owns a map from canonical argument-tuple
/// to instantiated decl").
pub type CanonicalArgTuple = ArgTuple;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltIn {
    pub name: &'static str,
    pub size_bytes: u32,
    pub signed: Option<bool>,
    pub floating: bool,
}

// `name` is `&'static str`, which the normal derive can't produce from
// borrowed/owned deserializer input; resolve the deserialized name against
// the canonical `BUILTIN_NAMES` table to recover a `'static` reference.
impl<'de> serde::Deserialize<'de> for BuiltIn {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct BuiltInOwned {
            name: String,
            size_bytes: u32,
            signed: Option<bool>,
            floating: bool,
        }
        let owned = BuiltInOwned::deserialize(deserializer)?;
        let static_name = BUILTIN_NAMES
            .iter()
            .find(|(n, ..)| *n == owned.name)
            .map(|(n, ..)| *n)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown builtin type name: {}", owned.name)))?;
        Ok(BuiltIn {
            name: static_name,
            size_bytes: owned.size_bytes,
            signed: owned.signed,
            floating: owned.floating,
        })
    }
}

/// A `Templated{candidates, args}` unresolved-overload placeholder: the
/// type resolver found one or more template declarations but couldn't
/// immediately pick one (spec §4.4's "packaged into a `Templated` ...
/// placeholder, deferred for S").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatedCandidates {
    pub candidates: Vec<DeclId>,
    pub args: ArgTuple,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeKind {
    // --- Primitive ---
    Bool,
    BuiltIn(BuiltIn),

    // --- Compound ---
    Pointer { inner: TypeId },
    Reference { inner: TypeId },
    FlatArray { element: TypeId, length_const: Option<ConstValue> },
    Dimension { inner: TypeId, rank: u32 },
    FunctionPointer { params: Vec<TypeId>, return_type: TypeId },

    // --- Nominal ---
    Struct { decl: DeclId },
    Trait { decl: DeclId },
    Enum { decl: DeclId },
    Alias { decl: DeclId },

    // --- Template ---
    TemplateStruct { decl: DeclId, args: ArgTuple },
    TemplateTrait { decl: DeclId, args: ArgTuple },
    Templated(TemplatedCandidates),
    TemplateTypenameRef { param: DeclId },

    // --- Relational ---
    Dependent { container_template: TypeId, inner: TypeId },
    UnresolvedNested { container: TypeId, name: Identifier, args: ArgTuple },
    SelfType,
    Unresolved { path: Vec<Identifier>, name: Identifier, args: ArgTuple },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeNode {
    pub kind: TypeKind,
    pub qualifier: Qualifier,
}

impl TypeNode {
    pub fn new(kind: TypeKind) -> Self {
        TypeNode { kind, qualifier: Qualifier::Unassigned }
    }

    pub fn with_qualifier(kind: TypeKind, qualifier: Qualifier) -> Self {
        TypeNode { kind, qualifier }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(
            self.kind,
            TypeKind::Unresolved { .. } | TypeKind::UnresolvedNested { .. }
        )
    }

    pub fn is_nominal(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Struct { .. }
                | TypeKind::Trait { .. }
                | TypeKind::Enum { .. }
                | TypeKind::TemplateStruct { .. }
                | TypeKind::TemplateTrait { .. }
        )
    }
}

pub const BUILTIN_NAMES: &[(&str, u32, Option<bool>, bool)] = &[
    ("i8", 1, Some(true), false),
    ("i16", 2, Some(true), false),
    ("i32", 4, Some(true), false),
    ("i64", 8, Some(true), false),
    ("u8", 1, Some(false), false),
    ("u16", 2, Some(false), false),
    ("u32", 4, Some(false), false),
    ("u64", 8, Some(false), false),
    ("f16", 2, None, true),
    ("f32", 4, None, true),
    ("f64", 8, None, true),
    ("void", 0, None, false),
];

pub fn lookup_builtin(name: &str) -> Option<TypeKind> {
    if name == "bool" {
        return Some(TypeKind::Bool);
    }
    BUILTIN_NAMES.iter().find(|(n, ..)| *n == name).map(|(n, size, signed, floating)| {
        TypeKind::BuiltIn(BuiltIn { name: n, size_bytes: *size, signed: *signed, floating: *floating })
    })
}
