//! The `Expr` algebraic family (spec §3), including the semantic node
//! kinds introduced by later passes (`SolvedConst`, `ImplicitCast`, ...).

use crate::arena::Id;
use crate::ast::decl::DeclId;
use crate::ast::types::{ArgTuple, ConstValue, TypeId};
use crate::diagnostics::SourceRange;
use crate::ident::Identifier;
use serde::{Deserialize, Serialize};

pub type ExprId = Id<Expr>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add, Sub, Mul, Div, Rem,
    BitAnd, BitOr, BitXor, Shl, Shr,
    Eq, Ne, Lt, Le, Gt, Ge,
    LogAnd, LogOr,
    Assign,
    AddAssign, SubAssign, MulAssign, DivAssign, RemAssign,
    AndAssign, OrAssign, XorAssign, ShlAssign, ShrAssign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrefixOp {
    Neg, Not, BitNot, PreInc, PreDec, Deref, AddrOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostfixOp {
    PostInc, PostDec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Literal {
    Integer { text: String, suffix: Option<Identifier> },
    Float { text: String, suffix: Option<Identifier> },
    Char(char),
    String(String),
}

/// The required-shape RHS of a `has` expression (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HasClause {
    Trait(TypeId),
    Init { params: Vec<TypeId> },
    Deinit { virtual_required: bool },
    Case { name: Identifier },
    Var { name: Identifier, ty: TypeId },
    Property { name: Identifier, ty: TypeId, needs_get: bool, needs_set: bool },
    Subscript { params: Vec<TypeId>, ret: TypeId, needs_get: bool, needs_set: bool },
    Func { name: Identifier, params: Vec<TypeId> },
    Operator { symbol: String, params: Vec<TypeId> },
    Call { params: Vec<TypeId> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledArgument {
    pub label: Option<Identifier>,
    pub value: ExprId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    // --- syntactic ---
    Literal(Literal),
    Identifier { name: Identifier, template_args: ArgTuple },
    Binary { op: BinOp, lhs: ExprId, rhs: ExprId },
    Prefix { op: PrefixOp, operand: ExprId },
    Postfix { op: PostfixOp, operand: ExprId },
    Ternary { cond: ExprId, then_expr: ExprId, else_expr: ExprId },
    Paren(ExprId),
    As { value: ExprId, ty: TypeId },
    Is { value: ExprId, ty: TypeId },
    Has { value: ExprId, clause: HasClause },
    Member { base: ExprId, name: Identifier, is_arrow: bool },
    FunctionCall { callee: ExprId, args: Vec<LabeledArgument> },
    SubscriptCall { base: ExprId, args: Vec<LabeledArgument> },
    ArrayLiteral(Vec<ExprId>),
    LabeledArgument(Box<LabeledArgument>),
    VariableDecl { decl: DeclId },

    // --- semantic, introduced by later passes ---
    SolvedConst(ConstValue),
    ImplicitCast { value: ExprId, to: TypeId },
    ImplicitDeref(ExprId),
    LValueToRValue(ExprId),
    RValueToInRef(ExprId),
    ConstructorCall { constructor: DeclId, args: Vec<ExprId> },
    DestructorCall { destructor: DeclId, target: ExprId },
    TemporaryValueRef { temporary: DeclId },
    StoreTemporaryValue { temporary: DeclId, value: ExprId },
    VTableFunctionReference { slot: usize, function: DeclId },
    /// A resolved call target that does not need vtable indirection — the
    /// direct-dispatch counterpart of `VTableFunctionReference` (spec §4.7
    /// overload resolution always picks one or the other).
    StaticFunctionReference(DeclId),
    MemberVariableRef { base: ExprId, member: DeclId },
    MemberPropertyRef { base: ExprId, property: DeclId },
    MemberSubscriptOperatorRef { base: ExprId, subscript: DeclId, args: Vec<ExprId> },
    LocalVariableRef(DeclId),
    ParameterRef(DeclId),
    CurrentSelf,
    EnumConstRef(DeclId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub range: SourceRange,
    /// Set by pass S (spec invariant "every call-shape expression carries
    /// a `valueType`"); `None` before S runs.
    pub value_type: Option<TypeId>,
    /// Whether this expression denotes a storage location, independent of
    /// the type's own `mut`/`immut` qualifier (spec §3).
    pub is_lvalue: bool,
}

impl Expr {
    pub fn new(kind: ExprKind, range: SourceRange) -> Self {
        Expr { kind, range, value_type: None, is_lvalue: false }
    }
}
