//! The abstract SSA sink the driver emits against (spec §4.8's "Emitter
//! contract"). The driver never names a concrete backend; implementors
//! bridge these primitives to whatever SSA library sits underneath.

use crate::ast::decl::DeclId;

/// Opaque handle to a basic block, owned by the emitter implementation.
pub trait BlockHandle: Copy + Eq + std::fmt::Debug {}
/// Opaque handle to an SSA value, owned by the emitter implementation.
pub trait ValueHandle: Copy + Eq + std::fmt::Debug {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntPredicate {
    Eq,
    Ne,
    SignedLt,
    SignedLe,
    SignedGt,
    SignedGe,
    UnsignedLt,
    UnsignedLe,
    UnsignedGt,
    UnsignedGe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatPredicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntArith {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatArith {
    Add,
    Sub,
    Mul,
    Div,
}

/// A scalar IR type: just enough shape information for `alloca`/`load`/
/// `store`/`GEP` to pick the right width, never a nominal gulc type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrType {
    Int(u32),
    Float32,
    Float64,
    Ptr,
    Void,
    /// A fixed-length homogeneous aggregate — used only for the vtable
    /// global array (spec §4.8's vtable layout), never for a surface
    /// gulc array type (those are handled by `FlatArray`/`Dimension`
    /// lowering to `Ptr`/struct fields instead).
    Array(Box<IrType>, u32),
}

/// The driver's only interface to a code-generation backend (spec §4.8).
/// A function-scoped sequence: `declareFunction` precedes the blocks of
/// that function's body; `declareGlobal` can happen at any point.
pub trait Emitter {
    type Block: BlockHandle;
    type Value: ValueHandle;

    fn declare_function(&mut self, decl: DeclId, params: &[IrType], ret: IrType) -> Self::Value;
    fn declare_global(&mut self, decl: DeclId, ty: IrType, initializer: Option<Self::Value>) -> Self::Value;

    /// The SSA value bound to `function`'s `index`th incoming argument.
    /// Taking the function handle explicitly (rather than an implicit
    /// "current function") lets the driver declare every function's
    /// prototype in one forward-reference-safe pass before defining any
    /// body, which vtable-array construction and mutually-recursive calls
    /// both depend on. `sret` and `self`, when present, occupy index 0
    /// ahead of the declared parameter list (spec §4.8).
    fn get_param(&mut self, function: Self::Value, index: u32) -> Self::Value;

    /// A constant array value built from already-materialized element
    /// values, used for the vtable global's initializer (spec §4.8).
    fn const_array(&mut self, element_ty: IrType, elements: &[Self::Value]) -> Self::Value;

    fn create_block(&mut self, label: &str) -> Self::Block;
    fn set_insert_block(&mut self, block: Self::Block);

    fn create_alloca(&mut self, ty: IrType) -> Self::Value;
    fn create_load(&mut self, ptr: Self::Value, ty: IrType) -> Self::Value;
    fn create_store(&mut self, ptr: Self::Value, value: Self::Value);
    fn create_gep(&mut self, ptr: Self::Value, byte_offset: u32) -> Self::Value;
    fn create_bitcast(&mut self, value: Self::Value, to: IrType) -> Self::Value;

    fn create_call(&mut self, callee: Self::Value, args: &[Self::Value]) -> Self::Value;

    fn create_br(&mut self, target: Self::Block);
    fn create_cond_br(&mut self, cond: Self::Value, then_block: Self::Block, else_block: Self::Block);
    fn create_ret(&mut self, value: Option<Self::Value>);

    fn create_int_arith(&mut self, op: IntArith, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
    fn create_float_arith(&mut self, op: FloatArith, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
    fn create_int_compare(&mut self, pred: IntPredicate, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
    fn create_float_compare(&mut self, pred: FloatPredicate, lhs: Self::Value, rhs: Self::Value) -> Self::Value;

    fn const_int(&mut self, ty: IrType, value: i64) -> Self::Value;
    fn const_float(&mut self, ty: IrType, value: f64) -> Self::Value;
}
