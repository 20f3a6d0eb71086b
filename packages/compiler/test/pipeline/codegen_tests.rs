//! Pass G (code generation) exercised against a recording mock of the
//! `Emitter` contract (spec §4.8) — no real SSA backend is in scope, so
//! these tests only assert on the shape of the emitter calls the driver
//! makes, not on any generated IR text.

use gulc_compiler::ast::decl::DeclId;
use gulc_compiler::codegen::emitter::{
    Emitter, FloatArith, FloatPredicate, IntArith, IntPredicate, IrType,
};
use gulc_compiler::compile_source;
use gulc_compiler::run_codegen;
use gulc_compiler::target::TargetDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block(u32);
impl gulc_compiler::codegen::emitter::BlockHandle for Block {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Value(u32);
impl gulc_compiler::codegen::emitter::ValueHandle for Value {}

/// Hands out a fresh, distinct handle per call and counts how many times
/// each driver-facing operation fired.
#[derive(Default)]
struct RecordingEmitter {
    next_id: u32,
    functions_declared: usize,
    globals_declared: usize,
    blocks_created: usize,
    calls_emitted: usize,
    rets_emitted: usize,
}

impl RecordingEmitter {
    fn fresh_value(&mut self) -> Value {
        let v = Value(self.next_id);
        self.next_id += 1;
        v
    }

    fn fresh_block(&mut self) -> Block {
        let b = Block(self.next_id);
        self.next_id += 1;
        b
    }
}

impl Emitter for RecordingEmitter {
    type Block = Block;
    type Value = Value;

    fn declare_function(&mut self, _decl: DeclId, _params: &[IrType], _ret: IrType) -> Value {
        self.functions_declared += 1;
        self.fresh_value()
    }
    fn declare_global(&mut self, _decl: DeclId, _ty: IrType, _initializer: Option<Value>) -> Value {
        self.globals_declared += 1;
        self.fresh_value()
    }
    fn get_param(&mut self, _function: Value, _index: u32) -> Value {
        self.fresh_value()
    }
    fn const_array(&mut self, _element_ty: IrType, _elements: &[Value]) -> Value {
        self.fresh_value()
    }
    fn create_block(&mut self, _label: &str) -> Block {
        self.blocks_created += 1;
        self.fresh_block()
    }
    fn set_insert_block(&mut self, _block: Block) {}
    fn create_alloca(&mut self, _ty: IrType) -> Value {
        self.fresh_value()
    }
    fn create_load(&mut self, _ptr: Value, _ty: IrType) -> Value {
        self.fresh_value()
    }
    fn create_store(&mut self, _ptr: Value, _value: Value) {}
    fn create_gep(&mut self, _ptr: Value, _byte_offset: u32) -> Value {
        self.fresh_value()
    }
    fn create_bitcast(&mut self, _value: Value, _to: IrType) -> Value {
        self.fresh_value()
    }
    fn create_call(&mut self, _callee: Value, _args: &[Value]) -> Value {
        self.calls_emitted += 1;
        self.fresh_value()
    }
    fn create_br(&mut self, _target: Block) {}
    fn create_cond_br(&mut self, _cond: Value, _then_block: Block, _else_block: Block) {}
    fn create_ret(&mut self, _value: Option<Value>) {
        self.rets_emitted += 1;
    }
    fn create_int_arith(&mut self, _op: IntArith, _lhs: Value, _rhs: Value) -> Value {
        self.fresh_value()
    }
    fn create_float_arith(&mut self, _op: FloatArith, _lhs: Value, _rhs: Value) -> Value {
        self.fresh_value()
    }
    fn create_int_compare(&mut self, _pred: IntPredicate, _lhs: Value, _rhs: Value) -> Value {
        self.fresh_value()
    }
    fn create_float_compare(&mut self, _pred: FloatPredicate, _lhs: Value, _rhs: Value) -> Value {
        self.fresh_value()
    }
    fn const_int(&mut self, _ty: IrType, _value: i64) -> Value {
        self.fresh_value()
    }
    fn const_float(&mut self, _ty: IrType, _value: f64) -> Value {
        self.fresh_value()
    }
}

#[test]
fn declares_every_top_level_function_before_lowering_any_body() {
    let (session, result) = compile_source(
        "t.gulc",
        r#"
        func add(a: i32, b: i32) -> i32 { return a + b; }
        func sub(a: i32, b: i32) -> i32 { return a - b; }
        "#,
    );
    result.unwrap();
    let target = TargetDescriptor::host_default();
    let mut emitter = RecordingEmitter::default();
    run_codegen(&session, &target, &mut emitter).unwrap();

    assert_eq!(emitter.functions_declared, 2);
    assert_eq!(emitter.rets_emitted, 2);
}

#[test]
fn a_function_call_lowers_to_exactly_one_create_call() {
    let (session, result) = compile_source(
        "t.gulc",
        r#"
        func double(x: i32) -> i32 { return x + x; }
        func run(x: i32) -> i32 { return double(x: x); }
        "#,
    );
    result.unwrap();
    let target = TargetDescriptor::host_default();
    let mut emitter = RecordingEmitter::default();
    run_codegen(&session, &target, &mut emitter).unwrap();

    assert_eq!(emitter.calls_emitted, 1);
}

#[test]
fn lowering_a_method_on_a_struct_declares_its_backing_layout_without_failing() {
    let (session, result) = compile_source(
        "t.gulc",
        r#"
        struct Point {
            var x: i32;
            var y: i32;
            func sum() -> i32 { return x + y; }
        }
        "#,
    );
    result.unwrap();
    let target = TargetDescriptor::host_default();
    let mut emitter = RecordingEmitter::default();
    run_codegen(&session, &target, &mut emitter).unwrap();

    assert_eq!(emitter.functions_declared, 1);
}
