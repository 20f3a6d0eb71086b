//! Constant folding, grounded on `original_source/src/utilities/
//! ConstSolver.cpp` and `ConstExprHelper.cpp` (see `SPEC_FULL.md` §E).
//!
//! Used wherever the spec requires a compile-time constant: template
//! `const` arguments, `FlatArray` lengths, and the folding of `HasExpr`
//! into `SolvedConstExpr(BoolLiteral)` (spec §4.7).

use crate::ast::decl::DeclId;
use crate::ast::expr::{BinOp, ExprKind, Literal, PrefixOp};
use crate::ast::types::ConstValue;
use crate::ast::ExprId;
use crate::diagnostics::SourceRange;
use crate::passes::contract_solver;
use crate::session::Session;
use std::collections::HashMap;

pub type ConstEnv = HashMap<DeclId, ConstValue>;

pub fn eval(session: &Session, expr: ExprId, env: &ConstEnv) -> Option<ConstValue> {
    let node = session.exprs.get(expr);
    match &node.kind {
        ExprKind::SolvedConst(v) => Some(v.clone()),
        ExprKind::Paren(inner) => eval(session, *inner, env),
        ExprKind::Literal(lit) => eval_literal(lit),
        ExprKind::Prefix { op, operand } => {
            let v = eval(session, *operand, env)?;
            eval_prefix(*op, v)
        }
        ExprKind::Binary { op, lhs, rhs } => eval_binary(session, *op, *lhs, *rhs, env),
        ExprKind::Ternary { cond, then_expr, else_expr } => match eval(session, *cond, env)? {
            ConstValue::Bool(true) => eval(session, *then_expr, env),
            ConstValue::Bool(false) => eval(session, *else_expr, env),
            _ => None,
        },
        ExprKind::LocalVariableRef(decl) | ExprKind::ParameterRef(decl) => env.get(decl).cloned(),
        ExprKind::Has { value, clause } => {
            let value_ty = session.exprs.get(*value).value_type?;
            // `eval` has no diagnostic channel of its own (spec §4.7's fold
            // is used speculatively, e.g. before an instantiation settles);
            // a `has` on a still-uninstantiated template just fails to fold
            // this round rather than raising here.
            contract_solver::eval_has(session, "<const-eval>", SourceRange::zero(), value_ty, clause)
                .ok()
                .map(ConstValue::Bool)
        }
        _ => None,
    }
}

fn eval_literal(lit: &Literal) -> Option<ConstValue> {
    match lit {
        Literal::Integer { text, .. } => text.parse::<i64>().ok().map(ConstValue::Int),
        Literal::Float { text, .. } => text.parse::<f64>().ok().map(ConstValue::Float),
        Literal::Char(c) => Some(ConstValue::Int(*c as i64)),
        Literal::String(s) => Some(ConstValue::String(s.clone())),
    }
}

fn eval_prefix(op: PrefixOp, v: ConstValue) -> Option<ConstValue> {
    match (op, v) {
        (PrefixOp::Neg, ConstValue::Int(i)) => Some(ConstValue::Int(-i)),
        (PrefixOp::Neg, ConstValue::Float(f)) => Some(ConstValue::Float(-f)),
        (PrefixOp::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
        (PrefixOp::BitNot, ConstValue::Int(i)) => Some(ConstValue::Int(!i)),
        _ => None,
    }
}

fn eval_binary(session: &Session, op: BinOp, lhs: ExprId, rhs: ExprId, env: &ConstEnv) -> Option<ConstValue> {
    // Short-circuit && / || before evaluating the right operand, matching
    // the original ConstSolver's short-circuit handling.
    if op == BinOp::LogAnd {
        return match eval(session, lhs, env)? {
            ConstValue::Bool(false) => Some(ConstValue::Bool(false)),
            ConstValue::Bool(true) => eval(session, rhs, env),
            _ => None,
        };
    }
    if op == BinOp::LogOr {
        return match eval(session, lhs, env)? {
            ConstValue::Bool(true) => Some(ConstValue::Bool(true)),
            ConstValue::Bool(false) => eval(session, rhs, env),
            _ => None,
        };
    }

    let l = eval(session, lhs, env)?;
    let r = eval(session, rhs, env)?;
    fold(op, l, r)
}

fn fold(op: BinOp, l: ConstValue, r: ConstValue) -> Option<ConstValue> {
    use ConstValue::*;
    match (l, r) {
        (Int(a), Int(b)) => match op {
            BinOp::Add => Some(Int(a.wrapping_add(b))),
            BinOp::Sub => Some(Int(a.wrapping_sub(b))),
            BinOp::Mul => Some(Int(a.wrapping_mul(b))),
            BinOp::Div if b != 0 => Some(Int(a / b)),
            BinOp::Rem if b != 0 => Some(Int(a % b)),
            BinOp::BitAnd => Some(Int(a & b)),
            BinOp::BitOr => Some(Int(a | b)),
            BinOp::BitXor => Some(Int(a ^ b)),
            BinOp::Shl => Some(Int(a.wrapping_shl(b as u32))),
            BinOp::Shr => Some(Int(a.wrapping_shr(b as u32))),
            BinOp::Eq => Some(Bool(a == b)),
            BinOp::Ne => Some(Bool(a != b)),
            BinOp::Lt => Some(Bool(a < b)),
            BinOp::Le => Some(Bool(a <= b)),
            BinOp::Gt => Some(Bool(a > b)),
            BinOp::Ge => Some(Bool(a >= b)),
            _ => None,
        },
        (Float(a), Float(b)) => match op {
            BinOp::Add => Some(Float(a + b)),
            BinOp::Sub => Some(Float(a - b)),
            BinOp::Mul => Some(Float(a * b)),
            BinOp::Div => Some(Float(a / b)),
            BinOp::Eq => Some(Bool(a == b)),
            BinOp::Ne => Some(Bool(a != b)),
            BinOp::Lt => Some(Bool(a < b)),
            BinOp::Le => Some(Bool(a <= b)),
            BinOp::Gt => Some(Bool(a > b)),
            BinOp::Ge => Some(Bool(a >= b)),
            _ => None,
        },
        (Bool(a), Bool(b)) => match op {
            BinOp::Eq => Some(Bool(a == b)),
            BinOp::Ne => Some(Bool(a != b)),
            _ => None,
        },
        (String(a), String(b)) => match op {
            BinOp::Add => Some(String(a + &b)),
            BinOp::Eq => Some(Bool(a == b)),
            BinOp::Ne => Some(Bool(a != b)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::SourceRange;

    fn lit_int(session: &mut Session, text: &str) -> ExprId {
        session.exprs.alloc(crate::ast::Expr::new(
            ExprKind::Literal(Literal::Integer { text: text.into(), suffix: None }),
            SourceRange::zero(),
        ))
    }

    #[test]
    fn folds_integer_arithmetic() {
        let mut session = Session::new();
        let a = lit_int(&mut session, "2");
        let b = lit_int(&mut session, "3");
        let sum = session.exprs.alloc(crate::ast::Expr::new(
            ExprKind::Binary { op: BinOp::Add, lhs: a, rhs: b },
            SourceRange::zero(),
        ));
        assert_eq!(eval(&session, sum, &ConstEnv::new()), Some(ConstValue::Int(5)));
    }

    #[test]
    fn short_circuits_logical_and() {
        let mut session = Session::new();
        let f = session.exprs.alloc(crate::ast::Expr::new(
            ExprKind::SolvedConst(ConstValue::Bool(false)),
            SourceRange::zero(),
        ));
        // rhs references an undefined variable; division-by-zero-style
        // poison that must never be evaluated once lhs is `false`.
        let bogus = session.exprs.alloc(crate::ast::Expr::new(
            ExprKind::LocalVariableRef(DeclId::from_index(9999)),
            SourceRange::zero(),
        ));
        let and = session.exprs.alloc(crate::ast::Expr::new(
            ExprKind::Binary { op: BinOp::LogAnd, lhs: f, rhs: bogus },
            SourceRange::zero(),
        ));
        assert_eq!(eval(&session, and, &ConstEnv::new()), Some(ConstValue::Bool(false)));
    }
}
