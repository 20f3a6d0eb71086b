//! Pass C (contract solving) as `const_eval` sees it: a `has` expression
//! folds to a boolean once its LHS value's type is known, the same path
//! `template_instantiator`'s `where`-clause check and general constant
//! folding both rely on (spec §4.7).

use gulc_compiler::ast::decl::{ConstructorKind, Decl, DeclKind, FunctionSig, Modifiers, Parameter, ParamKind, StructKind, Visibility};
use gulc_compiler::ast::expr::{Expr, ExprKind, HasClause};
use gulc_compiler::ast::types::{BuiltIn, ConstValue, TypeKind, TypeNode};
use gulc_compiler::const_eval::{self, ConstEnv};
use gulc_compiler::diagnostics::SourceRange;
use gulc_compiler::ident::Identifier;
use gulc_compiler::session::Session;

fn i32_ty(session: &mut Session) -> gulc_compiler::ast::TypeId {
    session.types.alloc(TypeNode::new(TypeKind::BuiltIn(BuiltIn { name: "i32", size_bytes: 4, signed: Some(true), floating: false })))
}

#[test]
fn a_has_init_clause_folds_to_true_through_const_eval() {
    let mut session = Session::new();
    let i32_ty = i32_ty(&mut session);
    let sig = FunctionSig {
        params: vec![Parameter { name: Identifier::new("x", SourceRange::zero()), label: None, kind: ParamKind::Val, ty: i32_ty, default_value: None }],
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

    let mut value = Expr::new(ExprKind::LocalVariableRef(strct), SourceRange::zero());
    value.value_type = Some(strct_ty);
    let value = session.exprs.alloc(value);

    let has = session.exprs.alloc(Expr::new(
        ExprKind::Has { value, clause: HasClause::Init { params: vec![i32_ty] } },
        SourceRange::zero(),
    ));
    assert_eq!(const_eval::eval(&session, has, &ConstEnv::new()), Some(ConstValue::Bool(true)));

    let no_match = session.exprs.alloc(Expr::new(
        ExprKind::Has { value, clause: HasClause::Init { params: vec![] } },
        SourceRange::zero(),
    ));
    assert_eq!(const_eval::eval(&session, no_match, &ConstEnv::new()), Some(ConstValue::Bool(false)));
}

#[test]
fn a_has_expression_with_no_value_type_yet_fails_to_fold() {
    // `eval` has no diagnostic channel; a `has` whose LHS hasn't been typed
    // yet (e.g. still inside an uninstantiated template body) just declines
    // to fold rather than panicking or raising.
    let mut session = Session::new();
    let value = session.exprs.alloc(Expr::new(ExprKind::LocalVariableRef(gulc_compiler::ast::DeclId::from_index(0)), SourceRange::zero()));
    let has = session.exprs.alloc(Expr::new(
        ExprKind::Has { value, clause: HasClause::Deinit { virtual_required: false } },
        SourceRange::zero(),
    ));
    assert_eq!(const_eval::eval(&session, has, &ConstEnv::new()), None);
}
