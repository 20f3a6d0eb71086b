//! Pass I (template instantiation) exercised through the full pipeline:
//! a concrete type argument on a template struct reference must produce a
//! fresh member whose declared type is the substituted argument, and a
//! `where` clause must reject an argument that fails it.

use gulc_compiler::ast::decl::DeclKind;
use gulc_compiler::ast::types::TypeKind;
use gulc_compiler::compile_source;
use gulc_compiler::diagnostics::ErrorKind;

#[test]
fn instantiating_a_template_struct_substitutes_the_concrete_argument() {
    let (session, result) = compile_source(
        "t.gulc",
        r#"
        struct Box<T> {
            var value: T;
        }
        var b: Box<i32>;
        "#,
    );
    assert!(result.is_ok(), "expected Ok, got {result:?}");

    let found = session.decls.iter().any(|(_, decl)| match &decl.kind {
        DeclKind::Variable { name, ty, .. } if name.name == "value" => {
            matches!(&session.types.get(*ty).kind, TypeKind::BuiltIn(b) if b.name == "i32")
        }
        _ => false,
    });
    assert!(found, "expected an instantiated `value: i32` member");
}

#[test]
fn a_where_clause_rejects_an_argument_that_does_not_satisfy_it() {
    let (_session, result) = compile_source(
        "t.gulc",
        r#"
        trait Drawable {}
        struct Box<T> where T is Drawable {
            var value: T;
        }
        struct Rock {}
        var b: Box<Rock>;
        "#,
    );
    assert!(matches!(&result, Err(e) if matches!(e.kind, ErrorKind::WhereClauseUnsatisfied(_))), "got {result:?}");
}

#[test]
fn a_where_clause_accepts_an_argument_that_satisfies_it() {
    let (_session, result) = compile_source(
        "t.gulc",
        r#"
        trait Drawable {}
        struct Box<T> where T is Drawable {
            var value: T;
        }
        struct Widget: Drawable {}
        var b: Box<Widget>;
        "#,
    );
    assert!(result.is_ok(), "expected Ok, got {result:?}");
}
