//! Parser declaration-form coverage (spec §4.2) beyond what
//! `parser::mod`'s own unit tests already exercise: `class`/`trait`/`enum`/
//! `extension`, operator/call/subscript/property members, `init`/`deinit`,
//! `typealias`, and modifier combinations on top-level declarations.

use gulc_compiler::ast::decl::{DeclKind, Modifiers, Visibility};
use gulc_compiler::ast::DeclId;
use gulc_compiler::parser::Parser;
use gulc_compiler::session::Session;

fn parse_one_decl(src: &str) -> (Session, DeclId) {
    let mut session = Session::new();
    let file;
    {
        let parser = Parser::new(src, "t.gulc", &mut session);
        file = parser.parse_file().unwrap();
    }
    let id = file.top_level[0];
    (session, id)
}

#[test]
fn parses_a_class_with_an_inherited_type() {
    let (session, id) = parse_one_decl("class Button : View {}");
    match &session.decls.get(id).kind {
        DeclKind::Struct { name, inherited, .. } => {
            assert_eq!(name.name, "Button");
            assert_eq!(inherited.len(), 1);
        }
        other => panic!("expected class, got {other:?}"),
    }
}

#[test]
fn parses_a_trait_with_a_member_function() {
    let (session, id) = parse_one_decl("trait Drawable { func draw(); }");
    match &session.decls.get(id).kind {
        DeclKind::Trait { name, members, .. } => {
            assert_eq!(name.name, "Drawable");
            assert_eq!(members.len(), 1);
        }
        other => panic!("expected trait, got {other:?}"),
    }
}

#[test]
fn parses_an_enum_with_two_cases() {
    let (session, id) = parse_one_decl("enum Color { case Red, case Green }");
    match &session.decls.get(id).kind {
        DeclKind::Enum { name, consts, .. } => {
            assert_eq!(name.name, "Color");
            assert_eq!(consts.len(), 2);
        }
        other => panic!("expected enum, got {other:?}"),
    }
}

#[test]
fn parses_an_enum_case_with_an_explicit_value() {
    let (session, id) = parse_one_decl("enum Status { case Ok = 0, case Error = 1 }");
    match &session.decls.get(id).kind {
        DeclKind::Enum { consts, .. } => {
            let first = session.decls.get(consts[0]);
            match &first.kind {
                DeclKind::EnumConst { name, value } => {
                    assert_eq!(name.name, "Ok");
                    assert!(value.is_some());
                }
                other => panic!("expected enum const, got {other:?}"),
            }
        }
        other => panic!("expected enum, got {other:?}"),
    }
}

#[test]
fn parses_an_extension_block() {
    let (session, id) = parse_one_decl("extension i32 { func doubled() -> i32 { return self + self; } }");
    match &session.decls.get(id).kind {
        DeclKind::Extension { members, .. } => assert_eq!(members.len(), 1),
        other => panic!("expected extension, got {other:?}"),
    }
}

#[test]
fn parses_an_infix_operator_declaration() {
    let (session, id) = parse_one_decl("operator infix + (other: i32) -> i32 { return other; }");
    match &session.decls.get(id).kind {
        DeclKind::Operator { symbol, sig, .. } => {
            // `describe()` is `TokenKind`'s `Debug` form, not the literal glyph.
            assert_eq!(symbol, "Plus");
            assert_eq!(sig.params.len(), 1);
        }
        other => panic!("expected operator, got {other:?}"),
    }
}

#[test]
fn parses_a_call_operator_declaration() {
    let (session, id) = parse_one_decl("call (x: i32) -> i32 { return x; }");
    match &session.decls.get(id).kind {
        DeclKind::CallOperator { sig } => assert_eq!(sig.params.len(), 1),
        other => panic!("expected call operator, got {other:?}"),
    }
}

#[test]
fn parses_a_subscript_with_get_and_set() {
    let (session, id) = parse_one_decl("subscript(i: i32) -> i32 { get { return i; } set { } }");
    match &session.decls.get(id).kind {
        DeclKind::SubscriptOperator { params, getter, setter, .. } => {
            assert_eq!(params.len(), 1);
            assert!(getter.is_some());
            assert!(setter.is_some());
        }
        other => panic!("expected subscript, got {other:?}"),
    }
}

#[test]
fn parses_a_property_with_only_a_getter() {
    let (session, id) = parse_one_decl("property area: i32 { get { return 0; } }");
    match &session.decls.get(id).kind {
        DeclKind::Property { name, getter, setter, .. } => {
            assert_eq!(name.name, "area");
            assert!(getter.is_some());
            assert!(setter.is_none());
        }
        other => panic!("expected property, got {other:?}"),
    }
}

#[test]
fn parses_a_constructor_and_destructor() {
    let (session, id) = parse_one_decl("init(x: i32) { }");
    match &session.decls.get(id).kind {
        DeclKind::Constructor { sig, .. } => assert_eq!(sig.params.len(), 1),
        other => panic!("expected constructor, got {other:?}"),
    }

    let (session, id) = parse_one_decl("deinit() { }");
    match &session.decls.get(id).kind {
        DeclKind::Destructor { body } => assert!(body.is_some()),
        other => panic!("expected destructor, got {other:?}"),
    }
}

#[test]
fn parses_a_typealias() {
    let (session, id) = parse_one_decl("typealias Meters = i32;");
    match &session.decls.get(id).kind {
        DeclKind::TypeAlias { name, .. } => assert_eq!(name.name, "Meters"),
        other => panic!("expected typealias, got {other:?}"),
    }
}

#[test]
fn parses_modifier_combinations_on_a_top_level_variable() {
    let (session, id) = parse_one_decl("public static var count: i32 = 0;");
    let decl = session.decls.get(id);
    assert_eq!(decl.visibility, Visibility::Public);
    assert!(decl.modifiers.contains(Modifiers::STATIC));
    match &decl.kind {
        DeclKind::Variable { name, initializer, .. } => {
            assert_eq!(name.name, "count");
            assert!(initializer.is_some());
        }
        other => panic!("expected variable, got {other:?}"),
    }
}

#[test]
fn a_let_binding_is_never_mutable() {
    let (session, id) = parse_one_decl("let pi: i32 = 3;");
    let decl = session.decls.get(id);
    assert!(!decl.modifiers.contains(Modifiers::MUT));
}
