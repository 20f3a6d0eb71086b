//! Pass R (type resolution) exercised through the full `compile_program`
//! pipeline: bare-name lookup across namespaces and imports, and the
//! ambiguous-import case spec §4.3 calls out explicitly.

use gulc_compiler::compile_source;
use gulc_compiler::diagnostics::ErrorKind;

#[test]
fn resolves_a_struct_declared_in_the_same_file() {
    let (_session, result) = compile_source(
        "t.gulc",
        r#"
        struct Widget {}
        var w: Widget;
        "#,
    );
    assert!(result.is_ok(), "expected Ok, got {result:?}");
}

#[test]
fn resolves_a_name_reached_through_a_single_unaliased_import() {
    let (_session, result) = compile_source(
        "t.gulc",
        r#"
        namespace shapes {
            struct Widget {}
        }
        import shapes;
        var w: Widget;
        "#,
    );
    assert!(result.is_ok(), "expected Ok, got {result:?}");
}

#[test]
fn rejects_an_unknown_bare_name() {
    let (_session, result) = compile_source("t.gulc", "var w: Ghost;");
    assert!(matches!(&result, Err(e) if matches!(e.kind, ErrorKind::UnknownName(_))), "got {result:?}");
}

#[test]
fn flags_a_name_visible_through_two_unaliased_imports_as_ambiguous() {
    // Two sibling namespaces each declare a `Widget` member and are both
    // imported bare, so the top-level reference to `Widget` can't pick one
    // without a qualifying path.
    let (_session, result) = compile_source(
        "t.gulc",
        r#"
        namespace shapes {
            struct Widget {}
        }
        namespace controls {
            struct Widget {}
        }
        import shapes;
        import controls;
        var w: Widget;
        "#,
    );
    assert!(matches!(&result, Err(e) if matches!(e.kind, ErrorKind::AmbiguousName(_))), "got {result:?}");
}

#[test]
fn an_aliased_import_does_not_participate_in_ambiguity() {
    // Only `controls`'s `Widget` is reachable unqualified; `shapes` was
    // imported under an alias, so it never contends for the bare name.
    let (_session, result) = compile_source(
        "t.gulc",
        r#"
        namespace shapes {
            struct Widget {}
        }
        namespace controls {
            struct Widget {}
        }
        import shapes as sh;
        import controls;
        var w: Widget;
        "#,
    );
    assert!(result.is_ok(), "expected Ok, got {result:?}");
}
