//! Pass S (overload resolution) exercised through the full pipeline, per
//! spec §4.6's lexicographic `Match > Castable > DefaultValues` preference
//! and its ambiguity rule when two candidates tie.

use gulc_compiler::compile_source;
use gulc_compiler::diagnostics::ErrorKind;

#[test]
fn picks_the_only_candidate_a_literal_can_match_without_narrowing() {
    // A bare integer literal resolves to `i32`; `f(x: i8)` would require a
    // narrowing conversion the target's implicit-conversion table forbids,
    // so only the `i32` overload is even a candidate.
    let (_session, result) = compile_source(
        "t.gulc",
        r#"
        func f(x: i8) -> i32 { return 0; }
        func f(x: i32) -> i32 { return x; }
        func main() -> i32 { return f(x: 1); }
        "#,
    );
    assert!(result.is_ok(), "expected Ok, got {result:?}");
}

#[test]
fn flags_two_identically_shaped_overloads_as_ambiguous() {
    // Pass V defers overload collision entirely to pass S (two identical
    // signatures aren't a `Redefinition` there); a call that scores both
    // candidates the same way must be rejected here instead.
    let (_session, result) = compile_source(
        "t.gulc",
        r#"
        func f(x: i32) -> i32 { return x; }
        func f(x: i32) -> i32 { return x; }
        func main() -> i32 { return f(x: 1); }
        "#,
    );
    assert!(matches!(&result, Err(e) if matches!(e.kind, ErrorKind::AmbiguousOverload(_))), "got {result:?}");
}

#[test]
fn reports_no_matching_overload_when_every_candidate_fails() {
    let (_session, result) = compile_source(
        "t.gulc",
        r#"
        func f(x: i8) -> i32 { return 0; }
        func main() -> i32 { return f(x: 1); }
        "#,
    );
    assert!(matches!(&result, Err(e) if matches!(e.kind, ErrorKind::NoMatchingOverload(_))), "got {result:?}");
}
