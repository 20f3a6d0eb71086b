//! Error taxonomy and the fatal-diagnostic exit format from spec §6/§7.
//!
//! Mirrors the teacher's split between a typed error value
//! (`FatalDiagnosticError`) and a formatter that turns it into the one-line
//! shape the process actually prints — here `CompileError` plays both roles
//! via `Display`, since this compiler has a single textual diagnostic shape
//! rather than TypeScript's rich `DiagnosticWithLocation` chain.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `(line, column)`, both 1-based, matching the spec's `{l,c}` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.line, self.column)
    }
}

/// `(start, end)` source range carried by every AST node (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: Position,
    pub end: Position,
}

impl SourceRange {
    pub const fn new(start: Position, end: Position) -> Self {
        SourceRange { start, end }
    }

    pub const fn zero() -> Self {
        SourceRange::new(Position::new(0, 0), Position::new(0, 0))
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// The pipeline phase that detected the error — the `<phase>` slot in
/// `gulc <phase> error[...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Lex,
    Parse,
    DeclValidator,
    TypeResolver,
    TemplateInstantiator,
    SignatureResolver,
    ContractSolver,
    CodeGen,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Lex => "lex",
            Phase::Parse => "parse",
            Phase::DeclValidator => "decl",
            Phase::TypeResolver => "resolve",
            Phase::TemplateInstantiator => "instantiate",
            Phase::SignatureResolver => "overload",
            Phase::ContractSolver => "contract",
            Phase::CodeGen => "codegen",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// The full error taxonomy from spec §7, as a `thiserror` enum so each
/// variant keeps its own message shape while all share range/phase/file
/// through [`CompileError`].
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("illegal literal: {0}")]
    IllegalLiteral(String),
    #[error("modifier not legal here: {0}")]
    IllegalModifierPosition(String),

    #[error("redefinition of `{0}`")]
    Redefinition(String),
    #[error("invalid modifier combination: {0}")]
    InvalidModifierCombination(String),
    #[error("`{0}` requires a body")]
    MissingRequiredBody(String),
    #[error("`extern` declaration `{0}` may not have a body")]
    ExternWithBody(String),
    #[error("`abstract` declaration `{0}` may not have a body")]
    AbstractWithBody(String),

    #[error("unknown name `{0}`")]
    UnknownName(String),
    #[error("ambiguous name `{0}`, visible through multiple imports")]
    AmbiguousName(String),
    #[error("wrong number of template arguments for `{0}`: expected {expected}, found {found}", expected = .1, found = .2)]
    WrongTemplateArgCount(String, usize, usize),
    #[error("unresolved nested type `{0}`")]
    UnresolvedNestedType(String),

    #[error("`where` clause not satisfied: {0}")]
    WhereClauseUnsatisfied(String),
    #[error("`has` used on an uninstantiated template")]
    HasOnUninstantiatedTemplate,

    #[error("no matching overload for `{0}`")]
    NoMatchingOverload(String),
    #[error("ambiguous overload for `{0}`")]
    AmbiguousOverload(String),

    #[error("mismatched mutability: {0}")]
    MismatchedMut(String),
    #[error("invalid cast from `{0}` to `{1}`")]
    InvalidCast(String, String),
    #[error("cannot return non-struct type through the `sret` path")]
    InvalidSretReturn,
    #[error("lvalue used where an rvalue was expected and no conversion is available")]
    LvalueRvalueMismatch,

    #[error("not yet supported: {0}")]
    NotYetSupported(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// A single fatal (or, for warnings, non-fatal) diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("gulc {phase} {severity}[{file}, {range}]: {kind}")]
pub struct CompileError {
    pub phase: Phase,
    pub severity: Severity,
    pub file: String,
    pub range: SourceRange,
    pub kind: ErrorKind,
}

impl CompileError {
    pub fn fatal(phase: Phase, file: impl Into<String>, range: SourceRange, kind: ErrorKind) -> Self {
        CompileError { phase, severity: Severity::Error, file: file.into(), range, kind }
    }

    pub fn warning(phase: Phase, file: impl Into<String>, range: SourceRange, kind: ErrorKind) -> Self {
        CompileError { phase, severity: Severity::Warning, file: file.into(), range, kind }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_gulc_cli() {
        let err = CompileError::fatal(
            Phase::TypeResolver,
            "main.gulc",
            SourceRange::new(Position::new(3, 5), Position::new(3, 12)),
            ErrorKind::UnknownName("Widget".into()),
        );
        assert_eq!(
            err.to_string(),
            "gulc resolve error[main.gulc, {3, 5} to {3, 12}]: unknown name `Widget`"
        );
    }

    #[test]
    fn warning_does_not_report_fatal() {
        let warn = CompileError::warning(
            Phase::Lex,
            "a.gulc",
            SourceRange::zero(),
            ErrorKind::IllegalLiteral("0x".into()),
        );
        assert!(!warn.is_fatal());
    }
}
