//! The gulc semantic middle-end: lexer and parser produce an arena-backed
//! AST, then a fixed sequence of passes resolve names, instantiate
//! templates, pick overloads, solve contracts, and hand the fully-typed
//! tree to a pluggable code-gen driver (spec §4, §5).

pub mod arena;
pub mod ast;
pub mod codegen;
pub mod const_eval;
pub mod diagnostics;
pub mod ident;
pub mod inherit;
pub mod lexer;
pub mod namespace;
pub mod parser;
pub mod passes;
pub mod session;
pub mod target;
pub mod type_compare;

use codegen::emitter::Emitter;
use codegen::Driver;
use diagnostics::CompileResult;
use session::Session;
use target::TargetDescriptor;

/// Parse every source file into `session.files`, then run the fixed-point
/// pipeline described by spec §5: V once, then R/I/S/C interleaved until
/// nothing changes.
///
/// `target` only matters to the two passes whose resolution depends on the
/// target's implicit-conversion table and pointer size (S's overload
/// selection, C's `has` folding reads types S has already stamped); G is a
/// separate step (`run_codegen`) since it is generic over the caller's
/// chosen [`codegen::emitter::Emitter`] backend and this function is not.
pub fn compile_program(session: &mut Session, target: &TargetDescriptor, sources: &[(String, String)]) -> CompileResult<()> {
    for (path, text) in sources {
        let mut parser = parser::Parser::new(text, path.clone(), session);
        let file = parser.parse_file()?;
        session.files.push(file);
    }

    passes::decl_validator::run(session)?;

    // R/I/S run to a fixed point (spec §5): pass R drives pass I inline the
    // moment it resolves a template reference with a fully concrete
    // argument tuple (`type_resolver::maybe_instantiate`), each
    // instantiation appends fresh decls/types that the next round of R
    // picks up, and S's call-site rewrites only become possible once R has
    // stamped the types S's overload resolution reads. C's `has` folding
    // rides inside S/R's output via `const_eval::eval`, so it needs no
    // separate driver call in this loop.
    loop {
        let before = session.types.len();
        passes::type_resolver::run(session)?;
        passes::signature_resolver::run(session, target)?;
        let after = session.types.len();
        if after == before {
            break;
        }
    }

    Ok(())
}

/// Lowers the fully-resolved program to SSA IR against `emitter` (pass G,
/// spec §4.8). Kept separate from `compile_program` because the driver is
/// generic over the emitter backend; callers run this only after
/// `compile_program` returns `Ok`.
pub fn run_codegen<E: Emitter>(session: &Session, target: &TargetDescriptor, emitter: &mut E) -> CompileResult<()> {
    Driver::new(session, target, emitter).run()
}

/// Convenience entry point for a single in-memory source file.
pub fn compile_source(path: impl Into<String>, text: impl Into<String>) -> (Session, CompileResult<()>) {
    let mut session = Session::new();
    let target = TargetDescriptor::host_default();
    let result = compile_program(&mut session, &target, &[(path.into(), text.into())]);
    (session, result)
}
