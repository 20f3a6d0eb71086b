//! The CLI collaborator (spec §6): reads source files from disk, builds the
//! target descriptor, and drives `gulc_compiler`'s pure pipeline. File I/O
//! and process exit codes live here rather than in the core because the
//! core is specified as "a pure transformation" with no persistent state.

use std::fs;
use std::path::Path;

use gulc_compiler::diagnostics::CompileError;
use gulc_compiler::session::Session;
use gulc_compiler::target::TargetDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read `{path}`: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}

/// The result of running the front-end to completion or to its first fatal
/// error (spec §7's "no recovery; no continued compilation after the first
/// error").
pub struct CompileOutcome {
    pub session: Session,
    pub fatal: Option<CompileError>,
}

impl CompileOutcome {
    pub fn exit_code(&self) -> i32 {
        if self.fatal.is_some() {
            1
        } else {
            0
        }
    }

    /// Prints the fatal diagnostic, if any, in spec §6's
    /// `gulc <phase> error[<file>, <range>]: <message>` shape (`CompileError`'s
    /// own `Display`), followed by every warning collected along the way.
    pub fn print_diagnostics(&self) {
        if let Some(err) = &self.fatal {
            eprintln!("{err}");
        }
        for warning in &self.session.diagnostics {
            eprintln!("{warning}");
        }
    }
}

/// Reads every path in `paths`, parses and runs the fixed-point V/R/I/S/C
/// pipeline over them as a single program.
///
/// Deliberately does not call `gulc_compiler::run_codegen`: that step
/// requires a concrete `Emitter` backend, and spec §1 places "the concrete
/// SSA/IR emitter backend" outside the core's scope — there is nothing for
/// this collaborator to hand a `Module` sequence to.
pub fn compile_paths(paths: &[impl AsRef<Path>]) -> Result<CompileOutcome, CliError> {
    let mut sources = Vec::with_capacity(paths.len());
    for p in paths {
        let path = p.as_ref();
        let text = fs::read_to_string(path).map_err(|source| CliError::Io { path: path.display().to_string(), source })?;
        sources.push((path.display().to_string(), text));
    }

    let mut session = Session::new();
    let target = TargetDescriptor::host_default();
    let fatal = gulc_compiler::compile_program(&mut session, &target, &sources).err();
    Ok(CompileOutcome { session, fatal })
}
