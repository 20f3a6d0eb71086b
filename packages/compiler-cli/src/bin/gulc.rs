//! `gulc <files...>`: compiles the given source files and reports
//! diagnostics, per spec §6's exit-condition contract.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "gulc", about = "gulc semantic middle-end front-end")]
struct Cli {
    /// Source files to compile as one program.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match gulc_compiler_cli::compile_paths(&cli.files) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("gulc: {err}");
            return ExitCode::FAILURE;
        }
    };

    outcome.print_diagnostics();
    ExitCode::from(outcome.exit_code() as u8)
}
