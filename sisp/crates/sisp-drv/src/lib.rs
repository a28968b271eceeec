//! sisp-drv — the `sisp` binary's driver loop (spec.md §4.5, §6.2).
//!
//! Owns the one piece of state the front-end crates don't: the read-eval
//! loop that feeds source text through `sisp-par` and `sisp-gen` one
//! top-level form at a time, exactly as `HandleDefinition`/`HandleExtern`/
//! `HandleTopLevelExpression`/`MainLoop` do in `examples/original_source/
//! sisp/sisp09.cpp`, generalized from "always `double`" to the declared
//! type lattice.

mod cli;
mod runtime;
mod session;

pub use cli::Cli;
pub use session::Session;

use anyhow::{Context, Result};
use std::io::Read;

/// Reads `cli.input` (or stdin if absent) and runs the driver loop over
/// it. Returns `Ok(true)` if every top-level form compiled without error,
/// `Ok(false)` if any diagnostic was emitted (already rendered to
/// stderr) — the caller maps that to a nonzero exit code. Only I/O and
/// LLVM target setup failures surface as `Err`.
pub fn run(cli: &Cli) -> Result<bool> {
    let (path, source) = read_input(cli)?;
    let mut session = Session::new(path, source, cli)?;
    session.run()?;
    Ok(!session.had_errors())
}

fn read_input(cli: &Cli) -> Result<(std::path::PathBuf, String)> {
    match &cli.input {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            Ok((path.clone(), source))
        }
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("failed to read stdin")?;
            Ok((std::path::PathBuf::from("<stdin>"), source))
        }
    }
}
