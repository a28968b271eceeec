//! Argument surface (spec.md §6.2): a single positional source path
//! (stdin if omitted) plus the JIT/output/diagnostic flags.

use std::path::PathBuf;

use clap::Parser as ClapParser;

#[derive(Debug, ClapParser)]
#[command(name = "sisp", version, about = "Compiler for the sisp expression language")]
pub struct Cli {
    /// Source file to compile; reads stdin if omitted.
    pub input: Option<PathBuf>,

    /// Evaluate top-level expressions in a JIT instead of emitting an
    /// object file (0 = object file, 1 = JIT).
    #[arg(long, default_value_t = 0)]
    pub jit: u8,

    /// Output path for the emitted object file (ignored in JIT mode).
    #[arg(long, default_value = "a.out")]
    pub out: PathBuf,

    /// Trace each top-level form as it is parsed and lowered.
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the token stream for each top-level form before parsing it.
    #[arg(long)]
    pub emit_tokens: bool,

    /// Print the parsed AST for each top-level form before lowering it.
    #[arg(long)]
    pub emit_ast: bool,
}

impl Cli {
    pub fn is_jit(&self) -> bool {
        self.jit != 0
    }
}
