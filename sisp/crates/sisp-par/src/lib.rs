//! sisp-par — recursive-descent parser and AST (spec.md §3.4, §4.2).
//!
//! Builds the closed [`ast::Expr`]/[`ast::Function`] tree directly from a
//! token stream, installing lexical scope as it goes so that later passes
//! (`sisp-gen`) never need a separate name-resolution pass.

mod ast;
mod context;
mod parser;

pub use ast::{Expr, Function, OperatorKind, Prototype, Type};
pub use context::{CompilationContext, NO_PRECEDENCE};
pub use parser::Parser;
