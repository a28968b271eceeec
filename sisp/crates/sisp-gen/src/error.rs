//! Errors raised while lowering the AST to IR (spec.md §4.4, §7).
//!
//! These are internal control-flow types, distinct from the user-facing
//! [`sisp_util::Diagnostic`]s the driver renders — a caught `LowerError`
//! becomes one `Diagnostic` at the point it's reported.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LowerError {
    #[error("unknown name '{0}'")]
    UnknownName(String),

    #[error("call to '{0}' expected {1} argument(s), found {2}")]
    ArityMismatch(String, usize, usize),

    #[error("operator '{0}' is not declared")]
    OperatorNotFound(String),

    #[error("operand types of '{0}' do not match")]
    TypeMismatch(char),

    #[error("function '{0}' failed verification: {1}")]
    VerificationFailed(String, String),

    #[error("LLVM operation failed: {0}")]
    LlvmOperationFailed(String),
}

pub type Result<T> = std::result::Result<T, LowerError>;
