//! Stable diagnostic codes, one per error kind in spec.md §7.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiagnosticCode {
    pub id: u32,
    pub name: &'static str,
}

impl DiagnosticCode {
    pub const fn new(id: u32, name: &'static str) -> Self {
        Self { id, name }
    }
}

pub const E_LEXICAL: DiagnosticCode = DiagnosticCode::new(1, "LexicalError");
pub const E_SYNTAX: DiagnosticCode = DiagnosticCode::new(2, "SyntaxError");
pub const E_UNKNOWN_NAME: DiagnosticCode = DiagnosticCode::new(3, "UnknownName");
pub const E_ARITY_MISMATCH: DiagnosticCode = DiagnosticCode::new(4, "ArityMismatch");
pub const E_OPERATOR_NOT_FOUND: DiagnosticCode = DiagnosticCode::new(5, "OperatorNotFound");
pub const E_TYPE: DiagnosticCode = DiagnosticCode::new(6, "TypeError");
pub const E_INVALID_PRECEDENCE: DiagnosticCode = DiagnosticCode::new(7, "InvalidPrecedence");
