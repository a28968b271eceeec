use crate::Span;

use super::codes::DiagnosticCode;
use super::level::Level;
use super::Diagnostic;

/// Fluent builder for a [`Diagnostic`], grounded on the teacher's
/// `DiagnosticBuilder` (`faxc-util/src/diagnostic/builder.rs`).
pub struct DiagnosticBuilder {
    level: Level,
    code: Option<DiagnosticCode>,
    message: String,
    span: Span,
    help: Option<String>,
}

impl DiagnosticBuilder {
    pub fn error(message: impl Into<String>) -> Self {
        Self { level: Level::Error, code: None, message: message.into(), span: Span::DUMMY, help: None }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: Level::Warning, code: None, message: message.into(), span: Span::DUMMY, help: None }
    }

    pub fn code(mut self, code: DiagnosticCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn build(self) -> Diagnostic {
        Diagnostic { level: self.level, code: self.code, message: self.message, span: self.span, help: self.help }
    }
}
