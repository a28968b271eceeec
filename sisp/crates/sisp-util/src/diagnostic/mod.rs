//! Diagnostic reporting: leveled, spanned messages rendered in the
//! `<file>:<line>:<col>: <kind>: <message>` shape spec.md §7 requires.

mod builder;
mod codes;
mod level;

pub use builder::DiagnosticBuilder;
pub use codes::{
    DiagnosticCode, E_ARITY_MISMATCH, E_INVALID_PRECEDENCE, E_LEXICAL, E_OPERATOR_NOT_FOUND,
    E_SYNTAX, E_TYPE, E_UNKNOWN_NAME,
};
pub use level::Level;

use crate::span::SourceMap;
use crate::Span;

/// One error/warning/note, optionally spanned and coded.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: Level,
    pub code: Option<DiagnosticCode>,
    pub message: String,
    pub span: Span,
    pub help: Option<String>,
}

impl Diagnostic {
    /// Render as `<file>:<line>:<col>: <kind>: <message>`.
    pub fn render(&self, sources: &SourceMap) -> String {
        let file = sources.display_path(self.span.file_id);
        let kind = self
            .code
            .map(|c| c.name.to_string())
            .unwrap_or_else(|| self.level.to_string());
        let mut out = format!("{}:{}:{}: {}: {}", file, self.span.line, self.span.col, kind, self.message);
        if let Some(help) = &self.help {
            out.push_str(&format!("\n  help: {}", help));
        }
        out
    }
}

/// Accumulates diagnostics for one compilation. Parsing errors are
/// recovered at statement granularity (spec.md §7) so the handler simply
/// collects everything it's given rather than aborting on first error.
#[derive(Default)]
pub struct Handler {
    diagnostics: Vec<Diagnostic>,
}

impl Handler {
    pub fn new() -> Self {
        Self { diagnostics: Vec::new() }
    }

    pub fn emit(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    pub fn error(&mut self, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        self.emit(DiagnosticBuilder::error(message).code(code).span(span).build());
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level == Level::Error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FileId;

    #[test]
    fn render_matches_file_line_col_kind_message() {
        let mut sources = SourceMap::new();
        let id = sources.add_file("foo.sisp".into(), "1 + 2".to_string());
        let diag = DiagnosticBuilder::error("unexpected token")
            .code(E_SYNTAX)
            .span(Span::new(1, 3, id))
            .build();
        assert_eq!(diag.render(&sources), "foo.sisp:1:3: SyntaxError: unexpected token");
        let _ = FileId::DUMMY;
    }

    #[test]
    fn handler_tracks_errors() {
        let mut handler = Handler::new();
        assert!(!handler.has_errors());
        handler.error(E_UNKNOWN_NAME, "undefined `x`", Span::DUMMY);
        assert!(handler.has_errors());
    }
}
