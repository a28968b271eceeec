//! sisp-util — foundation types shared by every other `sisp` crate:
//! source spans, string interning, diagnostics, and the typed-index arena
//! helper used by `sisp-scope`'s scope tree.

pub mod diagnostic;
pub mod index_vec;
pub mod span;
pub mod symbol;

pub use diagnostic::{Diagnostic, DiagnosticBuilder, Handler, Level};
pub use index_vec::{Idx, IndexVec};
pub use span::{FileId, SourceFile, SourceMap, Span};
pub use symbol::{Interner, Symbol};
