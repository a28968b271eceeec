//! Source location tracking: byte offsets, line/column, and file identity.

mod source_map;

pub use source_map::{SourceFile, SourceMap};

/// Identifies a source file loaded into a [`SourceMap`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

impl FileId {
    /// The single-file default used when a driver invocation never needed
    /// more than one [`SourceFile`].
    pub const DUMMY: FileId = FileId(0);
}

/// A location in source text: a 1-based line/column pair plus the file it
/// belongs to. Mirrors spec.md §3.2's `{line, col}` location, with `file_id`
/// added so a `Span` remains meaningful once a driver manages more than one
/// [`SourceFile`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub line: u32,
    pub col: u32,
    pub file_id: FileId,
}

impl Span {
    pub const DUMMY: Span = Span { line: 0, col: 0, file_id: FileId::DUMMY };

    pub fn new(line: u32, col: u32, file_id: FileId) -> Self {
        Self { line, col, file_id }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
