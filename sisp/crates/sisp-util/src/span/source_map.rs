//! Holds loaded source files and renders the `<file>:<line>:<col>` prefix
//! used by diagnostics (spec.md §7).

use std::path::PathBuf;

use super::FileId;

/// A single loaded source file.
pub struct SourceFile {
    pub id: FileId,
    pub path: PathBuf,
    pub content: String,
}

/// Source files loaded during one compiler invocation.
///
/// sisp only ever compiles a single file (or stdin) per invocation, but the
/// map still supports several so diagnostics keep working if the driver is
/// later extended to accept multiple inputs.
#[derive(Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    pub fn add_file(&mut self, path: PathBuf, content: String) -> FileId {
        let id = FileId(self.files.len());
        self.files.push(SourceFile { id, path, content });
        id
    }

    pub fn get(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.0)
    }

    /// The display name used in `<file>:<line>:<col>:` diagnostic prefixes.
    pub fn display_path(&self, id: FileId) -> String {
        self.get(id)
            .map(|f| f.path.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string())
    }
}
