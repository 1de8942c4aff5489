//! Source file management for the Vesper compiler
//!
//! The [`SourceMap`] owns the text of every loaded file and precomputes
//! per-file line-start offsets so byte offsets resolve to line/column in
//! O(log L). Buffers are read-only after loading; tokens and AST nodes refer
//! back into them only through byte spans.

#![allow(clippy::cast_possible_truncation)] // Offsets are u32; files > 4GB are unsupported

use std::fmt;
use std::io;
use std::path::Path;

/// Identifies a file loaded into a [`SourceMap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

/// A resolved position in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// File name as registered with the source map
    pub file: String,
    /// 1-based line number (0 for the unknown sentinel)
    pub line: u32,
    /// 1-based column number (0 for the unknown sentinel)
    pub column: u32,
    /// Byte offset into the source buffer
    pub offset: u32,
}

impl SourceLocation {
    /// The sentinel returned for invalid file ids or out-of-range offsets
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            file: "<unknown>".to_string(),
            line: 0,
            column: 0,
            offset: 0,
        }
    }

    /// Returns true unless this is the unknown sentinel
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.line > 0 && self.column > 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A half-open range `[begin, end)` between two resolved locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRange {
    pub begin: SourceLocation,
    pub end: SourceLocation,
}

impl SourceRange {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.begin.is_valid() && self.end.is_valid()
    }
}

/// One loaded file: name, contents, and line-start offsets
#[derive(Debug, Clone)]
struct FileEntry {
    filename: String,
    content: String,
    line_starts: Vec<u32>,
}

/// Owns source buffers and resolves byte offsets to line/column
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: Vec<FileEntry>,
}

impl SourceMap {
    /// Create an empty source map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a file from disk
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> io::Result<FileId> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Ok(self.load_from_string(path.display().to_string(), content))
    }

    /// Load from an in-memory string (used by tests and the REPL-style paths)
    pub fn load_from_string(&mut self, name: impl Into<String>, content: impl Into<String>) -> FileId {
        let content = content.into();
        let line_starts = compute_line_starts(&content);
        let id = FileId(self.files.len() as u32);
        self.files.push(FileEntry {
            filename: name.into(),
            content,
            line_starts,
        });
        id
    }

    /// Get the full source text for a file, if the id is valid
    #[must_use]
    pub fn source(&self, id: FileId) -> Option<&str> {
        self.files.get(id.0 as usize).map(|f| f.content.as_str())
    }

    /// Get the registered name for a file, if the id is valid
    #[must_use]
    pub fn filename(&self, id: FileId) -> Option<&str> {
        self.files.get(id.0 as usize).map(|f| f.filename.as_str())
    }

    /// Resolve a byte offset to a [`SourceLocation`].
    ///
    /// Invalid file ids or out-of-range offsets yield the unknown sentinel
    /// rather than failing.
    #[must_use]
    pub fn location(&self, id: FileId, offset: u32) -> SourceLocation {
        let Some(file) = self.files.get(id.0 as usize) else {
            return SourceLocation::unknown();
        };
        if offset as usize > file.content.len() {
            return SourceLocation::unknown();
        }

        let line = file
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = file.line_starts[line];
        SourceLocation {
            file: file.filename.clone(),
            line: (line + 1) as u32,
            column: offset - line_start + 1,
            offset,
        }
    }

    /// Number of loaded files
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

fn compute_line_starts(source: &str) -> Vec<u32> {
    let mut line_starts = vec![0];
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            line_starts.push((i + 1) as u32);
        }
    }
    line_starts
}
