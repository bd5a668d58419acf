//! Byte offset to line/column conversion.

use serde::Serialize;

/// A zero-based position in a source text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineColumn {
    pub line: usize,
    pub column: usize,
    /// Whether the requested offset lay past the end of the text and was clamped.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub clamped: bool,
}

/// The start offsets of every line of a text.
///
/// Built once per text in a single pass, then queried by binary search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.bytes().enumerate().filter(|&(_, b)| b == b'\n').map(|(i, _)| i + 1))
            .collect();
        Self { line_starts, len: text.len() }
    }

    /// Length in bytes of the indexed text.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of lines, counting the (possibly empty) line after a trailing newline.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Returns the zero-based line containing `offset`, clamping it to the text length.
    pub fn line(&self, offset: usize) -> usize {
        self.line_column(offset).line
    }

    /// Converts a byte offset into a line and column.
    ///
    /// Offsets past the end of the text are clamped to its length and flagged.
    pub fn line_column(&self, offset: usize) -> LineColumn {
        let clamped = offset > self.len;
        let offset = offset.min(self.len);
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        LineColumn { line, column: offset - self.line_starts[line], clamped }
    }

    /// Returns the byte range of `line`, excluding its line break.
    pub fn line_span(&self, line: usize) -> Option<std::ops::Range<usize>> {
        let start = *self.line_starts.get(line)?;
        let end = self.line_starts.get(line + 1).map_or(self.len, |next| next - 1);
        Some(start..end)
    }
}

/// Converts a byte offset of `source` into a line and column.
///
/// This builds a throwaway [`LineIndex`]; prefer building one when converting many offsets of
/// the same text.
pub fn calculate_line_and_column(source: &str, offset: usize) -> LineColumn {
    LineIndex::new(source).line_column(offset)
}
