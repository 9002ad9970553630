//! Source text positions and ranges.

use std::fmt;

pub use text_size::TextRange;
pub use text_size::TextSize;

/// A line and column position in source text, as an editor reports it.
///
/// Both line and column are 0-indexed; `Display` shows them 1-indexed.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd)]
pub struct LineCol {
    /// 0-indexed line number
    pub line: u32,
    /// 0-indexed column (in UTF-8 bytes, not characters)
    pub col: u32,
}

impl LineCol {
    #[inline]
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Debug for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.col + 1)
    }
}

/// Index for converting between byte offsets and line/column positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineIndex {
    /// Byte offset of the start of each line
    line_starts: Vec<TextSize>,
    len: TextSize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![TextSize::from(0)];
        for (offset, c) in text.char_indices() {
            if c == '\n' {
                line_starts.push(TextSize::from((offset + 1) as u32));
            }
        }

        Self {
            line_starts,
            len: TextSize::of(text),
        }
    }

    /// Convert a byte offset to a line/column position.
    pub fn line_col(&self, offset: TextSize) -> LineCol {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let col = offset - self.line_starts[line];

        LineCol {
            line: line as u32,
            col: col.into(),
        }
    }

    /// Convert a line/column position to a byte offset.
    ///
    /// Returns `None` when the line does not exist or the column runs past
    /// the end of the text.
    pub fn offset(&self, line_col: LineCol) -> Option<TextSize> {
        let line_start = *self.line_starts.get(line_col.line as usize)?;
        let offset = line_start + TextSize::from(line_col.col);
        (offset <= self.len).then_some(offset)
    }

    /// Convert a byte range to a pair of line/column positions.
    pub fn line_col_range(&self, range: TextRange) -> (LineCol, LineCol) {
        (self.line_col(range.start()), self.line_col(range.end()))
    }

    pub fn len(&self) -> usize {
        self.line_starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len == TextSize::from(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_display() {
        assert_eq!(LineCol::new(0, 0).to_string(), "1:1");
        assert_eq!(LineCol::new(5, 10).to_string(), "6:11");
    }

    #[test]
    fn test_line_index_multi_line() {
        let index = LineIndex::new("_block\n    _local var\n_endblock");

        assert_eq!(index.line_col(TextSize::from(0)), LineCol::new(0, 0));
        assert_eq!(index.line_col(TextSize::from(7)), LineCol::new(1, 0));
        assert_eq!(index.line_col(TextSize::from(18)), LineCol::new(1, 11));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_line_index_offset_roundtrip() {
        let index = LineIndex::new("_block\n    _local var\n_endblock");

        let offset = index.offset(LineCol::new(1, 11)).unwrap();
        assert_eq!(offset, TextSize::from(18));
        assert_eq!(index.line_col(offset), LineCol::new(1, 11));
    }

    #[test]
    fn test_line_index_offset_out_of_bounds() {
        let index = LineIndex::new("abc");

        assert_eq!(index.offset(LineCol::new(3, 0)), None);
        assert_eq!(index.offset(LineCol::new(0, 10)), None);
    }
}
