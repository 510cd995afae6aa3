//! Filepath: src/infra/line_index.rs
//! Line-start table for byte/row/column mapping over raw source bytes.
//!
//! A single scan records where every line begins; rows, columns, line
//! starts, and line ranges are all derived from that one table, so the
//! mapping cannot drift between callers. External line numbers are
//! 1-based; points are 0-based with byte columns. Range ends are
//! exclusive, and CRLF line ends exclude the '\r'.

use memchr::memchr_iter;

use crate::tree::Point;

#[derive(Debug, Clone)]
pub struct NewlineIndex
{
    /// Buffer length in bytes.
    len: usize,

    /// Byte offset where each line begins; index 0 is always offset 0.
    /// A trailing '\n' opens one more (empty) final line.
    line_starts: Vec<usize>,
}

impl NewlineIndex
{
    #[must_use]
    pub fn build(bytes: &[u8]) -> Self
    {
        let mut line_starts = Vec::with_capacity(1 + bytes.len() / 40);
        line_starts.push(0);
        line_starts.extend(memchr_iter(b'\n', bytes).map(|nl| nl + 1));

        Self { len: bytes.len(), line_starts }
    }

    /// Number of logical lines. An empty buffer has none; otherwise one
    /// per recorded line start.
    #[must_use]
    pub fn line_count(&self) -> usize
    {
        if self.len == 0
        {
            0
        }
        else
        {
            self.line_starts
                .len()
        }
    }

    /// 0-based row holding `byte`: the last line start at or before it.
    /// A byte sitting on a '\n' belongs to the row that '\n' terminates.
    fn row_of(
        &self,
        byte: usize,
    ) -> usize
    {
        // line_starts[0] == 0, so the partition point is always >= 1.
        self.line_starts
            .partition_point(|&start| start <= byte)
            - 1
    }

    /// Row/column point for a byte offset; the column counts bytes from
    /// the row's start. Offsets past the end clamp to the end.
    #[must_use]
    pub fn point_at(
        &self,
        byte: usize,
    ) -> Point
    {
        let byte = byte.min(self.len);
        let row = self.row_of(byte);

        Point { row, column: byte - self.line_starts[row] }
    }

    /// Start byte of a 1-based line.
    #[must_use]
    pub fn start_byte_of_line(
        &self,
        line1: usize,
    ) -> Option<usize>
    {
        if line1 == 0 || line1 > self.line_count()
        {
            return None;
        }

        self.line_starts
            .get(line1 - 1)
            .copied()
    }

    /// End byte (exclusive) of a 1-based line: the next line's start
    /// backed up over the '\n' that opened it, or end of buffer for the
    /// final line. A '\r' sitting before the '\n' is excluded too.
    #[must_use]
    pub fn end_byte_of_line(
        &self,
        line1: usize,
        bytes: &[u8],
    ) -> Option<usize>
    {
        debug_assert_eq!(
            bytes.len(),
            self.len,
            "index must be queried with the bytes it was built from"
        );

        if line1 == 0 || line1 > self.line_count()
        {
            return None;
        }

        let mut end = match self
            .line_starts
            .get(line1)
        {
            Some(&next_start) => next_start - 1,
            None => self.len,
        };

        if end > 0 && bytes.get(end) == Some(&b'\n') && bytes.get(end - 1) == Some(&b'\r')
        {
            end -= 1;
        }

        Some(end)
    }

    /// Byte range covering the 1-based inclusive line span; the end line
    /// clamps to the last line.
    #[must_use]
    pub fn byte_range_for_lines(
        &self,
        start_line1: usize,
        end_line1: usize,
        bytes: &[u8],
    ) -> Option<(usize, usize)>
    {
        if start_line1 > end_line1
        {
            return None;
        }

        let lo = self.start_byte_of_line(start_line1)?;
        let hi = self.end_byte_of_line(
            end_line1.min(self.line_count()),
            bytes,
        )?;

        (lo <= hi).then_some((lo, hi))
    }

    /// 1-based line number for a byte offset; 0 for an empty buffer.
    #[must_use]
    pub fn line_of_byte(
        &self,
        byte: usize,
    ) -> usize
    {
        if self.len == 0
        {
            return 0;
        }

        self.row_of(byte.min(self.len)) + 1
    }
}
