//! Byte-offset ↔ line/column conversion for source spans.
//!
//! Spans are stored as UTF-8 byte offsets into the original source text;
//! viewers need 1-indexed line/column pairs. Both conversions clamp rather
//! than fail on out-of-range or non-boundary input, so a best-effort span
//! from a recovering parser still renders somewhere sensible.

/// A 1-indexed line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineColumn {
    pub line: usize,
    pub column: usize,
}

/// Converts a byte offset into a 1-indexed line/column pair.
///
/// Offsets beyond the end of `content` clamp to the final position. An
/// offset inside a multi-byte character counts as the character it falls
/// within. Columns count Unicode scalar values, not bytes.
pub fn offset_to_line_column(content: &str, offset: usize) -> LineColumn {
    let mut line = 1;
    let mut column = 1;

    for (idx, ch) in content.char_indices() {
        if idx >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    LineColumn { line, column }
}

/// Converts a 1-indexed line/column pair into a byte offset.
///
/// Returns `None` when the line does not exist or either coordinate is zero.
/// A column past the end of its line clamps to the line end.
pub fn line_column_to_offset(content: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 || column == 0 {
        return None;
    }

    let mut current_line = 1;
    let mut line_start = 0;

    let resolve = |start: usize| -> usize {
        let rest = &content[start..];
        let line_end = rest.find('\n').map(|i| start + i).unwrap_or(content.len());
        content[start..line_end]
            .char_indices()
            .nth(column - 1)
            .map(|(i, _)| start + i)
            .unwrap_or(line_end)
    };

    for (idx, ch) in content.char_indices() {
        if current_line == line {
            return Some(resolve(line_start));
        }
        if ch == '\n' {
            current_line += 1;
            line_start = idx + 1;
        }
    }

    (current_line == line).then(|| resolve(line_start))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_offset_is_line_one_column_one() {
        assert_eq!(
            offset_to_line_column("SELECT 1", 0),
            LineColumn { line: 1, column: 1 }
        );
    }

    #[test]
    fn offsets_cross_newlines() {
        let sql = "SELECT *\nFROM users\nWHERE id = 1";
        assert_eq!(
            offset_to_line_column(sql, 9),
            LineColumn { line: 2, column: 1 }
        );
        assert_eq!(
            offset_to_line_column(sql, 14),
            LineColumn { line: 2, column: 6 }
        );
        assert_eq!(
            offset_to_line_column(sql, 20),
            LineColumn { line: 3, column: 1 }
        );
    }

    #[test]
    fn out_of_range_offset_clamps() {
        let sql = "SELECT 1";
        let pos = offset_to_line_column(sql, 10_000);
        assert_eq!(pos, LineColumn { line: 1, column: 9 });
    }

    #[test]
    fn multibyte_columns_count_scalars() {
        let sql = "SELECT '日本' AS x";
        // Offset of the closing quote: 8 bytes prefix + 2 × 3-byte chars.
        assert_eq!(
            offset_to_line_column(sql, 14),
            LineColumn { line: 1, column: 11 }
        );
    }

    #[test]
    fn line_column_round_trip() {
        let sql = "SELECT *\nFROM users\nWHERE id = 1";
        for offset in [0, 5, 9, 14, 20, sql.len() - 1] {
            let pos = offset_to_line_column(sql, offset);
            assert_eq!(line_column_to_offset(sql, pos.line, pos.column), Some(offset));
        }
    }

    #[test]
    fn invalid_line_column_rejected() {
        let sql = "SELECT 1";
        assert_eq!(line_column_to_offset(sql, 0, 1), None);
        assert_eq!(line_column_to_offset(sql, 1, 0), None);
        assert_eq!(line_column_to_offset(sql, 5, 1), None);
    }

    #[test]
    fn column_past_line_end_clamps() {
        let sql = "SELECT 1\nSELECT 2";
        assert_eq!(line_column_to_offset(sql, 1, 999), Some(8));
    }
}
