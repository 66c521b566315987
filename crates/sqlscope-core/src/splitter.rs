//! Dialect-aware statement splitting.
//!
//! Breaks source text into statement chunks on top-level `;`, ignoring
//! separators inside string literals, quoted identifiers, comments, and
//! dollar-quoted bodies. Spans point at the first non-whitespace byte of
//! each statement and just past its last byte before the separator; a final
//! statement without a terminating `;` is still emitted.
//!
//! An unterminated string or comment yields one `UNTERMINATED_LITERAL`
//! issue anchored at the opener, and the trailing chunk runs from the
//! statement start to end of input so downstream stages still see it.

use crate::types::{issue_codes, Dialect, Issue, Span};

/// One statement chunk produced by the splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitStatement {
    /// The statement text, comments and surrounding whitespace trimmed.
    pub text: String,
    /// Byte range of `text` within the original source.
    pub span: Span,
    /// Source file name, when the caller supplied one.
    pub source_name: Option<String>,
    /// Comments immediately preceding the statement, if any.
    pub preceding_comments: Option<String>,
}

/// The outcome of splitting one source buffer.
#[derive(Debug, Clone, Default)]
pub struct SplitResult {
    pub statements: Vec<SplitStatement>,
    pub issues: Vec<Issue>,
}

/// Tokenization quirks the splitter honors per dialect.
struct SplitterRules {
    /// `#` starts a line comment (BigQuery).
    hash_line_comments: bool,
    /// `$tag$ ... $tag$` bodies (Postgres and friends).
    dollar_quoting: bool,
    /// `` ` `` quoted identifiers (BigQuery).
    backticks: bool,
    /// `[...]` bracketed identifiers.
    brackets: bool,
    /// `/* /* */ */` nests (Postgres).
    nested_block_comments: bool,
}

impl SplitterRules {
    fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Postgres => Self {
                hash_line_comments: false,
                dollar_quoting: true,
                backticks: false,
                brackets: false,
                nested_block_comments: true,
            },
            Dialect::Snowflake => Self {
                hash_line_comments: false,
                dollar_quoting: true,
                backticks: false,
                brackets: false,
                nested_block_comments: false,
            },
            Dialect::Bigquery => Self {
                hash_line_comments: true,
                dollar_quoting: false,
                backticks: true,
                brackets: false,
                nested_block_comments: false,
            },
            // Permissive: accept every quoting style the supported
            // dialects use, mirroring the permissive parser dialect.
            Dialect::Ansi => Self {
                hash_line_comments: false,
                dollar_quoting: true,
                backticks: true,
                brackets: true,
                nested_block_comments: false,
            },
        }
    }
}

/// What kind of region is currently open, with its opener offset.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Region {
    Quoted { opener: usize, close: char },
    LineComment,
    BlockComment { opener: usize, depth: usize },
    DollarQuote { opener: usize, tag: String },
}

/// Splits `sql` into statement chunks with spans and preceding comments.
pub fn split_statements(sql: &str, dialect: Dialect) -> SplitResult {
    split_statements_named(sql, dialect, None)
}

/// Like [`split_statements`], stamping each chunk with a source name.
pub fn split_statements_named(
    sql: &str,
    dialect: Dialect,
    source_name: Option<&str>,
) -> SplitResult {
    let rules = SplitterRules::for_dialect(dialect);
    let mut result = SplitResult::default();
    if sql.is_empty() {
        return result;
    }

    let len = sql.len();
    let mut start = 0usize;
    let mut i = 0usize;
    let mut region: Option<Region> = None;
    // Comment ranges seen before the first statement token since the last
    // boundary; becomes `preceding_comments` of the next chunk.
    let mut pending_comments: Vec<(usize, usize)> = Vec::new();
    let mut seen_content = false;

    while i < len {
        if let Some(current) = region.clone() {
            match current {
                Region::DollarQuote { tag, .. } => {
                    if sql[i..].starts_with(tag.as_str()) {
                        i += tag.len();
                        region = None;
                    } else {
                        i += char_len_at(sql, i);
                    }
                }
                Region::LineComment => {
                    let (ch, advance) = char_at(sql, i);
                    i += advance;
                    if ch == '\n' || ch == '\r' {
                        if !seen_content {
                            close_pending_comment(&mut pending_comments, i - advance);
                        }
                        region = None;
                    }
                }
                Region::BlockComment { opener, depth } => {
                    if sql[i..].starts_with("*/") {
                        i += 2;
                        if depth == 1 {
                            if !seen_content {
                                close_pending_comment(&mut pending_comments, i);
                            }
                            region = None;
                        } else {
                            region = Some(Region::BlockComment {
                                opener,
                                depth: depth - 1,
                            });
                        }
                    } else if rules.nested_block_comments && sql[i..].starts_with("/*") {
                        i += 2;
                        region = Some(Region::BlockComment {
                            opener,
                            depth: depth + 1,
                        });
                    } else {
                        i += char_len_at(sql, i);
                    }
                }
                Region::Quoted { close, .. } => {
                    let (ch, advance) = char_at(sql, i);
                    i += advance;
                    if ch == close {
                        // A doubled closer is an escape, not a terminator.
                        if peek_char(sql, i) == Some(close) {
                            i += close.len_utf8();
                        } else {
                            region = None;
                        }
                    }
                }
            }
            continue;
        }

        let (ch, advance) = char_at(sql, i);
        match ch {
            '\'' => {
                region = Some(Region::Quoted {
                    opener: i,
                    close: '\'',
                });
            }
            '"' => {
                region = Some(Region::Quoted {
                    opener: i,
                    close: '"',
                });
            }
            '`' if rules.backticks => {
                region = Some(Region::Quoted {
                    opener: i,
                    close: '`',
                });
            }
            '[' if rules.brackets => {
                region = Some(Region::Quoted {
                    opener: i,
                    close: ']',
                });
            }
            '-' if sql[i + 1..].starts_with('-') => {
                if !seen_content {
                    pending_comments.push((i, i));
                }
                region = Some(Region::LineComment);
                i += 2;
                continue;
            }
            '#' if rules.hash_line_comments => {
                if !seen_content {
                    pending_comments.push((i, i));
                }
                region = Some(Region::LineComment);
                i += advance;
                continue;
            }
            '/' if sql[i + 1..].starts_with('*') => {
                if !seen_content {
                    pending_comments.push((i, i));
                }
                region = Some(Region::BlockComment {
                    opener: i,
                    depth: 1,
                });
                i += 2;
                continue;
            }
            '$' if rules.dollar_quoting => {
                seen_content = true;
                if let Some((tag, end_idx)) = detect_dollar_tag(sql, i) {
                    region = Some(Region::DollarQuote { opener: i, tag });
                    i = end_idx;
                    continue;
                }
            }
            ';' => {
                push_chunk(
                    &mut result.statements,
                    sql,
                    start,
                    i,
                    source_name,
                    &rules,
                    &mut pending_comments,
                );
                start = i + advance;
                seen_content = false;
                i += advance;
                continue;
            }
            c if c.is_whitespace() => {}
            _ => seen_content = true,
        }

        i += advance;
    }

    // An open region at end of input means an unterminated literal/comment.
    if let Some(region) = &region {
        let opener = match region {
            Region::Quoted { opener, .. } => Some((*opener, char_len_at(sql, *opener))),
            Region::BlockComment { opener, .. } => Some((*opener, 2)),
            Region::DollarQuote { opener, tag } => Some((*opener, tag.len())),
            Region::LineComment => None,
        };
        if let Some((opener, opener_len)) = opener {
            let mut issue = Issue::error(
                issue_codes::UNTERMINATED_LITERAL,
                "String or comment not closed before end of input",
            )
            .with_span(Span::new(opener, opener + opener_len));
            if let Some(name) = source_name {
                issue = issue.with_source_name(name);
            }
            result.issues.push(issue);
        }
    }

    push_chunk(
        &mut result.statements,
        sql,
        start,
        len,
        source_name,
        &rules,
        &mut pending_comments,
    );
    result
}

/// Extends the last pending comment range to `end`.
fn close_pending_comment(pending: &mut [(usize, usize)], end: usize) {
    if let Some(last) = pending.last_mut() {
        last.1 = end;
    }
}

fn push_chunk(
    statements: &mut Vec<SplitStatement>,
    sql: &str,
    start: usize,
    end: usize,
    source_name: Option<&str>,
    rules: &SplitterRules,
    pending_comments: &mut Vec<(usize, usize)>,
) {
    let comments: Vec<(usize, usize)> = std::mem::take(pending_comments);
    let Some((s, e)) = trim_chunk(sql, start, end, rules) else {
        return;
    };

    let preceding: Vec<&str> = comments
        .iter()
        .filter(|(cs, ce)| ce > cs && *ce <= s)
        .map(|(cs, ce)| sql[*cs..*ce].trim())
        .filter(|c| !c.is_empty())
        .collect();

    statements.push(SplitStatement {
        text: sql[s..e].to_string(),
        span: Span::new(s, e),
        source_name: source_name.map(|n| n.to_string()),
        preceding_comments: if preceding.is_empty() {
            None
        } else {
            Some(preceding.join("\n"))
        },
    });
}

/// Trims whitespace and leading comments off a raw chunk range. Returns
/// `None` when nothing but whitespace and comments remains.
fn trim_chunk(
    sql: &str,
    start: usize,
    end: usize,
    rules: &SplitterRules,
) -> Option<(usize, usize)> {
    if start >= end {
        return None;
    }

    let bytes = sql.as_bytes();
    let mut s = start;
    let mut e = end;

    while s < e {
        if s + 1 < e && bytes[s] == b'-' && bytes[s + 1] == b'-' {
            s = skip_line_comment(bytes, s + 2, e);
            continue;
        }
        if s + 1 < e && bytes[s] == b'/' && bytes[s + 1] == b'*' {
            s = skip_block_comment(bytes, s + 2, e, rules.nested_block_comments);
            continue;
        }
        match bytes[s] {
            b'#' if rules.hash_line_comments => {
                s = skip_line_comment(bytes, s + 1, e);
            }
            b' ' | b'\t' | b'\r' | b'\n' => s += 1,
            _ => break,
        }
    }

    while s < e {
        match bytes[e - 1] {
            b' ' | b'\t' | b'\r' | b'\n' => e -= 1,
            _ => break,
        }
    }

    (s < e).then_some((s, e))
}

fn skip_line_comment(bytes: &[u8], mut index: usize, end: usize) -> usize {
    while index < end {
        let byte = bytes[index];
        index += 1;
        if byte == b'\n' || byte == b'\r' {
            break;
        }
    }
    index
}

fn skip_block_comment(bytes: &[u8], mut index: usize, end: usize, nested: bool) -> usize {
    let mut depth = 1usize;
    while index < end {
        if index + 1 < end && bytes[index] == b'*' && bytes[index + 1] == b'/' {
            index += 2;
            depth -= 1;
            if depth == 0 {
                return index;
            }
            continue;
        }
        if nested && index + 1 < end && bytes[index] == b'/' && bytes[index + 1] == b'*' {
            index += 2;
            depth += 1;
            continue;
        }
        index += 1;
    }
    end
}

/// Detects a `$tag$` opener at `start`; returns the full tag and the offset
/// just past it.
fn detect_dollar_tag(sql: &str, start: usize) -> Option<(String, usize)> {
    let len = sql.len();
    if start + 1 >= len {
        return None;
    }

    let mut idx = start + 1;
    while idx < len {
        let (ch, advance) = char_at(sql, idx);
        idx += advance;
        if ch == '$' {
            return Some((sql[start..idx].to_string(), idx));
        }
        if !(ch == '_' || ch.is_ascii_alphanumeric()) {
            return None;
        }
    }

    None
}

fn char_at(sql: &str, index: usize) -> (char, usize) {
    debug_assert!(sql.is_char_boundary(index));
    let ch = sql[index..].chars().next().expect("index at char boundary");
    (ch, ch.len_utf8())
}

fn char_len_at(sql: &str, index: usize) -> usize {
    char_at(sql, index).1
}

fn peek_char(sql: &str, index: usize) -> Option<char> {
    if index >= sql.len() || !sql.is_char_boundary(index) {
        return None;
    }
    sql[index..].chars().next()
}
