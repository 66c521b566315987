//! Identifier span search in SQL text.
//!
//! sqlparser does not expose AST node locations, so issue spans for resolved
//! names are recovered by word-boundary text search inside the statement's
//! source slice.

use crate::types::Span;
use regex::Regex;

/// Finds the byte span of an identifier in `sql`, searching from
/// `search_start`. Matches whole words case-insensitively; qualified names
/// match with optional quoting around each part.
pub(crate) fn find_identifier_span(sql: &str, identifier: &str, search_start: usize) -> Option<Span> {
    if identifier.is_empty() || search_start >= sql.len() {
        return None;
    }

    let search_text = &sql[search_start..];

    if let Some(pos) = find_word_boundary_match(search_text, identifier) {
        return Some(Span::new(
            search_start + pos,
            search_start + pos + identifier.len(),
        ));
    }

    if identifier.contains('.') {
        if let Some((pos, len)) = find_qualified_name(search_text, identifier) {
            return Some(Span::new(search_start + pos, search_start + pos + len));
        }
    }

    None
}

fn find_word_boundary_match(text: &str, identifier: &str) -> Option<usize> {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(identifier));

    if let Ok(re) = Regex::new(&pattern) {
        if let Some(m) = re.find(text) {
            return Some(m.start());
        }
    }

    // Fallback: plain case-insensitive search.
    let lower_text = text.to_lowercase();
    let lower_ident = identifier.to_lowercase();
    lower_text.find(&lower_ident)
}

fn find_qualified_name(text: &str, qualified_name: &str) -> Option<(usize, usize)> {
    let parts: Vec<&str> = qualified_name.split('.').collect();
    if parts.is_empty() {
        return None;
    }

    let pattern_parts: Vec<String> = parts
        .iter()
        .map(|part| format!(r#""?{}"?"#, regex::escape(part)))
        .collect();

    let pattern = format!(r"(?i){}", pattern_parts.join(r"\."));

    Regex::new(&pattern)
        .ok()
        .and_then(|re| re.find(text).map(|m| (m.start(), m.len())))
}
