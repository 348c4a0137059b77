//! Text search over the buffer.
//!
//! Queries are compiled to a `regex::Regex` (literal queries are escaped
//! first) and run line by line over the requested scope. Offsets reported
//! back to callers are UTF-16 columns, converted from the regex engine's
//! byte offsets per match.

use regex::Regex;
use vellum_text::{utf16, Position, Range, TextBuffer};

/// Hard cap applied when the caller does not supply a limit.
pub const DEFAULT_FIND_LIMIT: usize = 999;

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub pattern: String,
    pub is_regex: bool,
    pub match_case: bool,
    pub whole_word: bool,
}

impl SearchQuery {
    pub fn literal(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            is_regex: false,
            match_case: true,
            whole_word: false,
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            is_regex: true,
            match_case: true,
            whole_word: false,
        }
    }

    pub fn compile(&self) -> Option<Regex> {
        if self.pattern.is_empty() {
            return None;
        }
        let mut source = if self.is_regex {
            self.pattern.clone()
        } else {
            regex::escape(&self.pattern)
        };
        if self.whole_word {
            source = format!(r"\b(?:{source})\b");
        }
        if !self.match_case {
            source = format!("(?i){source}");
        }
        Regex::new(&source).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindMatch {
    pub range: Range,
    /// Capture groups (full match first) when requested.
    pub matches: Option<Vec<String>>,
}

/// All matches inside `scope`, at most `limit`.
pub fn find_matches(
    buffer: &TextBuffer,
    query: &SearchQuery,
    scope: Range,
    capture_matches: bool,
    limit: usize,
) -> Vec<FindMatch> {
    let Some(re) = query.compile() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for line in scope.start.line..=scope.end.line {
        let Ok(content) = buffer.line_content(line) else { break };
        let (slice_start, slice) = line_slice(content, &scope, line);
        for m in re.find_iter(slice) {
            if out.len() >= limit {
                return out;
            }
            let start_col = slice_start + utf16::utf16_of_byte(slice, m.start()) + 1;
            let end_col = slice_start + utf16::utf16_of_byte(slice, m.end()) + 1;
            let range = Range::new(line, start_col, line, end_col);
            let matches = if capture_matches {
                re.captures(&slice[m.start()..]).map(|caps| {
                    caps.iter()
                        .map(|g| g.map(|g| g.as_str().to_string()).unwrap_or_default())
                        .collect()
                })
            } else {
                None
            };
            out.push(FindMatch { range, matches });
        }
    }
    out
}

/// First match at or after `position`, wrapping around to the top.
pub fn find_next_match(
    buffer: &TextBuffer,
    query: &SearchQuery,
    position: Position,
    capture_matches: bool,
) -> Option<FindMatch> {
    let all = all_matches(buffer, query, capture_matches);
    all.iter()
        .find(|m| m.range.start >= position)
        .or_else(|| all.first())
        .cloned()
}

/// Last match strictly before `position`, wrapping around to the bottom.
pub fn find_previous_match(
    buffer: &TextBuffer,
    query: &SearchQuery,
    position: Position,
    capture_matches: bool,
) -> Option<FindMatch> {
    let all = all_matches(buffer, query, capture_matches);
    all.iter()
        .rev()
        .find(|m| m.range.start < position)
        .or_else(|| all.last())
        .cloned()
}

fn all_matches(buffer: &TextBuffer, query: &SearchQuery, capture: bool) -> Vec<FindMatch> {
    let full = Range::new(
        1,
        1,
        buffer.line_count(),
        buffer.line_max_column(buffer.line_count()).unwrap_or(1),
    );
    find_matches(buffer, query, full, capture, usize::MAX)
}

/// Byte slice of one line restricted to the scope's columns, plus the UTF-16
/// offset the slice starts at.
fn line_slice<'a>(content: &'a str, scope: &Range, line: usize) -> (usize, &'a str) {
    let mut start_units = 0usize;
    let mut start_byte = 0usize;
    let mut end_byte = content.len();
    if line == scope.start.line {
        start_units = scope.start.column - 1;
        start_byte = utf16::byte_of(content, start_units);
    }
    if line == scope.end.line {
        end_byte = utf16::byte_of(content, scope.end.column - 1);
    }
    if start_byte > end_byte {
        return (start_units, "");
    }
    (start_units, &content[start_byte..end_byte])
}
