//! Edit operation and change-event types shared between the buffer and the
//! model facade.

use crate::position::{Position, Range};
use crate::Eol;

/// One requested edit: replace `range` with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOperation {
    pub range: Range,
    /// `None` and `Some("")` both mean pure deletion.
    pub text: Option<String>,
    /// Push markers/decorations at the edit boundary outward instead of
    /// honoring their stickiness.
    pub force_move_markers: bool,
    /// Marks indentation the editor itself introduced (e.g. pressing Enter
    /// copies the previous line's leading whitespace). Lines left
    /// whitespace-only by such edits become trim candidates.
    pub is_auto_whitespace_edit: bool,
}

impl EditOperation {
    pub fn replace(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            text: Some(text.into()),
            force_move_markers: false,
            is_auto_whitespace_edit: false,
        }
    }

    pub fn replace_move(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            text: Some(text.into()),
            force_move_markers: true,
            is_auto_whitespace_edit: false,
        }
    }

    pub fn insert(at: Position, text: impl Into<String>) -> Self {
        Self::replace(Range::collapsed(at), text)
    }

    pub fn delete(range: Range) -> Self {
        Self {
            range,
            text: None,
            force_move_markers: false,
            is_auto_whitespace_edit: false,
        }
    }

    pub fn auto_whitespace(mut self) -> Self {
        self.is_auto_whitespace_edit = true;
        self
    }
}

/// Atomic content delta, the unit fed to the decoration trees and the token
/// store. Offsets and lengths are UTF-16 code units including EOL units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    pub range: Range,
    pub range_offset: usize,
    pub range_length: usize,
    /// Replacement text, normalized to the buffer EOL. Empty for deletions.
    pub text: String,
    pub force_move_markers: bool,
}

impl ContentChange {
    /// Lines of the replacement text (at least one entry, possibly empty).
    pub fn lines(&self) -> Vec<String> {
        split_lines(&self.text)
    }

    /// Length of the replacement in UTF-16 code units.
    pub fn text_length(&self) -> usize {
        crate::utf16::utf16_len(&self.text)
    }
}

/// Line-level change event, suitable for replaying against a mirror of the
/// line array. Events of one batch must be applied in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawChange {
    /// The buffer was replaced wholesale.
    Flush,
    LineChanged {
        line: usize,
        content: String,
    },
    /// `[from_line, to_line]` removed, numbered in the pre-edit state.
    LinesDeleted {
        from_line: usize,
        to_line: usize,
    },
    /// New lines at `[from_line, to_line]`, numbered in the post-edit state.
    LinesInserted {
        from_line: usize,
        to_line: usize,
        contents: Vec<String>,
    },
    EolChanged {
        eol: Eol,
    },
}

/// Everything `TextBuffer::apply_edits` produces for one batch.
#[derive(Debug, Clone)]
pub struct ApplyEditsResult {
    pub raw_changes: Vec<RawChange>,
    pub changes: Vec<ContentChange>,
    /// Operations that restore the pre-edit text when applied as one batch.
    pub reverse_edits: Vec<EditOperation>,
    /// Lines left containing only whitespace by auto-whitespace edits,
    /// ascending and deduplicated. Empty unless recording was requested.
    pub trim_auto_whitespace_line_numbers: Vec<usize>,
}

/// Split `text` into lines on `\r\n`, `\r` or `\n`. Always returns at least
/// one element; a trailing newline yields a trailing empty line.
pub fn split_lines(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push(std::mem::take(&mut current));
            }
            '\n' => out.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    out.push(current);
    out
}

/// Rewrite every line break in `text` to `eol`.
pub fn normalize_eol(text: &str, eol: Eol) -> String {
    let lines = split_lines(text);
    lines.join(eol.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_lines_keeps_trailing_empty() {
        assert_eq!(split_lines(""), vec![""]);
        assert_eq!(split_lines("a"), vec!["a"]);
        assert_eq!(split_lines("a\n"), vec!["a", ""]);
        assert_eq!(split_lines("a\r\nb"), vec!["a", "b"]);
        assert_eq!(split_lines("a\rb\nc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn normalize_rewrites_mixed_breaks() {
        assert_eq!(normalize_eol("a\r\nb\nc", Eol::Lf), "a\nb\nc");
        assert_eq!(normalize_eol("a\nb", Eol::CrLf), "a\r\nb");
    }
}
