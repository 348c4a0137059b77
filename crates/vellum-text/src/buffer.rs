//! Array-of-lines text buffer with batch edit application.

use std::cell::{Cell, RefCell};

use tracing::trace;

use crate::edits::{
    normalize_eol, split_lines, ApplyEditsResult, ContentChange, EditOperation, RawChange,
};
use crate::position::{Position, Range};
use crate::utf16;
use crate::{Eol, EolPreference, TextError};

const BOM: char = '\u{FEFF}';

/// In-memory text buffer: line contents (no terminators) plus one EOL value.
pub struct TextBuffer {
    lines: Vec<String>,
    eol: Eol,
    bom: bool,
    /// Lazily rebuilt prefix sums: `line_starts[i]` is the UTF-16 offset of
    /// the start of line `i + 1`. Invalidated by every mutation.
    line_starts: RefCell<Vec<usize>>,
    line_starts_valid: Cell<bool>,
}

impl TextBuffer {
    /// Build a buffer from raw text. A leading BOM is stripped and
    /// remembered. The EOL is detected by majority (CRLF wins ties when
    /// present); `default_eol` applies when the text has no line breaks.
    pub fn new(text: &str, default_eol: Eol) -> Self {
        let (bom, body) = match text.strip_prefix(BOM) {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let mut crlf = 0usize;
        let mut lf = 0usize;
        let bytes = body.as_bytes();
        let mut i = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'\r' => {
                    if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                        crlf += 1;
                        i += 2;
                    } else {
                        lf += 1;
                        i += 1;
                    }
                }
                b'\n' => {
                    lf += 1;
                    i += 1;
                }
                _ => i += 1,
            }
        }
        let eol = if crlf == 0 && lf == 0 {
            default_eol
        } else if crlf >= lf {
            Eol::CrLf
        } else {
            Eol::Lf
        };
        Self {
            lines: split_lines(body),
            eol,
            bom,
            line_starts: RefCell::new(Vec::new()),
            line_starts_valid: Cell::new(false),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn eol(&self) -> Eol {
        self.eol
    }

    /// Swap the buffer-wide EOL. Offsets shift; positions do not.
    pub fn set_eol(&mut self, eol: Eol) {
        self.eol = eol;
        self.invalidate_line_starts();
    }

    pub fn bom(&self) -> bool {
        self.bom
    }

    pub fn line_content(&self, line: usize) -> Result<&str, TextError> {
        if line < 1 || line > self.lines.len() {
            return Err(TextError::InvalidLineNumber {
                line,
                line_count: self.lines.len(),
            });
        }
        Ok(&self.lines[line - 1])
    }

    /// Line length in UTF-16 code units, excluding the EOL.
    pub fn line_length(&self, line: usize) -> Result<usize, TextError> {
        Ok(utf16::utf16_len(self.line_content(line)?))
    }

    pub fn line_max_column(&self, line: usize) -> Result<usize, TextError> {
        Ok(self.line_length(line)? + 1)
    }

    /// 1-based column of the first non-space/tab character; 0 for blank lines.
    pub fn line_first_non_whitespace_column(&self, line: usize) -> Result<usize, TextError> {
        let content = self.line_content(line)?;
        let mut col = 1usize;
        for ch in content.chars() {
            if ch != ' ' && ch != '\t' {
                return Ok(col);
            }
            col += ch.len_utf16();
        }
        Ok(0)
    }

    /// 1-based column just past the last non-space/tab character; 0 for
    /// blank lines.
    pub fn line_last_non_whitespace_column(&self, line: usize) -> Result<usize, TextError> {
        let content = self.line_content(line)?;
        let mut col = 1usize;
        let mut last = 0usize;
        for ch in content.chars() {
            col += ch.len_utf16();
            if ch != ' ' && ch != '\t' {
                last = col;
            }
        }
        Ok(last)
    }

    /// Total length in UTF-16 code units, EOLs included.
    pub fn value_length(&self) -> usize {
        self.with_line_starts(|starts| {
            starts[starts.len() - 1] + utf16::utf16_len(&self.lines[self.lines.len() - 1])
        })
    }

    /// Offset of a *valid* position. EOL units are part of the addressing.
    pub fn offset_at(&self, position: Position) -> usize {
        debug_assert!(position.line >= 1 && position.line <= self.lines.len());
        self.with_line_starts(|starts| starts[position.line - 1] + (position.column - 1))
    }

    /// Position of an offset, clamped to the buffer. Offsets landing inside
    /// an EOL sequence resolve to the end of that line.
    pub fn position_at(&self, offset: usize) -> Position {
        self.with_line_starts(|starts| {
            let offset = offset.min(
                starts[starts.len() - 1] + utf16::utf16_len(&self.lines[self.lines.len() - 1]),
            );
            // Greatest line start <= offset.
            let line_idx = match starts.binary_search(&offset) {
                Ok(i) => i,
                Err(i) => i - 1,
            };
            let within = offset - starts[line_idx];
            let len = utf16::utf16_len(&self.lines[line_idx]);
            Position::new(line_idx + 1, within.min(len) + 1)
        })
    }

    pub fn range_at(&self, offset: usize, length: usize) -> Range {
        Range::from_positions(self.position_at(offset), self.position_at(offset + length))
    }

    /// Extract the text covered by a *valid* range.
    pub fn value_in_range(&self, range: Range, preference: EolPreference) -> String {
        if range.is_empty() {
            return String::new();
        }
        let eol = self.preferred_eol(preference);
        let start_line = &self.lines[range.start.line - 1];
        let start_byte = utf16::byte_of(start_line, range.start.column - 1);
        if range.start.line == range.end.line {
            let end_byte = utf16::byte_of(start_line, range.end.column - 1);
            return start_line[start_byte..end_byte].to_string();
        }
        let end_line = &self.lines[range.end.line - 1];
        let end_byte = utf16::byte_of(end_line, range.end.column - 1);
        let mut out = String::new();
        out.push_str(&start_line[start_byte..]);
        for line in &self.lines[range.start.line..range.end.line - 1] {
            out.push_str(eol);
            out.push_str(line);
        }
        out.push_str(eol);
        out.push_str(&end_line[..end_byte]);
        out
    }

    /// Full buffer contents. The BOM is re-attached only when asked for.
    pub fn value(&self, preference: EolPreference, preserve_bom: bool) -> String {
        let eol = self.preferred_eol(preference);
        let mut out = String::new();
        if preserve_bom && self.bom {
            out.push(BOM);
        }
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push_str(eol);
            }
            out.push_str(line);
        }
        out
    }

    pub fn equals(&self, other: &TextBuffer) -> bool {
        self.eol == other.eol && self.lines == other.lines
    }

    /// Apply a batch of non-overlapping edits.
    ///
    /// Operations are applied from the end of the buffer toward the start so
    /// that each operation's coordinates stay valid while earlier ones are
    /// still pending. `raw_changes` and `changes` are reported in that same
    /// application order; `reverse_edits` restore the pre-edit text when
    /// applied as one batch.
    pub fn apply_edits(
        &mut self,
        operations: Vec<EditOperation>,
        record_trim_auto_whitespace: bool,
    ) -> Result<ApplyEditsResult, TextError> {
        if operations.is_empty() {
            return Ok(ApplyEditsResult {
                raw_changes: Vec::new(),
                changes: Vec::new(),
                reverse_edits: Vec::new(),
                trim_auto_whitespace_line_numbers: Vec::new(),
            });
        }

        // Sort ascending by range; reject overlap (touching is fine).
        let mut ops: Vec<ValidatedOp> = operations
            .into_iter()
            .map(|op| {
                let text = match &op.text {
                    Some(t) if !t.is_empty() => normalize_eol(t, self.eol),
                    _ => String::new(),
                };
                ValidatedOp {
                    range: op.range,
                    text,
                    force_move_markers: op.force_move_markers,
                    is_auto_whitespace_edit: op.is_auto_whitespace_edit,
                    range_offset: 0,
                    range_length: 0,
                    old_text: String::new(),
                }
            })
            .collect();
        ops.sort_by(|a, b| (a.range.start, a.range.end).cmp(&(b.range.start, b.range.end)));
        for pair in ops.windows(2) {
            if pair[1].range.start < pair[0].range.end {
                return Err(TextError::OverlappingEdits);
            }
        }

        // Pre-edit offsets and replaced text (for reversal) while the
        // prefix sums are still valid.
        for op in ops.iter_mut() {
            op.range_offset = self.offset_at(op.range.start);
            op.range_length = self.offset_at(op.range.end) - op.range_offset;
            op.old_text = self.value_in_range(op.range, EolPreference::TextDefined);
        }

        let inverse_ranges = inverse_edit_ranges(&ops);
        let reverse_edits: Vec<EditOperation> = ops
            .iter()
            .zip(inverse_ranges.iter())
            .map(|(op, range)| EditOperation {
                range: *range,
                text: if op.old_text.is_empty() {
                    None
                } else {
                    Some(op.old_text.clone())
                },
                force_move_markers: false,
                is_auto_whitespace_edit: false,
            })
            .collect();

        // Apply back to front.
        let mut raw_changes = Vec::new();
        let mut changes = Vec::new();
        for op in ops.iter().rev() {
            self.apply_one(op, &mut raw_changes);
            changes.push(ContentChange {
                range: op.range,
                range_offset: op.range_offset,
                range_length: op.range_length,
                text: op.text.clone(),
                force_move_markers: op.force_move_markers,
            });
        }
        self.invalidate_line_starts();

        let mut trim_lines = Vec::new();
        if record_trim_auto_whitespace {
            for (op, inverse) in ops.iter().zip(inverse_ranges.iter()) {
                if !op.is_auto_whitespace_edit || !op.range.is_empty() {
                    continue;
                }
                for line in inverse.start.line..=inverse.end.line {
                    let Some(content) = self.lines.get(line - 1) else { break };
                    if !content.is_empty()
                        && content.chars().all(|c| c == ' ' || c == '\t')
                    {
                        trim_lines.push(line);
                    }
                }
            }
            trim_lines.sort_unstable();
            trim_lines.dedup();
        }

        trace!(
            target: "text.buffer",
            ops = changes.len(),
            raw_events = raw_changes.len(),
            lines = self.lines.len(),
            "apply_edits"
        );

        Ok(ApplyEditsResult {
            raw_changes,
            changes,
            reverse_edits,
            trim_auto_whitespace_line_numbers: trim_lines,
        })
    }

    /// Splice one operation into the line array, appending its raw events.
    fn apply_one(&mut self, op: &ValidatedOp, raw: &mut Vec<RawChange>) {
        let Range { start, end } = op.range;
        let start_byte = utf16::byte_of(&self.lines[start.line - 1], start.column - 1);
        let end_byte = utf16::byte_of(&self.lines[end.line - 1], end.column - 1);
        let text_lines = split_lines(&op.text);

        if text_lines.len() == 1 && start.line == end.line {
            let line = &mut self.lines[start.line - 1];
            line.replace_range(start_byte..end_byte, &text_lines[0]);
            raw.push(RawChange::LineChanged {
                line: start.line,
                content: line.clone(),
            });
            return;
        }

        let prefix = self.lines[start.line - 1][..start_byte].to_string();
        let suffix = self.lines[end.line - 1][end_byte..].to_string();
        let mut new_lines = Vec::with_capacity(text_lines.len());
        if text_lines.len() == 1 {
            new_lines.push(format!("{}{}{}", prefix, text_lines[0], suffix));
        } else {
            let last = text_lines.len() - 1;
            new_lines.push(format!("{}{}", prefix, text_lines[0]));
            for mid in &text_lines[1..last] {
                new_lines.push(mid.clone());
            }
            new_lines.push(format!("{}{}", text_lines[last], suffix));
        }
        self.lines.splice(start.line - 1..end.line, new_lines);

        let span_lines = end.line - start.line;
        let insert_lines = text_lines.len() - 1;
        let editing = span_lines.min(insert_lines);
        for j in 0..=editing {
            raw.push(RawChange::LineChanged {
                line: start.line + j,
                content: self.lines[start.line - 1 + j].clone(),
            });
        }
        if span_lines > insert_lines {
            raw.push(RawChange::LinesDeleted {
                from_line: start.line + editing + 1,
                to_line: end.line,
            });
        }
        if insert_lines > span_lines {
            raw.push(RawChange::LinesInserted {
                from_line: start.line + editing + 1,
                to_line: start.line + insert_lines,
                contents: self.lines[start.line + editing..start.line + insert_lines].to_vec(),
            });
        }
    }

    fn preferred_eol(&self, preference: EolPreference) -> &'static str {
        match preference {
            EolPreference::TextDefined => self.eol.as_str(),
            EolPreference::Lf => "\n",
            EolPreference::CrLf => "\r\n",
        }
    }

    fn invalidate_line_starts(&self) {
        self.line_starts_valid.set(false);
    }

    fn with_line_starts<T>(&self, f: impl FnOnce(&[usize]) -> T) -> T {
        if !self.line_starts_valid.get() {
            let mut starts = self.line_starts.borrow_mut();
            starts.clear();
            starts.reserve(self.lines.len());
            let eol_units = self.eol.units();
            let mut acc = 0usize;
            for line in &self.lines {
                starts.push(acc);
                acc += utf16::utf16_len(line) + eol_units;
            }
            self.line_starts_valid.set(true);
        }
        f(&self.line_starts.borrow())
    }
}

struct ValidatedOp {
    range: Range,
    text: String,
    force_move_markers: bool,
    is_auto_whitespace_edit: bool,
    range_offset: usize,
    range_length: usize,
    old_text: String,
}

/// For ascending, non-overlapping operations, compute the range each
/// operation's replacement text occupies once the whole batch is applied.
fn inverse_edit_ranges(ops: &[ValidatedOp]) -> Vec<Range> {
    let mut result: Vec<Range> = Vec::with_capacity(ops.len());
    let mut prev: Option<(&ValidatedOp, Range)> = None;
    for op in ops {
        let (line_delta, column_delta) = match &prev {
            Some((p_op, p_res)) => {
                let line_delta = p_res.end.line as isize - p_op.range.end.line as isize;
                let column_delta = if p_op.range.end.line == op.range.start.line {
                    p_res.end.column as isize - p_op.range.end.column as isize
                } else {
                    0
                };
                (line_delta, column_delta)
            }
            None => (0, 0),
        };
        let start_line = (op.range.start.line as isize + line_delta) as usize;
        let start_column = (op.range.start.column as isize + column_delta) as usize;
        let range = if op.text.is_empty() {
            Range::collapsed(Position::new(start_line, start_column))
        } else {
            let lines = split_lines(&op.text);
            if lines.len() == 1 {
                Range::new(
                    start_line,
                    start_column,
                    start_line,
                    start_column + utf16::utf16_len(&lines[0]),
                )
            } else {
                Range::new(
                    start_line,
                    start_column,
                    start_line + lines.len() - 1,
                    utf16::utf16_len(&lines[lines.len() - 1]) + 1,
                )
            }
        };
        result.push(range);
        prev = Some((op, range));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(text: &str) -> TextBuffer {
        TextBuffer::new(text, Eol::Lf)
    }

    #[test]
    fn construction_detects_eol() {
        assert_eq!(buf("a\nb").eol(), Eol::Lf);
        assert_eq!(buf("a\r\nb").eol(), Eol::CrLf);
        assert_eq!(buf("plain").eol(), Eol::Lf);
        assert_eq!(TextBuffer::new("plain", Eol::CrLf).eol(), Eol::CrLf);
        // CRLF wins ties.
        assert_eq!(buf("a\r\nb\nc").eol(), Eol::CrLf);
    }

    #[test]
    fn construction_strips_bom() {
        let b = buf("\u{FEFF}hi");
        assert!(b.bom());
        assert_eq!(b.line_content(1).unwrap(), "hi");
        assert_eq!(b.value(EolPreference::TextDefined, true), "\u{FEFF}hi");
        assert_eq!(b.value(EolPreference::TextDefined, false), "hi");
    }

    #[test]
    fn offset_position_round_trip() {
        let b = buf("ab\ncdef\n\ng");
        assert_eq!(b.line_count(), 4);
        for line in 1..=b.line_count() {
            for column in 1..=b.line_max_column(line).unwrap() {
                let p = Position::new(line, column);
                assert_eq!(b.position_at(b.offset_at(p)), p, "round trip {:?}", p);
            }
        }
    }

    #[test]
    fn offsets_count_eol_units() {
        let lf = buf("ab\ncd");
        assert_eq!(lf.offset_at(Position::new(2, 1)), 3);
        let crlf = TextBuffer::new("ab\r\ncd", Eol::Lf);
        assert_eq!(crlf.offset_at(Position::new(2, 1)), 4);
        assert_eq!(crlf.value_length(), 6);
    }

    #[test]
    fn offset_inside_crlf_resolves_to_line_end() {
        let b = TextBuffer::new("ab\r\ncd", Eol::Lf);
        assert_eq!(b.position_at(3), Position::new(1, 3));
    }

    #[test]
    fn astral_columns_are_two_units() {
        let b = buf("a\u{1F600}b");
        assert_eq!(b.line_length(1).unwrap(), 4);
        assert_eq!(b.offset_at(Position::new(1, 4)), 3);
        assert_eq!(b.position_at(4), Position::new(1, 5));
    }

    #[test]
    fn simple_insert_emits_line_changed() {
        let mut b = buf("abc\ndef");
        let r = b
            .apply_edits(
                vec![EditOperation::insert(Position::new(1, 2), "X")],
                false,
            )
            .unwrap();
        assert_eq!(b.value(EolPreference::TextDefined, false), "aXbc\ndef");
        assert_eq!(
            r.raw_changes,
            vec![RawChange::LineChanged { line: 1, content: "aXbc".into() }]
        );
        assert_eq!(r.changes.len(), 1);
        assert_eq!(r.changes[0].range_offset, 1);
        assert_eq!(r.changes[0].range_length, 0);
        assert_eq!(r.changes[0].text, "X");
    }

    #[test]
    fn multi_line_insert_raw_events() {
        let mut b = buf("hello world");
        let r = b
            .apply_edits(
                vec![EditOperation::insert(Position::new(1, 6), "\nnew\n")],
                false,
            )
            .unwrap();
        assert_eq!(
            b.value(EolPreference::TextDefined, false),
            "hello\nnew\n world"
        );
        assert_eq!(
            r.raw_changes,
            vec![
                RawChange::LineChanged { line: 1, content: "hello".into() },
                RawChange::LinesInserted {
                    from_line: 2,
                    to_line: 3,
                    contents: vec!["new".into(), " world".into()],
                },
            ]
        );
    }

    #[test]
    fn multi_line_delete_raw_events() {
        let mut b = buf("one\ntwo\nthree");
        let r = b
            .apply_edits(vec![EditOperation::delete(Range::new(1, 2, 3, 3))], false)
            .unwrap();
        assert_eq!(b.value(EolPreference::TextDefined, false), "oree");
        assert_eq!(
            r.raw_changes,
            vec![
                RawChange::LineChanged { line: 1, content: "oree".into() },
                RawChange::LinesDeleted { from_line: 2, to_line: 3 },
            ]
        );
    }

    #[test]
    fn batch_edits_apply_back_to_front() {
        let mut b = buf("abcdef");
        let r = b
            .apply_edits(
                vec![
                    EditOperation::insert(Position::new(1, 2), "1"),
                    EditOperation::insert(Position::new(1, 5), "2"),
                ],
                false,
            )
            .unwrap();
        assert_eq!(b.value(EolPreference::TextDefined, false), "a1bcd2ef");
        // Later-in-document change reported first.
        assert_eq!(r.changes[0].range_offset, 4);
        assert_eq!(r.changes[1].range_offset, 1);
    }

    #[test]
    fn overlapping_edits_rejected() {
        let mut b = buf("abcdef");
        let err = b.apply_edits(
            vec![
                EditOperation::delete(Range::new(1, 1, 1, 4)),
                EditOperation::delete(Range::new(1, 3, 1, 6)),
            ],
            false,
        );
        assert_eq!(err.unwrap_err(), TextError::OverlappingEdits);
    }

    #[test]
    fn reverse_edits_restore_content() {
        let original = "alpha\nbeta\ngamma";
        let mut b = buf(original);
        let r = b
            .apply_edits(
                vec![
                    EditOperation::replace(Range::new(1, 1, 1, 6), "A"),
                    EditOperation::replace(Range::new(2, 2, 3, 2), "<>\n<>"),
                ],
                false,
            )
            .unwrap();
        assert_ne!(b.value(EolPreference::TextDefined, false), original);
        b.apply_edits(r.reverse_edits, false).unwrap();
        assert_eq!(b.value(EolPreference::TextDefined, false), original);
    }

    #[test]
    fn reverse_edits_restore_multiple_same_line() {
        let original = "abcdef";
        let mut b = buf(original);
        let r = b
            .apply_edits(
                vec![
                    EditOperation::replace(Range::new(1, 1, 1, 3), "xx!"),
                    EditOperation::replace(Range::new(1, 4, 1, 6), ""),
                ],
                false,
            )
            .unwrap();
        assert_eq!(b.value(EolPreference::TextDefined, false), "xx!cf");
        b.apply_edits(r.reverse_edits, false).unwrap();
        assert_eq!(b.value(EolPreference::TextDefined, false), original);
    }

    #[test]
    fn trim_candidates_recorded_for_auto_whitespace_edits() {
        let mut b = buf("if x {");
        let r = b
            .apply_edits(
                vec![EditOperation::insert(Position::new(1, 7), "\n    ").auto_whitespace()],
                true,
            )
            .unwrap();
        assert_eq!(r.trim_auto_whitespace_line_numbers, vec![2]);

        // Plain edits do not record candidates.
        let mut b2 = buf("if x {");
        let r2 = b2
            .apply_edits(
                vec![EditOperation::insert(Position::new(1, 7), "\n    ")],
                true,
            )
            .unwrap();
        assert!(r2.trim_auto_whitespace_line_numbers.is_empty());
    }

    #[test]
    fn value_in_range_eol_preference() {
        let b = TextBuffer::new("a\r\nb\r\nc", Eol::Lf);
        let r = Range::new(1, 1, 3, 2);
        assert_eq!(b.value_in_range(r, EolPreference::TextDefined), "a\r\nb\r\nc");
        assert_eq!(b.value_in_range(r, EolPreference::Lf), "a\nb\nc");
        let b2 = buf("a\nb");
        assert_eq!(
            b2.value_in_range(Range::new(1, 1, 2, 2), EolPreference::CrLf),
            "a\r\nb"
        );
    }

    #[test]
    fn set_eol_keeps_positions_shifts_offsets() {
        let mut b = TextBuffer::new("a\r\nb", Eol::Lf);
        assert_eq!(b.offset_at(Position::new(2, 1)), 3);
        b.set_eol(Eol::Lf);
        assert_eq!(b.line_count(), 2);
        assert_eq!(b.offset_at(Position::new(2, 1)), 2);
        assert_eq!(b.value(EolPreference::TextDefined, false), "a\nb");
    }

    #[test]
    fn inserted_text_is_normalized_to_buffer_eol() {
        let mut b = TextBuffer::new("a\r\nb", Eol::Lf);
        assert_eq!(b.eol(), Eol::CrLf);
        let r = b
            .apply_edits(
                vec![EditOperation::insert(Position::new(1, 2), "x\ny")],
                false,
            )
            .unwrap();
        assert_eq!(r.changes[0].text, "x\r\ny");
        assert_eq!(b.value(EolPreference::TextDefined, false), "ax\r\ny\r\nb");
    }
}
