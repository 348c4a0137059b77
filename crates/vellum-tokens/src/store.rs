//! Per-line token cache with a monotone invalidation frontier.
//!
//! Every line below `invalid_line_start_index` has trustworthy tokens; the
//! frontier only moves forward through tokenization and backward through
//! edits. Per-line `invalid` flags additionally let a retokenization that
//! converges (the recomputed end state equals the stored next-line state)
//! jump the frontier across lines that never went stale.

use std::sync::Arc;

use tracing::trace;
use vellum_text::{Range, TextBuffer};

use crate::line_tokens::LineTokens;
use crate::metadata::TokenMetadata;
use crate::tokenizer::{TokenSpan, TokenizedLine, Tokenizer, TokenizerState};

/// Lines whose distance to the frontier is below this count as "cheap" to
/// tokenize synchronously.
const CHEAP_TOKENIZATION_WINDOW: usize = 4;

#[derive(Default)]
struct LineEntry {
    /// Tokenizer state at the *start* of this line.
    state_before: Option<Arc<dyn TokenizerState>>,
    /// Packed `(start, metadata)` pairs; `None` when never tokenized.
    tokens: Option<Box<[u32]>>,
    invalid: bool,
}

impl LineEntry {
    fn fresh() -> Self {
        LineEntry {
            state_before: None,
            tokens: None,
            invalid: true,
        }
    }
}

/// Merged `[from_line, to_line]` ranges whose tokens changed in one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokensChangedEvent {
    pub ranges: Vec<(usize, usize)>,
}

/// Accumulates changed lines, merging adjacent ones.
#[derive(Debug, Default)]
pub struct TokensEventBuilder {
    ranges: Vec<(usize, usize)>,
}

impl TokensEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_changed_tokens(&mut self, line_number: usize) {
        if let Some(last) = self.ranges.last_mut() {
            if line_number <= last.1 + 1 {
                last.1 = last.1.max(line_number);
                return;
            }
        }
        self.ranges.push((line_number, line_number));
    }

    pub fn build(self) -> Option<TokensChangedEvent> {
        if self.ranges.is_empty() {
            None
        } else {
            Some(TokensChangedEvent { ranges: self.ranges })
        }
    }
}

pub struct TokensStore {
    lines: Vec<LineEntry>,
    /// 0-based index of the first line whose cached tokens may be stale.
    invalid_line_start_index: usize,
}

impl TokensStore {
    /// Fresh store for a buffer of `line_count` lines. `initial_state` seeds
    /// the first line when a tokenizer is available.
    pub fn new(line_count: usize, initial_state: Option<Arc<dyn TokenizerState>>) -> Self {
        let mut lines = Vec::with_capacity(line_count);
        for _ in 0..line_count {
            lines.push(LineEntry::fresh());
        }
        if let (Some(state), Some(first)) = (initial_state, lines.first_mut()) {
            first.state_before = Some(state);
        }
        Self {
            lines,
            invalid_line_start_index: 0,
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// 1-based number of the first line that may need tokenization.
    pub fn invalid_line_start(&self) -> usize {
        self.invalid_line_start_index + 1
    }

    pub fn has_lines_to_tokenize(&self) -> bool {
        self.invalid_line_start_index < self.lines.len()
    }

    /// Within a few lines of the frontier, synchronous catch-up is fine.
    pub fn is_cheap_to_tokenize(&self, line_number: usize) -> bool {
        line_number <= self.invalid_line_start_index + CHEAP_TOKENIZATION_WINDOW
    }

    /// Mirror one atomic content change: drop the cache for replaced lines,
    /// make room for inserted ones, pull the frontier back to the edit.
    pub fn apply_edits(&mut self, range: &Range, inserted_line_count: usize) {
        let Range { start, end } = *range;
        let start_index = start.line - 1;
        let deleted = end.line - start.line;
        let editing = deleted.min(inserted_line_count);

        for j in 0..=editing {
            if let Some(entry) = self.lines.get_mut(start_index + j) {
                entry.invalid = true;
                entry.tokens = None;
            }
        }
        if deleted > inserted_line_count {
            let from = (start_index + editing + 1).min(self.lines.len());
            let to = (start_index + deleted + 1).min(self.lines.len());
            self.lines.drain(from..to);
        } else if inserted_line_count > deleted {
            let at = (start_index + editing + 1).min(self.lines.len());
            for i in 0..(inserted_line_count - deleted) {
                self.lines.insert(at + i, LineEntry::fresh());
            }
        }
        self.invalid_line_start_index = self.invalid_line_start_index.min(start_index);
        trace!(
            target: "model.tokens",
            start_line = start.line,
            deleted,
            inserted = inserted_line_count,
            frontier = self.invalid_line_start_index + 1,
            "tokens_apply_edit"
        );
    }

    /// Tokenize a single line at the frontier. Returns `false` when there is
    /// nothing left to do.
    pub fn tokenize_one_line(
        &mut self,
        buffer: &TextBuffer,
        tokenizer: &dyn Tokenizer,
        language_id: u8,
        builder: &mut TokensEventBuilder,
    ) -> bool {
        if !self.has_lines_to_tokenize() {
            return false;
        }
        let target = self.invalid_line_start_index + 1;
        self.update_tokens_until_line(buffer, tokenizer, language_id, builder, target);
        true
    }

    /// Synchronous catch-up through `line_number` (1-based).
    pub fn update_tokens_until_line(
        &mut self,
        buffer: &TextBuffer,
        tokenizer: &dyn Tokenizer,
        language_id: u8,
        builder: &mut TokensEventBuilder,
        line_number: usize,
    ) {
        let end_index = line_number.min(buffer.line_count()).saturating_sub(1);
        let mut line_index = self.invalid_line_start_index;
        while line_index <= end_index && line_index < self.lines.len() {
            let text = buffer
                .line_content(line_index + 1)
                .unwrap_or_default()
                .to_string();
            let state = match self.lines[line_index].state_before.clone() {
                Some(state) => state,
                None => tokenizer.initial_state(),
            };
            let result = tokenizer.tokenize_line(&text, &state);
            self.set_tokens(line_index, &text, &result.tokens, language_id);
            builder.register_changed_tokens(line_index + 1);
            self.lines[line_index].invalid = false;

            if line_index + 1 >= self.lines.len() {
                line_index += 1;
                break;
            }
            let converged = match &self.lines[line_index + 1].state_before {
                Some(next) => result.end_state.equals(next.as_ref()),
                None => false,
            };
            if converged {
                // Everything below that never went stale is still valid.
                let mut next = line_index + 1;
                while next < self.lines.len()
                    && !self.lines[next].invalid
                    && self.lines[next].state_before.is_some()
                {
                    next += 1;
                }
                line_index = next;
                if line_index > end_index {
                    break;
                }
            } else {
                self.lines[line_index + 1].state_before = Some(result.end_state.clone());
                line_index += 1;
            }
        }
        self.invalid_line_start_index = self
            .invalid_line_start_index
            .max(line_index.min(self.lines.len()));
    }

    /// Cached tokens for a line, or a single-token placeholder when the line
    /// sits at or past the invalidation frontier.
    pub fn get_tokens(
        &self,
        default_language_id: u8,
        line_index: usize,
        line_text: &str,
    ) -> LineTokens {
        let text_length = vellum_text::utf16::utf16_len(line_text);
        if line_index < self.invalid_line_start_index {
            if let Some(entry) = self.lines.get(line_index) {
                if let Some(tokens) = &entry.tokens {
                    return LineTokens::from_packed(tokens.clone(), text_length);
                }
            }
        }
        LineTokens::placeholder(default_language_id, text_length)
    }

    fn set_tokens(
        &mut self,
        line_index: usize,
        text: &str,
        tokens: &[TokenSpan],
        language_id: u8,
    ) {
        let mut packed: Vec<u32> = Vec::with_capacity(tokens.len().max(1) * 2);
        if tokens.is_empty() || tokens[0].start_offset != 0 {
            packed.push(0);
            packed.push(TokenMetadata::plain(language_id).0);
        }
        let limit = vellum_text::utf16::utf16_len(text);
        for span in tokens {
            if span.start_offset > limit {
                break;
            }
            if let Some(&last_start) = packed.get(packed.len().saturating_sub(2)) {
                if span.start_offset as u32 == last_start {
                    // Zero-width predecessor: overwrite instead of stacking.
                    let len = packed.len();
                    packed[len - 1] = span.metadata.0;
                    continue;
                }
            }
            packed.push(span.start_offset as u32);
            packed.push(span.metadata.0);
        }
        self.lines[line_index].tokens = Some(packed.into_boxed_slice());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::Arc;

    /// Counts unclosed `(` across lines; tokens split at whitespace.
    #[derive(Debug, PartialEq, Eq)]
    struct Depth(i32);

    impl TokenizerState for Depth {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn equals(&self, other: &dyn TokenizerState) -> bool {
            other
                .as_any()
                .downcast_ref::<Depth>()
                .map(|o| o == self)
                .unwrap_or(false)
        }
    }

    struct DepthTokenizer;

    impl Tokenizer for DepthTokenizer {
        fn initial_state(&self) -> Arc<dyn TokenizerState> {
            Arc::new(Depth(0))
        }
        fn tokenize_line(
            &self,
            line: &str,
            state: &Arc<dyn TokenizerState>,
        ) -> TokenizedLine {
            let depth = state.as_any().downcast_ref::<Depth>().map(|d| d.0).unwrap_or(0);
            let mut next = depth;
            for c in line.chars() {
                match c {
                    '(' => next += 1,
                    ')' => next -= 1,
                    _ => {}
                }
            }
            TokenizedLine {
                tokens: vec![TokenSpan {
                    start_offset: 0,
                    metadata: TokenMetadata::plain(1),
                }],
                end_state: Arc::new(Depth(next)),
            }
        }
    }

    fn store_for(buffer: &TextBuffer) -> TokensStore {
        TokensStore::new(buffer.line_count(), Some(DepthTokenizer.initial_state()))
    }

    #[test]
    fn frontier_advances_with_tokenization() {
        let buffer = TextBuffer::new("a\nb\nc", vellum_text::Eol::Lf);
        let mut store = store_for(&buffer);
        assert!(store.has_lines_to_tokenize());
        assert_eq!(store.invalid_line_start(), 1);

        let mut builder = TokensEventBuilder::new();
        assert!(store.tokenize_one_line(&buffer, &DepthTokenizer, 1, &mut builder));
        assert_eq!(store.invalid_line_start(), 2);

        store.update_tokens_until_line(&buffer, &DepthTokenizer, 1, &mut builder, 3);
        assert!(!store.has_lines_to_tokenize());
        assert_eq!(
            builder.build().unwrap().ranges,
            vec![(1, 3)]
        );
    }

    #[test]
    fn placeholder_until_tokenized() {
        let buffer = TextBuffer::new("hello\nworld", vellum_text::Eol::Lf);
        let mut store = store_for(&buffer);
        let t = store.get_tokens(7, 0, "hello");
        assert_eq!(t.count(), 1);
        assert_eq!(t.metadata(0).language_id(), 7);

        let mut builder = TokensEventBuilder::new();
        store.update_tokens_until_line(&buffer, &DepthTokenizer, 1, &mut builder, 1);
        let t = store.get_tokens(7, 0, "hello");
        assert_eq!(t.metadata(0).language_id(), 1);
    }

    #[test]
    fn edit_pulls_frontier_back() {
        let buffer = TextBuffer::new("a\nb\nc\nd", vellum_text::Eol::Lf);
        let mut store = store_for(&buffer);
        let mut builder = TokensEventBuilder::new();
        store.update_tokens_until_line(&buffer, &DepthTokenizer, 1, &mut builder, 4);
        assert!(!store.has_lines_to_tokenize());

        // Single-line change on line 2.
        store.apply_edits(&Range::new(2, 1, 2, 2), 0);
        assert_eq!(store.invalid_line_start(), 2);
        assert_eq!(store.line_count(), 4);

        // Replacing lines 2-3 with one line shrinks the store.
        store.apply_edits(&Range::new(2, 1, 3, 2), 0);
        assert_eq!(store.line_count(), 3);

        // Inserting two lines at line 1 grows it.
        store.apply_edits(&Range::new(1, 1, 1, 1), 2);
        assert_eq!(store.line_count(), 5);
        assert_eq!(store.invalid_line_start(), 1);
    }

    #[test]
    fn converged_end_state_stops_invalidation() {
        let buffer = TextBuffer::new("x\ny\nz", vellum_text::Eol::Lf);
        let mut store = store_for(&buffer);
        let mut builder = TokensEventBuilder::new();
        store.update_tokens_until_line(&buffer, &DepthTokenizer, 1, &mut builder, 3);

        // Invalidate only line 1; retokenizing it converges (depth still 0),
        // so the frontier jumps straight past the untouched lines.
        store.apply_edits(&Range::new(1, 1, 1, 2), 0);
        assert_eq!(store.invalid_line_start(), 1);
        let mut builder = TokensEventBuilder::new();
        store.tokenize_one_line(&buffer, &DepthTokenizer, 1, &mut builder);
        assert!(!store.has_lines_to_tokenize());
        assert_eq!(builder.build().unwrap().ranges, vec![(1, 1)]);
    }

    #[test]
    fn event_builder_merges_adjacent_lines() {
        let mut b = TokensEventBuilder::new();
        b.register_changed_tokens(1);
        b.register_changed_tokens(2);
        b.register_changed_tokens(3);
        b.register_changed_tokens(7);
        b.register_changed_tokens(8);
        assert_eq!(b.build().unwrap().ranges, vec![(1, 3), (7, 8)]);
    }
}
