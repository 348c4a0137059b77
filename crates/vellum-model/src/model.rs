//! The text model facade.
//!
//! One `TextModel` owns a text buffer, two decoration trees, a token store
//! and an edit stack, and sequences every mutation the same way: validate →
//! apply to the buffer → patch the derived indexes per atomic change → bump
//! the version → emit events through deferred scopes. Observers therefore
//! never see a half-applied batch.
//!
//! Invariants (hold after every public call):
//! * `version_id` strictly increases exactly when a content event is emitted.
//! * every decoration interval lies within `[0, value_length]`.
//! * the token store always has one entry per buffer line.
//! * a disposed model fails every public call with `ModelError::Disposed`.

use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, trace};
use vellum_events::{ListenerId, QueueingEmitter, SignalEmitter};
use vellum_text::{
    utf16, EditOperation, Eol, EolPreference, Position, Range, RawChange, Selection, TextBuffer,
};
use vellum_tokens::{
    LanguageId, LanguageRegistry, LineTokens, RichBrackets, TokensChangedEvent,
    TokensEventBuilder, TokensStore, Tokenizer, PLAIN_TEXT_LANGUAGE_ID,
};

use crate::decorations::{DecorationOptions, DecorationsTracker, TrackedDecoration};
use crate::editstack::EditStack;
use crate::error::ModelError;
use crate::events::{ContentChangedEvent, LanguageChangedEvent, RawContentChangedEvent};
use crate::guides;
use crate::options::{OptionsChangedEvent, OptionsUpdate, TextModelOptions};
use crate::search::{self, FindMatch, SearchQuery, DEFAULT_FIND_LIMIT};
use crate::words::{self, WordAtPosition};

static MODEL_ID: AtomicU64 = AtomicU64::new(0);

const INSTANCE_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Wall-clock budget of one background tokenization slice.
const TOKENIZATION_TIME_BUDGET: Duration = Duration::from_millis(20);
/// Lines warmed up synchronously on first editor attachment.
const WARM_UP_LINES: usize = 100;
/// Tokenization is disabled outright above either limit.
const TOO_LARGE_TOKENIZATION_UNITS: usize = 20 * 1024 * 1024;
const TOO_LARGE_TOKENIZATION_LINES: usize = 300_000;
/// Models above this size are not synced to worker mirrors.
const TOO_LARGE_SYNC_UNITS: usize = 50 * 1024 * 1024;
/// Lines at or above this length count toward long-line dominance.
const LONG_LINE_THRESHOLD: usize = 10_000;

/// A decoration as handed to API consumers.
#[derive(Debug, Clone)]
pub struct ModelDecoration {
    pub id: String,
    pub owner_id: usize,
    pub range: Range,
    pub options: Arc<DecorationOptions>,
}

/// Input to `delta_decorations` and the change accessor.
#[derive(Debug, Clone)]
pub struct DecorationSpec {
    pub range: Range,
    pub options: Arc<DecorationOptions>,
}

impl DecorationSpec {
    pub fn new(range: Range, options: Arc<DecorationOptions>) -> Self {
        Self { range, options }
    }
}

/// A bracket found by `find_next_bracket` / `find_prev_bracket`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundBracket {
    pub range: Range,
    pub open: String,
    pub close: String,
    pub is_open: bool,
}

/// Construction-time knobs.
#[derive(Debug, Clone)]
pub struct TextModelCreationOptions {
    pub options: TextModelOptions,
    pub default_eol: Eol,
    pub language: LanguageId,
    pub uri: Option<String>,
}

impl Default for TextModelCreationOptions {
    fn default() -> Self {
        Self {
            options: TextModelOptions::default(),
            default_eol: Eol::Lf,
            language: PLAIN_TEXT_LANGUAGE_ID,
            uri: None,
        }
    }
}

pub struct TextModel {
    id: String,
    uri: String,
    buffer: TextBuffer,
    options: TextModelOptions,
    default_eol: Eol,

    version_id: u64,
    alternative_version_id: u64,

    language_id: LanguageId,
    registry: Rc<RefCell<LanguageRegistry>>,
    tokenizer: Option<Arc<dyn Tokenizer>>,
    tokens_store: TokensStore,

    decorations: DecorationsTracker,
    edit_stack: EditStack,
    /// Whitespace-only lines produced by the previous edit, candidates for
    /// trimming on the next one.
    trim_auto_whitespace_lines: Option<Vec<usize>>,

    raw_content_emitter: QueueingEmitter<RawContentChangedEvent>,
    content_emitter: QueueingEmitter<ContentChangedEvent>,
    decorations_changed_emitter: SignalEmitter,
    tokens_emitter: QueueingEmitter<TokensChangedEvent>,
    language_emitter: QueueingEmitter<LanguageChangedEvent>,
    language_configuration_emitter: SignalEmitter,
    options_emitter: QueueingEmitter<OptionsChangedEvent>,
    will_dispose_emitter: SignalEmitter,

    attached_editor_count: usize,
    background_tokenization_scheduled: bool,
    is_undoing: bool,
    is_redoing: bool,
    disposed: bool,

    is_too_large_for_tokenization: bool,
    is_too_large_for_sync: bool,
    is_dominated_by_long_lines: bool,
}

impl TextModel {
    pub fn new(
        text: &str,
        creation: TextModelCreationOptions,
        registry: Rc<RefCell<LanguageRegistry>>,
    ) -> Self {
        let model_number = MODEL_ID.fetch_add(1, Ordering::Relaxed);
        let instance_letter =
            INSTANCE_LETTERS[(model_number as usize) % INSTANCE_LETTERS.len()] as char;
        let buffer = TextBuffer::new(text, creation.default_eol);

        let value_length = buffer.value_length();
        let line_count = buffer.line_count();
        let is_too_large_for_tokenization = value_length > TOO_LARGE_TOKENIZATION_UNITS
            || line_count > TOO_LARGE_TOKENIZATION_LINES;
        let is_too_large_for_sync = value_length > TOO_LARGE_SYNC_UNITS;
        let is_dominated_by_long_lines = compute_long_line_dominance(&buffer);

        let tokenizer = if is_too_large_for_tokenization {
            None
        } else {
            registry.borrow().tokenizer(creation.language)
        };
        let tokens_store = TokensStore::new(
            line_count,
            tokenizer.as_ref().map(|t| t.initial_state()),
        );

        let model = Self {
            id: format!("$model{model_number}"),
            uri: creation
                .uri
                .unwrap_or_else(|| format!("inmemory://model/{model_number}")),
            buffer,
            options: creation.options,
            default_eol: creation.default_eol,
            version_id: 1,
            alternative_version_id: 1,
            language_id: creation.language,
            registry,
            tokenizer,
            tokens_store,
            decorations: DecorationsTracker::new(instance_letter),
            edit_stack: EditStack::new(),
            trim_auto_whitespace_lines: None,
            raw_content_emitter: QueueingEmitter::new(),
            content_emitter: QueueingEmitter::new(),
            decorations_changed_emitter: SignalEmitter::new(),
            tokens_emitter: QueueingEmitter::new(),
            language_emitter: QueueingEmitter::new(),
            language_configuration_emitter: SignalEmitter::new(),
            options_emitter: QueueingEmitter::new(),
            will_dispose_emitter: SignalEmitter::new(),
            attached_editor_count: 0,
            background_tokenization_scheduled: false,
            is_undoing: false,
            is_redoing: false,
            disposed: false,
            is_too_large_for_tokenization,
            is_too_large_for_sync,
            is_dominated_by_long_lines,
        };
        debug!(target: "model.lifecycle", id = %model.id, lines = line_count, "created");
        model
    }

    /// Model with its own private registry; mostly for tests and simple
    /// hosts.
    pub fn with_defaults(text: &str) -> Self {
        Self::new(
            text,
            TextModelCreationOptions::default(),
            Rc::new(RefCell::new(LanguageRegistry::new())),
        )
    }

    // ------------------------------------------------------------------
    // identity & lifecycle
    // ------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn is_attached_to_editor(&self) -> bool {
        self.attached_editor_count > 0
    }

    pub fn on_before_attached(&mut self) -> Result<(), ModelError> {
        self.ensure_alive()?;
        self.attached_editor_count += 1;
        if self.attached_editor_count == 1 {
            self.warm_up_tokenization();
        }
        self.schedule_background_tokenization();
        Ok(())
    }

    pub fn on_before_detached(&mut self) -> Result<(), ModelError> {
        self.ensure_alive()?;
        self.attached_editor_count = self.attached_editor_count.saturating_sub(1);
        if self.attached_editor_count == 0 {
            self.background_tokenization_scheduled = false;
        }
        Ok(())
    }

    /// Content identity: same lines and same EOL.
    pub fn equals(&self, other: &TextModel) -> bool {
        self.buffer.equals(&other.buffer)
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.will_dispose_emitter.fire();
        self.raw_content_emitter.set_suppressed(true);
        self.content_emitter.set_suppressed(true);
        self.decorations_changed_emitter.set_suppressed(true);
        self.tokens_emitter.set_suppressed(true);
        self.language_emitter.set_suppressed(true);
        self.language_configuration_emitter.set_suppressed(true);
        self.options_emitter.set_suppressed(true);
        self.background_tokenization_scheduled = false;
        self.disposed = true;
        debug!(target: "model.lifecycle", id = %self.id, "disposed");
    }

    fn ensure_alive(&self) -> Result<(), ModelError> {
        if self.disposed {
            Err(ModelError::Disposed)
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // versions, options, limits
    // ------------------------------------------------------------------

    pub fn get_version_id(&self) -> u64 {
        self.version_id
    }

    /// Equal to some previously seen `version_id` exactly when undo/redo
    /// has returned the model to that state.
    pub fn get_alternative_version_id(&self) -> u64 {
        self.alternative_version_id
    }

    pub fn get_options(&self) -> TextModelOptions {
        self.options
    }

    pub fn update_options(&mut self, update: OptionsUpdate) -> Result<(), ModelError> {
        self.ensure_alive()?;
        if let Some(event) = self.options.apply(update) {
            if event.trim_auto_whitespace && !self.options.trim_auto_whitespace {
                self.trim_auto_whitespace_lines = None;
            }
            self.options_emitter.fire(event);
        }
        Ok(())
    }

    pub fn is_too_large_for_sync_resources(&self) -> bool {
        self.is_too_large_for_sync
    }

    pub fn is_too_large_for_tokenization(&self) -> bool {
        self.is_too_large_for_tokenization
    }

    pub fn is_dominated_by_long_lines(&self) -> bool {
        self.is_dominated_by_long_lines
    }

    // ------------------------------------------------------------------
    // content reads
    // ------------------------------------------------------------------

    pub fn get_value(
        &self,
        preference: EolPreference,
        preserve_bom: bool,
    ) -> Result<String, ModelError> {
        self.ensure_alive()?;
        Ok(self.buffer.value(preference, preserve_bom))
    }

    pub fn get_value_in_range(
        &self,
        range: Range,
        preference: EolPreference,
    ) -> Result<String, ModelError> {
        self.ensure_alive()?;
        let range = self.do_validate_range(range, true);
        Ok(self.buffer.value_in_range(range, preference))
    }

    pub fn get_value_length(&self) -> Result<usize, ModelError> {
        self.ensure_alive()?;
        Ok(self.buffer.value_length())
    }

    pub fn get_line_count(&self) -> Result<usize, ModelError> {
        self.ensure_alive()?;
        Ok(self.buffer.line_count())
    }

    pub fn get_line_content(&self, line_number: usize) -> Result<&str, ModelError> {
        self.ensure_alive()?;
        Ok(self.buffer.line_content(line_number)?)
    }

    pub fn get_line_length(&self, line_number: usize) -> Result<usize, ModelError> {
        self.ensure_alive()?;
        Ok(self.buffer.line_length(line_number)?)
    }

    pub fn get_line_min_column(&self, _line_number: usize) -> usize {
        1
    }

    pub fn get_line_max_column(&self, line_number: usize) -> Result<usize, ModelError> {
        self.ensure_alive()?;
        Ok(self.buffer.line_max_column(line_number)?)
    }

    pub fn get_line_first_non_whitespace_column(
        &self,
        line_number: usize,
    ) -> Result<usize, ModelError> {
        self.ensure_alive()?;
        Ok(self.buffer.line_first_non_whitespace_column(line_number)?)
    }

    pub fn get_line_last_non_whitespace_column(
        &self,
        line_number: usize,
    ) -> Result<usize, ModelError> {
        self.ensure_alive()?;
        Ok(self.buffer.line_last_non_whitespace_column(line_number)?)
    }

    pub fn get_eol(&self) -> Result<Eol, ModelError> {
        self.ensure_alive()?;
        Ok(self.buffer.eol())
    }

    pub fn get_offset_at(&self, position: Position) -> Result<usize, ModelError> {
        self.ensure_alive()?;
        let position = self.do_validate_position(position, true);
        Ok(self.buffer.offset_at(position))
    }

    pub fn get_position_at(&self, offset: usize) -> Result<Position, ModelError> {
        self.ensure_alive()?;
        Ok(self.buffer.position_at(offset))
    }

    pub fn get_full_model_range(&self) -> Result<Range, ModelError> {
        self.ensure_alive()?;
        Ok(self.full_model_range())
    }

    fn full_model_range(&self) -> Range {
        let line_count = self.buffer.line_count();
        Range::new(
            1,
            1,
            line_count,
            self.buffer.line_max_column(line_count).unwrap_or(1),
        )
    }

    // ------------------------------------------------------------------
    // validation
    // ------------------------------------------------------------------

    /// Clamp to the buffer; never lands between the halves of a surrogate
    /// pair (snaps back to the character start).
    pub fn validate_position(&self, position: Position) -> Result<Position, ModelError> {
        self.ensure_alive()?;
        Ok(self.do_validate_position(position, true))
    }

    pub fn validate_range(&self, range: Range) -> Result<Range, ModelError> {
        self.ensure_alive()?;
        Ok(self.do_validate_range(range, true))
    }

    fn do_validate_position(&self, position: Position, strict_surrogate: bool) -> Position {
        let line_count = self.buffer.line_count();
        if position.line < 1 {
            return Position::new(1, 1);
        }
        let line = position.line.min(line_count);
        let max_column = self.buffer.line_max_column(line).unwrap_or(1);
        let mut column = position.column.clamp(1, max_column);
        if position.line > line_count {
            column = max_column;
        }
        if strict_surrogate && column > 1 {
            let content = self.buffer.line_content(line).unwrap_or_default();
            if let utf16::Utf16Anchor::Interior { char_start, .. } =
                utf16::anchor(content, column - 1)
            {
                column = utf16::utf16_of_byte(content, char_start) + 1;
            }
        }
        Position::new(line, column)
    }

    /// Clamp without surrogate adjustment; decoration anchoring explicitly
    /// may split a pair.
    fn validate_position_relaxed(&self, position: Position) -> Position {
        self.do_validate_position(position, false)
    }

    fn do_validate_range(&self, range: Range, strict_surrogate: bool) -> Range {
        let start = self.validate_position_relaxed(range.start);
        let end = self.validate_position_relaxed(range.end);
        if !strict_surrogate {
            return Range::from_positions(start, end);
        }
        let start_inside = self.position_splits_pair(start);
        let end_inside = self.position_splits_pair(end);
        match (start_inside, end_inside) {
            (false, false) => Range::from_positions(start, end),
            (true, true) if start == end => {
                Range::collapsed(Position::new(start.line, start.column - 1))
            }
            (true, true) => {
                Range::new(start.line, start.column - 1, end.line, end.column + 1)
            }
            (true, false) => Range::new(start.line, start.column - 1, end.line, end.column),
            (false, true) => Range::new(start.line, start.column, end.line, end.column + 1),
        }
    }

    fn position_splits_pair(&self, position: Position) -> bool {
        let content = self.buffer.line_content(position.line).unwrap_or_default();
        matches!(
            utf16::anchor(content, position.column - 1),
            utf16::Utf16Anchor::Interior { .. }
        )
    }

    fn range_to_offsets_relaxed(&self, range: Range) -> (usize, usize) {
        let range = self.do_validate_range(range, false);
        (
            self.buffer.offset_at(range.start),
            self.buffer.offset_at(range.end),
        )
    }

    // ------------------------------------------------------------------
    // editing
    // ------------------------------------------------------------------

    /// Replace the whole contents. Flushes the undo stack and re-bases
    /// decorations onto the new text.
    pub fn set_value(&mut self, value: &str) -> Result<(), ModelError> {
        self.ensure_alive()?;
        self.begin_deferred();
        let old_length = self.buffer.value_length();
        let old_full_range = self.full_model_range();
        self.buffer = TextBuffer::new(value, self.default_eol);
        let new_length = self.buffer.value_length();
        self.is_too_large_for_tokenization = new_length > TOO_LARGE_TOKENIZATION_UNITS
            || self.buffer.line_count() > TOO_LARGE_TOKENIZATION_LINES;
        self.is_too_large_for_sync = new_length > TOO_LARGE_SYNC_UNITS;
        self.is_dominated_by_long_lines = compute_long_line_dominance(&self.buffer);

        self.decorations_changed_emitter.fire();
        self.decorations
            .accept_replace(0, old_length, new_length, false);
        self.reset_tokenization(false);
        self.edit_stack.clear();
        self.trim_auto_whitespace_lines = None;
        self.increase_version();

        let version_id = self.version_id;
        self.raw_content_emitter.fire(RawContentChangedEvent {
            changes: vec![RawChange::Flush],
            version_id,
            is_undoing: false,
            is_redoing: false,
        });
        self.content_emitter.fire(ContentChangedEvent {
            changes: vec![vellum_text::ContentChange {
                range: old_full_range,
                range_offset: 0,
                range_length: old_length,
                text: self.buffer.value(EolPreference::TextDefined, false),
                force_move_markers: false,
            }],
            version_id,
            is_undoing: false,
            is_redoing: false,
            is_flush: true,
            eol: None,
        });
        self.schedule_background_tokenization();
        self.end_deferred();
        Ok(())
    }

    /// Switch the buffer EOL. Positions survive; offsets are re-based.
    pub fn set_eol(&mut self, eol: Eol) -> Result<(), ModelError> {
        self.ensure_alive()?;
        if eol == self.buffer.eol() {
            return Ok(());
        }
        self.begin_deferred();
        let ids = self.decorations.all_ids();
        let mut snapshots = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some((s, e)) = self.decorations.resolve_offsets(id, self.version_id) {
                snapshots.push((
                    id.clone(),
                    self.buffer.position_at(s),
                    self.buffer.position_at(e),
                ));
            }
        }
        self.buffer.set_eol(eol);
        for (id, start, end) in snapshots {
            let s = self.buffer.offset_at(start);
            let e = self.buffer.offset_at(end);
            self.decorations.reset_offsets(&id, s, e);
        }
        self.increase_version();
        let version_id = self.version_id;
        self.raw_content_emitter.fire(RawContentChangedEvent {
            changes: vec![RawChange::EolChanged { eol }],
            version_id,
            is_undoing: false,
            is_redoing: false,
        });
        self.content_emitter.fire(ContentChangedEvent {
            changes: Vec::new(),
            version_id,
            is_undoing: false,
            is_redoing: false,
            is_flush: false,
            eol: Some(eol),
        });
        self.end_deferred();
        Ok(())
    }

    /// Apply edits without touching the undo stack; returns the reverse
    /// operations.
    pub fn apply_edits(
        &mut self,
        operations: Vec<EditOperation>,
    ) -> Result<Vec<EditOperation>, ModelError> {
        self.ensure_alive()?;
        let operations = self.validate_operations(operations);
        self.begin_deferred();
        let result = self.do_apply_edits(operations, false);
        self.end_deferred();
        result
    }

    /// Apply edits through the undo stack, trimming leftover auto
    /// whitespace from the previous edit when appropriate.
    pub fn push_edit_operations(
        &mut self,
        before_cursor_state: Option<&[Selection]>,
        operations: Vec<EditOperation>,
        cursor_state_computer: Option<&dyn Fn(&[EditOperation]) -> Option<Vec<Selection>>>,
    ) -> Result<Option<Vec<Selection>>, ModelError> {
        self.ensure_alive()?;
        let mut operations = self.validate_operations(operations);
        self.begin_deferred();

        if self.options.trim_auto_whitespace {
            if let Some(trim_lines) = self.trim_auto_whitespace_lines.take() {
                let edits_are_near_cursors = match before_cursor_state {
                    Some(selections) => selections.iter().all(|selection| {
                        let sel_range = selection.range();
                        operations
                            .iter()
                            .any(|op| op.range.line_span_intersects(&sel_range))
                    }),
                    None => false,
                };
                if edits_are_near_cursors {
                    for &trim_line in trim_lines.iter().rev() {
                        if trim_line > self.buffer.line_count() {
                            continue;
                        }
                        let max_column = self.buffer.line_max_column(trim_line).unwrap_or(1);
                        if max_column == 1 {
                            continue;
                        }
                        let mut allowed = true;
                        for op in &operations {
                            if op.range.start.line <= trim_line
                                && trim_line <= op.range.end.line
                            {
                                let appends_newline_at_end = trim_line == op.range.start.line
                                    && op.range.start.column == max_column
                                    && op
                                        .text
                                        .as_deref()
                                        .map(|t| t.starts_with('\n') || t.starts_with('\r'))
                                        .unwrap_or(false);
                                if appends_newline_at_end {
                                    continue;
                                }
                                allowed = false;
                                break;
                            }
                        }
                        if allowed {
                            trace!(target: "model.edits", line = trim_line, "trim_auto_whitespace");
                            operations.insert(
                                0,
                                EditOperation::delete(Range::new(
                                    trim_line, 1, trim_line, max_column,
                                )),
                            );
                        }
                    }
                }
            }
        } else {
            self.trim_auto_whitespace_lines = None;
        }

        let before_version_id = self.version_id;
        let result = self.do_apply_edits(operations, true);
        let outcome = match result {
            Ok(inverse_operations) => {
                let after_version_id = self.version_id;
                let after_cursor_state =
                    cursor_state_computer.and_then(|compute| compute(&inverse_operations));
                self.edit_stack.push_edit(
                    before_version_id,
                    before_cursor_state.map(|s| s.to_vec()),
                    inverse_operations,
                    after_version_id,
                    after_cursor_state.clone(),
                );
                Ok(after_cursor_state)
            }
            Err(e) => Err(e),
        };
        self.end_deferred();
        outcome
    }

    /// Close the open undo group; the next `push_edit_operations` starts a
    /// fresh one. Redundant calls are ignored.
    pub fn push_stack_element(&mut self) -> Result<(), ModelError> {
        self.ensure_alive()?;
        self.edit_stack.push_stack_element();
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.edit_stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.edit_stack.can_redo()
    }

    pub fn undo(&mut self) -> Result<Option<Vec<Selection>>, ModelError> {
        self.ensure_alive()?;
        let Some(mut element) = self.edit_stack.take_undo() else {
            return Ok(None);
        };
        self.begin_deferred();
        self.is_undoing = true;
        let mut failure = None;
        for group in element.edit_groups.iter_mut().rev() {
            let operations = std::mem::take(group);
            match self.do_apply_edits(operations, false) {
                Ok(inverse) => *group = inverse,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        self.is_undoing = false;
        self.alternative_version_id = element.before_version_id;
        let selections = element.before_cursor_state.clone();
        self.edit_stack.push_future(element);
        self.end_deferred();
        match failure {
            Some(e) => Err(e),
            None => Ok(selections),
        }
    }

    pub fn redo(&mut self) -> Result<Option<Vec<Selection>>, ModelError> {
        self.ensure_alive()?;
        let Some(mut element) = self.edit_stack.take_redo() else {
            return Ok(None);
        };
        self.begin_deferred();
        self.is_redoing = true;
        let mut failure = None;
        for group in element.edit_groups.iter_mut() {
            let operations = std::mem::take(group);
            match self.do_apply_edits(operations, false) {
                Ok(inverse) => *group = inverse,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        self.is_redoing = false;
        self.alternative_version_id = element.after_version_id;
        let selections = element.after_cursor_state.clone();
        self.edit_stack.push_past(element);
        self.end_deferred();
        match failure {
            Some(e) => Err(e),
            None => Ok(selections),
        }
    }

    fn validate_operations(&self, operations: Vec<EditOperation>) -> Vec<EditOperation> {
        operations
            .into_iter()
            .map(|mut op| {
                op.range = self.do_validate_range(op.range, true);
                op
            })
            .collect()
    }

    /// The edit pipeline: buffer first, then per atomic change the token
    /// store and both decoration trees, then version + events.
    fn do_apply_edits(
        &mut self,
        operations: Vec<EditOperation>,
        record_trim: bool,
    ) -> Result<Vec<EditOperation>, ModelError> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }
        let result = self.buffer.apply_edits(operations, record_trim)?;
        if record_trim {
            self.trim_auto_whitespace_lines =
                if result.trim_auto_whitespace_line_numbers.is_empty() {
                    None
                } else {
                    Some(result.trim_auto_whitespace_line_numbers.clone())
                };
        }
        if result.changes.is_empty() {
            return Ok(result.reverse_edits);
        }
        for change in &result.changes {
            let inserted_lines = change.lines().len() - 1;
            self.tokens_store.apply_edits(&change.range, inserted_lines);
            self.decorations_changed_emitter.fire();
            self.decorations.accept_replace(
                change.range_offset,
                change.range_length,
                change.text_length(),
                change.force_move_markers,
            );
        }
        self.increase_version();
        let version_id = self.version_id;
        trace!(
            target: "model.edits",
            version = version_id,
            changes = result.changes.len(),
            undoing = self.is_undoing,
            redoing = self.is_redoing,
            "applied"
        );
        self.raw_content_emitter.fire(RawContentChangedEvent {
            changes: result.raw_changes,
            version_id,
            is_undoing: self.is_undoing,
            is_redoing: self.is_redoing,
        });
        self.content_emitter.fire(ContentChangedEvent {
            changes: result.changes,
            version_id,
            is_undoing: self.is_undoing,
            is_redoing: self.is_redoing,
            is_flush: false,
            eol: None,
        });
        self.schedule_background_tokenization();
        Ok(result.reverse_edits)
    }

    fn increase_version(&mut self) {
        self.version_id += 1;
        self.alternative_version_id = self.version_id;
    }

    fn begin_deferred(&mut self) {
        self.raw_content_emitter.begin_deferred_emit();
        self.content_emitter.begin_deferred_emit();
        self.decorations_changed_emitter.begin_deferred_emit();
    }

    fn end_deferred(&mut self) {
        self.decorations_changed_emitter.end_deferred_emit();
        self.content_emitter.end_deferred_emit();
        self.raw_content_emitter.end_deferred_emit();
    }

    // ------------------------------------------------------------------
    // decorations
    // ------------------------------------------------------------------

    pub fn delta_decorations(
        &mut self,
        owner_id: usize,
        old_ids: &[String],
        new_decorations: Vec<DecorationSpec>,
    ) -> Result<Vec<String>, ModelError> {
        self.ensure_alive()?;
        if old_ids.is_empty() && new_decorations.is_empty() {
            return Ok(Vec::new());
        }
        self.begin_deferred();
        self.decorations_changed_emitter.fire();
        let mapped: Vec<(usize, usize, Arc<DecorationOptions>)> = new_decorations
            .into_iter()
            .map(|spec| {
                let (s, e) = self.range_to_offsets_relaxed(spec.range);
                (s, e, spec.options)
            })
            .collect();
        let result = self.decorations.delta(owner_id, old_ids, mapped);
        self.end_deferred();
        Ok(result)
    }

    /// Run `callback` with a transient accessor. The accessor's lifetime is
    /// the callback scope; panics inside the callback are reported to the
    /// error sink and yield `None`, with partial effects retained.
    pub fn change_decorations<R>(
        &mut self,
        owner_id: usize,
        callback: impl FnOnce(&mut DecorationsChangeAccessor<'_>) -> R,
    ) -> Result<Option<R>, ModelError> {
        self.ensure_alive()?;
        self.begin_deferred();
        let outcome = {
            let mut accessor = DecorationsChangeAccessor {
                model: &mut *self,
                owner_id,
            };
            std::panic::catch_unwind(AssertUnwindSafe(move || callback(&mut accessor)))
        };
        self.end_deferred();
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                error!(
                    target: "model.decorations",
                    id = %self.id,
                    "change_decorations callback panicked; partial effects retained"
                );
                Ok(None)
            }
        }
    }

    pub fn get_decoration_options(
        &self,
        id: &str,
    ) -> Result<Option<Arc<DecorationOptions>>, ModelError> {
        self.ensure_alive()?;
        Ok(self.decorations.options_of(id))
    }

    pub fn get_decoration_range(&self, id: &str) -> Result<Option<Range>, ModelError> {
        self.ensure_alive()?;
        Ok(self
            .decorations
            .resolve_offsets(id, self.version_id)
            .map(|(s, e)| self.offsets_to_range(s, e)))
    }

    pub fn get_line_decorations(
        &self,
        line_number: usize,
        owner_filter: usize,
        filter_out_validation: bool,
    ) -> Result<Vec<ModelDecoration>, ModelError> {
        self.get_lines_decorations(line_number, line_number, owner_filter, filter_out_validation)
    }

    pub fn get_lines_decorations(
        &self,
        start_line: usize,
        end_line: usize,
        owner_filter: usize,
        filter_out_validation: bool,
    ) -> Result<Vec<ModelDecoration>, ModelError> {
        self.ensure_alive()?;
        let line_count = self.buffer.line_count();
        let start_line = start_line.clamp(1, line_count);
        let end_line = end_line.clamp(start_line, line_count);
        let lo = self.buffer.offset_at(Position::new(start_line, 1));
        let hi = self.buffer.offset_at(Position::new(
            end_line,
            self.buffer.line_max_column(end_line).unwrap_or(1),
        ));
        Ok(self.tracked_to_model(self.decorations.decorations_in(
            lo,
            hi,
            owner_filter,
            filter_out_validation,
            false,
            self.version_id,
        )))
    }

    pub fn get_decorations_in_range(
        &self,
        range: Range,
        owner_filter: usize,
        filter_out_validation: bool,
    ) -> Result<Vec<ModelDecoration>, ModelError> {
        self.ensure_alive()?;
        let (lo, hi) = self.range_to_offsets_relaxed(range);
        Ok(self.tracked_to_model(self.decorations.decorations_in(
            lo,
            hi,
            owner_filter,
            filter_out_validation,
            false,
            self.version_id,
        )))
    }

    /// Only decorations projected onto the overview ruler; the non-ruler
    /// tree is never consulted, even for owner-scoped queries.
    pub fn get_overview_ruler_decorations(
        &self,
        owner_filter: usize,
        filter_out_validation: bool,
    ) -> Result<Vec<ModelDecoration>, ModelError> {
        self.ensure_alive()?;
        Ok(self.tracked_to_model(self.decorations.all_decorations(
            owner_filter,
            filter_out_validation,
            true,
            self.version_id,
        )))
    }

    pub fn get_all_decorations(
        &self,
        owner_filter: usize,
        filter_out_validation: bool,
    ) -> Result<Vec<ModelDecoration>, ModelError> {
        self.ensure_alive()?;
        Ok(self.tracked_to_model(self.decorations.all_decorations(
            owner_filter,
            filter_out_validation,
            false,
            self.version_id,
        )))
    }

    pub fn remove_all_decorations_with_owner_id(
        &mut self,
        owner_id: usize,
    ) -> Result<(), ModelError> {
        self.ensure_alive()?;
        self.begin_deferred();
        if self.decorations.remove_all_with_owner(owner_id) {
            self.decorations_changed_emitter.fire();
        }
        self.end_deferred();
        Ok(())
    }

    fn tracked_to_model(&self, tracked: Vec<TrackedDecoration>) -> Vec<ModelDecoration> {
        tracked
            .into_iter()
            .map(|d| ModelDecoration {
                range: self.offsets_to_range(d.start_offset, d.end_offset),
                id: d.id,
                owner_id: d.owner_id,
                options: d.options,
            })
            .collect()
    }

    fn offsets_to_range(&self, start: usize, end: usize) -> Range {
        Range::from_positions(self.buffer.position_at(start), self.buffer.position_at(end))
    }

    // ------------------------------------------------------------------
    // language & tokens
    // ------------------------------------------------------------------

    pub fn get_language_id(&self) -> LanguageId {
        self.language_id
    }

    pub fn get_language_name(&self) -> Option<String> {
        self.registry
            .borrow()
            .identifier(self.language_id)
            .map(|i| i.language.clone())
    }

    /// Switch language: token caches are rebuilt and a whole-model tokens
    /// event is emitted.
    pub fn set_language(&mut self, language: LanguageId) -> Result<(), ModelError> {
        self.ensure_alive()?;
        if language == self.language_id {
            return Ok(());
        }
        let event = LanguageChangedEvent {
            old_language: self.language_id,
            new_language: language,
        };
        self.language_id = language;
        self.reset_tokenization(true);
        self.language_emitter.fire(event);
        self.schedule_background_tokenization();
        Ok(())
    }

    /// Re-read the shared registry after its configuration or tokenizers
    /// changed for this model's language.
    pub fn refresh_language(&mut self) -> Result<(), ModelError> {
        self.ensure_alive()?;
        self.reset_tokenization(true);
        self.language_configuration_emitter.fire();
        self.schedule_background_tokenization();
        Ok(())
    }

    pub fn get_language_id_at_position(
        &self,
        position: Position,
    ) -> Result<LanguageId, ModelError> {
        self.ensure_alive()?;
        let position = self.do_validate_position(position, true);
        let tokens = self.line_tokens_internal(position.line);
        let index = tokens.find_token_index(position.column - 1);
        Ok(tokens.metadata(index).language_id())
    }

    pub fn get_line_tokens(&self, line_number: usize) -> Result<LineTokens, ModelError> {
        self.ensure_alive()?;
        // Out-of-range lines are an error, same as line content reads.
        self.buffer.line_content(line_number)?;
        Ok(self.line_tokens_internal(line_number))
    }

    fn line_tokens_internal(&self, line_number: usize) -> LineTokens {
        let content = self.buffer.line_content(line_number).unwrap_or_default();
        self.tokens_store
            .get_tokens(self.language_id, line_number - 1, content)
    }

    pub fn force_tokenization(&mut self, line_number: usize) -> Result<(), ModelError> {
        self.ensure_alive()?;
        self.buffer.line_content(line_number)?;
        let Some(tokenizer) = self.tokenizer.clone() else {
            return Ok(());
        };
        let mut builder = TokensEventBuilder::new();
        self.tokens_store.update_tokens_until_line(
            &self.buffer,
            tokenizer.as_ref(),
            self.language_id,
            &mut builder,
            line_number,
        );
        if let Some(event) = builder.build() {
            self.tokens_emitter.fire(event);
        }
        Ok(())
    }

    pub fn is_cheap_to_tokenize(&self, line_number: usize) -> bool {
        if self.tokenizer.is_none() {
            return true;
        }
        self.tokens_store.is_cheap_to_tokenize(line_number)
    }

    pub fn tokenize_if_cheap(&mut self, line_number: usize) -> Result<bool, ModelError> {
        self.ensure_alive()?;
        if self.is_cheap_to_tokenize(line_number) {
            self.force_tokenization(line_number)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn has_lines_to_tokenize(&self) -> bool {
        self.tokenizer.is_some() && self.tokens_store.has_lines_to_tokenize()
    }

    /// Is a background slice pending? The host event loop polls this after
    /// mutations and calls [`Self::run_background_tokenization`].
    pub fn needs_background_tokenization(&self) -> bool {
        self.background_tokenization_scheduled
    }

    /// Run one budgeted background slice. Returns whether another slice was
    /// rescheduled.
    pub fn run_background_tokenization(&mut self) -> Result<bool, ModelError> {
        self.ensure_alive()?;
        if !self.background_tokenization_scheduled {
            return Ok(false);
        }
        self.background_tokenization_scheduled = false;
        if self.attached_editor_count == 0 {
            return Ok(false);
        }
        let Some(tokenizer) = self.tokenizer.clone() else {
            return Ok(false);
        };
        let deadline = Instant::now() + TOKENIZATION_TIME_BUDGET;
        let mut builder = TokensEventBuilder::new();
        while self.tokens_store.has_lines_to_tokenize() && Instant::now() < deadline {
            self.tokens_store.tokenize_one_line(
                &self.buffer,
                tokenizer.as_ref(),
                self.language_id,
                &mut builder,
            );
        }
        if let Some(event) = builder.build() {
            self.tokens_emitter.fire(event);
        }
        self.schedule_background_tokenization();
        Ok(self.background_tokenization_scheduled)
    }

    fn schedule_background_tokenization(&mut self) {
        if self.attached_editor_count > 0 && self.has_lines_to_tokenize() {
            self.background_tokenization_scheduled = true;
        }
    }

    fn warm_up_tokenization(&mut self) {
        let Some(tokenizer) = self.tokenizer.clone() else {
            return;
        };
        let deadline = Instant::now() + TOKENIZATION_TIME_BUDGET;
        let target = WARM_UP_LINES.min(self.buffer.line_count());
        let mut builder = TokensEventBuilder::new();
        while self.tokens_store.has_lines_to_tokenize()
            && self.tokens_store.invalid_line_start() <= target
            && Instant::now() < deadline
        {
            self.tokens_store.tokenize_one_line(
                &self.buffer,
                tokenizer.as_ref(),
                self.language_id,
                &mut builder,
            );
        }
        if let Some(event) = builder.build() {
            self.tokens_emitter.fire(event);
        }
    }

    /// Rebuild the token store from the registry's current state.
    fn reset_tokenization(&mut self, emit: bool) {
        self.tokenizer = if self.is_too_large_for_tokenization {
            None
        } else {
            self.registry.borrow().tokenizer(self.language_id)
        };
        self.tokens_store = TokensStore::new(
            self.buffer.line_count(),
            self.tokenizer.as_ref().map(|t| t.initial_state()),
        );
        if emit {
            self.tokens_emitter.fire(TokensChangedEvent {
                ranges: vec![(1, self.buffer.line_count())],
            });
        }
    }

    // ------------------------------------------------------------------
    // search
    // ------------------------------------------------------------------

    pub fn find_matches(
        &self,
        query: &SearchQuery,
        scope: Option<Range>,
        capture_matches: bool,
        limit: Option<usize>,
    ) -> Result<Vec<FindMatch>, ModelError> {
        self.ensure_alive()?;
        let scope = match scope {
            Some(range) => self.do_validate_range(range, true),
            None => self.full_model_range(),
        };
        Ok(search::find_matches(
            &self.buffer,
            query,
            scope,
            capture_matches,
            limit.unwrap_or(DEFAULT_FIND_LIMIT),
        ))
    }

    pub fn find_next_match(
        &self,
        query: &SearchQuery,
        position: Position,
        capture_matches: bool,
    ) -> Result<Option<FindMatch>, ModelError> {
        self.ensure_alive()?;
        let position = self.do_validate_position(position, true);
        Ok(search::find_next_match(
            &self.buffer,
            query,
            position,
            capture_matches,
        ))
    }

    pub fn find_previous_match(
        &self,
        query: &SearchQuery,
        position: Position,
        capture_matches: bool,
    ) -> Result<Option<FindMatch>, ModelError> {
        self.ensure_alive()?;
        let position = self.do_validate_position(position, true);
        Ok(search::find_previous_match(
            &self.buffer,
            query,
            position,
            capture_matches,
        ))
    }

    // ------------------------------------------------------------------
    // words
    // ------------------------------------------------------------------

    pub fn get_word_at_position(
        &self,
        position: Position,
    ) -> Result<Option<WordAtPosition>, ModelError> {
        self.ensure_alive()?;
        let position = self.do_validate_position(position, true);
        let content = self.buffer.line_content(position.line).unwrap_or_default();
        let tokens = self.line_tokens_internal(position.line);
        let offset = position.column - 1;
        let index = tokens.find_token_index(offset);
        let language = tokens.metadata(index).language_id();

        // Maximal run of contiguous same-language tokens around the cursor.
        let mut first = index;
        while first > 0 && tokens.metadata(first - 1).language_id() == language {
            first -= 1;
        }
        let mut last = index;
        while last + 1 < tokens.count() && tokens.metadata(last + 1).language_id() == language {
            last += 1;
        }
        let span_start_column = tokens.start_offset(first) + 1;
        let span_end_column = tokens.end_offset(last) + 1;

        let pattern = self.registry.borrow_mut().word_pattern(language);
        Ok(words::word_at(
            content,
            &pattern,
            span_start_column,
            span_end_column,
            position.column,
        ))
    }

    pub fn get_word_until_position(
        &self,
        position: Position,
    ) -> Result<WordAtPosition, ModelError> {
        self.ensure_alive()?;
        let position = self.do_validate_position(position, true);
        let content = self.buffer.line_content(position.line).unwrap_or_default();
        let tokens = self.line_tokens_internal(position.line);
        let offset = position.column - 1;
        let index = tokens.find_token_index(offset);
        let language = tokens.metadata(index).language_id();
        let mut first = index;
        while first > 0 && tokens.metadata(first - 1).language_id() == language {
            first -= 1;
        }
        let mut last = index;
        while last + 1 < tokens.count() && tokens.metadata(last + 1).language_id() == language {
            last += 1;
        }
        let pattern = self.registry.borrow_mut().word_pattern(language);
        Ok(words::word_until(
            content,
            &pattern,
            tokens.start_offset(first) + 1,
            tokens.end_offset(last) + 1,
            position.column,
        ))
    }

    // ------------------------------------------------------------------
    // brackets
    // ------------------------------------------------------------------

    /// Bracket pair at the position: `(bracket_here, matching_bracket)`.
    pub fn match_bracket(
        &self,
        position: Position,
    ) -> Result<Option<(Range, Range)>, ModelError> {
        self.ensure_alive()?;
        let position = self.do_validate_position(position, true);
        let tokens = self.line_tokens_internal(position.line);
        let offset = position.column - 1;
        let index = tokens.find_token_index(offset);
        if let Some(found) = self.bracket_in_token(&tokens, position.line, index, offset) {
            return Ok(Some(found));
        }
        // On a token boundary, the previous token is inspected as well.
        if index > 0 && tokens.start_offset(index) == offset {
            if let Some(found) = self.bracket_in_token(&tokens, position.line, index - 1, offset)
            {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn bracket_in_token(
        &self,
        tokens: &LineTokens,
        line: usize,
        token_index: usize,
        offset: usize,
    ) -> Option<(Range, Range)> {
        let metadata = tokens.metadata(token_index);
        if metadata.ignore_brackets() {
            return None;
        }
        let language = metadata.language_id();
        let brackets = self.registry.borrow_mut().brackets(language)?;
        let content = self.buffer.line_content(line).ok()?;

        // Search window limited around the cursor within this token.
        let token_start = tokens.start_offset(token_index);
        let token_end = tokens.end_offset(token_index);
        let lo = token_start.max(offset.saturating_sub(brackets.max_bracket_length));
        let hi = token_end.min(offset + brackets.max_bracket_length);
        if lo >= hi {
            return None;
        }
        let lo_byte = utf16::byte_of(content, lo);
        let hi_byte = utf16::byte_of(content, hi);
        let slice = &content[lo_byte..hi_byte];

        // Of the brackets touching the cursor, the one starting latest wins
        // (a bracket beginning exactly at the cursor beats one ending there).
        let mut covering: Option<(usize, usize, String)> = None;
        for m in brackets.pattern.find_iter(slice) {
            let m_start = lo + utf16::utf16_of_byte(slice, m.start());
            let m_end = lo + utf16::utf16_of_byte(slice, m.end());
            if m_start > offset {
                break;
            }
            if offset <= m_end {
                covering = Some((m_start, m_end, m.as_str().to_string()));
            }
        }
        let (m_start, m_end, text) = covering?;
        let here = Range::new(line, m_start + 1, line, m_end + 1);
        let other = if brackets.is_open(&text) {
            self.matching_bracket_down(&brackets, language, &text, Position::new(line, m_end + 1))
        } else {
            self.matching_bracket_up(&brackets, language, &text, Position::new(line, m_start + 1))
        };
        other.map(|other| (here, other))
    }

    fn matching_bracket_down(
        &self,
        brackets: &RichBrackets,
        language: LanguageId,
        open: &str,
        from: Position,
    ) -> Option<Range> {
        let close = brackets.matching(open)?.to_string();
        let mut count: i32 = 1;
        let line_count = self.buffer.line_count();
        let mut from_column_units = from.column - 1;
        for line in from.line..=line_count {
            let content = self.buffer.line_content(line).ok()?;
            let tokens = self.line_tokens_internal(line);
            for ti in 0..tokens.count() {
                if tokens.end_offset(ti) <= from_column_units {
                    continue;
                }
                let metadata = tokens.metadata(ti);
                if metadata.ignore_brackets() || metadata.language_id() != language {
                    continue;
                }
                let lo = tokens.start_offset(ti).max(from_column_units);
                let hi = tokens.end_offset(ti);
                let lo_byte = utf16::byte_of(content, lo);
                let hi_byte = utf16::byte_of(content, hi);
                let slice = &content[lo_byte..hi_byte];
                let mut cursor = 0usize;
                while let Some((at, is_open_text, len)) =
                    next_occurrence(slice, cursor, open, &close)
                {
                    if is_open_text {
                        count += 1;
                    } else {
                        count -= 1;
                        if count == 0 {
                            let start = lo + utf16::utf16_of_byte(slice, at);
                            let end = start + utf16::utf16_len(&slice[at..at + len]);
                            return Some(Range::new(line, start + 1, line, end + 1));
                        }
                    }
                    cursor = at + len;
                }
            }
            from_column_units = 0;
        }
        None
    }

    fn matching_bracket_up(
        &self,
        brackets: &RichBrackets,
        language: LanguageId,
        close: &str,
        to: Position,
    ) -> Option<Range> {
        let open = brackets.matching(close)?.to_string();
        let mut count: i32 = 1;
        let mut to_column_units = Some(to.column - 1);
        for line in (1..=to.line).rev() {
            let content = self.buffer.line_content(line).ok()?;
            let tokens = self.line_tokens_internal(line);
            let limit = to_column_units.take();
            for ti in (0..tokens.count()).rev() {
                if let Some(limit) = limit {
                    if tokens.start_offset(ti) >= limit {
                        continue;
                    }
                }
                let metadata = tokens.metadata(ti);
                if metadata.ignore_brackets() || metadata.language_id() != language {
                    continue;
                }
                let lo = tokens.start_offset(ti);
                let hi = match limit {
                    Some(limit) => tokens.end_offset(ti).min(limit),
                    None => tokens.end_offset(ti),
                };
                let lo_byte = utf16::byte_of(content, lo);
                let hi_byte = utf16::byte_of(content, hi);
                let slice = &content[lo_byte..hi_byte];

                let mut occurrences = Vec::new();
                let mut cursor = 0usize;
                while let Some((at, is_open_text, len)) =
                    next_occurrence(slice, cursor, &open, close)
                {
                    occurrences.push((at, is_open_text, len));
                    cursor = at + len;
                }
                for &(at, is_open_text, len) in occurrences.iter().rev() {
                    if is_open_text {
                        count -= 1;
                        if count == 0 {
                            let start = lo + utf16::utf16_of_byte(slice, at);
                            let end = start + utf16::utf16_len(&slice[at..at + len]);
                            return Some(Range::new(line, start + 1, line, end + 1));
                        }
                    } else {
                        count += 1;
                    }
                }
            }
        }
        None
    }

    /// First bracket of any pair at or after the position.
    pub fn find_next_bracket(
        &self,
        position: Position,
    ) -> Result<Option<FoundBracket>, ModelError> {
        self.ensure_alive()?;
        let position = self.do_validate_position(position, true);
        let line_count = self.buffer.line_count();
        let mut from_column_units = position.column - 1;
        for line in position.line..=line_count {
            let content = self.buffer.line_content(line).unwrap_or_default();
            let tokens = self.line_tokens_internal(line);
            for ti in 0..tokens.count() {
                if tokens.end_offset(ti) <= from_column_units {
                    continue;
                }
                let metadata = tokens.metadata(ti);
                if metadata.ignore_brackets() {
                    continue;
                }
                let Some(brackets) = self.registry.borrow_mut().brackets(metadata.language_id())
                else {
                    continue;
                };
                let lo = tokens.start_offset(ti).max(from_column_units);
                let hi = tokens.end_offset(ti);
                let lo_byte = utf16::byte_of(content, lo);
                let hi_byte = utf16::byte_of(content, hi);
                let slice = &content[lo_byte..hi_byte];
                if let Some(m) = brackets.pattern.find(slice) {
                    return Ok(Some(self.build_found_bracket(&brackets, line, lo, slice, m)));
                }
            }
            from_column_units = 0;
        }
        Ok(None)
    }

    /// Last bracket of any pair strictly before the position.
    pub fn find_prev_bracket(
        &self,
        position: Position,
    ) -> Result<Option<FoundBracket>, ModelError> {
        self.ensure_alive()?;
        let position = self.do_validate_position(position, true);
        let mut limit = Some(position.column - 1);
        for line in (1..=position.line).rev() {
            let content = self.buffer.line_content(line).unwrap_or_default();
            let tokens = self.line_tokens_internal(line);
            let line_limit = limit.take();
            for ti in (0..tokens.count()).rev() {
                if let Some(line_limit) = line_limit {
                    if tokens.start_offset(ti) >= line_limit {
                        continue;
                    }
                }
                let metadata = tokens.metadata(ti);
                if metadata.ignore_brackets() {
                    continue;
                }
                let Some(brackets) = self.registry.borrow_mut().brackets(metadata.language_id())
                else {
                    continue;
                };
                let lo = tokens.start_offset(ti);
                let hi = match line_limit {
                    Some(line_limit) => tokens.end_offset(ti).min(line_limit),
                    None => tokens.end_offset(ti),
                };
                let lo_byte = utf16::byte_of(content, lo);
                let hi_byte = utf16::byte_of(content, hi);
                let slice = &content[lo_byte..hi_byte];
                if let Some(m) = brackets.pattern.find_iter(slice).last() {
                    return Ok(Some(self.build_found_bracket(&brackets, line, lo, slice, m)));
                }
            }
        }
        Ok(None)
    }

    fn build_found_bracket(
        &self,
        brackets: &RichBrackets,
        line: usize,
        slice_start_units: usize,
        slice: &str,
        m: regex::Match<'_>,
    ) -> FoundBracket {
        let start = slice_start_units + utf16::utf16_of_byte(slice, m.start());
        let end = slice_start_units + utf16::utf16_of_byte(slice, m.end());
        let text = m.as_str();
        let is_open = brackets.is_open(text);
        let (open, close) = if is_open {
            (
                text.to_string(),
                brackets.matching(text).unwrap_or_default().to_string(),
            )
        } else {
            (
                brackets.matching(text).unwrap_or_default().to_string(),
                text.to_string(),
            )
        };
        FoundBracket {
            range: Range::new(line, start + 1, line, end + 1),
            open,
            close,
            is_open,
        }
    }

    // ------------------------------------------------------------------
    // indent guides
    // ------------------------------------------------------------------

    pub fn get_lines_indent_guides(
        &self,
        start_line: usize,
        end_line: usize,
    ) -> Result<Vec<usize>, ModelError> {
        self.ensure_alive()?;
        self.buffer.line_content(start_line)?;
        self.buffer.line_content(end_line)?;
        let off_side = self.registry.borrow().off_side(self.language_id);
        Ok(guides::lines_indent_guides(
            &self.buffer,
            self.options.tab_size,
            off_side,
            start_line,
            end_line,
        ))
    }

    // ------------------------------------------------------------------
    // event subscriptions
    // ------------------------------------------------------------------

    pub fn on_did_change_content(
        &mut self,
        listener: impl FnMut(&ContentChangedEvent) + 'static,
    ) -> ListenerId {
        self.content_emitter.on(listener)
    }

    pub fn off_did_change_content(&mut self, id: ListenerId) {
        self.content_emitter.off(id);
    }

    pub fn on_did_change_raw_content(
        &mut self,
        listener: impl FnMut(&RawContentChangedEvent) + 'static,
    ) -> ListenerId {
        self.raw_content_emitter.on(listener)
    }

    pub fn off_did_change_raw_content(&mut self, id: ListenerId) {
        self.raw_content_emitter.off(id);
    }

    pub fn on_did_change_decorations(&mut self, listener: impl FnMut() + 'static) -> ListenerId {
        self.decorations_changed_emitter.on(listener)
    }

    pub fn off_did_change_decorations(&mut self, id: ListenerId) {
        self.decorations_changed_emitter.off(id);
    }

    pub fn on_did_change_tokens(
        &mut self,
        listener: impl FnMut(&TokensChangedEvent) + 'static,
    ) -> ListenerId {
        self.tokens_emitter.on(listener)
    }

    pub fn off_did_change_tokens(&mut self, id: ListenerId) {
        self.tokens_emitter.off(id);
    }

    pub fn on_did_change_language(
        &mut self,
        listener: impl FnMut(&LanguageChangedEvent) + 'static,
    ) -> ListenerId {
        self.language_emitter.on(listener)
    }

    pub fn off_did_change_language(&mut self, id: ListenerId) {
        self.language_emitter.off(id);
    }

    pub fn on_did_change_language_configuration(
        &mut self,
        listener: impl FnMut() + 'static,
    ) -> ListenerId {
        self.language_configuration_emitter.on(listener)
    }

    pub fn off_did_change_language_configuration(&mut self, id: ListenerId) {
        self.language_configuration_emitter.off(id);
    }

    pub fn on_did_change_options(
        &mut self,
        listener: impl FnMut(&OptionsChangedEvent) + 'static,
    ) -> ListenerId {
        self.options_emitter.on(listener)
    }

    pub fn off_did_change_options(&mut self, id: ListenerId) {
        self.options_emitter.off(id);
    }

    pub fn on_will_dispose(&mut self, listener: impl FnMut() + 'static) -> ListenerId {
        self.will_dispose_emitter.on(listener)
    }

    pub fn off_will_dispose(&mut self, id: ListenerId) {
        self.will_dispose_emitter.off(id);
    }
}

/// Transient decoration mutator handed to `change_decorations` callbacks.
/// The borrow ends with the callback, so stale use is a compile error.
pub struct DecorationsChangeAccessor<'a> {
    model: &'a mut TextModel,
    owner_id: usize,
}

impl DecorationsChangeAccessor<'_> {
    pub fn add_decoration(&mut self, range: Range, options: Arc<DecorationOptions>) -> String {
        let (s, e) = self.model.range_to_offsets_relaxed(range);
        self.model.decorations_changed_emitter.fire();
        self.model.decorations.add(self.owner_id, s, e, options)
    }

    pub fn change_decoration(&mut self, id: &str, range: Range) {
        let (s, e) = self.model.range_to_offsets_relaxed(range);
        if self.model.decorations.change_range(id, s, e) {
            self.model.decorations_changed_emitter.fire();
        }
    }

    pub fn change_decoration_options(&mut self, id: &str, options: Arc<DecorationOptions>) {
        if self.model.decorations.change_options(id, options) {
            self.model.decorations_changed_emitter.fire();
        }
    }

    pub fn remove_decoration(&mut self, id: &str) {
        if self.model.decorations.remove(id) {
            self.model.decorations_changed_emitter.fire();
        }
    }

    pub fn delta_decorations(
        &mut self,
        old_ids: &[String],
        new_decorations: Vec<DecorationSpec>,
    ) -> Vec<String> {
        if old_ids.is_empty() && new_decorations.is_empty() {
            return Vec::new();
        }
        self.model.decorations_changed_emitter.fire();
        let mapped: Vec<(usize, usize, Arc<DecorationOptions>)> = new_decorations
            .into_iter()
            .map(|spec| {
                let (s, e) = self.model.range_to_offsets_relaxed(spec.range);
                (s, e, spec.options)
            })
            .collect();
        self.model.decorations.delta(self.owner_id, old_ids, mapped)
    }
}

/// Earliest occurrence of either needle in `slice` at or after `from`.
/// Returns `(byte_index, matched_first_needle, byte_len)`.
fn next_occurrence(slice: &str, from: usize, a: &str, b: &str) -> Option<(usize, bool, usize)> {
    if from >= slice.len() {
        return None;
    }
    let rest = &slice[from..];
    let fa = rest.find(a).map(|i| i + from);
    let fb = rest.find(b).map(|i| i + from);
    match (fa, fb) {
        (Some(ia), Some(ib)) => {
            if ia <= ib {
                Some((ia, true, a.len()))
            } else {
                Some((ib, false, b.len()))
            }
        }
        (Some(ia), None) => Some((ia, true, a.len())),
        (None, Some(ib)) => Some((ib, false, b.len())),
        (None, None) => None,
    }
}

fn compute_long_line_dominance(buffer: &TextBuffer) -> bool {
    let mut long_units = 0usize;
    let mut short_units = 0usize;
    for line in 1..=buffer.line_count() {
        let len = buffer.line_length(line).unwrap_or(0);
        if len >= LONG_LINE_THRESHOLD {
            long_units += len;
        } else {
            short_units += len;
        }
    }
    long_units > short_units
}
