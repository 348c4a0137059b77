//! Event payloads emitted by the model.

use vellum_text::{ContentChange, Eol, RawChange};
use vellum_tokens::LanguageId;

/// Atomic content deltas, as consumed by mirrors and derived indexes.
/// Changes are ordered end-of-document first, the order in which they can be
/// replayed without offset fixups.
#[derive(Debug, Clone)]
pub struct ContentChangedEvent {
    pub changes: Vec<ContentChange>,
    pub version_id: u64,
    pub is_undoing: bool,
    pub is_redoing: bool,
    /// The whole buffer was replaced (`set_value`).
    pub is_flush: bool,
    /// Only the EOL sequence changed; `changes` is empty.
    pub eol: Option<Eol>,
}

/// Line-level deltas for observers that mirror the line array.
#[derive(Debug, Clone)]
pub struct RawContentChangedEvent {
    pub changes: Vec<RawChange>,
    pub version_id: u64,
    pub is_undoing: bool,
    pub is_redoing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageChangedEvent {
    pub old_language: LanguageId,
    pub new_language: LanguageId,
}
