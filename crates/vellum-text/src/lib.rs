//! Line-oriented text storage for the vellum text model.
//!
//! The buffer stores line contents *without* their terminating end-of-line
//! sequence; a single [`Eol`] value applies to the whole buffer. All
//! addressing is in UTF-16 code units: columns are 1-based unit offsets
//! within a line, buffer offsets count units from the start including 1 or 2
//! units per line break depending on the active EOL.
//!
//! Core invariants:
//! * `line_count() >= 1` at all times (an empty buffer is one empty line).
//! * Stored line contents never contain `\r` or `\n`.
//! * `offset_at` / `position_at` round-trip for every valid position.
//! * `apply_edits` leaves the prefix-sum cache invalidated, never stale.
//!
//! Position validation (clamping, surrogate-pair adjustment) is a facade
//! concern; the buffer itself assumes validated inputs and guards with
//! `debug_assert!` only.

pub mod buffer;
pub mod edits;
pub mod position;
pub mod utf16;

pub use buffer::TextBuffer;
pub use edits::{
    ApplyEditsResult, ContentChange, EditOperation, RawChange, split_lines,
};
pub use position::{Position, Range, Selection};

use thiserror::Error;

/// End-of-line sequence, uniform for the whole buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eol {
    Lf,
    CrLf,
}

impl Eol {
    pub fn as_str(self) -> &'static str {
        match self {
            Eol::Lf => "\n",
            Eol::CrLf => "\r\n",
        }
    }

    /// Number of UTF-16 code units this sequence occupies.
    pub fn units(self) -> usize {
        match self {
            Eol::Lf => 1,
            Eol::CrLf => 2,
        }
    }
}

/// EOL flavor requested when extracting text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EolPreference {
    /// Use whatever the buffer currently stores.
    TextDefined,
    Lf,
    CrLf,
}

/// Errors raised by buffer operations that demand exact inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextError {
    #[error("invalid line number {line} (buffer has {line_count} lines)")]
    InvalidLineNumber { line: usize, line_count: usize },
    #[error("overlapping edit operations are not allowed")]
    OverlappingEdits,
}
