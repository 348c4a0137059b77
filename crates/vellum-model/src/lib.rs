//! In-memory text model for code editors.
//!
//! The [`TextModel`] couples four subsystems over one mutable text:
//!
//! * the line buffer ([`vellum_text::TextBuffer`]) with UTF-16 addressing,
//! * decorations that survive edits via stickiness-aware interval trees,
//! * lazily tokenized lines with background catch-up,
//! * deferred event emission so observers always see consistent snapshots.
//!
//! Everything is single-threaded and cooperative: there are no locks, no
//! internal threads, and the only suspension points are between whole-line
//! tokenizations of the background pump.
//!
//! ```
//! use vellum_model::TextModel;
//! use vellum_text::{EditOperation, EolPreference, Position};
//!
//! let mut model = TextModel::with_defaults("abc\ndef");
//! model
//!     .apply_edits(vec![EditOperation::insert(Position::new(1, 2), "X")])
//!     .unwrap();
//! assert_eq!(
//!     model.get_value(EolPreference::TextDefined, false).unwrap(),
//!     "aXbc\ndef"
//! );
//! ```

pub mod decorations;
pub mod editstack;
pub mod error;
pub mod events;
pub mod guides;
pub mod model;
pub mod options;
pub mod search;
pub mod words;

pub use decorations::{
    sanitize_class_name, DecorationOptions, OverviewRulerLane, OverviewRulerOptions,
};
pub use error::ModelError;
pub use events::{ContentChangedEvent, LanguageChangedEvent, RawContentChangedEvent};
pub use model::{
    DecorationSpec, DecorationsChangeAccessor, FoundBracket, ModelDecoration, TextModel,
    TextModelCreationOptions,
};
pub use options::{OptionsChangedEvent, OptionsUpdate, TextModelOptions};
pub use search::{FindMatch, SearchQuery, DEFAULT_FIND_LIMIT};
pub use vellum_tree::Stickiness;
pub use words::WordAtPosition;
