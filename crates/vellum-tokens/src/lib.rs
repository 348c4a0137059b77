//! Incremental line tokenization for the text model.
//!
//! The grammar engine stays external: anything implementing [`Tokenizer`]
//! can be registered for a language. This crate owns what surrounds it:
//! the packed per-line token arrays, the invalidation frontier that makes
//! tokenization lazy, and the language registry carrying bracket pairs,
//! word patterns and the off-side flag that the model's query layer needs.

pub mod language;
pub mod line_tokens;
pub mod metadata;
pub mod store;
pub mod tokenizer;

pub use language::{
    BracketPair, LanguageConfiguration, LanguageId, LanguageIdentifier, LanguageRegistry,
    RegistryError, RichBrackets, PLAIN_TEXT_LANGUAGE_ID,
};
pub use line_tokens::LineTokens;
pub use metadata::{FontStyle, StandardTokenType, TokenMetadata};
pub use store::{TokensChangedEvent, TokensEventBuilder, TokensStore};
pub use tokenizer::{TokenSpan, TokenizedLine, Tokenizer, TokenizerState};
