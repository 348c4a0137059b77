//! Shared fixtures for the model integration tests.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use vellum_model::{TextModel, TextModelCreationOptions};
use vellum_tokens::{
    BracketPair, FontStyle, LanguageConfiguration, LanguageId, LanguageRegistry, StandardTokenType,
    TokenMetadata, TokenSpan, TokenizedLine, Tokenizer, TokenizerState,
};

/// Stateless tokenizer state; every instance compares equal.
#[derive(Debug)]
pub struct NoState;

impl TokenizerState for NoState {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn equals(&self, other: &dyn TokenizerState) -> bool {
        other.as_any().downcast_ref::<NoState>().is_some()
    }
}

/// Splits lines at double quotes: quoted segments (quotes included) become
/// `String` tokens, the rest stays `Other`. Quotes never span lines.
pub struct QuoteTokenizer {
    pub language: LanguageId,
    pub foreground: u16,
}

impl QuoteTokenizer {
    fn span(&self, start: usize, string: bool) -> TokenSpan {
        TokenSpan {
            start_offset: start,
            metadata: TokenMetadata::new(
                self.language,
                if string {
                    StandardTokenType::String
                } else {
                    StandardTokenType::Other
                },
                FontStyle::empty(),
                self.foreground,
                0,
            ),
        }
    }
}

impl Tokenizer for QuoteTokenizer {
    fn initial_state(&self) -> Arc<dyn TokenizerState> {
        Arc::new(NoState)
    }

    fn tokenize_line(&self, line: &str, _state: &Arc<dyn TokenizerState>) -> TokenizedLine {
        let mut tokens = Vec::new();
        let mut in_string = false;
        let mut run_start = 0usize;
        let mut offset = 0usize;
        for ch in line.chars() {
            let width = ch.len_utf16();
            if ch == '"' {
                if in_string {
                    // Closing quote still belongs to the string token.
                    tokens.push(self.span(run_start, true));
                    in_string = false;
                    run_start = offset + width;
                } else {
                    if offset > run_start {
                        tokens.push(self.span(run_start, false));
                    }
                    in_string = true;
                    run_start = offset;
                }
            }
            offset += width;
        }
        if run_start < offset || tokens.is_empty() {
            tokens.push(self.span(run_start, in_string));
        }
        TokenizedLine {
            tokens,
            end_state: Arc::new(NoState),
        }
    }
}

/// Registry with a "demo" language: `()`/`{}` brackets and the quote
/// tokenizer.
pub fn demo_registry() -> (Rc<RefCell<LanguageRegistry>>, LanguageId) {
    let mut registry = LanguageRegistry::new();
    let demo = registry.register_language("demo").unwrap();
    registry.set_configuration(
        demo,
        LanguageConfiguration {
            brackets: vec![BracketPair::new("(", ")"), BracketPair::new("{", "}")],
            word_pattern: None,
            off_side: false,
        },
    );
    registry.register_tokenizer(
        demo,
        Arc::new(QuoteTokenizer {
            language: demo,
            foreground: 5,
        }),
    );
    (Rc::new(RefCell::new(registry)), demo)
}

/// Model speaking the demo language.
pub fn demo_model(text: &str) -> TextModel {
    let (registry, demo) = demo_registry();
    TextModel::new(
        text,
        TextModelCreationOptions {
            language: demo,
            ..TextModelCreationOptions::default()
        },
        registry,
    )
}
