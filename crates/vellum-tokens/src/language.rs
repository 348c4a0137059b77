//! Language identities, per-language configuration, and the registry that
//! ties them to tokenizers.
//!
//! The registry is plain shared data: models hold it behind `Rc<RefCell<..>>`
//! and re-read it on demand, so it never has to keep listener lists pointing
//! back at models.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::tokenizer::Tokenizer;

pub type LanguageId = u8;

/// Language id 0 is always registered and carries no configuration.
pub const PLAIN_TEXT_LANGUAGE_ID: LanguageId = 0;

/// Word characters used when a language does not configure its own pattern:
/// number literals, else runs of anything that is not a separator.
const DEFAULT_WORD_PATTERN: &str =
    r#"(-?\d*\.\d\w*)|([^`~!@#$%^&*()\-=+\[{\]}\\|;:'",.<>/?\s]+)"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageIdentifier {
    pub language: String,
    pub id: LanguageId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketPair {
    pub open: String,
    pub close: String,
}

impl BracketPair {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self { open: open.into(), close: close.into() }
    }
}

/// Per-language editing configuration consumed by the model's query layer.
#[derive(Debug, Clone, Default)]
pub struct LanguageConfiguration {
    pub brackets: Vec<BracketPair>,
    /// Custom word pattern; the default pattern applies when absent.
    pub word_pattern: Option<String>,
    /// Off-side languages (indentation defines blocks) change how indent
    /// guides treat blank lines.
    pub off_side: bool,
}

/// Bracket pairs of a language compiled for scanning.
#[derive(Debug)]
pub struct RichBrackets {
    pub pairs: Vec<BracketPair>,
    /// Alternation of every bracket text, longest first.
    pub pattern: Regex,
    /// Length in UTF-16 code units of the longest bracket text.
    pub max_bracket_length: usize,
}

impl RichBrackets {
    fn compile(pairs: &[BracketPair]) -> Option<RichBrackets> {
        if pairs.is_empty() {
            return None;
        }
        let mut texts: Vec<&str> = pairs
            .iter()
            .flat_map(|p| [p.open.as_str(), p.close.as_str()])
            .collect();
        texts.sort_by_key(|t| std::cmp::Reverse(t.len()));
        texts.dedup();
        let alternation = texts
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&alternation).ok()?;
        let max_bracket_length = texts
            .iter()
            .map(|t| vellum_text::utf16::utf16_len(t))
            .max()
            .unwrap_or(0);
        Some(RichBrackets {
            pairs: pairs.to_vec(),
            pattern,
            max_bracket_length,
        })
    }

    pub fn is_open(&self, text: &str) -> bool {
        self.pairs.iter().any(|p| p.open == text)
    }

    /// The partner text of a bracket, if `text` is one of the pair sides.
    pub fn matching(&self, text: &str) -> Option<&str> {
        for p in &self.pairs {
            if p.open == text {
                return Some(&p.close);
            }
            if p.close == text {
                return Some(&p.open);
            }
        }
        None
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("language registry is full (255 languages)")]
    Full,
}

/// Registry of known languages, their configuration and tokenizers.
pub struct LanguageRegistry {
    languages: Vec<LanguageIdentifier>,
    configurations: HashMap<LanguageId, LanguageConfiguration>,
    tokenizers: HashMap<LanguageId, Arc<dyn Tokenizer>>,
    compiled_brackets: HashMap<LanguageId, Option<Arc<RichBrackets>>>,
    compiled_words: HashMap<LanguageId, Arc<Regex>>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self {
            languages: vec![LanguageIdentifier {
                language: "plaintext".to_string(),
                id: PLAIN_TEXT_LANGUAGE_ID,
            }],
            configurations: HashMap::new(),
            tokenizers: HashMap::new(),
            compiled_brackets: HashMap::new(),
            compiled_words: HashMap::new(),
        }
    }

    /// Register a language name, returning its id (existing id if already
    /// known).
    pub fn register_language(&mut self, language: &str) -> Result<LanguageId, RegistryError> {
        if let Some(existing) = self.languages.iter().find(|l| l.language == language) {
            return Ok(existing.id);
        }
        if self.languages.len() > u8::MAX as usize {
            return Err(RegistryError::Full);
        }
        let id = self.languages.len() as LanguageId;
        debug!(target: "model.language", language, id, "register_language");
        self.languages.push(LanguageIdentifier {
            language: language.to_string(),
            id,
        });
        Ok(id)
    }

    pub fn identifier(&self, id: LanguageId) -> Option<&LanguageIdentifier> {
        self.languages.get(id as usize)
    }

    pub fn language_id(&self, language: &str) -> Option<LanguageId> {
        self.languages
            .iter()
            .find(|l| l.language == language)
            .map(|l| l.id)
    }

    pub fn set_configuration(&mut self, id: LanguageId, configuration: LanguageConfiguration) {
        self.compiled_brackets.remove(&id);
        self.compiled_words.remove(&id);
        self.configurations.insert(id, configuration);
    }

    pub fn configuration(&self, id: LanguageId) -> Option<&LanguageConfiguration> {
        self.configurations.get(&id)
    }

    pub fn register_tokenizer(&mut self, id: LanguageId, tokenizer: Arc<dyn Tokenizer>) {
        self.tokenizers.insert(id, tokenizer);
    }

    pub fn tokenizer(&self, id: LanguageId) -> Option<Arc<dyn Tokenizer>> {
        self.tokenizers.get(&id).cloned()
    }

    /// Compiled bracket support for a language, cached after first use.
    pub fn brackets(&mut self, id: LanguageId) -> Option<Arc<RichBrackets>> {
        if let Some(cached) = self.compiled_brackets.get(&id) {
            return cached.clone();
        }
        let compiled = self
            .configurations
            .get(&id)
            .and_then(|c| RichBrackets::compile(&c.brackets))
            .map(Arc::new);
        self.compiled_brackets.insert(id, compiled.clone());
        compiled
    }

    /// Word pattern for a language; falls back to the shared default.
    pub fn word_pattern(&mut self, id: LanguageId) -> Arc<Regex> {
        if let Some(cached) = self.compiled_words.get(&id) {
            return cached.clone();
        }
        let source = self
            .configurations
            .get(&id)
            .and_then(|c| c.word_pattern.as_deref())
            .unwrap_or(DEFAULT_WORD_PATTERN);
        let compiled = Arc::new(
            Regex::new(source)
                .unwrap_or_else(|_| Regex::new(DEFAULT_WORD_PATTERN).expect("default word pattern")),
        );
        self.compiled_words.insert(id, compiled.clone());
        compiled
    }

    pub fn off_side(&self, id: LanguageId) -> bool {
        self.configurations.get(&id).map(|c| c.off_side).unwrap_or(false)
    }
}
