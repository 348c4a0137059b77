//! Token metadata packed into one 32-bit word.
//!
//! Layout, least significant bits first:
//!
//! ```text
//! bits  0..8   language id
//! bits  8..11  standard token type
//! bits 11..14  font style flags
//! bits 14..23  foreground color id
//! bits 23..32  background color id
//! ```

use bitflags::bitflags;

const LANGUAGE_OFFSET: u32 = 0;
const TOKEN_TYPE_OFFSET: u32 = 8;
const FONT_STYLE_OFFSET: u32 = 11;
const FOREGROUND_OFFSET: u32 = 14;
const BACKGROUND_OFFSET: u32 = 23;

const LANGUAGE_MASK: u32 = 0xFF << LANGUAGE_OFFSET;
const TOKEN_TYPE_MASK: u32 = 0x7 << TOKEN_TYPE_OFFSET;
const FONT_STYLE_MASK: u32 = 0x7 << FONT_STYLE_OFFSET;
const FOREGROUND_MASK: u32 = 0x1FF << FOREGROUND_OFFSET;
const BACKGROUND_MASK: u32 = 0x1FF << BACKGROUND_OFFSET;

/// Broad classification every tokenizer must provide; bracket matching
/// skips brackets inside comments, strings and regular expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum StandardTokenType {
    #[default]
    Other = 0,
    Comment = 1,
    String = 2,
    Regex = 3,
}

impl StandardTokenType {
    fn from_bits(bits: u32) -> StandardTokenType {
        match bits {
            1 => StandardTokenType::Comment,
            2 => StandardTokenType::String,
            3 => StandardTokenType::Regex,
            _ => StandardTokenType::Other,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FontStyle: u32 {
        const ITALIC = 1;
        const BOLD = 2;
        const UNDERLINE = 4;
    }
}

/// One packed metadata word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenMetadata(pub u32);

impl TokenMetadata {
    pub fn new(
        language_id: u8,
        token_type: StandardTokenType,
        font_style: FontStyle,
        foreground: u16,
        background: u16,
    ) -> Self {
        let bits = ((language_id as u32) << LANGUAGE_OFFSET)
            | ((token_type as u32) << TOKEN_TYPE_OFFSET)
            | (font_style.bits() << FONT_STYLE_OFFSET)
            | (((foreground as u32) & 0x1FF) << FOREGROUND_OFFSET)
            | (((background as u32) & 0x1FF) << BACKGROUND_OFFSET);
        TokenMetadata(bits)
    }

    /// Plain token in the given language, no styling.
    pub fn plain(language_id: u8) -> Self {
        Self::new(
            language_id,
            StandardTokenType::Other,
            FontStyle::empty(),
            0,
            0,
        )
    }

    pub fn language_id(self) -> u8 {
        ((self.0 & LANGUAGE_MASK) >> LANGUAGE_OFFSET) as u8
    }

    pub fn token_type(self) -> StandardTokenType {
        StandardTokenType::from_bits((self.0 & TOKEN_TYPE_MASK) >> TOKEN_TYPE_OFFSET)
    }

    pub fn font_style(self) -> FontStyle {
        FontStyle::from_bits_truncate((self.0 & FONT_STYLE_MASK) >> FONT_STYLE_OFFSET)
    }

    pub fn foreground(self) -> u16 {
        ((self.0 & FOREGROUND_MASK) >> FOREGROUND_OFFSET) as u16
    }

    pub fn background(self) -> u16 {
        ((self.0 & BACKGROUND_MASK) >> BACKGROUND_OFFSET) as u16
    }

    /// Should bracket characters inside this token be ignored by matching?
    pub fn ignore_brackets(self) -> bool {
        self.token_type() != StandardTokenType::Other
    }
}
