//! Word lookup around a position.

use regex::Regex;
use vellum_text::utf16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordAtPosition {
    pub word: String,
    pub start_column: usize,
    pub end_column: usize,
}

/// Run `word_pattern` over the line span `[span_start_column, span_end_column)`
/// (the maximal run of same-language tokens around the cursor) and return the
/// match covering `column`. Both boundaries of a word count as covering.
pub fn word_at(
    line_content: &str,
    word_pattern: &Regex,
    span_start_column: usize,
    span_end_column: usize,
    column: usize,
) -> Option<WordAtPosition> {
    let start_units = span_start_column - 1;
    let start_byte = utf16::byte_of(line_content, start_units);
    let end_byte = utf16::byte_of(line_content, span_end_column - 1);
    let slice = &line_content[start_byte..end_byte];

    for m in word_pattern.find_iter(slice) {
        let start_column = span_start_column + utf16::utf16_of_byte(slice, m.start());
        let end_column = span_start_column + utf16::utf16_of_byte(slice, m.end());
        if start_column <= column && column <= end_column {
            return Some(WordAtPosition {
                word: m.as_str().to_string(),
                start_column,
                end_column,
            });
        }
        if start_column > column {
            break;
        }
    }
    None
}

/// The part of the covering word before the cursor. Yields an empty word at
/// the cursor when there is none.
pub fn word_until(
    line_content: &str,
    word_pattern: &Regex,
    span_start_column: usize,
    span_end_column: usize,
    column: usize,
) -> WordAtPosition {
    match word_at(
        line_content,
        word_pattern,
        span_start_column,
        span_end_column,
        column,
    ) {
        Some(word) => {
            let keep_units = column - word.start_column;
            let keep_bytes = utf16::byte_of(&word.word, keep_units);
            WordAtPosition {
                word: word.word[..keep_bytes].to_string(),
                start_column: word.start_column,
                end_column: column,
            }
        }
        None => WordAtPosition {
            word: String::new(),
            start_column: column,
            end_column: column,
        },
    }
}
