//! Packed per-line token array.

use crate::metadata::TokenMetadata;

/// Tokens of one line: `(start_offset, metadata)` pairs packed flat, always
/// covering exactly `[0, text_length]` in UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTokens {
    /// Even indexes: token start offsets (ascending, first is 0).
    /// Odd indexes: the matching metadata words.
    data: Box<[u32]>,
    text_length: usize,
}

impl LineTokens {
    pub fn from_packed(data: Box<[u32]>, text_length: usize) -> Self {
        debug_assert!(!data.is_empty() && data.len() % 2 == 0);
        debug_assert!(data[0] == 0, "tokens must cover the line from offset 0");
        Self { data, text_length }
    }

    /// Single plain token for a line the store has not tokenized yet.
    pub fn placeholder(language_id: u8, text_length: usize) -> Self {
        Self {
            data: Box::new([0, TokenMetadata::plain(language_id).0]),
            text_length,
        }
    }

    pub fn count(&self) -> usize {
        self.data.len() / 2
    }

    pub fn text_length(&self) -> usize {
        self.text_length
    }

    pub fn start_offset(&self, index: usize) -> usize {
        self.data[index * 2] as usize
    }

    pub fn end_offset(&self, index: usize) -> usize {
        if index + 1 < self.count() {
            self.data[(index + 1) * 2] as usize
        } else {
            self.text_length
        }
    }

    pub fn metadata(&self, index: usize) -> TokenMetadata {
        TokenMetadata(self.data[index * 2 + 1])
    }

    /// Index of the token containing `offset`. Offsets at a token boundary
    /// resolve to the token starting there; `offset == text_length` resolves
    /// to the last token.
    pub fn find_token_index(&self, offset: usize) -> usize {
        let mut lo = 0usize;
        let mut hi = self.count() - 1;
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if self.start_offset(mid) <= offset {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }
}
