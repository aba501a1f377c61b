//! Word-level SPIR-V encoding.
//!
//! A module is assembled from independent sections (header, debug names,
//! annotations, types/constants, instructions) that are concatenated at the
//! end; each section is just a word buffer.

use super::ops::SpirvOp;

#[derive(Debug, Default)]
pub struct SpirvSection {
    words: Vec<u32>,
}

impl SpirvSection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one raw word (header fields).
    pub fn append_raw(&mut self, word: u32) {
        self.words.push(word);
    }

    /// Append one instruction: the leading word packs the total word count
    /// in the high half and the opcode in the low half.
    pub fn append(&mut self, op: SpirvOp, operands: &[u32]) {
        let word_count = 1 + operands.len() as u32;
        self.words.push((word_count << 16) | op as u32);
        self.words.extend_from_slice(operands);
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Encode a string literal: UTF-8 bytes, NUL terminator, zero-padded to a
/// word boundary, packed little-endian.
pub fn string_words(text: &str) -> Vec<u32> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
