//! Fixed-size leaf bitsets.

use crate::error::{reserve, Result};

/// One bit per leaf, stored in 32-bit words.
///
/// Bit `i` lives in word `i / 32` at position `i % 32`, so the little-endian
/// bytes of the words are exactly the exported row layout (bit `i` in byte
/// `i / 8`, mask `1 << (i % 8)`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VisBits {
    words: Vec<u32>,
    len: usize,
}

impl VisBits {
    /// An all-clear set of `len` bits.
    pub fn new(len: usize) -> Result<Self> {
        let count = len.div_ceil(32);
        let mut words = Vec::new();
        reserve(&mut words, count)?;
        words.resize(count, 0);
        Ok(Self { words, len })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        index < self.len && self.words[index / 32] & (1 << (index % 32)) != 0
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < self.len);
        self.words[index / 32] |= 1 << (index % 32);
    }

    /// Adds every bit of `other`.
    pub fn union_with(&mut self, other: &VisBits) {
        for (word, other) in self.words.iter_mut().zip(&other.words) {
            *word |= other;
        }
    }

    /// Bits set in both `self` and `other`.
    pub fn intersection(&self, other: &VisBits) -> Result<VisBits> {
        let mut words = Vec::new();
        reserve(&mut words, self.words.len())?;
        words.extend(self.words.iter().zip(&other.words).map(|(a, b)| a & b));
        Ok(VisBits {
            words,
            len: self.len,
        })
    }

    /// True if some bit of `self` is clear in `other`.
    pub fn has_bits_not_in(&self, other: &VisBits) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .any(|(a, b)| a & !b != 0)
    }

    /// True if every bit of `self` is also set in `other`.
    pub fn is_subset_of(&self, other: &VisBits) -> bool {
        !self.has_bits_not_in(other)
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Indices of the set bits, ascending.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&i| self.get(i))
    }

    /// The exported row: `len.div_ceil(8)` bytes.
    pub fn to_row_bytes(&self) -> Vec<u8> {
        self.words
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .take(self.len.div_ceil(8))
            .collect()
    }

    /// Parses an exported row of `len` bits.
    pub fn from_row_bytes(bytes: &[u8], len: usize) -> Result<VisBits> {
        let mut bits = VisBits::new(len)?;
        for (index, byte) in bytes.iter().take(len.div_ceil(8)).enumerate() {
            bits.words[index / 4] |= (*byte as u32) << (8 * (index % 4));
        }
        // Padding bits past `len` are not part of the set.
        let tail = len % 32;
        if tail != 0 {
            if let Some(last) = bits.words.last_mut() {
                *last &= (1u32 << tail) - 1;
            }
        }
        Ok(bits)
    }
}
