//! Fixed-capacity signature bit-sets.
//!
//! A [`Signature`] is a 256-bit set that records which relation types an
//! entity currently holds. Bit `i` corresponds to the relation type whose
//! [`RelationTypeId`](crate::registry::RelationTypeId) is `i`, so membership
//! tests never touch a hash map.
//!
//! The capacity is a hard ceiling: at most [`Signature::CAPACITY`] distinct
//! relation types can be registered in one world.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Sub};

use crate::entity::EntityId;

const WORDS: usize = 4;

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// A 256-bit set stored inline as four 64-bit words.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    words: [u64; WORDS],
}

impl Signature {
    /// Number of distinct bits a signature can hold.
    pub const CAPACITY: usize = WORDS * 64;

    /// The empty signature.
    pub const EMPTY: Signature = Signature { words: [0; WORDS] };

    /// Create an empty signature.
    #[inline]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Build a signature from its raw words, lowest bits first.
    #[inline]
    pub const fn from_words(words: [u64; WORDS]) -> Self {
        Self { words }
    }

    /// Build a signature with every bit in `bits` set.
    pub fn from_bits(bits: &[u8]) -> Self {
        bits.iter().copied().collect()
    }

    /// The raw words, lowest bits first.
    #[inline]
    pub const fn words(&self) -> [u64; WORDS] {
        self.words
    }

    #[inline]
    fn locate(bit: u8) -> (usize, u64) {
        ((bit >> 6) as usize, 1u64 << (bit & 63))
    }

    /// Set bit `bit`.
    #[inline]
    pub fn set(&mut self, bit: u8) {
        let (word, mask) = Self::locate(bit);
        self.words[word] |= mask;
    }

    /// Clear bit `bit`.
    #[inline]
    pub fn clear(&mut self, bit: u8) {
        let (word, mask) = Self::locate(bit);
        self.words[word] &= !mask;
    }

    /// Whether bit `bit` is set.
    #[inline]
    pub fn has(&self, bit: u8) -> bool {
        let (word, mask) = Self::locate(bit);
        self.words[word] & mask != 0
    }

    /// Whether every bit of `other` is also set in `self`.
    #[inline]
    pub fn has_all(&self, other: &Signature) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .all(|(a, b)| a & b == *b)
    }

    /// Whether `self` and `other` share at least one bit.
    #[inline]
    pub fn has_any(&self, other: &Signature) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .any(|(a, b)| a & b != 0)
    }

    /// Whether no bit is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Number of set bits.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate set bits in ascending order.
    #[inline]
    pub fn iter(&self) -> SignatureIter {
        SignatureIter::new(*self)
    }

    #[inline]
    fn zip_with(a: &Signature, b: &Signature, op: impl Fn(u64, u64) -> u64) -> Signature {
        let mut words = [0; WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            *word = op(a.words[i], b.words[i]);
        }
        Signature { words }
    }

    /// Bits set in either `a` or `b`.
    pub fn union(a: &Signature, b: &Signature) -> Signature {
        Self::zip_with(a, b, |x, y| x | y)
    }

    /// Bits set in both `a` and `b`.
    pub fn intersect(a: &Signature, b: &Signature) -> Signature {
        Self::zip_with(a, b, |x, y| x & y)
    }

    /// Bits set in `a` but not in `b`.
    pub fn difference(a: &Signature, b: &Signature) -> Signature {
        Self::zip_with(a, b, |x, y| x & !y)
    }

    /// Bits set in exactly one of `a` and `b`.
    pub fn symmetric_difference(a: &Signature, b: &Signature) -> Signature {
        Self::zip_with(a, b, |x, y| x ^ y)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature{self}")
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, bit) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{bit}")?;
        }
        f.write_str("}")
    }
}

impl BitOr for Signature {
    type Output = Signature;

    fn bitor(self, rhs: Signature) -> Signature {
        Signature::union(&self, &rhs)
    }
}

impl BitAnd for Signature {
    type Output = Signature;

    fn bitand(self, rhs: Signature) -> Signature {
        Signature::intersect(&self, &rhs)
    }
}

impl BitXor for Signature {
    type Output = Signature;

    fn bitxor(self, rhs: Signature) -> Signature {
        Signature::symmetric_difference(&self, &rhs)
    }
}

impl Sub for Signature {
    type Output = Signature;

    fn sub(self, rhs: Signature) -> Signature {
        Signature::difference(&self, &rhs)
    }
}

impl FromIterator<u8> for Signature {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut signature = Signature::new();
        for bit in iter {
            signature.set(bit);
        }
        signature
    }
}

impl IntoIterator for Signature {
    type Item = u8;
    type IntoIter = SignatureIter;

    fn into_iter(self) -> SignatureIter {
        SignatureIter::new(self)
    }
}

impl IntoIterator for &Signature {
    type Item = u8;
    type IntoIter = SignatureIter;

    fn into_iter(self) -> SignatureIter {
        SignatureIter::new(*self)
    }
}

// ---------------------------------------------------------------------------
// SignatureIter
// ---------------------------------------------------------------------------

/// Ascending iterator over the set bits of a [`Signature`].
///
/// Works on a private copy of the words, peeling off the lowest set bit of
/// the current word with `trailing_zeros` until the word is exhausted.
#[derive(Debug, Clone)]
pub struct SignatureIter {
    source: Signature,
    remaining: [u64; WORDS],
    word: usize,
}

impl SignatureIter {
    fn new(source: Signature) -> Self {
        Self {
            source,
            remaining: source.words,
            word: 0,
        }
    }

    /// Restart the iteration from the lowest bit.
    pub fn reset(&mut self) {
        self.remaining = self.source.words;
        self.word = 0;
    }
}

impl Iterator for SignatureIter {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        while self.word < WORDS {
            let bits = self.remaining[self.word];
            if bits != 0 {
                let offset = bits.trailing_zeros();
                self.remaining[self.word] = bits & (bits - 1);
                return Some((self.word as u32 * 64 + offset) as u8);
            }
            self.word += 1;
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.remaining[self.word.min(WORDS)..]
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum();
        (left, Some(left))
    }
}

impl ExactSizeIterator for SignatureIter {}

// ---------------------------------------------------------------------------
// EntitySignatures
// ---------------------------------------------------------------------------

/// Per-entity signature storage, indexed by [`EntityId::index`].
///
/// Relation stores flip an entity's bit on its first add and last remove of
/// that relation type. Callers are responsible for passing live entities;
/// the generation is not checked here.
#[derive(Debug, Default, Clone)]
pub struct EntitySignatures {
    signatures: Vec<Signature>,
}

impl EntitySignatures {
    /// Create empty storage.
    pub fn new() -> Self {
        Self {
            signatures: Vec::new(),
        }
    }

    /// Create storage with room for `capacity` entities.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            signatures: Vec::with_capacity(capacity),
        }
    }

    /// The signature of `entity` (empty if never touched).
    #[inline]
    pub fn get(&self, entity: EntityId) -> Signature {
        self.signatures
            .get(entity.index() as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Set `bit` on `entity`'s signature.
    pub fn set(&mut self, entity: EntityId, bit: u8) {
        let idx = entity.index() as usize;
        if idx >= self.signatures.len() {
            self.signatures.resize(idx + 1, Signature::EMPTY);
        }
        self.signatures[idx].set(bit);
    }

    /// Clear `bit` on `entity`'s signature.
    pub fn clear(&mut self, entity: EntityId, bit: u8) {
        if let Some(signature) = self.signatures.get_mut(entity.index() as usize) {
            signature.clear(bit);
        }
    }

    /// Reset `entity`'s signature to empty.
    pub fn reset(&mut self, entity: EntityId) {
        if let Some(signature) = self.signatures.get_mut(entity.index() as usize) {
            *signature = Signature::EMPTY;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
