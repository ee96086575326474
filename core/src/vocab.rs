//! Word <-> id mapping.
//!
//! Ids are dense and assigned in the order words are inserted, which for a
//! parsed model is the order of the `\1-grams:` section. Reserved token ids
//! (sentence start/end, unknown word) are resolved by the model once the
//! vocabulary is complete.

use crate::error::{LmError, Result};
use crate::tables::FastMap;

/// Dense id assigned to a vocabulary word.
pub type WordId = u32;

#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    words: Vec<String>,
    index: FastMap<String, WordId>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: Vec::with_capacity(capacity),
            index: FastMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Rebuild a vocabulary from words listed in id order.
    pub fn from_words(words: Vec<String>) -> Result<Self> {
        let mut vocab = Self::with_capacity(words.len());
        for word in words {
            vocab.insert(word)?;
        }
        Ok(vocab)
    }

    /// Assign the next id to `word`. A repeated word is a format error since
    /// every id must name exactly one word.
    pub fn insert(&mut self, word: impl Into<String>) -> Result<WordId> {
        let word = word.into();
        if self.index.contains_key(&word) {
            return Err(LmError::format(format!("duplicate vocabulary word {word:?}")));
        }
        let id = WordId::try_from(self.words.len())
            .map_err(|_| LmError::format("vocabulary exceeds u32 id space"))?;
        self.index.insert(word.clone(), id);
        self.words.push(word);
        Ok(id)
    }

    /// Exact lookup; `None` when the word was never inserted.
    pub fn get(&self, word: &str) -> Option<WordId> {
        self.index.get(word).copied()
    }

    /// Inverse lookup.
    pub fn word(&self, id: WordId) -> Option<&str> {
        self.words.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words in id order.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn iter(&self) -> impl Iterator<Item = (WordId, &str)> + '_ {
        self.words
            .iter()
            .enumerate()
            .map(|(id, w)| (id as WordId, w.as_str()))
    }
}
