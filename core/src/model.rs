//! Backoff language model and its scorers.
//!
//! A [`LanguageModel`] is built once, either by the ARPA parser or from a
//! snapshot, and is read-only afterwards. All scores are natural-log values.
//!
//! Backoff follows the usual ARPA rules:
//!
//! ```text
//! P(w2 | w1)     = bigram(w1, w2)                   if present
//!                = backoff(w1) + unigram(w2)        otherwise
//! P(w3 | w1, w2) = trigram(w1, w2, w3)              if present
//!                = backoff(w1, w2) + P(w3 | w2)     otherwise
//! ```
//!
//! where a missing context backoff weight counts as 0.0.

use serde::{Deserialize, Serialize};

use crate::error::{LmError, Result};
use crate::tables::{BigramTable, MissingEntryPolicy, ProbBackoff, TrigramTable, UnigramTable};
use crate::vocab::{Vocabulary, WordId};

/// Scalar metadata stored alongside the tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub is_trigram: bool,
    pub start_id: WordId,
    pub end_id: WordId,
    pub unk_id: WordId,
    /// Factor applied to every log10 value from the source file (ln 10).
    pub scale: f64,
    pub missing_entry: MissingEntryPolicy,
    /// Add the sentence-end transition to sequence scores.
    pub score_sentence_end: bool,
}

/// Entry counts per order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelStats {
    pub order: usize,
    pub vocab_size: usize,
    pub bigrams: usize,
    pub trigrams: usize,
}

#[derive(Debug, Clone)]
pub struct LanguageModel {
    meta: ModelMeta,
    vocab: Vocabulary,
    unigrams: UnigramTable,
    bigrams: BigramTable,
    trigrams: Option<TrigramTable>,
}

impl LanguageModel {
    /// Assemble a model from complete tables. Used by the parser and the
    /// snapshot loader, which validate their inputs first.
    pub(crate) fn from_parts(
        meta: ModelMeta,
        vocab: Vocabulary,
        unigrams: UnigramTable,
        bigrams: BigramTable,
        trigrams: Option<TrigramTable>,
    ) -> Self {
        Self {
            meta,
            vocab,
            unigrams,
            bigrams,
            trigrams,
        }
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub(crate) fn unigram_table(&self) -> &UnigramTable {
        &self.unigrams
    }

    pub(crate) fn bigram_table(&self) -> &BigramTable {
        &self.bigrams
    }

    pub(crate) fn trigram_table(&self) -> Option<&TrigramTable> {
        self.trigrams.as_ref()
    }

    pub fn is_trigram(&self) -> bool {
        self.meta.is_trigram
    }

    /// Highest n-gram order: 2 or 3.
    pub fn order(&self) -> usize {
        if self.meta.is_trigram {
            3
        } else {
            2
        }
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            order: self.order(),
            vocab_size: self.vocab.len(),
            bigrams: self.bigrams.len(),
            trigrams: self.trigrams.as_ref().map_or(0, TrigramTable::len),
        }
    }

    pub fn start_id(&self) -> WordId {
        self.meta.start_id
    }

    pub fn end_id(&self) -> WordId {
        self.meta.end_id
    }

    pub fn unk_id(&self) -> WordId {
        self.meta.unk_id
    }

    /// Id of `token`, or the unknown-word id when it is not in the vocabulary.
    pub fn word_id(&self, token: &str) -> WordId {
        self.vocab.get(token).unwrap_or(self.meta.unk_id)
    }

    // --- Raw table access ---

    pub fn unigram_logprob(&self, id: WordId) -> f64 {
        self.unigrams.get(id).log_prob
    }

    pub fn unigram_backoff(&self, id: WordId) -> f64 {
        self.unigrams.get(id).backoff
    }

    /// Stored bigram entry, ignoring the missing-entry policy.
    pub fn bigram_entry(&self, w1: WordId, w2: WordId) -> Option<ProbBackoff> {
        self.bigrams.get((w1, w2))
    }

    /// Stored trigram log-probability, ignoring the missing-entry policy.
    pub fn trigram_entry(&self, w1: WordId, w2: WordId, w3: WordId) -> Option<f64> {
        self.trigrams.as_ref()?.get((w1, w2, w3))
    }

    // --- Backoff scoring ---

    fn explicit_bigram(&self, w1: WordId, w2: WordId) -> Option<ProbBackoff> {
        self.bigrams
            .get((w1, w2))
            .filter(|e| self.meta.missing_entry.accept(e.log_prob))
    }

    fn explicit_trigram(&self, w1: WordId, w2: WordId, w3: WordId) -> Option<f64> {
        self.trigram_entry(w1, w2, w3)
            .filter(|&p| self.meta.missing_entry.accept(p))
    }

    /// ln P(w2 | w1) with backoff to the unigram table.
    pub fn bigram_prob(&self, w1: WordId, w2: WordId) -> f64 {
        match self.explicit_bigram(w1, w2) {
            Some(entry) => entry.log_prob,
            None => self.unigram_backoff(w1) + self.unigram_logprob(w2),
        }
    }

    /// ln P(w3 | w1, w2) with two-level backoff. Trigram models only.
    pub fn trigram_prob(&self, w1: WordId, w2: WordId, w3: WordId) -> Result<f64> {
        self.require_trigram()?;
        Ok(self.trigram_backoff(w1, w2, w3))
    }

    fn trigram_backoff(&self, w1: WordId, w2: WordId, w3: WordId) -> f64 {
        if let Some(p) = self.explicit_trigram(w1, w2, w3) {
            return p;
        }
        let context_backoff = self
            .explicit_bigram(w1, w2)
            .map_or(0.0, |entry| entry.backoff);
        self.bigram_prob(w2, w3) + context_backoff
    }

    fn require_trigram(&self) -> Result<()> {
        if self.meta.is_trigram {
            Ok(())
        } else {
            Err(LmError::Unsupported(
                "trigram scoring requested on a bigram model".to_string(),
            ))
        }
    }

    // --- Sequence scoring ---

    fn sequence_ids<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<WordId>> {
        if tokens.is_empty() {
            return Err(LmError::InvalidArgument(
                "cannot score an empty token sequence".to_string(),
            ));
        }
        Ok(tokens.iter().map(|t| self.word_id(t.as_ref())).collect())
    }

    /// Sum of bigram log-probabilities over `<s> w0 w1 ... wn`.
    ///
    /// The transition into the sentence-end token is only added when the
    /// model was built with `score_sentence_end`.
    pub fn score_bigram<S: AsRef<str>>(&self, tokens: &[S]) -> Result<f64> {
        let ids = self.sequence_ids(tokens)?;
        let start = self.meta.start_id;

        let mut total = self.bigram_prob(start, ids[0]);
        for pair in ids.windows(2) {
            total += self.bigram_prob(pair[0], pair[1]);
        }
        if self.meta.score_sentence_end {
            total += self.bigram_prob(ids[ids.len() - 1], self.meta.end_id);
        }
        Ok(total)
    }

    /// Sum of trigram log-probabilities over `<s> <s> w0 w1 ... wn`.
    ///
    /// A single-word sequence scores `P(w0 | <s> <s>) + P(</s> | <s> w0)`.
    /// For longer sequences the final `P(</s> | wn-1 wn)` term is only added
    /// with `score_sentence_end`.
    pub fn score_trigram<S: AsRef<str>>(&self, tokens: &[S]) -> Result<f64> {
        self.require_trigram()?;
        let ids = self.sequence_ids(tokens)?;
        let start = self.meta.start_id;
        let end = self.meta.end_id;

        let mut total = self.trigram_backoff(start, start, ids[0]);
        let second = ids.get(1).copied().unwrap_or(end);
        total += self.trigram_backoff(start, ids[0], second);
        for window in ids.windows(3) {
            total += self.trigram_backoff(window[0], window[1], window[2]);
        }
        if self.meta.score_sentence_end && ids.len() >= 2 {
            let n = ids.len();
            total += self.trigram_backoff(ids[n - 2], ids[n - 1], end);
        }
        Ok(total)
    }

    /// Score a whitespace-separated sentence with the model's highest order.
    pub fn score_sentence(&self, sentence: &str) -> Result<f64> {
        let tokens: Vec<&str> = sentence.split_whitespace().collect();
        if self.meta.is_trigram {
            self.score_trigram(&tokens)
        } else {
            self.score_bigram(&tokens)
        }
    }
}
