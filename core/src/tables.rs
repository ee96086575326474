//! Per-order probability tables.
//!
//! All values are natural-log (ARPA log10 values are scaled at load time).
//! Unigrams are dense and indexed by word id; bigrams and trigrams are hash
//! maps keyed by id tuples. Absence of a bigram/trigram key is meaningful: it
//! tells the scorer to back off.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::vocab::WordId;

/// HashMap with the ahash hasher. Serializable because `ahash::RandomState`
/// implements `Default`.
pub type FastMap<K, V> = HashMap<K, V, ahash::RandomState>;

/// A log-probability with the backoff weight applied when this n-gram is used
/// as context for a longer one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProbBackoff {
    pub log_prob: f64,
    pub backoff: f64,
}

impl ProbBackoff {
    pub fn new(log_prob: f64, backoff: f64) -> Self {
        Self { log_prob, backoff }
    }
}

/// How a lookup decides that a bigram/trigram has no explicit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingEntryPolicy {
    /// Only an absent key means "no entry".
    #[default]
    Presence,
    /// A stored log-probability of exactly 0.0 also counts as "no entry".
    /// Reproduces scores from implementations backed by zero-default maps.
    Zero,
}

impl MissingEntryPolicy {
    pub(crate) fn accept(self, log_prob: f64) -> bool {
        match self {
            MissingEntryPolicy::Presence => true,
            MissingEntryPolicy::Zero => log_prob != 0.0,
        }
    }
}

/// Dense unigram table: entry `i` belongs to word id `i`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnigramTable {
    entries: Vec<ProbBackoff>,
}

impl UnigramTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Append the entry for the next word id.
    pub fn push(&mut self, entry: ProbBackoff) {
        self.entries.push(entry);
    }

    /// Entry for `id`, or `(0.0, 0.0)` when the id has none.
    pub fn get(&self, id: WordId) -> ProbBackoff {
        self.entries.get(id as usize).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bigram table. Its value shape depends on the model order: only a trigram
/// model needs bigram backoff weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BigramTable {
    /// Highest order of a bigram model: log-probability only.
    Prob(FastMap<(WordId, WordId), f64>),
    /// Context order of a trigram model: log-probability and backoff.
    ProbBackoff(FastMap<(WordId, WordId), ProbBackoff>),
}

impl BigramTable {
    pub fn new(with_backoff: bool) -> Self {
        if with_backoff {
            BigramTable::ProbBackoff(FastMap::default())
        } else {
            BigramTable::Prob(FastMap::default())
        }
    }

    /// Store an entry. The backoff weight is dropped for a `Prob` table.
    pub fn insert(&mut self, key: (WordId, WordId), entry: ProbBackoff) {
        match self {
            BigramTable::Prob(map) => {
                map.insert(key, entry.log_prob);
            }
            BigramTable::ProbBackoff(map) => {
                map.insert(key, entry);
            }
        }
    }

    /// Explicit entry for `key`. A `Prob` table reports a 0.0 backoff.
    pub fn get(&self, key: (WordId, WordId)) -> Option<ProbBackoff> {
        match self {
            BigramTable::Prob(map) => map.get(&key).map(|&p| ProbBackoff::new(p, 0.0)),
            BigramTable::ProbBackoff(map) => map.get(&key).copied(),
        }
    }

    pub fn has_backoff(&self) -> bool {
        matches!(self, BigramTable::ProbBackoff(_))
    }

    pub fn len(&self) -> usize {
        match self {
            BigramTable::Prob(map) => map.len(),
            BigramTable::ProbBackoff(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trigram table (highest order, no backoff weights).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrigramTable {
    entries: FastMap<(WordId, WordId, WordId), f64>,
}

impl TrigramTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: (WordId, WordId, WordId), log_prob: f64) {
        self.entries.insert(key, log_prob);
    }

    pub fn get(&self, key: (WordId, WordId, WordId)) -> Option<f64> {
        self.entries.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
